//! Test fixtures: small generated PDFs and stamp images

use std::io::Cursor;

use image::{DynamicImage, Rgba, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};

/// Build a PDF with one page per `(width, height)` entry
///
/// Every page carries a filled square whose shade depends on its page
/// number, so each page renders differently.
pub fn pdf_with_pages(sizes: &[(f32, f32)]) -> Vec<u8> {
    build_pdf(sizes, &Dictionary::new(), &Dictionary::new())
}

/// One 600x800 page carrying extra page entries such as `CropBox` or `Rotate`
pub fn page_with_entries(entries: Dictionary) -> Vec<u8> {
    build_pdf(&[(600.0, 800.0)], &entries, &Dictionary::new())
}

/// One 600x800 page whose `Pages` node carries extra inheritable entries
pub fn page_with_tree_entries(entries: Dictionary) -> Vec<u8> {
    build_pdf(&[(600.0, 800.0)], &Dictionary::new(), &entries)
}

fn build_pdf(sizes: &[(f32, f32)], page_entries: &Dictionary, tree_entries: &Dictionary) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::with_capacity(sizes.len());
    for (i, (width, height)) in sizes.iter().enumerate() {
        let shade = 0.2 + 0.2 * (i % 4) as f32;
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new("rg", vec![shade.into(), 0.3_f32.into(), 0.6_f32.into()]),
                Operation::new(
                    "re",
                    vec![20.into(), 20.into(), 120.into(), 120.into()],
                ),
                Operation::new("f", vec![]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode fixture content"),
        ));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), (*width).into(), (*height).into()],
            "Contents" => content_id,
            "Resources" => dictionary! {},
        };
        for (key, value) in page_entries.iter() {
            page.set(key.clone(), value.clone());
        }
        let page_id = doc.add_object(page);
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    let mut pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
    };
    for (key, value) in tree_entries.iter() {
        pages.set(key.clone(), value.clone());
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("save fixture pdf");
    buffer
}

/// Three 600x800 pt pages
pub fn three_page_pdf() -> Vec<u8> {
    pdf_with_pages(&[(600.0, 800.0), (600.0, 800.0), (600.0, 800.0)])
}

/// Solid-colour PNG stamp
pub fn stamp_png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba(color));
    let mut out = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .expect("encode fixture png");
    out
}

/// Opaque red stamp
pub fn red_stamp() -> Vec<u8> {
    stamp_png(40, 16, [220, 20, 20, 255])
}
