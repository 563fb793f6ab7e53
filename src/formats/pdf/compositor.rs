//! PDF stamp compositor
//!
//! Inserts raster stamps into existing pages with lopdf. Each stamp is
//! embedded once as an image XObject (with an `SMask` when it has
//! transparency) and painted with a `q cm Do Q` sequence. The original
//! page content is wrapped in its own `q`/`Q` pair the first time a page
//! is stamped, so graphics state left behind by the page cannot skew the
//! stamp.

use std::collections::{HashMap, HashSet};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::document::{
    DocumentError, DocumentFormat, DocumentResult, EditableDocument, PageSize, Rect, StampImage,
};

/// US Letter, used when a page tree carries no MediaBox at all
const FALLBACK_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Guard against `Parent` cycles in malformed page trees
const MAX_TREE_DEPTH: usize = 64;

/// The part of a page a viewer shows, and how it is turned
///
/// `bbox` is `[llx, lly, urx, ury]` in PDF user space. `rotate` is the
/// clockwise display rotation in degrees, one of 0, 90, 180 or 270.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PageFrame {
    pub bbox: [f32; 4],
    pub rotate: u16,
}

impl PageFrame {
    /// Size of the page as displayed
    pub fn size(&self) -> PageSize {
        let [llx, lly, urx, ury] = self.bbox;
        let (width, height) = (urx - llx, ury - lly);
        match self.rotate {
            90 | 270 => PageSize::new(height, width),
            _ => PageSize::new(width, height),
        }
    }

    /// Matrix taking top-left-origin display points to PDF user space
    pub fn display_to_user(&self) -> [f32; 6] {
        let [llx, lly, urx, ury] = self.bbox;
        match self.rotate {
            90 => [0.0, 1.0, 1.0, 0.0, llx, lly],
            180 => [-1.0, 0.0, 0.0, 1.0, urx, lly],
            270 => [0.0, -1.0, -1.0, 0.0, urx, ury],
            _ => [1.0, 0.0, 0.0, -1.0, llx, ury],
        }
    }
}

/// An open PDF being stamped
pub struct PdfDocument {
    doc: Document,
    /// Page object ids in page order
    pages: Vec<ObjectId>,
    /// Stamp index -> embedded image XObject
    embedded: HashMap<u32, ObjectId>,
    /// Pages whose original content is already wrapped in q/Q
    wrapped: HashSet<ObjectId>,
}

impl PdfDocument {
    /// Parse PDF bytes
    pub fn load(data: &[u8]) -> DocumentResult<Self> {
        if DocumentFormat::from_magic_bytes(data) != Some(DocumentFormat::Pdf) {
            return Err(DocumentError::DecodeFailure(
                "missing %PDF header".to_string(),
            ));
        }

        let doc = Document::load_mem(data)?;
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if pages.is_empty() {
            return Err(DocumentError::DecodeFailure(
                "document has no pages".to_string(),
            ));
        }

        Ok(Self {
            doc,
            pages,
            embedded: HashMap::new(),
            wrapped: HashSet::new(),
        })
    }

    fn page_id(&self, page_index: usize) -> DocumentResult<ObjectId> {
        self.pages
            .get(page_index)
            .copied()
            .ok_or(DocumentError::InvalidPage {
                page: page_index + 1,
                page_count: self.pages.len(),
            })
    }

    /// Inheritable page attribute, looked up through the page tree
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> DocumentResult<Option<&Object>> {
        let mut current = Some(page_id);
        let mut depth = 0;
        while let Some(id) = current {
            if depth > MAX_TREE_DEPTH {
                return Err(DocumentError::DecodeFailure(format!(
                    "page tree above {:?} is too deep",
                    page_id
                )));
            }
            depth += 1;

            let dict = self.doc.get_object(id).and_then(Object::as_dict)?;
            if let Ok(value) = dict.get(key) {
                let resolved = match value {
                    Object::Reference(target) => self.doc.get_object(*target)?,
                    other => other,
                };
                return Ok(Some(resolved));
            }
            current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        }
        Ok(None)
    }

    /// Visible area of a page: CropBox clipped to MediaBox, plus `/Rotate`
    pub(crate) fn page_frame(&self, page_id: ObjectId) -> DocumentResult<PageFrame> {
        let media_box = match self.inherited(page_id, b"MediaBox")?.and_then(read_box) {
            Some(media_box) => media_box,
            None => {
                tracing::warn!(?page_id, "Page tree has no MediaBox, assuming US Letter");
                FALLBACK_MEDIA_BOX
            }
        };

        let bbox = self
            .inherited(page_id, b"CropBox")?
            .and_then(read_box)
            .and_then(|crop_box| intersect(crop_box, media_box))
            .unwrap_or(media_box);

        let rotate = self
            .inherited(page_id, b"Rotate")?
            .and_then(|value| value.as_float().ok())
            .map(normalize_rotation)
            .unwrap_or(0);

        Ok(PageFrame { bbox, rotate })
    }

    /// Embed a stamp as an image XObject, once per stamp index
    fn embed_image(&mut self, image: &StampImage) -> DocumentResult<ObjectId> {
        if let Some(id) = self.embedded.get(&image.index) {
            return Ok(*id);
        }

        let rgba = image::load_from_memory(&image.data)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(DocumentError::DecodeFailure(format!(
                "stamp {} has no pixels",
                image.index
            )));
        }

        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha = Vec::with_capacity((width * height) as usize);
        for pixel in rgba.pixels() {
            rgb.extend_from_slice(&pixel.0[..3]);
            alpha.push(pixel[3]);
        }

        let mut image_dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        };

        if alpha.iter().any(|a| *a < u8::MAX) {
            let smask_id = self.doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                },
                alpha,
            ));
            image_dict.set("SMask", smask_id);
        }

        let image_id = self.doc.add_object(Stream::new(image_dict, rgb));
        self.embedded.insert(image.index, image_id);
        Ok(image_id)
    }

    /// Page resources with inheritance resolved, as an owned copy
    fn effective_resources(&self, page_id: ObjectId) -> DocumentResult<Dictionary> {
        let mut current = Some(page_id);
        while let Some(id) = current {
            let dict = self.doc.get_object(id).and_then(Object::as_dict)?;
            match dict.get(b"Resources") {
                Ok(Object::Reference(res_id)) => {
                    return Ok(self.doc.get_object(*res_id).and_then(Object::as_dict)?.clone());
                }
                Ok(Object::Dictionary(res)) => return Ok(res.clone()),
                _ => {}
            }
            current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        }
        Ok(Dictionary::new())
    }

    /// Register the XObject under a page-local name and return the name
    ///
    /// The page gets its own copy of its (possibly shared or inherited)
    /// resource dictionary, so other pages never see the new entry.
    fn register_xobject(
        &mut self,
        page_id: ObjectId,
        stamp_index: u32,
        xobject_id: ObjectId,
    ) -> DocumentResult<String> {
        let mut resources = self.effective_resources(page_id)?;
        let mut xobjects = match resources.get(b"XObject") {
            Ok(Object::Reference(id)) => self.doc.get_object(*id).and_then(Object::as_dict)?.clone(),
            Ok(Object::Dictionary(dict)) => dict.clone(),
            _ => Dictionary::new(),
        };

        let base = format!("Stamp{}", stamp_index);
        let mut name = base.clone();
        let mut suffix = 1;
        loop {
            match xobjects.get(name.as_bytes()) {
                Ok(Object::Reference(id)) if *id == xobject_id => return Ok(name),
                Ok(_) => {
                    name = format!("{}_{}", base, suffix);
                    suffix += 1;
                }
                Err(_) => break,
            }
        }

        xobjects.set(name.as_bytes().to_vec(), Object::Reference(xobject_id));
        resources.set("XObject", Object::Dictionary(xobjects));

        let page = self.doc.get_object_mut(page_id).and_then(Object::as_dict_mut)?;
        page.set("Resources", Object::Dictionary(resources));
        Ok(name)
    }

    /// Content stream references of a page, in drawing order
    fn page_contents(&self, page_id: ObjectId) -> DocumentResult<Vec<Object>> {
        let page = self.doc.get_object(page_id).and_then(Object::as_dict)?;
        let contents = match page.get(b"Contents") {
            Ok(Object::Reference(id)) => match self.doc.get_object(*id)? {
                Object::Array(items) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        Ok(contents)
    }

    fn set_page_contents(&mut self, page_id: ObjectId, contents: Vec<Object>) -> DocumentResult<()> {
        let page = self.doc.get_object_mut(page_id).and_then(Object::as_dict_mut)?;
        page.set("Contents", Object::Array(contents));
        Ok(())
    }

    fn wrap_original_content(&mut self, page_id: ObjectId) -> DocumentResult<()> {
        if !self.wrapped.insert(page_id) {
            return Ok(());
        }

        let existing = self.page_contents(page_id)?;
        if existing.is_empty() {
            return Ok(());
        }

        let push_id = self.doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
        let pop_id = self.doc.add_object(Stream::new(dictionary! {}, b"\nQ\n".to_vec()));

        let mut contents = Vec::with_capacity(existing.len() + 2);
        contents.push(Object::Reference(push_id));
        contents.extend(existing);
        contents.push(Object::Reference(pop_id));
        self.set_page_contents(page_id, contents)
    }

    fn append_content(&mut self, page_id: ObjectId, content: Vec<u8>) -> DocumentResult<()> {
        let stream_id = self.doc.add_object(Stream::new(dictionary! {}, content));
        let mut contents = self.page_contents(page_id)?;
        contents.push(Object::Reference(stream_id));
        self.set_page_contents(page_id, contents)
    }

    fn draw_image_inner(
        &mut self,
        page_id: ObjectId,
        rect: &Rect,
        rotation: f32,
        image: &StampImage,
    ) -> DocumentResult<()> {
        let values = [rect.x, rect.y, rect.width, rect.height, rotation];
        if values.iter().any(|v| !v.is_finite()) || rect.width <= 0.0 || rect.height <= 0.0 {
            return Err(DocumentError::DrawFailure(format!(
                "degenerate destination rectangle {:?}",
                rect
            )));
        }

        let xobject_id = self.embed_image(image)?;
        let frame = self.page_frame(page_id)?;
        let name = self.register_xobject(page_id, image.index, xobject_id)?;

        let matrix = placement_matrix(rect, rotation, &frame);
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new("cm", matrix.iter().map(|v| Object::Real(*v)).collect()),
                Operation::new("Do", vec![Object::Name(name.into_bytes())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content.encode()?;

        self.wrap_original_content(page_id)?;
        self.append_content(page_id, encoded)
    }
}

impl EditableDocument for PdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, page_index: usize) -> DocumentResult<PageSize> {
        let page_id = self.page_id(page_index)?;
        Ok(self.page_frame(page_id)?.size())
    }

    fn draw_image(
        &mut self,
        page_index: usize,
        rect: &Rect,
        rotation: f32,
        image: &StampImage,
    ) -> DocumentResult<()> {
        let page_id = self.page_id(page_index)?;
        self.draw_image_inner(page_id, rect, rotation, image)
            .map_err(|e| match e {
                DocumentError::DrawFailure(_) => e,
                other => DocumentError::DrawFailure(format!(
                    "stamp {} on page {}: {}",
                    image.index,
                    page_index + 1,
                    other
                )),
            })
    }

    fn save(&mut self) -> DocumentResult<Vec<u8>> {
        self.doc.compress();
        let mut output = Vec::new();
        self.doc
            .save_to(&mut output)
            .map_err(|e| DocumentError::Storage(format!("Failed to serialise PDF: {}", e)))?;
        Ok(output)
    }
}

fn read_box(value: &Object) -> Option<[f32; 4]> {
    let arr = value.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let mut values = [0.0f32; 4];
    for (slot, obj) in values.iter_mut().zip(arr) {
        *slot = obj.as_float().ok()?;
    }
    Some([
        values[0].min(values[2]),
        values[1].min(values[3]),
        values[0].max(values[2]),
        values[1].max(values[3]),
    ])
}

/// Overlap of two boxes, `None` when it is empty
fn intersect(a: [f32; 4], b: [f32; 4]) -> Option<[f32; 4]> {
    let clipped = [a[0].max(b[0]), a[1].max(b[1]), a[2].min(b[2]), a[3].min(b[3])];
    (clipped[2] > clipped[0] && clipped[3] > clipped[1]).then_some(clipped)
}

/// Snap `/Rotate` to a quarter turn in `0..360`
fn normalize_rotation(degrees: f32) -> u16 {
    let quarters = (degrees / 90.0).round() as i64;
    (quarters.rem_euclid(4) * 90) as u16
}

/// `m` followed by `n`, in PDF `[a b c d e f]` order
fn concat(m: [f32; 6], n: [f32; 6]) -> [f32; 6] {
    [
        m[0] * n[0] + m[1] * n[2],
        m[0] * n[1] + m[1] * n[3],
        m[2] * n[0] + m[3] * n[2],
        m[2] * n[1] + m[3] * n[3],
        m[4] * n[0] + m[5] * n[2] + n[4],
        m[4] * n[1] + m[5] * n[3] + n[5],
    ]
}

/// `cm` operands mapping the image unit square onto `rect`
///
/// `rect` is in top-left-origin points on the page as displayed. The
/// image is turned `rotation` degrees clockwise (as seen on screen) about
/// the rectangle centre, then carried into user space through the page
/// frame, so crop offsets and `/Rotate` land it where the preview shows.
pub(crate) fn placement_matrix(rect: &Rect, rotation: f32, frame: &PageFrame) -> [f32; 6] {
    let (center_x, center_y) = rect.center();

    // Display space is y-down and the image's own y axis points up
    let (sin, cos) = rotation.to_radians().sin_cos();
    let a = rect.width * cos;
    let b = rect.width * sin;
    let c = rect.height * sin;
    let d = -rect.height * cos;
    let e = center_x - 0.5 * (a + c);
    let f = center_y - 0.5 * (b + d);

    concat([a, b, c, d, e, f], frame.display_to_user())
}
