//! Random placement variation

use rand::Rng;

/// Bounds for the uniform perturbation applied to jittered placements
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JitterPolicy {
    /// Maximum x/y offset, in points
    pub max_offset: f32,
    /// Maximum rotation offset, in degrees
    pub max_rotation: f32,
}

impl Default for JitterPolicy {
    fn default() -> Self {
        Self {
            max_offset: 5.0,
            max_rotation: 3.0,
        }
    }
}

/// One sampled perturbation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Jitter {
    pub dx: f32,
    pub dy: f32,
    pub rotation: f32,
}

impl JitterPolicy {
    /// Draw `dx`, `dy` and `rotation` independently from `U(-max, max)`
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Jitter {
        let offset = self.max_offset.abs();
        let rotation = self.max_rotation.abs();
        Jitter {
            dx: rng.gen_range(-offset..=offset),
            dy: rng.gen_range(-offset..=offset),
            rotation: rng.gen_range(-rotation..=rotation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_samples_stay_in_bounds() {
        let policy = JitterPolicy::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10_000 {
            let jitter = policy.sample(&mut rng);
            assert!(jitter.dx.abs() <= 5.0);
            assert!(jitter.dy.abs() <= 5.0);
            assert!(jitter.rotation.abs() <= 3.0);
        }
    }

    #[test]
    fn test_seeded_samples_repeat() {
        let policy = JitterPolicy::default();
        let a = policy.sample(&mut StdRng::seed_from_u64(42));
        let b = policy.sample(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_policy_is_exact() {
        let policy = JitterPolicy { max_offset: 0.0, max_rotation: 0.0 };
        let jitter = policy.sample(&mut StdRng::seed_from_u64(1));
        assert_eq!(jitter, Jitter { dx: 0.0, dy: 0.0, rotation: 0.0 });
    }
}
