use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{InversionError, Result};

/// Measurement dimensions sampled for robust model fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Chest,
    Waist,
    Hip,
    Inseam,
    Fitness,
}

impl Dimension {
    /// Every unordered pair, in sampling order.
    pub const PAIRS: [(Dimension, Dimension); 10] = [
        (Dimension::Chest, Dimension::Waist),
        (Dimension::Chest, Dimension::Hip),
        (Dimension::Chest, Dimension::Inseam),
        (Dimension::Chest, Dimension::Fitness),
        (Dimension::Waist, Dimension::Hip),
        (Dimension::Waist, Dimension::Inseam),
        (Dimension::Waist, Dimension::Fitness),
        (Dimension::Hip, Dimension::Inseam),
        (Dimension::Hip, Dimension::Fitness),
        (Dimension::Inseam, Dimension::Fitness),
    ];
}

/// Per-scan measurement series, all the same length.
#[derive(Debug, Clone, Copy)]
pub struct RansacInputs<'a> {
    pub chests: &'a [f32],
    pub waists: &'a [f32],
    pub hips: &'a [f32],
    pub inseams: &'a [f32],
    pub fits: &'a [f32],
}

impl RansacInputs<'_> {
    fn series(&self, d: Dimension) -> &[f32] {
        match d {
            Dimension::Chest => self.chests,
            Dimension::Waist => self.waists,
            Dimension::Hip => self.hips,
            Dimension::Inseam => self.inseams,
            Dimension::Fitness => self.fits,
        }
    }

    fn validated_len(&self) -> Result<usize> {
        let len = self.chests.len();
        let all = [self.chests, self.waists, self.hips, self.inseams, self.fits];
        if all.iter().any(|s| s.len() != len) {
            return Err(InversionError::Input(
                "measurement series have different lengths".into(),
            ));
        }
        if len < 2 {
            return Err(InversionError::Input(format!(
                "need at least 2 measurements per series, got {len}"
            )));
        }
        Ok(len)
    }
}

/// Sampled point pairs plus, per sample, which dimensions it used.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RansacSamples {
    pub src: Vec<Vec2>,
    pub dst: Vec<Vec2>,
    pub chest: Vec<bool>,
    pub waist: Vec<bool>,
    pub hip: Vec<bool>,
    pub inseam: Vec<bool>,
    pub fitness: Vec<bool>,
}

impl RansacSamples {
    pub fn len(&self) -> usize {
        self.src.len()
    }

    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }

    fn push_mask(&mut self, a: Dimension, b: Dimension) {
        let used = |d| a == d || b == d;
        self.chest.push(used(Dimension::Chest));
        self.waist.push(used(Dimension::Waist));
        self.hip.push(used(Dimension::Hip));
        self.inseam.push(used(Dimension::Inseam));
        self.fitness.push(used(Dimension::Fitness));
    }
}

/// Random cross-pairing of measurement series.
///
/// Each point pairs one dimension's value from one scan with another
/// dimension's value from a different scan.
#[derive(Debug, Clone)]
pub struct RansacSampler {
    rng: StdRng,
}

impl RansacSampler {
    /// Seeded samplers are reproducible; `None` seeds from entropy.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    fn distinct_pair(&mut self, len: usize) -> (usize, usize) {
        let i1 = self.rng.gen_range(0..len);
        loop {
            let i2 = self.rng.gen_range(0..len);
            if i2 != i1 {
                return (i1, i2);
            }
        }
    }

    fn draw(&mut self, a: &[f32], b: &[f32]) -> Vec2 {
        let (i1, i2) = self.distinct_pair(a.len());
        Vec2::new(a[i1], b[i2])
    }

    /// Draw `resample_ntimes` rounds of one source and one destination point
    /// for every dimension pair.
    pub fn gen_points(
        &mut self,
        inputs: &RansacInputs<'_>,
        resample_ntimes: usize,
    ) -> Result<RansacSamples> {
        inputs.validated_len()?;

        let n = resample_ntimes
            .checked_mul(Dimension::PAIRS.len())
            .ok_or_else(|| {
                InversionError::Input(format!("{resample_ntimes} resampling rounds is too many"))
            })?;
        let mut out = RansacSamples {
            src: Vec::with_capacity(n),
            dst: Vec::with_capacity(n),
            ..Default::default()
        };
        for _ in 0..resample_ntimes {
            for (a, b) in Dimension::PAIRS {
                let (sa, sb) = (inputs.series(a), inputs.series(b));
                let src = self.draw(sa, sb);
                let dst = self.draw(sa, sb);
                out.src.push(src);
                out.dst.push(dst);
                out.push_mask(a, b);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHESTS: [f32; 4] = [100.0, 101.0, 102.0, 103.0];
    const WAISTS: [f32; 4] = [80.0, 81.0, 82.0, 83.0];
    const HIPS: [f32; 4] = [95.0, 96.0, 97.0, 98.0];
    const INSEAMS: [f32; 4] = [76.0, 77.0, 78.0, 79.0];
    const FITS: [f32; 4] = [0.1, 0.2, 0.3, 0.4];

    fn inputs() -> RansacInputs<'static> {
        RansacInputs {
            chests: &CHESTS,
            waists: &WAISTS,
            hips: &HIPS,
            inseams: &INSEAMS,
            fits: &FITS,
        }
    }

    #[test]
    fn sample_counts_and_masks() {
        let mut s = RansacSampler::new(Some(7));
        let out = s.gen_points(&inputs(), 3).unwrap();
        assert_eq!(out.len(), 30);
        assert_eq!(out.dst.len(), 30);
        for mask in [&out.chest, &out.waist, &out.hip, &out.inseam, &out.fitness] {
            assert_eq!(mask.len(), 30);
            // Every dimension appears in 4 of the 10 pairs.
            assert_eq!(mask.iter().filter(|&&m| m).count(), 12);
        }
        for i in 0..30 {
            let used = [out.chest[i], out.waist[i], out.hip[i], out.inseam[i], out.fitness[i]];
            assert_eq!(used.iter().filter(|&&m| m).count(), 2);
        }
        // First pair is chest-waist.
        assert!(out.chest[0] && out.waist[0]);
        assert!(CHESTS.contains(&out.src[0].x));
        assert!(WAISTS.contains(&out.src[0].y));
    }

    #[test]
    fn points_pair_different_scans() {
        let mut s = RansacSampler::new(Some(1));
        let out = s.gen_points(&inputs(), 20).unwrap();
        // Chest-waist samples: scan index is value minus base, so they differ.
        let chest_waist = out.src.iter().step_by(10).chain(out.dst.iter().step_by(10));
        for p in chest_waist {
            assert_ne!(p.x - 100.0, p.y - 80.0);
        }
    }

    #[test]
    fn seeded_sampler_is_reproducible() {
        let a = RansacSampler::new(Some(42)).gen_points(&inputs(), 5).unwrap();
        let b = RansacSampler::new(Some(42)).gen_points(&inputs(), 5).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_rounds_is_empty() {
        let out = RansacSampler::new(None).gen_points(&inputs(), 0).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn overflowing_round_count_is_rejected() {
        let err = RansacSampler::new(Some(3))
            .gen_points(&inputs(), usize::MAX)
            .unwrap_err();
        assert!(matches!(err, InversionError::Input(_)));
    }

    #[test]
    fn invalid_inputs() {
        let mut s = RansacSampler::new(Some(0));
        let short = RansacInputs {
            chests: &CHESTS[..1],
            waists: &WAISTS[..1],
            hips: &HIPS[..1],
            inseams: &INSEAMS[..1],
            fits: &FITS[..1],
        };
        assert!(s.gen_points(&short, 1).is_err());

        let ragged = RansacInputs {
            waists: &WAISTS[..3],
            ..inputs()
        };
        let err = s.gen_points(&ragged, 1).unwrap_err();
        assert!(matches!(err, InversionError::Input(_)));
    }
}
