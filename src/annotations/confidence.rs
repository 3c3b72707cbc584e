use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Lower bound (inclusive) of placeholder confidences.
pub const MIN_CONFIDENCE: f64 = 0.85;
/// Upper bound (exclusive) of placeholder confidences.
pub const MAX_CONFIDENCE: f64 = 0.99;

/// Supplies the confidence attached to each extracted detection.
///
/// Annotation exports carry no model score, so this is a placeholder.
/// Implementations must stay within `[MIN_CONFIDENCE, MAX_CONFIDENCE)`.
pub trait ConfidenceSource {
    fn next_confidence(&mut self) -> f64;
}

/// Uniform placeholder confidences.
pub struct RandomConfidence {
    rng: StdRng,
}

impl RandomConfidence {
    /// Seeded generator: identical seeds give identical sequences.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }
}

impl ConfidenceSource for RandomConfidence {
    fn next_confidence(&mut self) -> f64 {
        self.rng.gen_range(MIN_CONFIDENCE..MAX_CONFIDENCE)
    }
}
