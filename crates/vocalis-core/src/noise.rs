//! Deterministic white noise for unvoiced excitation.
//!
//! A 32-bit linear congruential generator (`seed * 1103515245 + 12345`).
//! Cheap, allocation-free and reproducible, which keeps method output
//! bit-identical across runs with the same seed.

/// Default seed.
pub const DEFAULT_NOISE_SEED: u32 = 12345;

/// LCG noise source with output in `[-1, 1)`.
///
/// # Example
///
/// ```rust
/// use vocalis_core::NoiseSource;
///
/// let mut a = NoiseSource::new(7);
/// let mut b = NoiseSource::new(7);
/// assert_eq!(a.next_sample(), b.next_sample());
/// ```
#[derive(Debug, Clone)]
pub struct NoiseSource {
    seed: u32,
    state: u32,
}

impl NoiseSource {
    /// Source starting from `seed`.
    pub fn new(seed: u32) -> Self {
        Self { seed, state: seed }
    }

    /// Next sample, uniform in `[-1, 1)`.
    ///
    /// One LCG step, `state = state * 1103515245 + 12345`, then the top
    /// 15 bits of the low word are scaled into range.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        self.state = self.state.wrapping_mul(1_103_515_245).wrapping_add(12345);
        ((self.state >> 16) & 0x7FFF) as f32 / 16384.0 - 1.0
    }

    /// Fill `output` with noise.
    pub fn fill(&mut self, output: &mut [f32]) {
        for sample in output.iter_mut() {
            *sample = self.next_sample();
        }
    }

    /// Rewind to the construction seed.
    pub fn reset(&mut self) {
        self.state = self.seed;
    }
}

impl Default for NoiseSource {
    fn default() -> Self {
        Self::new(DEFAULT_NOISE_SEED)
    }
}
