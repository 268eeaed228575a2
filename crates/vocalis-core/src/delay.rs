//! Fixed-length delay line.

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

/// Integer-length ring buffer delay.
///
/// [`read`](Self::read) returns the sample written `len` writes ago. The
/// buffer is allocated once at construction.
///
/// # Example
///
/// ```rust
/// use vocalis_core::DelayLine;
///
/// let mut delay = DelayLine::new(3);
/// assert_eq!(delay.process(1.0), 0.0);
/// assert_eq!(delay.process(0.0), 0.0);
/// assert_eq!(delay.process(0.0), 0.0);
/// assert_eq!(delay.process(0.0), 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    index: usize,
}

impl DelayLine {
    /// Delay of `len` samples (at least one).
    pub fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(1)],
            index: 0,
        }
    }

    /// Delay length in samples.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Always false; a delay line holds at least one sample.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Oldest sample.
    #[inline]
    pub fn read(&self) -> f32 {
        self.buffer[self.index]
    }

    /// Overwrite the oldest sample and advance.
    #[inline]
    pub fn write(&mut self, value: f32) {
        self.buffer[self.index] = value;
        self.index += 1;
        if self.index == self.buffer.len() {
            self.index = 0;
        }
    }

    /// Read then write.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let out = self.read();
        self.write(input);
        out
    }

    /// Zero the buffer.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_by_length() {
        let mut delay = DelayLine::new(100);
        assert_eq!(delay.len(), 100);
        delay.process(0.7);
        for _ in 0..99 {
            assert_eq!(delay.process(0.0), 0.0);
        }
        assert_eq!(delay.process(0.0), 0.7);
    }

    #[test]
    fn zero_length_becomes_one() {
        let mut delay = DelayLine::new(0);
        assert_eq!(delay.len(), 1);
        delay.process(0.5);
        assert_eq!(delay.process(0.0), 0.5);
    }

    #[test]
    fn clear_silences() {
        let mut delay = DelayLine::new(8);
        for _ in 0..8 {
            delay.process(1.0);
        }
        delay.clear();
        assert_eq!(delay.read(), 0.0);
    }
}
