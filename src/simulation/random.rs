//! Randomness seam for the simulators.
//!
//! Every draw goes through [`RandomSource::unit`], so any `rand::Rng` works as a
//! source and tests can replay a fixed script instead.

use rand::Rng;

pub trait RandomSource {
    /// Uniform sample in `[0, 1)`
    fn unit(&mut self) -> f64;

    /// Uniform sample in `[low, high)`
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.unit()
    }

    /// True with the given probability
    fn chance(&mut self, probability: f64) -> bool {
        self.unit() < probability
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    fn pick(&mut self, len: usize) -> usize {
        let index = (self.unit() * len as f64) as usize;
        index.min(len.saturating_sub(1))
    }
}

impl<R: Rng + ?Sized> RandomSource for R {
    fn unit(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

/// Replays a fixed sequence of unit samples, wrapping around when exhausted
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    samples: Vec<f64>,
    cursor: usize,
}

impl ScriptedSource {
    pub fn new(samples: impl Into<Vec<f64>>) -> Self {
        Self {
            samples: samples.into(),
            cursor: 0,
        }
    }

    /// Every draw returns the same sample
    pub fn constant(sample: f64) -> Self {
        Self::new(vec![sample])
    }

    /// Number of samples drawn so far
    pub fn draws(&self) -> usize {
        self.cursor
    }
}

impl RandomSource for ScriptedSource {
    fn unit(&mut self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sample = self.samples[self.cursor % self.samples.len()];
        self.cursor += 1;
        sample.clamp(0.0, 1.0 - f64::EPSILON)
    }
}
