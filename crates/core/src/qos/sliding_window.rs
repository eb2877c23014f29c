use std::ops::{Add, Sub};

/// A value that can be accumulated in a [`SlidingWindow`].
pub trait WindowSample: Copy + Default + Add<Output = Self> + Sub<Output = Self> {
    /// Whether add/subtract round-trips exactly. Inexact samples have their
    /// running sum recomputed once per window wrap.
    const EXACT: bool;

    fn to_f64(self) -> f64;
}

macro_rules! exact_sample {
    ($($ty:ty),+) => {
        $(impl WindowSample for $ty {
            const EXACT: bool = true;

            fn to_f64(self) -> f64 {
                self as f64
            }
        })+
    };
}

exact_sample!(u32, u64, usize, i32, i64);

impl WindowSample for f32 {
    const EXACT: bool = false;

    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

impl WindowSample for f64 {
    const EXACT: bool = false;

    fn to_f64(self) -> f64 {
        self
    }
}

/// Fixed-capacity circular buffer keeping the running sum of the last N
/// samples.
#[derive(Clone, Debug)]
pub struct SlidingWindow<T> {
    samples: Vec<T>,
    cursor: usize,
    sum: T,
}

impl<T: WindowSample> Default for SlidingWindow<T> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<T: WindowSample> SlidingWindow<T> {
    pub fn new(window_size: usize) -> Self {
        SlidingWindow {
            samples: vec![T::default(); window_size],
            cursor: 0,
            sum: T::default(),
        }
    }

    /// Overwrites the oldest sample.
    pub fn push(&mut self, sample: T) {
        let window_size = self.samples.len();
        if window_size == 0 {
            return;
        }
        let oldest = std::mem::replace(&mut self.samples[self.cursor], sample);
        self.sum = self.sum - oldest + sample;
        self.cursor += 1;
        if self.cursor == window_size {
            self.cursor = 0;
            if !T::EXACT {
                // Bound the rounding error accumulated by the incremental updates.
                self.sum = self
                    .samples
                    .iter()
                    .fold(T::default(), |acc, &value| acc + value);
            }
        }
    }

    pub fn sum(&self) -> T {
        self.sum
    }

    /// Sum divided by the window size, including not yet written buckets.
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.sum.to_f64() / self.samples.len() as f64
    }

    pub fn window_size(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Clears the window and changes its size.
    pub fn resize(&mut self, window_size: usize) {
        self.samples.clear();
        self.samples.resize(window_size, T::default());
        self.cursor = 0;
        self.sum = T::default();
    }

    /// Zeroes every sample, keeping the window size.
    pub fn clear(&mut self) {
        self.samples.fill(T::default());
        self.cursor = 0;
        self.sum = T::default();
    }
}
