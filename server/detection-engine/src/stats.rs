//! Closed-form running statistics: mean and population variance.

/// Arithmetic mean; 0 for an empty slice.
pub fn mean<'a, I>(values: I) -> f64
where
  I: IntoIterator<Item = &'a f64>,
{
  let (sum, count) = values
    .into_iter()
    .fold((0.0_f64, 0usize), |(sum, count), v| (sum + v, count + 1));
  if count == 0 {
    0.0
  } else {
    sum / count as f64
  }
}

/// Population variance (mean of squared deviations from the mean).
///
/// Empty and single-sample inputs have zero variance.
pub fn variance<'a, I>(values: I) -> f64
where
  I: IntoIterator<Item = &'a f64> + Clone,
{
  let m = mean(values.clone());
  let (sum_sq, count) = values
    .into_iter()
    .fold((0.0_f64, 0usize), |(acc, count), v| (acc + (v - m).powi(2), count + 1));
  if count < 2 {
    0.0
  } else {
    sum_sq / count as f64
  }
}

/// Welford accumulator: mean and population variance over an unbounded
/// stream in O(1) memory.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStats {
  count: u64,
  mean: f64,
  m2: f64,
}

impl RunningStats {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, value: f64) {
    self.count += 1;
    let delta = value - self.mean;
    self.mean += delta / self.count as f64;
    self.m2 += delta * (value - self.mean);
  }

  pub fn count(&self) -> u64 {
    self.count
  }

  pub fn mean(&self) -> f64 {
    self.mean
  }

  pub fn variance(&self) -> f64 {
    if self.count < 2 {
      0.0
    } else {
      // Rounding can push m2 a hair below zero for constant input.
      (self.m2 / self.count as f64).max(0.0)
    }
  }

  pub fn reset(&mut self) {
    *self = Self::default();
  }
}
