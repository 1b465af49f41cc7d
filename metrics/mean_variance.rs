//! https://en.wikipedia.org/wiki/Algorithms_for_calculating_variance#Parallel_algorithm

use super::StreamingMetric;
use num_traits::ToPrimitive;

/// `MeanVariance` computes the mean and the population variance (divisor `n`) of a stream of values.
#[derive(Debug, Default, Clone)]
pub struct MeanVariance {
	n: u64,
	mean: f64,
	m2: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanVarianceOutput {
	pub n: u64,
	pub mean: f32,
	pub variance: f32,
}

impl MeanVariance {
	/// Compute the mean and variance of `values` in one call.
	pub fn compute(values: &[f32]) -> Option<MeanVarianceOutput> {
		let mut metric = MeanVariance::default();
		for value in values {
			metric.update(*value);
		}
		metric.finalize()
	}
}

impl StreamingMetric<'_> for MeanVariance {
	type Input = f32;
	type Output = Option<MeanVarianceOutput>;

	fn update(&mut self, value: f32) {
		let (mean, m2) = merge_mean_m2(self.n, self.mean, self.m2, 1, value.to_f64().unwrap(), 0.0);
		self.n += 1;
		self.mean = mean;
		self.m2 = m2;
	}

	fn merge(&mut self, other: Self) {
		if other.n == 0 {
			return;
		}
		let (mean, m2) = merge_mean_m2(self.n, self.mean, self.m2, other.n, other.mean, other.m2);
		self.n += other.n;
		self.mean = mean;
		self.m2 = m2;
	}

	fn finalize(self) -> Option<MeanVarianceOutput> {
		if self.n == 0 {
			return None;
		}
		Some(MeanVarianceOutput {
			n: self.n,
			mean: self.mean.to_f32().unwrap(),
			variance: (self.m2 / self.n.to_f64().unwrap()).to_f32().unwrap(),
		})
	}
}

/// Combine two separately computed means and sums of squared deviations into a single mean and sum of squared deviations.
pub fn merge_mean_m2(
	n_a: u64,
	mean_a: f64,
	m2_a: f64,
	n_b: u64,
	mean_b: f64,
	m2_b: f64,
) -> (f64, f64) {
	let n_a = n_a.to_f64().unwrap();
	let n_b = n_b.to_f64().unwrap();
	(
		(((n_a * mean_a) + (n_b * mean_b)) / (n_a + n_b)),
		m2_a + m2_b + (mean_b - mean_a) * (mean_b - mean_a) * (n_a * n_b / (n_a + n_b)),
	)
}

#[test]
fn test_mean_variance() {
	let output = MeanVariance::compute(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
	assert_eq!(output.n, 8);
	assert!((output.mean - 5.0).abs() < 1e-6);
	assert!((output.variance - 4.0).abs() < 1e-6);
	assert_eq!(MeanVariance::compute(&[]), None);
}

#[test]
fn test_mean_variance_merge() {
	let values = [0.5f32, -1.25, 3.0, 8.5, 2.0, -7.0];
	let mut a = MeanVariance::default();
	let mut b = MeanVariance::default();
	for value in &values[..2] {
		a.update(*value);
	}
	for value in &values[2..] {
		b.update(*value);
	}
	a.merge(b);
	let merged = a.finalize().unwrap();
	let direct = MeanVariance::compute(&values).unwrap();
	assert!((merged.mean - direct.mean).abs() < 1e-5);
	assert!((merged.variance - direct.variance).abs() < 1e-4);
}
