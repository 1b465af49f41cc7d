use super::StreamingMetric;
use num_traits::ToPrimitive;

/// The arithmetic mean of the `f32`s passed to `update()`. The sum is accumulated in `f64`.
#[derive(Debug, Default, Clone)]
pub struct Mean {
	n: u64,
	sum: f64,
}

impl StreamingMetric<'_> for Mean {
	type Input = f32;
	type Output = Option<f32>;

	fn update(&mut self, value: f32) {
		self.n += 1;
		self.sum += value.to_f64().unwrap();
	}

	fn merge(&mut self, other: Self) {
		self.n += other.n;
		self.sum += other.sum;
	}

	fn finalize(self) -> Option<f32> {
		if self.n == 0 {
			None
		} else {
			Some((self.sum / self.n.to_f64().unwrap()).to_f32().unwrap())
		}
	}
}

#[test]
fn test_mean() {
	let mut mean = Mean::default();
	assert_eq!(mean.clone().finalize(), None);
	mean.update(1.0);
	mean.update(2.0);
	let mut other = Mean::default();
	other.update(4.0);
	other.update(4.0);
	mean.merge(other);
	assert_eq!(mean.finalize(), Some(2.75));
}
