use super::{mean::Mean, StreamingMetric};
use ndarray::prelude::*;
use num_traits::clamp;

/// CrossEntropy is the loss function used to train multiclass classifiers. [Learn more](https://en.wikipedia.org/wiki/Cross_entropy#Cross-entropy_loss_function_and_logistic_regression).
#[derive(Clone, Default)]
pub struct CrossEntropy(Mean);

/// The input to [CrossEntropy](struct.CrossEntropy.html).
pub struct CrossEntropyInput<'a> {
	/// (n_classes)
	pub probabilities: ArrayView1<'a, f32>,
	/// 0-indexed
	pub label: usize,
}

impl<'a> StreamingMetric<'a> for CrossEntropy {
	type Input = CrossEntropyInput<'a>;
	type Output = Option<f32>;

	fn update(&mut self, value: CrossEntropyInput) {
		let probability = value.probabilities[value.label];
		// A NaN probability must surface as a NaN loss rather than be clamped away.
		let loss = if probability.is_nan() {
			std::f32::NAN
		} else {
			-clamp(probability, std::f32::EPSILON, 1.0 - std::f32::EPSILON).ln()
		};
		self.0.update(loss)
	}

	fn merge(&mut self, other: Self) {
		self.0.merge(other.0)
	}

	fn finalize(self) -> Self::Output {
		self.0.finalize()
	}
}

#[test]
fn test_cross_entropy() {
	let mut metric = CrossEntropy::default();
	let probabilities = arr2(&[[0.5, 0.25, 0.25], [0.0, 1.0, 0.0]]);
	metric.update(CrossEntropyInput {
		probabilities: probabilities.row(0),
		label: 0,
	});
	metric.update(CrossEntropyInput {
		probabilities: probabilities.row(1),
		label: 1,
	});
	let loss = metric.finalize().unwrap();
	let expected = (-(0.5f32.ln()) - (1.0 - std::f32::EPSILON).ln()) / 2.0;
	assert!((loss - expected).abs() < 1e-6);
}

#[test]
fn test_cross_entropy_nan_probability() {
	let mut metric = CrossEntropy::default();
	let probabilities = arr1(&[std::f32::NAN, 0.5, 0.5]);
	metric.update(CrossEntropyInput {
		probabilities: probabilities.view(),
		label: 0,
	});
	assert!(metric.finalize().unwrap().is_nan());
}
