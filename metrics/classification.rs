use super::StreamingMetric;
use ndarray::prelude::*;
use num_traits::ToPrimitive;

/**
`ClassificationMetrics` accumulates a confusion matrix and computes per-class precision, recall and F1 from it.

Ratios with a zero denominator use a denominator of 1 instead, so they come out as 0 rather than NaN:

- `precision = tp / (tp + fp)`, or 0 when the class was never predicted,
- `recall = tp / (tp + fn)`, or 0 when the class never occurs,
- `f1 = 2 * precision * recall / (precision + recall)`, or 0 when both are 0.

A class with no predictions therefore reports a precision of 0 even though the ratio is undefined.
*/
pub struct ClassificationMetrics {
	/// The shape of the confusion matrix is (n_classes x n_classes).
	confusion_matrix: Array2<u64>,
}

/// One example, with 0-indexed classes.
#[derive(Clone, Copy, Debug)]
pub struct ClassificationMetricsInput {
	pub label: usize,
	pub prediction: usize,
}

#[derive(Debug)]
pub struct ClassificationMetricsOutput {
	/// Indexed by `[label][prediction]`.
	pub confusion_matrix: Array2<u64>,
	pub class_metrics: Vec<ClassMetrics>,
	pub accuracy: f32,
	pub precision_unweighted: f32,
	pub precision_weighted: f32,
	pub recall_unweighted: f32,
	pub recall_weighted: f32,
	pub baseline_accuracy: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassMetrics {
	pub true_positives: u64,
	pub false_positives: u64,
	pub true_negatives: u64,
	pub false_negatives: u64,
	pub accuracy: f32,
	pub precision: f32,
	pub recall: f32,
	pub f1_score: f32,
}

impl ClassificationMetrics {
	pub fn new(n_classes: usize) -> Self {
		//                                              label     prediction
		//                                                |           |
		//                                                v           v
		let confusion_matrix = <Array2<u64>>::zeros((n_classes, n_classes));
		Self { confusion_matrix }
	}
}

fn ratio_or_zero(numerator: f32, denominator: f32) -> f32 {
	numerator / if denominator == 0.0 { 1.0 } else { denominator }
}

impl StreamingMetric<'_> for ClassificationMetrics {
	type Input = ClassificationMetricsInput;
	type Output = Option<ClassificationMetricsOutput>;

	fn update(&mut self, input: ClassificationMetricsInput) {
		self.confusion_matrix[(input.label, input.prediction)] += 1;
	}

	fn merge(&mut self, other: Self) {
		self.confusion_matrix += &other.confusion_matrix;
	}

	/// Returns `None` if no examples were added.
	fn finalize(self) -> Option<ClassificationMetricsOutput> {
		let n_classes = self.confusion_matrix.nrows();
		let n_examples = self.confusion_matrix.sum();
		if n_examples == 0 {
			return None;
		}
		let confusion_matrix = self.confusion_matrix;
		let class_metrics: Vec<_> = (0..n_classes)
			.map(|class_index| {
				let true_positives = confusion_matrix[(class_index, class_index)];
				let false_positives = confusion_matrix.column(class_index).sum() - true_positives;
				let false_negatives = confusion_matrix.row(class_index).sum() - true_positives;
				let true_negatives =
					n_examples - true_positives - false_positives - false_negatives;
				let accuracy = (true_positives + true_negatives).to_f32().unwrap()
					/ n_examples.to_f32().unwrap();
				let precision = ratio_or_zero(
					true_positives.to_f32().unwrap(),
					(true_positives + false_positives).to_f32().unwrap(),
				);
				let recall = ratio_or_zero(
					true_positives.to_f32().unwrap(),
					(true_positives + false_negatives).to_f32().unwrap(),
				);
				let f1_score = ratio_or_zero(2.0 * (precision * recall), precision + recall);
				ClassMetrics {
					true_positives,
					false_positives,
					true_negatives,
					false_negatives,
					accuracy,
					precision,
					recall,
					f1_score,
				}
			})
			.collect();
		let n_correct: u64 = confusion_matrix.diag().sum();
		let accuracy = n_correct.to_f32().unwrap() / n_examples.to_f32().unwrap();
		let precision_unweighted = class_metrics
			.iter()
			.map(|class| class.precision)
			.sum::<f32>()
			/ n_classes.to_f32().unwrap();
		let recall_unweighted = class_metrics.iter().map(|class| class.recall).sum::<f32>()
			/ n_classes.to_f32().unwrap();
		let n_examples_per_class = confusion_matrix.sum_axis(Axis(1));
		let precision_weighted = class_metrics
			.iter()
			.zip(n_examples_per_class.iter())
			.map(|(class, &n_examples_in_class)| {
				class.precision * n_examples_in_class.to_f32().unwrap()
			})
			.sum::<f32>()
			/ n_examples.to_f32().unwrap();
		let recall_weighted = class_metrics
			.iter()
			.zip(n_examples_per_class.iter())
			.map(|(class, &n_examples_in_class)| {
				class.recall * n_examples_in_class.to_f32().unwrap()
			})
			.sum::<f32>()
			/ n_examples.to_f32().unwrap();
		let baseline_accuracy = n_examples_per_class
			.iter()
			.copied()
			.max()
			.unwrap_or(0)
			.to_f32()
			.unwrap()
			/ n_examples.to_f32().unwrap();
		Some(ClassificationMetricsOutput {
			confusion_matrix,
			class_metrics,
			accuracy,
			precision_unweighted,
			precision_weighted,
			recall_unweighted,
			recall_weighted,
			baseline_accuracy,
		})
	}
}

#[cfg(test)]
fn update_all(metrics: &mut ClassificationMetrics, labels: &[usize], predictions: &[usize]) {
	for (label, prediction) in labels.iter().zip(predictions.iter()) {
		metrics.update(ClassificationMetricsInput {
			label: *label,
			prediction: *prediction,
		});
	}
}

#[test]
fn test_multiclass() {
	// example taken from https://en.wikipedia.org/wiki/Confusion_matrix
	let mut metrics = ClassificationMetrics::new(3);
	let labels = [
		0, 0, 0, 0, 0, 1, 1, 0, 0, 0, 1, 1, 1, 2, 2, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
	];
	let predictions = [
		0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
	];
	update_all(&mut metrics, &labels, &predictions);
	let metrics = metrics.finalize().unwrap();
	assert_eq!(
		metrics.confusion_matrix,
		arr2(&[[5, 3, 0], [2, 3, 1], [0, 2, 11]])
	);
	assert_eq!(metrics.accuracy, 19.0 / 27.0);
	insta::assert_debug_snapshot!(metrics.class_metrics, @r###"
	[
	    ClassMetrics {
	        true_positives: 5,
	        false_positives: 2,
	        true_negatives: 17,
	        false_negatives: 3,
	        accuracy: 0.8148148,
	        precision: 0.71428573,
	        recall: 0.625,
	        f1_score: 0.6666667,
	    },
	    ClassMetrics {
	        true_positives: 3,
	        false_positives: 5,
	        true_negatives: 16,
	        false_negatives: 3,
	        accuracy: 0.7037037,
	        precision: 0.375,
	        recall: 0.5,
	        f1_score: 0.42857143,
	    },
	    ClassMetrics {
	        true_positives: 11,
	        false_positives: 1,
	        true_negatives: 13,
	        false_negatives: 2,
	        accuracy: 0.8888889,
	        precision: 0.9166667,
	        recall: 0.84615386,
	        f1_score: 0.88,
	    },
	]
	"###);
}

#[test]
fn test_zero_denominators_report_zero() {
	// Class 2 never occurs and is never predicted. Class 1 occurs but is never predicted.
	let mut metrics = ClassificationMetrics::new(3);
	update_all(&mut metrics, &[0, 0, 1, 1], &[0, 0, 0, 0]);
	let metrics = metrics.finalize().unwrap();
	let light = &metrics.class_metrics[1];
	assert_eq!(light.true_positives, 0);
	assert_eq!(light.false_negatives, 2);
	assert_eq!(light.precision, 0.0);
	assert_eq!(light.recall, 0.0);
	assert_eq!(light.f1_score, 0.0);
	let heavy = &metrics.class_metrics[2];
	assert_eq!(heavy.precision, 0.0);
	assert_eq!(heavy.recall, 0.0);
	assert_eq!(heavy.f1_score, 0.0);
	let none = &metrics.class_metrics[0];
	assert_eq!(none.precision, 0.5);
	assert_eq!(none.recall, 1.0);
	assert_eq!(metrics.accuracy, 0.5);
	assert_eq!(metrics.baseline_accuracy, 0.5);
}

#[test]
fn test_merge_and_empty() {
	assert!(ClassificationMetrics::new(3).finalize().is_none());
	let mut a = ClassificationMetrics::new(3);
	let mut b = ClassificationMetrics::new(3);
	update_all(&mut a, &[0, 1], &[0, 2]);
	update_all(&mut b, &[2, 2], &[2, 2]);
	a.merge(b);
	let metrics = a.finalize().unwrap();
	assert_eq!(metrics.confusion_matrix.sum(), 4);
	assert_eq!(metrics.accuracy, 0.75);
}
