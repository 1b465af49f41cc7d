use crate::classifier::Classify;
use log::info;
use snowcast_dataset::{Dataset, Label, N_CLASSES};
use snowcast_metrics::{ClassificationMetrics, ClassificationMetricsInput, StreamingMetric};
use snowcast_util::{
	error::{Error, Operation, Result},
	table::Table,
};

/// The scores of one label, treating it as the positive class.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct ClassReport {
	pub label: Label,
	pub true_positives: u64,
	pub false_positives: u64,
	pub false_negatives: u64,
	pub precision: f32,
	pub recall: f32,
	pub f1_score: f32,
}

/**
An `EvaluationReport` scores a classifier on a labeled dataset.

`confusion_matrix[true][predicted]` counts the samples with label `true` that were predicted as `predicted`, so the entries sum to the number of samples and the trace is the number of correct predictions.

Precision, recall, and F1 report 0 when their denominator is 0. A label that is never predicted therefore has a precision of 0, not an undefined precision.
*/
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct EvaluationReport {
	pub n_examples: u64,
	pub confusion_matrix: [[u64; N_CLASSES]; N_CLASSES],
	pub class_metrics: [ClassReport; N_CLASSES],
	pub accuracy: f32,
	pub precision_unweighted: f32,
	pub precision_weighted: f32,
	pub recall_unweighted: f32,
	pub recall_weighted: f32,
	/// The accuracy of always predicting the most common label.
	pub baseline_accuracy: f32,
}

/// Predict every sample in `dataset` with `classifier` and score the predictions.
pub fn evaluate<C>(classifier: &C, dataset: &Dataset) -> Result<EvaluationReport>
where
	C: Classify + ?Sized,
{
	if dataset.is_empty() {
		return Err(Error::precondition(
			Operation::Evaluate,
			"cannot evaluate on an empty dataset",
		));
	}
	let mut metrics = ClassificationMetrics::new(N_CLASSES);
	for sample in dataset.iter() {
		let prediction = classifier.predict(&sample.features)?;
		metrics.update(ClassificationMetricsInput {
			label: sample.label.index(),
			prediction: prediction.index(),
		});
	}
	let output = metrics.finalize().ok_or_else(|| {
		Error::precondition(Operation::Evaluate, "no samples were evaluated")
	})?;
	let mut confusion_matrix = [[0; N_CLASSES]; N_CLASSES];
	for ((label, prediction), count) in output.confusion_matrix.indexed_iter() {
		confusion_matrix[label][prediction] = *count;
	}
	let class_report = |label: Label| {
		let metrics = &output.class_metrics[label.index()];
		ClassReport {
			label,
			true_positives: metrics.true_positives,
			false_positives: metrics.false_positives,
			false_negatives: metrics.false_negatives,
			precision: metrics.precision,
			recall: metrics.recall,
			f1_score: metrics.f1_score,
		}
	};
	let report = EvaluationReport {
		n_examples: dataset.len() as u64,
		confusion_matrix,
		class_metrics: [
			class_report(Label::NoSnow),
			class_report(Label::LightSnow),
			class_report(Label::HeavySnow),
		],
		accuracy: output.accuracy,
		precision_unweighted: output.precision_unweighted,
		precision_weighted: output.precision_weighted,
		recall_unweighted: output.recall_unweighted,
		recall_weighted: output.recall_weighted,
		baseline_accuracy: output.baseline_accuracy,
	};
	info!(
		"evaluated {} samples: accuracy {:.4}, baseline accuracy {:.4}",
		report.n_examples, report.accuracy, report.baseline_accuracy
	);
	Ok(report)
}

impl std::fmt::Display for EvaluationReport {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut header = vec!["".to_owned()];
		header.extend(
			Label::ALL
				.iter()
				.map(|label| format!("Predicted {}", label)),
		);
		let rows = Label::ALL
			.iter()
			.map(|label| {
				let mut row = vec![format!("Actual {}", label)];
				row.extend(
					self.confusion_matrix[label.index()]
						.iter()
						.map(|count| count.to_string()),
				);
				row
			})
			.collect();
		writeln!(f, "{}", Table::new(header, rows))?;
		let header = ["Class", "Precision", "Recall", "F1 Score"]
			.iter()
			.map(|value| value.to_string())
			.collect();
		let rows = self
			.class_metrics
			.iter()
			.map(|class| {
				vec![
					class.label.to_string(),
					format!("{:.4}", class.precision),
					format!("{:.4}", class.recall),
					format!("{:.4}", class.f1_score),
				]
			})
			.collect();
		writeln!(f, "{}", Table::new(header, rows))?;
		writeln!(f, "Accuracy: {:.4}", self.accuracy)?;
		writeln!(f, "Baseline Accuracy: {:.4}", self.baseline_accuracy)?;
		writeln!(
			f,
			"Precision: {:.4} (macro) {:.4} (weighted)",
			self.precision_unweighted, self.precision_weighted
		)?;
		write!(
			f,
			"Recall: {:.4} (macro) {:.4} (weighted)",
			self.recall_unweighted, self.recall_weighted
		)
	}
}
