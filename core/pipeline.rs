/*!
This module runs the whole pipeline in one call: generate a dataset, split it, produce a classifier of the requested kind, and evaluate it on the validation split.
*/

use crate::{
	classifier::{Classifier, ClassifierKind, HeuristicClassifier, TrainableClassifier},
	evaluate::{evaluate, EvaluationReport},
	train::{train, TrainOptions, TrainingProgressEvent},
};
use log::info;
use snowcast_dataset::{generate, Label};
use snowcast_util::{cancellation::CancellationToken, error::Result};

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineOptions {
	pub dataset_size: usize,
	pub dataset_seed: u64,
	pub validation_fraction: f32,
	pub kind: ClassifierKind,
	pub train: TrainOptions,
}

impl Default for PipelineOptions {
	fn default() -> PipelineOptions {
		PipelineOptions {
			dataset_size: 2500,
			dataset_seed: 1,
			validation_fraction: 0.2,
			kind: ClassifierKind::Trainable,
			train: TrainOptions::default(),
		}
	}
}

#[derive(Debug)]
pub struct PipelineOutput {
	pub classifier: Classifier,
	pub report: EvaluationReport,
	/// The events of every completed epoch. Empty for the heuristic classifier.
	pub events: Vec<TrainingProgressEvent>,
}

pub fn run(
	options: &PipelineOptions,
	on_progress: &mut dyn FnMut(&TrainingProgressEvent),
	cancellation: CancellationToken,
) -> Result<PipelineOutput> {
	let dataset = generate(options.dataset_size, options.dataset_seed);
	let class_counts = dataset.class_counts();
	info!(
		"generated {} samples with seed {}: {}",
		dataset.len(),
		options.dataset_seed,
		Label::ALL
			.iter()
			.map(|label| format!("{} {}", label, class_counts[label.index()]))
			.collect::<Vec<_>>()
			.join(", ")
	);
	let (train_dataset, validation_dataset) = dataset.split(options.validation_fraction)?;
	let mut events = Vec::new();
	let classifier = match options.kind {
		ClassifierKind::Heuristic => Classifier::Heuristic(HeuristicClassifier),
		ClassifierKind::Trainable => {
			let classifier = train(
				TrainableClassifier::default(),
				&train_dataset,
				&validation_dataset,
				options.train,
				&mut |event| {
					events.push(*event);
					on_progress(event);
				},
				cancellation,
			)?;
			Classifier::Trainable(classifier)
		}
	};
	let report = evaluate(&classifier, &validation_dataset)?;
	Ok(PipelineOutput {
		classifier,
		report,
		events,
	})
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_run_short_training() {
		let options = PipelineOptions {
			dataset_size: 500,
			train: TrainOptions {
				epochs: 2,
				..TrainOptions::default()
			},
			..PipelineOptions::default()
		};
		let mut n_events = 0;
		let output = run(&options, &mut |_| n_events += 1, CancellationToken::new()).unwrap();
		assert_eq!(n_events, 2);
		assert_eq!(output.events.len(), 2);
		assert_eq!(output.classifier.kind(), ClassifierKind::Trainable);
		assert_eq!(output.report.n_examples, 100);
	}

	#[test]
	fn test_run_rejects_invalid_split() {
		let options = PipelineOptions {
			validation_fraction: 1.5,
			kind: ClassifierKind::Heuristic,
			..PipelineOptions::default()
		};
		assert!(run(&options, &mut |_| {}, CancellationToken::new()).is_err());
	}
}
