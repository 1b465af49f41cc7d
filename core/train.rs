/*!
This module implements the training engine. A [`Training`](struct.Training.html) is an iterator that runs one epoch per call to `next()` and yields a [`TrainingProgressEvent`](struct.TrainingProgressEvent.html) when the epoch completes. Cancellation is polled between epochs, so an epoch that has started always completes.
*/

use crate::classifier::{TrainableClassifier, TrainedState};
use itertools::izip;
use log::{debug, info};
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use rand::{seq::SliceRandom, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use snowcast_dataset::{Dataset, N_CLASSES, N_FEATURES};
use snowcast_features::NormalizationStats;
use snowcast_metrics::{Accuracy, CrossEntropy, CrossEntropyInput, StreamingMetric};
use snowcast_nn::{Adam, AdamOptions, Architecture, Network};
use snowcast_util::{
	cancellation::CancellationToken,
	error::{Error, Operation, Result},
	finite::Finite,
	progress_counter::ProgressCounter,
};

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrainOptions {
	pub epochs: usize,
	pub batch_size: usize,
	pub learning_rate: f32,
	/// Seeds weight initialization, shuffling, and dropout.
	pub seed: u64,
}

impl Default for TrainOptions {
	fn default() -> TrainOptions {
		TrainOptions {
			epochs: 25,
			batch_size: 32,
			learning_rate: 0.005,
			seed: 0,
		}
	}
}

/// The metrics of one completed epoch. `epoch` starts at 1. The training loss and accuracy aggregate the training-mode forward passes of the epoch, so they include the effect of dropout.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct TrainingProgressEvent {
	pub epoch: usize,
	pub train_loss: f32,
	pub validation_loss: f32,
	pub train_accuracy: f32,
	pub validation_accuracy: f32,
}

impl std::fmt::Display for TrainingProgressEvent {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"epoch {}: loss {:.4} accuracy {:.4} validation loss {:.4} validation accuracy {:.4}",
			self.epoch,
			self.train_loss,
			self.train_accuracy,
			self.validation_loss,
			self.validation_accuracy
		)
	}
}

/**
A `Training` owns everything one training run needs: the normalized splits, the network, the optimizer state, and the random number generator.

Each call to `next()` either yields the event of one more completed epoch, yields the error that ended the run, or returns `None`. It returns `None` when all epochs have run, when the cancellation token was set before the next epoch began, or after an error. Once it returns `None` it always does.

If an epoch produces a non-finite loss or non-finite weights, the epoch is discarded. The network keeps the weights of the last completed epoch and the error names that epoch.
*/
pub struct Training {
	architecture: Architecture,
	options: TrainOptions,
	stats: NormalizationStats,
	train_features: Array2<f32>,
	train_labels: Array1<usize>,
	validation_features: Array2<f32>,
	validation_labels: Array1<usize>,
	network: Network,
	adam: Adam,
	rng: Xoshiro256Plus,
	cancellation: CancellationToken,
	progress_counter: ProgressCounter,
	epochs_completed: usize,
	finished: bool,
}

impl Training {
	/**
	Prepare a training run. This fits the normalization stats on `train`, normalizes both splits, and initializes the network from `options.seed`. Any weights `classifier` already has are replaced.
	*/
	pub fn new(
		classifier: TrainableClassifier,
		train: &Dataset,
		validation: &Dataset,
		options: TrainOptions,
		cancellation: CancellationToken,
	) -> Result<Training> {
		if options.epochs == 0 {
			return Err(Error::precondition(
				Operation::Train,
				"the number of epochs must be at least 1",
			));
		}
		if options.batch_size == 0 {
			return Err(Error::precondition(
				Operation::Train,
				"the batch size must be at least 1",
			));
		}
		if !(options.learning_rate.is_finite() && options.learning_rate > 0.0) {
			return Err(Error::precondition(
				Operation::Train,
				format!(
					"the learning rate must be positive and finite, got {}",
					options.learning_rate
				),
			));
		}
		if train.is_empty() {
			return Err(Error::precondition(
				Operation::Train,
				"the training split is empty",
			));
		}
		if validation.is_empty() {
			return Err(Error::precondition(
				Operation::Train,
				"the validation split is empty",
			));
		}
		let architecture = classifier.architecture().clone();
		architecture.validate()?;
		if architecture.n_inputs != N_FEATURES || architecture.n_outputs() != N_CLASSES {
			return Err(Error::precondition(
				Operation::Train,
				format!(
					"the architecture must map {} inputs to {} outputs",
					N_FEATURES, N_CLASSES
				),
			));
		}
		let stats = NormalizationStats::fit(train.samples())?;
		let mut train_features = train.features();
		stats.transform_array(train_features.view_mut())?;
		let mut validation_features = validation.features();
		stats.transform_array(validation_features.view_mut())?;
		let mut rng = Xoshiro256Plus::seed_from_u64(options.seed);
		let network = Network::new(&architecture, &mut rng)?;
		let adam = Adam::new(
			AdamOptions {
				learning_rate: options.learning_rate,
				..AdamOptions::default()
			},
			&network,
		);
		let n_train = train.len().to_u64().unwrap();
		info!(
			"training on {} examples, validating on {} examples",
			train.len(),
			validation.len()
		);
		Ok(Training {
			architecture,
			options,
			stats,
			train_features,
			train_labels: train.labels(),
			validation_features,
			validation_labels: validation.labels(),
			network,
			adam,
			rng,
			cancellation,
			progress_counter: ProgressCounter::new(n_train),
			epochs_completed: 0,
			finished: false,
		})
	}

	pub fn epochs_completed(&self) -> usize {
		self.epochs_completed
	}

	/// The stats fit on the training split. They are bound to the classifier this run produces.
	pub fn stats(&self) -> &NormalizationStats {
		&self.stats
	}

	/// A counter of the training examples processed in the current epoch. Clone it to watch progress from another thread.
	pub fn progress_counter(&self) -> &ProgressCounter {
		&self.progress_counter
	}

	/// Finish the run and return a classifier with the weights of the last completed epoch.
	pub fn into_classifier(self) -> Result<TrainableClassifier> {
		if self.epochs_completed == 0 {
			return Err(Error::NotReady {
				operation: Operation::Train,
			});
		}
		Ok(TrainableClassifier::from_trained_state(TrainedState {
			architecture: self.architecture,
			network: self.network,
			stats: self.stats,
			epochs_trained: self.epochs_completed,
		}))
	}

	fn train_epoch(&mut self) -> Result<TrainingProgressEvent> {
		let epoch = self.epochs_completed + 1;
		let failed = |message: String| Error::TrainingFailed {
			last_successful_epoch: epoch - 1,
			message,
		};
		// Work on copies so a failed epoch leaves the last completed epoch intact.
		let mut network = self.network.clone();
		let mut adam = self.adam.clone();
		let mut indices: Vec<usize> = (0..self.train_labels.len()).collect();
		indices.shuffle(&mut self.rng);
		let features = self.train_features.select(Axis(0), &indices);
		let labels = self.train_labels.select(Axis(0), &indices);
		self.progress_counter.restart(labels.len().to_u64().unwrap());
		let mut train_loss = CrossEntropy::default();
		let mut train_accuracy = Accuracy::default();
		for (batch_index, (features, labels)) in izip!(
			features.axis_chunks_iter(Axis(0), self.options.batch_size),
			labels.axis_chunks_iter(Axis(0), self.options.batch_size)
		)
		.enumerate()
		{
			let probabilities = network.train_batch(&mut adam, features, labels, &mut self.rng);
			let mut batch_loss = CrossEntropy::default();
			for (probabilities, label) in izip!(probabilities.genrows(), labels.iter()) {
				batch_loss.update(CrossEntropyInput {
					probabilities,
					label: *label,
				});
				train_accuracy.update((*label, predicted_class(probabilities)));
			}
			debug!(
				"epoch {} batch {}: loss {:?}",
				epoch,
				batch_index,
				batch_loss.clone().finalize()
			);
			train_loss.merge(batch_loss);
			self.progress_counter.inc(labels.len().to_u64().unwrap());
		}
		let train_loss = train_loss
			.finalize()
			.ok_or_else(|| failed("no training examples were processed".to_owned()))?;
		let train_loss = Finite::new(train_loss, "the training loss")
			.map_err(|error| failed(error.to_string()))?;
		if !network.is_finite() {
			return Err(failed("the network weights are not finite".to_owned()));
		}
		let train_accuracy = train_accuracy.finalize().unwrap_or(0.0);
		let probabilities = network.predict(self.validation_features.view());
		let mut validation_loss = CrossEntropy::default();
		let mut validation_accuracy = Accuracy::default();
		for (probabilities, label) in izip!(probabilities.genrows(), self.validation_labels.iter())
		{
			validation_loss.update(CrossEntropyInput {
				probabilities,
				label: *label,
			});
			validation_accuracy.update((*label, predicted_class(probabilities)));
		}
		let validation_loss = validation_loss
			.finalize()
			.ok_or_else(|| failed("no validation examples were processed".to_owned()))?;
		let validation_loss = Finite::new(validation_loss, "the validation loss")
			.map_err(|error| failed(error.to_string()))?;
		let validation_accuracy = validation_accuracy.finalize().unwrap_or(0.0);
		self.network = network;
		self.adam = adam;
		self.epochs_completed = epoch;
		Ok(TrainingProgressEvent {
			epoch,
			train_loss: train_loss.get(),
			validation_loss: validation_loss.get(),
			train_accuracy,
			validation_accuracy,
		})
	}
}

/// The index of the most probable class. Ties go to the lower index.
fn predicted_class(probabilities: ArrayView1<f32>) -> usize {
	let mut best = 0;
	for (index, probability) in probabilities.iter().enumerate() {
		if *probability > probabilities[best] {
			best = index;
		}
	}
	best
}

impl Iterator for Training {
	type Item = Result<TrainingProgressEvent>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.finished {
			return None;
		}
		if self.epochs_completed >= self.options.epochs {
			self.finished = true;
			return None;
		}
		if self.epochs_completed > 0 && self.cancellation.is_cancelled() {
			info!("training cancelled after epoch {}", self.epochs_completed);
			self.finished = true;
			return None;
		}
		match self.train_epoch() {
			Ok(event) => {
				info!("{}", event);
				Some(Ok(event))
			}
			Err(error) => {
				self.finished = true;
				Some(Err(error))
			}
		}
	}
}

impl std::iter::FusedIterator for Training {}

/**
Train `classifier` on `train`, calling `on_progress` after every epoch, and return the trained classifier. This drains a [`Training`](struct.Training.html). If the token is cancelled, the returned classifier has the weights of the last epoch that completed.
*/
pub fn train(
	classifier: TrainableClassifier,
	train: &Dataset,
	validation: &Dataset,
	options: TrainOptions,
	on_progress: &mut dyn FnMut(&TrainingProgressEvent),
	cancellation: CancellationToken,
) -> Result<TrainableClassifier> {
	let mut training = Training::new(classifier, train, validation, options, cancellation)?;
	for event in &mut training {
		let event = event?;
		on_progress(&event);
	}
	training.into_classifier()
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::classifier::Classify;
	use snowcast_dataset::generate;
	use snowcast_util::error::ErrorKind;

	fn splits(size: usize, seed: u64) -> (Dataset, Dataset) {
		generate(size, seed).split(0.2).unwrap()
	}

	#[test]
	fn test_training_yields_one_event_per_epoch() {
		let (train, validation) = splits(300, 2);
		let options = TrainOptions {
			epochs: 3,
			..TrainOptions::default()
		};
		let training = Training::new(
			TrainableClassifier::default(),
			&train,
			&validation,
			options,
			CancellationToken::new(),
		)
		.unwrap();
		let events: Vec<TrainingProgressEvent> = training.map(|event| event.unwrap()).collect();
		assert_eq!(
			events.iter().map(|event| event.epoch).collect::<Vec<_>>(),
			vec![1, 2, 3]
		);
		for event in events.iter() {
			assert!(event.train_loss.is_finite());
			assert!(event.validation_loss.is_finite());
			assert!((0.0..=1.0).contains(&event.validation_accuracy));
		}
	}

	#[test]
	fn test_training_is_fused() {
		let (train, validation) = splits(100, 4);
		let mut training = Training::new(
			TrainableClassifier::default(),
			&train,
			&validation,
			TrainOptions {
				epochs: 1,
				..TrainOptions::default()
			},
			CancellationToken::new(),
		)
		.unwrap();
		assert!(training.next().unwrap().is_ok());
		assert!(training.next().is_none());
		assert!(training.next().is_none());
		assert_eq!(training.epochs_completed(), 1);
		assert_eq!(training.progress_counter().get(), 80);
		let classifier = training.into_classifier().unwrap();
		assert_eq!(classifier.epochs_trained(), 1);
		assert!(classifier.predict(&validation.samples()[0].features).is_ok());
	}

	#[test]
	fn test_into_classifier_before_any_epoch_is_not_ready() {
		let (train, validation) = splits(100, 4);
		let training = Training::new(
			TrainableClassifier::default(),
			&train,
			&validation,
			TrainOptions::default(),
			CancellationToken::new(),
		)
		.unwrap();
		let error = training.into_classifier().unwrap_err();
		assert_eq!(error.kind(), ErrorKind::NotReady);
	}

	#[test]
	fn test_invalid_options_are_precondition_errors() {
		let (train, validation) = splits(100, 4);
		let cases = vec![
			TrainOptions {
				epochs: 0,
				..TrainOptions::default()
			},
			TrainOptions {
				batch_size: 0,
				..TrainOptions::default()
			},
			TrainOptions {
				learning_rate: std::f32::NAN,
				..TrainOptions::default()
			},
		];
		for options in cases {
			let error = Training::new(
				TrainableClassifier::default(),
				&train,
				&validation,
				options,
				CancellationToken::new(),
			)
			.err()
			.unwrap();
			assert_eq!(error.kind(), ErrorKind::Precondition);
			assert_eq!(error.operation(), Operation::Train);
		}
		let narrow = Architecture {
			n_inputs: 5,
			layers: vec![snowcast_nn::LayerSpec::Dense {
				units: 3,
				activation: snowcast_nn::Activation::Softmax,
			}],
		};
		let error = Training::new(
			TrainableClassifier::new(narrow),
			&train,
			&validation,
			TrainOptions::default(),
			CancellationToken::new(),
		)
		.err()
		.unwrap();
		assert_eq!(error.kind(), ErrorKind::Precondition);
		let error = Training::new(
			TrainableClassifier::default(),
			&Dataset::default(),
			&validation,
			TrainOptions::default(),
			CancellationToken::new(),
		)
		.err()
		.unwrap();
		assert_eq!(error.kind(), ErrorKind::Precondition);
		let error = Training::new(
			TrainableClassifier::default(),
			&train,
			&Dataset::default(),
			TrainOptions::default(),
			CancellationToken::new(),
		)
		.err()
		.unwrap();
		assert_eq!(error.kind(), ErrorKind::Precondition);
	}

	#[test]
	fn test_divergent_training_fails_and_keeps_last_epoch() {
		let (train, validation) = splits(200, 6);
		let mut training = Training::new(
			TrainableClassifier::default(),
			&train,
			&validation,
			TrainOptions {
				epochs: 5,
				..TrainOptions::default()
			},
			CancellationToken::new(),
		)
		.unwrap();
		assert!(training.next().unwrap().is_ok());
		let weights_after_first_epoch = training.network.clone();
		// Poison the inputs so the next epoch produces non-finite values.
		training.train_features.fill(std::f32::NAN);
		let error = training.next().unwrap().unwrap_err();
		match error {
			Error::TrainingFailed {
				last_successful_epoch,
				..
			} => assert_eq!(last_successful_epoch, 1),
			error => panic!("unexpected error {}", error),
		}
		assert!(training.next().is_none());
		assert_eq!(training.network, weights_after_first_epoch);
		let classifier = training.into_classifier().unwrap();
		assert_eq!(classifier.epochs_trained(), 1);
	}

	#[test]
	fn test_train_calls_on_progress() {
		let (train, validation) = splits(200, 8);
		let mut epochs = Vec::new();
		let classifier = super::train(
			TrainableClassifier::default(),
			&train,
			&validation,
			TrainOptions {
				epochs: 2,
				..TrainOptions::default()
			},
			&mut |event| epochs.push(event.epoch),
			CancellationToken::new(),
		)
		.unwrap();
		assert_eq!(epochs, vec![1, 2]);
		assert_eq!(classifier.epochs_trained(), 2);
	}
}
