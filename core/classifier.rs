/*!
A classifier maps a raw [`FeatureVector`](../../snowcast_dataset/struct.FeatureVector.html) to a [`Label`](../../snowcast_dataset/enum.Label.html) and to a distribution over the labels. There are two kinds:

- [`HeuristicClassifier`](struct.HeuristicClassifier.html) applies the same fixed rule that labels synthetic data. It is always ready.
- [`TrainableClassifier`](struct.TrainableClassifier.html) is a feed-forward network. It is not ready until the [`Training`](../train/struct.Training.html) engine has completed at least one epoch.

[`Classifier`](enum.Classifier.html) holds either kind.
*/

use ndarray::prelude::*;
use snowcast_dataset::{label_for, FeatureVector, Label, N_CLASSES, N_FEATURES};
use snowcast_features::NormalizationStats;
use snowcast_nn::{Architecture, Network};
use snowcast_util::error::{Error, Operation, Result};

pub trait Classify {
	/// Compute a distribution over the labels, indexed by [`Label::index`](../../snowcast_dataset/enum.Label.html#method.index).
	fn predict_distribution(&self, features: &FeatureVector) -> Result<[f32; N_CLASSES]>;

	/// Predict the most likely label. Ties go to the lower label index.
	fn predict(&self, features: &FeatureVector) -> Result<Label> {
		let distribution = self.predict_distribution(features)?;
		Ok(argmax(&distribution))
	}
}

pub(crate) fn argmax(distribution: &[f32]) -> Label {
	let mut best = 0;
	for (index, probability) in distribution.iter().enumerate() {
		if *probability > distribution[best] {
			best = index;
		}
	}
	Label::from_index(best).unwrap_or(Label::NoSnow)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
	Heuristic,
	Trainable,
}

impl std::str::FromStr for ClassifierKind {
	type Err = Error;
	fn from_str(s: &str) -> Result<ClassifierKind> {
		match s {
			"heuristic" => Ok(ClassifierKind::Heuristic),
			"trainable" => Ok(ClassifierKind::Trainable),
			_ => Err(Error::Config {
				message: format!(
					"unknown classifier kind \"{}\", expected \"heuristic\" or \"trainable\"",
					s
				),
			}),
		}
	}
}

impl std::fmt::Display for ClassifierKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ClassifierKind::Heuristic => write!(f, "heuristic"),
			ClassifierKind::Trainable => write!(f, "trainable"),
		}
	}
}

/**
The `HeuristicClassifier` applies the labeling rule of [`generate`](../../snowcast_dataset/fn.generate.html) to the raw temperature, humidity, and wind speed. The rule is often stated with temperature and humidity alone, but the heavy snow branch also requires a wind speed below 12, so reading the wind as well is what makes the heuristic agree with every generated label. Its distributions are fixed confidence vectors keyed to the predicted label, not calibrated probabilities:

| prediction | distribution         |
|------------|----------------------|
| No Snow    | [0.80, 0.15, 0.05]   |
| Light Snow | [0.10, 0.70, 0.20]   |
| Heavy Snow | [0.05, 0.20, 0.75]   |
*/
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
	pub fn distribution(label: Label) -> [f32; N_CLASSES] {
		match label {
			Label::NoSnow => [0.80, 0.15, 0.05],
			Label::LightSnow => [0.10, 0.70, 0.20],
			Label::HeavySnow => [0.05, 0.20, 0.75],
		}
	}
}

impl Classify for HeuristicClassifier {
	fn predict(&self, features: &FeatureVector) -> Result<Label> {
		Ok(label_for(
			features.temperature(),
			features.humidity(),
			features.wind_speed(),
		))
	}

	fn predict_distribution(&self, features: &FeatureVector) -> Result<[f32; N_CLASSES]> {
		Ok(HeuristicClassifier::distribution(self.predict(features)?))
	}
}

/// Everything a trained network needs at inference time. The stats were fit on the training split of the run that produced the network and are never refit.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrainedState {
	pub architecture: Architecture,
	pub network: Network,
	pub stats: NormalizationStats,
	pub epochs_trained: usize,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ClassifierState {
	Heuristic,
	Trained(TrainedState),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrainableClassifier {
	architecture: Architecture,
	trained: Option<TrainedState>,
}

impl Default for TrainableClassifier {
	fn default() -> TrainableClassifier {
		TrainableClassifier::new(Architecture::default())
	}
}

impl TrainableClassifier {
	/// Create an untrained classifier. It returns `NotReady` from every prediction until it is trained.
	pub fn new(architecture: Architecture) -> TrainableClassifier {
		TrainableClassifier {
			architecture,
			trained: None,
		}
	}

	pub fn from_trained_state(state: TrainedState) -> TrainableClassifier {
		TrainableClassifier {
			architecture: state.architecture.clone(),
			trained: Some(state),
		}
	}

	pub fn architecture(&self) -> &Architecture {
		&self.architecture
	}

	pub fn trained_state(&self) -> Option<&TrainedState> {
		self.trained.as_ref()
	}

	pub fn epochs_trained(&self) -> usize {
		self.trained
			.as_ref()
			.map(|state| state.epochs_trained)
			.unwrap_or(0)
	}

	/// Predict distributions for a batch of raw features with shape (n_examples, n_features).
	pub fn predict_batch(&self, features: ArrayView2<f32>) -> Result<Array2<f32>> {
		let state = self.trained.as_ref().ok_or(Error::NotReady {
			operation: Operation::Predict,
		})?;
		let mut features = features.to_owned();
		state.stats.transform_array(features.view_mut())?;
		Ok(state.network.predict(features.view()))
	}
}

impl Classify for TrainableClassifier {
	fn predict_distribution(&self, features: &FeatureVector) -> Result<[f32; N_CLASSES]> {
		let state = self.trained.as_ref().ok_or(Error::NotReady {
			operation: Operation::Predict,
		})?;
		let normalized = state.stats.transform_features(features);
		let input = ArrayView2::from_shape((1, N_FEATURES), normalized.as_slice()).map_err(
			|error| Error::precondition(Operation::Predict, error.to_string()),
		)?;
		let probabilities = state.network.predict(input);
		let mut distribution = [0.0; N_CLASSES];
		for (value, probability) in distribution.iter_mut().zip(probabilities.row(0).iter()) {
			*value = *probability;
		}
		Ok(distribution)
	}
}

#[derive(Clone, Debug, PartialEq)]
pub enum Classifier {
	Heuristic(HeuristicClassifier),
	Trainable(TrainableClassifier),
}

impl Classifier {
	pub fn kind(&self) -> ClassifierKind {
		match self {
			Classifier::Heuristic(_) => ClassifierKind::Heuristic,
			Classifier::Trainable(_) => ClassifierKind::Trainable,
		}
	}

	/// Return true if this classifier can answer predictions.
	pub fn is_ready(&self) -> bool {
		match self {
			Classifier::Heuristic(_) => true,
			Classifier::Trainable(classifier) => classifier.trained.is_some(),
		}
	}

	pub fn state(&self) -> Option<ClassifierState> {
		match self {
			Classifier::Heuristic(_) => Some(ClassifierState::Heuristic),
			Classifier::Trainable(classifier) => classifier
				.trained
				.as_ref()
				.map(|state| ClassifierState::Trained(state.clone())),
		}
	}

	pub fn from_state(state: ClassifierState) -> Classifier {
		match state {
			ClassifierState::Heuristic => Classifier::Heuristic(HeuristicClassifier),
			ClassifierState::Trained(state) => {
				Classifier::Trainable(TrainableClassifier::from_trained_state(state))
			}
		}
	}
}

impl Classify for Classifier {
	fn predict(&self, features: &FeatureVector) -> Result<Label> {
		match self {
			Classifier::Heuristic(classifier) => classifier.predict(features),
			Classifier::Trainable(classifier) => classifier.predict(features),
		}
	}

	fn predict_distribution(&self, features: &FeatureVector) -> Result<[f32; N_CLASSES]> {
		match self {
			Classifier::Heuristic(classifier) => classifier.predict_distribution(features),
			Classifier::Trainable(classifier) => classifier.predict_distribution(features),
		}
	}
}

impl From<HeuristicClassifier> for Classifier {
	fn from(classifier: HeuristicClassifier) -> Classifier {
		Classifier::Heuristic(classifier)
	}
}

impl From<TrainableClassifier> for Classifier {
	fn from(classifier: TrainableClassifier) -> Classifier {
		Classifier::Trainable(classifier)
	}
}
