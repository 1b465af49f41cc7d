use crate::{
	adam::Adam,
	architecture::{Architecture, LayerSpec},
	layers::{Cache, Layer},
};
use itertools::izip;
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use rand::Rng;
use snowcast_util::error::Result;

/// A `Network` is a stack of layers built from an [`Architecture`](struct.Architecture.html). Its output is a probability distribution over the classes for each input row.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Network {
	layers: Vec<Layer>,
}

impl Network {
	pub fn new<R: Rng>(architecture: &Architecture, rng: &mut R) -> Result<Network> {
		architecture.validate()?;
		let mut n_inputs = architecture.n_inputs;
		let layers = architecture
			.layers
			.iter()
			.map(|spec| {
				let (layer, n_outputs) = Layer::new(spec, n_inputs, rng);
				n_inputs = n_outputs;
				layer
			})
			.collect();
		Ok(Network { layers })
	}

	pub fn layers(&self) -> &[Layer] {
		&self.layers
	}

	/// Compute class probabilities in inference mode. `features` has shape (n_examples, n_features) and the result has shape (n_examples, n_classes).
	pub fn predict(&self, features: ArrayView2<f32>) -> Array2<f32> {
		self.layers
			.iter()
			.fold(features.to_owned(), |activations, layer| {
				layer.forward_inference(activations)
			})
	}

	/**
	Run one optimization step on a batch: a training-mode forward pass, the backward pass of the categorical cross-entropy loss, and one Adam update. `labels` are 0-indexed classes. Returns the probabilities computed by the forward pass, before the update.
	*/
	pub fn train_batch<R: Rng>(
		&mut self,
		adam: &mut Adam,
		features: ArrayView2<f32>,
		labels: ArrayView1<usize>,
		rng: &mut R,
	) -> Array2<f32> {
		let mut activations = features.to_owned();
		let mut caches: Vec<Cache> = Vec::with_capacity(self.layers.len());
		for layer in self.layers.iter_mut() {
			let (output, cache) = layer.forward_train(activations, rng);
			caches.push(cache);
			activations = output;
		}
		let probabilities = activations;
		// The gradient of the mean cross-entropy with respect to the softmax logits is (p - y) / n.
		let n_examples = features.nrows().to_f32().unwrap();
		let mut gradient = probabilities.clone();
		for (mut row, label) in izip!(gradient.genrows_mut(), labels.iter()) {
			row[*label] -= 1.0;
		}
		gradient /= n_examples;
		let mut gradients: Vec<Vec<ArrayD<f32>>> = Vec::with_capacity(self.layers.len());
		for (layer, cache) in izip!(self.layers.iter().rev(), caches.into_iter().rev()) {
			let (input_gradient, parameter_gradients) = layer.backward(cache, gradient);
			gradients.push(parameter_gradients);
			gradient = input_gradient;
		}
		let gradients: Vec<ArrayD<f32>> = gradients.into_iter().rev().flatten().collect();
		adam.step(self.parameters_mut(), &gradients);
		probabilities
	}

	/// The trainable parameters of every layer, in layer order.
	pub fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<f32>> {
		self.layers
			.iter_mut()
			.flat_map(|layer| layer.parameters_mut())
			.collect()
	}

	pub fn parameters(&self) -> Vec<ArrayViewD<f32>> {
		self.layers
			.iter()
			.flat_map(|layer| layer.parameters())
			.collect()
	}

	/// Return true if this network has exactly the layers `architecture` describes, with every array sized for inputs of `architecture.n_inputs` columns.
	pub fn matches(&self, architecture: &Architecture) -> bool {
		if self.layers.len() != architecture.layers.len() {
			return false;
		}
		let mut n_inputs = architecture.n_inputs;
		for (layer, spec) in izip!(self.layers.iter(), architecture.layers.iter()) {
			match (layer, spec) {
				(Layer::Dense(dense), LayerSpec::Dense { units, activation }) => {
					if dense.weights.dim() != (n_inputs, *units)
						|| dense.biases.len() != *units
						|| dense.activation != *activation
					{
						return false;
					}
					n_inputs = *units;
				}
				(Layer::BatchNormalization(batch_normalization), LayerSpec::BatchNormalization) => {
					let widths = [
						batch_normalization.gamma.len(),
						batch_normalization.beta.len(),
						batch_normalization.running_mean.len(),
						batch_normalization.running_variance.len(),
					];
					if widths.iter().any(|width| *width != n_inputs) {
						return false;
					}
				}
				(Layer::Dropout(dropout), LayerSpec::Dropout { rate }) => {
					if dropout.rate != *rate {
						return false;
					}
				}
				_ => return false,
			}
		}
		true
	}

	/// Return true if every parameter and running statistic is finite.
	pub fn is_finite(&self) -> bool {
		self.layers.iter().all(|layer| {
			layer
				.state()
				.iter()
				.all(|values| values.iter().all(|value| value.is_finite()))
		})
	}
}

/// Replace each row of logits with its softmax.
pub fn softmax(mut logits: ArrayViewMut2<f32>) {
	for mut logits in logits.genrows_mut() {
		let max = logits.iter().fold(std::f32::MIN, |a, &b| a.max(b));
		logits -= max;
		logits.mapv_inplace(|l| l.exp());
		let sum = logits.iter().fold(0.0, |a, b| a + b);
		logits /= sum;
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::{adam::AdamOptions, architecture::Activation};
	use rand::SeedableRng;
	use rand_xoshiro::Xoshiro256Plus;

	#[test]
	fn test_softmax() {
		let mut logits = arr2(&[[1.0, 1.0, 1.0], [0.0, 0.0, 1000.0]]);
		softmax(logits.view_mut());
		for value in logits.row(0).iter() {
			assert!((value - 1.0 / 3.0).abs() < 1e-6);
		}
		assert_eq!(logits.row(1).to_vec(), vec![0.0, 0.0, 1.0]);
	}

	#[test]
	fn test_predict_outputs_distributions() {
		let mut rng = Xoshiro256Plus::seed_from_u64(42);
		let network = Network::new(&Architecture::default(), &mut rng).unwrap();
		let features = Array2::from_shape_fn((5, 8), |(row, column)| {
			(row as f32 - 2.0) * 0.3 + column as f32 * 0.1
		});
		let probabilities = network.predict(features.view());
		assert_eq!(probabilities.dim(), (5, 3));
		for row in probabilities.genrows() {
			assert!((row.sum() - 1.0).abs() < 1e-5);
			assert!(row.iter().all(|p| *p >= 0.0 && *p <= 1.0));
		}
		assert!(network.is_finite());
	}

	#[test]
	fn test_new_is_deterministic_for_a_seed() {
		let a = Network::new(
			&Architecture::default(),
			&mut Xoshiro256Plus::seed_from_u64(7),
		)
		.unwrap();
		let b = Network::new(
			&Architecture::default(),
			&mut Xoshiro256Plus::seed_from_u64(7),
		)
		.unwrap();
		assert_eq!(a, b);
		assert_eq!(a.parameters().len(), 12);
	}

	#[test]
	fn test_matches_detects_a_network_built_for_another_architecture() {
		let mut rng = Xoshiro256Plus::seed_from_u64(7);
		let architecture = Architecture::default();
		let network = Network::new(&architecture, &mut rng).unwrap();
		assert!(network.matches(&architecture));
		let narrow = Architecture {
			n_inputs: 5,
			layers: vec![LayerSpec::Dense {
				units: 3,
				activation: Activation::Softmax,
			}],
		};
		let narrow_network = Network::new(&narrow, &mut rng).unwrap();
		assert!(narrow_network.matches(&narrow));
		assert!(!narrow_network.matches(&architecture));
		assert!(!network.matches(&narrow));
		let wider_inputs = Architecture {
			n_inputs: 9,
			..Architecture::default()
		};
		assert!(!network.matches(&wider_inputs));
		let mut other_dropout = Architecture::default();
		other_dropout.layers[2] = LayerSpec::Dropout { rate: 0.5 };
		assert!(!network.matches(&other_dropout));
		// A batch normalization layer whose vectors are too short.
		let mut truncated = network.clone();
		if let Layer::BatchNormalization(batch_normalization) = &mut truncated.layers[1] {
			batch_normalization.running_mean = Array1::zeros(10);
		}
		assert!(!truncated.matches(&architecture));
	}

	#[test]
	fn test_train_batch_learns_a_separable_problem() {
		// Class is determined by which of the first three features is largest.
		let architecture = Architecture {
			n_inputs: 3,
			layers: vec![
				LayerSpec::Dense {
					units: 16,
					activation: Activation::Relu,
				},
				LayerSpec::BatchNormalization,
				LayerSpec::Dropout { rate: 0.1 },
				LayerSpec::Dense {
					units: 3,
					activation: Activation::Softmax,
				},
			],
		};
		let mut rng = Xoshiro256Plus::seed_from_u64(0);
		let mut network = Network::new(&architecture, &mut rng).unwrap();
		let mut adam = Adam::new(
			AdamOptions {
				learning_rate: 0.01,
				..AdamOptions::default()
			},
			&network,
		);
		let features = Array2::from_shape_fn((90, 3), |(row, column)| {
			if row % 3 == column {
				1.0
			} else {
				-1.0
			}
		});
		let labels: Array1<usize> = (0..90).map(|row| row % 3).collect();
		for _ in 0..300 {
			network.train_batch(&mut adam, features.view(), labels.view(), &mut rng);
		}
		let probabilities = network.predict(features.view());
		for (row, label) in izip!(probabilities.genrows(), labels.iter()) {
			assert!(row[*label] > 0.9, "{:?}", row);
		}
		assert!(network.is_finite());
	}
}
