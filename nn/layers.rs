use crate::architecture::{Activation, LayerSpec};
use ndarray::prelude::*;
use ndarray::Zip;
use num_traits::ToPrimitive;
use rand::Rng;

/// The variance epsilon and the running statistics momentum of batch normalization.
const BATCH_NORMALIZATION_EPSILON: f32 = 1e-5;
const BATCH_NORMALIZATION_MOMENTUM: f32 = 0.1;

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Layer {
	Dense(Dense),
	BatchNormalization(BatchNormalization),
	Dropout(Dropout),
}

/// A fully connected layer. `weights` has shape (n_inputs, n_outputs).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Dense {
	pub weights: Array2<f32>,
	pub biases: Array1<f32>,
	pub activation: Activation,
}

/**
Batch normalization standardizes each column with the statistics of the current batch while training, and with running averages of those statistics at inference time. The running averages are updated as `running = (1 - 0.1) * running + 0.1 * batch`.
*/
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BatchNormalization {
	pub gamma: Array1<f32>,
	pub beta: Array1<f32>,
	pub running_mean: Array1<f32>,
	pub running_variance: Array1<f32>,
}

/// Inverted dropout: surviving activations are scaled by `1 / (1 - rate)` while training, so inference is the identity.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Dropout {
	pub rate: f32,
}

/// What a layer remembers from its training forward pass for the backward pass.
pub(crate) enum Cache {
	Dense {
		input: Array2<f32>,
		output: Array2<f32>,
	},
	BatchNormalization {
		normalized: Array2<f32>,
		inv_std: Array1<f32>,
	},
	Dropout {
		mask: Array2<f32>,
	},
}

impl Layer {
	/// Build a freshly initialized layer from its spec. Dense weights use Glorot uniform initialization and all biases start at zero.
	pub(crate) fn new<R: Rng>(spec: &LayerSpec, n_inputs: usize, rng: &mut R) -> (Layer, usize) {
		match spec {
			LayerSpec::Dense { units, activation } => {
				let limit = (6.0 / (n_inputs + units).to_f32().unwrap()).sqrt();
				let weights =
					Array2::from_shape_fn((n_inputs, *units), |_| rng.gen_range(-limit, limit));
				let layer = Layer::Dense(Dense {
					weights,
					biases: Array1::zeros(*units),
					activation: *activation,
				});
				(layer, *units)
			}
			LayerSpec::BatchNormalization => {
				let layer = Layer::BatchNormalization(BatchNormalization {
					gamma: Array1::ones(n_inputs),
					beta: Array1::zeros(n_inputs),
					running_mean: Array1::zeros(n_inputs),
					running_variance: Array1::ones(n_inputs),
				});
				(layer, n_inputs)
			}
			LayerSpec::Dropout { rate } => (Layer::Dropout(Dropout { rate: *rate }), n_inputs),
		}
	}

	pub(crate) fn forward_inference(&self, input: Array2<f32>) -> Array2<f32> {
		match self {
			Layer::Dense(dense) => dense.forward(input.view()),
			Layer::BatchNormalization(batch_normalization) => {
				let inv_std = batch_normalization
					.running_variance
					.mapv(|variance| 1.0 / (variance + BATCH_NORMALIZATION_EPSILON).sqrt());
				let normalized = (input - &batch_normalization.running_mean) * &inv_std;
				normalized * &batch_normalization.gamma + &batch_normalization.beta
			}
			Layer::Dropout(_) => input,
		}
	}

	pub(crate) fn forward_train<R: Rng>(
		&mut self,
		input: Array2<f32>,
		rng: &mut R,
	) -> (Array2<f32>, Cache) {
		match self {
			Layer::Dense(dense) => {
				let output = dense.forward(input.view());
				let cache = Cache::Dense {
					input,
					output: output.clone(),
				};
				(output, cache)
			}
			Layer::BatchNormalization(batch_normalization) => {
				batch_normalization.forward_train(input)
			}
			Layer::Dropout(dropout) => {
				let keep = 1.0 - dropout.rate;
				let mask = Array2::from_shape_fn(input.raw_dim(), |_| {
					if rng.gen::<f32>() < dropout.rate {
						0.0
					} else {
						1.0 / keep
					}
				});
				let output = input * &mask;
				(output, Cache::Dropout { mask })
			}
		}
	}

	/// Propagate `gradient`, the loss gradient with respect to this layer's output, back through the layer. Returns the gradient with respect to the layer's input and the gradients of the layer's parameters, in the order of [`parameters`](#method.parameters).
	pub(crate) fn backward(
		&self,
		cache: Cache,
		mut gradient: Array2<f32>,
	) -> (Array2<f32>, Vec<ArrayD<f32>>) {
		match (self, cache) {
			(Layer::Dense(dense), Cache::Dense { input, output }) => {
				// The softmax gradient is fused with the cross-entropy gradient, so it arrives with respect to the logits.
				if dense.activation == Activation::Relu {
					Zip::from(&mut gradient)
						.and(&output)
						.apply(|gradient, output| {
							if *output <= 0.0 {
								*gradient = 0.0;
							}
						});
				}
				let weight_gradients = input.t().dot(&gradient);
				let bias_gradients = gradient.sum_axis(Axis(0));
				let input_gradient = gradient.dot(&dense.weights.t());
				(
					input_gradient,
					vec![weight_gradients.into_dyn(), bias_gradients.into_dyn()],
				)
			}
			(
				Layer::BatchNormalization(batch_normalization),
				Cache::BatchNormalization {
					normalized,
					inv_std,
				},
			) => {
				let n = gradient.nrows().to_f32().unwrap();
				let sum_gradient = gradient.sum_axis(Axis(0));
				let sum_gradient_normalized = (&gradient * &normalized).sum_axis(Axis(0));
				let scale = &batch_normalization.gamma * &inv_std / n;
				let input_gradient = ((gradient * n - &sum_gradient)
					- &(normalized * &sum_gradient_normalized))
					* &scale;
				(
					input_gradient,
					vec![
						sum_gradient_normalized.into_dyn(),
						sum_gradient.into_dyn(),
					],
				)
			}
			(Layer::Dropout(_), Cache::Dropout { mask }) => (gradient * &mask, vec![]),
			_ => unreachable!("layer and cache kinds always match"),
		}
	}

	pub fn parameters(&self) -> Vec<ArrayViewD<f32>> {
		match self {
			Layer::Dense(dense) => vec![
				dense.weights.view().into_dyn(),
				dense.biases.view().into_dyn(),
			],
			Layer::BatchNormalization(batch_normalization) => vec![
				batch_normalization.gamma.view().into_dyn(),
				batch_normalization.beta.view().into_dyn(),
			],
			Layer::Dropout(_) => vec![],
		}
	}

	pub fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<f32>> {
		match self {
			Layer::Dense(dense) => vec![
				dense.weights.view_mut().into_dyn(),
				dense.biases.view_mut().into_dyn(),
			],
			Layer::BatchNormalization(batch_normalization) => vec![
				batch_normalization.gamma.view_mut().into_dyn(),
				batch_normalization.beta.view_mut().into_dyn(),
			],
			Layer::Dropout(_) => vec![],
		}
	}

	/// Parameters and running statistics, everything inference depends on.
	pub(crate) fn state(&self) -> Vec<ArrayViewD<f32>> {
		let mut state = self.parameters();
		if let Layer::BatchNormalization(batch_normalization) = self {
			state.push(batch_normalization.running_mean.view().into_dyn());
			state.push(batch_normalization.running_variance.view().into_dyn());
		}
		state
	}
}

impl Dense {
	fn forward(&self, input: ArrayView2<f32>) -> Array2<f32> {
		let mut output = input.dot(&self.weights) + &self.biases;
		match self.activation {
			Activation::Relu => output.mapv_inplace(|value| value.max(0.0)),
			Activation::Softmax => crate::network::softmax(output.view_mut()),
		}
		output
	}
}

impl BatchNormalization {
	fn forward_train(&mut self, input: Array2<f32>) -> (Array2<f32>, Cache) {
		let n_columns = input.ncols();
		let mean = input
			.mean_axis(Axis(0))
			.unwrap_or_else(|| Array1::zeros(n_columns));
		let variance = input.var_axis(Axis(0), 0.0);
		let inv_std = variance.mapv(|variance| 1.0 / (variance + BATCH_NORMALIZATION_EPSILON).sqrt());
		let normalized = (input - &mean) * &inv_std;
		let output = &normalized * &self.gamma + &self.beta;
		Zip::from(&mut self.running_mean)
			.and(&mean)
			.apply(|running, batch| {
				*running = (1.0 - BATCH_NORMALIZATION_MOMENTUM) * *running
					+ BATCH_NORMALIZATION_MOMENTUM * batch
			});
		Zip::from(&mut self.running_variance)
			.and(&variance)
			.apply(|running, batch| {
				*running = (1.0 - BATCH_NORMALIZATION_MOMENTUM) * *running
					+ BATCH_NORMALIZATION_MOMENTUM * batch
			});
		(
			output,
			Cache::BatchNormalization {
				normalized,
				inv_std,
			},
		)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use rand::SeedableRng;
	use rand_xoshiro::Xoshiro256Plus;

	#[test]
	fn test_glorot_initialization_bounds() {
		let mut rng = Xoshiro256Plus::seed_from_u64(3);
		let spec = LayerSpec::Dense {
			units: 64,
			activation: Activation::Relu,
		};
		let (layer, n_outputs) = Layer::new(&spec, 8, &mut rng);
		assert_eq!(n_outputs, 64);
		let limit = (6.0f32 / 72.0).sqrt();
		match layer {
			Layer::Dense(dense) => {
				assert_eq!(dense.weights.dim(), (8, 64));
				assert!(dense.weights.iter().all(|weight| weight.abs() <= limit));
				assert!(dense.biases.iter().all(|bias| *bias == 0.0));
			}
			_ => panic!("expected a dense layer"),
		}
	}

	#[test]
	fn test_batch_normalization_train_and_inference() {
		let mut layer = Layer::BatchNormalization(BatchNormalization {
			gamma: Array1::ones(2),
			beta: Array1::zeros(2),
			running_mean: Array1::zeros(2),
			running_variance: Array1::ones(2),
		});
		let mut rng = Xoshiro256Plus::seed_from_u64(0);
		let input = arr2(&[[1.0, 10.0], [3.0, 10.0]]);
		let (output, _) = layer.forward_train(input.clone(), &mut rng);
		// Each column has zero mean. The constant column stays at zero.
		assert!((output[(0, 0)] + 1.0).abs() < 1e-3);
		assert!((output[(1, 0)] - 1.0).abs() < 1e-3);
		assert_eq!(output[(0, 1)], 0.0);
		match &layer {
			Layer::BatchNormalization(batch_normalization) => {
				assert!((batch_normalization.running_mean[0] - 0.2).abs() < 1e-6);
				assert!((batch_normalization.running_mean[1] - 1.0).abs() < 1e-6);
				assert!((batch_normalization.running_variance[0] - 1.0).abs() < 1e-6);
				assert!((batch_normalization.running_variance[1] - 0.9).abs() < 1e-6);
			}
			_ => unreachable!(),
		}
		let inference = layer.forward_inference(input);
		assert_eq!(inference.dim(), (2, 2));
	}

	#[test]
	fn test_dropout_scales_survivors_and_is_identity_at_inference() {
		let mut layer = Layer::Dropout(Dropout { rate: 0.5 });
		let mut rng = Xoshiro256Plus::seed_from_u64(1);
		let input = Array2::<f32>::ones((50, 10));
		let (output, _) = layer.forward_train(input.clone(), &mut rng);
		assert!(output.iter().all(|value| *value == 0.0 || *value == 2.0));
		assert!(output.iter().any(|value| *value == 0.0));
		assert!(output.iter().any(|value| *value == 2.0));
		assert_eq!(layer.forward_inference(input.clone()), input);
	}

	#[test]
	fn test_dense_backward_matches_finite_differences() {
		let dense = Dense {
			weights: arr2(&[[0.5, -0.25], [0.1, 0.3]]),
			biases: arr1(&[0.05, -0.1]),
			activation: Activation::Relu,
		};
		let layer = Layer::Dense(dense.clone());
		let input = arr2(&[[1.0, 2.0], [-0.5, 1.5]]);
		// loss = sum of outputs, so the output gradient is all ones.
		let loss = |dense: &Dense| dense.forward(input.view()).sum();
		let output = dense.forward(input.view());
		let cache = Cache::Dense {
			input: input.clone(),
			output,
		};
		let (_, gradients) = layer.backward(cache, Array2::ones((2, 2)));
		let epsilon = 1e-3;
		for ((row, column), analytic) in gradients[0]
			.view()
			.into_dimensionality::<Ix2>()
			.unwrap()
			.indexed_iter()
		{
			let mut plus = dense.clone();
			plus.weights[(row, column)] += epsilon;
			let mut minus = dense.clone();
			minus.weights[(row, column)] -= epsilon;
			let numeric = (loss(&plus) - loss(&minus)) / (2.0 * epsilon);
			assert!((numeric - analytic).abs() < 1e-2, "{} vs {}", numeric, analytic);
		}
	}
}
