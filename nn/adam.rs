use crate::network::Network;
use itertools::izip;
use ndarray::prelude::*;
use ndarray::Zip;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdamOptions {
	pub learning_rate: f32,
	pub beta_1: f32,
	pub beta_2: f32,
	pub epsilon: f32,
}

impl Default for AdamOptions {
	fn default() -> AdamOptions {
		AdamOptions {
			learning_rate: 0.005,
			beta_1: 0.9,
			beta_2: 0.999,
			epsilon: 1e-7,
		}
	}
}

/**
`Adam` holds the optimizer state for one network: a first and second moment estimate for every parameter and the number of steps taken so far. [Learn more](https://arxiv.org/abs/1412.6980).

The state is exclusively owned by the training run. It is not part of a saved model.
*/
#[derive(Clone, Debug)]
pub struct Adam {
	options: AdamOptions,
	step: i32,
	first_moments: Vec<ArrayD<f32>>,
	second_moments: Vec<ArrayD<f32>>,
}

impl Adam {
	pub fn new(options: AdamOptions, network: &Network) -> Adam {
		let zeros = || -> Vec<ArrayD<f32>> {
			network
				.parameters()
				.iter()
				.map(|parameter| ArrayD::zeros(parameter.raw_dim()))
				.collect()
		};
		Adam {
			options,
			step: 0,
			first_moments: zeros(),
			second_moments: zeros(),
		}
	}

	pub fn options(&self) -> &AdamOptions {
		&self.options
	}

	/// The number of updates applied so far.
	pub fn n_steps(&self) -> i32 {
		self.step
	}

	/// Apply one update. `parameters` and `gradients` must be in the order of [`Network::parameters`](struct.Network.html#method.parameters).
	pub fn step(&mut self, parameters: Vec<ArrayViewMutD<f32>>, gradients: &[ArrayD<f32>]) {
		self.step += 1;
		let AdamOptions {
			learning_rate,
			beta_1,
			beta_2,
			epsilon,
		} = self.options;
		let bias_correction_1 = 1.0 - beta_1.powi(self.step);
		let bias_correction_2 = 1.0 - beta_2.powi(self.step);
		for (parameter, gradient, first_moment, second_moment) in izip!(
			parameters,
			gradients.iter(),
			self.first_moments.iter_mut(),
			self.second_moments.iter_mut()
		) {
			Zip::from(parameter)
				.and(gradient)
				.and(first_moment)
				.and(second_moment)
				.apply(|parameter, gradient, first_moment, second_moment| {
					*first_moment = beta_1 * *first_moment + (1.0 - beta_1) * gradient;
					*second_moment =
						beta_2 * *second_moment + (1.0 - beta_2) * gradient * gradient;
					let first_moment_hat = *first_moment / bias_correction_1;
					let second_moment_hat = *second_moment / bias_correction_2;
					*parameter -=
						learning_rate * first_moment_hat / (second_moment_hat.sqrt() + epsilon);
				});
		}
	}
}
