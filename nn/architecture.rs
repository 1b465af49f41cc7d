use snowcast_util::error::{Error, Operation, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Activation {
	Relu,
	Softmax,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum LayerSpec {
	Dense { units: usize, activation: Activation },
	BatchNormalization,
	Dropout { rate: f32 },
}

/**
An `Architecture` describes the layers of a [`Network`](struct.Network.html). It is stored next to the weights in every saved model so the weights can be interpreted without any other context.

The default architecture is:

| layer               | output width |
|---------------------|--------------|
| dense, relu         | 64           |
| batch normalization | 64           |
| dropout 0.25        | 64           |
| dense, relu         | 48           |
| batch normalization | 48           |
| dropout 0.2         | 48           |
| dense, relu         | 32           |
| dense, softmax      | 3            |
*/
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Architecture {
	pub n_inputs: usize,
	pub layers: Vec<LayerSpec>,
}

impl Default for Architecture {
	fn default() -> Architecture {
		Architecture {
			n_inputs: 8,
			layers: vec![
				LayerSpec::Dense {
					units: 64,
					activation: Activation::Relu,
				},
				LayerSpec::BatchNormalization,
				LayerSpec::Dropout { rate: 0.25 },
				LayerSpec::Dense {
					units: 48,
					activation: Activation::Relu,
				},
				LayerSpec::BatchNormalization,
				LayerSpec::Dropout { rate: 0.2 },
				LayerSpec::Dense {
					units: 32,
					activation: Activation::Relu,
				},
				LayerSpec::Dense {
					units: 3,
					activation: Activation::Softmax,
				},
			],
		}
	}
}

impl Architecture {
	/// Check that the architecture can be built and trained. Softmax is only allowed on the final layer, which must be dense, because the backward pass fuses it with the cross-entropy gradient.
	pub fn validate(&self) -> Result<()> {
		let invalid = |message: String| Error::precondition(Operation::Train, message);
		if self.n_inputs == 0 {
			return Err(invalid("the network must have at least one input".to_owned()));
		}
		let n_layers = self.layers.len();
		for (index, layer) in self.layers.iter().enumerate() {
			let is_last = index + 1 == n_layers;
			match layer {
				LayerSpec::Dense { units, activation } => {
					if *units == 0 {
						return Err(invalid(format!("layer {} has zero units", index)));
					}
					if (*activation == Activation::Softmax) != is_last {
						return Err(invalid(format!(
							"layer {}: softmax must be the activation of the final layer and only the final layer",
							index
						)));
					}
				}
				LayerSpec::Dropout { rate } => {
					if !(0.0..1.0).contains(rate) {
						return Err(invalid(format!(
							"layer {}: the dropout rate must be in [0, 1), got {}",
							index, rate
						)));
					}
				}
				LayerSpec::BatchNormalization => {}
			}
		}
		match self.layers.last() {
			Some(LayerSpec::Dense {
				activation: Activation::Softmax,
				..
			}) => Ok(()),
			_ => Err(invalid(
				"the final layer must be dense with a softmax activation".to_owned(),
			)),
		}
	}

	/// The width of the final layer, which is the number of classes.
	pub fn n_outputs(&self) -> usize {
		self.layers
			.iter()
			.rev()
			.find_map(|layer| match layer {
				LayerSpec::Dense { units, .. } => Some(*units),
				_ => None,
			})
			.unwrap_or(self.n_inputs)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_default_architecture_is_valid() {
		let architecture = Architecture::default();
		architecture.validate().unwrap();
		assert_eq!(architecture.n_outputs(), 3);
	}

	#[test]
	fn test_validate_rejects_bad_architectures() {
		let no_softmax = Architecture {
			n_inputs: 8,
			layers: vec![LayerSpec::Dense {
				units: 3,
				activation: Activation::Relu,
			}],
		};
		assert!(no_softmax.validate().is_err());
		let early_softmax = Architecture {
			n_inputs: 8,
			layers: vec![
				LayerSpec::Dense {
					units: 4,
					activation: Activation::Softmax,
				},
				LayerSpec::Dense {
					units: 3,
					activation: Activation::Softmax,
				},
			],
		};
		assert!(early_softmax.validate().is_err());
		let bad_dropout = Architecture {
			n_inputs: 8,
			layers: vec![
				LayerSpec::Dropout { rate: 1.0 },
				LayerSpec::Dense {
					units: 3,
					activation: Activation::Softmax,
				},
			],
		};
		assert!(bad_dropout.validate().is_err());
		let empty = Architecture {
			n_inputs: 8,
			layers: vec![],
		};
		assert!(empty.validate().is_err());
	}
}
