/*!
This module defines the `Config` struct, which is read from an optional YAML file to configure [`pipeline::run`](../pipeline/fn.run.html). Every field is optional. Missing fields fall back to the defaults of [`PipelineOptions`](../pipeline/struct.PipelineOptions.html).

```yaml
dataset:
  size: 2500
  seed: 1
validation_fraction: 0.2
model:
  kind: trainable
train:
  epochs: 25
  batch_size: 32
  learning_rate: 0.005
  seed: 0
```
*/

use crate::{classifier::ClassifierKind, pipeline::PipelineOptions};
use snowcast_util::error::{Error, Result};
use std::path::Path;

#[derive(Debug, Default, PartialEq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
	pub dataset: Option<DatasetConfig>,
	pub validation_fraction: Option<f32>,
	pub model: Option<ModelConfig>,
	pub train: Option<TrainConfig>,
}

#[derive(Debug, Default, PartialEq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
	pub size: Option<usize>,
	pub seed: Option<u64>,
}

#[derive(Debug, Default, PartialEq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
	pub kind: Option<ClassifierKind>,
}

#[derive(Debug, Default, PartialEq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainConfig {
	pub epochs: Option<usize>,
	pub batch_size: Option<usize>,
	pub learning_rate: Option<f32>,
	pub seed: Option<u64>,
}

/// Read and parse the config file at `config_path`, if one was given.
pub fn load_config(config_path: Option<&Path>) -> Result<Option<Config>> {
	if let Some(config_path) = config_path {
		let config = std::fs::read_to_string(config_path).map_err(|error| Error::Config {
			message: format!(
				"failed to read config file {}: {}",
				config_path.display(),
				error
			),
		})?;
		let config = parse_config(&config).map_err(|error| Error::Config {
			message: format!(
				"failed to parse config file {}: {}",
				config_path.display(),
				error
			),
		})?;
		Ok(Some(config))
	} else {
		Ok(None)
	}
}

pub fn parse_config(config: &str) -> std::result::Result<Config, serde_yaml::Error> {
	serde_yaml::from_str(config)
}

impl Config {
	/// Apply the values present in this config on top of `options`.
	pub fn apply(&self, options: &mut PipelineOptions) {
		if let Some(dataset) = &self.dataset {
			if let Some(size) = dataset.size {
				options.dataset_size = size;
			}
			if let Some(seed) = dataset.seed {
				options.dataset_seed = seed;
			}
		}
		if let Some(validation_fraction) = self.validation_fraction {
			options.validation_fraction = validation_fraction;
		}
		if let Some(kind) = self.model.as_ref().and_then(|model| model.kind) {
			options.kind = kind;
		}
		if let Some(train) = &self.train {
			if let Some(epochs) = train.epochs {
				options.train.epochs = epochs;
			}
			if let Some(batch_size) = train.batch_size {
				options.train.batch_size = batch_size;
			}
			if let Some(learning_rate) = train.learning_rate {
				options.train.learning_rate = learning_rate;
			}
			if let Some(seed) = train.seed {
				options.train.seed = seed;
			}
		}
	}
}
