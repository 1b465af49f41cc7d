/*!
This module is the query surface for single predictions. Callers supply temperature and humidity and may supply any of the other six dimensions. The rest default to mid-range values.
*/

use crate::classifier::Classify;
use snowcast_dataset::{FeatureVector, Label, N_CLASSES};
use snowcast_util::error::{Error, Operation, Result};

pub const DEFAULT_PRESSURE: f32 = 1013.0;
pub const DEFAULT_WIND_SPEED: f32 = 2.0;
pub const DEFAULT_ELEVATION: f32 = 100.0;
pub const DEFAULT_SEASONAL: f32 = 0.0;

/**
The raw values of one observation.

| field       | default                              |
|-------------|--------------------------------------|
| pressure    | 1013                                 |
| wind_speed  | 2                                    |
| elevation   | 100                                  |
| dew_point   | temperature - (100 - humidity) / 5   |
| feels_like  | temperature - 0.1 * wind_speed       |
| seasonal    | 0                                    |
*/
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PredictInput {
	pub temperature: f32,
	pub humidity: f32,
	#[serde(default)]
	pub pressure: Option<f32>,
	#[serde(default)]
	pub wind_speed: Option<f32>,
	#[serde(default)]
	pub elevation: Option<f32>,
	#[serde(default)]
	pub dew_point: Option<f32>,
	#[serde(default)]
	pub feels_like: Option<f32>,
	#[serde(default)]
	pub seasonal: Option<f32>,
}

impl PredictInput {
	pub fn new(temperature: f32, humidity: f32) -> PredictInput {
		PredictInput {
			temperature,
			humidity,
			..PredictInput::default()
		}
	}

	/// Fill in the defaults and check that every value is finite.
	pub fn to_features(&self) -> Result<FeatureVector> {
		let temperature = self.temperature;
		let humidity = self.humidity;
		let wind_speed = self.wind_speed.unwrap_or(DEFAULT_WIND_SPEED);
		let features = FeatureVector([
			temperature,
			humidity,
			self.pressure.unwrap_or(DEFAULT_PRESSURE),
			wind_speed,
			self.elevation.unwrap_or(DEFAULT_ELEVATION),
			self.dew_point
				.unwrap_or_else(|| temperature - (100.0 - humidity) / 5.0),
			self.feels_like
				.unwrap_or_else(|| temperature - wind_speed * 0.1),
			self.seasonal.unwrap_or(DEFAULT_SEASONAL),
		]);
		for (name, value) in snowcast_dataset::FEATURE_NAMES
			.iter()
			.zip(features.as_slice().iter())
		{
			if !value.is_finite() {
				return Err(Error::precondition(
					Operation::Predict,
					format!("{} must be finite, got {}", name, value),
				));
			}
		}
		Ok(features)
	}
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct PredictOutput {
	pub label: Label,
	pub label_name: String,
	/// Indexed by label: No Snow, Light Snow, Heavy Snow.
	pub probabilities: [f32; N_CLASSES],
}

pub fn predict<C>(classifier: &C, input: &PredictInput) -> Result<PredictOutput>
where
	C: Classify + ?Sized,
{
	let features = input.to_features()?;
	let label = classifier.predict(&features)?;
	let probabilities = classifier.predict_distribution(&features)?;
	Ok(PredictOutput {
		label,
		label_name: label.to_string(),
		probabilities,
	})
}
