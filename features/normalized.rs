use itertools::izip;
use ndarray::prelude::*;
use snowcast_dataset::{Dataset, FeatureVector, Sample, FEATURE_NAMES, N_FEATURES};
use snowcast_metrics::{MeanVariance, StreamingMetric};
use snowcast_util::error::{Error, Operation, Result};

/// Standard deviations below this value are replaced with 1.0.
pub const MIN_STD: f32 = 1e-6;

/**
A `NormalizedFeature` transforms one dimension to zero mean and unit variance. [Learn more](https://en.wikipedia.org/wiki/Feature_scaling#Standardization_(Z-score_Normalization).

# Example

For the training values `[0.0, 5.2, 1.3, 10.0]`:

Mean: 4.125

Standard Deviation: 3.87

`feature_value = (value - mean) / std`

| value | feature value                      |
|-------|------------------------------------|
| 0.0   | (0.0 - 4.125) / 3.87  = -1.06589   |
| 5.2   | (5.2 - 4.125) / 3.87  = 0.27778    |
| 1.3   | (1.3 - 4.125) / 3.87  = -0.72997   |
| 10.0  | (10.0 - 4.125) / 3.87 = 1.51809    |
*/
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NormalizedFeature {
	pub mean: f32,
	/// The population standard deviation of the training values, or 1.0 if that is zero, negligible, or not finite.
	pub std: f32,
}

impl NormalizedFeature {
	fn from_mean_variance(mean: f32, variance: f32) -> NormalizedFeature {
		let std = variance.sqrt();
		let std = if std.is_finite() && std >= MIN_STD {
			std
		} else {
			1.0
		};
		NormalizedFeature { mean, std }
	}

	pub fn apply(&self, value: f32) -> f32 {
		(value - self.mean) / self.std
	}
}

/**
`NormalizationStats` holds one [`NormalizedFeature`](struct.NormalizedFeature.html) per dimension of a [`FeatureVector`](../snowcast_dataset/struct.FeatureVector.html). It has no mutating methods: once fit, the stats are bound to the classifier trained with them.
*/
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NormalizationStats {
	features: [NormalizedFeature; N_FEATURES],
}

impl NormalizationStats {
	/// Fit the stats to `samples`, which must be the training split. Fitting to an empty set of samples is a precondition violation.
	pub fn fit(samples: &[Sample]) -> Result<NormalizationStats> {
		if samples.is_empty() {
			return Err(Error::precondition(
				Operation::Fit,
				"cannot fit normalization statistics to an empty set of samples",
			));
		}
		let mut metrics: Vec<MeanVariance> = vec![MeanVariance::default(); N_FEATURES];
		for sample in samples {
			for (metric, value) in izip!(metrics.iter_mut(), sample.features.0.iter()) {
				metric.update(*value);
			}
		}
		let mut features = [NormalizedFeature {
			mean: 0.0,
			std: 1.0,
		}; N_FEATURES];
		for (feature, metric, name) in izip!(features.iter_mut(), metrics, FEATURE_NAMES.iter()) {
			let output = metric.finalize().ok_or_else(|| {
				Error::precondition(Operation::Fit, format!("no values for {}", name))
			})?;
			*feature = NormalizedFeature::from_mean_variance(output.mean, output.variance);
		}
		Ok(NormalizationStats { features })
	}

	pub fn features(&self) -> &[NormalizedFeature; N_FEATURES] {
		&self.features
	}

	pub fn transform_features(&self, features: &FeatureVector) -> FeatureVector {
		let mut normalized = [0.0; N_FEATURES];
		for (normalized, feature, value) in
			izip!(normalized.iter_mut(), self.features.iter(), features.0.iter())
		{
			*normalized = feature.apply(*value);
		}
		FeatureVector(normalized)
	}

	/// Normalize every sample in `dataset`. Labels are carried over unchanged.
	pub fn transform(&self, dataset: &Dataset) -> Dataset {
		dataset
			.iter()
			.map(|sample| Sample {
				features: self.transform_features(&sample.features),
				label: sample.label,
			})
			.collect::<Vec<_>>()
			.into()
	}

	/// Normalize an array of shape (n_examples, n_features) in place.
	pub fn transform_array(&self, mut features: ArrayViewMut2<f32>) -> Result<()> {
		if features.ncols() != N_FEATURES {
			return Err(Error::precondition(
				Operation::Transform,
				format!(
					"expected {} feature columns, got {}",
					N_FEATURES,
					features.ncols()
				),
			));
		}
		for (mut column, feature) in izip!(features.gencolumns_mut(), self.features.iter()) {
			column.mapv_inplace(|value| feature.apply(value));
		}
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use snowcast_dataset::{generate, Label};

	fn column_stats(dataset: &Dataset, index: usize) -> (f32, f32) {
		let values: Vec<f32> = dataset.iter().map(|sample| sample.features.0[index]).collect();
		let output = MeanVariance::compute(&values).unwrap();
		(output.mean, output.variance.sqrt())
	}

	#[test]
	fn test_fit_transform_standardizes_training_split() {
		let (train, _) = generate(2500, 1).split(0.2).unwrap();
		let stats = NormalizationStats::fit(train.samples()).unwrap();
		let normalized = stats.transform(&train);
		for index in 0..N_FEATURES {
			let (mean, std) = column_stats(&normalized, index);
			assert!(mean.abs() < 1e-3, "{} mean {}", FEATURE_NAMES[index], mean);
			assert!((std - 1.0).abs() < 1e-3, "{} std {}", FEATURE_NAMES[index], std);
		}
	}

	#[test]
	fn test_constant_dimension_normalizes_to_zero() {
		let samples: Vec<Sample> = (0..10)
			.map(|index| {
				let mut features = [0.1; N_FEATURES];
				features[0] = index as f32;
				Sample {
					features: FeatureVector(features),
					label: Label::NoSnow,
				}
			})
			.collect();
		let stats = NormalizationStats::fit(&samples).unwrap();
		assert_eq!(stats.features()[1].std, 1.0);
		let normalized = stats.transform(&samples.clone().into());
		for sample in normalized.iter() {
			for value in sample.features.0[1..].iter() {
				assert_eq!(*value, 0.0);
			}
			assert!(sample.features.0[0].is_finite());
		}
	}

	#[test]
	fn test_fit_empty_is_precondition_error() {
		let error = NormalizationStats::fit(&[]).unwrap_err();
		assert_eq!(
			error.kind(),
			snowcast_util::error::ErrorKind::Precondition
		);
		assert_eq!(error.operation(), Operation::Fit);
	}

	#[test]
	fn test_transform_array_matches_transform() {
		let dataset = generate(100, 5);
		let stats = NormalizationStats::fit(dataset.samples()).unwrap();
		let mut features = dataset.features();
		stats.transform_array(features.view_mut()).unwrap();
		let expected = stats.transform(&dataset).features();
		assert_eq!(features, expected);
		let mut wrong_shape = Array2::<f32>::zeros((2, 3));
		assert!(stats.transform_array(wrong_shape.view_mut()).is_err());
	}

	#[test]
	fn test_validation_uses_training_stats() {
		let (train, validation) = generate(1000, 11).split(0.2).unwrap();
		let stats = NormalizationStats::fit(train.samples()).unwrap();
		let normalized = stats.transform(&validation);
		let sample = validation.samples()[0];
		let feature = stats.features()[0];
		assert_eq!(
			normalized.samples()[0].features.0[0],
			(sample.features.0[0] - feature.mean) / feature.std
		);
	}
}
