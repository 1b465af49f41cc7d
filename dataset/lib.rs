/*!
This crate defines the data model for snowfall classification, a fixed 8-dimensional [`FeatureVector`](struct.FeatureVector.html) paired with one of three [`Label`](enum.Label.html)s, and the seeded [`generate`](fn.generate.html) function that synthesizes labeled datasets.
*/

#![allow(clippy::tabs_in_doc_comments)]

use itertools::izip;
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use snowcast_util::error::{Error, Operation, Result};

mod synthetic;

pub use self::synthetic::{generate, label_for, Lcg};

/// The number of dimensions in a [`FeatureVector`](struct.FeatureVector.html).
pub const N_FEATURES: usize = 8;

/// The number of classes in the label space.
pub const N_CLASSES: usize = 3;

/// The names of the feature dimensions, in order.
pub const FEATURE_NAMES: [&str; N_FEATURES] = [
	"temperature",
	"humidity",
	"pressure",
	"wind_speed",
	"elevation",
	"dew_point",
	"feels_like",
	"seasonal",
];

/**
A `FeatureVector` holds one observation. The order of the dimensions is fixed:

| index | dimension             | unit |
|-------|-----------------------|------|
| 0     | temperature           | °C   |
| 1     | humidity              | %    |
| 2     | pressure              | hPa  |
| 3     | wind speed            | m/s  |
| 4     | elevation             | m    |
| 5     | dew point             | °C   |
| 6     | feels-like temperature| °C   |
| 7     | seasonal phase        |      |
*/
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FeatureVector(pub [f32; N_FEATURES]);

impl FeatureVector {
	pub fn temperature(&self) -> f32 {
		self.0[0]
	}
	pub fn humidity(&self) -> f32 {
		self.0[1]
	}
	pub fn pressure(&self) -> f32 {
		self.0[2]
	}
	pub fn wind_speed(&self) -> f32 {
		self.0[3]
	}
	pub fn elevation(&self) -> f32 {
		self.0[4]
	}
	pub fn dew_point(&self) -> f32 {
		self.0[5]
	}
	pub fn feels_like(&self) -> f32 {
		self.0[6]
	}
	pub fn seasonal(&self) -> f32 {
		self.0[7]
	}
	pub fn as_slice(&self) -> &[f32] {
		&self.0
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Label {
	NoSnow = 0,
	LightSnow = 1,
	HeavySnow = 2,
}

impl Label {
	pub const ALL: [Label; N_CLASSES] = [Label::NoSnow, Label::LightSnow, Label::HeavySnow];

	pub fn index(self) -> usize {
		self as usize
	}

	pub fn from_index(index: usize) -> Option<Label> {
		Label::ALL.get(index).copied()
	}
}

impl std::fmt::Display for Label {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			Label::NoSnow => "No Snow",
			Label::LightSnow => "Light Snow",
			Label::HeavySnow => "Heavy Snow",
		};
		write!(f, "{}", s)
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
	pub features: FeatureVector,
	pub label: Label,
}

/// A `Dataset` is an ordered sequence of samples. The order matters: [`split`](#method.split) divides it by index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dataset(pub Vec<Sample>);

impl Dataset {
	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn samples(&self) -> &[Sample] {
		&self.0
	}

	pub fn iter(&self) -> std::slice::Iter<Sample> {
		self.0.iter()
	}

	/**
	Split this dataset into a training prefix and a validation suffix. The training prefix holds `floor(len * (1 - validation_fraction))` samples. No shuffling happens here, so the split is reproducible for a fixed seed and size.
	*/
	pub fn split(&self, validation_fraction: f32) -> Result<(Dataset, Dataset)> {
		if !(0.0..1.0).contains(&validation_fraction) {
			return Err(Error::precondition(
				Operation::Split,
				format!(
					"the validation fraction must be in [0, 1), got {}",
					validation_fraction
				),
			));
		}
		let split_index = ((1.0 - validation_fraction) * self.len().to_f32().unwrap())
			.to_usize()
			.unwrap();
		let (train, validation) = self.0.split_at(split_index);
		Ok((Dataset(train.to_vec()), Dataset(validation.to_vec())))
	}

	/// Copy the features into an array of shape (n_samples, n_features).
	pub fn features(&self) -> Array2<f32> {
		let mut features = Array2::zeros((self.len(), N_FEATURES));
		for (mut row, sample) in izip!(features.genrows_mut(), self.0.iter()) {
			for (feature, value) in izip!(row.iter_mut(), sample.features.0.iter()) {
				*feature = *value;
			}
		}
		features
	}

	/// Copy the labels into an array of class indexes.
	pub fn labels(&self) -> Array1<usize> {
		self.0.iter().map(|sample| sample.label.index()).collect()
	}

	/// Count the samples with each label.
	pub fn class_counts(&self) -> [usize; N_CLASSES] {
		let mut counts = [0; N_CLASSES];
		for sample in self.0.iter() {
			counts[sample.label.index()] += 1;
		}
		counts
	}
}

impl From<Vec<Sample>> for Dataset {
	fn from(samples: Vec<Sample>) -> Dataset {
		Dataset(samples)
	}
}
