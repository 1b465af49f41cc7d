/*!
This crate implements feature normalization for snowfall classifiers. A [`NormalizationStats`](struct.NormalizationStats.html) is fit once on a training split and then applied, unchanged, to the validation split and to every input the resulting classifier is asked to predict.
*/

#![allow(clippy::tabs_in_doc_comments)]

mod normalized;

pub use self::normalized::{NormalizationStats, NormalizedFeature, MIN_STD};
