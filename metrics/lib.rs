/*!
This crate defines the [`StreamingMetric`](trait.StreamingMetric.html) trait and the concrete metrics used to train and evaluate snowfall classifiers: [`Mean`](struct.Mean.html), [`MeanVariance`](struct.MeanVariance.html), [`Accuracy`](struct.Accuracy.html), [`CrossEntropy`](struct.CrossEntropy.html), and [`ClassificationMetrics`](struct.ClassificationMetrics.html).
*/

#![allow(clippy::tabs_in_doc_comments)]

mod accuracy;
mod classification;
mod cross_entropy;
mod mean;
mod mean_variance;

pub use self::accuracy::Accuracy;
pub use self::classification::{
	ClassMetrics, ClassificationMetrics, ClassificationMetricsInput, ClassificationMetricsOutput,
};
pub use self::cross_entropy::{CrossEntropy, CrossEntropyInput};
pub use self::mean::Mean;
pub use self::mean_variance::{merge_mean_m2, MeanVariance, MeanVarianceOutput};

/**
The `StreamingMetric` trait defines a common interface to metrics that can be computed in a streaming manner, where the input arrives one example or one batch at a time, such as accuracy and cross entropy.

After being initialized, a value of type `T` implementing the `StreamingMetric` trait can have `update()` called on it with values of the associated type `Input`. Multiple values of `T` can be merged together by calling `merge()`, which is how the per-batch metrics of an epoch are combined. When finished aggregating, call `finalize()` on the metric to produce the associated type `Output`.

# Examples

Here is a basic example implementation of a `Min` metric, which takes `f32`s as input and produces an `f32` as output that is the minimum of all the inputs.

```
use snowcast_metrics::StreamingMetric;

struct Min(f32);

impl StreamingMetric<'_> for Min {
	type Input = f32;
	type Output = f32;
	fn update(&mut self, input: Self::Input) {
		self.0 = self.0.min(input)
	}
	fn merge(&mut self, other: Self) { self.0 = self.0.min(other.0) }
	fn finalize(self) -> Self::Output { self.0 }
}
```

The generic lifetime `'a` allows `Input`s to borrow from their enclosing scope.
*/
pub trait StreamingMetric<'a> {
	/// `Input` is the type to aggregate in calls to `update()`.
	type Input;
	/// `Output` is the return type of `finalize()`.
	type Output;
	/// Update this streaming metric with the `Input` `input`.
	fn update(&mut self, input: Self::Input);
	/// Merge multiple independently computed streaming metrics.
	fn merge(&mut self, other: Self);
	/// When you are done aggregating `Input`s, call `finalize()` to produce an `Output`.
	fn finalize(self) -> Self::Output;
}
