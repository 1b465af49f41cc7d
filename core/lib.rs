/*!
This crate is the snowfall classification pipeline: the [`Classify`](classifier/trait.Classify.html) abstraction and its heuristic and trainable implementations, the epoch-by-epoch [`Training`](train/struct.Training.html) engine, the [`evaluate`](evaluate/fn.evaluate.html) function, persistence of trained models, and the prediction query surface.

```
use snowcast_core::pipeline::{run, PipelineOptions};
use snowcast_core::classifier::ClassifierKind;
use snowcast_util::cancellation::CancellationToken;

let options = PipelineOptions {
	kind: ClassifierKind::Heuristic,
	..PipelineOptions::default()
};
let output = run(&options, &mut |_| {}, CancellationToken::new()).unwrap();
assert_eq!(output.report.accuracy, 1.0);
```
*/

#![allow(clippy::tabs_in_doc_comments)]

pub mod classifier;
pub mod config;
pub mod evaluate;
pub mod persist;
pub mod pipeline;
pub mod predict;
pub mod train;

pub use self::{
	classifier::{Classifier, ClassifierState, Classify},
	evaluate::evaluate,
	predict::predict,
	train::train,
};
