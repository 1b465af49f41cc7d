/*!
This crate implements the small feed-forward network behind the trainable snowfall classifier: dense layers with relu or softmax activations, batch normalization, dropout, and the Adam optimizer. Gradients are computed by hand for exactly these layer types.

```
use ndarray::prelude::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use snowcast_nn::{Adam, AdamOptions, Architecture, Network};

let architecture = Architecture::default();
let mut rng = Xoshiro256Plus::seed_from_u64(0);
let mut network = Network::new(&architecture, &mut rng).unwrap();
let mut adam = Adam::new(AdamOptions::default(), &network);
let features = Array2::<f32>::zeros((4, 8));
let labels = arr1(&[0, 1, 2, 0]);
let probabilities = network.train_batch(&mut adam, features.view(), labels.view(), &mut rng);
assert_eq!(probabilities.dim(), (4, 3));
```
*/

#![allow(clippy::tabs_in_doc_comments)]

mod adam;
mod architecture;
mod layers;
mod network;

pub use self::adam::{Adam, AdamOptions};
pub use self::architecture::{Activation, Architecture, LayerSpec};
pub use self::layers::{BatchNormalization, Dense, Dropout, Layer};
pub use self::network::{softmax, Network};
