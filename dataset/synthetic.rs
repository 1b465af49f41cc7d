use crate::{Dataset, FeatureVector, Label, Sample};
use num_traits::ToPrimitive;

const LCG_MULTIPLIER: u64 = 9301;
const LCG_INCREMENT: u64 = 49297;
const LCG_MODULUS: u64 = 233_280;

/**
`Lcg` is the linear congruential generator `state = (state * 9301 + 49297) mod 233280`. Each draw returns `state / 233280`, a value in `[0, 1)`.

The seed is reduced modulo 233280 before the first step, which yields exactly the same sequence as running the recurrence on the unreduced seed.
*/
#[derive(Clone, Debug)]
pub struct Lcg {
	state: u64,
}

impl Lcg {
	pub fn new(seed: u64) -> Lcg {
		Lcg {
			state: seed % LCG_MODULUS,
		}
	}

	pub fn next_f64(&mut self) -> f64 {
		self.state = (self.state * LCG_MULTIPLIER + LCG_INCREMENT) % LCG_MODULUS;
		self.state.to_f64().unwrap() / LCG_MODULUS.to_f64().unwrap()
	}

	fn uniform(&mut self, low: f64, width: f64) -> f32 {
		(low + self.next_f64() * width).to_f32().unwrap()
	}
}

/**
This is the labeling rule for synthetic samples:

| label      | condition                                               |
|------------|---------------------------------------------------------|
| Heavy Snow | temperature ≤ -2 and humidity > 68 and wind speed < 12 |
| Light Snow | otherwise, temperature ≤ 1 and humidity > 55            |
| No Snow    | otherwise                                               |
*/
pub fn label_for(temperature: f32, humidity: f32, wind_speed: f32) -> Label {
	if temperature <= -2.0 && humidity > 68.0 && wind_speed < 12.0 {
		Label::HeavySnow
	} else if temperature <= 1.0 && humidity > 55.0 {
		Label::LightSnow
	} else {
		Label::NoSnow
	}
}

/**
Generate `count` labeled samples from `seed`. The same `(count, seed)` always produces the same dataset, bit for bit.

For each sample the generator draws, in order, temperature in [-30, 10), humidity in [5, 100), pressure in [980, 1050), wind speed in [0, 20) and elevation in [-50, 3950). The remaining dimensions are derived:

- dew point = temperature - (100 - humidity) / 5
- feels-like = temperature - 0.1 * wind speed
- seasonal = 5 * sin(index / 50)

The label is computed from the stored `f32` values, so applying [`label_for`](fn.label_for.html) to any generated sample reproduces its label. Labeling the `f64` draws instead would let a draw just above a threshold, such as a temperature a hair above -2, round onto it as an `f32` and carry a label the stored features contradict. The price is that such rare samples are labeled differently than a generator working in `f64` throughout would label them.
*/
pub fn generate(count: usize, seed: u64) -> Dataset {
	let mut rng = Lcg::new(seed);
	let samples = (0..count)
		.map(|index| {
			let temperature = rng.uniform(-30.0, 40.0);
			let humidity = rng.uniform(5.0, 95.0);
			let pressure = rng.uniform(980.0, 70.0);
			let wind_speed = rng.uniform(0.0, 20.0);
			let elevation = rng.uniform(-50.0, 4000.0);
			let dew_point = temperature - (100.0 - humidity) / 5.0;
			let feels_like = temperature - wind_speed * 0.1;
			let seasonal = (index.to_f64().unwrap() / 50.0).sin().to_f32().unwrap() * 5.0;
			let features = FeatureVector([
				temperature,
				humidity,
				pressure,
				wind_speed,
				elevation,
				dew_point,
				feels_like,
				seasonal,
			]);
			Sample {
				features,
				label: label_for(temperature, humidity, wind_speed),
			}
		})
		.collect::<Vec<_>>();
	Dataset(samples)
}
