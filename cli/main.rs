//! This module contains the main entrypoint to the snowcast cli.

use self::progress_view::ProgressView;
use anyhow::{bail, Context, Result};
use clap::Clap;
use colored::Colorize;
use log::warn;
use snowcast_core::{
	classifier::{Classifier, ClassifierKind, HeuristicClassifier, TrainableClassifier},
	config::load_config,
	evaluate::evaluate,
	persist::{export, load, save, DirectoryStore},
	pipeline::PipelineOptions,
	predict::{predict, PredictInput},
	train::Training,
};
use snowcast_dataset::generate;
use snowcast_util::cancellation::CancellationToken;
use std::path::PathBuf;

mod progress_view;

#[derive(Clap)]
#[clap(
	about = "Train and query a snowfall classifier on synthetic weather data.",
	setting = clap::AppSettings::DisableHelpSubcommand,
)]
enum Options {
	#[clap(name = "train")]
	Train(Box<TrainOptions>),
	#[clap(name = "predict")]
	Predict(Box<PredictOptions>),
	#[clap(name = "evaluate")]
	Evaluate(Box<EvaluateOptions>),
	#[clap(name = "export")]
	Export(Box<ExportOptions>),
}

#[derive(Clap, Debug)]
#[clap(about = "train a classifier")]
#[clap(
	long_about = "generate a dataset, train a classifier on it, print its evaluation on the validation split, and save it"
)]
struct TrainOptions {
	#[clap(short, long, about = "the path to a config file")]
	config: Option<PathBuf>,
	#[clap(long, about = "heuristic or trainable")]
	kind: Option<ClassifierKind>,
	#[clap(long, about = "the number of samples to generate")]
	size: Option<usize>,
	#[clap(long, about = "the seed of the generated dataset")]
	seed: Option<u64>,
	#[clap(long, about = "the fraction of samples held out for validation")]
	validation_fraction: Option<f32>,
	#[clap(long)]
	epochs: Option<usize>,
	#[clap(long)]
	batch_size: Option<usize>,
	#[clap(long)]
	learning_rate: Option<f32>,
	#[clap(long, about = "the seed for weight initialization, shuffling, and dropout")]
	train_seed: Option<u64>,
	#[clap(long, default_value = "models", about = "the directory to save models in")]
	models: PathBuf,
	#[clap(short, long, default_value = "winter-model", about = "the name to save the model under")]
	name: String,
	#[clap(long = "no-progress", about = "disable the progress view", parse(from_flag = std::ops::Not::not))]
	progress: bool,
}

#[derive(Clap, Debug)]
#[clap(about = "make a prediction")]
#[clap(
	long_about = "predict the snowfall for one observation with a saved model, or with the heuristic classifier if no model name is given, and print the result as json"
)]
struct PredictOptions {
	#[clap(long, default_value = "models", about = "the directory models are saved in")]
	models: PathBuf,
	#[clap(short, long, about = "the name of the saved model")]
	name: Option<String>,
	#[clap(long, allow_hyphen_values = true)]
	temperature: f32,
	#[clap(long)]
	humidity: f32,
	#[clap(long)]
	pressure: Option<f32>,
	#[clap(long)]
	wind_speed: Option<f32>,
	#[clap(long, allow_hyphen_values = true)]
	elevation: Option<f32>,
	#[clap(long, allow_hyphen_values = true)]
	dew_point: Option<f32>,
	#[clap(long, allow_hyphen_values = true)]
	feels_like: Option<f32>,
	#[clap(long, allow_hyphen_values = true)]
	seasonal: Option<f32>,
}

#[derive(Clap, Debug)]
#[clap(about = "evaluate a saved model")]
#[clap(long_about = "evaluate a saved model on a freshly generated dataset")]
struct EvaluateOptions {
	#[clap(long, default_value = "models", about = "the directory models are saved in")]
	models: PathBuf,
	#[clap(short, long, about = "the name of the saved model")]
	name: String,
	#[clap(long, default_value = "2500", about = "the number of samples to generate")]
	size: usize,
	#[clap(long, default_value = "2", about = "the seed of the generated dataset")]
	seed: u64,
	#[clap(long, about = "print the report as json")]
	json: bool,
}

#[derive(Clap, Debug)]
#[clap(about = "export a saved model")]
#[clap(long_about = "write the artifact of a saved model to a file")]
struct ExportOptions {
	#[clap(long, default_value = "models", about = "the directory models are saved in")]
	models: PathBuf,
	#[clap(short, long, about = "the name of the saved model")]
	name: String,
	#[clap(short, long, about = "the path to write the artifact to")]
	output: PathBuf,
}

fn main() {
	let env = env_logger::Env::default().default_filter_or("snowcast=info");
	env_logger::from_env(env)
		.format_level(false)
		.format_module_path(false)
		.format_timestamp(None)
		.init();
	let options = Options::parse();
	let result = match options {
		Options::Train(options) => cli_train(*options),
		Options::Predict(options) => cli_predict(*options),
		Options::Evaluate(options) => cli_evaluate(*options),
		Options::Export(options) => cli_export(*options),
	};
	if let Err(error) = result {
		eprintln!("{}: {:#}", "error".red().bold(), error);
		std::process::exit(1);
	}
}

fn cli_train(options: TrainOptions) -> Result<()> {
	// Flags take precedence over the config file, which takes precedence over the defaults.
	let mut pipeline_options = PipelineOptions::default();
	if let Some(config) = load_config(options.config.as_deref())? {
		config.apply(&mut pipeline_options);
	}
	if let Some(kind) = options.kind {
		pipeline_options.kind = kind;
	}
	if let Some(size) = options.size {
		pipeline_options.dataset_size = size;
	}
	if let Some(seed) = options.seed {
		pipeline_options.dataset_seed = seed;
	}
	if let Some(validation_fraction) = options.validation_fraction {
		pipeline_options.validation_fraction = validation_fraction;
	}
	if let Some(epochs) = options.epochs {
		pipeline_options.train.epochs = epochs;
	}
	if let Some(batch_size) = options.batch_size {
		pipeline_options.train.batch_size = batch_size;
	}
	if let Some(learning_rate) = options.learning_rate {
		pipeline_options.train.learning_rate = learning_rate;
	}
	if let Some(train_seed) = options.train_seed {
		pipeline_options.train.seed = train_seed;
	}

	let dataset = generate(pipeline_options.dataset_size, pipeline_options.dataset_seed);
	let (train_dataset, validation_dataset) =
		dataset.split(pipeline_options.validation_fraction)?;
	let classifier = match pipeline_options.kind {
		ClassifierKind::Heuristic => Classifier::Heuristic(HeuristicClassifier),
		ClassifierKind::Trainable => {
			let mut training = Training::new(
				TrainableClassifier::default(),
				&train_dataset,
				&validation_dataset,
				pipeline_options.train,
				cancel_on_interrupt(),
			)?;
			let n_epochs = pipeline_options.train.epochs;
			let progress_view = if options.progress {
				Some(ProgressView::new(
					training.progress_counter().clone(),
					n_epochs,
				))
			} else {
				None
			};
			loop {
				if let Some(progress_view) = progress_view.as_ref() {
					if training.epochs_completed() < n_epochs {
						progress_view.start_epoch(training.epochs_completed() + 1);
					}
				}
				match training.next() {
					Some(event) => {
						let event = event?;
						eprintln!("\r\x1b[K{}", event);
					}
					None => break,
				}
			}
			drop(progress_view);
			Classifier::Trainable(training.into_classifier()?)
		}
	};

	let report = evaluate(&classifier, &validation_dataset)?;
	println!("{}", report);

	if classifier.kind() == ClassifierKind::Trainable {
		let mut store = DirectoryStore::open(&options.models)?;
		save(&mut store, &options.name, &classifier)?;
		eprintln!(
			"Your model was saved as \"{}\" in {}.",
			options.name,
			options.models.display()
		);
	}

	Ok(())
}

/// Return a token that is cancelled by the first interrupt, so training stops once the running epoch completes and the model trained so far is still evaluated and saved. A second interrupt exits immediately.
fn cancel_on_interrupt() -> CancellationToken {
	let cancellation = CancellationToken::new();
	let handle = cancellation.clone();
	std::thread::spawn(move || {
		let mut runtime = match tokio::runtime::Builder::new()
			.basic_scheduler()
			.enable_all()
			.build()
		{
			Ok(runtime) => runtime,
			Err(error) => {
				warn!("failed to listen for interrupts: {}", error);
				return;
			}
		};
		runtime.block_on(async move {
			if tokio::signal::ctrl_c().await.is_err() {
				return;
			}
			eprintln!("\r\x1b[Kstopping after the current epoch, interrupt again to exit");
			handle.cancel();
			if tokio::signal::ctrl_c().await.is_ok() {
				std::process::exit(130);
			}
		});
	});
	cancellation
}

fn cli_predict(options: PredictOptions) -> Result<()> {
	let classifier = match options.name.as_ref() {
		Some(name) => {
			let store = DirectoryStore::open(&options.models)?;
			Classifier::from_state(load(&store, name)?)
		}
		None => Classifier::Heuristic(HeuristicClassifier),
	};
	let input = PredictInput {
		temperature: options.temperature,
		humidity: options.humidity,
		pressure: options.pressure,
		wind_speed: options.wind_speed,
		elevation: options.elevation,
		dew_point: options.dew_point,
		feels_like: options.feels_like,
		seasonal: options.seasonal,
	};
	let output = predict(&classifier, &input)?;
	println!("{}", serde_json::to_string_pretty(&output)?);
	Ok(())
}

fn cli_evaluate(options: EvaluateOptions) -> Result<()> {
	let store = DirectoryStore::open(&options.models)?;
	let classifier = Classifier::from_state(load(&store, &options.name)?);
	let dataset = generate(options.size, options.seed);
	if dataset.is_empty() {
		bail!("the dataset size must be at least 1");
	}
	let report = evaluate(&classifier, &dataset)?;
	if options.json {
		println!("{}", serde_json::to_string_pretty(&report)?);
	} else {
		println!("{}", report);
	}
	Ok(())
}

fn cli_export(options: ExportOptions) -> Result<()> {
	let store = DirectoryStore::open(&options.models)?;
	let classifier = Classifier::from_state(load(&store, &options.name)?);
	let bytes = export(&classifier)?;
	std::fs::write(&options.output, &bytes)
		.with_context(|| format!("failed to write {}", options.output.display()))?;
	eprintln!(
		"The model \"{}\" was written to {}.",
		options.name,
		options.output.display()
	);
	Ok(())
}
