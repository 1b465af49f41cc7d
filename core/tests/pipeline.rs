use snowcast_core::{
	classifier::{Classifier, ClassifierKind, ClassifierState, Classify, HeuristicClassifier, TrainableClassifier},
	evaluate::evaluate,
	persist::{export, import, load, save, DirectoryStore, MemoryStore},
	pipeline::{run, PipelineOptions},
	predict::{predict, PredictInput},
	train::{train, TrainOptions, Training},
};
use snowcast_dataset::{generate, Dataset};
use snowcast_util::{cancellation::CancellationToken, error::ErrorKind};
use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc,
};

fn splits() -> (Dataset, Dataset) {
	generate(2500, 1).split(0.2).unwrap()
}

fn short_training(epochs: usize) -> TrainableClassifier {
	let (train_dataset, validation_dataset) = splits();
	train(
		TrainableClassifier::default(),
		&train_dataset,
		&validation_dataset,
		TrainOptions {
			epochs,
			..TrainOptions::default()
		},
		&mut |_| {},
		CancellationToken::new(),
	)
	.unwrap()
}

#[test]
fn test_trainable_reaches_validation_accuracy() {
	let mut events = Vec::new();
	let output = run(
		&PipelineOptions::default(),
		&mut |event| events.push(*event),
		CancellationToken::new(),
	)
	.unwrap();
	assert_eq!(events.len(), 25);
	assert_eq!(events.last().unwrap().epoch, 25);
	assert!(
		output.report.accuracy >= 0.85,
		"validation accuracy {}",
		output.report.accuracy
	);
	assert_eq!(output.report.n_examples, 500);
	let total: u64 = output.report.confusion_matrix.iter().flatten().sum();
	assert_eq!(total, 500);
	assert!(events.last().unwrap().validation_accuracy >= 0.85);
}

#[test]
fn test_heuristic_is_exact_on_any_generated_dataset() {
	for seed in [1, 2, 3, 1000, 233_281].iter() {
		let report = evaluate(&HeuristicClassifier, &generate(1000, *seed)).unwrap();
		assert_eq!(report.accuracy, 1.0, "seed {}", seed);
	}
	let output = run(
		&PipelineOptions {
			kind: ClassifierKind::Heuristic,
			..PipelineOptions::default()
		},
		&mut |_| panic!("the heuristic classifier does not train"),
		CancellationToken::new(),
	)
	.unwrap();
	assert_eq!(output.report.accuracy, 1.0);
	assert!(output.events.is_empty());
}

#[test]
fn test_cancel_after_epoch_k_trains_exactly_k_epochs() {
	let (train_dataset, validation_dataset) = splits();
	let cancellation = CancellationToken::new();
	let handle = cancellation.clone();
	let mut epochs = Vec::new();
	let classifier = train(
		TrainableClassifier::default(),
		&train_dataset,
		&validation_dataset,
		TrainOptions {
			epochs: 10,
			..TrainOptions::default()
		},
		&mut |event| {
			epochs.push(event.epoch);
			if event.epoch == 3 {
				handle.cancel();
			}
		},
		cancellation,
	)
	.unwrap();
	assert_eq!(epochs, vec![1, 2, 3]);
	assert_eq!(classifier.epochs_trained(), 3);
	// The weights are exactly those of an uncancelled three epoch run.
	assert_eq!(classifier, short_training(3));
}

#[test]
fn test_cancel_from_another_thread_during_an_epoch_completes_that_epoch() {
	let (train_dataset, validation_dataset) = splits();
	let cancellation = CancellationToken::new();
	let mut training = Training::new(
		TrainableClassifier::default(),
		&train_dataset,
		&validation_dataset,
		TrainOptions {
			epochs: 10,
			..TrainOptions::default()
		},
		cancellation.clone(),
	)
	.unwrap();
	let progress_counter = training.progress_counter().clone();
	let mut events = vec![training.next().unwrap().unwrap()];
	// Each round watches one epoch from another thread. The watcher cancels as soon as it sees the epoch partly done.
	let mut cancelled_during = None;
	while cancelled_during.is_none() {
		assert!(events.len() < 10, "the watcher never saw an epoch in progress");
		let stop = Arc::new(AtomicBool::new(false));
		let watcher = {
			let progress_counter = progress_counter.clone();
			let cancellation = cancellation.clone();
			let stop = stop.clone();
			std::thread::spawn(move || {
				while !stop.load(Ordering::SeqCst) {
					let current = progress_counter.get();
					if current > 0 && current < progress_counter.total() {
						cancellation.cancel();
						return Some(current);
					}
					std::thread::yield_now();
				}
				None
			})
		};
		events.push(training.next().unwrap().unwrap());
		stop.store(true, Ordering::SeqCst);
		if watcher.join().unwrap().is_some() {
			cancelled_during = Some(events.len());
		}
	}
	let epochs = cancelled_during.unwrap();
	assert!(training.next().is_none());
	assert_eq!(
		events.iter().map(|event| event.epoch).collect::<Vec<_>>(),
		(1..=epochs).collect::<Vec<_>>()
	);
	let classifier = training.into_classifier().unwrap();
	assert_eq!(classifier.epochs_trained(), epochs);
	assert_eq!(classifier, short_training(epochs));
}

#[test]
fn test_cancel_before_training_still_completes_the_first_epoch() {
	let (train_dataset, validation_dataset) = splits();
	let cancellation = CancellationToken::new();
	cancellation.cancel();
	let mut training = Training::new(
		TrainableClassifier::default(),
		&train_dataset,
		&validation_dataset,
		TrainOptions::default(),
		cancellation,
	)
	.unwrap();
	let progress_counter = training.progress_counter().clone();
	assert_eq!(training.next().unwrap().unwrap().epoch, 1);
	assert_eq!(progress_counter.get(), 2000);
	assert!(training.next().is_none());
	assert!(training.next().is_none());
	assert_eq!(training.into_classifier().unwrap().epochs_trained(), 1);
}

#[test]
fn test_persistence_round_trip_preserves_predictions() {
	let classifier = Classifier::from(short_training(2));
	let mut store = MemoryStore::new();
	save(&mut store, "winter-model", &classifier).unwrap();
	let state = load(&store, "winter-model").unwrap();
	match &state {
		ClassifierState::Trained(state) => assert_eq!(state.epochs_trained, 2),
		ClassifierState::Heuristic => panic!("expected a trained state"),
	}
	let loaded = Classifier::from_state(state);
	assert_eq!(loaded, classifier);
	for sample in generate(200, 77).iter() {
		assert_eq!(
			loaded.predict_distribution(&sample.features).unwrap(),
			classifier.predict_distribution(&sample.features).unwrap()
		);
	}
	let bytes = export(&classifier).unwrap();
	assert_eq!(bytes[0], 0);
	assert_eq!(Classifier::from_state(import(&bytes).unwrap()), classifier);
	let mut corrupted = bytes.clone();
	corrupted[0] = 9;
	assert_eq!(import(&corrupted).unwrap_err().kind(), ErrorKind::Serialization);
	assert_eq!(
		load(&store, "summer-model").unwrap_err().kind(),
		ErrorKind::NotFound
	);
}

#[test]
fn test_directory_store_round_trip() {
	let directory = std::env::temp_dir().join(format!(
		"snowcast-directory-store-{}",
		std::process::id()
	));
	let classifier = Classifier::from(short_training(1));
	let mut store = DirectoryStore::open(&directory).unwrap();
	save(&mut store, "winter-model", &classifier).unwrap();
	let reopened = DirectoryStore::open(&directory).unwrap();
	let loaded = Classifier::from_state(load(&reopened, "winter-model").unwrap());
	assert_eq!(loaded, classifier);
	std::fs::remove_dir_all(&directory).unwrap();
}

#[test]
fn test_predict_with_trained_classifier() {
	let classifier = Classifier::from(short_training(5));
	let output = predict(&classifier, &PredictInput::new(25.0, 20.0)).unwrap();
	let sum: f32 = output.probabilities.iter().sum();
	assert!((sum - 1.0).abs() < 1e-4);
	assert_eq!(output.label_name, output.label.to_string());
}
