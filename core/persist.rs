/*!
This module saves and loads trained classifiers.

A saved model is a single artifact: one major version byte, currently `0`, followed by the [`ClassifierState`](../classifier/enum.ClassifierState.html) encoded as MessagePack with named fields. The architecture, the weights, and the normalization stats are always written and read together.

Artifacts are kept in a [`ModelStore`](trait.ModelStore.html), a key value store whose writes are atomic.
*/

use crate::classifier::{Classifier, ClassifierState};
use log::info;
use snowcast_dataset::{N_CLASSES, N_FEATURES};
use snowcast_util::error::{Error, Operation, Result};
use std::{
	collections::BTreeMap,
	io::Write,
	path::{Path, PathBuf},
};

const MAJOR_VERSION: u8 = 0;

/// The file extension of artifacts in a [`DirectoryStore`](struct.DirectoryStore.html).
pub const EXTENSION: &str = "snowcast";

pub trait ModelStore {
	/// Read the artifact stored under `key`, or `None` if there is none.
	fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;
	/// Store `bytes` under `key`. A failed write leaves any previous artifact under `key` untouched.
	fn write(&mut self, key: &str, bytes: &[u8]) -> Result<()>;
}

/// A `ModelStore` that keeps artifacts in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
	artifacts: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
	pub fn new() -> MemoryStore {
		MemoryStore::default()
	}

	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.artifacts.keys().map(|key| key.as_str())
	}
}

impl ModelStore for MemoryStore {
	fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
		Ok(self.artifacts.get(key).cloned())
	}

	fn write(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
		self.artifacts.insert(key.to_owned(), bytes.to_owned());
		Ok(())
	}
}

/**
A `ModelStore` that keeps each artifact in its own file, `<directory>/<key>.snowcast`. Writes go to a temporary file in the same directory that is then renamed over the artifact, so readers see either the old artifact or the new one.

Keys must be non-empty, must not contain path separators, and must not start with a `.`.
*/
#[derive(Clone, Debug)]
pub struct DirectoryStore {
	directory: PathBuf,
}

impl DirectoryStore {
	/// Open the store in `directory`, creating the directory if it does not exist.
	pub fn open(directory: impl Into<PathBuf>) -> Result<DirectoryStore> {
		let directory = directory.into();
		std::fs::create_dir_all(&directory).map_err(|error| Error::io(Operation::Save, error))?;
		Ok(DirectoryStore { directory })
	}

	pub fn directory(&self) -> &Path {
		&self.directory
	}

	/// The path of the artifact stored under `key`.
	pub fn path(&self, key: &str, operation: Operation) -> Result<PathBuf> {
		let valid = !key.is_empty()
			&& !key.starts_with('.')
			&& !key.contains(|c: char| c == '/' || c == '\\' || std::path::is_separator(c));
		if !valid {
			return Err(Error::precondition(
				operation,
				format!("invalid model key \"{}\"", key),
			));
		}
		Ok(self.directory.join(format!("{}.{}", key, EXTENSION)))
	}

	fn temporary_path(&self, key: &str) -> PathBuf {
		self.directory.join(format!(".{}.{}.tmp", key, EXTENSION))
	}
}

impl ModelStore for DirectoryStore {
	fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
		let path = self.path(key, Operation::Load)?;
		match std::fs::read(&path) {
			Ok(bytes) => Ok(Some(bytes)),
			Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(error) => Err(Error::io(Operation::Load, error)),
		}
	}

	fn write(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
		let path = self.path(key, Operation::Save)?;
		let temporary_path = self.temporary_path(key);
		let write = || -> std::io::Result<()> {
			let mut file = std::fs::File::create(&temporary_path)?;
			file.write_all(bytes)?;
			file.sync_all()?;
			std::fs::rename(&temporary_path, &path)?;
			Ok(())
		};
		write().map_err(|error| {
			std::fs::remove_file(&temporary_path).ok();
			Error::io(Operation::Save, error)
		})
	}
}

/// Encode a trained classifier as an artifact. The heuristic classifier and untrained classifiers have nothing to persist and produce an `InvalidState` error.
pub fn export(classifier: &Classifier) -> Result<Vec<u8>> {
	encode(classifier, Operation::Export)
}

/// Decode an artifact produced by [`export`](fn.export.html) or [`save`](fn.save.html).
pub fn import(bytes: &[u8]) -> Result<ClassifierState> {
	decode(bytes, Operation::Import)
}

/// Encode `classifier` and store it under `key`.
pub fn save(store: &mut dyn ModelStore, key: &str, classifier: &Classifier) -> Result<()> {
	let bytes = encode(classifier, Operation::Save)?;
	store.write(key, &bytes)?;
	info!("saved model \"{}\" ({} bytes)", key, bytes.len());
	Ok(())
}

/// Load the artifact stored under `key`. A missing artifact is a `NotFound` error.
pub fn load(store: &dyn ModelStore, key: &str) -> Result<ClassifierState> {
	let bytes = store.read(key)?.ok_or_else(|| Error::NotFound {
		key: key.to_owned(),
	})?;
	let state = decode(&bytes, Operation::Load)?;
	info!("loaded model \"{}\"", key);
	Ok(state)
}

fn encode(classifier: &Classifier, operation: Operation) -> Result<Vec<u8>> {
	let state = match classifier {
		Classifier::Heuristic(_) => {
			return Err(Error::invalid_state(
				operation,
				"the heuristic classifier has no parameters to persist",
			))
		}
		Classifier::Trainable(classifier) => classifier.trained_state().ok_or_else(|| {
			Error::invalid_state(operation, "the classifier has not been trained")
		})?,
	};
	let state = ClassifierState::Trained(state.clone());
	let mut bytes = vec![MAJOR_VERSION];
	rmp_serde::encode::write_named(&mut bytes, &state).map_err(|error| {
		Error::Serialization {
			operation,
			message: error.to_string(),
		}
	})?;
	Ok(bytes)
}

fn decode(bytes: &[u8], operation: Operation) -> Result<ClassifierState> {
	let serialization_error = |message: String| Error::Serialization { operation, message };
	let (major_version, bytes) = bytes
		.split_first()
		.ok_or_else(|| serialization_error("the artifact is empty".to_owned()))?;
	if *major_version != MAJOR_VERSION {
		return Err(serialization_error(format!(
			"unknown major version {}",
			major_version
		)));
	}
	let state: ClassifierState =
		rmp_serde::from_slice(bytes).map_err(|error| serialization_error(error.to_string()))?;
	if let ClassifierState::Trained(state) = &state {
		state.architecture.validate().map_err(|error| serialization_error(error.to_string()))?;
		if state.architecture.n_inputs != N_FEATURES || state.architecture.n_outputs() != N_CLASSES {
			return Err(serialization_error(format!(
				"the architecture maps {} inputs to {} outputs, expected {} to {}",
				state.architecture.n_inputs,
				state.architecture.n_outputs(),
				N_FEATURES,
				N_CLASSES
			)));
		}
		if !state.network.matches(&state.architecture) {
			return Err(serialization_error(
				"the network weights do not match the architecture".to_owned(),
			));
		}
		if !state.network.is_finite() {
			return Err(serialization_error(
				"the artifact contains non-finite weights".to_owned(),
			));
		}
	}
	Ok(state)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::classifier::{Classify, HeuristicClassifier, TrainableClassifier, TrainedState};
	use rand::SeedableRng;
	use rand_xoshiro::Xoshiro256Plus;
	use snowcast_dataset::generate;
	use snowcast_features::NormalizationStats;
	use snowcast_nn::{Activation, Architecture, LayerSpec, Network};
	use snowcast_util::error::ErrorKind;

	#[test]
	fn test_heuristic_and_untrained_cannot_be_persisted() {
		let mut store = MemoryStore::new();
		let heuristic = Classifier::from(HeuristicClassifier);
		let error = save(&mut store, "winter-model", &heuristic).unwrap_err();
		assert_eq!(error.kind(), ErrorKind::InvalidState);
		assert_eq!(error.operation(), Operation::Save);
		let untrained = Classifier::from(TrainableClassifier::default());
		let error = export(&untrained).unwrap_err();
		assert_eq!(error.kind(), ErrorKind::InvalidState);
		assert_eq!(error.operation(), Operation::Export);
		assert_eq!(store.keys().count(), 0);
	}

	#[test]
	fn test_load_missing_key_is_not_found() {
		let store = MemoryStore::new();
		let error = load(&store, "winter-model").unwrap_err();
		assert_eq!(error.kind(), ErrorKind::NotFound);
	}

	#[test]
	fn test_import_rejects_bad_artifacts() {
		let error = import(&[]).unwrap_err();
		assert_eq!(error.kind(), ErrorKind::Serialization);
		let error = import(&[1, 2, 3]).unwrap_err();
		assert_eq!(error.kind(), ErrorKind::Serialization);
		assert!(error.to_string().contains("unknown major version 1"));
		let error = import(&[0, 0xc1]).unwrap_err();
		assert_eq!(error.kind(), ErrorKind::Serialization);
		assert_eq!(error.operation(), Operation::Import);
	}

	/// Encode `state` the way `export` does, without the checks `export` relies on.
	fn encode_unchecked(state: &ClassifierState) -> Vec<u8> {
		let mut bytes = vec![MAJOR_VERSION];
		rmp_serde::encode::write_named(&mut bytes, state).unwrap();
		bytes
	}

	fn trained_state(architecture: Architecture, network: Network) -> ClassifierState {
		ClassifierState::Trained(TrainedState {
			architecture,
			network,
			stats: NormalizationStats::fit(generate(20, 1).samples()).unwrap(),
			epochs_trained: 1,
		})
	}

	#[test]
	fn test_import_rejects_weights_that_do_not_match_the_architecture() {
		let mut rng = Xoshiro256Plus::seed_from_u64(0);
		let narrow = Architecture {
			n_inputs: 5,
			layers: vec![LayerSpec::Dense {
				units: 3,
				activation: Activation::Softmax,
			}],
		};
		let narrow_network = Network::new(&narrow, &mut rng).unwrap();
		// The weights of a 5 input network bundled with the default 8 input architecture.
		let bytes = encode_unchecked(&trained_state(Architecture::default(), narrow_network.clone()));
		let error = import(&bytes).unwrap_err();
		assert_eq!(error.kind(), ErrorKind::Serialization);
		assert_eq!(error.operation(), Operation::Import);
		// A consistent bundle that cannot take the 8 feature inputs.
		let bytes = encode_unchecked(&trained_state(narrow, narrow_network));
		assert_eq!(import(&bytes).unwrap_err().kind(), ErrorKind::Serialization);
		// The same checks guard load.
		let mut store = MemoryStore::new();
		let network = Network::new(&Architecture::default(), &mut rng).unwrap();
		let mut architecture = Architecture::default();
		architecture.layers[0] = LayerSpec::Dense {
			units: 16,
			activation: Activation::Relu,
		};
		store
			.write(
				"winter-model",
				&encode_unchecked(&trained_state(architecture, network.clone())),
			)
			.unwrap();
		let error = load(&store, "winter-model").unwrap_err();
		assert_eq!(error.kind(), ErrorKind::Serialization);
		assert_eq!(error.operation(), Operation::Load);
		// A well formed bundle still imports and predicts.
		let bytes = encode_unchecked(&trained_state(Architecture::default(), network));
		let classifier = Classifier::from_state(import(&bytes).unwrap());
		assert!(classifier
			.predict(&generate(1, 3).samples()[0].features)
			.is_ok());
	}

	#[test]
	fn test_directory_store_rejects_invalid_keys() {
		let directory = std::env::temp_dir().join(format!(
			"snowcast-persist-keys-{}",
			std::process::id()
		));
		let mut store = DirectoryStore::open(&directory).unwrap();
		for key in ["", ".hidden", "a/b", "../escape"].iter() {
			let error = store.write(key, b"bytes").unwrap_err();
			assert_eq!(error.kind(), ErrorKind::Precondition);
		}
		store.write("winter-model", b"bytes").unwrap();
		assert_eq!(
			store.read("winter-model").unwrap(),
			Some(b"bytes".to_vec())
		);
		assert_eq!(store.read("missing").unwrap(), None);
		assert!(directory.join("winter-model.snowcast").exists());
		std::fs::remove_dir_all(&directory).unwrap();
	}

	#[test]
	fn test_directory_store_failed_write_keeps_previous_artifact() {
		let directory = std::env::temp_dir().join(format!(
			"snowcast-persist-atomic-{}",
			std::process::id()
		));
		let mut store = DirectoryStore::open(&directory).unwrap();
		store.write("winter-model", b"first").unwrap();
		// A directory in the way of the temporary file makes the next write fail.
		std::fs::create_dir_all(directory.join(".winter-model.snowcast.tmp")).unwrap();
		let error = store.write("winter-model", b"second").unwrap_err();
		assert_eq!(error.kind(), ErrorKind::Io);
		assert_eq!(
			store.read("winter-model").unwrap(),
			Some(b"first".to_vec())
		);
		std::fs::remove_dir_all(&directory).unwrap();
	}
}
