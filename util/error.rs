use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// This enum names the pipeline operation that produced an [`Error`](enum.Error.html).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
	Split,
	Fit,
	Transform,
	Predict,
	Train,
	Evaluate,
	Save,
	Load,
	Export,
	Import,
	Configure,
}

impl std::fmt::Display for Operation {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			Operation::Split => "split",
			Operation::Fit => "fit",
			Operation::Transform => "transform",
			Operation::Predict => "predict",
			Operation::Train => "train",
			Operation::Evaluate => "evaluate",
			Operation::Save => "save",
			Operation::Load => "load",
			Operation::Export => "export",
			Operation::Import => "import",
			Operation::Configure => "configure",
		};
		write!(f, "{}", s)
	}
}

/// The kind of an [`Error`](enum.Error.html), without its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
	Precondition,
	NotReady,
	TrainingFailed,
	InvalidState,
	NotFound,
	Io,
	Serialization,
	Config,
}

#[derive(Debug, Error)]
pub enum Error {
	#[error("{operation}: precondition violated: {message}")]
	Precondition {
		operation: Operation,
		message: String,
	},
	#[error("{operation}: the classifier has not completed a training epoch")]
	NotReady { operation: Operation },
	#[error("train: training failed after epoch {last_successful_epoch}: {message}")]
	TrainingFailed {
		last_successful_epoch: usize,
		message: String,
	},
	#[error("{operation}: invalid state: {message}")]
	InvalidState {
		operation: Operation,
		message: String,
	},
	#[error("load: no model found under key \"{key}\"")]
	NotFound { key: String },
	#[error("{operation}: {source}")]
	Io {
		operation: Operation,
		#[source]
		source: std::io::Error,
	},
	#[error("{operation}: {message}")]
	Serialization {
		operation: Operation,
		message: String,
	},
	#[error("configure: {message}")]
	Config { message: String },
}

impl Error {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::Precondition { .. } => ErrorKind::Precondition,
			Error::NotReady { .. } => ErrorKind::NotReady,
			Error::TrainingFailed { .. } => ErrorKind::TrainingFailed,
			Error::InvalidState { .. } => ErrorKind::InvalidState,
			Error::NotFound { .. } => ErrorKind::NotFound,
			Error::Io { .. } => ErrorKind::Io,
			Error::Serialization { .. } => ErrorKind::Serialization,
			Error::Config { .. } => ErrorKind::Config,
		}
	}

	/// Retrieve the operation that failed.
	pub fn operation(&self) -> Operation {
		match self {
			Error::Precondition { operation, .. }
			| Error::NotReady { operation }
			| Error::InvalidState { operation, .. }
			| Error::Io { operation, .. }
			| Error::Serialization { operation, .. } => *operation,
			Error::TrainingFailed { .. } => Operation::Train,
			Error::NotFound { .. } => Operation::Load,
			Error::Config { .. } => Operation::Configure,
		}
	}

	pub fn precondition(operation: Operation, message: impl Into<String>) -> Error {
		Error::Precondition {
			operation,
			message: message.into(),
		}
	}

	pub fn invalid_state(operation: Operation, message: impl Into<String>) -> Error {
		Error::InvalidState {
			operation,
			message: message.into(),
		}
	}

	pub fn io(operation: Operation, source: std::io::Error) -> Error {
		Error::Io { operation, source }
	}
}

#[test]
fn test_error_kind_and_operation() {
	let error = Error::precondition(Operation::Fit, "no samples");
	assert_eq!(error.kind(), ErrorKind::Precondition);
	assert_eq!(error.operation(), Operation::Fit);
	assert_eq!(error.to_string(), "fit: precondition violated: no samples");
	let error = Error::NotFound {
		key: "winter-model".to_owned(),
	};
	assert_eq!(error.kind(), ErrorKind::NotFound);
	assert_eq!(error.operation(), Operation::Load);
	let error = Error::TrainingFailed {
		last_successful_epoch: 3,
		message: "loss is not finite".to_owned(),
	};
	assert_eq!(
		error.to_string(),
		"train: training failed after epoch 3: loss is not finite"
	);
}
