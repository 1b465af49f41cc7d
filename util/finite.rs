use num_traits::Float;
use thiserror::Error;

/// A float that is known to be neither NaN nor infinite.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Finite<T>(T)
where
	T: Float;

#[derive(Debug, Error)]
#[error("{what} is not finite")]
pub struct NotFiniteError {
	pub what: &'static str,
}

impl<T> Finite<T>
where
	T: Float,
{
	/// Wrap `value`, naming it `what` in the error if it is not finite.
	pub fn new(value: T, what: &'static str) -> Result<Self, NotFiniteError> {
		if value.is_finite() {
			Ok(Self(value))
		} else {
			Err(NotFiniteError { what })
		}
	}

	pub fn get(self) -> T {
		self.0
	}
}

impl<T> std::ops::Deref for Finite<T>
where
	T: Float,
{
	type Target = T;
	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<T> std::fmt::Display for Finite<T>
where
	T: Float + std::fmt::Display,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

#[test]
fn test_finite() {
	assert_eq!(Finite::new(1.5f32, "loss").unwrap().get(), 1.5);
	let error = Finite::new(f32::NAN, "loss").unwrap_err();
	assert_eq!(error.to_string(), "loss is not finite");
	assert!(Finite::new(f64::INFINITY, "loss").is_err());
}
