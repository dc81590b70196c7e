//! Signal error type

use thiserror::Error;

/// Error raised by a signal receiver
///
/// A receiver returning this error stops dispatch and the error is handed
/// back to the sender, which lets observers veto the operation that
/// triggered the signal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SignalError {
	message: String,
}

impl SignalError {
	/// Create a new signal error
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
		}
	}

	/// The error message
	pub fn message(&self) -> &str {
		&self.message
	}
}

impl From<String> for SignalError {
	fn from(message: String) -> Self {
		Self::new(message)
	}
}

impl From<&str> for SignalError {
	fn from(message: &str) -> Self {
		Self::new(message)
	}
}
