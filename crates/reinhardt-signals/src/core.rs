//! Signal names

use std::fmt;

/// Name of a signal, carried into dispatch logs
///
/// ```
/// use reinhardt_signals::SignalName;
///
/// assert_eq!(SignalName::PRE_PLACEHOLDER_OPERATION.as_str(), "pre_placeholder_operation");
/// assert_eq!(SignalName::custom("plugin_rendered").to_string(), "plugin_rendered");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalName(&'static str);

impl SignalName {
	/// Sent before a placeholder operation mutates the plugin tree
	pub const PRE_PLACEHOLDER_OPERATION: Self = Self("pre_placeholder_operation");
	/// Sent after a placeholder operation mutated the plugin tree
	pub const POST_PLACEHOLDER_OPERATION: Self = Self("post_placeholder_operation");

	/// Name a signal of your own
	pub const fn custom(name: &'static str) -> Self {
		Self(name)
	}

	/// The name as a string
	pub fn as_str(&self) -> &'static str {
		self.0
	}
}

impl fmt::Display for SignalName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.0)
	}
}
