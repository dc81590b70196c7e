//! # Reinhardt Signals
//!
//! Django-style signals for observing placeholder operations.
//!
//! Signals are plain values owned by whoever emits them. Receivers are
//! registered explicitly on a [`Signal`] instance rather than through a
//! process-wide registry, so every dispatcher carries its own observers.
//!
//! ## Example
//!
//! ```
//! use reinhardt_signals::{Signal, SignalName};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), reinhardt_signals::SignalError> {
//! let signal = Signal::<String>::new(SignalName::custom("greeting"));
//!
//! signal.connect(|message| async move {
//!     assert_eq!(message.as_str(), "hello");
//!     Ok(())
//! });
//!
//! signal.send("hello".to_string()).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod core;
pub mod error;
pub mod signal;

pub use crate::core::SignalName;
pub use crate::error::SignalError;
pub use crate::signal::{ReceiverId, Signal};
