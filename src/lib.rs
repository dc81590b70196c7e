//! # Reinhardt Placeholders
//!
//! Placeholder and plugin management for Reinhardt, inspired by the
//! django-cms placeholder admin.
//!
//! ## Feature Flags
//!
//! - `full` (default) - Everything below
//! - `signals` - Typed async signal dispatch ([`signals`])
//! - `cms` - Plugin trees, copy and reorder engines, clipboard, permissions ([`cms`])
//! - `admin` - Placeholder admin endpoints and request forms
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use reinhardt_placeholders::prelude::*;
//!
//! let admin = PlaceholderAdmin::builder()
//!     .plugin(GenericPlugin::new("TextPlugin").name("Text"))
//!     .build()?;
//! let clipboard = admin.clipboard(&CmsUser::superuser(1, "admin")).await;
//! ```

#[cfg(feature = "signals")]
pub use reinhardt_signals as signals;

#[cfg(feature = "cms")]
pub use reinhardt_cms as cms;

/// Convenient re-exports of commonly used items
pub mod prelude {
	#[cfg(feature = "signals")]
	pub use crate::signals::{Signal, SignalError, SignalName};

	#[cfg(feature = "cms")]
	pub use crate::cms::prelude::*;
}
