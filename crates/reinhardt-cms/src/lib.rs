//! # Reinhardt CMS
//!
//! Placeholder and plugin management for the Reinhardt framework,
//! inspired by django-cms.
//!
//! ## Features
//!
//! - **Plugin Tree**: Ordered, nested, language-specific plugins stored with
//!   materialized paths
//! - **Placeholders**: Named content regions holding one plugin forest per language
//! - **Copy & Reorder Engines**: Shape-preserving deep copies and explicit sibling ordering
//! - **Clipboard**: Per-user cut/copy/paste staging area
//! - **Operation Signals**: Correlated before/after notifications for every admin action
//! - **Placeholder Admin**: Permission-checked, transactional add/edit/move/copy/delete/clear
//!
//! ## Architecture
//!
//! ```text
//! reinhardt-cms
//! ├── models      - Identifiers, placeholders and plugin nodes
//! ├── path        - Materialized path encoding
//! ├── tree        - Plugin tree store
//! ├── store       - Transactional database wrapper
//! ├── reorder     - Sibling reordering
//! ├── copy        - Plugin copy engine
//! ├── plugin_pool - Plugin type registry
//! ├── clipboard   - Per-user clipboard placeholders
//! ├── collector   - Deletion collector (protected objects)
//! ├── operations  - Placeholder operation notifier
//! ├── permissions - Users and permission policies
//! ├── settings    - CMS settings
//! ├── forms       - Admin request forms
//! └── admin       - Placeholder admin dispatcher
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use reinhardt_cms::prelude::*;
//!
//! let admin = PlaceholderAdmin::builder()
//!     .settings(CmsSettings::default())
//!     .plugin(GenericPlugin::new("TextPlugin"))
//!     .build()?;
//!
//! admin.notifier().pre_operation().connect(|op| async move {
//!     tracing::info!(kind = %op.kind, token = %op.token, "placeholder operation");
//!     Ok(())
//! });
//!
//! let user = CmsUser::superuser(1, "admin");
//! let request = AdminRequest::post("/admin/cms/clear-placeholder/1/?cms_path=/en/", user);
//! let response = admin.handle(request).await;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

// Re-export for callers building plugin data
pub use serde_json;

pub mod clipboard;
pub mod collector;
pub mod copy;
pub mod models;
pub mod operations;
pub mod path;
pub mod permissions;
pub mod plugin_pool;
pub mod reorder;
pub mod settings;
pub mod store;
pub mod tree;

#[cfg(feature = "admin")]
pub mod admin;
#[cfg(feature = "admin")]
pub mod forms;

// Prelude for convenient imports
pub mod prelude {
	//! Convenient re-exports of commonly used items

	pub use crate::error::{CmsError, CmsResult};
	pub use crate::models::{NewPlugin, Placeholder, PlaceholderId, PluginId, PluginNode, SourceRef};
	pub use crate::operations::{
		OperationContext, OperationKind, OperationNotifier, OperationPayload, OperationToken,
		PlaceholderOperation,
	};
	pub use crate::permissions::{CmsUser, ModelPermissionPolicy, PermissionPolicy};
	pub use crate::plugin_pool::{CmsPluginType, GenericPlugin, PluginPool};
	pub use crate::settings::{CmsSettings, PlaceholderConf};
	pub use crate::store::{CmsStore, Database, Transaction};
	pub use crate::tree::PluginTree;

	#[cfg(feature = "admin")]
	pub use crate::admin::{AdminRequest, AdminResponse, PlaceholderAdmin};
}

/// CMS error types
pub mod error {
	use reinhardt_signals::SignalError;
	use thiserror::Error;

	/// CMS-related errors
	#[derive(Error, Debug)]
	pub enum CmsError {
		/// The user lacks the capability required by the action
		#[error("Permission denied: {0}")]
		PermissionDenied(String),

		/// Referenced plugin or placeholder does not exist
		#[error("Not found: {0}")]
		NotFound(String),

		/// Malformed input to an action
		#[error("Validation error: {0}")]
		Validation(String),

		/// Protected-object deletion, cyclic reparent, exhausted path space
		#[error("Conflict: {0}")]
		Conflict(String),

		/// A placeholder plugin limit would be exceeded
		#[error("Plugin limit reached: {0}")]
		PluginLimitReached(String),

		/// The request method is not accepted by the endpoint
		#[error("Method not allowed: {0}")]
		MethodNotAllowed(String),

		/// A signal receiver vetoed the operation
		#[error("Signal error: {0}")]
		Signal(#[from] SignalError),

		/// Settings could not be loaded or are inconsistent
		#[error("Settings error: {0}")]
		Settings(String),
	}

	impl CmsError {
		/// HTTP status code the admin responds with for this error
		pub fn status_code(&self) -> http::StatusCode {
			match self {
				CmsError::PermissionDenied(_) => http::StatusCode::FORBIDDEN,
				CmsError::NotFound(_) => http::StatusCode::NOT_FOUND,
				CmsError::Validation(_) | CmsError::PluginLimitReached(_) => {
					http::StatusCode::BAD_REQUEST
				}
				CmsError::Conflict(_) => http::StatusCode::CONFLICT,
				CmsError::MethodNotAllowed(_) => http::StatusCode::METHOD_NOT_ALLOWED,
				CmsError::Signal(_) | CmsError::Settings(_) => {
					http::StatusCode::INTERNAL_SERVER_ERROR
				}
			}
		}
	}

	/// Result type for CMS operations
	pub type CmsResult<T> = Result<T, CmsError>;
}
