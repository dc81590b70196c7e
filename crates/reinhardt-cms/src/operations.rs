//! Placeholder operation notifier
//!
//! Every mutating admin action is bracketed by a `pre_placeholder_operation`
//! and a `post_placeholder_operation` signal. Both carry the same
//! [`OperationToken`] so receivers can pair them. A receiver returning an
//! error vetoes the action, which is then rolled back.
//!
//! ```
//! use reinhardt_cms::operations::{OperationContext, OperationKind, OperationNotifier, OperationPayload};
//! use reinhardt_cms::models::PlaceholderId;
//! use reinhardt_cms::settings::CmsSettings;
//!
//! # tokio_test_block(async {
//! let notifier = OperationNotifier::new();
//! notifier.post_operation().connect(|operation| async move {
//!     assert_eq!(operation.kind, OperationKind::ClearPlaceholder);
//!     Ok(())
//! });
//!
//! let context = OperationContext::from_cms_path("/en/about/", &CmsSettings::default());
//! let payload = OperationPayload::ClearPlaceholder {
//!     plugins: Vec::new(),
//!     placeholder: PlaceholderId(1),
//! };
//! let token = notifier
//!     .before(OperationKind::ClearPlaceholder, Some(&context), payload.clone())
//!     .await
//!     .unwrap();
//! notifier
//!     .after(OperationKind::ClearPlaceholder, &token, Some(&context), payload)
//!     .await
//!     .unwrap();
//! # });
//! # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use crate::error::CmsResult;
use crate::models::{PlaceholderId, PluginId, PluginNode};
use crate::settings::CmsSettings;
use reinhardt_signals::{Signal, SignalName};
use serde::Serialize;
use std::fmt;
use url::Url;
use uuid::Uuid;

/// Kind of a placeholder operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
	/// A plugin was created
	AddPlugin,
	/// A plugin's data was edited
	ChangePlugin,
	/// A plugin subtree was deleted
	DeletePlugin,
	/// A plugin was moved within or across placeholders
	MovePlugin,
	/// A plugin was moved into the clipboard
	CutPlugin,
	/// The clipboard plugin was copied into a placeholder
	PastePlugin,
	/// A clipboard placeholder reference was expanded into a placeholder
	PastePlaceholder,
	/// Plugins of one placeholder language were copied into another
	AddPluginsFromPlaceholder,
	/// A placeholder language was emptied
	ClearPlaceholder,
	/// Plugins were copied to the clipboard
	CopyToClipboard,
}

impl OperationKind {
	/// Operation name as sent to receivers
	pub fn as_str(&self) -> &'static str {
		match self {
			OperationKind::AddPlugin => "add_plugin",
			OperationKind::ChangePlugin => "change_plugin",
			OperationKind::DeletePlugin => "delete_plugin",
			OperationKind::MovePlugin => "move_plugin",
			OperationKind::CutPlugin => "cut_plugin",
			OperationKind::PastePlugin => "paste_plugin",
			OperationKind::PastePlaceholder => "paste_placeholder",
			OperationKind::AddPluginsFromPlaceholder => "add_plugins_from_placeholder",
			OperationKind::ClearPlaceholder => "clear_placeholder",
			OperationKind::CopyToClipboard => "copy_to_clipboard",
		}
	}
}

impl fmt::Display for OperationKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Where an operation was triggered from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationContext {
	/// Language the user was editing
	pub language: String,
	/// Path of the page the request originated from
	pub origin: String,
}

impl OperationContext {
	/// Derive the context from a `cms_path` query value
	///
	/// The language is the `language` query parameter of `cms_path`, else
	/// the first path segment when it is a configured language, else the
	/// default language.
	///
	/// ```
	/// use reinhardt_cms::operations::OperationContext;
	/// use reinhardt_cms::settings::CmsSettings;
	///
	/// let mut settings = CmsSettings::default();
	/// settings.languages.push("de".to_string());
	///
	/// let context = OperationContext::from_cms_path("/de/kontakt/?edit", &settings);
	/// assert_eq!(context.language, "de");
	/// assert_eq!(context.origin, "/de/kontakt/");
	///
	/// let context = OperationContext::from_cms_path("/de/kontakt/?language=en", &settings);
	/// assert_eq!(context.language, "en");
	/// ```
	pub fn from_cms_path(cms_path: &str, settings: &CmsSettings) -> Self {
		let parsed = Url::parse("http://localhost/").and_then(|base| base.join(cms_path));
		let Ok(parsed) = parsed else {
			return Self {
				language: settings.default_language.clone(),
				origin: cms_path.to_string(),
			};
		};

		let requested = parsed
			.query_pairs()
			.find(|(key, value)| key == "language" && !value.is_empty())
			.map(|(_, value)| value.into_owned())
			.or_else(|| {
				parsed
					.path_segments()
					.and_then(|mut segments| segments.next())
					.filter(|segment| settings.is_supported_language(segment))
					.map(str::to_string)
			});

		Self {
			language: settings.language_code(requested.as_deref()),
			origin: parsed.path().to_string(),
		}
	}

	/// Context of a request, `None` when it carries no usable `cms_path`
	pub fn from_request(cms_path: Option<&str>, settings: &CmsSettings) -> Option<Self> {
		cms_path
			.filter(|path| !path.is_empty())
			.map(|path| Self::from_cms_path(path, settings))
	}
}

/// Correlates the before and after signal of one action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationToken {
	id: Uuid,
	announced: bool,
}

impl OperationToken {
	/// Correlation id
	pub fn id(&self) -> Uuid {
		self.id
	}

	/// Whether the before signal was actually sent
	pub fn is_announced(&self) -> bool {
		self.announced
	}
}

impl fmt::Display for OperationToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.id)
	}
}

/// Operation specific data sent with both signals of an action
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum OperationPayload {
	/// See [`OperationKind::AddPlugin`]
	AddPlugin {
		/// The created plugin
		plugin: PluginNode,
		/// Target placeholder
		placeholder: PlaceholderId,
		/// Sibling order of the new plugin's group
		tree_order: Vec<PluginId>,
	},
	/// See [`OperationKind::ChangePlugin`]
	ChangePlugin {
		/// Plugin before the edit
		old_plugin: PluginNode,
		/// Plugin after the edit
		new_plugin: PluginNode,
	},
	/// See [`OperationKind::DeletePlugin`]
	DeletePlugin {
		/// Root of the deleted subtree
		plugin: PluginNode,
		/// Placeholder the plugin lived in
		placeholder: PlaceholderId,
		/// Sibling order of the plugin's group
		tree_order: Vec<PluginId>,
	},
	/// See [`OperationKind::MovePlugin`]
	MovePlugin {
		/// The moved plugin
		plugin: PluginNode,
		/// Language before the move
		source_language: String,
		/// Placeholder before the move
		source_placeholder: PlaceholderId,
		/// Parent before the move
		source_parent_id: Option<PluginId>,
		/// Order of the sibling group the plugin left
		source_order: Vec<PluginId>,
		/// Language after the move
		target_language: String,
		/// Placeholder after the move
		target_placeholder: PlaceholderId,
		/// Parent after the move
		target_parent_id: Option<PluginId>,
		/// Order of the sibling group the plugin joined
		target_order: Vec<PluginId>,
	},
	/// See [`OperationKind::CutPlugin`]
	CutPlugin {
		/// The cut plugin
		plugin: PluginNode,
		/// The user's clipboard
		clipboard: PlaceholderId,
		/// Language inside the clipboard
		clipboard_language: String,
		/// Language before the cut
		source_language: String,
		/// Placeholder before the cut
		source_placeholder: PlaceholderId,
		/// Parent before the cut
		source_parent_id: Option<PluginId>,
		/// Order of the sibling group the plugin left
		source_order: Vec<PluginId>,
	},
	/// See [`OperationKind::PastePlugin`]
	PastePlugin {
		/// Clipboard plugin before, pasted copy after
		plugin: PluginNode,
		/// Target language
		target_language: String,
		/// Target placeholder
		target_placeholder: PlaceholderId,
		/// Parent of the pasted copy
		target_parent_id: Option<PluginId>,
		/// Requested order of the target group
		target_order: Vec<PluginId>,
	},
	/// See [`OperationKind::PastePlaceholder`]
	PastePlaceholder {
		/// Wrapped plugins before, pasted copies after
		plugins: Vec<PluginNode>,
		/// Target language
		target_language: String,
		/// Target placeholder
		target_placeholder: PlaceholderId,
		/// Requested root order of the target
		target_order: Vec<PluginId>,
	},
	/// See [`OperationKind::AddPluginsFromPlaceholder`]
	AddPluginsFromPlaceholder {
		/// Source plugins before, copies after
		plugins: Vec<PluginNode>,
		/// Language copied from
		source_language: String,
		/// Placeholder copied from
		source_placeholder: PlaceholderId,
		/// Language copied to
		target_language: String,
		/// Placeholder copied to
		target_placeholder: PlaceholderId,
		/// Root order of the target
		target_order: Vec<PluginId>,
	},
	/// See [`OperationKind::ClearPlaceholder`]
	ClearPlaceholder {
		/// Plugins removed by the clear
		plugins: Vec<PluginNode>,
		/// Cleared placeholder
		placeholder: PlaceholderId,
	},
	/// See [`OperationKind::CopyToClipboard`]
	CopyToClipboard {
		/// Copied plugins before, clipboard copies after
		plugins: Vec<PluginNode>,
		/// Language copied from
		source_language: String,
		/// Placeholder copied from
		source_placeholder: PlaceholderId,
		/// The user's clipboard
		clipboard: PlaceholderId,
		/// Language inside the clipboard
		clipboard_language: String,
	},
}

impl OperationPayload {
	/// Ids of the plugins the payload is about
	pub fn affected_plugins(&self) -> Vec<PluginId> {
		match self {
			OperationPayload::AddPlugin { plugin, .. }
			| OperationPayload::DeletePlugin { plugin, .. }
			| OperationPayload::MovePlugin { plugin, .. }
			| OperationPayload::CutPlugin { plugin, .. }
			| OperationPayload::PastePlugin { plugin, .. } => vec![plugin.id],
			OperationPayload::ChangePlugin { new_plugin, .. } => vec![new_plugin.id],
			OperationPayload::PastePlaceholder { plugins, .. }
			| OperationPayload::AddPluginsFromPlaceholder { plugins, .. }
			| OperationPayload::ClearPlaceholder { plugins, .. }
			| OperationPayload::CopyToClipboard { plugins, .. } => {
				plugins.iter().map(|plugin| plugin.id).collect()
			}
		}
	}
}

/// Message delivered to operation signal receivers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceholderOperation {
	/// Operation kind
	pub kind: OperationKind,
	/// Correlation id shared by the before and after signal
	pub token: Uuid,
	/// Acting language
	pub language: String,
	/// Path the request originated from
	pub origin: String,
	/// Operation specific data
	pub payload: OperationPayload,
}

impl PlaceholderOperation {
	/// Ids of the plugins the operation is about
	pub fn affected_plugins(&self) -> Vec<PluginId> {
		self.payload.affected_plugins()
	}
}

/// Owns the before/after operation signals
#[derive(Debug, Clone)]
pub struct OperationNotifier {
	pre: Signal<PlaceholderOperation>,
	post: Signal<PlaceholderOperation>,
}

impl OperationNotifier {
	/// Create a notifier without receivers
	pub fn new() -> Self {
		Self {
			pre: Signal::new(SignalName::PRE_PLACEHOLDER_OPERATION),
			post: Signal::new(SignalName::POST_PLACEHOLDER_OPERATION),
		}
	}

	/// Signal sent before the tree is mutated
	pub fn pre_operation(&self) -> &Signal<PlaceholderOperation> {
		&self.pre
	}

	/// Signal sent after the tree was mutated
	pub fn post_operation(&self) -> &Signal<PlaceholderOperation> {
		&self.post
	}

	/// Announce an operation and return its token
	///
	/// Without a context (the request carried no `cms_path`) nothing is sent
	/// and the returned token is unannounced.
	///
	/// # Errors
	///
	/// [`crate::error::CmsError::Signal`] when a receiver vetoes the operation.
	pub async fn before(
		&self,
		kind: OperationKind,
		context: Option<&OperationContext>,
		payload: OperationPayload,
	) -> CmsResult<OperationToken> {
		let id = Uuid::new_v4();
		let Some(context) = context else {
			tracing::warn!(
				operation = %kind,
				"All custom placeholder admin endpoints require a \"cms_path\" query \
				 which points to the path where the request originates from; \
				 skipping operation signals"
			);
			return Ok(OperationToken {
				id,
				announced: false,
			});
		};

		self.pre
			.send(PlaceholderOperation {
				kind,
				token: id,
				language: context.language.clone(),
				origin: context.origin.clone(),
				payload,
			})
			.await?;

		Ok(OperationToken {
			id,
			announced: true,
		})
	}

	/// Report a completed operation
	///
	/// Skipped for unannounced tokens, so receivers never see an after
	/// signal without its before signal.
	pub async fn after(
		&self,
		kind: OperationKind,
		token: &OperationToken,
		context: Option<&OperationContext>,
		payload: OperationPayload,
	) -> CmsResult<()> {
		let Some(context) = context.filter(|_| token.announced) else {
			return Ok(());
		};

		self.post
			.send(PlaceholderOperation {
				kind,
				token: token.id,
				language: context.language.clone(),
				origin: context.origin.clone(),
				payload,
			})
			.await?;
		Ok(())
	}
}

impl Default for OperationNotifier {
	fn default() -> Self {
		Self::new()
	}
}
