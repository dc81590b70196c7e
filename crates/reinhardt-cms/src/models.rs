//! Placeholder and plugin records
//!
//! These are the persisted shapes the tree store and the admin operate on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

macro_rules! id_type {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(pub u64);

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl FromStr for $name {
			type Err = std::num::ParseIntError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				s.trim().parse().map(Self)
			}
		}

		impl From<u64> for $name {
			fn from(value: u64) -> Self {
				Self(value)
			}
		}
	};
}

id_type!(
	/// Plugin primary key
	PluginId
);
id_type!(
	/// Placeholder primary key
	PlaceholderId
);

/// The object a placeholder is attached to (a page, a model field, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
	/// Kind of the owning object, e.g. `"page"`
	pub kind: String,
	/// Identifier of the owning object
	pub id: String,
}

impl SourceRef {
	/// Create a source reference
	pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
		Self {
			kind: kind.into(),
			id: id.into(),
		}
	}
}

/// A named content region holding one plugin forest per language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placeholder {
	/// Primary key
	pub id: PlaceholderId,
	/// Slot label, used to look up placeholder configuration
	pub slot: String,
	/// Default width hint handed to plugins
	pub default_width: Option<u32>,
	/// Owning object, if any
	pub source: Option<SourceRef>,
	/// Bumped whenever cached renderings must be discarded
	pub cache_version: u64,
	/// Languages whose content changed since the last publish
	pub dirty_languages: BTreeSet<String>,
}

impl Placeholder {
	pub(crate) fn new(id: PlaceholderId, slot: impl Into<String>) -> Self {
		Self {
			id,
			slot: slot.into(),
			default_width: None,
			source: None,
			cache_version: 0,
			dirty_languages: BTreeSet::new(),
		}
	}

	/// Human readable label derived from the slot name
	///
	/// ```
	/// # use reinhardt_cms::models::{Placeholder, PlaceholderId};
	/// # use reinhardt_cms::store::CmsStore;
	/// let mut store = CmsStore::new();
	/// let id = store.create_placeholder("main_content", None);
	/// assert_eq!(store.placeholder(id).unwrap().label(), "Main Content");
	/// ```
	pub fn label(&self) -> String {
		self.slot
			.split(['_', '-', ' '])
			.filter(|part| !part.is_empty())
			.map(|part| {
				let mut chars = part.chars();
				match chars.next() {
					Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
					None => String::new(),
				}
			})
			.collect::<Vec<_>>()
			.join(" ")
	}

	/// Record that `language` changed, optionally invalidating caches
	pub fn mark_as_dirty(&mut self, language: &str, clear_cache: bool) {
		self.dirty_languages.insert(language.to_string());
		if clear_cache {
			self.cache_version += 1;
		}
	}

	/// Whether `language` has unpublished changes
	pub fn is_dirty(&self, language: &str) -> bool {
		self.dirty_languages.contains(language)
	}
}

/// A plugin instance positioned in a placeholder's tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginNode {
	/// Primary key
	pub id: PluginId,
	/// Type tag resolved through the plugin pool
	pub plugin_type: String,
	/// Language partition the plugin belongs to
	pub language: String,
	/// Owning placeholder
	pub placeholder_id: PlaceholderId,
	/// Parent plugin, `None` for roots
	pub parent_id: Option<PluginId>,
	/// Materialized path
	pub path: String,
	/// Tree depth, 1 for roots
	pub depth: usize,
	/// Zero-based position among siblings
	pub position: usize,
	/// Number of direct children
	pub numchild: usize,
	/// Type-specific field values
	pub data: JsonValue,
	/// Creation timestamp
	pub created_at: DateTime<Utc>,
	/// Last modification timestamp
	pub changed_at: DateTime<Utc>,
}

impl PluginNode {
	/// Whether this plugin has no parent
	pub fn is_root(&self) -> bool {
		self.parent_id.is_none()
	}

	/// Whether `other` lives in this plugin's subtree (excluding itself)
	pub fn is_ancestor_of(&self, other: &PluginNode) -> bool {
		crate::path::is_descendant_path(&other.path, &self.path)
	}
}

/// Attributes for a plugin about to be created
#[derive(Debug, Clone, PartialEq)]
pub struct NewPlugin {
	/// Target placeholder
	pub placeholder_id: PlaceholderId,
	/// Target language
	pub language: String,
	/// Type tag
	pub plugin_type: String,
	/// Parent plugin, `None` to create a root
	pub parent_id: Option<PluginId>,
	/// Position among siblings, `None` to append
	pub position: Option<usize>,
	/// Type-specific field values
	pub data: JsonValue,
}

impl NewPlugin {
	/// Create the attributes for a root plugin appended to `placeholder_id`
	pub fn new(
		placeholder_id: PlaceholderId,
		language: impl Into<String>,
		plugin_type: impl Into<String>,
	) -> Self {
		Self {
			placeholder_id,
			language: language.into(),
			plugin_type: plugin_type.into(),
			parent_id: None,
			position: None,
			data: JsonValue::Object(Default::default()),
		}
	}

	/// Nest the plugin under `parent`
	pub fn parent(mut self, parent: PluginId) -> Self {
		self.parent_id = Some(parent);
		self
	}

	/// Insert at `position` instead of appending
	pub fn position(mut self, position: usize) -> Self {
		self.position = Some(position);
		self
	}

	/// Set the type-specific field values
	pub fn data(mut self, data: JsonValue) -> Self {
		self.data = data;
		self
	}
}
