//! Per-user clipboard placeholders
//!
//! Each user owns one placeholder that stages cut and copied content. It is
//! created on first use and holds at most one top-level plugin.

use crate::collector;
use crate::error::CmsResult;
use crate::models::{PlaceholderId, PluginNode, SourceRef};
use crate::store::CmsStore;

/// Source kind recorded on clipboard placeholders
pub const CLIPBOARD_SOURCE: &str = "clipboard";

/// Clipboard placeholder of `user_id`, creating it on first use
pub fn get_or_create(store: &mut CmsStore, user_id: u64, slot: &str) -> PlaceholderId {
	if let Some(existing) = store.clipboard_of(user_id)
		&& store.placeholder(existing).is_ok()
	{
		return existing;
	}

	let id = store.create_placeholder(
		slot,
		Some(SourceRef::new(CLIPBOARD_SOURCE, user_id.to_string())),
	);
	store.register_clipboard(user_id, id);
	tracing::debug!(user = user_id, placeholder = %id, "Created clipboard");
	id
}

/// Remove the current clipboard content, including wrapped placeholders
pub fn empty(store: &mut CmsStore, clipboard: PlaceholderId) -> CmsResult<usize> {
	let plan = collector::clear_placeholder(store, clipboard, None)?;
	Ok(plan.deleted.len())
}

/// The single top-level plugin held by the clipboard
pub fn content(store: &CmsStore, clipboard: PlaceholderId) -> Option<&PluginNode> {
	store
		.tree()
		.plugins(clipboard, None)
		.into_iter()
		.find(|node| node.is_root())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::models::NewPlugin;
	use rstest::rstest;

	#[rstest]
	fn test_clipboard_is_created_once_per_user() {
		// Arrange
		let mut store = CmsStore::new();

		// Act
		let first = get_or_create(&mut store, 1, "clipboard");
		let again = get_or_create(&mut store, 1, "clipboard");
		let other = get_or_create(&mut store, 2, "clipboard");

		// Assert
		assert_eq!(first, again);
		assert_ne!(first, other);
		assert_eq!(store.clipboard_owner(first), Some(1));
	}

	#[rstest]
	fn test_empty_removes_previous_content() {
		// Arrange
		let mut store = CmsStore::new();
		let clipboard = get_or_create(&mut store, 1, "clipboard");
		let staged = store
			.tree_mut()
			.insert(NewPlugin::new(clipboard, "en", "TextPlugin"))
			.unwrap();
		store
			.tree_mut()
			.insert(NewPlugin::new(clipboard, "en", "TextPlugin").parent(staged.id))
			.unwrap();

		// Act
		let removed = empty(&mut store, clipboard).unwrap();

		// Assert
		assert_eq!(removed, 2);
		assert!(content(&store, clipboard).is_none());
	}
}
