//! Deletion collector
//!
//! Collects everything a plugin deletion touches before anything is removed:
//! the plugin subtrees, placeholders owned by reference plugins, protecting
//! relations and alias plugins whose references must be nulled.

use crate::error::{CmsError, CmsResult};
use crate::models::{PlaceholderId, PluginId, PluginNode};
use crate::plugin_pool::{AliasPlugin, PlaceholderPlugin};
use crate::store::{CmsStore, Protection};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;

/// Everything a deletion would remove or modify
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeletionPlan {
	/// Roots of the deleted subtrees
	pub roots: Vec<PluginId>,
	/// Every deleted plugin, in path order
	pub deleted: Vec<PluginNode>,
	/// Placeholders owned by deleted reference plugins
	pub placeholders: Vec<PlaceholderId>,
	/// Relations that forbid the deletion
	pub protected: Vec<Protection>,
	/// Alias plugins that lose their target
	pub nulled_aliases: Vec<PluginId>,
}

impl DeletionPlan {
	/// Whether protected objects block the deletion
	pub fn is_protected(&self) -> bool {
		!self.protected.is_empty()
	}

	/// Display labels of the deleted plugins, as shown in confirmations
	pub fn deleted_labels(&self) -> Vec<String> {
		self.deleted
			.iter()
			.map(|node| format!("{} #{}", node.plugin_type, node.id))
			.collect()
	}

	/// Display labels of the protecting objects
	pub fn protected_labels(&self) -> Vec<String> {
		self.protected
			.iter()
			.map(|protection| protection.protector.clone())
			.collect()
	}
}

/// Collect the effects of deleting `roots` and their subtrees
pub fn collect(store: &CmsStore, roots: &[PluginId]) -> CmsResult<DeletionPlan> {
	let mut plan = DeletionPlan::default();
	let mut seen = BTreeSet::new();
	let mut pending: Vec<PluginId> = roots.to_vec();

	while let Some(root) = pending.pop() {
		if seen.contains(&root) {
			continue;
		}
		if roots.contains(&root) {
			plan.roots.push(root);
		}
		for node in store.tree().get_tree(root)? {
			if !seen.insert(node.id) {
				continue;
			}
			if let Some(reference) = PlaceholderPlugin::owned_placeholder(store, node)
				&& !plan.placeholders.contains(&reference)
			{
				plan.placeholders.push(reference);
				pending.extend(
					store
						.tree()
						.plugins(reference, None)
						.into_iter()
						.filter(|wrapped| wrapped.is_root())
						.map(|wrapped| wrapped.id),
				);
			}
			plan.deleted.push(node.clone());
		}
	}
	plan.roots.sort();
	plan.deleted.sort_by(|a, b| a.path.cmp(&b.path));

	plan.protected = store
		.protections_for(&seen)
		.into_iter()
		.cloned()
		.collect();

	plan.nulled_aliases = store
		.tree()
		.iter()
		.filter(|node| node.plugin_type == AliasPlugin::TYPE && !seen.contains(&node.id))
		.filter(|node| {
			AliasPlugin::plugin(node).is_some_and(|target| seen.contains(&target))
				|| AliasPlugin::alias_placeholder(node)
					.is_some_and(|target| plan.placeholders.contains(&target))
		})
		.map(|node| node.id)
		.collect();

	Ok(plan)
}

/// Carry out a collected plan
///
/// # Errors
///
/// [`CmsError::Conflict`] when protected objects exist; nothing is removed in
/// that case.
pub fn delete(store: &mut CmsStore, plan: &DeletionPlan) -> CmsResult<()> {
	if plan.is_protected() {
		return Err(CmsError::Conflict(format!(
			"Cannot delete protected objects: {}",
			plan.protected_labels().join(", ")
		)));
	}

	let deleted: BTreeSet<PluginId> = plan.deleted.iter().map(|node| node.id).collect();
	for alias in &plan.nulled_aliases {
		let node = store.tree().get(*alias)?;
		let mut data = node.data.clone();
		if AliasPlugin::plugin(node).is_some_and(|target| deleted.contains(&target)) {
			data[AliasPlugin::PLUGIN] = JsonValue::Null;
		}
		if AliasPlugin::alias_placeholder(node).is_some_and(|target| plan.placeholders.contains(&target)) {
			data[AliasPlugin::ALIAS_PLACEHOLDER] = JsonValue::Null;
		}
		store.tree_mut().update_data(*alias, data)?;
	}

	for root in &plan.roots {
		if store.tree().find(*root).is_some() {
			store.tree_mut().delete(*root)?;
		}
	}
	for placeholder in &plan.placeholders {
		if store.placeholder(*placeholder).is_ok() {
			store.delete_placeholder(*placeholder)?;
		}
	}
	store.release_protections(deleted.iter().copied());

	tracing::debug!(
		plugins = deleted.len(),
		placeholders = plan.placeholders.len(),
		aliases = plan.nulled_aliases.len(),
		"Deleted collected objects"
	);
	Ok(())
}

/// Collect and delete every plugin of a placeholder, optionally for one language
pub fn clear_placeholder(
	store: &mut CmsStore,
	placeholder_id: PlaceholderId,
	language: Option<&str>,
) -> CmsResult<DeletionPlan> {
	let plan = collect_placeholder(store, placeholder_id, language)?;
	delete(store, &plan)?;
	Ok(plan)
}

/// Collect the effects of clearing a placeholder
pub fn collect_placeholder(
	store: &CmsStore,
	placeholder_id: PlaceholderId,
	language: Option<&str>,
) -> CmsResult<DeletionPlan> {
	store.placeholder(placeholder_id)?;
	let roots: Vec<PluginId> = store
		.tree()
		.plugins(placeholder_id, language)
		.into_iter()
		.filter(|node| node.is_root())
		.map(|node| node.id)
		.collect();
	collect(store, &roots)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::models::NewPlugin;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_protected_child_blocks_parent_deletion() {
		// Arrange
		let mut store = CmsStore::new();
		let ph = store.create_placeholder("content", None);
		let parent = store.tree_mut().insert(NewPlugin::new(ph, "en", "RowPlugin")).unwrap();
		let child = store
			.tree_mut()
			.insert(NewPlugin::new(ph, "en", "TextPlugin").parent(parent.id))
			.unwrap();
		store.protect("Article #4", child.id).unwrap();

		// Act
		let plan = collect(&store, &[parent.id]).unwrap();
		let result = delete(&mut store, &plan);

		// Assert
		assert_eq!(plan.protected_labels(), vec!["Article #4".to_string()]);
		assert!(matches!(result, Err(CmsError::Conflict(_))));
		assert!(store.tree().find(child.id).is_some());
	}

	#[rstest]
	fn test_alias_reference_is_nulled() {
		// Arrange
		let mut store = CmsStore::new();
		let ph = store.create_placeholder("content", None);
		let text = store.tree_mut().insert(NewPlugin::new(ph, "en", "TextPlugin")).unwrap();
		let alias = store
			.tree_mut()
			.insert(NewPlugin::new(ph, "en", AliasPlugin::TYPE).data(json!({"plugin": text.id.0})))
			.unwrap();

		// Act
		let plan = collect(&store, &[text.id]).unwrap();
		delete(&mut store, &plan).unwrap();

		// Assert
		assert_eq!(plan.nulled_aliases, vec![alias.id]);
		assert_eq!(store.tree().get(alias.id).unwrap().data["plugin"], JsonValue::Null);
		assert_eq!(store.tree().get(alias.id).unwrap().position, 0);
	}

	#[rstest]
	fn test_deleting_reference_drops_wrapped_placeholder() {
		// Arrange
		let mut store = CmsStore::new();
		let clipboard = store.create_placeholder("clipboard", None);
		let (reference, wrapped) =
			PlaceholderPlugin::create(&mut store, clipboard, "en", "Content", "clipboard").unwrap();
		store.tree_mut().insert(NewPlugin::new(wrapped, "en", "TextPlugin")).unwrap();

		// Act
		let plan = collect(&store, &[reference.id]).unwrap();
		delete(&mut store, &plan).unwrap();

		// Assert
		assert_eq!(plan.deleted.len(), 2);
		assert!(store.placeholder(wrapped).is_err());
		assert!(store.tree().is_empty());
	}

	#[rstest]
	fn test_foreign_reference_is_not_followed() {
		// Arrange
		let mut store = CmsStore::new();
		let clipboard = store.create_placeholder("clipboard", None);
		let sidebar = store.create_placeholder("sidebar", None);
		let kept = store.tree_mut().insert(NewPlugin::new(sidebar, "en", "TextPlugin")).unwrap();
		let reference = store
			.tree_mut()
			.insert(
				NewPlugin::new(clipboard, "en", PlaceholderPlugin::TYPE)
					.data(json!({"name": "Sidebar", "placeholder_ref": sidebar.0})),
			)
			.unwrap();

		// Act
		let plan = collect(&store, &[reference.id]).unwrap();
		delete(&mut store, &plan).unwrap();

		// Assert
		assert!(plan.placeholders.is_empty());
		assert!(store.placeholder(sidebar).is_ok());
		assert!(store.tree().find(kept.id).is_some());
	}

	#[rstest]
	fn test_clear_limits_to_language() {
		// Arrange
		let mut store = CmsStore::new();
		let ph = store.create_placeholder("content", None);
		store.tree_mut().insert(NewPlugin::new(ph, "en", "TextPlugin")).unwrap();
		store.tree_mut().insert(NewPlugin::new(ph, "de", "TextPlugin")).unwrap();

		// Act
		let plan = clear_placeholder(&mut store, ph, Some("en")).unwrap();

		// Assert
		assert_eq!(plan.deleted.len(), 1);
		assert!(store.tree().plugins(ph, Some("en")).is_empty());
		assert_eq!(store.tree().plugins(ph, Some("de")).len(), 1);
	}
}
