//! Sibling reordering
//!
//! Positions inside one sibling group are rewritten to follow a
//! caller-supplied id list. Only positions (and the path slots they map to)
//! change; parent, placeholder and language stay untouched.

use crate::error::CmsResult;
use crate::models::{PlaceholderId, PluginId};
use crate::tree::{PluginTree, SiblingGroup};
use std::collections::HashSet;

/// Reorder the `(placeholder_id, parent_id, language)` sibling group
///
/// Ids of `order` that are not in the group are ignored, as are repeated
/// ids after their first occurrence. Members the list does not mention keep
/// their relative order after the listed ones. Returns the resulting order.
///
/// ```
/// use reinhardt_cms::models::NewPlugin;
/// use reinhardt_cms::reorder::reorder_plugins;
/// use reinhardt_cms::store::CmsStore;
///
/// let mut store = CmsStore::new();
/// let ph = store.create_placeholder("main", None);
/// let a = store.tree_mut().insert(NewPlugin::new(ph, "en", "TextPlugin")).unwrap().id;
/// let b = store.tree_mut().insert(NewPlugin::new(ph, "en", "TextPlugin")).unwrap().id;
///
/// let order = reorder_plugins(store.tree_mut(), ph, None, "en", &[b, a]).unwrap();
/// assert_eq!(order, vec![b, a]);
/// ```
pub fn reorder_plugins(
	tree: &mut PluginTree,
	placeholder_id: PlaceholderId,
	parent_id: Option<PluginId>,
	language: &str,
	order: &[PluginId],
) -> CmsResult<Vec<PluginId>> {
	let group = SiblingGroup::new(placeholder_id, parent_id, language);
	let current = tree.tree_order(&group);
	let members: HashSet<PluginId> = current.iter().copied().collect();

	let mut seen = HashSet::new();
	let mut resolved: Vec<PluginId> = order
		.iter()
		.copied()
		.filter(|id| members.contains(id) && seen.insert(*id))
		.collect();
	resolved.extend(current.iter().copied().filter(|id| !seen.contains(id)));

	if resolved != current {
		tree.apply_group_order(&group, &resolved)?;
	}

	tracing::debug!(
		placeholder = %placeholder_id,
		parent = ?parent_id,
		language,
		size = resolved.len(),
		"Reordered sibling group"
	);
	Ok(resolved)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::models::NewPlugin;
	use rstest::rstest;

	const PH: PlaceholderId = PlaceholderId(1);

	fn roots(tree: &mut PluginTree, count: usize) -> Vec<PluginId> {
		(0..count)
			.map(|_| tree.insert(NewPlugin::new(PH, "en", "TextPlugin")).unwrap().id)
			.collect()
	}

	#[rstest]
	fn test_unknown_ids_are_ignored() {
		// Arrange
		let mut tree = PluginTree::new();
		let ids = roots(&mut tree, 2);

		// Act
		let order = reorder_plugins(&mut tree, PH, None, "en", &[PluginId(999), ids[1], ids[0]]).unwrap();

		// Assert
		assert_eq!(order, vec![ids[1], ids[0]]);
	}

	#[rstest]
	fn test_unlisted_members_follow_listed_ones() {
		// Arrange
		let mut tree = PluginTree::new();
		let ids = roots(&mut tree, 4);

		// Act
		let order = reorder_plugins(&mut tree, PH, None, "en", &[ids[3], ids[1]]).unwrap();

		// Assert
		assert_eq!(order, vec![ids[3], ids[1], ids[0], ids[2]]);
		tree.check_integrity().unwrap();
	}

	#[rstest]
	fn test_children_move_with_their_parent() {
		// Arrange
		let mut tree = PluginTree::new();
		let ids = roots(&mut tree, 2);
		let child = tree
			.insert(NewPlugin::new(PH, "en", "TextPlugin").parent(ids[0]))
			.unwrap()
			.id;

		// Act
		reorder_plugins(&mut tree, PH, None, "en", &[ids[1], ids[0]]).unwrap();

		// Assert
		let listed: Vec<PluginId> = tree.plugins(PH, Some("en")).iter().map(|n| n.id).collect();
		assert_eq!(listed, vec![ids[1], ids[0], child]);
		assert_eq!(tree.get(child).unwrap().parent_id, Some(ids[0]));
		tree.check_integrity().unwrap();
	}
}
