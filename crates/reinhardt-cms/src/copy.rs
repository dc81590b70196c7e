//! Plugin copy engine

use crate::error::CmsResult;
use crate::models::{NewPlugin, PlaceholderId, PluginId, PluginNode};
use crate::plugin_pool::PluginPool;
use crate::store::CmsStore;
use std::collections::HashMap;

/// A freshly created plugin and the plugin it was copied from
pub type CopyPair = (PluginNode, PluginNode);

/// Copy `plugins` into `to_placeholder` / `to_language`
///
/// Input nodes are processed in path order, so parents are always created
/// before their children. A node whose parent is part of the input is nested
/// under that parent's copy; every other node becomes a child of
/// `parent_id` (or a root when it is `None`). Copies are appended to their
/// destination sibling group.
///
/// Each call creates new plugins. Callers that want to replace the
/// destination content have to clear it first.
///
/// # Errors
///
/// [`crate::error::CmsError::NotFound`] for an unknown placeholder or
/// parent, [`crate::error::CmsError::Validation`] when `parent_id` lives in
/// another placeholder or language.
pub fn copy_plugins_to(
	store: &mut CmsStore,
	pool: &PluginPool,
	plugins: &[PluginNode],
	to_placeholder: PlaceholderId,
	to_language: &str,
	parent_id: Option<PluginId>,
) -> CmsResult<Vec<CopyPair>> {
	store.placeholder(to_placeholder)?;

	let mut ordered: Vec<&PluginNode> = plugins.iter().collect();
	ordered.sort_by(|a, b| a.path.cmp(&b.path));
	ordered.dedup_by_key(|node| node.id);

	let mut remap: HashMap<PluginId, PluginId> = HashMap::new();
	let mut created = Vec::with_capacity(ordered.len());

	for old in ordered {
		let parent = old
			.parent_id
			.and_then(|old_parent| remap.get(&old_parent).copied())
			.or(parent_id);
		let plugin_type = pool.find(&old.plugin_type);
		let data = match plugin_type {
			Some(plugin_type) => plugin_type.copy_data(&old.data),
			None => old.data.clone(),
		};

		let mut new = NewPlugin::new(to_placeholder, to_language, old.plugin_type.clone()).data(data);
		new.parent_id = parent;
		let node = store.tree_mut().insert(new)?;

		if let Some(plugin_type) = plugin_type {
			plugin_type.copy_relations(store, pool, &node, old)?;
		}

		remap.insert(old.id, node.id);
		created.push((node.id, old.clone()));
	}

	tracing::debug!(
		placeholder = %to_placeholder,
		language = to_language,
		copied = created.len(),
		"Copied plugins"
	);

	// Re-read so child counts and relation updates are reflected
	created
		.into_iter()
		.map(|(new_id, old)| Ok((store.tree().get(new_id)?.clone(), old)))
		.collect()
}

/// Ids of the copies at the top of the copied forest, ordered by the
/// original position
pub fn top_level_ids(pairs: &[CopyPair], parent_id: Option<PluginId>) -> Vec<PluginId> {
	let mut top: Vec<&CopyPair> = pairs
		.iter()
		.filter(|(new, _)| new.parent_id == parent_id)
		.collect();
	top.sort_by_key(|(_, old)| old.position);
	top.into_iter().map(|(new, _)| new.id).collect()
}
