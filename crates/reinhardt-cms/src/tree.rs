//! Plugin tree store
//!
//! An arena of [`PluginNode`]s indexed by id and by materialized path. The
//! path index makes descendant queries a prefix range scan; the id index
//! serves point lookups.
//!
//! Besides the parent/path consistency every mutation keeps one extra
//! invariant: inside a sibling group (same placeholder, parent and language)
//! ascending path order equals ascending position order. A path-ordered
//! scan of a placeholder therefore visits plugins in tree order.

use crate::error::{CmsError, CmsResult};
use crate::models::{NewPlugin, PlaceholderId, PluginId, PluginNode};
use crate::path;
use chrono::Utc;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Identifies the sibling group a plugin belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SiblingGroup {
	/// Owning placeholder
	pub placeholder_id: PlaceholderId,
	/// Shared parent, `None` for roots
	pub parent_id: Option<PluginId>,
	/// Language partition
	pub language: String,
}

impl SiblingGroup {
	/// Create a group key
	pub fn new(
		placeholder_id: PlaceholderId,
		parent_id: Option<PluginId>,
		language: impl Into<String>,
	) -> Self {
		Self {
			placeholder_id,
			parent_id,
			language: language.into(),
		}
	}

	fn of(node: &PluginNode) -> Self {
		Self::new(node.placeholder_id, node.parent_id, node.language.clone())
	}

	fn contains(&self, node: &PluginNode) -> bool {
		node.placeholder_id == self.placeholder_id
			&& node.parent_id == self.parent_id
			&& node.language == self.language
	}
}

/// Arena of plugin nodes indexed by materialized path
#[derive(Debug, Clone, Default)]
pub struct PluginTree {
	nodes: HashMap<PluginId, PluginNode>,
	paths: BTreeMap<String, PluginId>,
	next_id: u64,
}

impl PluginTree {
	/// Create an empty tree
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of stored plugins
	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	/// Whether the tree holds no plugins
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Look up a plugin
	pub fn find(&self, id: PluginId) -> Option<&PluginNode> {
		self.nodes.get(&id)
	}

	/// Look up a plugin, failing with [`CmsError::NotFound`]
	pub fn get(&self, id: PluginId) -> CmsResult<&PluginNode> {
		self.nodes
			.get(&id)
			.ok_or_else(|| CmsError::NotFound(format!("plugin {}", id)))
	}

	pub(crate) fn get_mut(&mut self, id: PluginId) -> CmsResult<&mut PluginNode> {
		self.nodes
			.get_mut(&id)
			.ok_or_else(|| CmsError::NotFound(format!("plugin {}", id)))
	}

	/// Every plugin in path order
	pub fn iter(&self) -> impl Iterator<Item = &PluginNode> {
		self.paths.values().filter_map(|id| self.nodes.get(id))
	}

	/// Descendants of `id` in pre-order, excluding the node itself
	pub fn descendants(&self, id: PluginId) -> CmsResult<Vec<&PluginNode>> {
		let node = self.get(id)?;
		Ok(self.subtree_ids(&node.path)
			.into_iter()
			.skip(1)
			.filter_map(|id| self.nodes.get(&id))
			.collect())
	}

	/// The node followed by its descendants in pre-order
	pub fn get_tree(&self, id: PluginId) -> CmsResult<Vec<&PluginNode>> {
		let node = self.get(id)?;
		Ok(self.subtree_ids(&node.path)
			.into_iter()
			.filter_map(|id| self.nodes.get(&id))
			.collect())
	}

	/// Direct children of `id` ordered by position
	pub fn children(&self, id: PluginId) -> CmsResult<Vec<&PluginNode>> {
		let node = self.get(id)?;
		let child_depth = node.depth + 1;
		let mut children: Vec<&PluginNode> = self
			.descendants(id)?
			.into_iter()
			.filter(|child| child.depth == child_depth)
			.collect();
		children.sort_by_key(|child| child.position);
		Ok(children)
	}

	/// Members of a sibling group ordered by position
	pub fn siblings(&self, group: &SiblingGroup) -> Vec<&PluginNode> {
		let mut siblings: Vec<&PluginNode> = match group.parent_id {
			Some(parent_id) => match self.nodes.get(&parent_id) {
				Some(parent) => self
					.subtree_ids(&parent.path)
					.into_iter()
					.filter_map(|id| self.nodes.get(&id))
					.filter(|node| group.contains(node))
					.collect(),
				None => Vec::new(),
			},
			None => self
				.nodes
				.values()
				.filter(|node| group.contains(node))
				.collect(),
		};
		siblings.sort_by_key(|node| node.position);
		siblings
	}

	/// Ids of a sibling group ordered by position
	pub fn tree_order(&self, group: &SiblingGroup) -> Vec<PluginId> {
		self.siblings(group).into_iter().map(|node| node.id).collect()
	}

	/// Plugins of a placeholder in tree order, optionally for one language
	pub fn plugins(&self, placeholder_id: PlaceholderId, language: Option<&str>) -> Vec<&PluginNode> {
		self.iter()
			.filter(|node| node.placeholder_id == placeholder_id)
			.filter(|node| language.is_none_or(|lang| node.language == lang))
			.collect()
	}

	/// Languages that have at least one plugin in the placeholder
	pub fn languages(&self, placeholder_id: PlaceholderId) -> BTreeSet<String> {
		self.nodes
			.values()
			.filter(|node| node.placeholder_id == placeholder_id)
			.map(|node| node.language.clone())
			.collect()
	}

	/// Create a plugin
	///
	/// The plugin is appended to its sibling group and then moved to
	/// `position` when one is given.
	///
	/// # Errors
	///
	/// [`CmsError::NotFound`] for an unknown parent, [`CmsError::Validation`]
	/// when the parent lives in another placeholder or language.
	pub fn insert(&mut self, new: NewPlugin) -> CmsResult<PluginNode> {
		if let Some(parent_id) = new.parent_id {
			let parent = self.get(parent_id)?;
			if parent.placeholder_id != new.placeholder_id || parent.language != new.language {
				return Err(CmsError::Validation(format!(
					"parent plugin {} is not in placeholder {} and language {}",
					parent_id, new.placeholder_id, new.language
				)));
			}
		}

		let group = SiblingGroup::new(new.placeholder_id, new.parent_id, new.language.clone());
		let node_path = self.next_path(new.parent_id)?;
		let position = self.siblings(&group).len();

		self.next_id += 1;
		let id = PluginId(self.next_id);
		let now = Utc::now();
		let node = PluginNode {
			id,
			plugin_type: new.plugin_type,
			language: new.language,
			placeholder_id: new.placeholder_id,
			parent_id: new.parent_id,
			depth: path::depth(&node_path),
			path: node_path.clone(),
			position,
			numchild: 0,
			data: new.data,
			created_at: now,
			changed_at: now,
		};

		self.paths.insert(node_path, id);
		self.nodes.insert(id, node);
		if let Some(parent_id) = new.parent_id {
			self.get_mut(parent_id)?.numchild += 1;
		}

		tracing::debug!(plugin = %id, placeholder = %group.placeholder_id, "Inserted plugin");

		if let Some(target) = new.position
			&& target < position
		{
			let mut order = self.tree_order(&group);
			order.retain(|member| *member != id);
			order.insert(target, id);
			self.apply_group_order(&group, &order)?;
		}

		self.get(id).cloned()
	}

	/// Replace a plugin's type-specific data
	pub fn update_data(&mut self, id: PluginId, data: JsonValue) -> CmsResult<&PluginNode> {
		let node = self.get_mut(id)?;
		node.data = data;
		node.changed_at = Utc::now();
		Ok(node)
	}

	/// Move a plugin (with its subtree) below `target_parent`, or to root
	///
	/// Placeholder and language are cascaded to every descendant. The node
	/// becomes the last member of its new sibling group and the group it left
	/// is compacted.
	///
	/// # Errors
	///
	/// [`CmsError::NotFound`] for unknown ids, [`CmsError::Conflict`] when the
	/// target is the node itself or one of its descendants,
	/// [`CmsError::Validation`] when the target parent is not in the given
	/// placeholder and language. All checks run before anything is mutated.
	pub fn reparent(
		&mut self,
		id: PluginId,
		target_parent: Option<PluginId>,
		placeholder_id: PlaceholderId,
		language: &str,
	) -> CmsResult<PluginNode> {
		let node = self.get(id)?.clone();
		if let Some(parent_id) = target_parent {
			let parent = self.get(parent_id)?;
			if parent.id == id || path::is_descendant_path(&parent.path, &node.path) {
				return Err(CmsError::Conflict(format!(
					"cannot move plugin {} below its own descendant {}",
					id, parent_id
				)));
			}
			if parent.placeholder_id != placeholder_id || parent.language != language {
				return Err(CmsError::Validation(format!(
					"parent plugin {} is not in placeholder {} and language {}",
					parent_id, placeholder_id, language
				)));
			}
		}

		let old_group = SiblingGroup::of(&node);
		let new_group = SiblingGroup::new(placeholder_id, target_parent, language);
		let new_path = self.next_path(target_parent)?;

		let subtree = self.subtree_ids(&node.path);
		for member in &subtree {
			if let Some(member_node) = self.nodes.get(member) {
				self.paths.remove(&member_node.path);
			}
		}
		for member in &subtree {
			let member_node = self.get_mut(*member)?;
			member_node.path = path::rebase(&member_node.path, &node.path, &new_path);
			member_node.depth = path::depth(&member_node.path);
			member_node.placeholder_id = placeholder_id;
			member_node.language = language.to_string();
			let member_path = member_node.path.clone();
			self.paths.insert(member_path, *member);
		}

		if let Some(old_parent) = node.parent_id {
			self.get_mut(old_parent)?.numchild -= 1;
		}
		if let Some(new_parent) = target_parent {
			self.get_mut(new_parent)?.numchild += 1;
		}

		// The moved node already carries the new placeholder and language
		{
			let moved = self.get_mut(id)?;
			moved.parent_id = target_parent;
			moved.changed_at = Utc::now();
		}
		self.compact_group_without(&old_group, id)?;
		let position = self
			.tree_order(&new_group)
			.into_iter()
			.filter(|member| *member != id)
			.count();
		self.get_mut(id)?.position = position;

		tracing::debug!(
			plugin = %id,
			placeholder = %placeholder_id,
			language,
			descendants = subtree.len() - 1,
			"Reparented plugin"
		);

		self.get(id).cloned()
	}

	/// Delete a plugin and its subtree, returning the removed nodes in path order
	pub fn delete(&mut self, id: PluginId) -> CmsResult<Vec<PluginNode>> {
		let node = self.get(id)?.clone();
		let subtree = self.subtree_ids(&node.path);
		let removed = self.remove_ids(&subtree);
		if let Some(parent_id) = node.parent_id {
			self.get_mut(parent_id)?.numchild -= 1;
		}
		self.compact_group(&SiblingGroup::of(&node))?;

		tracing::debug!(plugin = %id, removed = removed.len(), "Deleted plugin subtree");
		Ok(removed)
	}

	/// Delete every plugin of a placeholder, optionally limited to one language
	pub fn clear(&mut self, placeholder_id: PlaceholderId, language: Option<&str>) -> Vec<PluginNode> {
		let ids: Vec<PluginId> = self
			.plugins(placeholder_id, language)
			.into_iter()
			.map(|node| node.id)
			.collect();
		let removed = self.remove_ids(&ids);

		tracing::debug!(
			placeholder = %placeholder_id,
			language = language.unwrap_or("*"),
			removed = removed.len(),
			"Cleared placeholder"
		);
		removed
	}

	/// Rewrite positions (and path slots) so the group iterates as `order`
	///
	/// `order` must list every member of the group exactly once.
	pub(crate) fn apply_group_order(
		&mut self,
		group: &SiblingGroup,
		order: &[PluginId],
	) -> CmsResult<()> {
		let members = self.siblings(group);
		let listed: HashSet<PluginId> = order.iter().copied().collect();
		if members.len() != order.len()
			|| listed.len() != order.len()
			|| members.iter().any(|member| !listed.contains(&member.id))
		{
			return Err(CmsError::Validation(
				"order must list every member of the sibling group exactly once".to_string(),
			));
		}

		let mut slots: Vec<String> = members.iter().map(|node| node.path.clone()).collect();
		slots.sort();

		let mut moves = Vec::new();
		for (id, slot) in order.iter().zip(slots) {
			let old_path = self.get(*id)?.path.clone();
			let subtree = self.subtree_ids(&old_path);
			moves.push((*id, old_path, slot, subtree));
		}

		for (_, _, _, subtree) in &moves {
			for member in subtree {
				if let Some(node) = self.nodes.get(member) {
					self.paths.remove(&node.path);
				}
			}
		}

		for (position, (id, old_path, slot, subtree)) in moves.into_iter().enumerate() {
			for member in subtree {
				let node = self.get_mut(member)?;
				node.path = path::rebase(&node.path, &old_path, &slot);
				let node_path = node.path.clone();
				self.paths.insert(node_path, member);
			}
			self.get_mut(id)?.position = position;
		}

		Ok(())
	}

	/// Check every structural invariant, reporting the first violation
	pub fn check_integrity(&self) -> CmsResult<()> {
		let violation = |message: String| Err(CmsError::Conflict(message));

		if self.paths.len() != self.nodes.len() {
			return violation("path index and node arena differ in size".to_string());
		}

		let mut groups: HashMap<SiblingGroup, Vec<&PluginNode>> = HashMap::new();
		for (node_path, id) in &self.paths {
			let Some(node) = self.nodes.get(id) else {
				return violation(format!("path {} points to missing plugin {}", node_path, id));
			};
			if &node.path != node_path || node.depth != path::depth(node_path) {
				return violation(format!("plugin {} has an inconsistent path", id));
			}
			match (node.parent_id, path::parent_path(node_path)) {
				(None, None) => {}
				(Some(parent_id), Some(parent_path)) => {
					let Some(parent) = self.nodes.get(&parent_id) else {
						return violation(format!("plugin {} has a missing parent", id));
					};
					if parent.path != parent_path {
						return violation(format!("plugin {} path does not extend its parent", id));
					}
					if parent.placeholder_id != node.placeholder_id || parent.language != node.language {
						return violation(format!("plugin {} differs from its parent", id));
					}
				}
				_ => return violation(format!("plugin {} parent and path disagree", id)),
			}
			groups.entry(SiblingGroup::of(node)).or_default().push(node);
		}

		for members in groups.values() {
			// members are in path order
			for (expected, node) in members.iter().enumerate() {
				if node.position != expected {
					return violation(format!(
						"plugin {} has position {} but is sibling #{}",
						node.id, node.position, expected
					));
				}
			}
			if let Some(parent_id) = members[0].parent_id {
				let numchild = self.nodes.get(&parent_id).map(|p| p.numchild);
				if numchild != Some(members.len()) {
					return violation(format!("plugin {} has a stale child count", parent_id));
				}
			}
		}

		Ok(())
	}

	fn subtree_ids(&self, root_path: &str) -> Vec<PluginId> {
		self.paths
			.range(root_path.to_string()..)
			.take_while(|(node_path, _)| node_path.starts_with(root_path))
			.map(|(_, id)| *id)
			.collect()
	}

	fn next_path(&self, parent: Option<PluginId>) -> CmsResult<String> {
		match parent {
			None => {
				let last_root = self
					.paths
					.keys()
					.next_back()
					.and_then(|last| path::decode_step(&last[..path::STEP_LEN]))
					.unwrap_or(0);
				path::encode_step(last_root + 1)
			}
			Some(parent_id) => {
				let parent_path = self.get(parent_id)?.path.clone();
				let prefix_len = parent_path.len();
				let last_child = self
					.paths
					.range(parent_path.clone()..)
					.take_while(|(node_path, _)| node_path.starts_with(&parent_path))
					.filter_map(|(node_path, _)| {
						node_path
							.get(prefix_len..prefix_len + path::STEP_LEN)
							.and_then(path::decode_step)
					})
					.max()
					.unwrap_or(0);
				path::child_path(&parent_path, last_child + 1)
			}
		}
	}

	fn compact_group(&mut self, group: &SiblingGroup) -> CmsResult<()> {
		let order = self.tree_order(group);
		for (position, id) in order.into_iter().enumerate() {
			self.get_mut(id)?.position = position;
		}
		Ok(())
	}

	fn compact_group_without(&mut self, group: &SiblingGroup, excluded: PluginId) -> CmsResult<()> {
		let mut order = self.tree_order(group);
		order.retain(|member| *member != excluded);
		for (position, id) in order.into_iter().enumerate() {
			self.get_mut(id)?.position = position;
		}
		Ok(())
	}

	fn remove_ids(&mut self, ids: &[PluginId]) -> Vec<PluginNode> {
		let mut removed: Vec<PluginNode> = ids
			.iter()
			.filter_map(|id| self.nodes.remove(id))
			.collect();
		for node in &removed {
			self.paths.remove(&node.path);
		}
		removed.sort_by(|a, b| a.path.cmp(&b.path));
		removed
	}
}
