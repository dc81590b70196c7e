//! Placeholder store and transactions
//!
//! [`CmsStore`] owns every placeholder, the plugin tree, the per-user
//! clipboard registry and the protection relations. [`Database`] shares one
//! store between request handlers and hands out [`Transaction`] scopes that
//! serialize writers and roll back on drop unless committed.

use crate::error::{CmsError, CmsResult};
use crate::models::{Placeholder, PlaceholderId, PluginId, SourceRef};
use crate::tree::PluginTree;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use parking_lot::RwLock;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A relation that forbids deleting a plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protection {
	/// Label of the protecting object, shown in delete confirmations
	pub protector: String,
	/// Protected plugin
	pub plugin_id: PluginId,
}

/// In-memory placeholder and plugin storage
#[derive(Debug, Clone, Default)]
pub struct CmsStore {
	placeholders: BTreeMap<PlaceholderId, Placeholder>,
	tree: PluginTree,
	clipboards: HashMap<u64, PlaceholderId>,
	protections: Vec<Protection>,
	next_placeholder_id: u64,
}

impl CmsStore {
	/// Create an empty store
	pub fn new() -> Self {
		Self::default()
	}

	/// Create a placeholder and return its id
	pub fn create_placeholder(
		&mut self,
		slot: impl Into<String>,
		source: Option<SourceRef>,
	) -> PlaceholderId {
		self.next_placeholder_id += 1;
		let id = PlaceholderId(self.next_placeholder_id);
		let mut placeholder = Placeholder::new(id, slot);
		placeholder.source = source;
		self.placeholders.insert(id, placeholder);
		id
	}

	/// Look up a placeholder
	pub fn placeholder(&self, id: PlaceholderId) -> CmsResult<&Placeholder> {
		self.placeholders
			.get(&id)
			.ok_or_else(|| CmsError::NotFound(format!("placeholder {}", id)))
	}

	/// Look up a placeholder for modification
	pub fn placeholder_mut(&mut self, id: PlaceholderId) -> CmsResult<&mut Placeholder> {
		self.placeholders
			.get_mut(&id)
			.ok_or_else(|| CmsError::NotFound(format!("placeholder {}", id)))
	}

	/// All placeholders ordered by id
	pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
		self.placeholders.values()
	}

	/// Delete a placeholder together with all of its plugins
	pub fn delete_placeholder(&mut self, id: PlaceholderId) -> CmsResult<Placeholder> {
		let placeholder = self
			.placeholders
			.remove(&id)
			.ok_or_else(|| CmsError::NotFound(format!("placeholder {}", id)))?;
		let removed = self.tree.clear(id, None);
		self.release_protections(removed.iter().map(|node| node.id));
		self.clipboards.retain(|_, clipboard| *clipboard != id);
		Ok(placeholder)
	}

	/// The plugin tree
	pub fn tree(&self) -> &PluginTree {
		&self.tree
	}

	/// The plugin tree, for mutation
	pub fn tree_mut(&mut self) -> &mut PluginTree {
		&mut self.tree
	}

	/// Clipboard placeholder registered for `user_id`
	pub fn clipboard_of(&self, user_id: u64) -> Option<PlaceholderId> {
		self.clipboards.get(&user_id).copied()
	}

	/// Whether `placeholder_id` is a clipboard, and whose
	pub fn clipboard_owner(&self, placeholder_id: PlaceholderId) -> Option<u64> {
		self.clipboards
			.iter()
			.find(|(_, clipboard)| **clipboard == placeholder_id)
			.map(|(user, _)| *user)
	}

	pub(crate) fn register_clipboard(&mut self, user_id: u64, placeholder_id: PlaceholderId) {
		self.clipboards.insert(user_id, placeholder_id);
	}

	/// Record that `protector` forbids deleting `plugin_id`
	pub fn protect(&mut self, protector: impl Into<String>, plugin_id: PluginId) -> CmsResult<()> {
		self.tree.get(plugin_id)?;
		self.protections.push(Protection {
			protector: protector.into(),
			plugin_id,
		});
		Ok(())
	}

	/// Protections referencing any of `plugin_ids`
	pub fn protections_for(&self, plugin_ids: &BTreeSet<PluginId>) -> Vec<&Protection> {
		self.protections
			.iter()
			.filter(|protection| plugin_ids.contains(&protection.plugin_id))
			.collect()
	}

	pub(crate) fn release_protections(&mut self, plugin_ids: impl IntoIterator<Item = PluginId>) {
		let released: BTreeSet<PluginId> = plugin_ids.into_iter().collect();
		self.protections
			.retain(|protection| !released.contains(&protection.plugin_id));
	}
}

/// Shared handle to a [`CmsStore`]
///
/// Cloning is cheap; every clone refers to the same store. Transactions are
/// serialized against each other but never block [`Database::read`], which
/// always sees the last committed state. An open transaction works on its
/// own copy of the store, made on its first write: the cost of a write
/// transaction is one clone of the whole store, read-only ones copy nothing.
#[derive(Debug, Clone, Default)]
pub struct Database {
	committed: Arc<RwLock<Arc<CmsStore>>>,
	writer: Arc<Mutex<()>>,
}

impl Database {
	/// Wrap an existing store
	pub fn new(store: CmsStore) -> Self {
		Self {
			committed: Arc::new(RwLock::new(Arc::new(store))),
			writer: Arc::new(Mutex::new(())),
		}
	}

	/// Begin a transaction
	///
	/// Waits until every other transaction on this database has finished.
	pub async fn begin(&self) -> Transaction {
		let writer = self.writer.clone().lock_owned().await;
		let base = self.committed.read().clone();
		Transaction {
			_writer: writer,
			committed: Arc::clone(&self.committed),
			working: Arc::clone(&base),
			base,
			finished: false,
		}
	}

	/// Run `f` against the committed state without opening a transaction
	///
	/// Changes of a transaction still in progress are not visible.
	pub async fn read<R>(&self, f: impl FnOnce(&CmsStore) -> R) -> R {
		let store = self.committed.read().clone();
		f(&store)
	}
}

/// Exclusive, rollback-on-drop access to the store
///
/// Dereferences to [`CmsStore`]. Changes become permanent with
/// [`Transaction::commit`]; dropping the scope in any other way discards
/// them.
pub struct Transaction {
	_writer: OwnedMutexGuard<()>,
	committed: Arc<RwLock<Arc<CmsStore>>>,
	base: Arc<CmsStore>,
	working: Arc<CmsStore>,
	finished: bool,
}

impl Transaction {
	/// Make the changes permanent
	pub fn commit(mut self) {
		if self.is_modified() {
			*self.committed.write() = Arc::clone(&self.working);
		}
		self.finished = true;
	}

	/// Discard the changes
	pub fn rollback(mut self) {
		self.finished = true;
	}

	/// Whether the transaction changed anything so far
	pub fn is_modified(&self) -> bool {
		!Arc::ptr_eq(&self.base, &self.working)
	}
}

impl Deref for Transaction {
	type Target = CmsStore;

	fn deref(&self) -> &Self::Target {
		&self.working
	}
}

impl DerefMut for Transaction {
	fn deref_mut(&mut self) -> &mut Self::Target {
		Arc::make_mut(&mut self.working)
	}
}

impl Drop for Transaction {
	fn drop(&mut self) {
		if !self.finished && self.is_modified() {
			tracing::warn!("Transaction dropped without commit, rolling back");
		}
	}
}
