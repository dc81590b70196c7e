//! Plugin type registry
//!
//! Every stored plugin carries a `plugin_type` tag. The pool maps that tag to
//! a [`CmsPluginType`] implementation describing nesting rules, data
//! validation and copy behavior.

use crate::copy::copy_plugins_to;
use crate::error::{CmsError, CmsResult};
use crate::models::{NewPlugin, PlaceholderId, PluginId, PluginNode, SourceRef};
use crate::store::CmsStore;
use serde_json::{Value as JsonValue, json};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Behavior attached to a plugin type tag
pub trait CmsPluginType: Send + Sync {
	/// Type tag stored on every instance
	fn plugin_type(&self) -> &str;

	/// Display name
	fn name(&self) -> &str {
		self.plugin_type()
	}

	/// Whether instances may have children
	fn allow_children(&self) -> bool {
		false
	}

	/// Types accepted as children, `None` for any
	fn child_classes(&self) -> Option<&[String]> {
		None
	}

	/// Types accepted as parent, `None` for any
	fn parent_classes(&self) -> Option<&[String]> {
		None
	}

	/// Whether instances must be nested inside another plugin
	fn require_parent(&self) -> bool {
		false
	}

	/// Internal types cannot be added through the admin
	fn system(&self) -> bool {
		false
	}

	/// Check type-specific data before it is stored
	fn validate(&self, data: &JsonValue) -> CmsResult<()> {
		if data.is_object() {
			Ok(())
		} else {
			Err(CmsError::Validation(format!(
				"{} data must be a JSON object",
				self.plugin_type()
			)))
		}
	}

	/// Check data replacing the data of the stored instance `plugin`
	fn validate_change(&self, _store: &CmsStore, _plugin: &PluginNode, data: &JsonValue) -> CmsResult<()> {
		self.validate(data)
	}

	/// Data for a copy of an instance
	fn copy_data(&self, data: &JsonValue) -> JsonValue {
		data.clone()
	}

	/// Copy objects the instance relates to, after `new` was created from `old`
	fn copy_relations(
		&self,
		_store: &mut CmsStore,
		_pool: &PluginPool,
		_new: &PluginNode,
		_old: &PluginNode,
	) -> CmsResult<()> {
		Ok(())
	}
}

/// Registry of plugin types
#[derive(Clone)]
pub struct PluginPool {
	plugins: HashMap<String, Arc<dyn CmsPluginType>>,
}

impl PluginPool {
	/// Create an empty pool
	pub fn new() -> Self {
		Self {
			plugins: HashMap::new(),
		}
	}

	/// Create a pool holding [`PlaceholderPlugin`] and [`AliasPlugin`]
	pub fn with_builtins() -> Self {
		let mut pool = Self::new();
		pool.plugins
			.insert(PlaceholderPlugin::TYPE.to_string(), Arc::new(PlaceholderPlugin));
		pool.plugins
			.insert(AliasPlugin::TYPE.to_string(), Arc::new(AliasPlugin));
		pool
	}

	/// Register a plugin type
	///
	/// # Errors
	///
	/// [`CmsError::Conflict`] when the tag is already taken.
	pub fn register(&mut self, plugin: impl CmsPluginType + 'static) -> CmsResult<()> {
		let tag = plugin.plugin_type().to_string();
		if self.plugins.contains_key(&tag) {
			return Err(CmsError::Conflict(format!(
				"plugin type {} is already registered",
				tag
			)));
		}
		tracing::debug!(plugin_type = %tag, "Registered plugin type");
		self.plugins.insert(tag, Arc::new(plugin));
		Ok(())
	}

	/// Look up a plugin type
	pub fn find(&self, plugin_type: &str) -> Option<&Arc<dyn CmsPluginType>> {
		self.plugins.get(plugin_type)
	}

	/// Look up a plugin type, failing with [`CmsError::Validation`]
	pub fn get(&self, plugin_type: &str) -> CmsResult<&Arc<dyn CmsPluginType>> {
		self.find(plugin_type)
			.ok_or_else(|| CmsError::Validation(format!("Invalid plugin type '{}'", plugin_type)))
	}

	/// Registered type tags in alphabetical order
	pub fn plugin_types(&self) -> Vec<&str> {
		let mut tags: Vec<&str> = self.plugins.keys().map(String::as_str).collect();
		tags.sort_unstable();
		tags
	}
}

impl Default for PluginPool {
	fn default() -> Self {
		Self::with_builtins()
	}
}

impl fmt::Debug for PluginPool {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PluginPool")
			.field("plugin_types", &self.plugin_types())
			.finish()
	}
}

/// Configurable plugin type for plain content types
///
/// ```
/// use reinhardt_cms::plugin_pool::{CmsPluginType, GenericPlugin};
///
/// let row = GenericPlugin::new("RowPlugin")
///     .name("Row")
///     .allow_children(true)
///     .child_classes(["ColumnPlugin"]);
/// assert!(CmsPluginType::allow_children(&row));
/// assert_eq!(CmsPluginType::name(&row), "Row");
/// ```
#[derive(Debug, Clone)]
pub struct GenericPlugin {
	plugin_type: String,
	name: String,
	allow_children: bool,
	child_classes: Option<Vec<String>>,
	parent_classes: Option<Vec<String>>,
	require_parent: bool,
	required_fields: Vec<String>,
}

impl GenericPlugin {
	/// Create a leaf plugin type named after its tag
	pub fn new(plugin_type: impl Into<String>) -> Self {
		let plugin_type = plugin_type.into();
		Self {
			name: plugin_type.clone(),
			plugin_type,
			allow_children: false,
			child_classes: None,
			parent_classes: None,
			require_parent: false,
			required_fields: Vec::new(),
		}
	}

	/// Set the display name
	pub fn name(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	/// Allow nested plugins
	pub fn allow_children(mut self, allow: bool) -> Self {
		self.allow_children = allow;
		self
	}

	/// Restrict the accepted child types
	pub fn child_classes<I, S>(mut self, classes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.child_classes = Some(classes.into_iter().map(Into::into).collect());
		self
	}

	/// Restrict the accepted parent types
	pub fn parent_classes<I, S>(mut self, classes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.parent_classes = Some(classes.into_iter().map(Into::into).collect());
		self
	}

	/// Require a parent plugin
	pub fn require_parent(mut self, require: bool) -> Self {
		self.require_parent = require;
		self
	}

	/// Keys that must be present in the plugin data
	pub fn required_fields<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.required_fields = fields.into_iter().map(Into::into).collect();
		self
	}
}

impl CmsPluginType for GenericPlugin {
	fn plugin_type(&self) -> &str {
		&self.plugin_type
	}

	fn name(&self) -> &str {
		&self.name
	}

	fn allow_children(&self) -> bool {
		self.allow_children
	}

	fn child_classes(&self) -> Option<&[String]> {
		self.child_classes.as_deref()
	}

	fn parent_classes(&self) -> Option<&[String]> {
		self.parent_classes.as_deref()
	}

	fn require_parent(&self) -> bool {
		self.require_parent
	}

	fn validate(&self, data: &JsonValue) -> CmsResult<()> {
		let Some(fields) = data.as_object() else {
			return Err(CmsError::Validation(format!(
				"{} data must be a JSON object",
				self.plugin_type
			)));
		};
		match self
			.required_fields
			.iter()
			.find(|field| fields.get(field.as_str()).is_none_or(JsonValue::is_null))
		{
			Some(missing) => Err(CmsError::Validation(format!(
				"{}: this field is required",
				missing
			))),
			None => Ok(()),
		}
	}
}

fn ref_id(data: &JsonValue, key: &str) -> Option<u64> {
	data.get(key).and_then(JsonValue::as_u64)
}

/// Wraps a whole placeholder as a single plugin
///
/// The data holds `name` (label of the copied placeholder) and
/// `placeholder_ref`, the id of a private placeholder holding the wrapped
/// plugins. That placeholder records the plugin as its source; a reference
/// to any other placeholder is never followed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderPlugin;

impl PlaceholderPlugin {
	/// Type tag
	pub const TYPE: &'static str = "PlaceholderPlugin";

	/// Data key of the referenced placeholder
	pub const PLACEHOLDER_REF: &'static str = "placeholder_ref";

	/// Source kind of placeholders owned by a reference plugin
	pub const REFERENCE_SOURCE: &'static str = "placeholder_plugin";

	/// Create a reference plugin in `placeholder_id` along with its private placeholder
	pub fn create(
		store: &mut CmsStore,
		placeholder_id: PlaceholderId,
		language: &str,
		name: &str,
		reference_slot: &str,
	) -> CmsResult<(PluginNode, PlaceholderId)> {
		let node = store.tree_mut().insert(
			NewPlugin::new(placeholder_id, language, Self::TYPE).data(json!({ "name": name })),
		)?;
		let reference = Self::bind_reference(store, node.id, reference_slot)?;
		Ok((store.tree().get(node.id)?.clone(), reference))
	}

	fn bind_reference(store: &mut CmsStore, plugin_id: PluginId, slot: &str) -> CmsResult<PlaceholderId> {
		let reference = store.create_placeholder(
			slot,
			Some(SourceRef::new(Self::REFERENCE_SOURCE, plugin_id.to_string())),
		);
		let mut data = store.tree().get(plugin_id)?.data.clone();
		data[Self::PLACEHOLDER_REF] = json!(reference.0);
		store.tree_mut().update_data(plugin_id, data)?;
		Ok(reference)
	}

	/// Placeholder wrapped by a reference plugin
	pub fn placeholder_ref(node: &PluginNode) -> Option<PlaceholderId> {
		if node.plugin_type != Self::TYPE {
			return None;
		}
		ref_id(&node.data, Self::PLACEHOLDER_REF).map(PlaceholderId)
	}

	/// Private placeholder created for `node`, if it still exists
	pub fn owned_placeholder(store: &CmsStore, node: &PluginNode) -> Option<PlaceholderId> {
		let reference = Self::placeholder_ref(node)?;
		let owner = SourceRef::new(Self::REFERENCE_SOURCE, node.id.to_string());
		store
			.placeholder(reference)
			.ok()
			.filter(|placeholder| placeholder.source.as_ref() == Some(&owner))
			.map(|_| reference)
	}
}

impl CmsPluginType for PlaceholderPlugin {
	fn plugin_type(&self) -> &str {
		Self::TYPE
	}

	fn name(&self) -> &str {
		"Placeholder"
	}

	fn system(&self) -> bool {
		true
	}

	fn validate(&self, data: &JsonValue) -> CmsResult<()> {
		match ref_id(data, Self::PLACEHOLDER_REF) {
			Some(_) => Ok(()),
			None => Err(CmsError::Validation(
				"placeholder_ref: this field is required".to_string(),
			)),
		}
	}

	fn validate_change(&self, _store: &CmsStore, plugin: &PluginNode, data: &JsonValue) -> CmsResult<()> {
		self.validate(data)?;
		if ref_id(data, Self::PLACEHOLDER_REF) != ref_id(&plugin.data, Self::PLACEHOLDER_REF) {
			return Err(CmsError::Validation(
				"placeholder_ref: the wrapped placeholder cannot be changed".to_string(),
			));
		}
		Ok(())
	}

	/// Deep-copy the wrapped placeholder so the copy owns its own plugins
	fn copy_relations(
		&self,
		store: &mut CmsStore,
		pool: &PluginPool,
		new: &PluginNode,
		old: &PluginNode,
	) -> CmsResult<()> {
		let Some(source) = Self::owned_placeholder(store, old) else {
			return Ok(());
		};
		let slot = store.placeholder(source)?.slot.clone();
		let reference = Self::bind_reference(store, new.id, &slot)?;
		let wrapped: Vec<PluginNode> = store
			.tree()
			.plugins(source, None)
			.into_iter()
			.cloned()
			.collect();
		copy_plugins_to(store, pool, &wrapped, reference, &new.language, None)?;
		Ok(())
	}
}

/// Renders the content of another plugin or placeholder
///
/// The data references either `plugin` or `alias_placeholder`. Both are
/// nulled when their target is deleted.
#[derive(Debug, Clone, Copy, Default)]
pub struct AliasPlugin;

impl AliasPlugin {
	/// Type tag
	pub const TYPE: &'static str = "AliasPlugin";

	/// Data key of the aliased plugin
	pub const PLUGIN: &'static str = "plugin";

	/// Data key of the aliased placeholder
	pub const ALIAS_PLACEHOLDER: &'static str = "alias_placeholder";

	/// Aliased plugin, if any
	pub fn plugin(node: &PluginNode) -> Option<PluginId> {
		ref_id(&node.data, Self::PLUGIN).map(PluginId)
	}

	/// Aliased placeholder, if any
	pub fn alias_placeholder(node: &PluginNode) -> Option<PlaceholderId> {
		ref_id(&node.data, Self::ALIAS_PLACEHOLDER).map(PlaceholderId)
	}

	/// Placeholder whose content the alias renders
	pub fn aliased_placeholder_id(store: &CmsStore, node: &PluginNode) -> Option<PlaceholderId> {
		match Self::plugin(node) {
			Some(plugin) => store.tree().find(plugin).map(|target| target.placeholder_id),
			None => Self::alias_placeholder(node),
		}
	}

	/// Whether rendering the alias would end up rendering itself
	///
	/// That is the case when it aliases its own placeholder, or when the
	/// aliased placeholder holds an alias pointing back here.
	pub fn is_recursive(store: &CmsStore, node: &PluginNode) -> bool {
		let Some(placeholder_id) = Self::aliased_placeholder_id(store, node) else {
			return false;
		};
		if placeholder_id == node.placeholder_id {
			return true;
		}

		store
			.tree()
			.plugins(placeholder_id, None)
			.into_iter()
			.filter(|candidate| candidate.plugin_type == Self::TYPE)
			.any(|candidate| {
				let points_at_node = Self::plugin(candidate) == Some(node.id);
				let points_at_placeholder = Self::plugin(candidate)
					.and_then(|plugin| store.tree().find(plugin))
					.is_some_and(|target| target.placeholder_id == node.placeholder_id);
				let aliases_placeholder =
					Self::alias_placeholder(candidate) == Some(node.placeholder_id);
				points_at_node || points_at_placeholder || aliases_placeholder
			})
	}
}

impl CmsPluginType for AliasPlugin {
	fn plugin_type(&self) -> &str {
		Self::TYPE
	}

	fn name(&self) -> &str {
		"Alias"
	}

	fn system(&self) -> bool {
		true
	}

	fn validate(&self, data: &JsonValue) -> CmsResult<()> {
		if ref_id(data, Self::PLUGIN).is_some() || ref_id(data, Self::ALIAS_PLACEHOLDER).is_some() {
			Ok(())
		} else {
			Err(CmsError::Validation(
				"an alias must reference a plugin or a placeholder".to_string(),
			))
		}
	}

	fn validate_change(&self, store: &CmsStore, plugin: &PluginNode, data: &JsonValue) -> CmsResult<()> {
		self.validate(data)?;
		let candidate = PluginNode {
			data: data.clone(),
			..plugin.clone()
		};
		if Self::is_recursive(store, &candidate) {
			return Err(CmsError::Validation(
				"Cannot create a recursive alias".to_string(),
			));
		}
		Ok(())
	}
}
