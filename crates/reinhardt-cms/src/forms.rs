//! Admin request forms
//!
//! Query strings and `application/x-www-form-urlencoded` bodies are parsed
//! into a [`FormData`] multimap and then into typed forms. Field errors are
//! reported as [`CmsError::Validation`] with a `field: message` text.

use crate::error::{CmsError, CmsResult};
use crate::models::{NewPlugin, PlaceholderId, PluginId, PluginNode};
use crate::plugin_pool::PluginPool;
use crate::settings::CmsSettings;
use crate::store::CmsStore;
use serde_json::{Map, Value as JsonValue};
use std::str::FromStr;

/// Sentinel in `plugin_order` marking where pasted plugins go
pub const COPY_SENTINEL: &str = "__COPY__";

/// Ordered multimap of form fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
	pairs: Vec<(String, String)>,
}

impl FormData {
	/// Create an empty form
	pub fn new() -> Self {
		Self::default()
	}

	/// Decode an urlencoded query string or body
	///
	/// ```
	/// use reinhardt_cms::forms::FormData;
	///
	/// let form = FormData::parse("plugin_order%5B%5D=3&plugin_order%5B%5D=__COPY__&x=a+b");
	/// assert_eq!(form.getlist("plugin_order[]"), vec!["3", "__COPY__"]);
	/// assert_eq!(form.get("x"), Some("a b"));
	/// ```
	pub fn parse(encoded: &str) -> Self {
		url::form_urlencoded::parse(encoded.as_bytes())
			.into_owned()
			.collect()
	}

	/// Append a value
	pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
		self.pairs.push((key.into(), value.into()));
		self
	}

	/// Builder flavor of [`FormData::append`]
	pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
		self.pairs.push((key.into(), value.to_string()));
		self
	}

	/// Encode back into urlencoded form
	pub fn encode(&self) -> String {
		url::form_urlencoded::Serializer::new(String::new())
			.extend_pairs(self.pairs.iter())
			.finish()
	}

	/// First value of `key`
	pub fn get(&self, key: &str) -> Option<&str> {
		self.pairs
			.iter()
			.find(|(k, _)| k == key)
			.map(|(_, v)| v.as_str())
	}

	/// Every value of `key` in submission order
	pub fn getlist(&self, key: &str) -> Vec<&str> {
		self.pairs
			.iter()
			.filter(|(k, _)| k == key)
			.map(|(_, v)| v.as_str())
			.collect()
	}

	/// Whether the form holds no fields
	pub fn is_empty(&self) -> bool {
		self.pairs.is_empty()
	}

	/// First non-blank value of `key`
	pub fn value(&self, key: &str) -> Option<&str> {
		self.get(key).map(str::trim).filter(|value| !value.is_empty())
	}

	/// First non-blank value of `key`, failing when missing
	pub fn require(&self, key: &str) -> CmsResult<&str> {
		self.value(key)
			.ok_or_else(|| CmsError::Validation(format!("{}: This field is required.", key)))
	}

	/// Parse an optional field
	pub fn parse_optional<T: FromStr>(&self, key: &str) -> CmsResult<Option<T>> {
		self.value(key)
			.map(|raw| {
				raw.parse::<T>().map_err(|_| {
					CmsError::Validation(format!("{}: Enter a valid value.", key))
				})
			})
			.transpose()
	}

	/// Parse a required field
	pub fn parse_required<T: FromStr>(&self, key: &str) -> CmsResult<T> {
		self.require(key)?;
		self.parse_optional(key)?
			.ok_or_else(|| CmsError::Validation(format!("{}: This field is required.", key)))
	}

	/// Parse a checkbox-style boolean
	pub fn flag(&self, key: &str) -> bool {
		matches!(
			self.value(key).map(str::to_ascii_lowercase).as_deref(),
			Some("1" | "true" | "on" | "yes")
		)
	}

	/// Plugin data carried by the form
	///
	/// A `data` field is parsed as a JSON object; otherwise every field not
	/// listed in `reserved` becomes a string value.
	pub fn plugin_data(&self, reserved: &[&str]) -> CmsResult<JsonValue> {
		if let Some(raw) = self.get("data") {
			let data: JsonValue = serde_json::from_str(raw)
				.map_err(|e| CmsError::Validation(format!("data: {}", e)))?;
			if !data.is_object() {
				return Err(CmsError::Validation("data: Enter a JSON object.".to_string()));
			}
			return Ok(data);
		}

		let mut data = Map::new();
		for (key, value) in &self.pairs {
			if reserved.contains(&key.as_str()) || key == "csrfmiddlewaretoken" {
				continue;
			}
			data.insert(key.clone(), JsonValue::String(value.clone()));
		}
		Ok(JsonValue::Object(data))
	}
}

impl FromIterator<(String, String)> for FormData {
	fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
		Self {
			pairs: iter.into_iter().collect(),
		}
	}
}

/// Query of `add-plugin/`
#[derive(Debug, Clone, PartialEq)]
pub struct PluginAddForm {
	/// Target placeholder
	pub placeholder_id: PlaceholderId,
	/// Type of the new plugin
	pub plugin_type: String,
	/// Language of the new plugin
	pub plugin_language: String,
	/// Optional parent plugin
	pub plugin_parent: Option<PluginId>,
	/// Optional position among siblings
	pub plugin_position: Option<usize>,
}

impl PluginAddForm {
	/// Read the fields from a query
	pub fn from_form(form: &FormData) -> CmsResult<Self> {
		Ok(Self {
			placeholder_id: form.parse_required("placeholder_id")?,
			plugin_type: form.require("plugin_type")?.to_string(),
			plugin_language: form.require("plugin_language")?.to_string(),
			plugin_parent: form.parse_optional("plugin_parent")?,
			plugin_position: form.parse_optional("plugin_position")?,
		})
	}

	/// Validate against the store and turn into creation attributes
	pub fn clean(
		self,
		store: &CmsStore,
		pool: &PluginPool,
		settings: &CmsSettings,
		data: JsonValue,
	) -> CmsResult<NewPlugin> {
		let placeholder = store.placeholder(self.placeholder_id).map_err(|_| {
			CmsError::Validation(format!(
				"placeholder_id: Select a valid choice. {} is not one of the available choices.",
				self.placeholder_id
			))
		})?;
		let plugin_type = pool.get(&self.plugin_type)?;
		if plugin_type.system() {
			return Err(CmsError::Validation(format!(
				"plugin_type: {} cannot be added manually",
				self.plugin_type
			)));
		}
		if !settings.is_supported_language(&self.plugin_language) {
			return Err(CmsError::Validation(
				"plugin_language: Language must be set to a supported language!".to_string(),
			));
		}

		let parent = self
			.plugin_parent
			.map(|parent_id| {
				store.tree().get(parent_id).map_err(|_| {
					CmsError::Validation("plugin_parent: Parent plugin does not exist".to_string())
				})
			})
			.transpose()?;

		if let Some(parent) = parent {
			if parent.language != self.plugin_language {
				return Err(CmsError::Validation(
					"plugin_parent: Parent plugin language must be same as language!".to_string(),
				));
			}
			if parent.placeholder_id != self.placeholder_id {
				return Err(CmsError::Validation(
					"plugin_parent: Parent plugin placeholder must be same as placeholder!"
						.to_string(),
				));
			}
		}
		check_nesting(pool, &self.plugin_type, parent)?;

		if let Some(conf) = settings.placeholder_conf(&placeholder.slot) {
			if !conf.allows(&self.plugin_type) {
				return Err(CmsError::Validation(format!(
					"plugin_type: {} is not allowed in placeholder {}",
					self.plugin_type, placeholder.slot
				)));
			}
			check_limits(store, settings, self.placeholder_id, &self.plugin_language, pool, &self.plugin_type)?;
		}

		plugin_type.validate(&data)?;

		Ok(NewPlugin {
			placeholder_id: self.placeholder_id,
			language: self.plugin_language,
			plugin_type: self.plugin_type,
			parent_id: self.plugin_parent,
			position: self.plugin_position,
			data,
		})
	}
}

/// Check child and parent type restrictions for nesting `plugin_type` under `parent`
pub fn check_nesting(pool: &PluginPool, plugin_type: &str, parent: Option<&PluginNode>) -> CmsResult<()> {
	let child = pool.get(plugin_type)?;
	let Some(parent) = parent else {
		if child.require_parent() {
			return Err(CmsError::Validation(format!(
				"plugin_parent: {} must be nested inside another plugin",
				plugin_type
			)));
		}
		return Ok(());
	};

	let parent_type = pool.get(&parent.plugin_type)?;
	if !parent_type.allow_children() {
		return Err(CmsError::Validation(format!(
			"plugin_parent: {} does not accept children",
			parent.plugin_type
		)));
	}
	if let Some(children) = parent_type.child_classes()
		&& !children.iter().any(|allowed| allowed == plugin_type)
	{
		return Err(CmsError::Validation(format!(
			"plugin_type: {} is not allowed inside {}",
			plugin_type, parent.plugin_type
		)));
	}
	if let Some(parents) = child.parent_classes()
		&& !parents.iter().any(|allowed| *allowed == parent.plugin_type)
	{
		return Err(CmsError::Validation(format!(
			"plugin_parent: {} cannot be nested inside {}",
			plugin_type, parent.plugin_type
		)));
	}
	Ok(())
}

/// Check the placeholder limits for one more `plugin_type` in `language`
pub fn check_limits(
	store: &CmsStore,
	settings: &CmsSettings,
	placeholder_id: PlaceholderId,
	language: &str,
	pool: &PluginPool,
	plugin_type: &str,
) -> CmsResult<()> {
	let placeholder = store.placeholder(placeholder_id)?;
	let Some(conf) = settings.placeholder_conf(&placeholder.slot) else {
		return Ok(());
	};
	let plugins = store.tree().plugins(placeholder_id, Some(language));
	let of_type = plugins
		.iter()
		.filter(|plugin| plugin.plugin_type == plugin_type)
		.count();
	let name = pool
		.find(plugin_type)
		.map(|plugin| plugin.name().to_string())
		.unwrap_or_else(|| plugin_type.to_string());
	conf.check_limits(plugin_type, &name, plugins.len(), of_type)
}

/// Body of `move-plugin/`
#[derive(Debug, Clone, PartialEq)]
pub struct MovePluginForm {
	/// Plugin to move, or clipboard plugin to paste
	pub plugin_id: PluginId,
	/// Target placeholder
	pub placeholder_id: PlaceholderId,
	/// Target language
	pub target_language: String,
	/// Target parent, `None` for root
	pub plugin_parent: Option<PluginId>,
	/// Requested order of the target sibling group, may contain [`COPY_SENTINEL`]
	pub plugin_order: Vec<String>,
	/// Paste a copy instead of moving
	pub move_a_copy: bool,
}

impl MovePluginForm {
	/// Read the fields from a body
	pub fn from_form(form: &FormData) -> CmsResult<Self> {
		let target_language = form
			.value("target_language")
			.or_else(|| form.value("plugin_language"))
			.ok_or_else(|| {
				CmsError::Validation("target_language: This field is required.".to_string())
			})?
			.to_string();

		let plugin_order: Vec<String> = form
			.getlist("plugin_order[]")
			.into_iter()
			.chain(form.getlist("plugin_order"))
			.flat_map(|value| value.split(','))
			.map(str::trim)
			.filter(|value| !value.is_empty())
			.map(str::to_string)
			.collect();
		for entry in &plugin_order {
			if entry != COPY_SENTINEL && entry.parse::<PluginId>().is_err() {
				return Err(CmsError::Validation(format!(
					"plugin_order: '{}' is not a plugin id",
					entry
				)));
			}
		}

		Ok(Self {
			plugin_id: form.parse_required("plugin_id")?,
			placeholder_id: form.parse_required("placeholder_id")?,
			target_language,
			plugin_parent: form.parse_optional("plugin_parent")?,
			plugin_order,
			move_a_copy: form.flag("move_a_copy"),
		})
	}

	/// Order entries that are plugin ids, without the sentinel
	pub fn order_ids(&self) -> Vec<PluginId> {
		self.plugin_order
			.iter()
			.filter_map(|entry| entry.parse().ok())
			.collect()
	}

	/// Index of [`COPY_SENTINEL`] in the order, if present
	pub fn sentinel_index(&self) -> Option<usize> {
		self.plugin_order
			.iter()
			.position(|entry| entry == COPY_SENTINEL)
	}

	/// Order with `inserted` placed at the sentinel, or appended without one
	pub fn order_with(&self, inserted: &[PluginId]) -> Vec<PluginId> {
		let mut order = self.order_ids();
		let at = self
			.sentinel_index()
			.map(|index| {
				self.plugin_order[..index]
					.iter()
					.filter(|entry| *entry != COPY_SENTINEL)
					.count()
			})
			.unwrap_or(order.len());
		order.splice(at..at, inserted.iter().copied());
		order
	}
}

/// Body of `copy-plugins/`
#[derive(Debug, Clone, PartialEq)]
pub struct CopyPluginsForm {
	/// Placeholder copied from
	pub source_placeholder_id: PlaceholderId,
	/// Language copied from
	pub source_language: String,
	/// Single plugin to copy, `None` for the whole placeholder
	pub source_plugin_id: Option<PluginId>,
	/// Placeholder copied to
	pub target_placeholder_id: PlaceholderId,
	/// Language copied to
	pub target_language: String,
}

impl CopyPluginsForm {
	/// Read the fields from a body
	pub fn from_form(form: &FormData, settings: &CmsSettings) -> CmsResult<Self> {
		let source_language = form
			.value("source_language")
			.or_else(|| form.value("plugin_language"))
			.ok_or_else(|| {
				CmsError::Validation("source_language: This field is required.".to_string())
			})?
			.to_string();
		let target_language = form
			.value("target_language")
			.map(str::to_string)
			.unwrap_or_else(|| source_language.clone());
		if !settings.is_supported_language(&target_language) {
			return Err(CmsError::Validation(
				"target_language: Language must be set to a supported language!".to_string(),
			));
		}

		Ok(Self {
			source_placeholder_id: form.parse_required("source_placeholder_id")?,
			source_language,
			source_plugin_id: form.parse_optional("source_plugin_id")?,
			target_placeholder_id: form.parse_required("target_placeholder_id")?,
			target_language,
		})
	}
}
