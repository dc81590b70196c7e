//! CMS settings
//!
//! Loaded from TOML or built in code:
//!
//! ```
//! use reinhardt_cms::settings::CmsSettings;
//!
//! let settings = CmsSettings::from_toml(r#"
//! languages = ["en", "de"]
//! default_language = "en"
//!
//! [placeholder_conf.content]
//! name = "Main content"
//! excluded_plugins = ["VideoPlugin"]
//! limits = { global = 5, TextPlugin = 2 }
//! "#).unwrap();
//!
//! assert!(settings.is_supported_language("de"));
//! assert_eq!(settings.placeholder_conf("content").unwrap().limits["TextPlugin"], 2);
//! ```

use crate::error::{CmsError, CmsResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Limit key applying to all plugin types together
pub const GLOBAL_LIMIT: &str = "global";

/// Top-level CMS settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CmsSettings {
	/// Configured language codes
	pub languages: Vec<String>,
	/// Language used when a request does not name one
	pub default_language: String,
	/// Slot given to clipboard placeholders
	pub clipboard_slot: String,
	/// Per-slot placeholder configuration
	pub placeholder_conf: HashMap<String, PlaceholderConf>,
}

impl Default for CmsSettings {
	fn default() -> Self {
		Self {
			languages: vec!["en".to_string()],
			default_language: "en".to_string(),
			clipboard_slot: "clipboard".to_string(),
			placeholder_conf: HashMap::new(),
		}
	}
}

impl CmsSettings {
	/// Parse and validate settings from a TOML document
	pub fn from_toml(content: &str) -> CmsResult<Self> {
		let settings: Self = toml::from_str(content)
			.map_err(|e| CmsError::Settings(format!("TOML parse error: {}", e)))?;
		settings.validate()?;
		Ok(settings)
	}

	/// Read settings from a TOML file
	pub fn from_file(path: impl AsRef<Path>) -> CmsResult<Self> {
		let path = path.as_ref();
		let content = std::fs::read_to_string(path).map_err(|e| {
			CmsError::Settings(format!("Failed to read {}: {}", path.display(), e))
		})?;
		Self::from_toml(&content)
	}

	/// Check cross-field consistency
	pub fn validate(&self) -> CmsResult<()> {
		if self.languages.is_empty() {
			return Err(CmsError::Settings("at least one language must be configured".to_string()));
		}
		if !self.is_supported_language(&self.default_language) {
			return Err(CmsError::Settings(format!(
				"default language '{}' is not in the configured languages",
				self.default_language
			)));
		}
		if self.clipboard_slot.trim().is_empty() {
			return Err(CmsError::Settings("clipboard_slot must not be empty".to_string()));
		}
		Ok(())
	}

	/// Whether `language` is configured
	pub fn is_supported_language(&self, language: &str) -> bool {
		self.languages.iter().any(|configured| configured == language)
	}

	/// Resolve a requested language, falling back to the default
	pub fn language_code(&self, language: Option<&str>) -> String {
		match language {
			Some(language) if self.is_supported_language(language) => language.to_string(),
			_ => self.default_language.clone(),
		}
	}

	/// Configuration of a slot, if any
	pub fn placeholder_conf(&self, slot: &str) -> Option<&PlaceholderConf> {
		self.placeholder_conf.get(slot)
	}
}

/// Restrictions for one placeholder slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaceholderConf {
	/// Display name overriding the slot label
	pub name: Option<String>,
	/// Allowed plugin types, `None` for all
	pub plugins: Option<Vec<String>>,
	/// Plugin types never allowed
	pub excluded_plugins: Vec<String>,
	/// Maximum number of plugins, keyed by type or [`GLOBAL_LIMIT`]
	pub limits: BTreeMap<String, usize>,
	/// Default width handed to plugins
	pub default_width: Option<u32>,
}

impl PlaceholderConf {
	/// Whether `plugin_type` may be added to the slot
	pub fn allows(&self, plugin_type: &str) -> bool {
		let listed = self
			.plugins
			.as_ref()
			.is_none_or(|plugins| plugins.iter().any(|allowed| allowed == plugin_type));
		listed && !self.excluded_plugins.iter().any(|excluded| excluded == plugin_type)
	}

	/// Check that one more `plugin_type` fits
	///
	/// `total` counts every plugin already in the placeholder language,
	/// `of_type` those of `plugin_type`.
	pub fn check_limits(
		&self,
		plugin_type: &str,
		plugin_name: &str,
		total: usize,
		of_type: usize,
	) -> CmsResult<()> {
		if let Some(limit) = self.limits.get(GLOBAL_LIMIT)
			&& total >= *limit
		{
			return Err(CmsError::PluginLimitReached(format!(
				"This placeholder already has the maximum number of plugins ({}).",
				limit
			)));
		}
		if let Some(limit) = self.limits.get(plugin_type)
			&& of_type >= *limit
		{
			return Err(CmsError::PluginLimitReached(format!(
				"This placeholder already has the maximum number ({}) of allowed {} plugins.",
				limit, plugin_name
			)));
		}
		Ok(())
	}
}
