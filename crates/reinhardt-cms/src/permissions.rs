//! Users and plugin permission policies
//!
//! Permissions are strings in the `"app_label.codename"` format. Superusers
//! hold every permission implicitly.

use crate::models::{Placeholder, PluginNode};
use serde::{Deserialize, Serialize};

/// Permission to create plugins
pub const ADD_PLUGIN: &str = "cms.add_cmsplugin";
/// Permission to edit, move or reorder plugins
pub const CHANGE_PLUGIN: &str = "cms.change_cmsplugin";
/// Permission to delete plugins
pub const DELETE_PLUGIN: &str = "cms.delete_cmsplugin";

/// The user performing an admin action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmsUser {
	/// Primary key, also keys the user's clipboard
	pub id: u64,
	/// Login name
	pub username: String,
	/// Inactive users are rejected by every endpoint
	pub is_active: bool,
	/// Whether the user may use the admin
	pub is_staff: bool,
	/// Superusers pass every permission check
	pub is_superuser: bool,
	/// Directly assigned permissions
	pub user_permissions: Vec<String>,
}

impl CmsUser {
	/// Create an active user without admin access or permissions
	pub fn new(id: u64, username: impl Into<String>) -> Self {
		Self {
			id,
			username: username.into(),
			is_active: true,
			is_staff: false,
			is_superuser: false,
			user_permissions: Vec::new(),
		}
	}

	/// Create an active staff superuser
	pub fn superuser(id: u64, username: impl Into<String>) -> Self {
		Self {
			is_staff: true,
			is_superuser: true,
			..Self::new(id, username)
		}
	}

	/// Grant admin access
	pub fn staff(mut self) -> Self {
		self.is_staff = true;
		self
	}

	/// Grant permissions
	pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.user_permissions
			.extend(permissions.into_iter().map(Into::into));
		self
	}

	/// Whether the user holds `perm`
	///
	/// Inactive users hold no permissions.
	pub fn has_perm(&self, perm: &str) -> bool {
		if !self.is_active {
			return false;
		}
		self.is_superuser || self.user_permissions.iter().any(|held| held == perm)
	}

	/// Whether the user may use the placeholder admin at all
	pub fn is_admin_user(&self) -> bool {
		self.is_active && self.is_staff
	}
}

/// Decides whether a user may perform a plugin operation
pub trait PermissionPolicy: Send + Sync {
	/// Add a plugin of `plugin_type` to `placeholder`
	fn has_add_plugin_permission(
		&self,
		user: &CmsUser,
		placeholder: &Placeholder,
		plugin_type: &str,
	) -> bool;

	/// Edit `plugin`
	fn has_change_plugin_permission(&self, user: &CmsUser, plugin: &PluginNode) -> bool;

	/// Delete `plugin`
	fn has_delete_plugin_permission(&self, user: &CmsUser, plugin: &PluginNode) -> bool;

	/// Add every plugin of `plugins` to `placeholder`
	fn has_add_plugins_permission(
		&self,
		user: &CmsUser,
		placeholder: &Placeholder,
		plugins: &[PluginNode],
	) -> bool {
		plugins
			.iter()
			.all(|plugin| self.has_add_plugin_permission(user, placeholder, &plugin.plugin_type))
	}

	/// Copy `plugins` to the clipboard
	fn has_copy_plugins_permission(&self, user: &CmsUser, plugins: &[PluginNode]) -> bool;

	/// Paste `plugins` from the clipboard into `placeholder`
	fn has_copy_from_clipboard_permission(
		&self,
		user: &CmsUser,
		placeholder: &Placeholder,
		plugins: &[PluginNode],
	) -> bool {
		self.has_add_plugins_permission(user, placeholder, plugins)
	}

	/// Copy `plugins` of `source` into `target`
	fn has_copy_from_placeholder_permission(
		&self,
		user: &CmsUser,
		source: &Placeholder,
		target: &Placeholder,
		plugins: &[PluginNode],
	) -> bool;

	/// Move `plugin` into `target`
	fn has_move_plugin_permission(
		&self,
		user: &CmsUser,
		plugin: &PluginNode,
		target: &Placeholder,
	) -> bool {
		self.has_change_plugin_permission(user, plugin)
			&& self.has_add_plugin_permission(user, target, &plugin.plugin_type)
	}

	/// Clear `placeholder`, for one language or all of them
	fn has_clear_placeholder_permission(
		&self,
		user: &CmsUser,
		placeholder: &Placeholder,
		language: Option<&str>,
	) -> bool;
}

/// Policy backed by the `cms.*_cmsplugin` model permissions
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelPermissionPolicy;

impl PermissionPolicy for ModelPermissionPolicy {
	fn has_add_plugin_permission(&self, user: &CmsUser, _: &Placeholder, _: &str) -> bool {
		user.has_perm(ADD_PLUGIN)
	}

	fn has_change_plugin_permission(&self, user: &CmsUser, _: &PluginNode) -> bool {
		user.has_perm(CHANGE_PLUGIN)
	}

	fn has_delete_plugin_permission(&self, user: &CmsUser, _: &PluginNode) -> bool {
		user.has_perm(DELETE_PLUGIN)
	}

	fn has_copy_plugins_permission(&self, user: &CmsUser, plugins: &[PluginNode]) -> bool {
		plugins.is_empty() || user.has_perm(ADD_PLUGIN)
	}

	fn has_copy_from_placeholder_permission(
		&self,
		user: &CmsUser,
		_source: &Placeholder,
		target: &Placeholder,
		plugins: &[PluginNode],
	) -> bool {
		user.has_perm(CHANGE_PLUGIN) && self.has_add_plugins_permission(user, target, plugins)
	}

	fn has_clear_placeholder_permission(
		&self,
		user: &CmsUser,
		_: &Placeholder,
		_: Option<&str>,
	) -> bool {
		user.has_perm(DELETE_PLUGIN)
	}
}
