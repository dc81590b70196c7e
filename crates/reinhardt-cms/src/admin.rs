//! Placeholder admin
//!
//! Request handling for the placeholder endpoints. Every mutating action
//! follows the same sequence: authorize, announce through the
//! [`OperationNotifier`], mutate inside one [`Transaction`](crate::store::Transaction),
//! report, respond. Any error (including a vetoing signal receiver) drops
//! the transaction and with it every change the action made.

use crate::clipboard;
use crate::collector;
use crate::copy::{copy_plugins_to, top_level_ids};
use crate::error::{CmsError, CmsResult};
use crate::forms::{CopyPluginsForm, FormData, MovePluginForm, PluginAddForm, check_limits};
use crate::models::{Placeholder, PlaceholderId, PluginId, PluginNode};
use crate::operations::{OperationContext, OperationKind, OperationNotifier, OperationPayload};
use crate::permissions::{CmsUser, ModelPermissionPolicy, PermissionPolicy};
use crate::plugin_pool::{CmsPluginType, PlaceholderPlugin, PluginPool};
use crate::reorder::reorder_plugins;
use crate::settings::CmsSettings;
use crate::store::{CmsStore, Database};
use crate::tree::SiblingGroup;
use http::{Method, StatusCode};
use serde_json::{Value as JsonValue, json};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A request to one of the placeholder endpoints
#[derive(Debug, Clone)]
pub struct AdminRequest {
	/// HTTP method
	pub method: Method,
	/// Request path without query
	pub path: String,
	/// Decoded query string
	pub query: FormData,
	/// Decoded urlencoded body
	pub body: FormData,
	/// Authenticated user
	pub user: CmsUser,
}

impl AdminRequest {
	/// Create a request for `uri` (path plus optional query)
	pub fn new(method: Method, uri: &str, user: CmsUser) -> Self {
		let (path, query) = match uri.split_once('?') {
			Some((path, query)) => (path, FormData::parse(query)),
			None => (uri, FormData::new()),
		};
		Self {
			method,
			path: path.to_string(),
			query,
			body: FormData::new(),
			user,
		}
	}

	/// Create a GET request
	pub fn get(uri: &str, user: CmsUser) -> Self {
		Self::new(Method::GET, uri, user)
	}

	/// Create a POST request
	pub fn post(uri: &str, user: CmsUser) -> Self {
		Self::new(Method::POST, uri, user)
	}

	/// Attach a decoded body
	pub fn form(mut self, body: FormData) -> Self {
		self.body = body;
		self
	}

	/// Attach an urlencoded body
	pub fn body(mut self, encoded: &str) -> Self {
		self.body = FormData::parse(encoded);
		self
	}

	/// The `cms_path` query parameter
	pub fn cms_path(&self) -> Option<&str> {
		self.query.value("cms_path")
	}
}

/// Result of an admin request
#[derive(Debug, Clone, PartialEq)]
pub struct AdminResponse {
	/// HTTP status
	pub status: StatusCode,
	/// JSON body
	pub body: JsonValue,
	/// Redirect target, for redirects
	pub location: Option<String>,
}

impl AdminResponse {
	/// 200 response with a JSON body
	pub fn json(body: JsonValue) -> Self {
		Self {
			status: StatusCode::OK,
			body,
			location: None,
		}
	}

	/// 302 response to `location`
	pub fn redirect(location: impl Into<String>) -> Self {
		let location = location.into();
		Self {
			status: StatusCode::FOUND,
			body: json!({ "success": true, "redirect": location }),
			location: Some(location),
		}
	}

	/// Error response with the status of `error`
	pub fn from_error(error: &CmsError) -> Self {
		Self {
			status: error.status_code(),
			body: json!({ "success": false, "error": error.to_string() }),
			location: None,
		}
	}

	/// Whether the request succeeded
	pub fn is_success(&self) -> bool {
		self.status.is_success() || self.status.is_redirection()
	}
}

/// Placeholder endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminRoute {
	/// `add-plugin/`
	AddPlugin,
	/// `copy-plugins/`
	CopyPlugins,
	/// `edit-plugin/{id}/`
	EditPlugin(PluginId),
	/// `delete-plugin/{id}/`
	DeletePlugin(PluginId),
	/// `move-plugin/`
	MovePlugin,
	/// `clear-placeholder/{id}/`
	ClearPlaceholder(PlaceholderId),
}

impl AdminRoute {
	/// Resolve a request path, ignoring any mount prefix
	///
	/// ```
	/// use reinhardt_cms::admin::AdminRoute;
	/// use reinhardt_cms::models::PluginId;
	///
	/// assert_eq!(AdminRoute::resolve("/admin/cms/edit-plugin/7/").unwrap(), AdminRoute::EditPlugin(PluginId(7)));
	/// assert!(AdminRoute::resolve("/admin/cms/unknown/").is_err());
	/// ```
	pub fn resolve(path: &str) -> CmsResult<Self> {
		let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
		let not_found = || CmsError::NotFound(format!("no placeholder endpoint at {}", path));
		let Some(start) = segments.iter().position(|segment| {
			matches!(
				*segment,
				"add-plugin"
					| "copy-plugins" | "edit-plugin"
					| "delete-plugin" | "move-plugin"
					| "clear-placeholder"
			)
		}) else {
			return Err(not_found());
		};

		match &segments[start..] {
			["add-plugin"] => Ok(Self::AddPlugin),
			["copy-plugins"] => Ok(Self::CopyPlugins),
			["move-plugin"] => Ok(Self::MovePlugin),
			["edit-plugin", id] => id.parse().map(Self::EditPlugin).map_err(|_| not_found()),
			["delete-plugin", id] => id.parse().map(Self::DeletePlugin).map_err(|_| not_found()),
			["clear-placeholder", id] => {
				id.parse().map(Self::ClearPlaceholder).map_err(|_| not_found())
			}
			_ => Err(not_found()),
		}
	}

	/// Endpoint name used in logs
	pub fn name(&self) -> &'static str {
		match self {
			Self::AddPlugin => "add_plugin",
			Self::CopyPlugins => "copy_plugins",
			Self::EditPlugin(_) => "edit_plugin",
			Self::DeletePlugin(_) => "delete_plugin",
			Self::MovePlugin => "move_plugin",
			Self::ClearPlaceholder(_) => "clear_placeholder",
		}
	}
}

/// Builder for [`PlaceholderAdmin`]
pub struct PlaceholderAdminBuilder {
	database: Database,
	pool: PluginPool,
	settings: CmsSettings,
	notifier: OperationNotifier,
	policy: Arc<dyn PermissionPolicy>,
	admin_index: String,
	error: Option<CmsError>,
}

impl PlaceholderAdminBuilder {
	fn new() -> Self {
		Self {
			database: Database::default(),
			pool: PluginPool::with_builtins(),
			settings: CmsSettings::default(),
			notifier: OperationNotifier::new(),
			policy: Arc::new(ModelPermissionPolicy),
			admin_index: "/admin/".to_string(),
			error: None,
		}
	}

	/// Use an existing database
	pub fn database(mut self, database: Database) -> Self {
		self.database = database;
		self
	}

	/// Replace the plugin pool
	pub fn pool(mut self, pool: PluginPool) -> Self {
		self.pool = pool;
		self
	}

	/// Register a plugin type
	pub fn plugin(mut self, plugin: impl CmsPluginType + 'static) -> Self {
		if let Err(error) = self.pool.register(plugin)
			&& self.error.is_none()
		{
			self.error = Some(error);
		}
		self
	}

	/// Set the CMS settings
	pub fn settings(mut self, settings: CmsSettings) -> Self {
		self.settings = settings;
		self
	}

	/// Share an existing notifier
	pub fn notifier(mut self, notifier: OperationNotifier) -> Self {
		self.notifier = notifier;
		self
	}

	/// Replace the permission policy
	pub fn policy(mut self, policy: impl PermissionPolicy + 'static) -> Self {
		self.policy = Arc::new(policy);
		self
	}

	/// Redirect target after deletions
	pub fn admin_index(mut self, admin_index: impl Into<String>) -> Self {
		self.admin_index = admin_index.into();
		self
	}

	/// Build the admin
	///
	/// # Errors
	///
	/// Invalid settings or a plugin type registered twice.
	pub fn build(self) -> CmsResult<PlaceholderAdmin> {
		if let Some(error) = self.error {
			return Err(error);
		}
		self.settings.validate()?;
		Ok(PlaceholderAdmin {
			db: self.database,
			pool: self.pool,
			settings: self.settings,
			notifier: self.notifier,
			policy: self.policy,
			admin_index: self.admin_index,
		})
	}
}

/// Permission-checked, transactional placeholder operations
pub struct PlaceholderAdmin {
	db: Database,
	pool: PluginPool,
	settings: CmsSettings,
	notifier: OperationNotifier,
	policy: Arc<dyn PermissionPolicy>,
	admin_index: String,
}

impl fmt::Debug for PlaceholderAdmin {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PlaceholderAdmin")
			.field("pool", &self.pool)
			.field("settings", &self.settings)
			.field("admin_index", &self.admin_index)
			.finish_non_exhaustive()
	}
}

impl PlaceholderAdmin {
	/// Start building an admin
	pub fn builder() -> PlaceholderAdminBuilder {
		PlaceholderAdminBuilder::new()
	}

	/// The underlying database
	pub fn database(&self) -> &Database {
		&self.db
	}

	/// The operation notifier
	pub fn notifier(&self) -> &OperationNotifier {
		&self.notifier
	}

	/// The plugin pool
	pub fn pool(&self) -> &PluginPool {
		&self.pool
	}

	/// The CMS settings
	pub fn settings(&self) -> &CmsSettings {
		&self.settings
	}

	/// Clipboard placeholder of `user`, creating it on first use
	pub async fn clipboard(&self, user: &CmsUser) -> PlaceholderId {
		let mut tx = self.db.begin().await;
		let clipboard = clipboard::get_or_create(&mut tx, user.id, &self.settings.clipboard_slot);
		tx.commit();
		clipboard
	}

	/// Route and run a request, turning errors into responses
	pub async fn handle(&self, request: AdminRequest) -> AdminResponse {
		let route = match AdminRoute::resolve(&request.path) {
			Ok(route) => route,
			Err(error) => return AdminResponse::from_error(&error),
		};

		match self.dispatch(route, &request).await {
			Ok(response) => response,
			Err(error) => {
				tracing::debug!(
					endpoint = route.name(),
					user = %request.user.username,
					status = error.status_code().as_u16(),
					%error,
					"Placeholder request failed"
				);
				AdminResponse::from_error(&error)
			}
		}
	}

	/// Run a request for an already resolved route
	pub async fn dispatch(&self, route: AdminRoute, request: &AdminRequest) -> CmsResult<AdminResponse> {
		let response = match route {
			AdminRoute::AddPlugin => self.add_plugin(request).await,
			AdminRoute::CopyPlugins => self.copy_plugins(request).await,
			AdminRoute::EditPlugin(plugin_id) => self.edit_plugin(request, plugin_id).await,
			AdminRoute::DeletePlugin(plugin_id) => self.delete_plugin(request, plugin_id).await,
			AdminRoute::MovePlugin => self.move_plugin(request).await,
			AdminRoute::ClearPlaceholder(placeholder_id) => {
				self.clear_placeholder(request, placeholder_id).await
			}
		}?;

		tracing::info!(
			endpoint = route.name(),
			user = %request.user.username,
			status = response.status.as_u16(),
			"Placeholder request completed"
		);
		Ok(response)
	}

	/// Create a plugin from the `add-plugin/` query and body
	pub async fn add_plugin(&self, request: &AdminRequest) -> CmsResult<AdminResponse> {
		require_post(request)?;
		authorize(request)?;
		let form = PluginAddForm::from_form(&request.query)?;
		let data = request.body.plugin_data(&[])?;
		let context = self.context(request);

		let mut tx = self.db.begin().await;
		let new = form.clean(&tx, &self.pool, &self.settings, data)?;
		let placeholder = tx.placeholder(new.placeholder_id)?;
		if !self
			.policy
			.has_add_plugin_permission(&request.user, placeholder, &new.plugin_type)
		{
			return Err(CmsError::PermissionDenied(
				"You do not have permission to add a plugin".to_string(),
			));
		}

		let group = SiblingGroup::new(new.placeholder_id, new.parent_id, new.language.clone());
		let tree_order = tx.tree().tree_order(&group);
		// The signal carries the created record; a veto rolls it back
		let plugin = tx.tree_mut().insert(new)?;
		let token = self
			.notifier
			.before(
				OperationKind::AddPlugin,
				context.as_ref(),
				OperationPayload::AddPlugin {
					plugin: plugin.clone(),
					placeholder: plugin.placeholder_id,
					tree_order,
				},
			)
			.await?;

		tx.placeholder_mut(plugin.placeholder_id)?
			.mark_as_dirty(&plugin.language, false);
		let plugin = tx.tree().get(plugin.id)?.clone();
		let tree_order = tx.tree().tree_order(&group);

		self.notifier
			.after(
				OperationKind::AddPlugin,
				&token,
				context.as_ref(),
				OperationPayload::AddPlugin {
					plugin: plugin.clone(),
					placeholder: plugin.placeholder_id,
					tree_order,
				},
			)
			.await?;
		tx.commit();

		Ok(AdminResponse::json(json!({
			"success": true,
			"plugin": plugin,
			"edit_url": format!("{}edit-plugin/{}/", self.admin_index, plugin.id),
		})))
	}

	/// Show (GET) or replace (POST) a plugin's data
	pub async fn edit_plugin(&self, request: &AdminRequest, plugin_id: PluginId) -> CmsResult<AdminResponse> {
		authorize(request)?;
		if request.method == Method::GET {
			let plugin = self
				.db
				.read(|store| store.tree().get(plugin_id).cloned())
				.await?;
			self.require_change(&request.user, &plugin)?;
			let name = self
				.pool
				.find(&plugin.plugin_type)
				.map(|plugin_type| plugin_type.name().to_string())
				.unwrap_or_else(|| plugin.plugin_type.clone());
			return Ok(AdminResponse::json(json!({ "plugin": plugin, "name": name })));
		}
		require_post(request)?;

		let context = self.context(request);
		let mut tx = self.db.begin().await;
		let old_plugin = tx.tree().get(plugin_id)?.clone();
		self.require_change(&request.user, &old_plugin)?;
		let data = request.body.plugin_data(&[])?;
		self.pool
			.get(&old_plugin.plugin_type)?
			.validate_change(&tx, &old_plugin, &data)?;

		let token = self
			.notifier
			.before(
				OperationKind::ChangePlugin,
				context.as_ref(),
				OperationPayload::ChangePlugin {
					old_plugin: old_plugin.clone(),
					new_plugin: PluginNode {
						data: data.clone(),
						..old_plugin.clone()
					},
				},
			)
			.await?;

		let new_plugin = tx.tree_mut().update_data(plugin_id, data)?.clone();
		tx.placeholder_mut(new_plugin.placeholder_id)?
			.mark_as_dirty(&new_plugin.language, false);

		self.notifier
			.after(
				OperationKind::ChangePlugin,
				&token,
				context.as_ref(),
				OperationPayload::ChangePlugin {
					old_plugin,
					new_plugin: new_plugin.clone(),
				},
			)
			.await?;
		tx.commit();

		Ok(AdminResponse::json(json!({ "success": true, "plugin": new_plugin })))
	}

	/// Confirm (GET) or carry out (POST) a plugin deletion
	pub async fn delete_plugin(&self, request: &AdminRequest, plugin_id: PluginId) -> CmsResult<AdminResponse> {
		require_get_or_post(request)?;
		authorize(request)?;

		let context = self.context(request);
		let mut tx = self.db.begin().await;
		let plugin = tx.tree().get(plugin_id)?.clone();
		if !self.policy.has_delete_plugin_permission(&request.user, &plugin) {
			return Err(CmsError::PermissionDenied(
				"You do not have permission to delete this plugin".to_string(),
			));
		}
		let plan = collector::collect(&tx, &[plugin_id])?;

		if request.method == Method::GET {
			tx.rollback();
			return Ok(AdminResponse::json(json!({
				"title": "Are you sure?",
				"object_name": "plugin",
				"deleted_objects": plan.deleted_labels(),
				"protected": plan.protected_labels(),
			})));
		}
		if plan.is_protected() {
			return Err(CmsError::Conflict(format!(
				"You cannot delete protected objects: {}",
				plan.protected_labels().join(", ")
			)));
		}

		let group = SiblingGroup::new(plugin.placeholder_id, plugin.parent_id, plugin.language.clone());
		let tree_order = tx.tree().tree_order(&group);
		let token = self
			.notifier
			.before(
				OperationKind::DeletePlugin,
				context.as_ref(),
				OperationPayload::DeletePlugin {
					plugin: plugin.clone(),
					placeholder: plugin.placeholder_id,
					tree_order,
				},
			)
			.await?;

		collector::delete(&mut tx, &plan)?;
		tx.placeholder_mut(plugin.placeholder_id)?
			.mark_as_dirty(&plugin.language, false);
		let tree_order = tx.tree().tree_order(&group);

		self.notifier
			.after(
				OperationKind::DeletePlugin,
				&token,
				context.as_ref(),
				OperationPayload::DeletePlugin {
					plugin: plugin.clone(),
					placeholder: plugin.placeholder_id,
					tree_order,
				},
			)
			.await?;
		tx.commit();

		Ok(AdminResponse::redirect(self.admin_index.clone()))
	}

	/// Confirm (GET) or carry out (POST) emptying a placeholder
	///
	/// The `language` query parameter limits the clear to one language. The
	/// requesting user's own clipboard is emptied without permission checks
	/// or signals.
	pub async fn clear_placeholder(
		&self,
		request: &AdminRequest,
		placeholder_id: PlaceholderId,
	) -> CmsResult<AdminResponse> {
		require_get_or_post(request)?;
		authorize(request)?;

		let language = request.query.value("language");
		let context = self.context(request);
		let mut tx = self.db.begin().await;
		let placeholder = tx.placeholder(placeholder_id)?.clone();

		if tx.clipboard_owner(placeholder_id) == Some(request.user.id) {
			collector::clear_placeholder(&mut tx, placeholder_id, language)?;
			tx.commit();
			return Ok(AdminResponse::redirect(self.admin_index.clone()));
		}

		if !self
			.policy
			.has_clear_placeholder_permission(&request.user, &placeholder, language)
		{
			return Err(CmsError::PermissionDenied(
				"You do not have permission to clear this placeholder".to_string(),
			));
		}
		let plan = collector::collect_placeholder(&tx, placeholder_id, language)?;
		let label = self.placeholder_label(&placeholder);

		if request.method == Method::GET {
			tx.rollback();
			let title = if plan.is_protected() {
				format!("Cannot delete {}", label)
			} else {
				"Are you sure?".to_string()
			};
			return Ok(AdminResponse::json(json!({
				"title": title,
				"object_name": "placeholder",
				"deleted_objects": plan.deleted_labels(),
				"protected": plan.protected_labels(),
			})));
		}
		if plan.is_protected() {
			return Err(CmsError::Conflict(format!(
				"You cannot delete protected objects: {}",
				plan.protected_labels().join(", ")
			)));
		}

		let token = self
			.notifier
			.before(
				OperationKind::ClearPlaceholder,
				context.as_ref(),
				OperationPayload::ClearPlaceholder {
					plugins: plan.deleted.clone(),
					placeholder: placeholder_id,
				},
			)
			.await?;

		collector::delete(&mut tx, &plan)?;
		let languages: BTreeSet<String> = match language {
			Some(language) => BTreeSet::from([language.to_string()]),
			None => {
				let mut languages: BTreeSet<String> =
					plan.deleted.iter().map(|node| node.language.clone()).collect();
				if languages.is_empty() {
					languages.insert(self.settings.default_language.clone());
				}
				languages
			}
		};
		let target = tx.placeholder_mut(placeholder_id)?;
		for language in &languages {
			target.mark_as_dirty(language, true);
		}

		self.notifier
			.after(
				OperationKind::ClearPlaceholder,
				&token,
				context.as_ref(),
				OperationPayload::ClearPlaceholder {
					plugins: plan.deleted.clone(),
					placeholder: placeholder_id,
				},
			)
			.await?;
		tx.commit();

		Ok(AdminResponse::redirect(self.admin_index.clone()))
	}

	/// Move, cut or paste a plugin according to the `move-plugin/` body
	pub async fn move_plugin(&self, request: &AdminRequest) -> CmsResult<AdminResponse> {
		require_post(request)?;
		authorize(request)?;
		let form = MovePluginForm::from_form(&request.body)?;
		let context = self.context(request);

		let mut tx = self.db.begin().await;
		let plugin = tx.tree().get(form.plugin_id)?.clone();
		let target = tx.placeholder(form.placeholder_id)?.clone();
		if !self.settings.is_supported_language(&form.target_language) {
			return Err(CmsError::Validation(
				"target_language: Language must be set to a supported language!".to_string(),
			));
		}
		if let Some(parent_id) = form.plugin_parent {
			let parent = tx.tree().get(parent_id)?;
			if parent.placeholder_id != target.id || parent.language != form.target_language {
				return Err(CmsError::Validation(
					"plugin_parent: Parent plugin must be in the target placeholder and language"
						.to_string(),
				));
			}
			if !form.move_a_copy && (parent.id == plugin.id || plugin.is_ancestor_of(parent)) {
				return Err(CmsError::Conflict(format!(
					"cannot move plugin {} below its own descendant {}",
					plugin.id, parent.id
				)));
			}
		}
		check_order(&tx, &form)?;

		let into_clipboard = tx.clipboard_owner(target.id) == Some(request.user.id);
		if target.id != plugin.placeholder_id && !into_clipboard {
			check_limits(
				&tx,
				&self.settings,
				target.id,
				&form.target_language,
				&self.pool,
				&plugin.plugin_type,
			)?;
		}

		let step = MoveStep {
			user: &request.user,
			context: context.as_ref(),
			form: &form,
			target: &target,
		};
		let source_placeholder = plugin.placeholder_id;
		let source_language = plugin.language.clone();
		let plugins = if form.move_a_copy && plugin.plugin_type == PlaceholderPlugin::TYPE {
			self.paste_placeholder(&mut tx, &step, plugin).await?
		} else if form.move_a_copy {
			self.paste_plugin(&mut tx, &step, plugin).await?
		} else if into_clipboard {
			self.cut_plugin(&mut tx, &step, plugin).await?
		} else {
			self.move_existing(&mut tx, &step, plugin).await?
		};

		tx.placeholder_mut(target.id)?
			.mark_as_dirty(&form.target_language, false);
		if !form.move_a_copy
			&& source_placeholder != target.id
			&& let Ok(source) = tx.placeholder_mut(source_placeholder)
		{
			source.mark_as_dirty(&source_language, false);
		}
		tx.commit();

		Ok(AdminResponse::json(json!({ "success": true, "plugins": plugins })))
	}

	/// Copy plugins according to the `copy-plugins/` body
	///
	/// Copies into the requesting user's clipboard stage a single plugin
	/// (with `source_plugin_id`) or the whole placeholder wrapped in a
	/// [`PlaceholderPlugin`]. Copies into any other placeholder append the
	/// source language's plugins to its root order.
	pub async fn copy_plugins(&self, request: &AdminRequest) -> CmsResult<AdminResponse> {
		require_post(request)?;
		authorize(request)?;
		let form = CopyPluginsForm::from_form(&request.body, &self.settings)?;
		let context = self.context(request);

		let mut tx = self.db.begin().await;
		let source = tx.placeholder(form.source_placeholder_id)?.clone();
		let target = tx.placeholder(form.target_placeholder_id)?.clone();
		let step = CopyStep {
			user: &request.user,
			context: context.as_ref(),
			form: &form,
			source: &source,
			target: &target,
		};

		let into_clipboard = tx.clipboard_owner(target.id) == Some(request.user.id);
		let plugins = match (into_clipboard, form.source_plugin_id) {
			(true, Some(plugin_id)) => self.copy_plugin_to_clipboard(&mut tx, &step, plugin_id).await?,
			(true, None) => self.copy_placeholder_to_clipboard(&mut tx, &step).await?,
			(false, _) => self.add_plugins_from_placeholder(&mut tx, &step).await?,
		};
		tx.commit();

		Ok(AdminResponse::json(json!({ "success": true, "plugins": plugins })))
	}

	async fn paste_plugin(
		&self,
		store: &mut CmsStore,
		step: &MoveStep<'_>,
		plugin: PluginNode,
	) -> CmsResult<Vec<PluginNode>> {
		let plugins = subtree(store, plugin.id)?;
		if !self
			.policy
			.has_copy_from_clipboard_permission(step.user, step.target, &plugins)
		{
			return Err(CmsError::PermissionDenied(
				"You have no permission to paste this plugin".to_string(),
			));
		}

		let language = &step.form.target_language;
		let parent_id = step.form.plugin_parent;
		let token = self
			.notifier
			.before(
				OperationKind::PastePlugin,
				step.context,
				OperationPayload::PastePlugin {
					plugin,
					target_language: language.clone(),
					target_placeholder: step.target.id,
					target_parent_id: parent_id,
					target_order: step.form.order_ids(),
				},
			)
			.await?;

		let pairs = copy_plugins_to(store, &self.pool, &plugins, step.target.id, language, parent_id)?;
		let root = pairs
			.first()
			.map(|(new, _)| new.id)
			.ok_or_else(|| CmsError::Validation("nothing to paste".to_string()))?;
		let order = reorder_plugins(
			store.tree_mut(),
			step.target.id,
			parent_id,
			language,
			&paste_order(step.form, &[root]),
		)?;

		self.notifier
			.after(
				OperationKind::PastePlugin,
				&token,
				step.context,
				OperationPayload::PastePlugin {
					plugin: store.tree().get(root)?.clone(),
					target_language: language.clone(),
					target_placeholder: step.target.id,
					target_parent_id: parent_id,
					target_order: order,
				},
			)
			.await?;
		subtree(store, root)
	}

	async fn paste_placeholder(
		&self,
		store: &mut CmsStore,
		step: &MoveStep<'_>,
		plugin: PluginNode,
	) -> CmsResult<Vec<PluginNode>> {
		let reference = PlaceholderPlugin::owned_placeholder(store, &plugin).ok_or_else(|| {
			CmsError::Validation(format!("plugin {} does not reference a placeholder", plugin.id))
		})?;
		let plugins: Vec<PluginNode> = store
			.tree()
			.plugins(reference, None)
			.into_iter()
			.cloned()
			.collect();
		if !self
			.policy
			.has_copy_from_clipboard_permission(step.user, step.target, &plugins)
		{
			return Err(CmsError::PermissionDenied(
				"You have no permission to paste this placeholder".to_string(),
			));
		}

		let language = &step.form.target_language;
		let token = self
			.notifier
			.before(
				OperationKind::PastePlaceholder,
				step.context,
				OperationPayload::PastePlaceholder {
					plugins: plugins.clone(),
					target_language: language.clone(),
					target_placeholder: step.target.id,
					target_order: step.form.order_ids(),
				},
			)
			.await?;

		let pairs = copy_plugins_to(store, &self.pool, &plugins, step.target.id, language, None)?;
		let top = top_level_ids(&pairs, None);
		let order = reorder_plugins(
			store.tree_mut(),
			step.target.id,
			None,
			language,
			&paste_order(step.form, &top),
		)?;
		let new_plugins = reload(store, pairs.iter().map(|(new, _)| new.id))?;

		self.notifier
			.after(
				OperationKind::PastePlaceholder,
				&token,
				step.context,
				OperationPayload::PastePlaceholder {
					plugins: new_plugins.clone(),
					target_language: language.clone(),
					target_placeholder: step.target.id,
					target_order: order,
				},
			)
			.await?;
		Ok(new_plugins)
	}

	async fn move_existing(
		&self,
		store: &mut CmsStore,
		step: &MoveStep<'_>,
		plugin: PluginNode,
	) -> CmsResult<Vec<PluginNode>> {
		if !self
			.policy
			.has_move_plugin_permission(step.user, &plugin, step.target)
		{
			return Err(CmsError::PermissionDenied(
				"You have no permission to move this plugin".to_string(),
			));
		}

		let language = &step.form.target_language;
		let parent_id = step.form.plugin_parent;
		let source_group = SiblingGroup::new(plugin.placeholder_id, plugin.parent_id, plugin.language.clone());
		let target_group = SiblingGroup::new(step.target.id, parent_id, language.clone());
		let source_order = store.tree().tree_order(&source_group);
		let target_order = store.tree().tree_order(&target_group);

		let token = self
			.notifier
			.before(
				OperationKind::MovePlugin,
				step.context,
				OperationPayload::MovePlugin {
					plugin: plugin.clone(),
					source_language: plugin.language.clone(),
					source_placeholder: plugin.placeholder_id,
					source_parent_id: plugin.parent_id,
					source_order: source_order.clone(),
					target_language: language.clone(),
					target_placeholder: step.target.id,
					target_parent_id: parent_id,
					target_order,
				},
			)
			.await?;

		if source_group != target_group {
			store
				.tree_mut()
				.reparent(plugin.id, parent_id, step.target.id, language)?;
		}
		let source_order: Vec<PluginId> = source_order
			.into_iter()
			.filter(|id| *id != plugin.id)
			.collect();
		let target_order = reorder_plugins(
			store.tree_mut(),
			step.target.id,
			parent_id,
			language,
			&step.form.order_ids(),
		)?;

		self.notifier
			.after(
				OperationKind::MovePlugin,
				&token,
				step.context,
				OperationPayload::MovePlugin {
					plugin: store.tree().get(plugin.id)?.clone(),
					source_language: plugin.language.clone(),
					source_placeholder: plugin.placeholder_id,
					source_parent_id: plugin.parent_id,
					source_order,
					target_language: language.clone(),
					target_placeholder: step.target.id,
					target_parent_id: parent_id,
					target_order,
				},
			)
			.await?;
		subtree(store, plugin.id)
	}

	async fn cut_plugin(
		&self,
		store: &mut CmsStore,
		step: &MoveStep<'_>,
		plugin: PluginNode,
	) -> CmsResult<Vec<PluginNode>> {
		if !self
			.policy
			.has_move_plugin_permission(step.user, &plugin, step.target)
		{
			return Err(CmsError::PermissionDenied(
				"You have no permission to cut this plugin".to_string(),
			));
		}
		if plugin.placeholder_id == step.target.id {
			return Err(CmsError::Validation(format!(
				"plugin {} is already in the clipboard",
				plugin.id
			)));
		}

		let language = &step.form.target_language;
		let source_group = SiblingGroup::new(plugin.placeholder_id, plugin.parent_id, plugin.language.clone());
		let source_order = store.tree().tree_order(&source_group);
		let token = self
			.notifier
			.before(
				OperationKind::CutPlugin,
				step.context,
				OperationPayload::CutPlugin {
					plugin: plugin.clone(),
					clipboard: step.target.id,
					clipboard_language: language.clone(),
					source_language: plugin.language.clone(),
					source_placeholder: plugin.placeholder_id,
					source_parent_id: plugin.parent_id,
					source_order: source_order.clone(),
				},
			)
			.await?;

		clipboard::empty(store, step.target.id)?;
		store
			.tree_mut()
			.reparent(plugin.id, None, step.target.id, language)?;
		let source_order: Vec<PluginId> = source_order
			.into_iter()
			.filter(|id| *id != plugin.id)
			.collect();

		self.notifier
			.after(
				OperationKind::CutPlugin,
				&token,
				step.context,
				OperationPayload::CutPlugin {
					plugin: store.tree().get(plugin.id)?.clone(),
					clipboard: step.target.id,
					clipboard_language: language.clone(),
					source_language: plugin.language.clone(),
					source_placeholder: plugin.placeholder_id,
					source_parent_id: plugin.parent_id,
					source_order,
				},
			)
			.await?;
		subtree(store, plugin.id)
	}

	async fn copy_plugin_to_clipboard(
		&self,
		store: &mut CmsStore,
		step: &CopyStep<'_>,
		plugin_id: PluginId,
	) -> CmsResult<Vec<PluginNode>> {
		let source_plugin = store.tree().get(plugin_id)?;
		if source_plugin.language != step.form.source_language
			|| source_plugin.placeholder_id != step.source.id
		{
			return Err(CmsError::NotFound(format!(
				"plugin {} in placeholder {} and language {}",
				plugin_id, step.source.id, step.form.source_language
			)));
		}
		let old_plugins = subtree(store, plugin_id)?;
		if !self.policy.has_copy_plugins_permission(step.user, &old_plugins) {
			return Err(CmsError::PermissionDenied(
				"You do not have permission to copy these plugins.".to_string(),
			));
		}

		let token = self
			.notifier
			.before(
				OperationKind::CopyToClipboard,
				step.context,
				step.clipboard_payload(old_plugins.clone()),
			)
			.await?;

		clipboard::empty(store, step.target.id)?;
		let pairs = copy_plugins_to(
			store,
			&self.pool,
			&old_plugins,
			step.target.id,
			&step.form.target_language,
			None,
		)?;
		let new_plugins: Vec<PluginNode> = pairs.into_iter().map(|(new, _)| new).collect();

		self.notifier
			.after(
				OperationKind::CopyToClipboard,
				&token,
				step.context,
				step.clipboard_payload(new_plugins.clone()),
			)
			.await?;
		Ok(new_plugins)
	}

	async fn copy_placeholder_to_clipboard(
		&self,
		store: &mut CmsStore,
		step: &CopyStep<'_>,
	) -> CmsResult<Vec<PluginNode>> {
		let old_plugins: Vec<PluginNode> = store
			.tree()
			.plugins(step.source.id, Some(&step.form.source_language))
			.into_iter()
			.cloned()
			.collect();
		if !self.policy.has_copy_plugins_permission(step.user, &old_plugins) {
			return Err(CmsError::PermissionDenied(
				"You do not have permission to copy this placeholder.".to_string(),
			));
		}

		let token = self
			.notifier
			.before(
				OperationKind::CopyToClipboard,
				step.context,
				step.clipboard_payload(old_plugins.clone()),
			)
			.await?;

		clipboard::empty(store, step.target.id)?;
		let (reference, wrapped) = PlaceholderPlugin::create(
			store,
			step.target.id,
			&step.form.target_language,
			&self.placeholder_label(step.source),
			&self.settings.clipboard_slot,
		)?;
		copy_plugins_to(
			store,
			&self.pool,
			&old_plugins,
			wrapped,
			&step.form.target_language,
			None,
		)?;
		let reference = store.tree().get(reference.id)?.clone();

		self.notifier
			.after(
				OperationKind::CopyToClipboard,
				&token,
				step.context,
				step.clipboard_payload(vec![reference.clone()]),
			)
			.await?;
		Ok(vec![reference])
	}

	async fn add_plugins_from_placeholder(
		&self,
		store: &mut CmsStore,
		step: &CopyStep<'_>,
	) -> CmsResult<Vec<PluginNode>> {
		let old_plugins: Vec<PluginNode> = store
			.tree()
			.plugins(step.source.id, Some(&step.form.source_language))
			.into_iter()
			.cloned()
			.collect();
		if !self.policy.has_copy_from_placeholder_permission(
			step.user,
			step.source,
			step.target,
			&old_plugins,
		) {
			return Err(CmsError::PermissionDenied(
				"You do not have permission to copy these plugins.".to_string(),
			));
		}

		let language = &step.form.target_language;
		let root_group = SiblingGroup::new(step.target.id, None, language.clone());
		let target_order = store.tree().tree_order(&root_group);
		let token = self
			.notifier
			.before(
				OperationKind::AddPluginsFromPlaceholder,
				step.context,
				OperationPayload::AddPluginsFromPlaceholder {
					plugins: old_plugins.clone(),
					source_language: step.form.source_language.clone(),
					source_placeholder: step.source.id,
					target_language: language.clone(),
					target_placeholder: step.target.id,
					target_order: target_order.clone(),
				},
			)
			.await?;

		let pairs = copy_plugins_to(store, &self.pool, &old_plugins, step.target.id, language, None)?;
		let mut order = target_order;
		order.extend(top_level_ids(&pairs, None));
		let order = reorder_plugins(store.tree_mut(), step.target.id, None, language, &order)?;
		let new_plugins = reload(store, pairs.iter().map(|(new, _)| new.id))?;
		store
			.placeholder_mut(step.target.id)?
			.mark_as_dirty(language, false);

		self.notifier
			.after(
				OperationKind::AddPluginsFromPlaceholder,
				&token,
				step.context,
				OperationPayload::AddPluginsFromPlaceholder {
					plugins: new_plugins.clone(),
					source_language: step.form.source_language.clone(),
					source_placeholder: step.source.id,
					target_language: language.clone(),
					target_placeholder: step.target.id,
					target_order: order,
				},
			)
			.await?;
		Ok(new_plugins)
	}

	fn context(&self, request: &AdminRequest) -> Option<OperationContext> {
		OperationContext::from_request(request.cms_path(), &self.settings)
	}

	fn require_change(&self, user: &CmsUser, plugin: &PluginNode) -> CmsResult<()> {
		if self.policy.has_change_plugin_permission(user, plugin) {
			Ok(())
		} else {
			Err(CmsError::PermissionDenied(
				"You do not have permission to edit this plugin".to_string(),
			))
		}
	}

	fn placeholder_label(&self, placeholder: &Placeholder) -> String {
		self.settings
			.placeholder_conf(&placeholder.slot)
			.and_then(|conf| conf.name.clone())
			.unwrap_or_else(|| placeholder.label())
	}
}

struct MoveStep<'a> {
	user: &'a CmsUser,
	context: Option<&'a OperationContext>,
	form: &'a MovePluginForm,
	target: &'a Placeholder,
}

struct CopyStep<'a> {
	user: &'a CmsUser,
	context: Option<&'a OperationContext>,
	form: &'a CopyPluginsForm,
	source: &'a Placeholder,
	target: &'a Placeholder,
}

impl CopyStep<'_> {
	fn clipboard_payload(&self, plugins: Vec<PluginNode>) -> OperationPayload {
		OperationPayload::CopyToClipboard {
			plugins,
			source_language: self.form.source_language.clone(),
			source_placeholder: self.source.id,
			clipboard: self.target.id,
			clipboard_language: self.form.target_language.clone(),
		}
	}
}

fn authorize(request: &AdminRequest) -> CmsResult<()> {
	if request.user.is_admin_user() {
		Ok(())
	} else {
		Err(CmsError::PermissionDenied(
			"an active staff account is required".to_string(),
		))
	}
}

fn require_post(request: &AdminRequest) -> CmsResult<()> {
	if request.method == Method::POST {
		Ok(())
	} else {
		Err(CmsError::MethodNotAllowed(format!(
			"{} is not allowed, use POST",
			request.method
		)))
	}
}

fn require_get_or_post(request: &AdminRequest) -> CmsResult<()> {
	if request.method == Method::GET || request.method == Method::POST {
		Ok(())
	} else {
		Err(CmsError::MethodNotAllowed(format!(
			"{} is not allowed, use GET or POST",
			request.method
		)))
	}
}

/// Every order entry must be the moved plugin or a member of the target group
fn check_order(store: &CmsStore, form: &MovePluginForm) -> CmsResult<()> {
	let foreign = form
		.order_ids()
		.into_iter()
		.filter(|id| *id != form.plugin_id)
		.any(|id| {
			store.tree().find(id).is_none_or(|node| {
				node.placeholder_id != form.placeholder_id
					|| node.parent_id != form.plugin_parent
					|| node.language != form.target_language
			})
		});
	if foreign {
		return Err(CmsError::Validation(
			"order parameter references plugins in different trees".to_string(),
		));
	}
	Ok(())
}

/// Requested order with pasted copies at the sentinel
///
/// Without a sentinel the copies keep their appended place after the listed
/// siblings.
fn paste_order(form: &MovePluginForm, pasted: &[PluginId]) -> Vec<PluginId> {
	match form.sentinel_index() {
		Some(_) => form.order_with(pasted),
		None => form.order_ids(),
	}
}

fn subtree(store: &CmsStore, plugin_id: PluginId) -> CmsResult<Vec<PluginNode>> {
	Ok(store
		.tree()
		.get_tree(plugin_id)?
		.into_iter()
		.cloned()
		.collect())
}

fn reload(store: &CmsStore, ids: impl IntoIterator<Item = PluginId>) -> CmsResult<Vec<PluginNode>> {
	let mut nodes = ids
		.into_iter()
		.map(|id| store.tree().get(id).cloned())
		.collect::<CmsResult<Vec<_>>>()?;
	nodes.sort_by(|a, b| a.path.cmp(&b.path));
	Ok(nodes)
}
