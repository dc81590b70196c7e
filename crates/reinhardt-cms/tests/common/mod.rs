//! Shared fixtures for placeholder admin tests

#![allow(dead_code)]

use parking_lot::Mutex;
use reinhardt_cms::forms::FormData;
use reinhardt_cms::permissions::{ADD_PLUGIN, CHANGE_PLUGIN, DELETE_PLUGIN};
use reinhardt_cms::prelude::*;
use reinhardt_cms::settings::GLOBAL_LIMIT;
use reinhardt_cms::tree::SiblingGroup;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub const CMS_PATH: &str = "/en/home/";

/// Admin over a store with a `content` and a limited `sidebar` placeholder
pub struct Site {
	pub admin: PlaceholderAdmin,
	pub content: PlaceholderId,
	pub sidebar: PlaceholderId,
}

impl Site {
	pub fn database(&self) -> &Database {
		self.admin.database()
	}

	/// Insert a plugin directly, bypassing the admin
	pub async fn add(
		&self,
		placeholder: PlaceholderId,
		language: &str,
		plugin_type: &str,
		parent: Option<PluginId>,
	) -> PluginId {
		let mut new = NewPlugin::new(placeholder, language, plugin_type);
		new.parent_id = parent;
		let mut tx = self.database().begin().await;
		let id = tx.tree_mut().insert(new).unwrap().id;
		tx.commit();
		id
	}

	pub async fn plugin(&self, id: PluginId) -> PluginNode {
		self.database()
			.read(|store| store.tree().get(id).cloned())
			.await
			.unwrap()
	}

	pub async fn exists(&self, id: PluginId) -> bool {
		self.database()
			.read(|store| store.tree().find(id).is_some())
			.await
	}

	pub async fn order(
		&self,
		placeholder: PlaceholderId,
		parent: Option<PluginId>,
		language: &str,
	) -> Vec<PluginId> {
		let group = SiblingGroup::new(placeholder, parent, language);
		self.database()
			.read(|store| store.tree().tree_order(&group))
			.await
	}

	pub async fn plugins(&self, placeholder: PlaceholderId, language: Option<&str>) -> Vec<PluginNode> {
		self.database()
			.read(|store| {
				store
					.tree()
					.plugins(placeholder, language)
					.into_iter()
					.cloned()
					.collect()
			})
			.await
	}

	pub async fn assert_integrity(&self) {
		self.database()
			.read(|store| store.tree().check_integrity())
			.await
			.unwrap();
	}
}

pub fn settings() -> CmsSettings {
	let mut placeholder_conf = HashMap::new();
	placeholder_conf.insert(
		"sidebar".to_string(),
		PlaceholderConf {
			name: Some("Sidebar".to_string()),
			limits: BTreeMap::from([
				(GLOBAL_LIMIT.to_string(), 3),
				("TextPlugin".to_string(), 1),
			]),
			..Default::default()
		},
	);
	CmsSettings {
		languages: vec!["en".to_string(), "de".to_string(), "fr".to_string()],
		placeholder_conf,
		..Default::default()
	}
}

pub async fn site() -> Site {
	let admin = PlaceholderAdmin::builder()
		.settings(settings())
		.plugin(GenericPlugin::new("TextPlugin").name("Text"))
		.plugin(GenericPlugin::new("LinkPlugin").name("Link").required_fields(["url"]))
		.plugin(
			GenericPlugin::new("ColumnsPlugin")
				.name("Columns")
				.allow_children(true)
				.child_classes(["ColumnPlugin"]),
		)
		.plugin(
			GenericPlugin::new("ColumnPlugin")
				.name("Column")
				.allow_children(true)
				.parent_classes(["ColumnsPlugin"])
				.require_parent(true),
		)
		.build()
		.unwrap();

	let mut tx = admin.database().begin().await;
	let content = tx.create_placeholder("content", None);
	let sidebar = tx.create_placeholder("sidebar", None);
	tx.commit();

	Site {
		admin,
		content,
		sidebar,
	}
}

/// Active staff user holding every plugin permission
pub fn editor() -> CmsUser {
	CmsUser::new(2, "editor")
		.staff()
		.with_permissions([ADD_PLUGIN, CHANGE_PLUGIN, DELETE_PLUGIN])
}

pub fn staff_with(permissions: &[&str]) -> CmsUser {
	CmsUser::new(3, "limited")
		.staff()
		.with_permissions(permissions.iter().copied())
}

pub fn post(path: &str, user: CmsUser, body: &[(&str, String)]) -> AdminRequest {
	let body: FormData = body
		.iter()
		.map(|(key, value)| (key.to_string(), value.clone()))
		.collect();
	AdminRequest::post(&uri(path), user).form(body)
}

pub fn get(path: &str, user: CmsUser) -> AdminRequest {
	AdminRequest::get(&uri(path), user)
}

/// Admin uri for `path`, which may carry its own query
pub fn uri(path: &str) -> String {
	let separator = if path.contains('?') { '&' } else { '?' };
	format!("/admin/cms/{}{}cms_path={}", path, separator, CMS_PATH)
}

/// Signal observations as `(phase, operation)` pairs
pub type Recorded = Arc<Mutex<Vec<(&'static str, PlaceholderOperation)>>>;

pub fn record(notifier: &OperationNotifier) -> Recorded {
	let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
	for (phase, signal) in [
		("pre", notifier.pre_operation()),
		("post", notifier.post_operation()),
	] {
		let recorded = Arc::clone(&recorded);
		signal.connect(move |operation| {
			let recorded = Arc::clone(&recorded);
			async move {
				recorded.lock().push((phase, (*operation).clone()));
				Ok(())
			}
		});
	}
	recorded
}

pub fn ids(plugins: &[PluginId]) -> String {
	plugins
		.iter()
		.map(|id| id.to_string())
		.collect::<Vec<_>>()
		.join(",")
}
