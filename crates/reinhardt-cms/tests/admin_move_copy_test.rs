//! Move, cut, paste and copy through the placeholder admin

mod common;

use common::{editor, ids, post, record, site, staff_with};
use http::StatusCode;
use reinhardt_cms::admin::AdminResponse;
use reinhardt_cms::forms::COPY_SENTINEL;
use reinhardt_cms::permissions::CHANGE_PLUGIN;
use reinhardt_cms::plugin_pool::PlaceholderPlugin;
use reinhardt_cms::prelude::*;
use rstest::rstest;

fn plugin_ids(response: &AdminResponse) -> Vec<PluginId> {
	response.body["plugins"]
		.as_array()
		.unwrap()
		.iter()
		.map(|plugin| PluginId(plugin["id"].as_u64().unwrap()))
		.collect()
}

// =============================================================================
// Move
// =============================================================================

#[rstest]
#[tokio::test]
async fn test_move_reorders_within_group() {
	// Arrange
	let site = site().await;
	let a = site.add(site.content, "en", "TextPlugin", None).await;
	let b = site.add(site.content, "en", "TextPlugin", None).await;
	let c = site.add(site.content, "en", "TextPlugin", None).await;
	let recorded = record(site.admin.notifier());

	// Act
	let response = site
		.admin
		.handle(post(
			"move-plugin/",
			editor(),
			&[
				("plugin_id", c.to_string()),
				("placeholder_id", site.content.to_string()),
				("target_language", "en".to_string()),
				("plugin_order[]", ids(&[c, a, b])),
			],
		))
		.await;

	// Assert
	assert_eq!(response.status, StatusCode::OK);
	assert_eq!(site.order(site.content, None, "en").await, vec![c, a, b]);
	let positions: Vec<usize> = positions_of(&site, &[c, a, b]).await;
	assert_eq!(positions, vec![0, 1, 2]);
	site.assert_integrity().await;

	let recorded = recorded.lock();
	assert_eq!(recorded.len(), 2);
	match (&recorded[0].1.payload, &recorded[1].1.payload) {
		(
			OperationPayload::MovePlugin { source_order, .. },
			OperationPayload::MovePlugin { target_order, .. },
		) => {
			assert_eq!(source_order, &vec![a, b, c]);
			assert_eq!(target_order, &vec![c, a, b]);
		}
		other => panic!("unexpected payloads {:?}", other),
	}
}

async fn positions_of(site: &common::Site, plugins: &[PluginId]) -> Vec<usize> {
	let mut positions = Vec::new();
	for plugin in plugins {
		positions.push(site.plugin(*plugin).await.position);
	}
	positions
}

#[rstest]
#[tokio::test]
async fn test_move_cascades_placeholder_and_language() {
	// Arrange
	let site = site().await;
	let text = site.add(site.content, "en", "TextPlugin", None).await;
	let columns = site.add(site.content, "en", "ColumnsPlugin", None).await;
	let column = site.add(site.content, "en", "ColumnPlugin", Some(columns)).await;
	let nested = site.add(site.content, "en", "TextPlugin", Some(column)).await;

	// Act
	let response = site
		.admin
		.handle(post(
			"move-plugin/",
			editor(),
			&[
				("plugin_id", columns.to_string()),
				("placeholder_id", site.sidebar.to_string()),
				("target_language", "de".to_string()),
			],
		))
		.await;

	// Assert
	assert_eq!(response.status, StatusCode::OK);
	assert_eq!(plugin_ids(&response), vec![columns, column, nested]);
	for id in [columns, column, nested] {
		let plugin = site.plugin(id).await;
		assert_eq!(plugin.placeholder_id, site.sidebar);
		assert_eq!(plugin.language, "de");
	}
	assert_eq!(site.plugin(nested).await.depth, 3);
	assert_eq!(site.order(site.content, None, "en").await, vec![text]);
	assert_eq!(site.order(site.sidebar, None, "de").await, vec![columns]);
	site.assert_integrity().await;

	let (content_dirty, sidebar_dirty) = site
		.database()
		.read(|store| {
			(
				store.placeholder(site.content).unwrap().is_dirty("en"),
				store.placeholder(site.sidebar).unwrap().is_dirty("de"),
			)
		})
		.await;
	assert!(content_dirty);
	assert!(sidebar_dirty);
}

#[rstest]
#[tokio::test]
async fn test_move_under_new_parent() {
	// Arrange
	let site = site().await;
	let columns = site.add(site.content, "en", "ColumnsPlugin", None).await;
	let first = site.add(site.content, "en", "ColumnPlugin", Some(columns)).await;
	let loose = site.add(site.content, "en", "ColumnPlugin", None).await;

	// Act
	let response = site
		.admin
		.handle(post(
			"move-plugin/",
			editor(),
			&[
				("plugin_id", loose.to_string()),
				("placeholder_id", site.content.to_string()),
				("target_language", "en".to_string()),
				("plugin_parent", columns.to_string()),
				("plugin_order[]", ids(&[loose, first])),
			],
		))
		.await;

	// Assert
	assert_eq!(response.status, StatusCode::OK);
	assert_eq!(site.order(site.content, Some(columns), "en").await, vec![loose, first]);
	assert_eq!(site.order(site.content, None, "en").await, vec![columns]);
	assert_eq!(site.plugin(columns).await.numchild, 2);
	site.assert_integrity().await;
}

#[rstest]
#[tokio::test]
async fn test_move_to_root_lands_last() {
	// Arrange
	let site = site().await;
	let columns = site.add(site.content, "en", "ColumnsPlugin", None).await;
	let column = site.add(site.content, "en", "ColumnPlugin", Some(columns)).await;
	let text = site.add(site.content, "en", "TextPlugin", None).await;

	// Act
	let response = site
		.admin
		.handle(post(
			"move-plugin/",
			editor(),
			&[
				("plugin_id", column.to_string()),
				("placeholder_id", site.content.to_string()),
				("target_language", "en".to_string()),
			],
		))
		.await;

	// Assert
	assert_eq!(response.status, StatusCode::OK);
	assert_eq!(site.order(site.content, None, "en").await, vec![columns, text, column]);
	assert_eq!(site.plugin(columns).await.numchild, 0);
	site.assert_integrity().await;
}

#[rstest]
#[tokio::test]
async fn test_move_below_own_descendant_conflicts() {
	// Arrange
	let site = site().await;
	let columns = site.add(site.content, "en", "ColumnsPlugin", None).await;
	let column = site.add(site.content, "en", "ColumnPlugin", Some(columns)).await;

	// Act
	let response = site
		.admin
		.handle(post(
			"move-plugin/",
			editor(),
			&[
				("plugin_id", columns.to_string()),
				("placeholder_id", site.content.to_string()),
				("target_language", "en".to_string()),
				("plugin_parent", column.to_string()),
			],
		))
		.await;

	// Assert
	assert_eq!(response.status, StatusCode::CONFLICT);
	assert_eq!(site.plugin(column).await.parent_id, Some(columns));
}

#[rstest]
#[tokio::test]
async fn test_move_order_from_other_tree_is_rejected() {
	// Arrange
	let site = site().await;
	let a = site.add(site.content, "en", "TextPlugin", None).await;
	let b = site.add(site.content, "en", "TextPlugin", None).await;
	let elsewhere = site.add(site.sidebar, "en", "TextPlugin", None).await;
	let recorded = record(site.admin.notifier());

	// Act
	let response = site
		.admin
		.handle(post(
			"move-plugin/",
			editor(),
			&[
				("plugin_id", b.to_string()),
				("placeholder_id", site.content.to_string()),
				("target_language", "en".to_string()),
				("plugin_order[]", ids(&[b, elsewhere, a])),
			],
		))
		.await;

	// Assert
	assert_eq!(response.status, StatusCode::BAD_REQUEST);
	assert!(
		response.body["error"]
			.as_str()
			.unwrap()
			.contains("order parameter references plugins in different trees")
	);
	assert_eq!(site.order(site.content, None, "en").await, vec![a, b]);
	assert!(recorded.lock().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_move_into_full_placeholder_is_rejected() {
	// Arrange
	let site = site().await;
	site.add(site.sidebar, "en", "TextPlugin", None).await;
	let text = site.add(site.content, "en", "TextPlugin", None).await;

	// Act
	let response = site
		.admin
		.handle(post(
			"move-plugin/",
			editor(),
			&[
				("plugin_id", text.to_string()),
				("placeholder_id", site.sidebar.to_string()),
				("target_language", "en".to_string()),
			],
		))
		.await;

	// Assert
	assert_eq!(response.status, StatusCode::BAD_REQUEST);
	assert_eq!(site.plugin(text).await.placeholder_id, site.content);
}

#[rstest]
#[tokio::test]
async fn test_move_requires_add_on_target() {
	// Arrange
	let site = site().await;
	let text = site.add(site.content, "en", "TextPlugin", None).await;

	// Act
	let response = site
		.admin
		.handle(post(
			"move-plugin/",
			staff_with(&[CHANGE_PLUGIN]),
			&[
				("plugin_id", text.to_string()),
				("placeholder_id", site.sidebar.to_string()),
				("target_language", "en".to_string()),
			],
		))
		.await;

	// Assert
	assert_eq!(response.status, StatusCode::FORBIDDEN);
	assert_eq!(site.plugin(text).await.placeholder_id, site.content);
}

// =============================================================================
// Cut and paste
// =============================================================================

#[rstest]
#[tokio::test]
async fn test_cut_replaces_clipboard_content() {
	// Arrange
	let site = site().await;
	let user = editor();
	let clipboard = site.admin.clipboard(&user).await;
	let stale = site.add(clipboard, "en", "TextPlugin", None).await;
	let a = site.add(site.content, "en", "TextPlugin", None).await;
	let b = site.add(site.content, "en", "TextPlugin", None).await;
	let recorded = record(site.admin.notifier());

	// Act
	let response = site
		.admin
		.handle(post(
			"move-plugin/",
			user,
			&[
				("plugin_id", a.to_string()),
				("placeholder_id", clipboard.to_string()),
				("target_language", "en".to_string()),
			],
		))
		.await;

	// Assert
	assert_eq!(response.status, StatusCode::OK);
	assert!(!site.exists(stale).await);
	assert_eq!(site.order(clipboard, None, "en").await, vec![a]);
	assert_eq!(site.order(site.content, None, "en").await, vec![b]);
	assert_eq!(site.plugin(b).await.position, 0);
	site.assert_integrity().await;

	let recorded = recorded.lock();
	assert_eq!(recorded[0].1.kind, OperationKind::CutPlugin);
	match &recorded[1].1.payload {
		OperationPayload::CutPlugin {
			clipboard: target,
			source_order,
			..
		} => {
			assert_eq!(*target, clipboard);
			assert_eq!(source_order, &vec![b]);
		}
		other => panic!("unexpected payload {:?}", other),
	}
}

#[rstest]
#[tokio::test]
async fn test_paste_inserts_copy_at_sentinel() {
	// Arrange
	let site = site().await;
	let user = editor();
	let clipboard = site.admin.clipboard(&user).await;
	let staged = site.add(clipboard, "en", "ColumnsPlugin", None).await;
	let staged_child = site.add(clipboard, "en", "ColumnPlugin", Some(staged)).await;
	let a = site.add(site.content, "de", "TextPlugin", None).await;
	let b = site.add(site.content, "de", "TextPlugin", None).await;
	let recorded = record(site.admin.notifier());

	// Act
	let response = site
		.admin
		.handle(post(
			"move-plugin/",
			user,
			&[
				("plugin_id", staged.to_string()),
				("placeholder_id", site.content.to_string()),
				("target_language", "de".to_string()),
				("move_a_copy", "true".to_string()),
				("plugin_order[]", format!("{},{},{}", a, COPY_SENTINEL, b)),
			],
		))
		.await;

	// Assert
	assert_eq!(response.status, StatusCode::OK);
	let pasted = plugin_ids(&response);
	assert_eq!(pasted.len(), 2);
	assert_eq!(site.order(site.content, None, "de").await, vec![a, pasted[0], b]);
	let child = site.plugin(pasted[1]).await;
	assert_eq!(child.parent_id, Some(pasted[0]));
	assert_eq!(child.language, "de");
	assert!(site.exists(staged).await);
	assert!(site.exists(staged_child).await);
	site.assert_integrity().await;

	let recorded = recorded.lock();
	assert_eq!(recorded[0].1.kind, OperationKind::PastePlugin);
	match &recorded[1].1.payload {
		OperationPayload::PastePlugin { plugin, target_order, .. } => {
			assert_eq!(plugin.id, pasted[0]);
			assert_eq!(target_order, &vec![a, pasted[0], b]);
		}
		other => panic!("unexpected payload {:?}", other),
	}
}

#[rstest]
#[tokio::test]
async fn test_paste_without_sentinel_appends() {
	// Arrange
	let site = site().await;
	let user = editor();
	let clipboard = site.admin.clipboard(&user).await;
	let staged = site.add(clipboard, "en", "TextPlugin", None).await;
	let a = site.add(site.content, "en", "TextPlugin", None).await;

	// Act
	let response = site
		.admin
		.handle(post(
			"move-plugin/",
			user,
			&[
				("plugin_id", staged.to_string()),
				("placeholder_id", site.content.to_string()),
				("target_language", "en".to_string()),
				("move_a_copy", "1".to_string()),
			],
		))
		.await;

	// Assert
	assert_eq!(response.status, StatusCode::OK);
	let pasted = plugin_ids(&response);
	assert_eq!(site.order(site.content, None, "en").await, vec![a, pasted[0]]);
}

// =============================================================================
// Copy
// =============================================================================

#[rstest]
#[tokio::test]
async fn test_copy_plugin_to_clipboard() {
	// Arrange
	let site = site().await;
	let user = editor();
	let clipboard = site.admin.clipboard(&user).await;
	let stale = site.add(clipboard, "en", "TextPlugin", None).await;
	let columns = site.add(site.content, "en", "ColumnsPlugin", None).await;
	site.add(site.content, "en", "ColumnPlugin", Some(columns)).await;
	let recorded = record(site.admin.notifier());

	// Act
	let response = site
		.admin
		.handle(post(
			"copy-plugins/",
			user,
			&[
				("source_placeholder_id", site.content.to_string()),
				("source_language", "en".to_string()),
				("source_plugin_id", columns.to_string()),
				("target_placeholder_id", clipboard.to_string()),
				("target_language", "en".to_string()),
			],
		))
		.await;

	// Assert
	assert_eq!(response.status, StatusCode::OK);
	let copies = plugin_ids(&response);
	assert_eq!(copies.len(), 2);
	assert!(!site.exists(stale).await);
	assert_eq!(site.order(clipboard, None, "en").await, vec![copies[0]]);
	assert!(site.exists(columns).await);
	assert_eq!(recorded.lock()[0].1.kind, OperationKind::CopyToClipboard);
}

#[rstest]
#[tokio::test]
async fn test_copy_placeholder_to_clipboard_then_paste() {
	// Arrange
	let site = site().await;
	let user = editor();
	let clipboard = site.admin.clipboard(&user).await;
	let text = site.add(site.content, "en", "TextPlugin", None).await;
	let columns = site.add(site.content, "en", "ColumnsPlugin", None).await;
	site.add(site.content, "en", "ColumnPlugin", Some(columns)).await;

	// Act
	let copied = site
		.admin
		.handle(post(
			"copy-plugins/",
			user.clone(),
			&[
				("source_placeholder_id", site.content.to_string()),
				("source_language", "en".to_string()),
				("target_placeholder_id", clipboard.to_string()),
			],
		))
		.await;
	let reference = plugin_ids(&copied)[0];
	let pasted = site
		.admin
		.handle(post(
			"move-plugin/",
			user,
			&[
				("plugin_id", reference.to_string()),
				("placeholder_id", site.content.to_string()),
				("target_language", "de".to_string()),
				("move_a_copy", "true".to_string()),
				("plugin_order[]", COPY_SENTINEL.to_string()),
			],
		))
		.await;

	// Assert
	assert_eq!(copied.status, StatusCode::OK);
	let reference = site.plugin(reference).await;
	assert_eq!(reference.plugin_type, PlaceholderPlugin::TYPE);
	assert_eq!(reference.data["name"], "Content");

	assert_eq!(pasted.status, StatusCode::OK);
	let german = site.plugins(site.content, Some("de")).await;
	let shape: Vec<(&str, usize)> = german
		.iter()
		.map(|plugin| (plugin.plugin_type.as_str(), plugin.depth))
		.collect();
	assert_eq!(
		shape,
		vec![("TextPlugin", 1), ("ColumnsPlugin", 1), ("ColumnPlugin", 2)]
	);
	assert_eq!(site.order(site.content, None, "en").await, vec![text, columns]);
	site.assert_integrity().await;
}

#[rstest]
#[tokio::test]
async fn test_add_plugins_from_placeholder_appends_to_root_order() {
	// Arrange
	let site = site().await;
	let existing = site.add(site.content, "de", "TextPlugin", None).await;
	site.add(site.content, "en", "TextPlugin", None).await;
	let columns = site.add(site.content, "en", "ColumnsPlugin", None).await;
	site.add(site.content, "en", "ColumnPlugin", Some(columns)).await;
	let recorded = record(site.admin.notifier());

	// Act
	let response = site
		.admin
		.handle(post(
			"copy-plugins/",
			editor(),
			&[
				("source_placeholder_id", site.content.to_string()),
				("source_language", "en".to_string()),
				("target_placeholder_id", site.content.to_string()),
				("target_language", "de".to_string()),
			],
		))
		.await;

	// Assert
	assert_eq!(response.status, StatusCode::OK);
	let copies = plugin_ids(&response);
	assert_eq!(copies.len(), 3);
	assert_eq!(
		site.order(site.content, None, "de").await,
		vec![existing, copies[0], copies[1]]
	);
	assert_eq!(site.plugin(copies[2]).await.parent_id, Some(copies[1]));
	assert_eq!(site.plugins(site.content, Some("en")).await.len(), 3);
	site.assert_integrity().await;

	let recorded = recorded.lock();
	assert_eq!(recorded[0].1.kind, OperationKind::AddPluginsFromPlaceholder);
	match &recorded[1].1.payload {
		OperationPayload::AddPluginsFromPlaceholder { target_order, .. } => {
			assert_eq!(target_order, &vec![existing, copies[0], copies[1]]);
		}
		other => panic!("unexpected payload {:?}", other),
	}
}

#[rstest]
#[tokio::test]
async fn test_copy_to_unsupported_language_is_rejected() {
	// Arrange
	let site = site().await;
	site.add(site.content, "en", "TextPlugin", None).await;

	// Act
	let response = site
		.admin
		.handle(post(
			"copy-plugins/",
			editor(),
			&[
				("source_placeholder_id", site.content.to_string()),
				("source_language", "en".to_string()),
				("target_placeholder_id", site.sidebar.to_string()),
				("target_language", "xx".to_string()),
			],
		))
		.await;

	// Assert
	assert_eq!(response.status, StatusCode::BAD_REQUEST);
	assert!(site.plugins(site.sidebar, None).await.is_empty());
}
