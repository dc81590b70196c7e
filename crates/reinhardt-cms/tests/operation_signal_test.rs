//! Operation signals around placeholder admin actions

mod common;

use common::{editor, ids, post, record, site};
use http::StatusCode;
use reinhardt_cms::admin::AdminRequest;
use reinhardt_cms::forms::FormData;
use reinhardt_cms::prelude::*;
use reinhardt_signals::SignalError;
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;

#[rstest]
#[tokio::test]
async fn test_tokens_pair_before_and_after() {
	// Arrange
	let site = site().await;
	let a = site.add(site.content, "en", "TextPlugin", None).await;
	let b = site.add(site.content, "en", "TextPlugin", None).await;
	let recorded = record(site.admin.notifier());
	let reorder = |order: &[PluginId]| {
		post(
			"move-plugin/",
			editor(),
			&[
				("plugin_id", a.to_string()),
				("placeholder_id", site.content.to_string()),
				("target_language", "en".to_string()),
				("plugin_order[]", ids(order)),
			],
		)
	};

	// Act
	site.admin.handle(reorder(&[b, a])).await;
	site.admin.handle(reorder(&[a, b])).await;

	// Assert
	let recorded = recorded.lock();
	let phases: Vec<&str> = recorded.iter().map(|(phase, _)| *phase).collect();
	assert_eq!(phases, vec!["pre", "post", "pre", "post"]);
	assert_eq!(recorded[0].1.token, recorded[1].1.token);
	assert_eq!(recorded[2].1.token, recorded[3].1.token);
	assert_ne!(recorded[0].1.token, recorded[2].1.token);
	assert_eq!(recorded[3].1.affected_plugins(), vec![a]);
}

#[rstest]
#[tokio::test]
async fn test_vetoed_operation_is_rolled_back() {
	// Arrange
	let site = site().await;
	let a = site.add(site.content, "en", "TextPlugin", None).await;
	let b = site.add(site.content, "en", "TextPlugin", None).await;
	let recorded = record(site.admin.notifier());
	site.admin.notifier().pre_operation().connect_if(
		|_| async { Err::<(), _>(SignalError::new("content is locked")) },
		|operation: &PlaceholderOperation| operation.kind == OperationKind::DeletePlugin,
	);

	// Act
	let response = site
		.admin
		.handle(post(&format!("delete-plugin/{}/", a), editor(), &[]))
		.await;

	// Assert
	assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
	assert!(response.body["error"].as_str().unwrap().contains("content is locked"));
	assert!(site.exists(a).await);
	assert_eq!(site.order(site.content, None, "en").await, vec![a, b]);
	let phases: Vec<&str> = recorded.lock().iter().map(|(phase, _)| *phase).collect();
	assert_eq!(phases, vec!["pre"]);
}

#[rstest]
#[tokio::test]
async fn test_failing_post_receiver_rolls_back() {
	// Arrange
	let site = site().await;
	let a = site.add(site.content, "en", "TextPlugin", None).await;
	site.admin
		.notifier()
		.post_operation()
		.connect(|_| async { Err::<(), _>(SignalError::new("index unavailable")) });

	// Act
	let response = site
		.admin
		.handle(post(
			&format!("clear-placeholder/{}/", site.content),
			editor(),
			&[],
		))
		.await;

	// Assert
	assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
	assert!(site.exists(a).await);
}

#[rstest]
#[tokio::test]
async fn test_receiver_can_read_database_during_operation() {
	// Arrange
	let site = site().await;
	let a = site.add(site.content, "en", "TextPlugin", None).await;
	let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
	let database = site.database().clone();
	let observed = Arc::clone(&seen);
	site.admin.notifier().post_operation().connect(move |_| {
		let database = database.clone();
		let observed = Arc::clone(&observed);
		async move {
			let committed = database.read(|store| store.tree().find(a).is_some()).await;
			observed.lock().push(committed);
			Ok(())
		}
	});

	// Act
	let response = tokio::time::timeout(
		Duration::from_secs(5),
		site.admin
			.handle(post(&format!("delete-plugin/{}/", a), editor(), &[])),
	)
	.await
	.expect("delete-plugin did not complete");

	// Assert
	assert_eq!(response.status, StatusCode::FOUND);
	assert_eq!(*seen.lock(), vec![true]);
	assert!(!site.exists(a).await);
}

#[rstest]
#[tokio::test]
async fn test_missing_cms_path_skips_signals() {
	// Arrange
	let site = site().await;
	let a = site.add(site.content, "en", "TextPlugin", None).await;
	let b = site.add(site.content, "en", "TextPlugin", None).await;
	let recorded = record(site.admin.notifier());
	let body: FormData = [
		("plugin_id", a.to_string()),
		("placeholder_id", site.content.to_string()),
		("target_language", "en".to_string()),
		("plugin_order[]", ids(&[b, a])),
	]
	.into_iter()
	.map(|(key, value)| (key.to_string(), value))
	.collect();
	let request = AdminRequest::post("/admin/cms/move-plugin/", editor()).form(body);

	// Act
	let response = site.admin.handle(request).await;

	// Assert
	assert_eq!(response.status, StatusCode::OK);
	assert_eq!(site.order(site.content, None, "en").await, vec![b, a]);
	assert!(recorded.lock().is_empty());
}

#[rstest]
#[case("/de/kontakt/", "de")]
#[case("/kontakt/?language=fr", "fr")]
#[case("/kontakt/", "en")]
#[tokio::test]
async fn test_operation_language_follows_cms_path(#[case] cms_path: &str, #[case] expected: &str) {
	// Arrange
	let site = site().await;
	let recorded = record(site.admin.notifier());
	let encoded = FormData::new().with("cms_path", cms_path).encode();
	let uri = format!(
		"/admin/cms/add-plugin/?placeholder_id={}&plugin_type=TextPlugin&plugin_language=en&{}",
		site.content, encoded
	);

	// Act
	let response = site.admin.handle(AdminRequest::post(&uri, editor())).await;

	// Assert
	assert_eq!(response.status, StatusCode::OK);
	let recorded = recorded.lock();
	assert_eq!(recorded[0].1.language, expected);
	assert_eq!(recorded[0].1.origin, cms_path.split('?').next().unwrap());
}
