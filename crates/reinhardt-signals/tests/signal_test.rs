//! Tests for signal dispatch

use parking_lot::Mutex;
use reinhardt_signals::{Signal, SignalError, SignalName};
use rstest::rstest;
use std::sync::Arc;

fn recorder(signal: &Signal<u32>, tag: &'static str, seen: &Arc<Mutex<Vec<String>>>) {
	let seen = Arc::clone(seen);
	signal.connect(move |value| {
		let seen = Arc::clone(&seen);
		async move {
			seen.lock().push(format!("{}{}", tag, value));
			Ok(())
		}
	});
}

#[rstest]
#[tokio::test]
async fn test_send_reaches_receivers_in_connection_order() {
	// Arrange
	let signal = Signal::<u32>::new(SignalName::custom("counter"));
	let seen = Arc::new(Mutex::new(Vec::new()));
	recorder(&signal, "a", &seen);
	recorder(&signal, "b", &seen);

	// Act
	signal.send(7).await.unwrap();

	// Assert
	assert_eq!(*seen.lock(), vec!["a7".to_string(), "b7".to_string()]);
}

#[rstest]
#[tokio::test]
async fn test_first_error_stops_dispatch() {
	// Arrange
	let signal = Signal::<u32>::new(SignalName::custom("veto"));
	let seen = Arc::new(Mutex::new(Vec::new()));
	signal.connect(|_| async { Err::<(), _>(SignalError::new("vetoed")) });
	recorder(&signal, "late", &seen);

	// Act
	let result = signal.send(1).await;

	// Assert
	assert_eq!(result.unwrap_err().message(), "vetoed");
	assert!(seen.lock().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_disconnect_removes_only_that_receiver() {
	// Arrange
	let signal = Signal::<u32>::new(SignalName::custom("audit"));
	let seen = Arc::new(Mutex::new(Vec::new()));
	let failing = signal.connect(|_| async { Err::<(), _>(SignalError::new("offline")) });
	recorder(&signal, "kept", &seen);

	// Act
	let removed = signal.disconnect(failing);
	let removed_again = signal.disconnect(failing);
	signal.send(3).await.unwrap();

	// Assert
	assert!(removed);
	assert!(!removed_again);
	assert_eq!(signal.receiver_count(), 1);
	assert_eq!(*seen.lock(), vec!["kept3".to_string()]);
}

#[rstest]
#[tokio::test]
async fn test_connect_if_skips_unmatched_instances() {
	// Arrange
	let signal = Signal::<u32>::new(SignalName::custom("filtered"));
	let seen = Arc::new(Mutex::new(Vec::new()));
	let seen_clone = Arc::clone(&seen);
	signal.connect_if(
		move |value| {
			let seen = Arc::clone(&seen_clone);
			async move {
				seen.lock().push(*value);
				Ok(())
			}
		},
		|value| value % 2 == 0,
	);

	// Act
	for value in 1..=4 {
		signal.send(value).await.unwrap();
	}

	// Assert
	assert_eq!(*seen.lock(), vec![2, 4]);
}

#[rstest]
fn test_clone_shares_receivers() {
	// Arrange
	let signal = Signal::<()>::new(SignalName::POST_PLACEHOLDER_OPERATION);
	let handle = signal.clone();

	// Act
	let id = handle.connect(|_| async { Ok(()) });

	// Assert
	assert_eq!(signal.receiver_count(), 1);
	assert!(signal.disconnect(id));
	assert_eq!(handle.receiver_count(), 0);
	assert_eq!(handle.name().as_str(), "post_placeholder_operation");
}
