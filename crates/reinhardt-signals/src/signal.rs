//! Signal dispatch

use super::core::SignalName;
use super::error::SignalError;
use parking_lot::RwLock;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

type BoxedReceiver<T> = Arc<
	dyn Fn(Arc<T>) -> Pin<Box<dyn Future<Output = Result<(), SignalError>> + Send>> + Send + Sync,
>;

type Filter<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Handle of a connected receiver, accepted by [`Signal::disconnect`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReceiverId(u64);

struct Receiver<T> {
	id: ReceiverId,
	call: BoxedReceiver<T>,
	filter: Option<Filter<T>>,
}

impl<T> Clone for Receiver<T> {
	fn clone(&self) -> Self {
		Self {
			id: self.id,
			call: Arc::clone(&self.call),
			filter: self.filter.clone(),
		}
	}
}

/// A signal that can dispatch events to connected receivers
///
/// Receivers run one after another in connection order. Cloning a signal
/// yields a handle to the same receiver list.
pub struct Signal<T: Send + Sync + 'static> {
	name: SignalName,
	receivers: Arc<RwLock<Vec<Receiver<T>>>>,
	next_id: Arc<AtomicU64>,
}

impl<T: Send + Sync + 'static> Signal<T> {
	/// Create a signal without receivers
	///
	/// ```
	/// use reinhardt_signals::{Signal, SignalName};
	///
	/// let signal = Signal::<u64>::new(SignalName::PRE_PLACEHOLDER_OPERATION);
	/// assert_eq!(signal.receiver_count(), 0);
	/// ```
	pub fn new(name: SignalName) -> Self {
		Self {
			name,
			receivers: Arc::new(RwLock::new(Vec::new())),
			next_id: Arc::new(AtomicU64::new(0)),
		}
	}

	/// The name this signal was created with
	pub fn name(&self) -> SignalName {
		self.name
	}

	/// Connect a receiver
	pub fn connect<F, Fut>(&self, receiver: F) -> ReceiverId
	where
		F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<(), SignalError>> + Send + 'static,
	{
		self.attach(receiver, None)
	}

	/// Connect a receiver that only runs when `filter` holds for the instance
	pub fn connect_if<F, Fut, P>(&self, receiver: F, filter: P) -> ReceiverId
	where
		F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<(), SignalError>> + Send + 'static,
		P: Fn(&T) -> bool + Send + Sync + 'static,
	{
		let filter: Filter<T> = Arc::new(filter);
		self.attach(receiver, Some(filter))
	}

	fn attach<F, Fut>(&self, receiver: F, filter: Option<Filter<T>>) -> ReceiverId
	where
		F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<(), SignalError>> + Send + 'static,
	{
		let id = ReceiverId(self.next_id.fetch_add(1, Ordering::Relaxed));
		let call: BoxedReceiver<T> = Arc::new(move |instance| Box::pin(receiver(instance)));
		self.receivers.write().push(Receiver { id, call, filter });
		id
	}

	/// Disconnect a receiver, returning whether it was connected
	pub fn disconnect(&self, id: ReceiverId) -> bool {
		let mut receivers = self.receivers.write();
		let before = receivers.len();
		receivers.retain(|receiver| receiver.id != id);
		receivers.len() < before
	}

	/// Number of connected receivers
	pub fn receiver_count(&self) -> usize {
		self.receivers.read().len()
	}

	/// Deliver `instance` to every matching receiver
	///
	/// The first receiver error stops dispatch and is returned.
	pub async fn send(&self, instance: T) -> Result<(), SignalError> {
		let instance = Arc::new(instance);
		let receivers = self.receivers.read().clone();
		tracing::debug!(signal = %self.name, receivers = receivers.len(), "Sending signal");

		for receiver in receivers {
			if receiver
				.filter
				.as_ref()
				.is_some_and(|filter| !filter(&instance))
			{
				continue;
			}
			if let Err(error) = (receiver.call)(Arc::clone(&instance)).await {
				tracing::warn!(signal = %self.name, %error, "Signal receiver failed");
				return Err(error);
			}
		}
		Ok(())
	}
}

impl<T: Send + Sync + 'static> Clone for Signal<T> {
	fn clone(&self) -> Self {
		Self {
			name: self.name,
			receivers: Arc::clone(&self.receivers),
			next_id: Arc::clone(&self.next_id),
		}
	}
}

impl<T: Send + Sync + 'static> fmt::Debug for Signal<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Signal")
			.field("name", &self.name.as_str())
			.field("receivers", &self.receiver_count())
			.finish()
	}
}
