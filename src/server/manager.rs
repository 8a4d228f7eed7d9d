//! Registry of live server-side call handlers
//!
//! Every handler runs as its own task. The manager records one entry per
//! handler, keyed by [`CallId`], and the task removes its own entry right before
//! it exits. Nothing else ever deregisters a handler, so an entry cannot vanish
//! while its handler is still running.

use futures::FutureExt;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::handler::CallState;
use crate::error::ManagerError;
use crate::logging::*;

/// Identity of one server-side handler, never reused within a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(u64);

impl fmt::Display for CallId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Registry record of a live handler
#[derive(Debug, Clone)]
pub struct HandlerEntry {
	pub state: CallState,
	pub registered_at: Instant,
}

struct Inner {
	handlers: Mutex<HashMap<CallId, HandlerEntry>>,
	next_id: AtomicU64,
	shutdown: CancellationToken,
	live: watch::Sender<usize>,
}

/// Owns the set of live handlers and the server-wide shutdown token
#[derive(Clone)]
pub struct HandlerManager {
	inner: Arc<Inner>,
}

impl Default for HandlerManager {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for HandlerManager {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("HandlerManager")
			.field("live", &self.len())
			.field("shutting_down", &self.is_shutting_down())
			.finish()
	}
}

impl HandlerManager {
	pub fn new() -> Self {
		let (live, _) = watch::channel(0);
		Self {
			inner: Arc::new(Inner {
				handlers: Mutex::new(HashMap::new()),
				next_id: AtomicU64::new(1),
				shutdown: CancellationToken::new(),
				live,
			}),
		}
	}

	fn handlers(&self) -> MutexGuard<'_, HashMap<CallId, HandlerEntry>> {
		self.inner.handlers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	/// Construct a handler for a fresh [`CallId`], register it and spawn it
	///
	/// `make` receives the id and returns the handler's future. When the future
	/// completes (or panics) the task releases its own registry entry.
	pub fn add_handler<F, Fut>(&self, make: F) -> Result<CallId, ManagerError>
	where
		F: FnOnce(CallId) -> Fut,
		Fut: Future<Output = ()> + Send + 'static,
	{
		if self.inner.shutdown.is_cancelled() {
			return Err(ManagerError::ShuttingDown);
		}
		let runtime = tokio::runtime::Handle::try_current().map_err(|_| ManagerError::NoRuntime)?;

		let id = CallId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
		let handler = make(id);

		{
			let mut handlers = self.handlers();
			handlers.insert(id, HandlerEntry { state: CallState::NewCall, registered_at: Instant::now() });
			self.inner.live.send_replace(handlers.len());
		}

		let manager = self.clone();
		runtime.spawn(async move {
			if AssertUnwindSafe(handler).catch_unwind().await.is_err() {
				error!("[call {}] Handler panicked", id);
			}
			manager.release(id);
		});

		debug!("[call {}] Handler registered", id);
		Ok(id)
	}

	/// Deregister a handler; returns false if it was not registered
	pub fn release(&self, id: CallId) -> bool {
		let removed = {
			let mut handlers = self.handlers();
			let removed = handlers.remove(&id).is_some();
			self.inner.live.send_replace(handlers.len());
			removed
		};
		if removed {
			debug!("[call {}] The handler is destroyed", id);
		}
		removed
	}

	/// Record the state a handler has reached
	pub fn update_state(&self, id: CallId, state: CallState) {
		if let Some(entry) = self.handlers().get_mut(&id) {
			entry.state = state;
		}
	}

	pub fn state(&self, id: CallId) -> Option<CallState> {
		self.handlers().get(&id).map(|entry| entry.state)
	}

	/// Live handlers and their states, ordered by id
	pub fn snapshot(&self) -> Vec<(CallId, CallState)> {
		let mut entries: Vec<_> =
			self.handlers().iter().map(|(id, entry)| (*id, entry.state)).collect();
		entries.sort_by_key(|(id, _)| *id);
		entries
	}

	pub fn len(&self) -> usize {
		self.handlers().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Token cancelled when the server shuts down; call tokens are its children
	pub fn shutdown_token(&self) -> CancellationToken {
		self.inner.shutdown.clone()
	}

	/// Stop arming handlers and cancel every live call
	pub fn cancel_all(&self) {
		self.inner.shutdown.cancel();
	}

	pub fn is_shutting_down(&self) -> bool {
		self.inner.shutdown.is_cancelled()
	}

	/// Wait until no handler is registered
	pub async fn wait_idle(&self) {
		let mut live = self.inner.live.subscribe();
		let _ = live.wait_for(|count| *count == 0).await;
	}
}


// vim: ts=4
