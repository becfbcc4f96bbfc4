//! In-process invalidation bus decoupling state-changing actions from the
//! surfaces that track notification counts.
//!
//! A surface subscribes with two callbacks: "refresh" (recompute an
//! authoritative count) and "increment" (optimistically bump a local count by
//! one). Any component performing a state-changing action publishes to the bus;
//! delivery is synchronous, in registration order, fire-and-forget, and has no
//! relation to the credential pair's lifecycle.

// std
use std::panic::{AssertUnwindSafe, catch_unwind};
// self
use crate::_prelude::*;

type NotificationHandler = Arc<dyn Fn() + Send + Sync>;

/// Registry of notification subscribers.
#[derive(Clone, Default)]
pub struct NotificationBus {
	registry: Arc<Mutex<Registry>>,
}

#[derive(Default)]
struct Registry {
	next_id: u64,
	refresh: Vec<(u64, NotificationHandler)>,
	increment: Vec<(u64, NotificationHandler)>,
}
impl Registry {
	fn remove(&mut self, id: u64) {
		self.refresh.retain(|(entry, _)| *entry != id);
		self.increment.retain(|(entry, _)| *entry != id);
	}
}

impl NotificationBus {
	/// Creates an empty bus.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a refresh + increment callback pair.
	///
	/// The returned subscription removes exactly those two callbacks when
	/// [`unsubscribe`](NotificationSubscription::unsubscribe) is called.
	pub fn subscribe(
		&self,
		on_refresh: impl Fn() + Send + Sync + 'static,
		on_increment: impl Fn() + Send + Sync + 'static,
	) -> NotificationSubscription {
		let mut registry = self.registry.lock();
		let id = registry.next_id;

		registry.next_id += 1;
		registry.refresh.push((id, Arc::new(on_refresh)));
		registry.increment.push((id, Arc::new(on_increment)));

		NotificationSubscription { id, registry: Arc::downgrade(&self.registry) }
	}

	/// Invokes every registered "refresh" callback, in registration order.
	pub fn publish_refresh(&self) {
		let handlers = {
			let registry = self.registry.lock();

			registry.refresh.iter().map(|(_, handler)| handler.clone()).collect::<Vec<_>>()
		};

		Self::fan_out(handlers);
	}

	/// Invokes every registered "increment" callback, in registration order.
	pub fn publish_increment(&self) {
		let handlers = {
			let registry = self.registry.lock();

			registry.increment.iter().map(|(_, handler)| handler.clone()).collect::<Vec<_>>()
		};

		Self::fan_out(handlers);
	}

	fn fan_out(handlers: Vec<NotificationHandler>) {
		for handler in handlers {
			// A panicking subscriber must not starve the remaining ones.
			let _ = catch_unwind(AssertUnwindSafe(|| handler()));
		}
	}
}
impl Debug for NotificationBus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let registry = self.registry.lock();

		f.debug_struct("NotificationBus")
			.field("refresh_subscribers", &registry.refresh.len())
			.field("increment_subscribers", &registry.increment.len())
			.finish()
	}
}

/// Handle removing one subscriber pair from the bus; safe to call repeatedly.
#[derive(Clone, Debug)]
pub struct NotificationSubscription {
	id: u64,
	registry: Weak<Mutex<Registry>>,
}
impl NotificationSubscription {
	/// Removes the subscribed callback pair; a second call is a no-op.
	pub fn unsubscribe(&self) {
		if let Some(registry) = self.registry.upgrade() {
			registry.lock().remove(self.id);
		}
	}
}
impl Debug for Registry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Registry")
			.field("refresh", &self.refresh.len())
			.field("increment", &self.increment.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;

	#[test]
	fn increments_fan_out_in_registration_order() {
		let bus = NotificationBus::new();
		let order = Arc::new(Mutex::new(Vec::new()));
		let subscriptions = (0..3)
			.map(|index| {
				let order = order.clone();

				bus.subscribe(|| {}, move || order.lock().push(index))
			})
			.collect::<Vec<_>>();

		bus.publish_increment();

		assert_eq!(*order.lock(), vec![0, 1, 2]);

		subscriptions[1].unsubscribe();
		order.lock().clear();
		bus.publish_increment();

		assert_eq!(*order.lock(), vec![0, 2]);
	}

	#[test]
	fn unsubscribe_is_idempotent() {
		let bus = NotificationBus::new();
		let hits = Arc::new(AtomicUsize::new(0));
		let subscription = {
			let hits = hits.clone();

			bus.subscribe(
				move || {
					hits.fetch_add(1, Ordering::SeqCst);
				},
				|| {},
			)
		};

		subscription.unsubscribe();
		subscription.unsubscribe();
		bus.publish_refresh();

		assert_eq!(hits.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn panicking_subscriber_does_not_starve_the_rest() {
		let bus = NotificationBus::new();
		let hits = Arc::new(AtomicUsize::new(0));
		let _first = bus.subscribe(|| panic!("subscriber failure"), || {});
		let _second = {
			let hits = hits.clone();

			bus.subscribe(
				move || {
					hits.fetch_add(1, Ordering::SeqCst);
				},
				|| {},
			)
		};

		bus.publish_refresh();

		assert_eq!(hits.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn refresh_and_increment_lists_are_independent() {
		let bus = NotificationBus::new();
		let refreshes = Arc::new(AtomicUsize::new(0));
		let increments = Arc::new(AtomicUsize::new(0));
		let _subscription = {
			let refreshes = refreshes.clone();
			let increments = increments.clone();

			bus.subscribe(
				move || {
					refreshes.fetch_add(1, Ordering::SeqCst);
				},
				move || {
					increments.fetch_add(1, Ordering::SeqCst);
				},
			)
		};

		bus.publish_refresh();
		bus.publish_refresh();
		bus.publish_increment();

		assert_eq!(refreshes.load(Ordering::SeqCst), 2);
		assert_eq!(increments.load(Ordering::SeqCst), 1);
	}
}
