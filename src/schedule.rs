//! Proactive renewal scheduling for the stored access token.
//!
//! The scheduler decodes the access token's embedded expiry, computes a safety
//! buffer, and arms a one-shot timer that triggers the refresh coordinator before
//! the token lapses. Arming is idempotent: there is never more than one pending
//! timer for the session. Tokens whose expiry cannot be decoded are left to the
//! reactive 401 retry path.

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::task::JoinHandle;
// self
use crate::{
	_prelude::*,
	obs::{self, FlowKind},
	refresh::RefreshCoordinator,
	store::SessionStore,
	token::claims,
};

/// Timing policy for proactive renewal.
///
/// The renewal buffer is `max(buffer_percent% of time_until_expiry, min_validity)`
/// and the timer fires `buffer` before expiry. Tokens already inside the
/// `min_validity` window are refreshed immediately; fire times outside
/// `(0, max_delay)` are treated as unschedulable.
#[derive(Clone, Copy, Debug)]
pub struct RenewalPolicy {
	/// Window inside which a token is refreshed immediately instead of scheduled.
	pub min_validity: Duration,
	/// Percentage of the remaining validity reserved as the renewal buffer.
	pub buffer_percent: i32,
	/// Upper bound on how far ahead a timer may be armed.
	pub max_delay: Duration,
}
impl RenewalPolicy {
	/// Computes the renewal plan for a token with the provided remaining validity.
	pub fn plan(&self, time_until_expiry: Duration) -> RenewalPlan {
		if time_until_expiry <= self.min_validity {
			return RenewalPlan::Immediate;
		}

		let buffer = (time_until_expiry * self.buffer_percent / 100_i32).max(self.min_validity);
		let fire_in = time_until_expiry - buffer;

		if Duration::ZERO < fire_in && fire_in < self.max_delay {
			RenewalPlan::After(fire_in)
		} else {
			RenewalPlan::Unschedulable
		}
	}
}
impl Default for RenewalPolicy {
	fn default() -> Self {
		Self {
			min_validity: Duration::minutes(5),
			buffer_percent: 10,
			max_delay: Duration::hours(24),
		}
	}
}

/// Outcome of evaluating a [`RenewalPolicy`] against a token's remaining validity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RenewalPlan {
	/// Refresh now; the token is inside the minimum-validity window.
	Immediate,
	/// Arm a one-shot timer for the contained delay.
	After(Duration),
	/// Do not arm a timer; rely on the reactive 401 retry path.
	Unschedulable,
}

/// Arms and re-arms the proactive renewal timer for the current access token.
///
/// Must run inside a tokio runtime: armed plans are carried out by spawned tasks.
pub struct ExpiryScheduler {
	store: Arc<dyn SessionStore>,
	coordinator: Arc<RefreshCoordinator>,
	policy: RenewalPolicy,
	state: Mutex<TimerState>,
	weak_self: Weak<Self>,
}

#[derive(Debug, Default)]
struct TimerState {
	active: bool,
	epoch: u64,
	task: Option<JoinHandle<()>>,
}

impl ExpiryScheduler {
	/// Creates an inactive scheduler bound to the provided store and coordinator.
	pub fn new(
		store: Arc<dyn SessionStore>,
		coordinator: Arc<RefreshCoordinator>,
		policy: RenewalPolicy,
	) -> Arc<Self> {
		Arc::new_cyclic(|weak_self| Self {
			store,
			coordinator,
			policy,
			state: Mutex::new(TimerState::default()),
			weak_self: weak_self.clone(),
		})
	}

	/// Marks the scheduler active and arms it against the current access token.
	pub fn activate(&self) {
		self.state.lock().active = true;
		self.arm();
	}

	/// Returns `true` once [`activate`](Self::activate) has run and
	/// [`disarm`](Self::disarm) has not; a started scheduler with no pending
	/// timer still reports `true`.
	pub fn is_active(&self) -> bool {
		self.state.lock().active
	}

	/// Cancels any pending timer and re-arms against the stored access token.
	///
	/// Idempotent: calling twice leaves exactly one pending timer. Tokens that
	/// are absent or carry no decodable expiry arm nothing.
	pub fn arm(&self) {
		let mut state = self.state.lock();

		if let Some(task) = state.task.take() {
			task.abort();
		}

		state.epoch = state.epoch.wrapping_add(1);

		let Some(access) = self.store.access() else {
			return;
		};
		let Some(remaining) = claims::time_until_expiry(&access, OffsetDateTime::now_utc()) else {
			obs::record_degraded(FlowKind::Renewal, "decode", &"expiry claim undecodable");

			return;
		};
		let delay = match self.policy.plan(remaining) {
			RenewalPlan::Immediate => None,
			RenewalPlan::After(delay) => Some(delay.try_into().unwrap_or(StdDuration::ZERO)),
			RenewalPlan::Unschedulable => return,
		};

		state.task = Some(self.spawn_renewal(state.epoch, delay));
	}

	/// Cancels the pending timer and marks the scheduler inactive; called on logout.
	///
	/// A timer firing across the cancellation observes a stale epoch and becomes
	/// a no-op.
	pub fn disarm(&self) {
		let mut state = self.state.lock();

		state.active = false;
		state.epoch = state.epoch.wrapping_add(1);

		if let Some(task) = state.task.take() {
			task.abort();
		}
	}

	fn spawn_renewal(&self, epoch: u64, delay: Option<StdDuration>) -> JoinHandle<()> {
		let weak = self.weak_self.clone();

		tokio::spawn(async move {
			if let Some(delay) = delay {
				tokio::time::sleep(delay).await;
			}

			let Some(scheduler) = weak.upgrade() else {
				return;
			};

			if !scheduler.epoch_matches(epoch) {
				return;
			}
			if scheduler.coordinator.refresh().await.is_some() {
				scheduler.arm();
			}
		})
	}

	fn epoch_matches(&self, epoch: u64) -> bool {
		let state = self.state.lock();

		state.epoch == epoch
	}
}
impl Debug for ExpiryScheduler {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("ExpiryScheduler")
			.field("policy", &self.policy)
			.field("active", &state.active)
			.field("timer_pending", &state.task.is_some())
			.finish()
	}
}
