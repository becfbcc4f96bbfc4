//! Single-flight refresh coordination for the session's credential pair.
//!
//! [`RefreshCoordinator::refresh`] is the single choke point for all refresh
//! activity: the expiry scheduler and the authenticated request wrapper both call
//! it and rely on its single-flight guarantee. While one exchange is in flight no
//! second one may start; concurrent callers wait (bounded) for the in-flight
//! result and share its outcome. Every failure degrades to "absent" so the
//! caller's original action fails visibly instead of crashing or looping.

mod metrics;
mod wire;

pub use metrics::RefreshMetrics;

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransientError, TransportError},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	schedule::ExpiryScheduler,
	store::SessionStore,
	token::BearerToken,
};

/// Default bound on how long a caller waits for an in-flight exchange to resolve.
pub const DEFAULT_WAIT_TIMEOUT: StdDuration = StdDuration::from_secs(5);

/// Performs the network exchange of a refresh token for a new credential pair,
/// guaranteeing at most one exchange in flight at a time.
pub struct RefreshCoordinator {
	store: Arc<dyn SessionStore>,
	http: ReqwestClient,
	refresh_endpoint: Url,
	wait_timeout: StdDuration,
	flight: AsyncMutex<()>,
	ledger: Mutex<FlightLedger>,
	rearm: RwLock<Option<Weak<ExpiryScheduler>>>,
	metrics: RefreshMetrics,
}

#[derive(Debug, Default)]
struct FlightLedger {
	generation: u64,
	in_flight: bool,
	last_outcome: Option<BearerToken>,
}

impl RefreshCoordinator {
	/// Creates a coordinator bound to the provided store, transport, and endpoint.
	pub fn new(
		store: Arc<dyn SessionStore>,
		http: ReqwestClient,
		refresh_endpoint: Url,
		wait_timeout: StdDuration,
	) -> Self {
		Self {
			store,
			http,
			refresh_endpoint,
			wait_timeout,
			flight: AsyncMutex::new(()),
			ledger: Mutex::new(FlightLedger::default()),
			rearm: RwLock::new(None),
			metrics: RefreshMetrics::default(),
		}
	}

	/// Registers the scheduler that must be re-armed after every persisted rotation.
	pub(crate) fn attach_scheduler(&self, scheduler: &Arc<ExpiryScheduler>) {
		*self.rearm.write() = Some(Arc::downgrade(scheduler));
	}

	/// Exchanges the stored refresh token for a new access token.
	///
	/// Returns the fresh access token, or `None` when no refresh token is stored,
	/// the exchange fails, or the bounded wait for an in-flight exchange times
	/// out. Nothing is persisted on failure.
	pub async fn refresh(&self) -> Option<BearerToken> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span.instrument(self.refresh_inner()).await;

		match &result {
			Some(_) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
				self.metrics.record_success();
			},
			None => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				self.metrics.record_failure();
			},
		}

		result
	}

	async fn refresh_inner(&self) -> Option<BearerToken> {
		let observed = self.ledger.lock().generation;
		let guard = match tokio::time::timeout(self.wait_timeout, self.flight.lock()).await {
			Ok(guard) => guard,
			Err(_) => {
				obs::record_degraded(
					FlowKind::Refresh,
					"wait",
					&TransientError::RefreshWaitTimeout,
				);

				return None;
			},
		};

		{
			let mut ledger = self.ledger.lock();

			if ledger.generation != observed {
				// An exchange resolved while we waited; piggyback on its outcome.
				return ledger.last_outcome.clone();
			}

			ledger.in_flight = true;
		}

		let outcome = self.exchange().await;

		{
			let mut ledger = self.ledger.lock();

			// The flag and the guard both clear on every path, so a stuck flight
			// can never permanently block future refresh attempts.
			ledger.in_flight = false;
			ledger.generation = ledger.generation.wrapping_add(1);
			ledger.last_outcome = outcome.as_ref().ok().cloned();
		}

		drop(guard);

		match outcome {
			Ok(token) => {
				self.rearm_scheduler();

				Some(token)
			},
			Err(err) => {
				obs::record_degraded(FlowKind::Refresh, "exchange", &err);

				None
			},
		}
	}

	async fn exchange(&self) -> Result<BearerToken> {
		let refresh = self.store.refresh_token().ok_or(ConfigError::MissingRefreshToken)?;
		let response = self
			.http
			.post(self.refresh_endpoint.clone())
			.bearer_auth(refresh.expose())
			.send()
			.await
			.map_err(TransportError::from)?;
		let status = response.status();
		let body = response.bytes().await.map_err(TransportError::from)?;

		if !status.is_success() {
			return Err(TransientError::RefreshEndpoint {
				message: format!("status {status}"),
				status: Some(status.as_u16()),
			}
			.into());
		}

		let rotation = wire::parse_rotation(&body, status.as_u16())?;

		self.store.save(&rotation.access, rotation.refresh.as_ref())?;

		Ok(rotation.access)
	}

	fn rearm_scheduler(&self) {
		if let Some(scheduler) = self.rearm.read().as_ref().and_then(Weak::upgrade)
			&& scheduler.is_active()
		{
			scheduler.arm();
		}
	}

	/// Returns the ledger to idle with no cached outcome; called on logout.
	pub fn reset(&self) {
		let mut ledger = self.ledger.lock();

		ledger.in_flight = false;
		ledger.generation = ledger.generation.wrapping_add(1);
		ledger.last_outcome = None;
	}

	/// Returns `true` while a network exchange is in flight.
	pub fn is_in_flight(&self) -> bool {
		self.ledger.lock().in_flight
	}

	/// Shared counters for refresh outcomes.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCoordinator")
			.field("refresh_endpoint", &self.refresh_endpoint.as_str())
			.field("wait_timeout", &self.wait_timeout)
			.field("in_flight", &self.is_in_flight())
			.finish()
	}
}
