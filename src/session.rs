//! Top-level session facade wiring the store, refresh coordinator, expiry
//! scheduler, request wrapper, and invalidation bus into one lifecycle.
//!
//! Control flow: caller action → [`Session::request`] → (on 401) refresh
//! coordinator → store update → scheduler re-arm. Logout tears everything down
//! as a unit so a subsequent login starts clean.

// std
use std::time::Duration as StdDuration;
// crates.io
use reqwest::Response;
// self
use crate::{
	_prelude::*,
	bus::{NotificationBus, NotificationSubscription},
	error::ConfigError,
	http::{AuthHttpClient, RequestOptions},
	refresh::{DEFAULT_WAIT_TIMEOUT, RefreshCoordinator, RefreshMetrics},
	schedule::{ExpiryScheduler, RenewalPolicy},
	store::{MemoryStore, SessionStore},
	token::BearerToken,
};

/// Path of the refresh endpoint relative to the API base URL.
pub const REFRESH_PATH: &str = "auth/refresh";

/// Coordinates the full session-token lifecycle against one API base URL.
#[derive(Clone)]
pub struct Session {
	base_url: Url,
	store: Arc<dyn SessionStore>,
	coordinator: Arc<RefreshCoordinator>,
	scheduler: Arc<ExpiryScheduler>,
	http: AuthHttpClient,
	bus: NotificationBus,
}
impl Session {
	/// Starts building a session for the provided API base URL.
	pub fn builder(base_url: Url) -> SessionBuilder {
		SessionBuilder {
			base_url,
			store: None,
			http: None,
			policy: RenewalPolicy::default(),
			refresh_wait_timeout: DEFAULT_WAIT_TIMEOUT,
		}
	}

	/// Resolves a path relative to the API base URL.
	pub fn endpoint(&self, path: &str) -> Result<Url> {
		self.base_url
			.join(path.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidBaseUrl { source }.into())
	}

	/// Issues an authenticated request; see [`AuthHttpClient::request`].
	pub async fn request(&self, url: Url, options: &RequestOptions) -> Result<Response> {
		self.http.request(url, options).await
	}

	/// Persists a credential pair, replacing the stored one.
	///
	/// Re-arms the expiry scheduler against the new access token when periodic
	/// refresh has been started.
	pub fn store_tokens(
		&self,
		access: &BearerToken,
		refresh: Option<&BearerToken>,
	) -> Result<()> {
		self.store.save(access, refresh)?;

		if self.scheduler.is_active() {
			self.scheduler.arm();
		}

		Ok(())
	}

	/// Clears the stored credentials and derived state, cancels any pending
	/// renewal timer, and returns the refresh state to idle.
	pub fn clear_auth_data(&self) -> Result<()> {
		self.scheduler.disarm();
		self.coordinator.reset();
		self.store.clear()?;

		Ok(())
	}

	/// Returns `true` iff either token of the credential pair is present.
	pub fn is_authenticated(&self) -> bool {
		self.store.access().is_some() || self.store.refresh_token().is_some()
	}

	/// Exchanges the stored refresh token for a new access token; see
	/// [`RefreshCoordinator::refresh`].
	pub async fn refresh(&self) -> Option<BearerToken> {
		self.coordinator.refresh().await
	}

	/// Starts proactive renewal and returns a handle that stops it.
	pub fn start_periodic_refresh(&self) -> PeriodicRefresh {
		self.scheduler.activate();

		PeriodicRefresh { scheduler: Arc::downgrade(&self.scheduler) }
	}

	/// Subscribes a refresh + increment callback pair to the invalidation bus.
	pub fn subscribe_notifications(
		&self,
		on_refresh: impl Fn() + Send + Sync + 'static,
		on_increment: impl Fn() + Send + Sync + 'static,
	) -> NotificationSubscription {
		self.bus.subscribe(on_refresh, on_increment)
	}

	/// Broadcasts "recompute your authoritative count" to every subscriber.
	pub fn publish_refresh(&self) {
		self.bus.publish_refresh();
	}

	/// Broadcasts "bump your local count by one" to every subscriber.
	pub fn publish_increment(&self) {
		self.bus.publish_increment();
	}

	/// The credential store backing this session.
	pub fn store(&self) -> &Arc<dyn SessionStore> {
		&self.store
	}

	/// Counters for refresh attempts made on behalf of this session.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		self.coordinator.metrics()
	}
}
impl Debug for Session {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Session")
			.field("base_url", &self.base_url.as_str())
			.field("coordinator", &self.coordinator)
			.field("scheduler", &self.scheduler)
			.finish()
	}
}

/// Stops proactive renewal; obtained from [`Session::start_periodic_refresh`].
///
/// Dropping the handle does not stop the scheduler; call
/// [`stop`](PeriodicRefresh::stop), which is safe to call repeatedly.
#[derive(Clone, Debug)]
pub struct PeriodicRefresh {
	scheduler: Weak<ExpiryScheduler>,
}
impl PeriodicRefresh {
	/// Cancels the pending renewal timer and marks the scheduler inactive.
	pub fn stop(&self) {
		if let Some(scheduler) = self.scheduler.upgrade() {
			scheduler.disarm();
		}
	}
}

/// Builder for [`Session`].
pub struct SessionBuilder {
	base_url: Url,
	store: Option<Arc<dyn SessionStore>>,
	http: Option<ReqwestClient>,
	policy: RenewalPolicy,
	refresh_wait_timeout: StdDuration,
}
impl Debug for SessionBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionBuilder")
			.field("base_url", &self.base_url.as_str())
			.field("store", &self.store.is_some())
			.field("http", &self.http)
			.field("policy", &self.policy)
			.field("refresh_wait_timeout", &self.refresh_wait_timeout)
			.finish()
	}
}
impl SessionBuilder {
	/// Uses the provided store instead of the default in-memory one.
	pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
		self.store = Some(store);

		self
	}

	/// Uses the provided reqwest client for every outbound request.
	pub fn with_http_client(mut self, client: ReqwestClient) -> Self {
		self.http = Some(client);

		self
	}

	/// Overrides the proactive renewal policy (defaults to the 5-minute /
	/// 10% / 24-hour reference constants).
	pub fn with_renewal_policy(mut self, policy: RenewalPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Overrides how long a caller waits for an in-flight refresh (default 5 s).
	pub fn with_refresh_wait_timeout(mut self, timeout: StdDuration) -> Self {
		self.refresh_wait_timeout = timeout;

		self
	}

	/// Wires the components together and produces a [`Session`].
	pub fn build(self) -> Result<Session> {
		let mut base_url = self.base_url;

		// `Url::join` replaces the last path segment unless the base ends in `/`.
		if !base_url.path().ends_with('/') {
			base_url.set_path(&format!("{}/", base_url.path()));
		}

		let refresh_endpoint = base_url
			.join(REFRESH_PATH)
			.map_err(|source| ConfigError::InvalidBaseUrl { source })?;
		let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::default()));
		let http = self.http.unwrap_or_default();
		let coordinator = Arc::new(RefreshCoordinator::new(
			store.clone(),
			http.clone(),
			refresh_endpoint,
			self.refresh_wait_timeout,
		));
		let scheduler = ExpiryScheduler::new(store.clone(), coordinator.clone(), self.policy);

		coordinator.attach_scheduler(&scheduler);

		let http = AuthHttpClient::new(http, store.clone(), coordinator.clone());

		Ok(Session {
			base_url,
			store,
			coordinator,
			scheduler,
			http,
			bus: NotificationBus::new(),
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn build_session(base: &str) -> Session {
		Session::builder(Url::parse(base).expect("Base URL fixture should parse."))
			.build()
			.expect("Session should build with defaults.")
	}

	#[test]
	fn endpoint_joins_relative_to_the_base() {
		let session = build_session("https://api.devshare.example/api");

		assert_eq!(
			session.endpoint("posts/1/likes").expect("Endpoint should join.").as_str(),
			"https://api.devshare.example/api/posts/1/likes",
		);
		assert_eq!(
			session.endpoint("/posts/1/likes").expect("Endpoint should join.").as_str(),
			"https://api.devshare.example/api/posts/1/likes",
		);
	}

	#[test]
	fn is_authenticated_sees_either_token() {
		let session = build_session("https://api.devshare.example");

		assert!(!session.is_authenticated());

		session
			.store_tokens(&BearerToken::new("access"), None)
			.expect("Storing tokens should succeed.");

		assert!(session.is_authenticated());

		session.clear_auth_data().expect("Clearing auth data should succeed.");

		assert!(!session.is_authenticated());
	}
}
