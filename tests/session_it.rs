// std
use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
// self
use session_keeper::{schedule::RenewalPolicy, session::Session, token::BearerToken, url::Url};

fn jwt_expiring_in(validity: Duration) -> String {
	let exp = (OffsetDateTime::now_utc() + validity).unix_timestamp();
	let header = URL_SAFE_NO_PAD.encode(b"{\"alg\":\"none\"}");
	let payload = URL_SAFE_NO_PAD.encode(format!("{{\"exp\":{exp}}}").as_bytes());

	format!("{header}.{payload}.")
}

fn fast_policy() -> RenewalPolicy {
	RenewalPolicy {
		min_validity: Duration::milliseconds(20),
		buffer_percent: 10,
		max_delay: Duration::hours(24),
	}
}

fn build_session(server: &MockServer, policy: RenewalPolicy) -> Session {
	Session::builder(Url::parse(&server.url("/api")).expect("Mock base URL should parse."))
		.with_renewal_policy(policy)
		.build()
		.expect("Session should build against the mock server.")
}

fn seed(session: &Session, validity: Duration) {
	session
		.store_tokens(
			&BearerToken::new(jwt_expiring_in(validity)),
			Some(&BearerToken::new("refresh-1")),
		)
		.expect("Seeding the credential pair should succeed.");
}

#[tokio::test]
async fn four_minute_token_refreshes_immediately() {
	let server = MockServer::start_async().await;
	let session = build_session(&server, RenewalPolicy::default());

	seed(&session, Duration::minutes(4));

	let rotated = jwt_expiring_in(Duration::hours(2));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.body(format!("{{\"access_token\":\"{rotated}\"}}"));
		})
		.await;
	let periodic = session.start_periodic_refresh();

	tokio::time::sleep(StdDuration::from_millis(300)).await;

	mock.assert_calls_async(1).await;

	assert_eq!(
		session.store().access().as_ref().map(BearerToken::expose),
		Some(rotated.as_str()),
	);

	periodic.stop();
}

#[tokio::test]
async fn two_hour_token_waits_for_its_timer() {
	let server = MockServer::start_async().await;
	let session = build_session(&server, RenewalPolicy::default());

	seed(&session, Duration::hours(2));

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200).body("{\"access_token\":\"never\"}");
		})
		.await;
	let periodic = session.start_periodic_refresh();

	tokio::time::sleep(StdDuration::from_millis(250)).await;

	mock.assert_calls_async(0).await;

	periodic.stop();
}

#[tokio::test]
async fn rearming_leaves_exactly_one_pending_timer() {
	let server = MockServer::start_async().await;
	let session = build_session(&server, fast_policy());

	seed(&session, Duration::milliseconds(400));

	let rotated = jwt_expiring_in(Duration::hours(2));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.body(format!("{{\"access_token\":\"{rotated}\"}}"));
		})
		.await;
	let periodic = session.start_periodic_refresh();

	// A save while the scheduler is active re-arms it; the superseded timer
	// must not produce a second exchange.
	seed(&session, Duration::milliseconds(400));
	tokio::time::sleep(StdDuration::from_millis(900)).await;

	mock.assert_calls_async(1).await;

	periodic.stop();
}

#[tokio::test]
async fn cleared_session_never_fires_its_timer() {
	let server = MockServer::start_async().await;
	let session = build_session(&server, fast_policy());

	seed(&session, Duration::milliseconds(300));

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200).body("{\"access_token\":\"never\"}");
		})
		.await;
	let _periodic = session.start_periodic_refresh();

	session.clear_auth_data().expect("Clearing auth data should succeed.");

	assert!(!session.is_authenticated());
	assert!(session.store().access().is_none());
	assert!(session.store().refresh_token().is_none());

	tokio::time::sleep(StdDuration::from_millis(700)).await;

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn stop_handle_disarms_the_scheduler() {
	let server = MockServer::start_async().await;
	let session = build_session(&server, fast_policy());

	seed(&session, Duration::milliseconds(300));

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200).body("{\"access_token\":\"never\"}");
		})
		.await;
	let periodic = session.start_periodic_refresh();

	periodic.stop();
	periodic.stop();
	tokio::time::sleep(StdDuration::from_millis(700)).await;

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn saving_tokens_never_arms_an_unstarted_scheduler() {
	let server = MockServer::start_async().await;
	let session = build_session(&server, fast_policy());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200).body("{\"access_token\":\"never\"}");
		})
		.await;

	seed(&session, Duration::milliseconds(100));
	tokio::time::sleep(StdDuration::from_millis(500)).await;

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn notification_fan_out_reaches_every_subscriber_in_order() {
	let server = MockServer::start_async().await;
	let session = build_session(&server, RenewalPolicy::default());
	let order = Arc::new(std::sync::Mutex::new(Vec::new()));
	let subscriptions = (0..3)
		.map(|index| {
			let order = order.clone();

			session.subscribe_notifications(
				|| {},
				move || order.lock().expect("Log mutex should not be poisoned.").push(index),
			)
		})
		.collect::<Vec<_>>();

	session.publish_increment();

	assert_eq!(*order.lock().expect("Log mutex should not be poisoned."), vec![0, 1, 2]);

	subscriptions[1].unsubscribe();
	subscriptions[1].unsubscribe();
	order.lock().expect("Log mutex should not be poisoned.").clear();
	session.publish_increment();

	assert_eq!(*order.lock().expect("Log mutex should not be poisoned."), vec![0, 2]);
}

#[tokio::test]
async fn refresh_publishes_to_no_one_implicitly() {
	let server = MockServer::start_async().await;
	let session = build_session(&server, RenewalPolicy::default());
	let refreshes = Arc::new(AtomicUsize::new(0));
	let _subscription = {
		let refreshes = refreshes.clone();

		session.subscribe_notifications(
			move || {
				refreshes.fetch_add(1, Ordering::SeqCst);
			},
			|| {},
		)
	};

	session.publish_refresh();
	session.publish_refresh();

	assert_eq!(refreshes.load(Ordering::SeqCst), 2);
}
