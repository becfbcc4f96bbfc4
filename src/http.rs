//! Authenticated request wrapper with a single transparent refresh-and-retry cycle.
//!
//! Every outbound request carries the stored access token as a bearer header. A
//! 401 answer triggers exactly one refresh through the coordinator and one
//! re-issue of the request; the second response is returned regardless of its
//! outcome. Requests issued with no stored token never attempt a refresh, which
//! keeps an unauthenticated client from looping against the refresh endpoint.

// crates.io
use reqwest::{
	Method, Response, StatusCode,
	header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	refresh::RefreshCoordinator,
	store::SessionStore,
	token::BearerToken,
};

/// Caller-supplied request shape: method, extra headers, and an optional body.
///
/// The wrapper never mutates an options value; each dispatch builds a fresh
/// request from it, so the retry after a refresh observes the exact same input.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
	method: Method,
	headers: HeaderMap,
	body: Option<Vec<u8>>,
}
impl RequestOptions {
	/// Creates options for the provided HTTP method with no headers or body.
	pub fn new(method: Method) -> Self {
		Self { method, headers: HeaderMap::new(), body: None }
	}

	/// Adds (or replaces) a header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets a raw request body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Serializes `payload` as the JSON request body and tags the content type.
	pub fn with_json<T>(self, payload: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		let body = serde_json::to_vec(payload)
			.map_err(|source| ConfigError::InvalidRequestBody { source })?;

		Ok(self
			.with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
			.with_body(body))
	}
}

/// HTTP client that attaches the session's access token and retries once on 401.
#[derive(Clone)]
pub struct AuthHttpClient {
	http: ReqwestClient,
	store: Arc<dyn SessionStore>,
	coordinator: Arc<RefreshCoordinator>,
}
impl AuthHttpClient {
	/// Creates a wrapper around the provided transport, store, and coordinator.
	pub fn new(
		http: ReqwestClient,
		store: Arc<dyn SessionStore>,
		coordinator: Arc<RefreshCoordinator>,
	) -> Self {
		Self { http, store, coordinator }
	}

	/// Issues the request with the current access token attached.
	///
	/// On a 401 with a token attached: one refresh, one retry, and the retried
	/// response is returned as-is. On a 401 with no token stored the response
	/// passes through untouched. Transport failures surface as [`Error`].
	pub async fn request(&self, url: Url, options: &RequestOptions) -> Result<Response> {
		const KIND: FlowKind = FlowKind::Request;

		let span = FlowSpan::new(KIND, "request");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.request_inner(url, options)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn request_inner(&self, url: Url, options: &RequestOptions) -> Result<Response> {
		let access = self.store.access();
		let response = self.dispatch(url.clone(), options, access.as_ref()).await?;

		if response.status() != StatusCode::UNAUTHORIZED || access.is_none() {
			return Ok(response);
		}

		// Expired or revoked access token; recover with one refresh-and-retry
		// cycle and hand back whatever the retry produces.
		let Some(rotated) = self.coordinator.refresh().await else {
			return Ok(response);
		};

		self.dispatch(url, options, Some(&rotated)).await
	}

	async fn dispatch(
		&self,
		url: Url,
		options: &RequestOptions,
		token: Option<&BearerToken>,
	) -> Result<Response> {
		let mut headers = options.headers.clone();

		if let Some(token) = token {
			let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose()))
				.map_err(|source| ConfigError::InvalidAuthorizationHeader { source })?;

			value.set_sensitive(true);
			headers.insert(AUTHORIZATION, value);
		}

		let mut builder = self.http.request(options.method.clone(), url).headers(headers);

		if let Some(body) = &options.body {
			builder = builder.body(body.clone());
		}

		Ok(builder.send().await.map_err(TransportError::from)?)
	}
}
impl Debug for AuthHttpClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthHttpClient").field("coordinator", &self.coordinator).finish()
	}
}
