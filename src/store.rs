//! Storage contracts and built-in store implementations for session credentials.
//!
//! A store holds at most one [`CredentialPair`](crate::token::CredentialPair) plus
//! the session-scoped profile cache, addressable by the fixed keys below. Reads
//! never fail: every backend keeps an eagerly loaded in-memory snapshot and only
//! mutations touch the underlying medium.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	token::{BearerToken, CredentialPair},
};

/// Fixed key under which the access token is persisted.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Fixed key under which the refresh token is persisted.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Fixed key under which the cached username is persisted.
pub const USERNAME_KEY: &str = "username";

/// Storage backend contract implemented by session credential stores.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Persists the access token always and the refresh token only when supplied.
	///
	/// A refresh exchange may rotate only the access token; passing `None` keeps
	/// the previously stored refresh token in place.
	fn save(&self, access: &BearerToken, refresh: Option<&BearerToken>) -> Result<(), StoreError>;

	/// Returns the stored access token, if present.
	fn access(&self) -> Option<BearerToken>;

	/// Returns the stored refresh token, if present.
	fn refresh_token(&self) -> Option<BearerToken>;

	/// Caches the signed-in user's name alongside the credential pair.
	fn save_username(&self, name: &str) -> Result<(), StoreError>;

	/// Returns the cached username, if present.
	fn username(&self) -> Option<String>;

	/// Removes both tokens and all derived session state as a unit.
	fn clear(&self) -> Result<(), StoreError>;

	/// Returns the full credential pair when an access token is stored.
	fn credentials(&self) -> Option<CredentialPair> {
		self.access().map(|access| CredentialPair::new(access, self.refresh_token()))
	}
}

/// Error type produced by [`SessionStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage medium.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Mutable slot shared by the built-in backends.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CredentialSlot {
	pub access_token: Option<String>,
	pub refresh_token: Option<String>,
	pub username: Option<String>,
}
impl CredentialSlot {
	pub(crate) fn store(&mut self, access: &BearerToken, refresh: Option<&BearerToken>) {
		self.access_token = Some(access.expose().into());

		if let Some(refresh) = refresh {
			self.refresh_token = Some(refresh.expose().into());
		}
	}
}
