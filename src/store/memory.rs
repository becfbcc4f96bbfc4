//! Thread-safe in-memory [`SessionStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{CredentialSlot, SessionStore, StoreError},
	token::BearerToken,
};

/// Thread-safe storage backend that keeps the credential pair in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<CredentialSlot>>);
impl SessionStore for MemoryStore {
	fn save(&self, access: &BearerToken, refresh: Option<&BearerToken>) -> Result<(), StoreError> {
		self.0.write().store(access, refresh);

		Ok(())
	}

	fn access(&self) -> Option<BearerToken> {
		self.0.read().access_token.as_deref().map(BearerToken::new)
	}

	fn refresh_token(&self) -> Option<BearerToken> {
		self.0.read().refresh_token.as_deref().map(BearerToken::new)
	}

	fn save_username(&self, name: &str) -> Result<(), StoreError> {
		self.0.write().username = Some(name.into());

		Ok(())
	}

	fn username(&self) -> Option<String> {
		self.0.read().username.clone()
	}

	fn clear(&self) -> Result<(), StoreError> {
		*self.0.write() = CredentialSlot::default();

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn save_replaces_the_pair_and_clear_empties_it() {
		let store = MemoryStore::default();

		store
			.save(&BearerToken::new("access-1"), Some(&BearerToken::new("refresh-1")))
			.expect("Memory store save should succeed.");
		store.save_username("devsharer").expect("Memory store username save should succeed.");

		assert_eq!(store.access().as_ref().map(BearerToken::expose), Some("access-1"));
		assert_eq!(store.refresh_token().as_ref().map(BearerToken::expose), Some("refresh-1"));
		assert_eq!(store.username().as_deref(), Some("devsharer"));

		store.save(&BearerToken::new("access-2"), None).expect("Rotation save should succeed.");

		assert_eq!(store.access().as_ref().map(BearerToken::expose), Some("access-2"));
		assert_eq!(store.refresh_token().as_ref().map(BearerToken::expose), Some("refresh-1"));

		store.clear().expect("Memory store clear should succeed.");

		assert_eq!(store.access(), None);
		assert_eq!(store.refresh_token(), None);
		assert_eq!(store.username(), None);
	}

	#[test]
	fn credentials_requires_an_access_token() {
		let store = MemoryStore::default();

		assert!(store.credentials().is_none());

		store
			.save(&BearerToken::new("access"), None)
			.expect("Memory store save should succeed.");

		let pair = store.credentials().expect("Credential pair should be present after save.");

		assert_eq!(pair.access.expose(), "access");
		assert_eq!(pair.refresh, None);
	}
}
