//! Simple file-backed [`SessionStore`] for desktop shells and long-lived CLI sessions.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{CredentialSlot, SessionStore, StoreError},
	token::BearerToken,
};

/// Persists the credential slot to a JSON file after each mutation.
///
/// The snapshot is loaded eagerly on [`open`](FileStore::open) so reads stay
/// infallible; writes go through a temporary file followed by an atomic rename.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<CredentialSlot>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot =
			if path.exists() { Self::load_snapshot(&path)? } else { CredentialSlot::default() };

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	fn load_snapshot(path: &Path) -> Result<CredentialSlot, StoreError> {
		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(CredentialSlot::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}
		Ok(())
	}

	fn persist_locked(&self, contents: &CredentialSlot) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(contents).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl SessionStore for FileStore {
	fn save(&self, access: &BearerToken, refresh: Option<&BearerToken>) -> Result<(), StoreError> {
		let mut guard = self.inner.write();

		guard.store(access, refresh);
		self.persist_locked(&guard)
	}

	fn access(&self) -> Option<BearerToken> {
		self.inner.read().access_token.as_deref().map(BearerToken::new)
	}

	fn refresh_token(&self) -> Option<BearerToken> {
		self.inner.read().refresh_token.as_deref().map(BearerToken::new)
	}

	fn save_username(&self, name: &str) -> Result<(), StoreError> {
		let mut guard = self.inner.write();

		guard.username = Some(name.into());
		self.persist_locked(&guard)
	}

	fn username(&self) -> Option<String> {
		self.inner.read().username.clone()
	}

	fn clear(&self) -> Result<(), StoreError> {
		let mut guard = self.inner.write();

		*guard = CredentialSlot::default();
		self.persist_locked(&guard)
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// self
	use super::*;
	use crate::store::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USERNAME_KEY};

	fn temp_path() -> PathBuf {
		let unique = format!(
			"session_keeper_file_store_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	#[test]
	fn save_and_reload_round_trip() {
		let path = temp_path();
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");

		store
			.save(&BearerToken::new("access-token"), Some(&BearerToken::new("refresh-token")))
			.expect("Failed to save fixture pair to file store.");
		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");

		assert_eq!(reopened.access().as_ref().map(BearerToken::expose), Some("access-token"));
		assert_eq!(
			reopened.refresh_token().as_ref().map(BearerToken::expose),
			Some("refresh-token"),
		);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn snapshot_uses_the_fixed_keys() {
		let path = temp_path();
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");

		store
			.save(&BearerToken::new("a"), Some(&BearerToken::new("r")))
			.expect("Failed to save fixture pair to file store.");
		store.save_username("devsharer").expect("Failed to cache username in file store.");

		let raw = fs::read_to_string(&path).expect("Snapshot file should exist after save.");
		let value = serde_json::from_str::<serde_json::Value>(&raw)
			.expect("Snapshot file should contain valid JSON.");

		assert_eq!(value[ACCESS_TOKEN_KEY], "a");
		assert_eq!(value[REFRESH_TOKEN_KEY], "r");
		assert_eq!(value[USERNAME_KEY], "devsharer");

		store.clear().expect("Failed to clear file store.");

		let raw = fs::read_to_string(&path).expect("Snapshot file should exist after clear.");
		let value = serde_json::from_str::<serde_json::Value>(&raw)
			.expect("Cleared snapshot should contain valid JSON.");

		assert_eq!(value[ACCESS_TOKEN_KEY], serde_json::Value::Null);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}
}
