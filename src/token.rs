//! Bearer-token domain model: redacted secrets, credential pairs, and expiry claims.

pub mod claims;
pub mod secret;

pub use claims::*;
pub use secret::*;

// self
use crate::_prelude::*;

/// Credential pair representing the single authenticated session of the current
/// process.
///
/// The pair is fully replaced, never merged, whenever a refresh exchange rotates
/// the stored secrets. A rotation may return only a new access token, in which case
/// the previously stored refresh token remains in effect.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
	/// Short-lived access token presented on every authenticated request.
	pub access: BearerToken,
	/// Longer-lived refresh token exchanged for new access tokens, if issued.
	pub refresh: Option<BearerToken>,
}
impl CredentialPair {
	/// Builds a pair from an access token and an optional refresh token.
	pub fn new(access: BearerToken, refresh: Option<BearerToken>) -> Self {
		Self { access, refresh }
	}
}
impl Debug for CredentialPair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialPair")
			.field("access", &"<redacted>")
			.field("refresh", &self.refresh.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}
