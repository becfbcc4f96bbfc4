//! Best-effort expiry extraction from JWT-shaped access tokens.
//!
//! The access token is treated as opaque except for its second dot-delimited
//! segment, which carries base64url-encoded JSON claims with an `exp` field in
//! epoch seconds. Tokens that do not decode simply yield `None`; the session then
//! skips proactive scheduling and relies on the reactive 401 retry path instead.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::{_prelude::*, token::BearerToken};

#[derive(Deserialize)]
struct RegisteredClaims {
	exp: i64,
}

/// Decodes the embedded expiry instant of an access token, if one can be read.
pub fn expiry(token: &BearerToken) -> Option<OffsetDateTime> {
	let payload = token.expose().split('.').nth(1)?;
	// Some issuers pad their segments even though RFC 7515 forbids it.
	let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
	let claims = serde_json::from_slice::<RegisteredClaims>(&bytes).ok()?;

	OffsetDateTime::from_unix_timestamp(claims.exp).ok()
}

/// Returns how long the token remains valid relative to `now`, if decodable.
///
/// The result is negative for already-expired tokens; callers decide whether that
/// means "refresh immediately" or "do not schedule".
pub fn time_until_expiry(token: &BearerToken, now: OffsetDateTime) -> Option<Duration> {
	expiry(token).map(|instant| instant - now)
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn unsigned_token(claims: &str) -> BearerToken {
		let header = URL_SAFE_NO_PAD.encode(b"{\"alg\":\"none\"}");
		let payload = URL_SAFE_NO_PAD.encode(claims.as_bytes());

		BearerToken::new(format!("{header}.{payload}."))
	}

	#[test]
	fn expiry_reads_the_exp_claim() {
		let token = unsigned_token("{\"sub\":\"user-1\",\"exp\":1735689600}");

		assert_eq!(expiry(&token), Some(macros::datetime!(2025-01-01 00:00 UTC)));
	}

	#[test]
	fn expiry_tolerates_padded_segments() {
		let header = URL_SAFE_NO_PAD.encode(b"{\"alg\":\"none\"}");
		let payload = base64::engine::general_purpose::URL_SAFE.encode(b"{\"exp\":1735689600}");
		let token = BearerToken::new(format!("{header}.{payload}."));

		assert_eq!(expiry(&token), Some(macros::datetime!(2025-01-01 00:00 UTC)));
	}

	#[test]
	fn undecodable_tokens_yield_none() {
		assert_eq!(expiry(&BearerToken::new("opaque-session-token")), None);
		assert_eq!(expiry(&BearerToken::new("a.!!!not-base64!!!.c")), None);

		let token = unsigned_token("{\"sub\":\"user-1\"}");

		assert_eq!(expiry(&token), None);
	}

	#[test]
	fn time_until_expiry_is_signed() {
		let token = unsigned_token("{\"exp\":1735689600}");
		let before = macros::datetime!(2024-12-31 23:00 UTC);
		let after = macros::datetime!(2025-01-01 01:00 UTC);

		assert_eq!(time_until_expiry(&token, before), Some(Duration::hours(1)));
		assert_eq!(time_until_expiry(&token, after), Some(Duration::hours(-1)));
	}
}
