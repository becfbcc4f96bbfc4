//! Wire-format normalization for refresh endpoint responses.
//!
//! The API answers with either snake_case or camelCase field names depending on
//! the deployment generation. Normalization happens here, at the boundary, so the
//! coordinator itself stays agnostic of the wire variants.

// self
use crate::{_prelude::*, error::TransientError, token::BearerToken};

/// Normalized outcome of a successful refresh exchange.
#[derive(Clone, Debug)]
pub(crate) struct TokenRotation {
	pub access: BearerToken,
	pub refresh: Option<BearerToken>,
}

#[derive(Debug, Deserialize)]
struct RefreshGrant {
	#[serde(default, alias = "accessToken")]
	access_token: Option<String>,
	#[serde(default, alias = "refreshToken")]
	refresh_token: Option<String>,
}

/// Parses a refresh response body into a [`TokenRotation`].
///
/// A body without an access token is an upstream contract violation and maps to
/// [`TransientError::MissingAccessToken`]; nothing is persisted in that case.
pub(crate) fn parse_rotation(bytes: &[u8], status: u16) -> Result<TokenRotation, TransientError> {
	let mut deserializer = serde_json::Deserializer::from_slice(bytes);
	let grant: RefreshGrant = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| TransientError::RefreshResponseParse { source, status: Some(status) })?;
	let access =
		grant.access_token.map(BearerToken::new).ok_or(TransientError::MissingAccessToken)?;

	Ok(TokenRotation { access, refresh: grant.refresh_token.map(BearerToken::new) })
}
