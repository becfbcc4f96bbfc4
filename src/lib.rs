//! Client-side session-token keeper: durable credential storage, single-flight refresh,
//! proactive expiry scheduling, and retry-once authenticated requests in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod bus;
pub mod error;
pub mod http;
pub mod obs;
pub mod refresh;
pub mod schedule;
pub mod session;
pub mod store;
pub mod token;

mod _prelude {
	pub use std::{
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		sync::{Arc, Weak},
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use httpmock as _;
