//! Credential-injecting reverse proxy for Azure OpenAI: validates the routing query,
//! attaches a single-flight cached Entra ID bearer token, rewrites the request onto the
//! deployment's `chat/completions` endpoint, and relays the upstream response verbatim.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod auth;
pub mod config;
pub mod coordinator;
pub mod credential;
pub mod error;
pub mod http;
pub mod obs;
pub mod proxy;
pub mod server;

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::OnceCell;
	pub use bytes::Bytes;
	pub use parking_lot::Mutex;
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
