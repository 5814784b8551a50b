//! Serialized REST access layer: a FIFO, single-flight request queue paired with a bearer
//! credential manager that renews tokens before they expire.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod error;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod queue;
pub mod request;
pub mod rest;

pub use rest::{NO_BODY, Rest, RestBuilder};

mod _prelude {
	pub use std::{
		collections::VecDeque,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::{Arc, Weak},
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use oauth2::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use serde_json::Value as JsonValue;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2::http as http_types;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
