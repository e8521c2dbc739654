//! HTTP backend for the game service.
//!
//! [`HttpGameApi`] implements [`client_api_core::GameApi`] over the service's
//! JSON endpoints. Wire payloads live in [`wire`] and are converted into the
//! domain types at the edge, so nothing outside this crate sees raw JSON.
//!
//! # Usage
//!
//! ```ignore
//! use client_api_http::{HttpApiConfig, HttpGameApi};
//!
//! let config = HttpApiConfig::from_env()?;
//! let api = HttpGameApi::new(config)?;
//! let energy = api.get_energy(&address).await?;
//! ```

pub mod client;
pub mod config;
pub mod wire;

pub use client::HttpGameApi;
pub use config::{ConfigError, HttpApiConfig};
