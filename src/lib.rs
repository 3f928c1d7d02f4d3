//! # BDL Client
//!
//! An async Rust client for the BDL ("Bank Danych Lokalnych") REST API of
//! Statistics Poland.
//!
//! ## Features
//!
//! - Admission control over every BDL window (1s, 15m, 12h, 7d) per identity
//! - Quota ledger persisted across restarts
//! - On-disk response cache keyed by request URL
//! - Bounded retry with backoff on HTTP 429
//! - Financial precision with `rust_decimal`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bdl_api_client::BdlClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = BdlClient::builder().api_key_from_env().build_http().await?;
//!
//!     let voivodeships = client.get_units(None, None).await?;
//!     println!("{} top-level units", voivodeships.len());
//!     println!("{}", client.statistics().await);
//!
//!     client.save_state().await;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cache;
pub mod client;
pub mod error;
pub mod fetch;
pub mod rate_limit;
pub mod types;

// Re-export commonly used types at crate root
pub use auth::Identity;
pub use client::{BdlClient, BdlClientBuilder};
pub use error::{BdlError, FetchError};
pub use fetch::Fetcher;

/// Result type alias using BdlError
pub type Result<T> = std::result::Result<T, BdlError>;
