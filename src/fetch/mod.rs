//! Fetching response bodies from BDL.
//!
//! The [`Fetcher`] trait is the only network capability the rest of the crate
//! relies on; [`HttpFetcher`] is the default implementation.

mod endpoints;
mod http;
mod traits;

pub use endpoints::*;
pub use http::{DEFAULT_TIMEOUT, HttpFetcher, HttpFetcherBuilder};
pub use traits::Fetcher;
