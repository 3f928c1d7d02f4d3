//! Transport abstraction.
//!
//! The request loop needs one capability from the network: GET a URL and
//! return the body, or a classified [`FetchError`].
//!
//! # Example
//!
//! ```rust
//! use bdl_api_client::auth::Identity;
//! use bdl_api_client::error::FetchError;
//! use bdl_api_client::fetch::Fetcher;
//!
//! struct Canned;
//!
//! impl Fetcher for Canned {
//!     async fn fetch(&self, _url: &str, _identity: &Identity) -> Result<String, FetchError> {
//!         Ok(r#"{"results":[]}"#.to_string())
//!     }
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::auth::Identity;
use crate::error::FetchError;

/// Something that can GET a URL on behalf of an identity.
///
/// Implementations must classify failures: HTTP 429 as
/// [`FetchError::Throttled`], everything else as another variant. The caller
/// retries only throttled fetches.
pub trait Fetcher: Send + Sync {
    /// Fetch the body of `url` as text.
    fn fetch(
        &self,
        url: &str,
        identity: &Identity,
    ) -> impl Future<Output = Result<String, FetchError>> + Send;
}

impl<F: Fetcher> Fetcher for Arc<F> {
    fn fetch(
        &self,
        url: &str,
        identity: &Identity,
    ) -> impl Future<Output = Result<String, FetchError>> + Send {
        (**self).fetch(url, identity)
    }
}
