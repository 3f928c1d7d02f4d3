//! Caller identity.
//!
//! BDL accepts anonymous requests and requests carrying a registered client id
//! in the `X-ClientId` header. The two tiers have different quotas.

mod credentials;

pub use credentials::{ANONYMOUS_KEY, API_KEY_ENV_VAR, ApiKey, Identity};
