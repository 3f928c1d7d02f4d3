//! Example: Working with BdlError and FetchError.
//!
//! Run with: cargo run --example error_handling

use bdl_api_client::{BdlError, FetchError};

fn describe(err: &BdlError) -> &'static str {
    match err {
        BdlError::RetriesExhausted { .. } => "quota or upstream throttling; try again later",
        BdlError::Transport(FetchError::Status { status: 404, .. }) => "no such resource",
        BdlError::Transport(e) if e.is_throttled() => "throttled",
        BdlError::Transport(_) => "network or server failure",
        BdlError::InvalidResponse(_) | BdlError::Json(_) => "unexpected response body",
        BdlError::Io(_) => "local file system problem",
        BdlError::Url(_) => "bad base URL",
    }
}

fn main() {
    let errors = [
        BdlError::RetriesExhausted { attempts: 3 },
        BdlError::Transport(FetchError::Status {
            status: 404,
            body: "Not Found".to_string(),
        }),
        BdlError::Transport(FetchError::Status {
            status: 503,
            body: "Service Unavailable".to_string(),
        }),
        BdlError::InvalidResponse("missing results".to_string()),
    ];

    for err in &errors {
        println!("{}", err);
        println!("  -> {}", describe(err));
        println!("  retries exhausted: {}", err.is_retries_exhausted());
    }
}
