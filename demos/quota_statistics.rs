//! Example: Inspecting and consuming quota without the network.
//!
//! Run with: cargo run --example quota_statistics

use std::sync::Arc;

use bdl_api_client::Identity;
use bdl_api_client::rate_limit::{AdmissionGate, RateLimitConfig, SystemClock};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::temp_dir().join("bdl_quota_demo.json");
    let gate =
        AdmissionGate::load(&path, RateLimitConfig::default(), Arc::new(SystemClock::new())).await?;
    let anonymous = Identity::Anonymous;
    let registered = Identity::from_api_key(Some("demo-client-id"));

    println!("Anonymous:  {}", gate.statistics(&anonymous).await);
    println!("Registered: {}", gate.statistics(&registered).await);

    // The sixth anonymous acquire waits for the one-second window to roll.
    for i in 1..=6 {
        let permit = gate.acquire(&anonymous).await;
        println!("Acquire #{}: granted = {}", i, permit.is_granted());
        permit.release();
    }

    println!("Anonymous:  {}", gate.statistics(&anonymous).await);

    gate.save_state().await;
    println!("Ledger saved to {}", path.display());
    Ok(())
}
