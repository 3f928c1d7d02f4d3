//! Example: Browsing territorial units and collecting data rows.
//!
//! Uses `BDL_API_KEY` from the environment (or `.env`) when set, otherwise
//! anonymous access. Pass a variable list file to also collect data:
//!
//! Run with: cargo run --example fetch_units -- variables.txt

use bdl_api_client::BdlClient;
use bdl_api_client::types::{default_years, parse_variables};
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenv::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let client = BdlClient::builder().api_key_from_env().build_http().await?;
    println!("Registered: {}", client.identity().is_registered());

    // Walk one branch of the hierarchy: country -> voivodeship -> powiat.
    println!("=== Top level ===");
    let top = client.get_units(None, None).await?;
    for unit in &top {
        println!("{}", unit.label());
    }

    let Some(country) = top.first() else {
        return Ok(());
    };
    println!("\n=== Voivodeships ===");
    let voivodeships = client.get_unit_children(country).await?;
    for unit in &voivodeships {
        println!("{}", unit.label());
    }

    let Some(voivodeship) = voivodeships.first() else {
        return Ok(());
    };
    println!("\n=== Powiaty of {} ===", voivodeship.name);
    let powiaty = client.get_unit_children(voivodeship).await?;
    for unit in &powiaty {
        println!("{}", unit.label());
    }

    if let Some(path) = std::env::args().nth(1) {
        let variables = parse_variables(&std::fs::read_to_string(path)?);
        let years = default_years(OffsetDateTime::now_utc().year());
        let units: Vec<_> = powiaty.into_iter().take(3).collect();

        println!("\n=== Data ===");
        let rows = client.collect_rows(&variables, &units, &years).await?;
        for (var_id, rows) in &rows {
            println!("-- {} --", var_id);
            for row in rows {
                let value = row
                    .value
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "n/d".to_string());
                println!("{} | {} | {} | {}", row.variable_name, row.unit_name, row.year, value);
            }
        }
    }

    println!("\n{}", client.statistics().await);
    client.save_state().await;
    Ok(())
}
