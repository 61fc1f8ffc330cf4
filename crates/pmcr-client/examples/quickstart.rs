//! Quick Start Example
//!
//! Runs one cycle against a local node (`cargo run -p pmcr-node`).

use pmcr_client::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let client = PmcrClient::connect("http://localhost:3000").await?;

    let intent = Intent::builder()
        .content("Create a Python function to calculate Fibonacci numbers")
        .language("python")
        .build()?;

    println!("🚀 Running cycle for intent {}...", intent.id);
    let result = client.run_cycle(&intent).await?;

    for record in &result.trace {
        println!(
            "🔁 Iteration {}: valid={} confidence={:.1} → {}",
            record.iteration,
            record.validation.is_valid,
            record.validation.confidence_score,
            record.reflection.insight
        );
    }

    match (&result.status, &result.artifact) {
        (CycleStatus::Converged, Some(artifact)) => {
            println!("✅ Converged after {} iterations:\n{}", result.iterations, artifact.content);
        }
        (status, _) => {
            println!("❌ Cycle ended {:?}: {:?}", status, result.error);
        }
    }

    Ok(())
}
