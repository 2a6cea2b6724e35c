//! # Harness Check
//!
//! Runs the canonical scenarios against a fresh test session and prints the outcome of each.
//! Exits non-zero when any scenario does not pass.

use std::process;

use anyhow::Context;
use ephemeral_harness::config::ConfigManager;
use ephemeral_harness::logging::init_structured_logging;
use ephemeral_harness::scenarios::canonical_scenarios;
use ephemeral_harness::session::{ScenarioStatus, TestSession};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();
    println!("🧪 Ephemeral PostgreSQL Harness Check");

    let manager = ConfigManager::load().context("failed to load harness configuration")?;
    println!(
        "✅ Configuration loaded (environment: {}, directory: {})",
        manager.environment(),
        manager.config_directory().display()
    );
    println!("{}", serde_json::to_string_pretty(&manager.debug_config())?);

    let scenarios = canonical_scenarios();
    println!("\n🚀 Running {} scenarios", scenarios.len());

    let report = TestSession::run(manager.config(), &scenarios)
        .await
        .context("failed to start test session")?;

    for scenario in &report.scenarios {
        let icon = match scenario.status {
            ScenarioStatus::Passed => "✅",
            ScenarioStatus::Skipped => "⏭️",
            _ => "❌",
        };
        println!(
            "{icon} {} - {} ({} ms)",
            scenario.name,
            scenario.status,
            scenario.duration.as_millis()
        );
        if let Some(error) = scenario.status.error() {
            println!("   - {error}");
        }
        if let ScenarioStatus::Panicked(message) = &scenario.status {
            println!("   - panic: {message}");
        }
        if let Some(error) = &scenario.teardown_error {
            println!("   - teardown: {error}");
        }
    }

    if let Some(error) = &report.fatal {
        println!("\n⚠️ Session aborted: {error}");
    }
    if let Some(error) = &report.shutdown_error {
        println!("\n⚠️ Shutdown failed: {error}");
    }

    println!("\n{}", report.summary());
    if !report.all_passed() {
        process::exit(1);
    }

    println!("\n🎉 All scenarios passed!");
    Ok(())
}
