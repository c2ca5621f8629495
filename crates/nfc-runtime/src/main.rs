//! # NFC Card Emulation Runtime
//!
//! Entry point: loads the stack configuration, starts the components and
//! runs until Ctrl+C.
//!
//! ## Usage
//!
//! ```text
//! nfc-runtime [CONFIG.json]
//! ```
//!
//! The config path may also come from `NFC_CONFIG`. Setting `NFC_DEMO_TAP`
//! to a hex command APDU replays one simulated reader tap after start-up.

use std::path::PathBuf;

use anyhow::{Context, Result};
use nfc_runtime::container::StackConfig;
use nfc_runtime::CardEmulationRuntime;
use nfc_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};
use tracing::{debug, info, warn};

fn config_path() -> Option<PathBuf> {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("NFC_CONFIG").map(PathBuf::from))
}

#[tokio::main]
async fn main() -> Result<()> {
    let path = config_path();
    let config = StackConfig::load(path.as_deref())
        .with_context(|| format!("Failed to load configuration from {path:?}"))?;

    let mut telemetry = TelemetryConfig::from_env();
    let level_from_env =
        std::env::var_os("NFC_LOG_LEVEL").is_some() || std::env::var_os("RUST_LOG").is_some();
    if let (false, Some(level)) = (level_from_env, config.log_level.as_deref()) {
        telemetry = telemetry.with_log_level(level);
    }
    let _telemetry = init_telemetry(telemetry).context("Failed to initialize telemetry")?;

    config.validate().context("Invalid configuration")?;

    let runtime = CardEmulationRuntime::start(config).await?;

    if let Ok(raw) = std::env::var("NFC_DEMO_TAP") {
        let apdu = hex::decode(raw.trim()).context("NFC_DEMO_TAP must be hex")?;
        info!(command = %hex::encode_upper(&apdu), "Replaying demo tap");
        runtime.simulate_tap(&[apdu])?;
    }

    info!("Runtime is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    match encode_metrics() {
        Ok(text) => debug!(metrics = %text, "Final metrics snapshot"),
        Err(e) => warn!(error = %e, "Could not encode metrics"),
    }
    Ok(())
}
