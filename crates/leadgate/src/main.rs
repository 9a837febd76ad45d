//! # Leadgate - Lead Capture API
//!
//! Backend for the landing page forms. Issues arithmetic captchas, sends
//! (simulated) SMS verification codes, and records leads.
//!
//! ## Flow
//! ```text
//! captcha/new → sms/send (phone + captcha) → sms/verify (phone + code) → lead
//!                    ↓                              ↓
//!              code store (SQLite/Redis)      lead store (SQLite)
//! ```

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, builder::FalseyValueParser};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod captcha;
mod config;
mod db;
mod leads;
mod otp;
mod routes;
mod sms;
mod state;
mod verification;

use config::AppConfig;
use state::AppState;

/// Leadgate - lead capture and phone verification API
#[derive(Parser, Debug)]
#[command(name = "leadgate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/leadgate.toml")]
    config: String,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Listen on 0.0.0.0:PORT (ignored when --listen is set)
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Redis URL (overrides config)
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// SQLite database path (overrides config)
    #[arg(long, env = "DB_PATH")]
    database_path: Option<String>,

    /// DEBUG ONLY: echo captcha answers and SMS codes in responses.
    /// `SMS_ECHO` is off for `0`, `false`, `no`, `off` or empty
    #[arg(long, env = "SMS_ECHO", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    sms_echo: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level, args.json_logs)?;

    info!("Starting Leadgate v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::load(&args.config, &args)?;
    info!(
        captcha = ?config.storage.captcha,
        otp = ?config.storage.otp,
        leads = ?config.storage.leads,
        "Configuration loaded"
    );
    if config.sms_echo {
        warn!("SMS echo mode is ON: captcha answers and codes are returned to clients");
    }

    // Open stores and wire services
    let state = AppState::new(config.clone()).await?;

    // Build router
    let app = routes::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("Leadgate listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Leadgate shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
            .context("Failed to initialize logging")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init()
            .context("Failed to initialize logging")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sms_echo_flag_and_env() {
        let args = Args::try_parse_from(["leadgate", "--sms-echo"]).unwrap();
        assert!(args.sms_echo);

        // SAFETY: only this test writes SMS_ECHO; other Args parses pass
        // --sms-echo explicitly when they assert on it
        unsafe { std::env::set_var("SMS_ECHO", "1") };
        let enabled = Args::try_parse_from(["leadgate"]).map(|args| args.sms_echo);
        unsafe { std::env::set_var("SMS_ECHO", "off") };
        let disabled = Args::try_parse_from(["leadgate"]).map(|args| args.sms_echo);
        unsafe { std::env::remove_var("SMS_ECHO") };

        assert!(enabled.unwrap());
        assert!(!disabled.unwrap());
    }
}
