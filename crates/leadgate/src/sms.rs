//! Outbound SMS delivery.
//!
//! No carrier is wired up: [`LogSmsSender`] writes the message to the log.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Duration;
use leadgate_common::Phone;

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_code(&self, phone: &Phone, code: &str, valid_for: Duration) -> Result<()>;
}

/// Simulated delivery through `tracing`
#[derive(Debug, Default)]
pub struct LogSmsSender;

#[async_trait]
impl SmsSender for LogSmsSender {
    async fn send_code(&self, phone: &Phone, code: &str, valid_for: Duration) -> Result<()> {
        tracing::info!(
            target: "leadgate::sms",
            phone = %phone.masked(),
            code = %code,
            valid_for_mins = valid_for.num_minutes(),
            "[SMS] verification code sent (simulated)"
        );
        Ok(())
    }
}
