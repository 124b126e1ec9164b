//! # Mail Sender Seam
//!
//! The auth flows emit three logical mail events: *send verification*,
//! *send password reset*, and *password changed notice*. Rendering and
//! transport are a collaborator's concern; this module defines the seam
//! and a log-backed sender for development.
//!
//! ## Failure Policy
//!
//! Mail failures never fail the triggering request. The tokens are
//! already persisted, so the user can retry via resend; the orchestrator
//! logs the error and returns success. Callers therefore treat every
//! method here as best-effort.

use async_trait::async_trait;
use shared::config::MailConfig;
use shared::errors::ApiError;
use tracing::info;

// =============================================================================
// Trait
// =============================================================================

/// Outbound mail events emitted by the auth flows.
///
/// Production deployments wire a transport-backed implementation (SES,
/// SMTP relay, ...); development uses [`LogMailSender`], which diverts
/// every mail to the logs.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Asks for a verification mail carrying the lifecycle token.
    async fn send_verification_email(&self, to: &str, token: &str) -> Result<(), ApiError>;

    /// Asks for a password-reset mail carrying the lifecycle token.
    async fn send_password_reset_email(&self, to: &str, token: &str) -> Result<(), ApiError>;

    /// Notifies the account holder that their password changed.
    async fn send_password_changed_notice(&self, to: &str) -> Result<(), ApiError>;
}

// =============================================================================
// Log-backed sender
// =============================================================================

/// Development mail sender: writes the would-be mail to the logs.
///
/// Logs the action link (not the raw mail body) so a developer can click
/// through the flow locally without a mailbox.
pub struct LogMailSender {
    config: MailConfig,
}

impl LogMailSender {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    fn link(&self, path: &str, token: &str) -> String {
        format!("{}/{}?token={}", self.config.base_url.trim_end_matches('/'), path, token)
    }
}

#[async_trait]
impl MailSender for LogMailSender {
    async fn send_verification_email(&self, to: &str, token: &str) -> Result<(), ApiError> {
        info!(
            to = %to,
            from = %self.config.from_address,
            link = %self.link("verify-email", token),
            "Mail diverted to log: email verification"
        );
        Ok(())
    }

    async fn send_password_reset_email(&self, to: &str, token: &str) -> Result<(), ApiError> {
        info!(
            to = %to,
            from = %self.config.from_address,
            link = %self.link("reset-password", token),
            "Mail diverted to log: password reset"
        );
        Ok(())
    }

    async fn send_password_changed_notice(&self, to: &str) -> Result<(), ApiError> {
        info!(
            to = %to,
            from = %self.config.from_address,
            "Mail diverted to log: password changed notice"
        );
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> MailConfig {
        MailConfig {
            from_address: "no-reply@keystone.dev".to_string(),
            from_name: "Keystone".to_string(),
            base_url: "https://app.keystone.dev/".to_string(),
            region: None,
        }
    }

    #[test]
    fn test_link_handles_trailing_slash() {
        let sender = LogMailSender::new(test_config());
        assert_eq!(
            sender.link("verify-email", "tok123"),
            "https://app.keystone.dev/verify-email?token=tok123"
        );
    }

    #[actix_web::test]
    async fn test_log_sender_never_fails() {
        let sender = LogMailSender::new(test_config());
        assert!(sender.send_verification_email("a@b.c", "t").await.is_ok());
        assert!(sender.send_password_reset_email("a@b.c", "t").await.is_ok());
        assert!(sender.send_password_changed_notice("a@b.c").await.is_ok());
    }
}
