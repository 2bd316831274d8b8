use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, Message,
    SmtpTransport, Transport,
};
use tracing::info;

use crate::config::SmtpConfig;

/// Fire-and-forget invite delivery. No delivery confirmation is tracked;
/// the invite row is already committed by the time this runs.
#[async_trait]
pub trait InviteNotifier: Send + Sync {
    async fn send_invite(&self, email: &str, token: &str) -> Result<()>;
}

pub struct SmtpNotifier {
    mailer: SmtpTransport,
    sender: String,
    accept_base_url: String,
    invite_ttl_hours: i64,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig, public_base_url: &str, invite_ttl_hours: i64) -> Result<Self> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let mailer = SmtpTransport::relay(&config.host)
            .map_err(|err| anyhow!("Failed to configure SMTP relay: {err}"))?
            .credentials(creds)
            .port(config.port)
            .build();

        Ok(Self {
            mailer,
            sender: config.sender.clone(),
            accept_base_url: format!("{public_base_url}/accept-invite"),
            invite_ttl_hours,
        })
    }
}

#[async_trait]
impl InviteNotifier for SmtpNotifier {
    async fn send_invite(&self, email: &str, token: &str) -> Result<()> {
        let invite_link = format!("{}?token={}", self.accept_base_url, token);
        let body = format!(
            "Hello,\n\nYou've been invited to join your team's recruiting workspace.\n\n\
             Accept your invite here: {invite_link}\n\n\
             This invite expires in {} hours.\n",
            self.invite_ttl_hours
        );

        let message = Message::builder()
            .from(self
                .sender
                .parse()
                .map_err(|err| anyhow!("Invalid sender address: {err}"))?)
            .to(email
                .parse()
                .map_err(|err| anyhow!("Invalid recipient address: {err}"))?)
            .subject("You're invited to join your team")
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|err| anyhow!("Failed to build invite email: {err}"))?;

        // SmtpTransport::send blocks; keep it off the async runtime.
        let mailer = self.mailer.clone();
        tokio::task::spawn_blocking(move || mailer.send(&message))
            .await
            .map_err(|err| anyhow!("Invite email task failed: {err}"))?
            .map_err(|err| anyhow!("Failed to send invite email: {err}"))?;

        info!(to = %email, "Invite email sent");
        Ok(())
    }
}

/// Used when no SMTP relay is configured. Invites are still created and the
/// token is returned to the caller.
pub struct NoopNotifier;

#[async_trait]
impl InviteNotifier for NoopNotifier {
    async fn send_invite(&self, _email: &str, _token: &str) -> Result<()> {
        Ok(())
    }
}
