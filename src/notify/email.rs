// src/notify/email.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::Notifier;
use crate::run::VideoResult;

/// `digest` sends one summary mail per run; `per_clip` sends one mail per
/// produced video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailMode {
    Digest,
    PerClip,
}

impl EmailMode {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "per_clip" => EmailMode::PerClip,
            _ => EmailMode::Digest,
        }
    }
}

pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    mode: EmailMode,
    always_email: bool,
}

impl EmailNotifier {
    pub fn new(
        host: &str,
        port: u16,
        user: &str,
        pass: &str,
        to_address: &str,
        mode: EmailMode,
        always_email: bool,
    ) -> Result<Self> {
        let creds = Credentials::new(user.to_string(), pass.to_string());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .with_context(|| format!("invalid SMTP host {host}"))?
            .port(port)
            .credentials(creds)
            .build();
        let from: Mailbox = user
            .parse()
            .with_context(|| format!("invalid sender address {user}"))?;
        let to: Mailbox = to_address
            .parse()
            .with_context(|| format!("invalid recipient address {to_address}"))?;
        Ok(Self {
            mailer,
            from,
            to,
            mode,
            always_email,
        })
    }

    async fn send_email(&self, subject: String, body: String) -> Result<()> {
        let msg = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject.as_str())
            .header(header::ContentType::TEXT_PLAIN)
            .body(body)
            .context("build email")?;
        self.mailer.send(msg).await.context("send email")?;
        tracing::info!(subject = %subject, "email sent");
        Ok(())
    }

    async fn send_digest(&self, results: &[VideoResult]) -> Result<usize> {
        let now = Utc::now().format("%Y-%m-%d %H:%M UTC");
        let subject = format!("feedreel digest - {} new clip(s) - {}", results.len(), now);
        let mut lines: Vec<String> = vec![format!("feedreel run at {now}"), String::new()];
        if results.is_empty() {
            lines.push("No new clips were created in this run.".to_string());
            lines.push(String::new());
            if self.always_email {
                lines.push("ALWAYS_EMAIL=true forced this notification.".to_string());
                lines.push(String::new());
            }
        } else {
            for (idx, item) in results.iter().enumerate() {
                lines.push(format!("{}. {}", idx + 1, item.title));
                lines.push(format!("   Source: {}", item.source_name));
                lines.push(format!(
                    "   Published: {}",
                    display_or(&item.published, "unknown")
                ));
                lines.push(format!("   Link: {}", display_or(&item.source_link, "N/A")));
                lines.push(format!("   URL: {}", item.presigned_url));
                lines.push(String::new());
            }
        }
        self.send_email(subject, lines.join("\n")).await?;
        Ok(1)
    }

    async fn send_per_clip(&self, results: &[VideoResult]) -> Result<usize> {
        if results.is_empty() {
            if self.always_email {
                self.send_email(
                    "feedreel - no new clips".to_string(),
                    "No new clips were created in this run.".to_string(),
                )
                .await?;
                return Ok(1);
            }
            return Ok(0);
        }
        let mut count = 0usize;
        for item in results {
            let subject_title: String = item.title.chars().take(90).collect();
            let body = [
                format!("Title: {}", item.title),
                format!("Source: {}", item.source_name),
                format!("Published: {}", display_or(&item.published, "unknown")),
                format!("Link: {}", display_or(&item.source_link, "N/A")),
                format!("URL: {}", item.presigned_url),
            ]
            .join("\n");
            self.send_email(format!("feedreel clip: {subject_title}"), body)
                .await?;
            count += 1;
        }
        Ok(count)
    }
}

fn display_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, results: &[VideoResult]) -> Result<usize> {
        if results.is_empty() && !self.always_email {
            tracing::info!("no clips created; email suppressed (ALWAYS_EMAIL=false)");
            return Ok(0);
        }
        match self.mode {
            EmailMode::Digest => self.send_digest(results).await,
            EmailMode::PerClip => self.send_per_clip(results).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parsing_defaults_to_digest() {
        assert_eq!(EmailMode::parse("per_clip"), EmailMode::PerClip);
        assert_eq!(EmailMode::parse("Digest"), EmailMode::Digest);
        assert_eq!(EmailMode::parse("whatever"), EmailMode::Digest);
    }
}
