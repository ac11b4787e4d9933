//! Mail delivery of the finished PDF over authenticated STARTTLS SMTP.

use crate::config::DeliveryConfig;
use crate::error::Arxiv2KindleError;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::Path;
use tracing::{debug, info};

fn parse_mailbox(address: &str) -> Result<Mailbox, Arxiv2KindleError> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|e| Arxiv2KindleError::InvalidAddress {
            address: address.to_string(),
            detail: e.to_string(),
        })
}

/// Build a message with `pdf` attached as `attachment_name`.
///
/// Sender and recipient come from `config`; the subject is the paper title.
pub fn build_message(
    pdf: Vec<u8>,
    attachment_name: &str,
    subject: &str,
    config: &DeliveryConfig,
) -> Result<Message, Arxiv2KindleError> {
    let from = parse_mailbox(&config.sender)?;
    let to = parse_mailbox(&config.recipient)?;
    let content_type = ContentType::parse("application/pdf")
        .map_err(|e| Arxiv2KindleError::Internal(format!("content type: {e}")))?;
    let attachment = Attachment::new(attachment_name.to_string()).body(pdf, content_type);

    Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .multipart(MultiPart::mixed().singlepart(attachment))
        .map_err(|e| Arxiv2KindleError::Delivery(e.to_string()))
}

/// Read `pdf` and send it to the configured recipient.
pub async fn send_pdf(
    pdf: &Path,
    attachment_name: &str,
    subject: &str,
    config: &DeliveryConfig,
) -> Result<(), Arxiv2KindleError> {
    let bytes = tokio::fs::read(pdf)
        .await
        .map_err(Arxiv2KindleError::source_io(pdf))?;
    let message = build_message(bytes, attachment_name, subject, config)?;

    let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        .map_err(|e| Arxiv2KindleError::Delivery(format!("{}: {e}", config.smtp_host)))?
        .port(config.smtp_port)
        .credentials(Credentials::new(config.sender.clone(), config.password.clone()))
        .build();

    debug!("Connecting to {}:{}", config.smtp_host, config.smtp_port);
    let response = transport
        .send(message)
        .await
        .map_err(|e| Arxiv2KindleError::Delivery(e.to_string()))?;
    info!(
        "Sent {} to {} (SMTP {})",
        attachment_name,
        config.recipient,
        response.code()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DeliveryConfig {
        DeliveryConfig::new("me@gmail.com", "me@kindle.com", "secret")
    }

    #[test]
    fn message_carries_pdf_attachment() {
        let message = build_message(
            b"%PDF-1.5 fake".to_vec(),
            "1706.03762_Attention.pdf",
            "Attention Is All You Need",
            &config(),
        )
        .unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).into_owned();

        assert!(raw.contains("Subject: Attention Is All You Need"), "{raw}");
        assert!(raw.contains("To: me@kindle.com"), "{raw}");
        assert!(raw.contains("application/pdf"), "{raw}");
        assert!(raw.contains("attachment"), "{raw}");
        assert!(raw.contains("1706.03762_Attention.pdf"), "{raw}");
    }

    #[test]
    fn bad_recipient_is_rejected() {
        let cfg = DeliveryConfig::new("me@gmail.com", "not-an-address", "secret");
        let err = build_message(Vec::new(), "a.pdf", "t", &cfg).unwrap_err();
        match err {
            Arxiv2KindleError::InvalidAddress { address, .. } => assert_eq!(address, "not-an-address"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_pdf_fails_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let err = send_pdf(&dir.path().join("nope.pdf"), "a.pdf", "t", &config())
            .await
            .unwrap_err();
        assert!(matches!(err, Arxiv2KindleError::SourceIo { .. }), "{err}");
    }
}
