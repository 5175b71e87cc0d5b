// src/notify/mail.rs

//! Mail notification channel.
//!
//! Composes one message summarizing all new records and submits it over
//! SMTP — STARTTLS when configured, authenticated when credentials are
//! present, anonymous otherwise.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::MailConfig;
use crate::models::Violation;
use crate::notify::{NotificationChannel, NotifyError};

const SUBJECT: &str = "Nouvelles contraventions détectées";
const FALLBACK_SENDER: &str = "vigie@localhost";

/// Compose the notification body: an intro line with the count, then one
/// block per record.
pub fn compose_body(new_records: &[Violation]) -> String {
    let mut body = format!(
        "Bonjour,\n\n{} nouvelle(s) contravention(s) ont été détectée(s) depuis la dernière mise à jour :\n\n",
        new_records.len()
    );
    for v in new_records {
        body.push_str(&format!(
            "- Établissement: {}\n  Date: {}\n  Description: {}\n  Adresse: {}\n\n",
            v.etablissement, v.date, v.description, v.adresse
        ));
    }
    body
}

/// SMTP-backed mail channel.
pub struct MailChannel {
    config: MailConfig,
}

impl MailChannel {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotifyError> {
        let mut builder = if self.config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
                .map_err(|e| NotifyError::Transport(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.host)
        };
        builder = builder.port(self.config.port);

        // Anonymous submission is allowed when no credentials are set.
        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }

    fn build_message(&self, new_records: &[Violation]) -> Result<Message, NotifyError> {
        let recipient: Mailbox = self
            .config
            .recipient
            .parse()
            .map_err(|_| NotifyError::ConfigIncomplete("mail.recipient is not a valid address"))?;
        let sender: Mailbox = self
            .config
            .username
            .as_deref()
            .unwrap_or(FALLBACK_SENDER)
            .parse()
            .map_err(|_| NotifyError::ConfigIncomplete("sender address is not valid"))?;

        Message::builder()
            .from(sender)
            .to(recipient)
            .subject(SUBJECT)
            .body(compose_body(new_records))
            .map_err(|e| NotifyError::Transport(e.to_string()))
    }
}

#[async_trait]
impl NotificationChannel for MailChannel {
    fn name(&self) -> &'static str {
        "mail"
    }

    async fn notify(&self, new_records: &[Violation]) -> Result<(), NotifyError> {
        if self.config.recipient.trim().is_empty() {
            return Err(NotifyError::ConfigIncomplete("mail.recipient is not set"));
        }
        if self.config.host.trim().is_empty() {
            return Err(NotifyError::ConfigIncomplete("mail.host is not set"));
        }

        let message = self.build_message(new_records)?;
        let transport = self.build_transport()?;

        log::debug!(
            "Submitting mail to {} via {}:{}",
            self.config.recipient,
            self.config.host,
            self.config.port
        );
        match transport.send(message).await {
            Ok(response) => {
                log::debug!("SMTP accepted with code {}", response.code());
                Ok(())
            }
            // Permanent rejections at submission are credential problems in
            // practice (535 and friends); transient ones are transport.
            Err(e) if e.is_permanent() => Err(NotifyError::Auth(e.to_string())),
            Err(e) => Err(NotifyError::Transport(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_violation(id: &str, etablissement: &str) -> Violation {
        Violation {
            id_poursuite: id.to_string(),
            business_id: "57".to_string(),
            date: "2024-03-14".to_string(),
            description: "Insalubrite".to_string(),
            adresse: "123 Rue Exemple".to_string(),
            date_jugement: "2024-06-01".to_string(),
            etablissement: etablissement.to_string(),
            montant: "500".to_string(),
            proprietaire: "PROPRIO INC.".to_string(),
            ville: "Montréal".to_string(),
            statut: "Fermé".to_string(),
            date_statut: "2024-06-15".to_string(),
            categorie: "Restaurant".to_string(),
        }
    }

    #[test]
    fn body_contains_one_block_per_record() {
        let records = vec![
            make_violation("1", "CHEZ MOMO"),
            make_violation("2", "AUTRE RESTO"),
        ];
        let body = compose_body(&records);

        assert!(body.starts_with("Bonjour,\n\n2 nouvelle(s)"));
        assert_eq!(body.matches("- Établissement:").count(), 2);
        assert!(body.contains("CHEZ MOMO"));
        assert!(body.contains("AUTRE RESTO"));
        assert!(body.contains("Date: 2024-03-14"));
        assert!(body.contains("Adresse: 123 Rue Exemple"));
    }

    #[tokio::test]
    async fn incomplete_recipient_is_config_incomplete() {
        let channel = MailChannel::new(MailConfig {
            recipient: String::new(),
            host: "smtp.example.org".into(),
            port: 587,
            use_tls: false,
            username: None,
            password: None,
        });

        let err = channel.notify(&[make_violation("1", "X")]).await.unwrap_err();
        assert!(matches!(err, NotifyError::ConfigIncomplete(_)));
    }

    #[tokio::test]
    async fn unparseable_recipient_is_config_incomplete() {
        let channel = MailChannel::new(MailConfig {
            recipient: "not an address".into(),
            host: "smtp.example.org".into(),
            port: 587,
            use_tls: false,
            username: None,
            password: None,
        });

        let err = channel.notify(&[make_violation("1", "X")]).await.unwrap_err();
        assert!(matches!(err, NotifyError::ConfigIncomplete(_)));
    }
}
