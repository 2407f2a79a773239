//! Resend email API client implementing [`Notifier`].

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, instrument};

use compintel_shared::{
    CompintelError, EmailConfig, EmailMessage, Notifier, Result, resolve_api_key,
};

const USER_AGENT: &str = concat!("CompetitorIntel/", env!("CARGO_PKG_VERSION"));

pub struct ResendNotifier {
    client: Client,
    api_key: String,
    from: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<Attachment<'a>>,
}

#[derive(Debug, Serialize)]
struct Attachment<'a> {
    filename: &'a str,
    content: String,
    content_type: &'a str,
}

impl ResendNotifier {
    pub fn new(
        api_key: String,
        from: impl Into<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CompintelError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            from: from.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &EmailConfig, timeout: Duration) -> Result<Self> {
        let api_key = resolve_api_key(&config.api_key_env, "Resend")?;
        Self::new(api_key, config.from.clone(), &config.base_url, timeout)
    }
}

#[async_trait]
impl Notifier for ResendNotifier {
    #[instrument(skip_all, fields(to = %message.to, attachments = message.attachments.len()))]
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let request = SendRequest {
            from: &self.from,
            to: [message.to.as_str()],
            subject: &message.subject,
            html: &message.html,
            attachments: message
                .attachments
                .iter()
                .map(|a| Attachment {
                    filename: &a.filename,
                    content: STANDARD.encode(&a.content),
                    content_type: &a.content_type,
                })
                .collect(),
        };

        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CompintelError::Notify(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompintelError::Notify(format!("HTTP {status}: {body}")));
        }

        info!("report email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compintel_shared::EmailAttachment;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message() -> EmailMessage {
        EmailMessage {
            to: "founder@acme.test".into(),
            subject: "Competitor Intel: Acme vs 2 Competitors".into(),
            html: "<p>report</p>".into(),
            attachments: vec![EmailAttachment {
                filename: "competitor-intel-acme.html".into(),
                content_type: "text/html".into(),
                content: b"<html></html>".to_vec(),
            }],
        }
    }

    #[tokio::test]
    async fn send_encodes_attachments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("authorization", "Bearer re-test"))
            .and(body_partial_json(serde_json::json!({
                "from": "Competitor Intel <onboarding@resend.dev>",
                "to": ["founder@acme.test"],
                "subject": "Competitor Intel: Acme vs 2 Competitors",
                "attachments": [{
                    "filename": "competitor-intel-acme.html",
                    "content": "PGh0bWw+PC9odG1sPg=="
                }]
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "em_1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let notifier = ResendNotifier::new(
            "re-test".into(),
            "Competitor Intel <onboarding@resend.dev>",
            &server.uri(),
            Duration::from_secs(5),
        )
        .unwrap();
        notifier.send(&message()).await.unwrap();
    }

    #[tokio::test]
    async fn rejected_send_is_notify_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .respond_with(ResponseTemplate::new(422).set_body_string("invalid to"))
            .mount(&server)
            .await;

        let notifier = ResendNotifier::new(
            "re-test".into(),
            "x@y.test",
            &server.uri(),
            Duration::from_secs(5),
        )
        .unwrap();
        let err = notifier.send(&message()).await.unwrap_err();
        assert!(matches!(err, CompintelError::Notify(_)));
    }
}
