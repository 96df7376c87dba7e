//! SES delivery

use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_ses::Client;
use aws_sdk_ses::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_ses::types::{Body, Content, Destination, Message};
use keycycle_core::{NotificationSummary, Notifier, NotifyError, RunMode};

use crate::render::{render_html, render_text};
use crate::templates::TemplateStore;

const CHARSET: &str = "UTF-8";

/// Subject line for a summary
pub fn subject(summary: &NotificationSummary) -> String {
    match summary.mode {
        RunMode::Audit => format!("IAM Access Key Rotation Audit - {}", summary.account_name),
        RunMode::Enforce => format!("IAM Access Key Rotation Notice - {}", summary.account_name),
    }
}

/// Rendered message ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    /// Subject line
    pub subject: String,
    /// HTML body
    pub html: String,
    /// Plain-text body
    pub text: String,
}

/// Load and render the template for `summary`
pub async fn render_email(
    templates: &TemplateStore,
    template_id: &str,
    summary: &NotificationSummary,
) -> Result<RenderedEmail, NotifyError> {
    let template = templates.load(template_id).await?;
    let values = summary.template_values();
    Ok(RenderedEmail {
        subject: subject(summary),
        html: render_html(&template, &values),
        text: render_text(&template, &values),
    })
}

/// [`Notifier`] that sends rendered templates through SES
#[derive(Debug, Clone)]
pub struct SesNotifier {
    client: Client,
    sender: Option<String>,
    templates: TemplateStore,
}

impl SesNotifier {
    /// Notifier over an existing client
    pub fn new(client: Client, sender: Option<String>, templates: TemplateStore) -> Self {
        Self {
            client,
            sender,
            templates,
        }
    }

    /// Notifier using the ambient AWS configuration
    pub async fn from_env(sender: Option<String>, templates: TemplateStore) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self::from_config(&config, sender, templates)
    }

    /// Notifier from a loaded SDK config
    pub fn from_config(config: &SdkConfig, sender: Option<String>, templates: TemplateStore) -> Self {
        Self::new(Client::new(config), sender, templates)
    }

    fn message(email: RenderedEmail) -> Result<Message, NotifyError> {
        let content = |data: String| {
            Content::builder()
                .data(data)
                .charset(CHARSET)
                .build()
                .map_err(|e| NotifyError::InvalidMessage(e.to_string()))
        };
        let body = Body::builder()
            .html(content(email.html)?)
            .text(content(email.text)?)
            .build();
        Ok(Message::builder()
            .subject(content(email.subject)?)
            .body(body)
            .build())
    }
}

#[async_trait]
impl Notifier for SesNotifier {
    async fn notify(
        &self,
        template_id: &str,
        summary: &NotificationSummary,
    ) -> Result<(), NotifyError> {
        let sender = self
            .sender
            .as_deref()
            .ok_or_else(|| NotifyError::InvalidMessage("SENDER_EMAIL is not configured".into()))?;
        if summary.recipient.trim().is_empty() {
            return Err(NotifyError::InvalidMessage("recipient address is empty".into()));
        }

        let email = render_email(&self.templates, template_id, summary).await?;
        tracing::info!(
            recipient = %summary.recipient,
            subject = %email.subject,
            template_id,
            "Sending email"
        );

        let output = self
            .client
            .send_email()
            .source(sender)
            .destination(
                Destination::builder()
                    .to_addresses(summary.recipient.clone())
                    .build(),
            )
            .message(Self::message(email)?)
            .send()
            .await
            .map_err(|e| NotifyError::Delivery {
                code: e.code().map(str::to_string),
                message: e
                    .message()
                    .map_or_else(|| DisplayErrorContext(&e).to_string(), str::to_string),
            })?;

        tracing::info!(message_id = output.message_id(), "Email sent");
        Ok(())
    }
}
