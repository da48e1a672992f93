use std::time::Duration;

use reqwest::blocking::Client;

use crate::notification::domain::message_template::{MessageTemplate, NotificationEvent};
use crate::notification::domain::notification_channel::{
    ChannelError, ChannelKind, NotificationChannel,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// POSTs the rendered template as JSON.
pub struct HttpChannel {
    url: String,
    template: MessageTemplate,
    /// Build failure kept until the first send.
    client: Result<Client, String>,
}

impl HttpChannel {
    pub fn new(url: &str, template: &str) -> Self {
        Self {
            url: url.trim().to_string(),
            template: MessageTemplate::new(template),
            client: Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .map_err(|e| e.to_string()),
        }
    }
}

impl NotificationChannel for HttpChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Http
    }

    fn send(&self, event: &NotificationEvent) -> Result<(), ChannelError> {
        if self.url.is_empty() {
            return Err(ChannelError::Misconfigured("web service url is empty".into()));
        }
        let client = self
            .client
            .as_ref()
            .map_err(|e| ChannelError::ClientUnavailable(e.clone()))?;
        let body: serde_json::Value = serde_json::from_str(&self.template.render(event))?;
        let response = client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::Status(status.as_u16()));
        }
        log::debug!("Notification posted to {}", self.url);
        Ok(())
    }
}
