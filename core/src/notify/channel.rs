use crate::error::CoreResult;
use crate::intake::model::ArtifactRef;
use ulid::Ulid;

/// Outbound patient messaging, e.g. a WhatsApp or SMS gateway client.
pub trait NotificationChannel {
    fn name(&self) -> &str;
    fn send(&self, body: &str, attachments: &[ArtifactRef]) -> CoreResult<String>;
}

/// Stand-in channel that only logs what would have been sent.
#[derive(Debug, Clone)]
pub struct LoggingChannel {
    name: String,
}

impl LoggingChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl NotificationChannel for LoggingChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, body: &str, attachments: &[ArtifactRef]) -> CoreResult<String> {
        let delivery_id = format!("d_{}", Ulid::new());
        tracing::info!(
            channel = %self.name,
            delivery_id = %delivery_id,
            body_chars = body.chars().count(),
            attachments = ?attachments.iter().map(|a| a.artifact_id.as_str()).collect::<Vec<_>>(),
            "patient message handed to channel"
        );
        Ok(delivery_id)
    }
}
