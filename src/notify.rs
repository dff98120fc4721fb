/// Completion notification.
///
/// The message is rendered from the configured template and handed to a
/// `Notifier`. Delivery failures are the caller's to log; they never fail a
/// pipeline run.

use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::config::NotificationConfig;
use crate::error::NotifyError;
use crate::logging::{self, Stage};

pub const EXECUTION_DATE_PLACEHOLDER: &str = "{execution_date}";
pub const EXECUTION_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Build the completion message for a run that finished at `completed_at`.
pub fn render_notification(
    config: &NotificationConfig,
    completed_at: DateTime<Local>,
) -> Notification {
    let execution_date = completed_at.format(EXECUTION_DATE_FORMAT).to_string();
    Notification {
        to: config.recipients.clone(),
        subject: config.subject.clone(),
        body: config.body_template.replace(EXECUTION_DATE_PLACEHOLDER, &execution_date),
    }
}

pub trait Notifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// POSTs the notification as JSON to a relay (mail gateway, chat hook, ...).
pub struct WebhookNotifier {
    http: reqwest::blocking::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let http = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

impl Notifier for WebhookNotifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self.http.post(&self.url).json(notification).send()?;
        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status().as_u16()));
        }
        logging::info(
            Stage::Notify,
            None,
            &format!("Notification sent to {} recipients", notification.to.len()),
        );
        Ok(())
    }
}

/// Used when no webhook is configured: the message goes to the log only.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        logging::info(
            Stage::Notify,
            None,
            &format!(
                "{} (to: {}): {}",
                notification.subject,
                notification.to.join(", "),
                notification.body
            ),
        );
        Ok(())
    }
}

/// Pick the notifier the configuration asks for.
pub fn notifier_from_config(
    config: &NotificationConfig,
    timeout: Duration,
) -> Result<Box<dyn Notifier>, NotifyError> {
    match config.webhook_url.as_deref().filter(|url| !url.trim().is_empty()) {
        Some(url) => Ok(Box::new(WebhookNotifier::new(url, timeout)?)),
        None => Ok(Box::new(LogNotifier)),
    }
}
