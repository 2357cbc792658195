use serde_json::json;
use tracing::{info, warn};

/// Outbound notification dispatch. Actual mail transport is an external
/// collaborator: the log mode records the request and the webhook mode
/// hands it off to a bridge service over HTTP.
#[derive(Clone)]
pub enum Notifier {
    Log,
    Webhook { client: reqwest::Client, url: String },
}

impl Notifier {
    pub fn from_webhook(url: Option<String>) -> Self {
        match url {
            Some(url) => Self::Webhook {
                client: reqwest::Client::new(),
                url,
            },
            None => Self::Log,
        }
    }

    pub async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        match self {
            Self::Log => {
                info!(to, subject, "notification: {}", body);
                Ok(())
            }
            Self::Webhook { client, url } => {
                client
                    .post(url)
                    .json(&json!({ "to": to, "subject": subject, "body": body }))
                    .send()
                    .await?
                    .error_for_status()?;
                Ok(())
            }
        }
    }
}

/// Fire-and-forget dispatch: a failed send is logged and never converts
/// the operation that triggered it into a failure.
pub fn dispatch(notifier: &Notifier, to: &str, subject: &str, body: &str) {
    let notifier = notifier.clone();
    let (to, subject, body) = (to.to_string(), subject.to_string(), body.to_string());
    tokio::spawn(async move {
        if let Err(e) = notifier.send(&to, &subject, &body).await {
            warn!("notification to {} failed: {:#}", to, e);
        }
    });
}
