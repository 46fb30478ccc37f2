use funil_core::config::NotifyConfig;
use funil_core::domain::deal::Deal;
use funil_core::domain::followup::FollowupStage;
use funil_core::errors::ApplicationError;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::info;

/// Outbound "send this follow-up" notification to the configured automation
/// webhook (the WhatsApp delivery pipeline lives behind it). The message body
/// is the stage's template rendered with deal context. No retries here:
/// failures surface to the caller as integration errors.
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
    secret: Option<SecretString>,
}

impl WebhookNotifier {
    pub fn from_config(config: &NotifyConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let webhook_url = config.webhook_url.clone()?;
        Some(Self { client: Client::new(), webhook_url, secret: config.webhook_secret.clone() })
    }

    /// Renders the stage's message template. Available variables: `name`
    /// (lead display name), `deal_id`, `deal_stage`, `followup`.
    pub fn render_message(
        stage: &FollowupStage,
        deal: &Deal,
        lead_name: &str,
    ) -> Result<String, ApplicationError> {
        let mut context = tera::Context::new();
        context.insert("name", lead_name);
        context.insert("deal_id", &deal.id.0);
        context.insert("deal_stage", deal.stage.as_str());
        context.insert("followup", &stage.title);

        tera::Tera::one_off(&stage.message_template, &context, false).map_err(|error| {
            ApplicationError::Integration(format!("message template render failed: {error}"))
        })
    }

    pub async fn send_followup(
        &self,
        deal: &Deal,
        stage: &FollowupStage,
        lead_name: &str,
    ) -> Result<String, ApplicationError> {
        let message = Self::render_message(stage, deal, lead_name)?;

        let mut request = self.client.post(&self.webhook_url).json(&json!({
            "deal_id": deal.id.0,
            "followup_stage_id": stage.id.0,
            "attach_pdf": stage.attach_pdf,
            "request_media": stage.request_media,
            "message": message,
        }));
        if let Some(secret) = &self.secret {
            request = request.bearer_auth(secret.expose_secret());
        }

        let response = request.send().await.map_err(|error| {
            ApplicationError::Integration(format!("webhook delivery failed: {error}"))
        })?;
        if !response.status().is_success() {
            return Err(ApplicationError::Integration(format!(
                "webhook returned status {}",
                response.status()
            )));
        }

        info!(
            event_name = "notify.followup_dispatched",
            deal_id = %deal.id.0,
            followup_stage_id = %stage.id.0,
            "follow-up notification dispatched"
        );
        Ok(message)
    }
}
