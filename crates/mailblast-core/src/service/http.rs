//! HTTP client for the remote campaign service

use super::{
    ApiEnvelope, CampaignService, DispatchRequest, DispatchResponse, FileUpload, SmtpConfig,
};
use async_trait::async_trait;
use mailblast_common::config::ServiceConfig;
use mailblast_common::types::{
    ConnectionCheck, Created, Diagnosis, HealthStatus, ImportedRecipients, NamedSenderProfile,
    NamedTemplate, NewSenderProfile, NewTemplate, UploadedAttachment,
};
use mailblast_common::{Error, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Campaign service reached over HTTP/JSON
pub struct HttpCampaignService {
    config: ServiceConfig,
    client: Client,
}

#[derive(Serialize)]
struct SmtpConfigBody<'a> {
    smtp_config: &'a SmtpConfig,
}

impl HttpCampaignService {
    /// Create a new client. A `timeout_secs` of 0 leaves requests unbounded.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }

        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> Result<Response> {
        debug!(endpoint = %path, "Calling campaign service");

        let response = request.send().await.map_err(|e| {
            warn!(endpoint = %path, "Campaign service request failed: {}", e);
            Error::Transport(format!("{} request failed: {}", path, e))
        })?;

        if response.status().is_success() {
            return Ok(response);
        }

        // Error statuses may still carry an envelope with a usable message.
        let status = response.status();
        let body = response.bytes().await.unwrap_or_default();
        match serde_json::from_slice::<ApiEnvelope<serde_json::Value>>(&body) {
            Ok(envelope) if !envelope.success => {
                warn!(
                    endpoint = %path,
                    %status,
                    "Campaign service rejected request: {}",
                    envelope.message
                );
                Err(Error::RemoteRejection {
                    message: envelope.message,
                    hint: envelope.hint,
                })
            }
            _ => {
                warn!(endpoint = %path, %status, "Campaign service returned error status");
                Err(Error::Transport(format!("{} returned status {}", path, status)))
            }
        }
    }

    async fn envelope<T: DeserializeOwned>(
        &self,
        path: &str,
        request: RequestBuilder,
    ) -> Result<ApiEnvelope<T>> {
        let response = self.send(path, request).await?;

        let envelope: ApiEnvelope<T> = response.json().await.map_err(|e| {
            warn!(endpoint = %path, "Failed to parse campaign service response: {}", e);
            Error::Transport(format!("Failed to parse {} response: {}", path, e))
        })?;

        if !envelope.success {
            warn!(endpoint = %path, "Campaign service rejected request: {}", envelope.message);
        }
        Ok(envelope)
    }

    async fn call<T: DeserializeOwned>(&self, path: &str, request: RequestBuilder) -> Result<T> {
        self.envelope(path, request).await?.into_required(path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.config.endpoint(path))
    }

    fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> RequestBuilder {
        self.client.post(self.config.endpoint(path)).json(body)
    }

    fn post_file(&self, path: &str, file: FileUpload) -> RequestBuilder {
        let part = Part::bytes(file.bytes).file_name(file.filename);
        let form = Form::new().part("file", part);
        self.client.post(self.config.endpoint(path)).multipart(form)
    }

    fn delete(&self, path: &str) -> RequestBuilder {
        self.client.delete(self.config.endpoint(path))
    }
}

#[async_trait]
impl CampaignService for HttpCampaignService {
    async fn health(&self) -> Result<HealthStatus> {
        let path = "/health";
        let response = self.send(path, self.get(path)).await?;
        response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Failed to parse {} response: {}", path, e)))
    }

    async fn test_connection(&self, smtp: &SmtpConfig) -> Result<ConnectionCheck> {
        let path = "/test-connection";
        let envelope: ApiEnvelope<serde_json::Value> = self
            .envelope(path, self.post_json(path, &SmtpConfigBody { smtp_config: smtp }))
            .await?;

        Ok(ConnectionCheck {
            ok: envelope.success,
            message: envelope.message,
            hint: envelope.hint,
        })
    }

    async fn diagnose(&self, smtp: &SmtpConfig) -> Result<Diagnosis> {
        let path = "/diagnose";
        self.call(path, self.post_json(path, &SmtpConfigBody { smtp_config: smtp }))
            .await
    }

    async fn parse_import(&self, file: FileUpload) -> Result<ImportedRecipients> {
        let path = "/parse-excel";
        self.call(path, self.post_file(path, file)).await
    }

    async fn download_import_template(&self) -> Result<Vec<u8>> {
        let path = "/download-template";
        let response = self.send(path, self.get(path)).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("Failed to read {} response: {}", path, e)))?;
        Ok(bytes.to_vec())
    }

    async fn upload_attachment(&self, file: FileUpload) -> Result<UploadedAttachment> {
        let path = "/upload-attachment";
        self.call(path, self.post_file(path, file)).await
    }

    async fn list_templates(&self) -> Result<Vec<NamedTemplate>> {
        let path = "/templates";
        let envelope = self.envelope(path, self.get(path)).await?;
        Ok(envelope.into_data()?.unwrap_or_default())
    }

    async fn create_template(&self, template: &NewTemplate) -> Result<Created> {
        let path = "/templates";
        self.call(path, self.post_json(path, template)).await
    }

    async fn delete_template(&self, id: &str) -> Result<()> {
        let path = format!("/templates/{}", id);
        self.envelope::<serde_json::Value>(&path, self.delete(&path))
            .await?
            .into_data()?;
        Ok(())
    }

    async fn list_sender_profiles(&self) -> Result<Vec<NamedSenderProfile>> {
        let path = "/sender-configs";
        let envelope = self.envelope(path, self.get(path)).await?;
        Ok(envelope.into_data()?.unwrap_or_default())
    }

    async fn create_sender_profile(&self, profile: &NewSenderProfile) -> Result<Created> {
        let path = "/sender-configs";
        self.call(path, self.post_json(path, profile)).await
    }

    async fn delete_sender_profile(&self, id: &str) -> Result<()> {
        let path = format!("/sender-configs/{}", id);
        self.envelope::<serde_json::Value>(&path, self.delete(&path))
            .await?
            .into_data()?;
        Ok(())
    }

    async fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchResponse> {
        let path = "/send-emails";
        let envelope: ApiEnvelope<DispatchResponse> =
            self.envelope(path, self.post_json(path, request)).await?;

        let message = envelope.message.clone();
        let mut response = envelope.into_required(path)?;
        if response.message.is_empty() {
            response.message = message;
        }
        Ok(response)
    }
}
