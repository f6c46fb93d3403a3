//! Remote campaign service
//!
//! The mail-dispatch, import and persistence services are reached through one
//! request/response interface. Every call answers with a uniform envelope
//! `{success, message, data?, hint?}`; a `success = false` envelope becomes
//! [`Error::RemoteRejection`] with the message and hint passed through verbatim.

mod http;

pub use http::HttpCampaignService;

use async_trait::async_trait;
use mailblast_common::types::{
    ConnectionCheck, Created, Credential, Diagnosis, HealthStatus, ImportedRecipients,
    NamedSenderProfile, NamedTemplate, NewSenderProfile, NewTemplate, Recipient, SendResult,
    SendSummary, SenderProfile, UploadedAttachment,
};
use mailblast_common::{Error, Result};
use serde::{Deserialize, Serialize, Serializer};
use std::path::Path;

/// Operations the campaign workflow needs from the remote services
#[async_trait]
pub trait CampaignService: Send + Sync {
    async fn health(&self) -> Result<HealthStatus>;

    /// Advisory connection test. A refused login is `Ok` with `ok = false`.
    async fn test_connection(&self, smtp: &SmtpConfig) -> Result<ConnectionCheck>;

    async fn diagnose(&self, smtp: &SmtpConfig) -> Result<Diagnosis>;

    /// Parse a spreadsheet into recipients
    async fn parse_import(&self, file: FileUpload) -> Result<ImportedRecipients>;

    /// Blank spreadsheet matching the import format
    async fn download_import_template(&self) -> Result<Vec<u8>>;

    async fn upload_attachment(&self, file: FileUpload) -> Result<UploadedAttachment>;

    async fn list_templates(&self) -> Result<Vec<NamedTemplate>>;

    async fn create_template(&self, template: &NewTemplate) -> Result<Created>;

    async fn delete_template(&self, id: &str) -> Result<()>;

    async fn list_sender_profiles(&self) -> Result<Vec<NamedSenderProfile>>;

    async fn create_sender_profile(&self, profile: &NewSenderProfile) -> Result<Created>;

    async fn delete_sender_profile(&self, id: &str) -> Result<()>;

    /// Submit one batch. The whole batch is a single remote call.
    async fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchResponse>;
}

/// Uniform response envelope
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    /// Diagnosis responses carry their payload under `diagnosis`
    #[serde(alias = "diagnosis")]
    pub data: Option<T>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// Payload of a successful envelope, if any
    pub fn into_data(self) -> Result<Option<T>> {
        if !self.success {
            return Err(Error::RemoteRejection {
                message: self.message,
                hint: self.hint,
            });
        }
        Ok(self.data)
    }

    /// Payload of a successful envelope that must carry one
    pub fn into_required(self, endpoint: &str) -> Result<T> {
        self.into_data()?
            .ok_or_else(|| Error::Transport(format!("{} response carries no data", endpoint)))
    }
}

/// Sender profile plus credential as the mail-dispatch service expects it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmtpConfig {
    #[serde(flatten)]
    pub profile: SenderProfile,
    #[serde(serialize_with = "expose_credential")]
    pub password: Credential,
}

impl SmtpConfig {
    pub fn new(profile: SenderProfile, password: Credential) -> Self {
        Self { profile, password }
    }
}

fn expose_credential<S: Serializer>(
    credential: &Credential,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(credential.expose())
}

/// Body of a batch send
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchRequest {
    pub smtp_config: SmtpConfig,
    pub recipients: Vec<Recipient>,
    pub subject: String,
    #[serde(rename = "content")]
    pub body: String,
    pub common_attachments: Vec<String>,
}

/// Payload of a completed batch send
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DispatchResponse {
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub results: Vec<SendResult>,
    #[serde(default)]
    pub summary: Option<SendSummary>,
    /// Envelope message, e.g. "sent: 2, failed: 1"
    #[serde(default)]
    pub message: String,
}

/// A file handed to the import or upload service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a local file for upload
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Config(format!("{} is not a file", path.display())))?;

        Ok(Self { filename, bytes })
    }
}
