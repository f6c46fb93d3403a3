//! In-memory campaign service for workflow tests

#![allow(dead_code)]

use async_trait::async_trait;
use mailblast_common::types::{
    ConnectionCheck, ContentMode, Created, Credential, Diagnosis, HealthStatus,
    ImportedRecipients, NamedSenderProfile, NamedTemplate, NewSenderProfile, NewTemplate,
    Recipient, SendResult, SendStatus, SendSummary, SenderProfile, UploadedAttachment,
};
use mailblast_common::{Error, Result};
use mailblast_core::service::{DispatchRequest, DispatchResponse, SmtpConfig};
use mailblast_core::{CampaignConfig, CampaignService, FileUpload};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Default)]
pub struct FakeService {
    /// Recipients returned by every import
    pub import: Mutex<Vec<Recipient>>,
    /// Per-email dispatch status; anything not listed succeeds
    pub statuses: Mutex<HashMap<String, SendStatus>>,
    /// Fail the next dispatch with a transport error
    pub fail_transport: Mutex<bool>,
    pub dispatches: Mutex<Vec<DispatchRequest>>,
    pub templates: Mutex<Vec<NamedTemplate>>,
    pub profiles: Mutex<Vec<NamedSenderProfile>>,
    /// When set, dispatch signals `dispatch_started` and waits for `release`
    pub gate: Option<Gate>,
}

pub struct Gate {
    pub dispatch_started: Notify,
    pub release: Notify,
}

impl FakeService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn gated() -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Gate {
                dispatch_started: Notify::new(),
                release: Notify::new(),
            }),
            ..Self::default()
        })
    }

    pub fn with_import(self: Arc<Self>, recipients: Vec<Recipient>) -> Arc<Self> {
        *self.import.lock().unwrap() = recipients;
        self
    }

    pub fn fail(&self, email: &str) {
        self.statuses
            .lock()
            .unwrap()
            .insert(email.to_string(), SendStatus::Failed);
    }

    pub fn succeed(&self, email: &str) {
        self.statuses.lock().unwrap().remove(email);
    }

    pub fn dispatch_count(&self) -> usize {
        self.dispatches.lock().unwrap().len()
    }

    pub fn add_preset(&self, id: &str, host: &str, port: u16) {
        self.profiles.lock().unwrap().push(NamedSenderProfile {
            id: id.to_string(),
            name: id.to_uppercase(),
            profile: SenderProfile {
                host: host.to_string(),
                port,
                use_ssl: port == 465,
                use_starttls: port == 587,
                ..SenderProfile::default()
            },
            description: None,
            created_at: None,
            updated_at: None,
        });
    }
}

#[async_trait]
impl CampaignService for FakeService {
    async fn health(&self) -> Result<HealthStatus> {
        Ok(HealthStatus {
            status: "ok".to_string(),
            message: "running".to_string(),
        })
    }

    async fn test_connection(&self, smtp: &SmtpConfig) -> Result<ConnectionCheck> {
        let ok = smtp.password.expose() == "s3cret";
        Ok(ConnectionCheck {
            ok,
            message: if ok { "connected" } else { "authentication failed" }.to_string(),
            hint: None,
        })
    }

    async fn diagnose(&self, _smtp: &SmtpConfig) -> Result<Diagnosis> {
        Ok(Diagnosis::default())
    }

    async fn parse_import(&self, file: FileUpload) -> Result<ImportedRecipients> {
        if !file.filename.ends_with(".xlsx") && !file.filename.ends_with(".csv") {
            return Err(Error::RemoteRejection {
                message: "unsupported file format".to_string(),
                hint: Some("upload xlsx, xls or csv".to_string()),
            });
        }
        let recipients = self.import.lock().unwrap().clone();
        Ok(ImportedRecipients {
            total: Some(recipients.len()),
            recipients,
            columns: vec!["email".to_string(), "name".to_string()],
            skipped: None,
        })
    }

    async fn download_import_template(&self) -> Result<Vec<u8>> {
        Ok(b"email,name,attachment\n".to_vec())
    }

    async fn upload_attachment(&self, file: FileUpload) -> Result<UploadedAttachment> {
        Ok(UploadedAttachment {
            filepath: format!("uploads/{}", file.filename),
            filename: file.filename,
        })
    }

    async fn list_templates(&self) -> Result<Vec<NamedTemplate>> {
        Ok(self.templates.lock().unwrap().clone())
    }

    async fn create_template(&self, template: &NewTemplate) -> Result<Created> {
        let mut templates = self.templates.lock().unwrap();
        let id = match templates.iter_mut().find(|t| t.name == template.name) {
            Some(existing) => {
                existing.subject = template.subject.clone();
                existing.body = template.body.clone();
                existing.content_mode = template.content_mode;
                existing.id.clone()
            }
            None => {
                let id = format!("t{}", templates.len() + 1);
                templates.push(NamedTemplate {
                    id: id.clone(),
                    name: template.name.clone(),
                    subject: template.subject.clone(),
                    body: template.body.clone(),
                    content_mode: template.content_mode,
                    created_at: None,
                    updated_at: None,
                });
                id
            }
        };
        Ok(Created { id })
    }

    async fn delete_template(&self, id: &str) -> Result<()> {
        self.templates.lock().unwrap().retain(|t| t.id != id);
        Ok(())
    }

    async fn list_sender_profiles(&self) -> Result<Vec<NamedSenderProfile>> {
        Ok(self.profiles.lock().unwrap().clone())
    }

    async fn create_sender_profile(&self, profile: &NewSenderProfile) -> Result<Created> {
        let mut profiles = self.profiles.lock().unwrap();
        let id = format!("p{}", profiles.len() + 1);
        profiles.push(NamedSenderProfile {
            id: id.clone(),
            name: profile.name.clone(),
            profile: profile.profile.clone(),
            description: None,
            created_at: None,
            updated_at: None,
        });
        Ok(Created { id })
    }

    async fn delete_sender_profile(&self, id: &str) -> Result<()> {
        self.profiles.lock().unwrap().retain(|p| p.id != id);
        Ok(())
    }

    async fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchResponse> {
        self.dispatches.lock().unwrap().push(request.clone());

        if let Some(gate) = &self.gate {
            gate.dispatch_started.notify_one();
            gate.release.notified().await;
        }

        if std::mem::take(&mut *self.fail_transport.lock().unwrap()) {
            return Err(Error::Transport("connection reset by peer".to_string()));
        }

        let statuses = self.statuses.lock().unwrap().clone();
        let results: Vec<SendResult> = request
            .recipients
            .iter()
            .map(|r| {
                let status = statuses.get(&r.email).copied().unwrap_or(SendStatus::Success);
                let mut result = SendResult::new(r.email.clone(), status, status.to_string());
                result.name = r.name.clone();
                result
            })
            .collect();

        Ok(DispatchResponse {
            batch_id: Some(format!("batch-{}", self.dispatch_count())),
            summary: Some(SendSummary::from_results(&results)),
            results,
            message: "done".to_string(),
        })
    }
}

/// A configuration that passes send validation once recipients exist
pub fn ready_config() -> CampaignConfig {
    let mut config = CampaignConfig::new(SenderProfile {
        host: "smtp.example.com".to_string(),
        address: "ops@example.com".to_string(),
        display_name: "Ops".to_string(),
        content_mode: ContentMode::Plain,
        ..SenderProfile::default()
    });
    config.set_credential(Credential::new("s3cret"));
    config.draft.subject = "Hello {{name}}".to_string();
    config.draft.body = "Dear {{name}}, see attached.".to_string();
    config
}

pub fn abc() -> Vec<Recipient> {
    vec![
        Recipient::new("a@x.com", "A"),
        Recipient::new("b@x.com", "B"),
        Recipient::new("c@x.com", "C"),
    ]
}
