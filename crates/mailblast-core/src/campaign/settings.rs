//! Campaign configuration - sender profile, credential and message draft

use crate::service::SmtpConfig;
use mailblast_common::types::{
    is_valid_email, Credential, MessageDraft, NamedTemplate, NewSenderProfile, NewTemplate,
    SenderProfile,
};
use mailblast_common::{ConfigField, FieldIssue, ValidationError};
use tracing::debug;

/// Everything needed to send a campaign except its recipients
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignConfig {
    pub sender: SenderProfile,
    pub credential: Credential,
    pub draft: MessageDraft,
}

impl CampaignConfig {
    pub fn new(sender: SenderProfile) -> Self {
        Self {
            sender,
            ..Self::default()
        }
    }

    pub fn set_sender_profile(&mut self, sender: SenderProfile) {
        self.sender = sender;
    }

    pub fn set_credential(&mut self, credential: Credential) {
        self.credential = credential;
    }

    pub fn set_message_draft(&mut self, draft: MessageDraft) {
        self.draft = draft;
    }

    /// Overwrite every sender field with a saved profile. The credential is kept.
    pub fn apply_sender_profile(&mut self, profile: &SenderProfile) {
        debug!(host = %profile.host, port = profile.port, "Applying sender profile");
        self.sender = profile.clone();
    }

    /// Overwrite subject, body and content mode with a saved template.
    /// Common attachments are not part of a template and stay as they are.
    pub fn apply_template(&mut self, template: &NamedTemplate) {
        debug!(template = %template.name, "Applying template");
        self.draft.subject = template.subject.clone();
        self.draft.body = template.body.clone();
        self.sender.content_mode = template.content_mode;
    }

    /// Add a common attachment. Returns false if it is already attached.
    pub fn add_common_attachment(&mut self, filepath: impl Into<String>) -> bool {
        let filepath = filepath.into();
        if self.draft.common_attachments.contains(&filepath) {
            return false;
        }
        self.draft.common_attachments.push(filepath);
        true
    }

    /// Remove a common attachment. Returns false if it was not attached.
    pub fn remove_common_attachment(&mut self, filepath: &str) -> bool {
        let before = self.draft.common_attachments.len();
        self.draft.common_attachments.retain(|f| f != filepath);
        self.draft.common_attachments.len() != before
    }

    /// Sender profile and credential in the shape the dispatch service expects
    pub fn smtp_config(&self) -> SmtpConfig {
        SmtpConfig::new(self.sender.clone(), self.credential.clone())
    }

    /// Checks needed before a connection test or leaving the Configure stage
    pub fn validate_for_test(&self) -> Result<(), ValidationError> {
        into_result(self.sender_issues())
    }

    /// Checks needed before a real send. Strictly stronger than
    /// [`validate_for_test`](Self::validate_for_test).
    pub fn validate_for_send(&self, recipient_count: usize) -> Result<(), ValidationError> {
        let mut issues = self.sender_issues();

        if self.draft.subject.trim().is_empty() {
            issues.push(FieldIssue::missing(ConfigField::Subject));
        }
        if self.draft.body.trim().is_empty() {
            issues.push(FieldIssue::missing(ConfigField::Body));
        }
        if recipient_count == 0 {
            issues.push(FieldIssue::missing(ConfigField::Recipients));
        }

        into_result(issues)
    }

    /// Snapshot of the non-secret sender fields for saving under `name`
    pub fn sender_profile_snapshot(&self, name: &str) -> Result<NewSenderProfile, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName("sender profile"));
        }

        let mut issues = Vec::new();
        if self.sender.host.trim().is_empty() {
            issues.push(FieldIssue::missing(ConfigField::Host));
        }
        if self.sender.address.trim().is_empty() {
            issues.push(FieldIssue::missing(ConfigField::SenderAddress));
        }
        into_result(issues)?;

        Ok(NewSenderProfile {
            name: name.to_string(),
            profile: self.sender.clone(),
        })
    }

    /// Snapshot of the draft for saving under `name`
    pub fn template_snapshot(&self, name: &str) -> Result<NewTemplate, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName("template"));
        }

        let mut issues = Vec::new();
        if self.draft.subject.trim().is_empty() {
            issues.push(FieldIssue::missing(ConfigField::Subject));
        }
        if self.draft.body.trim().is_empty() {
            issues.push(FieldIssue::missing(ConfigField::Body));
        }
        into_result(issues)?;

        Ok(NewTemplate {
            name: name.to_string(),
            subject: self.draft.subject.clone(),
            body: self.draft.body.clone(),
            content_mode: self.sender.content_mode,
        })
    }

    fn sender_issues(&self) -> Vec<FieldIssue> {
        let mut issues = Vec::new();

        if self.sender.host.trim().is_empty() {
            issues.push(FieldIssue::missing(ConfigField::Host));
        }
        if self.sender.port == 0 {
            issues.push(FieldIssue::invalid(ConfigField::Port));
        }

        let address = self.sender.address.trim();
        if address.is_empty() {
            issues.push(FieldIssue::missing(ConfigField::SenderAddress));
        } else if !is_valid_email(address) {
            issues.push(FieldIssue::invalid(ConfigField::SenderAddress));
        }

        if self.credential.is_empty() {
            issues.push(FieldIssue::missing(ConfigField::Credential));
        }

        issues
    }
}

fn into_result(issues: Vec<FieldIssue>) -> Result<(), ValidationError> {
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingFields(issues))
    }
}
