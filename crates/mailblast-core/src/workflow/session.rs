//! Campaign session - drives one campaign's workflow against the remote service
//!
//! The state lock is never held across a remote call. Operations read what they
//! need, release the lock, call the service, then apply the outcome as a
//! transition.

use super::state::{Action, Stage, WorkflowState};
use crate::campaign::{CampaignConfig, ConfigLibrary};
use crate::compose::{Personalizer, RenderedMessage};
use crate::dispatch::DispatchCoordinator;
use crate::reconcile::ReviewReport;
use crate::service::{CampaignService, FileUpload, SmtpConfig};
use mailblast_common::types::{
    ConnectionCheck, Created, Credential, Diagnosis, ImportedRecipients, MessageDraft,
    NamedSenderProfile, NamedTemplate, Recipient, RecipientPatch, SenderProfile,
    UploadedAttachment,
};
use mailblast_common::{Error, Result, ValidationError};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// One campaign, from configuration to review
pub struct CampaignSession {
    id: Uuid,
    state: Arc<Mutex<WorkflowState>>,
    service: Arc<dyn CampaignService>,
    coordinator: DispatchCoordinator,
    library: ConfigLibrary,
}

impl CampaignSession {
    pub fn new(service: Arc<dyn CampaignService>, config: CampaignConfig) -> Self {
        let id = Uuid::new_v4();
        debug!(session = %id, "Campaign session created");

        Self {
            id,
            state: Arc::new(Mutex::new(WorkflowState::new(config))),
            coordinator: DispatchCoordinator::new(Arc::clone(&service)),
            library: ConfigLibrary::new(Arc::clone(&service)),
            service,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn library(&self) -> &ConfigLibrary {
        &self.library
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> WorkflowState {
        self.state.lock().await.clone()
    }

    pub async fn stage(&self) -> Stage {
        self.state.lock().await.stage
    }

    /// Apply one action. On error the state is unchanged.
    pub async fn apply(&self, action: Action) -> Result<WorkflowState> {
        let mut state = self.state.lock().await;
        let next = state.apply(action).map_err(|e| {
            debug!(session = %self.id, stage = %state.stage, "Action rejected: {}", e);
            e
        })?;
        *state = next;
        Ok(state.clone())
    }

    pub async fn advance(&self) -> Result<Stage> {
        Ok(self.apply(Action::Advance).await?.stage)
    }

    pub async fn back(&self) -> Result<Stage> {
        Ok(self.apply(Action::Back).await?.stage)
    }

    pub async fn set_sender_profile(&self, profile: SenderProfile) -> Result<()> {
        self.apply(Action::SetSenderProfile(profile)).await.map(drop)
    }

    pub async fn set_credential(&self, credential: Credential) -> Result<()> {
        self.apply(Action::SetCredential(credential)).await.map(drop)
    }

    pub async fn set_message_draft(&self, draft: MessageDraft) -> Result<()> {
        self.apply(Action::SetMessageDraft(draft)).await.map(drop)
    }

    pub async fn add_recipient(&self, recipient: Recipient) -> Result<()> {
        self.apply(Action::AddRecipient(recipient)).await.map(drop)
    }

    pub async fn edit_recipient(&self, email: &str, patch: RecipientPatch) -> Result<()> {
        self.apply(Action::EditRecipient {
            email: email.to_string(),
            patch,
        })
        .await
        .map(drop)
    }

    pub async fn remove_recipient(&self, email: &str) -> Result<()> {
        self.apply(Action::RemoveRecipient(email.to_string()))
            .await
            .map(drop)
    }

    /// Advisory connection test. Never changes the state.
    pub async fn test_connection(&self) -> Result<ConnectionCheck> {
        let smtp = self.testable_smtp().await?;
        let check = self.service.test_connection(&smtp).await?;
        if check.ok {
            info!(session = %self.id, host = %smtp.profile.host, "Connection test passed");
        } else {
            warn!(
                session = %self.id,
                host = %smtp.profile.host,
                "Connection test failed: {}",
                check.message
            );
        }
        Ok(check)
    }

    pub async fn diagnose(&self) -> Result<Diagnosis> {
        let smtp = self.testable_smtp().await?;
        self.service.diagnose(&smtp).await
    }

    /// Import a spreadsheet and install its recipients as the new set
    pub async fn import(&self, file: FileUpload) -> Result<ImportedRecipients> {
        self.state
            .lock()
            .await
            .ensure_editable("replace_recipients")?;

        info!(session = %self.id, file = %file.filename, "Importing recipients");
        let imported = self.service.parse_import(file).await?;

        let state = self
            .apply(Action::ReplaceRecipients(imported.recipients.clone()))
            .await?;
        info!(
            session = %self.id,
            imported = imported.recipients.len(),
            recipients = state.recipients.len(),
            "Recipients imported"
        );
        Ok(imported)
    }

    /// Upload a file and attach it to every message
    pub async fn upload_attachment(&self, file: FileUpload) -> Result<UploadedAttachment> {
        self.state
            .lock()
            .await
            .ensure_editable("add_common_attachment")?;

        let uploaded = self.service.upload_attachment(file).await?;
        self.apply(Action::AddCommonAttachment(uploaded.filepath.clone()))
            .await?;
        info!(session = %self.id, file = %uploaded.filename, "Attachment added");
        Ok(uploaded)
    }

    pub async fn remove_attachment(&self, filepath: &str) -> Result<()> {
        self.apply(Action::RemoveCommonAttachment(filepath.to_string()))
            .await
            .map(drop)
    }

    /// Render subject and body for `email`, or for the first recipient
    pub async fn preview(&self, email: Option<&str>) -> Result<RenderedMessage> {
        let state = self.state.lock().await;
        let recipient = match email {
            Some(email) => state
                .recipients
                .get(email)
                .ok_or_else(|| ValidationError::RecipientNotFound(email.to_string()))?,
            None => state
                .recipients
                .first()
                .ok_or(ValidationError::EmptyRecipientSet)?,
        };

        let personalizer = Personalizer::for_recipients(&state.recipients);
        let unknown = personalizer.unknown_draft_tokens(&state.config.draft);
        if !unknown.is_empty() {
            debug!(tokens = ?unknown, "Draft contains unrecognized tokens");
        }
        Ok(personalizer.render_message(&state.config.draft, recipient))
    }

    /// Dispatch the current recipient set. Rejected while another dispatch of
    /// this campaign is in flight.
    ///
    /// Dropping the returned future before it completes releases the in-flight
    /// flag as if the dispatch had failed; the batch outcome is then unknown.
    pub async fn send(&self) -> Result<ReviewReport> {
        let request = {
            let mut state = self.state.lock().await;
            let next = state.apply(Action::DispatchStarted)?;
            let request = DispatchCoordinator::prepare(&next.config, &next.recipients)?;
            *state = next;
            request
        };
        let mut guard = InFlightGuard::new(Arc::clone(&self.state), self.id);

        let result = self.coordinator.submit(request).await;

        let mut state = self.state.lock().await;
        guard.disarm();
        match result {
            Ok(outcome) => {
                let report = ReviewReport::from_outcome(&outcome);
                *state = state.apply(Action::DispatchSucceeded(outcome))?;
                if !report.missing.is_empty() {
                    warn!(
                        session = %self.id,
                        missing = report.missing.len(),
                        "Dispatch response is missing results"
                    );
                }
                Ok(report)
            }
            Err(e) => {
                *state = state.apply(Action::DispatchFailed)?;
                Err(e)
            }
        }
    }

    /// Start a new cycle with only the failed recipients. Returns how many were
    /// installed; 0 means nothing failed and the state is unchanged.
    pub async fn retry_failed(&self) -> Result<usize> {
        let mut state = self.state.lock().await;
        let count = state.retry_set().len();
        *state = state.apply(Action::RetryFailed)?;
        Ok(count)
    }

    /// Full campaign reset. Sender settings and credential are kept.
    pub async fn reset(&self) -> Result<()> {
        self.apply(Action::Reset).await?;
        info!(session = %self.id, "Campaign reset");
        Ok(())
    }

    pub async fn save_template(&self, name: &str) -> Result<Created> {
        let config = self.state.lock().await.config.clone();
        self.library.save_template(&config, name).await
    }

    pub async fn save_sender_profile(&self, name: &str) -> Result<Created> {
        let config = self.state.lock().await.config.clone();
        self.library.save_sender_profile(&config, name).await
    }

    /// Apply a saved template found by id or name
    pub async fn apply_template(&self, key: &str) -> Result<NamedTemplate> {
        let template = self
            .library
            .find_template(key)
            .await?
            .ok_or_else(|| Error::Config(format!("template {} not found", key)))?;

        self.apply(Action::ApplyTemplate(template.clone())).await?;
        Ok(template)
    }

    /// Apply a saved sender profile or provider preset found by id or name
    pub async fn apply_sender_profile(&self, key: &str) -> Result<NamedSenderProfile> {
        let profile = self
            .library
            .find_sender_profile(key)
            .await?
            .ok_or_else(|| Error::Config(format!("sender profile {} not found", key)))?;

        self.apply(Action::ApplySenderProfile(profile.profile.clone()))
            .await?;
        Ok(profile)
    }

    async fn testable_smtp(&self) -> Result<SmtpConfig> {
        let state = self.state.lock().await;
        state.config.validate_for_test()?;
        Ok(state.config.smtp_config())
    }
}

/// Releases the in-flight flag of a dispatch whose `send` future was dropped
struct InFlightGuard {
    state: Arc<Mutex<WorkflowState>>,
    session: Uuid,
    armed: bool,
}

impl InFlightGuard {
    fn new(state: Arc<Mutex<WorkflowState>>, session: Uuid) -> Self {
        Self {
            state,
            session,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(session = %self.session, "Dispatch abandoned before completion, outcome unknown");

        if let Ok(mut state) = self.state.try_lock() {
            release_in_flight(&mut state);
            return;
        }
        match Handle::try_current() {
            Ok(handle) => {
                let state = Arc::clone(&self.state);
                handle.spawn(async move {
                    release_in_flight(&mut *state.lock().await);
                });
            }
            Err(_) => {
                error!(session = %self.session, "No runtime to release the in-flight dispatch");
            }
        }
    }
}

fn release_in_flight(state: &mut WorkflowState) {
    if let Ok(next) = state.apply(Action::DispatchFailed) {
        *state = next;
    }
}
