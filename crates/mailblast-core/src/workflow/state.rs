//! Workflow state and its transition function
//!
//! `WorkflowState::apply` never mutates the current state. It returns the next
//! state or an error, so a rejected action leaves nothing half-applied.

use crate::campaign::CampaignConfig;
use crate::dispatch::DispatchOutcome;
use crate::reconcile::{derive_retry_set, ReviewReport};
use crate::recipients::RecipientSet;
use chrono::{DateTime, Utc};
use mailblast_common::types::{
    Credential, MessageDraft, NamedTemplate, Recipient, RecipientPatch, SenderProfile,
};
use mailblast_common::{Error, Result, ValidationError};
use std::fmt;
use tracing::info;

/// Campaign stage, in workflow order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Configure,
    Collect,
    Compose,
    Review,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Configure => "configure",
            Stage::Collect => "collect",
            Stage::Compose => "compose",
            Stage::Review => "review",
        }
    }

    pub fn previous(&self) -> Option<Stage> {
        match self {
            Stage::Configure => None,
            Stage::Collect => Some(Stage::Configure),
            Stage::Compose => Some(Stage::Collect),
            Stage::Review => Some(Stage::Compose),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchState {
    #[default]
    Idle,
    InFlight {
        started_at: DateTime<Utc>,
    },
}

impl DispatchState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, DispatchState::InFlight { .. })
    }
}

/// Operator intents and remote outcomes that drive the workflow
#[derive(Debug, Clone)]
pub enum Action {
    SetSenderProfile(SenderProfile),
    /// Apply a saved profile; the credential is kept
    ApplySenderProfile(SenderProfile),
    SetCredential(Credential),
    SetMessageDraft(MessageDraft),
    ApplyTemplate(NamedTemplate),
    AddCommonAttachment(String),
    RemoveCommonAttachment(String),
    AddRecipient(Recipient),
    EditRecipient { email: String, patch: RecipientPatch },
    RemoveRecipient(String),
    /// Install a bulk list, e.g. an import
    ReplaceRecipients(Vec<Recipient>),
    Advance,
    Back,
    DispatchStarted,
    DispatchSucceeded(DispatchOutcome),
    DispatchFailed,
    RetryFailed,
    Reset,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::SetSenderProfile(_) => "set_sender_profile",
            Action::ApplySenderProfile(_) => "apply_sender_profile",
            Action::SetCredential(_) => "set_credential",
            Action::SetMessageDraft(_) => "set_message_draft",
            Action::ApplyTemplate(_) => "apply_template",
            Action::AddCommonAttachment(_) => "add_common_attachment",
            Action::RemoveCommonAttachment(_) => "remove_common_attachment",
            Action::AddRecipient(_) => "add_recipient",
            Action::EditRecipient { .. } => "edit_recipient",
            Action::RemoveRecipient(_) => "remove_recipient",
            Action::ReplaceRecipients(_) => "replace_recipients",
            Action::Advance => "advance",
            Action::Back => "back",
            Action::DispatchStarted => "dispatch_started",
            Action::DispatchSucceeded(_) => "dispatch_succeeded",
            Action::DispatchFailed => "dispatch_failed",
            Action::RetryFailed => "retry_failed",
            Action::Reset => "reset",
        }
    }

    /// Whether the action edits campaign data rather than moving between stages
    pub fn is_edit(&self) -> bool {
        matches!(
            self,
            Action::SetSenderProfile(_)
                | Action::ApplySenderProfile(_)
                | Action::SetCredential(_)
                | Action::SetMessageDraft(_)
                | Action::ApplyTemplate(_)
                | Action::AddCommonAttachment(_)
                | Action::RemoveCommonAttachment(_)
                | Action::AddRecipient(_)
                | Action::EditRecipient { .. }
                | Action::RemoveRecipient(_)
                | Action::ReplaceRecipients(_)
        )
    }
}

/// One campaign's accumulated data and position in the workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowState {
    pub stage: Stage,
    pub config: CampaignConfig,
    pub recipients: RecipientSet,
    pub dispatch: DispatchState,
    /// Outcome of the last successful dispatch
    pub last_outcome: Option<DispatchOutcome>,
}

impl WorkflowState {
    pub fn new(config: CampaignConfig) -> Self {
        Self {
            stage: Stage::Configure,
            config,
            recipients: RecipientSet::new(),
            dispatch: DispatchState::Idle,
            last_outcome: None,
        }
    }

    pub fn review_report(&self) -> Option<ReviewReport> {
        self.last_outcome.as_ref().map(ReviewReport::from_outcome)
    }

    /// Recipients "retry failed" would install
    pub fn retry_set(&self) -> Vec<Recipient> {
        match &self.last_outcome {
            Some(outcome) => {
                let submitted = RecipientSet::from_list(outcome.submitted.clone());
                derive_retry_set(&submitted, &outcome.results)
            }
            None => Vec::new(),
        }
    }

    /// Whether edits are accepted in the current stage
    pub fn ensure_editable(&self, action: &'static str) -> Result<()> {
        if self.stage == Stage::Review {
            return Err(self.invalid(action));
        }
        Ok(())
    }

    /// Compute the state that follows `action`
    pub fn apply(&self, action: Action) -> Result<WorkflowState> {
        let name = action.name();

        if action.is_edit() {
            self.ensure_editable(name)?;
        }

        let mut next = self.clone();
        match action {
            Action::SetSenderProfile(profile) => next.config.set_sender_profile(profile),
            Action::ApplySenderProfile(profile) => next.config.apply_sender_profile(&profile),
            Action::SetCredential(credential) => next.config.set_credential(credential),
            Action::SetMessageDraft(draft) => next.config.set_message_draft(draft),
            Action::ApplyTemplate(template) => next.config.apply_template(&template),
            Action::AddCommonAttachment(filepath) => {
                next.config.add_common_attachment(filepath);
            }
            Action::RemoveCommonAttachment(filepath) => {
                next.config.remove_common_attachment(&filepath);
            }
            Action::AddRecipient(recipient) => next.recipients.add(recipient)?,
            Action::EditRecipient { email, patch } => {
                next.recipients.edit(&email, patch)?;
            }
            Action::RemoveRecipient(email) => {
                next.recipients.remove(&email)?;
            }
            Action::ReplaceRecipients(list) => {
                next.recipients.replace_all(list);
            }

            Action::Advance => {
                self.ensure_idle()?;
                next.stage = match self.stage {
                    Stage::Configure => {
                        self.config.validate_for_test()?;
                        Stage::Collect
                    }
                    Stage::Collect => {
                        if self.recipients.is_empty() {
                            return Err(ValidationError::EmptyRecipientSet.into());
                        }
                        Stage::Compose
                    }
                    // Compose only moves on through a successful dispatch
                    Stage::Compose | Stage::Review => return Err(self.invalid(name)),
                };
            }
            Action::Back => {
                next.stage = self.stage.previous().ok_or_else(|| self.invalid(name))?;
            }

            Action::DispatchStarted => {
                self.ensure_idle()?;
                if self.stage != Stage::Compose {
                    return Err(self.invalid(name));
                }
                self.config.validate_for_send(self.recipients.len())?;
                next.dispatch = DispatchState::InFlight {
                    started_at: Utc::now(),
                };
            }
            Action::DispatchSucceeded(outcome) => {
                if !self.dispatch.is_in_flight() {
                    return Err(self.invalid(name));
                }
                next.dispatch = DispatchState::Idle;
                next.last_outcome = Some(outcome);
                next.stage = Stage::Review;
            }
            Action::DispatchFailed => {
                if !self.dispatch.is_in_flight() {
                    return Err(self.invalid(name));
                }
                next.dispatch = DispatchState::Idle;
            }

            Action::RetryFailed => {
                self.ensure_idle()?;
                if self.stage != Stage::Review {
                    return Err(self.invalid(name));
                }
                let retry = self.retry_set();
                if retry.is_empty() {
                    info!("No failed recipients to retry");
                    return Ok(next);
                }
                info!(recipients = retry.len(), "Retrying failed recipients");
                next.recipients = RecipientSet::from_list(retry);
                next.last_outcome = None;
                next.stage = Stage::Collect;
            }
            Action::Reset => {
                self.ensure_idle()?;
                next.recipients.clear();
                next.config.draft = MessageDraft::default();
                next.last_outcome = None;
                next.stage = Stage::Configure;
            }
        }

        if next.stage != self.stage {
            info!(from = %self.stage, to = %next.stage, action = name, "Stage transition");
        }
        Ok(next)
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.dispatch.is_in_flight() {
            return Err(Error::DispatchInFlight);
        }
        Ok(())
    }

    fn invalid(&self, action: &'static str) -> Error {
        Error::InvalidTransition {
            stage: self.stage.as_str(),
            action,
        }
    }
}
