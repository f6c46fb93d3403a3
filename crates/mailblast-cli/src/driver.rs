//! Runs a campaign file through a session

use crate::campaign_file::CampaignFile;
use mailblast_common::types::{Credential, MessageDraft, SendResult, SendStatus};
use mailblast_common::Result;
use mailblast_core::{CampaignSession, FileUpload, ReviewReport, Stage};
use tracing::info;

/// Load sender, recipients and draft from `file` into the session.
/// The session stays in the Configure stage.
pub async fn prepare(
    session: &CampaignSession,
    file: &CampaignFile,
    credential: Option<Credential>,
) -> Result<()> {
    if let Some(profile) = &file.sender.profile {
        let applied = session.apply_sender_profile(profile).await?;
        info!(profile = %applied.name, "Applied sender profile");
    }
    let mut sender = session.snapshot().await.config.sender;
    file.sender.apply_to(&mut sender);
    session.set_sender_profile(sender).await?;

    if let Some(credential) = credential {
        session.set_credential(credential).await?;
    }

    if let Some(import) = &file.recipients.import {
        let imported = session.import(FileUpload::from_path(import).await?).await?;
        if let Some(skipped) = imported.skipped.filter(|s| *s > 0) {
            info!(skipped, "Import skipped rows");
        }
    }
    for recipient in &file.recipients.list {
        session.add_recipient(recipient.clone()).await?;
    }

    if let Some(template) = &file.draft.template {
        session.apply_template(template).await?;
    }
    let current = session.snapshot().await.config.draft;
    session
        .set_message_draft(MessageDraft {
            subject: file.draft.subject.clone().unwrap_or(current.subject),
            body: file.draft.body.clone().unwrap_or(current.body),
            common_attachments: current.common_attachments,
        })
        .await?;
    for attachment in &file.draft.attachments {
        session
            .upload_attachment(FileUpload::from_path(attachment).await?)
            .await?;
    }

    Ok(())
}

/// What a send with retries produced
#[derive(Debug, Default)]
pub struct CampaignRun {
    pub reports: Vec<ReviewReport>,
    /// Latest result per recipient across all rounds, in first-seen order
    pub results: Vec<SendResult>,
}

impl CampaignRun {
    fn merge(&mut self, results: &[SendResult]) {
        for result in results {
            match self.results.iter_mut().find(|r| r.email == result.email) {
                Some(existing) => *existing = result.clone(),
                None => self.results.push(result.clone()),
            }
        }
    }

    pub fn still_failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == SendStatus::Failed)
            .count()
    }
}

/// Move a prepared session to Compose, send, then re-drive the failed subset
/// up to `retry_rounds` times. Each retry is a new batch.
pub async fn send(session: &CampaignSession, retry_rounds: u32) -> Result<CampaignRun> {
    while session.stage().await != Stage::Compose {
        session.advance().await?;
    }

    let mut run = CampaignRun::default();
    let mut round = 0;
    loop {
        let report = session.send().await?;
        if let Some(outcome) = session.snapshot().await.last_outcome {
            run.merge(&outcome.results);
        }
        let retry_available = report.retry_available;
        run.reports.push(report);

        if !retry_available || round >= retry_rounds {
            break;
        }
        round += 1;

        let installed = session.retry_failed().await?;
        if installed == 0 {
            break;
        }
        info!(round, recipients = installed, "Retrying failed recipients");
        session.advance().await?;
    }

    Ok(run)
}
