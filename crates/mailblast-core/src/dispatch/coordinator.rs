//! Dispatch Coordinator - Single batch submission and its verbatim outcome

use crate::campaign::CampaignConfig;
use crate::recipients::RecipientSet;
use crate::service::{CampaignService, DispatchRequest};
use chrono::{DateTime, Utc};
use mailblast_common::types::{Recipient, SendResult, SendSummary};
use mailblast_common::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// What the dispatch service reported for one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub batch_id: Option<String>,
    pub message: String,
    pub results: Vec<SendResult>,
    /// Summary as reported, or recomputed from the results when the service sent none
    pub summary: SendSummary,
    pub summary_reported: bool,
    /// Recipients submitted in this batch, in submission order
    pub submitted: Vec<Recipient>,
    pub dispatched_at: DateTime<Utc>,
}

impl DispatchOutcome {
    /// Summary with every count filled in, for display
    pub fn display_summary(&self) -> SendSummary {
        SendSummary {
            total: self.summary.total,
            success: self.summary.success,
            fail: Some(self.summary.fail_count()),
            skipped: self.summary.skipped,
        }
    }
}

/// Dispatch coordinator. Does not retry, chunk or rate-limit; the whole
/// recipient set is one remote call.
#[derive(Clone)]
pub struct DispatchCoordinator {
    service: Arc<dyn CampaignService>,
}

impl DispatchCoordinator {
    pub fn new(service: Arc<dyn CampaignService>) -> Self {
        Self { service }
    }

    /// Validate and build the request for a batch
    pub fn prepare(config: &CampaignConfig, recipients: &RecipientSet) -> Result<DispatchRequest> {
        config.validate_for_send(recipients.len())?;

        Ok(DispatchRequest {
            smtp_config: config.smtp_config(),
            recipients: recipients.as_slice().to_vec(),
            subject: config.draft.subject.clone(),
            body: config.draft.body.clone(),
            common_attachments: config.draft.common_attachments.clone(),
        })
    }

    /// Validate, then submit the batch
    pub async fn send(
        &self,
        config: &CampaignConfig,
        recipients: &RecipientSet,
    ) -> Result<DispatchOutcome> {
        let request = Self::prepare(config, recipients)?;
        self.submit(request).await
    }

    /// Submit an already prepared batch. A transport error means the outcome
    /// of the whole batch is unknown.
    pub async fn submit(&self, request: DispatchRequest) -> Result<DispatchOutcome> {
        info!(recipients = request.recipients.len(), "Dispatching batch");

        let response = self.service.dispatch(&request).await.map_err(|e| {
            warn!(code = e.code(), "Dispatch failed: {}", e);
            e
        })?;

        let (summary, summary_reported) = match response.summary {
            Some(summary) => (summary, true),
            None => {
                warn!("Dispatch response has no summary, counting results");
                (SendSummary::from_results(&response.results), false)
            }
        };

        if !summary.is_consistent() {
            warn!(
                total = summary.total,
                success = summary.success,
                fail = summary.fail_count(),
                skipped = summary.skipped_count(),
                "Dispatch summary counts do not add up"
            );
        }

        info!(
            batch_id = response.batch_id.as_deref().unwrap_or("-"),
            total = summary.total,
            success = summary.success,
            fail = summary.fail_count(),
            "Batch dispatched"
        );

        Ok(DispatchOutcome {
            batch_id: response.batch_id,
            message: response.message,
            results: response.results,
            summary,
            summary_reported,
            submitted: request.recipients,
            dispatched_at: Utc::now(),
        })
    }
}
