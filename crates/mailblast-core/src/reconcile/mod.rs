//! Outcome Reconciler - Maps dispatch results back onto submitted recipients
//!
//! Correlation is by email. Results for addresses that were never submitted are
//! ignored; submitted recipients without a result are reported as missing,
//! which is distinct from an intentional `skipped`.

mod export;

pub use export::{export_csv, write_csv};

use crate::dispatch::DispatchOutcome;
use crate::recipients::RecipientSet;
use mailblast_common::types::{Recipient, SendResult, SendStatus, SendSummary};
use mailblast_common::{Error, Result};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Results partitioned by status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classified {
    pub succeeded: Vec<SendResult>,
    pub failed: Vec<SendResult>,
    pub skipped: Vec<SendResult>,
}

pub fn classify(results: &[SendResult]) -> Classified {
    let mut classified = Classified::default();
    for result in results {
        let bucket = match result.status {
            SendStatus::Success => &mut classified.succeeded,
            SendStatus::Failed => &mut classified.failed,
            SendStatus::Skipped => &mut classified.skipped,
        };
        bucket.push(result.clone());
    }
    classified
}

/// Recipients whose result is `failed`, in the original insertion order
pub fn derive_retry_set(original: &RecipientSet, results: &[SendResult]) -> Vec<Recipient> {
    let failed: HashSet<&str> = results
        .iter()
        .filter(|r| r.status == SendStatus::Failed)
        .map(|r| r.email.trim())
        .collect();

    original
        .iter()
        .filter(|r| failed.contains(r.email.as_str()))
        .cloned()
        .collect()
}

/// Success rate in whole percent. 0 when nothing was sent.
pub fn compute_rate(summary: &SendSummary) -> u32 {
    if summary.total == 0 {
        return 0;
    }
    (f64::from(summary.success) / f64::from(summary.total) * 100.0).round() as u32
}

/// One submitted recipient and its result, if the service returned one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledEntry {
    pub recipient: Recipient,
    pub result: Option<SendResult>,
}

/// Results matched to the recipients of one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub entries: Vec<ReconciledEntry>,
    /// Submitted emails with no result
    pub missing: Vec<String>,
    /// Results for emails that were not submitted
    pub ignored: Vec<SendResult>,
}

impl Reconciliation {
    pub fn reconcile(submitted: &[Recipient], results: &[SendResult]) -> Self {
        let submitted_emails: HashSet<&str> = submitted.iter().map(|r| r.email.as_str()).collect();

        let mut by_email: HashMap<&str, &SendResult> = HashMap::with_capacity(results.len());
        let mut ignored = Vec::new();
        for result in results {
            let email = result.email.trim();
            if submitted_emails.contains(email) {
                by_email.insert(email, result);
            } else {
                ignored.push(result.clone());
            }
        }

        let mut missing = Vec::new();
        let entries = submitted
            .iter()
            .map(|recipient| {
                let result = by_email.get(recipient.email.as_str()).map(|r| (*r).clone());
                if result.is_none() {
                    missing.push(recipient.email.clone());
                }
                ReconciledEntry {
                    recipient: recipient.clone(),
                    result,
                }
            })
            .collect();

        if !ignored.is_empty() {
            warn!(count = ignored.len(), "Ignoring results for recipients that were not submitted");
        }
        if !missing.is_empty() {
            warn!(count = missing.len(), "Submitted recipients have no result");
        }

        Self {
            entries,
            missing,
            ignored,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Fail with [`Error::ReconciliationAnomaly`] if any submitted recipient has no result
    pub fn ensure_complete(&self) -> Result<()> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(Error::ReconciliationAnomaly {
                missing: self.missing.clone(),
            })
        }
    }
}

/// Everything the Review stage shows about one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewReport {
    pub batch_id: Option<String>,
    pub message: String,
    pub summary: SendSummary,
    pub summary_consistent: bool,
    pub rate: u32,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Submitted emails the service returned no result for
    pub missing: Vec<String>,
    pub ignored: usize,
    /// Whether "retry failed" has anything to do
    pub retry_available: bool,
}

impl ReviewReport {
    pub fn from_outcome(outcome: &DispatchOutcome) -> Self {
        let classified = classify(&outcome.results);
        let reconciliation = Reconciliation::reconcile(&outcome.submitted, &outcome.results);
        let summary = outcome.display_summary();
        let failed = reconciliation
            .entries
            .iter()
            .filter(|e| matches!(&e.result, Some(r) if r.status == SendStatus::Failed))
            .count();

        Self {
            batch_id: outcome.batch_id.clone(),
            message: outcome.message.clone(),
            summary_consistent: outcome.summary.is_consistent(),
            rate: compute_rate(&summary),
            summary,
            succeeded: classified.succeeded.len(),
            failed: classified.failed.len(),
            skipped: classified.skipped.len(),
            missing: reconciliation.missing,
            ignored: reconciliation.ignored.len(),
            retry_available: failed > 0,
        }
    }
}
