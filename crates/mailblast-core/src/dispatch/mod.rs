//! Dispatch Module - Hands a campaign to the mail-dispatch service as one batch

mod coordinator;

pub use coordinator::{DispatchCoordinator, DispatchOutcome};
