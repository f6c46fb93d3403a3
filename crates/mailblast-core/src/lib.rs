//! Mailblast Core - Campaign orchestration
//!
//! This crate provides the campaign workflow for Mailblast: the recipient set,
//! personalization, campaign configuration, dispatch through the remote
//! campaign service, and reconciliation of per-recipient outcomes.

pub mod campaign;
pub mod compose;
pub mod dispatch;
pub mod reconcile;
pub mod recipients;
pub mod service;
pub mod workflow;

pub use campaign::{CampaignConfig, ConfigLibrary};
pub use compose::{Personalizer, RenderedMessage};
pub use dispatch::{DispatchCoordinator, DispatchOutcome};
pub use reconcile::{Reconciliation, ReviewReport};
pub use recipients::RecipientSet;
pub use service::{CampaignService, FileUpload, HttpCampaignService};
pub use workflow::{Action, CampaignSession, DispatchState, Stage, WorkflowState};
