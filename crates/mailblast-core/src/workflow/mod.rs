//! Workflow Module - The Configure, Collect, Compose, Review sequence

mod session;
mod state;

pub use session::CampaignSession;
pub use state::{Action, DispatchState, Stage, WorkflowState};
