//! Campaign Module - Sender settings, message draft and their saved snapshots

mod library;
mod settings;

pub use library::ConfigLibrary;
pub use settings::CampaignConfig;
