//! Mailblast Common - Shared types and utilities
//!
//! This crate provides the campaign data model, the error taxonomy and the
//! configuration shared across all Mailblast components.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{ConfigField, Error, FieldIssue, IssueKind, Result, ValidationError};
