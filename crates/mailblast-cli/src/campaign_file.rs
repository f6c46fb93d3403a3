//! Campaign files - a TOML description of one campaign
//!
//! ```toml
//! [sender]
//! profile = "gmail"            # saved profile or preset, applied first
//! address = "team@gmail.com"
//! display_name = "Team"
//!
//! [draft]
//! template = "Welcome"         # saved template, applied before subject/body
//! subject = "Hello {{name}}"
//! body_file = "body.html"
//! attachments = ["guide.pdf"]
//!
//! [recipients]
//! import = "list.xlsx"
//!
//! [[recipients.list]]
//! email = "li@x.com"
//! name = "Li"
//! department = "Finance"
//! ```
//!
//! Relative paths are resolved against the campaign file's directory. The SMTP
//! credential is never read from here.

use mailblast_common::types::{ContentMode, Recipient, SenderProfile};
use mailblast_common::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CampaignFile {
    #[serde(default)]
    pub sender: SenderSection,
    #[serde(default)]
    pub draft: DraftSection,
    #[serde(default)]
    pub recipients: RecipientsSection,
}

/// Sender overrides, applied on top of the configured defaults and `profile`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SenderSection {
    pub profile: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub address: Option<String>,
    pub display_name: Option<String>,
    pub use_ssl: Option<bool>,
    pub use_starttls: Option<bool>,
    pub html: Option<bool>,
}

impl SenderSection {
    pub fn apply_to(&self, profile: &mut SenderProfile) {
        if let Some(host) = &self.host {
            profile.host = host.clone();
        }
        if let Some(port) = self.port {
            profile.port = port;
        }
        if let Some(address) = &self.address {
            profile.address = address.clone();
        }
        if let Some(display_name) = &self.display_name {
            profile.display_name = display_name.clone();
        }
        if let Some(use_ssl) = self.use_ssl {
            profile.use_ssl = use_ssl;
        }
        if let Some(use_starttls) = self.use_starttls {
            profile.use_starttls = use_starttls;
        }
        if let Some(html) = self.html {
            profile.content_mode = if html { ContentMode::Html } else { ContentMode::Plain };
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DraftSection {
    pub template: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub body_file: Option<PathBuf>,
    /// Local files uploaded as common attachments
    #[serde(default)]
    pub attachments: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipientsSection {
    /// Spreadsheet handed to the import service
    pub import: Option<PathBuf>,
    #[serde(default)]
    pub list: Vec<Recipient>,
}

impl CampaignFile {
    /// Parse a campaign file and resolve its relative paths. `body_file` is
    /// read into `body`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read campaign file {}: {}", path.display(), e))
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&content, base)
    }

    pub fn parse(content: &str, base: &Path) -> Result<Self> {
        let mut file: CampaignFile = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse campaign file: {}", e)))?;

        if let Some(import) = file.recipients.import.take() {
            file.recipients.import = Some(base.join(import));
        }
        file.draft.attachments = file
            .draft
            .attachments
            .iter()
            .map(|attachment| base.join(attachment))
            .collect();

        if let Some(body_file) = file.draft.body_file.take() {
            if file.draft.body.is_some() {
                return Err(Error::Config(
                    "draft.body and draft.body_file are mutually exclusive".to_string(),
                ));
            }
            let body_file = base.join(body_file);
            let body = std::fs::read_to_string(&body_file).map_err(|e| {
                Error::Config(format!("Failed to read {}: {}", body_file.display(), e))
            })?;
            file.draft.body = Some(body);
            file.draft.body_file = Some(body_file);
        }

        Ok(file)
    }
}
