//! Common types for Mailblast
//!
//! Field names follow the wire format of the mail-dispatch, import and
//! persistence services, so every type here serializes as those services
//! expect and deserializes what they return.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
}

/// Identifier of a persisted template
pub type TemplateId = String;

/// Identifier of a persisted sender profile
pub type SenderProfileId = String;

/// Whether an address looks like `local@domain.tld`
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// One addressee of a campaign. Identity is the email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,

    #[serde(default)]
    pub name: String,

    /// Per-recipient attachment reference
    #[serde(
        default,
        deserialize_with = "empty_string_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub attachment: Option<String>,

    /// Additional per-recipient attachments produced by attachment-aware imports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_attachments: Vec<String>,

    /// Personalization fields such as `department`
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

impl Recipient {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into().trim().to_string(),
            name: name.into(),
            attachment: None,
            all_attachments: Vec::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: impl Into<String>) -> Self {
        self.attachment = Some(attachment.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Look up a personalization field
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Partial update of a recipient. The email is not editable through a patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientPatch {
    pub name: Option<String>,
    /// `Some(None)` clears the attachment
    pub attachment: Option<Option<String>>,
    /// Replaces the whole field mapping when set
    pub fields: Option<BTreeMap<String, String>>,
}

impl RecipientPatch {
    pub fn apply(self, recipient: &mut Recipient) {
        if let Some(name) = self.name {
            recipient.name = name;
        }
        if let Some(attachment) = self.attachment {
            recipient.attachment = attachment;
        }
        if let Some(fields) = self.fields {
            recipient.fields = fields;
        }
    }
}

/// Body format of outgoing messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ContentMode {
    #[default]
    Plain,
    Html,
}

impl ContentMode {
    pub fn is_html(&self) -> bool {
        matches!(self, ContentMode::Html)
    }
}

impl fmt::Display for ContentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentMode::Plain => f.write_str("plain"),
            ContentMode::Html => f.write_str("html"),
        }
    }
}

// On the wire the content mode is the `html_mode` flag.
impl Serialize for ContentMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(self.is_html())
    }
}

impl<'de> Deserialize<'de> for ContentMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let html = Option::<bool>::deserialize(deserializer)?.unwrap_or(false);
        Ok(if html { ContentMode::Html } else { ContentMode::Plain })
    }
}

/// Non-secret outbound mail account settings
///
/// `use_ssl` and `use_starttls` may both be set; precedence is decided by the
/// mail-dispatch service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderProfile {
    #[serde(rename = "smtp_host")]
    pub host: String,

    #[serde(rename = "smtp_port")]
    pub port: u16,

    #[serde(rename = "sender_email")]
    pub address: String,

    #[serde(rename = "sender_name")]
    pub display_name: String,

    /// Implicit TLS on connect
    pub use_ssl: bool,

    #[serde(rename = "use_tls")]
    pub use_starttls: bool,

    #[serde(rename = "html_mode")]
    pub content_mode: ContentMode,
}

impl Default for SenderProfile {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 465,
            address: String::new(),
            display_name: String::new(),
            use_ssl: true,
            use_starttls: false,
            content_mode: ContentMode::Plain,
        }
    }
}

/// SMTP password or authorization code. Never persisted, never logged.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Credential(<empty>)")
        } else {
            f.write_str("Credential(<redacted>)")
        }
    }
}

/// Subject, body and the attachments shared by all recipients
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDraft {
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub common_attachments: Vec<String>,
}

/// A persisted {subject, body, content mode} snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedTemplate {
    pub id: TemplateId,
    pub name: String,
    pub subject: String,
    #[serde(rename = "content")]
    pub body: String,
    #[serde(rename = "html_mode", default)]
    pub content_mode: ContentMode,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Request body for creating a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTemplate {
    pub name: String,
    pub subject: String,
    #[serde(rename = "content")]
    pub body: String,
    #[serde(rename = "html_mode")]
    pub content_mode: ContentMode,
}

/// A persisted sender profile. Built-in provider presets carry no sender address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedSenderProfile {
    pub id: SenderProfileId,
    pub name: String,
    #[serde(flatten)]
    pub profile: SenderProfile,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Request body for creating a sender profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewSenderProfile {
    pub name: String,
    #[serde(flatten)]
    pub profile: SenderProfile,
}

/// Identifier returned by create calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Created {
    pub id: String,
}

/// Per-recipient dispatch status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStatus {
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for SendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendStatus::Success => f.write_str("success"),
            SendStatus::Failed => f.write_str("failed"),
            SendStatus::Skipped => f.write_str("skipped"),
        }
    }
}

/// Outcome of one recipient in a dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSendResult")]
pub struct SendResult {
    pub email: String,
    pub name: String,
    pub status: SendStatus,
    pub message: String,
}

impl SendResult {
    pub fn new(email: impl Into<String>, status: SendStatus, message: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: String::new(),
            status,
            message: message.into(),
        }
    }
}

/// Both observed result shapes: `{email, name, status, message}` and
/// `{recipient, success, message}`.
#[derive(Deserialize)]
struct RawSendResult {
    email: Option<String>,
    recipient: Option<String>,
    #[serde(default)]
    name: Option<String>,
    status: Option<SendStatus>,
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
}

impl TryFrom<RawSendResult> for SendResult {
    type Error = String;

    fn try_from(raw: RawSendResult) -> Result<Self, Self::Error> {
        let email = raw
            .email
            .or(raw.recipient)
            .ok_or_else(|| "send result without email".to_string())?;

        let status = match (raw.status, raw.success) {
            (Some(status), _) => status,
            (None, Some(true)) => SendStatus::Success,
            (None, Some(false)) => SendStatus::Failed,
            (None, None) => return Err(format!("send result for {} without status", email)),
        };

        Ok(Self {
            email,
            name: raw.name.unwrap_or_default(),
            status,
            message: raw.message.unwrap_or_default(),
        })
    }
}

/// Aggregate counts of a dispatch.
///
/// `fail` and `skipped` are both optional on the wire; [`SendSummary::fail_count`]
/// recovers `fail` as `total - success - skipped` when it is absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendSummary {
    pub total: u32,
    pub success: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<u32>,
}

impl SendSummary {
    pub fn new(total: u32, success: u32, fail: u32) -> Self {
        Self {
            total,
            success,
            fail: Some(fail),
            skipped: None,
        }
    }

    pub fn with_skipped(mut self, skipped: u32) -> Self {
        self.skipped = Some(skipped);
        self
    }

    pub fn skipped_count(&self) -> u32 {
        self.skipped.unwrap_or(0)
    }

    pub fn fail_count(&self) -> u32 {
        self.fail.unwrap_or_else(|| {
            self.total
                .saturating_sub(self.success)
                .saturating_sub(self.skipped_count())
        })
    }

    /// `total = success + fail (+ skipped)`. Counts come from the remote
    /// service unchecked, so they are summed without overflow.
    pub fn is_consistent(&self) -> bool {
        let sum = u64::from(self.success)
            + u64::from(self.fail_count())
            + u64::from(self.skipped_count());
        u64::from(self.total) == sum
    }

    /// Recompute a summary from a result list
    pub fn from_results(results: &[SendResult]) -> Self {
        let mut summary = Self {
            total: u32::try_from(results.len()).unwrap_or(u32::MAX),
            success: 0,
            fail: Some(0),
            skipped: Some(0),
        };
        for result in results {
            let counter = match result.status {
                SendStatus::Success => &mut summary.success,
                SendStatus::Failed => summary.fail.get_or_insert(0),
                SendStatus::Skipped => summary.skipped.get_or_insert(0),
            };
            *counter += 1;
        }
        summary
    }
}

/// Result of the advisory connection test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionCheck {
    pub ok: bool,
    pub message: String,
    pub hint: Option<String>,
}

/// Status of a single diagnosis check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Success,
    Warning,
    Error,
    Info,
    #[default]
    Pending,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Success => f.write_str("success"),
            CheckStatus::Warning => f.write_str("warning"),
            CheckStatus::Error => f.write_str("error"),
            CheckStatus::Info => f.write_str("info"),
            CheckStatus::Pending => f.write_str("pending"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    #[serde(default)]
    pub status: CheckStatus,
    #[serde(default)]
    pub message: String,
}

/// Connection diagnosis returned by the mail-dispatch service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    #[serde(default)]
    pub network: CheckReport,
    #[serde(default)]
    pub port: CheckReport,
    #[serde(default)]
    pub ssl_tls: CheckReport,
    #[serde(default)]
    pub authentication: CheckReport,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl Diagnosis {
    pub fn has_errors(&self) -> bool {
        [&self.network, &self.port, &self.ssl_tls, &self.authentication]
            .iter()
            .any(|check| check.status == CheckStatus::Error)
    }
}

/// Structured output of the import service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedRecipients {
    pub recipients: Vec<Recipient>,
    #[serde(default)]
    pub total: Option<usize>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub skipped: Option<usize>,
}

/// Descriptor of an uploaded attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedAttachment {
    pub filename: String,
    pub filepath: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("li@x.com"));
        assert!(is_valid_email("first.last+tag@mail.example.org"));
        assert!(!is_valid_email("li@x"));
        assert!(!is_valid_email("not an email"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_recipient_from_import_row() {
        let json = serde_json::json!({
            "email": "li@x.com",
            "name": "Li",
            "attachment": "",
            "department": "Finance"
        });

        let recipient: Recipient = serde_json::from_value(json).unwrap();
        assert_eq!(recipient.email, "li@x.com");
        assert_eq!(recipient.attachment, None);
        assert_eq!(recipient.field("department"), Some("Finance"));
        assert!(recipient.all_attachments.is_empty());
    }

    #[test]
    fn test_recipient_serializes_flat() {
        let recipient = Recipient::new("li@x.com", "Li")
            .with_attachment("report.pdf")
            .with_field("department", "Finance");

        let value = serde_json::to_value(&recipient).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "email": "li@x.com",
                "name": "Li",
                "attachment": "report.pdf",
                "department": "Finance"
            })
        );
    }

    #[test]
    fn test_patch_keeps_unset_fields() {
        let mut recipient = Recipient::new("li@x.com", "Li").with_attachment("a.pdf");
        RecipientPatch {
            name: Some("Li Wei".to_string()),
            ..Default::default()
        }
        .apply(&mut recipient);

        assert_eq!(recipient.name, "Li Wei");
        assert_eq!(recipient.attachment.as_deref(), Some("a.pdf"));

        RecipientPatch {
            attachment: Some(None),
            ..Default::default()
        }
        .apply(&mut recipient);
        assert_eq!(recipient.attachment, None);
    }

    #[test]
    fn test_sender_profile_wire_names() {
        let profile = SenderProfile {
            host: "smtp.example.com".to_string(),
            port: 587,
            address: "ops@example.com".to_string(),
            display_name: "Ops".to_string(),
            use_ssl: false,
            use_starttls: true,
            content_mode: ContentMode::Html,
        };

        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["smtp_host"], "smtp.example.com");
        assert_eq!(value["smtp_port"], 587);
        assert_eq!(value["sender_email"], "ops@example.com");
        assert_eq!(value["use_tls"], true);
        assert_eq!(value["html_mode"], true);
    }

    #[test]
    fn test_provider_preset_decodes_with_defaults() {
        let json = serde_json::json!({
            "id": "gmail",
            "name": "Gmail",
            "smtp_host": "smtp.gmail.com",
            "smtp_port": 587,
            "use_ssl": false,
            "use_tls": true,
            "description": "app password required"
        });

        let preset: NamedSenderProfile = serde_json::from_value(json).unwrap();
        assert_eq!(preset.profile.host, "smtp.gmail.com");
        assert_eq!(preset.profile.address, "");
        assert_eq!(preset.profile.content_mode, ContentMode::Plain);
        assert!(preset.profile.use_starttls);
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("hunter2");
        assert_eq!(format!("{:?}", credential), "Credential(<redacted>)");
        assert!(!credential.is_empty());
        assert!(Credential::new("  ").is_empty());
    }

    #[test]
    fn test_send_result_both_shapes() {
        let full: SendResult = serde_json::from_value(serde_json::json!({
            "email": "a@x.com",
            "name": "A",
            "status": "skipped",
            "message": "no attachment"
        }))
        .unwrap();
        assert_eq!(full.status, SendStatus::Skipped);
        assert_eq!(full.name, "A");

        let legacy: SendResult = serde_json::from_value(serde_json::json!({
            "recipient": "b@x.com",
            "success": false,
            "message": "auth failed"
        }))
        .unwrap();
        assert_eq!(legacy.email, "b@x.com");
        assert_eq!(legacy.status, SendStatus::Failed);

        let broken = serde_json::from_value::<SendResult>(serde_json::json!({
            "email": "c@x.com",
            "message": "?"
        }));
        assert!(broken.is_err());
    }

    #[test]
    fn test_summary_fail_recovered_when_absent() {
        let summary: SendSummary = serde_json::from_value(serde_json::json!({
            "total": 10,
            "success": 6,
            "skipped": 1
        }))
        .unwrap();

        assert_eq!(summary.fail_count(), 3);
        assert!(summary.is_consistent());

        let inconsistent = SendSummary::new(5, 3, 1);
        assert!(!inconsistent.is_consistent());
    }

    #[test]
    fn test_summary_with_huge_counts_is_inconsistent() {
        let summary: SendSummary = serde_json::from_value(serde_json::json!({
            "total": 3,
            "success": 4294967295u32,
            "fail": 1
        }))
        .unwrap();
        assert!(!summary.is_consistent());

        let summary = SendSummary::new(u32::MAX, u32::MAX, 0).with_skipped(u32::MAX);
        assert!(!summary.is_consistent());
        assert!(SendSummary::new(u32::MAX, u32::MAX, 0).is_consistent());
    }

    #[test]
    fn test_summary_from_results() {
        let results = vec![
            SendResult::new("a@x.com", SendStatus::Success, "ok"),
            SendResult::new("b@x.com", SendStatus::Failed, "auth"),
            SendResult::new("c@x.com", SendStatus::Skipped, "no file"),
            SendResult::new("d@x.com", SendStatus::Success, "ok"),
        ];

        let summary = SendSummary::from_results(&results);
        assert_eq!(summary, SendSummary::new(4, 2, 1).with_skipped(1));
        assert!(summary.is_consistent());
    }

    #[test]
    fn test_diagnosis_partial_payload() {
        let diagnosis: Diagnosis = serde_json::from_value(serde_json::json!({
            "network": {"status": "success", "message": "reachable"},
            "port": {"status": "warning", "message": "465 usually needs SSL"},
            "recommendations": ["enable SSL"]
        }))
        .unwrap();

        assert_eq!(diagnosis.port.status, CheckStatus::Warning);
        assert_eq!(diagnosis.ssl_tls.status, CheckStatus::Pending);
        assert!(!diagnosis.has_errors());
    }
}
