//! Personalizer - Resolves `{{token}}` placeholders against a recipient

use crate::recipients::RecipientSet;
use lazy_static::lazy_static;
use mailblast_common::types::{MessageDraft, Recipient};
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::BTreeSet;

lazy_static! {
    // `{{name}}`, `{{ name }}`, `{{attributes.plan}}`. Anything else stays untouched.
    static ref TOKEN_REGEX: Regex =
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\}\}").unwrap();
}

/// Tokens resolved from named recipient fields
pub const BUILTIN_TOKENS: [&str; 5] = ["name", "email", "first_name", "last_name", "attachment"];

/// Extra fields recognized even when no recipient carries them
const DEFAULT_FIELDS: [&str; 1] = ["department"];

/// A subject and body rendered for one recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedMessage {
    pub email: String,
    pub subject: String,
    pub body: String,
}

/// Personalizer for subject and body text
///
/// Resolution order for a token: named recipient fields, then the recipient's
/// field mapping, then `[token]` if the token is a recognized extra field.
/// Unrecognized tokens are left in place.
#[derive(Debug, Clone)]
pub struct Personalizer {
    known_fields: BTreeSet<String>,
}

impl Default for Personalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Personalizer {
    /// Create a personalizer that recognizes the built-in tokens and `department`
    pub fn new() -> Self {
        Self {
            known_fields: DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Also recognize every extra field carried by any recipient of `set`
    pub fn for_recipients(set: &RecipientSet) -> Self {
        let mut personalizer = Self::new();
        for recipient in set.iter() {
            personalizer
                .known_fields
                .extend(recipient.fields.keys().cloned());
        }
        personalizer
    }

    pub fn with_known_field(mut self, field: impl Into<String>) -> Self {
        self.known_fields.insert(field.into());
        self
    }

    pub fn is_recognized(&self, token: &str) -> bool {
        BUILTIN_TOKENS.contains(&token) || self.known_fields.contains(token)
    }

    /// Render a template for one recipient
    pub fn render(&self, template: &str, recipient: &Recipient) -> String {
        TOKEN_REGEX
            .replace_all(template, |caps: &Captures| {
                let token = &caps[1];
                self.resolve(token, recipient)
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Render both subject and body of a draft
    pub fn render_message(&self, draft: &MessageDraft, recipient: &Recipient) -> RenderedMessage {
        RenderedMessage {
            email: recipient.email.clone(),
            subject: self.render(&draft.subject, recipient),
            body: self.render(&draft.body, recipient),
        }
    }

    /// Distinct tokens in `template` that no recipient could resolve
    pub fn unknown_tokens(&self, template: &str) -> Vec<String> {
        let mut seen = BTreeSet::new();
        TOKEN_REGEX
            .captures_iter(template)
            .map(|caps| caps[1].to_string())
            .filter(|token| !self.is_recognized(token))
            .filter(|token| seen.insert(token.clone()))
            .collect()
    }

    /// Distinct unresolvable tokens across subject and body, subject first
    pub fn unknown_draft_tokens(&self, draft: &MessageDraft) -> Vec<String> {
        let mut unknown = self.unknown_tokens(&draft.subject);
        for token in self.unknown_tokens(&draft.body) {
            if !unknown.contains(&token) {
                unknown.push(token);
            }
        }
        unknown
    }

    fn resolve(&self, token: &str, recipient: &Recipient) -> Option<String> {
        let value = match token {
            "name" => recipient.name.clone(),
            "email" => recipient.email.clone(),
            "first_name" => recipient
                .name
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string(),
            "last_name" => recipient
                .name
                .split_whitespace()
                .skip(1)
                .collect::<Vec<_>>()
                .join(" "),
            "attachment" => recipient.attachment.clone().unwrap_or_default(),
            field => match recipient.field(field) {
                Some(value) => value.to_string(),
                None if self.known_fields.contains(field) => format!("[{}]", field),
                None => return None,
            },
        };
        Some(value)
    }
}
