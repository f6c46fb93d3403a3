//! Recipient set - the working list of addressees of a campaign
//!
//! Identity is the email address. Single-record mutations validate identity;
//! bulk replacement collapses duplicates instead of rejecting them.

use mailblast_common::types::{is_valid_email, Recipient, RecipientPatch};
use mailblast_common::ValidationError;
use std::collections::HashMap;
use tracing::debug;

/// Ordered set of recipients keyed by email
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientSet {
    entries: Vec<Recipient>,
}

impl RecipientSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set the same way a bulk import is installed
    pub fn from_list(list: Vec<Recipient>) -> Self {
        let mut set = Self::new();
        set.replace_all(list);
        set
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recipients in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Recipient> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[Recipient] {
        &self.entries
    }

    pub fn emails(&self) -> Vec<&str> {
        self.entries.iter().map(|r| r.email.as_str()).collect()
    }

    pub fn get(&self, email: &str) -> Option<&Recipient> {
        let email = email.trim();
        self.entries.iter().find(|r| r.email == email)
    }

    pub fn contains(&self, email: &str) -> bool {
        self.get(email).is_some()
    }

    pub fn first(&self) -> Option<&Recipient> {
        self.entries.first()
    }

    /// Add a single recipient. Rejects malformed and already present emails.
    pub fn add(&mut self, mut recipient: Recipient) -> Result<(), ValidationError> {
        recipient.email = recipient.email.trim().to_string();

        if !is_valid_email(&recipient.email) {
            return Err(ValidationError::InvalidEmail(recipient.email));
        }

        if self.contains(&recipient.email) {
            return Err(ValidationError::DuplicateRecipient(recipient.email));
        }

        debug!(email = %recipient.email, "Adding recipient");
        self.entries.push(recipient);
        Ok(())
    }

    /// Edit a recipient in place. The email itself cannot change here.
    pub fn edit(
        &mut self,
        email: &str,
        patch: RecipientPatch,
    ) -> Result<&Recipient, ValidationError> {
        let email = email.trim();
        let recipient = self
            .entries
            .iter_mut()
            .find(|r| r.email == email)
            .ok_or_else(|| ValidationError::RecipientNotFound(email.to_string()))?;

        patch.apply(recipient);
        Ok(&*recipient)
    }

    pub fn remove(&mut self, email: &str) -> Result<Recipient, ValidationError> {
        let email = email.trim();
        let index = self
            .entries
            .iter()
            .position(|r| r.email == email)
            .ok_or_else(|| ValidationError::RecipientNotFound(email.to_string()))?;

        Ok(self.entries.remove(index))
    }

    /// Replace the whole set. Duplicate emails in `list` collapse to their last
    /// occurrence. Returns the number of entries dropped by collapsing.
    pub fn replace_all(&mut self, list: Vec<Recipient>) -> usize {
        let incoming = list.len();

        let mut last_index: HashMap<String, usize> = HashMap::with_capacity(incoming);
        let mut trimmed = Vec::with_capacity(incoming);
        for (index, mut recipient) in list.into_iter().enumerate() {
            recipient.email = recipient.email.trim().to_string();
            last_index.insert(recipient.email.clone(), index);
            trimmed.push(recipient);
        }

        self.entries = trimmed
            .into_iter()
            .enumerate()
            .filter(|(index, r)| last_index.get(&r.email) == Some(index))
            .map(|(_, r)| r)
            .collect();

        let collapsed = incoming - self.entries.len();
        if collapsed > 0 {
            debug!(collapsed, "Collapsed duplicate emails in bulk list");
        }
        collapsed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn into_vec(self) -> Vec<Recipient> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> RecipientSet {
        let mut set = RecipientSet::new();
        set.add(Recipient::new("a@x.com", "A")).unwrap();
        set.add(Recipient::new("b@x.com", "B")).unwrap();
        set
    }

    #[test]
    fn test_duplicate_add_is_rejected() {
        let mut set = sample();

        let err = set.add(Recipient::new("a@x.com", "Another A")).unwrap_err();
        assert_eq!(err, ValidationError::DuplicateRecipient("a@x.com".to_string()));
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("a@x.com").unwrap().name, "A");
    }

    #[test]
    fn test_add_trims_before_comparing() {
        let mut set = sample();
        let err = set.add(Recipient::new("  b@x.com ", "B")).unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateRecipient(_)));
    }

    #[test]
    fn test_add_rejects_invalid_email() {
        let mut set = RecipientSet::new();
        let err = set.add(Recipient::new("nobody", "N")).unwrap_err();
        assert_eq!(err, ValidationError::InvalidEmail("nobody".to_string()));
        assert!(set.is_empty());
    }

    #[test]
    fn test_edit_by_email() {
        let mut set = sample();

        let patch = RecipientPatch {
            name: Some("Bea".to_string()),
            attachment: Some(Some("bonus.pdf".to_string())),
            ..Default::default()
        };
        let edited = set.edit("b@x.com", patch).unwrap();
        assert_eq!(edited.name, "Bea");
        assert_eq!(edited.email, "b@x.com");
        assert_eq!(edited.attachment.as_deref(), Some("bonus.pdf"));
    }

    #[test]
    fn test_edit_missing_recipient() {
        let mut set = sample();
        let err = set.edit("zz@x.com", RecipientPatch::default()).unwrap_err();
        assert_eq!(err, ValidationError::RecipientNotFound("zz@x.com".to_string()));
    }

    #[test]
    fn test_remove() {
        let mut set = sample();
        let removed = set.remove("a@x.com").unwrap();
        assert_eq!(removed.name, "A");
        assert_eq!(set.emails(), vec!["b@x.com"]);
        assert!(set.remove("a@x.com").is_err());
    }

    #[test]
    fn test_replace_all_last_write_wins() {
        let mut set = sample();

        let collapsed = set.replace_all(vec![
            Recipient::new("c@x.com", "C1"),
            Recipient::new("d@x.com", "D"),
            Recipient::new("c@x.com", "C2"),
        ]);

        assert_eq!(collapsed, 1);
        assert_eq!(set.emails(), vec!["d@x.com", "c@x.com"]);
        assert_eq!(set.get("c@x.com").unwrap().name, "C2");
    }

    #[test]
    fn test_replace_all_skips_validation() {
        let set = RecipientSet::from_list(vec![Recipient::new("not-an-email", "X")]);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let mut set = RecipientSet::new();
        for email in ["z@x.com", "m@x.com", "a@x.com"] {
            set.add(Recipient::new(email, "")).unwrap();
        }
        assert_eq!(set.emails(), vec!["z@x.com", "m@x.com", "a@x.com"]);
    }
}
