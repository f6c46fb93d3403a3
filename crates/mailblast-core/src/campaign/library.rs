//! Config library - saved templates and sender profiles on the persistence service

use super::settings::CampaignConfig;
use crate::service::CampaignService;
use mailblast_common::types::{Created, NamedSenderProfile, NamedTemplate};
use mailblast_common::Result;
use std::sync::Arc;
use tracing::info;

/// Reads, saves and deletes named snapshots. Saving under an existing name
/// updates it on the remote side.
#[derive(Clone)]
pub struct ConfigLibrary {
    service: Arc<dyn CampaignService>,
}

impl ConfigLibrary {
    pub fn new(service: Arc<dyn CampaignService>) -> Self {
        Self { service }
    }

    pub async fn templates(&self) -> Result<Vec<NamedTemplate>> {
        self.service.list_templates().await
    }

    /// Find a template by id, falling back to name
    pub async fn find_template(&self, key: &str) -> Result<Option<NamedTemplate>> {
        let templates = self.templates().await?;
        Ok(find_by_key(templates, key, |t| (&t.id, &t.name)))
    }

    pub async fn save_template(&self, config: &CampaignConfig, name: &str) -> Result<Created> {
        let template = config.template_snapshot(name)?;
        let created = self.service.create_template(&template).await?;
        info!(template = %template.name, id = %created.id, "Template saved");
        Ok(created)
    }

    pub async fn delete_template(&self, id: &str) -> Result<()> {
        self.service.delete_template(id).await?;
        info!(id = %id, "Template deleted");
        Ok(())
    }

    pub async fn sender_profiles(&self) -> Result<Vec<NamedSenderProfile>> {
        self.service.list_sender_profiles().await
    }

    /// Find a sender profile or provider preset by id, falling back to name
    pub async fn find_sender_profile(&self, key: &str) -> Result<Option<NamedSenderProfile>> {
        let profiles = self.sender_profiles().await?;
        Ok(find_by_key(profiles, key, |p| (&p.id, &p.name)))
    }

    /// Persist the non-secret sender fields under `name`
    pub async fn save_sender_profile(
        &self,
        config: &CampaignConfig,
        name: &str,
    ) -> Result<Created> {
        let profile = config.sender_profile_snapshot(name)?;
        let created = self.service.create_sender_profile(&profile).await?;
        info!(profile = %profile.name, id = %created.id, "Sender profile saved");
        Ok(created)
    }

    pub async fn delete_sender_profile(&self, id: &str) -> Result<()> {
        self.service.delete_sender_profile(id).await?;
        info!(id = %id, "Sender profile deleted");
        Ok(())
    }
}

fn find_by_key<T>(items: Vec<T>, key: &str, keys: impl Fn(&T) -> (&String, &String)) -> Option<T> {
    let key = key.trim();
    let mut by_name = None;
    for item in items {
        let (id_match, name_match) = {
            let (id, name) = keys(&item);
            (id == key, name == key)
        };
        if id_match {
            return Some(item);
        }
        if by_name.is_none() && name_match {
            by_name = Some(item);
        }
    }
    by_name
}
