//! Ansible dynamic inventory built from Terraform state.
//!
//! Output shape follows the Ansible dynamic-inventory contract:
//! `{ "<group>": { "hosts": [..] }, "_meta": { "hostvars": { "<host>": {..} } } }`.

pub mod config;
mod host;

pub use host::{GROUP_TAG_PREFIX, HostEntry, ResourceKind, parse_group_tags};

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::terraform::{StateResource, TerraformError};

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("resource {resource} is missing attribute '{attribute}'")]
    MissingAttribute { resource: String, attribute: String },

    #[error(transparent)]
    State(#[from] TerraformError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Group {
    pub hosts: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Meta {
    pub hostvars: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Inventory {
    #[serde(flatten)]
    pub groups: BTreeMap<String, Group>,
    #[serde(rename = "_meta")]
    pub meta: Meta,
}

impl Inventory {
    /// Builds the inventory; any missing projected attribute aborts the whole conversion.
    pub fn from_resources(resources: &[StateResource]) -> Result<Self, InventoryError> {
        let mut inventory = Self::default();
        for resource in resources {
            if let Some(entry) = HostEntry::from_resource(resource)? {
                inventory.add_host(entry);
            }
        }
        tracing::debug!(
            hosts = inventory.meta.hostvars.len(),
            groups = inventory.groups.len(),
            "inventory built"
        );
        Ok(inventory)
    }

    pub fn add_host(&mut self, entry: HostEntry) {
        for group in &entry.groups {
            let hosts = &mut self.groups.entry(group.clone()).or_default().hosts;
            if !hosts.contains(&entry.name) {
                hosts.push(entry.name.clone());
            }
        }
        if let Some(previous) = self.meta.hostvars.insert(entry.name.clone(), entry.attributes) {
            // Last resource wins
            tracing::warn!(
                host = %entry.name,
                replaced_id = previous.get("id").map(String::as_str).unwrap_or("-"),
                "duplicate host name, hostvars replaced"
            );
        }
    }

    pub fn host_vars(&self, host: &str) -> Option<&BTreeMap<String, String>> {
        self.meta.hostvars.get(host)
    }

    pub fn to_json(&self) -> Value {
        // NOTE: Serialization of string maps cannot fail
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
