use std::collections::BTreeMap;

use crate::terraform::StateResource;

use super::InventoryError;

pub const GROUP_TAG_PREFIX: &str = "group:";

/// Terraform resource types that map onto inventory hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    ComputeInstance,
    LoadBalancer,
    ResourceInstance,
}

impl ResourceKind {
    pub fn from_type(resource_type: &str) -> Option<Self> {
        match resource_type {
            "ibm_compute_vm_instance" => Some(Self::ComputeInstance),
            "ibm_lbaas" => Some(Self::LoadBalancer),
            "ibm_resource_instance" => Some(Self::ResourceInstance),
            _ => None,
        }
    }

    pub fn resource_type(&self) -> &'static str {
        match self {
            Self::ComputeInstance => "ibm_compute_vm_instance",
            Self::LoadBalancer => "ibm_lbaas",
            Self::ResourceInstance => "ibm_resource_instance",
        }
    }

    /// Attribute that names the host.
    pub fn name_attribute(&self) -> &'static str {
        match self {
            Self::ComputeInstance => "hostname",
            Self::LoadBalancer | Self::ResourceInstance => "name",
        }
    }

    /// State attributes copied verbatim into hostvars.
    pub fn projection(&self) -> &'static [&'static str] {
        match self {
            Self::ComputeInstance => &[
                "id",
                "hostname",
                "domain",
                "datacenter",
                "ipv4_address",
                "ipv4_address_private",
            ],
            Self::LoadBalancer => &["id", "name", "vip", "datacenter", "type"],
            Self::ResourceInstance => &["id", "name", "service", "plan", "location"],
        }
    }

    fn implicit_groups(&self, attributes: &BTreeMap<String, String>) -> Vec<String> {
        match self {
            Self::ComputeInstance => Vec::new(),
            Self::LoadBalancer => vec!["lbaas".to_string()],
            Self::ResourceInstance => match attributes.get("service").map(String::as_str) {
                Some("internet-svcs") => vec!["cis".to_string()],
                Some(service) => vec![service.to_string()],
                None => Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostEntry {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub groups: Vec<String>,
}

impl HostEntry {
    /// Returns `Ok(None)` for resource types that do not describe a host.
    pub fn from_resource(resource: &StateResource) -> Result<Option<Self>, InventoryError> {
        let Some(kind) = ResourceKind::from_type(&resource.resource_type) else {
            tracing::trace!(key = %resource.key, resource_type = %resource.resource_type, "skipping resource");
            return Ok(None);
        };

        let lookup = |attribute: &str| {
            resource
                .attribute(attribute)
                .map(str::to_string)
                .ok_or_else(|| InventoryError::MissingAttribute {
                    resource: resource.key.clone(),
                    attribute: attribute.to_string(),
                })
        };

        let name = lookup(kind.name_attribute())?;

        let mut attributes = BTreeMap::new();
        for attribute in kind.projection() {
            attributes.insert(attribute.to_string(), lookup(attribute)?);
        }
        if kind == ResourceKind::ComputeInstance {
            attributes.insert("ansible_host".to_string(), lookup("ipv4_address")?);
        }

        let mut groups = kind.implicit_groups(&attributes);
        for group in parse_group_tags(&resource.attributes) {
            if !groups.contains(&group) {
                groups.push(group);
            }
        }

        Ok(Some(Self {
            name,
            attributes,
            groups,
        }))
    }
}

/// Collects `group:<name>` values from the flat-map `tags.*` attributes.
///
/// Tags without the prefix, or with an empty group name, are ignored.
pub fn parse_group_tags(attributes: &BTreeMap<String, String>) -> Vec<String> {
    let mut groups = Vec::new();
    for (key, value) in attributes {
        let Some(suffix) = key.strip_prefix("tags.") else {
            continue;
        };
        if suffix == "#" || suffix == "%" {
            continue;
        }
        match value.trim().strip_prefix(GROUP_TAG_PREFIX) {
            Some(group) if !group.is_empty() => {
                if !groups.iter().any(|g| g == group) {
                    groups.push(group.to_string());
                }
            }
            _ => tracing::trace!(tag = %value, "ignoring non-group tag"),
        }
    }
    groups
}
