use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use super::TerraformError;

/// Terraform state parser for inventory generation.
///
/// Accepts both the legacy `modules[].resources{}` layout (flat-map attributes)
/// and the v4 `resources[].instances[]` layout (nested attributes). Nested v4
/// attributes are flattened into the legacy shape so downstream code only ever
/// sees `key`, `key.#` and `key.<n>` string entries.
#[derive(Debug, Clone, PartialEq)]
pub struct StateResource {
    pub module: String,
    pub key: String,
    pub resource_type: String,
    pub attributes: BTreeMap<String, String>,
}

impl StateResource {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

#[derive(Debug, Deserialize)]
struct LegacyState {
    modules: Vec<LegacyModule>,
}

#[derive(Debug, Deserialize)]
struct LegacyModule {
    #[serde(default)]
    path: Vec<String>,
    #[serde(default)]
    resources: BTreeMap<String, LegacyResource>,
}

#[derive(Debug, Deserialize)]
struct LegacyResource {
    #[serde(rename = "type")]
    type_: String,
    primary: LegacyInstance,
}

#[derive(Debug, Deserialize)]
struct LegacyInstance {
    #[serde(default)]
    attributes: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct StateV4 {
    #[serde(default)]
    resources: Vec<ResourceV4>,
}

#[derive(Debug, Deserialize)]
struct ResourceV4 {
    #[serde(default)]
    module: Option<String>,
    #[serde(default)]
    mode: Option<String>,
    #[serde(rename = "type")]
    type_: String,
    name: String,
    #[serde(default)]
    instances: Vec<InstanceV4>,
}

#[derive(Debug, Deserialize)]
struct InstanceV4 {
    #[serde(default)]
    index_key: Option<Value>,
    #[serde(default)]
    attributes: serde_json::Map<String, Value>,
}

pub fn load_state(path: &Path) -> Result<Vec<StateResource>, TerraformError> {
    let raw = std::fs::read_to_string(path).map_err(|source| TerraformError::Read {
        path: path.display().to_string(),
        source,
    })?;
    tracing::debug!(path = %path.display(), bytes = raw.len(), "read terraform state");
    parse_state(&raw)
}

pub fn parse_state(raw: &str) -> Result<Vec<StateResource>, TerraformError> {
    let document: Value = serde_json::from_str(raw)?;

    // NOTE: v3 and older carry a top-level "modules" array; v4 replaced it with "resources"
    if document.get("modules").is_some() {
        let state: LegacyState = serde_json::from_value(document)?;
        Ok(from_legacy(state))
    } else if document.get("resources").is_some() {
        let state: StateV4 = serde_json::from_value(document)?;
        Ok(from_v4(state))
    } else {
        Err(TerraformError::UnsupportedLayout)
    }
}

fn from_legacy(state: LegacyState) -> Vec<StateResource> {
    let mut resources = Vec::new();
    for module in state.modules {
        let module_path = module.path.join(".");
        for (key, resource) in module.resources {
            resources.push(StateResource {
                module: module_path.clone(),
                key,
                resource_type: resource.type_,
                attributes: resource.primary.attributes,
            });
        }
    }
    resources
}

fn from_v4(state: StateV4) -> Vec<StateResource> {
    let mut resources = Vec::new();
    for resource in state.resources {
        if resource.mode.as_deref() == Some("data") {
            continue;
        }
        let module = resource.module.unwrap_or_else(|| "root".to_string());
        let base_key = format!("{}.{}", resource.type_, resource.name);
        for instance in resource.instances {
            let key = match &instance.index_key {
                Some(Value::Number(n)) => format!("{}.{}", base_key, n),
                Some(Value::String(s)) => format!("{}[\"{}\"]", base_key, s),
                _ => base_key.clone(),
            };
            let mut attributes = BTreeMap::new();
            for (name, value) in &instance.attributes {
                flatten_into(&mut attributes, name, value);
            }
            resources.push(StateResource {
                module: module.clone(),
                key,
                resource_type: resource.type_.clone(),
                attributes,
            });
        }
    }
    resources
}

/// Flattens a nested JSON value into Terraform's legacy flat-map encoding.
pub fn flatten_into(out: &mut BTreeMap<String, String>, prefix: &str, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        Value::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        Value::Number(n) => {
            out.insert(prefix.to_string(), n.to_string());
        }
        Value::Array(items) => {
            out.insert(format!("{}.#", prefix), items.len().to_string());
            for (i, item) in items.iter().enumerate() {
                flatten_into(out, &format!("{}.{}", prefix, i), item);
            }
        }
        Value::Object(map) => {
            out.insert(format!("{}.%", prefix), map.len().to_string());
            for (k, v) in map {
                flatten_into(out, &format!("{}.{}", prefix, k), v);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY: &str = r#"{
        "version": 3,
        "terraform_version": "0.11.14",
        "modules": [
            {
                "path": ["root"],
                "resources": {
                    "ibm_compute_vm_instance.web": {
                        "type": "ibm_compute_vm_instance",
                        "primary": {
                            "id": "1234",
                            "attributes": {
                                "id": "1234",
                                "hostname": "web01",
                                "tags.#": "1",
                                "tags.2771632428": "group:web"
                            }
                        }
                    }
                }
            }
        ]
    }"#;

    #[test]
    fn test_parse_legacy_state() {
        let resources = parse_state(LEGACY).unwrap();
        assert_eq!(resources.len(), 1);
        let vm = &resources[0];
        assert_eq!(vm.module, "root");
        assert_eq!(vm.key, "ibm_compute_vm_instance.web");
        assert_eq!(vm.resource_type, "ibm_compute_vm_instance");
        assert_eq!(vm.attribute("hostname"), Some("web01"));
        assert_eq!(vm.attribute("tags.2771632428"), Some("group:web"));
    }

    #[test]
    fn test_parse_v4_state_flattens_attributes() {
        let raw = r#"{
            "version": 4,
            "resources": [
                {
                    "mode": "managed",
                    "type": "ibm_compute_vm_instance",
                    "name": "web",
                    "instances": [
                        {
                            "index_key": 0,
                            "attributes": {
                                "id": 1234,
                                "hostname": "web01",
                                "hourly_billing": true,
                                "notes": null,
                                "tags": ["group:web", "env:prod"]
                            }
                        }
                    ]
                },
                {
                    "mode": "data",
                    "type": "ibm_compute_ssh_key",
                    "name": "key",
                    "instances": [{ "attributes": { "id": "1" } }]
                }
            ]
        }"#;

        let resources = parse_state(raw).unwrap();
        assert_eq!(resources.len(), 1);
        let vm = &resources[0];
        assert_eq!(vm.module, "root");
        assert_eq!(vm.key, "ibm_compute_vm_instance.web.0");
        assert_eq!(vm.attribute("id"), Some("1234"));
        assert_eq!(vm.attribute("hourly_billing"), Some("true"));
        assert_eq!(vm.attribute("notes"), None);
        assert_eq!(vm.attribute("tags.#"), Some("2"));
        assert_eq!(vm.attribute("tags.0"), Some("group:web"));
        assert_eq!(vm.attribute("tags.1"), Some("env:prod"));
    }

    #[test]
    fn test_flatten_nested_object() {
        let mut out = BTreeMap::new();
        flatten_into(
            &mut out,
            "network",
            &serde_json::json!({"vlan": 42, "subnets": ["a"]}),
        );
        assert_eq!(out.get("network.%").map(String::as_str), Some("2"));
        assert_eq!(out.get("network.vlan").map(String::as_str), Some("42"));
        assert_eq!(out.get("network.subnets.#").map(String::as_str), Some("1"));
        assert_eq!(out.get("network.subnets.0").map(String::as_str), Some("a"));
    }

    #[test]
    fn test_malformed_state_is_error() {
        let result = parse_state("{ not json");
        assert!(matches!(result, Err(TerraformError::Parse(_))));
    }

    #[test]
    fn test_unknown_layout_is_error() {
        let result = parse_state(r#"{"version": 4}"#);
        assert!(matches!(result, Err(TerraformError::UnsupportedLayout)));
    }

    #[test]
    fn test_legacy_missing_primary_is_parse_error() {
        let raw = r#"{"modules": [{"resources": {"x.y": {"type": "x"}}}]}"#;
        assert!(matches!(parse_state(raw), Err(TerraformError::Parse(_))));
    }

    #[test]
    fn test_load_state_missing_file() {
        let result = load_state(Path::new("/nonexistent/terraform.tfstate"));
        match result {
            Err(TerraformError::Read { path, .. }) => {
                assert_eq!(path, "/nonexistent/terraform.tfstate")
            }
            other => panic!("expected Read error, got {:?}", other),
        }
    }
}
