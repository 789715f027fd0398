use std::path::PathBuf;

use clap::Parser;

// NOTE: Inventory scripts answer -v/--version, so clap's -V flag is replaced
/// Ansible dynamic inventory from IBM Cloud Terraform state.
#[derive(Parser, Debug)]
#[command(name = "terraform-inventory", disable_version_flag = true)]
pub struct InventoryArgs {
    /// List all groups and hosts (the default action)
    #[arg(long, default_value_t = true)]
    pub list: bool,

    /// Print the variables of a single host
    #[arg(long, value_name = "HOST", conflicts_with = "version")]
    pub host: Option<String>,

    /// Path to the Terraform state file (default: TFSTATE_FILE from terraform_inv.ini)
    #[arg(short = 't', long, value_name = "PATH")]
    pub tfstate: Option<PathBuf>,

    /// Print the version and exit
    #[arg(short = 'v', long)]
    pub version: bool,
}

pub fn version_string() -> String {
    format!("terraform-inventory {}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_is_default() {
        let args = InventoryArgs::parse_from(["terraform-inventory"]);
        assert!(args.list);
        assert!(args.tfstate.is_none());
        assert!(!args.version);
    }

    #[test]
    fn test_list_flag_accepted() {
        let args = InventoryArgs::parse_from(["terraform-inventory", "--list"]);
        assert!(args.list);
    }

    #[test]
    fn test_tfstate_short_flag() {
        let args = InventoryArgs::parse_from(["terraform-inventory", "-t", "/work/terraform.tfstate"]);
        assert_eq!(args.tfstate, Some(PathBuf::from("/work/terraform.tfstate")));
    }

    #[test]
    fn test_tfstate_long_flag() {
        let args = InventoryArgs::parse_from([
            "terraform-inventory",
            "--list",
            "--tfstate=/work/terraform.tfstate",
        ]);
        assert_eq!(args.tfstate, Some(PathBuf::from("/work/terraform.tfstate")));
    }

    #[test]
    fn test_version_short_flag() {
        let args = InventoryArgs::parse_from(["terraform-inventory", "-v"]);
        assert!(args.version);
    }

    #[test]
    fn test_version_long_flag() {
        let args = InventoryArgs::parse_from(["terraform-inventory", "--version"]);
        assert!(args.version);
    }

    #[test]
    fn test_host_flag() {
        let args = InventoryArgs::parse_from(["terraform-inventory", "--host", "web01"]);
        assert_eq!(args.host.as_deref(), Some("web01"));
    }

    #[test]
    fn test_version_string() {
        assert!(version_string().starts_with("terraform-inventory "));
    }
}
