//! ibmcloud-ops - IBM Cloud automation helpers
//!
//! Ansible inventory from Terraform state, HPCS master-key ceremonies through the
//! TKE CLI plugin, and Cloud Object Storage transfers for the TKE workspace.

pub mod cli;
pub mod cos;
pub mod error;
pub mod inventory;
pub mod terraform;
pub mod tke;

pub use cos::{CosClient, CosConfig, CosError, ObjectStore, TkeWorkspace};
pub use error::{ConfigError, Error};
pub use inventory::{HostEntry, Inventory, InventoryError};
pub use terraform::{StateResource, TerraformError};
pub use tke::{Ceremony, CeremonyConfig, CeremonyError, CeremonyParams, PtyDriver};

/// Installs the stderr `fmt` subscriber shared by the binaries; `RUST_LOG` picks the level.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}
