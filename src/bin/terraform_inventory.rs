use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};

use ibmcloud_ops::cli::{InventoryArgs, version_string};
use ibmcloud_ops::inventory::{Inventory, config};
use ibmcloud_ops::terraform;

fn main() -> Result<()> {
    color_eyre::install()?;
    ibmcloud_ops::init_tracing();

    let args = InventoryArgs::parse();

    if args.version {
        println!("{}", version_string());
        return Ok(());
    }

    let cwd = std::env::current_dir().wrap_err("cannot determine current directory")?;
    let state_path = config::resolve_state_path(args.tfstate.as_deref(), &cwd)?;
    let resources = terraform::load_state(&state_path)?;
    let inventory = Inventory::from_resources(&resources)?;

    let output = match &args.host {
        Some(host) => match inventory.host_vars(host) {
            Some(vars) => serde_json::to_value(vars)?,
            None => serde_json::json!({}),
        },
        None => inventory.to_json(),
    };

    tracing::info!(
        state = %state_path.display(),
        hosts = inventory.meta.hostvars.len(),
        "inventory generated"
    );
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
