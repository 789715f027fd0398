use color_eyre::eyre::{Result, bail};

use ibmcloud_ops::cos::{CosClient, CosConfig, TkeWorkspace};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    ibmcloud_ops::init_tracing();

    let config = CosConfig::from_env()?;
    let client = CosClient::new(&config)?;
    let workspace = TkeWorkspace::from_env()?;

    if !workspace.publish(&client).await? {
        bail!(
            "upload of '{}' to bucket '{}' failed; archive kept at {}",
            workspace.archive_key(),
            client.bucket(),
            workspace.archive_path().display()
        );
    }
    println!("{}", workspace.archive_key());
    Ok(())
}
