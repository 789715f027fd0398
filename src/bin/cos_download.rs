use color_eyre::eyre::{Result, bail};

use ibmcloud_ops::cos::{CosClient, CosConfig, TkeWorkspace, transfer};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    ibmcloud_ops::init_tracing();

    let config = CosConfig::from_env()?;
    let client = CosClient::new(&config)?;

    // NOTE: INPUT_FILE_NAME selects a single object; otherwise restore the TKE workspace
    if let Some(key) = std::env::var("INPUT_FILE_NAME").ok().filter(|k| !k.trim().is_empty()) {
        let dest = std::env::current_dir()?;
        match transfer::download(&client, key.trim(), &dest).await {
            Some(path) => println!("{}", path.display()),
            None => bail!("download of '{}' from bucket '{}' failed", key.trim(), client.bucket()),
        }
        return Ok(());
    }

    let workspace = TkeWorkspace::from_env()?;
    let restored = workspace.restore(&client).await?;
    tracing::info!(dir = %workspace.dir().display(), restored, "TKE workspace ready");
    println!("{}", workspace.dir().display());
    Ok(())
}
