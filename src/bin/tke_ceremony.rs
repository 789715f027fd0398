use color_eyre::eyre::Result;

use ibmcloud_ops::tke::{Ceremony, CeremonyConfig, CeremonyError};

fn main() -> Result<()> {
    color_eyre::install()?;
    ibmcloud_ops::init_tracing();

    let config = CeremonyConfig::from_env()?;
    let workspace = config.workspace().dir();
    tracing::info!(
        guid = %config.hpcs_guid,
        workspace = %workspace.display(),
        parts = config.params.keys.len(),
        "starting master key ceremony"
    );

    // The TKE plugin keeps its key files in the workspace shared with cos-download/cos-upload
    std::fs::create_dir_all(&workspace).map_err(|source| CeremonyError::Workspace {
        path: workspace.display().to_string(),
        source,
    })?;

    let mut ceremony = Ceremony::new(config.driver(), &config.hpcs_guid, &config.params);
    let report = ceremony.run()?;

    tracing::info!(
        crypto_units = ?report.crypto_units,
        admin_keynum = report.admin_keynum.as_deref().unwrap_or("-"),
        loaded_keynums = %report.loaded_keynums,
        "master key ceremony complete"
    );
    Ok(())
}
