use std::path::{Path, PathBuf};

use ini::Ini;

use crate::error::ConfigError;

pub const CONFIG_FILE_NAME: &str = "terraform_inv.ini";
pub const STATE_SECTION: &str = "TFSTATE";
pub const STATE_KEY: &str = "TFSTATE_FILE";

/// Candidate locations for the ini file, relative to `base`, in lookup order.
pub fn config_candidates(base: &Path) -> [PathBuf; 2] {
    [
        base.join(CONFIG_FILE_NAME),
        base.join("inventory").join(CONFIG_FILE_NAME),
    ]
}

pub fn find_config(base: &Path) -> Result<PathBuf, ConfigError> {
    config_candidates(base)
        .into_iter()
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| ConfigError::MissingFile {
            name: CONFIG_FILE_NAME.to_string(),
            searched: base.display().to_string(),
        })
}

/// Reads `TFSTATE_FILE` from the `[TFSTATE]` section. The value is returned as written.
pub fn state_path_from_ini(ini_path: &Path) -> Result<PathBuf, ConfigError> {
    let conf = Ini::load_from_file(ini_path).map_err(|e| ConfigError::Invalid {
        path: ini_path.display().to_string(),
        message: e.to_string(),
    })?;

    let section = conf
        .section(Some(STATE_SECTION))
        .ok_or_else(|| ConfigError::MissingKey {
            path: ini_path.display().to_string(),
            key: format!("[{}]", STATE_SECTION),
        })?;

    let value = section
        .get(STATE_KEY)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingKey {
            path: ini_path.display().to_string(),
            key: format!("[{}] {}", STATE_SECTION, STATE_KEY),
        })?;

    Ok(PathBuf::from(value))
}

/// Resolves the state file: explicit flag first, then the ini file under `base`.
pub fn resolve_state_path(explicit: Option<&Path>, base: &Path) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let ini_path = find_config(base)?;
    tracing::debug!(config = %ini_path.display(), "using inventory config");
    state_path_from_ini(&ini_path)
}
