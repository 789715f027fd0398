//! Master-key ceremony for Hyper Protect Crypto Services, driven through the
//! `ibmcloud tke` CLI plugin.
//!
//! The plugin is interactive only, so every step runs in a pseudo-terminal and
//! answers the prompts it prints. Its tables are scraped back into records to
//! pick up the KEYNUMs the next step needs.

pub mod ceremony;
pub mod driver;
pub mod params;
pub mod table;

pub use ceremony::{
    Ceremony, CeremonyConfig, CeremonyReport, DEFAULT_TIMEOUT, added_keynum, assemble_keynums,
    keynum_for,
};
pub use driver::{CliDriver, DriverError, Exchange, PtyDriver};
pub use params::{CeremonyParams, MasterKeyPart, ParamsError, Thresholds};
pub use table::{Record, Table, TableError, parse_table, strip_ansi};

use thiserror::Error;

use crate::error::ConfigError;

#[derive(Debug, Error)]
pub enum CeremonyError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Params(#[from] ParamsError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to prepare TKE workspace {path}: {source}")]
    Workspace {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
