use std::path::PathBuf;
use std::time::Duration;

use crate::cos::TkeWorkspace;
use crate::error::{ConfigError, optional, required};

use super::CeremonyError;
use super::driver::{CliDriver, Exchange, PtyDriver};
use super::params::CeremonyParams;
use super::table::{Record, Table, parse_table, section_after};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_PROGRAM: &str = "ibmcloud";

pub const UNIT_HEADERS: [&str; 4] = ["CRYPTO UNIT NUM", "SELECTED", "TYPE", "LOCATION"];
pub const SIGKEY_HEADERS: [&str; 3] = ["KEYNUM", "DESCRIPTION", "SUBJECT KEY IDENTIFIER"];
pub const MK_HEADERS: [&str; 3] = ["KEYNUM", "DESCRIPTION", "VERIFICATION PATTERN"];
pub const REGISTRY_HEADERS: [&str; 5] = [
    "CRYPTO UNIT NUM",
    "NEW MK STATUS",
    "NEW MK VERIFICATION PATTERN",
    "CURRENT MK STATUS",
    "CURRENT MK VERIFICATION PATTERN",
];

/// Prompt fragments printed by the TKE plugin.
pub mod prompts {
    pub const CRYPTO_UNIT_ADD: &str = "CRYPTO UNIT NUM to add";
    pub const ADMIN_NAME: &str = "Enter an administrator name to be associated with the signature key";
    pub const NEW_SIGKEY_PASSWORD: &str = "Enter a password to protect the signature key";
    pub const CONFIRM_PASSWORD: &str = "Re-enter the password to confirm";
    pub const SIGKEY_SELECT: &str = "KEYNUM of the signature key to be selected";
    pub const SIGKEY_FILE_PASSWORD: &str = "Enter the password for the signature key file";
    pub const ADMIN_ADD: &str = "KEYNUM of the administrator signature key to be added";
    pub const SIGNATURE_THRESHOLD: &str = "Enter the new signature threshold value";
    pub const REVOCATION_THRESHOLD: &str = "Enter the new revocation signature threshold value";
    pub const SIGKEY_AUTH: &str = "Enter the password for the signature key identified above";
    pub const MK_DESCRIPTION: &str = "Enter a description for the key part";
    pub const NEW_MK_PASSWORD: &str = "Enter a password to protect the key part";
    pub const MK_LOAD_KEYNUMS: &str = "KEYNUM values of the master key parts to be loaded";
    pub const MK_FILE_PASSWORD: &str = "Enter the password for key file";
}

/// Everything the ceremony binary reads from the environment.
#[derive(Debug, Clone)]
pub struct CeremonyConfig {
    pub hpcs_guid: String,
    pub tkefiles: PathBuf,
    pub program: String,
    pub timeout: Duration,
    pub params: CeremonyParams,
}

impl CeremonyConfig {
    pub fn from_env() -> Result<Self, CeremonyError> {
        Self::from_lookup(crate::error::process_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CeremonyError> {
        let hpcs_guid = required(&lookup, "HPCS_GUID")?;
        let tkefiles = PathBuf::from(required(&lookup, "CLOUDTKEFILES")?);
        let program = optional(&lookup, "TKE_CLI").unwrap_or_else(|| DEFAULT_PROGRAM.to_string());
        let timeout = match optional(&lookup, "TKE_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "TKE_TIMEOUT_SECS".to_string(),
                message: format!("expected whole seconds, got '{}'", raw),
            })?),
            None => DEFAULT_TIMEOUT,
        };
        let params = CeremonyParams::from_input(&required(&lookup, "INPUT_FILE")?)?;

        Ok(Self {
            hpcs_guid,
            tkefiles,
            program,
            timeout,
            params,
        })
    }

    /// Directory the TKE plugin reads and writes key files in; `cos-download`
    /// restores it and `cos-upload` archives it.
    pub fn workspace(&self) -> TkeWorkspace {
        TkeWorkspace::new(&self.tkefiles, &self.hpcs_guid)
    }

    /// Driver whose child processes see `CLOUDTKEFILES` pointing at the workspace directory.
    pub fn driver(&self) -> PtyDriver {
        PtyDriver::tke(self.program.clone(), self.timeout).with_env(
            "CLOUDTKEFILES",
            self.workspace().dir().display().to_string(),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CeremonyReport {
    pub crypto_units: Vec<String>,
    pub admin_keynum: Option<String>,
    pub loaded_keynums: String,
    pub registry: Option<Table>,
}

/// Reverses KEYNUMs collected while adding parts back into input order.
///
/// Parts are added last-to-first, so the collected list is the reverse of the
/// input order. Missing numbers are dropped.
pub fn assemble_keynums(processing_order: &[Option<String>]) -> String {
    processing_order
        .iter()
        .rev()
        .filter_map(|k| k.as_deref())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Linear master-key ceremony against one HPCS service instance.
pub struct Ceremony<'a, D: CliDriver> {
    driver: D,
    guid: &'a str,
    params: &'a CeremonyParams,
}

impl<'a, D: CliDriver> Ceremony<'a, D> {
    pub fn new(driver: D, guid: &'a str, params: &'a CeremonyParams) -> Self {
        Self {
            driver,
            guid,
            params,
        }
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    pub fn run(&mut self) -> Result<CeremonyReport, CeremonyError> {
        let crypto_units = self.select_crypto_units()?;
        let admin_keynum = self.ensure_signature_key()?;
        self.select_signature_key(admin_keynum.as_deref())?;
        self.add_administrator(admin_keynum.as_deref())?;
        self.set_thresholds()?;
        let collected = self.add_master_key_parts()?;
        self.load_master_keys(&collected)?;
        let loaded_keynums = assemble_keynums(&collected);
        self.step("cryptounit-mk-commit", &[], &[self.auth()])?;
        self.step("cryptounit-mk-setimm", &[], &[self.auth()])?;
        let registry = self.list_registry()?;

        Ok(CeremonyReport {
            crypto_units,
            admin_keynum,
            loaded_keynums,
            registry,
        })
    }

    fn step(
        &mut self,
        subcommand: &str,
        extra: &[String],
        exchanges: &[Exchange],
    ) -> Result<String, CeremonyError> {
        tracing::info!(step = subcommand, "running ceremony step");
        let mut args = vec![subcommand.to_string()];
        args.extend(extra.iter().cloned());
        let output = self.driver.run(&args, exchanges)?;
        println!("=== tke {} ===\n{}", subcommand, output.trim_end());
        Ok(output)
    }

    fn auth(&self) -> Exchange {
        Exchange::secret(prompts::SIGKEY_AUTH, &self.params.admin_password)
    }

    /// Lists crypto units and adds the unselected operational units of this instance.
    fn select_crypto_units(&mut self) -> Result<Vec<String>, CeremonyError> {
        let output = self.step("cryptounits", &[], &[])?;
        let marker = format!("SERVICE INSTANCE: {}", self.guid);
        let table = match section_after(&output, &marker)
            .and_then(|section| parse_table(section, &UNIT_HEADERS))
        {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!(error = %e, guid = %self.guid, "could not parse crypto units");
                return Ok(Vec::new());
            }
        };

        let operational: Vec<&Record> = table
            .rows()
            .iter()
            .filter(|row| row.get("TYPE") == Some("OPERATIONAL"))
            .collect();
        let units: Vec<String> = operational
            .iter()
            .filter_map(|row| row.get("CRYPTO UNIT NUM"))
            .map(str::to_string)
            .collect();
        let to_add: Vec<&str> = operational
            .iter()
            .filter(|row| row.get("SELECTED") != Some("true"))
            .filter_map(|row| row.get("CRYPTO UNIT NUM"))
            .collect();

        println!("{}", table.render());
        if to_add.is_empty() {
            tracing::info!(units = ?units, "all operational crypto units already selected");
            return Ok(units);
        }
        self.step(
            "cryptounit-add",
            &[],
            &[Exchange::new(prompts::CRYPTO_UNIT_ADD, to_add.join(" "))],
        )?;
        Ok(units)
    }

    /// Returns the KEYNUM of the administrator signature key, creating the key when absent.
    fn ensure_signature_key(&mut self) -> Result<Option<String>, CeremonyError> {
        let output = self.step("sigkeys", &[], &[])?;
        if let Some(keynum) = keynum_for(&output, &SIGKEY_HEADERS, &self.params.admin_name) {
            tracing::info!(keynum = %keynum, "reusing existing signature key");
            return Ok(Some(keynum));
        }

        let params = self.params;
        self.step(
            "sigkey-add",
            &[],
            &[
                Exchange::new(prompts::ADMIN_NAME, &params.admin_name),
                Exchange::secret(prompts::NEW_SIGKEY_PASSWORD, &params.admin_password),
                Exchange::secret(prompts::CONFIRM_PASSWORD, &params.admin_password),
            ],
        )?;
        let output = self.step("sigkeys", &[], &[])?;
        Ok(keynum_for(&output, &SIGKEY_HEADERS, &params.admin_name))
    }

    fn select_signature_key(&mut self, keynum: Option<&str>) -> Result<(), CeremonyError> {
        let exchanges = [
            Exchange::new(prompts::SIGKEY_SELECT, keynum.unwrap_or_default()),
            Exchange::secret(prompts::SIGKEY_FILE_PASSWORD, &self.params.admin_password),
        ];
        self.step("sigkey-sel", &[], &exchanges)?;
        Ok(())
    }

    fn add_administrator(&mut self, keynum: Option<&str>) -> Result<(), CeremonyError> {
        let exchanges = [
            Exchange::new(prompts::ADMIN_ADD, keynum.unwrap_or_default()),
            Exchange::secret(prompts::SIGKEY_FILE_PASSWORD, &self.params.admin_password),
        ];
        self.step("cryptounit-admin-add", &[], &exchanges)?;
        Ok(())
    }

    fn set_thresholds(&mut self) -> Result<(), CeremonyError> {
        let thresholds = self.params.thresholds;
        let exchanges = [
            Exchange::new(
                prompts::SIGNATURE_THRESHOLD,
                thresholds.signature.to_string(),
            ),
            Exchange::new(
                prompts::REVOCATION_THRESHOLD,
                thresholds.revocation.to_string(),
            ),
            self.auth(),
        ];
        self.step("cryptounit-thrhld-set", &[], &exchanges)?;
        Ok(())
    }

    /// Adds every key part last-to-first; returns the KEYNUMs in that processing order.
    ///
    /// The workspace may already hold parts from earlier runs, so each part's KEYNUM
    /// is the matching row that was not listed before its `mk-add`.
    fn add_master_key_parts(&mut self) -> Result<Vec<Option<String>>, CeremonyError> {
        let params = self.params;
        let output = self.step("mks", &[], &[])?;
        let mut known = listed_keynums(&output);
        tracing::debug!(existing = ?known, "master key parts before adding");

        let mut collected = Vec::with_capacity(params.keys.len());
        for part in params.keys.iter().rev() {
            let exchanges = [
                Exchange::new(prompts::MK_DESCRIPTION, part.description()),
                Exchange::secret(prompts::NEW_MK_PASSWORD, part.password()),
                Exchange::secret(prompts::CONFIRM_PASSWORD, part.password()),
            ];
            self.step("mk-add", &part.add_args(), &exchanges)?;
            let output = self.step("mks", &[], &[])?;
            collected.push(added_keynum(&output, &known, part.description()));
            known = listed_keynums(&output);
        }
        tracing::info!(keynums = %assemble_keynums(&collected), "master key parts added");
        Ok(collected)
    }

    /// Sends the KEYNUMs in input order followed by the password of each listed part.
    fn load_master_keys(&mut self, collected: &[Option<String>]) -> Result<(), CeremonyError> {
        let params = self.params;
        let mut exchanges = vec![Exchange::new(
            prompts::MK_LOAD_KEYNUMS,
            assemble_keynums(collected),
        )];
        // Parts without a KEYNUM are not loaded, so the tool never asks for their password
        for (part, keynum) in params.keys.iter().zip(collected.iter().rev()) {
            if keynum.is_some() {
                exchanges.push(Exchange::secret(prompts::MK_FILE_PASSWORD, part.password()));
            } else {
                tracing::warn!(description = part.description(), "key part not loaded, no KEYNUM");
            }
        }
        exchanges.push(self.auth());
        self.step("cryptounit-mk-load", &[], &exchanges)?;
        Ok(())
    }

    fn list_registry(&mut self) -> Result<Option<Table>, CeremonyError> {
        let output = self.step("cryptounit-mk", &[], &[])?;
        match parse_table(&output, &REGISTRY_HEADERS) {
            Ok(table) => {
                println!("{}", table.render());
                Ok(Some(table))
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not parse master key registers");
                Ok(None)
            }
        }
    }
}

/// KEYNUM of the row whose DESCRIPTION matches; parse failures are logged and yield `None`.
pub fn keynum_for(output: &str, headers: &[&str], description: &str) -> Option<String> {
    match parse_table(output, headers) {
        Ok(table) => {
            let keynum = table
                .find("DESCRIPTION", description)
                .and_then(|row| row.get("KEYNUM"))
                .map(str::to_string);
            if keynum.is_none() {
                tracing::warn!(description, "no KEYNUM listed for description");
            }
            keynum
        }
        Err(e) => {
            tracing::warn!(error = %e, description, "could not parse key listing");
            None
        }
    }
}

// NOTE: `mks` prints a message instead of a table when there are no parts yet
fn listed_keynums(output: &str) -> Vec<String> {
    parse_table(output, &MK_HEADERS)
        .map(|table| table.column("KEYNUM").into_iter().map(str::to_string).collect())
        .unwrap_or_default()
}

/// KEYNUM of a part just added: a row matching `description` whose KEYNUM is not in
/// `known`. The highest number wins when several rows qualify.
pub fn added_keynum(output: &str, known: &[String], description: &str) -> Option<String> {
    let table = match parse_table(output, &MK_HEADERS) {
        Ok(table) => table,
        Err(e) => {
            tracing::warn!(error = %e, description, "could not parse key part listing");
            return None;
        }
    };
    let description = description.trim();
    let keynum = table
        .rows()
        .iter()
        .filter(|row| row.get("DESCRIPTION") == Some(description))
        .filter_map(|row| row.get("KEYNUM"))
        .filter(|keynum| !known.iter().any(|k| k == keynum))
        .max_by_key(|keynum| keynum.parse::<u32>().unwrap_or(0))
        .map(str::to_string);
    if keynum.is_none() {
        tracing::warn!(description, "no new KEYNUM listed for key part");
    }
    keynum
}
