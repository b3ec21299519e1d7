//! Key configuration file and key loading

use anyhow::{anyhow, Context};
use clap::ArgMatches;
use fwseal::{FirmwareSigningKey, FirmwareVerifyingKey, SymmetricKey};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Key Configuration
///
/// ```toml
/// signing_key = "keys/private_key.pem"
/// verifying_key = "keys/public_key.pem"
/// symmetric_key = "keys/aes_key.bin"
/// ```
///
/// Relative paths are taken relative to the configuration file.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct KeyConfig {
    pub signing_key: Option<PathBuf>,

    pub verifying_key: Option<PathBuf>,

    pub symmetric_key: Option<PathBuf>,
}

/// Load Key Configuration from file
pub(crate) fn load_key_config(path: &Path) -> anyhow::Result<KeyConfig> {
    let config_str = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read the config file {}", path.display()))?;

    let mut config: KeyConfig = toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;

    if let Some(base) = path.parent() {
        for entry in [
            &mut config.signing_key,
            &mut config.verifying_key,
            &mut config.symmetric_key,
        ] {
            if let Some(key_path) = entry {
                if key_path.is_relative() {
                    *key_path = base.join(&*key_path);
                }
            }
        }
    }

    Ok(config)
}

impl KeyConfig {
    /// Configuration from `--key-config` with per-key flags layered on top
    pub(crate) fn from_args(args: &ArgMatches) -> anyhow::Result<Self> {
        let mut config = match args.get_one::<PathBuf>("key-config") {
            Some(path) => load_key_config(path)?,
            None => KeyConfig::default(),
        };

        for (flag, entry) in [
            ("signing-key", &mut config.signing_key),
            ("verifying-key", &mut config.verifying_key),
            ("symmetric-key", &mut config.symmetric_key),
        ] {
            if let Ok(Some(path)) = args.try_get_one::<PathBuf>(flag) {
                *entry = Some(path.clone());
            }
        }

        Ok(config)
    }

    pub(crate) fn signing_key(&self) -> anyhow::Result<FirmwareSigningKey> {
        let path = required(&self.signing_key, "signing-key")?;
        let bytes = read_key(path)?;
        FirmwareSigningKey::from_bytes(&bytes)
            .with_context(|| format!("Failed to load signing key {}", path.display()))
    }

    pub(crate) fn verifying_key(&self) -> anyhow::Result<FirmwareVerifyingKey> {
        let path = required(&self.verifying_key, "verifying-key")?;
        let bytes = read_key(path)?;
        FirmwareVerifyingKey::from_bytes(&bytes)
            .with_context(|| format!("Failed to load verifying key {}", path.display()))
    }

    pub(crate) fn symmetric_key(&self) -> anyhow::Result<SymmetricKey> {
        let path = required(&self.symmetric_key, "symmetric-key")?;
        let bytes = read_key(path)?;
        SymmetricKey::from_slice(&bytes)
            .with_context(|| format!("Failed to load symmetric key {}", path.display()))
    }
}

fn required<'a>(entry: &'a Option<PathBuf>, flag: &str) -> anyhow::Result<&'a Path> {
    entry.as_deref().ok_or_else(|| {
        anyhow!(
            "No {} given: pass --{flag} or set {} in --key-config",
            flag.replace('-', " "),
            flag.replace('-', "_")
        )
    })
}

fn read_key(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read key file {}", path.display()))
}
