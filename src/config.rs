//! Configuration for the `washcycle` binary (washcycle.toml).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::NaiveTime;
use serde::Deserialize;

use crate::core::InvoiceMode;

/// Configuration loaded from washcycle.toml. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub store: StoreConfig,
    pub jobs: JobsConfig,
    pub invoices: InvoicesConfig,
    pub operator: OperatorConfig,
}

/// Snapshot file backing the in-memory store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub snapshot: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot: PathBuf::from("data/washcycle.json"),
        }
    }
}

/// Daily job trigger.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobsConfig {
    /// Service-local time of day, "HH:MM".
    pub run_at: String,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            run_at: "16:05".to_string(),
        }
    }
}

/// Monthly invoice trigger.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InvoicesConfig {
    /// Day of month (1-28).
    pub run_day: u32,
    pub run_at: String,
    pub mode: String,
}

impl Default for InvoicesConfig {
    fn default() -> Self {
        Self {
            run_day: 1,
            run_at: "00:05".to_string(),
            mode: InvoiceMode::FullSubscription.as_str().to_string(),
        }
    }
}

/// Actor recorded on records written by the binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OperatorConfig {
    pub name: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            name: "Cron Scheduler".to_string(),
        }
    }
}

impl FileConfig {
    /// Load configuration from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.jobs_time()?;
        self.invoice_time()?;
        self.invoice_mode()?;
        if !(1..=28).contains(&self.invoices.run_day) {
            bail!(
                "invoices.run_day must be between 1 and 28, got {}",
                self.invoices.run_day
            );
        }
        Ok(())
    }

    pub fn jobs_time(&self) -> Result<NaiveTime> {
        parse_time(&self.jobs.run_at).context("invalid jobs.run_at")
    }

    pub fn invoice_time(&self) -> Result<NaiveTime> {
        parse_time(&self.invoices.run_at).context("invalid invoices.run_at")
    }

    pub fn invoice_mode(&self) -> Result<InvoiceMode> {
        self.invoices
            .mode
            .parse::<InvoiceMode>()
            .context("invalid invoices.mode")
    }
}

fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .with_context(|| format!("'{value}' is not a HH:MM time"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = FileConfig::parse("").unwrap();
        assert_eq!(config.store.snapshot, PathBuf::from("data/washcycle.json"));
        assert_eq!(config.jobs_time().unwrap(), NaiveTime::from_hms_opt(16, 5, 0).unwrap());
        assert_eq!(config.invoices.run_day, 1);
        assert_eq!(config.invoice_mode().unwrap(), InvoiceMode::FullSubscription);
        assert_eq!(config.operator.name, "Cron Scheduler");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = FileConfig::parse(
            r#"
            [invoices]
            mode = "per_wash"

            [operator]
            name = "Night Shift"
            "#,
        )
        .unwrap();
        assert_eq!(config.invoice_mode().unwrap(), InvoiceMode::PerWash);
        assert_eq!(config.invoices.run_at, "00:05");
        assert_eq!(config.operator.name, "Night Shift");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(FileConfig::parse("[jobs]\nrun_at = \"25:00\"").is_err());
        assert!(FileConfig::parse("[invoices]\nmode = \"weekly\"").is_err());
        assert!(FileConfig::parse("[invoices]\nrun_day = 31").is_err());
        assert!(FileConfig::parse("[unknown]\nx = 1").is_err());
    }
}
