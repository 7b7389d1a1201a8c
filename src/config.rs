// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{ProgressError, Result};
use crate::models::{Orientation, Stage, StageCatalog};
use crate::parser::{NormalizeOptions, UnknownStagePolicy};
use crate::utils::Validator;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const EXCLUDED_STAGE: &str = "Ineligible/declined participation/data currently unavailable";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub normalize: NormalizeConfig,
    pub report: ReportConfig,
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    pub stages: Vec<Stage>,
    #[serde(default)]
    pub fallback_stage: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NormalizeConfig {
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub unknown_stages: UnknownStagePolicy,
    #[serde(default)]
    pub stage_column: Option<String>,
    #[serde(default)]
    pub period_column: Option<String>,
    #[serde(default)]
    pub value_column: Option<String>,
}

/// What a report run does when a configured site file does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingSourcePolicy {
    #[default]
    Fail,
    /// Substitute the built-in sample table and flag the site as sample data.
    Sample,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    #[serde(default)]
    pub last_n_months: Option<usize>,
    #[serde(default)]
    pub missing_source: MissingSourcePolicy,
    #[serde(default)]
    pub pretty_json: bool,
    #[serde(default = "default_combined_name")]
    pub combined_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub orientation: Option<Orientation>,
}

fn default_combined_name() -> String {
    "Overall".to_string()
}

impl CatalogConfig {
    pub fn build(&self) -> Result<StageCatalog> {
        let builder = StageCatalog::builder().stages(self.stages.iter().cloned());
        match &self.fallback_stage {
            Some(name) => builder.fallback(name.clone()).build(),
            None => builder.build(),
        }
    }
}

impl NormalizeConfig {
    pub fn options(&self) -> NormalizeOptions {
        NormalizeOptions {
            orientation: self.orientation,
            unknown_stages: self.unknown_stages,
            stage_column: self.stage_column.clone(),
            period_column: self.period_column.clone(),
            value_column: self.value_column.clone(),
        }
    }

    /// Options for one site; a site-level orientation wins over the global one.
    pub fn options_for(&self, site: &SiteConfig) -> NormalizeOptions {
        let mut options = self.options();
        if let Some(orientation) = site.orientation {
            options.orientation = orientation;
        }
        options
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder.add_source(config::File::from(Path::new("config/default.toml")));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("STAGE_PROGRESS")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| ProgressError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| ProgressError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        let stage = |name: &str, color: &str| Stage::new(name).with_color(color);

        Self {
            catalog: CatalogConfig {
                stages: vec![
                    stage("Contact procedures not initiated", "#FFB6C1"),
                    stage("1st or 2nd invites", "#FFE4B5"),
                    stage("3rd or more invites", "#87CEEB"),
                    stage("Data sharing discussions and eligibility check", "#90EE90"),
                    stage("DTA in progress", "#D3D3D3"),
                    stage("DTA completed", "#98FB98"),
                    stage("Data sets in hand", "#008000"),
                    stage("Databases harmonised", "#ADD8E6").with_alias("Database harmonization"),
                    Stage::excluded(EXCLUDED_STAGE).with_color("#7F7F7F"),
                ],
                fallback_stage: Some("Other".to_string()),
            },
            normalize: NormalizeConfig::default(),
            report: ReportConfig {
                output_dir: PathBuf::from("./reports"),
                last_n_months: Some(8),
                missing_source: MissingSourcePolicy::Fail,
                pretty_json: true,
                combined_name: default_combined_name(),
            },
            sites: vec![
                SiteConfig {
                    name: "RP1".to_string(),
                    path: PathBuf::from("data/rp1.csv"),
                    orientation: None,
                },
                SiteConfig {
                    name: "Abidjan".to_string(),
                    path: PathBuf::from("data/abidjan.csv"),
                    orientation: None,
                },
                SiteConfig {
                    name: "Johannesburg".to_string(),
                    path: PathBuf::from("data/johannesburg.csv"),
                    orientation: None,
                },
            ],
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.catalog
            .build()
            .map_err(|e| ProgressError::Config(e.to_string()))?;

        if self.report.last_n_months == Some(0) {
            return Err(ProgressError::Config(
                "last_n_months must be greater than 0".to_string(),
            ));
        }

        if self.report.combined_name.trim().is_empty() {
            return Err(ProgressError::Config(
                "combined_name must not be blank".to_string(),
            ));
        }

        check_site_names(&self.sites, &self.report.combined_name)?;

        Ok(())
    }
}

/// Site names become export file stems, so two names that sanitize to the
/// same stem (or to the combined table's stem) would overwrite each other.
pub(crate) fn check_site_names(sites: &[SiteConfig], combined_name: &str) -> Result<()> {
    let mut seen = HashMap::new();
    seen.insert(Validator::sanitize_file_stem(combined_name), combined_name);

    for site in sites {
        if site.name.trim().is_empty() {
            return Err(ProgressError::Config(format!(
                "site at {} has a blank name",
                site.path.display()
            )));
        }
        let stem = Validator::sanitize_file_stem(&site.name);
        if let Some(previous) = seen.insert(stem, site.name.as_str()) {
            return Err(ProgressError::Config(format!(
                "site names '{}' and '{}' map to the same output files",
                previous, site.name
            )));
        }
    }

    Ok(())
}
