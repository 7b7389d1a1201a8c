// file: src/pipeline/report.rs
// description: config-driven report run: load, normalize, window and combine every site
// reference: pipeline orchestration

use crate::config::{Config, MissingSourcePolicy, SiteConfig, check_site_names};
use crate::error::{ProgressError, Result};
use crate::models::{Month, ProgressTable, SiteDataset, SourceIdentity, StageCatalog};
use crate::parser::{RawTableReader, StageDataNormalizer, discover_sources};
use crate::pipeline::aggregator::{MonthlyTotal, ProgressAggregator, Snapshot};
use crate::pipeline::progress::{ProgressTracker, RunStats};
use crate::pipeline::sample::sample_raw_table;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A normalized table plus the series a chart renderer needs.
#[derive(Debug, Clone)]
pub struct TableReport {
    pub name: String,
    pub source: String,
    pub used_sample_data: bool,
    pub table: ProgressTable,
    pub totals: BTreeMap<Month, MonthlyTotal>,
    pub latest: Option<Snapshot>,
}

impl TableReport {
    pub fn from_table(
        name: impl Into<String>,
        source: impl Into<String>,
        used_sample_data: bool,
        table: ProgressTable,
    ) -> Self {
        let totals = ProgressAggregator::monthly_totals(&table, ProgressAggregator::catalog_exclusions);
        let latest = ProgressAggregator::latest_snapshot(&table).ok();

        Self {
            name: name.into(),
            source: source.into(),
            used_sample_data,
            table,
            totals,
            latest,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressReport {
    pub generated_at: DateTime<Utc>,
    pub catalog_fingerprint: String,
    pub sites: Vec<TableReport>,
    pub combined: TableReport,
    pub stats: RunStats,
}

impl ProgressReport {
    pub fn used_sample_data(&self) -> bool {
        self.sites.iter().any(|s| s.used_sample_data)
    }
}

pub struct ReportRunner {
    config: Config,
    catalog: Arc<StageCatalog>,
    reader: RawTableReader,
    show_progress: bool,
    colored: bool,
}

impl ReportRunner {
    pub fn new(config: Config) -> Result<Self> {
        let catalog = Arc::new(
            config
                .catalog
                .build()
                .map_err(|e| ProgressError::Config(e.to_string()))?,
        );

        Ok(Self {
            config,
            catalog,
            reader: RawTableReader::new(),
            show_progress: false,
            colored: true,
        })
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn with_color(mut self, colored: bool) -> Self {
        self.colored = colored;
        self
    }

    pub fn with_missing_source(mut self, policy: MissingSourcePolicy) -> Self {
        self.config.report.missing_source = policy;
        self
    }

    pub fn with_last_n_months(mut self, last_n: Option<usize>) -> Self {
        self.config.report.last_n_months = last_n;
        self
    }

    pub fn catalog(&self) -> &Arc<StageCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Reads and normalizes one site. A missing file is an error unless the
    /// `sample` policy is configured, in which case the substitution is logged
    /// and recorded on the dataset's source.
    pub fn load_site(&self, site: &SiteConfig) -> Result<SiteDataset> {
        let (raw, source) = if site.path.exists() {
            (
                self.reader.read_path(&site.path)?,
                SourceIdentity::File(site.path.clone()),
            )
        } else {
            match self.config.report.missing_source {
                MissingSourcePolicy::Fail => {
                    return Err(ProgressError::MissingSource {
                        site: site.name.clone(),
                        path: site.path.clone(),
                    });
                }
                MissingSourcePolicy::Sample => {
                    warn!(
                        "Source for site {} not found at {}, substituting built-in sample data",
                        site.name,
                        site.path.display()
                    );
                    (sample_raw_table(), SourceIdentity::Sample)
                }
            }
        };

        let normalizer = StageDataNormalizer::new(
            Arc::clone(&self.catalog),
            self.config.normalize.options_for(site),
        );
        let table = normalizer.normalize(&raw)?;
        debug!(
            "Normalized site {}: {} stages x {} months",
            site.name,
            table.stage_count(),
            table.month_count()
        );

        Ok(SiteDataset::new(site.name.clone(), source, table))
    }

    pub fn run(&self) -> Result<ProgressReport> {
        self.run_sites(&self.config.sites)
    }

    pub fn run_sites(&self, sites: &[SiteConfig]) -> Result<ProgressReport> {
        if sites.is_empty() {
            return Err(ProgressError::Config("no sites configured".to_string()));
        }
        if self.config.report.last_n_months == Some(0) {
            return Err(ProgressError::Config(
                "last_n_months must be greater than 0".to_string(),
            ));
        }
        check_site_names(sites, &self.config.report.combined_name)?;

        info!("Building progress report for {} sites", sites.len());
        let tracker = if self.show_progress {
            ProgressTracker::with_color(sites.len(), self.colored)
        } else {
            ProgressTracker::hidden(sites.len())
        };

        let mut datasets = Vec::with_capacity(sites.len());
        for site in sites {
            tracker.set_message(site.name.clone());
            match self.load_site(site) {
                Ok(dataset) => {
                    if dataset.source().is_sample() {
                        tracker.add_sample_fallback();
                    }
                    tracker.inc_sites_processed(dataset.table().month_count());
                    datasets.push(dataset);
                }
                Err(e) => {
                    tracker.inc_sites_failed();
                    error!("Site {} failed: {}", site.name, e);
                    return Err(e);
                }
            }
        }

        let combined = ProgressAggregator::combine_sites(&datasets)?;
        let window = |table: &ProgressTable| match self.config.report.last_n_months {
            Some(last_n) => ProgressAggregator::window(table, last_n),
            None => table.clone(),
        };

        let site_reports = datasets
            .iter()
            .map(|dataset| {
                TableReport::from_table(
                    dataset.name(),
                    dataset.source().to_string(),
                    dataset.source().is_sample(),
                    window(dataset.table()),
                )
            })
            .collect();

        let combined_report = TableReport::from_table(
            self.config.report.combined_name.clone(),
            combined.sites().join(" + "),
            datasets.iter().any(|d| d.source().is_sample()),
            window(combined.table()),
        );

        tracker.finish();
        let stats = tracker.get_stats();
        info!("{}", stats.summary());

        Ok(ProgressReport {
            generated_at: Utc::now(),
            catalog_fingerprint: self.catalog.fingerprint().to_string(),
            sites: site_reports,
            combined: combined_report,
            stats,
        })
    }
}

/// One site per `.csv`/`.tsv` file under `dir`. Sites are named after the
/// path relative to `dir` without its extension (`north`, `east/rp1`).
pub fn sites_from_directory(dir: &Path) -> Result<Vec<SiteConfig>> {
    let sites = discover_sources(dir)?
        .into_iter()
        .map(|path| {
            let relative = path.strip_prefix(dir).unwrap_or(path.as_path()).with_extension("");
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            SiteConfig {
                name,
                path,
                orientation: None,
            }
        })
        .collect();
    Ok(sites)
}
