// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use stage_progress::exporter::csv::write_table;
use stage_progress::utils::logging::{
    format_info, format_step, format_success, format_warning,
};
use stage_progress::{
    Config, CsvExporter, JsonExporter, MissingSourcePolicy, Month, MonthlyTotal,
    NormalizeOptions, Orientation, ProgressAggregator, ProgressTable, RawTableReader,
    ReportRunner, Snapshot, StageCatalog, StageDataNormalizer, UnknownStagePolicy, Validator,
};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "stage_progress")]
#[command(author = "cipher")]
#[command(version = "0.1.0")]
#[command(about = "Normalize per-site stage progress tables and aggregate monthly totals", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct InputArgs {
    /// Layout of the input table; defaults to the configured orientation
    #[arg(long, value_name = "wide|long")]
    orientation: Option<Orientation>,

    /// Fail on stage labels missing from the catalog instead of using the fallback stage
    #[arg(long)]
    strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the configured stage catalog
    Catalog,

    /// Normalize one table against the catalog
    Normalize {
        input: PathBuf,

        #[command(flatten)]
        input_args: InputArgs,

        /// Write the canonical table as CSV instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the in-progress total (N) and excluded count (n) per month
    Totals {
        input: PathBuf,

        #[command(flatten)]
        input_args: InputArgs,
    },

    /// Sum several site tables cell by cell
    Combine {
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        input_args: InputArgs,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show one month of a table (latest by default)
    Snapshot {
        input: PathBuf,

        #[command(flatten)]
        input_args: InputArgs,

        #[arg(long, value_name = "YYYY-MM")]
        month: Option<Month>,
    },

    /// Run every configured site, combine them and export JSON + CSV
    Report {
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Treat every .csv/.tsv file in this directory as a site
        #[arg(long, value_name = "DIR")]
        input_dir: Option<PathBuf>,

        /// Keep only the N most recent months (N >= 1)
        #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
        last_months: Option<u64>,

        /// Substitute built-in sample data for missing site files
        #[arg(long)]
        sample_fallback: bool,

        #[arg(short, long)]
        pretty: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    stage_progress::utils::logging::init_logger(cli.color, cli.verbose);

    info!("Stage Progress");
    debug!("Loading configuration from: {}", cli.config.display());

    let config = if cli.config.exists() {
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?
    } else {
        warn!(
            "Config file {} not found, using default configuration",
            cli.config.display()
        );
        Config::default_config()
    };

    match cli.command {
        Commands::Catalog => cmd_catalog(&config),
        Commands::Normalize {
            input,
            input_args,
            output,
        } => cmd_normalize(&config, &input, &input_args, output.as_deref()),
        Commands::Totals { input, input_args } => cmd_totals(&config, &input, &input_args),
        Commands::Combine {
            inputs,
            input_args,
            output,
        } => cmd_combine(&config, &inputs, &input_args, output.as_deref()),
        Commands::Snapshot {
            input,
            input_args,
            month,
        } => cmd_snapshot(&config, &input, &input_args, month),
        Commands::Report {
            output,
            input_dir,
            last_months,
            sample_fallback,
            pretty,
        } => cmd_report(
            &config,
            output,
            input_dir.as_deref(),
            last_months,
            sample_fallback,
            pretty,
            cli.color,
        ),
    }
}

fn build_catalog(config: &Config) -> Result<Arc<StageCatalog>> {
    let catalog = config
        .catalog
        .build()
        .context("Invalid stage catalog in configuration")?;
    Ok(Arc::new(catalog))
}

fn normalize_options(config: &Config, args: &InputArgs) -> NormalizeOptions {
    let mut options = config.normalize.options();
    if let Some(orientation) = args.orientation {
        options.orientation = orientation;
    }
    if args.strict {
        options.unknown_stages = UnknownStagePolicy::Strict;
    }
    options
}

fn load_table(normalizer: &StageDataNormalizer, path: &Path) -> Result<ProgressTable> {
    Validator::validate_table_input(path)
        .with_context(|| format!("Cannot use {} as input", path.display()))?;

    let raw = RawTableReader::new()
        .read_path(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let table = normalizer
        .normalize(&raw)
        .with_context(|| format!("Failed to normalize {}", path.display()))?;

    debug!(
        "{}: {} stages x {} months",
        path.display(),
        table.stage_count(),
        table.month_count()
    );
    Ok(table)
}

fn cmd_catalog(config: &Config) -> Result<()> {
    let catalog = build_catalog(config)?;

    println!("\nStage catalog ({})\n", catalog.short_fingerprint());
    for (index, stage) in catalog.stages().iter().enumerate() {
        let mut flags = Vec::new();
        if stage.excluded {
            flags.push("excluded".to_string());
        }
        if catalog.fallback_index() == Some(index) {
            flags.push("fallback".to_string());
        }
        if !stage.aliases.is_empty() {
            flags.push(format!("aliases: {}", stage.aliases.join(", ")));
        }

        if flags.is_empty() {
            println!("{:>3}. {}", index + 1, stage.name);
        } else {
            println!("{:>3}. {} [{}]", index + 1, stage.name, flags.join("; "));
        }
    }
    println!();

    Ok(())
}

fn cmd_normalize(
    config: &Config,
    input: &Path,
    args: &InputArgs,
    output: Option<&Path>,
) -> Result<()> {
    let normalizer = StageDataNormalizer::new(build_catalog(config)?, normalize_options(config, args));
    let table = load_table(&normalizer, input)?;

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_table(&table, file)?;
            println!(
                "{}",
                format_success(&format!("Wrote canonical table to {}", path.display()))
            );
        }
        None => print_table(&table),
    }

    Ok(())
}

fn cmd_totals(config: &Config, input: &Path, args: &InputArgs) -> Result<()> {
    let normalizer = StageDataNormalizer::new(build_catalog(config)?, normalize_options(config, args));
    let table = load_table(&normalizer, input)?;

    let totals = ProgressAggregator::monthly_totals(&table, ProgressAggregator::catalog_exclusions);
    print_totals(&totals);

    Ok(())
}

fn cmd_combine(
    config: &Config,
    inputs: &[PathBuf],
    args: &InputArgs,
    output: Option<&Path>,
) -> Result<()> {
    let normalizer = StageDataNormalizer::new(build_catalog(config)?, normalize_options(config, args));

    let mut tables = Vec::with_capacity(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        info!("{}", format_step(index + 1, inputs.len(), &input.display().to_string()));
        tables.push(load_table(&normalizer, input)?);
    }

    let refs: Vec<&ProgressTable> = tables.iter().collect();
    let combined = ProgressAggregator::combine(&refs).context("Failed to combine tables")?;

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_table(&combined, file)?;
            println!(
                "{}",
                format_success(&format!(
                    "Combined {} tables into {}",
                    tables.len(),
                    path.display()
                ))
            );
        }
        None => {
            print_table(&combined);
            print_totals(&ProgressAggregator::monthly_totals(
                &combined,
                ProgressAggregator::catalog_exclusions,
            ));
        }
    }

    Ok(())
}

fn cmd_snapshot(
    config: &Config,
    input: &Path,
    args: &InputArgs,
    month: Option<Month>,
) -> Result<()> {
    let normalizer = StageDataNormalizer::new(build_catalog(config)?, normalize_options(config, args));
    let table = load_table(&normalizer, input)?;

    let snapshot = match month {
        Some(month) => ProgressAggregator::snapshot_at(&table, month)?,
        None => ProgressAggregator::latest_snapshot(&table)?,
    };
    print_snapshot(&snapshot);

    Ok(())
}

fn cmd_report(
    config: &Config,
    output: Option<PathBuf>,
    input_dir: Option<&Path>,
    last_months: Option<u64>,
    sample_fallback: bool,
    pretty: bool,
    color: bool,
) -> Result<()> {
    info!("Starting progress report");

    let mut runner = ReportRunner::new(config.clone())
        .context("Failed to prepare report")?
        .with_progress(true)
        .with_color(color);
    if sample_fallback {
        runner = runner.with_missing_source(MissingSourcePolicy::Sample);
    }
    if let Some(last_n) = last_months {
        let last_n = usize::try_from(last_n).context("--last-months is too large")?;
        runner = runner.with_last_n_months(Some(last_n));
    }

    let report = match input_dir {
        Some(dir) => {
            Validator::validate_directory(dir)?;
            let sites = stage_progress::pipeline::sites_from_directory(dir)?;
            runner.run_sites(&sites)
        }
        None => runner.run(),
    }
    .context("Report run failed")?;

    let output_dir = output.unwrap_or_else(|| config.report.output_dir.clone());
    let json = JsonExporter::new(&output_dir, pretty || config.report.pretty_json)
        .context("Failed to prepare JSON export")?;
    let manifest = json.export_report(&report)?;
    let csv_files = CsvExporter::new(&output_dir)
        .context("Failed to prepare CSV export")?
        .export_report(&report)?;

    println!("\nProgress report ({})\n", report.generated_at.format("%Y-%m-%d %H:%M UTC"));
    for table in report.sites.iter().chain(std::iter::once(&report.combined)) {
        match &table.latest {
            Some(latest) => println!(
                "  {:<20} {}  N={:<5} n={}",
                table.name,
                latest.month.label(),
                latest.included,
                latest.excluded
            ),
            None => println!("  {:<20} (no months)", table.name),
        }
    }
    println!();

    if report.used_sample_data() {
        println!(
            "{}",
            format_warning("Some sites used built-in sample data; see the manifest")
        );
    }
    println!(
        "{}",
        format_success(&format!(
            "Exported {} JSON tables and {} CSV files to {}",
            manifest.total_tables,
            csv_files.len(),
            output_dir.display()
        ))
    );

    Ok(())
}

fn print_table(table: &ProgressTable) {
    let width = table
        .catalog()
        .names()
        .map(|n| n.chars().count())
        .max()
        .unwrap_or(5)
        .max(5);

    print!("\n{:<width$}", "Stage", width = width);
    for month in table.months() {
        print!("  {:>8}", month.label());
    }
    println!();
    println!("{}", "=".repeat(width + table.month_count() * 10));

    for (stage, counts) in table.rows() {
        print!("{:<width$}", stage.name, width = width);
        for count in counts {
            print!("  {:>8}", count);
        }
        if stage.excluded {
            print!("  (excluded)");
        }
        println!();
    }
    println!();
}

fn print_totals(totals: &BTreeMap<Month, MonthlyTotal>) {
    if totals.is_empty() {
        println!("{}", format_info("Table has no months"));
        return;
    }

    println!("\n{:<10} {:>8} {:>8}", "Month", "N", "n");
    println!("{}", "=".repeat(28));
    for (month, total) in totals {
        println!("{:<10} {:>8} {:>8}", month.label(), total.included, total.excluded);
    }
    println!();
}

fn print_snapshot(snapshot: &Snapshot) {
    println!("\nSnapshot for {}\n", snapshot.month.label());
    for count in &snapshot.counts {
        let marker = if count.excluded { " (excluded)" } else { "" };
        println!("  {:>6}  {}{}", count.count, count.stage, marker);
    }
    println!("\n  N={} n={} total={}\n", snapshot.included, snapshot.excluded, snapshot.total);
}
