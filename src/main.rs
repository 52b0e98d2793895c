use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use memorial_reconcile::config::{DEFAULT_COORDINATE_CUTOFF, DEFAULT_DESCRIPTIVE_CUTOFF};
use memorial_reconcile::fuzzy_matcher::SimilarityMetric;
use memorial_reconcile::ingestion::{
    write_coordinates_csv, CandidateSource, DescriptiveCsvSource, GeodeticColumns,
    GeodeticCsvSource, MetadataFormat, MetadataTableSource,
};
use memorial_reconcile::store::{self, SaveOutcome, StoreOptions};
use memorial_reconcile::{
    CanonicalRecord, CanonicalizeOptions, LocationPolicy, ReconcileConfig, ReconcileReport,
    Reconciler,
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "memorial-reconcile")]
#[command(about = "Reconcile memorial photo metadata and curated records into memorials.json")]
#[command(version)]
struct Cli {
    /// Trace every row decision
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print absolute paths of the files involved before running
    #[arg(long, global = true)]
    show_path: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge photo coordinates into existing memorials (never creates records)
    Coords(CoordsArgs),

    /// Fill zone/description from the curated CSV, creating missing memorials
    Describe(DescribeArgs),

    /// Create a new memorials.json from the curated CSV
    Init(InitArgs),

    /// Decode a raw image metadata export into a Filename,DecimalLat,DecimalLng CSV
    DecodeGps(DecodeGpsArgs),

    /// Remove legacy top-level latitude/longitude keys
    PruneLegacy(PruneArgs),
}

#[derive(Debug, Clone, Args)]
struct StoreArgs {
    /// Path to memorials.json
    #[arg(long = "json", env = "MEMORIAL_STORE", default_value = "data/memorials.json")]
    store: PathBuf,
}

#[derive(Debug, Clone, Args)]
struct WriteArgs {
    /// Compute and report without writing
    #[arg(long)]
    dry_run: bool,

    /// Suffix appended to the store file name for the backup copy
    /// (default: .bak.<timestamp>)
    #[arg(long)]
    backup_suffix: Option<String>,

    /// Print the report as JSON instead of text
    #[arg(long)]
    json_report: bool,
}

impl WriteArgs {
    fn store_options(&self) -> StoreOptions {
        let mut options = StoreOptions {
            dry_run: self.dry_run,
            ..Default::default()
        };
        if let Some(suffix) = &self.backup_suffix {
            options.backup_suffix = suffix.clone();
        }
        options
    }
}

#[derive(Debug, Clone, Args)]
struct MatchArgs {
    /// Fuzzy match cutoff in (0, 1]
    #[arg(long, env = "MEMORIAL_CUTOFF")]
    cutoff: Option<f64>,

    /// Similarity metric: levenshtein, jaro-winkler, sorensen-dice
    #[arg(long, default_value_t = SimilarityMetric::Levenshtein)]
    metric: SimilarityMetric,

    /// Only accept exact canonical key matches
    #[arg(long)]
    exact_only: bool,

    /// Keep apostrophes when building keys ("Mary's" != "Marys")
    #[arg(long)]
    keep_apostrophes: bool,

    /// Display-name prefixes that mark camera default names
    #[arg(long = "placeholder-prefix", default_value = "IMG")]
    placeholder_prefixes: Vec<String>,
}

impl MatchArgs {
    fn config(&self, default_cutoff: f64) -> ReconcileConfig {
        let canonicalize = if self.keep_apostrophes {
            CanonicalizeOptions::keep_apostrophes()
        } else {
            CanonicalizeOptions::default()
        };
        ReconcileConfig::default()
            .with_cutoff(self.cutoff.unwrap_or(default_cutoff))
            .with_metric(self.metric)
            .with_exact_only(self.exact_only)
            .with_canonicalize(canonicalize)
            .with_placeholder_prefixes(self.placeholder_prefixes.clone())
    }
}

#[derive(Debug, Clone, Args)]
struct ColumnArgs {
    #[arg(long, default_value = "Filename")]
    file_col: String,

    #[arg(long, default_value = "DecimalLat")]
    lat_col: String,

    #[arg(long, default_value = "DecimalLng")]
    lng_col: String,
}

impl ColumnArgs {
    fn columns(&self) -> GeodeticColumns {
        GeodeticColumns {
            file: self.file_col.clone(),
            lat: self.lat_col.clone(),
            lng: self.lng_col.clone(),
        }
    }
}

#[derive(Debug, Clone, Args)]
struct CoordsArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Coordinates CSV (or raw metadata export with --metadata)
    #[arg(long, default_value = "img/zone1/image_coordinates.csv")]
    csv: PathBuf,

    /// Treat --csv as a raw metadata export (GPSInfo or exiftool columns)
    #[arg(long)]
    metadata: bool,

    /// What to do when a memorial already has a location: overwrite, fill-if-empty
    #[arg(long, default_value_t = LocationPolicy::Overwrite)]
    location_policy: LocationPolicy,

    #[command(flatten)]
    columns: ColumnArgs,

    #[command(flatten)]
    matching: MatchArgs,

    #[command(flatten)]
    write: WriteArgs,
}

#[derive(Debug, Clone, Args)]
struct DescribeArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Curated memorial CSV (Memorial, Zone, Text)
    #[arg(long, default_value = "memorials.csv")]
    csv: PathBuf,

    /// Create unmatched memorials from exact lookups only
    #[arg(long)]
    no_fuzzy_before_create: bool,

    #[command(flatten)]
    matching: MatchArgs,

    #[command(flatten)]
    write: WriteArgs,
}

#[derive(Debug, Clone, Args)]
struct InitArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Curated memorial CSV (Memorial, Zone, Text)
    #[arg(long, default_value = "memorials.csv")]
    csv: PathBuf,

    #[command(flatten)]
    matching: MatchArgs,

    #[arg(long)]
    json_report: bool,
}

#[derive(Debug, Clone, Args)]
struct DecodeGpsArgs {
    /// Raw metadata export
    #[arg(long, default_value = "img/zone1/image_metadata.csv")]
    input: PathBuf,

    /// Output CSV (default: image_coordinates.csv next to the input)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Export shape: gps-info or exiftool (detected from the header if omitted)
    #[arg(long)]
    format: Option<MetadataFormat>,

    #[command(flatten)]
    columns: ColumnArgs,
}

#[derive(Debug, Clone, Args)]
struct PruneArgs {
    #[command(flatten)]
    store: StoreArgs,

    #[command(flatten)]
    write: WriteArgs,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Coords(args) => run_coords(args, cli.show_path),
        Commands::Describe(args) => run_describe(args, cli.show_path),
        Commands::Init(args) => run_init(args, cli.show_path),
        Commands::DecodeGps(args) => run_decode_gps(args, cli.show_path),
        Commands::PruneLegacy(args) => run_prune(args, cli.show_path),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn show_paths(enabled: bool, paths: &[(&str, &Path)]) {
    if !enabled {
        return;
    }
    for (label, path) in paths {
        let shown = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        println!("{} absolute path: {}", label, shown.display());
    }
}

fn run_coords(args: CoordsArgs, show_path: bool) -> Result<()> {
    let store_path = &args.store.store;
    show_paths(show_path, &[("JSON", store_path.as_path()), ("CSV", args.csv.as_path())]);
    store::require_file(store_path)?;
    store::require_file(&args.csv)?;

    let mut records = store::load_store(store_path)
        .with_context(|| format!("Failed to load {}", store_path.display()))?;

    let candidates = if args.metadata {
        MetadataTableSource::from_path(&args.csv, None)?.candidates()?
    } else {
        GeodeticCsvSource::from_path(&args.csv, args.columns.columns())?.candidates()?
    };
    info!("Read {} candidate rows from {}", candidates.len(), args.csv.display());

    let config = args
        .matching
        .config(DEFAULT_COORDINATE_CUTOFF)
        .with_location_policy(args.location_policy);
    let reconciler = Reconciler::new(config)?;
    let report = reconciler.merge_coordinates(&mut records, &candidates);

    finish_run(store_path, &records, &report, &args.write)
}

fn run_describe(args: DescribeArgs, show_path: bool) -> Result<()> {
    let store_path = &args.store.store;
    show_paths(show_path, &[("JSON", store_path.as_path()), ("CSV", args.csv.as_path())]);
    store::require_file(&args.csv)?;
    store::require_file(store_path)?;

    let mut records = store::load_store(store_path)
        .with_context(|| format!("Failed to load {}", store_path.display()))?;
    let candidates = DescriptiveCsvSource::from_path(&args.csv)?.candidates()?;

    let config = args
        .matching
        .config(DEFAULT_DESCRIPTIVE_CUTOFF)
        .with_fuzzy_before_create(!args.no_fuzzy_before_create);
    let reconciler = Reconciler::new(config)?;
    let report = reconciler.ingest_records(&mut records, &candidates);

    finish_run(store_path, &records, &report, &args.write)
}

fn run_init(args: InitArgs, show_path: bool) -> Result<()> {
    let store_path = &args.store.store;
    show_paths(show_path, &[("JSON", store_path.as_path()), ("CSV", args.csv.as_path())]);
    store::require_file(&args.csv)?;
    if store_path.exists() {
        bail!(
            "{} already exists; use `describe` to update it",
            store_path.display()
        );
    }

    let candidates = DescriptiveCsvSource::from_path(&args.csv)?.candidates()?;
    let reconciler = Reconciler::new(args.matching.config(DEFAULT_DESCRIPTIVE_CUTOFF))?;
    let mut records: Vec<CanonicalRecord> = Vec::new();
    let report = reconciler.ingest_records(&mut records, &candidates);
    print_report(&report, args.json_report)?;

    if let Some(parent) = store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    store::save_store(store_path, &records, &StoreOptions::default())?;
    println!("Created {} with {} memorials", store_path.display(), records.len());
    Ok(())
}

fn run_decode_gps(args: DecodeGpsArgs, show_path: bool) -> Result<()> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_file_name("image_coordinates.csv"));
    show_paths(show_path, &[("Metadata", args.input.as_path()), ("Output", output.as_path())]);

    let source = MetadataTableSource::from_path(&args.input, args.format)?;
    info!("Decoding {} as {}", args.input.display(), source.format());
    let photos = source.decode()?;
    let decoded = write_coordinates_csv(&output, &photos, &args.columns.columns())?;

    println!(
        "Wrote {} (decoded {} of {} rows)",
        output.display(),
        decoded,
        photos.len()
    );
    Ok(())
}

fn run_prune(args: PruneArgs, show_path: bool) -> Result<()> {
    let store_path = &args.store.store;
    show_paths(show_path, &[("JSON", store_path.as_path())]);
    let mut records = store::load_store(store_path)
        .with_context(|| format!("Failed to load {}", store_path.display()))?;

    let changed = store::prune_legacy_fields(&mut records);
    println!("Records with legacy latitude/longitude keys: {}", changed);
    if changed == 0 {
        println!("No changes detected");
        return Ok(());
    }
    report_save(store::save_store(store_path, &records, &args.write.store_options())?);
    Ok(())
}

fn finish_run(
    store_path: &Path,
    records: &[CanonicalRecord],
    report: &ReconcileReport,
    write: &WriteArgs,
) -> Result<()> {
    print_report(report, write.json_report)?;

    if !report.has_changes() {
        println!("No changes detected (no matching rows or all identical)");
        return Ok(());
    }
    report_save(store::save_store(store_path, records, &write.store_options())?);
    Ok(())
}

fn print_report(report: &ReconcileReport, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report);
    }
    Ok(())
}

fn report_save(outcome: SaveOutcome) {
    match outcome {
        SaveOutcome::Written { backup } => {
            if let Some(backup) = backup {
                println!("Backup: {}", backup.display());
            }
            println!("Updated JSON written.");
        }
        SaveOutcome::DryRun => println!("Dry-run mode: no file written."),
    }
}
