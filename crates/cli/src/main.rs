//! CLI tool for extracting report fields from packing-spec slide feeds.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use packspec_core::deck::{latest_decks, report_file_name, result_dir_name};
use packspec_core::{ExtractionJob, ExtractionResult, FieldsConfig, SlideFeed, SlideSummary, TitleLayouts};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extract report fields from packing-spec slide feeds.
#[derive(Parser, Debug)]
#[command(name = "packspec")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract fields from one or more slide feeds
    Extract(ExtractArgs),
    /// Print detected titles and shape counts of a slide feed
    Inspect(InspectArgs),
    /// Find the latest v3 feed in each folder and extract it into a result folder
    Scan(ScanArgs),
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// Field rules file (.yaml or .json)
    #[arg(long, default_value = "config/fields.yaml")]
    fields: PathBuf,

    /// Report profile inside the field rules file
    #[arg(long, default_value = "发包规范V1")]
    profile: String,

    #[command(flatten)]
    layout: LayoutArgs,
}

#[derive(Args, Debug)]
struct LayoutArgs {
    /// Title positions file (.yaml or .json)
    #[arg(long, default_value = "config/title_positions.yaml")]
    layouts: PathBuf,

    /// Deck template version (default: the file's default)
    #[arg(long)]
    layout_version: Option<String>,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Input slide feed(s) (.json)
    #[arg(required = true)]
    input: Vec<PathBuf>,

    #[command(flatten)]
    config: ConfigArgs,

    /// Output directory (default: same as input file)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print output to stdout instead of writing to file
    #[arg(short, long)]
    print: bool,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Input slide feed (.json)
    input: PathBuf,

    #[command(flatten)]
    layout: LayoutArgs,
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Root directory holding project folders
    root: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,

    /// Extension of the slide feed files
    #[arg(long, default_value = "json")]
    ext: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    match cli.command {
        Command::Extract(args) => run_extract(&args),
        Command::Inspect(args) => run_inspect(&args),
        Command::Scan(args) => run_scan(&args),
    }
}

fn run_extract(args: &ExtractArgs) -> Result<()> {
    let job = load_job(&args.config)?;

    for input_path in &args.input {
        log::info!("Processing: {}", input_path.display());

        match extract_file(&job, input_path) {
            Ok(result) => {
                let output = serde_json::to_string_pretty(&result)?;
                if args.print {
                    println!("{}", output);
                } else {
                    let output_path = get_output_path(input_path, args.output.as_ref())?;
                    write_output(&output_path, &output)?;
                    log::info!("Written to: {}", output_path.display());
                }
            }
            Err(e) => {
                eprintln!("Error processing {}: {:#}", input_path.display(), e);
            }
        }
    }

    Ok(())
}

fn run_inspect(args: &InspectArgs) -> Result<()> {
    let layouts = load_layouts(&args.layout.layouts)?;
    let layout = layouts.layout(args.layout.layout_version.as_deref())?;

    let content = read_file(&args.input)?;
    let feed = SlideFeed::from_json_str(&content)
        .with_context(|| format!("Invalid slide feed {}", args.input.display()))?;

    let summaries: Vec<SlideSummary> = feed
        .slides
        .into_iter()
        .map(|record| packspec_core::Slide::from_record(record, layout).map(|s| s.summary()))
        .collect::<packspec_core::Result<_>>()?;

    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}

fn run_scan(args: &ScanArgs) -> Result<()> {
    let job = load_job(&args.config)?;

    let files: Vec<PathBuf> = WalkDir::new(&args.root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    let decks = latest_decks(&files, &args.ext);
    if decks.is_empty() {
        eprintln!("No v3 slide feeds found under {}", args.root.display());
        return Ok(());
    }

    for deck in &decks {
        match scan_deck(&job, deck) {
            Ok(output_path) => println!("{} -> {}", deck.display(), output_path.display()),
            Err(e) => eprintln!("Error processing {}: {:#}", deck.display(), e),
        }
    }

    Ok(())
}

/// Extract one deck into a fresh result directory beside it.
fn scan_deck(job: &ExtractionJob, deck: &Path) -> Result<PathBuf> {
    let result = extract_file(job, deck)?;

    let base_dir = deck.parent().unwrap_or_else(|| Path::new("."));
    let result_dir = create_result_dir(base_dir)?;
    let stem = deck
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let output_path = result_dir.join(report_file_name(stem, "json"));

    write_output(&output_path, &serde_json::to_string_pretty(&result)?)?;
    Ok(output_path)
}

/// Load the rule profile and title layout named by the arguments.
fn load_job(config: &ConfigArgs) -> Result<ExtractionJob> {
    let fields = load_fields(&config.fields)?;
    let rules = fields
        .profile(&config.profile)
        .with_context(|| format!("In {}", config.fields.display()))?
        .clone();

    let layouts = load_layouts(&config.layout.layouts)?;
    let layout = layouts
        .layout(config.layout.layout_version.as_deref())
        .with_context(|| format!("In {}", config.layout.layouts.display()))?
        .clone();

    log::debug!(
        "Loaded profile '{}' with {} fields",
        config.profile,
        rules.field_names().len()
    );
    Ok(ExtractionJob::new(rules, layout))
}

fn load_fields(path: &Path) -> Result<FieldsConfig> {
    let content = read_file(path)?;
    let fields = if is_json(path) {
        FieldsConfig::from_json_str(&content)
    } else {
        FieldsConfig::from_yaml_str(&content)
    };
    fields.with_context(|| format!("Invalid field rules in {}", path.display()))
}

fn load_layouts(path: &Path) -> Result<TitleLayouts> {
    let content = read_file(path)?;
    let layouts = if is_json(path) {
        TitleLayouts::from_json_str(&content)
    } else {
        TitleLayouts::from_yaml_str(&content)
    };
    layouts.with_context(|| format!("Invalid title positions in {}", path.display()))
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// Run the extraction pipeline on a single slide feed file.
fn extract_file(job: &ExtractionJob, input_path: &Path) -> Result<ExtractionResult> {
    let content = read_file(input_path)?;
    let result = job
        .run_feed(&content)
        .with_context(|| format!("Extraction failed for {}", input_path.display()))?;
    log::info!("  Extracted {} fields", result.len());
    Ok(result)
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Create the first free `result`, `result_1`, ... directory under `base_dir`.
fn create_result_dir(base_dir: &Path) -> Result<PathBuf> {
    let mut attempt = 0;
    loop {
        let dir = base_dir.join(result_dir_name(attempt));
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create result directory: {}", dir.display()))?;
            log::info!("Created result directory: {}", dir.display());
            return Ok(dir);
        }
        attempt += 1;
    }
}

/// Determine the output path for a processed feed.
fn get_output_path(input_path: &Path, output_dir: Option<&PathBuf>) -> Result<PathBuf> {
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");

    let output_filename = format!("{}.fields.json", stem);

    let output_path = match output_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
            dir.join(output_filename)
        }
        None => match input_path.parent() {
            Some(parent) => parent.join(output_filename),
            None => PathBuf::from(output_filename),
        },
    };

    Ok(output_path)
}

/// Write output to a file.
fn write_output(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("Failed to write to {}", path.display()))
}
