use std::path::{Path, PathBuf};
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use dataset_prep::app::Dataset;
use dataset_prep::config::ConfigLoader;
use dataset_prep::descriptor::{DatasetDescriptor, DescriptorOptions};
use dataset_prep::domain::{AcquisitionResult, Preset};
use dataset_prep::engine::AcquisitionStatus;
use dataset_prep::error::{ErrorKind, PrepError};
use dataset_prep::fs_util::ArchiveExtractor;
use dataset_prep::output::{JsonOutput, OutputMode, SilentProgress};
use dataset_prep::table::{self, TableFormat};
use dataset_prep::transport::{TransferProgress, Transport};

#[derive(Parser)]
#[command(name = "dsprep")]
#[command(about = "Download, extract and track datasets for model training")]
#[command(version)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download and extract every split that is not yet on disk")]
    Acquire(DatasetArgs),
    #[command(about = "Remove the local copy and acquire it again")]
    Refresh(DatasetArgs),
    #[command(about = "Show which artifacts are downloaded and extracted")]
    Status(DatasetArgs),
    #[command(about = "Load a CSV or IDX file and summarize it")]
    Load(LoadArgs),
}

#[derive(Args, Clone)]
struct DatasetArgs {
    #[arg(long)]
    config: Option<String>,

    #[arg(long, conflicts_with = "config")]
    preset: Option<Preset>,

    #[arg(long)]
    source: Option<String>,

    #[arg(long)]
    file: Option<String>,

    #[arg(long)]
    root: Option<String>,

    #[arg(long)]
    quiet: bool,
}

#[derive(Args)]
struct LoadArgs {
    path: PathBuf,

    #[arg(long, default_value_t = 5)]
    rows: usize,
}

#[derive(Serialize)]
struct AcquireReport {
    result: AcquisitionResult,
    downloaded: bool,
    extracted: bool,
    destination_root: String,
}

#[derive(Serialize)]
struct TableSummary {
    path: String,
    format: Option<TableFormat>,
    columns: usize,
    rows: usize,
    headers: Vec<String>,
    preview: Vec<Vec<String>>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<PrepError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PrepError) -> u8 {
    match error.kind() {
        ErrorKind::Configuration => 2,
        ErrorKind::Transport | ErrorKind::Archive => 3,
        ErrorKind::Filesystem | ErrorKind::Load | ErrorKind::Task => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    match cli.command {
        Commands::Acquire(args) => run_acquire(args, output_mode, false),
        Commands::Refresh(args) => run_acquire(args, output_mode, true),
        Commands::Status(args) => run_status(args, output_mode),
        Commands::Load(args) => run_load(args, output_mode),
    }
}

fn resolve_options(args: &DatasetArgs) -> Result<DescriptorOptions, PrepError> {
    let mut options = match args.preset {
        Some(preset) => ConfigLoader::preset(preset, args.source.as_deref(), args.file.as_deref())?,
        None => {
            let mut options = ConfigLoader::resolve(args.config.as_deref())?;
            if let Some(source) = &args.source {
                options.source = source.clone();
            }
            options
        }
    };
    if let Some(root) = &args.root {
        options.destination_root = Utf8PathBuf::from(root);
    }
    if args.quiet {
        options.verbose = false;
    }
    Ok(options)
}

fn run_acquire(args: DatasetArgs, output_mode: OutputMode, refresh: bool) -> miette::Result<()> {
    let mut options = resolve_options(&args)?;
    if matches!(output_mode, OutputMode::Json) {
        options.verbose = false;
    }
    let verbose = options.verbose;
    let mut dataset = Dataset::from_options(options)?;
    if matches!(output_mode, OutputMode::Json) {
        dataset = dataset.with_sink(SilentProgress);
    }

    let result = if refresh {
        dataset.refresh(verbose)?
    } else {
        dataset.ensure_acquired(verbose)?
    };

    let report = AcquireReport {
        result,
        downloaded: dataset.is_downloaded(),
        extracted: dataset.is_extracted(),
        destination_root: dataset.descriptor().destination_root().to_string(),
    };
    match output_mode {
        OutputMode::Json => JsonOutput::print(&report).into_diagnostic(),
        OutputMode::Human => {
            match report.result {
                AcquisitionResult::NoOp => println!(
                    "Dataset already present in {}",
                    report.destination_root
                ),
                AcquisitionResult::Acquired => {
                    println!("Dataset ready in {}", report.destination_root)
                }
            }
            Ok(())
        }
    }
}

fn run_status(args: DatasetArgs, output_mode: OutputMode) -> miette::Result<()> {
    let options = resolve_options(&args)?;
    let descriptor = DatasetDescriptor::new(options)?;
    let dataset = Dataset::new(descriptor, NopTransport, NopArchive).with_sink(SilentProgress);
    let status = dataset.status();
    match output_mode {
        OutputMode::Json => JsonOutput::print(&status).into_diagnostic(),
        OutputMode::Human => {
            print_status(&status);
            Ok(())
        }
    }
}

fn print_status(status: &AcquisitionStatus) {
    println!("source: {}", status.source);
    println!("root:   {}", status.destination_root);
    for split in &status.splits {
        if !split.present {
            println!("{:<9} absent", split.split.as_str());
            continue;
        }
        println!("{:<9} {}", split.split.as_str(), split.folder);
        for artifact in &split.artifacts {
            println!(
                "  {:<40} downloaded={} extracted={}",
                artifact.name, artifact.downloaded, artifact.extracted
            );
        }
    }
}

fn run_load(args: LoadArgs, output_mode: OutputMode) -> miette::Result<()> {
    let loaded = table::load_table(&args.path)?;
    let summary = TableSummary {
        path: args.path.display().to_string(),
        format: TableFormat::detect(&args.path),
        columns: loaded.column_count(),
        rows: loaded.row_count(),
        preview: loaded.rows.iter().take(args.rows).cloned().collect(),
        headers: loaded.headers,
    };
    match output_mode {
        OutputMode::Json => JsonOutput::print(&summary).into_diagnostic(),
        OutputMode::Human => {
            println!(
                "{}: {} rows x {} columns",
                summary.path, summary.rows, summary.columns
            );
            if summary.columns <= 16 {
                println!("{}", summary.headers.join(","));
                for row in &summary.preview {
                    println!("{}", row.join(","));
                }
            }
            Ok(())
        }
    }
}

struct NopTransport;
struct NopArchive;

impl Transport for NopTransport {
    fn fetch(
        &self,
        _url: &str,
        _destination: &Path,
        _on_progress: Option<&mut dyn FnMut(TransferProgress)>,
    ) -> Result<(), PrepError> {
        Err(PrepError::TransportHttp(
            "transport not configured".to_string(),
        ))
    }
}

impl ArchiveExtractor for NopArchive {
    fn extract(&self, _archive_path: &Path, _destination: &Path) -> Result<(), PrepError> {
        Err(PrepError::Archive("extractor not configured".to_string()))
    }
}
