//! inspect-report - fills Word inspection report templates from measurement CSV exports

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use inspection_report::notify::{self, Notification, NotificationLevel};
use inspection_report::{
    list_csv_files, load_inspection_params, BridgeBackend, FieldValue, ProductParam,
    ReportConfig, ReportOrchestrator, ReportOutcome, ReportRequest,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "inspect-report")]
#[command(
    author,
    version,
    about = "Generate inspection reports from measurement CSV files"
)]
struct Cli {
    /// Log every automation step
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a report from a measurement CSV file
    Generate(GenerateArgs),

    /// List the CSV files in a directory
    ListCsv {
        /// Directory to search
        dir: PathBuf,
    },

    /// Print the inspection parameters parsed from a CSV file
    Params {
        /// Measurement CSV file
        #[arg(long)]
        csv: PathBuf,
    },
}

#[derive(Args)]
struct GenerateArgs {
    /// Measurement CSV file
    #[arg(long)]
    csv: PathBuf,

    /// Word template (default: from config)
    #[arg(short, long)]
    template: Option<PathBuf>,

    /// Output .docx file (default: timestamped name in the output directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "")]
    job_order: String,

    #[arg(long, default_value = "")]
    customer: String,

    #[arg(long, default_value = "")]
    material_grade: String,

    #[arg(long, default_value = "")]
    serial_no: String,

    /// Measurement tool, written on every table row
    #[arg(long, default_value = "")]
    tool_name: String,

    /// Measurement tool number, written on every table row
    #[arg(long, default_value = "")]
    tool_no: String,

    #[arg(long, default_value = "")]
    inspector: String,

    #[arg(long, default_value = "")]
    reviewer: String,
}

impl GenerateArgs {
    fn product(&self) -> ProductParam {
        ProductParam {
            job_order: self.job_order.clone(),
            material_grade: self.material_grade.clone(),
            customer: self.customer.clone(),
            product_serial_no: self.serial_no.clone(),
            measurement_tool: self.tool_name.clone(),
            measurement_no: self.tool_no.clone(),
            inspector: self.inspector.clone(),
            reviewer: self.reviewer.clone(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Generate(args) => generate(&args),
        Commands::ListCsv { dir } => list_csv(&dir),
        Commands::Params { csv } => show_params(&csv),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn generate(args: &GenerateArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ReportConfig::load(path)?,
        None => ReportConfig::default(),
    };
    if let Some(template) = &args.template {
        config.template = template.clone();
    }
    let destination = args
        .output
        .clone()
        .unwrap_or_else(|| config.output_path(chrono::Local::now()));

    let inspections = load_inspection_params(&args.csv)
        .with_context(|| format!("Failed to load '{}'", args.csv.display()))?;
    let request = ReportRequest::new(&config.template, destination)
        .with_product(args.product())
        .with_inspections(inspections);

    let (notifier, queue) = notify::channel();

    // Automation handles are thread-affine, so the backend is created on the
    // worker and never leaves it.
    let worker = std::thread::Builder::new()
        .name("report-worker".into())
        .spawn(move || -> bool {
            let backend = match BridgeBackend::start(&config.bridge) {
                Ok(backend) => backend,
                Err(e) => {
                    notifier.error("Report generation failed", e.to_string());
                    return false;
                }
            };
            let mut orchestrator = ReportOrchestrator::new(&backend, config).with_notifier(notifier);
            let outcome = orchestrator.generate(&request);
            debug!("Report states: {:?}", orchestrator.states());
            !matches!(outcome, ReportOutcome::Failed(_))
        })
        .context("Failed to start the report worker")?;

    // Ends once the worker has dropped its notifier.
    while let Some(notification) = queue.recv() {
        print_notification(&notification);
    }

    let succeeded = worker
        .join()
        .map_err(|_| anyhow::anyhow!("The report worker panicked"))?;
    if !succeeded {
        bail!("Report generation failed");
    }
    info!("Done");
    Ok(())
}

fn print_notification(notification: &Notification) {
    match notification.level {
        NotificationLevel::Info => println!("{}: {}", notification.title, notification.body),
        NotificationLevel::Warning | NotificationLevel::Error => eprintln!(
            "{} ({}): {}",
            notification.title, notification.level, notification.body
        ),
    }
}

fn list_csv(dir: &Path) -> Result<()> {
    let files =
        list_csv_files(dir).with_context(|| format!("Failed to read '{}'", dir.display()))?;
    if files.is_empty() {
        eprintln!("Warning: no CSV files in '{}'", dir.display());
    }
    for file in files {
        println!("{}", file.display());
    }
    Ok(())
}

fn show_params(csv: &Path) -> Result<()> {
    let params = load_inspection_params(csv)
        .with_context(|| format!("Failed to load '{}'", csv.display()))?;

    println!("Name\tDefault\tMax\tMin\tActual\tOffset\tOverOffset");
    for p in &params {
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            p.name,
            cell(&p.default_value),
            cell(&p.max_value),
            cell(&p.min_value),
            cell(&p.actual_value),
            cell(&p.offset),
            cell(&p.over_offset)
        );
    }
    eprintln!("{} parameter(s)", params.len());
    Ok(())
}

fn cell(value: &FieldValue) -> String {
    match value {
        FieldValue::Empty => "-".to_string(),
        other => other.to_string(),
    }
}
