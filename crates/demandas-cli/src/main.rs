mod display;
mod ingest;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, bail};
use chrono::{NaiveDate, Utc};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::Level;

use demandas_core::normalize::parse_strict_date;
use demandas_core::{PipelineConfig, StatusBucket, Team};
use demandas_pipeline::{BatchReport, Pipeline};
use demandas_timeline::Scope;

use crate::ingest::IngestStats;

#[derive(Parser)]
#[command(
    name = "demandas",
    version,
    about = "Correct demand spreadsheets and compute team timelines"
)]
struct Cli {
    /// Log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and print timeline metrics
    Process {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Print the correction audit log as JSON lines
    Audit {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Print corrected records as a table
    Records {
        #[command(flatten)]
        input: InputArgs,
    },
}

#[derive(Args)]
struct InputArgs {
    /// CSV export to read
    csv: PathBuf,
    /// Pipeline configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Field delimiter; sniffed from the header line when omitted
    #[arg(long)]
    delimiter: Option<char>,
    /// Correction worker threads
    #[arg(long)]
    workers: Option<usize>,
    /// Tukey fence multiplier for outlier detection
    #[arg(long, env = "DEMANDAS_IQR_MULTIPLIER")]
    iqr_multiplier: Option<f64>,
}

#[derive(Args)]
struct ScopeArgs {
    /// First day included (inclusive)
    #[arg(long, value_parser = parse_day)]
    start: Option<NaiveDate>,
    /// Last day included (inclusive)
    #[arg(long, value_parser = parse_day)]
    end: Option<NaiveDate>,
    /// Restrict to a team; repeatable
    #[arg(long = "team")]
    teams: Vec<String>,
    /// Restrict to resolved or pending demands
    #[arg(long, value_enum)]
    status: Option<BucketArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Table,
}

#[derive(Clone, Copy, ValueEnum)]
enum BucketArg {
    Resolved,
    Pending,
}

impl From<BucketArg> for StatusBucket {
    fn from(arg: BucketArg) -> Self {
        match arg {
            BucketArg::Resolved => StatusBucket::Resolved,
            BucketArg::Pending => StatusBucket::Pending,
        }
    }
}

fn parse_day(raw: &str) -> Result<NaiveDate, String> {
    parse_strict_date(raw).ok_or_else(|| format!("invalid date: {raw} (expected YYYY-MM-DD or DD/MM/YYYY)"))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Process {
            input,
            scope,
            format,
        } => {
            let pipeline = build_pipeline(&input)?;
            let scope = build_scope(&pipeline, &scope)?;
            let (report, ingest) = run(&pipeline, &input, &scope)?;
            match format {
                OutputFormat::Json => {
                    let out = display::ProcessOutput::new(&report, &ingest);
                    println!("{}", serde_json::to_string_pretty(&out)?);
                }
                OutputFormat::Table => display::print_report(&report, &ingest)?,
            }
        }
        Commands::Audit { input } => {
            let pipeline = build_pipeline(&input)?;
            let (report, _) = run(&pipeline, &input, &Scope::all())?;
            let stdout = io::stdout();
            let mut out = stdout.lock();
            report
                .audit
                .write_json_lines(&mut out)
                .context("writing audit log")?;
            out.flush()?;
        }
        Commands::Records { input } => {
            let pipeline = build_pipeline(&input)?;
            let (report, ingest) = run(&pipeline, &input, &Scope::all())?;
            display::print_records(&report, &ingest)?;
        }
    }

    Ok(())
}

fn build_pipeline(input: &InputArgs) -> anyhow::Result<Pipeline> {
    let mut config = match &input.config {
        Some(path) => PipelineConfig::from_path(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(workers) = input.workers {
        config.workers = Some(workers);
    }
    if let Some(k) = input.iqr_multiplier {
        config.detector.iqr_multiplier = k;
    }
    Ok(Pipeline::new(config)?)
}

fn build_scope(pipeline: &Pipeline, args: &ScopeArgs) -> anyhow::Result<Scope> {
    let aliases = pipeline.normalizer().aliases();
    let mut teams: Vec<Team> = Vec::with_capacity(args.teams.len());
    for raw in &args.teams {
        match aliases.team(raw) {
            Some(team) => teams.push(team),
            None => bail!(
                "unknown team: {raw} (expected one of {})",
                Team::ALL.map(|t| t.as_str()).join(", ")
            ),
        }
    }
    Ok(Scope::new(args.start, args.end, teams)?.with_bucket(args.status.map(StatusBucket::from)))
}

fn run(
    pipeline: &Pipeline,
    input: &InputArgs,
    scope: &Scope,
) -> anyhow::Result<(BatchReport, IngestStats)> {
    let delimiter = match input.delimiter {
        Some(c) if c.is_ascii() => Some(c as u8),
        Some(c) => bail!("delimiter must be a single ASCII character, got {c:?}"),
        None => None,
    };
    let (rows, stats) = ingest::read_csv_file(&input.csv, delimiter)?;

    Ok((pipeline.run(&rows, scope, Utc::now()), stats))
}
