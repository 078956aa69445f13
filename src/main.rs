//! onnx-fixtures CLI - Command-line interface for model and tensor fixture generation

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use onnx_fixtures::error::failure_message;
use onnx_fixtures::utils::shape_utils::format_shape;
use onnx_fixtures::{
    FixtureConfig, FixtureKind, FixturePipeline, NetworkKind, DEFAULT_INPUT_JSON,
    DEFAULT_LENET_MODEL, DEFAULT_NETWORK_MODEL, DEFAULT_OUTPUT_JSON, VERSION,
};

/// onnx-fixtures - Generate ONNX models with matching input/output fixtures
#[derive(Parser, Debug)]
#[command(name = "onnx-fixtures")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Seed for input synthesis and weight initialization
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Write indented JSON fixtures
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate input.json for an existing model and capture output.json
    Lenet {
        /// Model to read
        #[arg(short, long, default_value = DEFAULT_LENET_MODEL)]
        model: PathBuf,

        /// Input fixture to write
        #[arg(short, long, default_value = DEFAULT_INPUT_JSON)]
        input: PathBuf,

        /// Output fixture to write
        #[arg(short, long, default_value = DEFAULT_OUTPUT_JSON)]
        output: PathBuf,
    },

    /// Export the five-block convolutional network with an example input
    Conv2d {
        /// Model to write
        #[arg(short, long, default_value = DEFAULT_NETWORK_MODEL)]
        model: PathBuf,

        /// Input fixture to write
        #[arg(short, long, default_value = DEFAULT_INPUT_JSON)]
        input: PathBuf,

        /// Also capture the expected output to this path
        #[arg(long)]
        capture: Option<PathBuf>,
    },

    /// Export the 784-20-10 perceptron with an example input
    Mlp {
        /// Model to write
        #[arg(short, long, default_value = DEFAULT_NETWORK_MODEL)]
        model: PathBuf,

        /// Input fixture to write
        #[arg(short, long, default_value = DEFAULT_INPUT_JSON)]
        input: PathBuf,

        /// Also capture the expected output to this path
        #[arg(long)]
        capture: Option<PathBuf>,
    },

    /// Run a model on an existing input fixture and write its first output
    Capture {
        /// Model to read
        #[arg(short, long, default_value = DEFAULT_LENET_MODEL)]
        model: PathBuf,

        /// Input fixture to read
        #[arg(short, long, default_value = DEFAULT_INPUT_JSON)]
        input: PathBuf,

        /// Output fixture to write
        #[arg(short, long, default_value = DEFAULT_OUTPUT_JSON)]
        output: PathBuf,
    },

    /// Re-run inference and compare against an existing output fixture
    Validate {
        /// Model to read
        #[arg(short, long, default_value = DEFAULT_LENET_MODEL)]
        model: PathBuf,

        /// Input fixture to read
        #[arg(short, long, default_value = DEFAULT_INPUT_JSON)]
        input: PathBuf,

        /// Expected output fixture
        #[arg(short, long, default_value = DEFAULT_OUTPUT_JSON)]
        output: PathBuf,
    },

    /// Show model information and fixture digests
    Info {
        /// Model to read
        #[arg(short, long, default_value = DEFAULT_LENET_MODEL)]
        model: PathBuf,

        /// Input fixture to digest, if present
        #[arg(short, long, default_value = DEFAULT_INPUT_JSON)]
        input: PathBuf,

        /// Output fixture to digest, if present
        #[arg(short, long, default_value = DEFAULT_OUTPUT_JSON)]
        output: PathBuf,
    },
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

fn create_progress_bar(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    Ok(pb)
}

fn load_config(cli: &Cli) -> Result<FixtureConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            FixtureConfig::load(path)?
        }
        None => FixtureConfig::default(),
    };
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    if cli.pretty {
        config.pretty_json = true;
    }
    Ok(config)
}

fn export(
    pipeline: &FixturePipeline,
    kind: NetworkKind,
    model: PathBuf,
    input: PathBuf,
    capture: Option<PathBuf>,
) -> Result<ExitCode> {
    let pb = create_progress_bar(&format!("Exporting {} network...", kind))?;
    let result = pipeline.export_network(kind, &model, &input, capture.as_deref());
    pb.finish_and_clear();

    let report = result?;
    info!(
        "Exported {} with {} operators to {:?}",
        kind, report.operators, model
    );
    if let Some(shape) = report.output_shape {
        info!("Captured output shape: {}", format_shape(&shape));
    }
    Ok(ExitCode::SUCCESS)
}

fn run(cli: Cli) -> Result<ExitCode> {
    let pipeline = FixturePipeline::new(load_config(&cli)?);

    match cli.command {
        Commands::Lenet {
            model,
            input,
            output,
        } => {
            let pb = create_progress_bar("Running inference...")?;
            let result = pipeline.lenet(&model, &input, &output);
            pb.finish_and_clear();

            let report = result?;
            info!(
                "Input {} -> output {}",
                format_shape(&report.input_shape),
                format_shape(&report.output_shape)
            );
            Ok(ExitCode::SUCCESS)
        }

        Commands::Conv2d {
            model,
            input,
            capture,
        } => export(&pipeline, NetworkKind::Conv2d, model, input, capture),

        Commands::Mlp {
            model,
            input,
            capture,
        } => export(&pipeline, NetworkKind::Mlp, model, input, capture),

        Commands::Capture {
            model,
            input,
            output,
        } => {
            let pb = create_progress_bar("Running inference...")?;
            let result = pipeline.capture_output(&model, &input, &output);
            pb.finish_and_clear();
            result?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Validate {
            model,
            input,
            output,
        } => {
            let result = pipeline.validate(&model, &input, &output)?;
            println!("{}", result.summary());
            Ok(if result.passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Commands::Info {
            model,
            input,
            output,
        } => {
            let description = pipeline.describe(
                &model,
                &[(FixtureKind::Input, input), (FixtureKind::Output, output)],
            )?;
            println!("{:?}", model);
            for line in description.lines() {
                println!("  {}", line);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = setup_logging(cli.verbose) {
        eprintln!("Error: {:#}", err);
        return ExitCode::FAILURE;
    }

    info!("onnx-fixtures v{}", VERSION);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}", failure_message(&err));
            ExitCode::FAILURE
        }
    }
}
