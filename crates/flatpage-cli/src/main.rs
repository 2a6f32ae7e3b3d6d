// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// flatpage — command-line front end: detect page corners or rectify a batch
// of photographed documents.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, WrapErr};
use flatpage_core::{LocatorStrategy, PipelineConfig};
use flatpage_scan::raster::codec;
use flatpage_scan::{CornerOracle, DocumentPipeline, ScanEnhancer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a JSON pipeline configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured corner locator
    #[arg(long, global = true)]
    locator: Option<LocatorArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the detected corners of each input as JSON lines
    Detect {
        /// Input images
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Rectify each input and write the result to the output directory
    Rectify {
        /// Input images
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Directory for rectified images
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Output encoding
        #[arg(long, value_enum, default_value_t = OutputFormat::Png)]
        format: OutputFormat,
        /// JPEG quality (1-100)
        #[arg(long, default_value_t = 90)]
        quality: u8,
        /// Skip contrast and sharpening
        #[arg(long)]
        no_enhance: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LocatorArg {
    Classical,
    Oracle,
}

impl From<LocatorArg> for LocatorStrategy {
    fn from(arg: LocatorArg) -> Self {
        match arg {
            LocatorArg::Classical => LocatorStrategy::Classical,
            LocatorArg::Oracle => LocatorStrategy::Oracle,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_deref(), cli.locator)?;
    let pipeline = DocumentPipeline::from_config(&config, oracle_for(&config)?)?;
    if let Err(err) = pipeline.initialize() {
        warn!(error = %err, locator = pipeline.locator_name(), "Locator not ready; inputs will pass through");
    }

    match cli.command {
        Commands::Detect { inputs } => detect_files(&pipeline, &config, &inputs),
        Commands::Rectify {
            inputs,
            output_dir,
            format,
            quality,
            no_enhance,
        } => {
            let mut config = config;
            if no_enhance {
                config.enhance.enabled = false;
            }
            let written = rectify_files(&pipeline, &config, &inputs, &output_dir, format, quality)?;
            info!(count = written.len(), dir = %output_dir.display(), "Batch complete");
            Ok(())
        }
    }
}

/// Configuration file (or defaults) with the command-line locator override.
fn resolve_config(path: Option<&Path>, locator: Option<LocatorArg>) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::load(path)
            .wrap_err_with(|| format!("loading configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(locator) = locator {
        config.locator = locator.into();
    }
    config.validate()?;
    Ok(config)
}

#[cfg(feature = "ollama")]
fn oracle_for(config: &PipelineConfig) -> Result<Option<Arc<dyn CornerOracle>>> {
    if config.locator != LocatorStrategy::Oracle {
        return Ok(None);
    }
    let oracle = flatpage_scan::OllamaCornerOracle::new(&config.oracle)?;
    Ok(Some(Arc::new(oracle)))
}

#[cfg(not(feature = "ollama"))]
fn oracle_for(_config: &PipelineConfig) -> Result<Option<Arc<dyn CornerOracle>>> {
    Ok(None)
}

fn detect_files(pipeline: &DocumentPipeline, config: &PipelineConfig, inputs: &[PathBuf]) -> Result<()> {
    for input in inputs {
        let image = codec::open(input, config.max_input_dimension)?;
        let quad = pipeline.detect(&image);
        let line = serde_json::json!({
            "input": input.display().to_string(),
            "width": image.width(),
            "height": image.height(),
            "corners": quad,
        });
        println!("{line}");
    }
    Ok(())
}

/// Rectify `inputs` one at a time into `output_dir`. Returns the written paths.
fn rectify_files(
    pipeline: &DocumentPipeline,
    config: &PipelineConfig,
    inputs: &[PathBuf],
    output_dir: &Path,
    format: OutputFormat,
    quality: u8,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;

    let decoded = inputs
        .iter()
        .map(|path| codec::open(path, config.max_input_dimension));
    let mut written = Vec::with_capacity(inputs.len());

    pipeline.process_batch(decoded, |index, output| {
        let destination = output_path(&inputs[index], output_dir, format);
        let image = if output.is_rectified() {
            ScanEnhancer::from_raster(&output.image)?
                .apply(&config.enhance)
                .into_raster()?
        } else {
            warn!(input = %inputs[index].display(), outcome = ?output.outcome, "Writing input unchanged");
            output.image
        };

        let bytes = match format {
            OutputFormat::Png => codec::encode_png(&image)?,
            OutputFormat::Jpeg => codec::encode_jpeg(&image, quality)?,
        };
        std::fs::write(&destination, bytes)?;
        info!(output = %destination.display(), width = image.width(), height = image.height(), "Written");
        written.push(destination);
        Ok(())
    })?;

    Ok(written)
}

/// `<output_dir>/<input stem>.<ext>`
fn output_path(input: &Path, output_dir: &Path, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "page".into());
    output_dir.join(format!("{stem}.{}", format.extension()))
}
