//! dtree-dot CLI: turn exported decision trees into DOT text or images.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};

use dtree_dot::config::GraphvizConfig;
use dtree_dot::external::write_dot;
use dtree_dot::{load_model, logging, Dataset, DotRenderer, Graphviz, ImageFormat, RenderOptions};

#[derive(Parser, Debug)]
#[command(name = "dtree-dot")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Render trained decision trees as Graphviz diagrams", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print (or write) the DOT text for a model file
    Dot {
        /// Model JSON (tree arrays plus feature and class names)
        model: PathBuf,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Separator between base feature and one-hot category
        #[arg(long, default_value_t = '_')]
        separator: char,
    },

    /// Rasterize a model file through Graphviz
    Render {
        /// Model JSON (tree arrays plus feature and class names)
        model: PathBuf,

        /// Output image path
        #[arg(short, long, default_value = "tree.png")]
        output: PathBuf,

        /// Output format (png, svg, pdf, jpg, gif, dot)
        #[arg(short, long, default_value = "png")]
        format: ImageFormat,

        /// Separator between base feature and one-hot category
        #[arg(long, default_value_t = '_')]
        separator: char,

        /// Seconds to wait for Graphviz before giving up
        #[arg(long)]
        timeout: Option<u64>,

        /// Path to the `dot` executable
        #[arg(long)]
        dot_bin: Option<PathBuf>,
    },

    /// Encode a CSV and print the feature and class names a tree would use
    Encode {
        /// Input CSV with a header row
        dataset: PathBuf,

        /// Target column
        #[arg(short, long)]
        target: String,
    },
}

#[derive(Serialize)]
struct EncodeSummary<'a> {
    rows: usize,
    dropped_columns: &'a [String],
    feature_names: &'a [String],
    class_names: &'a [String],
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("Warning: {e}");
    }

    let result = match cli.command {
        Commands::Dot {
            model,
            output,
            separator,
        } => cmd_dot(&model, output.as_deref(), separator),
        Commands::Render {
            model,
            output,
            format,
            separator,
            timeout,
            dot_bin,
        } => cmd_render(&model, &output, format, separator, timeout, dot_bin),
        Commands::Encode { dataset, target } => cmd_encode(&dataset, &target),
    };

    if let Err(e) = result {
        error!("{e}");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn cmd_dot(model_path: &Path, output: Option<&Path>, separator: char) -> Result<(), Box<dyn std::error::Error>> {
    let model = load_model(model_path)?;
    let renderer = DotRenderer::with_options(
        &model.feature_names,
        &model.class_names,
        model.all_feature_names(),
        RenderOptions { separator },
    );
    let dot = renderer.to_dot(&model.tree)?;

    match output {
        Some(path) => {
            write_dot(&dot, path)?;
            info!(path = %path.display(), "wrote DOT file");
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(dot.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

fn cmd_render(
    model_path: &Path,
    output: &Path,
    format: ImageFormat,
    separator: char,
    timeout: Option<u64>,
    dot_bin: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = GraphvizConfig::from_env();
    if let Some(secs) = timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    if let Some(bin) = dot_bin {
        config = config.with_executable(bin);
    }

    let model = load_model(model_path)?;
    let renderer = DotRenderer::with_options(
        &model.feature_names,
        &model.class_names,
        model.all_feature_names(),
        RenderOptions { separator },
    );
    let written = renderer.save(&model.tree, output, format, &Graphviz::new(config))?;
    println!("{}", written.display());
    Ok(())
}

fn cmd_encode(dataset_path: &Path, target: &str) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = Dataset::load(dataset_path)?;
    let prepared = dataset.prepare(target)?;
    let summary = EncodeSummary {
        rows: prepared.targets.len(),
        dropped_columns: &prepared.dropped_columns,
        feature_names: &prepared.feature_names,
        class_names: &prepared.class_names,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
