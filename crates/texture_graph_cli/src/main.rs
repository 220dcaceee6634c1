// SPDX-License-Identifier: MIT OR Apache-2.0
//! `texgraph` - command-line host for the texture graph engine.
//!
//! Loads a RON project, binds its source images, renders the export node and
//! writes the result to disk.

mod image_io;
mod project;

use clap::{Parser, Subcommand};
use image_io::ImageIoError;
use project::{ProjectDocument, ProjectError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use texture_graph::{EvaluationError, NodeCategory, NodeRegistry};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Error reported by the command line
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error(transparent)]
    Image(#[from] ImageIoError),

    #[error("Evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),
}

impl CliError {
    /// What went wrong, for the error log
    fn category(&self) -> &'static str {
        match self {
            Self::Project(_) => "project",
            Self::Image(_) => "image",
            Self::Evaluation(e) if e.is_invalid_configuration() => "graph configuration",
            Self::Evaluation(_) => "graph lookup",
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "texgraph", version, about = "Render texture graph projects")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, PartialEq, Subcommand)]
enum Command {
    /// Evaluate a project and write its export image
    Render {
        /// Project file (RON)
        project: PathBuf,
        /// Output image, defaults to the project's `output`
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Graph size as <width>x<height>
        #[arg(short, long, value_parser = parse_size)]
        size: Option<(u32, u32)>,
    },
    /// Write a starter project
    Init {
        /// Project file to create
        project: PathBuf,
    },
    /// List the node catalog
    Nodes,
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let invalid = || format!("invalid size '{value}', expected <width>x<height>");
    let (width, height) = value.split_once('x').ok_or_else(invalid)?;
    let width = width.trim().parse().map_err(|_| invalid())?;
    let height = height.trim().parse().map_err(|_| invalid())?;
    Ok((width, height))
}

fn render(project_path: &Path, output: Option<PathBuf>, size: Option<(u32, u32)>) -> Result<(), CliError> {
    let document = ProjectDocument::load(project_path)?;
    let base = project_path.parent().unwrap_or_else(|| Path::new("."));
    let mut project = document.build()?;

    if let Some((width, height)) = size {
        project.session.set_dimensions(width, height)?;
    }

    for (node, source) in project.sources() {
        let bitmap = image_io::load_bitmap(&base.join(&source))?;
        project.session.bind_source_bitmap(node, Arc::new(bitmap))?;
    }

    let pixels = project.session.evaluate(project.sink)?;
    let dimensions = project.session.dimensions();
    let output = output.unwrap_or_else(|| base.join(&document.output));
    image_io::save_pixels(&output, dimensions.width(), dimensions.height(), &pixels)?;

    tracing::info!(
        output = %output.display(),
        width = dimensions.width(),
        height = dimensions.height(),
        "rendered"
    );
    Ok(())
}

fn init(project_path: &Path) -> Result<(), CliError> {
    ProjectDocument::template().save(project_path)?;
    tracing::info!(project = %project_path.display(), "wrote starter project");
    Ok(())
}

fn list_nodes() {
    let registry = NodeRegistry::with_builtins();
    for category in [
        NodeCategory::Input,
        NodeCategory::Output,
        NodeCategory::Channel,
        NodeCategory::Math,
        NodeCategory::Filter,
        NodeCategory::Utility,
    ] {
        println!("{category:?}");
        for node_type in registry.types_in_category(category) {
            let ports = |ports: &[texture_graph::Port]| {
                ports
                    .iter()
                    .map(|p| format!("{}: {}", p.name, p.element_type))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            println!(
                "  {:<20} {} ({}) -> ({})",
                node_type.kind.id(),
                node_type.description,
                ports(&node_type.inputs),
                ports(&node_type.outputs)
            );
        }
    }
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Render { project, output, size } => render(&project, output, size),
        Command::Init { project } => init(&project),
        Command::Nodes => {
            list_nodes();
            Ok(())
        }
    }
}

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("texture_graph=info,texgraph=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("texgraph v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    if let Err(e) = run(cli.command) {
        tracing::error!(category = e.category(), "{e}");
        std::process::exit(1);
    }
}
