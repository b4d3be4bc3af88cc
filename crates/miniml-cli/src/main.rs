// SPDX-License-Identifier: AGPL-3.0-or-later
//! `miniml`: converts MiniML documents from the command line

mod args;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;
use miniml_core::formats::RenderFunctionRenderer;
use miniml_core::{load, ConvertOptions, InputFormat, OutputFormat, RendererRegistry};
use tracing_subscriber::EnvFilter;

use crate::args::{BuildCommand, CliArguments, Command};

fn main() -> ExitCode {
    let arguments = CliArguments::parse();
    init_tracing(arguments.verbose);

    let result = match &arguments.command {
        Command::Build(command) => build(command).map(|_| ()),
        Command::Version => {
            println!("miniml {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Where the rendered document goes
#[derive(Debug, Clone, PartialEq, Eq)]
enum Destination {
    Stdout,
    File(PathBuf),
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

fn input_format(command: &BuildCommand) -> InputFormat {
    command
        .input
        .map(InputFormat::from)
        .or_else(|| extension(&command.source).and_then(InputFormat::from_extension))
        .unwrap_or(InputFormat::Miniml)
}

fn output_format(command: &BuildCommand) -> OutputFormat {
    command
        .output
        .map(OutputFormat::from)
        .or_else(|| {
            command
                .dest
                .as_deref()
                .and_then(extension)
                .and_then(OutputFormat::from_extension)
        })
        .unwrap_or(OutputFormat::Html)
}

fn destination(command: &BuildCommand, format: OutputFormat) -> Destination {
    match &command.dest {
        Some(dest) if dest.as_os_str() == "-" => Destination::Stdout,
        Some(dest) => Destination::File(dest.clone()),
        None => Destination::File(command.source.with_extension(format.extension())),
    }
}

fn load_options(command: &BuildCommand) -> anyhow::Result<ConvertOptions> {
    let mut options = match &command.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => ConvertOptions::default(),
    };

    if command.normalize_lists {
        options.normalize_lists = true;
    }
    Ok(options)
}

/// Run a build, returning the written file when output did not go to stdout
fn build(command: &BuildCommand) -> anyhow::Result<Option<PathBuf>> {
    let from = input_format(command);
    let to = output_format(command);
    let options = load_options(command)?;
    let destination = destination(command, to);

    if destination == Destination::File(command.source.clone()) {
        bail!("refusing to overwrite the source {}", command.source.display());
    }

    let source = std::fs::read_to_string(&command.source)
        .with_context(|| format!("failed to read {}", command.source.display()))?;
    tracing::info!(source = %command.source.display(), ?from, %to, "building");

    let root = load(&source, from, &options)
        .with_context(|| format!("failed to load {}", command.source.display()))?;

    let (output, manifest) = if to == OutputFormat::RenderFunction {
        let function = RenderFunctionRenderer::new().export(&root, &options.render);
        let manifest = (!function.manifest.is_empty() || !function.components.is_empty())
            .then(|| serde_json::to_string_pretty(&function))
            .transpose()?;
        (function.code, manifest)
    } else {
        let registry = RendererRegistry::with_defaults();
        (registry.render(&root, to, &options.render)?, None)
    };

    match destination {
        Destination::Stdout => {
            io::stdout()
                .write_all(output.as_bytes())
                .context("failed to write to stdout")?;
            Ok(None)
        }
        Destination::File(path) => {
            std::fs::write(&path, output)
                .with_context(|| format!("failed to write {}", path.display()))?;
            if let Some(manifest) = manifest {
                let sidecar = path.with_extension("manifest.json");
                std::fs::write(&sidecar, manifest)
                    .with_context(|| format!("failed to write {}", sidecar.display()))?;
            }
            Ok(Some(path))
        }
    }
}
