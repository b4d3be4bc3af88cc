// SPDX-License-Identifier: AGPL-3.0-or-later
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use miniml_core::{InputFormat, OutputFormat};

/// Convert MiniML documents to HTML, LaTeX, Typst and more
#[derive(Debug, Clone, Parser)]
#[command(name = "miniml", version, author)]
pub struct CliArguments {
    /// The command to run
    #[command(subcommand)]
    pub command: Command,

    /// Raise logging verbosity, `RUST_LOG` takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Converts a source file
    #[command(visible_alias = "b")]
    Build(BuildCommand),

    /// Prints the version
    Version,
}

#[derive(Debug, Clone, Args)]
pub struct BuildCommand {
    /// Path to the source document
    pub source: PathBuf,

    /// Output path, `-` for stdout; defaults to the source with the output extension
    pub dest: Option<PathBuf>,

    /// Source format, inferred from the extension when absent
    #[arg(long = "input", value_name = "FORMAT")]
    pub input: Option<InputArg>,

    /// Target format, inferred from the destination when absent
    #[arg(long = "output", value_name = "FORMAT")]
    pub output: Option<OutputArg>,

    /// Rebuild list nesting before rendering
    #[arg(long = "normalize-lists")]
    pub normalize_lists: bool,

    /// TOML file with conversion options
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
pub enum InputArg {
    Md,
    Ast,
}

impl From<InputArg> for InputFormat {
    fn from(arg: InputArg) -> Self {
        match arg {
            InputArg::Md => InputFormat::Miniml,
            InputArg::Ast => InputFormat::Ast,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
pub enum OutputArg {
    Html,
    Latex,
    Typst,
    Md,
    RenderFn,
    Dump,
}

impl From<OutputArg> for OutputFormat {
    fn from(arg: OutputArg) -> Self {
        match arg {
            OutputArg::Html => OutputFormat::Html,
            OutputArg::Latex => OutputFormat::Latex,
            OutputArg::Typst => OutputFormat::Typst,
            OutputArg::Md => OutputFormat::Markdown,
            OutputArg::RenderFn => OutputFormat::RenderFunction,
            OutputArg::Dump => OutputFormat::Dump,
        }
    }
}
