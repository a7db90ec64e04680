use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

/// Permanently redact regions of PDF documents and images.
#[derive(Debug, Parser)]
#[command(name = "blackout", about, version)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show document kind, encryption, and page sizes
    Info {
        /// Path to the PDF or image file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Password for encrypted PDFs
        #[arg(long)]
        password: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Burn rectangles into a copy of the document
    Redact {
        /// Path to the PDF or image file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Region as PAGE:X,Y,W,H in top-left document units (points or pixels)
        #[arg(long = "rect", value_name = "PAGE:X,Y,W,H")]
        rects: Vec<String>,

        /// JSON redaction plan
        #[arg(long, value_name = "PLAN.json")]
        plan: Option<PathBuf>,

        /// Password for encrypted PDFs
        #[arg(long)]
        password: Option<String>,

        /// Keep the source encryption on the output
        #[arg(long)]
        keep_encryption: bool,

        /// Output path. Default: <name>_redacted.<ext> next to the input
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Overwrite the output if it exists
        #[arg(long)]
        force: bool,
    },
}

/// Output format for `info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
