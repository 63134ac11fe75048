use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::core::Provider;
use crate::providers::ReasoningMode;

/// How the captured transcript is framed
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    /// Server-sent events, one JSON payload per `data:` field
    Sse,
    /// One JSON event per line
    Jsonl,
}

impl InputFormat {
    /// Framing each provider uses on the wire
    pub const fn for_provider(provider: Provider) -> Self {
        match provider {
            Provider::Mlx => Self::Jsonl,
            _ => Self::Sse,
        }
    }
}

/// Replays a captured provider stream through its chunk processor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Captured response body to replay
    #[arg(required_unless_present = "print_config")]
    pub input: Option<PathBuf>,

    /// Wire protocol of the capture
    #[arg(short, long, value_enum)]
    pub provider: Option<Provider>,

    /// Transcript framing (defaults to the provider's own)
    #[arg(short, long, value_enum)]
    pub format: Option<InputFormat>,

    /// Print the accumulated message as JSON instead of the chunk trace
    #[arg(short, long)]
    pub message: bool,

    /// Include raw native events in the chunk trace
    #[arg(long)]
    pub raw: bool,

    /// How reasoning content is reported
    #[arg(long, value_enum)]
    pub reasoning: Option<ReasoningMode>,

    /// Name of the internal structured-output tool
    #[arg(long)]
    pub format_tool: Option<String>,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub print_config: bool,

    /// Enable debug output
    #[arg(short, long, default_value = "false")]
    pub debug: bool,
}
