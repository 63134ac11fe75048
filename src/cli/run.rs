use colored::Colorize;
use futures::future;
use futures::stream::LocalBoxStream;
use futures::StreamExt;
use log::debug;
use serde::de::DeserializeOwned;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_util::io::ReaderStream;

use super::args::{Args, InputFormat};
use crate::{
    core::{accumulate_stream, decode_event, normalize_stream, Config, Provider, StreamError},
    eventsource::EventStreamExt,
    providers::{
        Chunk, ChunkProcessor, ClaudeChunkProcessor, GoogleChunkProcessor, MlxChunkProcessor,
        OpenAIChunkProcessor, ResponsesChunkProcessor,
    },
};

/// What the replay writes for each stream
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    /// Accumulated message as JSON instead of the chunk trace
    pub message: bool,
    /// Keep `RawEvent` chunks in the trace
    pub raw: bool,
}

/// Loads a `.env` file from the working directory or its ancestors, if any
fn load_env_file() -> Option<PathBuf> {
    match dotenv::dotenv() {
        Ok(path) => {
            debug!("[SETTINGS] loaded {}", path.display());
            Some(path)
        }
        Err(e) => {
            debug!("[SETTINGS] no .env loaded: {e}");
            None
        }
    }
}

pub async fn run(args: Args) -> Result<(), StreamError> {
    load_env_file();

    let mut config = Config::load()?;
    if let Some(provider) = args.provider {
        config.update_provider(provider);
    }
    if let Some(reasoning) = args.reasoning {
        config.processor.reasoning = reasoning;
    }
    if let Some(name) = args.format_tool {
        // An empty name turns the format tool off.
        config.processor.format_tool = (!name.is_empty()).then_some(name);
    }

    debug!(
        "[SETTINGS] provider: {}, reasoning: {:?}, format_tool: {:?}",
        config.provider, config.processor.reasoning, config.processor.format_tool
    );

    let mut stdout = io::stdout();
    if args.print_config {
        write!(&mut stdout, "{}", config.to_toml()?)?;
        return Ok(());
    }

    let input = args
        .input
        .ok_or_else(|| StreamError::ConfigError("No input transcript given".to_string()))?;
    let format = args
        .format
        .unwrap_or(InputFormat::for_provider(config.provider));
    let output = Output {
        message: args.message,
        raw: args.raw,
    };

    replay_provider(&config, &input, format, output, &mut stdout).await?;
    stdout.flush()?;
    Ok(())
}

/// Replays a transcript with the processor of the configured provider
pub async fn replay_provider<W: Write>(
    config: &Config,
    input: &Path,
    format: InputFormat,
    output: Output,
    writer: &mut W,
) -> Result<(), StreamError> {
    let options = config.processor.clone();
    match config.provider {
        Provider::Claude => {
            replay(ClaudeChunkProcessor::new(options), input, format, output, writer).await
        }
        Provider::OpenAI => {
            replay(OpenAIChunkProcessor::new(options), input, format, output, writer).await
        }
        Provider::OpenAIResponses => {
            replay(ResponsesChunkProcessor::new(options), input, format, output, writer).await
        }
        Provider::Google => {
            replay(GoogleChunkProcessor::new(options), input, format, output, writer).await
        }
        Provider::Mlx => {
            replay(MlxChunkProcessor::new(options), input, format, output, writer).await
        }
    }
}

async fn replay<P, W>(
    processor: P,
    input: &Path,
    format: InputFormat,
    output: Output,
    writer: &mut W,
) -> Result<(), StreamError>
where
    P: ChunkProcessor,
    P::Event: 'static,
    W: Write,
{
    debug!(
        "[{}] replaying {} as {format:?}",
        processor.provider(),
        input.display()
    );
    let events = native_events::<P::Event>(input, format).await?;
    let mut chunks = Box::pin(normalize_stream(processor, events));

    if output.message {
        let accumulated = accumulate_stream(chunks).await?;
        writeln!(writer, "{}", serde_json::to_string_pretty(&accumulated)?)?;
        return Ok(());
    }

    while let Some(chunk) = chunks.next().await {
        if let Some(line) = render_chunk(&chunk?, output.raw) {
            writeln!(writer, "{line}")?;
        }
    }
    Ok(())
}

/// Reads and decodes the native events of a captured transcript
async fn native_events<E>(
    path: &Path,
    format: InputFormat,
) -> Result<LocalBoxStream<'static, Result<E, StreamError>>, StreamError>
where
    E: DeserializeOwned + 'static,
{
    let file = File::open(path).await?;
    let events = match format {
        InputFormat::Sse => ReaderStream::new(file)
            .events()
            .filter_map(|event| {
                future::ready(match event {
                    Ok(event) => decode_event(&event),
                    Err(err) => Some(Err(err)),
                })
            })
            .boxed_local(),
        InputFormat::Jsonl => LinesStream::new(BufReader::new(file).lines())
            .filter_map(|line| {
                future::ready(match line {
                    Ok(line) if line.trim().is_empty() => None,
                    Ok(line) => Some(serde_json::from_str(&line).map_err(StreamError::from)),
                    Err(err) => Some(Err(err.into())),
                })
            })
            .boxed_local(),
    };
    Ok(events)
}

/// Formats one chunk as a trace line. Raw events are shown only on request.
pub fn render_chunk(chunk: &Chunk, raw: bool) -> Option<String> {
    let line = match chunk {
        Chunk::RawEvent { event } => {
            if !raw {
                return None;
            }
            format!("{} {event}", "raw_event".dimmed())
        }
        Chunk::TextStart => "text_start".green().to_string(),
        Chunk::TextDelta { delta } => format!("{} {delta:?}", "text_delta".green()),
        Chunk::TextEnd => "text_end".green().to_string(),
        Chunk::ReasoningStart => "reasoning_start".magenta().to_string(),
        Chunk::ReasoningDelta { delta } => format!("{} {delta:?}", "reasoning_delta".magenta()),
        Chunk::ReasoningEnd => "reasoning_end".magenta().to_string(),
        Chunk::ToolCallStart { id, name, .. } => {
            format!("{} {id} {}", "tool_call_start".cyan(), name.bold())
        }
        Chunk::ToolCallDelta { id, delta, .. } => {
            format!("{} {id} {delta:?}", "tool_call_delta".cyan())
        }
        Chunk::ToolCallEnd { id, .. } => format!("{} {id}", "tool_call_end".cyan()),
        Chunk::RawMessage { message } => format!("{} {message}", "raw_message".dimmed()),
        Chunk::UsageDelta { usage } => format!(
            "{} in={} out={} cache_read={} cache_write={} reasoning={}",
            "usage".blue(),
            usage.input_tokens,
            usage.output_tokens,
            usage.cache_read_tokens,
            usage.cache_write_tokens,
            usage.reasoning_tokens
        ),
        Chunk::FinishReason { reason } => {
            format!("{} {}", "finish".yellow().bold(), reason.as_str().bold())
        }
    };
    Some(line)
}
