use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use glob::Pattern;
use tools::{decode_message_json, format_decode_pretty, inspect_message, parse_hex, InspectReport};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "tsync-tools",
    version,
    about = "tsync message inspection and decoding tools"
)]
struct Cli {
    /// Treat message files as hex text instead of raw bytes.
    #[arg(long, global = true)]
    hex: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect message framing and sizes.
    Inspect {
        /// Path to a message file, or a directory of them.
        message_path: PathBuf,
        /// Optional sync config JSON to explain the body layout.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Optional glob filter when inspecting a directory.
        #[arg(long)]
        glob: Option<String>,
        /// Sort inspected messages.
        #[arg(long, value_enum)]
        sort: Option<InspectSort>,
        /// Limit the number of inspected messages (after sorting).
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Decode a message into structured output.
    Decode {
        /// Path to the message file.
        message_file: PathBuf,
        /// Sync config JSON the sender used.
        #[arg(long)]
        config: PathBuf,
        /// Output format.
        #[arg(long, value_enum, default_value_t = DecodeFormat::Json)]
        format: DecodeFormat,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum InspectSort {
    Size,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DecodeFormat {
    Json,
    Pretty,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let limits = wire::Limits::default();
    match cli.command {
        Command::Inspect {
            message_path,
            config,
            glob,
            sort,
            limit,
        } => {
            let config = config
                .as_deref()
                .map(load_config)
                .transpose()
                .context("load config")?;
            if message_path.is_dir() {
                let entries = collect_message_entries(&message_path, glob.as_deref())?;
                let mut entries = maybe_sort_entries(entries, sort);
                let limit = limit.or(sort.map(|InspectSort::Size| 10));
                if let Some(limit) = limit {
                    entries.truncate(limit);
                }
                for entry in entries {
                    let bytes = read_message(&entry.path, cli.hex)?;
                    let report = inspect_message(&bytes, config.as_ref(), &limits)
                        .with_context(|| format!("inspect {}", entry.path.display()))?;
                    println!("== {} ({} bytes) ==", entry.path.display(), entry.size);
                    print_inspect_report(&report);
                }
            } else {
                let bytes = read_message(&message_path, cli.hex)?;
                let report = inspect_message(&bytes, config.as_ref(), &limits)
                    .with_context(|| format!("inspect {}", message_path.display()))?;
                print_inspect_report(&report);
            }
        }
        Command::Decode {
            message_file,
            config,
            format,
        } => {
            let bytes = read_message(&message_file, cli.hex)?;
            let config = load_config(&config).context("load config")?;
            let output = decode_message_json(&bytes, &config, &limits)
                .with_context(|| format!("decode {}", message_file.display()))?;
            match format {
                DecodeFormat::Json => {
                    let json = serde_json::to_string_pretty(&output).context("serialize json")?;
                    println!("{json}");
                }
                DecodeFormat::Pretty => {
                    print!("{}", format_decode_pretty(&output));
                }
            }
        }
    }
    Ok(())
}

fn read_message(path: &Path, hex: bool) -> Result<Vec<u8>> {
    if hex {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read hex message {}", path.display()))?;
        parse_hex(&text).with_context(|| format!("parse hex in {}", path.display()))
    } else {
        fs::read(path).with_context(|| format!("read message {}", path.display()))
    }
}

fn load_config(path: &Path) -> Result<schema::SyncConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let config: schema::SyncConfig =
        serde_json::from_str(&contents).context("parse config json")?;
    config.validate().context("config validation failed")?;
    debug!(
        path = %path.display(),
        hash = schema::layout_hash(&config),
        "loaded sync config"
    );
    Ok(config)
}

struct MessageEntry {
    path: PathBuf,
    size: u64,
}

fn collect_message_entries(dir: &Path, glob: Option<&str>) -> Result<Vec<MessageEntry>> {
    let mut entries = Vec::new();
    let pattern = match glob {
        Some(value) => Some(Pattern::new(value).context("invalid glob pattern")?),
        None => None,
    };

    for entry in fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(pattern) = &pattern {
            let matches_path = pattern.matches_path(&path);
            let matches_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| pattern.matches(name));
            if !matches_path && !matches_name {
                continue;
            }
        }
        let size = entry.metadata()?.len();
        entries.push(MessageEntry { path, size });
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

fn maybe_sort_entries(
    mut entries: Vec<MessageEntry>,
    sort: Option<InspectSort>,
) -> Vec<MessageEntry> {
    match sort {
        Some(InspectSort::Size) => {
            entries.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.path.cmp(&b.path)));
        }
        None => {}
    }
    entries
}

fn print_inspect_report(report: &InspectReport) {
    let header = &report.header;
    println!(
        "entity: {} sub_index: {} timestamp: {} ms",
        header.entity_id, header.sub_index, header.timestamp_ms
    );
    let quantities = if header.quantities.is_empty() {
        "none".to_string()
    } else {
        header.quantities.join(", ")
    };
    println!("mask: 0b{:05b} ({quantities})", header.mask);
    println!(
        "header: {} bytes body: {} bytes total: {} bytes",
        header.header_len, report.body_len, report.total_len
    );
    if let Some(expected) = report.expected_body_len {
        let verdict = if expected == report.body_len {
            "ok"
        } else {
            "MISMATCH"
        };
        println!("expected body: {expected} bytes ({verdict})");
    }
    if let Some(hash) = &report.layout_hash {
        println!("layout hash: {hash}");
    }
    if !report.layout.is_empty() {
        println!("layout:");
        for entry in &report.layout {
            let precision = if entry.compressed { "f16" } else { "f32" };
            println!(
                "  {}: {} {precision} ({} bytes)",
                entry.name, entry.axes, entry.bytes
            );
        }
    }
}
