use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mdc2editor_core::config::Config;
use mdc2editor_core::{markdown, to_editor_model, to_markup, EditorNode, FrontmatterData, MarkupNode};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "mdc2editor",
    about = "Convert between MDC markup trees and rich-text editor documents"
)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output file. Omit to write to stdout.
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Markup tree JSON (or a Markdown file) to an editor document.
    ToEditor {
        /// Input file; `.md` files are parsed as Markdown. Omit to read JSON from stdin.
        input: Option<PathBuf>,

        /// JSON object merged into the frontmatter.
        #[arg(long)]
        data: Option<PathBuf>,

        /// Parse stdin as Markdown instead of JSON.
        #[arg(long)]
        markdown: bool,
    },
    /// Editor document JSON to `{ body, data }` markup JSON.
    ToMarkup {
        /// Input file. Omit to read from stdin.
        input: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let output = match cli.command {
        Command::ToEditor {
            input,
            data,
            markdown: force_markdown,
        } => {
            let source = read_input(input.as_deref())?;
            let origin = describe(input.as_deref());
            let parse_markdown = force_markdown || input.as_deref().is_some_and(is_markdown_path);

            let (body, mut frontmatter) = if parse_markdown {
                markdown::parse_markdown(&source)
                    .with_context(|| format!("Error parsing Markdown from {origin}"))?
            } else {
                let body: MarkupNode = serde_json::from_str(&source)
                    .with_context(|| format!("Error reading markup tree from {origin}"))?;
                (body, FrontmatterData::new())
            };

            if let Some(path) = data {
                let extra: FrontmatterData = serde_json::from_str(&read_file(&path)?)
                    .with_context(|| format!("Error parsing frontmatter {}", path.display()))?;
                frontmatter.extend(extra);
            }

            let doc = to_editor_model(&body, &frontmatter, &config);
            serde_json::to_string_pretty(&doc)?
        }
        Command::ToMarkup { input } => {
            let source = read_input(input.as_deref())?;
            let doc: EditorNode = serde_json::from_str(&source).with_context(|| {
                format!("Error reading editor document from {}", describe(input.as_deref()))
            })?;
            serde_json::to_string_pretty(&to_markup(&doc, &config))?
        }
    };

    write_output(&output, cli.output.as_deref())
}

/// Log to stderr so stdout stays clean JSON. `RUST_LOG` overrides the default `warn`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            let toml_str = read_file(path)?;
            Config::from_toml(&toml_str)
                .with_context(|| format!("Error parsing config {}", path.display()))
        }
        None => Ok(Config::default()),
    }
}

fn is_markdown_path(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("md")
}

fn describe(input: Option<&Path>) -> String {
    input.map_or_else(|| "<stdin>".to_string(), |p| p.display().to_string())
}

fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) => read_file(path),
        None => {
            let mut source = String::new();
            io::stdin()
                .read_to_string(&mut source)
                .context("Error reading stdin")?;
            Ok(source)
        }
    }
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Error reading {}", path.display()))
}

fn write_output(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).ok();
            }
            std::fs::write(path, format!("{content}\n"))
                .with_context(|| format!("Error writing {}", path.display()))
        }
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{content}").context("Error writing stdout")
        }
    }
}
