use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use engine::{persist, CorpusIndex, MessageRecord};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query corpus snapshots from message logs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a corpus snapshot from JSON/JSONL message logs
    Build {
        /// Input path (file or directory of .json/.jsonl files)
        #[arg(long)]
        input: String,
        /// Directory to write the snapshot into
        #[arg(long)]
        output: String,
        /// Corpus (tenant) identifier
        #[arg(long)]
        corpus: String,
    },
    /// Suggest a thread title for the given messages against a snapshot
    Suggest {
        /// Input path with the thread's messages
        #[arg(long)]
        input: String,
        /// Directory holding the corpus snapshot
        #[arg(long)]
        snapshot: String,
        /// Corpus (tenant) identifier
        #[arg(long)]
        corpus: String,
        /// Upper bound on suggested title words
        #[arg(long, default_value_t = 6)]
        max_words: usize,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            output,
            corpus,
        } => build_snapshot(&input, &output, &corpus),
        Commands::Suggest {
            input,
            snapshot,
            corpus,
            max_words,
        } => suggest_title(&input, &snapshot, &corpus, max_words),
    }
}

fn build_snapshot(input: &str, output: &str, corpus: &str) -> Result<()> {
    let messages = read_messages(Path::new(input))?;
    let index = CorpusIndex::new(corpus);
    let mut indexed = 0usize;
    for message in &messages {
        if index.process_message(message) {
            indexed += 1;
        }
    }
    tracing::info!(
        corpus,
        read = messages.len(),
        indexed,
        distinct_words = index.distinct_words(),
        "ingested messages"
    );
    persist::save(Path::new(output), &index)?;
    tracing::info!(output, "snapshot written");
    Ok(())
}

fn suggest_title(input: &str, snapshot: &str, corpus: &str, max_words: usize) -> Result<()> {
    let Some(index) = persist::load(Path::new(snapshot), corpus)? else {
        bail!("no usable snapshot for corpus {corpus} in {snapshot}, run build first");
    };
    let messages = read_messages(Path::new(input))?;
    let tfidf = index.score(&messages);
    let words = tfidf.auto_top_words(max_words);
    if words.is_empty() {
        bail!("no scorable words in the given messages");
    }
    println!("{}", words.join("-"));
    Ok(())
}

/// Collects message records from a .json/.jsonl file, or from every such
/// file in a directory tree.
fn read_messages(input: &Path) -> Result<Vec<MessageRecord>> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
                if matches!(ext, "json" | "jsonl") {
                    files.push(path.to_path_buf());
                }
            }
        }
        files.sort();
    } else {
        files.push(input.to_path_buf());
    }

    let mut messages = Vec::new();
    for file in files {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file, &mut messages)?;
        } else {
            read_json(&file, &mut messages)?;
        }
    }
    Ok(messages)
}

fn read_jsonl(file: &Path, messages: &mut Vec<MessageRecord>) -> Result<()> {
    let f = File::open(file).with_context(|| format!("couldn't open {}", file.display()))?;
    for line in BufReader::new(f).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let message: MessageRecord = serde_json::from_str(&line)
            .with_context(|| format!("bad message record in {}", file.display()))?;
        messages.push(message);
    }
    Ok(())
}

fn read_json(file: &Path, messages: &mut Vec<MessageRecord>) -> Result<()> {
    let f = File::open(file).with_context(|| format!("couldn't open {}", file.display()))?;
    let json: serde_json::Value = serde_json::from_reader(BufReader::new(f))?;
    match json {
        serde_json::Value::Array(array) => {
            for value in array {
                messages.push(serde_json::from_value(value)?);
            }
        }
        serde_json::Value::Object(_) => {
            messages.push(serde_json::from_value(json)?);
        }
        other => bail!(
            "expected an object or array of message records in {}, got {}",
            file.display(),
            other
        ),
    }
    Ok(())
}
