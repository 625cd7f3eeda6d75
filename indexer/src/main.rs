use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rag_core::persist::{load_index, save_index, IndexPaths};
use rag_core::{DocumentIndex, DocumentRetriever, IdfWeighting, IndexConfig, Retriever};
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One collection record. Records missing `id` or `text` are skipped.
#[derive(Debug, Deserialize)]
struct InputDoc {
    id: Option<RawId>,
    #[serde(alias = "body", alias = "content")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Idf {
    Smooth,
    Plain,
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query the TF-IDF document index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from input JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// Vocabulary size cap
        #[arg(long, default_value_t = 5000)]
        max_features: usize,
        /// IDF scaling
        #[arg(long, value_enum, default_value_t = Idf::Smooth)]
        idf: Idf,
        /// Weight terms by 1 + ln(count) instead of the raw count
        #[arg(long, default_value_t = false)]
        sublinear_tf: bool,
        /// Disable English stemming
        #[arg(long, default_value_t = false)]
        no_stem: bool,
    },
    /// Print the top-k documents for a query against a built index
    Search {
        /// Index directory
        #[arg(long, default_value = "./index")]
        index: String,
        /// Query text
        #[arg(long)]
        q: String,
        /// Number of documents
        #[arg(long, default_value_t = 10)]
        k: usize,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, max_features, idf, sublinear_tf, no_stem } => {
            let config = IndexConfig {
                max_features: Some(max_features),
                idf: match idf {
                    Idf::Smooth => IdfWeighting::Smooth,
                    Idf::Plain => IdfWeighting::Plain,
                },
                sublinear_tf,
                stem: !no_stem,
            };
            build_index(Path::new(&input), &output, config)
        }
        Commands::Search { index, q, k } => search(&index, &q, k),
    }
}

fn build_index(input: &Path, output: &str, config: IndexConfig) -> Result<()> {
    let (ids, contents) = load_collection(input)?;
    let index = DocumentIndex::build(ids, contents, config)?;
    let meta = save_index(&IndexPaths::new(output), &index)?;
    tracing::info!(output, num_docs = meta.num_docs, num_terms = meta.num_terms, "index build complete");
    Ok(())
}

fn search(index_dir: &str, query: &str, k: usize) -> Result<()> {
    if k == 0 {
        bail!("--k must be at least 1");
    }
    let (index, _meta) = load_index(&IndexPaths::new(index_dir))?;
    let retriever = Retriever::new(Arc::new(index));
    for (i, doc) in retriever.retrieve(query, k).iter().enumerate() {
        let preview: String = doc.content.chars().take(150).collect();
        println!("{:>3}. [ID: {}, score: {:.4}]", i + 1, doc.id, doc.score);
        println!("     {preview}");
    }
    Ok(())
}

/// Collect `(ids, contents)` in file order; directories are walked for .json/.jsonl files in sorted order.
fn load_collection(input: &Path) -> Result<(Vec<String>, Vec<String>)> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        bail!("input {} does not exist", input.display());
    }

    let mut docs = Vec::new();
    for file in &files {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(file, &mut docs)?;
        } else {
            read_json(file, &mut docs)?;
        }
    }

    let total = docs.len();
    let (ids, contents): (Vec<String>, Vec<String>) = docs
        .into_iter()
        .filter_map(|d| Some((d.id?.into_string(), d.text?)))
        .unzip();
    let skipped = total - ids.len();
    if skipped > 0 {
        tracing::warn!(skipped, "records without id or text were skipped");
    }
    tracing::info!(files = files.len(), documents = ids.len(), "loaded collection");
    Ok((ids, contents))
}

fn read_jsonl(file: &Path, docs: &mut Vec<InputDoc>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        docs.push(serde_json::from_str(&line)?);
    }
    Ok(())
}

fn read_json(file: &Path, docs: &mut Vec<InputDoc>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                docs.push(serde_json::from_value(v)?);
            }
        }
        serde_json::Value::Object(_) => docs.push(serde_json::from_value(json)?),
        _ => {}
    }
    Ok(())
}
