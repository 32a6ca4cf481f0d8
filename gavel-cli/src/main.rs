//! Operator tooling: corpus ingestion and account administration.
//!
//! Ingestion is the offline half of the service: it embeds case
//! records once, up front, so the query path only ever reads.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Deserialize;

use gavel_core::caselaw::sqlite::SqliteCaseStore;
use gavel_core::caselaw::{CaseRecord, CaseStore, CaseStoreError};
use gavel_core::config::Config;
use gavel_core::embedding::Embedder;
use gavel_core::embedding::local::LocalEmbedder;
use gavel_core::users::UserStore;

/// A case as it appears in an ingest file, before embedding.
#[derive(Deserialize, Debug)]
struct IngestCase {
    case_id: String,
    legal_principles: String,
    verdict: String,
    source_file: String,
}

#[derive(Parser)]
#[command(name = "gavel-cli")]
struct Cli {
    /// Path to the config file
    #[arg(long, default_value = "gavel.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Embed case records from a JSON file and load them into the corpus
    Ingest {
        /// JSON file: an array of {case_id, legal_principles, verdict, source_file}
        file: PathBuf,
    },
    /// Print corpus statistics
    Stats,
    /// Grant admin rights to an existing account
    GrantAdmin {
        /// Account email
        email: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Ingest { file } => ingest(&cli.config, &file),
        Command::Stats => stats(&cli.config),
        Command::GrantAdmin { email } => grant_admin(&cli.config, &email),
    };

    match result {
        Ok(output) => print!("{output}"),
        Err(msg) => {
            eprint!("{msg}");
            process::exit(1);
        }
    }
}

fn load_config(config_path: &Path) -> Result<Config, String> {
    if !config_path.exists() {
        return Err(format!(
            "Config file not found: {}. Use --config to specify the path.\n",
            config_path.display()
        ));
    }
    Config::from_file(config_path).map_err(|e| format!("Config error: {e}\n"))
}

fn read_ingest_file(file: &Path) -> Result<Vec<IngestCase>, String> {
    let contents = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read '{}': {e}\n", file.display()))?;
    serde_json::from_str(&contents)
        .map_err(|e| format!("Invalid ingest file '{}': {e}\n", file.display()))
}

fn ingest(config_path: &Path, file: &Path) -> Result<String, String> {
    let config = load_config(config_path)?;
    let records = read_ingest_file(file)?;
    if records.is_empty() {
        return Ok("No cases to ingest.\n".to_string());
    }

    let embedder = LocalEmbedder::new().map_err(|e| format!("Embedder error: {e}\n"))?;
    let store = SqliteCaseStore::open(
        Path::new(&config.storage.cases),
        embedder.model_name(),
        embedder.dimensions(),
    )
    .map_err(|e| format!("Corpus error: {e}\n"))?;

    let texts: Vec<&str> = records.iter().map(|r| r.legal_principles.as_str()).collect();
    let embeddings = embedder
        .embed(&texts)
        .map_err(|e| format!("Embedder error: {e}\n"))?;

    let mut inserted = 0usize;
    let mut skipped = 0usize;
    for (record, embedding) in records.into_iter().zip(embeddings) {
        let result = store.insert(&CaseRecord {
            case_id: record.case_id,
            legal_principles: record.legal_principles,
            verdict: record.verdict,
            embedding,
            source_file: record.source_file,
        });
        match result {
            Ok(()) => inserted += 1,
            Err(CaseStoreError::DuplicateCase(id)) => {
                eprintln!("skipping duplicate case '{id}'");
                skipped += 1;
            }
            Err(e) => return Err(format!("Ingest error: {e}\n")),
        }
    }

    Ok(format!("Ingested {inserted} cases ({skipped} skipped).\n"))
}

fn stats(config_path: &Path) -> Result<String, String> {
    let config = load_config(config_path)?;
    let info = SqliteCaseStore::describe(Path::new(&config.storage.cases))
        .map_err(|e| format!("Corpus error: {e}\n"))?;

    if info.case_count == 0 {
        return Ok(format!("Corpus '{}' is empty.\n", config.storage.cases));
    }
    Ok(format!(
        "Corpus '{}': {} cases, model {} ({}d).\n",
        config.storage.cases, info.case_count, info.model_name, info.dimensions
    ))
}

fn grant_admin(config_path: &Path, email: &str) -> Result<String, String> {
    let config = load_config(config_path)?;
    let users = UserStore::open(Path::new(&config.storage.accounts))
        .map_err(|e| format!("Accounts error: {e}\n"))?;

    users
        .set_admin(email, true)
        .map_err(|e| format!("Error: {e}\n"))?;

    Ok(format!("Granted admin rights to {email}.\n"))
}
