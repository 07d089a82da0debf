//! # GNO
//!
//! A local, single-user knowledge index and retrieval engine. Files in one
//! or more collections are converted to canonical markdown, chunked,
//! indexed for BM25 and (optionally) vector search, and retrievable by a
//! CLI or an MCP stdio server.
//!
//! ## Modules
//!
//! - [`gno::config`] — YAML configuration parsing, validation, atomic rewrite
//! - [`gno::store`] — embedded SQLite store: documents, chunks, FTS5, embeddings
//! - [`gno::converters`] — file-to-canonical-markdown conversion
//! - [`gno::ingest`] — walk, convert, chunk, upsert, orphan cleanup
//! - [`gno::llm`] — embedding/rerank/generation ports and the model registry
//! - [`gno::retrieval`] — BM25, vector, hybrid, grounded-answer, document retrieval
//! - [`gno::server`] — MCP stdio server

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use gno::config::{self, Collection};
use gno::converters::ConverterRegistry;
use gno::error::GnoError;
use gno::retrieval::{ask, get, hybrid, lexical, vector, RetrievalInput, DEFAULT_LIMIT_STRUCTURED};
use gno::{collections, contexts, ingest, stats, tags, Engine};

#[derive(Parser)]
#[command(name = "gno", about = "GNO — local knowledge index and retrieval", version)]
struct Cli {
    /// Path to the config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a default config file if one does not exist
    Init,
    /// Sync one or all collections
    Sync {
        /// Collection name; syncs every collection when omitted
        collection: Option<String>,
        /// Run each collection's configured updateCmd before walking it
        #[arg(long)]
        run_update_cmd: bool,
    },
    /// BM25-only search
    Search {
        query: String,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        min_score: Option<f64>,
        #[arg(long)]
        collection: Option<String>,
        /// Return each hit's full canonical markdown instead of a chunk snippet
        #[arg(long)]
        full: bool,
    },
    /// Vector-only search
    Vsearch {
        query: String,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        min_score: Option<f64>,
        #[arg(long)]
        collection: Option<String>,
        /// Return each hit's full canonical markdown instead of a chunk snippet
        #[arg(long)]
        full: bool,
    },
    /// Hybrid (BM25 + vector, RRF-fused) search
    Query {
        query: String,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        min_score: Option<f64>,
        #[arg(long)]
        collection: Option<String>,
        /// Return each hit's full canonical markdown instead of a chunk snippet
        #[arg(long)]
        full: bool,
    },
    /// Hybrid retrieval plus a grounded, citation-bound answer
    Ask {
        query: String,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        collection: Option<String>,
        /// Return each cited hit's full canonical markdown instead of a chunk snippet
        #[arg(long)]
        full: bool,
    },
    /// Fetch a document's canonical markdown by ref
    Get {
        #[arg(name = "ref")]
        reference: String,
        #[arg(long)]
        from: Option<i64>,
        #[arg(long)]
        limit: Option<i64>,
        /// Prefix each returned line with its 1-based line number
        #[arg(long)]
        line_numbers: bool,
    },
    /// Fetch several documents, or a URI glob, at once
    MultiGet {
        refs: Vec<String>,
        #[arg(long)]
        max_bytes: Option<usize>,
    },
    /// List documents in a collection or URI prefix
    Ls {
        scope: Option<String>,
        #[arg(long, default_value_t = 100)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Tag management
    Tags {
        #[command(subcommand)]
        action: TagsAction,
    },
    /// Collection management
    Collection {
        #[command(subcommand)]
        action: CollectionAction,
    },
    /// Context management
    Context {
        #[command(subcommand)]
        action: ContextAction,
    },
    /// Store-wide statistics
    Stats,
    /// Report model/preset availability
    Doctor,
    /// Run a server
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },
}

#[derive(Subcommand)]
enum TagsAction {
    Add { #[arg(name = "ref")] reference: String, tag: String },
    Rm { #[arg(name = "ref")] reference: String, tag: String },
    Ls { #[arg(name = "ref")] reference: String },
    Counts { #[arg(long)] collection: Option<String> },
}

#[derive(Subcommand)]
enum CollectionAction {
    Add {
        name: String,
        root: PathBuf,
        #[arg(long)]
        update_cmd: Option<String>,
        #[arg(long)]
        language_hint: Option<String>,
    },
    Remove { name: String },
    Rename { old: String, new: String },
    Ls,
}

#[derive(Subcommand)]
enum ContextAction {
    Set { scope: String, text: String },
    Remove { scope: String },
    Ls,
}

#[derive(Subcommand)]
enum ServeService {
    /// Start the MCP stdio server
    Mcp,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(p) => p,
        None => config::default_config_path()?,
    };

    if let Commands::Init = cli.command {
        return run_init(&config_path);
    }

    let mut engine = Engine::open(config_path).await?;

    if let Commands::Serve { service: ServeService::Mcp } = cli.command {
        gno::server::serve_stdio(Arc::new(engine)).await?;
        return Ok(());
    }

    let result = run_command(&mut engine, cli.command).await;
    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&e.to_envelope())?);
            std::process::exit(e.kind().exit_code());
        }
    }
}

fn run_init(config_path: &PathBuf) -> anyhow::Result<()> {
    if config_path.exists() {
        println!("config already exists at {}", config_path.display());
        return Ok(());
    }
    let default = gno::config::Config {
        version: "1".into(),
        fts_tokenizer: "unicode61".into(),
        collections: vec![],
        contexts: vec![],
        models: Default::default(),
    };
    gno::config::save_config(config_path, &default)?;
    println!("wrote default config to {}", config_path.display());
    Ok(())
}

async fn run_command(engine: &mut Engine, command: Commands) -> Result<(), GnoError> {
    match command {
        Commands::Init => unreachable!("handled before engine open"),
        Commands::Sync { collection, run_update_cmd } => {
            let registry = ConverterRegistry::new();
            match collection {
                Some(name) => {
                    let target = engine
                        .config
                        .collections
                        .iter()
                        .find(|c| c.name == name)
                        .cloned()
                        .ok_or_else(|| GnoError::not_found(format!("no such collection: '{name}'")))?;
                    let stats = ingest::sync_collection(&engine.store, &target, &registry, run_update_cmd).await?;
                    print_json(&stats)?;
                }
                None => {
                    let result = ingest::sync_all(&engine.store, &engine.config.collections, &registry, run_update_cmd).await?;
                    print_json(&result)?;
                }
            }
        }
        Commands::Search { query, limit, min_score, collection, full } => {
            let input = build_input(query, limit, min_score, collection, full);
            let results = lexical::search(&engine.store, &input).await?;
            print_json(&results)?;
        }
        Commands::Vsearch { query, limit, min_score, collection, full } => {
            let input = build_input(query, limit, min_score, collection, full);
            let port = engine.models.embedding_port().await?;
            let results = vector::vsearch(&engine.store, port.as_ref(), &input).await?;
            print_json(&results)?;
        }
        Commands::Query { query, limit, min_score, collection, full } => {
            let input = build_input(query, limit, min_score, collection, full);
            let port = engine.models.embedding_port().await?;
            let results = hybrid::query(&engine.store, port.as_ref(), None, None, &input).await?;
            print_json(&results)?;
        }
        Commands::Ask { query, limit, collection, full } => {
            let input = build_input(query, limit, None, collection, full);
            let port = engine.models.embedding_port().await?;
            let response = ask::ask(&engine.store, port.as_ref(), None, None, &input).await?;
            print_json(&response)?;
        }
        Commands::Get { reference, from, limit, line_numbers } => {
            let response = get::get(&engine.store, &reference, from, limit, line_numbers).await?;
            print_json(&response)?;
        }
        Commands::MultiGet { refs, max_bytes } => {
            let response = get::multi_get(&engine.store, &refs, max_bytes).await?;
            print_json(&response)?;
        }
        Commands::Ls { scope, limit, offset } => {
            let entries = get::ls(&engine.store, scope.as_deref(), limit, offset).await?;
            print_json(&entries)?;
        }
        Commands::Tags { action } => match action {
            TagsAction::Add { reference, tag } => {
                tags::add(&engine.store, &reference, &tag).await?;
            }
            TagsAction::Rm { reference, tag } => {
                let removed = tags::remove(&engine.store, &reference, &tag).await?;
                println!("{}", serde_json::json!({ "removed": removed }));
            }
            TagsAction::Ls { reference } => {
                let found = tags::list_for_document(&engine.store, &reference).await?;
                print_json(&found.iter().map(|t| &t.tag).collect::<Vec<_>>())?;
            }
            TagsAction::Counts { collection } => {
                let counts = tags::list_counts(&engine.store, collection.as_deref()).await?;
                print_json(&counts)?;
            }
        },
        Commands::Collection { action } => {
            run_collection_action(engine, action)?;
        }
        Commands::Context { action } => {
            run_context_action(engine, action)?;
        }
        Commands::Stats => {
            let report = stats::collect(&engine.store, &engine.db_path).await?;
            print_json(&report)?;
        }
        Commands::Doctor => {
            let report = engine.models.doctor();
            print_json(&report)?;
        }
        Commands::Serve { .. } => unreachable!("handled before run_command: Serve consumes the engine"),
    }
    Ok(())
}

fn build_input(
    query: String,
    limit: Option<usize>,
    min_score: Option<f64>,
    collection: Option<String>,
    full: bool,
) -> RetrievalInput {
    RetrievalInput {
        query_text: query,
        limit: limit.unwrap_or(DEFAULT_LIMIT_STRUCTURED),
        min_score,
        collection_filter: collection,
        language_hint: None,
        full,
        line_numbers: false,
    }
}

fn run_collection_action(engine: &mut Engine, action: CollectionAction) -> Result<(), GnoError> {
    match action {
        CollectionAction::Add { name, root, update_cmd, language_hint } => {
            collections::add(
                &mut engine.config,
                Collection {
                    name,
                    root,
                    pattern: "**/*".into(),
                    include_extensions: None,
                    exclude_patterns: vec![],
                    update_cmd,
                    language_hint,
                },
            )?;
            engine.save_config()?;
        }
        CollectionAction::Remove { name } => {
            collections::remove(&mut engine.config, &name)?;
            engine.save_config()?;
        }
        CollectionAction::Rename { old, new } => {
            collections::rename(&mut engine.config, &old, &new)?;
            engine.save_config()?;
        }
        CollectionAction::Ls => {
            print_json(collections::list(&engine.config))?;
        }
    }
    Ok(())
}

fn run_context_action(engine: &mut Engine, action: ContextAction) -> Result<(), GnoError> {
    match action {
        ContextAction::Set { scope, text } => {
            contexts::set(&mut engine.config, &scope, &text)?;
            engine.save_config()?;
        }
        ContextAction::Remove { scope } => {
            contexts::remove(&mut engine.config, &scope)?;
            engine.save_config()?;
        }
        ContextAction::Ls => {
            print_json(contexts::list(&engine.config))?;
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), GnoError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| GnoError::Internal(format!("failed to serialize output: {e}")))?;
    println!("{text}");
    Ok(())
}
