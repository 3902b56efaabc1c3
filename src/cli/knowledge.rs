//! Knowledge commands: collections, ingestion, documents, search, RAG, embed.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};

use recollect::chunking::{ChunkMethod, ChunkingStrategy};
use recollect::knowledge::types::{CreateCollection, IngestRequest, RagRequest, SearchRequest};

use super::{parse_metadata, print_json, App};

#[derive(Subcommand)]
pub enum CollectionAction {
    /// Create a collection
    Create {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Embedding model for this collection (defaults to the configured model)
        #[arg(long)]
        model: Option<String>,
    },
    /// List collections
    List,
    /// Show one collection
    Get { id: String },
    /// Delete a collection with its documents and chunks
    Delete { id: String },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum MethodArg {
    Fixed,
    Sentence,
    Paragraph,
}

impl From<MethodArg> for ChunkMethod {
    fn from(value: MethodArg) -> Self {
        match value {
            MethodArg::Fixed => ChunkMethod::Fixed,
            MethodArg::Sentence => ChunkMethod::Sentence,
            MethodArg::Paragraph => ChunkMethod::Paragraph,
        }
    }
}

#[derive(Args)]
pub struct IngestArgs {
    /// Target collection id
    pub collection: String,
    /// UTF-8 text file to ingest
    pub file: PathBuf,
    #[arg(long, value_enum)]
    pub method: Option<MethodArg>,
    #[arg(long)]
    pub chunk_size: Option<usize>,
    #[arg(long)]
    pub chunk_overlap: Option<usize>,
    /// Replace an existing document instead of creating a new one
    #[arg(long)]
    pub document_id: Option<String>,
    #[arg(long, default_value = "text/plain")]
    pub content_type: String,
    /// Extra metadata as key=value (repeatable)
    #[arg(long = "meta")]
    pub metadata: Vec<String>,
}

#[derive(Subcommand)]
pub enum DocumentAction {
    /// List documents, optionally within one collection
    List {
        #[arg(long)]
        collection: Option<String>,
    },
    /// Show one document
    Get { id: String },
    /// Show a document's chunks in order
    Chunks { id: String },
    /// Delete a document and its chunks
    Delete { id: String },
}

#[derive(Args)]
pub struct SearchArgs {
    pub query: String,
    /// Restrict to one collection; otherwise every collection is scanned
    #[arg(long)]
    pub collection: Option<String>,
    #[arg(long)]
    pub limit: Option<usize>,
    #[arg(long)]
    pub threshold: Option<f32>,
}

#[derive(Args)]
pub struct RagArgs {
    pub query: String,
    #[arg(long)]
    pub collection: Option<String>,
    #[arg(long)]
    pub limit: Option<usize>,
    #[arg(long)]
    pub max_tokens: Option<usize>,
    /// Omit the "[Source: ...]" header above each passage
    #[arg(long)]
    pub no_sources: bool,
}

#[derive(Args)]
pub struct EmbedArgs {
    #[arg(required = true)]
    pub texts: Vec<String>,
    #[arg(long)]
    pub model: Option<String>,
}

pub async fn collection(app: &App, action: CollectionAction) -> Result<()> {
    match action {
        CollectionAction::Create {
            name,
            description,
            model,
        } => {
            let collection = app
                .knowledge
                .create_collection(CreateCollection {
                    name,
                    description,
                    embedding_model: model,
                })
                .await?;
            print_json(&collection)
        }
        CollectionAction::List => print_json(&app.knowledge.list_collections()?),
        CollectionAction::Get { id } => print_json(&app.knowledge.get_collection(&id)?),
        CollectionAction::Delete { id } => {
            app.knowledge.delete_collection(&id).await?;
            println!("Deleted collection {id}");
            Ok(())
        }
    }
}

pub async fn ingest(app: &App, args: IngestArgs) -> Result<()> {
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let size = bytes.len() as u64;
    let text = String::from_utf8(bytes)
        .with_context(|| format!("{} is not valid UTF-8 text", args.file.display()))?;
    let filename = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.file.display().to_string());

    let defaults = app.knowledge.settings().default_chunking;
    let strategy = ChunkingStrategy {
        method: args.method.map(ChunkMethod::from).unwrap_or(defaults.method),
        chunk_size: args.chunk_size.unwrap_or(defaults.chunk_size),
        chunk_overlap: args.chunk_overlap.unwrap_or(defaults.chunk_overlap),
    };

    let mut request = IngestRequest::new(args.collection, filename, text).with_strategy(strategy);
    request.content_type = args.content_type;
    request.size_bytes = Some(size);
    request.metadata = parse_metadata(&args.metadata)?;
    if let Some(id) = args.document_id {
        request = request.with_document_id(id);
    }

    let report = app.knowledge.ingest(request).await?;
    print_json(&report)
}

pub async fn document(app: &App, action: DocumentAction) -> Result<()> {
    match action {
        DocumentAction::List { collection } => {
            print_json(&app.knowledge.list_documents(collection.as_deref())?)
        }
        DocumentAction::Get { id } => print_json(&app.knowledge.get_document(&id)?),
        DocumentAction::Chunks { id } => {
            for chunk in app.knowledge.list_chunks(&id)? {
                let state = if chunk.embedding.is_some() { "embedded" } else { "not embedded" };
                println!("--- #{} ({state}) ---", chunk.ordinal);
                println!("{}", chunk.content);
            }
            Ok(())
        }
        DocumentAction::Delete { id } => {
            app.knowledge.delete_document(&id).await?;
            println!("Deleted document {id}");
            Ok(())
        }
    }
}

pub async fn search(app: &App, args: SearchArgs) -> Result<()> {
    let retrieval = &app.config.retrieval;
    let mut request = SearchRequest::new(args.query)
        .limit(args.limit.unwrap_or(retrieval.default_limit))
        .threshold(args.threshold.unwrap_or(retrieval.default_score_threshold));
    if let Some(collection) = args.collection {
        request = request.in_collection(collection);
    }
    print_json(&app.knowledge.search(&request).await?)
}

pub async fn rag(app: &App, args: RagArgs) -> Result<()> {
    let retrieval = &app.config.retrieval;
    let request = RagRequest {
        query: args.query,
        collection_id: args.collection,
        limit: args.limit.unwrap_or(retrieval.default_limit),
        max_tokens: args.max_tokens.unwrap_or(retrieval.rag_max_tokens),
        include_sources: !args.no_sources,
    };
    let rag = app.knowledge.rag_context(&request).await?;
    eprintln!(
        "{} passage(s), ~{} tokens, {:?}",
        rag.results_used, rag.total_tokens, rag.mode
    );
    println!("{}", rag.context);
    Ok(())
}

pub async fn embed(app: &App, args: EmbedArgs) -> Result<()> {
    match app.knowledge.embed(&args.texts, args.model.as_deref()).await?.ok() {
        Some(output) => print_json(&output),
        None => anyhow::bail!("embedding service unavailable"),
    }
}
