//! Memory and session commands.

use anyhow::Result;
use clap::{Args, Subcommand};

use recollect::memory::maintenance::ConsolidationRequest;
use recollect::memory::types::{
    MemoryContextRequest, MemoryKind, MemoryQuery, SessionQuery, StoreMemoryRequest,
};

use super::{parse_metadata, print_json, App};

#[derive(Subcommand)]
pub enum MemoryAction {
    /// Store a memory
    Store {
        /// session, episodic, or semantic
        #[arg(long, short = 't', default_value = "episodic")]
        kind: MemoryKind,
        content: String,
        #[arg(long, default_value_t = 0.5)]
        importance: f64,
        #[arg(long)]
        session: Option<String>,
        #[arg(long)]
        agent: Option<String>,
        /// Summarize long content before storing
        #[arg(long)]
        summarize: bool,
        #[arg(long = "meta")]
        metadata: Vec<String>,
    },
    /// Show one memory
    Get { id: String },
    /// Delete one memory
    Delete { id: String },
    /// Change a memory's importance
    Importance { id: String, value: f64 },
    /// Recall memories relevant to a query
    Search {
        query: String,
        /// Restrict to these kinds (repeatable)
        #[arg(long = "kind")]
        kinds: Vec<MemoryKind>,
        #[arg(long)]
        session: Option<String>,
        #[arg(long)]
        agent: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value_t = 0.0)]
        min_importance: f64,
        /// Only memories from the last N hours
        #[arg(long)]
        within_hours: Option<u32>,
    },
    /// Build a prompt-ready context block from relevant memories
    Context {
        query: String,
        #[arg(long)]
        session: Option<String>,
        #[arg(long)]
        agent: Option<String>,
        #[arg(long)]
        no_episodic: bool,
        #[arg(long)]
        no_semantic: bool,
        #[arg(long, default_value_t = 2048)]
        max_tokens: usize,
    },
}

#[derive(Subcommand)]
pub enum SessionAction {
    /// Start a session
    Create {
        #[arg(long)]
        agent: Option<String>,
        #[arg(long = "meta")]
        metadata: Vec<String>,
    },
    /// List sessions, most recently active first
    List {
        #[arg(long)]
        agent: Option<String>,
        #[arg(long)]
        active_within_hours: Option<u32>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show one session
    Get { id: String },
    /// Delete a session and its session memories
    Delete { id: String },
    /// Summarize a session's memories and store the summary on it
    Summarize { id: String },
}

#[derive(Args)]
pub struct ConsolidateArgs {
    /// Only consolidate this session
    #[arg(long)]
    pub session: Option<String>,
    #[arg(long)]
    pub max_age_hours: Option<u32>,
    #[arg(long)]
    pub threshold: Option<f64>,
}

pub async fn memory(app: &App, action: MemoryAction) -> Result<()> {
    match action {
        MemoryAction::Store {
            kind,
            content,
            importance,
            session,
            agent,
            summarize,
            metadata,
        } => {
            let mut request = StoreMemoryRequest::new(kind, content)
                .importance(importance)
                .auto_summarize(summarize);
            request.session_id = session;
            request.agent_id = agent;
            request.metadata = parse_metadata(&metadata)?;
            print_json(&app.memory.store(request).await?)
        }
        MemoryAction::Get { id } => print_json(&app.memory.get(&id)?),
        MemoryAction::Delete { id } => {
            app.memory.delete(&id)?;
            println!("Deleted memory {id}");
            Ok(())
        }
        MemoryAction::Importance { id, value } => {
            print_json(&app.memory.update_importance(&id, value)?)
        }
        MemoryAction::Search {
            query,
            kinds,
            session,
            agent,
            limit,
            min_importance,
            within_hours,
        } => {
            let query = MemoryQuery {
                kinds: (!kinds.is_empty()).then_some(kinds),
                session_id: session,
                agent_id: agent,
                limit,
                min_importance,
                time_window_hours: within_hours,
                ..MemoryQuery::new(query)
            };
            print_json(&app.memory.search(&query).await?)
        }
        MemoryAction::Context {
            query,
            session,
            agent,
            no_episodic,
            no_semantic,
            max_tokens,
        } => {
            let request = MemoryContextRequest {
                query,
                session_id: session,
                agent_id: agent,
                include_episodic: !no_episodic,
                include_semantic: !no_semantic,
                max_tokens,
            };
            let context = app.memory.build_context(&request).await?;
            eprintln!(
                "{} memories, ~{} tokens",
                context.memory_count, context.total_tokens
            );
            println!("{}", context.context);
            Ok(())
        }
    }
}

pub async fn session(app: &App, action: SessionAction) -> Result<()> {
    match action {
        SessionAction::Create { agent, metadata } => {
            print_json(&app.memory.create_session(agent, parse_metadata(&metadata)?)?)
        }
        SessionAction::List {
            agent,
            active_within_hours,
            limit,
        } => print_json(&app.memory.list_sessions(&SessionQuery {
            agent_id: agent,
            active_within_hours,
            limit,
        })?),
        SessionAction::Get { id } => print_json(&app.memory.get_session(&id)?),
        SessionAction::Delete { id } => {
            app.memory.delete_session(&id)?;
            println!("Deleted session {id}");
            Ok(())
        }
        SessionAction::Summarize { id } => print_json(&app.memory.summarize_session(&id).await?),
    }
}

pub async fn consolidate(app: &App, args: ConsolidateArgs) -> Result<()> {
    let defaults = &app.config.memory;
    let request = ConsolidationRequest {
        session_id: args.session,
        max_age_hours: args.max_age_hours.unwrap_or(defaults.consolidation_max_age_hours),
        importance_threshold: args
            .threshold
            .unwrap_or(defaults.consolidation_importance_threshold),
    };
    let report = app.memory.consolidate(&request).await?;
    println!("Consolidation complete:");
    println!("  Candidates:  {}", report.candidates_found);
    println!("  Promoted:    {}", report.promoted);
    println!("  Deleted:     {}", report.deleted);
    Ok(())
}
