//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};

use recollect::config::RecollectConfig;
use recollect::db;

pub fn doctor(config: &RecollectConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("It is created on the first command that stores data.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("Recollect Health Report");
    println!("=======================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!();
    println!("Services:");
    println!("  Ollama:          {}", config.ollama.base_url);
    println!("  Embedding model: {}", config.ollama.embedding_model);
    println!("  Summary model:   {}", config.ollama.summary_model);
    if config.vector_backend_enabled() {
        println!("  Vector backend:  {} at {}", config.vector.backend, config.vector.url);
    } else {
        println!("  Vector backend:  none (local scan)");
    }
    println!();
    println!("Row counts:");
    println!("  Collections:     {}", report.collections);
    println!("  Documents:       {}", report.documents);
    println!("  Chunks:          {}", report.chunks);
    println!("  Memories:        {}", report.memories);
    println!("  Sessions:        {}", report.sessions);
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_message);
        println!();
        println!("Recovery steps:");
        println!("  1. Restore from a backup: cp backup.db {}", db_path.display());
        println!("  2. Or move the damaged file aside and re-ingest your documents.");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
