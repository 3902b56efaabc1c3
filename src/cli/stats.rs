use anyhow::Result;

use super::App;

/// Display knowledge and memory statistics in the terminal.
pub fn stats(app: &App) -> Result<()> {
    let knowledge = app.knowledge.stats()?;
    let memory = app.memory.stats()?;

    println!("Knowledge");
    println!("{}", "=".repeat(40));
    println!("  Collections:         {}", knowledge.total_collections);
    println!("  Documents:           {}", knowledge.total_documents);
    println!("  Chunks:              {}", knowledge.total_chunks);
    for c in &knowledge.collections {
        println!(
            "    {:<20} {} docs, {} chunks",
            c.name, c.document_count, c.chunk_count
        );
    }
    println!();

    println!("Memory");
    println!("{}", "=".repeat(40));
    println!("  Total memories:      {}", memory.total_memories);
    println!("  {:<20} {}", "session", memory.session_memories);
    println!("  {:<20} {}", "episodic", memory.episodic_memories);
    println!("  {:<20} {}", "semantic", memory.semantic_memories);
    println!("  Sessions:            {}", memory.total_sessions);
    println!("  Active (24h):        {}", memory.active_sessions_24h);

    Ok(())
}
