//! Handler for the `status` command.

use serde_json::json;

use crate::adapter::outbound::sqlite::StoreStats;
use crate::application::CallbackRegistry;
use crate::error::Result;
use crate::infrastructure::bootstrap;
use crate::infrastructure::config::Config;

/// Print record counts and per-topic queue depth.
///
/// # Errors
/// Returns an error if the database cannot be opened or queried.
pub fn execute(config: Config, json_output: bool) -> Result<()> {
    let components = bootstrap::build(config, CallbackRegistry::new())?;
    let stats = components.store.stats()?;
    let depths = components
        .config
        .dispatcher
        .topics
        .iter()
        .map(|topic| Ok((topic.clone(), components.queue.depth(topic)?)))
        .collect::<Result<Vec<(String, i64)>>>()?;

    if json_output {
        println!(
            "{}",
            render_json(&components.config.database, &stats, &depths)
        );
        return Ok(());
    }

    println!("Database  {}", components.config.database);
    println!("Joins");
    println!("  new      {}", stats.waits_new);
    println!("  success  {}", stats.waits_success);
    println!("  error    {}", stats.waits_error);
    println!("Responses  {}", stats.responses);
    println!("Failures   {}", stats.failures);
    println!("Queued hints");
    for (topic, depth) in &depths {
        println!("  {topic:<16} {depth}");
    }
    Ok(())
}

fn render_json(database: &str, stats: &StoreStats, depths: &[(String, i64)]) -> serde_json::Value {
    let queues: serde_json::Map<String, serde_json::Value> = depths
        .iter()
        .map(|(topic, depth)| (topic.clone(), json!(depth)))
        .collect();
    json!({
        "command": "status",
        "database": database,
        "waits": {
            "new": stats.waits_new,
            "success": stats.waits_success,
            "error": stats.waits_error,
            "total": stats.waits_total(),
        },
        "responses": stats.responses,
        "failures": stats.failures,
        "queues": queues,
    })
}
