//! Handler for the `reconcile` command.

use serde_json::json;

use crate::application::{CallbackRegistry, ReconcileReport};
use crate::error::Result;
use crate::infrastructure::bootstrap;
use crate::infrastructure::config::Config;

/// Run one reconciler pass under the shared lock and print the report.
///
/// # Errors
/// Returns an error if the database cannot be opened or the pass fails.
pub async fn execute(config: Config, json_output: bool) -> Result<()> {
    let components = bootstrap::build(config, CallbackRegistry::new())?;
    let report = components
        .reconciler(bootstrap::instance_owner())
        .tick()
        .await?;

    if json_output {
        println!("{}", render_json(report.as_ref()));
        return Ok(());
    }
    match report {
        Some(report) => print_report(&report),
        None => println!("Another reconciler holds the lock; nothing done."),
    }
    Ok(())
}

fn render_json(report: Option<&ReconcileReport>) -> serde_json::Value {
    match report {
        Some(r) => json!({
            "command": "reconcile",
            "status": "ok",
            "report": {
                "batches": r.batches,
                "scanned": r.scanned,
                "hinted": r.hinted,
                "orphans_deleted": r.orphans_deleted,
                "expired_waits": r.expired_waits,
                "expired_failures": r.expired_failures,
                "expired_responses": r.expired_responses,
                "failed_batches": r.failed_batches,
            },
        }),
        None => json!({ "command": "reconcile", "status": "locked" }),
    }
}

fn print_report(r: &ReconcileReport) {
    println!("Reconcile pass");
    println!("  batches            {}", r.batches);
    println!("  responses scanned  {}", r.scanned);
    println!("  hints published    {}", r.hinted);
    println!("  orphans deleted    {}", r.orphans_deleted);
    println!("  expired joins      {}", r.expired_waits);
    println!("  expired failures   {}", r.expired_failures);
    println!("  expired responses  {}", r.expired_responses);
    if r.failed_batches > 0 {
        println!("  failed batches     {}", r.failed_batches);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_pass_renders_status_only() {
        assert_eq!(
            render_json(None),
            json!({ "command": "reconcile", "status": "locked" })
        );
    }

    #[test]
    fn report_fields_are_rendered() {
        let report = ReconcileReport {
            hinted: 2,
            orphans_deleted: 5,
            ..ReconcileReport::default()
        };
        let value = render_json(Some(&report));
        assert_eq!(value["report"]["hinted"], 2);
        assert_eq!(value["report"]["orphans_deleted"], 5);
    }
}
