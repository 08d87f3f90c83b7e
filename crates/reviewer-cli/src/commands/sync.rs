use reviewer_core::network::NetworkStatus;
use reviewer_core::sync::SyncOutcome;

use crate::commands::common::{format_report_lines, open_engine, Context};
use crate::error::CliError;

pub async fn run_sync(as_json: bool, context: &Context) -> Result<(), CliError> {
    context.require_sync()?;
    let engine = open_engine(context, NetworkStatus::fixed(true)).await?;
    let outcome = engine.sync().await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match outcome {
        SyncOutcome::Completed(report) => {
            for line in format_report_lines(&report) {
                println!("{line}");
            }
        }
        SyncOutcome::Skipped { reason } => println!("Sync skipped: {reason:?}"),
    }
    Ok(())
}
