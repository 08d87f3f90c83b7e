use crate::commands::common::{format_sync_timestamp, open_local_engine, Context};
use crate::error::CliError;

pub async fn run_status(as_json: bool, context: &Context) -> Result<(), CliError> {
    let engine = open_local_engine(context).await?;
    let status = engine.status().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let remote = context.config.api_url.as_deref().unwrap_or("not configured");
    println!("database:           {}", context.db_path.display());
    println!("remote:             {remote}");
    println!("pending changes:    {}", status.pending_mutations);
    println!("unsynced notes:     {}", status.unsynced_documents);
    println!("last pull:          {}", format_sync_timestamp(status.last_sync));
    Ok(())
}
