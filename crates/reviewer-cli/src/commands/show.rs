use crate::commands::common::{
    format_sync_timestamp, normalize_note_identifier, open_local_engine, resolve_document, Context,
};
use crate::error::CliError;

pub async fn run_show(id: &str, as_json: bool, context: &Context) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let engine = open_local_engine(context).await?;
    let document = resolve_document(&normalized_id, &engine).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    let sync_state = match document.local_changes {
        Some(change) => format!("pending {}", change.operation),
        None if document.is_synced => "synced".to_string(),
        None => "not synced".to_string(),
    };

    println!("{}", document.title);
    println!("id:      {}", document.id);
    println!("vault:   {}", document.vault_id);
    println!("updated: {}", format_sync_timestamp(document.updated_at));
    println!("sync:    {sync_state}");
    println!();
    println!("{}", document.content);
    Ok(())
}
