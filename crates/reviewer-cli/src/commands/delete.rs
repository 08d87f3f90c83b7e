use reviewer_core::Operation;

use crate::commands::common::{
    normalize_note_identifier, open_local_engine, resolve_document, Context,
};
use crate::error::CliError;

pub async fn run_delete(id: &str, context: &Context) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let engine = open_local_engine(context).await?;
    let document = resolve_document(&normalized_id, &engine).await?;

    engine.save_document(document.clone(), Operation::Delete).await?;
    println!("{}", document.id);
    Ok(())
}
