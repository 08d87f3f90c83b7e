use reviewer_core::{Document, Operation};

use crate::commands::common::{derive_title, open_local_engine, resolve_note_content, Context};
use crate::error::CliError;

pub async fn run_add(
    title: Option<String>,
    content_parts: &[String],
    context: &Context,
) -> Result<(), CliError> {
    let content = resolve_note_content(content_parts)?;
    let title = derive_title(title, &content);

    let engine = open_local_engine(context).await?;
    let document = Document::new(context.vault.as_str(), title, content);
    engine.save_document(document.clone(), Operation::Create).await?;

    println!("{}", document.id);
    Ok(())
}
