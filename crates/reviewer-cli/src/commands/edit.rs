use reviewer_core::Operation;

use crate::commands::common::{
    capture_editor_input_with_initial, normalize_content, normalize_note_identifier,
    open_local_engine, resolve_document, Context,
};
use crate::error::CliError;

pub async fn run_edit(
    id: &str,
    title: Option<String>,
    content: Option<String>,
    context: &Context,
) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let engine = open_local_engine(context).await?;
    let mut document = resolve_document(&normalized_id, &engine).await?;

    let title = title.and_then(|title| normalize_content(&title));
    let content = match content {
        Some(content) => Some(normalize_content(&content).ok_or(CliError::EmptyContent)?),
        None if title.is_none() => Some(
            capture_editor_input_with_initial(&document.content)?
                .ok_or(CliError::EmptyContent)?,
        ),
        None => None,
    };

    let unchanged = title.as_ref().is_none_or(|title| *title == document.title)
        && content.as_ref().is_none_or(|content| *content == document.content);
    if unchanged {
        println!("{}", document.id);
        return Ok(());
    }

    document.edit(title, content);
    engine.save_document(document.clone(), Operation::Update).await?;
    println!("{}", document.id);
    Ok(())
}
