use crate::commands::common::{
    document_to_list_item, format_document_lines, open_local_engine, Context, DocumentListItem,
};
use crate::error::CliError;

pub async fn run_list(
    unsynced: bool,
    limit: usize,
    as_json: bool,
    context: &Context,
) -> Result<(), CliError> {
    let engine = open_local_engine(context).await?;
    let mut documents = if unsynced {
        engine.unsynced_documents().await?
    } else {
        engine.vault_documents(&context.vault).await?
    };
    documents.truncate(limit);

    if as_json {
        let json_items = documents
            .iter()
            .map(document_to_list_item)
            .collect::<Vec<DocumentListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_document_lines(&documents) {
            println!("{line}");
        }
    }

    Ok(())
}
