use crate::commands::common::{open_local_engine, Context};
use crate::error::CliError;

pub async fn run_clear(confirmed: bool, context: &Context) -> Result<(), CliError> {
    if !confirmed {
        return Err(CliError::ClearNotConfirmed);
    }

    let engine = open_local_engine(context).await?;
    let pending = engine.status().await?.pending_mutations;
    engine.clear_offline_data().await?;

    if pending > 0 {
        println!("Cleared offline data ({pending} unsynced change(s) discarded)");
    } else {
        println!("Cleared offline data");
    }
    Ok(())
}
