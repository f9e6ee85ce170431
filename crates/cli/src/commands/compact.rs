//! `recollect compact`: compact a session transcript into a new session.

use anyhow::Context as _;
use recollect_core::{Context, SessionId, TranscriptStore};

use crate::runtime::Runtime;

pub async fn run(
    rt: &Runtime,
    session: &str,
    chat_id: Option<&str>,
    force: bool,
) -> anyhow::Result<()> {
    let session_id = SessionId::from(session);
    let messages = rt
        .transcripts
        .read_transcript(&session_id)
        .await
        .with_context(|| format!("Failed to read transcript for session {session_id}"))?;
    let context = Context::new(messages);

    let manager = rt.compaction_manager();
    let credentials = rt.credentials();

    let new_session = if force {
        let config = manager.config();
        let id = manager
            .compact_and_save_transcript(&session_id, context, &config, &credentials, chat_id)
            .await
            .context("Compaction failed")?;
        Some(id)
    } else {
        manager
            .check_and_compact(&session_id, &context, &credentials, chat_id)
            .await
            .context("Compaction failed")?
    };

    match new_session {
        Some(id) => {
            let count = rt.transcripts.read_transcript(&id).await?.len();
            println!("Compacted {session_id} into {id} ({count} messages)");
        }
        None => println!("No compaction needed for {session_id}"),
    }

    Ok(())
}
