//! `recollect estimate`: token estimate and threshold status for a session.

use anyhow::Context as _;
use recollect_context::{should_compact, should_flush_memory};
use recollect_core::{Context, SessionId, TranscriptStore};

use crate::runtime::Runtime;

pub async fn run(rt: &Runtime, session: &str) -> anyhow::Result<()> {
    let session_id = SessionId::from(session);
    let messages = rt
        .transcripts
        .read_transcript(&session_id)
        .await
        .with_context(|| format!("Failed to read transcript for session {session_id}"))?;
    let context = Context::new(messages);

    let config = &rt.config.compaction;
    let tokens = rt.estimator.estimate_context_tokens(&context);
    let limit = |value: Option<usize>| value.map_or_else(|| "unset".to_string(), |v| v.to_string());

    println!("Session {session_id}");
    println!("  Messages:        {} (max {})", context.len(), limit(config.max_messages));
    println!("  Tokens (est.):   {tokens} (max {})", limit(config.max_tokens));
    println!("  Soft threshold:  {}", limit(config.soft_threshold_tokens));
    println!("  Keep recent:     {}", config.keep_recent());
    println!(
        "  Memory flush:    {}",
        if should_flush_memory(&context, config, Some(tokens)) { "due" } else { "not due" }
    );
    println!(
        "  Compaction:      {}",
        if should_compact(&context, config, Some(tokens)) { "due" } else { "not due" }
    );

    Ok(())
}
