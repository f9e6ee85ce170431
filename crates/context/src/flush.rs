//! Recovery summary written to the daily log before compaction.
//!
//! The flush is non-destructive: it records a short, recency-biased view of
//! the conversation so a crash mid-compaction loses nothing important.

use recollect_core::message::Context;
use recollect_core::session::SessionId;

/// Messages included in a flush, counted from the end.
pub const FLUSH_RECENT_MESSAGES: usize = 10;

/// Per-message preview length, in characters.
pub const FLUSH_PREVIEW_CHARS: usize = 200;

/// Render the memory-flush entry for `context`.
pub fn format_memory_flush(
    session_id: &SessionId,
    context: &Context,
    estimated_tokens: usize,
) -> String {
    let mut out = format!("## Memory flush: session {session_id} (~{estimated_tokens} tokens)\n\n");

    let skip = context.messages.len().saturating_sub(FLUSH_RECENT_MESSAGES);
    for message in context.messages.iter().skip(skip) {
        let text = message.text();
        let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if flattened.is_empty() {
            continue;
        }
        out.push_str(&format!(
            "- **{}**: {}\n",
            message.role_label(),
            preview(&flattened, FLUSH_PREVIEW_CHARS)
        ));
    }

    out
}

fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recollect_core::message::Message;

    #[test]
    fn heading_carries_session_and_tokens() {
        let id = SessionId::from("sess-1");
        let context = Context::new(vec![Message::user("hi")]);
        let text = format_memory_flush(&id, &context, 1234);
        assert!(text.starts_with("## Memory flush: session sess-1 (~1234 tokens)"));
        assert!(text.contains("- **User**: hi\n"));
    }

    #[test]
    fn only_last_ten_messages() {
        let messages = (0..15).map(|i| Message::user(format!("msg {i}"))).collect();
        let text = format_memory_flush(&SessionId::from("s"), &Context::new(messages), 0);
        assert!(!text.contains("msg 4\n"));
        assert!(text.contains("msg 5\n"));
        assert!(text.contains("msg 14\n"));
        assert_eq!(text.matches("- **User**").count(), 10);
    }

    #[test]
    fn long_messages_previewed() {
        let long = "a".repeat(FLUSH_PREVIEW_CHARS + 50);
        let context = Context::new(vec![Message::assistant(long)]);
        let text = format_memory_flush(&SessionId::from("s"), &context, 0);
        let expected = format!("- **Assistant**: {}...\n", "a".repeat(FLUSH_PREVIEW_CHARS));
        assert!(text.contains(&expected));
    }

    #[test]
    fn tool_calls_without_text_are_skipped() {
        let context = Context::new(vec![
            Message::tool_call("c1", "wallet_balance", serde_json::json!({})),
            Message::tool_result("c1", "12 TON\nconfirmed"),
        ]);
        let text = format_memory_flush(&SessionId::from("s"), &context, 0);
        assert!(!text.contains("**Assistant**"));
        assert!(text.contains("- **Tool result**: 12 TON confirmed\n"));
    }
}
