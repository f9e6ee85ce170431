//! `recollect context`: assemble the retrieval context for one turn.

use recollect_context::BuildContextOptions;

use crate::runtime::Runtime;

pub struct ContextArgs {
    pub chat: String,
    pub query: String,
    pub all_chats: bool,
    pub include_knowledge: bool,
    pub include_feed: bool,
}

pub async fn run(rt: &Runtime, args: ContextArgs) -> anyhow::Result<()> {
    let builder = rt.context_builder(&args.chat, args.all_chats).await?;

    let mut options = BuildContextOptions::from_config(args.query, args.chat, &rt.config.context);
    options.search_all_chats = args.all_chats;
    options.include_agent_memory = args.include_knowledge;
    options.include_feed_history = args.include_feed;

    let built = builder.build_context(options).await;
    println!("{}", serde_json::to_string_pretty(&built)?);
    Ok(())
}
