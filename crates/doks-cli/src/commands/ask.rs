use super::{api_client, render};
use anyhow::Result;
use colored::Colorize;
use doks_application::ConversationStore;
use doks_core::config::DoksConfig;

pub async fn run(config: &DoksConfig, question: &str, doc_id: Option<&str>) -> Result<()> {
    let question = question.trim();
    if question.is_empty() {
        anyhow::bail!("Question must not be empty");
    }

    let store = ConversationStore::new(api_client(config)?, config.query.clone());
    let session_id = store.create_session(None).await;

    println!("{}", format!("> {}", question).green());
    render::ask_and_render(&store, &session_id, question, doc_id).await?;

    Ok(())
}
