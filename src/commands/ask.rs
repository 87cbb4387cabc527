//! `ask` command: one-shot question from the command line.

use anyhow::Result;

use crate::Config;

use super::{build_agent, AppComponents};

/// Answer a single question and print the response.
pub async fn run(
    config: &Config,
    question: &str,
    mode: Option<&str>,
    user: Option<&str>,
) -> Result<()> {
    let mut config = config.clone();
    if let Some(mode) = mode {
        config.retrieval_mode = mode.to_string();
    }

    let components = AppComponents::init(&config).await?;
    let agent = build_agent(&config, &components)?;

    let user_id = match user {
        Some(user) => user.to_string(),
        None => agent.default_user().to_string(),
    };
    let reply = agent.answer(&user_id, question, &[]).await?;

    println!("{}", reply.response);
    Ok(())
}
