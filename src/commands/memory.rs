//! `memory` command: direct access to per-user memories.

use anyhow::{bail, Result};

use crate::Config;

use super::AppComponents;

/// Dispatch a memory action: `store`, `search` or `list`.
pub async fn run(
    config: &Config,
    action: &str,
    text: Option<&str>,
    user: Option<&str>,
    limit: usize,
) -> Result<()> {
    let components = AppComponents::init(config).await?;
    let user_id = user.unwrap_or(&config.default_user);

    match action {
        "store" => {
            let Some(text) = text else {
                bail!("memory store requires the fact text");
            };
            let fact = components.memory.store(user_id, text).await?;
            println!("Stored memory {} for {}", fact.id, user_id);
        }
        "search" => {
            let Some(query) = text else {
                bail!("memory search requires a query");
            };
            let results = components.memory.search(user_id, query, limit).await?;
            if results.is_empty() {
                println!("No memories found for {}", user_id);
            }
            for scored in results {
                println!("{:.3}  {}", scored.score, scored.fact.text);
            }
        }
        "list" => {
            let facts = components.memory.all_for_user(user_id);
            if facts.is_empty() {
                println!("No memories stored for {}", user_id);
            }
            for fact in facts {
                println!(
                    "{}  {}",
                    fact.created_at.format("%Y-%m-%d %H:%M:%S"),
                    fact.text
                );
            }
        }
        other => bail!("unknown memory action '{}' (store, search, list)", other),
    }

    Ok(())
}
