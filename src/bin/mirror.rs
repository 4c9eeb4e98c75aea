//! Feed the mirror from the command line.
//!
//! Usage: mirror <user-id> <prompt-id> <answer text...>
//!
//! Loads (or creates) the user's soul seed from the local SQLite store,
//! applies one feed, persists write-through, and prints a JSON summary.

use anyhow::{bail, Result};
use serde_json::json;
use std::sync::Arc;

use eva_mirror::config::Config;
use eva_mirror::seed::{SoulSeed, Vibe};
use eva_mirror::store::SqliteStore;
use eva_mirror::sync::{seed_key, HttpBackend, SyncAdapter};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        bail!("usage: mirror <user-id> <prompt-id> <answer text...>");
    }
    let user_id = &args[0];
    let prompt_id = &args[1];
    let text = args[2..].join(" ");

    let cfg = Config::from_env();
    let store = SqliteStore::new(&cfg.sqlite_path, &cfg.key_namespace)?;

    let sync = match cfg.remote_base {
        Some(_) => Some(SyncAdapter::new(Arc::new(HttpBackend::new(&cfg)?))),
        None => None,
    };

    let key = seed_key(user_id);
    let mut seed = match &sync {
        Some(adapter) => adapter.load_seed(&store, user_id).await,
        None => eva_mirror::store::read_json(&store, &key, None),
    }
    .map(Ok)
    .unwrap_or_else(|| SoulSeed::new(user_id, Vibe::Ethereal))?;

    let mut rng = rand::thread_rng();
    let outcome = seed.feed(prompt_id, &text, chrono::Local::now(), &mut rng);

    // Local write is authoritative; the remote mirror is best-effort and
    // awaited here only because the process is about to exit.
    eva_mirror::store::write_json(&store, &key, &seed)?;
    if let Some(adapter) = &sync {
        adapter.sync_seed(user_id, &seed).await;
    }

    println!(
        "{}",
        json!({
            "alias": seed.alias,
            "streak": seed.streak_count,
            "level": outcome.level,
            "streakExtended": outcome.streak_extended,
            "memories": seed.memories.len(),
            "artifact": {
                "name": outcome.artifact.name,
                "rarity": outcome.artifact.rarity.as_str(),
                "symbol": outcome.artifact.symbol,
            },
        })
    );
    Ok(())
}
