//! Debounced Search Box
//!
//! This example simulates a user typing into a search field. Every
//! keystroke triggers a lookup, but only the query typed last survives the
//! debounce window, and a slow lookup is cancelled as soon as a newer one
//! is admitted.
//!
//! Key concepts:
//! - Debounce collapse of rapid `execute` calls
//! - Cancellation of an in-flight producer
//! - Per-segment observers and their disposer
//!
//! Run with: RUST_LOG=tristore=debug cargo run --example search_box

use std::time::Duration;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;
use tristore::{Observer, Store};

#[derive(Clone, Debug, PartialEq)]
struct Results {
    query: String,
    hits: Vec<String>,
}

const CATALOG: &[&str] = &["rust", "rustc", "rustup", "ruby", "tokio", "tracing"];

async fn lookup(query: String) -> Result<Results, String> {
    // Longer queries take longer, to give later keystrokes a chance to cancel.
    sleep(Duration::from_millis(40 * query.len() as u64)).await;
    if query.contains('!') {
        return Err(format!("invalid query '{query}'"));
    }
    let hits = CATALOG
        .iter()
        .filter(|item| item.starts_with(query.as_str()))
        .map(|item| item.to_string())
        .collect();
    Ok(Results { query, hits })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Debounced Search Box ===\n");

    let store: Store<String, Results> = Store::builder(Results {
        query: String::new(),
        hits: Vec::new(),
    })
    .debounce(Duration::from_millis(80))
    .build()
    .expect("valid store configuration");

    let disposer = store.observer(
        Observer::new()
            .on_state(|results: &Results| {
                println!("  results for '{}': {:?}", results.query, results.hits)
            })
            .on_loading(|loading| println!("  loading: {loading}"))
            .on_error(|error| println!("  error: {error:?}")),
    );

    println!("Typing 'rus' quickly...");
    let mut typing = Vec::new();
    for query in ["r", "ru", "rus"] {
        let store = store.clone();
        let query = query.to_string();
        typing.push(tokio::spawn(async move {
            store.execute(move || lookup(query)).await
        }));
        sleep(Duration::from_millis(30)).await;
    }
    for keystroke in typing {
        println!("  keystroke outcome: {:?}", keystroke.await.expect("task joined"));
    }

    println!("\nTyping 'tok!' (fails)...");
    store.execute(|| lookup("tok!".to_string())).await;
    store.clear_error();

    println!("\nFinal state: {:?}", store.triple());

    disposer.dispose().await;
    store.destroy().await;
    println!("\n=== Complete ===");
}
