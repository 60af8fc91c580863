use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use mflix_data::{Mflix, MongoStore, StoreConfig, shape_result};

/// Prints the ten longest movies, or the movie matching the first argument
/// (a key or an exact title).
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = StoreConfig::from_env()?;
    let store = MongoStore::connect(&config).await?;
    let mflix = Mflix::new(Arc::new(store), &config.collections);

    let output = match std::env::args().nth(1) {
        Some(identifier) => shape_result(&mflix.movies.resolve_movie(&identifier).await),
        None => shape_result(&mflix.movies.list_movies().await),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
