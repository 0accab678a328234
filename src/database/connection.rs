use mongodb::{bson::doc, Client};

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::store::MongoStore;

pub async fn connect_store(config: &AppConfig) -> Result<MongoStore> {
    let client = Client::with_uri_str(&config.database_url)
        .await
        .map_err(|e| AppError::configuration(format!("Failed to connect to MongoDB: {}", e)))?;

    let db = client.database(&config.database_name);
    db.run_command(doc! { "ping": 1 }).await?;

    match db.list_collection_names().await {
        Ok(collections) => {
            tracing::info!("✅ Connected to database: {}", config.database_name);
            tracing::info!("📂 Collections found: {:?}", collections);
        }
        Err(e) => {
            tracing::warn!(
                "⚠️ Database '{}' may be inaccessible: {}",
                config.database_name,
                e
            );
        }
    }

    let store = MongoStore::new(client, db);
    store.ensure_indexes().await?;
    Ok(store)
}
