//! Database module for MongoDB persistence.
//!
//! The connection is attempted once at startup in the background. The server
//! does not wait for it, and a failed attempt is logged and never retried.

#[cfg(test)]
mod memory;
mod repository;

#[cfg(test)]
pub use memory::*;
pub use repository::*;

use std::sync::Arc;

use mongodb::{
    bson::doc,
    options::{ClientOptions, IndexOptions},
    Client, Database, IndexModel,
};
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;

use crate::config::Config;

/// Database used when neither `MONGO_DB_NAME` nor the URI names one.
pub const DEFAULT_DB_NAME: &str = "app";

/// Collection holding registered users.
pub const USERS_COLLECTION: &str = "users";

const APP_NAME: &str = "subtrack-backend";

/// Shared slot for the database, filled once the startup connection succeeds.
#[derive(Clone, Default)]
pub struct DbHandle {
    inner: Arc<OnceCell<Database>>,
}

impl DbHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The connected database, if the startup connection succeeded.
    pub fn get(&self) -> Option<&Database> {
        self.inner.get()
    }

    fn set(&self, db: Database) {
        if self.inner.set(db).is_err() {
            tracing::warn!("Database handle already initialized, ignoring new connection");
        }
    }
}

/// Connect to MongoDB and verify the server answers.
pub async fn connect(config: &Config) -> Result<Database, mongodb::error::Error> {
    let db = open(config).await?;
    db.run_command(doc! { "ping": 1 }).await?;
    Ok(db)
}

/// Build the database handle. Nothing is sent to the server yet.
async fn open(config: &Config) -> Result<Database, mongodb::error::Error> {
    let mut options = ClientOptions::parse(&config.mongo_uri).await?;
    options.app_name = Some(APP_NAME.to_string());
    options.server_selection_timeout = Some(config.mongo_connect_timeout);

    let client = Client::with_options(options)?;
    Ok(match &config.mongo_db_name {
        Some(name) => client.database(name),
        None => client
            .default_database()
            .unwrap_or_else(|| client.database(DEFAULT_DB_NAME)),
    })
}

async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let email_unique = IndexModel::builder()
        .keys(doc! { "email": 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build();

    db.collection::<UserDocument>(USERS_COLLECTION)
        .create_index(email_unique)
        .await?;

    Ok(())
}

/// Publish a connected database, then create indexes.
///
/// Index failures are logged and leave the database in use; the repository
/// still maps duplicate e-mails to conflicts when the index exists.
async fn install(handle: &DbHandle, db: Database) {
    tracing::info!(database = %db.name(), "Connected to MongoDB");
    handle.set(db.clone());

    if let Err(e) = ensure_indexes(&db).await {
        tracing::warn!("Failed to create indexes on {}: {}", USERS_COLLECTION, e);
    }
}

/// Attempt the startup connection in the background.
///
/// Success fills `handle`; failure is only logged. The returned task always
/// completes without panicking.
pub fn spawn_connect(config: Arc<Config>, handle: DbHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        match connect(&config).await {
            Ok(db) => install(&handle, db).await,
            Err(e) => {
                tracing::error!("Error connecting to MongoDB: {}", e);
            }
        }
    })
}
