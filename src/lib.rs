#[macro_use]
extern crate rocket;

use std::sync::Arc;

use mongodb::Client;
use rocket::data::{ByteUnit, Limits};
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedHeaders, AllowedOrigins};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::clock::SystemClock;
use crate::config::{Config, StoreBackend};
use crate::data::memory::MemoryStore;
use crate::data::Store;
use crate::error::{BackendError, ConfigurationError, StoreError};
use crate::hub::Classhub;
use crate::resp::catchers::catchers;
use crate::route::mount_api;
use crate::storage::DirectoryStorage;

pub mod board;
pub mod clock;
pub mod config;
pub mod data;
pub mod error;
pub mod hub;
pub mod invite;
pub mod ledger;
pub mod middleware;
pub mod registry;
pub mod resp;
pub mod role;
pub mod route;
pub mod storage;
pub mod thread;
pub mod util;

/// Multipart bodies may carry several files of up to `max_upload_bytes` each.
const FILES_PER_FORM: u64 = 8;

fn load_config() -> Result<Config, ConfigurationError> {
    match Config::load() {
        Ok(c) => {
            tracing::info!("Configuration loaded.");
            Ok(c)
        }
        Err(ConfigurationError::NotFound(_)) => {
            let c = Config::default();
            if c.save().is_err() {
                tracing::warn!("Unable to save generated configuration.");
            }
            Ok(c)
        }
        Err(other) => {
            tracing::error!("Configuration error: {}", other);
            Err(other)
        }
    }
}

async fn connect_store(c: &Config) -> Result<Arc<dyn Store>, StoreError> {
    match c.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, data is lost on shutdown.");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::MongoDb => {
            tracing::info!("Connecting to MongoDB: {}", c.mongodb_uri);
            let client = Client::with_uri_str(c.mongodb_uri.as_str()).await?;

            tracing::info!("Using MongoDB database: {}", c.mongodb_db);
            let db = client.database(c.mongodb_db.as_str());

            if let Err(e) = db.list_collection_names(None).await {
                tracing::error!("Unable to connect to MongoDB.");
                return Err(e.into());
            }
            data::ensure_indexes(&db).await?;

            Ok(Arc::new(db))
        }
    }
}

/// Sets up logging, reads configuration and connects the configured store.
pub async fn create(log_level: Option<Level>) -> Result<Rocket<Build>, BackendError> {
    if let Some(l) = log_level {
        let subscriber = FmtSubscriber::builder().with_max_level(l).finish();

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Unable to set global logger: {}", err);
        };
        if let Err(err) = tracing_log::LogTracer::init() {
            eprintln!("Unable to forward log records: {}", err);
        }
    }

    tracing::info!("Reading .env file...");
    if dotenv::dotenv().is_err() {
        tracing::warn!("Unable to load .env file.");
    }

    tracing::info!("Loading configuration...");
    let c = load_config()?;

    let store = connect_store(&c).await?;
    let files = Arc::new(DirectoryStorage::new(&c.upload_dir, c.max_upload_bytes));
    tracing::info!("Storing uploads in: {}", c.upload_dir.display());

    let hub = Classhub::new(store, files, Arc::new(SystemClock), &c);
    build(&c, hub)
}

/// Assembles the HTTP server around an already wired [`Classhub`].
pub fn build(c: &Config, hub: Classhub) -> Result<Rocket<Build>, BackendError> {
    tracing::info!("Starting HTTP server...");
    let limits = Limits::default()
        .limit("file", ByteUnit::from(c.max_upload_bytes))
        .limit(
            "data-form",
            ByteUnit::from(c.max_upload_bytes.saturating_mul(FILES_PER_FORM)),
        );
    let figment = rocket::Config::figment().merge(("limits", limits));

    let mut r = rocket::custom(figment).manage(hub);

    tracing::info!("Setting up CORS...");
    let allowed_origins = AllowedOrigins::All;

    let cors = rocket_cors::CorsOptions {
        allowed_origins,
        allowed_methods: vec![Method::Get, Method::Put, Method::Post, Method::Delete]
            .into_iter()
            .map(From::from)
            .collect(),
        allowed_headers: AllowedHeaders::All,
        allow_credentials: true,
        ..Default::default()
    }
    .to_cors()?;

    r = r.attach(cors);
    r = mount_api(r);
    r = r.register("/", catchers());

    Ok(r)
}
