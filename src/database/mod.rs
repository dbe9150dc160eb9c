use crate::models::{Guest, User};
use crate::utils::cookies::GUEST_COOKIE_MAX_AGE_DAYS;
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use std::error::Error;
use std::time::Duration;

pub const USERS_COLLECTION: &str = "users";
pub const GUESTS_COLLECTION: &str = "guests";

#[derive(Clone)]
pub struct MongoDB {
    db: Database,
}

impl MongoDB {
    pub async fn new(uri: &str) -> Result<Self, Box<dyn Error>> {
        // One pooled client for the whole process instead of connect/disconnect per request
        let mut client_options = mongodb::options::ClientOptions::parse(uri).await?;

        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(5);
        client_options.max_idle_time = Some(std::time::Duration::from_secs(300));

        client_options.connect_timeout = Some(std::time::Duration::from_secs(5));
        client_options.server_selection_timeout = Some(std::time::Duration::from_secs(5));

        let client = Client::with_options(client_options)?;

        let db_name = database_name_from_uri(uri);
        let db = client.database(db_name);

        // Test connection
        db.list_collection_names().await?;

        let mongodb = Self { db };
        mongodb.ensure_indexes().await?;

        Ok(mongodb)
    }

    /// Uniqueness constraints the documents rely on.
    async fn ensure_indexes(&self) -> Result<(), Box<dyn Error>> {
        log::info!("🔧 Creating database indexes...");

        let unique = || IndexOptions::builder().unique(true).build();

        let username_index = IndexModel::builder()
            .keys(doc! { "username": 1 })
            .options(unique())
            .build();
        match self.users().create_index(username_index).await {
            Ok(_) => log::info!("   ✅ Index created: users(username) unique"),
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(unique())
            .build();
        match self.users().create_index(email_index).await {
            Ok(_) => log::info!("   ✅ Index created: users(email) unique"),
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        let guest_index = IndexModel::builder()
            .keys(doc! { "guest_id": 1 })
            .options(unique())
            .build();
        match self.guests().create_index(guest_index).await {
            Ok(_) => log::info!("   ✅ Index created: guests(guest_id) unique"),
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        match self.guests().create_index(guest_expiry_index()).await {
            Ok(_) => log::info!("   ✅ Index created: guests(last_active) TTL {} days", GUEST_COOKIE_MAX_AGE_DAYS),
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        log::info!("✅ Database indexes ready");

        Ok(())
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    pub fn users(&self) -> Collection<User> {
        self.collection(USERS_COLLECTION)
    }

    pub fn guests(&self) -> Collection<Guest> {
        self.collection(GUESTS_COLLECTION)
    }

    pub async fn ping(&self) -> bool {
        self.db.run_command(doc! { "ping": 1 }).await.is_ok()
    }
}

/// Guests idle for longer than their cookie lives are removed by MongoDB.
fn guest_expiry_index() -> IndexModel {
    let ttl = Duration::from_secs(GUEST_COOKIE_MAX_AGE_DAYS as u64 * 24 * 60 * 60);
    IndexModel::builder()
        .keys(doc! { "last_active": 1 })
        .options(IndexOptions::builder().expire_after(ttl).build())
        .build()
}

/// Last path segment of the URI, without query string; falls back to `profession_predictor`.
fn database_name_from_uri(uri: &str) -> &str {
    let without_scheme = uri.split("://").nth(1).unwrap_or(uri);
    without_scheme
        .split_once('/')
        .map(|(_, rest)| rest.split('?').next().unwrap_or(""))
        .filter(|name| !name.is_empty())
        .unwrap_or("profession_predictor")
}
