//! Seeds the database from a bulk catalog file.
//!
//! Usage: `seed-catalog [path]` (defaults to `data.txt`). The file holds a
//! JSON array of categories, a blank line, then a JSON array of raw
//! listings. The run wipes orders, users and the catalog, reloads the
//! catalog from the payload, and recreates the admin account. Meant for
//! fresh environments, not live stores.

use std::sync::Arc;

use anyhow::Context;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use tracing::info;
use uuid::Uuid;

use musclezone_api as api;

use api::entities::user::{self, Entity as UserEntity, UserRole};
use api::entities::{Order, OrderItem, User};

const DEFAULT_PAYLOAD_PATH: &str = "data.txt";
const DEFAULT_ADMIN_PHONE: &str = "9999999999";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(&cfg.log_level, cfg.log_json);

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_PAYLOAD_PATH.to_string());
    let payload = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read bulk payload from {}", path))?;
    let (categories, listings) =
        api::catalog::parse_bulk_payload(&payload).context("malformed bulk payload")?;

    let db = api::db::establish_connection(&cfg.database_url)
        .await
        .context("failed to connect to database")?;
    api::db::run_migrations(&db)
        .await
        .context("failed to run migrations")?;
    let db = Arc::new(db);

    wipe_transactional_data(&db).await?;

    let catalog = api::services::CatalogService::new(db.clone(), None);
    let summary = catalog
        .replace_catalog(&categories, &listings)
        .await
        .context("catalog reload failed")?;

    info!(
        categories = summary.categories,
        products = summary.products,
        variants = summary.variants,
        skipped = summary.skipped_listings,
        "catalog seeded from {}",
        path
    );

    ensure_admin_user(&db).await?;
    Ok(())
}

/// Clears orders, order items and users so the seeded environment starts
/// empty.
async fn wipe_transactional_data(db: &sea_orm::DatabaseConnection) -> anyhow::Result<()> {
    let items = OrderItem::delete_many().exec(db).await?.rows_affected;
    let orders = Order::delete_many().exec(db).await?.rows_affected;
    let users = User::delete_many().exec(db).await?.rows_affected;
    info!(items, orders, users, "cleared transactional data");
    Ok(())
}

/// Creates the default admin account on first run.
async fn ensure_admin_user(db: &sea_orm::DatabaseConnection) -> anyhow::Result<()> {
    let phone =
        std::env::var("ADMIN_PHONE").unwrap_or_else(|_| DEFAULT_ADMIN_PHONE.to_string());

    let existing = UserEntity::find()
        .filter(user::Column::Phone.eq(phone.clone()))
        .one(db)
        .await?;
    if existing.is_some() {
        info!(%phone, "admin user already present");
        return Ok(());
    }

    let password = std::env::var("ADMIN_PASSWORD").context(
        "ADMIN_PASSWORD must be set when creating the admin account for the first time",
    )?;

    let admin = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set("Admin".to_string()),
        email: Set(format!("{}@musclezone.com", phone)),
        phone: Set(phone.clone()),
        password_hash: Set(api::auth::hash_password(&password)
            .map_err(|e| anyhow::anyhow!("failed to hash admin password: {}", e))?),
        role: Set(UserRole::Admin),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(user_id = %admin.id, %phone, "admin user created");
    Ok(())
}
