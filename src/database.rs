//! Repository layer.
//!
//! [`Database`] wraps an SQLx pool and exposes one method per persistence
//! operation. Statements come from [`crate::dialect`]; this module only binds
//! parameters, maps rows and attaches [`DbOperation`] context to failures.
//! The methods are spread over submodules by table.

mod categories;
mod comments;
mod favorites;
mod history;
mod images;
mod users;

pub use images::EnsuredImage;

use crate::{
    dialect::{CurrentDialect, CurrentRow, Dialect},
    model::{Category, Comment, Favorite, Image, ImagePrivacy, SearchHistory, UserSummary},
};
use chrono::{DateTime, SecondsFormat, Utc};
pub use sqlx::Pool;
use sqlx::{FromRow, Row};
use std::str::FromStr;
use thiserror::Error;

pub use crate::dialect::Db;

/// Binds a slice of [`crate::query::SqlParam`] onto any sqlx query builder.
macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for param in $params {
            query = match param {
                $crate::query::SqlParam::Int(value) => query.bind(*value),
                $crate::query::SqlParam::Text(value) => query.bind(value.clone()),
                $crate::query::SqlParam::Null => query.bind(None::<i64>),
            };
        }
        query
    }};
}

pub(crate) use bind_params;

pub async fn run_migration(pool: &sqlx::Pool<Db>) -> Result<(), sqlx::Error> {
    CurrentDialect::migration(pool).await
}

/// Formats a timestamp the way every table stores it.
pub(crate) fn to_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn get_timestamp(row: &CurrentRow, column: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    let raw: String = row.try_get(column)?;

    DateTime::parse_from_rfc3339(&raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        })
}

fn get_dimension(row: &CurrentRow, column: &str) -> Result<Option<u32>, sqlx::Error> {
    let value: Option<i64> = row.try_get(column)?;
    Ok(value.map(|v| v as u32))
}

impl FromRow<'_, CurrentRow> for Image {
    fn from_row(row: &CurrentRow) -> Result<Self, sqlx::Error> {
        let privacy: String = row.try_get("privacy")?;
        let privacy = ImagePrivacy::from_str(&privacy).map_err(|e| sqlx::Error::ColumnDecode {
            index: "privacy".to_string(),
            source: Box::new(e),
        })?;
        let image_size: Option<i64> = row.try_get("image_size")?;

        Ok(Image {
            id: row.try_get("id")?,
            external_id: row.try_get("external_id")?,
            page_url: row.try_get("page_url")?,
            kind: row.try_get("type")?,
            tags: row.try_get("tags")?,
            preview_url: row.try_get("preview_url")?,
            preview_width: get_dimension(row, "preview_width")?,
            preview_height: get_dimension(row, "preview_height")?,
            webformat_url: row.try_get("webformat_url")?,
            webformat_width: get_dimension(row, "webformat_width")?,
            webformat_height: get_dimension(row, "webformat_height")?,
            large_image_url: row.try_get("large_image_url")?,
            full_hd_url: row.try_get("fullhd_url")?,
            image_url: row.try_get("image_url")?,
            image_width: get_dimension(row, "image_width")?,
            image_height: get_dimension(row, "image_height")?,
            image_size: image_size.map(|v| v as u64),
            file_name: row.try_get("file_name")?,
            original_file_name: row.try_get("original_file_name")?,
            views: row.try_get("views")?,
            downloads: row.try_get("downloads")?,
            likes: row.try_get("likes")?,
            comments: row.try_get("comments")?,
            user_id: row.try_get("user_id")?,
            privacy,
            created_at: get_timestamp(row, "created_at")?,
            updated_at: get_timestamp(row, "updated_at")?,
        })
    }
}

impl FromRow<'_, CurrentRow> for Favorite {
    fn from_row(row: &CurrentRow) -> Result<Self, sqlx::Error> {
        Ok(Favorite {
            id: row.try_get("favorite_id")?,
            user: UserSummary {
                id: row.try_get("favorite_user_id")?,
                username: row.try_get("favorite_username")?,
            },
            image: Image::from_row(row)?,
            created_at: get_timestamp(row, "favorited_at")?,
        })
    }
}

impl FromRow<'_, CurrentRow> for Comment {
    fn from_row(row: &CurrentRow) -> Result<Self, sqlx::Error> {
        Ok(Comment {
            id: row.try_get("id")?,
            image_id: row.try_get("image_id")?,
            user: UserSummary {
                id: row.try_get("user_id")?,
                username: row.try_get("username")?,
            },
            content: row.try_get("content")?,
            created_at: get_timestamp(row, "created_at")?,
        })
    }
}

impl FromRow<'_, CurrentRow> for Category {
    fn from_row(row: &CurrentRow) -> Result<Self, sqlx::Error> {
        Ok(Category {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
        })
    }
}

impl FromRow<'_, CurrentRow> for SearchHistory {
    fn from_row(row: &CurrentRow) -> Result<Self, sqlx::Error> {
        Ok(SearchHistory {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            search_query: row.try_get("search_query")?,
            filters: row.try_get("filters")?,
            results_count: row.try_get("results_count")?,
            search_date: get_timestamp(row, "search_date")?,
        })
    }
}

/// The gallery's relational store.
///
/// This struct wraps an SQLx connection pool. Every multi-statement operation
/// runs in its own transaction, committed on success and rolled back on drop.
/// The implementation is SQL dialect agnostic and delegates syntax to `Dialect`.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Db>,
}

impl Database {
    pub async fn with_migration(pool: sqlx::Pool<Db>) -> Result<Self, sqlx::Error> {
        run_migration(&pool).await?;

        Ok(Self { pool })
    }

    /// Opens `database_url`, creating the file and its directory when missing,
    /// and migrates it.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        use sqlx::migrate::MigrateDatabase;

        ensure_parent_dir(database_url)?;
        if !Db::database_exists(database_url).await? {
            tracing::info!(database_url, "creating database");
            Db::create_database(database_url).await?;
        }

        Self::with_migration(Pool::connect(database_url).await?).await
    }

    pub fn pool(&self) -> &Pool<Db> {
        &self.pool
    }

    async fn begin(&self) -> Result<sqlx::Transaction<'static, Db>, DatabaseError> {
        self.pool
            .begin()
            .await
            .map_err(|e| DatabaseError::TransactionFailed { source: e })
    }
}

fn ensure_parent_dir(database_url: &str) -> std::io::Result<()> {
    let Some(path) = database_url.strip_prefix("sqlite:") else {
        return Ok(());
    };
    let path = path.trim_start_matches("//");
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path == ":memory:" {
        return Ok(());
    }

    match std::path::Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Builds the `map_err` closure used after every statement.
fn query_failed(operation: DbOperation, sql: &str) -> impl FnOnce(sqlx::Error) -> DatabaseError {
    move |source| DatabaseError::QueryFailed {
        operation,
        sql: sql.to_string(),
        source,
    }
}

fn commit_failed(source: sqlx::Error) -> DatabaseError {
    DatabaseError::TransactionFailed { source }
}

/// Represents errors that can occur during database operations.
///
/// Each variant includes contextual information to assist with debugging and error handling.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A general SQL query failure, with the operation and the SQL that failed.
    #[error("Query failed during {operation:?}: sql={sql}")]
    QueryFailed {
        operation: DbOperation,
        sql: String,
        #[source]
        source: sqlx::Error,
    },

    /// A failure to begin or commit a transaction.
    #[error("Failed to operate transaction")]
    TransactionFailed {
        #[source]
        source: sqlx::Error,
    },
}

impl DatabaseError {
    /// Whether the failure was a UNIQUE constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        let source = match self {
            DatabaseError::QueryFailed { source, .. } => source,
            DatabaseError::TransactionFailed { source } => source,
        };

        source
            .as_database_error()
            .map(|e| e.is_unique_violation())
            .unwrap_or(false)
    }
}

/// The kind of database operation being performed,
/// used for attaching context to [`DatabaseError::QueryFailed`].
#[derive(Debug)]
pub enum DbOperation {
    /// INSERT INTO users
    InsertUser { username: String },
    /// INSERT INTO user_roles
    InsertUserRole { user_id: i64 },
    /// SELECT ... FROM users / user_roles
    QueryUser,
    /// INSERT INTO images ... ON CONFLICT DO NOTHING
    InsertImage { webformat_url: String },
    /// SELECT ... FROM images
    QueryImages,
    /// UPDATE images SET ...
    UpdateImage { id: i64 },
    /// DELETE FROM images WHERE id = ...
    DeleteImage { id: i64 },
    /// INSERT INTO favorites
    InsertFavorite { user_id: i64, image_id: i64 },
    /// DELETE FROM favorites
    DeleteFavorite { user_id: i64, image_id: i64 },
    /// SELECT ... FROM favorites
    QueryFavorites,
    /// INSERT INTO comments
    InsertComment { image_id: i64 },
    /// SELECT ... FROM comments
    QueryComments,
    /// INSERT INTO categories
    InsertCategory { name: String },
    /// DELETE FROM categories
    DeleteCategory { id: i64 },
    /// SELECT ... FROM categories
    QueryCategories,
    /// INSERT INTO search_history
    InsertSearch { user_id: i64 },
    /// DELETE FROM search_history
    DeleteSearches { user_id: i64 },
    /// SELECT ... FROM search_history
    QuerySearches,
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::{
        database::{Database, Db, Pool},
        model::{ImagePrivacy, NewImage, Role},
    };

    /// Returns an in-memory SQLite connection pool for testing.
    pub async fn get_pool() -> Pool<Db> {
        Pool::connect(":memory:").await.unwrap()
    }

    pub async fn get_database() -> Database {
        Database::with_migration(get_pool().await).await.unwrap()
    }

    pub fn new_image(url: &str, owner: Option<i64>, privacy: ImagePrivacy) -> NewImage {
        NewImage {
            kind: "photo".to_string(),
            tags: "cat, kitten".to_string(),
            preview_url: url.to_string(),
            webformat_url: url.to_string(),
            large_image_url: url.to_string(),
            user_id: owner,
            privacy,
            ..Default::default()
        }
    }

    pub async fn create_user(db: &Database, name: &str) -> i64 {
        db.create_user(name, &format!("{name}@example.com"), "hash", &[Role::User])
            .await
            .unwrap()
            .id
    }

    /// Verifies that `Database::with_migration` can be called multiple times
    /// on the same pool without error.
    #[tokio::test]
    async fn test_migration_idempotency() {
        let pool = get_pool().await;

        Database::with_migration(pool.clone()).await.unwrap();
        Database::with_migration(pool.clone()).await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_creates_file_and_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("gallery.db");
        let url = format!("sqlite:{}", path.display());

        let db = Database::connect(&url).await.unwrap();
        create_user(&db, "alice").await;
        db.pool().close().await;

        assert!(path.exists());
        let reopened = Database::connect(&url).await.unwrap();
        assert!(reopened.username_exists("alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_unique_violation_is_detected() {
        let db = get_database().await;
        create_user(&db, "alice").await;

        let err = db
            .create_user("alice", "other@example.com", "hash", &[Role::User])
            .await
            .unwrap_err();

        assert!(err.is_unique_violation());
    }
}
