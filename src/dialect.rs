//! # SQL Dialect Module
//!
//! This module defines the `Dialect` trait, which abstracts over the differences in
//! SQL syntax across database systems. Every statement the repository layer runs is
//! produced here, so `database` only binds parameters and maps rows.
//!
//! `CurrentDialect` is selected at compile time by feature flags. With the `sqlite`
//! feature enabled it resolves to `sqlite::SqliteDialect`.

#[cfg(feature = "sqlite")]
mod sqlite;

/// The current SQL dialect used at compile time, determined by feature flags.
#[cfg(feature = "sqlite")]
pub type CurrentDialect = sqlite::SqliteDialect;

#[cfg(feature = "sqlite")]
pub type Db = sqlx::Sqlite;

#[cfg(feature = "sqlite")]
pub type CurrentRow = sqlx::sqlite::SqliteRow;

/// Columns selected whenever a full image row is loaded.
const IMAGE_COLUMNS: &str = "images.id, images.external_id, images.page_url, images.type, \
    images.tags, images.preview_url, images.preview_width, images.preview_height, \
    images.webformat_url, images.webformat_width, images.webformat_height, \
    images.large_image_url, images.fullhd_url, images.image_url, images.image_width, \
    images.image_height, images.image_size, images.file_name, images.original_file_name, \
    images.views, images.downloads, images.likes, images.comments, images.user_id, \
    images.privacy, images.created_at, images.updated_at";

/// A trait for SQL dialects to support database-specific query generation.
///
/// Implementors only have to provide the placeholder syntax and the migration;
/// the default statements are written in the common subset of SQL.
pub trait Dialect {
    /// Returns the SQL placeholder syntax for the given parameter index.
    ///
    /// - SQLite: `?`
    /// - PostgreSQL: `$1`, `$2`, ...
    ///
    /// # Parameters
    /// - `idx`: The 1-based parameter index (used in dialects that number placeholders).
    fn placeholder(idx: usize) -> String;

    /// Creates every table, index and constraint. Must be idempotent.
    async fn migration(pool: &sqlx::Pool<Db>) -> Result<(), sqlx::Error>;

    // ---- users ----

    fn insert_user_statement() -> String {
        format!(
            "INSERT INTO users (username, email, password_hash, created_at) VALUES ({}, {}, {}, {}) RETURNING id",
            Self::placeholder(1),
            Self::placeholder(2),
            Self::placeholder(3),
            Self::placeholder(4)
        )
    }

    /// Attaches a role to a user, ignoring pairs that already exist.
    fn ensure_user_role_statement() -> String;

    fn query_user_by_id_statement() -> String {
        format!(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE id = {}",
            Self::placeholder(1)
        )
    }

    fn query_user_by_username_statement() -> String {
        format!(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE username = {}",
            Self::placeholder(1)
        )
    }

    fn query_roles_by_user_statement() -> String {
        format!(
            "SELECT role FROM user_roles WHERE user_id = {} ORDER BY role",
            Self::placeholder(1)
        )
    }

    fn exists_username_statement() -> String {
        format!(
            "SELECT EXISTS ( SELECT 1 FROM users WHERE username = {} )",
            Self::placeholder(1)
        )
    }

    fn exists_email_statement() -> String {
        format!(
            "SELECT EXISTS ( SELECT 1 FROM users WHERE email = {} )",
            Self::placeholder(1)
        )
    }

    // ---- images ----

    /// Returns the statement inserting an image unless its `webformat_url` is taken.
    ///
    /// The caller inspects `rows_affected` to tell a fresh insert from a dedup hit
    /// and then reloads the row by URL.
    fn ensure_image_statement() -> String;

    fn query_image_by_id_statement() -> String {
        format!(
            "SELECT {} FROM images WHERE images.id = {}",
            IMAGE_COLUMNS,
            Self::placeholder(1)
        )
    }

    fn query_image_by_url_statement() -> String {
        format!(
            "SELECT {} FROM images WHERE images.webformat_url = {}",
            IMAGE_COLUMNS,
            Self::placeholder(1)
        )
    }

    /// Returns a full SELECT statement for images matching the given condition clause.
    ///
    /// # Parameters
    /// - `condition`: The SQL fragment (WHERE, ORDER BY, LIMIT...) generated by the query module.
    fn query_image_statement(condition: String) -> String {
        format!("SELECT {} FROM images {}", IMAGE_COLUMNS, condition)
    }

    /// Returns the SQL statement to count images that match the given condition.
    fn count_image_statement(condition: String) -> String {
        format!("SELECT COUNT(images.id) FROM images {}", condition)
    }

    /// Visibility predicate: public images, or images owned by the bound viewer id.
    ///
    /// Binding `NULL` as the viewer leaves only public images, since `user_id = NULL`
    /// never holds.
    fn visible_to_query(idx: usize) -> String {
        format!(
            "(images.privacy = 'PUBLIC' OR images.user_id = {})",
            Self::placeholder(idx)
        )
    }

    /// Case-insensitive substring match over tags or type.
    ///
    /// Both placeholders receive the same already-lowercased `LIKE` pattern.
    fn text_match_query(tags_idx: usize, type_idx: usize) -> String {
        format!(
            "(LOWER(images.tags) LIKE {} ESCAPE '\\' OR LOWER(images.type) LIKE {} ESCAPE '\\')",
            Self::placeholder(tags_idx),
            Self::placeholder(type_idx)
        )
    }

    fn owner_query(idx: usize) -> String {
        format!("images.user_id = {}", Self::placeholder(idx))
    }

    fn privacy_query(idx: usize) -> String {
        format!("images.privacy = {}", Self::placeholder(idx))
    }

    fn increment_likes_statement() -> String {
        format!(
            "UPDATE images SET likes = likes + 1, updated_at = {} WHERE id = {}",
            Self::placeholder(1),
            Self::placeholder(2)
        )
    }

    fn increment_comment_count_statement() -> String {
        format!(
            "UPDATE images SET comments = comments + 1, updated_at = {} WHERE id = {}",
            Self::placeholder(1),
            Self::placeholder(2)
        )
    }

    fn update_privacy_statement() -> String {
        format!(
            "UPDATE images SET privacy = {}, updated_at = {} WHERE id = {}",
            Self::placeholder(1),
            Self::placeholder(2),
            Self::placeholder(3)
        )
    }

    /// Favorites and comments go with the image through `ON DELETE CASCADE`.
    fn delete_image_statement() -> String {
        format!("DELETE FROM images WHERE id = {}", Self::placeholder(1))
    }

    // ---- favorites ----

    /// Inserts a favorite and returns its id, or no row when the pair already exists.
    fn insert_favorite_statement() -> String;

    fn exists_favorite_statement() -> String {
        format!(
            "SELECT EXISTS ( SELECT 1 FROM favorites WHERE user_id = {} AND image_id = {} )",
            Self::placeholder(1),
            Self::placeholder(2)
        )
    }

    fn delete_favorite_statement() -> String {
        format!(
            "DELETE FROM favorites WHERE user_id = {} AND image_id = {}",
            Self::placeholder(1),
            Self::placeholder(2)
        )
    }

    /// Favorite rows joined with their user and image. Favorite-level columns are
    /// aliased so they do not collide with the image's own `id`/`created_at`.
    fn favorite_select() -> String {
        format!(
            "SELECT favorites.id AS favorite_id, favorites.created_at AS favorited_at, \
             users.id AS favorite_user_id, users.username AS favorite_username, {} \
             FROM favorites \
             JOIN users ON users.id = favorites.user_id \
             JOIN images ON images.id = favorites.image_id",
            IMAGE_COLUMNS
        )
    }

    fn query_favorite_by_id_statement() -> String {
        format!(
            "{} WHERE favorites.id = {}",
            Self::favorite_select(),
            Self::placeholder(1)
        )
    }

    fn query_favorites_by_user_statement() -> String {
        format!(
            "{} WHERE favorites.user_id = {} AND {} ORDER BY favorites.created_at DESC, favorites.id DESC LIMIT {} OFFSET {}",
            Self::favorite_select(),
            Self::placeholder(1),
            Self::visible_to_query(2),
            Self::placeholder(3),
            Self::placeholder(4)
        )
    }

    fn count_favorites_by_user_statement() -> String {
        format!(
            "SELECT COUNT(favorites.id) FROM favorites JOIN images ON images.id = favorites.image_id WHERE favorites.user_id = {} AND {}",
            Self::placeholder(1),
            Self::visible_to_query(2)
        )
    }

    // ---- comments ----

    fn insert_comment_statement() -> String {
        format!(
            "INSERT INTO comments (image_id, user_id, content, created_at) VALUES ({}, {}, {}, {}) RETURNING id",
            Self::placeholder(1),
            Self::placeholder(2),
            Self::placeholder(3),
            Self::placeholder(4)
        )
    }

    fn comment_select() -> &'static str {
        "SELECT comments.id, comments.image_id, comments.content, comments.created_at, \
         users.id AS user_id, users.username \
         FROM comments JOIN users ON users.id = comments.user_id"
    }

    fn query_comment_by_id_statement() -> String {
        format!(
            "{} WHERE comments.id = {}",
            Self::comment_select(),
            Self::placeholder(1)
        )
    }

    fn query_comments_by_image_statement() -> String {
        format!(
            "{} WHERE comments.image_id = {} ORDER BY comments.created_at DESC, comments.id DESC LIMIT {} OFFSET {}",
            Self::comment_select(),
            Self::placeholder(1),
            Self::placeholder(2),
            Self::placeholder(3)
        )
    }

    fn count_comments_by_image_statement() -> String {
        format!(
            "SELECT COUNT(id) FROM comments WHERE image_id = {}",
            Self::placeholder(1)
        )
    }

    fn query_comments_by_user_statement() -> String {
        format!(
            "{} JOIN images ON images.id = comments.image_id WHERE comments.user_id = {} AND {} ORDER BY comments.created_at DESC, comments.id DESC LIMIT {} OFFSET {}",
            Self::comment_select(),
            Self::placeholder(1),
            Self::visible_to_query(2),
            Self::placeholder(3),
            Self::placeholder(4)
        )
    }

    fn count_comments_by_user_statement() -> String {
        format!(
            "SELECT COUNT(comments.id) FROM comments JOIN images ON images.id = comments.image_id WHERE comments.user_id = {} AND {}",
            Self::placeholder(1),
            Self::visible_to_query(2)
        )
    }

    // ---- categories ----

    fn insert_category_statement() -> String {
        format!(
            "INSERT INTO categories (name, description) VALUES ({}, {}) RETURNING id",
            Self::placeholder(1),
            Self::placeholder(2)
        )
    }

    /// Inserts a category only if its name is not taken yet.
    fn ensure_category_statement() -> String;

    fn query_categories_statement() -> &'static str {
        "SELECT id, name, description FROM categories ORDER BY id"
    }

    fn query_category_by_name_statement() -> String {
        format!(
            "SELECT id, name, description FROM categories WHERE name = {}",
            Self::placeholder(1)
        )
    }

    fn exists_category_statement() -> String {
        format!(
            "SELECT EXISTS ( SELECT 1 FROM categories WHERE name = {} )",
            Self::placeholder(1)
        )
    }

    fn delete_category_statement() -> String {
        format!("DELETE FROM categories WHERE id = {}", Self::placeholder(1))
    }

    // ---- search history ----

    fn insert_search_statement() -> String {
        format!(
            "INSERT INTO search_history (user_id, search_query, filters, results_count, search_date) VALUES ({}, {}, {}, {}, {}) RETURNING id",
            Self::placeholder(1),
            Self::placeholder(2),
            Self::placeholder(3),
            Self::placeholder(4),
            Self::placeholder(5)
        )
    }

    fn query_search_by_id_statement() -> String {
        format!(
            "SELECT id, user_id, search_query, filters, results_count, search_date FROM search_history WHERE id = {}",
            Self::placeholder(1)
        )
    }

    fn query_searches_by_user_statement() -> String {
        format!(
            "SELECT id, user_id, search_query, filters, results_count, search_date FROM search_history \
             WHERE user_id = {} ORDER BY search_date DESC, id DESC LIMIT {} OFFSET {}",
            Self::placeholder(1),
            Self::placeholder(2),
            Self::placeholder(3)
        )
    }

    fn count_searches_by_user_statement() -> String {
        format!(
            "SELECT COUNT(id) FROM search_history WHERE user_id = {}",
            Self::placeholder(1)
        )
    }

    fn delete_searches_by_user_statement() -> String {
        format!(
            "DELETE FROM search_history WHERE user_id = {}",
            Self::placeholder(1)
        )
    }
}
