use super::{Db, Dialect};

/// SQLite dialect implementation of the `Dialect` trait.
#[cfg(feature = "sqlite")]
pub struct SqliteDialect;

#[cfg(feature = "sqlite")]
impl Dialect for SqliteDialect {
    fn placeholder(_idx: usize) -> String {
        "?".to_string()
    }

    async fn migration(pool: &sqlx::Pool<Db>) -> Result<(), sqlx::Error> {
        let stmts = vec![
            r#"CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );"#,
            r#"CREATE TABLE IF NOT EXISTS user_roles (
                user_id INTEGER NOT NULL,
                role TEXT NOT NULL,
                PRIMARY KEY (user_id, role),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );"#,
            r#"CREATE TABLE IF NOT EXISTS images (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                external_id INTEGER,
                page_url TEXT,
                type TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '',
                preview_url TEXT NOT NULL,
                preview_width INTEGER,
                preview_height INTEGER,
                webformat_url TEXT NOT NULL UNIQUE,
                webformat_width INTEGER,
                webformat_height INTEGER,
                large_image_url TEXT NOT NULL,
                fullhd_url TEXT,
                image_url TEXT,
                image_width INTEGER,
                image_height INTEGER,
                image_size INTEGER,
                file_name TEXT,
                original_file_name TEXT,
                views INTEGER NOT NULL DEFAULT 0,
                downloads INTEGER NOT NULL DEFAULT 0,
                likes INTEGER NOT NULL DEFAULT 0,
                comments INTEGER NOT NULL DEFAULT 0,
                user_id INTEGER,
                privacy TEXT NOT NULL DEFAULT 'PUBLIC',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE SET NULL
            );"#,
            r#"CREATE INDEX IF NOT EXISTS images_user_id ON images (user_id);"#,
            r#"CREATE TABLE IF NOT EXISTS favorites (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                image_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (user_id, image_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (image_id) REFERENCES images(id) ON DELETE CASCADE
            );"#,
            r#"CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                image_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (image_id) REFERENCES images(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );"#,
            r#"CREATE INDEX IF NOT EXISTS comments_image_id ON comments (image_id);"#,
            r#"CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT
            );"#,
            r#"CREATE TABLE IF NOT EXISTS search_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                search_query TEXT NOT NULL,
                filters TEXT,
                results_count INTEGER NOT NULL DEFAULT 0,
                search_date TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );"#,
        ];

        for stmt in stmts {
            sqlx::query(stmt).execute(pool).await?;
        }

        Ok(())
    }

    fn ensure_user_role_statement() -> String {
        "INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?, ?)".to_string()
    }

    fn ensure_image_statement() -> String {
        r#"INSERT INTO images
            (external_id, page_url, type, tags, preview_url, preview_width, preview_height,
             webformat_url, webformat_width, webformat_height, large_image_url, fullhd_url,
             image_url, image_width, image_height, image_size, file_name, original_file_name,
             views, downloads, likes, comments, user_id, privacy, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (webformat_url) DO NOTHING"#
            .to_string()
    }

    fn insert_favorite_statement() -> String {
        "INSERT INTO favorites (user_id, image_id, created_at) VALUES (?, ?, ?) ON CONFLICT (user_id, image_id) DO NOTHING RETURNING id".to_string()
    }

    fn ensure_category_statement() -> String {
        "INSERT OR IGNORE INTO categories (name, description) VALUES (?, ?)".to_string()
    }
}
