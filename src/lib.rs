//! # Image Gallery Backend
//!
//! This crate provides the core of an image gallery: user accounts with bearer
//! tokens, images ingested from a third-party search API or uploaded by users,
//! per-image privacy, favorites, comments, categories and per-user search history.
//!
//! ## Features
//!
//! - **External search ingestion**: upstream hits are stored on the fly and
//!   deduplicated by their normalized display URL.
//! - **Uploads**: raw bytes are sniffed, measured and written under a generated name.
//! - **Privacy**: every listing only returns images the caller is allowed to see.
//! - **Accounts**: bcrypt password hashes and HS256 tokens, no server side session.
//!
//! ## Usage
//!
//! The HTTP surface lives in the `web` binary and administration tasks in the
//! `cli` binary. Both are thin layers over the service functions in [`app`].
//!
//! ```no_run
//! use gallery::prelude::*;
//! use gallery::app::images::UploadImageCommand;
//! use url::Url;
//!
//! async fn upload(storage: &Storage, db: &Database, owner: &Principal, bytes: &[u8]) {
//!     let base = Url::parse("http://localhost:8080").unwrap();
//!     let command = UploadImageCommand::new(bytes)
//!         .with_original_name("sunset.png")
//!         .with_privacy(ImagePrivacy::Private);
//!
//!     match command.execute(storage, db, owner, &base).await {
//!         Ok(image) => println!("Stored image {} at {}", image.id, image.webformat_url),
//!         Err(error) => eprintln!("Failed to store image: {}", error),
//!     }
//! }
//! ```

pub mod app;
pub mod auth;
pub mod config;
pub mod database;
mod dialect;
pub mod model;
pub mod query;
pub mod storage;
pub mod upstream;

pub mod prelude {
    pub use crate::app::AppError;
    pub use crate::auth::{Principal, TokenKeys};
    pub use crate::config::AppConfig;
    pub use crate::database::Database;
    pub use crate::model::{Image, ImagePrivacy, Role};
    pub use crate::storage::Storage;
    pub use crate::upstream::UpstreamClient;
}
