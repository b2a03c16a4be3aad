//! Persisted records of the gallery.
//!
//! These are passive values: every mutation goes through a service function in
//! [`crate::app`], which in turn talks to [`crate::database::Database`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/// Visibility of an image.
///
/// Only `Public` images are visible to viewers other than the owner.
/// `Shared` has no share list behind it and therefore behaves like `Private`
/// for everyone but the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImagePrivacy {
    Private,
    #[default]
    Public,
    Shared,
}

impl ImagePrivacy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImagePrivacy::Private => "PRIVATE",
            ImagePrivacy::Public => "PUBLIC",
            ImagePrivacy::Shared => "SHARED",
        }
    }
}

impl Display for ImagePrivacy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImagePrivacy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PRIVATE" => Ok(ImagePrivacy::Private),
            "PUBLIC" => Ok(ImagePrivacy::Public),
            "SHARED" => Ok(ImagePrivacy::Shared),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

/// Account roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ROLE_USER")]
    User,
    #[serde(rename = "ROLE_ADMIN")]
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "ROLE_USER",
            Role::Admin => "ROLE_ADMIN",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ROLE_USER" | "USER" => Ok(Role::User),
            "ROLE_ADMIN" | "ADMIN" => Ok(Role::Admin),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown variant: {0}")]
pub struct UnknownVariant(pub String);

/// A registered account.
///
/// The password hash never leaves the process: it is skipped on serialization.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// The public face of a user, embedded in favorites and comments.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
}

/// A gallery image, either ingested from the upstream search API or uploaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: i64,
    pub external_id: Option<i64>,
    #[serde(rename = "pageURL")]
    pub page_url: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub tags: String,
    #[serde(rename = "previewURL")]
    pub preview_url: String,
    pub preview_width: Option<u32>,
    pub preview_height: Option<u32>,
    #[serde(rename = "webformatURL")]
    pub webformat_url: String,
    pub webformat_width: Option<u32>,
    pub webformat_height: Option<u32>,
    #[serde(rename = "largeImageURL")]
    pub large_image_url: String,
    #[serde(rename = "fullHDURL")]
    pub full_hd_url: Option<String>,
    #[serde(rename = "imageURL")]
    pub image_url: Option<String>,
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
    pub image_size: Option<u64>,
    pub file_name: Option<String>,
    pub original_file_name: Option<String>,
    pub views: i64,
    pub downloads: i64,
    pub likes: i64,
    pub comments: i64,
    pub user_id: Option<i64>,
    pub privacy: ImagePrivacy,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Image {
    /// Whether `viewer` may see this image.
    pub fn is_visible_to(&self, viewer: Option<i64>) -> bool {
        self.privacy == ImagePrivacy::Public
            || (viewer.is_some() && self.user_id == viewer)
    }

    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == Some(user_id)
    }
}

/// Everything needed to insert an [`Image`]; the database assigns the id and timestamps.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewImage {
    pub external_id: Option<i64>,
    pub page_url: Option<String>,
    pub kind: String,
    pub tags: String,
    pub preview_url: String,
    pub preview_width: Option<u32>,
    pub preview_height: Option<u32>,
    pub webformat_url: String,
    pub webformat_width: Option<u32>,
    pub webformat_height: Option<u32>,
    pub large_image_url: String,
    pub full_hd_url: Option<String>,
    pub image_url: Option<String>,
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
    pub image_size: Option<u64>,
    pub file_name: Option<String>,
    pub original_file_name: Option<String>,
    pub views: i64,
    pub downloads: i64,
    pub likes: i64,
    pub comments: i64,
    pub user_id: Option<i64>,
    pub privacy: ImagePrivacy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub id: i64,
    pub user: UserSummary,
    pub image: Image,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub image_id: i64,
    pub user: UserSummary,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// Topic names offered by the upstream search API, seeded at startup.
pub const DEFAULT_CATEGORIES: [&str; 20] = [
    "backgrounds",
    "fashion",
    "nature",
    "science",
    "education",
    "feelings",
    "health",
    "people",
    "religion",
    "places",
    "animals",
    "industry",
    "computer",
    "food",
    "sports",
    "transportation",
    "travel",
    "buildings",
    "business",
    "music",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHistory {
    pub id: i64,
    pub user_id: i64,
    pub search_query: String,
    pub filters: Option<String>,
    pub results_count: i64,
    pub search_date: DateTime<Utc>,
}
