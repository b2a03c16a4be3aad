use super::{AppError, image_not_found, visible_image};
use crate::{
    auth::Principal,
    database::{Database, EnsuredImage},
    model::{Image, ImagePrivacy, NewImage},
    query::{ImageQuery, ImageQueryExpr, Page, PageRequest},
    storage::Storage,
    upstream::{ExternalHit, SearchParams, UpstreamClient, normalize_image_url},
};
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_SEARCH_QUERY: &str = "camera";
pub const DEFAULT_IMAGE_TYPE: &str = "photo";
pub const DEFAULT_ORIENTATION: &str = "all";
pub const DEFAULT_SEARCH_PER_PAGE: i64 = 20;
pub const MAX_SEARCH_PER_PAGE: i64 = 200;

/// Query string of an upstream search.
///
/// Numbers are taken signed so that out of range values produce the
/// validation messages below instead of a generic parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: Option<String>,
    pub image_type: Option<String>,
    pub orientation: Option<String>,
    pub category: Option<String>,
    pub per_page: Option<i64>,
    pub page: Option<i64>,
}

impl SearchRequest {
    pub fn into_params(self) -> Result<SearchParams, AppError> {
        let query = self
            .query
            .unwrap_or_else(|| DEFAULT_SEARCH_QUERY.to_string());
        if query.trim().is_empty() {
            return Err(AppError::Validation(
                "Search query cannot be empty".to_string(),
            ));
        }

        let per_page = self.per_page.unwrap_or(DEFAULT_SEARCH_PER_PAGE);
        if !(1..=MAX_SEARCH_PER_PAGE).contains(&per_page) {
            return Err(AppError::Validation(format!(
                "perPage must be between 1 and {MAX_SEARCH_PER_PAGE}"
            )));
        }

        let page = self.page.unwrap_or(1);
        if page < 1 || page > i64::from(u32::MAX) {
            return Err(AppError::Validation(
                "page must be greater than 0".to_string(),
            ));
        }

        let or_default = |value: Option<String>, default: &str| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Ok(SearchParams {
            query: query.trim().to_string(),
            image_type: or_default(self.image_type, DEFAULT_IMAGE_TYPE),
            orientation: or_default(self.orientation, DEFAULT_ORIENTATION),
            category: self.category,
            per_page: per_page as u32,
            page: page as u32,
        })
    }
}

/// Result of an upstream search after ingestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSearch {
    pub data: Vec<Image>,
    pub total: usize,
    pub total_hits: u64,
}

/// Searches the upstream API and stores every new hit.
///
/// Hits whose URL is already stored come back as the existing row. A search
/// by an authenticated caller that returned something is recorded in the
/// caller's history; failing to record it does not fail the search.
pub async fn search_external(
    db: &Database,
    upstream: &UpstreamClient,
    principal: Option<&Principal>,
    request: SearchRequest,
) -> Result<ExternalSearch, AppError> {
    let params = request.into_params()?;

    let result = upstream.search(&params).await?;
    let ensured = db.ensure_images(&result.hits).await?;

    let created = ensured.iter().filter(|e| e.created).count();
    let viewer = principal.map(|p| p.user_id);
    let data: Vec<Image> = ensured
        .into_iter()
        .map(|e| e.image)
        .filter(|image| image.is_visible_to(viewer))
        .collect();

    tracing::info!(
        query = %params.query,
        hits = data.len(),
        created,
        "upstream search"
    );

    if let Some(principal) = principal {
        if !data.is_empty() {
            let filters = params.filters_summary();
            if let Err(e) = db
                .add_search(
                    principal.user_id,
                    &params.query,
                    Some(&filters),
                    data.len() as i64,
                )
                .await
            {
                tracing::error!(error = %e, user_id = principal.user_id, "failed to record search");
            }
        }
    }

    Ok(ExternalSearch {
        total: data.len(),
        total_hits: result.total_hits,
        data,
    })
}

async fn page_of(
    db: &Database,
    viewer: Option<i64>,
    filter: Option<ImageQueryExpr>,
    page: PageRequest,
) -> Result<Page<Image>, AppError> {
    let query = ImageQuery::visible_to(viewer, filter);
    let total = db.count_image(&query).await?;
    let content = db
        .query_image(&query.with_limit(page.limit()).with_offset(page.offset()))
        .await?;

    Ok(Page::new(content, page, total))
}

/// Lists the images `viewer` may see, optionally narrowed to one privacy level.
pub async fn list_images(
    db: &Database,
    viewer: Option<&Principal>,
    privacy: Option<ImagePrivacy>,
    page: PageRequest,
) -> Result<Page<Image>, AppError> {
    page_of(
        db,
        viewer.map(|p| p.user_id),
        privacy.map(ImageQueryExpr::privacy),
        page,
    )
    .await
}

/// Case insensitive substring search over tags and type.
pub async fn search_local(
    db: &Database,
    viewer: Option<&Principal>,
    query: &str,
    page: PageRequest,
) -> Result<Page<Image>, AppError> {
    if query.trim().is_empty() {
        return Err(AppError::Validation(
            "Search query cannot be empty".to_string(),
        ));
    }

    page_of(
        db,
        viewer.map(|p| p.user_id),
        Some(ImageQueryExpr::text(query)),
        page,
    )
    .await
}

/// The caller's own images, whatever their privacy.
pub async fn my_images(
    db: &Database,
    principal: &Principal,
    page: PageRequest,
) -> Result<Page<Image>, AppError> {
    page_of(
        db,
        Some(principal.user_id),
        Some(ImageQueryExpr::owner(principal.user_id)),
        page,
    )
    .await
}

pub async fn image_by_id(
    db: &Database,
    viewer: Option<&Principal>,
    id: i64,
) -> Result<Image, AppError> {
    visible_image(db, id, viewer).await
}

/// Looks an image up by its dedup key.
pub async fn image_by_url(
    db: &Database,
    viewer: Option<&Principal>,
    url: &str,
) -> Result<Image, AppError> {
    let not_found = || AppError::NotFound(format!("Image not found with url: {}", url.trim()));

    let Ok(key) = normalize_image_url(url) else {
        return Err(not_found());
    };

    db.get_image_by_url(&key)
        .await?
        .filter(|image| image.is_visible_to(viewer.map(|p| p.user_id)))
        .ok_or_else(not_found)
}

/// Stores an image description supplied by the client.
///
/// Saving the same URL twice returns the first row with `created == false`.
/// An existing row the caller cannot see is reported as missing.
pub async fn save_external(
    db: &Database,
    principal: &Principal,
    hit: ExternalHit,
) -> Result<EnsuredImage, AppError> {
    let image = hit
        .into_saved_image()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let ensured = db.ensure_image(&image).await?;
    if ensured.created {
        tracing::info!(image_id = ensured.image.id, "saved external image");
    } else if !ensured.image.is_visible_to(Some(principal.user_id)) {
        return Err(AppError::NotFound(format!(
            "Image not found with url: {}",
            image.webformat_url
        )));
    }

    Ok(ensured)
}

/// Represents an upload of raw image bytes by an authenticated user.
///
/// Use `with_original_name` and `with_privacy` before calling `execute()`.
pub struct UploadImageCommand {
    pub bytes: Vec<u8>,
    pub original_name: Option<String>,
    pub privacy: ImagePrivacy,
}

impl UploadImageCommand {
    pub fn new(bytes: &[u8]) -> Self {
        UploadImageCommand {
            bytes: bytes.to_vec(),
            original_name: None,
            privacy: ImagePrivacy::Public,
        }
    }

    /// Records the client's file name. Only the last path component is kept.
    pub fn with_original_name(mut self, name: &str) -> Self {
        let name = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
        self.original_name = (!name.is_empty()).then(|| name.to_string());
        self
    }

    pub fn with_privacy(mut self, privacy: ImagePrivacy) -> Self {
        self.privacy = privacy;
        self
    }

    /// Stores the file and inserts an image row owned by `owner`.
    ///
    /// The stored file is removed again if the row cannot be inserted.
    pub async fn execute(
        self,
        storage: &Storage,
        db: &Database,
        owner: &Principal,
        public_base_url: &Url,
    ) -> Result<Image, AppError> {
        let stored = storage.create_file(&self.bytes)?;
        let url = upload_url(public_base_url, &stored.file_name);

        let image = NewImage {
            kind: "photo".to_string(),
            preview_url: url.clone(),
            webformat_url: url.clone(),
            webformat_width: Some(stored.width),
            webformat_height: Some(stored.height),
            large_image_url: url.clone(),
            image_url: Some(url),
            image_width: Some(stored.width),
            image_height: Some(stored.height),
            image_size: Some(stored.size),
            file_name: Some(stored.file_name.clone()),
            original_file_name: self.original_name,
            user_id: Some(owner.user_id),
            privacy: self.privacy,
            ..NewImage::default()
        };

        match db.ensure_image(&image).await {
            Ok(ensured) => {
                tracing::info!(
                    image_id = ensured.image.id,
                    user_id = owner.user_id,
                    file_name = %stored.file_name,
                    "stored upload"
                );
                Ok(ensured.image)
            }
            Err(e) => {
                storage.ensure_deleted(&stored.file_name)?;
                Err(e.into())
            }
        }
    }
}

/// Public URL under which an uploaded file is served.
pub fn upload_url(public_base_url: &Url, file_name: &str) -> String {
    format!(
        "{}/api/images/uploads/{file_name}",
        public_base_url.as_str().trim_end_matches('/')
    )
}

/// Adds one like and returns the updated image. Repeated likes all count.
pub async fn like_image(
    db: &Database,
    principal: &Principal,
    id: i64,
) -> Result<Image, AppError> {
    visible_image(db, id, Some(principal)).await?;

    if !db.increment_likes(id).await? {
        return Err(image_not_found(id));
    }

    visible_image(db, id, Some(principal)).await
}

/// Changes the privacy of one of the caller's images.
pub async fn set_privacy(
    db: &Database,
    principal: &Principal,
    id: i64,
    privacy: ImagePrivacy,
) -> Result<Image, AppError> {
    let image = visible_image(db, id, Some(principal)).await?;
    if !image.is_owned_by(principal.user_id) {
        return Err(AppError::Forbidden(
            "You can only change the privacy of your own images".to_string(),
        ));
    }

    if !db.update_privacy(id, privacy).await? {
        return Err(image_not_found(id));
    }
    tracing::info!(image_id = id, %privacy, "changed image privacy");

    db.get_image(id).await?.ok_or_else(|| image_not_found(id))
}

/// Deletes an image, its favorites and comments, and its uploaded file.
///
/// Owners may delete their images and admins may delete any image.
pub async fn delete_image(
    db: &Database,
    storage: &Storage,
    principal: &Principal,
    id: i64,
) -> Result<(), AppError> {
    let image = db.get_image(id).await?.ok_or_else(|| image_not_found(id))?;

    if !image.is_owned_by(principal.user_id) && !principal.is_admin() {
        if !image.is_visible_to(Some(principal.user_id)) {
            return Err(image_not_found(id));
        }
        return Err(AppError::Forbidden(
            "You can only delete your own images".to_string(),
        ));
    }

    if !db.delete_image(id).await? {
        return Err(image_not_found(id));
    }

    if let Some(file_name) = &image.file_name {
        if let Err(e) = storage.ensure_deleted(file_name) {
            tracing::warn!(image_id = id, file_name = %file_name, error = %e, "failed to remove uploaded file");
        }
    }

    tracing::info!(image_id = id, user_id = principal.user_id, "deleted image");

    Ok(())
}

/// Reads an uploaded file for serving. Returns the bytes and their MIME type.
pub fn serve_upload(storage: &Storage, file_name: &str) -> Result<(Vec<u8>, String), AppError> {
    Ok(storage.read_file(file_name)?)
}

#[cfg(test)]
mod tests {
    use super::{
        SearchRequest, UploadImageCommand, delete_image, image_by_url, like_image, list_images,
        my_images, save_external, search_external, search_local, serve_upload, set_privacy,
    };
    use crate::{
        app::{AppError, tests::principal},
        database::tests::{get_database, new_image},
        model::{ImagePrivacy, Role},
        query::PageRequest,
        storage::{Storage, StorageError, tests::png_bytes},
        upstream::{
            ExternalHit, UpstreamClient,
            tests::{hit, spawn_api},
        },
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;
    use url::Url;

    fn search(query: &str) -> SearchRequest {
        SearchRequest {
            query: Some(query.to_string()),
            ..SearchRequest::default()
        }
    }

    #[test]
    fn test_search_request_validation() {
        let params = SearchRequest::default().into_params().unwrap();
        assert_eq!("camera", params.query);
        assert_eq!("photo", params.image_type);
        assert_eq!("all", params.orientation);
        assert_eq!((20, 1), (params.per_page, params.page));

        let message = |request: SearchRequest| match request.into_params() {
            Err(AppError::Validation(message)) => message,
            other => panic!("unexpected result: {other:?}"),
        };

        assert_eq!("Search query cannot be empty", message(search("  ")));
        assert_eq!(
            "perPage must be between 1 and 200",
            message(SearchRequest {
                per_page: Some(201),
                ..search("cats")
            })
        );
        assert_eq!(
            "perPage must be between 1 and 200",
            message(SearchRequest {
                per_page: Some(0),
                ..search("cats")
            })
        );
        assert_eq!(
            "page must be greater than 0",
            message(SearchRequest {
                page: Some(0),
                ..search("cats")
            })
        );
    }

    #[tokio::test]
    async fn test_search_external_dedups_and_records_history() {
        let db = get_database().await;
        let alice = principal(&db, "alice", &[Role::User]).await;
        let (url, _) = spawn_api(
            StatusCode::OK,
            json!({
                "total": 500,
                "totalHits": 500,
                "hits": [
                    hit(1, "https://cdn.example.com/1.jpg"),
                    hit(2, "https://cdn.example.com/2.jpg"),
                ]
            }),
        )
        .await;
        let upstream = UpstreamClient::new(url, "key".to_string(), Duration::from_secs(5)).unwrap();

        let first = search_external(&db, &upstream, Some(&alice), search("cats"))
            .await
            .unwrap();
        let second = search_external(&db, &upstream, None, search("cats"))
            .await
            .unwrap();

        assert_eq!(2, first.total);
        assert_eq!(500, first.total_hits);
        assert_eq!(
            first.data.iter().map(|i| i.id).collect::<Vec<_>>(),
            second.data.iter().map(|i| i.id).collect::<Vec<_>>()
        );

        let page = list_images(&db, None, None, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(2, page.total_elements);

        let history = db
            .get_searches(alice.user_id, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(1, history.total_elements);
        assert_eq!("cats", history.content[0].search_query);
        assert_eq!(2, history.content[0].results_count);
        assert_eq!(
            Some("type=photo, orientation=all".to_string()),
            history.content[0].filters
        );
    }

    #[tokio::test]
    async fn test_search_external_without_hits_records_nothing() {
        let db = get_database().await;
        let alice = principal(&db, "alice", &[Role::User]).await;
        let (url, _) = spawn_api(StatusCode::OK, json!({ "totalHits": 0, "hits": [] })).await;
        let upstream = UpstreamClient::new(url, "key".to_string(), Duration::from_secs(5)).unwrap();

        let result = search_external(&db, &upstream, Some(&alice), search("nothing"))
            .await
            .unwrap();

        assert!(result.data.is_empty());
        let history = db
            .get_searches(alice.user_id, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(0, history.total_elements);
    }

    #[tokio::test]
    async fn test_search_external_upstream_failure() {
        let db = get_database().await;
        let (url, _) = spawn_api(StatusCode::BAD_GATEWAY, json!({})).await;
        let upstream = UpstreamClient::new(url, "key".to_string(), Duration::from_secs(5)).unwrap();

        assert!(matches!(
            search_external(&db, &upstream, None, search("cats")).await,
            Err(AppError::Upstream(_))
        ));
        let page = list_images(&db, None, None, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(0, page.total_elements);
    }

    #[tokio::test]
    async fn test_listing_respects_visibility() {
        let db = get_database().await;
        let alice = principal(&db, "alice", &[Role::User]).await;
        let bob = principal(&db, "bob", &[Role::User]).await;
        for (url, privacy) in [
            ("https://cdn.example.com/public.jpg", ImagePrivacy::Public),
            ("https://cdn.example.com/private.jpg", ImagePrivacy::Private),
            ("https://cdn.example.com/shared.jpg", ImagePrivacy::Shared),
        ] {
            db.ensure_image(&new_image(url, Some(alice.user_id), privacy))
                .await
                .unwrap();
        }

        let total = |page: crate::query::Page<_>| page.total_elements;
        let all = PageRequest::default();

        assert_eq!(3, total(list_images(&db, Some(&alice), None, all).await.unwrap()));
        assert_eq!(1, total(list_images(&db, Some(&bob), None, all).await.unwrap()));
        assert_eq!(1, total(list_images(&db, None, None, all).await.unwrap()));
        assert_eq!(
            0,
            total(
                list_images(&db, Some(&bob), Some(ImagePrivacy::Private), all)
                    .await
                    .unwrap()
            )
        );
        assert_eq!(3, total(my_images(&db, &alice, all).await.unwrap()));
        assert_eq!(0, total(my_images(&db, &bob, all).await.unwrap()));
        assert_eq!(1, total(search_local(&db, None, "KITTEN", all).await.unwrap()));
        assert!(matches!(
            search_local(&db, None, " ", all).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_save_external_is_idempotent() {
        let db = get_database().await;
        let hit = ExternalHit {
            large_image_url: Some("https://cdn.example.com/large.jpg".to_string()),
            tags: Some("sea".to_string()),
            ..ExternalHit::default()
        };

        let bob = principal(&db, "bob", &[Role::User]).await;
        let first = save_external(&db, &bob, hit.clone()).await.unwrap();
        let second = save_external(&db, &bob, hit).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.image.id, second.image.id);
        assert_eq!("https://cdn.example.com/large.jpg", first.image.webformat_url);
        assert_eq!(None, first.image.user_id);
        assert_eq!(ImagePrivacy::Public, first.image.privacy);

        let found = image_by_url(&db, None, " https://CDN.example.com/large.jpg#top ")
            .await
            .unwrap();
        assert_eq!(first.image.id, found.id);

        assert!(matches!(
            save_external(&db, &bob, ExternalHit::default()).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_save_external_keeps_hidden_rows_hidden() {
        let db = get_database().await;
        let alice = principal(&db, "alice", &[Role::User]).await;
        let bob = principal(&db, "bob", &[Role::User]).await;
        let private = db
            .ensure_image(&new_image(
                "https://cdn.example.com/private.jpg",
                Some(alice.user_id),
                ImagePrivacy::Private,
            ))
            .await
            .unwrap()
            .image;
        let hit = ExternalHit {
            webformat_url: Some(private.webformat_url.clone()),
            ..ExternalHit::default()
        };

        match save_external(&db, &bob, hit.clone()).await {
            Err(AppError::NotFound(message)) => assert_eq!(
                "Image not found with url: https://cdn.example.com/private.jpg",
                message
            ),
            other => panic!("unexpected result: {other:?}"),
        }

        let own = save_external(&db, &alice, hit).await.unwrap();
        assert!(!own.created);
        assert_eq!(private.id, own.image.id);
        assert_eq!(ImagePrivacy::Private, own.image.privacy);
    }

    #[tokio::test]
    async fn test_upload_like_privacy_and_delete() {
        let db = get_database().await;
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        let base = Url::parse("http://localhost:8080/").unwrap();
        let alice = principal(&db, "alice", &[Role::User]).await;
        let bob = principal(&db, "bob", &[Role::User]).await;
        let admin = principal(&db, "root", &[Role::User, Role::Admin]).await;

        let image = UploadImageCommand::new(&png_bytes(8, 6))
            .with_original_name("C:\\photos\\holiday.png")
            .with_privacy(ImagePrivacy::Private)
            .execute(&storage, &db, &alice, &base)
            .await
            .unwrap();

        let file_name = image.file_name.clone().unwrap();
        assert_eq!(Some("holiday.png".to_string()), image.original_file_name);
        assert_eq!(
            format!("http://localhost:8080/api/images/uploads/{file_name}"),
            image.webformat_url
        );
        assert_eq!((Some(8), Some(6)), (image.image_width, image.image_height));
        assert_eq!(Some(alice.user_id), image.user_id);
        assert!(serve_upload(&storage, &file_name).is_ok());

        // Hidden from bob until made public.
        assert!(matches!(
            like_image(&db, &bob, image.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            set_privacy(&db, &bob, image.id, ImagePrivacy::Public).await,
            Err(AppError::NotFound(_))
        ));

        let public = set_privacy(&db, &alice, image.id, ImagePrivacy::Public)
            .await
            .unwrap();
        assert_eq!(ImagePrivacy::Public, public.privacy);

        assert!(matches!(
            set_privacy(&db, &bob, image.id, ImagePrivacy::Private).await,
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(1, like_image(&db, &bob, image.id).await.unwrap().likes);
        assert_eq!(2, like_image(&db, &bob, image.id).await.unwrap().likes);

        assert!(matches!(
            delete_image(&db, &storage, &bob, image.id).await,
            Err(AppError::Forbidden(_))
        ));
        delete_image(&db, &storage, &admin, image.id).await.unwrap();

        assert!(db.get_image(image.id).await.unwrap().is_none());
        assert!(matches!(
            serve_upload(&storage, &file_name),
            Err(AppError::Storage(StorageError::FileNotFound { .. }))
        ));
        assert!(matches!(
            delete_image(&db, &storage, &alice, image.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_rejects_non_images() {
        let db = get_database().await;
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        let alice = principal(&db, "alice", &[Role::User]).await;
        let base = Url::parse("http://localhost:8080").unwrap();

        assert!(matches!(
            UploadImageCommand::new(b"plain text")
                .execute(&storage, &db, &alice, &base)
                .await,
            Err(AppError::Storage(StorageError::UnsupportedFile { .. }))
        ));
        assert_eq!(0, std::fs::read_dir(dir.path()).unwrap().count());
    }
}
