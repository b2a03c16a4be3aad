use crate::{
    AppState,
    error::ApiError,
    extract::{CurrentUser, JsonBody, MaybeUser, Paging, PathParam, QueryParams},
};
use axum::{
    Json,
    extract::{Multipart, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use bytes::BytesMut;
use futures::TryStreamExt;
use gallery::{
    app::images::{self, ExternalSearch, SearchRequest, UploadImageCommand},
    model::{Image, ImagePrivacy},
    query::Page,
    upstream::ExternalHit,
};
use serde::Deserialize;
use serde_json::{Value, json};

/// Upload bodies above this size are rejected before reaching the handler.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

fn parse_privacy(raw: &str) -> Result<ImagePrivacy, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid privacy: {raw}")))
}

#[derive(Deserialize)]
pub struct PrivacyFilter {
    privacy: Option<String>,
}

pub async fn list_images(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Paging(page): Paging,
    QueryParams(filter): QueryParams<PrivacyFilter>,
) -> Result<Json<Page<Image>>, ApiError> {
    let privacy = filter.privacy.as_deref().map(parse_privacy).transpose()?;

    Ok(Json(
        images::list_images(&state.db, viewer.principal(), privacy, page).await?,
    ))
}

pub async fn search_images(
    State(state): State<AppState>,
    viewer: MaybeUser,
    QueryParams(request): QueryParams<SearchRequest>,
) -> Result<Json<ExternalSearch>, ApiError> {
    Ok(Json(
        images::search_external(&state.db, &state.upstream, viewer.principal(), request).await?,
    ))
}

#[derive(Deserialize)]
pub struct LocalQuery {
    #[serde(default)]
    query: String,
}

pub async fn search_local(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Paging(page): Paging,
    QueryParams(local): QueryParams<LocalQuery>,
) -> Result<Json<Page<Image>>, ApiError> {
    Ok(Json(
        images::search_local(&state.db, viewer.principal(), &local.query, page).await?,
    ))
}

pub async fn my_images(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Paging(page): Paging,
) -> Result<Json<Page<Image>>, ApiError> {
    Ok(Json(images::my_images(&state.db, &principal, page).await?))
}

pub async fn get_image(
    State(state): State<AppState>,
    viewer: MaybeUser,
    PathParam(id): PathParam<i64>,
) -> Result<Json<Image>, ApiError> {
    Ok(Json(
        images::image_by_id(&state.db, viewer.principal(), id).await?,
    ))
}

#[derive(Deserialize)]
pub struct UrlQuery {
    url: String,
}

pub async fn get_image_by_url(
    State(state): State<AppState>,
    viewer: MaybeUser,
    QueryParams(query): QueryParams<UrlQuery>,
) -> Result<Json<Image>, ApiError> {
    Ok(Json(
        images::image_by_url(&state.db, viewer.principal(), &query.url).await?,
    ))
}

pub async fn upload_image(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Image>), ApiError> {
    let bad_request = |e: axum::extract::multipart::MultipartError| ApiError::BadRequest(e.body_text());

    let mut bytes = None;
    let mut original_name = None;
    let mut privacy = ImagePrivacy::Public;

    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "file" => {
                original_name = field.file_name().map(str::to_string);
                let mut data = BytesMut::new();
                let mut stream = field.into_stream();
                while let Some(chunk) = stream.try_next().await.map_err(bad_request)? {
                    data.extend_from_slice(&chunk);
                }
                bytes = Some(data.freeze());
            }
            "privacy" => {
                let text = field.text().await.map_err(bad_request)?;
                if !text.trim().is_empty() {
                    privacy = parse_privacy(&text)?;
                }
            }
            _ => {} // ignore
        }
    }

    let bytes = match bytes {
        Some(b) if !b.is_empty() => b,
        _ => return Err(ApiError::BadRequest("Please select a file to upload".to_string())),
    };

    let cmd = UploadImageCommand::new(&bytes).with_privacy(privacy);
    let cmd = if let Some(name) = original_name {
        cmd.with_original_name(&name)
    } else {
        cmd
    };

    let image = cmd
        .execute(
            &state.storage,
            &state.db,
            &principal,
            &state.config.public_base_url,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(image)))
}

pub async fn serve_upload(
    State(state): State<AppState>,
    PathParam(file_name): PathParam<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (bytes, mime_type) = images::serve_upload(&state.storage, &file_name)?;

    Ok(([(header::CONTENT_TYPE, mime_type)], bytes))
}

/// 201 for a new row, 200 when the URL was already stored.
pub async fn save_external(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    JsonBody(hit): JsonBody<ExternalHit>,
) -> Result<(StatusCode, Json<Image>), ApiError> {
    let ensured = images::save_external(&state.db, &principal, hit).await?;
    let status = if ensured.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(ensured.image)))
}

pub async fn like_image(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    PathParam(id): PathParam<i64>,
) -> Result<Json<Image>, ApiError> {
    Ok(Json(images::like_image(&state.db, &principal, id).await?))
}

#[derive(Deserialize)]
pub struct PrivacyBody {
    privacy: String,
}

pub async fn set_privacy(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    PathParam(id): PathParam<i64>,
    JsonBody(body): JsonBody<PrivacyBody>,
) -> Result<Json<Image>, ApiError> {
    let privacy = parse_privacy(&body.privacy)?;

    Ok(Json(
        images::set_privacy(&state.db, &principal, id, privacy).await?,
    ))
}

pub async fn delete_image(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    PathParam(id): PathParam<i64>,
) -> Result<Json<Value>, ApiError> {
    images::delete_image(&state.db, &state.storage, &principal, id).await?;

    Ok(Json(json!({ "message": "Image deleted successfully" })))
}
