use crate::{
    AppState,
    error::ApiError,
    extract::{AdminUser, PathParam, QueryParams},
};
use axum::{Json, extract::State};
use gallery::{
    app::categories::{self, CategoryNames},
    model::Category,
};
use serde::Deserialize;
use serde_json::{Value, json};

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<CategoryNames>, ApiError> {
    Ok(Json(categories::list(&state.db).await?))
}

pub async fn get_category(
    State(state): State<AppState>,
    PathParam(name): PathParam<String>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(categories::get_by_name(&state.db, &name).await?))
}

#[derive(Deserialize)]
pub struct NewCategory {
    #[serde(default)]
    name: String,
    description: Option<String>,
}

pub async fn create_category(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    QueryParams(category): QueryParams<NewCategory>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(
        categories::create(&state.db, &category.name, category.description.as_deref()).await?,
    ))
}

pub async fn delete_category(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    PathParam(id): PathParam<i64>,
) -> Result<Json<Value>, ApiError> {
    categories::delete(&state.db, id).await?;

    Ok(Json(json!({ "message": "Category deleted successfully" })))
}

pub async fn initialize_categories(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Value>, ApiError> {
    let inserted = categories::initialize_defaults(&state.db).await?;

    Ok(Json(json!({
        "message": "Categories initialized successfully",
        "inserted": inserted,
    })))
}
