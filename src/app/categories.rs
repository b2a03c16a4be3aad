use super::AppError;
use crate::{
    database::Database,
    model::{Category, DEFAULT_CATEGORIES},
};
use serde::Serialize;

/// Category names as listed publicly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryNames {
    pub data: Vec<String>,
    pub total: usize,
}

pub async fn list(db: &Database) -> Result<CategoryNames, AppError> {
    let data: Vec<String> = db
        .get_categories()
        .await?
        .into_iter()
        .map(|c| c.name)
        .collect();

    Ok(CategoryNames {
        total: data.len(),
        data,
    })
}

pub async fn get_by_name(db: &Database, name: &str) -> Result<Category, AppError> {
    db.get_category_by_name(name.trim())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Category not found: {}", name.trim())))
}

pub async fn create(
    db: &Database,
    name: &str,
    description: Option<&str>,
) -> Result<Category, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation(
            "Category name cannot be empty".to_string(),
        ));
    }

    let conflict = || AppError::Conflict(format!("Category already exists: {name}"));
    if db.category_exists(name).await? {
        return Err(conflict());
    }

    let description = description.map(str::trim).filter(|d| !d.is_empty());
    let category = db
        .create_category(name, description)
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                conflict()
            } else {
                e.into()
            }
        })?;

    tracing::info!(category_id = category.id, name = %category.name, "created category");

    Ok(category)
}

pub async fn delete(db: &Database, id: i64) -> Result<(), AppError> {
    if !db.delete_category(id).await? {
        return Err(AppError::NotFound(format!("Category not found with id: {id}")));
    }

    tracing::info!(category_id = id, "deleted category");

    Ok(())
}

/// Seeds the default topics. Safe to call repeatedly; returns how many were new.
pub async fn initialize_defaults(db: &Database) -> Result<u64, AppError> {
    let defaults: Vec<(String, String)> = DEFAULT_CATEGORIES
        .iter()
        .map(|name| (name.to_string(), format!("{name} category")))
        .collect();

    let inserted = db.ensure_categories(&defaults).await?;
    if inserted > 0 {
        tracing::info!(inserted, "seeded default categories");
    }

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::{create, delete, get_by_name, initialize_defaults, list};
    use crate::{app::AppError, database::tests::get_database};

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let db = get_database().await;

        assert_eq!(20, initialize_defaults(&db).await.unwrap());
        assert_eq!(0, initialize_defaults(&db).await.unwrap());

        let names = list(&db).await.unwrap();
        assert_eq!(20, names.total);
        assert_eq!("backgrounds", names.data[0]);

        let nature = get_by_name(&db, "nature").await.unwrap();
        assert_eq!(Some("nature category".to_string()), nature.description);
    }

    #[tokio::test]
    async fn test_create_and_delete() {
        let db = get_database().await;

        let category = create(&db, " wildlife ", Some("Wild animals")).await.unwrap();
        assert_eq!("wildlife", category.name);

        match create(&db, "wildlife", None).await {
            Err(AppError::Conflict(message)) => {
                assert_eq!("Category already exists: wildlife", message)
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(
            create(&db, "  ", None).await,
            Err(AppError::Validation(_))
        ));

        delete(&db, category.id).await.unwrap();
        assert!(matches!(
            delete(&db, category.id).await,
            Err(AppError::NotFound(_))
        ));
        match get_by_name(&db, "wildlife").await {
            Err(AppError::NotFound(message)) => assert_eq!("Category not found: wildlife", message),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
