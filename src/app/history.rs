use super::AppError;
use crate::{
    auth::Principal,
    database::Database,
    model::SearchHistory,
    query::{Page, PageRequest},
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSearchRequest {
    pub search_query: String,
    pub filters: Option<String>,
    #[serde(default)]
    pub results_count: i64,
}

pub async fn save(
    db: &Database,
    principal: &Principal,
    request: SaveSearchRequest,
) -> Result<SearchHistory, AppError> {
    let query = request.search_query.trim();
    if query.is_empty() {
        return Err(AppError::Validation(
            "Search query cannot be empty".to_string(),
        ));
    }
    if request.results_count < 0 {
        return Err(AppError::Validation(
            "resultsCount cannot be negative".to_string(),
        ));
    }

    let filters = request
        .filters
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty());

    Ok(db
        .add_search(principal.user_id, query, filters, request.results_count)
        .await?)
}

pub async fn list(
    db: &Database,
    principal: &Principal,
    page: PageRequest,
) -> Result<Page<SearchHistory>, AppError> {
    Ok(db.get_searches(principal.user_id, page).await?)
}

/// Deletes all of the caller's searches and returns how many there were.
pub async fn clear(db: &Database, principal: &Principal) -> Result<u64, AppError> {
    let removed = db.clear_searches(principal.user_id).await?;
    tracing::info!(user_id = principal.user_id, removed, "cleared search history");

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::{SaveSearchRequest, clear, list, save};
    use crate::{
        app::{AppError, tests::principal},
        database::tests::get_database,
        model::Role,
        query::PageRequest,
    };

    fn request(query: &str, results_count: i64) -> SaveSearchRequest {
        SaveSearchRequest {
            search_query: query.to_string(),
            filters: Some("type=photo, orientation=all".to_string()),
            results_count,
        }
    }

    #[tokio::test]
    async fn test_save_list_clear() {
        let db = get_database().await;
        let alice = principal(&db, "alice", &[Role::User]).await;
        let bob = principal(&db, "bob", &[Role::User]).await;

        save(&db, &alice, request("cats", 3)).await.unwrap();
        let latest = save(&db, &alice, request(" dogs ", 0)).await.unwrap();
        save(&db, &bob, request("birds", 1)).await.unwrap();
        assert_eq!("dogs", latest.search_query);

        let page = list(&db, &alice, PageRequest::default()).await.unwrap();
        assert_eq!(2, page.total_elements);
        assert_eq!(latest.id, page.content[0].id);

        assert_eq!(2, clear(&db, &alice).await.unwrap());
        assert_eq!(0, list(&db, &alice, PageRequest::default()).await.unwrap().total_elements);
        assert_eq!(1, list(&db, &bob, PageRequest::default()).await.unwrap().total_elements);
    }

    #[tokio::test]
    async fn test_validation() {
        let db = get_database().await;
        let alice = principal(&db, "alice", &[Role::User]).await;

        assert!(matches!(
            save(&db, &alice, request("  ", 1)).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            save(&db, &alice, request("cats", -1)).await,
            Err(AppError::Validation(_))
        ));
    }
}
