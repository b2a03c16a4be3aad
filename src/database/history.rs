use super::{Database, DatabaseError, DbOperation, query_failed, to_timestamp};
use crate::{
    dialect::{CurrentDialect, Dialect},
    model::SearchHistory,
    query::{Page, PageRequest},
};
use chrono::Utc;

impl Database {
    pub async fn add_search(
        &self,
        user_id: i64,
        search_query: &str,
        filters: Option<&str>,
        results_count: i64,
    ) -> Result<SearchHistory, DatabaseError> {
        let stmt = CurrentDialect::insert_search_statement();
        let search_date = Utc::now();

        let id: i64 = sqlx::query_scalar(&stmt)
            .bind(user_id)
            .bind(search_query)
            .bind(filters)
            .bind(results_count)
            .bind(to_timestamp(search_date))
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed(DbOperation::InsertSearch { user_id }, &stmt))?;

        let select = CurrentDialect::query_search_by_id_statement();

        sqlx::query_as(&select)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed(DbOperation::QuerySearches, &select))
    }

    /// A user's searches, most recent first.
    pub async fn get_searches(
        &self,
        user_id: i64,
        page: PageRequest,
    ) -> Result<Page<SearchHistory>, DatabaseError> {
        let stmt = CurrentDialect::query_searches_by_user_statement();
        let count_stmt = CurrentDialect::count_searches_by_user_statement();

        let searches: Vec<SearchHistory> = sqlx::query_as(&stmt)
            .bind(user_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed(DbOperation::QuerySearches, &stmt))?;

        let total: i64 = sqlx::query_scalar(&count_stmt)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed(DbOperation::QuerySearches, &count_stmt))?;

        Ok(Page::new(searches, page, total as u64))
    }

    /// Deletes every search of `user_id` and returns how many rows went away.
    pub async fn clear_searches(&self, user_id: i64) -> Result<u64, DatabaseError> {
        let stmt = CurrentDialect::delete_searches_by_user_statement();

        let result = sqlx::query(&stmt)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(query_failed(DbOperation::DeleteSearches { user_id }, &stmt))?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        database::tests::{create_user, get_database},
        query::PageRequest,
    };

    #[tokio::test]
    async fn test_search_history() {
        let db = get_database().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;

        db.add_search(alice, "cats", Some("type=photo, orientation=all"), 20)
            .await
            .unwrap();
        let latest = db.add_search(alice, "dogs", None, 0).await.unwrap();
        db.add_search(bob, "birds", None, 3).await.unwrap();

        let page = db.get_searches(alice, PageRequest::default()).await.unwrap();
        assert_eq!(2, page.total_elements);
        assert_eq!(latest, page.content[0]);
        assert_eq!(
            Some("type=photo, orientation=all".to_string()),
            page.content[1].filters
        );

        assert_eq!(2, db.clear_searches(alice).await.unwrap());
        assert_eq!(0, db.get_searches(alice, PageRequest::default()).await.unwrap().total_elements);
        assert_eq!(1, db.get_searches(bob, PageRequest::default()).await.unwrap().total_elements);
    }
}
