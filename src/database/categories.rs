use super::{Database, DatabaseError, DbOperation, query_failed};
use crate::{
    dialect::{CurrentDialect, Dialect},
    model::Category,
};

impl Database {
    pub async fn create_category(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Category, DatabaseError> {
        let stmt = CurrentDialect::insert_category_statement();

        let id: i64 = sqlx::query_scalar(&stmt)
            .bind(name)
            .bind(description)
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed(
                DbOperation::InsertCategory {
                    name: name.to_string(),
                },
                &stmt,
            ))?;

        Ok(Category {
            id,
            name: name.to_string(),
            description: description.map(str::to_string),
        })
    }

    /// Inserts each `(name, description)` pair whose name is not taken yet.
    ///
    /// Returns how many rows were actually inserted.
    pub async fn ensure_categories(
        &self,
        categories: &[(String, String)],
    ) -> Result<u64, DatabaseError> {
        let stmt = CurrentDialect::ensure_category_statement();
        let mut tx = self.begin().await?;
        let mut inserted = 0;

        for (name, description) in categories {
            let result = sqlx::query(&stmt)
                .bind(name)
                .bind(description)
                .execute(&mut *tx)
                .await
                .map_err(query_failed(
                    DbOperation::InsertCategory { name: name.clone() },
                    &stmt,
                ))?;
            inserted += result.rows_affected();
        }

        tx.commit().await.map_err(super::commit_failed)?;

        Ok(inserted)
    }

    pub async fn get_categories(&self) -> Result<Vec<Category>, DatabaseError> {
        let stmt = CurrentDialect::query_categories_statement();

        sqlx::query_as(stmt)
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed(DbOperation::QueryCategories, stmt))
    }

    pub async fn get_category_by_name(&self, name: &str) -> Result<Option<Category>, DatabaseError> {
        let stmt = CurrentDialect::query_category_by_name_statement();

        sqlx::query_as(&stmt)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed(DbOperation::QueryCategories, &stmt))
    }

    pub async fn category_exists(&self, name: &str) -> Result<bool, DatabaseError> {
        let stmt = CurrentDialect::exists_category_statement();

        sqlx::query_scalar(&stmt)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed(DbOperation::QueryCategories, &stmt))
    }

    /// Returns `false` when no category has this id.
    pub async fn delete_category(&self, id: i64) -> Result<bool, DatabaseError> {
        let stmt = CurrentDialect::delete_category_statement();

        let result = sqlx::query(&stmt)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_failed(DbOperation::DeleteCategory { id }, &stmt))?;

        Ok(result.rows_affected() > 0)
    }
}
