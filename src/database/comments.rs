use super::{Database, DatabaseError, DbOperation, query_failed, to_timestamp};
use crate::{
    dialect::{CurrentDialect, Dialect},
    model::Comment,
    query::{Page, PageRequest},
};
use chrono::Utc;

impl Database {
    /// Stores a comment and bumps the image's comment counter in one transaction.
    pub async fn add_comment(
        &self,
        image_id: i64,
        user_id: i64,
        content: &str,
    ) -> Result<Comment, DatabaseError> {
        let insert = CurrentDialect::insert_comment_statement();
        let bump = CurrentDialect::increment_comment_count_statement();
        let select = CurrentDialect::query_comment_by_id_statement();
        let now = to_timestamp(Utc::now());

        let mut tx = self.begin().await?;

        let id: i64 = sqlx::query_scalar(&insert)
            .bind(image_id)
            .bind(user_id)
            .bind(content)
            .bind(&now)
            .fetch_one(&mut *tx)
            .await
            .map_err(query_failed(DbOperation::InsertComment { image_id }, &insert))?;

        sqlx::query(&bump)
            .bind(&now)
            .bind(image_id)
            .execute(&mut *tx)
            .await
            .map_err(query_failed(DbOperation::UpdateImage { id: image_id }, &bump))?;

        let comment: Comment = sqlx::query_as(&select)
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(query_failed(DbOperation::QueryComments, &select))?;

        tx.commit().await.map_err(super::commit_failed)?;

        Ok(comment)
    }

    /// Comments on one image, newest first.
    pub async fn get_comments_by_image(
        &self,
        image_id: i64,
        page: PageRequest,
    ) -> Result<Page<Comment>, DatabaseError> {
        let stmt = CurrentDialect::query_comments_by_image_statement();
        let count_stmt = CurrentDialect::count_comments_by_image_statement();

        let comments: Vec<Comment> = sqlx::query_as(&stmt)
            .bind(image_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed(DbOperation::QueryComments, &stmt))?;

        let total: i64 = sqlx::query_scalar(&count_stmt)
            .bind(image_id)
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed(DbOperation::QueryComments, &count_stmt))?;

        Ok(Page::new(comments, page, total as u64))
    }

    /// Comments written by `user_id` on images `viewer` can see, newest first.
    pub async fn get_comments_by_user(
        &self,
        user_id: i64,
        viewer: Option<i64>,
        page: PageRequest,
    ) -> Result<Page<Comment>, DatabaseError> {
        let stmt = CurrentDialect::query_comments_by_user_statement();
        let count_stmt = CurrentDialect::count_comments_by_user_statement();

        let comments: Vec<Comment> = sqlx::query_as(&stmt)
            .bind(user_id)
            .bind(viewer)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed(DbOperation::QueryComments, &stmt))?;

        let total: i64 = sqlx::query_scalar(&count_stmt)
            .bind(user_id)
            .bind(viewer)
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed(DbOperation::QueryComments, &count_stmt))?;

        Ok(Page::new(comments, page, total as u64))
    }
}
