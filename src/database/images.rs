use super::{Database, DatabaseError, DbOperation, bind_params, query_failed, to_timestamp};
use crate::{
    dialect::{CurrentDialect, Dialect},
    model::{Image, ImagePrivacy, NewImage},
    query::ImageQuery,
};
use chrono::Utc;

/// An image row returned by [`Database::ensure_images`].
#[derive(Debug, Clone, PartialEq)]
pub struct EnsuredImage {
    pub image: Image,

    /// `false` when a row with the same `webformat_url` already existed.
    pub created: bool,
}

impl Database {
    /// Inserts every image whose `webformat_url` is not stored yet and returns
    /// the stored row for each input, in input order.
    ///
    /// Existing rows are returned unchanged. The whole batch runs in one
    /// transaction.
    pub async fn ensure_images(
        &self,
        images: &[NewImage],
    ) -> Result<Vec<EnsuredImage>, DatabaseError> {
        let insert = CurrentDialect::ensure_image_statement();
        let select = CurrentDialect::query_image_by_url_statement();

        let mut tx = self.begin().await?;
        let mut ensured = Vec::with_capacity(images.len());

        for image in images {
            let now = to_timestamp(Utc::now());
            let result = sqlx::query(&insert)
                .bind(image.external_id)
                .bind(&image.page_url)
                .bind(&image.kind)
                .bind(&image.tags)
                .bind(&image.preview_url)
                .bind(image.preview_width.map(i64::from))
                .bind(image.preview_height.map(i64::from))
                .bind(&image.webformat_url)
                .bind(image.webformat_width.map(i64::from))
                .bind(image.webformat_height.map(i64::from))
                .bind(&image.large_image_url)
                .bind(&image.full_hd_url)
                .bind(&image.image_url)
                .bind(image.image_width.map(i64::from))
                .bind(image.image_height.map(i64::from))
                .bind(image.image_size.map(|size| size as i64))
                .bind(&image.file_name)
                .bind(&image.original_file_name)
                .bind(image.views)
                .bind(image.downloads)
                .bind(image.likes)
                .bind(image.comments)
                .bind(image.user_id)
                .bind(image.privacy.as_str())
                .bind(&now)
                .bind(&now)
                .execute(&mut *tx)
                .await
                .map_err(query_failed(
                    DbOperation::InsertImage {
                        webformat_url: image.webformat_url.clone(),
                    },
                    &insert,
                ))?;

            let stored: Image = sqlx::query_as(&select)
                .bind(&image.webformat_url)
                .fetch_one(&mut *tx)
                .await
                .map_err(query_failed(DbOperation::QueryImages, &select))?;

            ensured.push(EnsuredImage {
                image: stored,
                created: result.rows_affected() > 0,
            });
        }

        tx.commit().await.map_err(super::commit_failed)?;

        Ok(ensured)
    }

    /// Single-image form of [`Database::ensure_images`].
    pub async fn ensure_image(&self, image: &NewImage) -> Result<EnsuredImage, DatabaseError> {
        let mut ensured = self.ensure_images(std::slice::from_ref(image)).await?;

        ensured.pop().ok_or_else(|| DatabaseError::QueryFailed {
            operation: DbOperation::InsertImage {
                webformat_url: image.webformat_url.clone(),
            },
            sql: CurrentDialect::ensure_image_statement(),
            source: sqlx::Error::RowNotFound,
        })
    }

    pub async fn get_image(&self, id: i64) -> Result<Option<Image>, DatabaseError> {
        let stmt = CurrentDialect::query_image_by_id_statement();

        sqlx::query_as(&stmt)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed(DbOperation::QueryImages, &stmt))
    }

    pub async fn get_image_by_url(&self, url: &str) -> Result<Option<Image>, DatabaseError> {
        let stmt = CurrentDialect::query_image_by_url_statement();

        sqlx::query_as(&stmt)
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed(DbOperation::QueryImages, &stmt))
    }

    /// Performs an image query using an [`ImageQuery`] expression tree.
    ///
    /// Query construction is handled by the `query` module.
    pub async fn query_image(&self, query: &ImageQuery) -> Result<Vec<Image>, DatabaseError> {
        let (sql, params) = query.to_sql();
        let stmt = CurrentDialect::query_image_statement(sql);

        bind_params!(sqlx::query_as::<_, Image>(&stmt), &params)
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed(DbOperation::QueryImages, &stmt))
    }

    /// Counts the images matching the filter of `query`, ignoring its limit and offset.
    pub async fn count_image(&self, query: &ImageQuery) -> Result<u64, DatabaseError> {
        let (sql, params) = query.to_count_sql();
        let stmt = CurrentDialect::count_image_statement(sql);

        let count: i64 = bind_params!(sqlx::query_scalar::<_, i64>(&stmt), &params)
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed(DbOperation::QueryImages, &stmt))?;

        Ok(count as u64)
    }

    /// Adds one like. Returns `false` when no image has this id.
    pub async fn increment_likes(&self, id: i64) -> Result<bool, DatabaseError> {
        let stmt = CurrentDialect::increment_likes_statement();

        let result = sqlx::query(&stmt)
            .bind(to_timestamp(Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_failed(DbOperation::UpdateImage { id }, &stmt))?;

        Ok(result.rows_affected() > 0)
    }

    /// Changes the privacy of an image. Returns `false` when no image has this id.
    pub async fn update_privacy(
        &self,
        id: i64,
        privacy: ImagePrivacy,
    ) -> Result<bool, DatabaseError> {
        let stmt = CurrentDialect::update_privacy_statement();

        let result = sqlx::query(&stmt)
            .bind(privacy.as_str())
            .bind(to_timestamp(Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_failed(DbOperation::UpdateImage { id }, &stmt))?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes an image; its favorites and comments go with it.
    pub async fn delete_image(&self, id: i64) -> Result<bool, DatabaseError> {
        let stmt = CurrentDialect::delete_image_statement();

        let result = sqlx::query(&stmt)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_failed(DbOperation::DeleteImage { id }, &stmt))?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        database::tests::{create_user, get_database, new_image},
        model::ImagePrivacy,
        query::{ImageQuery, ImageQueryExpr},
    };

    #[tokio::test]
    async fn test_ensure_image_deduplicates_by_url() {
        let db = get_database().await;

        let first = db
            .ensure_image(&new_image("https://cdn.example.com/a.jpg", None, ImagePrivacy::Public))
            .await
            .unwrap();
        assert!(first.created);

        let mut again = new_image("https://cdn.example.com/a.jpg", None, ImagePrivacy::Public);
        again.tags = "different".to_string();
        let second = db.ensure_image(&again).await.unwrap();

        assert!(!second.created);
        assert_eq!(first.image, second.image);
        assert_eq!(
            1,
            db.count_image(&ImageQuery::visible_to(None, None))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_ensure_images_keeps_input_order() {
        let db = get_database().await;

        let batch = vec![
            new_image("https://cdn.example.com/b.jpg", None, ImagePrivacy::Public),
            new_image("https://cdn.example.com/a.jpg", None, ImagePrivacy::Public),
            new_image("https://cdn.example.com/b.jpg", None, ImagePrivacy::Public),
        ];
        let ensured = db.ensure_images(&batch).await.unwrap();

        assert_eq!(3, ensured.len());
        assert_eq!("https://cdn.example.com/b.jpg", ensured[0].image.webformat_url);
        assert_eq!("https://cdn.example.com/a.jpg", ensured[1].image.webformat_url);
        assert_eq!(ensured[0].image.id, ensured[2].image.id);
        assert!(ensured[0].created && ensured[1].created && !ensured[2].created);
    }

    #[tokio::test]
    async fn test_private_images_hidden_from_others() {
        let db = get_database().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;

        db.ensure_image(&new_image("https://cdn.example.com/public.jpg", Some(alice), ImagePrivacy::Public))
            .await
            .unwrap();
        db.ensure_image(&new_image("https://cdn.example.com/private.jpg", Some(alice), ImagePrivacy::Private))
            .await
            .unwrap();
        db.ensure_image(&new_image("https://cdn.example.com/shared.jpg", Some(alice), ImagePrivacy::Shared))
            .await
            .unwrap();

        let count = |viewer: Option<i64>| {
            let db = db.clone();
            async move {
                db.query_image(&ImageQuery::visible_to(viewer, None))
                    .await
                    .unwrap()
                    .len()
            }
        };

        assert_eq!(3, count(Some(alice)).await);
        assert_eq!(1, count(Some(bob)).await);
        assert_eq!(1, count(None).await);
    }

    #[tokio::test]
    async fn test_text_search_and_pagination() {
        let db = get_database().await;

        for (i, tags) in ["red car", "Red flower", "blue sky", "100% red"].iter().enumerate() {
            let mut image = new_image(
                &format!("https://cdn.example.com/{i}.jpg"),
                None,
                ImagePrivacy::Public,
            );
            image.tags = tags.to_string();
            db.ensure_image(&image).await.unwrap();
        }

        let red = ImageQuery::visible_to(None, Some(ImageQueryExpr::text("RED")));
        assert_eq!(3, db.count_image(&red).await.unwrap());

        let page = db
            .query_image(&red.clone().with_limit(2).with_offset(0))
            .await
            .unwrap();
        assert_eq!(2, page.len());
        // Newest first.
        assert_eq!("100% red", page[0].tags);

        let percent = ImageQuery::visible_to(None, Some(ImageQueryExpr::text("0%")));
        assert_eq!(1, db.count_image(&percent).await.unwrap());

        let photo = ImageQuery::visible_to(None, Some(ImageQueryExpr::text("phot")));
        assert_eq!(4, db.count_image(&photo).await.unwrap());
    }

    #[tokio::test]
    async fn test_like_privacy_and_delete() {
        let db = get_database().await;
        let image = db
            .ensure_image(&new_image("https://cdn.example.com/a.jpg", None, ImagePrivacy::Public))
            .await
            .unwrap()
            .image;

        assert!(db.increment_likes(image.id).await.unwrap());
        assert!(db.increment_likes(image.id).await.unwrap());
        assert!(!db.increment_likes(image.id + 100).await.unwrap());
        assert_eq!(2, db.get_image(image.id).await.unwrap().unwrap().likes);

        assert!(db.update_privacy(image.id, ImagePrivacy::Private).await.unwrap());
        assert_eq!(
            ImagePrivacy::Private,
            db.get_image(image.id).await.unwrap().unwrap().privacy
        );

        assert!(db.delete_image(image.id).await.unwrap());
        assert!(!db.delete_image(image.id).await.unwrap());
        assert!(
            db.get_image_by_url("https://cdn.example.com/a.jpg")
                .await
                .unwrap()
                .is_none()
        );
    }
}
