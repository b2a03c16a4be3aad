use super::{Database, DatabaseError, DbOperation, query_failed, to_timestamp};
use crate::{
    dialect::{CurrentDialect, Dialect},
    model::Favorite,
    query::{Page, PageRequest},
};
use chrono::Utc;

impl Database {
    /// Favorites `image_id` for `user_id`.
    ///
    /// Returns `None` if the pair already exists; the existing row is left untouched.
    pub async fn add_favorite(
        &self,
        user_id: i64,
        image_id: i64,
    ) -> Result<Option<Favorite>, DatabaseError> {
        let stmt = CurrentDialect::insert_favorite_statement();

        let id: Option<i64> = sqlx::query_scalar(&stmt)
            .bind(user_id)
            .bind(image_id)
            .bind(to_timestamp(Utc::now()))
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed(
                DbOperation::InsertFavorite { user_id, image_id },
                &stmt,
            ))?;

        match id {
            Some(id) => self.get_favorite(id).await,
            None => Ok(None),
        }
    }

    pub async fn get_favorite(&self, id: i64) -> Result<Option<Favorite>, DatabaseError> {
        let stmt = CurrentDialect::query_favorite_by_id_statement();

        sqlx::query_as(&stmt)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed(DbOperation::QueryFavorites, &stmt))
    }

    pub async fn favorite_exists(&self, user_id: i64, image_id: i64) -> Result<bool, DatabaseError> {
        let stmt = CurrentDialect::exists_favorite_statement();

        sqlx::query_scalar(&stmt)
            .bind(user_id)
            .bind(image_id)
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed(DbOperation::QueryFavorites, &stmt))
    }

    /// Returns `false` when there was nothing to remove.
    pub async fn remove_favorite(&self, user_id: i64, image_id: i64) -> Result<bool, DatabaseError> {
        let stmt = CurrentDialect::delete_favorite_statement();

        let result = sqlx::query(&stmt)
            .bind(user_id)
            .bind(image_id)
            .execute(&self.pool)
            .await
            .map_err(query_failed(
                DbOperation::DeleteFavorite { user_id, image_id },
                &stmt,
            ))?;

        Ok(result.rows_affected() > 0)
    }

    /// A page of `user_id`'s favorites, newest first, limited to images the user can see.
    pub async fn get_favorites(
        &self,
        user_id: i64,
        page: PageRequest,
    ) -> Result<Page<Favorite>, DatabaseError> {
        let stmt = CurrentDialect::query_favorites_by_user_statement();
        let count_stmt = CurrentDialect::count_favorites_by_user_statement();

        let favorites: Vec<Favorite> = sqlx::query_as(&stmt)
            .bind(user_id)
            .bind(user_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed(DbOperation::QueryFavorites, &stmt))?;

        let total: i64 = sqlx::query_scalar(&count_stmt)
            .bind(user_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed(DbOperation::QueryFavorites, &count_stmt))?;

        Ok(Page::new(favorites, page, total as u64))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        database::tests::{create_user, get_database, new_image},
        model::ImagePrivacy,
        query::PageRequest,
    };

    #[tokio::test]
    async fn test_add_favorite_twice() {
        let db = get_database().await;
        let alice = create_user(&db, "alice").await;
        let image = db
            .ensure_image(&new_image("https://cdn.example.com/a.jpg", None, ImagePrivacy::Public))
            .await
            .unwrap()
            .image;

        let favorite = db.add_favorite(alice, image.id).await.unwrap().unwrap();
        assert_eq!("alice", favorite.user.username);
        assert_eq!(image, favorite.image);

        assert!(db.add_favorite(alice, image.id).await.unwrap().is_none());
        assert!(db.favorite_exists(alice, image.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_favorite() {
        let db = get_database().await;
        let alice = create_user(&db, "alice").await;
        let image = db
            .ensure_image(&new_image("https://cdn.example.com/a.jpg", None, ImagePrivacy::Public))
            .await
            .unwrap()
            .image;

        db.add_favorite(alice, image.id).await.unwrap();

        assert!(db.remove_favorite(alice, image.id).await.unwrap());
        assert!(!db.remove_favorite(alice, image.id).await.unwrap());
        assert!(!db.favorite_exists(alice, image.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_favorites_skips_hidden_images() {
        let db = get_database().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;

        let public = db
            .ensure_image(&new_image("https://cdn.example.com/a.jpg", Some(bob), ImagePrivacy::Public))
            .await
            .unwrap()
            .image;
        let later_private = db
            .ensure_image(&new_image("https://cdn.example.com/b.jpg", Some(bob), ImagePrivacy::Public))
            .await
            .unwrap()
            .image;
        let own = db
            .ensure_image(&new_image("https://cdn.example.com/c.jpg", Some(alice), ImagePrivacy::Private))
            .await
            .unwrap()
            .image;

        db.add_favorite(alice, public.id).await.unwrap();
        db.add_favorite(alice, later_private.id).await.unwrap();
        db.add_favorite(alice, own.id).await.unwrap();
        db.update_privacy(later_private.id, ImagePrivacy::Private)
            .await
            .unwrap();

        let page = db.get_favorites(alice, PageRequest::default()).await.unwrap();

        assert_eq!(2, page.total_elements);
        assert_eq!(1, page.total_pages);
        assert_eq!(own.id, page.content[0].image.id);
        assert_eq!(public.id, page.content[1].image.id);
    }

    #[tokio::test]
    async fn test_favorites_cascade_with_image() {
        let db = get_database().await;
        let alice = create_user(&db, "alice").await;
        let image = db
            .ensure_image(&new_image("https://cdn.example.com/a.jpg", None, ImagePrivacy::Public))
            .await
            .unwrap()
            .image;

        let favorite = db.add_favorite(alice, image.id).await.unwrap().unwrap();
        db.delete_image(image.id).await.unwrap();

        assert!(db.get_favorite(favorite.id).await.unwrap().is_none());
    }
}
