use super::{Database, DatabaseError, DbOperation, get_timestamp, query_failed, to_timestamp};
use crate::{
    dialect::{CurrentDialect, CurrentRow, Dialect},
    model::{Role, User},
};
use chrono::Utc;
use sqlx::Row;
use std::str::FromStr;

impl Database {
    /// Inserts a user together with its roles in one transaction.
    ///
    /// A taken username or email surfaces as a [`DatabaseError`] for which
    /// [`DatabaseError::is_unique_violation`] holds.
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        roles: &[Role],
    ) -> Result<User, DatabaseError> {
        let insert_user = CurrentDialect::insert_user_statement();
        let insert_role = CurrentDialect::ensure_user_role_statement();
        let created_at = Utc::now();

        let mut tx = self.begin().await?;

        let id: i64 = sqlx::query_scalar(&insert_user)
            .bind(username)
            .bind(email)
            .bind(password_hash)
            .bind(to_timestamp(created_at))
            .fetch_one(&mut *tx)
            .await
            .map_err(query_failed(
                DbOperation::InsertUser {
                    username: username.to_string(),
                },
                &insert_user,
            ))?;

        for role in roles {
            sqlx::query(&insert_role)
                .bind(id)
                .bind(role.as_str())
                .execute(&mut *tx)
                .await
                .map_err(query_failed(
                    DbOperation::InsertUserRole { user_id: id },
                    &insert_role,
                ))?;
        }

        tx.commit().await.map_err(super::commit_failed)?;

        let mut roles = roles.to_vec();
        roles.sort();
        roles.dedup();

        Ok(User {
            id,
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            roles,
            created_at,
        })
    }

    /// Grants `role` to an existing user. Granting it twice is a no-op.
    pub async fn ensure_user_role(&self, user_id: i64, role: Role) -> Result<(), DatabaseError> {
        let stmt = CurrentDialect::ensure_user_role_statement();

        sqlx::query(&stmt)
            .bind(user_id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await
            .map_err(query_failed(DbOperation::InsertUserRole { user_id }, &stmt))?;

        Ok(())
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>, DatabaseError> {
        let stmt = CurrentDialect::query_user_by_id_statement();

        let row = sqlx::query(&stmt)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed(DbOperation::QueryUser, &stmt))?;

        self.user_from_row(row, &stmt).await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DatabaseError> {
        let stmt = CurrentDialect::query_user_by_username_statement();

        let row = sqlx::query(&stmt)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed(DbOperation::QueryUser, &stmt))?;

        self.user_from_row(row, &stmt).await
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool, DatabaseError> {
        let stmt = CurrentDialect::exists_username_statement();

        sqlx::query_scalar(&stmt)
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed(DbOperation::QueryUser, &stmt))
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool, DatabaseError> {
        let stmt = CurrentDialect::exists_email_statement();

        sqlx::query_scalar(&stmt)
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed(DbOperation::QueryUser, &stmt))
    }

    async fn user_from_row(
        &self,
        row: Option<CurrentRow>,
        stmt: &str,
    ) -> Result<Option<User>, DatabaseError> {
        let Some(row) = row else {
            return Ok(None);
        };

        let decode = |e| DatabaseError::QueryFailed {
            operation: DbOperation::QueryUser,
            sql: stmt.to_string(),
            source: e,
        };

        let id: i64 = row.try_get("id").map_err(decode)?;
        let username: String = row.try_get("username").map_err(decode)?;
        let email: String = row.try_get("email").map_err(decode)?;
        let password_hash: String = row.try_get("password_hash").map_err(decode)?;
        let created_at = get_timestamp(&row, "created_at").map_err(decode)?;

        Ok(Some(User {
            id,
            username,
            email,
            password_hash,
            roles: self.get_roles(id).await?,
            created_at,
        }))
    }

    async fn get_roles(&self, user_id: i64) -> Result<Vec<Role>, DatabaseError> {
        let stmt = CurrentDialect::query_roles_by_user_statement();

        let names: Vec<String> = sqlx::query_scalar(&stmt)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed(DbOperation::QueryUser, &stmt))?;

        // Unknown role names are left out rather than failing the lookup.
        let mut roles: Vec<Role> = names
            .iter()
            .filter_map(|name| Role::from_str(name).ok())
            .collect();
        roles.sort();

        Ok(roles)
    }
}
