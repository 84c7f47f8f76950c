//! Author domain methods on Repository

use chrono::Utc;

use super::{where_clause, Repository, Visibility};
use crate::{
    error::{AppError, AppResult},
    models::author::{Author, AuthorQuery, CreateAuthor, UpdateAuthor},
};

impl Repository {
    /// List authors with optional filters
    pub async fn authors_list(&self, query: &AuthorQuery) -> AppResult<Vec<Author>> {
        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(ref name) = query.name {
            params.push(format!("%{}%", name.to_lowercase()));
            conditions.push(format!("LOWER(a.name) LIKE ${}", params.len()));
        }

        if let Some(ref country) = query.country {
            params.push(country.to_lowercase());
            conditions.push(format!("LOWER(a.country) = ${}", params.len()));
        }

        let select_query = format!(
            "SELECT a.* FROM authors a {} ORDER BY a.name",
            where_clause(Visibility::from_flag(query.include_inactive), "a", &conditions)
        );

        let mut builder = sqlx::query_as::<_, Author>(&select_query);
        for param in &params {
            builder = builder.bind(param);
        }

        Ok(builder.fetch_all(&self.pool).await?)
    }

    /// Get author by ID
    pub async fn authors_get_by_id(&self, id: i32, visibility: Visibility) -> AppResult<Author> {
        let query = format!(
            "SELECT a.* FROM authors a WHERE a.id = $1 AND {}",
            visibility.predicate("a")
        );

        sqlx::query_as::<_, Author>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Author with id {} not found", id)))
    }

    /// Check whether an active author already uses this name (case-insensitive)
    pub async fn authors_name_taken(&self, name: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM authors
                WHERE active = TRUE AND LOWER(name) = LOWER($1) AND ($2::int IS NULL OR id != $2)
            )
            "#,
        )
        .bind(name)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(taken)
    }

    /// Return the ids from `ids` that do not name an active author
    pub async fn authors_missing_active(&self, ids: &[i32]) -> AppResult<Vec<i32>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let found: Vec<i32> = sqlx::query_scalar(
            "SELECT id FROM authors WHERE active = TRUE AND id = ANY($1)"
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.iter().copied().filter(|id| !found.contains(id)).collect())
    }

    /// Create author
    pub async fn authors_create(&self, data: &CreateAuthor) -> AppResult<Author> {
        sqlx::query_as::<_, Author>(
            r#"
            INSERT INTO authors (name, country, birth_year)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(data.name.trim())
        .bind(&data.country)
        .bind(data.birth_year)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::unique_violation(e, format!("Author '{}' already exists", data.name)))
    }

    /// Update an active author
    pub async fn authors_update(&self, id: i32, data: &UpdateAuthor) -> AppResult<Author> {
        let now = Utc::now();
        let mut sets = vec!["updated_at = $1".to_string()];
        let mut idx = 2;

        macro_rules! add_field {
            ($field:expr, $name:expr) => {
                if $field.is_some() {
                    sets.push(format!("{} = ${}", $name, idx));
                    idx += 1;
                }
            };
        }

        add_field!(data.name, "name");
        add_field!(data.country, "country");
        add_field!(data.birth_year, "birth_year");

        let query = format!(
            "UPDATE authors SET {} WHERE id = ${} AND active = TRUE RETURNING *",
            sets.join(", "),
            idx
        );

        let mut builder = sqlx::query_as::<_, Author>(&query).bind(now);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(data.name);
        bind_field!(data.country);
        bind_field!(data.birth_year);

        builder
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::unique_violation(e, "Another active author has this name"))?
            .ok_or_else(|| AppError::NotFound(format!("Author with id {} not found", id)))
    }

    /// Deactivate an author and unlink it from every book, in one transaction
    pub async fn authors_deactivate(&self, id: i32) -> AppResult<u64> {
        let mut tx = self.begin().await?;

        let result = sqlx::query(
            "UPDATE authors SET active = FALSE, updated_at = $1 WHERE id = $2 AND active = TRUE"
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Author with id {} not found", id)));
        }

        let unlinked = sqlx::query("DELETE FROM book_authors WHERE author_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(unlinked)
    }
}
