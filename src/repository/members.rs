//! Member registry methods on Repository

use chrono::Utc;
use sqlx::PgConnection;

use super::{where_clause, Repository, Visibility};
use crate::{
    error::{AppError, AppResult},
    models::member::{CreateMember, Member, MemberQuery, UpdateMember},
};

impl Repository {
    /// List members with optional filters
    pub async fn members_list(&self, query: &MemberQuery) -> AppResult<Vec<Member>> {
        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(ref name) = query.name {
            params.push(format!("%{}%", name.to_lowercase()));
            conditions.push(format!("LOWER(m.name) LIKE ${}", params.len()));
        }

        if let Some(ref code) = query.code {
            params.push(code.clone());
            conditions.push(format!("m.code = ${}", params.len()));
        }

        let select_query = format!(
            "SELECT m.* FROM members m {} ORDER BY m.name",
            where_clause(Visibility::from_flag(query.include_inactive), "m", &conditions)
        );

        let mut builder = sqlx::query_as::<_, Member>(&select_query);
        for param in &params {
            builder = builder.bind(param);
        }

        Ok(builder.fetch_all(&self.pool).await?)
    }

    /// Get member by ID
    pub async fn members_get_by_id(&self, id: i32, visibility: Visibility) -> AppResult<Member> {
        let query = format!(
            "SELECT m.* FROM members m WHERE m.id = $1 AND {}",
            visibility.predicate("m")
        );

        sqlx::query_as::<_, Member>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))
    }

    /// Whether the member exists and is active
    pub async fn members_exists_active(&self, id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM members WHERE id = $1 AND active = TRUE)"
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Check if a membership code is already used (by any member, active or not)
    pub async fn members_code_exists(&self, code: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM members WHERE code = $1 AND ($2::int IS NULL OR id != $2))"
        )
        .bind(code)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Create member
    pub async fn members_create(&self, data: &CreateMember) -> AppResult<Member> {
        sqlx::query_as::<_, Member>(
            "INSERT INTO members (name, code) VALUES ($1, $2) RETURNING *"
        )
        .bind(&data.name)
        .bind(&data.code)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::unique_violation(e, format!("Code {} is already registered", data.code)))
    }

    /// Update an active member
    pub async fn members_update(&self, id: i32, data: &UpdateMember) -> AppResult<Member> {
        let now = Utc::now();
        let mut sets = vec!["updated_at = $1".to_string()];
        let mut idx = 2;

        if data.name.is_some() {
            sets.push(format!("name = ${}", idx));
            idx += 1;
        }
        if data.code.is_some() {
            sets.push(format!("code = ${}", idx));
            idx += 1;
        }

        let query = format!(
            "UPDATE members SET {} WHERE id = ${} AND active = TRUE RETURNING *",
            sets.join(", "),
            idx
        );

        let mut builder = sqlx::query_as::<_, Member>(&query).bind(now);
        if let Some(ref name) = data.name {
            builder = builder.bind(name);
        }
        if let Some(ref code) = data.code {
            builder = builder.bind(code);
        }

        builder
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::unique_violation(e, "Code is already used by another member"))?
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))
    }

    /// Logical delete
    pub async fn members_deactivate(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE members SET active = FALSE, updated_at = $1 WHERE id = $2 AND active = TRUE"
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Member with id {} not found", id)));
        }
        Ok(())
    }

    /// Load and lock a member row for the rest of the transaction
    pub async fn members_find_for_update(
        &self,
        conn: &mut PgConnection,
        id: i32,
        visibility: Visibility,
    ) -> AppResult<Option<Member>> {
        let query = format!(
            "SELECT m.* FROM members m WHERE m.id = $1 AND {} FOR UPDATE",
            visibility.predicate("m")
        );

        Ok(sqlx::query_as::<_, Member>(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?)
    }
}
