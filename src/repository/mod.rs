//! Repository layer for database operations

pub mod authors;
pub mod books;
pub mod members;
pub mod reservations;

use sqlx::{Pool, Postgres, Transaction};

use crate::error::AppResult;

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Start a transaction; every multi-row write goes through one
    pub async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    /// Round-trip to the database (readiness probe)
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Row visibility applied by read paths. Logically deleted rows are hidden
/// unless a caller explicitly asks for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Active,
    All,
}

impl Visibility {
    /// `include_inactive` query flag to visibility
    pub fn from_flag(include_inactive: Option<bool>) -> Self {
        if include_inactive.unwrap_or(false) {
            Visibility::All
        } else {
            Visibility::Active
        }
    }

    /// SQL predicate for the table aliased `alias`
    pub fn predicate(&self, alias: &str) -> String {
        match self {
            Visibility::Active => format!("{}.active = TRUE", alias),
            Visibility::All => "TRUE".to_string(),
        }
    }
}

/// Build a `WHERE` clause from the visibility predicate and extra conditions
pub(crate) fn where_clause(visibility: Visibility, alias: &str, conditions: &[String]) -> String {
    let mut all = vec![visibility.predicate(alias)];
    all.extend(conditions.iter().cloned());
    format!("WHERE {}", all.join(" AND "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_visibility_hides_inactive() {
        assert_eq!(Visibility::default(), Visibility::Active);
        assert_eq!(Visibility::from_flag(None), Visibility::Active);
        assert_eq!(Visibility::from_flag(Some(false)), Visibility::Active);
        assert_eq!(Visibility::from_flag(Some(true)), Visibility::All);
    }

    #[test]
    fn test_predicate() {
        assert_eq!(Visibility::Active.predicate("b"), "b.active = TRUE");
        assert_eq!(Visibility::All.predicate("b"), "TRUE");
    }

    #[test]
    fn test_where_clause_joins_conditions() {
        let clause = where_clause(
            Visibility::Active,
            "m",
            &["LOWER(m.name) LIKE $1".to_string(), "m.code = $2".to_string()],
        );
        assert_eq!(clause, "WHERE m.active = TRUE AND LOWER(m.name) LIKE $1 AND m.code = $2");

        assert_eq!(where_clause(Visibility::All, "m", &[]), "WHERE TRUE");
    }
}
