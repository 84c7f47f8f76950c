//! Reservation store methods on Repository

use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgConnection, Row};

use super::{where_clause, Repository, Visibility};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::BookShort,
        member::MemberShort,
        reservation::{DisplaySnapshot, Reservation, ReservationDetails, ReservationStatus},
    },
};

/// Reservation columns plus live member/book summaries. Outer joins so that a
/// dangling reference degrades to a null summary.
const DETAILS_SELECT: &str = r#"
    SELECT r.*,
           m.id AS m_id, m.name AS m_name, m.code AS m_code, m.active AS m_active,
           b.id AS b_id, b.isbn AS b_isbn, b.title AS b_title, b.active AS b_active
    FROM reservations r
    LEFT JOIN members m ON m.id = r.member_id
    LEFT JOIN books b ON b.id = r.book_id
"#;

/// Filters for reservation listings
#[derive(Debug, Default, Clone)]
pub struct ReservationFilter {
    pub member_id: Option<i32>,
    pub book_id: Option<i32>,
    pub status: Option<ReservationStatus>,
    pub visibility: Visibility,
}

impl Repository {
    /// List reservations with live member/book summaries
    pub async fn reservations_list(&self, filter: &ReservationFilter) -> AppResult<Vec<ReservationDetails>> {
        let mut conditions = Vec::new();
        let mut idx = 1;

        if filter.member_id.is_some() {
            conditions.push(format!("r.member_id = ${}", idx));
            idx += 1;
        }
        if filter.book_id.is_some() {
            conditions.push(format!("r.book_id = ${}", idx));
            idx += 1;
        }
        if filter.status.is_some() {
            conditions.push(format!("r.status = ${}", idx));
        }

        let query = format!(
            "{} {} ORDER BY r.reserved_at DESC, r.id DESC",
            DETAILS_SELECT,
            where_clause(filter.visibility, "r", &conditions)
        );

        let mut builder = sqlx::query(&query);
        if let Some(member_id) = filter.member_id {
            builder = builder.bind(member_id);
        }
        if let Some(book_id) = filter.book_id {
            builder = builder.bind(book_id);
        }
        if let Some(status) = filter.status {
            builder = builder.bind(status);
        }

        let rows = builder.fetch_all(&self.pool).await?;
        let now = Utc::now();

        Ok(rows.iter().map(|row| details_from_row(row, now)).collect())
    }

    /// Get one reservation with live member/book summaries
    pub async fn reservations_get(&self, id: i32, visibility: Visibility) -> AppResult<ReservationDetails> {
        let mut conn = self.pool.acquire().await?;
        self.reservations_details(&mut conn, id, visibility).await
    }

    /// Same as `reservations_get`, on a caller-provided connection or transaction
    pub async fn reservations_details(
        &self,
        conn: &mut PgConnection,
        id: i32,
        visibility: Visibility,
    ) -> AppResult<ReservationDetails> {
        let query = format!(
            "{} WHERE r.id = $1 AND {}",
            DETAILS_SELECT,
            visibility.predicate("r")
        );

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation with id {} not found", id)))?;

        Ok(details_from_row(&row, Utc::now()))
    }

    /// Number of reservations a member currently holds (status active, not deleted)
    pub async fn reservations_count_active_for_member(
        &self,
        conn: &mut PgConnection,
        member_id: i32,
    ) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reservations WHERE member_id = $1 AND status = 'active' AND active = TRUE"
        )
        .bind(member_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count)
    }

    /// Whether the member already holds an active reservation for the book
    pub async fn reservations_has_active(
        &self,
        conn: &mut PgConnection,
        member_id: i32,
        book_id: i32,
    ) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM reservations
                WHERE member_id = $1 AND book_id = $2 AND status = 'active' AND active = TRUE
            )
            "#,
        )
        .bind(member_id)
        .bind(book_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(exists)
    }

    /// Insert a new active reservation and return its id
    pub async fn reservations_insert(
        &self,
        conn: &mut PgConnection,
        member_id: i32,
        book_id: i32,
        reserved_at: DateTime<Utc>,
        due_at: DateTime<Utc>,
        snapshot: &DisplaySnapshot,
    ) -> AppResult<i32> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO reservations (member_id, book_id, reserved_at, due_at, status, member_name, book_title)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(member_id)
        .bind(book_id)
        .bind(reserved_at)
        .bind(due_at)
        .bind(ReservationStatus::Active)
        .bind(&snapshot.member_name)
        .bind(&snapshot.book_title)
        .fetch_one(&mut *conn)
        .await?;
        Ok(id)
    }

    /// Load and lock a reservation row for the rest of the transaction
    pub async fn reservations_find_for_update(
        &self,
        conn: &mut PgConnection,
        id: i32,
        visibility: Visibility,
    ) -> AppResult<Option<Reservation>> {
        let query = format!(
            "SELECT r.* FROM reservations r WHERE r.id = $1 AND {} FOR UPDATE",
            visibility.predicate("r")
        );

        Ok(sqlx::query_as::<_, Reservation>(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?)
    }

    /// Set the status. `closed_at` is only stamped the first time it is given.
    pub async fn reservations_set_status(
        &self,
        conn: &mut PgConnection,
        id: i32,
        status: ReservationStatus,
        closed_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE reservations SET status = $1, closed_at = COALESCE(closed_at, $2) WHERE id = $3"
        )
        .bind(status)
        .bind(closed_at)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Logical delete
    pub async fn reservations_deactivate(
        &self,
        conn: &mut PgConnection,
        id: i32,
        closed_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE reservations SET active = FALSE, closed_at = COALESCE(closed_at, $1) WHERE id = $2"
        )
        .bind(closed_at)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}

fn details_from_row(row: &PgRow, now: DateTime<Utc>) -> ReservationDetails {
    let status: ReservationStatus = row.get("status");
    let active: bool = row.get("active");
    let due_at: DateTime<Utc> = row.get("due_at");

    let member = row.get::<Option<i32>, _>("m_id").map(|id| MemberShort {
        id,
        name: row.get("m_name"),
        code: row.get("m_code"),
        active: row.get("m_active"),
    });

    let book = row.get::<Option<i32>, _>("b_id").map(|id| BookShort {
        id,
        isbn: row.get("b_isbn"),
        title: row.get("b_title"),
        active: row.get("b_active"),
    });

    ReservationDetails {
        id: row.get("id"),
        member,
        book,
        snapshot: DisplaySnapshot {
            member_name: row.get("member_name"),
            book_title: row.get("book_title"),
        },
        reserved_at: row.get("reserved_at"),
        due_at,
        status,
        active,
        closed_at: row.get("closed_at"),
        is_overdue: active && status.is_active() && due_at < now,
    }
}
