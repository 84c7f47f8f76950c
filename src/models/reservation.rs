//! Reservation (loan) model, status machine and eligibility rules

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{
    book::{normalize_isbn, Book, BookShort},
    member::{Member, MemberShort},
};
use crate::{
    config::ReservationsConfig,
    error::{AppError, AppResult},
};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Reservation status. A reservation is always created `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Active,
    Delivered,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "active",
            ReservationStatus::Delivered => "delivered",
            ReservationStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ReservationStatus::Active)
    }

    /// Check a status change and report its effect on the book's copy count.
    ///
    /// Leaving `Active` releases the held copy. Moving between closed states
    /// only relabels the reservation, so the copy is never released twice.
    pub fn transition(self, next: ReservationStatus) -> AppResult<CopyEffect> {
        use ReservationStatus::*;

        match (self, next) {
            (Active, Active) => Ok(CopyEffect::Unchanged),
            (Active, Delivered) | (Active, Cancelled) => Ok(CopyEffect::Release),
            (Delivered | Cancelled, Delivered | Cancelled) => Ok(CopyEffect::Unchanged),
            (Delivered | Cancelled, Active) => Err(AppError::Conflict(format!(
                "Reservation already closed as {}",
                self
            ))),
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = String;

    /// Case-insensitive; accepts the Spanish labels used by existing clients
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" | "activo" | "activa" => Ok(ReservationStatus::Active),
            "delivered" | "entregada" | "entregado" => Ok(ReservationStatus::Delivered),
            "cancelled" | "canceled" | "cancelada" | "cancelado" => Ok(ReservationStatus::Cancelled),
            _ => Err(format!(
                "Invalid reservation status: {} (expected active, delivered or cancelled)",
                s
            )),
        }
    }
}

// SQLx conversion for ReservationStatus
impl sqlx::Type<Postgres> for ReservationStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for ReservationStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for ReservationStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        let s: String = self.as_str().to_string();
        <String as Encode<Postgres>>::encode(s, buf)
    }
}

/// What a status change does to the referenced book's copy count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyEffect {
    Unchanged,
    /// Give the held copy back to the book
    Release,
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Reservation row from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reservation {
    pub id: i32,
    pub member_id: i32,
    pub book_id: i32,
    pub reserved_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub status: ReservationStatus,
    pub member_name: String,
    pub book_title: String,
    pub active: bool,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// Status active and not logically deleted
    pub fn holds_copy(&self) -> bool {
        self.active && self.status.is_active()
    }
}

/// Names captured when the reservation was made. Never refreshed, so a
/// reservation still renders after its member or book is deactivated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct DisplaySnapshot {
    pub member_name: String,
    pub book_title: String,
}

impl DisplaySnapshot {
    pub fn capture(member: &Member, book: &Book) -> Self {
        Self {
            member_name: member.name.clone(),
            book_title: book.title.clone(),
        }
    }
}

/// Reservation with live member/book summaries for display
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReservationDetails {
    pub id: i32,
    /// Null when the member row can no longer be resolved
    pub member: Option<MemberShort>,
    /// Null when the book row can no longer be resolved
    pub book: Option<BookShort>,
    pub snapshot: DisplaySnapshot,
    pub reserved_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub status: ReservationStatus,
    pub active: bool,
    pub closed_at: Option<DateTime<Utc>>,
    pub is_overdue: bool,
}

/// Create reservation request. The book is addressed by id, or by ISBN
/// when no id is given.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateReservation {
    pub member_id: i32,
    pub book_id: Option<i32>,
    #[validate(length(min = 1, message = "ISBN cannot be empty"))]
    pub isbn: Option<String>,
}

/// How a reservation request names its book
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookRef {
    Id(i32),
    Isbn(String),
}

impl CreateReservation {
    pub fn book_ref(&self) -> AppResult<BookRef> {
        match (self.book_id, &self.isbn) {
            (Some(id), _) => Ok(BookRef::Id(id)),
            (None, Some(isbn)) => Ok(BookRef::Isbn(normalize_isbn(isbn))),
            (None, None) => Err(AppError::BadRequest("book_id or isbn required".to_string())),
        }
    }
}

/// Update status request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateReservationStatus {
    /// active, delivered or cancelled (Spanish labels accepted)
    pub status: String,
}

/// Reservation list filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ReservationQuery {
    pub member_id: Option<i32>,
    pub book_id: Option<i32>,
    pub status: Option<String>,
    /// Include logically deleted reservations
    pub include_inactive: Option<bool>,
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Facts gathered inside the reservation transaction
#[derive(Debug)]
pub struct Eligibility<'a> {
    pub member: Option<&'a Member>,
    pub book: Option<&'a Book>,
    /// Member's reservations with status active and active flag set
    pub active_count: i64,
    /// Member already holds an active reservation for this book
    pub duplicate: bool,
}

/// Loan policy applied when creating reservations
#[derive(Debug, Clone)]
pub struct ReservationRules {
    pub loan_period: Duration,
    pub max_active_per_member: Option<i64>,
    pub reject_duplicates: bool,
    pub deactivate_exhausted_books: bool,
}

impl ReservationRules {
    pub fn due_at(&self, reserved_at: DateTime<Utc>) -> DateTime<Utc> {
        reserved_at + self.loan_period
    }

    /// Whether a book left with `remaining` copies after a reservation gets
    /// deactivated. Releasing a copy never reactivates a book.
    pub fn deactivates_book(&self, remaining: i32) -> bool {
        self.deactivate_exhausted_books && remaining == 0
    }

    /// Check preconditions in order; the first failing one is reported.
    pub fn check<'a>(&self, facts: &Eligibility<'a>) -> AppResult<(&'a Member, &'a Book)> {
        let member = facts
            .member
            .filter(|m| m.active)
            .ok_or_else(|| AppError::NotFound("Member not found".to_string()))?;

        let book = facts
            .book
            .filter(|b| b.active)
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

        if !book.has_available_copy() {
            return Err(AppError::Conflict("No copies available".to_string()));
        }

        if let Some(max) = self.max_active_per_member {
            if facts.active_count >= max {
                return Err(AppError::Conflict(format!(
                    "Reservation limit reached ({}/{})",
                    facts.active_count, max
                )));
            }
        }

        if self.reject_duplicates && facts.duplicate {
            return Err(AppError::Conflict(
                "Duplicate active reservation for this book".to_string(),
            ));
        }

        Ok((member, book))
    }
}

impl From<&ReservationsConfig> for ReservationRules {
    fn from(config: &ReservationsConfig) -> Self {
        Self {
            loan_period: Duration::days(config.loan_days),
            max_active_per_member: config.max_active_per_member,
            reject_duplicates: config.reject_duplicates,
            deactivate_exhausted_books: config.deactivate_exhausted_books,
        }
    }
}

impl Default for ReservationRules {
    fn default() -> Self {
        Self::from(&ReservationsConfig::default())
    }
}
