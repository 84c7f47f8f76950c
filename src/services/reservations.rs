//! Reservation engine: loan invariants across the catalog and member registry

use chrono::Utc;

use crate::{
    config::ReservationsConfig,
    error::{AppError, AppResult},
    models::reservation::{
        CopyEffect, CreateReservation, DisplaySnapshot, Eligibility, Reservation, ReservationDetails,
        ReservationQuery, ReservationRules, ReservationStatus,
    },
    repository::{reservations::ReservationFilter, Repository, Visibility},
};

#[derive(Clone)]
pub struct ReservationsService {
    repository: Repository,
    rules: ReservationRules,
}

impl ReservationsService {
    pub fn new(repository: Repository, config: &ReservationsConfig) -> Self {
        Self {
            repository,
            rules: ReservationRules::from(config),
        }
    }

    /// Reserve a copy of a book for a member.
    ///
    /// Member and book rows stay locked until commit, so two requests racing
    /// for the last copy are serialized and only one of them succeeds.
    pub async fn create(&self, data: &CreateReservation) -> AppResult<ReservationDetails> {
        let book_ref = data.book_ref()?;
        let mut tx = self.repository.begin().await?;

        let member = self
            .repository
            .members_find_for_update(&mut tx, data.member_id, Visibility::Active)
            .await?;
        let book = self
            .repository
            .books_find_for_update(&mut tx, &book_ref, Visibility::Active)
            .await?;

        let (active_count, duplicate) = match (&member, &book) {
            (Some(m), Some(b)) => (
                self.repository.reservations_count_active_for_member(&mut tx, m.id).await?,
                self.repository.reservations_has_active(&mut tx, m.id, b.id).await?,
            ),
            _ => (0, false),
        };

        let facts = Eligibility {
            member: member.as_ref(),
            book: book.as_ref(),
            active_count,
            duplicate,
        };

        let (member, book) = match self.rules.check(&facts) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(
                    "Reservation refused for member {} ({:?}): {}",
                    data.member_id,
                    book_ref,
                    e
                );
                return Err(e);
            }
        };

        let remaining = self.repository.books_decrement_copy(&mut tx, book.id).await?;
        if self.rules.deactivates_book(remaining) {
            self.repository.books_set_active(&mut tx, book.id, false).await?;
            tracing::info!("Book {} has no copies left and was deactivated", book.id);
        }

        let reserved_at = Utc::now();
        let id = self
            .repository
            .reservations_insert(
                &mut tx,
                member.id,
                book.id,
                reserved_at,
                self.rules.due_at(reserved_at),
                &DisplaySnapshot::capture(member, book),
            )
            .await?;

        let details = self
            .repository
            .reservations_details(&mut tx, id, Visibility::All)
            .await?;

        tx.commit().await?;

        tracing::info!(
            "Reservation {} created: member {} book {} ({} copies left)",
            id,
            member.id,
            book.id,
            remaining
        );

        Ok(details)
    }

    /// List reservations (active flag set unless `include_inactive`)
    pub async fn list(&self, query: &ReservationQuery) -> AppResult<Vec<ReservationDetails>> {
        let status = query
            .status
            .as_deref()
            .map(str::parse::<ReservationStatus>)
            .transpose()
            .map_err(AppError::BadRequest)?;

        let filter = ReservationFilter {
            member_id: query.member_id,
            book_id: query.book_id,
            status,
            visibility: Visibility::from_flag(query.include_inactive),
        };

        self.repository.reservations_list(&filter).await
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<ReservationDetails> {
        self.repository.reservations_get(id, Visibility::Active).await
    }

    /// Change the status. Leaving `active` gives the copy back exactly once.
    pub async fn update_status(&self, id: i32, status: &str) -> AppResult<ReservationStatus> {
        let next: ReservationStatus = status.parse().map_err(AppError::BadRequest)?;

        let mut tx = self.repository.begin().await?;
        let reservation = self.find_for_update(&mut tx, id).await?;

        let effect = reservation.status.transition(next)?;
        let closed_at = match effect {
            CopyEffect::Release => {
                let copies = self
                    .repository
                    .books_increment_copy(&mut tx, reservation.book_id)
                    .await?;
                tracing::debug!("Book {} back to {} copies", reservation.book_id, copies);
                Some(Utc::now())
            }
            CopyEffect::Unchanged => None,
        };

        self.repository
            .reservations_set_status(&mut tx, id, next, closed_at)
            .await?;
        tx.commit().await?;

        tracing::info!("Reservation {} status {} -> {}", id, reservation.status, next);
        Ok(next)
    }

    /// Logical delete; a reservation still holding its copy gives it back
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.repository.begin().await?;
        let reservation = self.find_for_update(&mut tx, id).await?;

        let closed_at = if reservation.holds_copy() {
            self.repository
                .books_increment_copy(&mut tx, reservation.book_id)
                .await?;
            Some(Utc::now())
        } else {
            None
        };

        self.repository
            .reservations_deactivate(&mut tx, id, closed_at)
            .await?;
        tx.commit().await?;

        tracing::info!(
            "Reservation {} deleted (copy released: {})",
            id,
            closed_at.is_some()
        );
        Ok(())
    }

    async fn find_for_update(
        &self,
        conn: &mut sqlx::PgConnection,
        id: i32,
    ) -> AppResult<Reservation> {
        self.repository
            .reservations_find_for_update(conn, id, Visibility::Active)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation with id {} not found", id)))
    }
}
