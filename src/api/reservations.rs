//! Reservation API endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::reservation::{
        CreateReservation, ReservationDetails, ReservationQuery, ReservationStatus,
        UpdateReservationStatus,
    },
};

use super::{DeletedResponse, ValidatedJson};

#[derive(Serialize, ToSchema)]
pub struct ReservationCreatedResponse {
    pub message: String,
    pub reservation: ReservationDetails,
}

#[derive(Serialize, ToSchema)]
pub struct StatusChangeResponse {
    pub message: String,
    pub id: i32,
    pub status: ReservationStatus,
}

/// List reservations
#[utoipa::path(
    get,
    path = "/reservations",
    tag = "reservations",
    params(ReservationQuery),
    responses(
        (status = 200, description = "Reservation list", body = Vec<ReservationDetails>),
        (status = 400, description = "Unknown status filter", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_reservations(
    State(state): State<crate::AppState>,
    Query(query): Query<ReservationQuery>,
) -> AppResult<Json<Vec<ReservationDetails>>> {
    let reservations = state.services.reservations.list(&query).await?;
    Ok(Json(reservations))
}

/// Get reservation by ID
#[utoipa::path(
    get,
    path = "/reservations/{id}",
    tag = "reservations",
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation details", body = ReservationDetails),
        (status = 404, description = "Reservation not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_reservation(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<ReservationDetails>> {
    let reservation = state.services.reservations.get_by_id(id).await?;
    Ok(Json(reservation))
}

/// Reserve a copy of a book for a member
#[utoipa::path(
    post,
    path = "/reservations",
    tag = "reservations",
    request_body = CreateReservation,
    responses(
        (status = 200, description = "Reservation created", body = ReservationCreatedResponse),
        (status = 400, description = "No copies, limit reached, duplicate or invalid body", body = crate::error::ErrorResponse),
        (status = 404, description = "Member or book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_reservation(
    State(state): State<crate::AppState>,
    ValidatedJson(data): ValidatedJson<CreateReservation>,
) -> AppResult<Json<ReservationCreatedResponse>> {
    let reservation = state.services.reservations.create(&data).await?;
    Ok(Json(ReservationCreatedResponse {
        message: "Reservation created".to_string(),
        reservation,
    }))
}

/// Change reservation status
#[utoipa::path(
    put,
    path = "/reservations/{id}",
    tag = "reservations",
    params(("id" = i32, Path, description = "Reservation ID")),
    request_body = UpdateReservationStatus,
    responses(
        (status = 200, description = "Status changed", body = StatusChangeResponse),
        (status = 400, description = "Invalid status or reservation closed", body = crate::error::ErrorResponse),
        (status = 404, description = "Reservation not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_reservation(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    ValidatedJson(data): ValidatedJson<UpdateReservationStatus>,
) -> AppResult<Json<StatusChangeResponse>> {
    let status = state
        .services
        .reservations
        .update_status(id, &data.status)
        .await?;
    Ok(Json(StatusChangeResponse {
        message: format!("Reservation status set to {}", status),
        id,
        status,
    }))
}

/// Logically delete a reservation, returning its copy if still held
#[utoipa::path(
    delete,
    path = "/reservations/{id}",
    tag = "reservations",
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation deleted", body = DeletedResponse),
        (status = 404, description = "Reservation not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_reservation(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<DeletedResponse>> {
    state.services.reservations.delete(id).await?;
    Ok(Json(DeletedResponse {
        message: "Reservation deleted".to_string(),
        id,
    }))
}
