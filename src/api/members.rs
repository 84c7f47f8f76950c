//! Member API endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    error::AppResult,
    models::{
        member::{CreateMember, Member, MemberDetails, MemberQuery, UpdateMember},
        reservation::ReservationDetails,
    },
};

use super::{books::HistoryQuery, DeletedResponse, ValidatedJson};

/// List members
#[utoipa::path(
    get,
    path = "/members",
    tag = "members",
    params(MemberQuery),
    responses(
        (status = 200, description = "Member list", body = Vec<Member>)
    )
)]
pub async fn list_members(
    State(state): State<crate::AppState>,
    Query(query): Query<MemberQuery>,
) -> AppResult<Json<Vec<Member>>> {
    let members = state.services.members.list(&query).await?;
    Ok(Json(members))
}

/// Get member by ID, with its active reservation count
#[utoipa::path(
    get,
    path = "/members/{id}",
    tag = "members",
    params(("id" = i32, Path, description = "Member ID")),
    responses(
        (status = 200, description = "Member details", body = MemberDetails),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_member(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<MemberDetails>> {
    let member = state.services.members.get_by_id(id).await?;
    Ok(Json(member))
}

/// Create member
#[utoipa::path(
    post,
    path = "/members",
    tag = "members",
    request_body = CreateMember,
    responses(
        (status = 200, description = "Member created", body = Member),
        (status = 400, description = "Invalid data or code already used", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_member(
    State(state): State<crate::AppState>,
    ValidatedJson(data): ValidatedJson<CreateMember>,
) -> AppResult<Json<Member>> {
    let member = state.services.members.create(data).await?;
    Ok(Json(member))
}

/// Update member
#[utoipa::path(
    put,
    path = "/members/{id}",
    tag = "members",
    params(("id" = i32, Path, description = "Member ID")),
    request_body = UpdateMember,
    responses(
        (status = 200, description = "Member updated", body = Member),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_member(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    ValidatedJson(data): ValidatedJson<UpdateMember>,
) -> AppResult<Json<Member>> {
    let member = state.services.members.update(id, data).await?;
    Ok(Json(member))
}

/// Deactivate member
#[utoipa::path(
    delete,
    path = "/members/{id}",
    tag = "members",
    params(("id" = i32, Path, description = "Member ID")),
    responses(
        (status = 200, description = "Member deactivated", body = DeletedResponse),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_member(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<DeletedResponse>> {
    state.services.members.delete(id).await?;
    Ok(Json(DeletedResponse {
        message: "Member deleted".to_string(),
        id,
    }))
}

/// Reservations of a member
#[utoipa::path(
    get,
    path = "/members/{id}/reservations",
    tag = "members",
    params(("id" = i32, Path, description = "Member ID"), HistoryQuery),
    responses(
        (status = 200, description = "Reservations of the member", body = Vec<ReservationDetails>),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_member_reservations(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<ReservationDetails>>> {
    let reservations = state
        .services
        .members
        .reservations(id, query.include_inactive)
        .await?;
    Ok(Json(reservations))
}
