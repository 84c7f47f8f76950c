//! Book catalog API endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::AppResult,
    models::{
        book::{Book, BookQuery, CreateBook, UpdateBook},
        reservation::ReservationDetails,
    },
};

use super::{DeletedResponse, ValidatedJson};

/// Filter for nested reservation listings
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Include logically deleted reservations
    pub include_inactive: Option<bool>,
}

/// List books
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(BookQuery),
    responses(
        (status = 200, description = "Book list", body = Vec<Book>)
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.list(query).await?;
    Ok(Json(books))
}

/// Get book by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_by_id(id).await?;
    Ok(Json(book))
}

/// Get book by ISBN
#[utoipa::path(
    get,
    path = "/books/isbn/{isbn}",
    tag = "books",
    params(("isbn" = String, Path, description = "Book ISBN")),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book_by_isbn(
    State(state): State<crate::AppState>,
    Path(isbn): Path<String>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_by_isbn(&isbn).await?;
    Ok(Json(book))
}

/// Create book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    request_body = CreateBook,
    responses(
        (status = 200, description = "Book created", body = Book),
        (status = 400, description = "Invalid data or ISBN already used", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown author", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    ValidatedJson(data): ValidatedJson<CreateBook>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.create(data).await?;
    Ok(Json(book))
}

/// Update book
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    ValidatedJson(data): ValidatedJson<UpdateBook>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.update(id, data).await?;
    Ok(Json(book))
}

/// Deactivate book
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book deactivated", body = DeletedResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<DeletedResponse>> {
    state.services.catalog.delete(id).await?;
    Ok(Json(DeletedResponse {
        message: "Book deleted".to_string(),
        id,
    }))
}

/// Reservations of a book
#[utoipa::path(
    get,
    path = "/books/{id}/reservations",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID"), HistoryQuery),
    responses(
        (status = 200, description = "Reservations of the book", body = Vec<ReservationDetails>),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_book_reservations(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<ReservationDetails>>> {
    let reservations = state
        .services
        .catalog
        .reservations(id, query.include_inactive)
        .await?;
    Ok(Json(reservations))
}
