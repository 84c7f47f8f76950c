//! Author API endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    error::AppResult,
    models::{
        author::{Author, AuthorQuery, CreateAuthor, UpdateAuthor},
        book::Book,
    },
};

use super::{DeletedResponse, ValidatedJson};

/// List authors
#[utoipa::path(
    get,
    path = "/authors",
    tag = "authors",
    params(AuthorQuery),
    responses(
        (status = 200, description = "Author list", body = Vec<Author>)
    )
)]
pub async fn list_authors(
    State(state): State<crate::AppState>,
    Query(query): Query<AuthorQuery>,
) -> AppResult<Json<Vec<Author>>> {
    let authors = state.services.authors.list(&query).await?;
    Ok(Json(authors))
}

/// Get author by ID
#[utoipa::path(
    get,
    path = "/authors/{id}",
    tag = "authors",
    params(("id" = i32, Path, description = "Author ID")),
    responses(
        (status = 200, description = "Author details", body = Author),
        (status = 404, description = "Author not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_author(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Author>> {
    let author = state.services.authors.get_by_id(id).await?;
    Ok(Json(author))
}

/// Create author
#[utoipa::path(
    post,
    path = "/authors",
    tag = "authors",
    request_body = CreateAuthor,
    responses(
        (status = 200, description = "Author created", body = Author),
        (status = 400, description = "Invalid or duplicate name", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_author(
    State(state): State<crate::AppState>,
    ValidatedJson(data): ValidatedJson<CreateAuthor>,
) -> AppResult<Json<Author>> {
    let author = state.services.authors.create(data).await?;
    Ok(Json(author))
}

/// Update author
#[utoipa::path(
    put,
    path = "/authors/{id}",
    tag = "authors",
    params(("id" = i32, Path, description = "Author ID")),
    request_body = UpdateAuthor,
    responses(
        (status = 200, description = "Author updated", body = Author),
        (status = 404, description = "Author not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_author(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    ValidatedJson(data): ValidatedJson<UpdateAuthor>,
) -> AppResult<Json<Author>> {
    let author = state.services.authors.update(id, data).await?;
    Ok(Json(author))
}

/// Deactivate author and unlink it from its books
#[utoipa::path(
    delete,
    path = "/authors/{id}",
    tag = "authors",
    params(("id" = i32, Path, description = "Author ID")),
    responses(
        (status = 200, description = "Author deactivated", body = DeletedResponse),
        (status = 404, description = "Author not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_author(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<DeletedResponse>> {
    state.services.authors.delete(id).await?;
    Ok(Json(DeletedResponse {
        message: "Author deleted".to_string(),
        id,
    }))
}

/// Books written by an author
#[utoipa::path(
    get,
    path = "/authors/{id}/books",
    tag = "authors",
    params(("id" = i32, Path, description = "Author ID")),
    responses(
        (status = 200, description = "Books by the author", body = Vec<Book>),
        (status = 404, description = "Author not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_author_books(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.authors.books(id).await?;
    Ok(Json(books))
}
