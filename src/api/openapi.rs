//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{authors, books, health, members, reservations};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Biblio API",
        version = "0.3.0",
        description = "Library reservations REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Authors
        authors::list_authors,
        authors::get_author,
        authors::create_author,
        authors::update_author,
        authors::delete_author,
        authors::list_author_books,
        // Books
        books::list_books,
        books::get_book,
        books::get_book_by_isbn,
        books::create_book,
        books::update_book,
        books::delete_book,
        books::list_book_reservations,
        // Members
        members::list_members,
        members::get_member,
        members::create_member,
        members::update_member,
        members::delete_member,
        members::list_member_reservations,
        // Reservations
        reservations::list_reservations,
        reservations::get_reservation,
        reservations::create_reservation,
        reservations::update_reservation,
        reservations::delete_reservation,
    ),
    components(
        schemas(
            // Authors
            crate::models::author::Author,
            crate::models::author::AuthorShort,
            crate::models::author::CreateAuthor,
            crate::models::author::UpdateAuthor,
            // Books
            crate::models::book::Book,
            crate::models::book::BookShort,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            // Members
            crate::models::member::Member,
            crate::models::member::MemberDetails,
            crate::models::member::MemberShort,
            crate::models::member::CreateMember,
            crate::models::member::UpdateMember,
            // Reservations
            crate::models::reservation::ReservationStatus,
            crate::models::reservation::DisplaySnapshot,
            crate::models::reservation::ReservationDetails,
            crate::models::reservation::CreateReservation,
            crate::models::reservation::UpdateReservationStatus,
            reservations::ReservationCreatedResponse,
            reservations::StatusChangeResponse,
            super::DeletedResponse,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "authors", description = "Author registry"),
        (name = "books", description = "Book catalog"),
        (name = "members", description = "Member registry"),
        (name = "reservations", description = "Reservations and copy accounting")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_reservation_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/reservations"));
        assert!(doc.paths.paths.contains_key("/reservations/{id}"));
        assert!(doc.paths.paths.contains_key("/books/isbn/{isbn}"));
    }
}
