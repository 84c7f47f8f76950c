//! Service landing and route listing

use axum::Json;
use serde_json::{json, Value};

/// Every public route, in listing order
const ROUTES: &[(&str, &str, &str)] = &[
    ("GET", "/api/v1/health", "Liveness probe"),
    ("GET", "/api/v1/ready", "Readiness probe (database)"),
    ("GET", "/api/v1/endpoints", "This listing"),
    ("GET", "/api/v1/authors", "List authors"),
    ("POST", "/api/v1/authors", "Create an author"),
    ("GET", "/api/v1/authors/{id}", "Get an author"),
    ("PUT", "/api/v1/authors/{id}", "Update an author"),
    ("DELETE", "/api/v1/authors/{id}", "Deactivate an author"),
    ("GET", "/api/v1/authors/{id}/books", "Books by an author"),
    ("GET", "/api/v1/books", "List books"),
    ("POST", "/api/v1/books", "Create a book"),
    ("GET", "/api/v1/books/isbn/{isbn}", "Get a book by ISBN"),
    ("GET", "/api/v1/books/{id}", "Get a book"),
    ("PUT", "/api/v1/books/{id}", "Update a book"),
    ("DELETE", "/api/v1/books/{id}", "Deactivate a book"),
    ("GET", "/api/v1/books/{id}/reservations", "Reservations of a book"),
    ("GET", "/api/v1/members", "List members"),
    ("POST", "/api/v1/members", "Create a member"),
    ("GET", "/api/v1/members/{id}", "Get a member"),
    ("PUT", "/api/v1/members/{id}", "Update a member"),
    ("DELETE", "/api/v1/members/{id}", "Deactivate a member"),
    ("GET", "/api/v1/members/{id}/reservations", "Reservations of a member"),
    ("GET", "/api/v1/reservations", "List reservations"),
    ("POST", "/api/v1/reservations", "Reserve a copy"),
    ("GET", "/api/v1/reservations/{id}", "Get a reservation"),
    ("PUT", "/api/v1/reservations/{id}", "Change reservation status"),
    ("DELETE", "/api/v1/reservations/{id}", "Delete a reservation"),
];

pub async fn welcome() -> Json<Value> {
    Json(json!({
        "service": "biblio-server",
        "version": env!("CARGO_PKG_VERSION"),
        "docs": "/swagger-ui",
        "endpoints": "/api/v1/endpoints",
    }))
}

/// Plain-text route listing
pub async fn endpoints() -> String {
    ROUTES
        .iter()
        .map(|(method, path, summary)| format!("{:<6} {:<36} {}\n", method, path, summary))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listing_has_one_line_per_route() {
        let text = endpoints().await;
        assert_eq!(text.lines().count(), ROUTES.len());
        assert!(text.contains("DELETE /api/v1/reservations/{id}"));
    }
}
