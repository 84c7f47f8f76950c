//! Book model and related types

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::author::AuthorShort;

/// ISBN-10 or ISBN-13, hyphens and spaces allowed between digit groups
static ISBN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d[\- ]?){9}[\dXx]$|^(?:\d[\- ]?){12}\d$").unwrap());

/// Book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub isbn: String,
    pub publication_year: Option<i32>,
    pub genre: Option<String>,
    /// Copies currently available for new reservations
    pub available_copies: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    #[sqlx(skip)]
    #[serde(default)]
    pub authors: Vec<AuthorShort>,
}

/// Canonical stored form of an ISBN: separators dropped, check digit `X` uppercased
pub fn normalize_isbn(isbn: &str) -> String {
    isbn.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

impl Book {
    pub fn has_available_copy(&self) -> bool {
        self.available_copies > 0
    }
}

/// Book summary embedded in reservation payloads
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookShort {
    pub id: i32,
    pub isbn: String,
    pub title: String,
    pub active: bool,
}

/// Book list filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Case-insensitive substring of the title
    pub title: Option<String>,
    pub isbn: Option<String>,
    /// Only books written by this author
    pub author_id: Option<i32>,
    /// Include deactivated books
    pub include_inactive: Option<bool>,
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 500, message = "Title must be between 1 and 500 characters"))]
    pub title: String,
    #[validate(regex(path = *ISBN_REGEX, message = "Invalid ISBN"))]
    pub isbn: String,
    #[validate(range(min = 0, max = 2100, message = "Publication year out of range"))]
    pub publication_year: Option<i32>,
    pub genre: Option<String>,
    #[validate(range(min = 0, message = "Copy count cannot be negative"))]
    pub available_copies: i32,
    #[serde(default)]
    pub author_ids: Vec<i32>,
}

/// Update book request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 500, message = "Title must be between 1 and 500 characters"))]
    pub title: Option<String>,
    #[validate(regex(path = *ISBN_REGEX, message = "Invalid ISBN"))]
    pub isbn: Option<String>,
    #[validate(range(min = 0, max = 2100, message = "Publication year out of range"))]
    pub publication_year: Option<i32>,
    pub genre: Option<String>,
    #[validate(range(min = 0, message = "Copy count cannot be negative"))]
    pub available_copies: Option<i32>,
    /// Replaces the whole author set when present
    pub author_ids: Option<Vec<i32>>,
    /// Re-enable (or disable) a book without touching its copies
    pub active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(isbn: &str, copies: i32) -> CreateBook {
        CreateBook {
            title: "Cien años de soledad".to_string(),
            isbn: isbn.to_string(),
            publication_year: Some(1967),
            genre: None,
            available_copies: copies,
            author_ids: vec![1],
        }
    }

    #[test]
    fn test_isbn_formats() {
        assert!(create("978-0-06-088328-7", 1).validate().is_ok());
        assert!(create("9780060883287", 1).validate().is_ok());
        assert!(create("0-306-40615-2", 1).validate().is_ok());
        assert!(create("030640615X", 1).validate().is_ok());
        assert!(create("12345", 1).validate().is_err());
        assert!(create("not-an-isbn", 1).validate().is_err());
    }

    #[test]
    fn test_normalize_isbn() {
        assert_eq!(normalize_isbn("978-0-306-40615-7"), "9780306406157");
        assert_eq!(normalize_isbn("978 0 306 40615 7"), "9780306406157");
        assert_eq!(normalize_isbn(" 9780306406157 "), "9780306406157");
        assert_eq!(normalize_isbn("0-8044-2957-x"), "080442957X");
    }

    #[test]
    fn test_negative_copies_rejected() {
        assert!(create("9780060883287", -1).validate().is_err());
    }

    #[test]
    fn test_partial_update_validates_present_fields_only() {
        let update = UpdateBook {
            available_copies: Some(4),
            ..Default::default()
        };
        assert!(update.validate().is_ok());

        let update = UpdateBook {
            isbn: Some("bogus".to_string()),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }
}
