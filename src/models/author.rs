//! Author model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Full author model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Author {
    pub id: i32,
    pub name: String,
    pub country: Option<String>,
    pub birth_year: Option<i32>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Author summary embedded in book payloads
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AuthorShort {
    pub id: i32,
    pub name: String,
}

/// Author list filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct AuthorQuery {
    /// Case-insensitive substring of the name
    pub name: Option<String>,
    pub country: Option<String>,
    /// Include deactivated authors
    pub include_inactive: Option<bool>,
}

/// Create author request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAuthor {
    #[validate(length(min = 1, max = 200, message = "Name must be between 1 and 200 characters"))]
    pub name: String,
    pub country: Option<String>,
    #[validate(range(max = 2100, message = "Birth year out of range"))]
    pub birth_year: Option<i32>,
}

/// Update author request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateAuthor {
    #[validate(length(min = 1, max = 200, message = "Name must be between 1 and 200 characters"))]
    pub name: Option<String>,
    pub country: Option<String>,
    #[validate(range(max = 2100, message = "Birth year out of range"))]
    pub birth_year: Option<i32>,
}
