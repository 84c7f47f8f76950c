//! Library member model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Member model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Member {
    pub id: i32,
    pub name: String,
    /// Unique membership code printed on the library card
    pub code: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Member with its current number of active reservations
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemberDetails {
    #[serde(flatten)]
    pub member: Member,
    pub active_reservations: i64,
}

/// Member summary embedded in reservation payloads
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemberShort {
    pub id: i32,
    pub name: String,
    pub code: String,
    pub active: bool,
}

/// Member list filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct MemberQuery {
    pub name: Option<String>,
    pub code: Option<String>,
    pub include_inactive: Option<bool>,
}

/// Create member request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateMember {
    #[validate(length(min = 1, max = 200, message = "Name must be between 1 and 200 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 64, message = "Code must be between 1 and 64 characters"))]
    pub code: String,
}

/// Update member request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateMember {
    #[validate(length(min = 1, max = 200, message = "Name must be between 1 and 200 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 64, message = "Code must be between 1 and 64 characters"))]
    pub code: Option<String>,
}
