//! Data models for Biblio

pub mod author;
pub mod book;
pub mod member;
pub mod reservation;

// Re-export commonly used types
pub use author::{Author, AuthorShort};
pub use book::{Book, BookShort};
pub use member::{Member, MemberDetails, MemberShort};
pub use reservation::{Reservation, ReservationDetails, ReservationStatus};
