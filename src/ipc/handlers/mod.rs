pub mod core;
pub mod enrollments;
pub mod reports;
pub mod scores;
pub mod setup;
