//! SQL query modules for the PostgreSQL storage backend.

pub mod banners;
pub mod users;
