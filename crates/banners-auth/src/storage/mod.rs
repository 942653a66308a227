//! Storage traits for auth-related data.

mod user;

pub use user::{NewUser, User, UserRole, UserStorage};
