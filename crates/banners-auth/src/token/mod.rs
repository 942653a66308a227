//! Token generation and validation.

mod jwt;

pub use jwt::{Claims, JwtService};
