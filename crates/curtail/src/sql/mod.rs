//! SQL handling ahead of `execute_sql`.

pub mod governor;

pub use governor::{Governed, govern, is_read_query};
