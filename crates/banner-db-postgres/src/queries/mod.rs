//! SQL query implementations.

pub mod banners;
