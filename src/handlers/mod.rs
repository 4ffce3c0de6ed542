//! HTTP handlers.

pub mod presign;
