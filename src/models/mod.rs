//! Core data models for the versioned file store.
//!
//! These entities represent the catalog rows describing stored files and the
//! JSON shape they take on the wire. They map cleanly to database tables via
//! `sqlx::FromRow` and serialize naturally as JSON via `serde`.

pub mod file_record;
pub mod resource;
