//! Infrastructure layer - storage and retry plumbing

pub mod db;
pub mod retry;
