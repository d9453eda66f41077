//! Operations on the tag catalog

pub mod audit;
pub mod tags;
