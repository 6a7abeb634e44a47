//! Domains module containing business logic organized by bounded contexts.
//!
//! The tools and the explorer share no runtime state; resources read from
//! both.

pub mod explorer;
pub mod resources;
pub mod tools;
