//! `cardioportal-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;

pub use entity::{Entity, find_by_id};
pub use error::{DomainError, DomainResult};
pub use id::{CompanyId, DeviceId, GroupId, UserId};
