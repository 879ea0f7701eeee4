//! API handlers module

pub mod agent;
pub mod appointments;
pub mod ask;
pub mod health;
