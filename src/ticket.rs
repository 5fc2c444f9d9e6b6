//! Ticket model, expiration policies, identifier generation, and per-type factories.

pub mod expiration;
pub mod factory;
pub mod id;
pub mod model;

pub use expiration::*;
pub use factory::*;
pub use id::*;
pub use model::*;
