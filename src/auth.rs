//! Principals, authentications, identifiers, and authentication policies.

pub mod authentication;
pub mod id;
pub mod policy;
pub mod principal;

pub use authentication::*;
pub use id::*;
pub use policy::*;
pub use principal::*;
