//! Relying-party model: requested services, registered services, and their per-service
//! policies (access, attribute release, proxying, username resolution).

pub mod access;
pub mod manager;
pub mod proxy;
pub mod registered;
pub mod release;
pub mod service;
pub mod username;

pub use access::*;
pub use manager::*;
pub use proxy::*;
pub use registered::*;
pub use release::*;
pub use service::*;
pub use username::*;
