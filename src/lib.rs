//! Ticket lifecycle core for CAS-style single sign-on.
//!
//! The crate issues, validates, and destroys ticket-granting, service, proxy-granting, and proxy
//! tickets against a pluggable registry while enforcing per-service access strategies.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cas;
pub mod config;
pub mod enforcer;
pub mod error;
pub mod event;
pub mod logout;
pub mod obs;
pub mod registry;
pub mod services;
pub mod ticket;
pub mod validation;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and fixture builders for tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{Authentication, AuthenticationResult, Principal},
		cas::CentralAuthenticationService,
		registry::{MemoryTicketRegistry, TicketRegistry},
		services::{InMemoryServicesManager, RegisteredService, Service, ServicesManager},
		ticket::TicketFactory,
	};

	/// Builds a principal carrying the provided single-valued attributes.
	pub fn test_principal(id: &str, attributes: &[(&str, &[&str])]) -> Principal {
		let mut principal =
			Principal::new(id).expect("Principal fixture identifier should be valid.");

		for (name, values) in attributes {
			principal = principal.with_attribute(*name, values.iter().copied());
		}

		principal
	}

	/// Builds an authentication for the provided principal identifier.
	pub fn test_authentication(id: &str) -> Authentication {
		Authentication::builder(test_principal(id, &[]))
			.credential("UsernamePasswordCredential", id)
			.success("AcceptUsersAuthenticationHandler")
			.build()
	}

	/// Wraps [`test_authentication`] into a credential-bearing authentication result.
	pub fn test_authentication_result(id: &str) -> AuthenticationResult {
		AuthenticationResult::new(test_authentication(id))
	}

	/// Registered service fixture with the provided id and service-id pattern.
	pub fn test_registered_service(id: i64, pattern: &str) -> RegisteredService {
		RegisteredService::new(id, format!("service-{id}"), pattern)
	}

	/// Service fixture for the provided URL.
	pub fn test_service(url: &str) -> Service {
		Service::new(url)
	}

	/// Constructs a [`CentralAuthenticationService`] backed by an in-memory registry and the
	/// provided registered services.
	pub fn build_test_cas(
		services: Vec<RegisteredService>,
	) -> (CentralAuthenticationService, Arc<MemoryTicketRegistry>) {
		let registry_backend = Arc::new(MemoryTicketRegistry::default());
		let registry: Arc<dyn TicketRegistry> = registry_backend.clone();
		let manager = InMemoryServicesManager::default();

		manager.load(services).expect("Registered service fixtures should compile.");

		let services_manager: Arc<dyn ServicesManager> = Arc::new(manager);
		let cas = CentralAuthenticationService::builder(registry, services_manager)
			.ticket_factory(TicketFactory::default())
			.build();

		(cas, registry_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, BTreeSet, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use url;
#[cfg(test)] use {color_eyre as _, tokio as _};
