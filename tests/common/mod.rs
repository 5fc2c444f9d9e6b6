//! Fixtures shared by the integration tests.

#![allow(dead_code)]

// std
use std::sync::Arc;
// crates.io
use parking_lot::Mutex;
// self
use cas_sso::{
	auth::{Authentication, AuthenticationResult, Principal},
	cas::CentralAuthenticationService,
	event::CasEvent,
	obs::InMemoryAuditTrail,
	registry::{MemoryTicketRegistry, TicketRegistry},
	services::{InMemoryServicesManager, RegisteredService, Service, ServicesManager},
	ticket::{Ticket, TicketFactory},
};

pub const APP: &str = "https://app.example.org";

/// Orchestrator wired to in-memory collaborators that the test can inspect.
pub struct Harness {
	pub cas: CentralAuthenticationService,
	pub registry: Arc<MemoryTicketRegistry>,
	pub services: Arc<InMemoryServicesManager>,
	pub events: Arc<Mutex<Vec<CasEvent>>>,
	pub audit: Arc<InMemoryAuditTrail>,
}
impl Harness {
	pub fn new(services: Vec<RegisteredService>) -> Self {
		Self::with_factory(services, TicketFactory::default())
	}

	pub fn with_factory(services: Vec<RegisteredService>, factory: TicketFactory) -> Self {
		let registry = Arc::new(MemoryTicketRegistry::default());
		let manager = Arc::new(InMemoryServicesManager::default());

		manager.load(services).expect("Registered service fixtures should compile.");

		let events = Arc::new(Mutex::new(Vec::new()));
		let audit = Arc::new(InMemoryAuditTrail::default());
		let sink = events.clone();
		let cas = CentralAuthenticationService::builder(
			registry.clone() as Arc<dyn TicketRegistry>,
			manager.clone() as Arc<dyn ServicesManager>,
		)
		.ticket_factory(factory)
		.event_sink(Arc::new(move |event: &CasEvent| sink.lock().push(event.clone())))
		.audit_trail(audit.clone())
		.build();

		Self { cas, registry, services: manager, events, audit }
	}

	pub async fn login(&self, id: &str) -> Ticket {
		self.login_with(principal(id, &[])).await
	}

	pub async fn login_with(&self, principal: Principal) -> Ticket {
		self.cas
			.create_ticket_granting_ticket(&AuthenticationResult::new(authentication(principal)))
			.await
			.expect("Ticket-granting ticket should be created.")
	}

	pub async fn grant(&self, tgt: &Ticket, url: &str) -> Ticket {
		self.cas
			.grant_service_ticket(tgt.id.as_str(), &Service::new(url), None)
			.await
			.expect("Service ticket should be granted.")
	}

	pub fn event_names(&self) -> Vec<String> {
		self.events
			.lock()
			.iter()
			.map(|event| {
				serde_json::to_value(event)
					.ok()
					.and_then(|value| {
						value.get("event").and_then(|v| v.as_str()).map(str::to_owned)
					})
					.unwrap_or_default()
			})
			.collect()
	}
}

pub fn principal(id: &str, attributes: &[(&str, &[&str])]) -> Principal {
	let mut principal = Principal::new(id).expect("Principal fixture identifier should be valid.");

	for (name, values) in attributes {
		principal = principal.with_attribute(*name, values.iter().copied());
	}

	principal
}

pub fn authentication(principal: Principal) -> Authentication {
	let id = principal.id.to_string();

	Authentication::builder(principal)
		.credential("UsernamePasswordCredential", id)
		.success("AcceptUsersAuthenticationHandler")
		.build()
}

pub fn registered(id: i64, pattern: &str) -> RegisteredService {
	RegisteredService::new(id, format!("service-{id}"), pattern)
}
