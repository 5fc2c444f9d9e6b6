//! Validation output handed to protocol adapters.

// self
use crate::{
	_prelude::*,
	auth::{Attributes, Authentication, Principal},
	services::Service,
};

/// Immutable result of a successful service or proxy ticket validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
	/// Session root authentication, carrying the resolved username and released attributes.
	pub primary_authentication: Authentication,
	/// Authentications traversed through proxy hops, the issuing ticket's first and the
	/// session root last.
	pub chained_authentications: Vec<Authentication>,
	/// Service the ticket was validated for.
	pub service: Service,
	/// Registered service that matched the service.
	pub registered_service_id: i64,
	/// Whether the session was created in the same exchange that issued the ticket.
	pub from_new_login: bool,
	/// Whether attributes were withheld pending user consent.
	pub consent_required: bool,
}
impl Assertion {
	/// Returns a builder around the final primary authentication.
	pub fn builder(primary_authentication: Authentication, service: Service) -> AssertionBuilder {
		AssertionBuilder {
			primary_authentication,
			chained_authentications: Vec::new(),
			service,
			registered_service_id: 0,
			from_new_login: false,
			consent_required: false,
		}
	}

	/// Principal released to the service.
	pub fn principal(&self) -> &Principal {
		&self.primary_authentication.principal
	}

	/// Attributes released to the service.
	pub fn attributes(&self) -> &Attributes {
		&self.primary_authentication.principal.attributes
	}

	/// Returns `true` when the ticket was obtained through at least one proxy hop.
	pub fn is_proxied(&self) -> bool {
		self.chained_authentications.len() > 1
	}
}

/// Builder for [`Assertion`].
#[derive(Clone, Debug)]
pub struct AssertionBuilder {
	primary_authentication: Authentication,
	chained_authentications: Vec<Authentication>,
	service: Service,
	registered_service_id: i64,
	from_new_login: bool,
	consent_required: bool,
}
impl AssertionBuilder {
	/// Sets the authentication chain.
	pub fn chained_authentications(mut self, chain: Vec<Authentication>) -> Self {
		self.chained_authentications = chain;

		self
	}

	/// Sets the matched registered service id.
	pub fn registered_service_id(mut self, id: i64) -> Self {
		self.registered_service_id = id;

		self
	}

	/// Sets the new-login flag.
	pub fn from_new_login(mut self, from_new_login: bool) -> Self {
		self.from_new_login = from_new_login;

		self
	}

	/// Flags the assertion as awaiting consent.
	pub fn consent_required(mut self, consent_required: bool) -> Self {
		self.consent_required = consent_required;

		self
	}

	/// Builds the assertion; an empty chain defaults to the primary authentication alone.
	pub fn build(self) -> Assertion {
		let chained_authentications = if self.chained_authentications.is_empty() {
			vec![self.primary_authentication.clone()]
		} else {
			self.chained_authentications
		};

		Assertion {
			primary_authentication: self.primary_authentication,
			chained_authentications,
			service: self.service,
			registered_service_id: self.registered_service_id,
			from_new_login: self.from_new_login,
			consent_required: self.consent_required,
		}
	}
}
