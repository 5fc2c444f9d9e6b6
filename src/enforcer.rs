//! Per-service access enforcement.
//!
//! Each call site assembles an [`AuditableContext`] with whatever it knows (service,
//! registered service, tickets, authentication) and runs it through an [`AuditableExecution`].
//! The first failing rule short-circuits the chain and is preserved in the result so the error
//! and the audit record name the rule that denied access.

// self
use crate::{
	_prelude::*,
	auth::{Authentication, AuthenticationResult, Principal},
	services::{RegisteredService, Service},
	ticket::Ticket,
};

/// Named access rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessRule {
	/// A registered service must match the requested service.
	ServiceRegistered,
	/// The registered service must be enabled.
	ServiceAccessAllowed,
	/// The current instant must lie within the configured access window.
	TimeWindow,
	/// The principal must carry the required attributes and none of the rejected ones.
	PrincipalAttributes,
}
impl Display for AccessRule {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(match self {
			Self::ServiceRegistered => "service is not registered",
			Self::ServiceAccessAllowed => "service is disabled",
			Self::TimeWindow => "outside the access window",
			Self::PrincipalAttributes => "principal attributes do not satisfy the access strategy",
		})
	}
}

/// Immutable bag of everything a call site knows about the request being enforced.
#[derive(Clone, Copy, Debug, Default)]
pub struct AuditableContext<'a> {
	/// Requested service.
	pub service: Option<&'a Service>,
	/// Registered service that matched the requested service.
	pub registered_service: Option<&'a RegisteredService>,
	/// Ticket-granting (or proxy-granting) ticket backing the request.
	pub ticket_granting_ticket: Option<&'a Ticket>,
	/// Service ticket backing the request.
	pub service_ticket: Option<&'a Ticket>,
	/// Authentication backing the request.
	pub authentication: Option<&'a Authentication>,
	/// Authentication result of the current exchange.
	pub authentication_result: Option<&'a AuthenticationResult>,
}
impl<'a> AuditableContext<'a> {
	/// Sets the requested service.
	pub fn service(mut self, service: &'a Service) -> Self {
		self.service = Some(service);

		self
	}

	/// Sets the matched registered service.
	pub fn registered_service(mut self, registered_service: Option<&'a RegisteredService>) -> Self {
		self.registered_service = registered_service;

		self
	}

	/// Sets the granting ticket.
	pub fn ticket_granting_ticket(mut self, ticket: &'a Ticket) -> Self {
		self.ticket_granting_ticket = Some(ticket);

		self
	}

	/// Sets the service ticket.
	pub fn service_ticket(mut self, ticket: &'a Ticket) -> Self {
		self.service_ticket = Some(ticket);

		self
	}

	/// Sets the authentication.
	pub fn authentication(mut self, authentication: &'a Authentication) -> Self {
		self.authentication = Some(authentication);

		self
	}

	/// Sets the authentication result.
	pub fn authentication_result(mut self, result: &'a AuthenticationResult) -> Self {
		self.authentication_result = Some(result);

		self
	}

	/// Principal the context is about, taken from the most specific source available.
	pub fn principal(&self) -> Option<&'a Principal> {
		self.authentication
			.map(|authentication| &authentication.principal)
			.or_else(|| self.authentication_result.map(|result| &result.authentication.principal))
			.or_else(|| self.ticket_granting_ticket.and_then(Ticket::principal))
			.or_else(|| self.service_ticket.and_then(Ticket::principal))
	}

	/// Whether credentials were provided in the current exchange.
	pub fn credential_provided(&self) -> bool {
		self.authentication_result.is_some_and(|result| result.credential_provided)
	}

	fn service_label(&self) -> String {
		self.service
			.or_else(|| self.service_ticket.and_then(Ticket::service))
			.map(|service| service.id.clone())
			.unwrap_or_default()
	}
}

/// Outcome of an [`AuditableExecution`].
#[derive(Debug, Default)]
pub struct AuditableExecutionResult {
	failure: Option<Error>,
}
impl AuditableExecutionResult {
	/// Successful outcome.
	pub fn success() -> Self {
		Self { failure: None }
	}

	/// Failed outcome carrying the error the failed rule maps to.
	pub fn failure(error: Error) -> Self {
		Self { failure: Some(error) }
	}

	/// Returns `true` when every rule passed.
	pub fn is_success(&self) -> bool {
		self.failure.is_none()
	}

	/// Error recorded by the failed rule, if any.
	pub fn error(&self) -> Option<&Error> {
		self.failure.as_ref()
	}

	/// Raises the recorded error, if any.
	pub fn throw_exception_if_needed(self) -> Result<()> {
		match self.failure {
			Some(e) => Err(e),
			None => Ok(()),
		}
	}
}

/// Short-circuiting chain of named predicates evaluated against a context.
pub trait AuditableExecution
where
	Self: Send + Sync,
{
	/// Evaluates the context.
	fn execute(&self, context: &AuditableContext<'_>) -> AuditableExecutionResult;
}

/// Enforces the registered service's access strategy: registration, enabled flag, time
/// window, then principal attributes.
#[derive(Clone, Copy, Debug, Default)]
pub struct RegisteredServiceAccessStrategyEnforcer;
impl AuditableExecution for RegisteredServiceAccessStrategyEnforcer {
	fn execute(&self, context: &AuditableContext<'_>) -> AuditableExecutionResult {
		let deny = |rule| {
			AuditableExecutionResult::failure(Error::UnauthorizedServiceAccess {
				service: context.service_label(),
				rule,
			})
		};
		let Some(registered) = context.registered_service else {
			return deny(AccessRule::ServiceRegistered);
		};
		let strategy = &registered.access_strategy;

		if !strategy.is_service_access_allowed() {
			return deny(AccessRule::ServiceAccessAllowed);
		}
		if !strategy.is_within_window(OffsetDateTime::now_utc()) {
			return deny(AccessRule::TimeWindow);
		}
		let attributes_allowed = context.principal().is_none_or(|principal| {
			strategy.do_principal_attributes_allow_access(&principal.attributes)
		});

		if !attributes_allowed {
			return deny(AccessRule::PrincipalAttributes);
		}

		AuditableExecutionResult::success()
	}
}

/// Refuses single sign-on reuse for services that disabled it.
///
/// A proxied granting ticket is always refused; a directly authenticated one is refused once
/// it has been used without credentials being provided in the current exchange.
#[derive(Clone, Copy, Debug, Default)]
pub struct SsoAccessStrategyEnforcer;
impl AuditableExecution for SsoAccessStrategyEnforcer {
	fn execute(&self, context: &AuditableContext<'_>) -> AuditableExecutionResult {
		let (Some(registered), Some(granting)) =
			(context.registered_service, context.ticket_granting_ticket)
		else {
			return AuditableExecutionResult::success();
		};

		if registered.access_strategy.is_service_access_allowed_for_sso() {
			return AuditableExecutionResult::success();
		}

		let proxied = granting.granting().is_some_and(|state| state.is_proxied());
		let reused = granting.count_of_uses > 0 && !context.credential_provided();

		if proxied || reused {
			AuditableExecutionResult::failure(Error::UnauthorizedSsoService {
				service: context.service_label(),
			})
		} else {
			AuditableExecutionResult::success()
		}
	}
}
