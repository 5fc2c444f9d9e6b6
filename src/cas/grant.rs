//! Service and proxy ticket grants.

// self
use crate::{
	_prelude::*,
	auth::{self, AuthenticationResult, ServiceContext},
	cas::CentralAuthenticationService,
	enforcer::{AccessRule, AuditableContext, AuditableExecution},
	error::InvalidTicketReason,
	event::CasEvent,
	obs::{AuditContext, OperationKind},
	services::{RegisteredService, Service},
	ticket::{Ticket, TicketType},
};

impl CentralAuthenticationService {
	/// Grants a service ticket for `service` from a live ticket-granting ticket.
	///
	/// A supplied authentication result must name the session principal. The requested
	/// service is passed through the selection plan, must be registered and accessible, must
	/// accept single sign-on reuse, and (for a proxied granting ticket) the proxying service
	/// must still be allowed to proxy. The authentication policies are evaluated against the
	/// new authentication when one is supplied and against the session root otherwise. Nothing
	/// is persisted unless every check passes.
	pub async fn grant_service_ticket(
		&self,
		ticket_granting_ticket_id: &str,
		service: &Service,
		authentication_result: Option<&AuthenticationResult>,
	) -> Result<Ticket> {
		const KIND: OperationKind = OperationKind::GrantServiceTicket;

		let audit = Mutex::new(AuditContext::new(KIND, service.id.as_str()));

		self.observe(KIND, "grant_service_ticket", &audit, async {
			let service = self.selection_plan.resolve(service);
			let mut granting = self
				.registry
				.get_ticket(ticket_granting_ticket_id, TicketType::TicketGranting)
				.await?;
			let Some(session_principal) = granting.principal().cloned() else {
				return Err(Error::invalid_ticket(
					ticket_granting_ticket_id,
					InvalidTicketReason::NotFound,
				));
			};

			audit.lock().set_principal(session_principal.id.as_str());

			let mixed = authentication_result.filter(|result| {
				!session_principal.is_same_subject(&result.authentication.principal)
			});

			if let Some(result) = mixed {
				return Err(Error::MixedPrincipal {
					expected: session_principal.id.to_string(),
					provided: result.authentication.principal.id.to_string(),
				});
			}

			let registered = self.registered_service_for(&service);
			let mut context = AuditableContext::default()
				.service(&service)
				.registered_service(registered.as_deref())
				.ticket_granting_ticket(&granting);

			if let Some(result) = authentication_result {
				context = context.authentication_result(result);
			}

			self.access_enforcer.execute(&context).throw_exception_if_needed()?;
			self.sso_enforcer.execute(&context).throw_exception_if_needed()?;

			let registered = require_registered(registered, &service)?;

			self.ensure_proxying_allowed(&granting)?;

			let authentication = match authentication_result {
				Some(result) => &result.authentication,
				None => granting
					.root_authentication()
					.ok_or_else(|| {
						Error::invalid_ticket(
							ticket_granting_ticket_id,
							InvalidTicketReason::NotFound,
						)
					})?,
			};
			let policy_context = ServiceContext::new(service.clone(), registered);

			if let Some(policy) = auth::first_unsatisfied(
				&self.authentication_policies,
				authentication,
				&policy_context,
			) {
				return Err(Error::UnsatisfiedAuthenticationPolicy {
					service: service.id.clone(),
					policy: policy.to_owned(),
				});
			}

			let credential_provided = authentication_result.is_some_and(|r| r.credential_provided);
			let ticket =
				self.ticket_factory.service.create(&mut granting, &service, credential_provided)?;
			let granting_ticket_id = granting.id.clone();

			self.persist_child(&ticket, granting).await?;
			audit.lock().set_resource(ticket.id.as_str());
			self.events.publish(CasEvent::ServiceTicketGranted {
				ticket_id: ticket.id.clone(),
				granting_ticket_id,
				service: service.id.clone(),
			});

			Ok(ticket)
		})
		.await
	}

	/// Grants a proxy ticket for `service` from a live proxy-granting ticket.
	///
	/// The authentication policies are evaluated against the root authentication of the
	/// session the proxy-granting ticket descends from.
	/// Access failures caused by the principal's attributes are reported as
	/// [`Error::UnauthorizedSsoService`]: a proxy has no way to provide fresh credentials.
	pub async fn grant_proxy_ticket(
		&self,
		proxy_granting_ticket_id: &str,
		service: &Service,
	) -> Result<Ticket> {
		const KIND: OperationKind = OperationKind::GrantProxyTicket;

		let audit = Mutex::new(AuditContext::new(KIND, service.id.as_str()));

		self.observe(KIND, "grant_proxy_ticket", &audit, async {
			let service = self.selection_plan.resolve(service);
			let mut proxy_granting = self
				.registry
				.get_ticket(proxy_granting_ticket_id, TicketType::ProxyGranting)
				.await?;

			if let Some(principal) = proxy_granting.principal() {
				audit.lock().set_principal(principal.id.as_str());
			}

			let registered = self.registered_service_for(&service);
			let context = AuditableContext::default()
				.service(&service)
				.registered_service(registered.as_deref())
				.ticket_granting_ticket(&proxy_granting);

			match self.access_enforcer.execute(&context).throw_exception_if_needed() {
				Err(Error::UnauthorizedServiceAccess {
					service,
					rule: AccessRule::PrincipalAttributes,
				}) => return Err(Error::UnauthorizedSsoService { service }),
				other => other?,
			}

			self.sso_enforcer.execute(&context).throw_exception_if_needed()?;

			let registered = require_registered(registered, &service)?;

			self.ensure_proxying_allowed(&proxy_granting)?;

			let Some(root) = proxy_granting.root_authentication() else {
				return Err(Error::invalid_ticket(
					proxy_granting_ticket_id,
					InvalidTicketReason::NotFound,
				));
			};
			let policy_context = ServiceContext::new(service.clone(), registered);

			if let Some(policy) =
				auth::first_unsatisfied(&self.authentication_policies, root, &policy_context)
			{
				return Err(Error::UnsatisfiedAuthenticationPolicy {
					service: service.id.clone(),
					policy: policy.to_owned(),
				});
			}

			let ticket = self.ticket_factory.proxy.create(&mut proxy_granting, &service)?;
			let granting_ticket_id = proxy_granting.id.clone();

			self.persist_child(&ticket, proxy_granting).await?;
			audit.lock().set_resource(ticket.id.as_str());
			self.events.publish(CasEvent::ProxyTicketGranted {
				ticket_id: ticket.id.clone(),
				granting_ticket_id,
				service: service.id.clone(),
			});

			Ok(ticket)
		})
		.await
	}

	/// Refuses grants from a proxied granting ticket whose proxying service may no longer proxy.
	fn ensure_proxying_allowed(&self, granting: &Ticket) -> Result<()> {
		let Some(proxied_by) = granting.granting().and_then(|state| state.proxied_by.as_ref())
		else {
			return Ok(());
		};
		let allowed = self
			.registered_service_for(proxied_by)
			.is_some_and(|registered| registered.proxy_policy.is_allowed_to_proxy());

		if allowed {
			Ok(())
		} else {
			Err(Error::UnauthorizedProxying { service: proxied_by.id.clone() })
		}
	}

	/// Stores a freshly minted child and then its updated parent.
	///
	/// The child is durable before the grant returns. Use accounting on the parent tolerates
	/// lost updates; a parent deleted concurrently (logout) takes the orphaned child with it.
	async fn persist_child(&self, child: &Ticket, parent: Ticket) -> Result<()> {
		let parent_id = parent.id.clone();

		self.registry.add_ticket(child.clone()).await?;

		if self.registry.update_ticket(parent).await? {
			return Ok(());
		}

		self.registry.delete_single_ticket(child.id.as_str()).await?;

		Err(Error::invalid_ticket(parent_id.as_str(), InvalidTicketReason::NotFound))
	}
}

fn require_registered(
	registered: Option<Arc<RegisteredService>>,
	service: &Service,
) -> Result<Arc<RegisteredService>> {
	registered.ok_or_else(|| Error::UnauthorizedServiceAccess {
		service: service.id.clone(),
		rule: AccessRule::ServiceRegistered,
	})
}
