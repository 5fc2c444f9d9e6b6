//! Proxy-granting ticket creation.

// self
use crate::{
	_prelude::*,
	auth::AuthenticationResult,
	cas::CentralAuthenticationService,
	enforcer::{AccessRule, AuditableContext},
	error::InvalidTicketReason,
	event::CasEvent,
	obs::{AuditContext, OperationKind},
	registry::CompareAndSwapOutcome,
	ticket::{Ticket, TicketType},
};

impl CentralAuthenticationService {
	/// Creates a proxy-granting ticket for the service a service ticket was issued to.
	///
	/// The authentication result carries the proxy callback credential that was verified by the
	/// caller. Creation is serialized with validation of the same service ticket and yields at
	/// most one proxy-granting ticket per service ticket. An expired service ticket found here
	/// is removed.
	pub async fn create_proxy_granting_ticket(
		&self,
		service_ticket_id: &str,
		authentication_result: &AuthenticationResult,
	) -> Result<Ticket> {
		const KIND: OperationKind = OperationKind::CreateProxyGrantingTicket;

		let audit = Mutex::new(AuditContext::new(KIND, service_ticket_id));
		let guard = self.ticket_guard(service_ticket_id);
		let result = self
			.observe(KIND, "create_proxy_granting_ticket", &audit, async {
				let _serialized = guard.lock().await;

				self.issue_proxy_granting_ticket(service_ticket_id, authentication_result, &audit)
					.await
			})
			.await;

		self.release_ticket_guard(service_ticket_id, guard);

		result
	}

	async fn issue_proxy_granting_ticket(
		&self,
		service_ticket_id: &str,
		authentication_result: &AuthenticationResult,
		audit: &Mutex<AuditContext>,
	) -> Result<Ticket> {
		let mut service_ticket =
			self.registry.get_ticket(service_ticket_id, TicketType::Service).await?;
		let expected_version = service_ticket.version;
		let Some(service) = service_ticket.service().cloned() else {
			return Err(Error::invalid_ticket(service_ticket_id, InvalidTicketReason::NotFound));
		};

		if let Some(principal) = service_ticket.principal() {
			audit.lock().set_principal(principal.id.as_str());
		}

		let registered = self.registered_service_for(&service);
		let context = AuditableContext::default()
			.service(&service)
			.registered_service(registered.as_deref())
			.service_ticket(&service_ticket)
			.authentication_result(authentication_result);

		self.access_enforcer.execute(&context).throw_exception_if_needed()?;

		let Some(registered) = registered else {
			return Err(Error::UnauthorizedServiceAccess {
				service: service.id.clone(),
				rule: AccessRule::ServiceRegistered,
			});
		};

		if !registered.proxy_policy.is_allowed_to_proxy() {
			return Err(Error::UnauthorizedProxying { service: service.id.clone() });
		}

		let Some(grantor_id) = service_ticket.granting_ticket_id().cloned() else {
			return Err(Error::invalid_ticket(service_ticket_id, InvalidTicketReason::NotFound));
		};
		let mut grantor =
			self.registry.get_ticket(grantor_id.as_str(), TicketType::TicketGranting).await?;
		let origin = service_ticket.id.clone();
		let ticket = self.ticket_factory.proxy_granting.create(
			&mut service_ticket,
			&mut grantor,
			authentication_result.authentication.clone(),
		)?;

		self.registry.add_ticket(ticket.clone()).await?;

		match self.registry.compare_and_swap(expected_version, service_ticket).await? {
			CompareAndSwapOutcome::Updated => (),
			CompareAndSwapOutcome::VersionMismatch | CompareAndSwapOutcome::Missing => {
				self.registry.delete_single_ticket(ticket.id.as_str()).await?;

				return Err(Error::invalid_ticket(
					service_ticket_id,
					InvalidTicketReason::AlreadyUsed,
				));
			},
		}

		if !self.registry.update_ticket(grantor).await? {
			self.registry.delete_single_ticket(ticket.id.as_str()).await?;

			return Err(Error::invalid_ticket(grantor_id.as_str(), InvalidTicketReason::NotFound));
		}

		audit.lock().set_resource(ticket.id.as_str());
		self.events.publish(CasEvent::ProxyGrantingTicketCreated {
			ticket_id: ticket.id.clone(),
			service_ticket_id: origin,
			service: service.id,
		});

		Ok(ticket)
	}
}
