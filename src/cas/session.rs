//! Session entry and exit: ticket-granting ticket creation and destruction.

// self
use crate::{
	_prelude::*,
	auth::AuthenticationResult,
	cas::CentralAuthenticationService,
	enforcer::AuditableContext,
	event::CasEvent,
	logout::LogoutRequest,
	obs::{self, AuditContext, OperationKind},
	ticket::{Ticket, TicketType},
};

impl CentralAuthenticationService {
	/// Starts a single sign-on session for the authentication result.
	///
	/// When the result names a target service, that service must pass access enforcement for
	/// the authentication before the ticket is minted.
	pub async fn create_ticket_granting_ticket(
		&self,
		authentication_result: &AuthenticationResult,
	) -> Result<Ticket> {
		const KIND: OperationKind = OperationKind::CreateTicketGrantingTicket;

		let principal = authentication_result.authentication.principal.id.to_string();
		let audit =
			Mutex::new(AuditContext::new(KIND, principal.clone()).with_principal(principal));

		self.observe(KIND, "create_ticket_granting_ticket", &audit, async {
			if let Some(requested) = &authentication_result.service {
				let service = self.selection_plan.resolve(requested);
				let registered = self.registered_service_for(&service);
				let context = AuditableContext::default()
					.service(&service)
					.registered_service(registered.as_deref())
					.authentication_result(authentication_result);

				self.access_enforcer.execute(&context).throw_exception_if_needed()?;
			}

			let ticket = self
				.ticket_factory
				.ticket_granting
				.create(authentication_result.authentication.clone());

			self.registry.add_ticket(ticket.clone()).await?;
			audit.lock().set_resource(ticket.id.as_str());
			self.events.publish(CasEvent::TicketGrantingTicketCreated {
				ticket_id: ticket.id.clone(),
				principal: authentication_result.authentication.principal.id.to_string(),
			});

			Ok(ticket)
		})
		.await
	}

	/// Ends a single sign-on session.
	///
	/// A missing or expired ticket counts as already logged out. Logout notifications are
	/// computed for every service the session (and its proxy-granting descendants) reached and
	/// returned with their individual delivery status; undeliverable notifications never fail
	/// the logout.
	pub async fn destroy_ticket_granting_ticket(
		&self,
		ticket_granting_ticket_id: &str,
	) -> Result<Vec<LogoutRequest>> {
		const KIND: OperationKind = OperationKind::DestroyTicketGrantingTicket;

		let audit = Mutex::new(AuditContext::new(KIND, ticket_granting_ticket_id));

		self.observe(KIND, "destroy_ticket_granting_ticket", &audit, async {
			let ticket = match self
				.registry
				.get_ticket(ticket_granting_ticket_id, TicketType::TicketGranting)
				.await
			{
				Ok(ticket) => ticket,
				Err(Error::InvalidTicket { reason, .. }) => {
					obs::diag!(
						debug,
						ticket_id = ticket_granting_ticket_id,
						%reason,
						"Session already ended."
					);

					return Ok(Vec::new());
				},
				Err(e) => return Err(e),
			};
			let principal = ticket.principal().map(|principal| principal.id.to_string());

			if let Some(principal) = &principal {
				audit.lock().set_principal(principal.as_str());
			}

			let descendants = self.registry.granting_descendants(&ticket).await?;
			let requests = self.logout_manager.perform_logout(&ticket, &descendants).await;
			let tickets_removed = self.registry.delete_ticket(ticket_granting_ticket_id).await?;

			self.events.publish(CasEvent::TicketGrantingTicketDestroyed {
				ticket_id: ticket.id.clone(),
				principal: principal.unwrap_or_default(),
				tickets_removed,
			});

			Ok(requests)
		})
		.await
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::{
			build_test_cas, test_authentication_result, test_registered_service, test_service,
		},
		enforcer::AccessRule,
		error::InvalidTicketReason,
		services::AccessStrategy,
	};

	#[tokio::test]
	async fn target_service_is_enforced_before_minting() {
		let disabled = test_registered_service(1, "https://app\\.example\\.org/.*")
			.with_access_strategy(AccessStrategy::new(false, true));
		let (cas, registry) = build_test_cas(vec![disabled]);
		let result = test_authentication_result("alice")
			.with_service(test_service("https://app.example.org/login"));
		let err = cas
			.create_ticket_granting_ticket(&result)
			.await
			.expect_err("Disabled target service should be refused.");

		assert!(matches!(
			err,
			Error::UnauthorizedServiceAccess { rule: AccessRule::ServiceAccessAllowed, .. }
		));
		assert!(registry.is_empty());
	}

	#[tokio::test]
	async fn destroying_an_unknown_session_is_not_an_error() {
		let (cas, _) = build_test_cas(vec![]);
		let requests = cas
			.destroy_ticket_granting_ticket("TGT-404-missing")
			.await
			.expect("Unknown sessions count as logged out.");

		assert!(requests.is_empty());
	}

	#[tokio::test]
	async fn destroyed_sessions_cannot_be_read_back() {
		let (cas, registry) = build_test_cas(vec![test_registered_service(1, ".*")]);
		let tgt = cas
			.create_ticket_granting_ticket(&test_authentication_result("alice"))
			.await
			.expect("Ticket-granting ticket should be created.");

		cas.destroy_ticket_granting_ticket(tgt.id.as_str()).await.expect("Logout should succeed.");

		assert!(registry.is_empty());
		assert!(matches!(
			cas.get_ticket(tgt.id.as_str(), TicketType::TicketGranting).await,
			Err(Error::InvalidTicket { reason: InvalidTicketReason::NotFound, .. })
		));
	}
}
