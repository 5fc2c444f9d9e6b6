//! Service and proxy ticket validation.

// self
use crate::{
	_prelude::*,
	auth::{self, Principal, ServiceContext},
	cas::CentralAuthenticationService,
	enforcer::{AccessRule, AuditableContext},
	error::InvalidTicketReason,
	event::CasEvent,
	obs::{self, AuditContext, OperationKind},
	registry::CompareAndSwapOutcome,
	services::Service,
	ticket::{Ticket, TicketType},
	validation::Assertion,
};

impl CentralAuthenticationService {
	/// Validates a service or proxy ticket presented by `service`.
	///
	/// Identifiers failing the authenticity check are rejected before the registry is touched.
	/// The ticket is consumed under a per-id guard and a versioned registry write, so concurrent
	/// validations of one single-use ticket yield exactly one success. A ticket that failed
	/// validation or was used up is removed before this returns.
	pub async fn validate_service_ticket(
		&self,
		service_ticket_id: &str,
		service: &Service,
	) -> Result<Assertion> {
		const KIND: OperationKind = OperationKind::ValidateServiceTicket;

		let audit = Mutex::new(AuditContext::new(KIND, service_ticket_id));
		let presented = self.selection_plan.resolve(service);
		let guard = self.ticket_guard(service_ticket_id);
		let result = self
			.observe(KIND, "validate_service_ticket", &audit, async {
				if !self.ticket_factory.id_generator().verify(service_ticket_id) {
					return Err(Error::invalid_ticket(
						service_ticket_id,
						InvalidTicketReason::NotAuthentic,
					));
				}

				let _serialized = guard.lock().await;
				let mut ticket =
					self.registry.get_ticket(service_ticket_id, TicketType::Service).await?;
				let outcome = self.consume_service_ticket(&mut ticket, &presented, &audit).await;

				if outcome.is_err() || ticket.is_expired() {
					self.discard_service_ticket(service_ticket_id).await;
				}

				outcome
			})
			.await;

		self.release_ticket_guard(service_ticket_id, guard);

		if let Err(e) = &result {
			self.events.publish(CasEvent::ServiceTicketValidationFailed {
				ticket_id: service_ticket_id.to_owned(),
				service: presented.id.clone(),
				code: e.code().to_owned(),
			});
		}

		result
	}

	async fn consume_service_ticket(
		&self,
		ticket: &mut Ticket,
		presented: &Service,
		audit: &Mutex<AuditContext>,
	) -> Result<Assertion> {
		let Some(issued) = ticket.service().cloned() else {
			return Err(Error::invalid_ticket(ticket.id.as_str(), InvalidTicketReason::NotFound));
		};

		if let Some(principal) = ticket.principal() {
			audit.lock().set_principal(principal.id.as_str());
		}
		if !self.matching_strategy.matches(&issued, presented) {
			return Err(Error::UnrecognizableServiceForValidation {
				ticket_id: ticket.id.to_string(),
				expected: issued.id,
				presented: presented.id.clone(),
			});
		}

		let expected_version = ticket.version;

		ticket.record_use(OffsetDateTime::now_utc());

		match self.registry.compare_and_swap(expected_version, ticket.clone()).await? {
			CompareAndSwapOutcome::Updated => (),
			CompareAndSwapOutcome::VersionMismatch | CompareAndSwapOutcome::Missing => {
				return Err(Error::invalid_ticket(
					ticket.id.as_str(),
					InvalidTicketReason::AlreadyUsed,
				));
			},
		}

		let registered = self.registered_service_for(&issued);
		let context = AuditableContext::default()
			.service(presented)
			.registered_service(registered.as_deref())
			.service_ticket(ticket);

		self.access_enforcer.execute(&context).throw_exception_if_needed()?;

		let Some(registered) = registered else {
			return Err(Error::UnauthorizedServiceAccess {
				service: presented.id.clone(),
				rule: AccessRule::ServiceRegistered,
			});
		};
		let Some(root) = ticket.root_authentication() else {
			return Err(Error::invalid_ticket(ticket.id.as_str(), InvalidTicketReason::NotFound));
		};
		let policy_context = ServiceContext::new(presented.clone(), registered.clone());

		if let Some(policy) =
			auth::first_unsatisfied(&self.authentication_policies, root, &policy_context)
		{
			return Err(Error::UnsatisfiedAuthenticationPolicy {
				service: presented.id.clone(),
				policy: policy.to_owned(),
			});
		}

		let release_policy = &registered.attribute_release_policy;
		let mut released = release_policy.release(&root.principal);
		let consent_required = release_policy.consent_enabled
			&& self.consent_engine.is_consent_required(presented, &registered, root, &released);

		if consent_required {
			released.clear();
		}

		let username =
			registered.username_attribute_provider.resolve_username(&root.principal, presented);
		let principal = Principal::new(&username)
			.unwrap_or_else(|_| root.principal.clone())
			.with_attributes(released);
		let primary = root.to_builder().principal(principal).build();
		let from_new_login = ticket.service_state().is_some_and(|state| state.from_new_login);
		let assertion = Assertion::builder(primary, presented.clone())
			.chained_authentications(ticket.chained_authentications())
			.registered_service_id(registered.id)
			.from_new_login(from_new_login)
			.consent_required(consent_required)
			.build();

		self.events.publish(CasEvent::ServiceTicketValidated {
			ticket_id: ticket.id.clone(),
			service: presented.id.clone(),
			principal: assertion.principal().id.to_string(),
		});

		Ok(assertion)
	}

	/// Removes a consumed or rejected ticket; a failed removal is logged and left to expiry.
	async fn discard_service_ticket(&self, service_ticket_id: &str) {
		if let Err(e) = self.registry.delete_single_ticket(service_ticket_id).await {
			obs::diag!(
				warn,
				ticket_id = service_ticket_id,
				error = %e,
				"Failed to remove a consumed service ticket."
			);
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::{
			build_test_cas, test_authentication_result, test_principal, test_registered_service,
			test_service,
		},
		auth::Authentication,
		services::{AttributeReleasePolicy, AttributeReleaseRule, UsernameAttributeProvider},
	};

	const APP: &str = "https://app.example.org";

	#[tokio::test]
	async fn service_tickets_validate_once() {
		let (cas, registry) = build_test_cas(vec![test_registered_service(1, ".*")]);
		let tgt = cas
			.create_ticket_granting_ticket(&test_authentication_result("alice"))
			.await
			.expect("Ticket-granting ticket should be created.");
		let st = cas
			.grant_service_ticket(tgt.id.as_str(), &test_service(APP), None)
			.await
			.expect("Service ticket should be granted.");

		assert_eq!(registry.len(), 2);

		let assertion = cas
			.validate_service_ticket(st.id.as_str(), &test_service(APP))
			.await
			.expect("First validation should succeed.");

		assert_eq!(assertion.principal().id.as_str(), "alice");
		assert_eq!(assertion.registered_service_id, 1);
		assert!(!assertion.is_proxied());
		assert_eq!(registry.len(), 1);
		assert!(matches!(
			cas.validate_service_ticket(st.id.as_str(), &test_service(APP)).await,
			Err(Error::InvalidTicket { reason: InvalidTicketReason::NotFound, .. })
		));
		assert!(cas.ticket_guards.lock().is_empty());
	}

	#[tokio::test]
	async fn malformed_identifiers_never_reach_the_registry() {
		let (cas, _) = build_test_cas(vec![]);

		assert!(matches!(
			cas.validate_service_ticket("not a ticket", &test_service(APP)).await,
			Err(Error::InvalidTicket { reason: InvalidTicketReason::NotAuthentic, .. })
		));
		assert!(matches!(
			cas.validate_service_ticket("XT-1-abcdefghijklmnopqrst", &test_service(APP)).await,
			Err(Error::InvalidTicket { reason: InvalidTicketReason::NotAuthentic, .. })
		));
	}

	#[tokio::test]
	async fn granting_tickets_are_not_consumed_by_validation() {
		let (cas, registry) = build_test_cas(vec![test_registered_service(1, ".*")]);
		let tgt = cas
			.create_ticket_granting_ticket(&test_authentication_result("alice"))
			.await
			.expect("Ticket-granting ticket should be created.");

		assert!(matches!(
			cas.validate_service_ticket(tgt.id.as_str(), &test_service(APP)).await,
			Err(Error::InvalidTicket { .. })
		));
		assert_eq!(registry.len(), 1);
	}

	#[tokio::test]
	async fn username_and_attributes_follow_the_registered_service() {
		let registered = test_registered_service(1, ".*")
			.with_username_attribute_provider(UsernameAttributeProvider::PrincipalAttribute {
				attribute: "mail".into(),
				canonicalization: Default::default(),
			})
			.with_attribute_release_policy(AttributeReleasePolicy::new(
				AttributeReleaseRule::ReturnAllowed {
					allowed_attributes: BTreeSet::from(["mail".to_owned()]),
				},
			));
		let (cas, _) = build_test_cas(vec![registered]);
		let principal = test_principal(
			"alice",
			&[("mail", &["alice@example.org"]), ("memberOf", &["admin"])],
		);
		let authentication = Authentication::builder(principal)
			.credential("UsernamePasswordCredential", "alice")
			.success("AcceptUsersAuthenticationHandler")
			.build();
		let tgt = cas
			.create_ticket_granting_ticket(&crate::auth::AuthenticationResult::new(authentication))
			.await
			.expect("Ticket-granting ticket should be created.");
		let st = cas
			.grant_service_ticket(tgt.id.as_str(), &test_service(APP), None)
			.await
			.expect("Service ticket should be granted.");
		let assertion = cas
			.validate_service_ticket(st.id.as_str(), &test_service(APP))
			.await
			.expect("Validation should succeed.");

		assert_eq!(assertion.principal().id.as_str(), "alice@example.org");
		assert_eq!(assertion.attributes().len(), 1);
		assert!(assertion.attributes().contains_key("mail"));
	}
}
