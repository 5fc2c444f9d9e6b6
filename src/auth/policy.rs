//! Authentication policies evaluated against a target service before tickets are issued or
//! validated.
//!
//! Policies are contextual: each one receives the `(service, registered service)` pair the
//! authentication is about to be used for, so per-service requirements such as a multifactor
//! context can be expressed without the orchestrator knowing about them.

// self
use crate::{
	_prelude::*,
	auth::Authentication,
	services::{RegisteredService, Service},
};

/// Target of an authentication policy evaluation.
#[derive(Clone, Debug)]
pub struct ServiceContext {
	/// Service selected for the request.
	pub service: Service,
	/// Registered service that matched the service.
	pub registered_service: Arc<RegisteredService>,
}
impl ServiceContext {
	/// Creates a new context.
	pub fn new(service: Service, registered_service: Arc<RegisteredService>) -> Self {
		Self { service, registered_service }
	}
}

/// Decides whether an authentication satisfies the requirements of a target service.
pub trait AuthenticationPolicy
where
	Self: Send + Sync,
{
	/// Stable policy name reported when the policy is not satisfied.
	fn name(&self) -> &str;

	/// Returns `true` when the authentication may be used for the context.
	fn is_satisfied_by(&self, authentication: &Authentication, context: &ServiceContext) -> bool;
}

/// Policy that accepts every authentication.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAnyAuthenticationPolicy;
impl AuthenticationPolicy for AcceptAnyAuthenticationPolicy {
	fn name(&self) -> &str {
		"accept-any"
	}

	fn is_satisfied_by(&self, _: &Authentication, _: &ServiceContext) -> bool {
		true
	}
}

/// Requires one of the registered service's authentication contexts (e.g. an MFA provider) to
/// be present on the authentication.
///
/// Services without required contexts accept every authentication.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequiredAuthenticationContextPolicy;
impl AuthenticationPolicy for RequiredAuthenticationContextPolicy {
	fn name(&self) -> &str {
		"required-authentication-context"
	}

	fn is_satisfied_by(&self, authentication: &Authentication, context: &ServiceContext) -> bool {
		let required = &context.registered_service.required_authentication_contexts;

		if required.is_empty() {
			return true;
		}

		authentication.authentication_contexts().any(|ctx| required.contains(ctx))
	}
}

/// Requires a named authentication handler to have succeeded.
#[derive(Clone, Debug)]
pub struct RequiredHandlerAuthenticationPolicy {
	handler: String,
}
impl RequiredHandlerAuthenticationPolicy {
	/// Creates a policy requiring `handler`.
	pub fn new(handler: impl Into<String>) -> Self {
		Self { handler: handler.into() }
	}
}
impl AuthenticationPolicy for RequiredHandlerAuthenticationPolicy {
	fn name(&self) -> &str {
		"required-handler"
	}

	fn is_satisfied_by(&self, authentication: &Authentication, _: &ServiceContext) -> bool {
		authentication.successes.contains(&self.handler)
	}
}

/// Returns the name of the first policy the authentication fails, if any.
pub fn first_unsatisfied<'a>(
	policies: &'a [Arc<dyn AuthenticationPolicy>],
	authentication: &Authentication,
	context: &ServiceContext,
) -> Option<&'a str> {
	policies
		.iter()
		.find(|policy| !policy.is_satisfied_by(authentication, context))
		.map(|policy| policy.name())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::{test_authentication, test_registered_service, test_service},
		auth::AUTHENTICATION_CONTEXT_ATTRIBUTE,
	};

	fn context(required: &[&str]) -> ServiceContext {
		let mut registered = test_registered_service(1, "https://app\\.example\\.org.*");

		registered.required_authentication_contexts =
			required.iter().map(|s| s.to_string()).collect();

		ServiceContext::new(test_service("https://app.example.org"), Arc::new(registered))
	}

	#[test]
	fn context_policy_requires_matching_context() {
		let policy = RequiredAuthenticationContextPolicy;
		let plain = test_authentication("alice");
		let mfa =
			plain.to_builder().attribute(AUTHENTICATION_CONTEXT_ATTRIBUTE, ["mfa-duo"]).build();

		assert!(policy.is_satisfied_by(&plain, &context(&[])));
		assert!(!policy.is_satisfied_by(&plain, &context(&["mfa-duo"])));
		assert!(policy.is_satisfied_by(&mfa, &context(&["mfa-duo", "mfa-totp"])));
	}

	#[test]
	fn first_unsatisfied_reports_policy_name() {
		let policies: Vec<Arc<dyn AuthenticationPolicy>> = vec![
			Arc::new(AcceptAnyAuthenticationPolicy),
			Arc::new(RequiredHandlerAuthenticationPolicy::new(
				"X509CredentialsAuthenticationHandler",
			)),
		];
		let authentication = test_authentication("alice");

		assert_eq!(
			first_unsatisfied(&policies, &authentication, &context(&[])),
			Some("required-handler")
		);
		assert_eq!(first_unsatisfied(&policies[..1], &authentication, &context(&[])), None);
	}
}
