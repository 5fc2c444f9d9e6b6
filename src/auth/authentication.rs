//! Immutable authentication records, their builder, and authentication results.

// self
use crate::{
	_prelude::*,
	auth::{Attributes, Principal},
	services::Service,
};

/// Authentication attribute that flags a "remember me" request.
pub const REMEMBER_ME_ATTRIBUTE: &str = "rememberMe";
/// Authentication attribute listing the satisfied authentication contexts (e.g. MFA providers).
pub const AUTHENTICATION_CONTEXT_ATTRIBUTE: &str = "authnContextClass";

/// Metadata describing one credential exchanged during authentication.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialMetadata {
	/// Credential type label (e.g. `UsernamePasswordCredential`).
	pub credential_type: String,
	/// Credential identifier as presented (never the secret itself).
	pub id: String,
}

/// Immutable record of a completed authentication event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
	/// Authenticated principal.
	pub principal: Principal,
	/// Credentials that took part in the authentication.
	pub credentials: Vec<CredentialMetadata>,
	/// Names of the handlers that succeeded.
	pub successes: BTreeSet<String>,
	/// Instant the authentication completed.
	#[serde(with = "time::serde::rfc3339")]
	pub authentication_date: OffsetDateTime,
	/// Authentication-level attributes (remember-me, satisfied contexts, ...).
	pub attributes: Attributes,
}
impl Authentication {
	/// Returns a builder for the provided principal.
	pub fn builder(principal: Principal) -> AuthenticationBuilder {
		AuthenticationBuilder::new(principal)
	}

	/// Returns a builder seeded with a copy of this authentication.
	///
	/// The original value is never mutated; use this to attach a release-filtered principal.
	pub fn to_builder(&self) -> AuthenticationBuilder {
		AuthenticationBuilder {
			principal: self.principal.clone(),
			credentials: self.credentials.clone(),
			successes: self.successes.clone(),
			authentication_date: Some(self.authentication_date),
			attributes: self.attributes.clone(),
		}
	}

	/// Returns `true` when the user asked to be remembered.
	pub fn is_remember_me(&self) -> bool {
		self.attributes
			.get(REMEMBER_ME_ATTRIBUTE)
			.is_some_and(|values| values.iter().any(|v| v.eq_ignore_ascii_case("true")))
	}

	/// Authentication contexts satisfied by this authentication.
	pub fn authentication_contexts(&self) -> impl Iterator<Item = &str> {
		self.attributes
			.get(AUTHENTICATION_CONTEXT_ATTRIBUTE)
			.into_iter()
			.flat_map(|values| values.iter().map(String::as_str))
	}
}

/// Builder for [`Authentication`].
#[derive(Clone, Debug)]
pub struct AuthenticationBuilder {
	principal: Principal,
	credentials: Vec<CredentialMetadata>,
	successes: BTreeSet<String>,
	authentication_date: Option<OffsetDateTime>,
	attributes: Attributes,
}
impl AuthenticationBuilder {
	fn new(principal: Principal) -> Self {
		Self {
			principal,
			credentials: Vec::new(),
			successes: BTreeSet::new(),
			authentication_date: None,
			attributes: Attributes::new(),
		}
	}

	/// Replaces the principal.
	pub fn principal(mut self, principal: Principal) -> Self {
		self.principal = principal;

		self
	}

	/// Records a credential that took part in the authentication.
	pub fn credential(
		mut self,
		credential_type: impl Into<String>,
		id: impl Into<String>,
	) -> Self {
		self.credentials
			.push(CredentialMetadata { credential_type: credential_type.into(), id: id.into() });

		self
	}

	/// Records a successful authentication handler.
	pub fn success(mut self, handler: impl Into<String>) -> Self {
		self.successes.insert(handler.into());

		self
	}

	/// Adds (or replaces) an authentication attribute.
	pub fn attribute<I, S>(mut self, name: impl Into<String>, values: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.attributes.insert(name.into(), values.into_iter().map(Into::into).collect());

		self
	}

	/// Overrides the authentication instant.
	pub fn authentication_date(mut self, instant: OffsetDateTime) -> Self {
		self.authentication_date = Some(instant);

		self
	}

	/// Consumes the builder and produces an [`Authentication`].
	pub fn build(self) -> Authentication {
		Authentication {
			principal: self.principal,
			credentials: self.credentials,
			successes: self.successes,
			authentication_date: self.authentication_date.unwrap_or_else(OffsetDateTime::now_utc),
			attributes: self.attributes,
		}
	}
}

/// Outcome of one or more credential exchanges, handed to the ticket operations.
#[derive(Clone, Debug)]
pub struct AuthenticationResult {
	/// Authentication produced by the exchanges.
	pub authentication: Authentication,
	/// Service the authentication was requested for, if any.
	pub service: Option<Service>,
	/// Whether credentials were provided in the current exchange.
	pub credential_provided: bool,
}
impl AuthenticationResult {
	/// Wraps an authentication produced from freshly provided credentials.
	pub fn new(authentication: Authentication) -> Self {
		Self { authentication, service: None, credential_provided: true }
	}

	/// Attaches the target service.
	pub fn with_service(mut self, service: Service) -> Self {
		self.service = Some(service);

		self
	}

	/// Overrides the credential-provided flag.
	pub fn with_credential_provided(mut self, provided: bool) -> Self {
		self.credential_provided = provided;

		self
	}
}
