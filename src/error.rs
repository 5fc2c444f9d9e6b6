//! Service-level error types shared across tickets, registries, and the orchestrator.

// self
use crate::{_prelude::*, enforcer::AccessRule, registry::RegistryError, ticket::TicketType};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical error exposed by every public ticket operation.
///
/// Domain variants are recoverable by the caller and map onto protocol-level error responses
/// through [`Error::code`]. [`Error::Storage`] is reserved for registry unavailability and is
/// never used to report a missing or expired ticket.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Registry backend failure (storage unavailable, serialization).
	#[error("{0}")]
	Storage(#[source] RegistryError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// Ticket is absent, of the wrong type, expired, already consumed, or not authentic.
	#[error("Ticket `{ticket_id}` is invalid: {reason}.")]
	InvalidTicket {
		/// Ticket identifier presented by the caller.
		ticket_id: String,
		/// Why the ticket was rejected.
		reason: InvalidTicketReason,
	},
	/// Ticket identifier collided with an existing registry entry.
	#[error("Ticket `{ticket_id}` already exists in the registry.")]
	DuplicateTicket {
		/// Colliding identifier.
		ticket_id: String,
	},
	/// Registered service is missing, disabled, out of its time window, or rejects the principal.
	#[error("Access to service `{service}` is not allowed: {rule}.")]
	UnauthorizedServiceAccess {
		/// Service identifier that was requested.
		service: String,
		/// Rule that denied access.
		rule: AccessRule,
	},
	/// Single sign-on reuse is not allowed for the service.
	#[error("Service `{service}` is not allowed to participate in single sign-on.")]
	UnauthorizedSsoService {
		/// Service identifier that was requested.
		service: String,
	},
	/// Proxy policy of the involved registered service forbids proxying.
	#[error("Service `{service}` is not allowed to proxy.")]
	UnauthorizedProxying {
		/// Service identifier whose policy refused the request.
		service: String,
	},
	/// Authentication does not meet the authentication policy of the target service.
	#[error("Authentication does not satisfy the {policy} policy of service `{service}`.")]
	UnsatisfiedAuthenticationPolicy {
		/// Service identifier that was requested.
		service: String,
		/// Name of the policy that was not satisfied.
		policy: String,
	},
	/// Service ticket is valid but was issued for a different service.
	#[error(
		"Ticket `{ticket_id}` was issued for `{expected}` and cannot be validated by `{presented}`."
	)]
	UnrecognizableServiceForValidation {
		/// Validated ticket identifier.
		ticket_id: String,
		/// Service the ticket was bound to.
		expected: String,
		/// Service presented at validation time.
		presented: String,
	},
	/// A new authentication names a different principal than the single sign-on session.
	#[error("Principal `{provided}` does not match the session principal `{expected}`.")]
	MixedPrincipal {
		/// Principal bound to the ticket-granting ticket.
		expected: String,
		/// Principal carried by the new authentication.
		provided: String,
	},
}
impl Error {
	/// Creates an [`Error::InvalidTicket`] for the provided identifier.
	pub fn invalid_ticket(ticket_id: impl Into<String>, reason: InvalidTicketReason) -> Self {
		Self::InvalidTicket { ticket_id: ticket_id.into(), reason }
	}

	/// Stable protocol error code for adapters that render error responses.
	pub const fn code(&self) -> &'static str {
		match self {
			Self::Storage(_) | Self::Config(_) | Self::DuplicateTicket { .. } => "INTERNAL_ERROR",
			Self::InvalidTicket { .. } => "INVALID_TICKET",
			Self::UnauthorizedServiceAccess { .. } => "UNAUTHORIZED_SERVICE",
			Self::UnauthorizedSsoService { .. } => "UNAUTHORIZED_SSO_SERVICE",
			Self::UnauthorizedProxying { .. } => "UNAUTHORIZED_SERVICE_PROXY",
			Self::UnsatisfiedAuthenticationPolicy { .. } => "INVALID_AUTHENTICATION_CONTEXT",
			Self::UnrecognizableServiceForValidation { .. } => "INVALID_SERVICE",
			Self::MixedPrincipal { .. } => "MIXED_PRINCIPAL",
		}
	}

	/// Returns `true` for registry unavailability rather than a domain rejection.
	pub const fn is_unavailable(&self) -> bool {
		matches!(self, Self::Storage(_))
	}
}
impl From<RegistryError> for Error {
	fn from(e: RegistryError) -> Self {
		match e {
			RegistryError::Duplicate { ticket_id } => Self::DuplicateTicket { ticket_id },
			other => Self::Storage(other),
		}
	}
}

/// Reason attached to [`Error::InvalidTicket`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidTicketReason {
	/// No ticket is stored under the identifier.
	NotFound,
	/// A ticket exists but is of another kind.
	WrongType {
		/// Kind the caller asked for.
		expected: TicketType,
		/// Kind that is actually stored.
		actual: TicketType,
	},
	/// The ticket's expiration policy reports it as expired.
	Expired,
	/// Another validation consumed the ticket first.
	AlreadyUsed,
	/// The identifier failed the authenticity check.
	NotAuthentic,
}
impl Display for InvalidTicketReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::NotFound => f.write_str("not found"),
			Self::WrongType { expected, actual } =>
				write!(f, "expected a {expected} but found a {actual}"),
			Self::Expired => f.write_str("expired"),
			Self::AlreadyUsed => f.write_str("already used"),
			Self::NotAuthentic => f.write_str("not issued by this server"),
		}
	}
}

/// Configuration and validation failures raised while loading settings or services.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Settings document could not be parsed.
	#[error("Settings are invalid at `{path}`: {message}.")]
	InvalidSettings {
		/// JSON path of the offending field.
		path: String,
		/// Parser message.
		message: String,
	},
	/// Registered service definitions could not be parsed.
	#[error("Service definitions are invalid at `{path}`: {message}.")]
	InvalidServiceDefinitions {
		/// JSON path of the offending field.
		path: String,
		/// Parser message.
		message: String,
	},
	/// A registered service carries a pattern that does not compile.
	#[error("Registered service `{service}` has an invalid pattern.")]
	InvalidPattern {
		/// Registered service name (or proxy policy owner).
		service: String,
		/// Underlying regex failure.
		#[source]
		source: regex::Error,
	},
	/// Two registered services share the same numeric identifier.
	#[error("Registered service id {id} is defined more than once.")]
	DuplicateServiceId {
		/// Offending identifier.
		id: i64,
	},
}
impl ConfigError {
	/// Builds an [`ConfigError::InvalidSettings`] from a path-aware JSON failure.
	pub fn settings(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
		Self::InvalidSettings { path: e.path().to_string(), message: e.inner().to_string() }
	}

	/// Builds an [`ConfigError::InvalidServiceDefinitions`] from a path-aware JSON failure.
	pub fn service_definitions(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
		Self::InvalidServiceDefinitions {
			path: e.path().to_string(),
			message: e.inner().to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn registry_errors_split_into_duplicate_and_storage() {
		let duplicate: Error = RegistryError::Duplicate { ticket_id: "ST-1-abc".into() }.into();

		assert!(matches!(
			duplicate,
			Error::DuplicateTicket { ref ticket_id } if ticket_id == "ST-1-abc"
		));
		assert!(!duplicate.is_unavailable());

		let backend = RegistryError::Backend { message: "cache unreachable".into() };
		let error: Error = backend.clone().into();

		assert!(error.is_unavailable());
		assert_eq!(error.code(), "INTERNAL_ERROR");

		let source =
			StdError::source(&error).expect("Storage errors should expose the registry error.");

		assert_eq!(source.to_string(), backend.to_string());
	}

	#[test]
	fn domain_errors_map_to_protocol_codes() {
		let invalid = Error::invalid_ticket("ST-9-zzz", InvalidTicketReason::Expired);

		assert_eq!(invalid.code(), "INVALID_TICKET");
		assert_eq!(invalid.to_string(), "Ticket `ST-9-zzz` is invalid: expired.");

		let mismatch = Error::UnrecognizableServiceForValidation {
			ticket_id: "ST-1-a".into(),
			expected: "https://a.example.org".into(),
			presented: "https://b.example.org".into(),
		};

		assert_eq!(mismatch.code(), "INVALID_SERVICE");
		assert_eq!(
			Error::UnauthorizedProxying { service: "https://a.example.org".into() }.code(),
			"UNAUTHORIZED_SERVICE_PROXY"
		);
	}

	#[test]
	fn wrong_type_reason_names_both_kinds() {
		let reason = InvalidTicketReason::WrongType {
			expected: TicketType::Service,
			actual: TicketType::TicketGranting,
		};

		assert_eq!(
			reason.to_string(),
			"expected a service ticket but found a ticket-granting ticket"
		);
	}
}
