//! Observability helpers for ticket operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `cas_sso.operation` with the `operation`
//!   and `stage` fields, plus diagnostic events from the registry and logout paths.
//! - Enable `metrics` to increment the `cas_sso_operation_total` counter for every
//!   attempt/success/failure, labeled by `operation` + `outcome`.
//!
//! Audit records are always produced and handed to the configured [`AuditTrail`]s.

mod audit;
mod metrics;
mod tracing;

pub use audit::*;
pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Emits a diagnostic event when the `tracing` feature is enabled.
macro_rules! diag {
	($level:ident, $($arg:tt)+) => {{
		#[cfg(feature = "tracing")]
		{
			::tracing::$level!($($arg)+);
		}
	}};
}
pub(crate) use diag;

/// Ticket operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
	/// Ticket-granting ticket creation.
	CreateTicketGrantingTicket,
	/// Service ticket grant.
	GrantServiceTicket,
	/// Proxy ticket grant.
	GrantProxyTicket,
	/// Proxy-granting ticket creation.
	CreateProxyGrantingTicket,
	/// Service or proxy ticket validation.
	ValidateServiceTicket,
	/// Ticket-granting ticket destruction (logout).
	DestroyTicketGrantingTicket,
	/// Background registry sweep.
	CleanRegistry,
}
impl OperationKind {
	/// Every kind, in declaration order.
	pub const ALL: [Self; 7] = [
		Self::CreateTicketGrantingTicket,
		Self::GrantServiceTicket,
		Self::GrantProxyTicket,
		Self::CreateProxyGrantingTicket,
		Self::ValidateServiceTicket,
		Self::DestroyTicketGrantingTicket,
		Self::CleanRegistry,
	];

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationKind::CreateTicketGrantingTicket => "create_ticket_granting_ticket",
			OperationKind::GrantServiceTicket => "grant_service_ticket",
			OperationKind::GrantProxyTicket => "grant_proxy_ticket",
			OperationKind::CreateProxyGrantingTicket => "create_proxy_granting_ticket",
			OperationKind::ValidateServiceTicket => "validate_service_ticket",
			OperationKind::DestroyTicketGrantingTicket => "destroy_ticket_granting_ticket",
			OperationKind::CleanRegistry => "clean_registry",
		}
	}

	const fn index(self) -> usize {
		self as usize
	}
}
impl Display for OperationKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OperationOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationOutcome::Attempt => "attempt",
			OperationOutcome::Success => "success",
			OperationOutcome::Failure => "failure",
		}
	}
}
impl Display for OperationOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
