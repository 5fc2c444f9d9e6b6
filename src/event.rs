//! Fire-and-forget notifications published by the ticket operations.
//!
//! Events are observability only: the operations behave identically with zero sinks, and a
//! sink can never fail an operation.

// self
use crate::{_prelude::*, obs::OperationKind, ticket::TicketId};

/// Notification emitted once an operation has taken effect (or failed, for validation).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CasEvent {
	/// A single sign-on session started.
	TicketGrantingTicketCreated {
		/// New ticket id.
		ticket_id: TicketId,
		/// Authenticated principal id.
		principal: String,
	},
	/// A service ticket was granted.
	ServiceTicketGranted {
		/// New ticket id.
		ticket_id: TicketId,
		/// Issuing granting ticket.
		granting_ticket_id: TicketId,
		/// Service the ticket is bound to.
		service: String,
	},
	/// A proxy ticket was granted.
	ProxyTicketGranted {
		/// New ticket id.
		ticket_id: TicketId,
		/// Issuing proxy-granting ticket.
		granting_ticket_id: TicketId,
		/// Service the ticket is bound to.
		service: String,
	},
	/// A proxy-granting ticket was created.
	ProxyGrantingTicketCreated {
		/// New ticket id.
		ticket_id: TicketId,
		/// Service ticket it was created from.
		service_ticket_id: TicketId,
		/// Proxying service.
		service: String,
	},
	/// A service or proxy ticket was validated.
	ServiceTicketValidated {
		/// Validated ticket id.
		ticket_id: TicketId,
		/// Service that validated the ticket.
		service: String,
		/// Principal id released to the service.
		principal: String,
	},
	/// Validation of a service or proxy ticket failed.
	ServiceTicketValidationFailed {
		/// Presented ticket id.
		ticket_id: String,
		/// Presented service.
		service: String,
		/// Protocol error code of the failure.
		code: String,
	},
	/// A single sign-on session ended.
	TicketGrantingTicketDestroyed {
		/// Destroyed ticket id.
		ticket_id: TicketId,
		/// Principal id of the session.
		principal: String,
		/// Number of tickets removed, descendants included.
		tickets_removed: usize,
	},
}
impl CasEvent {
	/// Operation the event belongs to.
	pub const fn operation(&self) -> OperationKind {
		match self {
			Self::TicketGrantingTicketCreated { .. } => OperationKind::CreateTicketGrantingTicket,
			Self::ServiceTicketGranted { .. } => OperationKind::GrantServiceTicket,
			Self::ProxyTicketGranted { .. } => OperationKind::GrantProxyTicket,
			Self::ProxyGrantingTicketCreated { .. } => OperationKind::CreateProxyGrantingTicket,
			Self::ServiceTicketValidated { .. } | Self::ServiceTicketValidationFailed { .. } =>
				OperationKind::ValidateServiceTicket,
			Self::TicketGrantingTicketDestroyed { .. } =>
				OperationKind::DestroyTicketGrantingTicket,
		}
	}
}

/// Receives [`CasEvent`]s.
pub trait EventSink
where
	Self: Send + Sync,
{
	/// Handles one event. Implementations must not block for long or panic.
	fn publish(&self, event: &CasEvent);
}
impl<F> EventSink for F
where
	F: Fn(&CasEvent) + Send + Sync,
{
	fn publish(&self, event: &CasEvent) {
		self(event)
	}
}

/// Ordered list of sinks every event is delivered to.
#[derive(Clone, Default)]
pub struct EventPublisher {
	sinks: Vec<Arc<dyn EventSink>>,
}
impl EventPublisher {
	/// Appends a sink.
	pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
		self.sinks.push(sink);

		self
	}

	/// Number of registered sinks.
	pub fn len(&self) -> usize {
		self.sinks.len()
	}

	/// Returns `true` when no sink is registered.
	pub fn is_empty(&self) -> bool {
		self.sinks.is_empty()
	}

	/// Delivers the event to every sink in registration order.
	pub fn publish(&self, event: CasEvent) {
		for sink in &self.sinks {
			sink.publish(&event);
		}
	}
}
impl Debug for EventPublisher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("EventPublisher").field("sinks", &self.sinks.len()).finish()
	}
}
