//! Periodic sweep removing expired tickets.
//!
//! Lazy expiry on read keeps the registry correct without this sweep; the cleaner only reclaims
//! space and makes sure expired sessions still produce their logout notifications. Scheduling
//! is left to the host (a timer task, a cron job, an admin endpoint).

// self
use crate::{
	_prelude::*,
	logout::{LogoutRequest, SingleLogoutManager},
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
	registry::TicketRegistry,
	ticket::TicketType,
};

/// Summary of one sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanReport {
	/// Tickets removed, cascaded descendants included.
	pub tickets_removed: usize,
	/// Logout notifications produced for expired sessions.
	pub logout_requests: Vec<LogoutRequest>,
}

/// Removes expired tickets, running single logout for expired ticket-granting tickets first.
#[derive(Clone)]
pub struct RegistryCleaner {
	registry: Arc<dyn TicketRegistry>,
	logout_manager: Arc<dyn SingleLogoutManager>,
}
impl RegistryCleaner {
	/// Creates a cleaner over the registry.
	pub fn new(
		registry: Arc<dyn TicketRegistry>,
		logout_manager: Arc<dyn SingleLogoutManager>,
	) -> Self {
		Self { registry, logout_manager }
	}

	/// Runs one sweep.
	pub async fn clean(&self) -> Result<CleanReport> {
		const KIND: OperationKind = OperationKind::CleanRegistry;

		let span = OperationSpan::new(KIND, "clean");

		obs::record_operation_outcome(KIND, OperationOutcome::Attempt);

		let result = span.instrument(self.sweep()).await;

		match &result {
			Ok(report) => {
				obs::diag!(debug, removed = report.tickets_removed, "Registry sweep finished.");
				obs::record_operation_outcome(KIND, OperationOutcome::Success);
			},
			Err(_) => obs::record_operation_outcome(KIND, OperationOutcome::Failure),
		}

		result
	}

	async fn sweep(&self) -> Result<CleanReport> {
		let now = OffsetDateTime::now_utc();
		let expired = self
			.registry
			.tickets()
			.await?
			.into_iter()
			.filter(|ticket| ticket.is_expired_at(now))
			.collect::<Vec<_>>();
		let mut report = CleanReport::default();

		for ticket in expired {
			if ticket.ticket_type() == TicketType::TicketGranting {
				let descendants = self.registry.granting_descendants(&ticket).await?;
				let requests = self.logout_manager.perform_logout(&ticket, &descendants).await;

				report.logout_requests.extend(requests);
				report.tickets_removed += self.registry.delete_ticket(ticket.id.as_str()).await?;
			} else if self.registry.delete_single_ticket(ticket.id.as_str()).await? {
				report.tickets_removed += 1;
			}
		}

		Ok(report)
	}
}
impl Debug for RegistryCleaner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RegistryCleaner").finish_non_exhaustive()
	}
}
