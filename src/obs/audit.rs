// self
use crate::{
	_prelude::*,
	obs::{OperationKind, OperationOutcome},
};

/// Audit record captured for one ticket operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
	/// Operation performed.
	pub action: OperationKind,
	/// Resource acted upon (ticket id, service id, or principal id).
	pub resource: String,
	/// Principal on whose behalf the operation ran, when known.
	pub principal: Option<String>,
	/// Final outcome; never [`OperationOutcome::Attempt`].
	pub outcome: OperationOutcome,
	/// Stable error code on failure.
	pub error_code: Option<String>,
	/// When the operation started.
	#[serde(with = "time::serde::rfc3339")]
	pub started_at: OffsetDateTime,
	/// When the operation finished.
	#[serde(with = "time::serde::rfc3339")]
	pub finished_at: OffsetDateTime,
}

/// In-flight audit context; converted into an [`AuditRecord`] once the outcome is known.
#[derive(Clone, Debug)]
pub struct AuditContext {
	action: OperationKind,
	resource: String,
	principal: Option<String>,
	started_at: OffsetDateTime,
}
impl AuditContext {
	/// Opens a context for the operation and resource.
	pub fn new(action: OperationKind, resource: impl Into<String>) -> Self {
		Self {
			action,
			resource: resource.into(),
			principal: None,
			started_at: OffsetDateTime::now_utc(),
		}
	}

	/// Records the principal associated with the operation.
	pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
		self.principal = Some(principal.into());

		self
	}

	/// Replaces the resource once it becomes known (e.g. a freshly issued ticket id).
	pub fn set_resource(&mut self, resource: impl Into<String>) {
		self.resource = resource.into();
	}

	/// Binds the principal once it becomes known (e.g. after the ticket was resolved).
	pub fn set_principal(&mut self, principal: impl Into<String>) {
		self.principal = Some(principal.into());
	}

	/// Closes the context with the operation result.
	pub fn finish<T>(self, result: &Result<T>) -> AuditRecord {
		let (outcome, error_code) = match result {
			Ok(_) => (OperationOutcome::Success, None),
			Err(e) => (OperationOutcome::Failure, Some(e.code().to_owned())),
		};

		AuditRecord {
			action: self.action,
			resource: self.resource,
			principal: self.principal,
			outcome,
			error_code,
			started_at: self.started_at,
			finished_at: OffsetDateTime::now_utc(),
		}
	}
}

/// Destination for audit records.
pub trait AuditTrail
where
	Self: Send + Sync,
{
	/// Persists or forwards a record. Implementations must not panic.
	fn record(&self, record: &AuditRecord);
}
impl<F> AuditTrail for F
where
	F: Fn(&AuditRecord) + Send + Sync,
{
	fn record(&self, record: &AuditRecord) {
		self(record)
	}
}

/// Audit trail that keeps records in memory; handy for tests and local tooling.
#[derive(Debug, Default)]
pub struct InMemoryAuditTrail {
	records: Mutex<Vec<AuditRecord>>,
}
impl InMemoryAuditTrail {
	/// Returns a copy of every record captured so far.
	pub fn records(&self) -> Vec<AuditRecord> {
		self.records.lock().clone()
	}
}
impl AuditTrail for InMemoryAuditTrail {
	fn record(&self, record: &AuditRecord) {
		self.records.lock().push(record.clone());
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::InvalidTicketReason;

	#[test]
	fn finish_maps_results_to_outcomes() {
		let trail = InMemoryAuditTrail::default();
		let ok: Result<()> = Ok(());
		let err: Result<()> = Err(Error::InvalidTicket {
			ticket_id: "ST-1-abc".into(),
			reason: InvalidTicketReason::NotFound,
		});

		trail.record(
			&AuditContext::new(OperationKind::GrantServiceTicket, "TGT-1-abc")
				.with_principal("alice")
				.finish(&ok),
		);
		trail.record(
			&AuditContext::new(OperationKind::ValidateServiceTicket, "ST-1-abc").finish(&err),
		);

		let records = trail.records();

		assert_eq!(records.len(), 2);
		assert_eq!(records[0].outcome, OperationOutcome::Success);
		assert_eq!(records[0].principal.as_deref(), Some("alice"));
		assert_eq!(records[1].outcome, OperationOutcome::Failure);
		assert_eq!(
			records[1].error_code.as_deref(),
			Some(err.expect_err("Fixture is an error.").code())
		);
		assert!(records[1].finished_at >= records[1].started_at);
	}
}
