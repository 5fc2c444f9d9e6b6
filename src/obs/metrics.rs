// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::obs::{OperationKind, OperationOutcome};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_operation_outcome(kind: OperationKind, outcome: OperationOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"cas_sso_operation_total",
			"operation" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

#[derive(Debug, Default)]
struct Counters {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
}

/// Thread-safe per-operation counters owned by one orchestrator instance.
#[derive(Debug, Default)]
pub struct OperationMetrics {
	counters: [Counters; OperationKind::ALL.len()],
}
impl OperationMetrics {
	/// Returns the total number of attempts for the operation.
	pub fn attempts(&self, kind: OperationKind) -> u64 {
		self.counters[kind.index()].attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of successful calls for the operation.
	pub fn successes(&self, kind: OperationKind) -> u64 {
		self.counters[kind.index()].success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed calls for the operation.
	pub fn failures(&self, kind: OperationKind) -> u64 {
		self.counters[kind.index()].failure.load(Ordering::Relaxed)
	}

	/// Records the outcome locally and through the global recorder.
	pub(crate) fn record(&self, kind: OperationKind, outcome: OperationOutcome) {
		let counters = &self.counters[kind.index()];
		let counter = match outcome {
			OperationOutcome::Attempt => &counters.attempts,
			OperationOutcome::Success => &counters.success,
			OperationOutcome::Failure => &counters.failure,
		};

		counter.fetch_add(1, Ordering::Relaxed);
		record_operation_outcome(kind, outcome);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn counters_are_tracked_per_operation() {
		let metrics = OperationMetrics::default();

		metrics.record(OperationKind::ValidateServiceTicket, OperationOutcome::Attempt);
		metrics.record(OperationKind::ValidateServiceTicket, OperationOutcome::Failure);
		metrics.record(OperationKind::GrantServiceTicket, OperationOutcome::Success);

		assert_eq!(metrics.attempts(OperationKind::ValidateServiceTicket), 1);
		assert_eq!(metrics.failures(OperationKind::ValidateServiceTicket), 1);
		assert_eq!(metrics.successes(OperationKind::ValidateServiceTicket), 0);
		assert_eq!(metrics.successes(OperationKind::GrantServiceTicket), 1);
	}
}
