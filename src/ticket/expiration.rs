//! Pure expiration policies attached to every ticket.
//!
//! A policy only looks at the ticket's creation instant, last/previous use instants, and use
//! count. None of those values ever decrease, so once a policy reports a snapshot as expired,
//! every later snapshot of the same ticket is expired too. Non-positive durations are treated as
//! "already expired" so misconfiguration fails closed.

// self
use crate::{_prelude::*, ticket::Ticket};

/// Expiration policy variants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExpirationPolicy {
	/// Never expires.
	NeverExpires,
	/// Expires once the ticket is older than `time_to_kill`, regardless of use.
	TimeToKill {
		/// Maximum age measured from creation.
		time_to_kill: Duration,
	},
	/// Hard ceiling for ticket-granting tickets; same semantics as [`Self::TimeToKill`].
	HardTimeout {
		/// Maximum age measured from creation.
		time_to_kill: Duration,
	},
	/// Expires after `number_of_uses` uses or once idle for longer than `time_to_kill`.
	MultiTimeUseOrTimeout {
		/// Uses after which the ticket is expired.
		number_of_uses: u32,
		/// Maximum idle time measured from the last use.
		time_to_kill: Duration,
	},
	/// Idle timeout bounded by an absolute lifetime (the usual ticket-granting ticket policy).
	Sliding {
		/// Maximum age measured from creation.
		max_time_to_live: Duration,
		/// Maximum idle time measured from the last use.
		time_to_kill: Duration,
	},
	/// Idle timeout that additionally expires a ticket used twice within
	/// `time_in_between_uses`.
	Throttled {
		/// Minimum spacing between two consecutive uses.
		time_in_between_uses: Duration,
		/// Maximum idle time measured from the last use.
		time_to_kill: Duration,
	},
}
impl ExpirationPolicy {
	/// Single-use policy typically applied to service and proxy tickets.
	pub const fn single_use(time_to_kill: Duration) -> Self {
		Self::MultiTimeUseOrTimeout { number_of_uses: 1, time_to_kill }
	}

	/// Returns `true` when the ticket snapshot is expired at `now`.
	pub fn is_expired_at(&self, ticket: &Ticket, now: OffsetDateTime) -> bool {
		let age = now - ticket.creation_time;
		let idle = now - ticket.last_time_used;

		match self {
			Self::NeverExpires => false,
			Self::TimeToKill { time_to_kill } | Self::HardTimeout { time_to_kill } =>
				exceeded(age, *time_to_kill),
			Self::MultiTimeUseOrTimeout { number_of_uses, time_to_kill } =>
				ticket.count_of_uses >= *number_of_uses || exceeded(idle, *time_to_kill),
			Self::Sliding { max_time_to_live, time_to_kill } =>
				exceeded(age, *max_time_to_live) || exceeded(idle, *time_to_kill),
			Self::Throttled { time_in_between_uses, time_to_kill } => {
				if exceeded(idle, *time_to_kill) {
					return true;
				}

				match ticket.previous_time_used {
					Some(_) if !time_in_between_uses.is_positive() => true,
					Some(previous) => ticket.last_time_used - previous < *time_in_between_uses,
					None => false,
				}
			},
		}
	}

	/// Convenience helper that checks against the current UTC instant.
	pub fn is_expired(&self, ticket: &Ticket) -> bool {
		self.is_expired_at(ticket, OffsetDateTime::now_utc())
	}
}
impl Default for ExpirationPolicy {
	fn default() -> Self {
		Self::NeverExpires
	}
}

fn exceeded(elapsed: Duration, limit: Duration) -> bool {
	!limit.is_positive() || elapsed > limit
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{_preludet::test_authentication, ticket::TicketFactory};

	fn ticket(policy: ExpirationPolicy, created: OffsetDateTime) -> Ticket {
		let mut ticket =
			TicketFactory::default().ticket_granting.create(test_authentication("alice"));

		ticket.creation_time = created;
		ticket.last_time_used = created;
		ticket.expiration_policy = policy;

		ticket
	}

	#[test]
	fn time_to_kill_ignores_use() {
		let created = macros::datetime!(2025-01-01 00:00 UTC);
		let policy = ExpirationPolicy::TimeToKill { time_to_kill: Duration::minutes(10) };
		let mut t = ticket(policy.clone(), created);

		t.record_use(created + Duration::minutes(9));

		assert!(!policy.is_expired_at(&t, created + Duration::minutes(10)));
		assert!(policy.is_expired_at(&t, created + Duration::minutes(11)));
	}

	#[test]
	fn single_use_expires_after_first_use() {
		let created = macros::datetime!(2025-01-01 00:00 UTC);
		let policy = ExpirationPolicy::single_use(Duration::seconds(10));
		let mut t = ticket(policy.clone(), created);

		assert!(!policy.is_expired_at(&t, created + Duration::seconds(1)));

		t.record_use(created + Duration::seconds(1));

		assert!(policy.is_expired_at(&t, created + Duration::seconds(1)));
	}

	#[test]
	fn multi_use_times_out_from_last_use() {
		let created = macros::datetime!(2025-01-01 00:00 UTC);
		let policy = ExpirationPolicy::MultiTimeUseOrTimeout {
			number_of_uses: 5,
			time_to_kill: Duration::seconds(10),
		};
		let mut t = ticket(policy.clone(), created);

		t.record_use(created + Duration::seconds(8));

		assert!(!policy.is_expired_at(&t, created + Duration::seconds(17)));
		assert!(policy.is_expired_at(&t, created + Duration::seconds(19)));
	}

	#[test]
	fn sliding_policy_honors_both_limits() {
		let created = macros::datetime!(2025-01-01 00:00 UTC);
		let policy = ExpirationPolicy::Sliding {
			max_time_to_live: Duration::hours(8),
			time_to_kill: Duration::hours(2),
		};
		let mut t = ticket(policy.clone(), created);

		assert!(policy.is_expired_at(&t, created + Duration::hours(3)));

		for hour in 1..=7 {
			t.record_use(created + Duration::hours(hour));
		}

		assert!(!policy.is_expired_at(&t, created + Duration::hours(8)));
		assert!(policy.is_expired_at(&t, created + Duration::hours(8) + Duration::seconds(1)));
	}

	#[test]
	fn throttled_policy_rejects_rapid_reuse() {
		let created = macros::datetime!(2025-01-01 00:00 UTC);
		let policy = ExpirationPolicy::Throttled {
			time_in_between_uses: Duration::seconds(5),
			time_to_kill: Duration::minutes(30),
		};
		let mut t = ticket(policy.clone(), created);

		t.record_use(created + Duration::seconds(10));

		assert!(!policy.is_expired_at(&t, created + Duration::seconds(11)));

		t.record_use(created + Duration::seconds(12));

		assert!(policy.is_expired_at(&t, created + Duration::seconds(13)));
	}

	#[test]
	fn non_positive_durations_fail_closed() {
		let created = macros::datetime!(2025-01-01 00:00 UTC);

		for policy in [
			ExpirationPolicy::TimeToKill { time_to_kill: Duration::ZERO },
			ExpirationPolicy::HardTimeout { time_to_kill: Duration::seconds(-1) },
			ExpirationPolicy::single_use(Duration::ZERO),
			ExpirationPolicy::Sliding {
				max_time_to_live: Duration::ZERO,
				time_to_kill: Duration::hours(1),
			},
		] {
			let t = ticket(policy.clone(), created);

			assert!(policy.is_expired_at(&t, created), "{policy:?} should be expired immediately.");
		}

		let never = ExpirationPolicy::NeverExpires;

		assert!(
			!never.is_expired_at(&ticket(never.clone(), created), created + Duration::days(3650))
		);
	}

	#[test]
	fn expiry_is_monotonic_over_later_snapshots() {
		let created = macros::datetime!(2025-01-01 00:00 UTC);
		let policy = ExpirationPolicy::single_use(Duration::seconds(10));
		let mut t = ticket(policy.clone(), created);
		let mut seen_expired = false;

		for step in 0..30 {
			let now = created + Duration::seconds(step);

			if step % 7 == 3 {
				t.record_use(now);
			}

			let expired = policy.is_expired_at(&t, now);

			assert!(!seen_expired || expired, "Expiry must never be undone (step {step}).");

			seen_expired |= expired;
		}

		assert!(seen_expired);
	}
}
