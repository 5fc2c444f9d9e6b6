//! Thread-safe in-memory [`TicketRegistry`] for single-node deployments and tests.

// self
use crate::{
	_prelude::*,
	registry::{CompareAndSwapOutcome, RegistryError, RegistryFuture, TicketRegistry},
	ticket::{Ticket, TicketId},
};

type TicketMap = Arc<RwLock<HashMap<TicketId, Ticket>>>;

/// Registry that keeps tickets in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryTicketRegistry(TicketMap);
impl MemoryTicketRegistry {
	/// Number of stored tickets, expired ones included.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when no ticket is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Returns `true` when a ticket is stored under the identifier.
	pub fn contains(&self, id: &str) -> bool {
		self.0.read().contains_key(id)
	}

	fn add_now(map: TicketMap, ticket: Ticket) -> Result<(), RegistryError> {
		let mut guard = map.write();

		if guard.contains_key(&ticket.id) {
			return Err(RegistryError::Duplicate { ticket_id: ticket.id.to_string() });
		}

		guard.insert(ticket.id.clone(), ticket);

		Ok(())
	}

	fn update_now(map: TicketMap, mut ticket: Ticket) -> bool {
		let mut guard = map.write();

		match guard.get_mut(&ticket.id) {
			Some(stored) => {
				ticket.version = stored.version.wrapping_add(1);
				*stored = ticket;

				true
			},
			None => false,
		}
	}

	fn cas_now(map: TicketMap, expected_version: u64, mut ticket: Ticket) -> CompareAndSwapOutcome {
		let mut guard = map.write();

		match guard.get_mut(&ticket.id) {
			Some(stored) if stored.version == expected_version => {
				ticket.version = expected_version.wrapping_add(1);
				*stored = ticket;

				CompareAndSwapOutcome::Updated
			},
			Some(_) => CompareAndSwapOutcome::VersionMismatch,
			None => CompareAndSwapOutcome::Missing,
		}
	}
}
impl TicketRegistry for MemoryTicketRegistry {
	fn add_ticket(&self, ticket: Ticket) -> RegistryFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::add_now(map, ticket) })
	}

	fn find_ticket<'a>(&'a self, id: &'a str) -> RegistryFuture<'a, Option<Ticket>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(id).cloned()) })
	}

	fn update_ticket(&self, ticket: Ticket) -> RegistryFuture<'_, bool> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::update_now(map, ticket)) })
	}

	fn compare_and_swap(
		&self,
		expected_version: u64,
		ticket: Ticket,
	) -> RegistryFuture<'_, CompareAndSwapOutcome> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::cas_now(map, expected_version, ticket)) })
	}

	fn delete_single_ticket<'a>(&'a self, id: &'a str) -> RegistryFuture<'a, bool> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.write().remove(id).is_some()) })
	}

	fn tickets(&self) -> RegistryFuture<'_, Vec<Ticket>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().values().cloned().collect()) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::{test_authentication, test_service},
		error::InvalidTicketReason,
		ticket::{TicketFactory, TicketType},
	};

	#[tokio::test]
	async fn versions_advance_on_every_write() {
		let registry = MemoryTicketRegistry::default();
		let factory = TicketFactory::default();
		let mut tgt = factory.ticket_granting.create(test_authentication("alice"));

		registry.add_ticket(tgt.clone()).await.expect("Adding a fresh ticket should succeed.");

		assert!(matches!(
			registry.add_ticket(tgt.clone()).await,
			Err(RegistryError::Duplicate { .. })
		));

		tgt.count_of_uses = 1;

		assert!(registry.update_ticket(tgt.clone()).await.expect("Update should succeed."));

		let stored = registry
			.find_ticket(tgt.id.as_str())
			.await
			.expect("Lookup should succeed.")
			.expect("Ticket should be stored.");

		assert_eq!(stored.version, 1);
		assert_eq!(
			registry.compare_and_swap(0, stored.clone()).await.expect("CAS should complete."),
			CompareAndSwapOutcome::VersionMismatch
		);
		assert_eq!(
			registry.compare_and_swap(1, stored).await.expect("CAS should complete."),
			CompareAndSwapOutcome::Updated
		);
	}

	#[tokio::test]
	async fn updates_never_resurrect_deleted_tickets() {
		let registry = MemoryTicketRegistry::default();
		let tgt = TicketFactory::default().ticket_granting.create(test_authentication("alice"));

		registry.add_ticket(tgt.clone()).await.expect("Adding a fresh ticket should succeed.");
		registry.delete_single_ticket(tgt.id.as_str()).await.expect("Delete should succeed.");

		assert!(!registry.update_ticket(tgt.clone()).await.expect("Update should complete."));
		assert_eq!(
			registry.compare_and_swap(0, tgt).await.expect("CAS should complete."),
			CompareAndSwapOutcome::Missing
		);
		assert!(registry.is_empty());
	}

	#[tokio::test]
	async fn typed_lookup_rejects_wrong_kind_and_removes_expired() {
		let registry = MemoryTicketRegistry::default();
		let factory = TicketFactory::default();
		let mut tgt = factory.ticket_granting.create(test_authentication("alice"));
		let mut st = factory
			.service
			.create(&mut tgt, &test_service("https://app.example.org"), true)
			.expect("Service ticket should be granted.");

		registry.add_ticket(tgt.clone()).await.expect("TGT should be stored.");

		let err = registry
			.get_ticket(tgt.id.as_str(), TicketType::Service)
			.await
			.expect_err("A TGT is not a service ticket.");

		assert!(matches!(
			err,
			Error::InvalidTicket { reason: InvalidTicketReason::WrongType { .. }, .. }
		));

		st.mark_expired();
		registry.add_ticket(st.clone()).await.expect("ST should be stored.");

		let err = registry
			.get_ticket(st.id.as_str(), TicketType::Service)
			.await
			.expect_err("Expired tickets must be rejected.");

		assert!(matches!(err, Error::InvalidTicket { reason: InvalidTicketReason::Expired, .. }));
		assert!(!registry.contains(st.id.as_str()), "Expired tickets are removed on read.");
		assert_eq!(registry.session_count().await.expect("Counting should succeed."), 1);
	}
}
