//! Ticket registry contract and built-in registry implementations.
//!
//! Backends implement a handful of raw storage primitives; lifecycle rules that hold for every
//! backend (typed lookups with lazy expiry, cascading deletion, session counting) are provided
//! as default methods on [`TicketRegistry`].

pub mod cleaner;
pub mod file;
pub mod memory;

pub use cleaner::{CleanReport, RegistryCleaner};
pub use file::FileTicketRegistry;
pub use memory::MemoryTicketRegistry;

// self
use crate::{
	_prelude::*,
	error::InvalidTicketReason,
	ticket::{Ticket, TicketType},
};

/// Boxed future returned by the raw registry primitives.
pub type RegistryFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, RegistryError>> + 'a + Send>>;
/// Boxed future returned by registry helpers that surface domain errors.
pub type TicketFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Storage backend contract implemented by ticket registries.
///
/// Implementations must never hand out a torn ticket: every read returns a complete snapshot
/// that was written by exactly one `add_ticket`, `update_ticket`, or `compare_and_swap` call.
pub trait TicketRegistry
where
	Self: Send + Sync,
{
	/// Inserts a new ticket; fails with [`RegistryError::Duplicate`] if the id is taken.
	fn add_ticket(&self, ticket: Ticket) -> RegistryFuture<'_, ()>;

	/// Returns the stored snapshot without any expiry or type checks.
	fn find_ticket<'a>(&'a self, id: &'a str) -> RegistryFuture<'a, Option<Ticket>>;

	/// Replaces the stored snapshot and bumps its version.
	///
	/// Returns `false` without writing when the ticket is no longer stored, so a concurrent
	/// deletion is never undone.
	fn update_ticket(&self, ticket: Ticket) -> RegistryFuture<'_, bool>;

	/// Replaces the stored snapshot only if its version still equals `expected_version`.
	fn compare_and_swap(
		&self,
		expected_version: u64,
		ticket: Ticket,
	) -> RegistryFuture<'_, CompareAndSwapOutcome>;

	/// Removes one ticket without cascading; returns whether it existed.
	fn delete_single_ticket<'a>(&'a self, id: &'a str) -> RegistryFuture<'a, bool>;

	/// Enumerates every stored ticket; not transactionally consistent with concurrent writers.
	fn tickets(&self) -> RegistryFuture<'_, Vec<Ticket>>;

	/// Typed lookup with lazy expiry.
	///
	/// Missing, wrongly typed, and expired tickets are reported as [`Error::InvalidTicket`].
	/// A ticket expires with its granting ticket: a ticket whose granting chain is gone or
	/// expired is expired too. Expired tickets found here are removed together with their
	/// descendants.
	fn get_ticket<'a>(&'a self, id: &'a str, expected: TicketType) -> TicketFuture<'a, Ticket> {
		Box::pin(async move {
			let Some(ticket) = self.find_ticket(id).await? else {
				return Err(Error::invalid_ticket(id, InvalidTicketReason::NotFound));
			};
			let actual = ticket.ticket_type();

			if !expected.accepts(actual) {
				return Err(Error::invalid_ticket(
					id,
					InvalidTicketReason::WrongType { expected, actual },
				));
			}
			if ticket.is_expired() || !self.granting_chain_alive(&ticket).await? {
				self.delete_ticket(id).await?;

				return Err(Error::invalid_ticket(id, InvalidTicketReason::Expired));
			}

			Ok(ticket)
		})
	}

	/// Returns `true` when every granting ticket above `ticket` is still stored and live.
	///
	/// An expired ancestor met on the way is removed with its descendants.
	fn granting_chain_alive<'a>(&'a self, ticket: &'a Ticket) -> RegistryFuture<'a, bool> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();
			let mut visited = BTreeSet::new();
			let mut parent = ticket.granting_ticket_id().cloned();

			while let Some(current) = parent {
				if !visited.insert(current.clone()) {
					return Ok(false);
				}

				let Some(ancestor) = self.find_ticket(current.as_str()).await? else {
					return Ok(false);
				};

				if ancestor.is_expired_at(now) {
					self.delete_ticket(current.as_str()).await?;

					return Ok(false);
				}

				parent = ancestor.granting_ticket_id().cloned();
			}

			Ok(true)
		})
	}

	/// Removes a ticket and, for granting tickets, every descendant it tracks.
	///
	/// Returns the number of tickets removed.
	fn delete_ticket<'a>(&'a self, id: &'a str) -> RegistryFuture<'a, usize> {
		Box::pin(async move {
			let mut pending = vec![id.to_owned()];
			let mut visited = BTreeSet::new();
			let mut removed = 0;

			while let Some(current) = pending.pop() {
				if !visited.insert(current.clone()) {
					continue;
				}
				let ticket = self.find_ticket(&current).await?;

				if let Some(state) = ticket.as_ref().and_then(Ticket::granting) {
					pending.extend(state.descendant_ids().map(|child| child.as_str().to_owned()));
				}
				if self.delete_single_ticket(&current).await? {
					removed += 1;
				}
			}

			Ok(removed)
		})
	}

	/// Proxy-granting tickets transitively descending from a granting ticket.
	fn granting_descendants<'a>(&'a self, root: &'a Ticket) -> RegistryFuture<'a, Vec<Ticket>> {
		Box::pin(async move {
			let mut pending = root
				.granting()
				.map(|state| state.proxy_granting_tickets.keys().cloned().collect::<Vec<_>>())
				.unwrap_or_default();
			let mut visited = BTreeSet::new();
			let mut found = Vec::new();

			while let Some(current) = pending.pop() {
				if !visited.insert(current.clone()) {
					continue;
				}

				let Some(ticket) = self.find_ticket(current.as_str()).await? else {
					continue;
				};

				if let Some(state) = ticket.granting() {
					pending.extend(state.proxy_granting_tickets.keys().cloned());
				}

				found.push(ticket);
			}

			Ok(found)
		})
	}

	/// Number of live ticket-granting tickets.
	fn session_count(&self) -> RegistryFuture<'_, usize> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();
			let tickets = self.tickets().await?;

			Ok(tickets
				.iter()
				.filter(|t| t.ticket_type() == TicketType::TicketGranting && !t.is_expired_at(now))
				.count())
		})
	}

	/// Number of live service and proxy tickets.
	fn service_ticket_count(&self) -> RegistryFuture<'_, usize> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();
			let tickets = self.tickets().await?;

			Ok(tickets
				.iter()
				.filter(|t| TicketType::Service.accepts(t.ticket_type()) && !t.is_expired_at(now))
				.count())
		})
	}
}

/// Result of a versioned compare-and-swap attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAndSwapOutcome {
	/// The stored version matched and the ticket was replaced.
	Updated,
	/// The ticket exists but was modified concurrently.
	VersionMismatch,
	/// No ticket is stored under the identifier.
	Missing,
}

/// Error type produced by [`TicketRegistry`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum RegistryError {
	/// A ticket with the same identifier already exists.
	#[error("Ticket `{ticket_id}` already exists.")]
	Duplicate {
		/// Colliding identifier.
		ticket_id: String,
	},
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
