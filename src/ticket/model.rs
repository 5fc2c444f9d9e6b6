//! Ticket data model shared by every registry backend.
//!
//! All four kinds share one [`Ticket`] envelope (identifier, usage accounting, expiration
//! policy, optimistic version) and carry their kind-specific state in [`TicketKind`]. Granting
//! kinds (ticket-granting and proxy-granting tickets) share [`GrantingState`], so "can this
//! ticket grant further tickets" is a capability check on the variant.

// self
use crate::{
	_prelude::*,
	auth::{Authentication, Principal},
	services::Service,
	ticket::{ExpirationPolicy, TicketId, TicketType},
};

/// Stored ticket snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
	/// Unique identifier carrying the kind prefix.
	pub id: TicketId,
	/// Instant the ticket was created.
	#[serde(with = "time::serde::rfc3339")]
	pub creation_time: OffsetDateTime,
	/// Instant of the most recent use (creation time until first use).
	#[serde(with = "time::serde::rfc3339")]
	pub last_time_used: OffsetDateTime,
	/// Instant of the use preceding `last_time_used`.
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub previous_time_used: Option<OffsetDateTime>,
	/// Number of times the ticket has been used.
	pub count_of_uses: u32,
	/// Policy deciding when the ticket expires.
	pub expiration_policy: ExpirationPolicy,
	/// Set once the ticket was explicitly expired (e.g. on logout).
	#[serde(default)]
	pub expired: bool,
	/// Optimistic concurrency version bumped by the registry on every successful write.
	#[serde(default)]
	pub version: u64,
	/// Kind-specific state.
	pub kind: TicketKind,
}
impl Ticket {
	/// Creates an unused ticket.
	pub fn new(
		id: TicketId,
		expiration_policy: ExpirationPolicy,
		kind: TicketKind,
		now: OffsetDateTime,
	) -> Self {
		Self {
			id,
			creation_time: now,
			last_time_used: now,
			previous_time_used: None,
			count_of_uses: 0,
			expiration_policy,
			expired: false,
			version: 0,
			kind,
		}
	}

	/// Kind of the ticket.
	pub const fn ticket_type(&self) -> TicketType {
		match &self.kind {
			TicketKind::TicketGranting(_) => TicketType::TicketGranting,
			TicketKind::Service(_) => TicketType::Service,
			TicketKind::ProxyGranting(_) => TicketType::ProxyGranting,
			TicketKind::Proxy(_) => TicketType::Proxy,
		}
	}

	/// Returns `true` when the ticket was explicitly expired or its policy reports it expired.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expired || self.expiration_policy.is_expired_at(self, now)
	}

	/// [`Self::is_expired_at`] evaluated against the current UTC instant.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Records a use of the ticket.
	pub fn record_use(&mut self, now: OffsetDateTime) {
		self.previous_time_used = Some(self.last_time_used);
		self.last_time_used = now.max(self.last_time_used);
		self.count_of_uses = self.count_of_uses.saturating_add(1);
	}

	/// Expires the ticket irrevocably.
	pub fn mark_expired(&mut self) {
		self.expired = true;
	}

	/// Granting state for ticket-granting and proxy-granting tickets.
	pub const fn granting(&self) -> Option<&GrantingState> {
		match &self.kind {
			TicketKind::TicketGranting(state) | TicketKind::ProxyGranting(state) => Some(state),
			_ => None,
		}
	}

	/// Mutable granting state.
	pub fn granting_mut(&mut self) -> Option<&mut GrantingState> {
		match &mut self.kind {
			TicketKind::TicketGranting(state) | TicketKind::ProxyGranting(state) => Some(state),
			_ => None,
		}
	}

	/// Service state for service and proxy tickets.
	pub const fn service_state(&self) -> Option<&ServiceState> {
		match &self.kind {
			TicketKind::Service(state) | TicketKind::Proxy(state) => Some(state),
			_ => None,
		}
	}

	/// Mutable service state.
	pub fn service_state_mut(&mut self) -> Option<&mut ServiceState> {
		match &mut self.kind {
			TicketKind::Service(state) | TicketKind::Proxy(state) => Some(state),
			_ => None,
		}
	}

	/// Identifier of the granting ticket that issued this ticket, if any.
	pub fn granting_ticket_id(&self) -> Option<&TicketId> {
		match &self.kind {
			TicketKind::TicketGranting(state) | TicketKind::ProxyGranting(state) =>
				state.granting_ticket.as_ref(),
			TicketKind::Service(state) | TicketKind::Proxy(state) => Some(&state.granting_ticket),
		}
	}

	/// Service a service or proxy ticket is bound to, or the proxying service of a
	/// proxy-granting ticket.
	pub fn service(&self) -> Option<&Service> {
		match &self.kind {
			TicketKind::Service(state) | TicketKind::Proxy(state) => Some(&state.service),
			TicketKind::TicketGranting(state) | TicketKind::ProxyGranting(state) =>
				state.proxied_by.as_ref(),
		}
	}

	/// Authentications from this ticket to the session root: own (or granting) authentication
	/// first, the original login last.
	pub fn chained_authentications(&self) -> Vec<Authentication> {
		match &self.kind {
			TicketKind::TicketGranting(state) | TicketKind::ProxyGranting(state) =>
				state.chained_authentications(),
			TicketKind::Service(state) | TicketKind::Proxy(state) => state.granting_chain.clone(),
		}
	}

	/// Authentication of the original, non-proxied login.
	pub fn root_authentication(&self) -> Option<&Authentication> {
		match &self.kind {
			TicketKind::TicketGranting(state) | TicketKind::ProxyGranting(state) =>
				Some(state.root_authentication()),
			TicketKind::Service(state) | TicketKind::Proxy(state) => state.granting_chain.last(),
		}
	}

	/// Principal of the original login.
	pub fn principal(&self) -> Option<&Principal> {
		self.root_authentication().map(|authentication| &authentication.principal)
	}
}

/// Kind-specific ticket state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "state", rename_all = "snake_case")]
pub enum TicketKind {
	/// Ticket-granting ticket.
	TicketGranting(GrantingState),
	/// Service ticket.
	Service(ServiceState),
	/// Proxy-granting ticket.
	ProxyGranting(GrantingState),
	/// Proxy ticket.
	Proxy(ServiceState),
}

/// State shared by ticket-granting and proxy-granting tickets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantingState {
	/// Authentication this ticket was created from.
	pub authentication: Authentication,
	/// Proxying service; `None` for a directly authenticated ticket-granting ticket.
	#[serde(default)]
	pub proxied_by: Option<Service>,
	/// Granting ticket this proxy-granting ticket descends from.
	#[serde(default)]
	pub granting_ticket: Option<TicketId>,
	/// Authentications of the ancestors, parent first and root last.
	#[serde(default)]
	pub ancestors: Vec<Authentication>,
	/// Service and proxy tickets issued by this ticket, keyed by ticket id.
	#[serde(default)]
	pub services: BTreeMap<TicketId, Service>,
	/// Proxy-granting tickets descending from this ticket, keyed by ticket id.
	#[serde(default)]
	pub proxy_granting_tickets: BTreeMap<TicketId, Service>,
	/// Children no longer tracked for logout after a newer ticket replaced them; still removed
	/// with this ticket.
	#[serde(default)]
	pub superseded: BTreeSet<TicketId>,
}
impl GrantingState {
	/// State for a directly authenticated ticket-granting ticket.
	pub fn root(authentication: Authentication) -> Self {
		Self {
			authentication,
			proxied_by: None,
			granting_ticket: None,
			ancestors: Vec::new(),
			services: BTreeMap::new(),
			proxy_granting_tickets: BTreeMap::new(),
			superseded: BTreeSet::new(),
		}
	}

	/// Returns `true` when the ticket was obtained through a proxy.
	pub const fn is_proxied(&self) -> bool {
		self.proxied_by.is_some()
	}

	/// Own authentication followed by the ancestors, root last.
	pub fn chained_authentications(&self) -> Vec<Authentication> {
		let mut chain = Vec::with_capacity(self.ancestors.len() + 1);

		chain.push(self.authentication.clone());
		chain.extend(self.ancestors.iter().cloned());

		chain
	}

	/// Authentication of the session root.
	pub fn root_authentication(&self) -> &Authentication {
		self.ancestors.last().unwrap_or(&self.authentication)
	}

	/// Tracks a child service or proxy ticket.
	///
	/// With `only_track_most_recent`, previously tracked tickets for an equivalent service
	/// (same id once `;` and `?` suffixes are stripped) stop receiving logout notifications
	/// but move to [`Self::superseded`] so they are still deleted with this ticket.
	pub fn track_service(
		&mut self,
		ticket_id: TicketId,
		service: Service,
		only_track_most_recent: bool,
	) {
		if only_track_most_recent {
			let normalized = normalize_service_id(&service.id);
			let replaced = self
				.services
				.iter()
				.filter(|(_, tracked)| normalize_service_id(&tracked.id) == normalized)
				.map(|(id, _)| id.clone())
				.collect::<Vec<_>>();

			for id in replaced {
				self.services.remove(&id);
				self.superseded.insert(id);
			}
		}

		self.services.insert(ticket_id, service);
	}

	/// Identifiers of every child ticket deleted together with this ticket.
	pub fn descendant_ids(&self) -> impl Iterator<Item = &TicketId> {
		self.services.keys().chain(self.proxy_granting_tickets.keys()).chain(&self.superseded)
	}
}

/// State shared by service and proxy tickets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceState {
	/// Service the ticket is bound to.
	pub service: Service,
	/// Granting ticket that issued the ticket.
	pub granting_ticket: TicketId,
	/// Whether the ticket was issued in the same exchange as the session's authentication.
	pub from_new_login: bool,
	/// Snapshot of the granting ticket's authentication chain, root last.
	pub granting_chain: Vec<Authentication>,
	/// Set once a proxy-granting ticket was minted from this ticket.
	#[serde(default)]
	pub granted_proxy_granting_ticket: bool,
}

fn normalize_service_id(id: &str) -> &str {
	id.split([';', '?']).next().unwrap_or(id)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::{test_authentication, test_service},
		ticket::TicketIdGenerator,
	};

	fn granting() -> GrantingState {
		GrantingState::root(test_authentication("alice"))
	}

	#[test]
	fn most_recent_session_tracking_replaces_equivalent_services() {
		let generator = TicketIdGenerator::default();
		let mut state = granting();
		let first = generator.generate(TicketType::Service);
		let second = generator.generate(TicketType::Service);
		let third = generator.generate(TicketType::Service);

		state.track_service(first.clone(), test_service("https://app.example.org/a?x=1"), true);
		state.track_service(
			second.clone(),
			test_service("https://app.example.org/a;jsessionid=2"),
			true,
		);
		state.track_service(third.clone(), test_service("https://other.example.org"), true);

		assert!(!state.services.contains_key(&first));
		assert!(state.services.contains_key(&second));
		assert!(state.services.contains_key(&third));
		assert!(state.superseded.contains(&first));
		assert!(state.descendant_ids().any(|id| *id == first));

		let fourth = generator.generate(TicketType::Service);

		state.track_service(fourth, test_service("https://other.example.org"), false);

		assert_eq!(state.services.len(), 3);
	}

	#[test]
	fn chain_orders_self_first_and_root_last() {
		let mut state = GrantingState::root(test_authentication("proxy-app"));

		state.ancestors = vec![test_authentication("parent-app"), test_authentication("alice")];

		let chain = state.chained_authentications();

		assert_eq!(chain.len(), 3);
		assert_eq!(chain[0].principal.id.as_str(), "proxy-app");
		assert_eq!(chain[2].principal.id.as_str(), "alice");
		assert_eq!(state.root_authentication().principal.id.as_str(), "alice");
	}

	#[test]
	fn use_accounting_and_explicit_expiry() {
		let now = OffsetDateTime::now_utc();
		let generator = TicketIdGenerator::default();
		let mut ticket = Ticket::new(
			generator.generate(TicketType::TicketGranting),
			ExpirationPolicy::NeverExpires,
			TicketKind::TicketGranting(granting()),
			now,
		);

		assert!(!ticket.is_expired_at(now));

		ticket.record_use(now + Duration::seconds(5));

		assert_eq!(ticket.count_of_uses, 1);
		assert_eq!(ticket.previous_time_used, Some(now));

		ticket.mark_expired();

		assert!(ticket.is_expired_at(now));
		assert_eq!(ticket.principal().map(|p| p.id.as_str()), Some("alice"));
	}

	#[test]
	fn snapshots_survive_json_round_trip() {
		let generator = TicketIdGenerator::default();
		let mut state = granting();

		state.track_service(
			generator.generate(TicketType::Service),
			test_service("https://app.example.org"),
			true,
		);

		let ticket = Ticket::new(
			generator.generate(TicketType::TicketGranting),
			ExpirationPolicy::Sliding {
				max_time_to_live: Duration::hours(8),
				time_to_kill: Duration::hours(2),
			},
			TicketKind::TicketGranting(state),
			OffsetDateTime::now_utc()
				.replace_nanosecond(0)
				.expect("Zero nanoseconds should be valid."),
		);
		let json = serde_json::to_string(&ticket).expect("Ticket should serialize.");
		let restored: Ticket = serde_json::from_str(&json).expect("Ticket should deserialize.");

		assert_eq!(restored, ticket);
	}
}
