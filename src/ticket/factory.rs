//! Per-kind ticket factories.
//!
//! Factories enforce the identity and chaining rules at construction time: children are only
//! minted from live granting tickets of the right kind, the parent's usage accounting and child
//! tracking are updated in the same step, and every child carries a snapshot of the
//! authentication chain it descends from.

// self
use crate::{
	_prelude::*,
	auth::Authentication,
	error::InvalidTicketReason,
	services::Service,
	ticket::{
		ExpirationPolicy, GrantingState, ServiceState, Ticket, TicketIdGenerator, TicketKind,
		TicketType,
	},
};

/// Default absolute lifetime of granting tickets.
pub const DEFAULT_TGT_MAX_TIME_TO_LIVE: Duration = Duration::hours(8);
/// Default idle timeout of granting tickets.
pub const DEFAULT_TGT_TIME_TO_KILL: Duration = Duration::hours(2);
/// Default lifetime of remember-me sessions.
pub const DEFAULT_REMEMBER_ME_TIME_TO_KILL: Duration = Duration::days(14);
/// Default idle timeout of service and proxy tickets.
pub const DEFAULT_ST_TIME_TO_KILL: Duration = Duration::seconds(10);

/// Creates ticket-granting tickets.
#[derive(Clone, Debug)]
pub struct TicketGrantingTicketFactory {
	id_generator: Arc<TicketIdGenerator>,
	/// Policy attached to regular sessions.
	pub expiration_policy: ExpirationPolicy,
	/// Policy attached when the authentication requested remember-me; `None` disables the
	/// distinction.
	pub remember_me_policy: Option<ExpirationPolicy>,
}
impl TicketGrantingTicketFactory {
	/// Creates a factory with the provided regular-session policy.
	pub fn new(id_generator: Arc<TicketIdGenerator>, expiration_policy: ExpirationPolicy) -> Self {
		Self { id_generator, expiration_policy, remember_me_policy: None }
	}

	/// Sets the policy used for remember-me sessions.
	pub fn with_remember_me_policy(mut self, policy: ExpirationPolicy) -> Self {
		self.remember_me_policy = Some(policy);

		self
	}

	/// Mints an unused, non-proxied ticket-granting ticket for the authentication.
	pub fn create(&self, authentication: Authentication) -> Ticket {
		let policy = match &self.remember_me_policy {
			Some(policy) if authentication.is_remember_me() => policy.clone(),
			_ => self.expiration_policy.clone(),
		};

		Ticket::new(
			self.id_generator.generate(TicketType::TicketGranting),
			policy,
			TicketKind::TicketGranting(GrantingState::root(authentication)),
			OffsetDateTime::now_utc(),
		)
	}
}

/// Creates service tickets from granting tickets.
#[derive(Clone, Debug)]
pub struct ServiceTicketFactory {
	id_generator: Arc<TicketIdGenerator>,
	/// Policy attached to every service ticket.
	pub expiration_policy: ExpirationPolicy,
	/// Forget older tickets for an equivalent service when granting a new one.
	pub only_track_most_recent_session: bool,
}
impl ServiceTicketFactory {
	/// Creates a factory with the provided policy.
	pub fn new(id_generator: Arc<TicketIdGenerator>, expiration_policy: ExpirationPolicy) -> Self {
		Self { id_generator, expiration_policy, only_track_most_recent_session: true }
	}

	/// Mints a service ticket bound to `(granting, service)`.
	///
	/// The granting ticket's use accounting and service tracking are updated in place; the
	/// caller persists both tickets.
	pub fn create(
		&self,
		granting: &mut Ticket,
		service: &Service,
		credential_provided: bool,
	) -> Result<Ticket> {
		issue_child(
			&self.id_generator,
			TicketType::Service,
			&self.expiration_policy,
			self.only_track_most_recent_session,
			granting,
			service,
			credential_provided,
		)
	}
}

/// Creates proxy-granting tickets from validated-in-progress service or proxy tickets.
#[derive(Clone, Debug)]
pub struct ProxyGrantingTicketFactory {
	id_generator: Arc<TicketIdGenerator>,
	/// Policy attached to every proxy-granting ticket.
	pub expiration_policy: ExpirationPolicy,
}
impl ProxyGrantingTicketFactory {
	/// Creates a factory with the provided policy.
	pub fn new(id_generator: Arc<TicketIdGenerator>, expiration_policy: ExpirationPolicy) -> Self {
		Self { id_generator, expiration_policy }
	}

	/// Mints a proxy-granting ticket for the service the ticket was issued to.
	///
	/// `grantor` must be the granting ticket that issued `service_ticket`; it starts tracking
	/// the new ticket so cascading deletion reaches it. A service ticket yields at most one
	/// proxy-granting ticket.
	pub fn create(
		&self,
		service_ticket: &mut Ticket,
		grantor: &mut Ticket,
		authentication: Authentication,
	) -> Result<Ticket> {
		let now = OffsetDateTime::now_utc();

		ensure_kind(service_ticket, TicketType::Service)?;
		ensure_kind(grantor, TicketType::TicketGranting)?;

		if service_ticket.is_expired_at(now) {
			return Err(Error::invalid_ticket(
				service_ticket.id.as_str(),
				InvalidTicketReason::Expired,
			));
		}
		if grantor.is_expired_at(now) {
			return Err(Error::invalid_ticket(grantor.id.as_str(), InvalidTicketReason::Expired));
		}

		let ancestors = grantor.chained_authentications();
		let grantor_id = grantor.id.clone();
		let service_ticket_id = service_ticket.id.clone();
		let Some(state) = service_ticket.service_state_mut() else {
			return Err(Error::invalid_ticket(
				service_ticket_id.as_str(),
				InvalidTicketReason::WrongType {
					expected: TicketType::Service,
					actual: TicketType::TicketGranting,
				},
			));
		};

		if state.granting_ticket != grantor_id {
			return Err(Error::invalid_ticket(grantor_id.as_str(), InvalidTicketReason::NotFound));
		}
		if state.granted_proxy_granting_ticket {
			return Err(Error::invalid_ticket(
				service_ticket_id.as_str(),
				InvalidTicketReason::AlreadyUsed,
			));
		}

		state.granted_proxy_granting_ticket = true;

		let proxied_by = state.service.clone();
		let id = self.id_generator.generate(TicketType::ProxyGranting);

		if let Some(grantor_state) = grantor.granting_mut() {
			grantor_state.proxy_granting_tickets.insert(id.clone(), proxied_by.clone());
		}

		Ok(Ticket::new(
			id,
			self.expiration_policy.clone(),
			TicketKind::ProxyGranting(GrantingState {
				authentication,
				proxied_by: Some(proxied_by),
				granting_ticket: Some(grantor_id),
				ancestors,
				services: BTreeMap::new(),
				proxy_granting_tickets: BTreeMap::new(),
				superseded: BTreeSet::new(),
			}),
			now,
		))
	}
}

/// Creates proxy tickets from proxy-granting tickets.
#[derive(Clone, Debug)]
pub struct ProxyTicketFactory {
	id_generator: Arc<TicketIdGenerator>,
	/// Policy attached to every proxy ticket.
	pub expiration_policy: ExpirationPolicy,
	/// Forget older tickets for an equivalent service when granting a new one.
	pub only_track_most_recent_session: bool,
}
impl ProxyTicketFactory {
	/// Creates a factory with the provided policy.
	pub fn new(id_generator: Arc<TicketIdGenerator>, expiration_policy: ExpirationPolicy) -> Self {
		Self { id_generator, expiration_policy, only_track_most_recent_session: true }
	}

	/// Mints a proxy ticket bound to `(proxy_granting, service)`.
	pub fn create(&self, proxy_granting: &mut Ticket, service: &Service) -> Result<Ticket> {
		ensure_kind(proxy_granting, TicketType::ProxyGranting)?;

		issue_child(
			&self.id_generator,
			TicketType::Proxy,
			&self.expiration_policy,
			self.only_track_most_recent_session,
			proxy_granting,
			service,
			false,
		)
	}
}

/// Bundle of the four per-kind factories sharing one identifier generator.
#[derive(Clone, Debug)]
pub struct TicketFactory {
	/// Ticket-granting ticket factory.
	pub ticket_granting: TicketGrantingTicketFactory,
	/// Service ticket factory.
	pub service: ServiceTicketFactory,
	/// Proxy-granting ticket factory.
	pub proxy_granting: ProxyGrantingTicketFactory,
	/// Proxy ticket factory.
	pub proxy: ProxyTicketFactory,
}
impl TicketFactory {
	/// Builds factories with the default policies around the provided generator.
	pub fn new(id_generator: Arc<TicketIdGenerator>) -> Self {
		let granting_policy = ExpirationPolicy::Sliding {
			max_time_to_live: DEFAULT_TGT_MAX_TIME_TO_LIVE,
			time_to_kill: DEFAULT_TGT_TIME_TO_KILL,
		};

		Self {
			ticket_granting: TicketGrantingTicketFactory::new(
				id_generator.clone(),
				granting_policy.clone(),
			)
			.with_remember_me_policy(ExpirationPolicy::HardTimeout {
				time_to_kill: DEFAULT_REMEMBER_ME_TIME_TO_KILL,
			}),
			service: ServiceTicketFactory::new(
				id_generator.clone(),
				ExpirationPolicy::single_use(DEFAULT_ST_TIME_TO_KILL),
			),
			proxy_granting: ProxyGrantingTicketFactory::new(id_generator.clone(), granting_policy),
			proxy: ProxyTicketFactory::new(
				id_generator,
				ExpirationPolicy::single_use(DEFAULT_ST_TIME_TO_KILL),
			),
		}
	}

	/// Generator shared by the factories; also used for authenticity checks.
	pub fn id_generator(&self) -> &TicketIdGenerator {
		&self.ticket_granting.id_generator
	}
}
impl Default for TicketFactory {
	fn default() -> Self {
		Self::new(Arc::new(TicketIdGenerator::default()))
	}
}

fn issue_child(
	id_generator: &TicketIdGenerator,
	kind: TicketType,
	expiration_policy: &ExpirationPolicy,
	only_track_most_recent: bool,
	granting: &mut Ticket,
	service: &Service,
	credential_provided: bool,
) -> Result<Ticket> {
	let now = OffsetDateTime::now_utc();

	ensure_kind(granting, TicketType::TicketGranting)?;

	if granting.is_expired_at(now) {
		return Err(Error::invalid_ticket(granting.id.as_str(), InvalidTicketReason::Expired));
	}

	let from_new_login = credential_provided || granting.count_of_uses == 0;
	let id = id_generator.generate(kind);
	let granting_chain = granting.chained_authentications();
	let granting_ticket = granting.id.clone();

	granting.record_use(now);

	if let Some(state) = granting.granting_mut() {
		state.track_service(id.clone(), service.clone(), only_track_most_recent);
	}

	let state = ServiceState {
		service: service.clone(),
		granting_ticket,
		from_new_login,
		granting_chain,
		granted_proxy_granting_ticket: false,
	};
	let kind = match kind {
		TicketType::Proxy => TicketKind::Proxy(state),
		_ => TicketKind::Service(state),
	};

	Ok(Ticket::new(id, expiration_policy.clone(), kind, now))
}

fn ensure_kind(ticket: &Ticket, expected: TicketType) -> Result<()> {
	if expected.accepts(ticket.ticket_type()) {
		Ok(())
	} else {
		Err(wrong_type(ticket, expected))
	}
}

fn wrong_type(ticket: &Ticket, expected: TicketType) -> Error {
	Error::invalid_ticket(
		ticket.id.as_str(),
		InvalidTicketReason::WrongType { expected, actual: ticket.ticket_type() },
	)
}
