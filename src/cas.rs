//! Ticket lifecycle orchestrator.
//!
//! [`CentralAuthenticationService`] owns the registry, the services manager, and every
//! pluggable policy, and exposes the ticket operations. Each operation runs inside an
//! [`OperationSpan`], updates the per-instance [`OperationMetrics`] and the global metrics
//! recorder, closes an audit record for every configured [`AuditTrail`], and publishes a
//! [`CasEvent`](crate::event::CasEvent) once it has taken effect.
//!
//! Session-level operations live in `session`, ticket grants in `grant`, proxy-granting
//! ticket creation in `proxy`, and service ticket validation in `validate`.

mod grant;
mod proxy;
mod session;
mod validate;

// self
use crate::{
	_prelude::*,
	auth::{AuthenticationPolicy, RequiredAuthenticationContextPolicy},
	enforcer::{
		AuditableExecution, RegisteredServiceAccessStrategyEnforcer, SsoAccessStrategyEnforcer,
	},
	error::InvalidTicketReason,
	event::{EventPublisher, EventSink},
	logout::{DefaultSingleLogoutManager, SingleLogoutManager},
	obs::{
		self, AuditContext, AuditTrail, OperationKind, OperationMetrics, OperationOutcome,
		OperationSpan,
	},
	registry::TicketRegistry,
	services::{
		ConsentEngine, ExactServiceMatchingStrategy, NoConsentRequired, RegisteredService,
		Service, ServiceMatchingStrategy, ServiceSelectionPlan, ServicesManager,
	},
	ticket::{Ticket, TicketFactory, TicketType},
};

type TicketGuards = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Coordinates ticket issuance, validation, and destruction.
///
/// The orchestrator holds no ticket state of its own; the registry is the only shared mutable
/// resource. Validation and proxy-granting ticket creation for the same ticket id are
/// serialized through a per-id guard table, and the registry's compare-and-swap update
/// guarantees at-most-once validation across nodes.
#[derive(Clone)]
pub struct CentralAuthenticationService {
	registry: Arc<dyn TicketRegistry>,
	services_manager: Arc<dyn ServicesManager>,
	ticket_factory: TicketFactory,
	authentication_policies: Vec<Arc<dyn AuthenticationPolicy>>,
	access_enforcer: Arc<dyn AuditableExecution>,
	sso_enforcer: SsoAccessStrategyEnforcer,
	matching_strategy: Arc<dyn ServiceMatchingStrategy>,
	selection_plan: ServiceSelectionPlan,
	consent_engine: Arc<dyn ConsentEngine>,
	logout_manager: Arc<dyn SingleLogoutManager>,
	events: EventPublisher,
	audit_trails: Vec<Arc<dyn AuditTrail>>,
	metrics: Arc<OperationMetrics>,
	ticket_guards: TicketGuards,
}
impl CentralAuthenticationService {
	/// Returns a builder around the two mandatory collaborators.
	pub fn builder(
		registry: Arc<dyn TicketRegistry>,
		services_manager: Arc<dyn ServicesManager>,
	) -> CentralAuthenticationServiceBuilder {
		CentralAuthenticationServiceBuilder::new(registry, services_manager)
	}

	/// Ticket registry backing the orchestrator.
	pub fn registry(&self) -> &Arc<dyn TicketRegistry> {
		&self.registry
	}

	/// Services manager resolving registered services.
	pub fn services_manager(&self) -> &Arc<dyn ServicesManager> {
		&self.services_manager
	}

	/// Ticket factories in use.
	pub fn ticket_factory(&self) -> &TicketFactory {
		&self.ticket_factory
	}

	/// Per-operation counters of this instance.
	pub fn metrics(&self) -> &OperationMetrics {
		&self.metrics
	}

	/// Typed lookup with lazy expiry; an expired ticket found here is removed.
	pub async fn get_ticket(&self, id: &str, expected: TicketType) -> Result<Ticket> {
		self.registry.get_ticket(id, expected).await
	}

	/// Live tickets matching the predicate.
	pub async fn get_tickets<P>(&self, predicate: P) -> Result<Vec<Ticket>>
	where
		P: Fn(&Ticket) -> bool,
	{
		let now = OffsetDateTime::now_utc();
		let tickets = self.registry.tickets().await?;

		Ok(tickets
			.into_iter()
			.filter(|ticket| !ticket.is_expired_at(now) && predicate(ticket))
			.collect())
	}

	/// Persists a mutated ticket; a ticket deleted in the meantime is reported as not found.
	pub async fn update_ticket(&self, ticket: Ticket) -> Result<()> {
		let id = ticket.id.clone();

		if self.registry.update_ticket(ticket).await? {
			Ok(())
		} else {
			Err(Error::invalid_ticket(id.as_str(), InvalidTicketReason::NotFound))
		}
	}

	/// Runs an operation with span, metrics, and audit bookkeeping.
	async fn observe<T, Fut>(
		&self,
		kind: OperationKind,
		stage: &'static str,
		audit: &Mutex<AuditContext>,
		operation: Fut,
	) -> Result<T>
	where
		Fut: Future<Output = Result<T>>,
	{
		let span = OperationSpan::new(kind, stage);

		self.metrics.record(kind, OperationOutcome::Attempt);

		let result = span.instrument(operation).await;

		match &result {
			Ok(_) => self.metrics.record(kind, OperationOutcome::Success),
			Err(e) => {
				obs::diag!(
					debug,
					operation = kind.as_str(),
					code = e.code(),
					error = %e,
					"Ticket operation failed."
				);
				self.metrics.record(kind, OperationOutcome::Failure);
			},
		}

		let record = audit.lock().clone().finish(&result);

		for trail in &self.audit_trails {
			trail.record(&record);
		}

		result
	}

	fn registered_service_for(&self, service: &Service) -> Option<Arc<RegisteredService>> {
		self.services_manager.find_service_by(service)
	}

	fn ticket_guard(&self, id: &str) -> Arc<AsyncMutex<()>> {
		let mut guards = self.ticket_guards.lock();

		guards.entry(id.to_owned()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	/// Drops the caller's guard handle and forgets the entry once nobody else holds it.
	fn release_ticket_guard(&self, id: &str, guard: Arc<AsyncMutex<()>>) {
		drop(guard);

		let mut guards = self.ticket_guards.lock();

		if guards.get(id).is_some_and(|entry| Arc::strong_count(entry) == 1) {
			guards.remove(id);
		}
	}
}
impl Debug for CentralAuthenticationService {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CentralAuthenticationService")
			.field("ticket_factory", &self.ticket_factory)
			.field("authentication_policies", &self.authentication_policies.len())
			.field("selection_plan", &self.selection_plan)
			.field("events", &self.events)
			.field("audit_trails", &self.audit_trails.len())
			.finish_non_exhaustive()
	}
}

/// Builder for [`CentralAuthenticationService`].
pub struct CentralAuthenticationServiceBuilder {
	registry: Arc<dyn TicketRegistry>,
	services_manager: Arc<dyn ServicesManager>,
	ticket_factory: TicketFactory,
	authentication_policies: Vec<Arc<dyn AuthenticationPolicy>>,
	access_enforcer: Arc<dyn AuditableExecution>,
	matching_strategy: Arc<dyn ServiceMatchingStrategy>,
	selection_plan: ServiceSelectionPlan,
	consent_engine: Arc<dyn ConsentEngine>,
	logout_manager: Option<Arc<dyn SingleLogoutManager>>,
	events: EventPublisher,
	audit_trails: Vec<Arc<dyn AuditTrail>>,
}
impl CentralAuthenticationServiceBuilder {
	fn new(registry: Arc<dyn TicketRegistry>, services_manager: Arc<dyn ServicesManager>) -> Self {
		Self {
			registry,
			services_manager,
			ticket_factory: TicketFactory::default(),
			authentication_policies: vec![Arc::new(RequiredAuthenticationContextPolicy)],
			access_enforcer: Arc::new(RegisteredServiceAccessStrategyEnforcer),
			matching_strategy: Arc::new(ExactServiceMatchingStrategy),
			selection_plan: ServiceSelectionPlan::default(),
			consent_engine: Arc::new(NoConsentRequired),
			logout_manager: None,
			events: EventPublisher::default(),
			audit_trails: Vec::new(),
		}
	}

	/// Replaces the ticket factories.
	pub fn ticket_factory(mut self, ticket_factory: TicketFactory) -> Self {
		self.ticket_factory = ticket_factory;

		self
	}

	/// Replaces the authentication policies evaluated before grants and validations.
	pub fn authentication_policies(mut self, policies: Vec<Arc<dyn AuthenticationPolicy>>) -> Self {
		self.authentication_policies = policies;

		self
	}

	/// Replaces the access enforcer.
	pub fn access_enforcer(mut self, enforcer: Arc<dyn AuditableExecution>) -> Self {
		self.access_enforcer = enforcer;

		self
	}

	/// Replaces the strategy deciding whether a presented service matches an issued one.
	pub fn matching_strategy(mut self, strategy: Arc<dyn ServiceMatchingStrategy>) -> Self {
		self.matching_strategy = strategy;

		self
	}

	/// Replaces the service selection plan applied to requested services.
	pub fn selection_plan(mut self, plan: ServiceSelectionPlan) -> Self {
		self.selection_plan = plan;

		self
	}

	/// Replaces the consent engine.
	pub fn consent_engine(mut self, engine: Arc<dyn ConsentEngine>) -> Self {
		self.consent_engine = engine;

		self
	}

	/// Replaces the single logout manager; defaults to [`DefaultSingleLogoutManager`] without
	/// a sender.
	pub fn logout_manager(mut self, manager: Arc<dyn SingleLogoutManager>) -> Self {
		self.logout_manager = Some(manager);

		self
	}

	/// Appends an event sink.
	pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
		self.events = self.events.with_sink(sink);

		self
	}

	/// Appends an audit trail.
	pub fn audit_trail(mut self, trail: Arc<dyn AuditTrail>) -> Self {
		self.audit_trails.push(trail);

		self
	}

	/// Builds the orchestrator.
	pub fn build(self) -> CentralAuthenticationService {
		let logout_manager = self.logout_manager.unwrap_or_else(|| {
			Arc::new(DefaultSingleLogoutManager::new(self.services_manager.clone()))
		});

		CentralAuthenticationService {
			registry: self.registry,
			services_manager: self.services_manager,
			ticket_factory: self.ticket_factory,
			authentication_policies: self.authentication_policies,
			access_enforcer: self.access_enforcer,
			sso_enforcer: SsoAccessStrategyEnforcer,
			matching_strategy: self.matching_strategy,
			selection_plan: self.selection_plan,
			consent_engine: self.consent_engine,
			logout_manager,
			events: self.events,
			audit_trails: self.audit_trails,
			metrics: Default::default(),
			ticket_guards: Default::default(),
		}
	}
}
impl Debug for CentralAuthenticationServiceBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CentralAuthenticationServiceBuilder")
			.field("ticket_factory", &self.ticket_factory)
			.field("audit_trails", &self.audit_trails.len())
			.finish_non_exhaustive()
	}
}
