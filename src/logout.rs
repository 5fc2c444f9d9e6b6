//! Single logout: turning a destroyed session into per-service logout notifications.
//!
//! The manager never fails a logout because one relying party could not be reached. Every
//! notification is returned with its own [`LogoutRequestStatus`] so the caller can report
//! partial failures.

// self
use crate::{
	_prelude::*,
	obs::diag,
	services::{Service, ServicesManager},
	ticket::{Ticket, TicketId},
};

/// Boxed future returned by logout collaborators.
pub type LogoutFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a + Send>>;

/// How a registered service is notified when a session ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutType {
	/// Server-to-server notification.
	#[default]
	BackChannel,
	/// Browser-driven notification dispatched by the web layer.
	FrontChannel,
	/// The service is not notified.
	None,
}

/// Delivery status of a logout notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutRequestStatus {
	/// Not sent by the core (front-channel, or no sender configured).
	NotAttempted,
	/// Delivered.
	Success,
	/// Delivery failed.
	Failure,
}

/// Logout notification for one service a session touched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutRequest {
	/// Ticket id the service received; used as the session index in the notification.
	pub ticket_id: TicketId,
	/// Service the ticket was issued for.
	pub service: Service,
	/// Registered service that matched the service.
	pub registered_service_id: i64,
	/// Endpoint receiving the notification.
	pub logout_url: Url,
	/// Delivery channel.
	pub logout_type: LogoutType,
	/// Delivery status.
	pub status: LogoutRequestStatus,
}

/// Delivers back-channel logout notifications.
pub trait LogoutMessageSender
where
	Self: Send + Sync,
{
	/// Sends the notification; returns `true` when the endpoint acknowledged it.
	fn send<'a>(&'a self, request: &'a LogoutRequest) -> LogoutFuture<'a, bool>;
}

/// Computes (and, for back-channel services, dispatches) logout notifications.
pub trait SingleLogoutManager
where
	Self: Send + Sync,
{
	/// Builds one request per service reached from the granting ticket or its
	/// proxy-granting descendants.
	fn perform_logout<'a>(
		&'a self,
		ticket_granting: &'a Ticket,
		descendants: &'a [Ticket],
	) -> LogoutFuture<'a, Vec<LogoutRequest>>;
}

/// Manager that resolves services through the services manager and dispatches back-channel
/// requests through an optional sender.
#[derive(Clone)]
pub struct DefaultSingleLogoutManager {
	services_manager: Arc<dyn ServicesManager>,
	sender: Option<Arc<dyn LogoutMessageSender>>,
	disabled: bool,
}
impl DefaultSingleLogoutManager {
	/// Creates a manager without a sender; back-channel requests stay [`NotAttempted`].
	///
	/// [`NotAttempted`]: LogoutRequestStatus::NotAttempted
	pub fn new(services_manager: Arc<dyn ServicesManager>) -> Self {
		Self { services_manager, sender: None, disabled: false }
	}

	/// Dispatches back-channel requests through `sender`.
	pub fn with_sender(mut self, sender: Arc<dyn LogoutMessageSender>) -> Self {
		self.sender = Some(sender);

		self
	}

	/// Disables single logout entirely; sessions end without notifications.
	pub fn disabled(mut self) -> Self {
		self.disabled = true;

		self
	}

	fn collect_services(
		ticket_granting: &Ticket,
		descendants: &[Ticket],
	) -> BTreeMap<TicketId, Service> {
		let mut services = BTreeMap::new();

		for ticket in std::iter::once(ticket_granting).chain(descendants) {
			if let Some(state) = ticket.granting() {
				services.extend(state.services.iter().map(|(id, s)| (id.clone(), s.clone())));
				services.extend(
					state.proxy_granting_tickets.iter().map(|(id, s)| (id.clone(), s.clone())),
				);
			}
		}

		services
	}

	fn build_request(&self, ticket_id: TicketId, service: Service) -> Option<LogoutRequest> {
		let registered = self.services_manager.find_service_by(&service)?;

		if registered.logout_type == LogoutType::None {
			return None;
		}

		let logout_url = registered.logout_url.clone().or_else(|| service.url())?;

		Some(LogoutRequest {
			ticket_id,
			service,
			registered_service_id: registered.id,
			logout_url,
			logout_type: registered.logout_type,
			status: LogoutRequestStatus::NotAttempted,
		})
	}
}
impl Debug for DefaultSingleLogoutManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DefaultSingleLogoutManager")
			.field("has_sender", &self.sender.is_some())
			.field("disabled", &self.disabled)
			.finish()
	}
}
impl SingleLogoutManager for DefaultSingleLogoutManager {
	fn perform_logout<'a>(
		&'a self,
		ticket_granting: &'a Ticket,
		descendants: &'a [Ticket],
	) -> LogoutFuture<'a, Vec<LogoutRequest>> {
		Box::pin(async move {
			if self.disabled {
				return Vec::new();
			}

			let mut requests = Vec::new();

			for (ticket_id, service) in Self::collect_services(ticket_granting, descendants) {
				let Some(mut request) = self.build_request(ticket_id, service) else {
					continue;
				};

				if let (LogoutType::BackChannel, Some(sender)) =
					(request.logout_type, &self.sender)
				{
					request.status = if sender.send(&request).await {
						LogoutRequestStatus::Success
					} else {
						diag!(
							warn,
							ticket_id = %request.ticket_id,
							logout_url = %request.logout_url,
							"Back-channel logout notification failed."
						);

						LogoutRequestStatus::Failure
					};
				}

				requests.push(request);
			}

			requests
		})
	}
}

/// Manager that produces no notifications.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSingleLogout;
impl SingleLogoutManager for NoSingleLogout {
	fn perform_logout<'a>(
		&'a self,
		_: &'a Ticket,
		_: &'a [Ticket],
	) -> LogoutFuture<'a, Vec<LogoutRequest>> {
		Box::pin(async { Vec::new() })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::{test_authentication, test_registered_service, test_service},
		services::InMemoryServicesManager,
		ticket::TicketFactory,
	};

	struct FailingFor(&'static str);
	impl LogoutMessageSender for FailingFor {
		fn send<'a>(&'a self, request: &'a LogoutRequest) -> LogoutFuture<'a, bool> {
			Box::pin(async move { !request.service.id.contains(self.0) })
		}
	}

	fn manager() -> Arc<dyn ServicesManager> {
		let manager = InMemoryServicesManager::default();

		manager
			.load(vec![
				test_registered_service(1, "https://app\\.example\\.org/.*"),
				test_registered_service(2, "https://down\\.example\\.org/.*").with_logout(
					LogoutType::BackChannel,
					Some(
						Url::parse("https://down.example.org/slo")
							.expect("Fixture URL should parse."),
					),
				),
				test_registered_service(3, "https://front\\.example\\.org/.*")
					.with_logout(LogoutType::FrontChannel, None),
				test_registered_service(4, "https://quiet\\.example\\.org/.*")
					.with_logout(LogoutType::None, None),
			])
			.expect("Fixture definitions should load.");

		Arc::new(manager)
	}

	fn session(services: &[&str]) -> Ticket {
		let factory = TicketFactory::default();
		let mut tgt = factory.ticket_granting.create(test_authentication("alice"));

		for url in services {
			factory
				.service
				.create(&mut tgt, &test_service(url), false)
				.expect("Service ticket fixture should be issued.");
		}

		tgt
	}

	#[tokio::test]
	async fn partial_failures_are_reported_per_request() {
		let slo =
			DefaultSingleLogoutManager::new(manager()).with_sender(Arc::new(FailingFor("down")));
		let tgt = session(&[
			"https://app.example.org/a",
			"https://down.example.org/b",
			"https://front.example.org/c",
			"https://quiet.example.org/d",
			"https://unknown.example.org/e",
		]);
		let requests = slo.perform_logout(&tgt, &[]).await;
		let status_of = |id: i64| {
			requests
				.iter()
				.find(|request| request.registered_service_id == id)
				.map(|request| request.status)
		};

		assert_eq!(requests.len(), 3);
		assert_eq!(status_of(1), Some(LogoutRequestStatus::Success));
		assert_eq!(status_of(2), Some(LogoutRequestStatus::Failure));
		assert_eq!(status_of(3), Some(LogoutRequestStatus::NotAttempted));

		let down = requests
			.iter()
			.find(|request| request.registered_service_id == 2)
			.expect("Down service should have a request.");

		assert_eq!(down.logout_url.as_str(), "https://down.example.org/slo");
	}

	#[tokio::test]
	async fn disabled_manager_sends_nothing() {
		let slo = DefaultSingleLogoutManager::new(manager()).disabled();
		let tgt = session(&["https://app.example.org/a"]);

		assert!(slo.perform_logout(&tgt, &[]).await.is_empty());
		assert!(NoSingleLogout.perform_logout(&tgt, &[]).await.is_empty());
	}
}
