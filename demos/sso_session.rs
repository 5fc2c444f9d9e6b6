//! Walks one single sign-on session through login, service access, proxying, validation, and
//! logout against the in-memory registry.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
// self
use cas_sso::{
	auth::{Authentication, AuthenticationResult, Principal},
	cas::CentralAuthenticationService,
	config::CasSettings,
	event::CasEvent,
	logout::{DefaultSingleLogoutManager, LogoutFuture, LogoutMessageSender, LogoutRequest},
	registry::{MemoryTicketRegistry, TicketRegistry},
	services::{InMemoryServicesManager, Service, ServicesManager},
};

const SETTINGS: &str = r#"{
	"st": { "number_of_uses": 1, "time_to_kill": 10 },
	"ticket_id": { "suffix": "demo-node", "signing_key": "demo-signing-key" }
}"#;
const SERVICES: &str = r#"[
	{
		"id": 1,
		"name": "portal",
		"service_id": "https://portal\\.example\\.org/.*",
		"proxy_policy": {
			"type": "regex_callback",
			"pattern": "https://portal\\.example\\.org/.*"
		},
		"attribute_release_policy": { "rule": { "type": "return_all" } }
	},
	{
		"id": 2,
		"name": "mail",
		"service_id": "https://mail\\.example\\.org/.*",
		"access_strategy": { "required_attributes": { "memberOf": ["staff"] } },
		"logout_type": "front_channel"
	}
]"#;

struct PrintingSender;
impl LogoutMessageSender for PrintingSender {
	fn send<'a>(&'a self, request: &'a LogoutRequest) -> LogoutFuture<'a, bool> {
		Box::pin(async move {
			println!(
				"Back-channel logout for {} sent to {}.",
				request.ticket_id, request.logout_url
			);

			true
		})
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let settings = CasSettings::from_json(SETTINGS)?;
	let services: Arc<dyn ServicesManager> =
		Arc::new(InMemoryServicesManager::from_json(SERVICES)?);
	let registry: Arc<dyn TicketRegistry> = Arc::new(MemoryTicketRegistry::default());
	let logout =
		DefaultSingleLogoutManager::new(services.clone()).with_sender(Arc::new(PrintingSender));
	let cas = CentralAuthenticationService::builder(registry.clone(), services)
		.ticket_factory(settings.ticket_factory())
		.logout_manager(Arc::new(logout))
		.event_sink(Arc::new(|event: &CasEvent| println!("Event: {event:?}.")))
		.build();
	let principal = Principal::new("alice")?
		.with_attribute("memberOf", ["staff"])
		.with_attribute("mail", ["alice@example.org"]);
	let authentication = Authentication::builder(principal)
		.credential("UsernamePasswordCredential", "alice")
		.success("AcceptUsersAuthenticationHandler")
		.build();
	let tgt = cas.create_ticket_granting_ticket(&AuthenticationResult::new(authentication)).await?;
	let portal = Service::new("https://portal.example.org/home");
	let st = cas.grant_service_ticket(tgt.id.as_str(), &portal, None).await?;
	let callback = Authentication::builder(Principal::new("https://portal.example.org/pgt")?)
		.credential("HttpBasedServiceCredential", "https://portal.example.org/pgt")
		.success("HttpBasedServiceCredentialsAuthenticationHandler")
		.build();
	let pgt = cas
		.create_proxy_granting_ticket(st.id.as_str(), &AuthenticationResult::new(callback))
		.await?;
	let assertion = cas.validate_service_ticket(st.id.as_str(), &portal).await?;

	println!("Portal sees {} with {:?}.", assertion.principal().id, assertion.attributes());

	let mail = Service::new("https://mail.example.org/inbox");
	let pt = cas.grant_proxy_ticket(pgt.id.as_str(), &mail).await?;
	let proxied = cas.validate_service_ticket(pt.id.as_str(), &mail).await?;

	println!(
		"Mail sees {} through {} proxy hop(s).",
		proxied.principal().id,
		proxied.chained_authentications.len() - 1
	);
	println!("Live sessions: {}.", registry.session_count().await?);

	for request in cas.destroy_ticket_granting_ticket(tgt.id.as_str()).await? {
		println!(
			"Logout {:?} for {} ({:?}).",
			request.logout_type, request.service, request.status
		);
	}

	println!("Live sessions after logout: {}.", registry.session_count().await?);

	Ok(())
}
