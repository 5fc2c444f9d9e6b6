mod common;

// crates.io
use time::macros;
// self
use cas_sso::{
	auth::AuthenticationResult,
	enforcer::AccessRule,
	error::{ConfigError, Error},
	services::{AccessStrategy, Service, ServicesManager},
};
use common::{APP, Harness, authentication, principal, registered};

#[tokio::test]
async fn disabled_services_short_circuit_before_minting() {
	let disabled = registered(1, "https://app\\.example\\.org")
		.with_access_strategy(AccessStrategy::new(false, true));
	let harness = Harness::new(vec![disabled]);
	let tgt = harness.login("alice").await;
	let err = harness
		.cas
		.grant_service_ticket(tgt.id.as_str(), &Service::new(APP), None)
		.await
		.expect_err("Disabled service should be refused.");

	assert!(matches!(
		err,
		Error::UnauthorizedServiceAccess { rule: AccessRule::ServiceAccessAllowed, .. }
	));
	assert_eq!(harness.registry.len(), 1);
}

#[tokio::test]
async fn required_attributes_gate_access() {
	let strategy = AccessStrategy::default().require_attribute("memberOf", ["admin", "staff"]);
	let harness = Harness::new(vec![registered(1, ".*").with_access_strategy(strategy)]);
	let member = harness.login_with(principal("alice", &[("memberOf", &["staff"])])).await;
	let outsider = harness.login_with(principal("bob", &[("memberOf", &["guest"])])).await;

	harness.grant(&member, APP).await;

	assert!(matches!(
		harness.cas.grant_service_ticket(outsider.id.as_str(), &Service::new(APP), None).await,
		Err(Error::UnauthorizedServiceAccess { rule: AccessRule::PrincipalAttributes, .. })
	));
}

#[test]
fn invalid_attribute_patterns_fail_the_load() {
	let harness = Harness::new(vec![registered(1, ".*")]);
	let broken = registered(1, ".*")
		.with_access_strategy(AccessStrategy::default().require_attribute("memberOf", ["adm[in"]));

	assert!(matches!(
		harness.services.load(vec![broken]),
		Err(ConfigError::InvalidPattern { ref service, .. }) if service == "service-1"
	));
	assert!(harness.services.find_service_by(&Service::new(APP)).is_some_and(|registered| {
		registered.access_strategy.required_attributes.is_empty()
	}));
}

#[tokio::test]
async fn rejected_attributes_deny_even_when_requirements_hold() {
	let strategy = AccessStrategy::default()
		.require_attribute("memberOf", ["staff"])
		.reject_attribute("status", ["suspended"]);
	let harness = Harness::new(vec![registered(1, ".*").with_access_strategy(strategy)]);
	let suspended = harness
		.login_with(principal("carol", &[("memberOf", &["staff"]), ("status", &["suspended"])]))
		.await;

	assert!(matches!(
		harness.cas.grant_service_ticket(suspended.id.as_str(), &Service::new(APP), None).await,
		Err(Error::UnauthorizedServiceAccess { rule: AccessRule::PrincipalAttributes, .. })
	));
}

#[tokio::test]
async fn access_windows_are_enforced() {
	let mut closed = AccessStrategy::default();

	closed.starting_date_time = Some(macros::datetime!(2020-01-01 00:00 UTC));
	closed.ending_date_time = Some(macros::datetime!(2020-12-31 23:59 UTC));

	let harness = Harness::new(vec![registered(1, ".*").with_access_strategy(closed)]);
	let tgt = harness.login("alice").await;

	assert!(matches!(
		harness.cas.grant_service_ticket(tgt.id.as_str(), &Service::new(APP), None).await,
		Err(Error::UnauthorizedServiceAccess { rule: AccessRule::TimeWindow, .. })
	));
}

#[tokio::test]
async fn services_without_sso_require_fresh_credentials() {
	let harness = Harness::new(vec![
		registered(1, ".*").with_access_strategy(AccessStrategy::new(true, false)),
	]);
	let tgt = harness.login("alice").await;

	harness.grant(&tgt, APP).await;

	assert!(matches!(
		harness.cas.grant_service_ticket(tgt.id.as_str(), &Service::new(APP), None).await,
		Err(Error::UnauthorizedSsoService { .. })
	));

	let renewed = AuthenticationResult::new(authentication(principal("alice", &[])));

	harness
		.cas
		.grant_service_ticket(tgt.id.as_str(), &Service::new(APP), Some(&renewed))
		.await
		.expect("Fresh credentials should be accepted.");
}

#[tokio::test]
async fn access_is_enforced_again_at_validation() {
	let harness = Harness::new(vec![registered(1, ".*")]);
	let tgt = harness.login("alice").await;
	let st = harness.grant(&tgt, APP).await;

	harness
		.services
		.load(vec![registered(1, ".*").with_access_strategy(AccessStrategy::new(false, true))])
		.expect("Replacement definitions should load.");

	assert!(matches!(
		harness.cas.validate_service_ticket(st.id.as_str(), &Service::new(APP)).await,
		Err(Error::UnauthorizedServiceAccess { rule: AccessRule::ServiceAccessAllowed, .. })
	));
	assert!(!harness.registry.contains(st.id.as_str()));
}
