//! Registered service (relying-party configuration) model.

// crates.io
use regex::Regex;
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	logout::LogoutType,
	services::{
		AccessStrategy, AttributeReleasePolicy, ProxyPolicy, Service, UsernameAttributeProvider,
	},
};

/// Relying-party configuration matched against requested services by pattern.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredService {
	/// Unique numeric identifier.
	pub id: i64,
	/// Human-readable name.
	pub name: String,
	/// Regular expression that must match the whole service id.
	pub service_id: String,
	/// Optional description.
	#[serde(default)]
	pub description: Option<String>,
	/// Lower values are evaluated first.
	#[serde(default)]
	pub evaluation_order: i32,
	/// Access rules.
	#[serde(default)]
	pub access_strategy: AccessStrategy,
	/// Attribute release rules.
	#[serde(default)]
	pub attribute_release_policy: AttributeReleasePolicy,
	/// Proxy rules.
	#[serde(default)]
	pub proxy_policy: ProxyPolicy,
	/// Username released to the service.
	#[serde(default)]
	pub username_attribute_provider: UsernameAttributeProvider,
	/// Authentication contexts of which at least one must be satisfied; empty accepts any.
	#[serde(default)]
	pub required_authentication_contexts: BTreeSet<String>,
	/// How the service is notified on single logout.
	#[serde(default)]
	pub logout_type: LogoutType,
	/// Endpoint receiving logout notifications; defaults to the service URL.
	#[serde(default)]
	pub logout_url: Option<Url>,
}
impl RegisteredService {
	/// Registered service with default policies.
	pub fn new(id: i64, name: impl Into<String>, service_id: impl Into<String>) -> Self {
		Self {
			id,
			name: name.into(),
			service_id: service_id.into(),
			description: None,
			evaluation_order: 0,
			access_strategy: AccessStrategy::default(),
			attribute_release_policy: AttributeReleasePolicy::default(),
			proxy_policy: ProxyPolicy::default(),
			username_attribute_provider: UsernameAttributeProvider::default(),
			required_authentication_contexts: BTreeSet::new(),
			logout_type: LogoutType::default(),
			logout_url: None,
		}
	}

	/// Replaces the access strategy.
	pub fn with_access_strategy(mut self, access_strategy: AccessStrategy) -> Self {
		self.access_strategy = access_strategy;

		self
	}

	/// Replaces the attribute release policy.
	pub fn with_attribute_release_policy(mut self, policy: AttributeReleasePolicy) -> Self {
		self.attribute_release_policy = policy;

		self
	}

	/// Replaces the proxy policy.
	pub fn with_proxy_policy(mut self, policy: ProxyPolicy) -> Self {
		self.proxy_policy = policy;

		self
	}

	/// Replaces the username provider.
	pub fn with_username_attribute_provider(mut self, provider: UsernameAttributeProvider) -> Self {
		self.username_attribute_provider = provider;

		self
	}

	/// Sets the evaluation order.
	pub fn with_evaluation_order(mut self, order: i32) -> Self {
		self.evaluation_order = order;

		self
	}

	/// Sets the logout type and endpoint.
	pub fn with_logout(mut self, logout_type: LogoutType, logout_url: Option<Url>) -> Self {
		self.logout_type = logout_type;
		self.logout_url = logout_url;

		self
	}

	/// Compiles the service-id pattern.
	pub fn compile(&self) -> Result<Regex, ConfigError> {
		Regex::new(&format!("^(?:{})$", self.service_id))
			.map_err(|source| ConfigError::InvalidPattern { service: self.name.clone(), source })
	}

	/// Validates every pattern the definition carries.
	pub fn validate(&self) -> Result<Regex, ConfigError> {
		let matcher = self.compile()?;

		self.proxy_policy
			.validate()
			.and_then(|_| self.attribute_release_policy.validate())
			.and_then(|_| self.access_strategy.validate())
			.map_err(|source| ConfigError::InvalidPattern { service: self.name.clone(), source })?;

		Ok(matcher)
	}

	/// Returns `true` when the pattern matches the service id; invalid patterns match nothing.
	pub fn matches(&self, service: &Service) -> bool {
		self.compile().is_ok_and(|regex| regex.is_match(&service.id))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn patterns_must_match_the_whole_service_id() {
		let registered = RegisteredService::new(1, "app", "https://app\\.example\\.org/.*");

		assert!(registered.matches(&Service::new("https://app.example.org/login")));
		assert!(
			!registered.matches(&Service::new("https://evil.example.com/?https://app.example.org/"))
		);
	}

	#[test]
	fn invalid_patterns_are_reported_with_the_service_name() {
		let broken = RegisteredService::new(2, "broken", "https://(app");

		assert!(matches!(
			broken.validate(),
			Err(ConfigError::InvalidPattern { ref service, .. }) if service == "broken"
		));
		assert!(!broken.matches(&Service::new("https://(app")));

		let bad_proxy = RegisteredService::new(3, "proxy", ".*")
			.with_proxy_policy(ProxyPolicy::RegexCallback { pattern: "[".into() });

		assert!(bad_proxy.validate().is_err());

		let bad_access = RegisteredService::new(4, "access", ".*").with_access_strategy(
			AccessStrategy::default().require_attribute("memberOf", ["adm[in"]),
		);

		assert!(matches!(
			bad_access.validate(),
			Err(ConfigError::InvalidPattern { ref service, .. }) if service == "access"
		));
	}
}
