//! Services manager contract and the in-memory implementation.

// crates.io
use regex::Regex;
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	services::{RegisteredService, Service},
};

/// Resolves requested services to registered services.
pub trait ServicesManager
where
	Self: Send + Sync,
{
	/// First registered service (by evaluation order) matching the service, if any.
	fn find_service_by(&self, service: &Service) -> Option<Arc<RegisteredService>>;

	/// Registered service with the provided numeric id, if any.
	fn find_service_by_id(&self, id: i64) -> Option<Arc<RegisteredService>>;

	/// Every registered service in evaluation order.
	fn all_services(&self) -> Vec<Arc<RegisteredService>>;
}

#[derive(Clone, Debug)]
struct CompiledService {
	definition: Arc<RegisteredService>,
	matcher: Regex,
}

/// Services manager holding an immutable, ordered snapshot that is replaced as a whole.
///
/// Readers clone the current snapshot and never observe a partially loaded definition set.
#[derive(Debug, Default)]
pub struct InMemoryServicesManager {
	snapshot: RwLock<Arc<Vec<CompiledService>>>,
}
impl InMemoryServicesManager {
	/// Builds a manager from JSON service definitions (an array of registered services).
	pub fn from_json(json: &str) -> Result<Self, ConfigError> {
		let deserializer = &mut serde_json::Deserializer::from_str(json);
		let services: Vec<RegisteredService> = serde_path_to_error::deserialize(deserializer)
			.map_err(ConfigError::service_definitions)?;
		let manager = Self::default();

		manager.load(services)?;

		Ok(manager)
	}

	/// Replaces every definition; the previous snapshot stays active when validation fails.
	pub fn load(&self, services: Vec<RegisteredService>) -> Result<(), ConfigError> {
		let mut seen = BTreeSet::new();
		let mut compiled = Vec::with_capacity(services.len());

		for service in services {
			if !seen.insert(service.id) {
				return Err(ConfigError::DuplicateServiceId { id: service.id });
			}

			let matcher = service.validate()?;

			compiled.push(CompiledService { definition: Arc::new(service), matcher });
		}

		compiled.sort_by(|a, b| {
			(a.definition.evaluation_order, a.definition.id)
				.cmp(&(b.definition.evaluation_order, b.definition.id))
		});

		*self.snapshot.write() = Arc::new(compiled);

		Ok(())
	}

	/// Adds or replaces one definition.
	pub fn save(&self, service: RegisteredService) -> Result<(), ConfigError> {
		let mut services = self
			.current()
			.iter()
			.filter(|entry| entry.definition.id != service.id)
			.map(|entry| (*entry.definition).clone())
			.collect::<Vec<_>>();

		services.push(service);

		self.load(services)
	}

	/// Removes one definition; returns whether it existed.
	pub fn delete(&self, id: i64) -> Result<bool, ConfigError> {
		let current = self.current();
		let services = current
			.iter()
			.filter(|entry| entry.definition.id != id)
			.map(|entry| (*entry.definition).clone())
			.collect::<Vec<_>>();
		let removed = services.len() != current.len();

		if removed {
			self.load(services)?;
		}

		Ok(removed)
	}

	fn current(&self) -> Arc<Vec<CompiledService>> {
		self.snapshot.read().clone()
	}
}
impl ServicesManager for InMemoryServicesManager {
	fn find_service_by(&self, service: &Service) -> Option<Arc<RegisteredService>> {
		self.current()
			.iter()
			.find(|entry| entry.matcher.is_match(&service.id))
			.map(|entry| entry.definition.clone())
	}

	fn find_service_by_id(&self, id: i64) -> Option<Arc<RegisteredService>> {
		self.current()
			.iter()
			.find(|entry| entry.definition.id == id)
			.map(|entry| entry.definition.clone())
	}

	fn all_services(&self) -> Vec<Arc<RegisteredService>> {
		self.current().iter().map(|entry| entry.definition.clone()).collect()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::{test_registered_service, test_service};

	#[test]
	fn evaluation_order_decides_between_overlapping_patterns() {
		let manager = InMemoryServicesManager::default();

		manager
			.load(vec![
				test_registered_service(1, "https://.*").with_evaluation_order(10),
				test_registered_service(2, "https://app\\.example\\.org/.*")
					.with_evaluation_order(1),
			])
			.expect("Fixture definitions should load.");

		let found = manager
			.find_service_by(&test_service("https://app.example.org/home"))
			.expect("A registered service should match.");

		assert_eq!(found.id, 2);
		assert_eq!(
			manager.find_service_by(&test_service("https://other.example.org/")).map(|s| s.id),
			Some(1)
		);
		assert!(manager.find_service_by(&test_service("ftp://files.example.org/")).is_none());
	}

	#[test]
	fn failed_loads_keep_the_previous_snapshot() {
		let manager = InMemoryServicesManager::default();

		manager.load(vec![test_registered_service(1, ".*")]).expect("Fixture should load.");

		let duplicate =
			manager.load(vec![test_registered_service(2, ".*"), test_registered_service(2, "x")]);

		assert!(matches!(duplicate, Err(ConfigError::DuplicateServiceId { id: 2 })));
		assert!(manager.load(vec![test_registered_service(3, "(")]).is_err());
		assert_eq!(manager.all_services().len(), 1);
		assert_eq!(manager.all_services()[0].id, 1);

		manager.save(test_registered_service(4, "https://.*")).expect("Save should succeed.");

		assert!(manager.delete(1).expect("Delete should succeed."));
		assert!(!manager.delete(1).expect("Delete should succeed."));
		assert_eq!(manager.find_service_by_id(4).map(|s| s.name.clone()), Some("service-4".into()));
	}

	#[test]
	fn json_errors_name_the_offending_field() {
		let err = InMemoryServicesManager::from_json(
			r#"[{"id":1,"name":"app","service_id":".*","access_strategy":{"enabled":"yes"}}]"#,
		)
		.expect_err("A string is not a boolean.");

		match err {
			ConfigError::InvalidServiceDefinitions { path, .. } =>
				assert_eq!(path, "[0].access_strategy.enabled"),
			other => panic!("Unexpected error: {other:?}"),
		}

		let manager = InMemoryServicesManager::from_json(
			r#"[{
				"id": 7,
				"name": "app",
				"service_id": "https://app\\.example\\.org/.*",
				"evaluation_order": 3
			}]"#,
		)
		.expect("Valid definitions should load.");

		assert_eq!(manager.all_services()[0].evaluation_order, 3);
	}
}
