//! JSON settings for ticket lifetimes, identifier generation, and registry housekeeping.
//!
//! Durations are expressed in whole seconds. Every field is optional; omitted fields keep the
//! CAS defaults.

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	ticket::{
		DEFAULT_RANDOM_LENGTH, DEFAULT_REMEMBER_ME_TIME_TO_KILL, DEFAULT_ST_TIME_TO_KILL,
		DEFAULT_TGT_MAX_TIME_TO_LIVE, DEFAULT_TGT_TIME_TO_KILL, ExpirationPolicy,
		ProxyGrantingTicketFactory, ProxyTicketFactory, ServiceTicketFactory, TicketFactory,
		TicketGrantingTicketFactory, TicketIdGenerator,
	},
};

/// Top-level settings document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CasSettings {
	/// Ticket-granting ticket lifetimes.
	pub tgt: TicketGrantingSettings,
	/// Service ticket lifetimes.
	pub st: ServiceTicketSettings,
	/// Proxy-granting ticket lifetimes.
	pub pgt: ProxyGrantingSettings,
	/// Proxy ticket lifetimes.
	pub pt: ServiceTicketSettings,
	/// Identifier generation.
	pub ticket_id: TicketIdSettings,
	/// Registry housekeeping.
	pub registry: RegistrySettings,
}
impl CasSettings {
	/// Parses a settings document, reporting the JSON path of the first offending field.
	pub fn from_json(json: &str) -> Result<Self, ConfigError> {
		let deserializer = &mut serde_json::Deserializer::from_str(json);

		serde_path_to_error::deserialize(deserializer).map_err(ConfigError::settings)
	}

	/// Builds the identifier generator described by [`Self::ticket_id`].
	pub fn id_generator(&self) -> TicketIdGenerator {
		let mut generator = TicketIdGenerator::new(self.ticket_id.random_length);

		if let Some(suffix) = &self.ticket_id.suffix {
			generator = generator.with_suffix(suffix);
		}
		if let Some(key) = &self.ticket_id.signing_key {
			generator = generator.with_signing_key(key.as_bytes());
		}

		generator
	}

	/// Builds the four ticket factories around one shared identifier generator.
	pub fn ticket_factory(&self) -> TicketFactory {
		let id_generator = Arc::new(self.id_generator());
		let mut service =
			ServiceTicketFactory::new(id_generator.clone(), self.st.expiration_policy());
		let mut proxy = ProxyTicketFactory::new(id_generator.clone(), self.pt.expiration_policy());

		service.only_track_most_recent_session = self.tgt.only_track_most_recent_session;
		proxy.only_track_most_recent_session = self.tgt.only_track_most_recent_session;

		TicketFactory {
			ticket_granting: TicketGrantingTicketFactory::new(
				id_generator.clone(),
				self.tgt.expiration_policy(),
			)
			.with_remember_me_policy(ExpirationPolicy::HardTimeout {
				time_to_kill: self.tgt.remember_me_time_to_kill,
			}),
			service,
			proxy_granting: ProxyGrantingTicketFactory::new(
				id_generator,
				ExpirationPolicy::Sliding {
					max_time_to_live: self.pgt.max_time_to_live,
					time_to_kill: self.pgt.time_to_kill,
				},
			),
			proxy,
		}
	}
}

/// Ticket-granting ticket lifetimes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TicketGrantingSettings {
	/// Absolute session lifetime.
	#[serde(with = "seconds")]
	pub max_time_to_live: Duration,
	/// Idle timeout.
	#[serde(with = "seconds")]
	pub time_to_kill: Duration,
	/// Lifetime of remember-me sessions.
	#[serde(with = "seconds")]
	pub remember_me_time_to_kill: Duration,
	/// Track only the latest ticket per equivalent service.
	pub only_track_most_recent_session: bool,
}
impl TicketGrantingSettings {
	fn expiration_policy(&self) -> ExpirationPolicy {
		ExpirationPolicy::Sliding {
			max_time_to_live: self.max_time_to_live,
			time_to_kill: self.time_to_kill,
		}
	}
}
impl Default for TicketGrantingSettings {
	fn default() -> Self {
		Self {
			max_time_to_live: DEFAULT_TGT_MAX_TIME_TO_LIVE,
			time_to_kill: DEFAULT_TGT_TIME_TO_KILL,
			remember_me_time_to_kill: DEFAULT_REMEMBER_ME_TIME_TO_KILL,
			only_track_most_recent_session: true,
		}
	}
}

/// Service or proxy ticket lifetimes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceTicketSettings {
	/// Validations allowed before the ticket expires.
	pub number_of_uses: u32,
	/// Idle timeout.
	#[serde(with = "seconds")]
	pub time_to_kill: Duration,
}
impl ServiceTicketSettings {
	fn expiration_policy(&self) -> ExpirationPolicy {
		ExpirationPolicy::MultiTimeUseOrTimeout {
			number_of_uses: self.number_of_uses,
			time_to_kill: self.time_to_kill,
		}
	}
}
impl Default for ServiceTicketSettings {
	fn default() -> Self {
		Self { number_of_uses: 1, time_to_kill: DEFAULT_ST_TIME_TO_KILL }
	}
}

/// Proxy-granting ticket lifetimes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProxyGrantingSettings {
	/// Absolute lifetime.
	#[serde(with = "seconds")]
	pub max_time_to_live: Duration,
	/// Idle timeout.
	#[serde(with = "seconds")]
	pub time_to_kill: Duration,
}
impl Default for ProxyGrantingSettings {
	fn default() -> Self {
		Self {
			max_time_to_live: DEFAULT_TGT_MAX_TIME_TO_LIVE,
			time_to_kill: DEFAULT_TGT_TIME_TO_KILL,
		}
	}
}

/// Identifier generation settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TicketIdSettings {
	/// Random characters per identifier.
	pub random_length: usize,
	/// Node suffix appended to every identifier.
	pub suffix: Option<String>,
	/// HMAC-SHA256 key; enables authenticity verification of presented identifiers.
	pub signing_key: Option<String>,
}
impl Default for TicketIdSettings {
	fn default() -> Self {
		Self { random_length: DEFAULT_RANDOM_LENGTH, suffix: None, signing_key: None }
	}
}

/// Registry housekeeping settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrySettings {
	/// Periodic sweep of expired tickets.
	pub cleaner: CleanerSettings,
}

/// Periodic cleaner settings.
///
/// The host schedules [`RegistryCleaner::clean`](crate::registry::RegistryCleaner::clean).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleanerSettings {
	/// Whether the host should run the sweep at all.
	pub enabled: bool,
	/// Delay between two sweeps.
	#[serde(with = "seconds")]
	pub interval: Duration,
}
impl Default for CleanerSettings {
	fn default() -> Self {
		Self { enabled: true, interval: Duration::minutes(2) }
	}
}

mod seconds {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(value.whole_seconds())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		i64::deserialize(deserializer).map(Duration::seconds)
	}
}
