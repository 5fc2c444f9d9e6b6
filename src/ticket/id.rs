//! Ticket kinds, typed ticket identifiers, and the identifier generator.
//!
//! Identifiers follow `PREFIX-<counter>-<random>[-<suffix>][.<mac>]`. The prefix lets callers
//! infer the ticket kind before a registry round-trip; the optional MAC lets the orchestrator
//! reject forged identifiers without touching storage.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::{Rng, distr::Alphanumeric};
use sha2::Sha256;
// self
use crate::{_prelude::*, auth::id::def_id};

type HmacSha256 = Hmac<Sha256>;

const TICKET_ID_MAX_LEN: usize = 256;

/// Default length of the random component.
pub const DEFAULT_RANDOM_LENGTH: usize = 20;

/// Closed set of ticket kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketType {
	/// Root of a single sign-on session.
	TicketGranting,
	/// Single-use proof of authentication for one service.
	Service,
	/// Granting ticket held by a proxying service.
	ProxyGranting,
	/// Proxy-granting-ticket-derived equivalent of a service ticket.
	Proxy,
}
impl TicketType {
	/// Identifier prefix for the kind.
	pub const fn prefix(self) -> &'static str {
		match self {
			Self::TicketGranting => "TGT",
			Self::Service => "ST",
			Self::ProxyGranting => "PGT",
			Self::Proxy => "PT",
		}
	}

	/// Resolves a kind from an identifier prefix.
	pub fn from_prefix(prefix: &str) -> Option<Self> {
		match prefix {
			"TGT" => Some(Self::TicketGranting),
			"ST" => Some(Self::Service),
			"PGT" => Some(Self::ProxyGranting),
			"PT" => Some(Self::Proxy),
			_ => None,
		}
	}

	/// Whether a stored ticket of kind `actual` may be used where `self` is requested.
	///
	/// Proxy-granting tickets act as granting tickets and proxy tickets validate like service
	/// tickets.
	pub const fn accepts(self, actual: Self) -> bool {
		matches!(
			(self, actual),
			(Self::TicketGranting, Self::TicketGranting | Self::ProxyGranting)
				| (Self::Service, Self::Service | Self::Proxy)
				| (Self::ProxyGranting, Self::ProxyGranting)
				| (Self::Proxy, Self::Proxy)
		)
	}

	/// Returns `true` for kinds that can grant further tickets.
	pub const fn is_granting(self) -> bool {
		matches!(self, Self::TicketGranting | Self::ProxyGranting)
	}
}
impl Display for TicketType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(match self {
			Self::TicketGranting => "ticket-granting ticket",
			Self::Service => "service ticket",
			Self::ProxyGranting => "proxy-granting ticket",
			Self::Proxy => "proxy ticket",
		})
	}
}

def_id! {
	TicketId,
	"Opaque ticket identifier carrying a kind prefix.",
	"Ticket",
	TICKET_ID_MAX_LEN
}
impl TicketId {
	/// Kind inferred from the identifier prefix, if recognizable.
	pub fn ticket_type(&self) -> Option<TicketType> {
		self.as_str().split_once('-').and_then(|(prefix, _)| TicketType::from_prefix(prefix))
	}
}

/// Generates unique ticket identifiers and verifies their authenticity.
#[derive(Debug)]
pub struct TicketIdGenerator {
	counter: AtomicU64,
	random_length: usize,
	suffix: Option<String>,
	signing_key: Option<Vec<u8>>,
}
impl TicketIdGenerator {
	/// Creates a generator producing `random_length` random characters per identifier.
	pub fn new(random_length: usize) -> Self {
		Self {
			counter: AtomicU64::new(1),
			random_length: random_length.max(1),
			suffix: None,
			signing_key: None,
		}
	}

	/// Appends a node suffix (whitespace is stripped) to every identifier.
	pub fn with_suffix(mut self, suffix: impl AsRef<str>) -> Self {
		let suffix = suffix.as_ref().chars().filter(|c| !c.is_whitespace()).collect::<String>();

		self.suffix = (!suffix.is_empty()).then_some(suffix);

		self
	}

	/// Signs every identifier with HMAC-SHA256 so [`Self::verify`] can reject forgeries.
	pub fn with_signing_key(mut self, key: impl Into<Vec<u8>>) -> Self {
		let key = key.into();

		self.signing_key = (!key.is_empty()).then_some(key);

		self
	}

	/// Returns `true` when identifiers are signed.
	pub fn is_signing(&self) -> bool {
		self.signing_key.is_some()
	}

	/// Produces a fresh identifier for the provided kind.
	pub fn generate(&self, kind: TicketType) -> TicketId {
		let counter = self.counter.fetch_add(1, Ordering::Relaxed);
		let random = rand::rng()
			.sample_iter(Alphanumeric)
			.take(self.random_length)
			.map(char::from)
			.collect::<String>();
		let mut body = format!("{}-{counter}-{random}", kind.prefix());

		if let Some(suffix) = &self.suffix {
			body.push('-');
			body.push_str(suffix);
		}
		if let Some(mac) = self.mac(&body) {
			body.push('.');
			body.push_str(&URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()));
		}

		TicketId(body)
	}

	/// Lightweight authenticity check run before any registry access.
	///
	/// Without a signing key only the syntax (known prefix, counter) is checked.
	pub fn verify(&self, id: &str) -> bool {
		let Some((prefix, rest)) = id.split_once('-') else {
			return false;
		};

		if TicketType::from_prefix(prefix).is_none() {
			return false;
		}

		let counter = rest.split('-').next().unwrap_or_default();

		if counter.is_empty() || !counter.bytes().all(|b| b.is_ascii_digit()) {
			return false;
		}

		match &self.signing_key {
			None => true,
			Some(_) => {
				let Some((body, encoded)) = id.rsplit_once('.') else {
					return false;
				};
				let Ok(signature) = URL_SAFE_NO_PAD.decode(encoded) else {
					return false;
				};

				self.mac(body).is_some_and(|mac| mac.verify_slice(&signature).is_ok())
			},
		}
	}

	fn mac(&self, body: &str) -> Option<HmacSha256> {
		let key = self.signing_key.as_deref()?;
		let mut mac = HmacSha256::new_from_slice(key).ok()?;

		mac.update(body.as_bytes());

		Some(mac)
	}
}
impl Default for TicketIdGenerator {
	fn default() -> Self {
		Self::new(DEFAULT_RANDOM_LENGTH)
	}
}
