//! Username providers that decide which principal id a relying party receives.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, auth::Principal, services::Service};

/// Case applied to an attribute-derived username.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseCanonicalization {
	/// Keep the value untouched.
	#[default]
	None,
	/// Lowercase the value.
	Lower,
	/// Uppercase the value.
	Upper,
}
impl CaseCanonicalization {
	fn apply(self, value: &str) -> String {
		match self {
			Self::None => value.to_owned(),
			Self::Lower => value.to_lowercase(),
			Self::Upper => value.to_uppercase(),
		}
	}
}

/// Resolves the username released to a service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UsernameAttributeProvider {
	/// Release the principal id as is.
	#[default]
	Default,
	/// Release an opaque, persistent, per-service identifier.
	Anonymous {
		/// Secret salt mixed into the identifier.
		salt: String,
	},
	/// Release the first value of a principal attribute, falling back to the principal id.
	PrincipalAttribute {
		/// Attribute to read.
		attribute: String,
		/// Case applied to the released value.
		#[serde(default)]
		canonicalization: CaseCanonicalization,
	},
}
impl UsernameAttributeProvider {
	/// Resolves the username for `principal` at `service`.
	pub fn resolve_username(&self, principal: &Principal, service: &Service) -> String {
		match self {
			Self::Default => principal.id.to_string(),
			Self::Anonymous { salt } => anonymous_id(&service.id, principal.id.as_str(), salt),
			Self::PrincipalAttribute { attribute, canonicalization } => principal
				.attribute(attribute)
				.and_then(|values| values.first())
				.map(|value| canonicalization.apply(value))
				.unwrap_or_else(|| principal.id.to_string()),
		}
	}
}

fn anonymous_id(service: &str, principal: &str, salt: &str) -> String {
	let mut hasher = Sha256::new();

	hasher.update(service.as_bytes());
	hasher.update(b"|");
	hasher.update(principal.as_bytes());
	hasher.update(b"|");
	hasher.update(salt.as_bytes());

	STANDARD.encode(hasher.finalize())
}
