//! Per-service proxy policy.

// crates.io
use regex::Regex;
// self
use crate::_prelude::*;

/// Whether a registered service may obtain proxy-granting tickets.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProxyPolicy {
	/// Proxying is refused.
	#[default]
	Refuse,
	/// Proxying is allowed; proxy callback URLs must fully match `pattern`.
	RegexCallback {
		/// Regular expression the callback URL must match.
		pattern: String,
	},
}
impl ProxyPolicy {
	/// Returns `true` when proxying is allowed at all.
	pub fn is_allowed_to_proxy(&self) -> bool {
		matches!(self, Self::RegexCallback { .. })
	}

	/// Returns `true` when the callback URL may receive proxy-granting tickets.
	pub fn is_allowed_proxy_callback_url(&self, callback: &Url) -> bool {
		match self {
			Self::Refuse => false,
			Self::RegexCallback { pattern } => Regex::new(&format!("^(?:{pattern})$"))
				.is_ok_and(|regex| regex.is_match(callback.as_str())),
		}
	}

	/// Compiles the callback pattern so invalid definitions are rejected at load time.
	pub(crate) fn validate(&self) -> Result<(), regex::Error> {
		match self {
			Self::Refuse => Ok(()),
			Self::RegexCallback { pattern } => Regex::new(pattern).map(|_| ()),
		}
	}
}
