//! Per-service access strategy: enablement, single sign-on participation, time window, and
//! principal attribute requirements.

// std
use std::cmp::Ordering;
// crates.io
use regex::{Regex, RegexBuilder};
// self
use crate::{_prelude::*, auth::Attributes};

/// Attribute name mapped to the allowed (or rejected) value patterns.
pub type AttributeRules = BTreeMap<String, BTreeSet<ValuePattern>>;

/// Attribute value pattern: a literal or a regular expression matched against the whole value.
///
/// The expression is compiled once when the pattern is built. A pattern that does not compile
/// only matches literally and is reported by [`AccessStrategy::validate`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ValuePattern {
	source: String,
	compiled: Option<Arc<CompiledPattern>>,
}
impl ValuePattern {
	/// Builds and compiles a pattern.
	pub fn new(source: impl Into<String>) -> Self {
		let source = source.into();
		let compiled = CompiledPattern::new(&source).ok().map(Arc::new);

		Self { source, compiled }
	}

	/// Pattern text as configured.
	pub fn as_str(&self) -> &str {
		&self.source
	}

	/// Compile error of the pattern, if any.
	pub fn validate(&self) -> Result<(), regex::Error> {
		match self.compiled {
			Some(_) => Ok(()),
			None => CompiledPattern::new(&self.source).map(|_| ()),
		}
	}

	/// Literal comparison first, then a full-value regular-expression match.
	pub fn matches(&self, value: &str, case_insensitive: bool) -> bool {
		let literal = if case_insensitive {
			self.source.eq_ignore_ascii_case(value)
		} else {
			self.source == value
		};

		literal
			|| self.compiled.as_ref().is_some_and(|compiled| {
				if case_insensitive {
					compiled.folded.is_match(value)
				} else {
					compiled.exact.is_match(value)
				}
			})
	}
}
impl PartialEq for ValuePattern {
	fn eq(&self, other: &Self) -> bool {
		self.source == other.source
	}
}
impl Eq for ValuePattern {}
impl PartialOrd for ValuePattern {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}
impl Ord for ValuePattern {
	fn cmp(&self, other: &Self) -> Ordering {
		self.source.cmp(&other.source)
	}
}
impl From<String> for ValuePattern {
	fn from(source: String) -> Self {
		Self::new(source)
	}
}
impl From<&str> for ValuePattern {
	fn from(source: &str) -> Self {
		Self::new(source)
	}
}
impl From<ValuePattern> for String {
	fn from(pattern: ValuePattern) -> Self {
		pattern.source
	}
}

#[derive(Debug)]
struct CompiledPattern {
	exact: Regex,
	folded: Regex,
}
impl CompiledPattern {
	fn new(source: &str) -> Result<Self, regex::Error> {
		let anchored = format!("^(?:{source})$");

		Ok(Self {
			exact: Regex::new(&anchored)?,
			folded: RegexBuilder::new(&anchored).case_insensitive(true).build()?,
		})
	}
}

/// Access rules attached to a registered service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessStrategy {
	/// Disabled services reject every request.
	pub enabled: bool,
	/// Whether existing single sign-on sessions may be reused for the service.
	pub sso_enabled: bool,
	/// Access is denied before this instant.
	#[serde(with = "time::serde::rfc3339::option")]
	pub starting_date_time: Option<OffsetDateTime>,
	/// Access is denied after this instant.
	#[serde(with = "time::serde::rfc3339::option")]
	pub ending_date_time: Option<OffsetDateTime>,
	/// AND (`true`) versus OR (`false`) across required attribute names.
	pub require_all_attributes: bool,
	/// Compare required and rejected values case-insensitively.
	pub case_insensitive: bool,
	/// Attributes the principal must carry.
	pub required_attributes: AttributeRules,
	/// Attributes that deny access when any value matches.
	pub rejected_attributes: AttributeRules,
	/// Where the web layer should send users that were denied access.
	pub unauthorized_redirect_url: Option<Url>,
}
impl AccessStrategy {
	/// Strategy with the provided enablement and single sign-on flags.
	pub fn new(enabled: bool, sso_enabled: bool) -> Self {
		Self { enabled, sso_enabled, ..Default::default() }
	}

	/// Adds a required attribute.
	pub fn require_attribute<I, S>(mut self, name: impl Into<String>, values: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.required_attributes
			.insert(name.into(), values.into_iter().map(ValuePattern::new).collect());

		self
	}

	/// Adds a rejected attribute.
	pub fn reject_attribute<I, S>(mut self, name: impl Into<String>, values: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.rejected_attributes
			.insert(name.into(), values.into_iter().map(ValuePattern::new).collect());

		self
	}

	/// Returns `true` when the service is enabled.
	pub fn is_service_access_allowed(&self) -> bool {
		self.enabled
	}

	/// Returns `true` when single sign-on sessions may be reused.
	pub fn is_service_access_allowed_for_sso(&self) -> bool {
		self.sso_enabled
	}

	/// Returns `true` when `now` falls inside the configured window (bounds inclusive).
	pub fn is_within_window(&self, now: OffsetDateTime) -> bool {
		if self.starting_date_time.is_some_and(|start| now < start) {
			return false;
		}
		if self.ending_date_time.is_some_and(|end| now > end) {
			return false;
		}

		true
	}

	/// Returns `true` when the principal attributes satisfy the rejected and required rules.
	///
	/// A required attribute missing from the principal fails that attribute in both AND and OR
	/// modes.
	pub fn do_principal_attributes_allow_access(&self, attributes: &Attributes) -> bool {
		let rejected = self.rejected_attributes.iter().any(|(name, patterns)| {
			attributes.get(name).is_some_and(|values| self.any_value_matches(values, patterns))
		});

		if rejected {
			return false;
		}
		if self.required_attributes.is_empty() {
			return true;
		}

		let mut outcomes = self.required_attributes.iter().map(|(name, patterns)| {
			attributes.get(name).is_some_and(|values| self.any_value_matches(values, patterns))
		});

		if self.require_all_attributes { outcomes.all(|ok| ok) } else { outcomes.any(|ok| ok) }
	}

	/// Reports the first attribute pattern that does not compile.
	pub fn validate(&self) -> Result<(), regex::Error> {
		self.required_attributes
			.values()
			.chain(self.rejected_attributes.values())
			.flatten()
			.try_for_each(ValuePattern::validate)
	}

	fn any_value_matches(&self, values: &[String], patterns: &BTreeSet<ValuePattern>) -> bool {
		patterns.iter().any(|pattern| {
			values.iter().any(|value| pattern.matches(value, self.case_insensitive))
		})
	}
}
impl Default for AccessStrategy {
	fn default() -> Self {
		Self {
			enabled: true,
			sso_enabled: true,
			starting_date_time: None,
			ending_date_time: None,
			require_all_attributes: true,
			case_insensitive: false,
			required_attributes: AttributeRules::new(),
			rejected_attributes: AttributeRules::new(),
			unauthorized_redirect_url: None,
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::_preludet::test_principal;

	#[test]
	fn require_all_demands_every_attribute() {
		let strategy = AccessStrategy::default()
			.require_attribute("memberOf", ["admin", "staff"])
			.require_attribute("cn", ["Al.*"]);
		let alice = test_principal("alice", &[("memberOf", &["admin"]), ("cn", &["Alice"])]);
		let bob = test_principal("bob", &[("memberOf", &["staff"])]);

		assert!(strategy.do_principal_attributes_allow_access(&alice.attributes));
		assert!(!strategy.do_principal_attributes_allow_access(&bob.attributes));

		let any = AccessStrategy { require_all_attributes: false, ..strategy };

		assert!(any.do_principal_attributes_allow_access(&bob.attributes));
		assert!(!any.do_principal_attributes_allow_access(&test_principal("eve", &[]).attributes));
	}

	#[test]
	fn single_required_attribute_scenario() {
		let strategy = AccessStrategy::default().require_attribute("memberOf", ["admin", "staff"]);
		let admin = test_principal("alice", &[("memberOf", &["admin"])]);
		let missing = test_principal("alice", &[("mail", &["alice@example.org"])]);

		assert!(strategy.do_principal_attributes_allow_access(&admin.attributes));
		assert!(!strategy.do_principal_attributes_allow_access(&missing.attributes));
	}

	#[test]
	fn case_sensitivity_is_configurable() {
		let strategy = AccessStrategy::default().require_attribute("memberOf", ["ADMIN"]);
		let principal = test_principal("alice", &[("memberOf", &["admin"])]);

		assert!(!strategy.do_principal_attributes_allow_access(&principal.attributes));

		let insensitive = AccessStrategy { case_insensitive: true, ..strategy };

		assert!(insensitive.do_principal_attributes_allow_access(&principal.attributes));
	}

	#[test]
	fn rejected_attributes_override_requirements() {
		let strategy = AccessStrategy::default()
			.require_attribute("memberOf", ["staff"])
			.reject_attribute("status", ["suspended|locked"]);
		let active = test_principal("alice", &[("memberOf", &["staff"]), ("status", &["active"])]);
		let locked = test_principal("bob", &[("memberOf", &["staff"]), ("status", &["locked"])]);

		assert!(strategy.do_principal_attributes_allow_access(&active.attributes));
		assert!(!strategy.do_principal_attributes_allow_access(&locked.attributes));
	}

	#[test]
	fn patterns_compile_once_and_report_errors() {
		let valid = AccessStrategy::default().require_attribute("memberOf", ["adm.*"]);
		let broken = AccessStrategy::default()
			.require_attribute("memberOf", ["staff"])
			.reject_attribute("status", ["adm[in"]);

		assert!(valid.validate().is_ok());
		assert!(broken.validate().is_err());

		let pattern = ValuePattern::new("adm[in");

		assert!(pattern.matches("adm[in", false));
		assert!(!pattern.matches("admin", false));
		assert!(ValuePattern::new("ADM.*").matches("admin", true));
	}

	#[test]
	fn time_window_bounds_are_inclusive() {
		let start = macros::datetime!(2025-01-01 00:00 UTC);
		let end = macros::datetime!(2025-02-01 00:00 UTC);
		let strategy = AccessStrategy {
			starting_date_time: Some(start),
			ending_date_time: Some(end),
			..Default::default()
		};

		assert!(!strategy.is_within_window(start - Duration::seconds(1)));
		assert!(strategy.is_within_window(start));
		assert!(strategy.is_within_window(end));
		assert!(!strategy.is_within_window(end + Duration::seconds(1)));
	}

	#[test]
	fn strategies_deserialize_with_defaults() {
		let strategy: AccessStrategy = serde_json::from_str(
			r#"{
				"sso_enabled": false,
				"starting_date_time": "2025-01-01T00:00:00Z",
				"required_attributes": { "memberOf": ["admin"] }
			}"#,
		)
		.expect("Access strategy should deserialize.");

		assert!(strategy.enabled);
		assert!(!strategy.sso_enabled);
		assert!(strategy.require_all_attributes);
		assert_eq!(strategy.starting_date_time, Some(macros::datetime!(2025-01-01 00:00 UTC)));
		assert!(strategy.required_attributes["memberOf"].contains(&ValuePattern::new("admin")));
	}
}
