//! Attribute release policies and the consent collaborator that may withhold a release.
//!
//! Attribute names are matched case-insensitively against the principal; released names use
//! the spelling configured on the policy.

// crates.io
use regex::Regex;
// self
use crate::{
	_prelude::*,
	auth::{Attributes, Authentication, Principal},
	services::{RegisteredService, Service},
};

/// Which principal attributes a registered service receives.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttributeReleaseRule {
	/// Release every attribute.
	ReturnAll,
	/// Release nothing.
	#[default]
	DenyAll,
	/// Release only the listed attributes.
	ReturnAllowed {
		/// Attribute names to release.
		allowed_attributes: BTreeSet<String>,
	},
	/// Release the listed attributes under new names.
	ReturnMapped {
		/// Source attribute name mapped to the released name.
		allowed_attributes: BTreeMap<String, String>,
	},
	/// Release everything except the listed attributes.
	DenyListed {
		/// Attribute names to withhold.
		denied_attributes: BTreeSet<String>,
	},
}

/// Release rule plus optional value filter and consent gate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeReleasePolicy {
	/// Attribute selection rule.
	pub rule: AttributeReleaseRule,
	/// Regular expression every released value must fully match; attributes left without
	/// values are dropped.
	pub value_filter: Option<String>,
	/// Ask the consent engine before releasing anything.
	pub consent_enabled: bool,
}
impl AttributeReleasePolicy {
	/// Policy with the provided rule and no filter.
	pub fn new(rule: AttributeReleaseRule) -> Self {
		Self { rule, ..Default::default() }
	}

	/// Computes the attributes released from the principal.
	pub fn release(&self, principal: &Principal) -> Attributes {
		let selected = self.select(&principal.attributes);
		let Some(filter) = &self.value_filter else {
			return selected;
		};
		let Ok(regex) = Regex::new(&format!("^(?:{filter})$")) else {
			return Attributes::new();
		};

		selected
			.into_iter()
			.filter_map(|(name, values)| {
				let kept = values.into_iter().filter(|v| regex.is_match(v)).collect::<Vec<_>>();

				(!kept.is_empty()).then_some((name, kept))
			})
			.collect()
	}

	/// Compiles the value filter so invalid definitions are rejected at load time.
	pub(crate) fn validate(&self) -> Result<(), regex::Error> {
		match &self.value_filter {
			Some(filter) => Regex::new(filter).map(|_| ()),
			None => Ok(()),
		}
	}

	fn select(&self, attributes: &Attributes) -> Attributes {
		match &self.rule {
			AttributeReleaseRule::ReturnAll => attributes.clone(),
			AttributeReleaseRule::DenyAll => Attributes::new(),
			AttributeReleaseRule::ReturnAllowed { allowed_attributes } => allowed_attributes
				.iter()
				.filter_map(|name| {
					find_ignore_case(attributes, name).map(|values| (name.clone(), values.to_vec()))
				})
				.collect(),
			AttributeReleaseRule::ReturnMapped { allowed_attributes } => allowed_attributes
				.iter()
				.filter_map(|(source, target)| {
					find_ignore_case(attributes, source)
						.map(|values| (target.clone(), values.to_vec()))
				})
				.collect(),
			AttributeReleaseRule::DenyListed { denied_attributes } => attributes
				.iter()
				.filter(|(name, _)| !denied_attributes.iter().any(|d| d.eq_ignore_ascii_case(name)))
				.map(|(name, values)| (name.clone(), values.clone()))
				.collect(),
		}
	}
}

fn find_ignore_case<'a>(attributes: &'a Attributes, name: &str) -> Option<&'a [String]> {
	attributes
		.get(name)
		.or_else(|| {
			attributes
				.iter()
				.find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
				.map(|(_, values)| values)
		})
		.map(Vec::as_slice)
}

/// Decides whether explicit user consent is still required before attributes are released.
pub trait ConsentEngine
where
	Self: Send + Sync,
{
	/// Returns `true` when the release must be withheld pending consent.
	fn is_consent_required(
		&self,
		service: &Service,
		registered_service: &RegisteredService,
		authentication: &Authentication,
		released: &Attributes,
	) -> bool;
}

/// Consent engine that never requires consent.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoConsentRequired;
impl ConsentEngine for NoConsentRequired {
	fn is_consent_required(
		&self,
		_: &Service,
		_: &RegisteredService,
		_: &Authentication,
		_: &Attributes,
	) -> bool {
		false
	}
}
