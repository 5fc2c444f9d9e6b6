//! Principal model and multi-valued attribute helpers.

// self
use crate::{
	_prelude::*,
	auth::{IdentifierError, PrincipalId},
};

/// Multi-valued attribute map keyed by attribute name.
pub type Attributes = BTreeMap<String, Vec<String>>;

/// Authenticated subject together with its resolved attributes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
	/// Stable principal identifier.
	pub id: PrincipalId,
	/// Resolved attributes (name → values).
	#[serde(default)]
	pub attributes: Attributes,
}
impl Principal {
	/// Creates a principal without attributes.
	pub fn new(id: impl AsRef<str>) -> Result<Self, IdentifierError> {
		Ok(Self { id: PrincipalId::new(id)?, attributes: Attributes::new() })
	}

	/// Adds (or replaces) an attribute.
	pub fn with_attribute<I, S>(mut self, name: impl Into<String>, values: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.attributes.insert(name.into(), values.into_iter().map(Into::into).collect());

		self
	}

	/// Replaces every attribute.
	pub fn with_attributes(mut self, attributes: Attributes) -> Self {
		self.attributes = attributes;

		self
	}

	/// Returns the values of the named attribute, if present.
	pub fn attribute(&self, name: &str) -> Option<&[String]> {
		self.attributes.get(name).map(Vec::as_slice)
	}

	/// Two principals are the same subject when their identifiers match.
	pub fn is_same_subject(&self, other: &Self) -> bool {
		self.id == other.id
	}
}
impl Display for Principal {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.id)
	}
}

/// Merges `overlay` on top of `base`, overlay values winning per attribute name.
pub fn merge_attributes(base: &Attributes, overlay: &Attributes) -> Attributes {
	let mut merged = base.clone();

	for (name, values) in overlay {
		merged.insert(name.clone(), values.clone());
	}

	merged
}
