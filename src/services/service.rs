//! Requested services plus the pluggable selection and matching strategies applied to them.

// self
use crate::_prelude::*;

/// Service (relying party) a ticket is requested for or validated by.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Service {
	/// Canonical service identifier (usually a URL).
	pub id: String,
	/// URL exactly as the client presented it.
	pub original_url: String,
}
impl Service {
	/// Creates a service whose id and original URL are the same value.
	pub fn new(url: impl Into<String>) -> Self {
		let url = url.into();

		Self { id: url.clone(), original_url: url }
	}

	/// Overrides the canonical identifier while keeping the original URL.
	pub fn with_id(mut self, id: impl Into<String>) -> Self {
		self.id = id.into();

		self
	}

	/// Parses the original URL, if it is an absolute URL.
	pub fn url(&self) -> Option<Url> {
		Url::parse(&self.original_url).ok()
	}
}
impl Display for Service {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.id)
	}
}

/// Decides whether the service presented at validation is the one a ticket was issued for.
pub trait ServiceMatchingStrategy
where
	Self: Send + Sync,
{
	/// Returns `true` when `presented` matches `issued`.
	fn matches(&self, issued: &Service, presented: &Service) -> bool;
}

/// Exact string equality of the canonical identifiers.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExactServiceMatchingStrategy;
impl ServiceMatchingStrategy for ExactServiceMatchingStrategy {
	fn matches(&self, issued: &Service, presented: &Service) -> bool {
		issued.id == presented.id
	}
}

/// Compares parsed URLs, ignoring scheme/host case, default ports, and an empty path.
///
/// Identifiers that are not absolute URLs fall back to exact comparison.
#[derive(Clone, Copy, Debug, Default)]
pub struct NormalizedUrlMatchingStrategy;
impl ServiceMatchingStrategy for NormalizedUrlMatchingStrategy {
	fn matches(&self, issued: &Service, presented: &Service) -> bool {
		match (Url::parse(&issued.id), Url::parse(&presented.id)) {
			(Ok(a), Ok(b)) => a == b,
			_ => issued.id == presented.id,
		}
	}
}

/// Canonicalizes a requested service before it is resolved against the services manager.
pub trait ServiceSelectionStrategy
where
	Self: Send + Sync,
{
	/// Returns `true` when the strategy wants to handle the service.
	fn supports(&self, service: &Service) -> bool;

	/// Returns the canonical service.
	fn resolve(&self, service: &Service) -> Service;
}

/// Ordered chain of selection strategies; the first supporting strategy wins and unsupported
/// services pass through unchanged.
#[derive(Clone, Default)]
pub struct ServiceSelectionPlan {
	strategies: Vec<Arc<dyn ServiceSelectionStrategy>>,
}
impl ServiceSelectionPlan {
	/// Appends a strategy.
	pub fn with_strategy(mut self, strategy: Arc<dyn ServiceSelectionStrategy>) -> Self {
		self.strategies.push(strategy);

		self
	}

	/// Resolves the service through the first supporting strategy.
	pub fn resolve(&self, service: &Service) -> Service {
		self.strategies
			.iter()
			.find(|strategy| strategy.supports(service))
			.map(|strategy| strategy.resolve(service))
			.unwrap_or_else(|| service.clone())
	}
}
impl Debug for ServiceSelectionPlan {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ServiceSelectionPlan").field("strategies", &self.strategies.len()).finish()
	}
}

/// Strips the named query parameters from the canonical identifier (e.g. a `renew` flag that
/// must not influence ticket binding).
#[derive(Clone, Debug)]
pub struct StripQueryParametersSelection {
	parameters: BTreeSet<String>,
}
impl StripQueryParametersSelection {
	/// Creates a strategy that removes the provided parameter names.
	pub fn new<I, S>(parameters: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self { parameters: parameters.into_iter().map(Into::into).collect() }
	}
}
impl ServiceSelectionStrategy for StripQueryParametersSelection {
	fn supports(&self, service: &Service) -> bool {
		Url::parse(&service.id).is_ok_and(|url| {
			url.query_pairs().any(|(name, _)| self.parameters.contains(&*name))
		})
	}

	fn resolve(&self, service: &Service) -> Service {
		let Ok(mut url) = Url::parse(&service.id) else {
			return service.clone();
		};
		let kept = url
			.query_pairs()
			.filter(|(name, _)| !self.parameters.contains(&**name))
			.map(|(name, value)| (name.into_owned(), value.into_owned()))
			.collect::<Vec<_>>();

		if kept.is_empty() {
			url.set_query(None);
		} else {
			url.query_pairs_mut().clear().extend_pairs(kept);
		}

		service.clone().with_id(url.as_str())
	}
}
