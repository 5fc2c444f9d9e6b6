//! File-backed [`TicketRegistry`] that survives restarts of a single node.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	registry::{CompareAndSwapOutcome, RegistryError, RegistryFuture, TicketRegistry},
	ticket::{Ticket, TicketId},
};

/// Persists tickets to a JSON snapshot after each mutation.
///
/// A mutation becomes visible only after its snapshot was written; a failed write leaves the
/// registry unchanged.
#[derive(Clone, Debug)]
pub struct FileTicketRegistry {
	path: PathBuf,
	inner: Arc<RwLock<HashMap<TicketId, Ticket>>>,
}
impl FileTicketRegistry {
	/// Opens (or creates) a registry at the provided path, eagerly loading existing tickets.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the snapshot file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<HashMap<TicketId, Ticket>, RegistryError> {
		if !path.exists() {
			return Ok(HashMap::new());
		}

		let metadata = path.metadata().map_err(|e| RegistryError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| RegistryError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;
		let tickets: Vec<Ticket> =
			serde_json::from_slice(&bytes).map_err(|e| RegistryError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(tickets.into_iter().map(|ticket| (ticket.id.clone(), ticket)).collect())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), RegistryError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| RegistryError::Backend {
				message: format!("Failed to create registry directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &HashMap<TicketId, Ticket>) -> Result<(), RegistryError> {
		Self::ensure_parent_exists(&self.path)?;

		let snapshot = contents.values().collect::<Vec<_>>();
		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| RegistryError::Serialization {
				message: format!("Failed to serialize registry snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| RegistryError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| RegistryError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| RegistryError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| RegistryError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	/// Persists the staged contents and only then makes them visible to readers.
	fn commit(
		&self,
		current: &mut HashMap<TicketId, Ticket>,
		staged: HashMap<TicketId, Ticket>,
	) -> Result<(), RegistryError> {
		self.persist_locked(&staged)?;
		*current = staged;

		Ok(())
	}
}
impl TicketRegistry for FileTicketRegistry {
	fn add_ticket(&self, ticket: Ticket) -> RegistryFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			if guard.contains_key(&ticket.id) {
				return Err(RegistryError::Duplicate { ticket_id: ticket.id.to_string() });
			}

			let mut staged = guard.clone();

			staged.insert(ticket.id.clone(), ticket);

			self.commit(&mut guard, staged)
		})
	}

	fn find_ticket<'a>(&'a self, id: &'a str) -> RegistryFuture<'a, Option<Ticket>> {
		Box::pin(async move { Ok(self.inner.read().get(id).cloned()) })
	}

	fn update_ticket(&self, mut ticket: Ticket) -> RegistryFuture<'_, bool> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let mut staged = guard.clone();
			let Some(stored) = staged.get_mut(&ticket.id) else {
				return Ok(false);
			};

			ticket.version = stored.version.wrapping_add(1);
			*stored = ticket;

			self.commit(&mut guard, staged)?;

			Ok(true)
		})
	}

	fn compare_and_swap(
		&self,
		expected_version: u64,
		mut ticket: Ticket,
	) -> RegistryFuture<'_, CompareAndSwapOutcome> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let mut staged = guard.clone();
			let outcome = match staged.get_mut(&ticket.id) {
				Some(stored) if stored.version == expected_version => {
					ticket.version = expected_version.wrapping_add(1);
					*stored = ticket;

					CompareAndSwapOutcome::Updated
				},
				Some(_) => CompareAndSwapOutcome::VersionMismatch,
				None => CompareAndSwapOutcome::Missing,
			};

			if matches!(outcome, CompareAndSwapOutcome::Updated) {
				self.commit(&mut guard, staged)?;
			}

			Ok(outcome)
		})
	}

	fn delete_single_ticket<'a>(&'a self, id: &'a str) -> RegistryFuture<'a, bool> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let mut staged = guard.clone();
			let removed = staged.remove(id).is_some();

			if removed {
				self.commit(&mut guard, staged)?;
			}

			Ok(removed)
		})
	}

	fn tickets(&self) -> RegistryFuture<'_, Vec<Ticket>> {
		Box::pin(async move { Ok(self.inner.read().values().cloned().collect()) })
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// crates.io
	use tokio::runtime::Runtime;
	// self
	use super::*;
	use crate::{
		_preludet::{test_authentication, test_service},
		ticket::TicketFactory,
	};

	fn temp_path() -> PathBuf {
		let unique = format!(
			"cas_sso_file_registry_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	#[test]
	fn tickets_and_chains_survive_reopen() {
		let path = temp_path();
		let registry = FileTicketRegistry::open(&path).expect("Failed to open file registry.");
		let factory = TicketFactory::default();
		let mut tgt = factory.ticket_granting.create(test_authentication("alice"));
		let st = factory
			.service
			.create(&mut tgt, &test_service("https://app.example.org"), true)
			.expect("Failed to grant fixture service ticket.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file registry test.");

		rt.block_on(registry.add_ticket(tgt.clone())).expect("Failed to store fixture TGT.");
		rt.block_on(registry.add_ticket(st.clone())).expect("Failed to store fixture ST.");
		drop(registry);

		let reopened = FileTicketRegistry::open(&path).expect("Failed to reopen file registry.");
		let restored = rt
			.block_on(reopened.find_ticket(tgt.id.as_str()))
			.expect("Failed to read TGT from reopened registry.")
			.expect("File registry lost the TGT after reopen.");

		assert_eq!(restored, tgt);
		assert_eq!(
			rt.block_on(reopened.delete_ticket(tgt.id.as_str()))
				.expect("Failed to cascade-delete fixture TGT."),
			2
		);
		assert!(rt.block_on(reopened.tickets()).expect("Failed to list tickets.").is_empty());

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary registry snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn failed_writes_leave_the_registry_unchanged() {
		let path = temp_path();
		let registry = FileTicketRegistry::open(&path).expect("Failed to open file registry.");
		let factory = TicketFactory::default();
		let tgt = factory.ticket_granting.create(test_authentication("alice"));
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file registry test.");

		fs::create_dir(&path).expect("Failed to block the snapshot path with a directory.");

		assert!(matches!(
			rt.block_on(registry.add_ticket(tgt.clone())),
			Err(RegistryError::Backend { .. })
		));
		assert!(
			rt.block_on(registry.find_ticket(tgt.id.as_str()))
				.expect("Failed to read from file registry.")
				.is_none()
		);

		fs::remove_dir(&path).expect("Failed to remove the blocking directory.");
		rt.block_on(registry.add_ticket(tgt.clone())).expect("Failed to store fixture TGT.");

		let mut tampered = tgt.clone();

		tampered.mark_expired();
		fs::remove_file(&path).expect("Failed to remove the snapshot.");
		fs::create_dir(&path).expect("Failed to block the snapshot path with a directory.");

		assert!(rt.block_on(registry.update_ticket(tampered)).is_err());
		assert_eq!(
			rt.block_on(registry.find_ticket(tgt.id.as_str()))
				.expect("Failed to read from file registry.")
				.map(|ticket| ticket.expired),
			Some(false)
		);

		fs::remove_dir(&path).expect("Failed to remove the blocking directory.");

		let mut tmp_path = path.clone();

		tmp_path.set_extension("tmp");

		let _ = fs::remove_file(&tmp_path);
	}
}
