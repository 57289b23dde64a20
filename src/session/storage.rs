//! Durable client-side storage for the access and refresh tokens.

// std
use std::{
	collections::HashMap,
	fs,
	path::{Path, PathBuf},
	sync::{PoisonError, RwLock},
};
// self
use crate::_prelude::*;

/// Storage key holding the bearer access token.
pub const ACCESS_TOKEN_KEY: &str = "auth_token";
/// Storage key holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Key/value storage surviving client restarts.
pub trait TokenStore: Send + Sync + std::fmt::Debug {
	/// Read the value stored under `key`.
	fn get(&self, key: &str) -> Option<String>;

	/// Write `value` under `key`.
	fn set(&self, key: &str, value: &str) -> Result<()>;

	/// Remove the value stored under `key`.
	fn remove(&self, key: &str) -> Result<()>;

	/// Remove both tokens.
	fn clear_all(&self) -> Result<()> {
		self.remove(ACCESS_TOKEN_KEY)?;
		self.remove(REFRESH_TOKEN_KEY)
	}

	/// Current access token.
	fn access_token(&self) -> Option<String> {
		self.get(ACCESS_TOKEN_KEY)
	}

	/// Current refresh token.
	fn refresh_token(&self) -> Option<String> {
		self.get(REFRESH_TOKEN_KEY)
	}
}

/// Process-local store; contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
	values: RwLock<HashMap<String, String>>,
}
impl MemoryTokenStore {
	/// Create an empty store.
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}
}
impl TokenStore for MemoryTokenStore {
	fn get(&self, key: &str) -> Option<String> {
		self.values.read().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
	}

	fn set(&self, key: &str, value: &str) -> Result<()> {
		self.values
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.insert(key.to_owned(), value.to_owned());

		Ok(())
	}

	fn remove(&self, key: &str) -> Result<()> {
		self.values.write().unwrap_or_else(PoisonError::into_inner).remove(key);

		Ok(())
	}
}

/// JSON file backed store.
///
/// The whole map is rewritten on every mutation; reads are served from memory.
#[derive(Debug)]
pub struct FileTokenStore {
	path: PathBuf,
	values: RwLock<HashMap<String, String>>,
}
impl FileTokenStore {
	/// Open (or lazily create) the store at `path`.
	pub fn open(path: impl Into<PathBuf>) -> Result<Arc<Self>> {
		let path = path.into();
		let values = match fs::read(&path) {
			Ok(bytes) if bytes.is_empty() => HashMap::new(),
			Ok(bytes) => serde_json::from_slice(&bytes).map_err(|err| {
				Error::Storage(format!("Corrupt token file {}: {err}.", path.display()))
			})?,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
			Err(err) => return Err(err.into()),
		};

		tracing::debug!(path = %path.display(), entries = values.len(), "opened token store");

		Ok(Arc::new(Self { path, values: RwLock::new(values) }))
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn persist(&self, values: &HashMap<String, String>) -> Result<()> {
		if let Some(parent) = self.path.parent()
			&& !parent.as_os_str().is_empty()
		{
			fs::create_dir_all(parent)?;
		}

		let tmp = self.path.with_extension("tmp");

		fs::write(&tmp, serde_json::to_vec(values)?)?;
		fs::rename(&tmp, &self.path)?;

		Ok(())
	}
}
impl TokenStore for FileTokenStore {
	fn get(&self, key: &str) -> Option<String> {
		self.values.read().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
	}

	fn set(&self, key: &str, value: &str) -> Result<()> {
		let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);

		values.insert(key.to_owned(), value.to_owned());

		self.persist(&values)
	}

	fn remove(&self, key: &str) -> Result<()> {
		let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);

		if values.remove(key).is_some() {
			self.persist(&values)?;
		}

		Ok(())
	}
}
