//! Storage seam for the platter fulfillment core.
//!
//! The order store is the single shared resource in the system, and
//! multiple process instances may mutate it concurrently. The interface
//! therefore exposes an optimistic compare-and-swap primitive in addition
//! to plain key-value operations; every domain mutation goes through a
//! conditional write rather than an in-process lock.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

pub use implementations::file::FileStorage;
pub use implementations::memory::MemoryStorage;

/// Bound on CAS retries in [`StorageService::update`] before giving up.
const UPDATE_RETRY_LIMIT: usize = 64;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs when a conditional write loses to a concurrent
	/// writer (or an insert finds the key already present).
	#[error("Conflict: concurrent modification")]
	Conflict,
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
}

/// Trait defining the low-level interface for storage backends.
///
/// Keys are flat strings of the form `namespace:id`. Backends must make
/// `compare_and_swap_bytes` atomic with respect to all other writes on the
/// same key; that single guarantee carries every critical section in the
/// system (verification attempt counters, settlement markers).
#[async_trait]
pub trait StorageInterface: Send + Sync + std::fmt::Debug {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes unconditionally.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Stores raw bytes only if the current value matches `expected`.
	///
	/// `expected = None` means insert-if-absent. Returns
	/// [`StorageError::Conflict`] when the current value differs.
	async fn compare_and_swap_bytes(
		&self,
		key: &str,
		expected: Option<&[u8]>,
		value: Vec<u8>,
	) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Lists all keys starting with the given prefix.
	async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// High-level storage service that provides typed operations.
///
/// Wraps a low-level backend with JSON serialization and the conditional
/// read-modify-write loop used by all domain mutations.
pub struct StorageService {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	fn key(namespace: &str, id: &str) -> String {
		format!("{}:{}", namespace, id)
	}

	/// Stores a serializable value unconditionally.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&Self::key(namespace, id), bytes).await
	}

	/// Stores a serializable value only if the key does not exist yet.
	pub async fn create<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend
			.compare_and_swap_bytes(&Self::key(namespace, id), None, bytes)
			.await
	}

	/// Retrieves and deserializes a value from storage.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&Self::key(namespace, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Removes a value from storage.
	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&Self::key(namespace, id)).await
	}

	/// Checks whether a record exists.
	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&Self::key(namespace, id)).await
	}

	/// Retrieves every record in a namespace.
	///
	/// Full-namespace scan; callers filter in memory. Records deleted
	/// between the key scan and the read are skipped.
	pub async fn list<T: DeserializeOwned>(
		&self,
		namespace: &str,
	) -> Result<Vec<T>, StorageError> {
		let prefix = format!("{}:", namespace);
		let mut out = Vec::new();
		for key in self.backend.keys(&prefix).await? {
			match self.backend.get_bytes(&key).await {
				Ok(bytes) => {
					let value = serde_json::from_slice(&bytes)
						.map_err(|e| StorageError::Serialization(e.to_string()))?;
					out.push(value);
				}
				Err(StorageError::NotFound) => continue,
				Err(e) => return Err(e),
			}
		}
		Ok(out)
	}

	/// Atomically applies `mutate` to a stored record.
	///
	/// Reads the record, applies the closure, and writes back with a
	/// compare-and-swap against the bytes that were read; on conflict the
	/// whole sequence retries with a fresh read. If the closure leaves the
	/// record unchanged nothing is written. The closure may run more than
	/// once and must not have side effects of its own.
	pub async fn update<T, R, F>(
		&self,
		namespace: &str,
		id: &str,
		mut mutate: F,
	) -> Result<R, StorageError>
	where
		T: Serialize + DeserializeOwned,
		F: FnMut(&mut T) -> R,
	{
		let key = Self::key(namespace, id);
		for _ in 0..UPDATE_RETRY_LIMIT {
			let current = self.backend.get_bytes(&key).await?;
			let mut value: T = serde_json::from_slice(&current)
				.map_err(|e| StorageError::Serialization(e.to_string()))?;
			let result = mutate(&mut value);
			let updated = serde_json::to_vec(&value)
				.map_err(|e| StorageError::Serialization(e.to_string()))?;
			if updated == current {
				return Ok(result);
			}
			match self
				.backend
				.compare_and_swap_bytes(&key, Some(&current), updated)
				.await
			{
				Ok(()) => return Ok(result),
				Err(StorageError::Conflict) => continue,
				Err(e) => return Err(e),
			}
		}
		Err(StorageError::Conflict)
	}
}

/// Factory function to create a storage backend by name.
///
/// Recognized backends: `memory`, `file` (rooted at `path`).
pub fn create_backend(
	backend: &str,
	path: &std::path::Path,
) -> Result<Box<dyn StorageInterface>, StorageError> {
	match backend {
		"memory" => Ok(Box::new(MemoryStorage::new())),
		"file" => Ok(Box::new(FileStorage::new(path.to_path_buf()))),
		other => Err(StorageError::Backend(format!(
			"Unknown storage backend: {}",
			other
		))),
	}
}
