//! In-memory storage backend.
//!
//! Backed by a concurrent hash map; compare-and-swap is atomic because it
//! runs under the map's per-entry lock. This is the backend used by tests
//! and by single-process deployments that do not need durability.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// In-memory storage implementation.
#[derive(Debug, Default)]
pub struct MemoryStorage {
	map: DashMap<String, Vec<u8>>,
}

impl MemoryStorage {
	/// Creates an empty in-memory store.
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		self.map
			.get(key)
			.map(|entry| entry.value().clone())
			.ok_or(StorageError::NotFound)
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		self.map.insert(key.to_string(), value);
		Ok(())
	}

	async fn compare_and_swap_bytes(
		&self,
		key: &str,
		expected: Option<&[u8]>,
		value: Vec<u8>,
	) -> Result<(), StorageError> {
		// The entry guard holds the shard lock, making the compare and the
		// write one atomic step.
		match (self.map.entry(key.to_string()), expected) {
			(Entry::Occupied(mut occupied), Some(expected))
				if occupied.get().as_slice() == expected =>
			{
				occupied.insert(value);
				Ok(())
			}
			(Entry::Vacant(vacant), None) => {
				vacant.insert(value);
				Ok(())
			}
			_ => Err(StorageError::Conflict),
		}
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		self.map.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		Ok(self.map.contains_key(key))
	}

	async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		Ok(self
			.map
			.iter()
			.map(|entry| entry.key().clone())
			.filter(|key| key.starts_with(prefix))
			.collect())
	}
}
