//! File-based storage backend.
//!
//! Stores each record as a JSON file under a per-namespace directory,
//! writing atomically via a temp file and rename. Compare-and-swap is
//! serialized through a per-key lock table, which makes the conditional
//! write atomic within one process only; multi-process deployments need a
//! backend with native conditional writes.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;

/// File-based storage implementation.
#[derive(Debug)]
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
	/// Per-key locks backing compare-and-swap.
	locks: DashMap<String, Arc<Mutex<()>>>,
}

impl FileStorage {
	/// Creates a new FileStorage instance rooted at the specified path.
	pub fn new(base_path: PathBuf) -> Self {
		Self {
			base_path,
			locks: DashMap::new(),
		}
	}

	/// Converts a `namespace:id` key to a filesystem path, one directory
	/// per namespace.
	fn file_path(&self, key: &str) -> PathBuf {
		match key.split_once(':') {
			Some((namespace, id)) => self
				.base_path
				.join(sanitize(namespace))
				.join(format!("{}.json", sanitize(id))),
			None => self.base_path.join(format!("{}.json", sanitize(key))),
		}
	}

	fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
		self.locks
			.entry(key.to_string())
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.clone()
	}

	async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
		match fs::read(self.file_path(key)).await {
			Ok(data) => Ok(Some(data)),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn write(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
		let path = self.file_path(key);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		// Write atomically by writing to a temp file then renaming.
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, value)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}
}

fn sanitize(part: &str) -> String {
	part.replace(['/', ':', '\\'], "_")
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		self.read(key).await?.ok_or(StorageError::NotFound)
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let lock = self.lock_for(key);
		let _guard = lock.lock().await;
		self.write(key, &value).await
	}

	async fn compare_and_swap_bytes(
		&self,
		key: &str,
		expected: Option<&[u8]>,
		value: Vec<u8>,
	) -> Result<(), StorageError> {
		let lock = self.lock_for(key);
		let _guard = lock.lock().await;

		let current = self.read(key).await?;
		match (current, expected) {
			(Some(current), Some(expected)) if current == expected => {}
			(None, None) => {}
			_ => return Err(StorageError::Conflict),
		}
		self.write(key, &value).await
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let lock = self.lock_for(key);
		let removed = {
			let _guard = lock.lock().await;
			match fs::remove_file(self.file_path(key)).await {
				Ok(_) => Ok(()),
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
				Err(e) => Err(StorageError::Backend(e.to_string())),
			}
		};
		// Evict the lock entry, otherwise the table grows by one mutex
		// per key ever touched. A later access recreates it.
		self.locks.remove(key);
		removed
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		Ok(self.file_path(key).exists())
	}

	async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		// Prefix scans are namespace-shaped: "namespace:" plus an optional
		// id prefix.
		let (namespace, id_prefix) = match prefix.split_once(':') {
			Some((namespace, rest)) => (namespace, rest),
			None => (prefix, ""),
		};
		let dir = self.base_path.join(sanitize(namespace));
		let mut entries = match fs::read_dir(&dir).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let mut keys = Vec::new();
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let name = entry.file_name();
			let Some(name) = name.to_str() else { continue };
			let Some(id) = name.strip_suffix(".json") else {
				continue;
			};
			if id.starts_with(id_prefix) {
				keys.push(format!("{}:{}", namespace, id));
			}
		}
		Ok(keys)
	}
}
