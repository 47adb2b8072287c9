use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use transcript_core::{local_file_name, ObjectStore, StoreError};

/// Object store rooted at a local directory; keys are relative paths below the root
pub struct LocalObjectStore {
	root: PathBuf,
}

impl LocalObjectStore {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	/// Resolve `key` below the root, refusing keys that would escape it
	fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
		let relative = Path::new(key.trim_start_matches('/'));
		let escapes = relative.components().any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
		if escapes || relative.as_os_str().is_empty() {
			return Err(StoreError::NotFound(key.to_string()));
		}
		Ok(self.root.join(relative))
	}
}

#[async_trait::async_trait]
impl ObjectStore for LocalObjectStore {
	async fn download(&self, key: &str, dir: &Path) -> Result<PathBuf, StoreError> {
		let source = self.resolve(key)?;
		let target = dir.join(local_file_name(key));

		match tokio::fs::copy(&source, &target).await {
			Ok(bytes) => {
				debug!(key, bytes, target = %target.display(), "📥 Object downloaded");
				Ok(target)
			}
			Err(e) if e.kind() == ErrorKind::NotFound && !source.exists() => Err(StoreError::NotFound(key.to_string())),
			Err(e) => Err(StoreError::Download {
				key: key.to_string(),
				message: e.to_string(),
			}),
		}
	}

	async fn upload(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
		let target = self.resolve(key)?;
		let upload_error = |e: std::io::Error| StoreError::Upload {
			key: key.to_string(),
			message: e.to_string(),
		};

		if let Some(parent) = target.parent() {
			tokio::fs::create_dir_all(parent).await.map_err(upload_error)?;
		}
		// Write beside the target and rename so readers never see a partial object
		let staging = target.with_extension("part");
		tokio::fs::write(&staging, &body).await.map_err(upload_error)?;
		tokio::fs::rename(&staging, &target).await.map_err(upload_error)?;

		debug!(key, bytes = body.len(), "📤 Object uploaded");
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StoreError> {
		let path = self.resolve(key)?;
		Ok(tokio::fs::try_exists(&path).await?)
	}
}
