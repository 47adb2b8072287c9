use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Per-batch working directory, removed when the guard drops
#[derive(Debug)]
pub struct BatchScratch {
	dir: Option<TempDir>,
}

impl BatchScratch {
	/// Create a fresh directory under `root`, or the system temp dir.
	pub async fn create(root: Option<&Path>) -> io::Result<Self> {
		let root: Option<PathBuf> = root.map(Path::to_path_buf);
		let dir = tokio::task::spawn_blocking(move || {
			let mut builder = tempfile::Builder::new();
			builder.prefix("batch-");
			match root {
				Some(root) => {
					std::fs::create_dir_all(&root)?;
					builder.tempdir_in(root)
				}
				None => builder.tempdir(),
			}
		})
		.await
		.map_err(io::Error::other)??;
		debug!(path = %dir.path().display(), "📁 Scratch directory created");
		Ok(Self { dir: Some(dir) })
	}

	/// Location of the directory while the guard is alive
	pub fn path(&self) -> &Path {
		self.dir.as_ref().map_or_else(|| Path::new(""), TempDir::path)
	}
}

impl Drop for BatchScratch {
	fn drop(&mut self) {
		if let Some(dir) = self.dir.take() {
			let path = dir.path().to_path_buf();
			if let Err(e) = dir.close() {
				warn!(path = %path.display(), error = %e, "⚠️ Failed to remove scratch directory");
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_directory_removed_with_contents() {
		let root = tempfile::tempdir().unwrap();
		let path = {
			let scratch = BatchScratch::create(Some(root.path())).await.unwrap();
			std::fs::write(scratch.path().join("audio.wav"), b"RIFF").unwrap();
			std::fs::write(scratch.path().join("0_audio.json"), b"{}").unwrap();
			scratch.path().to_path_buf()
		};

		assert!(!path.exists());
		assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
	}

	#[tokio::test]
	async fn test_missing_root_is_created() {
		let root = tempfile::tempdir().unwrap();
		let nested = root.path().join("work").join("batches");

		let scratch = BatchScratch::create(Some(&nested)).await.unwrap();
		assert!(scratch.path().starts_with(&nested));
	}
}
