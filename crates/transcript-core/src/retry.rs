use std::future::Future;
use tracing::warn;

/// Raised once every attempt of a retried operation has failed
#[derive(Debug, thiserror::Error)]
#[error("{label} failed after {attempts} attempts: {source}")]
pub struct RetryError<E>
where
	E: std::error::Error + 'static,
{
	pub label: String,
	pub attempts: u32,
	#[source]
	pub source: E,
}

impl<E> RetryError<E>
where
	E: std::error::Error + 'static,
{
	pub fn into_inner(self) -> E {
		self.source
	}
}

/// Run `operation`, retrying it up to `max_extra_attempts` more times on failure.
///
/// Meant for the few flaky external stages (instance metadata, insight analysis);
/// queue, store and engine calls are never wrapped.
///
/// # Errors
/// Returns the last underlying error, tagged with the total number of attempts made.
pub async fn retry<T, E, F, Fut>(label: &str, max_extra_attempts: u32, mut operation: F) -> Result<T, RetryError<E>>
where
	E: std::error::Error + 'static,
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
{
	let mut attempts = 0u32;
	loop {
		attempts += 1;
		match operation().await {
			Ok(value) => return Ok(value),
			Err(e) if attempts <= max_extra_attempts => {
				warn!(operation = label, attempt = attempts, error = %e, "🔁 Retrying...");
			}
			Err(e) => {
				return Err(RetryError {
					label: label.to_string(),
					attempts,
					source: e,
				})
			}
		}
	}
}
