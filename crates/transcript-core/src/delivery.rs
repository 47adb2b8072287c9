use std::fmt::Display;
use std::future::Future;
use tracing::warn;

/// Result of a call whose failure must not fail the job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
	Delivered,
	Dropped(String),
}

impl Delivery {
	#[must_use]
	pub const fn is_delivered(&self) -> bool {
		matches!(self, Self::Delivered)
	}

	/// Await `call`, logging and swallowing its error.
	pub async fn best_effort<E, Fut>(what: &str, call: Fut) -> Self
	where
		E: Display,
		Fut: Future<Output = Result<(), E>>,
	{
		match call.await {
			Ok(()) => Self::Delivered,
			Err(e) => {
				warn!(call = what, error = %e, "⚠️ Best-effort call dropped");
				Self::Dropped(e.to_string())
			}
		}
	}
}
