use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError, Script};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use transcript_core::{JobQueue, QueueError, QueueMessage};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Attributes {
	#[serde(rename = "processingType", default, skip_serializing_if = "Option::is_none")]
	processing_type: Option<String>,
}

/// What producers push onto the pending list
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
	id: String,
	#[serde(default)]
	body: Option<String>,
	#[serde(default)]
	attributes: Attributes,
}

/// Decode a raw list entry. Anything that is not an envelope is taken as a bare job id.
/// The raw entry doubles as the receipt handle.
fn parse_payload(raw: &str) -> QueueMessage {
	match serde_json::from_str::<Envelope>(raw) {
		Ok(envelope) => QueueMessage {
			id: envelope.id,
			body: envelope.body,
			receipt_handle: Some(raw.to_string()),
			processing_type: envelope.attributes.processing_type,
		},
		Err(_) => QueueMessage {
			id: raw.trim().to_string(),
			body: Some(raw.to_string()),
			receipt_handle: Some(raw.to_string()),
			processing_type: None,
		},
	}
}

/// Move one pending entry to inflight and lease it in a single step
const CLAIM_NEXT: &str = r"
local payload = redis.call('LMOVE', KEYS[1], KEYS[2], 'LEFT', 'RIGHT')
if payload then
	redis.call('ZADD', KEYS[3], ARGV[1], payload)
end
return payload
";

fn now_millis() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

fn lease_deadline(visibility: Duration) -> u64 {
	now_millis().saturating_add(u64::try_from(visibility.as_millis()).unwrap_or(u64::MAX))
}

/// Redis list queue with visibility leases.
///
/// Received entries move from `<name>:pending` to `<name>:inflight` and get a lease
/// deadline in the `<name>:leases` sorted set. Expired leases go back to pending on the
/// next receive; deleting removes the entry from both.
pub struct RedisJobQueue {
	/// Dedicated to the blocking move so it never stalls other commands
	blocking: MultiplexedConnection,
	commands: MultiplexedConnection,
	pending_key: String,
	inflight_key: String,
	leases_key: String,
}

impl RedisJobQueue {
	pub async fn connect(redis_url: &str, queue_name: &str) -> Result<Self, RedisError> {
		let client = Client::open(redis_url)?;
		let blocking = client.get_multiplexed_async_connection().await?;
		let commands = client.get_multiplexed_async_connection().await?;
		info!(queue = queue_name, "✅ Connected to Redis queue");

		Ok(Self {
			blocking,
			commands,
			pending_key: format!("{queue_name}:pending"),
			inflight_key: format!("{queue_name}:inflight"),
			leases_key: format!("{queue_name}:leases"),
		})
	}

	/// Append a job to the pending list
	pub async fn push(&self, recording_id: &str, processing_type: Option<&str>) -> Result<(), RedisError> {
		let envelope = Envelope {
			id: format!("{recording_id}-{}", now_millis()),
			body: Some(recording_id.to_string()),
			attributes: Attributes {
				processing_type: processing_type.map(str::to_string),
			},
		};
		let payload = serde_json::to_string(&envelope).map_err(|e| RedisError::from((redis::ErrorKind::TypeError, "envelope", e.to_string())))?;

		let mut conn = self.commands.clone();
		redis::cmd("RPUSH").arg(&self.pending_key).arg(payload).query_async::<()>(&mut conn).await
	}

	/// Give a lease to inflight entries that never got one, e.g. after a crash between
	/// the blocking move and its lease. `NX` keeps any lease a live receiver already set.
	async fn adopt_orphans(&self, visibility: Duration) -> Result<(), RedisError> {
		let mut conn = self.commands.clone();
		let inflight: Vec<String> = redis::cmd("LRANGE").arg(&self.inflight_key).arg(0).arg(-1).query_async(&mut conn).await?;
		if inflight.is_empty() {
			return Ok(());
		}

		let deadline = lease_deadline(visibility);
		let mut adopted = 0usize;
		for payload in inflight {
			let added: i64 = redis::cmd("ZADD").arg(&self.leases_key).arg("NX").arg(deadline).arg(&payload).query_async(&mut conn).await?;
			adopted += usize::try_from(added).unwrap_or(0);
		}
		if adopted > 0 {
			warn!(adopted, "⚠️ Leased orphaned inflight messages");
		}
		Ok(())
	}

	/// Put entries whose lease ran out back on the pending list
	async fn requeue_expired(&self) -> Result<usize, RedisError> {
		let mut conn = self.commands.clone();
		let expired: Vec<String> = redis::cmd("ZRANGEBYSCORE")
			.arg(&self.leases_key)
			.arg("-inf")
			.arg(now_millis())
			.query_async(&mut conn)
			.await?;

		let mut requeued = 0;
		for payload in expired {
			let removed: i64 = redis::cmd("LREM").arg(&self.inflight_key).arg(1).arg(&payload).query_async(&mut conn).await?;
			// Another worker may have requeued or deleted it already
			if removed > 0 {
				redis::cmd("RPUSH").arg(&self.pending_key).arg(&payload).query_async::<()>(&mut conn).await?;
				requeued += 1;
			}
			redis::cmd("ZREM").arg(&self.leases_key).arg(&payload).query_async::<()>(&mut conn).await?;
		}
		Ok(requeued)
	}

	/// Lease an entry the blocking move just claimed. On failure the entry goes back to the
	/// front of pending so it is not stranded in inflight.
	async fn lease_claimed(&self, payload: &str, visibility: Duration) -> Result<(), RedisError> {
		let mut conn = self.commands.clone();
		let leased = redis::cmd("ZADD")
			.arg(&self.leases_key)
			.arg(lease_deadline(visibility))
			.arg(payload)
			.query_async::<()>(&mut conn)
			.await;

		if let Err(e) = leased {
			let released: Result<(), RedisError> = redis::pipe()
				.atomic()
				.cmd("LREM")
				.arg(&self.inflight_key)
				.arg(1)
				.arg(payload)
				.ignore()
				.cmd("LPUSH")
				.arg(&self.pending_key)
				.arg(payload)
				.ignore()
				.query_async(&mut conn)
				.await;
			if let Err(release_error) = released {
				warn!(error = %release_error, "⚠️ Could not return unleased message to pending, it will be adopted on a later receive");
			}
			return Err(e);
		}
		Ok(())
	}

	async fn claim_next(&self, visibility: Duration) -> Result<Option<String>, RedisError> {
		let mut conn = self.commands.clone();
		Script::new(CLAIM_NEXT)
			.key(&self.pending_key)
			.key(&self.inflight_key)
			.key(&self.leases_key)
			.arg(lease_deadline(visibility))
			.invoke_async(&mut conn)
			.await
	}

	async fn receive_raw(&self, max_messages: usize, wait: Duration, visibility: Duration) -> Result<Vec<String>, RedisError> {
		self.adopt_orphans(visibility).await?;
		let requeued = self.requeue_expired().await?;
		if requeued > 0 {
			info!(requeued, "↩️ Requeued messages with expired leases");
		}

		let mut blocking = self.blocking.clone();
		let first: Option<String> = redis::cmd("BLMOVE")
			.arg(&self.pending_key)
			.arg(&self.inflight_key)
			.arg("LEFT")
			.arg("RIGHT")
			.arg(wait.as_secs_f64())
			.query_async(&mut blocking)
			.await?;

		let Some(first) = first else {
			return Ok(Vec::new());
		};
		self.lease_claimed(&first, visibility).await?;

		let mut received = vec![first];
		while received.len() < max_messages {
			match self.claim_next(visibility).await {
				Ok(Some(next)) => received.push(next),
				Ok(None) => break,
				// Already leased entries are returned; the failed claim changed nothing
				Err(e) => {
					warn!(error = %e, received = received.len(), "⚠️ Failed to claim further messages");
					break;
				}
			}
		}

		Ok(received)
	}
}

#[async_trait::async_trait]
impl JobQueue for RedisJobQueue {
	async fn receive(&self, max_messages: usize, wait: Duration, visibility: Duration) -> Result<Vec<QueueMessage>, QueueError> {
		let raw = self.receive_raw(max_messages.max(1), wait, visibility).await.map_err(|e| QueueError::Poll(e.to_string()))?;
		debug!(count = raw.len(), queue = %self.pending_key, "📬 Leased messages");
		Ok(raw.iter().map(|payload| parse_payload(payload)).collect())
	}

	async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
		let mut conn = self.commands.clone();
		redis::cmd("LREM")
			.arg(&self.inflight_key)
			.arg(1)
			.arg(receipt_handle)
			.query_async::<()>(&mut conn)
			.await
			.map_err(|e| QueueError::Delete(e.to_string()))?;
		redis::cmd("ZREM")
			.arg(&self.leases_key)
			.arg(receipt_handle)
			.query_async::<()>(&mut conn)
			.await
			.map_err(|e| QueueError::Delete(e.to_string()))
	}
}
