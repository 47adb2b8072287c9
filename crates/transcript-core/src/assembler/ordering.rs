use crate::types::Batch;

/// Order batches by the timestamp in their file name. Ties keep server order.
pub fn chronological(mut batches: Vec<Batch>) -> Vec<Batch> {
	batches.sort_by_key(Batch::recorded_at);
	batches
}
