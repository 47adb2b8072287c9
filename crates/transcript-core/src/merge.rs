use crate::types::{Segment, Word};

/// A run of consecutive words from one speaker
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerTurn {
	pub speaker: String,
	pub text: String,
	pub start: f64,
	pub end: f64,
	pub words: Vec<Word>,
}

impl SpeakerTurn {
	fn open(word: &Word) -> Self {
		Self {
			speaker: word.speaker.clone(),
			text: word.text.clone(),
			start: word.start,
			end: word.end,
			words: vec![word.clone()],
		}
	}

	fn push(&mut self, word: &Word) {
		self.text.push(' ');
		self.text.push_str(&word.text);
		self.end = self.end.max(word.end);
		self.words.push(word.clone());
	}
}

/// Group words into contiguous speaker turns, in order.
#[must_use]
pub fn speaker_turns(words: &[Word]) -> Vec<SpeakerTurn> {
	let mut turns: Vec<SpeakerTurn> = Vec::new();

	for word in words {
		match turns.last_mut() {
			Some(turn) if turn.speaker == word.speaker => turn.push(word),
			_ => turns.push(SpeakerTurn::open(word)),
		}
	}

	turns
}

/// Split every worded segment into speaker turns; wordless segments are kept as they are.
#[must_use]
pub fn consolidate(segments: Vec<Segment>) -> Vec<Segment> {
	let mut consolidated = Vec::with_capacity(segments.len());

	for segment in segments {
		if segment.words.is_empty() {
			consolidated.push(segment);
			continue;
		}

		for turn in speaker_turns(&segment.words) {
			let batch_start = turn.words.first().map_or(segment.batch_start, |w| w.batch_start);
			let batch_end = turn.words.iter().map(|w| w.batch_end).fold(batch_start, f64::max);

			consolidated.push(Segment {
				text: turn.text,
				start: turn.start,
				end: turn.end,
				words: turn.words,
				speaker: Some(turn.speaker),
				batch_id: segment.batch_id.clone(),
				batch_start,
				batch_end,
				silence: false,
			});
		}
	}

	consolidated
}
