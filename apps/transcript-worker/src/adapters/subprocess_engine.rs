use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use transcript_core::{EngineError, TranscriptionEngine, TranscriptionOutput};

/// Runs `program [args..] <audio> [<hint>]` and reads the JSON result it drops next to the audio
pub struct SubprocessEngine {
	program: String,
	args: Vec<String>,
	output_prefix: String,
	slots: Arc<Semaphore>,
}

impl SubprocessEngine {
	pub fn new(program: impl Into<String>, args: Vec<String>, output_prefix: impl Into<String>, slots: usize) -> Self {
		Self {
			program: program.into(),
			args,
			output_prefix: output_prefix.into(),
			slots: Arc::new(Semaphore::new(slots.max(1))),
		}
	}

	/// `<dir>/<prefix><stem>.json`, where the stem is the file name up to its first dot
	fn result_path(&self, audio: &Path) -> PathBuf {
		let file_name = audio.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
		let stem = file_name.split('.').next().unwrap_or_default();
		audio.with_file_name(format!("{}{stem}.json", self.output_prefix))
	}
}

#[async_trait::async_trait]
impl TranscriptionEngine for SubprocessEngine {
	async fn transcribe(&self, audio: &Path, diarization_hint: Option<&Path>) -> Result<TranscriptionOutput, EngineError> {
		let _permit = self.slots.acquire().await.map_err(|e| EngineError::Unavailable(e.to_string()))?;

		let mut command = Command::new(&self.program);
		command.args(&self.args).arg(audio);
		if let Some(hint) = diarization_hint {
			command.arg(hint);
		}
		command.stdin(Stdio::null()).kill_on_drop(true);

		debug!(program = %self.program, audio = %audio.display(), with_hint = diarization_hint.is_some(), "🧠 Running transcription engine");
		let output = command.output().await.map_err(EngineError::Spawn)?;

		if !output.status.success() {
			return Err(EngineError::Exit {
				code: output.status.code(),
				stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
			});
		}

		let path = self.result_path(audio);
		let raw = tokio::fs::read(&path).await.map_err(|source| EngineError::MissingOutput { path: path.clone(), source })?;
		if let Err(e) = tokio::fs::remove_file(&path).await {
			warn!(path = %path.display(), error = %e, "⚠️ Failed to remove engine result file");
		}

		let parsed: TranscriptionOutput = serde_json::from_slice(&raw)?;
		debug!(segments = parsed.segments.len(), "📋 Engine output parsed");
		Ok(parsed)
	}
}

/// Run the accelerator check; the worker must not take jobs it cannot transcribe.
pub async fn preflight(command_line: &str) -> Result<(), EngineError> {
	let mut parts = command_line.split_whitespace();
	let Some(program) = parts.next() else {
		return Err(EngineError::Unavailable("empty preflight command".to_string()));
	};

	let output = Command::new(program).args(parts).stdin(Stdio::null()).kill_on_drop(true).output().await.map_err(EngineError::Spawn)?;

	let stdout = String::from_utf8_lossy(&output.stdout);
	if output.status.success() && stdout.trim() == "READY" {
		info!(command = command_line, "✅ Transcription engine ready");
		Ok(())
	} else {
		Err(EngineError::Unavailable(format!(
			"preflight `{command_line}` reported {:?} (stderr: {})",
			stdout.trim(),
			String::from_utf8_lossy(&output.stderr).trim()
		)))
	}
}

#[cfg(all(test, unix))]
mod tests {
	use super::*;

	/// Engine double: a shell script writing `script_body` output to the expected result file
	fn shell_engine(script_body: &str) -> SubprocessEngine {
		let script = format!(r#"out="$(dirname "$1")/0_$(basename "$1" | cut -d. -f1).json"; {script_body}"#);
		SubprocessEngine::new("sh", vec!["-c".to_string(), script, "engine".to_string()], "0_", 1)
	}

	fn audio_in(dir: &Path) -> PathBuf {
		let audio = dir.join("batch_1700.webm");
		std::fs::write(&audio, b"audio").unwrap();
		audio
	}

	#[test]
	fn test_result_path_uses_stem_before_first_dot() {
		let engine = SubprocessEngine::new("whisper", Vec::new(), "0_", 1);
		assert_eq!(engine.result_path(Path::new("/scratch/part_12.final.wav")), PathBuf::from("/scratch/0_part_12.json"));
	}

	#[tokio::test]
	async fn test_reads_and_removes_result_file() {
		let dir = tempfile::tempdir().unwrap();
		let audio = audio_in(dir.path());
		let engine = shell_engine(r#"echo '{"segments":[{"text":"hello","start_time":0.5,"end_time":1.5,"words":[{"word":"hello","start_time":0.5,"end_time":1.5,"speaker":"SPEAKER_00"}]}]}' > "$out""#);

		let output = engine.transcribe(&audio, None).await.unwrap();

		assert_eq!(output.segments.len(), 1);
		assert_eq!(output.segments[0].words[0].speaker.as_deref(), Some("SPEAKER_00"));
		assert!(!dir.path().join("0_batch_1700.json").exists());
	}

	#[tokio::test]
	async fn test_hint_is_passed_after_audio() {
		let dir = tempfile::tempdir().unwrap();
		let audio = audio_in(dir.path());
		let hint = dir.path().join("batch_1700.doa.json");
		std::fs::write(&hint, b"{}").unwrap();
		let engine = shell_engine(r#"echo "[{\"text\":\"$#\",\"start_time\":0,\"end_time\":1}]" > "$out""#);

		let with_hint = engine.transcribe(&audio, Some(&hint)).await.unwrap();
		let without = engine.transcribe(&audio, None).await.unwrap();

		assert_eq!(with_hint.segments[0].text, "2");
		assert_eq!(without.segments[0].text, "1");
	}

	#[tokio::test]
	async fn test_non_zero_exit_carries_stderr() {
		let dir = tempfile::tempdir().unwrap();
		let audio = audio_in(dir.path());
		let engine = shell_engine("echo 'model not found' >&2; exit 3");

		let err = engine.transcribe(&audio, None).await.unwrap_err();

		assert!(matches!(err, EngineError::Exit { code: Some(3), ref stderr } if stderr == "model not found"));
	}

	#[tokio::test]
	async fn test_missing_result_file() {
		let dir = tempfile::tempdir().unwrap();
		let audio = audio_in(dir.path());
		let engine = shell_engine("true");

		let err = engine.transcribe(&audio, None).await.unwrap_err();
		assert!(matches!(err, EngineError::MissingOutput { .. }));
	}

	#[tokio::test]
	async fn test_invalid_result_json() {
		let dir = tempfile::tempdir().unwrap();
		let audio = audio_in(dir.path());
		let engine = shell_engine(r#"echo 'not json' > "$out""#);

		let err = engine.transcribe(&audio, None).await.unwrap_err();
		assert!(matches!(err, EngineError::InvalidOutput(_)));
	}

	#[tokio::test]
	async fn test_spawn_failure() {
		let dir = tempfile::tempdir().unwrap();
		let audio = audio_in(dir.path());
		let engine = SubprocessEngine::new("/definitely/not/an/engine", Vec::new(), "0_", 1);

		let err = engine.transcribe(&audio, None).await.unwrap_err();
		assert!(matches!(err, EngineError::Spawn(_)));
	}

	#[tokio::test]
	async fn test_preflight() {
		assert!(preflight("echo READY").await.is_ok());
		assert!(matches!(preflight("echo NOT_READY").await, Err(EngineError::Unavailable(_))));
		assert!(matches!(preflight("false").await, Err(EngineError::Unavailable(_))));
		assert!(matches!(preflight("   ").await, Err(EngineError::Unavailable(_))));
		assert!(matches!(preflight("/definitely/not/a/check").await, Err(EngineError::Spawn(_))));
	}
}
