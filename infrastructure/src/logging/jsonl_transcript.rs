//! JSONL transcript renderer
//!
//! Every message seen on the bus is appended to a file as one JSON line with
//! `type`, `timestamp`, `from`, `text` and `meta` fields.

use parlor_application::{Bus, RenderError, Renderer};
use parlor_domain::{Identity, Message};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::warn;

/// Renderer that writes one JSON object per message.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushes after every line and on `Drop`.
pub struct JsonlTranscriptRenderer {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlTranscriptRenderer {
    /// Create the transcript file (and parent directories).
    pub fn new(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let io_error = |source| RenderError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let file = File::create(path).map_err(io_error)?;

        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    /// Get the path to the transcript file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, message: &Message) {
        let Ok(line) = serde_json::to_string(&record(message)) else {
            return;
        };

        let mut writer = self.writer.lock().unwrap_or_else(|p| p.into_inner());
        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            warn!("Could not append to transcript {}: {}", self.path.display(), e);
        }
    }
}

/// JSON record for one message
pub fn record(message: &Message) -> serde_json::Value {
    serde_json::json!({
        "type": message.kind().as_str(),
        "timestamp": message.at().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "from": message.speaker_name(),
        "from_id": message.speaker_id(),
        "text": message.text(),
        "meta": message.meta(),
    })
}

impl Renderer for JsonlTranscriptRenderer {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    fn attach(self: Arc<Self>, bus: &Bus) -> JoinHandle<()> {
        let mut subscription = bus.subscribe();
        tokio::spawn(async move {
            while let Some(message) = subscription.recv().await {
                self.write(&message);
            }
        })
    }

    fn finalize(&self, _identities: &[Identity]) -> Result<(), RenderError> {
        let mut writer = self.writer.lock().unwrap_or_else(|p| p.into_inner());
        writer.flush().map_err(|source| RenderError::Io {
            path: self.path.display().to_string(),
            source,
        })
    }
}

impl Drop for JsonlTranscriptRenderer {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_domain::PersonaProfile;

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_writes_every_message_until_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("run.jsonl");
        let renderer = Arc::new(JsonlTranscriptRenderer::new(&path).unwrap());

        let bus = Bus::new();
        let task = Arc::clone(&renderer).attach(&bus);

        let mira = Arc::new(PersonaProfile::new("mira", "Mira"));
        bus.broadcast(Message::system("Participants: Mira (1 in total)").with_meta("topic", "Tides"))
            .unwrap();
        bus.broadcast(Message::utterance(mira, "Storm's coming.")).unwrap();
        bus.close();
        task.await.unwrap();
        renderer.finalize(&[]).unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);

        assert_eq!(lines[0]["type"], "system");
        assert!(lines[0]["from"].is_null());
        assert_eq!(lines[0]["meta"]["topic"], "Tides");

        assert_eq!(lines[1]["type"], "utterance");
        assert_eq!(lines[1]["from"], "Mira");
        assert_eq!(lines[1]["from_id"], "mira");
        assert_eq!(lines[1]["text"], "Storm's coming.");
        assert!(lines[1]["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_invalid_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();

        let result = JsonlTranscriptRenderer::new(blocker.join("run.jsonl"));
        assert!(matches!(result, Err(RenderError::Io { .. })));
    }
}
