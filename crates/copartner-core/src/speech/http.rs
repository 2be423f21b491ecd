//! HTTP STT backend: multipart POST of a WAV file to `/v1/audio/transcriptions`
//! (whisper.cpp server, faster-whisper server, llama-server and friends).

use std::path::Path;

use anyhow::Context;

use super::Transcriber;
use crate::config::SttConfig;

pub struct HttpTranscriber {
    url: String,
}

impl HttpTranscriber {
    pub fn new(cfg: &SttConfig) -> Self {
        let url = cfg.url.trim_end_matches('/').to_string();
        log::info!("HttpTranscriber: endpoint {url}");
        Self { url }
    }
}

impl Transcriber for HttpTranscriber {
    fn transcribe(&self, wav_path: &Path) -> anyhow::Result<String> {
        let wav = std::fs::read(wav_path).with_context(|| format!("reading {}", wav_path.display()))?;
        let filename = wav_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav");

        let boundary = boundary();
        let body = multipart_body(&boundary, filename, &wav);

        let resp: serde_json::Value = ureq::post(&format!("{}/v1/audio/transcriptions", self.url))
            .set("Content-Type", &format!("multipart/form-data; boundary={boundary}"))
            .send_bytes(&body)
            .context("transcription request failed")?
            .into_json()
            .context("transcription response was not JSON")?;

        let text = resp["text"].as_str().unwrap_or_default().to_string();
        log::debug!("HttpTranscriber raw text: {text:?}");
        Ok(text)
    }

    fn name(&self) -> &str {
        "HTTP STT"
    }

    fn is_available(&self) -> bool {
        ureq::get(&format!("{}/health", self.url)).call().is_ok()
    }
}

fn boundary() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("----copartner{nanos:016x}")
}

/// ureq 2 has no multipart support, so the single file part is framed by hand.
fn multipart_body(boundary: &str, filename: &str, wav: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(wav.len() + 256);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: audio/wav\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(wav);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multipart_frames_single_file_part() {
        let body = multipart_body("XYZ", "clip.wav", b"RIFF");
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("--XYZ\r\nContent-Disposition: form-data; name=\"file\"; filename=\"clip.wav\"\r\n"));
        assert!(text.contains("Content-Type: audio/wav\r\n\r\nRIFF\r\n"));
        assert!(text.ends_with("--XYZ--\r\n"));
    }

    #[test]
    fn missing_file_is_error() {
        let t = HttpTranscriber::new(&SttConfig::default());
        let err = t.transcribe(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert!(format!("{err:#}").contains("reading"), "{err:#}");
    }
}
