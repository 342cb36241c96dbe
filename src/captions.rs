// src/captions.rs
// SRT caption generation: the narration is chunked into evenly timed
// subtitle blocks spanning the clip duration.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

fn fmt_srt_time(seconds: f64) -> String {
    let mut ms = (seconds * 1000.0).round() as u64;
    let hours = ms / 3_600_000;
    ms -= hours * 3_600_000;
    let minutes = ms / 60_000;
    ms -= minutes * 60_000;
    let secs = ms / 1000;
    ms -= secs * 1000;
    format!("{hours:02}:{minutes:02}:{secs:02},{ms:03}")
}

fn chunk_words(text: &str, target_chunks: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }
    let target_chunks = target_chunks.max(1);
    let chunk_size = words.len().div_ceil(target_chunks).max(3);
    words
        .chunks(chunk_size)
        .map(|chunk| chunk.join(" "))
        .collect()
}

pub fn generate_srt(
    narration_text: &str,
    duration_sec: f64,
    output_path: &Path,
) -> Result<PathBuf> {
    let mut chunks = chunk_words(narration_text, ((duration_sec / 2.0) as usize).max(3));
    if chunks.is_empty() {
        chunks = vec![narration_text.trim().to_string()];
    }
    let step = duration_sec / chunks.len() as f64;

    let mut lines: Vec<String> = Vec::with_capacity(chunks.len() * 4);
    for (idx, chunk) in chunks.iter().enumerate() {
        let start = idx as f64 * step;
        let end = (idx + 1) as f64 * step;
        lines.push((idx + 1).to_string());
        lines.push(format!("{} --> {}", fmt_srt_time(start), fmt_srt_time(end)));
        lines.push(chunk.clone());
        lines.push(String::new());
    }

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating caption dir {}", parent.display()))?;
    }
    std::fs::write(output_path, lines.join("\n"))
        .with_context(|| format!("writing captions to {}", output_path.display()))?;
    Ok(output_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srt_time_formatting() {
        assert_eq!(fmt_srt_time(0.0), "00:00:00,000");
        assert_eq!(fmt_srt_time(61.5), "00:01:01,500");
        assert_eq!(fmt_srt_time(3661.042), "01:01:01,042");
    }

    #[test]
    fn chunks_cover_all_words_in_order() {
        let text = (1..=20).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
        let chunks = chunk_words(&text, 5);
        let rejoined = chunks.join(" ");
        assert_eq!(rejoined, text);
        assert!(chunks.iter().all(|c| c.split_whitespace().count() >= 3));
    }

    #[test]
    fn generated_srt_spans_full_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("captions.srt");
        let text = "one two three four five six seven eight nine ten eleven twelve";
        generate_srt(text, 10.0, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("1\n00:00:00,000 --> "));
        assert!(content.contains("00:00:10,000"));
    }
}
