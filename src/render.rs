// src/render.rs
// ffmpeg slideshow render: each image becomes a zoompan segment, segments
// are concatenated, captions are burned in, audio is loudness-normalized.
// ffmpeg/ffprobe are external tools invoked by path; a failed subtitle
// render is retried once without subtitles before giving up.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::settings::StyleConfig;

pub trait Renderer: Send + Sync {
    fn probe_audio_duration(&self, audio: &Path) -> Result<f64>;
    fn render(
        &self,
        images: &[PathBuf],
        audio: &Path,
        duration_sec: f64,
        srt: Option<&Path>,
        output: &Path,
    ) -> Result<()>;
}

pub struct FfmpegRenderer {
    style: StyleConfig,
    ffmpeg_bin: String,
    ffprobe_bin: String,
}

impl FfmpegRenderer {
    pub fn new(style: StyleConfig, ffmpeg_bin: String, ffprobe_bin: String) -> Self {
        Self {
            style,
            ffmpeg_bin,
            ffprobe_bin,
        }
    }

    fn run_ffmpeg(
        &self,
        images: &[PathBuf],
        audio: &Path,
        duration_sec: f64,
        srt: Option<&Path>,
        output: &Path,
    ) -> Result<()> {
        let segment_sec = duration_sec / images.len() as f64;
        let (filter_complex, mapped_stream) =
            build_filter_complex(images.len(), segment_sec, srt, &self.style);

        let segment_arg = format!("{segment_sec:.3}");
        let mut cmd = Command::new(&self.ffmpeg_bin);
        cmd.arg("-y");
        for image in images {
            cmd.args(["-loop", "1", "-t", segment_arg.as_str()])
                .arg("-i")
                .arg(image);
        }
        cmd.arg("-i").arg(audio);
        cmd.args(["-filter_complex", filter_complex.as_str()])
            .args(["-map", format!("[{mapped_stream}]").as_str()])
            .args(["-map", format!("{}:a", images.len()).as_str()])
            .args(["-t", format!("{duration_sec:.3}").as_str()])
            .args(["-r", self.style.fps.to_string().as_str()])
            .args(["-c:v", "libx264"])
            .args(["-pix_fmt", "yuv420p"])
            .args(["-b:v", self.style.bitrate.as_str()])
            .args(["-c:a", "aac"])
            .args(["-b:a", "128k"])
            .args(["-af", "loudnorm=I=-16:TP=-1.5:LRA=11"])
            .args(["-movflags", "+faststart"])
            .arg("-shortest")
            .arg(output);

        tracing::debug!(command = ?cmd, "invoking ffmpeg");
        let result = cmd.output().context("spawning ffmpeg")?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            bail!("ffmpeg render failed: {}", tail(&stderr, 2000));
        }
        Ok(())
    }
}

impl Renderer for FfmpegRenderer {
    fn probe_audio_duration(&self, audio: &Path) -> Result<f64> {
        let result = Command::new(&self.ffprobe_bin)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(audio)
            .output()
            .context("spawning ffprobe")?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            bail!("ffprobe failed: {}", tail(&stderr, 500));
        }
        let stdout = String::from_utf8_lossy(&result.stdout);
        let duration: f64 = stdout
            .trim()
            .parse()
            .with_context(|| format!("parsing ffprobe duration from {stdout:?}"))?;
        Ok(duration.max(0.1))
    }

    fn render(
        &self,
        images: &[PathBuf],
        audio: &Path,
        duration_sec: f64,
        srt: Option<&Path>,
        output: &Path,
    ) -> Result<()> {
        if images.is_empty() {
            bail!("at least one image is required for rendering");
        }
        match self.run_ffmpeg(images, audio, duration_sec, srt, output) {
            Ok(()) => Ok(()),
            Err(err) if srt.is_some() => {
                tracing::warn!(error = %err, "render with subtitles failed, retrying without");
                self.run_ffmpeg(images, audio, duration_sec, None, output)
            }
            Err(err) => Err(err),
        }
    }
}

/// The subtitles filter parser expects forward slashes and escaped colons.
fn escape_subtitles_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

fn build_filter_complex(
    image_count: usize,
    segment_sec: f64,
    srt: Option<&Path>,
    style: &StyleConfig,
) -> (String, String) {
    let fps = style.fps;
    let frames_per_segment = ((segment_sec * fps as f64).ceil() as u64).max(1);
    let mut parts: Vec<String> = Vec::with_capacity(image_count + 2);
    for idx in 0..image_count {
        parts.push(format!(
            "[{idx}:v]scale=1080:1920:force_original_aspect_ratio=increase,\
             crop=1080:1920,\
             zoompan=z='min(zoom+0.0008,1.15)':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d={frames_per_segment}:s=1080x1920:fps={fps},\
             trim=duration={segment_sec:.3},setpts=PTS-STARTPTS,format=yuv420p[v{idx}]"
        ));
    }
    let concat_inputs: String = (0..image_count).map(|i| format!("[v{i}]")).collect();
    parts.push(format!(
        "{concat_inputs}concat=n={image_count}:v=1:a=0[vcat]"
    ));
    let mut last_stream = "vcat".to_string();

    if let Some(srt_path) = srt {
        let escaped = escape_subtitles_path(srt_path);
        parts.push(format!(
            "[{last_stream}]subtitles='{escaped}':force_style='Fontsize={},MarginV={}'[vout]",
            style.caption_font_size, style.caption_margin_v
        ));
        last_stream = "vout".to_string();
    }
    (parts.join(";"), last_stream)
}

fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    text.chars().skip(count - max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_graph_concats_all_segments() {
        let style = StyleConfig::default();
        let (graph, stream) = build_filter_complex(3, 4.0, None, &style);
        assert!(graph.contains("concat=n=3:v=1:a=0[vcat]"));
        assert!(graph.contains("[0:v]"));
        assert!(graph.contains("[2:v]"));
        assert_eq!(stream, "vcat");
    }

    #[test]
    fn subtitles_stage_appended_when_srt_present() {
        let style = StyleConfig::default();
        let srt = PathBuf::from("/tmp/c:aptions.srt");
        let (graph, stream) = build_filter_complex(1, 4.0, Some(&srt), &style);
        assert_eq!(stream, "vout");
        assert!(graph.contains("subtitles='/tmp/c\\:aptions.srt'"));
        assert!(graph.contains(&format!("Fontsize={}", style.caption_font_size)));
    }
}
