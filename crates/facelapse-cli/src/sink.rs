//! ffmpeg-backed video sink: raw RGB frames piped to an encoder child process.

use anyhow::{Context, Result};
use facelapse_core::pipeline::{BoxError, VideoSink};
use image::RgbImage;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

/// Arguments for an ffmpeg process encoding raw rgb24 frames from stdin
/// into an H.264 video at the given path.
fn encoder_args(output: &Path, resolution: (u32, u32), fps: u32) -> Vec<String> {
    let mut args: Vec<String> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-y",
        "-f",
        "rawvideo",
        "-pixel_format",
        "rgb24",
    ]
    .map(String::from)
    .to_vec();
    args.push("-video_size".into());
    args.push(format!("{}x{}", resolution.0, resolution.1));
    args.push("-framerate".into());
    args.push(fps.to_string());
    args.extend(["-i", "-", "-c:v", "libx264", "-pix_fmt", "yuv420p"].map(String::from));
    args.push(output.to_string_lossy().into_owned());
    args
}

/// Video sink writing through an ffmpeg child process.
///
/// Frames are streamed to ffmpeg's stdin in append order; `finalize` closes
/// the pipe and waits for the encoder to flush the container.
pub struct FfmpegSink {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    output: PathBuf,
    resolution: (u32, u32),
}

impl FfmpegSink {
    /// Spawn the encoder. Fails fast when ffmpeg is not on PATH.
    pub fn spawn(output: &Path, resolution: (u32, u32), fps: u32) -> Result<Self> {
        let mut child = Command::new("ffmpeg")
            .args(encoder_args(output, resolution, fps))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("failed to start ffmpeg; is it installed and on PATH?")?;
        let stdin = child.stdin.take().context("failed to open ffmpeg stdin")?;

        tracing::info!(
            output = %output.display(),
            width = resolution.0,
            height = resolution.1,
            fps,
            "ffmpeg encoder started"
        );

        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            output: output.to_path_buf(),
            resolution,
        })
    }

    /// Kill the encoder and remove the partial output file.
    ///
    /// Called on fatal pipeline failure so no half-written video is left
    /// looking complete.
    pub fn discard(mut self) {
        self.stdin.take();
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if self.output.exists() {
            if let Err(err) = std::fs::remove_file(&self.output) {
                tracing::warn!(
                    error = %err,
                    path = %self.output.display(),
                    "failed to remove partial output"
                );
            } else {
                tracing::info!(path = %self.output.display(), "partial output removed");
            }
        }
    }
}

impl VideoSink for FfmpegSink {
    fn append_frame(&mut self, image: &RgbImage) -> Result<(), BoxError> {
        if image.dimensions() != self.resolution {
            return Err(format!(
                "frame resolution {:?} does not match sink resolution {:?}",
                image.dimensions(),
                self.resolution
            )
            .into());
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err("video sink already finalized".into());
        };
        stdin.write_all(image.as_raw())?;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), BoxError> {
        // Closing stdin signals end of stream; ffmpeg flushes and exits.
        self.stdin.take();
        let Some(child) = self.child.take() else {
            return Err("video sink already finalized".into());
        };
        let done = child.wait_with_output()?;
        if !done.status.success() {
            let stderr = String::from_utf8_lossy(&done.stderr);
            return Err(format!("ffmpeg exited with {}: {}", done.status, stderr.trim()).into());
        }
        tracing::info!(path = %self.output.display(), "video finalized");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoder_args_encode_geometry_and_rate() {
        let args = encoder_args(Path::new("out/timelapse.mp4"), (1280, 720), 15);
        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo"));
        assert!(joined.contains("-pixel_format rgb24"));
        assert!(joined.contains("-video_size 1280x720"));
        assert!(joined.contains("-framerate 15"));
        assert!(joined.contains("-i -"));
        assert_eq!(args.last().unwrap(), "out/timelapse.mp4");
    }
}
