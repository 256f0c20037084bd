use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::app::{Result, TubechanError};

#[async_trait]
pub trait Transcoder {
    /// Re-encode `src` into `dst`. `dst` must not exist yet.
    async fn transcode(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Target audio bitrate in kbit/s, used to name the output.
    fn bitrate_kbps(&self) -> u32;
}

/// Runs `ffmpeg -v panic -i <src> -b:a <kbps>k <dst>`.
pub struct FfmpegTranscoder {
    program: PathBuf,
    bitrate_kbps: u32,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<PathBuf>, bitrate_kbps: u32) -> Self {
        Self {
            program: program.into(),
            bitrate_kbps,
        }
    }

    fn command(&self, src: &Path, dst: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(["-v", "panic", "-i"])
            .arg(src)
            .arg("-b:a")
            .arg(format!("{}k", self.bitrate_kbps))
            .arg(dst)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        command
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, src: &Path, dst: &Path) -> Result<()> {
        let output = self.command(src, dst).output().await.map_err(|e| {
            TubechanError::Transcode(format!("cannot run {}: {}", self.program.display(), e))
        })?;

        if !output.status.success() {
            return Err(TubechanError::Transcode(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(())
    }

    fn bitrate_kbps(&self) -> u32 {
        self.bitrate_kbps
    }
}
