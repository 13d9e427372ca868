use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use image::RgbaImage;
use tokio::process::Command;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayInfo {
    pub logical_width: u32,
    pub logical_height: u32,
    pub scale_factor: f64,
}

impl DisplayInfo {
    /// Scale factor with nonsense values (zero, negative, NaN) treated as 1.
    pub fn effective_scale(&self) -> f64 {
        if self.scale_factor.is_finite() && self.scale_factor > 0.0 {
            self.scale_factor
        } else {
            1.0
        }
    }

    pub fn physical_size(&self) -> (u32, u32) {
        let scale = self.effective_scale();
        (
            (f64::from(self.logical_width) * scale).round() as u32,
            (f64::from(self.logical_height) * scale).round() as u32,
        )
    }
}

/// Access to the primary display's geometry and pixels.
#[async_trait]
pub trait DisplaySource: Send + Sync {
    async fn primary_display(&self) -> Result<DisplayInfo>;

    /// Snapshot of the primary display requested at `width` x `height`
    /// device pixels. The returned buffer may differ from the request;
    /// callers must use its real dimensions.
    async fn acquire(&self, width: u32, height: u32) -> Result<RgbaImage>;
}

/// A fixed frame, for headless runs and tests.
#[derive(Clone)]
pub struct StaticDisplay {
    info: DisplayInfo,
    frame: RgbaImage,
}

impl StaticDisplay {
    pub fn new(info: DisplayInfo, frame: RgbaImage) -> Self {
        Self { info, frame }
    }
}

#[async_trait]
impl DisplaySource for StaticDisplay {
    async fn primary_display(&self) -> Result<DisplayInfo> {
        Ok(self.info)
    }

    async fn acquire(&self, _width: u32, _height: u32) -> Result<RgbaImage> {
        Ok(self.frame.clone())
    }
}

/// Grabs the main screen with the macOS `screencapture` tool. The tool always
/// writes the native (physical) resolution, so the requested size is only a
/// hint.
#[derive(Debug, Clone)]
pub struct ScreencaptureDisplay {
    info: DisplayInfo,
}

impl ScreencaptureDisplay {
    pub fn new(info: DisplayInfo) -> Self {
        Self { info }
    }
}

#[async_trait]
impl DisplaySource for ScreencaptureDisplay {
    async fn primary_display(&self) -> Result<DisplayInfo> {
        Ok(self.info)
    }

    async fn acquire(&self, _width: u32, _height: u32) -> Result<RgbaImage> {
        if !cfg!(target_os = "macos") {
            bail!("screencapture is only available on macOS");
        }

        let out_path = std::env::temp_dir().join(format!("luka-capture-{}.png", Uuid::new_v4()));
        let status = Command::new("screencapture")
            .arg("-x")
            .arg("-m")
            .arg("-t")
            .arg("png")
            .arg(&out_path)
            .status()
            .await
            .context("failed to spawn screencapture")?;

        if !status.success() {
            bail!("screencapture exited with {status}");
        }

        let path_for_decode = out_path.clone();
        let decoded = tokio::task::spawn_blocking(move || image::open(&path_for_decode))
            .await
            .context("capture decode worker join failed")?;

        if let Err(err) = tokio::fs::remove_file(&out_path).await {
            log::warn!("Failed to remove capture file {}: {err}", out_path.display());
        }

        let frame = decoded
            .with_context(|| format!("failed to decode capture {}", out_path.display()))?;
        Ok(frame.to_rgba8())
    }
}
