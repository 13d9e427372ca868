use std::{io::Cursor, sync::Arc, time::Instant};

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{
    imageops::{self, FilterType},
    DynamicImage, ImageFormat, RgbaImage,
};

use super::display::DisplaySource;
use super::region::{CaptureRegion, ClampedRect};
use crate::utils::elapsed_ms;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

pub const PNG_MIME: &str = "image/png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    FullScreen,
    BlurredRegion,
}

/// One encoded snapshot. Produced per call and not retained anywhere.
#[derive(Debug, Clone)]
pub struct CaptureResult {
    pub kind: CaptureKind,
    pub width: u32,
    pub height: u32,
    /// Where the crop came from in the physical snapshot; `None` for full
    /// screen captures.
    pub source_rect: Option<ClampedRect>,
    pub png: Vec<u8>,
}

impl CaptureResult {
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.png)
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{PNG_MIME};base64,{}", self.to_base64())
    }
}

#[derive(Clone)]
pub struct ScreenCapturePipeline {
    display: Arc<dyn DisplaySource>,
}

impl ScreenCapturePipeline {
    pub fn new(display: Arc<dyn DisplaySource>) -> Self {
        Self { display }
    }

    /// The primary display at its logical resolution, PNG encoded.
    pub async fn capture_full(&self) -> Result<CaptureResult> {
        let started = Instant::now();
        let info = self
            .display
            .primary_display()
            .await
            .context("primary display unavailable")?;
        let (physical_w, physical_h) = info.physical_size();

        let frame = self
            .display
            .acquire(physical_w, physical_h)
            .await
            .context("full screen acquisition failed")?;

        let (logical_w, logical_h) = (info.logical_width.max(1), info.logical_height.max(1));
        let png = tokio::task::spawn_blocking(move || {
            let frame = if frame.dimensions() == (logical_w, logical_h) {
                frame
            } else {
                imageops::resize(&frame, logical_w, logical_h, FilterType::Triangle)
            };
            encode_png(frame)
        })
        .await
        .context("full capture encode worker join failed")??;

        log_info!(
            "Full capture {}x{} encoded ({} bytes) in {}ms",
            logical_w,
            logical_h,
            png.len(),
            elapsed_ms(started)
        );

        Ok(CaptureResult {
            kind: CaptureKind::FullScreen,
            width: logical_w,
            height: logical_h,
            source_rect: None,
            png,
        })
    }

    /// A blurred crop of `region`, or `None` when nothing usable could be
    /// captured. Callers fall back to a flat background on `None`.
    pub async fn capture_region(
        &self,
        region: CaptureRegion,
        blur_radius: f32,
    ) -> Option<CaptureResult> {
        match self.try_capture_region(region, blur_radius).await {
            Ok(result) => Some(result),
            Err(err) => {
                log::warn!("Region capture failed for {region:?}: {err:#}");
                None
            }
        }
    }

    async fn try_capture_region(
        &self,
        region: CaptureRegion,
        blur_radius: f32,
    ) -> Result<CaptureResult> {
        let started = Instant::now();
        let info = self
            .display
            .primary_display()
            .await
            .context("primary display unavailable")?;
        let scale = info.effective_scale();
        let requested = region.to_physical(scale);

        let (physical_w, physical_h) = info.physical_size();
        let frame = self
            .display
            .acquire(physical_w, physical_h)
            .await
            .context("region acquisition failed")?;

        let (real_w, real_h) = frame.dimensions();
        let rect = requested
            .clamp_to(real_w, real_h)
            .context("display returned an empty snapshot")?;

        log_debug!(
            "Region {:?} at scale {} -> {:?}, clamped to {:?} in {}x{}",
            region,
            scale,
            requested,
            rect,
            real_w,
            real_h
        );

        let png = tokio::task::spawn_blocking(move || crop_blur_encode(&frame, rect, blur_radius))
            .await
            .context("region encode worker join failed")??;

        log_info!(
            "Region capture {}x{} (blur {}) encoded ({} bytes) in {}ms",
            rect.width,
            rect.height,
            blur_radius,
            png.len(),
            elapsed_ms(started)
        );

        Ok(CaptureResult {
            kind: CaptureKind::BlurredRegion,
            width: rect.width,
            height: rect.height,
            source_rect: Some(rect),
            png,
        })
    }
}

fn crop_blur_encode(frame: &RgbaImage, rect: ClampedRect, blur_radius: f32) -> Result<Vec<u8>> {
    let cropped = imageops::crop_imm(frame, rect.left, rect.top, rect.width, rect.height).to_image();
    let output = if blur_radius.is_finite() && blur_radius > 0.0 {
        imageops::blur(&cropped, blur_radius)
    } else {
        cropped
    };
    encode_png(output)
}

fn encode_png(image: RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("PNG encoding failed")?;
    Ok(bytes)
}
