//! # 缩放模块
//!
//! ## 设计思路
//!
//! 纯性能优化：把内容图的长边限制在 `max_dimension` 以内，控制推理耗时。
//! 已经足够小的图直接原样返回（同一个资源，不做拷贝）。
//!
//! ## 实现思路
//!
//! 1. 等待位图离开 `Pending`
//! 2. `scale = min(1, max_dimension / max(w, h))`，目标尺寸四舍五入
//! 3. 在 blocking 线程池中用 `fast_image_resize` 重采样，失败回退 `image::resize_exact`
//! 4. 生成新的 `Scaled` 位图，等待就绪后返回

use std::sync::Arc;

use fast_image_resize as fr;
use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, Rgba};

use super::bitmap::{BitmapResource, ResourceRegistry};
use super::source::ResourceRole;
use super::StylizeError;

/// 计算缩放后的尺寸；不需要缩放时返回 `None`。
pub fn scaled_dimensions(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
    let longest = width.max(height);
    if longest == 0 {
        return None;
    }

    let scale = (max_dimension as f64 / longest as f64).min(1.0);
    if scale >= 1.0 {
        return None;
    }

    let target_width = ((width as f64 * scale).round() as u32).max(1);
    let target_height = ((height as f64 * scale).round() as u32).max(1);
    Some((target_width, target_height))
}

/// 按长边上限缩放位图。
pub async fn resize(
    registry: &Arc<ResourceRegistry>,
    bitmap: &BitmapResource,
    max_dimension: u32,
    filter: FilterType,
) -> Result<BitmapResource, StylizeError> {
    bitmap.wait_ready().await;

    let (width, height) = bitmap.dimensions();
    let Some((target_width, target_height)) = scaled_dimensions(width, height, max_dimension) else {
        return Ok(bitmap.clone());
    };

    let Some(source) = bitmap.image() else {
        return Ok(bitmap.clone());
    };

    log::info!(
        "🧩 缩放内容图：{}x{} -> {}x{}（filter={:?}）",
        width,
        height,
        target_width,
        target_height,
        filter
    );

    let resized = tokio::task::spawn_blocking(move || {
        match resize_with_fast_image_resize(&source, target_width, target_height, filter) {
            Ok(resized) => resized,
            Err(err) => {
                log::warn!("⚠️ fast_image_resize 缩放失败，回退 image::resize_exact：{}", err);
                source.resize_exact(target_width, target_height, filter)
            }
        }
    })
    .await
    .map_err(|e| StylizeError::Internal(format!("缩放任务异常退出：{}", e)))?;

    let scaled = BitmapResource::ready(registry.create(ResourceRole::Scaled), resized);
    scaled.wait_ready().await;
    Ok(scaled)
}

fn resize_with_fast_image_resize(
    image: &DynamicImage,
    target_width: u32,
    target_height: u32,
    filter: FilterType,
) -> Result<DynamicImage, StylizeError> {
    let src = image.to_rgba8();
    let (src_width, src_height) = src.dimensions();

    let src_image =
        fr::images::Image::from_vec_u8(src_width, src_height, src.into_raw(), fr::PixelType::U8x4)
            .map_err(|e| StylizeError::Decode(format!("构建源图像缓冲失败：{}", e)))?;

    let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    let options =
        fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(to_fast_filter(filter)));

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| StylizeError::Decode(format!("fast_image_resize 执行失败：{}", e)))?;

    let rgba =
        ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(target_width, target_height, dst_image.into_vec())
            .ok_or_else(|| StylizeError::Decode("fast_image_resize 输出缓冲长度异常".to_string()))?;

    Ok(DynamicImage::ImageRgba8(rgba))
}

fn to_fast_filter(filter: FilterType) -> fr::FilterType {
    match filter {
        FilterType::Nearest => fr::FilterType::Box,
        FilterType::Triangle => fr::FilterType::Bilinear,
        FilterType::CatmullRom => fr::FilterType::CatmullRom,
        FilterType::Gaussian => fr::FilterType::Mitchell,
        FilterType::Lanczos3 => fr::FilterType::Lanczos3,
    }
}
