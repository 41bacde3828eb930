//! # 图片接收模块
//!
//! ## 设计思路
//!
//! 把用户提供的原始字节转换为 `BitmapResource`：调用本身是同步的，只负责登记句柄并
//! 触发后台解码，真正的解码在 blocking 线程池完成，不阻塞调用方。
//! 校验（`prepare_decode`）与分配句柄（`PendingDecode::start`）分开，
//! 调用方在两步之间释放同角色的旧句柄。
//!
//! ## 实现思路
//!
//! - 空字节视为“没有选择文件”，直接忽略。
//! - 解码前先读 header 尺寸并做像素/内存上限检查，再完整解码。
//! - 默认策略下解码失败被吸收为 `Failed`（零尺寸），由编排阶段统一报错；
//!   `Strict` 策略在签名不是图片时立即拒绝。
//! - 另提供文件 / Base64 两种字节来源，均带体积上限校验。

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose};
use image::DynamicImage;

use super::bitmap::{BitmapResource, ResourceRegistry};
use super::source::{RawImageData, ResourceRole};
use super::{DecodePolicy, StylizeConfig, StylizeError};

/// 已通过入口校验、尚未登记句柄的解码任务。
///
/// 句柄在 `start` 时才分配，调用方可以先释放同角色的旧句柄。
pub struct PendingDecode {
    role: ResourceRole,
    raw: RawImageData,
    config: StylizeConfig,
    runtime: tokio::runtime::Handle,
}

/// 入口校验：空字节返回 `Ok(None)`，`Strict` 策略下先校验签名。
pub fn prepare_decode(
    role: ResourceRole,
    raw: RawImageData,
    config: &StylizeConfig,
) -> Result<Option<PendingDecode>, StylizeError> {
    if raw.bytes.is_empty() {
        log::debug!("📭 未提供图片内容，忽略 - role={}", role.as_str());
        return Ok(None);
    }

    if config.decode_policy == DecodePolicy::Strict {
        validate_image_signature(&raw.bytes)?;
    }

    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| StylizeError::Internal(format!("当前线程没有可用的异步运行时：{}", e)))?;

    Ok(Some(PendingDecode {
        role,
        raw,
        config: config.clone(),
        runtime,
    }))
}

impl PendingDecode {
    /// 登记新句柄并在 blocking 线程池中解码。
    pub fn start(self, registry: &Arc<ResourceRegistry>) -> BitmapResource {
        let Self {
            role,
            raw,
            config,
            runtime,
        } = self;

        let bitmap = BitmapResource::pending(registry.create(role));
        let completion = bitmap.completion_guard();

        log::info!(
            "📥 接收图片 - role={} 来源={} 大小={}KB",
            role.as_str(),
            raw.source_hint,
            raw.bytes.len() / 1024
        );

        runtime.spawn_blocking(move || {
            let result = decode_with_limits(&raw.bytes, &config);
            match &result {
                Ok(image) => log::info!(
                    "✅ 图片解码成功 - role={} 尺寸={}x{}",
                    role.as_str(),
                    image.width(),
                    image.height()
                ),
                Err(err) => log::warn!("⚠️ 图片解码失败 - role={}：{}", role.as_str(), err),
            }
            completion.finish(result);
        });

        bitmap
    }
}

/// 带资源上限的完整解码。
pub(crate) fn decode_with_limits(
    bytes: &[u8],
    config: &StylizeConfig,
) -> Result<DynamicImage, StylizeError> {
    let (header_width, header_height) = inspect_dimensions_from_memory(bytes)?;
    validate_pixel_limits(config, header_width, header_height)?;
    validate_decoded_memory_limits(config, header_width, header_height)?;

    image::load_from_memory(bytes).map_err(|e| StylizeError::Decode(format!("图片解码失败：{}", e)))
}

/// 仅通过内存中的图片头信息读取宽高。
fn inspect_dimensions_from_memory(bytes: &[u8]) -> Result<(u32, u32), StylizeError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| StylizeError::InvalidFormat(format!("无法识别图片格式：{}", e)))?;

    reader
        .into_dimensions()
        .map_err(|e| StylizeError::Decode(format!("无法读取图片尺寸：{}", e)))
}

fn validate_pixel_limits(config: &StylizeConfig, width: u32, height: u32) -> Result<(), StylizeError> {
    let pixels = (width as u64)
        .checked_mul(height as u64)
        .ok_or_else(|| StylizeError::ResourceLimit("图片像素数溢出".to_string()))?;

    if pixels > config.max_decoded_pixels {
        return Err(StylizeError::ResourceLimit(format!(
            "图片像素过大：{} 像素（限制：{} 像素）",
            pixels, config.max_decoded_pixels
        )));
    }

    Ok(())
}

fn validate_decoded_memory_limits(
    config: &StylizeConfig,
    width: u32,
    height: u32,
) -> Result<(), StylizeError> {
    let estimated = (width as u64)
        .checked_mul(height as u64)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or_else(|| StylizeError::ResourceLimit("图片解码内存估算溢出".to_string()))?;

    if estimated > config.max_decoded_bytes {
        return Err(StylizeError::ResourceLimit(format!(
            "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
            estimated as f64 / 1024.0 / 1024.0,
            config.max_decoded_bytes as f64 / 1024.0 / 1024.0
        )));
    }

    Ok(())
}

/// 通过文件签名判断是否为图片。
pub fn validate_image_signature(bytes: &[u8]) -> Result<(), StylizeError> {
    if bytes.is_empty() {
        return Err(StylizeError::InvalidFormat("图片内容为空".to_string()));
    }

    let kind = infer::get(bytes)
        .ok_or_else(|| StylizeError::InvalidFormat("无法识别图片类型".to_string()))?;

    if kind.matcher_type() != infer::MatcherType::Image {
        return Err(StylizeError::InvalidFormat(format!(
            "文件签名不是图片类型：{}",
            kind.mime_type()
        )));
    }

    Ok(())
}

/// 从本地路径加载图片原始字节。
pub fn load_from_file(path: &Path, config: &StylizeConfig) -> Result<RawImageData, StylizeError> {
    log::info!("📁 开始读取本地图片 - 路径: {}", path.display());

    if !path.exists() {
        return Err(StylizeError::FileSystem(format!("文件不存在：{}", path.display())));
    }

    let metadata = std::fs::metadata(path)
        .map_err(|e| StylizeError::FileSystem(format!("无法读取文件信息：{}", e)))?;

    if metadata.len() > config.max_file_size {
        return Err(StylizeError::ResourceLimit(format!(
            "文件过大：{:.2} MB（限制：{:.2} MB）",
            metadata.len() as f64 / 1024.0 / 1024.0,
            config.max_file_size as f64 / 1024.0 / 1024.0
        )));
    }

    let bytes = std::fs::read(path)
        .map_err(|e| StylizeError::FileSystem(format!("无法读取图片文件：{}", e)))?;

    Ok(RawImageData {
        bytes,
        source_hint: "file",
    })
}

/// 从 Base64（Data URL 或纯 Base64）加载图片原始字节。
pub fn load_from_base64(data: &str, config: &StylizeConfig) -> Result<RawImageData, StylizeError> {
    log::info!("📝 开始处理 base64 图片");

    let bytes = parse_base64(data)?;
    if bytes.len() as u64 > config.max_file_size {
        return Err(StylizeError::ResourceLimit(format!(
            "Base64 解码后体积过大：{:.2} MB（限制：{:.2} MB）",
            bytes.len() as f64 / 1024.0 / 1024.0,
            config.max_file_size as f64 / 1024.0 / 1024.0
        )));
    }

    Ok(RawImageData {
        bytes,
        source_hint: "base64",
    })
}

fn parse_base64(data: &str) -> Result<Vec<u8>, StylizeError> {
    let trimmed = data.trim();
    let payload = match trimmed.split_once(',') {
        Some((header, body)) if header.starts_with("data:") => {
            if !header.ends_with(";base64") {
                return Err(StylizeError::InvalidFormat("Data URL 不是 base64 编码".to_string()));
            }
            body
        }
        _ => trimmed,
    };

    general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| StylizeError::InvalidFormat(format!("Base64 解码失败：{}", e)))
}
