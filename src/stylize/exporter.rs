//! # 结果导出模块
//!
//! ## 设计思路
//!
//! 推理输出的原始 RGBA 像素先编码成 PNG，得到可展示、可下载的 `ExportableAsset`。
//! “保存为命名文件”抽象为 `AssetSink`，宿主决定落到磁盘、浏览器或别处。
//!
//! ## 实现思路
//!
//! - 编码失败统一映射为 `StylizeError::Encode`。
//! - 编码结果用 `bytes::Bytes` 持有，导出时零拷贝克隆。
//! - `FileSink` 不覆盖已有文件：同名时追加时间戳。

use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use chrono::Local;
use image::{DynamicImage, ImageFormat};

use super::bitmap::SourceHandle;
use super::source::RawPixelBuffer;
use super::StylizeError;

/// 可导出的风格化结果。
#[derive(Debug)]
pub struct ExportableAsset {
    width: u32,
    height: u32,
    encoded: Bytes,
    suggested_file_name: String,
    handle: SourceHandle,
}

impl ExportableAsset {
    /// 绑定句柄与文件名，得到可导出的资源。
    pub(crate) fn new(encoded: EncodedImage, file_name: &str, handle: SourceHandle) -> Self {
        Self {
            width: encoded.width,
            height: encoded.height,
            encoded: encoded.bytes,
            suggested_file_name: file_name.to_string(),
            handle,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// PNG 编码后的字节。
    pub fn encoded(&self) -> &Bytes {
        &self.encoded
    }

    pub fn suggested_file_name(&self) -> &str {
        &self.suggested_file_name
    }

    pub fn handle(&self) -> &SourceHandle {
        &self.handle
    }

    /// `data:image/png;base64,...` 形式，便于直接预览。
    pub fn data_url(&self) -> String {
        format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(&self.encoded)
        )
    }
}

/// PNG 编码结果，尚未绑定资源句柄。
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub width: u32,
    pub height: u32,
    pub bytes: Bytes,
}

/// 将推理输出编码为 PNG。
pub fn encode_png(raw: RawPixelBuffer) -> Result<EncodedImage, StylizeError> {
    let image = raw.into_image()?;
    let (width, height) = image.dimensions();

    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image)
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| StylizeError::Encode(format!("PNG 编码失败：{}", e)))?;

    let bytes = Bytes::from(cursor.into_inner());
    log::debug!(
        "🖼️ 结果编码完成 - {}x{} {}KB",
        width,
        height,
        bytes.len() / 1024
    );

    Ok(EncodedImage {
        width,
        height,
        bytes,
    })
}

/// “按文件名保存字节”的能力。
pub trait AssetSink {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<(), StylizeError>;
}

/// 写入本地目录的导出实现。
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 计算最终落盘路径；同名文件已存在时追加时间戳。
    pub fn target_path(&self, file_name: &str) -> PathBuf {
        let candidate = self.dir.join(file_name);
        if !candidate.exists() {
            return candidate;
        }

        let path = Path::new(file_name);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("stylized");
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("png");
        let timestamp = Local::now().format("%Y%m%d%H%M%S%f");
        self.dir.join(format!("{}_{}.{}", stem, timestamp, extension))
    }
}

impl AssetSink for FileSink {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<(), StylizeError> {
        let target = self.target_path(file_name);
        std::fs::write(&target, bytes)
            .map_err(|e| StylizeError::FileSystem(format!("保存结果失败：{}", e)))?;

        log::info!("💾 结果已保存 - {}", target.display());
        Ok(())
    }
}
