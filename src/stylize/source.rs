//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入语义”和“流水线中间结果”解耦：
//! - `ResourceRole` 表示资源在流水线中的逻辑角色
//! - `RawImageData` 表示已加载但未解码的字节
//! - `RawPixelBuffer` 表示推理引擎输出的 RGBA 像素

use image::{DynamicImage, RgbaImage};

use super::StylizeError;

/// 资源的逻辑角色。
///
/// 同一角色在任意时刻最多只有一个存活的句柄（`Scaled` 除外，它只在单次编排内存在）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceRole {
    /// 内容图。
    Content,
    /// 风格图。
    Style,
    /// 导出结果。
    Result,
    /// 编排过程中产生的缩放副本。
    Scaled,
}

impl ResourceRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Style => "style",
            Self::Result => "result",
            Self::Scaled => "scaled",
        }
    }
}

/// 加载阶段输出：原始字节与来源标识。
pub struct RawImageData {
    /// 原始图片字节。
    pub bytes: Vec<u8>,
    /// 来源提示（用于日志与诊断）。
    pub source_hint: &'static str,
}

/// 推理阶段输出：RGBA 像素数据。
#[derive(Debug, Clone)]
pub struct RawPixelBuffer {
    /// 图像宽度（像素）。
    pub width: u32,
    /// 图像高度（像素）。
    pub height: u32,
    /// RGBA 字节数组（`width * height * 4`）。
    pub pixels: Vec<u8>,
}

impl RawPixelBuffer {
    /// 从已解码图像构建像素缓冲。
    pub fn from_image(image: &DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self {
            width,
            height,
            pixels: rgba.into_raw(),
        }
    }

    /// 校验字节长度与宽高一致。
    pub fn validate(&self) -> Result<(), StylizeError> {
        if self.width == 0 || self.height == 0 {
            return Err(StylizeError::Encode(format!(
                "推理输出尺寸为零：{}x{}",
                self.width, self.height
            )));
        }

        let expected_len = (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|pixels| pixels.checked_mul(4))
            .ok_or_else(|| StylizeError::ResourceLimit("推理输出尺寸导致内存溢出风险".to_string()))?;

        if self.pixels.len() != expected_len {
            return Err(StylizeError::Encode(format!(
                "推理输出像素长度异常：期望 {} 实际 {}",
                expected_len,
                self.pixels.len()
            )));
        }

        Ok(())
    }

    pub fn into_image(self) -> Result<RgbaImage, StylizeError> {
        self.validate()?;
        RgbaImage::from_raw(self.width, self.height, self.pixels)
            .ok_or_else(|| StylizeError::Encode("创建图像缓冲区失败".to_string()))
    }
}
