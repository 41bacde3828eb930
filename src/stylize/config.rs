//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `StylizeConfig`，保证运行时行为可观测、可调整、可测试。
//! 其中性能档位（quality / balanced / speed）作为高层语义，映射到底层参数组合。
//!
//! ## 实现思路
//!
//! - `Default` 提供生产可用的平衡配置（长边 900px）。
//! - `PerformanceProfile` 负责档位字符串解析与反向输出。
//! - `apply_performance_profile` 将档位转换为具体阈值。
//! - `infer_performance_profile` 用于从当前配置反推档位（给宿主展示状态）。

use image::imageops::FilterType;

use super::StylizeError;

/// 默认长边上限：在弱机上保持推理耗时可接受。
pub const DEFAULT_MAX_DIMENSION: u32 = 900;

/// 默认结果文件名。
pub const DEFAULT_RESULT_FILE_NAME: &str = "stylized.png";

/// 解码失败的处理策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePolicy {
    /// 解码失败被吸收为零尺寸位图，到编排阶段才报错。
    Deferred,
    /// 签名不是图片时在接收阶段直接拒绝，并保留旧图。
    Strict,
}

/// 风格化流水线配置。
#[derive(Debug, Clone)]
pub struct StylizeConfig {
    /// 内容图长边上限（像素），超出时等比缩小。
    pub max_dimension: u32,
    /// 缩放滤镜策略。
    pub resize_filter: FilterType,
    /// 读取原始字节时允许的最大文件体积（字节）。
    pub max_file_size: u64,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGBA 估算，字节）。
    pub max_decoded_bytes: u64,
    /// 导出时建议的文件名。
    pub result_file_name: String,
    pub decode_policy: DecodePolicy,
    /// 单次推理超时（毫秒），`None` 表示不限制。
    pub inference_timeout_ms: Option<u64>,
}

impl Default for StylizeConfig {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            resize_filter: FilterType::Triangle,
            max_file_size: 50 * 1024 * 1024,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
            result_file_name: DEFAULT_RESULT_FILE_NAME.to_string(),
            decode_policy: DecodePolicy::Deferred,
            inference_timeout_ms: None,
        }
    }
}

/// 性能档位（面向产品/用户语义）。
///
/// - `Quality`：尽量保真
/// - `Balanced`：质量与速度平衡
/// - `Speed`：优先推理速度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceProfile {
    Quality,
    Balanced,
    Speed,
}

impl PerformanceProfile {
    /// 从外部字符串解析档位。
    ///
    /// # 示例
    /// ```rust
    /// use style_transfer::stylize::PerformanceProfile;
    ///
    /// let p = PerformanceProfile::from_str("balanced")?;
    /// assert_eq!(p.as_str(), "balanced");
    /// # Ok::<(), style_transfer::stylize::StylizeError>(())
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(profile: &str) -> Result<Self, StylizeError> {
        match profile.trim().to_lowercase().as_str() {
            "quality" => Ok(Self::Quality),
            "balanced" => Ok(Self::Balanced),
            "speed" => Ok(Self::Speed),
            other => Err(StylizeError::InvalidFormat(format!(
                "未知性能档位：{}（可选：quality / balanced / speed）",
                other
            ))),
        }
    }

    /// 将档位输出为稳定字符串，供宿主展示与持久化。
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Balanced => "balanced",
            Self::Speed => "speed",
        }
    }
}

impl StylizeConfig {
    /// 基于当前参数反推性能档位。
    pub fn infer_performance_profile(&self) -> PerformanceProfile {
        if self.max_dimension >= 1600 {
            return PerformanceProfile::Quality;
        }

        if self.max_dimension <= 512 {
            return PerformanceProfile::Speed;
        }

        PerformanceProfile::Balanced
    }

    /// 应用指定性能档位到实际参数。
    pub fn apply_performance_profile(&mut self, profile: PerformanceProfile) {
        match profile {
            PerformanceProfile::Quality => {
                self.max_dimension = 1600;
                self.resize_filter = FilterType::CatmullRom;
            }
            PerformanceProfile::Balanced => {
                self.max_dimension = DEFAULT_MAX_DIMENSION;
                self.resize_filter = FilterType::Triangle;
            }
            PerformanceProfile::Speed => {
                self.max_dimension = 512;
                self.resize_filter = FilterType::Nearest;
            }
        }
    }

    /// 校验参数组合是否可用。
    pub fn validate(&self) -> Result<(), StylizeError> {
        if !(64..=8192).contains(&self.max_dimension) {
            return Err(StylizeError::InvalidFormat(
                "max_dimension 必须在 64~8192 之间".to_string(),
            ));
        }
        if self.max_decoded_bytes < 8 * 1024 * 1024 {
            return Err(StylizeError::InvalidFormat(
                "max_decoded_bytes 不能小于 8MB".to_string(),
            ));
        }
        if self.result_file_name.trim().is_empty() {
            return Err(StylizeError::InvalidFormat("result_file_name 不能为空".to_string()));
        }
        if self.inference_timeout_ms == Some(0) {
            return Err(StylizeError::InvalidFormat(
                "inference_timeout_ms 不能为 0".to_string(),
            ));
        }
        Ok(())
    }
}
