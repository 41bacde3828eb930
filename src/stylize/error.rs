//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载风格化链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! `code()` / `stage()` 给宿主层提供稳定的机器可读标识，文案可以随时调整。

/// 风格化链路统一错误类型。
///
/// 该类型会在 crate 顶层被上转为 `AppError`。
#[derive(Debug, thiserror::Error)]
pub enum StylizeError {
    #[error("模型加载失败：{0}")]
    ModelLoad(String),

    #[error("解码错误：{0}")]
    Decode(String),

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    #[error("推理失败：{0}")]
    Inference(String),

    #[error("结果编码失败：{0}")]
    Encode(String),

    #[error("超时错误：{0}")]
    Timeout(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("网络错误：{0}")]
    Network(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("内部错误：{0}")]
    Internal(String),
}

impl StylizeError {
    /// 稳定错误码，供宿主层做分支处理。
    pub fn code(&self) -> &'static str {
        match self {
            Self::ModelLoad(_) => "model_load",
            Self::Decode(_) => "decode",
            Self::InvalidFormat(_) => "invalid_format",
            Self::Inference(_) => "inference",
            Self::Encode(_) => "encode",
            Self::Timeout(_) => "timeout",
            Self::FileSystem(_) => "file_system",
            Self::Network(_) => "network",
            Self::ResourceLimit(_) => "resource_limit",
            Self::Internal(_) => "internal",
        }
    }

    /// 出错所在阶段。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::ModelLoad(_) => "model",
            Self::Decode(_) | Self::InvalidFormat(_) | Self::FileSystem(_) | Self::ResourceLimit(_) => {
                "intake"
            }
            Self::Inference(_) | Self::Timeout(_) | Self::Network(_) => "inference",
            Self::Encode(_) => "export",
            Self::Internal(_) => "pipeline",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_and_stage_are_stable() {
        let err = StylizeError::Inference("oom".to_string());
        assert_eq!(err.code(), "inference");
        assert_eq!(err.stage(), "inference");

        let err = StylizeError::Decode("bad png".to_string());
        assert_eq!(err.code(), "decode");
        assert_eq!(err.stage(), "intake");
    }

    #[test]
    fn display_keeps_detail() {
        let err = StylizeError::Encode("buffer too short".to_string());
        let text = err.to_string();
        assert!(text.contains("buffer too short"));
    }
}
