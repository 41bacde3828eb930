//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义 crate 级统一的 `AppError` 枚举，宿主层（CLI、设置加载、输出目录）统一返回它，
//! 替代分散的 `.map_err(|e| e.to_string())`、`expect()` 等不一致模式。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `StylizeError` 提供 `From` 转换，无需手动 map。
//! - 实现 `Serialize` 将错误序列化为字符串，方便宿主输出 JSON。

use serde::Serialize;

use crate::stylize::{CommandError, StylizeError};

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 风格化流水线错误（加载 / 解码 / 推理 / 导出）
    #[error("{0}")]
    Stylize(#[from] StylizeError),

    /// 风格化执行失败，保留流水线错误码
    #[error("风格化失败 [{code}]：{message}")]
    Stylization { code: &'static str, message: String },

    /// 服务层命令错误
    #[error("[{stage}/{code}] {message}")]
    Command {
        code: &'static str,
        stage: &'static str,
        message: String,
    },

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 输出目录不可用
    #[error("存储目录不可用: {0}")]
    Storage(String),

    /// 配置文件无法解析或取值非法
    #[error("配置错误: {0}")]
    Config(String),
}

impl From<CommandError> for AppError {
    fn from(error: CommandError) -> Self {
        Self::Command {
            code: error.code,
            stage: error.stage,
            message: error.message,
        }
    }
}

/// 将错误序列化为人类可读的字符串。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stylize_error_is_transparent() {
        let err = AppError::from(StylizeError::ModelLoad("no weights".to_string()));
        let json = serde_json::to_string(&err).expect("serialize");
        assert!(json.contains("no weights"));
    }

    #[test]
    fn stylization_failure_keeps_original_code() {
        let err = AppError::Stylization {
            code: "decode",
            message: "解码错误：truncated".to_string(),
        };
        assert_eq!(err.to_string(), "风格化失败 [decode]：解码错误：truncated");
    }

    #[test]
    fn command_error_keeps_stage_and_code() {
        let err = AppError::from(CommandError::from(StylizeError::FileSystem("gone".to_string())));
        assert_eq!(err.to_string(), "[intake/file_system] 文件错误：gone");
    }
}
