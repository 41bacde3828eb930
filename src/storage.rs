//! 输出目录管理模块
//!
//! # 设计思路
//!
//! 统一管理风格化结果的落盘目录，支持用户自定义目录，并在目录不存在时自动创建。
//!
//! # 实现思路
//!
//! - 优先使用用户指定的目录。
//! - 未指定时回退到当前工作目录下的 `output` 子目录。
//! - 目录不存在时自动 `create_dir_all`，避免上层判断。
//! - 所有可能失败的操作均返回 `Result`，不使用 `expect()` / `unwrap()`。

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::AppError;

const DEFAULT_OUTPUT_DIR: &str = "output";

/// 输出目录信息
#[derive(Debug, Clone, Serialize)]
pub struct StorageInfo {
    pub path: String,
    pub total_size: u64,
    pub file_count: u64,
}

/// 获取输出目录
///
/// # 参数
/// * `custom_dir` - 用户自定义目录（可选）
///
/// # 返回
/// - `Ok(PathBuf)`：可用的输出目录
/// - `Err(AppError::Storage)`：无法获取或创建目录
pub fn resolve_output_dir(custom_dir: Option<&Path>) -> Result<PathBuf, AppError> {
    if let Some(dir) = custom_dir.filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| {
                AppError::Storage(format!("创建自定义目录 '{}' 失败: {}", dir.display(), e))
            })?;
        }
        return Ok(dir.to_path_buf());
    }

    let cwd = std::env::current_dir()
        .map_err(|e| AppError::Storage(format!("获取当前目录失败: {}", e)))?;
    let output_dir = cwd.join(DEFAULT_OUTPUT_DIR);
    if !output_dir.exists() {
        fs::create_dir_all(&output_dir)
            .map_err(|e| AppError::Storage(format!("创建输出目录失败: {}", e)))?;
    }
    Ok(output_dir)
}

/// 获取输出目录信息（路径 + 占用大小 + 文件数）
pub fn output_dir_info(dir: &Path) -> Result<StorageInfo, AppError> {
    let mut total_size: u64 = 0;
    let mut file_count: u64 = 0;

    if dir.exists() {
        for entry in fs::read_dir(dir)?.flatten() {
            if let Ok(metadata) = entry.metadata() {
                if metadata.is_file() {
                    total_size += metadata.len();
                    file_count += 1;
                }
            }
        }
    }

    Ok(StorageInfo {
        path: dir.to_string_lossy().to_string(),
        total_size,
        file_count,
    })
}
