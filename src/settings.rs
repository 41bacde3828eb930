//! 应用设置加载模块
//!
//! # 设计思路
//!
//! 设置文件是可选的 JSON，所有字段都可缺省：缺省字段保持 `StylizeConfig::default()`
//! 与 `RemoteEngineConfig::default()` 的取值。先应用档位，再应用单项覆盖。

use std::fs;
use std::path::Path;

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::stylize::{DecodePolicy, PerformanceProfile, RemoteEngineConfig, StylizeConfig};

/// 设置文件结构。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub profile: Option<String>,
    pub max_dimension: Option<u32>,
    pub resize_filter: Option<String>,
    pub max_file_size: Option<u64>,
    pub max_decoded_pixels: Option<u64>,
    pub max_decoded_bytes: Option<u64>,
    pub result_file_name: Option<String>,
    pub decode_policy: Option<String>,
    pub inference_timeout_ms: Option<u64>,
    pub endpoint: Option<String>,
    pub connect_timeout: Option<u64>,
    pub request_timeout: Option<u64>,
}

/// 合并后的运行设置。
#[derive(Debug, Clone, Default)]
pub struct AppSettings {
    pub stylize: StylizeConfig,
    pub remote: RemoteEngineConfig,
}

/// 读取设置文件并合并命令行档位；未提供路径时从默认设置出发。
///
/// `profile` 会替换文件中的 `profile` 字段，文件里的单项覆盖仍然优先生效。
pub fn load_settings(path: Option<&Path>, profile: Option<&str>) -> Result<AppSettings, AppError> {
    let mut file = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            let file = serde_json::from_str::<ConfigFile>(&content)
                .map_err(|e| AppError::Config(format!("解析设置文件失败: {}", e)))?;
            log::info!("⚙️ 已读取设置文件 - {}", path.display());
            file
        }
        None => ConfigFile::default(),
    };

    if let Some(profile) = profile {
        file.profile = Some(profile.to_string());
    }
    file.into_settings()
}

impl ConfigFile {
    pub fn into_settings(self) -> Result<AppSettings, AppError> {
        let mut settings = AppSettings::default();
        let stylize = &mut settings.stylize;

        if let Some(profile) = self.profile.as_deref() {
            stylize.apply_performance_profile(PerformanceProfile::from_str(profile)?);
        }
        if let Some(max_dimension) = self.max_dimension {
            stylize.max_dimension = max_dimension;
        }
        if let Some(filter) = self.resize_filter.as_deref() {
            stylize.resize_filter = parse_filter(filter)?;
        }
        if let Some(max_file_size) = self.max_file_size {
            stylize.max_file_size = max_file_size;
        }
        if let Some(max_decoded_pixels) = self.max_decoded_pixels {
            stylize.max_decoded_pixels = max_decoded_pixels;
        }
        if let Some(max_decoded_bytes) = self.max_decoded_bytes {
            stylize.max_decoded_bytes = max_decoded_bytes;
        }
        if let Some(result_file_name) = self.result_file_name {
            stylize.result_file_name = result_file_name;
        }
        if let Some(policy) = self.decode_policy.as_deref() {
            stylize.decode_policy = parse_decode_policy(policy)?;
        }
        if self.inference_timeout_ms.is_some() {
            stylize.inference_timeout_ms = self.inference_timeout_ms;
        }
        stylize.validate()?;

        let remote = &mut settings.remote;
        if let Some(endpoint) = self.endpoint {
            remote.endpoint = endpoint;
        }
        if let Some(connect_timeout) = self.connect_timeout {
            remote.connect_timeout = connect_timeout;
        }
        if let Some(request_timeout) = self.request_timeout {
            remote.request_timeout = request_timeout;
        }
        if !(1..=120).contains(&remote.connect_timeout) {
            return Err(AppError::Config("connect_timeout 必须在 1~120 秒之间".to_string()));
        }
        if remote.request_timeout == 0 {
            return Err(AppError::Config("request_timeout 不能为 0".to_string()));
        }

        Ok(settings)
    }
}

fn parse_filter(filter: &str) -> Result<FilterType, AppError> {
    match filter.trim().to_lowercase().as_str() {
        "nearest" => Ok(FilterType::Nearest),
        "triangle" => Ok(FilterType::Triangle),
        "catmull_rom" | "catmullrom" => Ok(FilterType::CatmullRom),
        "gaussian" => Ok(FilterType::Gaussian),
        "lanczos3" => Ok(FilterType::Lanczos3),
        other => Err(AppError::Config(format!("未知缩放滤镜：{}", other))),
    }
}

fn parse_decode_policy(policy: &str) -> Result<DecodePolicy, AppError> {
    match policy.trim().to_lowercase().as_str() {
        "deferred" => Ok(DecodePolicy::Deferred),
        "strict" => Ok(DecodePolicy::Strict),
        other => Err(AppError::Config(format!(
            "未知解码策略：{}（可选：deferred / strict）",
            other
        ))),
    }
}
