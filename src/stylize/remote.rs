//! # 远程推理引擎适配
//!
//! ## 设计思路
//!
//! 本 crate 不实现风格迁移计算，这里给出一个通过 HTTP 调用外部推理服务的 `InferenceEngine` 实现。
//!
//! ## 协议
//!
//! - `GET {endpoint}/health`：初始化时调用，作为连通性检查与预热。
//! - `POST {endpoint}/stylize`：请求体 `{"content": <png base64>, "style": <png base64>}`，
//!   响应体 `{"width": u32, "height": u32, "pixels": <rgba8 base64>}`。

use std::io::Cursor;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose};
use image::ImageFormat;
use serde::{Deserialize, Serialize};

use super::bitmap::BitmapResource;
use super::source::RawPixelBuffer;
use super::{InferenceEngine, StylizeError};

/// 远程推理服务配置。
#[derive(Debug, Clone)]
pub struct RemoteEngineConfig {
    /// 服务根地址，例如 `http://127.0.0.1:8500`。
    pub endpoint: String,
    /// 建立连接超时时间（秒）。
    pub connect_timeout: u64,
    /// 单次请求总超时时间（秒）。
    pub request_timeout: u64,
}

impl Default for RemoteEngineConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8500".to_string(),
            connect_timeout: 8,
            request_timeout: 120,
        }
    }
}

#[derive(Serialize)]
struct StylizeRequest {
    content: String,
    style: String,
}

#[derive(Deserialize)]
struct StylizeResponse {
    width: u32,
    height: u32,
    pixels: String,
}

/// 基于 HTTP 的推理引擎。
pub struct RemoteInferenceEngine {
    client: reqwest::Client,
    health_url: reqwest::Url,
    stylize_url: reqwest::Url,
}

impl RemoteInferenceEngine {
    /// 校验地址并构建复用型 HTTP 客户端。
    pub fn new(config: &RemoteEngineConfig) -> Result<Self, StylizeError> {
        let mut base = reqwest::Url::parse(&config.endpoint)
            .map_err(|e| StylizeError::ModelLoad(format!("推理服务地址格式错误：{}", e)))?;

        if !matches!(base.scheme(), "http" | "https") {
            return Err(StylizeError::ModelLoad(format!(
                "推理服务仅支持 http/https：{}",
                base.scheme()
            )));
        }

        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let join = |segment: &str| {
            base.join(segment)
                .map_err(|e| StylizeError::ModelLoad(format!("推理服务地址拼接失败：{}", e)))
        };
        let health_url = join("health")?;
        let stylize_url = join("stylize")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .build()
            .map_err(|e| StylizeError::ModelLoad(format!("HTTP 客户端构建失败：{}", e)))?;

        Ok(Self {
            client,
            health_url,
            stylize_url,
        })
    }

    pub fn stylize_url(&self) -> &reqwest::Url {
        &self.stylize_url
    }
}

impl InferenceEngine for RemoteInferenceEngine {
    async fn initialize(&mut self) -> Result<(), StylizeError> {
        log::info!("🌐 检查推理服务 - {}", self.health_url);

        let response = self
            .client
            .get(self.health_url.clone())
            .send()
            .await
            .map_err(|e| StylizeError::ModelLoad(format!("推理服务不可达：{}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StylizeError::ModelLoad(format!(
                "推理服务健康检查失败：HTTP {}",
                status
            )));
        }

        Ok(())
    }

    async fn stylize(
        &self,
        content: &BitmapResource,
        style: &BitmapResource,
    ) -> Result<RawPixelBuffer, StylizeError> {
        let body = build_request_body(content, style)?;
        log::debug!("📡 发送推理请求 - {}KB", body.len() / 1024);

        let response = self
            .client
            .post(self.stylize_url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| StylizeError::Network(format!("推理请求失败：{}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StylizeError::Inference(format!("推理服务返回 HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StylizeError::Network(format!("读取推理响应失败：{}", e)))?;

        parse_response(&bytes)
    }
}

fn encode_bitmap(label: &str, bitmap: &BitmapResource) -> Result<String, StylizeError> {
    let image = bitmap
        .image()
        .ok_or_else(|| StylizeError::Inference(format!("{}未就绪，无法发送", label)))?;

    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| StylizeError::Inference(format!("{}编码失败：{}", label, e)))?;

    Ok(general_purpose::STANDARD.encode(cursor.into_inner()))
}

pub(crate) fn build_request_body(
    content: &BitmapResource,
    style: &BitmapResource,
) -> Result<Vec<u8>, StylizeError> {
    let request = StylizeRequest {
        content: encode_bitmap("内容图", content)?,
        style: encode_bitmap("风格图", style)?,
    };

    serde_json::to_vec(&request)
        .map_err(|e| StylizeError::Inference(format!("序列化推理请求失败：{}", e)))
}

pub(crate) fn parse_response(bytes: &[u8]) -> Result<RawPixelBuffer, StylizeError> {
    let response: StylizeResponse = serde_json::from_slice(bytes)
        .map_err(|e| StylizeError::Inference(format!("推理响应格式错误：{}", e)))?;

    let pixels = general_purpose::STANDARD
        .decode(response.pixels.trim())
        .map_err(|e| StylizeError::Inference(format!("推理像素 Base64 解码失败：{}", e)))?;

    let buffer = RawPixelBuffer {
        width: response.width,
        height: response.height,
        pixels,
    };
    buffer
        .validate()
        .map_err(|e| StylizeError::Inference(format!("推理输出不合法：{}", e)))?;

    Ok(buffer)
}
