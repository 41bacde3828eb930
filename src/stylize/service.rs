//! # 服务层（命令入口）
//!
//! ## 设计思路
//!
//! 使用 `StyleTransferService` 作为宿主持有的状态，替代界面事件里的“发出即忘”异步回调。
//! 好处：
//! 1. 生命周期清晰（由宿主统一管理）
//! 2. 测试可创建独立实例，减少共享状态副作用
//! 3. 长耗时命令返回 `JoinHandle`，调用方自行决定是否等待
//!
//! ## 实现思路
//!
//! 内部持有 `Arc<StylePipeline>`，长耗时命令通过 `tokio::spawn` 派发；
//! 错误统一转换为带 `code/stage` 的 `CommandError`，便于宿主序列化。

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinHandle;

use super::exporter::AssetSink;
use super::handler::StylePipeline;
use super::notify::Notifier;
use super::source::ResourceRole;
use super::state::{ModelState, PipelineSnapshot, StylizeOutcome};
use super::{InferenceEngine, StylizeConfig, StylizeError};

/// 命令层错误，序列化后交给宿主展示。
#[derive(Debug, Clone, serde::Serialize)]
pub struct CommandError {
    pub code: &'static str,
    pub stage: &'static str,
    pub message: String,
}

impl From<StylizeError> for CommandError {
    fn from(error: StylizeError) -> Self {
        Self {
            code: error.code(),
            stage: error.stage(),
            message: error.to_string(),
        }
    }
}

/// 风格化服务。
pub struct StyleTransferService<E, N> {
    pipeline: Arc<StylePipeline<E, N>>,
}

impl<E, N> Clone for StyleTransferService<E, N> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

impl<E: InferenceEngine, N: Notifier> StyleTransferService<E, N> {
    pub fn with_config(config: StylizeConfig, notifier: N) -> Result<Self, StylizeError> {
        Ok(Self {
            pipeline: Arc::new(StylePipeline::with_config(config, notifier)?),
        })
    }

    pub fn pipeline(&self) -> &Arc<StylePipeline<E, N>> {
        &self.pipeline
    }

    /// 在后台加载模型。
    pub fn spawn_load_model<F, Fut>(&self, factory: F) -> JoinHandle<ModelState>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<E, StylizeError>> + Send + 'static,
    {
        let pipeline = Arc::clone(&self.pipeline);
        tokio::spawn(async move { pipeline.load_model(factory).await })
    }

    /// 在后台执行一次风格化。
    pub fn spawn_apply_style(&self) -> JoinHandle<StylizeOutcome> {
        let pipeline = Arc::clone(&self.pipeline);
        tokio::spawn(async move { pipeline.apply_style().await })
    }

    pub fn ingest_content_file(&self, path: &Path) -> Result<bool, CommandError> {
        Ok(self.pipeline.ingest_file(ResourceRole::Content, path)?)
    }

    pub fn ingest_style_file(&self, path: &Path) -> Result<bool, CommandError> {
        Ok(self.pipeline.ingest_file(ResourceRole::Style, path)?)
    }

    pub fn ingest_content_base64(&self, data: &str) -> Result<bool, CommandError> {
        Ok(self.pipeline.ingest_base64(ResourceRole::Content, data)?)
    }

    pub fn ingest_style_base64(&self, data: &str) -> Result<bool, CommandError> {
        Ok(self.pipeline.ingest_base64(ResourceRole::Style, data)?)
    }

    pub fn download(&self, sink: &dyn AssetSink) -> Result<bool, CommandError> {
        Ok(self.pipeline.download(sink)?)
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        self.pipeline.snapshot()
    }
}
