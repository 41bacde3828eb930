//! # 风格化编排模块（stylize）
//!
//! ## 设计思路
//!
//! 该模块将“模型加载 → 图片接收 → 解码等待 → 缩放 → 推理 → 编码导出”
//! 按职责拆分为多个子模块，避免单文件膨胀与耦合。
//!
//! - `service`：宿主持有的服务状态与命令入口（薄封装）
//! - `handler`：编排整条风格化流水线，持有唯一的 `PipelineState`
//! - `model`：推理引擎的一次性加载
//! - `intake`：字节加载、签名校验与后台解码
//! - `resizer`：按长边上限等比缩放
//! - `exporter`：PNG 编码与“保存为命名文件”
//! - `bitmap/state/source`：资源句柄、状态机、中间数据模型
//! - `engine/remote`：推理引擎契约及其 HTTP 适配
//!
//! ## 新同事快速上手
//!
//! ```text
//! 宿主（CLI / 界面）
//!    ↓
//! service.rs（命令入口、后台派发）
//!    ↓
//! handler.rs（入口守卫 + 单飞 + 阶段耗时日志）
//!    ├─ model.rs（Loading → Ready | Failed，只迁移一次）
//!    ├─ intake.rs（接收字节 → Pending 位图 → 后台解码）
//!    ├─ resizer.rs（等待就绪 + 缩放）
//!    ├─ engine.rs（InferenceEngine::stylize）
//!    └─ exporter.rs（PNG 编码 + AssetSink）
//!    ↓
//! state.rs（PipelineSnapshot → watch 订阅者）
//! ```

pub mod bitmap;
mod config;
mod engine;
mod error;
pub mod exporter;
mod handler;
pub mod intake;
mod model;
mod notify;
pub mod remote;
pub mod resizer;
pub mod service;
mod source;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use bitmap::{BitmapResource, ReadyState, ResourceRegistry, SourceHandle};
pub use config::{
    DEFAULT_MAX_DIMENSION, DEFAULT_RESULT_FILE_NAME, DecodePolicy, PerformanceProfile, StylizeConfig,
};
pub use engine::InferenceEngine;
pub use error::StylizeError;
pub use exporter::{AssetSink, EncodedImage, ExportableAsset, FileSink};
pub use handler::StylePipeline;
pub use notify::{ConsoleNotifier, LogNotifier, Notifier};
pub use remote::{RemoteEngineConfig, RemoteInferenceEngine};
pub use service::{CommandError, StyleTransferService};
pub use source::{RawImageData, RawPixelBuffer, ResourceRole};
pub use state::{ModelState, PipelineSnapshot, SkipReason, StylizeOutcome};
