//! # 推理引擎契约
//!
//! 风格迁移本身的数学计算不在本 crate 内实现，只约定两个异步能力：
//! 初始化（拉取权重 + 预热）与单次风格化。
//!
//! 编排器保证 `stylize` 不会与自身并发调用。

use std::future::Future;

use super::bitmap::BitmapResource;
use super::source::RawPixelBuffer;
use super::StylizeError;

/// 外部推理引擎。
pub trait InferenceEngine: Send + Sync + 'static {
    /// 初始化引擎；可能很慢，失败即视为模型加载失败。
    fn initialize(&mut self) -> impl Future<Output = Result<(), StylizeError>> + Send;

    /// 对内容图施加风格图，返回 RGBA 像素。
    fn stylize(
        &self,
        content: &BitmapResource,
        style: &BitmapResource,
    ) -> impl Future<Output = Result<RawPixelBuffer, StylizeError>> + Send;
}
