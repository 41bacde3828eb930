//! # 流水线状态机
//!
//! ## 设计思路
//!
//! `PipelineState` 是界面状态的唯一事实来源，只由编排器通过命令修改，
//! 外部只能拿到 `PipelineSnapshot`（可序列化的只读快照）。
//!
//! ## 实现思路
//!
//! - 输入图替换时先释放旧句柄，再清空旧结果并递增 `generation`。
//! - `generation` 让进行中的风格化在完成时识别“输入已变”，避免把过期结果当作当前结果。
//! - `processing` 由编排器的原子标志维护，快照时一并带出。

use std::sync::Arc;

use serde::Serialize;

use super::bitmap::{BitmapResource, ReadyState, ResourceRegistry};
use super::exporter::{EncodedImage, ExportableAsset};
use super::source::ResourceRole;

/// 模型状态：每个进程生命周期内只会从 `Loading` 迁移一次。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    Loading,
    Ready,
    Failed,
}

/// `apply_style` 被跳过的原因。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    ModelNotReady,
    MissingContent,
    MissingStyle,
    Busy,
}

/// 单次 `apply_style` 的结果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StylizeOutcome {
    /// 入口守卫未通过，状态未改变。
    Skipped { reason: SkipReason },
    /// 结果已写入状态。
    Completed { width: u32, height: u32 },
    Failed { code: &'static str, message: String },
    /// 运行期间输入被替换，结果已丢弃。
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BitmapSummary {
    pub width: u32,
    pub height: u32,
    pub ready_state: ReadyState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultSummary {
    pub width: u32,
    pub height: u32,
    pub file_name: String,
    pub byte_len: usize,
}

/// 面向展示层的只读快照。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineSnapshot {
    pub model_state: ModelState,
    pub processing: bool,
    pub content: Option<BitmapSummary>,
    pub style: Option<BitmapSummary>,
    pub result: Option<ResultSummary>,
    pub last_outcome: Option<StylizeOutcome>,
}

/// 流水线内部状态。
#[derive(Debug)]
pub struct PipelineState {
    pub(crate) model_state: ModelState,
    pub(crate) content: Option<BitmapResource>,
    pub(crate) style: Option<BitmapResource>,
    pub(crate) result: Option<ExportableAsset>,
    pub(crate) generation: u64,
    pub(crate) last_outcome: Option<StylizeOutcome>,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            model_state: ModelState::Loading,
            content: None,
            style: None,
            result: None,
            generation: 0,
            last_outcome: None,
        }
    }
}

impl PipelineState {
    /// 替换某个输入角色的位图，返回是否清掉了已有结果。
    ///
    /// 旧句柄先注销，`create` 之后才被调用，同一角色任何时刻最多一个存活句柄。
    pub(crate) fn replace_input(
        &mut self,
        registry: &ResourceRegistry,
        role: ResourceRole,
        create: impl FnOnce() -> BitmapResource,
    ) -> bool {
        let slot = match role {
            ResourceRole::Content => &mut self.content,
            ResourceRole::Style => &mut self.style,
            ResourceRole::Result | ResourceRole::Scaled => {
                log::warn!("⚠️ 非输入角色不能替换输入位图：{}", role.as_str());
                return false;
            }
        };

        if let Some(previous) = slot.take() {
            registry.revoke(previous.handle());
        }
        *slot = Some(create());

        self.generation += 1;
        self.clear_result(registry)
    }

    /// 先释放旧结果句柄，再为新结果分配句柄。
    pub(crate) fn store_result(
        &mut self,
        registry: &Arc<ResourceRegistry>,
        encoded: EncodedImage,
        file_name: &str,
    ) {
        self.clear_result(registry);
        let handle = registry.create(ResourceRole::Result);
        self.result = Some(ExportableAsset::new(encoded, file_name, handle));
    }

    fn clear_result(&mut self, registry: &ResourceRegistry) -> bool {
        match self.result.take() {
            Some(previous) => {
                registry.revoke(previous.handle());
                true
            }
            None => false,
        }
    }

    /// 释放所有输入与结果；模型状态保持不变。
    pub(crate) fn reset(&mut self, registry: &ResourceRegistry) {
        for bitmap in [self.content.take(), self.style.take()].into_iter().flatten() {
            registry.revoke(bitmap.handle());
        }
        self.clear_result(registry);
        self.generation += 1;
        self.last_outcome = None;
    }

    pub(crate) fn snapshot(&self, processing: bool) -> PipelineSnapshot {
        let summarize = |bitmap: &BitmapResource| {
            let (width, height) = bitmap.dimensions();
            BitmapSummary {
                width,
                height,
                ready_state: bitmap.ready_state(),
            }
        };

        PipelineSnapshot {
            model_state: self.model_state,
            processing,
            content: self.content.as_ref().map(summarize),
            style: self.style.as_ref().map(summarize),
            result: self.result.as_ref().map(|asset| ResultSummary {
                width: asset.width(),
                height: asset.height(),
                file_name: asset.suggested_file_name().to_string(),
                byte_len: asset.encoded().len(),
            }),
            last_outcome: self.last_outcome.clone(),
        }
    }
}
