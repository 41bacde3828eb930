//! # 位图资源模块
//!
//! ## 设计思路
//!
//! `BitmapResource` 是“已解码像素 + 就绪状态”的共享句柄，克隆只增加引用计数。
//! 每个位图独占一个 `SourceHandle`，句柄登记在 `ResourceRegistry` 中，
//! 用来追踪“同一角色最多一个存活句柄”的约束，替换时先释放旧句柄。
//!
//! ## 实现思路
//!
//! - 就绪状态放在 `tokio::sync::watch` 中，解码任务完成时整体替换。
//! - `wait_ready` 即解码等待协议：已就绪立即返回；失败同样返回，从不报错。
//! - 句柄在最后一个克隆释放时自动注销；显式 `revoke` 可提前释放且幂等。
//! - 解码任务持有 `CompletionGuard`：任务 panic 或未执行就被丢弃时，位图落到 `Failed`，
//!   等待方不会永久挂起。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use image::{DynamicImage, GenericImageView};
use tokio::sync::watch;

use super::source::ResourceRole;
use super::StylizeError;

/// 瞬态资源登记表。
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    next_id: AtomicU64,
    live: Mutex<HashMap<u64, ResourceRole>>,
}

impl ResourceRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 为指定角色分配新句柄。
    pub fn create(self: &Arc<Self>, role: ResourceRole) -> SourceHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, role);

        log::debug!("🔖 分配资源句柄 #{} role={}", id, role.as_str());

        SourceHandle {
            id,
            role,
            registry: Arc::downgrade(self),
        }
    }

    /// 释放句柄，返回此前是否存活。
    pub fn revoke(&self, handle: &SourceHandle) -> bool {
        self.revoke_id(handle.id)
    }

    fn revoke_id(&self, id: u64) -> bool {
        let removed = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);

        if let Some(role) = removed {
            log::debug!("🗑️ 释放资源句柄 #{} role={}", id, role.as_str());
        }
        removed.is_some()
    }

    pub fn is_live(&self, handle: &SourceHandle) -> bool {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&handle.id)
    }

    /// 某角色当前存活的句柄数量。
    pub fn live_count(&self, role: ResourceRole) -> usize {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|r| **r == role)
            .count()
    }
}

/// 不透明的瞬态资源句柄，由创建它的位图独占。
#[derive(Debug)]
pub struct SourceHandle {
    id: u64,
    role: ResourceRole,
    registry: Weak<ResourceRegistry>,
}

impl SourceHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn role(&self) -> ResourceRole {
        self.role
    }
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.revoke_id(self.id);
        }
    }
}

/// 位图就绪状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    Pending,
    Ready,
    Failed,
}

#[derive(Debug, Clone)]
enum DecodeStatus {
    Pending,
    Ready(Arc<DynamicImage>),
    Failed(String),
}

impl DecodeStatus {
    fn ready_state(&self) -> ReadyState {
        match self {
            Self::Pending => ReadyState::Pending,
            Self::Ready(_) => ReadyState::Ready,
            Self::Failed(_) => ReadyState::Failed,
        }
    }
}

#[derive(Debug)]
struct BitmapInner {
    handle: SourceHandle,
    status: watch::Sender<DecodeStatus>,
}

/// 已解码（或解码中）的位图资源。
#[derive(Debug, Clone)]
pub struct BitmapResource {
    inner: Arc<BitmapInner>,
}

impl BitmapResource {
    /// 创建处于 `Pending` 的位图，等待解码任务调用 `complete`。
    pub(crate) fn pending(handle: SourceHandle) -> Self {
        let (status, _) = watch::channel(DecodeStatus::Pending);
        Self {
            inner: Arc::new(BitmapInner { handle, status }),
        }
    }

    /// 直接由已解码图像创建 `Ready` 位图。
    pub fn ready(handle: SourceHandle, image: DynamicImage) -> Self {
        let (status, _) = watch::channel(DecodeStatus::Ready(Arc::new(image)));
        Self {
            inner: Arc::new(BitmapInner { handle, status }),
        }
    }

    /// 写入解码结果；只有第一次调用生效。
    pub(crate) fn complete(&self, result: Result<DynamicImage, StylizeError>) {
        let next = match result {
            Ok(image) => DecodeStatus::Ready(Arc::new(image)),
            Err(err) => DecodeStatus::Failed(err.to_string()),
        };

        self.inner.status.send_if_modified(|current| {
            if matches!(current, DecodeStatus::Pending) {
                *current = next;
                true
            } else {
                false
            }
        });
    }

    /// 解码等待协议：在状态离开 `Pending` 后返回最终状态，从不报错。
    pub async fn wait_ready(&self) -> ReadyState {
        let mut rx = self.inner.status.subscribe();
        match rx.wait_for(|status| !matches!(status, DecodeStatus::Pending)).await {
            Ok(status) => status.ready_state(),
            Err(_) => ReadyState::Failed,
        }
    }

    pub fn ready_state(&self) -> ReadyState {
        self.inner.status.borrow().ready_state()
    }

    /// 宽高；未就绪或解码失败时为 `(0, 0)`。
    pub fn dimensions(&self) -> (u32, u32) {
        match &*self.inner.status.borrow() {
            DecodeStatus::Ready(image) => image.dimensions(),
            _ => (0, 0),
        }
    }

    pub fn width(&self) -> u32 {
        self.dimensions().0
    }

    pub fn height(&self) -> u32 {
        self.dimensions().1
    }

    /// 已解码像素。
    pub fn image(&self) -> Option<Arc<DynamicImage>> {
        match &*self.inner.status.borrow() {
            DecodeStatus::Ready(image) => Some(Arc::clone(image)),
            _ => None,
        }
    }

    /// 解码失败原因。
    pub fn failure(&self) -> Option<String> {
        match &*self.inner.status.borrow() {
            DecodeStatus::Failed(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    pub fn handle(&self) -> &SourceHandle {
        &self.inner.handle
    }

    pub fn role(&self) -> ResourceRole {
        self.inner.handle.role
    }

    /// 是否指向同一个底层资源。
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// 交给解码任务的完成凭证。
    pub(crate) fn completion_guard(&self) -> CompletionGuard {
        CompletionGuard {
            bitmap: Some(self.clone()),
        }
    }
}

/// 保证位图一定离开 `Pending`。
///
/// 正常路径调用 `finish`；未调用就被丢弃时写入 `Failed`。
pub(crate) struct CompletionGuard {
    bitmap: Option<BitmapResource>,
}

impl CompletionGuard {
    pub(crate) fn finish(mut self, result: Result<DynamicImage, StylizeError>) {
        if let Some(bitmap) = self.bitmap.take() {
            bitmap.complete(result);
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Some(bitmap) = self.bitmap.take() {
            log::warn!("⚠️ 解码任务未正常结束 - role={}", bitmap.role().as_str());
            bitmap.complete(Err(StylizeError::Internal("解码任务异常中止".to_string())));
        }
    }
}
