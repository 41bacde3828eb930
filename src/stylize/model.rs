//! # 模型加载模块
//!
//! ## 设计思路
//!
//! 推理引擎在启动时构建并初始化一次（拉取权重 + 预热，可能很慢）。
//! 结果只有两种：`Ready` 或 `Failed`，失败后本次会话内不再重试，风格化永久不可用。
//!
//! ## 实现思路
//!
//! - `load_started` 原子标志保证只加载一次，重复调用直接返回当前状态。
//! - 引擎放入 `OnceLock`，就绪后只读共享。
//! - 失败时同时写错误日志并通过 `Notifier` 提示用户。

use std::future::Future;
use std::sync::atomic::Ordering;
use std::time::Instant;

use super::handler::StylePipeline;
use super::notify::Notifier;
use super::state::ModelState;
use super::{InferenceEngine, StylizeError};

impl<E: InferenceEngine, N: Notifier> StylePipeline<E, N> {
    /// 构建并初始化推理引擎。
    ///
    /// # 示例
    /// ```rust,ignore
    /// let state = pipeline.load_model(|| async { MyEngine::connect().await }).await;
    /// assert_eq!(state, ModelState::Ready);
    /// ```
    pub async fn load_model<F, Fut>(&self, factory: F) -> ModelState
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<E, StylizeError>>,
    {
        if self.load_started.swap(true, Ordering::SeqCst) {
            log::warn!("⚠️ 模型已加载过，忽略重复加载请求");
            return self.model_state();
        }

        self.set_model_state(ModelState::Loading);
        let start = Instant::now();

        let result = async {
            let mut engine = factory().await?;
            engine.initialize().await?;
            Ok::<E, StylizeError>(engine)
        }
        .await
        .map_err(|err| match err {
            StylizeError::ModelLoad(_) => err,
            other => StylizeError::ModelLoad(other.to_string()),
        });

        let state = match result {
            Ok(engine) => {
                if self.engine.set(engine).is_err() {
                    log::error!("❌ 推理引擎重复注册");
                    ModelState::Failed
                } else {
                    log::info!("✅ 推理引擎已就绪 - 耗时 {}ms", start.elapsed().as_millis());
                    ModelState::Ready
                }
            }
            Err(err) => {
                log::error!("❌ 推理引擎加载失败：{}", err);
                self.notifier.alert("模型加载失败，请查看日志了解详情。");
                ModelState::Failed
            }
        };

        self.set_model_state(state);
        state
    }

    pub fn model_state(&self) -> ModelState {
        self.lock_state().model_state
    }

    fn set_model_state(&self, model_state: ModelState) {
        self.lock_state().model_state = model_state;
        self.publish();
    }
}
