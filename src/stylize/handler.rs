//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `StylePipeline` 持有唯一的 `PipelineState`，对外只暴露显式命令：
//! `ingest_content` / `ingest_style` / `apply_style` / `download`。
//! 处理链路固定为：
//! 1. 入口守卫（模型就绪、两张图齐全、未在处理中）
//! 2. 等待两张图解码完成
//! 3. 内容图按长边上限缩放（风格图保持原分辨率）
//! 4. 单次调用推理引擎
//! 5. 编码为 PNG 并写入状态
//!
//! ## 实现思路
//!
//! - `processing` 用 `AtomicBool::compare_exchange` 实现单飞：并发触发直接跳过，不排队。
//! - 配置通过 `RwLock<StylizeConfig>` 支持运行时切档，单次编排使用同一配置快照。
//! - 状态锁只在同步片段内持有，绝不跨 `.await`。
//! - 每次状态变化后通过 `watch` 发布快照，展示层订阅即可。
//! - 记录 `wait/resize/infer/encode/total` 阶段耗时，便于性能诊断。

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::watch;

use super::bitmap::{BitmapResource, ReadyState, ResourceRegistry};
use super::exporter::{AssetSink, EncodedImage, encode_png};
use super::intake;
use super::notify::{LogNotifier, Notifier};
use super::resizer;
use super::source::{RawImageData, ResourceRole};
use super::state::{ModelState, PipelineSnapshot, PipelineState, SkipReason, StylizeOutcome};
use super::{InferenceEngine, PerformanceProfile, StylizeConfig, StylizeError};

/// 风格化流水线。
pub struct StylePipeline<E, N = LogNotifier> {
    pub(super) config: RwLock<StylizeConfig>,
    pub(super) registry: Arc<ResourceRegistry>,
    pub(super) state: Mutex<PipelineState>,
    pub(super) processing: AtomicBool,
    pub(super) load_started: AtomicBool,
    pub(super) engine: OnceLock<E>,
    pub(super) notifier: N,
    updates: watch::Sender<PipelineSnapshot>,
}

/// 离开作用域时复位 `processing`，覆盖正常返回与 future 被丢弃两种情况。
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<E: InferenceEngine> StylePipeline<E, LogNotifier> {
    /// 使用默认配置与日志通知创建流水线。
    pub fn new() -> Result<Self, StylizeError> {
        Self::with_config(StylizeConfig::default(), LogNotifier)
    }
}

impl<E: InferenceEngine, N: Notifier> StylePipeline<E, N> {
    /// 使用自定义配置与通知通道创建流水线。
    ///
    /// # 示例
    /// ```rust,ignore
    /// use style_transfer::stylize::{ConsoleNotifier, StylePipeline, StylizeConfig};
    ///
    /// let pipeline = StylePipeline::<MyEngine, _>::with_config(StylizeConfig::default(), ConsoleNotifier)?;
    /// # Ok::<(), style_transfer::stylize::StylizeError>(())
    /// ```
    pub fn with_config(config: StylizeConfig, notifier: N) -> Result<Self, StylizeError> {
        config.validate()?;

        let state = PipelineState::default();
        let (updates, _) = watch::channel(state.snapshot(false));

        Ok(Self {
            config: RwLock::new(config),
            registry: ResourceRegistry::new(),
            state: Mutex::new(state),
            processing: AtomicBool::new(false),
            load_started: AtomicBool::new(false),
            engine: OnceLock::new(),
            notifier,
            updates,
        })
    }

    pub(super) fn lock_state(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 获取配置快照，保证单次编排使用一致参数。
    pub fn config_snapshot(&self) -> StylizeConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 整体替换配置。
    pub fn update_config(&self, config: StylizeConfig) -> Result<(), StylizeError> {
        config.validate()?;
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
        Ok(())
    }

    /// 设置性能档位。
    pub fn set_performance_profile(&self, profile: PerformanceProfile) {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        config.apply_performance_profile(profile);

        log::info!(
            "⚙️ 已切换性能档位：{:?}（max_dim={}, filter={:?}）",
            profile,
            config.max_dimension,
            config.resize_filter
        );
    }

    /// 获取当前生效档位。
    pub fn performance_profile(&self) -> PerformanceProfile {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .infer_performance_profile()
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        self.lock_state().snapshot(self.is_processing())
    }

    /// 订阅状态快照变化。
    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.updates.subscribe()
    }

    pub(super) fn publish(&self) {
        let snapshot = self.snapshot();
        self.updates.send_replace(snapshot);
    }

    /// 接收某个角色的图片字节；返回 `false` 表示未提供内容、调用被忽略。
    pub fn ingest(&self, role: ResourceRole, raw: RawImageData) -> Result<bool, StylizeError> {
        if !matches!(role, ResourceRole::Content | ResourceRole::Style) {
            return Err(StylizeError::Internal(format!(
                "只能接收内容图或风格图：{}",
                role.as_str()
            )));
        }

        let config = self.config_snapshot();
        let Some(decode) = intake::prepare_decode(role, raw, &config)? else {
            return Ok(false);
        };

        let invalidated = self
            .lock_state()
            .replace_input(&self.registry, role, || decode.start(&self.registry));
        if invalidated {
            log::info!("♻️ {} 已替换，旧结果作废", role.as_str());
        }

        self.publish();
        Ok(true)
    }

    pub fn ingest_content(&self, bytes: Vec<u8>) -> Result<bool, StylizeError> {
        self.ingest(
            ResourceRole::Content,
            RawImageData {
                bytes,
                source_hint: "upload",
            },
        )
    }

    pub fn ingest_style(&self, bytes: Vec<u8>) -> Result<bool, StylizeError> {
        self.ingest(
            ResourceRole::Style,
            RawImageData {
                bytes,
                source_hint: "upload",
            },
        )
    }

    /// 从本地文件接收图片。
    pub fn ingest_file(&self, role: ResourceRole, path: &Path) -> Result<bool, StylizeError> {
        let raw = intake::load_from_file(path, &self.config_snapshot())?;
        self.ingest(role, raw)
    }

    /// 从 Base64 / Data URL 接收图片。
    pub fn ingest_base64(&self, role: ResourceRole, data: &str) -> Result<bool, StylizeError> {
        let raw = intake::load_from_base64(data, &self.config_snapshot())?;
        self.ingest(role, raw)
    }

    /// 释放所有输入与结果。
    pub fn reset(&self) {
        self.lock_state().reset(&self.registry);
        self.publish();
    }

    /// 执行一次风格化。
    ///
    /// 入口守卫不通过时返回 `Skipped`，不改变任何状态；处理中再次触发同样直接跳过。
    pub async fn apply_style(&self) -> StylizeOutcome {
        let (content, style, generation) = {
            let state = self.lock_state();
            if state.model_state != ModelState::Ready {
                return Self::skipped(SkipReason::ModelNotReady);
            }
            let Some(content) = state.content.clone() else {
                return Self::skipped(SkipReason::MissingContent);
            };
            let Some(style) = state.style.clone() else {
                return Self::skipped(SkipReason::MissingStyle);
            };
            (content, style, state.generation)
        };

        if self
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Self::skipped(SkipReason::Busy);
        }
        let guard = ProcessingGuard(&self.processing);
        self.publish();

        let config = self.config_snapshot();
        let outcome = match self.run_stylization(&content, &style, &config).await {
            Ok(encoded) => {
                let mut state = self.lock_state();
                if state.generation != generation {
                    log::warn!("⚠️ 处理期间输入已被替换，丢弃本次结果");
                    StylizeOutcome::Discarded
                } else {
                    let (width, height) = (encoded.width, encoded.height);
                    state.store_result(&self.registry, encoded, &config.result_file_name);
                    StylizeOutcome::Completed { width, height }
                }
            }
            Err(err) => {
                log::error!("❌ 风格化失败 [{}/{}]：{}", err.stage(), err.code(), err);
                self.notifier.alert("风格化失败，请查看日志了解详情。");
                StylizeOutcome::Failed {
                    code: err.code(),
                    message: err.to_string(),
                }
            }
        };

        self.lock_state().last_outcome = Some(outcome.clone());
        drop(guard);
        self.publish();
        outcome
    }

    fn skipped(reason: SkipReason) -> StylizeOutcome {
        log::debug!("⏭️ 跳过风格化：{:?}", reason);
        StylizeOutcome::Skipped { reason }
    }

    async fn run_stylization(
        &self,
        content: &BitmapResource,
        style: &BitmapResource,
        config: &StylizeConfig,
    ) -> Result<EncodedImage, StylizeError> {
        let total_start = Instant::now();

        let wait_start = Instant::now();
        tokio::join!(content.wait_ready(), style.wait_ready());
        ensure_usable("内容图", content)?;
        ensure_usable("风格图", style)?;
        let wait_elapsed = wait_start.elapsed();

        let resize_start = Instant::now();
        let scaled =
            resizer::resize(&self.registry, content, config.max_dimension, config.resize_filter)
                .await?;
        let resize_elapsed = resize_start.elapsed();

        let engine = self
            .engine
            .get()
            .ok_or_else(|| StylizeError::Internal("模型状态为就绪但引擎不存在".to_string()))?;

        log::info!(
            "🎨 开始推理 - content={}x{} style={}x{}",
            scaled.width(),
            scaled.height(),
            style.width(),
            style.height()
        );

        let infer_start = Instant::now();
        let raw = match config.inference_timeout_ms {
            Some(timeout_ms) => {
                tokio::time::timeout(
                    Duration::from_millis(timeout_ms),
                    engine.stylize(&scaled, style),
                )
                .await
                .map_err(|_| StylizeError::Timeout(format!("推理超过 {}ms 未完成", timeout_ms)))??
            }
            None => engine.stylize(&scaled, style).await?,
        };
        let infer_elapsed = infer_start.elapsed();
        drop(scaled);

        let encode_start = Instant::now();
        let encoded = tokio::task::spawn_blocking(move || encode_png(raw))
            .await
            .map_err(|e| StylizeError::Internal(format!("编码任务异常退出：{}", e)))??;
        let encode_elapsed = encode_start.elapsed();

        log::info!(
            "✅ 风格化完成 - {}x{} wait={}ms resize={}ms infer={}ms encode={}ms total={}ms",
            encoded.width,
            encoded.height,
            wait_elapsed.as_millis(),
            resize_elapsed.as_millis(),
            infer_elapsed.as_millis(),
            encode_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(encoded)
    }

    /// 导出最近一次成功的结果；没有结果时不调用 `sink`，返回 `false`。
    pub fn download(&self, sink: &dyn AssetSink) -> Result<bool, StylizeError> {
        let Some((file_name, bytes)) = self
            .lock_state()
            .result
            .as_ref()
            .map(|asset| (asset.suggested_file_name().to_string(), asset.encoded().clone()))
        else {
            log::debug!("📭 没有可导出的结果");
            return Ok(false);
        };

        sink.save(&file_name, &bytes)?;
        Ok(true)
    }

    /// 当前结果的 Data URL，用于预览。
    pub fn result_data_url(&self) -> Option<String> {
        self.lock_state().result.as_ref().map(|asset| asset.data_url())
    }
}

/// 解码失败或零尺寸输入在这里才真正报错。
fn ensure_usable(label: &str, bitmap: &BitmapResource) -> Result<(), StylizeError> {
    if bitmap.ready_state() == ReadyState::Failed {
        let reason = bitmap.failure().unwrap_or_default();
        return Err(StylizeError::Decode(format!("{}无法解码：{}", label, reason)));
    }

    let (width, height) = bitmap.dimensions();
    if width == 0 || height == 0 {
        return Err(StylizeError::Decode(format!("{}尺寸为零：{}x{}", label, width, height)));
    }

    Ok(())
}
