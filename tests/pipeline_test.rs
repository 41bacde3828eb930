//! 风格化流水线端到端测试：使用假推理引擎驱动完整编排。

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use tokio::sync::Notify;

use style_transfer::stylize::{
    AssetSink, BitmapResource, InferenceEngine, ModelState, Notifier, PerformanceProfile,
    RawPixelBuffer, ResourceRole, SkipReason, StylePipeline, StylizeConfig, StylizeError,
    StylizeOutcome,
};

fn create_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgba([(x % 255) as u8, (y % 255) as u8, ((x + y) % 255) as u8, 255])
    });

    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut cursor, ImageFormat::Png)
        .expect("failed to encode test image");
    cursor.into_inner()
}

/// 引擎调用记录，测试侧与引擎共享。
#[derive(Default)]
struct Probe {
    calls: AtomicUsize,
    seen: Mutex<Vec<((u32, u32), (u32, u32))>>,
    started: Notify,
    release: Notify,
}

struct FakeEngine {
    probe: Arc<Probe>,
    output: (u32, u32),
    gated: bool,
    init_error: Option<&'static str>,
    stylize_error: Option<&'static str>,
}

impl FakeEngine {
    fn new(probe: &Arc<Probe>) -> Self {
        Self {
            probe: Arc::clone(probe),
            output: (320, 240),
            gated: false,
            init_error: None,
            stylize_error: None,
        }
    }
}

impl InferenceEngine for FakeEngine {
    async fn initialize(&mut self) -> Result<(), StylizeError> {
        match self.init_error {
            Some(reason) => Err(StylizeError::Network(reason.to_string())),
            None => Ok(()),
        }
    }

    async fn stylize(
        &self,
        content: &BitmapResource,
        style: &BitmapResource,
    ) -> Result<RawPixelBuffer, StylizeError> {
        self.probe.calls.fetch_add(1, Ordering::SeqCst);
        self.probe
            .seen
            .lock()
            .expect("probe lock")
            .push((content.dimensions(), style.dimensions()));

        if self.gated {
            self.probe.started.notify_one();
            self.probe.release.notified().await;
        }

        if let Some(reason) = self.stylize_error {
            return Err(StylizeError::Inference(reason.to_string()));
        }

        let (width, height) = self.output;
        Ok(RawPixelBuffer {
            width,
            height,
            pixels: vec![200; (width * height * 4) as usize],
        })
    }
}

#[derive(Clone, Default)]
struct RecordingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    fn count(&self) -> usize {
        self.messages.lock().expect("notifier lock").len()
    }
}

impl Notifier for RecordingNotifier {
    fn alert(&self, message: &str) {
        self.messages
            .lock()
            .expect("notifier lock")
            .push(message.to_string());
    }
}

#[derive(Default)]
struct RecordingSink {
    saved: Mutex<Vec<(String, usize)>>,
}

impl AssetSink for RecordingSink {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<(), StylizeError> {
        self.saved
            .lock()
            .expect("sink lock")
            .push((file_name.to_string(), bytes.len()));
        Ok(())
    }
}

type TestPipeline = StylePipeline<FakeEngine, RecordingNotifier>;

async fn pipeline_with(
    config: StylizeConfig,
    engine: FakeEngine,
) -> (Arc<TestPipeline>, RecordingNotifier) {
    let notifier = RecordingNotifier::default();
    let pipeline: TestPipeline =
        StylePipeline::with_config(config, notifier.clone()).expect("valid config");
    let state = pipeline.load_model(|| async move { Ok(engine) }).await;
    assert_eq!(state, ModelState::Ready);
    (Arc::new(pipeline), notifier)
}

#[tokio::test]
async fn result_takes_engine_output_dimensions() {
    let probe = Arc::new(Probe::default());
    let (pipeline, _) = pipeline_with(StylizeConfig::default(), FakeEngine::new(&probe)).await;

    pipeline.ingest_content(create_png_bytes(640, 480)).expect("content");
    pipeline.ingest_style(create_png_bytes(256, 256)).expect("style");

    let outcome = pipeline.apply_style().await;
    assert_eq!(outcome, StylizeOutcome::Completed { width: 320, height: 240 });

    let result = pipeline.snapshot().result.expect("result stored");
    assert_eq!((result.width, result.height), (320, 240));
    assert_eq!(result.file_name, "stylized.png");
    assert!(pipeline.result_data_url().is_some_and(|url| url.starts_with("data:image/png;base64,")));
}

#[tokio::test]
async fn large_content_is_scaled_but_style_is_not() {
    let probe = Arc::new(Probe::default());
    let (pipeline, _) = pipeline_with(StylizeConfig::default(), FakeEngine::new(&probe)).await;

    pipeline.ingest_content(create_png_bytes(2000, 500)).expect("content");
    pipeline.ingest_style(create_png_bytes(512, 512)).expect("style");

    let outcome = pipeline.apply_style().await;
    assert!(matches!(outcome, StylizeOutcome::Completed { .. }));

    let seen = probe.seen.lock().expect("probe lock").clone();
    assert_eq!(seen, vec![((900, 225), (512, 512))]);
    assert_eq!(pipeline.registry().live_count(ResourceRole::Scaled), 0);
}

#[tokio::test]
async fn concurrent_apply_runs_inference_once() {
    let probe = Arc::new(Probe::default());
    let engine = FakeEngine {
        gated: true,
        ..FakeEngine::new(&probe)
    };
    let (pipeline, _) = pipeline_with(StylizeConfig::default(), engine).await;

    pipeline.ingest_content(create_png_bytes(64, 64)).expect("content");
    pipeline.ingest_style(create_png_bytes(64, 64)).expect("style");

    let first = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move { pipeline.apply_style().await })
    };
    probe.started.notified().await;
    assert!(pipeline.is_processing());

    let second = pipeline.apply_style().await;
    assert_eq!(second, StylizeOutcome::Skipped { reason: SkipReason::Busy });

    probe.release.notify_one();
    let first = first.await.expect("task should finish");
    assert!(matches!(first, StylizeOutcome::Completed { .. }));
    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    assert!(!pipeline.is_processing());
}

#[tokio::test]
async fn replacing_an_input_clears_the_result() {
    let probe = Arc::new(Probe::default());
    let (pipeline, _) = pipeline_with(StylizeConfig::default(), FakeEngine::new(&probe)).await;

    pipeline.ingest_content(create_png_bytes(64, 64)).expect("content");
    pipeline.ingest_style(create_png_bytes(64, 64)).expect("style");
    pipeline.apply_style().await;
    assert!(pipeline.snapshot().result.is_some());

    pipeline.ingest_style(create_png_bytes(32, 32)).expect("new style");

    assert!(pipeline.snapshot().result.is_none());
    assert_eq!(pipeline.registry().live_count(ResourceRole::Result), 0);
}

#[tokio::test]
async fn failed_model_load_makes_apply_a_no_op() {
    let probe = Arc::new(Probe::default());
    let engine = FakeEngine {
        init_error: Some("weights unreachable"),
        ..FakeEngine::new(&probe)
    };
    let notifier = RecordingNotifier::default();
    let pipeline: TestPipeline =
        StylePipeline::with_config(StylizeConfig::default(), notifier.clone()).expect("valid config");

    let state = pipeline.load_model(|| async move { Ok(engine) }).await;
    assert_eq!(state, ModelState::Failed);
    assert_eq!(notifier.count(), 1);

    pipeline.ingest_content(create_png_bytes(64, 64)).expect("content");
    pipeline.ingest_style(create_png_bytes(64, 64)).expect("style");

    let outcome = pipeline.apply_style().await;
    assert_eq!(outcome, StylizeOutcome::Skipped { reason: SkipReason::ModelNotReady });
    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    assert_eq!(pipeline.model_state(), ModelState::Failed);

    let retry = pipeline
        .load_model(|| async { Ok(FakeEngine::new(&Arc::new(Probe::default()))) })
        .await;
    assert_eq!(retry, ModelState::Failed);
}

#[tokio::test]
async fn apply_is_skipped_until_both_inputs_exist() {
    let probe = Arc::new(Probe::default());
    let (pipeline, _) = pipeline_with(StylizeConfig::default(), FakeEngine::new(&probe)).await;

    assert_eq!(
        pipeline.apply_style().await,
        StylizeOutcome::Skipped { reason: SkipReason::MissingContent }
    );

    assert!(!pipeline.ingest_content(Vec::new()).expect("empty upload is ignored"));
    pipeline.ingest_content(create_png_bytes(16, 16)).expect("content");
    assert_eq!(
        pipeline.apply_style().await,
        StylizeOutcome::Skipped { reason: SkipReason::MissingStyle }
    );
    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn download_without_result_does_not_touch_sink() {
    let probe = Arc::new(Probe::default());
    let (pipeline, _) = pipeline_with(StylizeConfig::default(), FakeEngine::new(&probe)).await;
    let sink = RecordingSink::default();

    assert!(!pipeline.download(&sink).expect("download"));
    assert!(sink.saved.lock().expect("sink lock").is_empty());

    pipeline.ingest_content(create_png_bytes(64, 64)).expect("content");
    pipeline.ingest_style(create_png_bytes(64, 64)).expect("style");
    pipeline.apply_style().await;

    assert!(pipeline.download(&sink).expect("download"));
    let saved = sink.saved.lock().expect("sink lock").clone();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].0, "stylized.png");
    assert!(saved[0].1 > 0);
}

#[tokio::test]
async fn engine_error_is_reported_and_alerted() {
    let probe = Arc::new(Probe::default());
    let engine = FakeEngine {
        stylize_error: Some("out of memory"),
        ..FakeEngine::new(&probe)
    };
    let (pipeline, notifier) = pipeline_with(StylizeConfig::default(), engine).await;

    pipeline.ingest_content(create_png_bytes(64, 64)).expect("content");
    pipeline.ingest_style(create_png_bytes(64, 64)).expect("style");

    let outcome = pipeline.apply_style().await;
    assert!(matches!(outcome, StylizeOutcome::Failed { code: "inference", .. }));
    assert_eq!(notifier.count(), 1);
    assert!(pipeline.snapshot().result.is_none());
    assert!(!pipeline.is_processing());
    assert_eq!(pipeline.snapshot().last_outcome, Some(outcome));
}

#[tokio::test]
async fn repeated_uploads_keep_one_live_handle_per_role() {
    let probe = Arc::new(Probe::default());
    let (pipeline, _) = pipeline_with(StylizeConfig::default(), FakeEngine::new(&probe)).await;

    for size in [32, 48, 64] {
        pipeline.ingest_content(create_png_bytes(size, size)).expect("content");
        pipeline.ingest_style(create_png_bytes(size, size)).expect("style");
        pipeline.apply_style().await;
        pipeline.apply_style().await;
    }

    let registry = pipeline.registry();
    assert_eq!(registry.live_count(ResourceRole::Content), 1);
    assert_eq!(registry.live_count(ResourceRole::Style), 1);
    assert_eq!(registry.live_count(ResourceRole::Result), 1);
    assert_eq!(registry.live_count(ResourceRole::Scaled), 0);

    pipeline.reset();
    assert_eq!(registry.live_count(ResourceRole::Content), 0);
    assert_eq!(registry.live_count(ResourceRole::Style), 0);
    assert_eq!(registry.live_count(ResourceRole::Result), 0);
}

#[tokio::test]
async fn undecodable_content_fails_at_apply_time() {
    let probe = Arc::new(Probe::default());
    let (pipeline, notifier) = pipeline_with(StylizeConfig::default(), FakeEngine::new(&probe)).await;

    assert!(pipeline.ingest_content(b"definitely not an image".to_vec()).expect("accepted"));
    pipeline.ingest_style(create_png_bytes(64, 64)).expect("style");

    let outcome = pipeline.apply_style().await;
    assert!(matches!(outcome, StylizeOutcome::Failed { code: "decode", .. }));
    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    assert_eq!(notifier.count(), 1);
}

#[tokio::test]
async fn slow_inference_times_out() {
    let probe = Arc::new(Probe::default());
    let engine = FakeEngine {
        gated: true,
        ..FakeEngine::new(&probe)
    };
    let config = StylizeConfig {
        inference_timeout_ms: Some(50),
        ..StylizeConfig::default()
    };
    let (pipeline, _) = pipeline_with(config, engine).await;

    pipeline.ingest_content(create_png_bytes(64, 64)).expect("content");
    pipeline.ingest_style(create_png_bytes(64, 64)).expect("style");

    let outcome = tokio::time::timeout(Duration::from_secs(5), pipeline.apply_style())
        .await
        .expect("timeout must end the run");
    assert!(matches!(outcome, StylizeOutcome::Failed { code: "timeout", .. }));
    assert!(!pipeline.is_processing());
}

#[tokio::test]
async fn result_is_discarded_when_input_changes_mid_run() {
    let probe = Arc::new(Probe::default());
    let engine = FakeEngine {
        gated: true,
        ..FakeEngine::new(&probe)
    };
    let (pipeline, _) = pipeline_with(StylizeConfig::default(), engine).await;

    pipeline.ingest_content(create_png_bytes(64, 64)).expect("content");
    pipeline.ingest_style(create_png_bytes(64, 64)).expect("style");

    let run = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move { pipeline.apply_style().await })
    };
    probe.started.notified().await;

    pipeline.ingest_content(create_png_bytes(128, 96)).expect("replacement");
    probe.release.notify_one();

    let outcome = run.await.expect("task should finish");
    assert_eq!(outcome, StylizeOutcome::Discarded);

    let snapshot = pipeline.snapshot();
    assert!(snapshot.result.is_none());
    assert_eq!(pipeline.registry().live_count(ResourceRole::Result), 0);
}

#[tokio::test]
async fn subscribers_observe_model_and_result_updates() {
    let probe = Arc::new(Probe::default());
    let notifier = RecordingNotifier::default();
    let pipeline: TestPipeline =
        StylePipeline::with_config(StylizeConfig::default(), notifier).expect("valid config");
    let mut updates = pipeline.subscribe();
    assert_eq!(updates.borrow_and_update().model_state, ModelState::Loading);

    let engine = FakeEngine::new(&probe);
    pipeline.load_model(|| async move { Ok(engine) }).await;
    assert!(updates.has_changed().expect("sender alive"));
    assert_eq!(updates.borrow_and_update().model_state, ModelState::Ready);

    pipeline.ingest_content(create_png_bytes(64, 64)).expect("content");
    pipeline.ingest_style(create_png_bytes(64, 64)).expect("style");
    pipeline.apply_style().await;

    let latest = updates.borrow_and_update().clone();
    assert!(!latest.processing);
    assert!(latest.result.is_some());
}

#[tokio::test]
async fn profile_switch_applies_to_the_next_run() {
    let probe = Arc::new(Probe::default());
    let (pipeline, _) = pipeline_with(StylizeConfig::default(), FakeEngine::new(&probe)).await;
    assert_eq!(pipeline.performance_profile(), PerformanceProfile::Balanced);

    pipeline.ingest_content(create_png_bytes(2000, 500)).expect("content");
    pipeline.ingest_style(create_png_bytes(64, 64)).expect("style");
    pipeline.apply_style().await;

    pipeline.set_performance_profile(PerformanceProfile::Speed);
    assert_eq!(pipeline.performance_profile(), PerformanceProfile::Speed);
    pipeline.apply_style().await;

    let content_dims: Vec<_> = probe
        .seen
        .lock()
        .expect("probe lock")
        .iter()
        .map(|(content, _)| *content)
        .collect();
    assert_eq!(content_dims, vec![(900, 225), (512, 128)]);
}

#[tokio::test]
async fn invalid_config_update_is_rejected() {
    let probe = Arc::new(Probe::default());
    let (pipeline, _) = pipeline_with(StylizeConfig::default(), FakeEngine::new(&probe)).await;

    let invalid = StylizeConfig {
        max_dimension: 8,
        ..StylizeConfig::default()
    };
    assert!(matches!(pipeline.update_config(invalid), Err(StylizeError::InvalidFormat(_))));
    assert_eq!(pipeline.config_snapshot().max_dimension, 900);

    let smaller = StylizeConfig {
        max_dimension: 256,
        ..StylizeConfig::default()
    };
    pipeline.update_config(smaller).expect("valid config");

    pipeline.ingest_content(create_png_bytes(1024, 512)).expect("content");
    pipeline.ingest_style(create_png_bytes(64, 64)).expect("style");
    pipeline.apply_style().await;

    let seen = probe.seen.lock().expect("probe lock").clone();
    assert_eq!(seen, vec![((256, 128), (64, 64))]);
}

#[tokio::test]
async fn reingesting_keeps_a_single_live_content_handle() {
    let probe = Arc::new(Probe::default());
    let (pipeline, _) = pipeline_with(StylizeConfig::default(), FakeEngine::new(&probe)).await;
    let mut updates = pipeline.subscribe();

    for size in [16, 24, 32] {
        pipeline.ingest_content(create_png_bytes(size, size)).expect("content");
        assert_eq!(pipeline.registry().live_count(ResourceRole::Content), 1);
        assert!(updates.has_changed().expect("sender alive"));
        updates.mark_unchanged();
    }
}
