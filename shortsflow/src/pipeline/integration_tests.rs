//! End-to-end tests of the orchestrator over scripted providers.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::MockResultCache;
use crate::capabilities::{Provider, Publishing, ScriptWriting, TopicDiscovery, VoiceSynthesis};
use crate::config::{PipelineConfig, ProviderConfig, StageConfig};
use crate::core::{AttemptStatus, RunStatus, StageKind, StageStatus};
use crate::errors::{CacheError, ErrorKind, ProviderError};
use crate::events::{CollectingEventSink, PIPELINE_FINISHED, PIPELINE_STARTED, PROVIDER_SKIPPED};
use crate::pipeline::{Pipeline, PipelineBuilder, RunInput, RunReport, SharedState};
use crate::providers::{JitterStrategy, RateQuota, RetryConfig};
use crate::testing::{fixtures, FixtureProviders, ScriptedProvider};

fn fast_config() -> PipelineConfig {
    PipelineConfig::default().with_retry(
        RetryConfig::new()
            .with_max_attempts(3)
            .with_base_delay_ms(10)
            .with_jitter(JitterStrategy::None),
    )
}

fn pipeline(config: PipelineConfig, shared: SharedState, providers: &FixtureProviders) -> Pipeline {
    providers
        .install(PipelineBuilder::new(config, shared))
        .build()
        .unwrap()
}

fn statuses(report: &RunReport) -> Vec<(StageKind, StageStatus)> {
    report.stages().iter().map(|r| (r.name, r.status)).collect()
}

#[tokio::test(start_paused = true)]
async fn test_healthy_run_finishes_every_stage() {
    let providers = FixtureProviders::healthy();
    let events = Arc::new(CollectingEventSink::new());
    let pipeline = providers
        .install(PipelineBuilder::new(fast_config(), SharedState::in_memory()))
        .with_event_sink(events.clone())
        .build()
        .unwrap();

    let report = pipeline.run(&RunInput::default()).await;

    assert_eq!(report.status(), RunStatus::Finished);
    let executed: Vec<StageKind> = report.stages().iter().map(|r| r.name).collect();
    assert_eq!(executed, StageKind::ALL.to_vec());
    assert!(report.stages().iter().all(|r| r.status == StageStatus::Success && !r.cached));
    assert!(report.skipped().is_empty());
    assert!(report.failure_reason().is_none());
    assert_eq!(
        report.artifact_ref(StageKind::Publish),
        Some("https://youtube.com/shorts/abc123XYZ")
    );
    assert_eq!(providers.total_calls(), 7);

    let types = events.event_types();
    assert_eq!(types.first().map(String::as_str), Some(PIPELINE_STARTED));
    assert_eq!(types.last().map(String::as_str), Some(PIPELINE_FINISHED));
    assert_eq!(events.events_of_type("stage.started").len(), 7);
    assert_eq!(events.events_of_type("stage.completed").len(), 7);
}

#[tokio::test(start_paused = true)]
async fn test_fallback_order_is_reported() {
    let config = fast_config()
        .with_provider("a", ProviderConfig::with_priority(1))
        .with_provider("b", ProviderConfig::with_priority(2))
        .with_provider("c", ProviderConfig::with_priority(3));
    let providers = FixtureProviders::healthy();
    let a = Arc::new(ScriptedProvider::<ScriptWriting>::always_err(
        "a",
        ProviderError::permanent("invalid api key"),
    ));
    let b = Arc::new(ScriptedProvider::<ScriptWriting>::always_err(
        "b",
        ProviderError::transient("503 service unavailable"),
    ));
    let c = Arc::new(ScriptedProvider::<ScriptWriting>::always_ok("c", fixtures::script()));

    // Registered out of priority order on purpose.
    let pipeline = PipelineBuilder::new(config, SharedState::in_memory())
        .topic_source(providers.topics.clone())
        .script_writer(c.clone())
        .script_writer(a.clone())
        .script_writer(b.clone())
        .voice_synthesizer(providers.voice.clone())
        .visual_source(providers.visuals.clone())
        .assembler(providers.assembler.clone())
        .metadata_generator(providers.metadata.clone())
        .publisher(providers.publisher.clone())
        .build()
        .unwrap();

    let report = pipeline.run(&RunInput::default()).await;
    let script = report.stage(StageKind::Script).unwrap();

    assert_eq!(report.status(), RunStatus::Finished);
    assert_eq!(script.provider_used.as_deref(), Some("c"));
    let attempted: Vec<&str> = script.attempts.iter().map(|a| a.provider.as_str()).collect();
    assert_eq!(attempted, vec!["a", "b", "c"]);
    assert_eq!(script.attempts[0].error_kind, Some(ErrorKind::Permanent));
    assert_eq!(script.attempts[1].error_kind, Some(ErrorKind::Transient));
    assert_eq!((a.calls(), b.calls(), c.calls()), (1, 3, 1));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_provider_is_skipped() {
    let config = fast_config()
        .with_provider(
            "tts-premium",
            ProviderConfig::with_priority(1).with_rate_limit(RateQuota::new(1, 3600)),
        )
        .with_provider("tts", ProviderConfig::with_priority(2));
    let providers = FixtureProviders::healthy();
    let premium = Arc::new(ScriptedProvider::<VoiceSynthesis>::always_ok(
        "tts-premium",
        fixtures::voiceover(),
    ));
    let events = Arc::new(CollectingEventSink::new());
    let shared = SharedState::in_memory();
    let pipeline = providers
        .install(PipelineBuilder::new(config, shared.clone()))
        .voice_synthesizer(premium.clone())
        .with_event_sink(events.clone())
        .build()
        .unwrap();

    // Another run already spent the premium quota.
    assert!(shared.rate_limiter.try_acquire("tts-premium"));

    let report = pipeline.run(&RunInput::default()).await;
    let voice = report.stage(StageKind::Voice).unwrap();

    assert_eq!(voice.status, StageStatus::Success);
    assert_eq!(voice.provider_used.as_deref(), Some("tts"));
    assert_eq!(voice.attempts[0].status, AttemptStatus::RateLimited);
    assert_eq!(voice.attempts[0].calls, 0);
    assert_eq!(premium.calls(), 0);
    assert_eq!(providers.voice.calls(), 1);

    let skipped = events.events_of_type(PROVIDER_SKIPPED);
    assert_eq!(skipped.len(), 1);
    assert_eq!(
        skipped[0].1.as_ref().and_then(|d| d["provider"].as_str()),
        Some("tts-premium")
    );
}

#[tokio::test(start_paused = true)]
async fn test_merged_topic_sources_spend_their_own_quota() {
    let config = fast_config()
        .with_stage(
            StageKind::Topics,
            StageConfig::defaults_for(StageKind::Topics).with_cache_ttl(None),
        )
        .with_provider("merged", ProviderConfig::with_priority(1))
        .with_provider(
            "reddit",
            ProviderConfig::with_priority(1).with_rate_limit(RateQuota::new(1, 3600)),
        );
    let providers = FixtureProviders::healthy();
    let reddit = Arc::new(ScriptedProvider::<TopicDiscovery>::always_ok(
        "reddit",
        fixtures::topic_list(),
    ));
    let news = Arc::new(ScriptedProvider::<TopicDiscovery>::always_ok(
        "news",
        fixtures::topic_list(),
    ));
    let shared = SharedState::in_memory();
    let pipeline = providers
        .install(PipelineBuilder::new(config, shared.clone()))
        .merged_topic_sources(
            "merged",
            vec![
                reddit.clone() as Arc<dyn Provider<TopicDiscovery>>,
                news.clone() as Arc<dyn Provider<TopicDiscovery>>,
            ],
        )
        .build()
        .unwrap();

    for _ in 0..3 {
        let report = pipeline.run(&RunInput::dry_run()).await;
        assert_eq!(report.status(), RunStatus::Finished);
        assert_eq!(
            report.stage(StageKind::Topics).and_then(|r| r.provider_used.as_deref()),
            Some("merged")
        );
    }

    assert_eq!(reddit.calls(), 1);
    assert_eq!(news.calls(), 3);
    assert_eq!(shared.rate_limiter.state("reddit").map(|s| s.remaining), Some(0));
    assert_eq!(providers.topics.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_optional_stage_degrades_and_run_continues() {
    let providers = FixtureProviders::healthy();
    let broken_voice = Arc::new(ScriptedProvider::<VoiceSynthesis>::always_err(
        "tts-broken",
        ProviderError::permanent("voice not found"),
    ));
    let pipeline = PipelineBuilder::new(fast_config(), SharedState::in_memory())
        .topic_source(providers.topics.clone())
        .script_writer(providers.script.clone())
        .voice_synthesizer(broken_voice)
        .visual_source(providers.visuals.clone())
        .assembler(providers.assembler.clone())
        .metadata_generator(providers.metadata.clone())
        .publisher(providers.publisher.clone())
        .build()
        .unwrap();

    let report = pipeline.run(&RunInput::default()).await;

    assert_eq!(report.status(), RunStatus::Finished);
    let voice = report.stage(StageKind::Voice).unwrap();
    assert_eq!(voice.status, StageStatus::Degraded);
    assert!(voice.artifact_ref.as_deref().unwrap_or("").starts_with("silence://"));
    assert!(voice
        .failure_reason
        .as_deref()
        .unwrap_or("")
        .contains("tts-broken: voice not found"));
    assert_eq!(
        report.stage(StageKind::Assemble).map(|r| r.status),
        Some(StageStatus::Success)
    );
    assert_eq!(providers.assembler.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_optional_stage_without_providers_degrades() {
    let providers = FixtureProviders::healthy();
    let pipeline = PipelineBuilder::new(fast_config(), SharedState::in_memory())
        .topic_source(providers.topics.clone())
        .script_writer(providers.script.clone())
        .voice_synthesizer(providers.voice.clone())
        .visual_source(providers.visuals.clone())
        .assembler(providers.assembler.clone())
        .publisher(providers.publisher.clone())
        .build()
        .unwrap();

    let report = pipeline.run(&RunInput::default()).await;
    let metadata = report.stage(StageKind::Metadata).unwrap();

    assert_eq!(report.status(), RunStatus::Finished);
    assert_eq!(metadata.status, StageStatus::Degraded);
    assert_eq!(metadata.failure_reason.as_deref(), Some("no providers configured"));
    assert_eq!(metadata.error_kind, Some(ErrorKind::Exhausted));
    assert!(metadata.attempts.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_required_failure_aborts_run() {
    let providers = FixtureProviders::healthy();
    let broken_script = Arc::new(ScriptedProvider::<ScriptWriting>::always_err(
        "llm-broken",
        ProviderError::permanent("content policy violation"),
    ));
    let events = Arc::new(CollectingEventSink::new());
    let pipeline = PipelineBuilder::new(fast_config(), SharedState::in_memory())
        .topic_source(providers.topics.clone())
        .script_writer(broken_script)
        .voice_synthesizer(providers.voice.clone())
        .visual_source(providers.visuals.clone())
        .assembler(providers.assembler.clone())
        .metadata_generator(providers.metadata.clone())
        .publisher(providers.publisher.clone())
        .with_event_sink(events.clone())
        .build()
        .unwrap();

    let report = pipeline.run(&RunInput::default()).await;

    assert_eq!(report.status(), RunStatus::Aborted);
    assert_eq!(
        statuses(&report),
        vec![
            (StageKind::Topics, StageStatus::Success),
            (StageKind::Script, StageStatus::Failed),
        ]
    );
    assert_eq!(
        report.skipped(),
        &[
            StageKind::Voice,
            StageKind::Visuals,
            StageKind::Assemble,
            StageKind::Metadata,
            StageKind::Publish,
        ]
    );
    assert!(report
        .failure_reason()
        .unwrap_or("")
        .contains("stage 'script' failed"));
    assert_eq!(providers.voice.calls(), 0);
    assert_eq!(providers.publisher.calls(), 0);
    assert_eq!(events.events_of_type("stage.failed").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_during_publish() {
    let config = fast_config().with_run_deadline(Duration::from_secs(5));
    let providers = FixtureProviders::healthy();
    let slow_upload = Arc::new(
        ScriptedProvider::<Publishing>::always_ok("slow-uploader", fixtures::publish_receipt())
            .with_delay(Duration::from_secs(600)),
    );
    let pipeline = PipelineBuilder::new(config, SharedState::in_memory())
        .topic_source(providers.topics.clone())
        .script_writer(providers.script.clone())
        .voice_synthesizer(providers.voice.clone())
        .visual_source(providers.visuals.clone())
        .assembler(providers.assembler.clone())
        .metadata_generator(providers.metadata.clone())
        .publisher(slow_upload.clone())
        .build()
        .unwrap();

    let report = pipeline.run(&RunInput::default()).await;

    assert_eq!(report.status(), RunStatus::DeadlineExceeded);
    assert_ne!(report.status(), RunStatus::Aborted);
    let publish = report.stage(StageKind::Publish).unwrap();
    assert_ne!(publish.status, StageStatus::Success);
    assert!(publish.provider_used.is_none());
    assert!(publish.artifact_ref.is_none());
    assert_eq!(publish.attempts[0].error_kind, Some(ErrorKind::Deadline));
    assert_eq!(publish.error_kind, Some(ErrorKind::Deadline));
    assert_eq!(slow_upload.calls(), 1);
    assert!(report
        .failure_reason()
        .unwrap_or("")
        .contains("during stage 'publish'"));
}

#[tokio::test(start_paused = true)]
async fn test_warm_cache_rerun_makes_no_calls() {
    let providers = FixtureProviders::healthy();
    let pipeline = pipeline(fast_config(), SharedState::in_memory(), &providers);

    let first = pipeline.run(&RunInput::default()).await;
    let calls_after_first = providers.total_calls();
    let second = pipeline.run(&RunInput::default()).await;

    assert_eq!(calls_after_first, 7);
    assert_eq!(providers.total_calls(), calls_after_first);
    assert_ne!(first.run_id(), second.run_id());
    assert_eq!(second.status(), RunStatus::Finished);
    assert!(second.stages().iter().all(|r| r.cached));

    let refs = |report: &RunReport| -> Vec<Option<String>> {
        report.stages().iter().map(|r| r.artifact_ref.clone()).collect()
    };
    assert_eq!(refs(&first), refs(&second));
    let producers: Vec<Option<String>> =
        second.stages().iter().map(|r| r.provider_used.clone()).collect();
    assert_eq!(producers[1].as_deref(), Some("llm"));
}

#[tokio::test(start_paused = true)]
async fn test_failing_cache_is_bypassed() {
    let mut cache = MockResultCache::new();
    cache
        .expect_get()
        .returning(|_| Err(CacheError::Unavailable("redis: connection refused".into())));
    cache
        .expect_put()
        .returning(|_| Err(CacheError::Unavailable("redis: connection refused".into())));
    let providers = FixtureProviders::healthy();
    let pipeline = pipeline(fast_config(), SharedState::new(Arc::new(cache)), &providers);

    let report = pipeline.run(&RunInput::default()).await;

    assert_eq!(report.status(), RunStatus::Finished);
    assert!(report.stages().iter().all(|r| !r.cached));
    assert_eq!(providers.total_calls(), 7);
}

#[tokio::test(start_paused = true)]
async fn test_dry_run_stops_before_publish() {
    let providers = FixtureProviders::healthy();
    let pipeline = pipeline(fast_config(), SharedState::in_memory(), &providers);

    let report = pipeline.run(&RunInput::dry_run()).await;

    assert_eq!(report.status(), RunStatus::Finished);
    assert!(report.dry_run());
    assert_eq!(report.stages().len(), 6);
    assert!(report.stage(StageKind::Publish).is_none());
    assert!(report.skipped().is_empty());
    assert_eq!(providers.publisher.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_optional_topics_fall_back_to_evergreen_titles() {
    let config = fast_config()
        .with_stage(StageKind::Topics, StageConfig::defaults_for(StageKind::Topics).with_required(false));
    let providers = FixtureProviders::healthy();
    let broken_trends = Arc::new(ScriptedProvider::<TopicDiscovery>::always_err(
        "trends-broken",
        ProviderError::permanent("quota exhausted"),
    ));
    let pipeline = PipelineBuilder::new(config, SharedState::in_memory())
        .topic_source(broken_trends)
        .script_writer(providers.script.clone())
        .voice_synthesizer(providers.voice.clone())
        .visual_source(providers.visuals.clone())
        .assembler(providers.assembler.clone())
        .metadata_generator(providers.metadata.clone())
        .publisher(providers.publisher.clone())
        .build()
        .unwrap();

    let report = pipeline.run(&RunInput::default()).await;

    assert_eq!(report.status(), RunStatus::Finished);
    assert_eq!(
        report.stage(StageKind::Topics).map(|r| r.status),
        Some(StageStatus::Degraded)
    );
    assert_eq!(providers.script.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_report_is_written_to_configured_dir() {
    let dir = tempfile::tempdir().unwrap();
    let providers = FixtureProviders::healthy();
    let pipeline = pipeline(
        fast_config().with_report_dir(dir.path()),
        SharedState::in_memory(),
        &providers,
    );

    let report = pipeline.run(&RunInput::dry_run()).await;

    let path = dir.path().join(format!("run_report_{}.json", report.run_id()));
    let raw = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(RunReport::from_json(&raw).unwrap(), report);
}
