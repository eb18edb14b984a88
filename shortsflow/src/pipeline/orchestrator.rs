//! The fixed stage sequence and the run state machine.

use chrono::Utc;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{RunContext, RunInput, RunReport, RunReportBuilder, SharedState, StageExecutor, StageRecord};
use crate::capabilities::{
    extract_keywords, select_topic, AssemblyRequest, Capability, MergedTopicSource,
    MetadataGeneration, MetadataRequest, Provider, PublishRequest, Publishing, ScriptRequest,
    ScriptWriting, TopicDiscovery, TopicsRequest, VideoAssembly, VisualRequest, VisualSearch,
    VoiceRequest, VoiceSynthesis,
};
use crate::config::PipelineConfig;
use crate::core::{AttemptStatus, ProviderAttempt, StageKind, StageResult};
use crate::errors::{DeadlineExceeded, PipelineError};
use crate::events::{
    EventSink, NoOpEventSink, PIPELINE_FINISHED, PIPELINE_STARTED, PROVIDER_SKIPPED,
    STAGE_COMPLETED, STAGE_DEGRADED, STAGE_FAILED, STAGE_STARTED,
};
use crate::providers::{FallbackChain, ProviderDescriptor, RetryPolicy};
use crate::runtime::RunDeadline;

/// Why a run stopped early.
enum Halt {
    Aborted(String),
    Deadline(DeadlineExceeded),
}

/// Assembles a [`Pipeline`] from configuration and providers.
///
/// Each provider's priority comes from the `providers` section of the
/// configuration, keyed by [`Provider::name`].
pub struct PipelineBuilder {
    config: PipelineConfig,
    shared: SharedState,
    events: Arc<dyn EventSink>,
    topics: FallbackChain<TopicDiscovery>,
    script: FallbackChain<ScriptWriting>,
    voice: FallbackChain<VoiceSynthesis>,
    visuals: FallbackChain<VisualSearch>,
    assemble: FallbackChain<VideoAssembly>,
    metadata: FallbackChain<MetadataGeneration>,
    publish: FallbackChain<Publishing>,
}

impl PipelineBuilder {
    /// Creates a builder with no providers.
    pub fn new(config: PipelineConfig, shared: SharedState) -> Self {
        Self {
            config,
            shared,
            events: Arc::new(NoOpEventSink),
            topics: FallbackChain::new(),
            script: FallbackChain::new(),
            voice: FallbackChain::new(),
            visuals: FallbackChain::new(),
            assemble: FallbackChain::new(),
            metadata: FallbackChain::new(),
            publish: FallbackChain::new(),
        }
    }

    /// Sets the sink that receives run events.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Adds a topic discovery provider.
    #[must_use]
    pub fn topic_source(mut self, provider: Arc<dyn Provider<TopicDiscovery>>) -> Self {
        add(&self.config, &mut self.topics, provider);
        self
    }

    /// Adds a provider that queries `sources` concurrently and merges their
    /// topics, bounded by the topics stage concurrency. Each source is gated
    /// by its own quota in the shared rate limiter.
    #[must_use]
    pub fn merged_topic_sources(
        self,
        name: impl Into<String>,
        sources: Vec<Arc<dyn Provider<TopicDiscovery>>>,
    ) -> Self {
        let concurrency = self.config.stage(StageKind::Topics).concurrency;
        let base = MergedTopicSource::new(name, concurrency)
            .with_rate_limiter(Arc::clone(&self.shared.rate_limiter));
        let merged = sources
            .into_iter()
            .fold(base, MergedTopicSource::with_source);
        self.topic_source(Arc::new(merged))
    }

    /// Adds a script writer.
    #[must_use]
    pub fn script_writer(mut self, provider: Arc<dyn Provider<ScriptWriting>>) -> Self {
        add(&self.config, &mut self.script, provider);
        self
    }

    /// Adds a voice synthesizer.
    #[must_use]
    pub fn voice_synthesizer(mut self, provider: Arc<dyn Provider<VoiceSynthesis>>) -> Self {
        add(&self.config, &mut self.voice, provider);
        self
    }

    /// Adds a visual source.
    #[must_use]
    pub fn visual_source(mut self, provider: Arc<dyn Provider<VisualSearch>>) -> Self {
        add(&self.config, &mut self.visuals, provider);
        self
    }

    /// Adds a video assembler.
    #[must_use]
    pub fn assembler(mut self, provider: Arc<dyn Provider<VideoAssembly>>) -> Self {
        add(&self.config, &mut self.assemble, provider);
        self
    }

    /// Adds a metadata generator.
    #[must_use]
    pub fn metadata_generator(mut self, provider: Arc<dyn Provider<MetadataGeneration>>) -> Self {
        add(&self.config, &mut self.metadata, provider);
        self
    }

    /// Adds a publisher.
    #[must_use]
    pub fn publisher(mut self, provider: Arc<dyn Provider<Publishing>>) -> Self {
        add(&self.config, &mut self.publish, provider);
        self
    }

    /// Validates the configuration and registers provider quotas.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if the configuration is invalid or a
    /// required production stage has no provider. A missing publisher is
    /// allowed; such a pipeline can only complete dry runs.
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        self.config.validate()?;

        let counts = [
            (StageKind::Topics, self.topics.len()),
            (StageKind::Script, self.script.len()),
            (StageKind::Voice, self.voice.len()),
            (StageKind::Visuals, self.visuals.len()),
            (StageKind::Assemble, self.assemble.len()),
            (StageKind::Metadata, self.metadata.len()),
        ];
        for (stage, count) in counts {
            if count == 0 && self.config.stage(stage).required {
                return Err(PipelineError::config(format!(
                    "required stage '{stage}' has no provider"
                )));
            }
        }

        self.shared.register_quotas(&self.config);
        let retry = RetryPolicy::new(self.config.retry.clone())
            .with_call_timeout(self.config.provider_timeout());
        let config = self.config;

        Ok(Pipeline {
            topics: StageExecutor::new(config.stage(StageKind::Topics), self.topics),
            script: StageExecutor::new(config.stage(StageKind::Script), self.script),
            voice: StageExecutor::new(config.stage(StageKind::Voice), self.voice),
            visuals: StageExecutor::new(config.stage(StageKind::Visuals), self.visuals),
            assemble: StageExecutor::new(config.stage(StageKind::Assemble), self.assemble),
            metadata: StageExecutor::new(config.stage(StageKind::Metadata), self.metadata),
            publish: StageExecutor::new(config.stage(StageKind::Publish), self.publish),
            config,
            shared: self.shared,
            events: self.events,
            retry,
        })
    }
}

fn add<C: Capability>(config: &PipelineConfig, chain: &mut FallbackChain<C>, provider: Arc<dyn Provider<C>>) {
    let priority = config.provider(provider.name()).priority;
    chain.push(provider, priority);
}

impl fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("topics", &self.topics)
            .field("script", &self.script)
            .field("voice", &self.voice)
            .field("visuals", &self.visuals)
            .field("assemble", &self.assemble)
            .field("metadata", &self.metadata)
            .field("publish", &self.publish)
            .finish_non_exhaustive()
    }
}

/// A configured pipeline. Runs are independent apart from the shared state.
pub struct Pipeline {
    config: PipelineConfig,
    shared: SharedState,
    events: Arc<dyn EventSink>,
    retry: RetryPolicy,
    topics: StageExecutor<TopicDiscovery>,
    script: StageExecutor<ScriptWriting>,
    voice: StageExecutor<VoiceSynthesis>,
    visuals: StageExecutor<VisualSearch>,
    assemble: StageExecutor<VideoAssembly>,
    metadata: StageExecutor<MetadataGeneration>,
    publish: StageExecutor<Publishing>,
}

impl Pipeline {
    /// The pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The process-scoped state this pipeline uses.
    pub fn shared(&self) -> &SharedState {
        &self.shared
    }

    /// Snapshot of every provider, in stage order then chain order.
    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        let limiter = self.shared.rate_limiter.as_ref();
        let mut all = self.topics.chain().descriptors(limiter);
        all.extend(self.script.chain().descriptors(limiter));
        all.extend(self.voice.chain().descriptors(limiter));
        all.extend(self.visuals.chain().descriptors(limiter));
        all.extend(self.assemble.chain().descriptors(limiter));
        all.extend(self.metadata.chain().descriptors(limiter));
        all.extend(self.publish.chain().descriptors(limiter));
        all
    }

    /// Runs the stage sequence once and returns the sealed report.
    ///
    /// The report is produced for every run, whatever its outcome. When a
    /// report directory is configured the report is also written there;
    /// a write failure is logged and does not affect the returned report.
    pub async fn run(&self, input: &RunInput) -> RunReport {
        let run_id = Uuid::new_v4();
        let ctx = RunContext::new(
            run_id,
            RunDeadline::start(self.config.run_deadline()),
            self.shared.clone(),
            self.retry.clone(),
            self.events.clone(),
        );
        let plan: Vec<StageKind> = StageKind::ALL
            .into_iter()
            .filter(|kind| input.publish || *kind != StageKind::Publish)
            .collect();

        info!(%run_id, stages = plan.len(), dry_run = !input.publish, "Pipeline run started");
        ctx.events().try_emit(
            PIPELINE_STARTED,
            Some(json!({
                "run_id": run_id,
                "stages": &plan,
                "dry_run": !input.publish,
            })),
        );

        let mut builder = RunReportBuilder::new(run_id, plan, !input.publish);
        let report = match self.drive(input, &ctx, &mut builder).await {
            Ok(()) => builder.finish(),
            Err(Halt::Aborted(reason)) => builder.abort(reason),
            Err(Halt::Deadline(err)) => builder.deadline_exceeded(err.to_string()),
        };

        info!(
            %run_id,
            status = %report.status(),
            executed = report.stages().len(),
            skipped = report.skipped().len(),
            "Pipeline run ended"
        );
        ctx.events().try_emit(
            PIPELINE_FINISHED,
            Some(json!({
                "run_id": run_id,
                "status": report.status(),
                "failure_reason": report.failure_reason(),
            })),
        );

        if let Some(dir) = &self.config.report_dir {
            match report.write_to_dir(dir).await {
                Ok(path) => info!(%run_id, path = %path.display(), "Run report written"),
                Err(err) => warn!(%run_id, error = %err, "Failed to write run report"),
            }
        }
        report
    }

    async fn drive(
        &self,
        input: &RunInput,
        ctx: &RunContext,
        report: &mut RunReportBuilder,
    ) -> Result<(), Halt> {
        let content = &self.config.content;

        let topics_request = TopicsRequest {
            region: content.region.clone(),
            limit: content.topic_limit,
            filter: content.filter.clone(),
            fallback_topics: content.fallback_topics.clone(),
        };
        let topics = self.advance(&self.topics, &topics_request, ctx, report).await?;
        let topic = select_topic(&topics, &content.filter)
            .ok_or_else(|| Halt::Aborted("topic discovery returned no usable topic".to_string()))?;
        info!(run_id = %ctx.run_id(), topic = %topic.title, content_type = %topic.content_type, "Topic selected");

        let script_request = ScriptRequest {
            topic: topic.clone(),
            style: input.style.clone().unwrap_or_else(|| content.style.clone()),
            min_words: content.min_script_words,
            max_words: content.max_script_words,
            max_duration_secs: content.video_duration_secs,
        };
        let script = self.advance(&self.script, &script_request, ctx, report).await?;
        let narration = script.full_text();

        let voice_request = VoiceRequest {
            text: narration.clone(),
            voice_id: content.voice_id.clone(),
            language: content.language.clone(),
        };
        let voiceover = self.advance(&self.voice, &voice_request, ctx, report).await?;

        let keywords = if topic.keywords.is_empty() {
            extract_keywords(&narration)
        } else {
            topic.keywords.clone()
        };
        let visual_request = VisualRequest {
            keywords: keywords.clone(),
            count: content.visual_count,
            width: content.resolution.width,
            height: content.resolution.height,
        };
        let visuals = self.advance(&self.visuals, &visual_request, ctx, report).await?;

        let assembly_request = AssemblyRequest {
            script_text: narration,
            voiceover,
            visuals,
            resolution: content.resolution,
        };
        let video = self.advance(&self.assemble, &assembly_request, ctx, report).await?;

        let metadata_request = MetadataRequest {
            topic_title: topic.title.clone(),
            summary: script.body.clone(),
            keywords,
            content_type: topic.content_type,
            language: content.language.clone(),
            privacy: content.privacy.clone(),
        };
        let metadata = self.advance(&self.metadata, &metadata_request, ctx, report).await?;

        if input.publish {
            let publish_request = PublishRequest { video, metadata };
            self.advance(&self.publish, &publish_request, ctx, report).await?;
        }
        Ok(())
    }

    /// Runs one stage and records its outcome. Returns the artifact the next
    /// stage consumes, or why the run must stop.
    async fn advance<C: Capability>(
        &self,
        executor: &StageExecutor<C>,
        request: &C::Request,
        ctx: &RunContext,
        report: &mut RunReportBuilder,
    ) -> Result<C::Artifact, Halt> {
        let stage = C::KIND;
        let run_id = ctx.run_id();
        if ctx.deadline().is_expired() {
            return Err(Halt::Deadline(DeadlineExceeded {
                stage,
                elapsed_ms: ctx.deadline().elapsed_ms(),
                attempted_providers: Vec::new(),
            }));
        }

        info!(%run_id, %stage, "Stage started");
        ctx.events()
            .try_emit(STAGE_STARTED, Some(json!({ "run_id": run_id, "stage": stage })));

        let started_at = Utc::now();
        let started = Instant::now();
        let outcome = executor.execute(request, ctx).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                emit_skips(ctx, stage, &err.attempted_providers);
                error!(%run_id, %stage, elapsed_ms = err.elapsed_ms, "Run deadline exceeded");
                ctx.events().try_emit(
                    STAGE_FAILED,
                    Some(json!({
                        "run_id": run_id,
                        "stage": stage,
                        "error": err.to_string(),
                        "duration_ms": duration_ms,
                    })),
                );
                report.record(StageRecord::deadline(
                    stage,
                    started_at,
                    duration_ms,
                    err.attempted_providers.clone(),
                ));
                return Err(Halt::Deadline(err));
            }
        };

        emit_skips(ctx, stage, result.attempts());
        report.record(StageRecord::from_result::<C>(&result, started_at, duration_ms));

        match result {
            StageResult::Success {
                artifact,
                provider_used,
                cached,
                ..
            } => {
                info!(%run_id, %stage, provider = %provider_used, cached, duration_ms, "Stage completed");
                ctx.events().try_emit(
                    STAGE_COMPLETED,
                    Some(json!({
                        "run_id": run_id,
                        "stage": stage,
                        "provider": provider_used,
                        "cached": cached,
                        "duration_ms": duration_ms,
                    })),
                );
                Ok(artifact)
            }
            StageResult::Degraded { artifact, reason, .. } => {
                warn!(%run_id, %stage, %reason, "Stage degraded to substitute artifact");
                ctx.events().try_emit(
                    STAGE_DEGRADED,
                    Some(json!({
                        "run_id": run_id,
                        "stage": stage,
                        "reason": reason,
                        "duration_ms": duration_ms,
                    })),
                );
                Ok(artifact)
            }
            StageResult::Failed { reason, .. } => {
                error!(%run_id, %stage, %reason, "Required stage failed, aborting run");
                ctx.events().try_emit(
                    STAGE_FAILED,
                    Some(json!({
                        "run_id": run_id,
                        "stage": stage,
                        "error": &reason,
                        "duration_ms": duration_ms,
                    })),
                );
                Err(Halt::Aborted(format!("stage '{stage}' failed: {reason}")))
            }
        }
    }
}

fn emit_skips(ctx: &RunContext, stage: StageKind, attempts: &[ProviderAttempt]) {
    for attempt in attempts.iter().filter(|a| a.status == AttemptStatus::RateLimited) {
        ctx.events().try_emit(
            PROVIDER_SKIPPED,
            Some(json!({
                "run_id": ctx.run_id(),
                "stage": stage,
                "provider": attempt.provider,
            })),
        );
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("shared", &self.shared)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
