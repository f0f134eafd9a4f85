//! Six-stage analysis of one security
//!
//! Stages run strictly in order: data collection, analysts, debate, decision,
//! risk, report. Only the analysts and the two opening research positions run
//! concurrently. Any error returned here aborts the run with no partial
//! result; degraded role output is carried forward instead.

use crate::agents::risk::RISK_MANAGER;
use crate::agents::role::RoleSpec;
use crate::agents::{
    AnalystReport, AnalystTeam, DebateCoordinator, DebateState, Researcher, RiskManager, Side,
    Trader, debate, trader,
};
use crate::config::{AnalysisMode, EquityConfig};
use crate::data::{MarketDataSource, SnapshotCache, StockContext, china_now, normalize_symbol};
use crate::engine::events::{PipelineEvent, PipelineObserver, Stage, TracingObserver};
use crate::engine::result::{AnalysisDraft, AnalysisResult};
use crate::error::{EquityError, Result};
use crate::report::ReportRenderer;
use agent_runtime::{AgentExecutor, DegradeCause, RoleResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Runs the analysis of one security
#[derive(Clone)]
pub struct PipelineOrchestrator {
    config: Arc<EquityConfig>,
    source: Arc<dyn MarketDataSource>,
    renderer: Arc<dyn ReportRenderer>,
    observer: Arc<dyn PipelineObserver>,
    cache: Option<SnapshotCache>,
    mode: AnalysisMode,
    analysts: AnalystTeam,
    researcher: Researcher,
    debate: DebateCoordinator,
    trader: Trader,
    risk: RiskManager,
}

impl PipelineOrchestrator {
    pub fn builder() -> PipelineOrchestratorBuilder {
        PipelineOrchestratorBuilder::default()
    }

    pub fn config(&self) -> &EquityConfig {
        &self.config
    }

    pub fn mode(&self) -> AnalysisMode {
        self.mode
    }

    /// The same pipeline labelled with another mode
    #[must_use]
    pub fn with_mode(mut self, mode: AnalysisMode) -> Self {
        self.mode = mode;
        self
    }

    pub(crate) fn renderer(&self) -> &Arc<dyn ReportRenderer> {
        &self.renderer
    }

    pub(crate) fn observer(&self) -> &Arc<dyn PipelineObserver> {
        &self.observer
    }

    /// Collect market data only
    pub async fn collect(&self, symbol: &str, cancel: &CancellationToken) -> Result<StockContext> {
        let symbol = normalize_symbol(symbol)?;
        let limit = self.config.call_timeout;
        let fetch = tokio::time::timeout(limit, self.source.fetch(&symbol));

        let fetched = tokio::select! {
            () = cancel.cancelled() => return Err(EquityError::Cancelled),
            fetched = fetch => fetched,
        };
        let ctx = fetched.map_err(|_| EquityError::Timeout {
            stage: Stage::DataCollection.label().to_string(),
            secs: limit.as_secs(),
        })??;

        if ctx.profile.is_none() && ctx.daily.is_empty() {
            warn!(%symbol, source = self.source.name(), "No profile or daily bars returned");
        }
        Ok(ctx)
    }

    /// Run all six stages for `symbol`
    #[instrument(skip(self, cancel), fields(mode = %self.mode))]
    pub async fn analyze(
        &self,
        symbol: &str,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult> {
        let symbol = normalize_symbol(symbol)?;
        let started = Instant::now();
        info!(
            %symbol,
            "{} {} started",
            self.mode.emoji(),
            self.mode.label()
        );

        let context = self
            .stage(&symbol, Stage::DataCollection, cancel, async {
                let ctx = self.collect(&symbol, cancel).await?;
                self.snapshot(&ctx).await;
                Ok(ctx)
            })
            .await?;

        let analysts = self
            .stage(&symbol, Stage::Analysts, cancel, async {
                let report = self.analysts.analyze_all(&context, cancel).await;
                self.observe_analysts(&symbol, &report);
                Ok(report)
            })
            .await?;

        let debate = self
            .stage(&symbol, Stage::Debate, cancel, async {
                let (bull, bear) = self.researcher.open(&context, &analysts, cancel).await;
                self.observe_role(&symbol, Side::Bull.spec(), &bull);
                self.observe_role(&symbol, Side::Bear.spec(), &bear);
                let state = self.debate.run(&context, bull, bear, cancel).await;
                self.observe_debate(&symbol, &state);
                Ok(state)
            })
            .await?;

        let decision = self
            .stage(&symbol, Stage::Decision, cancel, async {
                let decision = self
                    .trader
                    .decide(&context, &analysts, &debate, cancel)
                    .await;
                self.observe_outcome(
                    &symbol,
                    trader::TRADER.name,
                    decision.degraded,
                    decision.confidence,
                );
                Ok(decision)
            })
            .await?;

        let risk = self
            .stage(&symbol, Stage::Risk, cancel, async {
                let risk = self
                    .risk
                    .assess(&context, &analysts, &debate, &decision, cancel)
                    .await;
                self.observe_outcome(&symbol, RISK_MANAGER.name, risk.degraded, risk.risk_score);
                Ok(risk)
            })
            .await?;

        let analyzed_at = china_now();
        let duration = started.elapsed();
        let report = self
            .stage(&symbol, Stage::Report, cancel, async {
                let draft = AnalysisDraft {
                    context: &context,
                    analysts: &analysts,
                    debate: &debate,
                    decision: &decision,
                    risk: &risk,
                    mode: self.mode,
                    analyzed_at,
                    duration,
                };
                self.renderer.render(&draft).await
            })
            .await?;

        info!(
            %symbol,
            action = decision.action_label(),
            risk = risk.level_label(),
            elapsed_s = duration.as_secs_f64(),
            "Analysis completed"
        );

        Ok(AnalysisResult {
            context,
            analysts,
            debate,
            decision,
            risk,
            mode: self.mode,
            analyzed_at,
            duration,
            report,
        })
    }

    async fn stage<T, F>(
        &self,
        symbol: &str,
        stage: Stage,
        cancel: &CancellationToken,
        work: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if cancel.is_cancelled() {
            return Err(EquityError::Cancelled);
        }
        self.emit(PipelineEvent::StageStarted {
            symbol: symbol.to_string(),
            stage,
        });
        let started = Instant::now();
        let output = work.await?;
        self.emit(PipelineEvent::StageCompleted {
            symbol: symbol.to_string(),
            stage,
            elapsed: started.elapsed(),
        });
        Ok(output)
    }

    async fn snapshot(&self, ctx: &StockContext) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.save(ctx).await {
                warn!(symbol = %ctx.symbol, error = %e, "Failed to save market data snapshot");
            }
        }
    }

    fn emit(&self, event: PipelineEvent) {
        self.observer.on_event(&event);
    }

    fn observe_analysts(&self, symbol: &str, report: &AnalystReport) {
        for (kind, result) in report.iter() {
            self.observe_role(symbol, kind.spec(), result);
        }
    }

    fn observe_debate(&self, symbol: &str, state: &DebateState) {
        for turn in state.turns() {
            if let Some(cause) = turn.degraded {
                self.emit(PipelineEvent::DegradedResult {
                    symbol: symbol.to_string(),
                    role: format!("{}_rebuttal_round_{}", turn.side, turn.round),
                    reason: cause.to_string(),
                });
            }
        }
        if let Some(synthesis) = state.synthesis() {
            self.observe_role(symbol, &debate::SYNTHESIS, synthesis);
        }
    }

    fn observe_role(&self, symbol: &str, spec: &RoleSpec, result: &RoleResult) {
        self.observe_outcome(
            symbol,
            spec.name,
            result.degrade_cause(),
            spec.score(result),
        );
    }

    fn observe_outcome(
        &self,
        symbol: &str,
        role: &str,
        degraded: Option<DegradeCause>,
        score: Option<u8>,
    ) {
        let event = match (degraded, score) {
            (Some(cause), _) => PipelineEvent::DegradedResult {
                symbol: symbol.to_string(),
                role: role.to_string(),
                reason: cause.to_string(),
            },
            (None, Some(score)) => PipelineEvent::RoleScored {
                symbol: symbol.to_string(),
                role: role.to_string(),
                score,
            },
            (None, None) => return,
        };
        self.emit(event);
    }
}

/// Builder for [`PipelineOrchestrator`]
#[derive(Default)]
pub struct PipelineOrchestratorBuilder {
    config: Option<Arc<EquityConfig>>,
    executor: Option<AgentExecutor>,
    source: Option<Arc<dyn MarketDataSource>>,
    renderer: Option<Arc<dyn ReportRenderer>>,
    observer: Option<Arc<dyn PipelineObserver>>,
    cache: Option<Option<SnapshotCache>>,
    mode: Option<AnalysisMode>,
}

impl PipelineOrchestratorBuilder {
    pub fn config(mut self, config: Arc<EquityConfig>) -> Self {
        self.config = Some(config);
        self
    }

    /// Executor shared by every role
    pub fn executor(mut self, executor: AgentExecutor) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn source(mut self, source: Arc<dyn MarketDataSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn ReportRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Snapshot cache; defaults to the configured cache directory
    pub fn cache(mut self, cache: SnapshotCache) -> Self {
        self.cache = Some(Some(cache));
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache = Some(None);
        self
    }

    /// Mode label; defaults to the configured mode
    pub fn mode(mut self, mode: AnalysisMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn build(self) -> Result<PipelineOrchestrator> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let executor = self
            .executor
            .ok_or_else(|| EquityError::ConfigError("executor is required".to_string()))?;
        let source = self.source.ok_or_else(|| {
            EquityError::ConfigError("market data source is required".to_string())
        })?;
        let renderer = self
            .renderer
            .ok_or_else(|| EquityError::ConfigError("report renderer is required".to_string()))?;

        let default_sampling = config.default_sampling();
        Ok(PipelineOrchestrator {
            observer: self.observer.unwrap_or_else(|| Arc::new(TracingObserver)),
            cache: self
                .cache
                .unwrap_or_else(|| Some(SnapshotCache::new(config.cache_dir.clone()))),
            mode: self.mode.unwrap_or(config.mode),
            analysts: AnalystTeam::new(executor.clone(), default_sampling),
            researcher: Researcher::new(executor.clone(), default_sampling),
            debate: DebateCoordinator::new(
                executor.clone(),
                config.max_debate_rounds,
                config.rebuttal_sampling(),
                default_sampling,
            ),
            trader: Trader::new(executor.clone(), config.trader_sampling()),
            risk: RiskManager::new(executor, config.risk_sampling()),
            source,
            renderer,
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{Action, RiskLevel};
    use crate::testing::{
        FakeSource, MockProvider, RecordingObserver, TempRenderer, executor, reply_for,
        scripted_provider, test_config,
    };
    use agent_llm::CompletionResponse;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pipeline(
        provider: MockProvider,
        source: FakeSource,
        renderer: &TempRenderer,
        observer: Arc<RecordingObserver>,
    ) -> PipelineOrchestrator {
        PipelineOrchestrator::builder()
            .config(Arc::new(test_config(renderer.dir())))
            .executor(executor(provider))
            .source(Arc::new(source))
            .renderer(renderer.writer())
            .observer(observer)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_full_run_produces_decision() {
        let renderer = TempRenderer::new();
        let observer = Arc::new(RecordingObserver::default());
        let pipeline = pipeline(
            scripted_provider(),
            FakeSource::new(3),
            &renderer,
            Arc::clone(&observer),
        );

        let result = pipeline
            .analyze("600519", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.symbol(), "600519.SH");
        assert_eq!(result.decision.action, Some(Action::Buy));
        assert_eq!(result.risk.overall_risk_level, Some(RiskLevel::Medium));
        assert_eq!(result.debate.turns().len(), 3);
        assert!(result.report.markdown.exists());
        assert!(result.report.json.exists());

        let stages: Vec<Stage> = observer
            .events()
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::StageCompleted { stage, .. } => Some(*stage),
                _ => None,
            })
            .collect();
        assert_eq!(stages, Stage::ALL.to_vec());
        assert!(observer.events().contains(&PipelineEvent::RoleScored {
            symbol: "600519.SH".to_string(),
            role: "technical".to_string(),
            score: 8,
        }));
    }

    #[tokio::test]
    async fn test_snapshot_is_written_before_analysis() {
        let renderer = TempRenderer::new();
        let pipeline = pipeline(
            scripted_provider(),
            FakeSource::new(3),
            &renderer,
            Arc::new(RecordingObserver::default()),
        );
        let result = pipeline
            .analyze("600519.SH", &CancellationToken::new())
            .await
            .unwrap();

        let cache = SnapshotCache::new(pipeline.config().cache_dir.clone());
        assert!(cache.path_for(&result.context).exists());
    }

    #[tokio::test]
    async fn test_without_cache_writes_no_snapshot() {
        let renderer = TempRenderer::new();
        let config = test_config(renderer.dir());
        let cache_dir = config.cache_dir.clone();
        let pipeline = PipelineOrchestrator::builder()
            .config(Arc::new(config))
            .executor(executor(scripted_provider()))
            .source(Arc::new(FakeSource::new(3)))
            .renderer(renderer.writer())
            .without_cache()
            .build()
            .unwrap();

        pipeline
            .analyze("600519.SH", &CancellationToken::new())
            .await
            .unwrap();
        assert!(!cache_dir.exists());
    }

    #[tokio::test]
    async fn test_empty_bundle_is_snapshotted_and_analysed() {
        let renderer = TempRenderer::new();
        let observer = Arc::new(RecordingObserver::default());
        let pipeline = pipeline(
            scripted_provider(),
            FakeSource::empty(),
            &renderer,
            Arc::clone(&observer),
        );

        let result = pipeline
            .analyze("600519.SH", &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.context.profile.is_none());
        assert!(result.context.daily.is_empty());
        assert!(result.report.markdown.exists());

        let cache = SnapshotCache::new(pipeline.config().cache_dir.clone());
        assert!(cache.path_for(&result.context).exists());
        assert!(observer.events().iter().any(|e| matches!(
            e,
            PipelineEvent::StageCompleted {
                stage: Stage::Report,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn test_source_failure_aborts_without_model_calls() {
        let mut provider = MockProvider::new();
        provider.expect_complete().times(0);
        provider.expect_name().return_const("mock".to_string());

        let renderer = TempRenderer::new();
        let observer = Arc::new(RecordingObserver::default());
        let pipeline = pipeline(
            provider,
            FakeSource::new(3).failing("000001.SZ"),
            &renderer,
            Arc::clone(&observer),
        );

        let err = pipeline
            .analyze("000001.SZ", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EquityError::DataSource(_)));
        assert!(
            !observer
                .events()
                .iter()
                .any(|e| matches!(e, PipelineEvent::StageCompleted { .. }))
        );
    }

    #[tokio::test]
    async fn test_degraded_roles_do_not_abort() {
        let mut provider = MockProvider::new();
        provider
            .expect_complete()
            .returning(|_| Ok(CompletionResponse::text("无法给出结构化结论")));
        provider.expect_name().return_const("mock".to_string());

        let renderer = TempRenderer::new();
        let observer = Arc::new(RecordingObserver::default());
        let pipeline = pipeline(
            provider,
            FakeSource::new(3),
            &renderer,
            Arc::clone(&observer),
        );

        let result = pipeline
            .analyze("600519.SH", &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.analysts.technical.is_degraded());
        assert_eq!(result.decision.action, None);
        assert_eq!(
            result.decision.raw_response.as_deref(),
            Some("无法给出结构化结论")
        );
        assert!(observer.events().iter().any(|e| matches!(
            e,
            PipelineEvent::DegradedResult { role, .. } if role == "trader"
        )));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let renderer = TempRenderer::new();
        let pipeline = pipeline(
            scripted_provider(),
            FakeSource::new(3),
            &renderer,
            Arc::new(RecordingObserver::default()),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = pipeline.analyze("600519.SH", &cancel).await.unwrap_err();
        assert!(matches!(err, EquityError::Cancelled));
    }

    #[tokio::test]
    async fn test_invalid_symbol_is_rejected() {
        let renderer = TempRenderer::new();
        let pipeline = pipeline(
            scripted_provider(),
            FakeSource::new(3),
            &renderer,
            Arc::new(RecordingObserver::default()),
        );
        let err = pipeline
            .analyze("not-a-code", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EquityError::InvalidSymbol(_)));
    }

    #[tokio::test]
    async fn test_repeated_runs_agree_on_action_and_risk() {
        let renderer = TempRenderer::new();
        let pipeline = pipeline(
            scripted_provider(),
            FakeSource::new(3),
            &renderer,
            Arc::new(RecordingObserver::default()),
        );
        let cancel = CancellationToken::new();
        let first = pipeline.analyze("600519.SH", &cancel).await.unwrap();
        let second = pipeline.analyze("600519.SH", &cancel).await.unwrap();

        assert_eq!(first.decision.action, second.decision.action);
        assert_eq!(
            first.risk.overall_risk_level,
            second.risk.overall_risk_level
        );
    }

    #[tokio::test]
    async fn test_call_count_for_one_run() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut provider = MockProvider::new();
        provider.expect_complete().returning(move |req| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(CompletionResponse::text(reply_for(
                req.system.as_deref().unwrap_or_default(),
            )))
        });
        provider.expect_name().return_const("mock".to_string());

        let renderer = TempRenderer::new();
        let pipeline = pipeline(
            provider,
            FakeSource::new(0),
            &renderer,
            Arc::new(RecordingObserver::default()),
        );
        pipeline
            .analyze("600519.SH", &CancellationToken::new())
            .await
            .unwrap();

        // 2 analysts (news skipped), 2 researchers, 3 turns, synthesis, trader, risk
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }
}
