//! Staged pipeline execution
//!
//! Runs a plan stage by stage. All members of a stage start together and
//! share one absolute deadline; a member that misses it is recorded as
//! TIMED_OUT and its in-flight call is dropped. Individual failures never
//! abort the stage. A plan aborts in exactly two cases: a stage that a later
//! stage strictly depends on ends with zero usable results, or synthesis
//! would start with zero usable results across every stage. A terminal-stage
//! failure on its own (a lone risk miss, say) is just recorded; synthesis
//! proceeds on what the earlier stages produced.

use std::sync::Arc;
use std::time::Instant;

use advisor_core::{
    AdvisorConfig, AdvisorError, AgentRegistry, AgentResult, AgentStatus, FailureClass, Result,
    TickerContext,
};
use futures::future;
use tokio::time;

use crate::plan::ExecutionPlan;

pub struct PipelineExecutor {
    registry: Arc<AgentRegistry>,
    config: Arc<AdvisorConfig>,
}

impl PipelineExecutor {
    pub fn new(registry: Arc<AgentRegistry>, config: Arc<AdvisorConfig>) -> Self {
        Self { registry, config }
    }

    /// Run every stage of the plan against the context, recording one
    /// terminal result per scheduled role.
    pub async fn execute(
        &self,
        plan: &ExecutionPlan,
        mut ctx: TickerContext,
    ) -> Result<TickerContext> {
        plan.validate()?;
        let stage_budget = self.config.stage_timeout_for(plan.path);

        let mut total_usable = 0;
        let mut all_failures: Vec<(_, AgentStatus)> = Vec::new();

        for (stage_index, stage) in plan.stages.iter().enumerate() {
            let deadline = time::Instant::now() + stage_budget;
            let started = Instant::now();

            let results = {
                let ctx_ref = &ctx;
                let tasks = stage.roles.iter().map(|&role| {
                    let agent = self.registry.get(role);
                    async move {
                        let call_started = Instant::now();
                        let Some(agent) = agent else {
                            return AgentResult::failed(
                                role,
                                FailureClass::Internal,
                                call_started.elapsed(),
                            );
                        };
                        match time::timeout_at(deadline, agent.evaluate(&ctx_ref.ticker, ctx_ref))
                            .await
                        {
                            Ok(result) => result,
                            // Dropping the future cancels the in-flight call.
                            Err(_) => AgentResult::timed_out(role, call_started.elapsed()),
                        }
                    }
                });
                future::join_all(tasks).await
            };

            let usable = results.iter().filter(|result| result.is_ok()).count();
            tracing::debug!(
                ticker = %ctx.ticker,
                stage = stage_index,
                members = stage.roles.len(),
                usable,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "stage finished"
            );

            let failures: Vec<(_, AgentStatus)> = results
                .iter()
                .filter(|result| !result.is_ok())
                .map(|result| (result.role, result.status))
                .collect();
            for result in results {
                ctx.record(result);
            }
            total_usable += usable;
            all_failures.extend(failures.iter().copied());

            // Later stages read this stage's findings; with none, stopping
            // early beats running them against nothing.
            if usable == 0 && stage_index + 1 < plan.stages.len() {
                tracing::warn!(
                    ticker = %ctx.ticker,
                    stage = stage_index,
                    ?failures,
                    "stage produced no usable results, aborting plan"
                );
                return Err(AdvisorError::PlanAborted {
                    ticker: ctx.ticker.clone(),
                    stage: stage_index,
                    failures,
                });
            }
        }

        // A terminal-stage failure alone does not abort: synthesis folds in
        // whatever usable results exist. Only a fully empty run does.
        if plan.synthesize && total_usable == 0 {
            tracing::warn!(
                ticker = %ctx.ticker,
                failures = ?all_failures,
                "no usable results for synthesis, aborting plan"
            );
            return Err(AdvisorError::PlanAborted {
                ticker: ctx.ticker.clone(),
                stage: plan.stages.len().saturating_sub(1),
                failures: all_failures,
            });
        }

        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Stage;
    use advisor_core::{
        AgentRole, AnalysisAgent, Findings, Path, Signal,
    };
    use async_trait::async_trait;
    use std::time::Duration;

    struct StubAgent {
        role: AgentRole,
        delay: Duration,
        outcome: Outcome,
    }

    enum Outcome {
        Ok(u8, Signal),
        Fail(FailureClass),
    }

    impl StubAgent {
        fn ok(role: AgentRole, score: u8, signal: Signal) -> Arc<dyn AnalysisAgent> {
            Arc::new(Self {
                role,
                delay: Duration::ZERO,
                outcome: Outcome::Ok(score, signal),
            })
        }

        fn slow(role: AgentRole, delay: Duration) -> Arc<dyn AnalysisAgent> {
            Arc::new(Self {
                role,
                delay,
                outcome: Outcome::Ok(50, Signal::Neutral),
            })
        }

        fn failing(role: AgentRole, class: FailureClass) -> Arc<dyn AnalysisAgent> {
            Arc::new(Self {
                role,
                delay: Duration::ZERO,
                outcome: Outcome::Fail(class),
            })
        }
    }

    #[async_trait]
    impl AnalysisAgent for StubAgent {
        fn role(&self) -> AgentRole {
            self.role
        }

        async fn evaluate(&self, _ticker: &str, _ctx: &TickerContext) -> AgentResult {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match self.outcome {
                Outcome::Ok(score, signal) => AgentResult::ok(
                    self.role,
                    Findings::new(score, signal, 0.7),
                    self.delay,
                ),
                Outcome::Fail(class) => AgentResult::failed(self.role, class, self.delay),
            }
        }
    }

    fn standard_plan() -> ExecutionPlan {
        ExecutionPlan {
            ticker: "TCS".to_string(),
            path: Path::Standard,
            stages: vec![
                Stage::new([
                    AgentRole::Fundamental,
                    AgentRole::Technical,
                    AgentRole::MarketIntel,
                ]),
                Stage::new([AgentRole::Risk]),
            ],
            synthesize: true,
        }
    }

    fn executor(registry: AgentRegistry) -> PipelineExecutor {
        PipelineExecutor::new(Arc::new(registry), Arc::new(AdvisorConfig::default()))
    }

    #[tokio::test]
    async fn records_one_result_per_scheduled_role() {
        let registry = AgentRegistry::builder()
            .register(StubAgent::ok(AgentRole::Fundamental, 70, Signal::Bullish))
            .register(StubAgent::ok(AgentRole::Technical, 60, Signal::Bullish))
            .register(StubAgent::ok(AgentRole::MarketIntel, 55, Signal::Neutral))
            .register(StubAgent::ok(AgentRole::Risk, 65, Signal::Neutral))
            .build();

        let ctx = executor(registry)
            .execute(&standard_plan(), TickerContext::new("TCS"))
            .await
            .unwrap();

        assert_eq!(ctx.results().count(), 4);
        assert!(ctx.results().all(AgentResult::is_ok));
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_stage() {
        let registry = AgentRegistry::builder()
            .register(StubAgent::ok(AgentRole::Fundamental, 70, Signal::Bullish))
            .register(StubAgent::failing(
                AgentRole::Technical,
                FailureClass::MalformedOutput,
            ))
            .register(StubAgent::ok(AgentRole::MarketIntel, 55, Signal::Neutral))
            .register(StubAgent::ok(AgentRole::Risk, 65, Signal::Neutral))
            .build();

        let ctx = executor(registry)
            .execute(&standard_plan(), TickerContext::new("TCS"))
            .await
            .unwrap();

        assert_eq!(
            ctx.result(AgentRole::Technical).unwrap().status,
            AgentStatus::Failed(FailureClass::MalformedOutput)
        );
        assert!(ctx.result(AgentRole::Fundamental).unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_member_times_out_without_stalling_the_stage() {
        let registry = AgentRegistry::builder()
            .register(StubAgent::ok(AgentRole::Fundamental, 70, Signal::Bullish))
            .register(StubAgent::slow(
                AgentRole::Technical,
                Duration::from_secs(60),
            ))
            .register(StubAgent::ok(AgentRole::MarketIntel, 55, Signal::Neutral))
            .register(StubAgent::ok(AgentRole::Risk, 65, Signal::Neutral))
            .build();

        let ctx = executor(registry)
            .execute(&standard_plan(), TickerContext::new("TCS"))
            .await
            .unwrap();

        assert_eq!(
            ctx.result(AgentRole::Technical).unwrap().status,
            AgentStatus::TimedOut
        );
        assert!(ctx.result(AgentRole::Risk).unwrap().is_ok());
    }

    #[tokio::test]
    async fn lone_risk_failure_keeps_the_analyst_results() {
        let registry = AgentRegistry::builder()
            .register(StubAgent::ok(AgentRole::Fundamental, 70, Signal::Bullish))
            .register(StubAgent::ok(AgentRole::Technical, 60, Signal::Bullish))
            .register(StubAgent::ok(AgentRole::MarketIntel, 55, Signal::Neutral))
            .register(StubAgent::failing(AgentRole::Risk, FailureClass::Internal))
            .build();

        // Risk is the whole terminal stage; its failure must not throw away
        // three healthy analyst results.
        let ctx = executor(registry)
            .execute(&standard_plan(), TickerContext::new("TCS"))
            .await
            .unwrap();

        assert_eq!(ctx.results().filter(|result| result.is_ok()).count(), 3);
        assert_eq!(
            ctx.result(AgentRole::Risk).unwrap().status,
            AgentStatus::Failed(FailureClass::Internal)
        );
    }

    #[tokio::test]
    async fn all_members_failing_aborts_the_plan() {
        let registry = AgentRegistry::builder()
            .register(StubAgent::failing(
                AgentRole::Fundamental,
                FailureClass::Internal,
            ))
            .register(StubAgent::failing(
                AgentRole::Technical,
                FailureClass::Internal,
            ))
            .register(StubAgent::failing(
                AgentRole::MarketIntel,
                FailureClass::Internal,
            ))
            .register(StubAgent::ok(AgentRole::Risk, 65, Signal::Neutral))
            .build();

        let err = executor(registry)
            .execute(&standard_plan(), TickerContext::new("TCS"))
            .await
            .unwrap_err();

        match err {
            AdvisorError::PlanAborted { stage, failures, .. } => {
                assert_eq!(stage, 0);
                assert_eq!(failures.len(), 3);
            }
            other => panic!("expected PlanAborted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn terminal_single_aspect_failure_is_not_an_abort() {
        let registry = AgentRegistry::builder()
            .register(StubAgent::failing(
                AgentRole::Technical,
                FailureClass::UpstreamDataMissing,
            ))
            .build();
        let plan = ExecutionPlan {
            ticker: "INFY".to_string(),
            path: Path::SingleAspect,
            stages: vec![Stage::new([AgentRole::Technical])],
            synthesize: false,
        };

        // Nothing downstream depends on the stage, so the failed result is
        // simply recorded.
        let ctx = executor(registry)
            .execute(&plan, TickerContext::new("INFY"))
            .await
            .unwrap();
        assert!(!ctx.result(AgentRole::Technical).unwrap().is_ok());
    }
}
