//! Pipeline controller: planning, then executing, then verifying.
//!
//! Stages run strictly in that order with no retries or branches. Each stage
//! writes one field of the [`RunState`]; an error in any stage aborts the run
//! and the partial state is dropped.

use std::future::Future;
use std::sync::Arc;

use tracing::{info, info_span, Instrument};

use crate::agents::{planner, ExecutorAgent, PlannerAgent, VerifierAgent};
use crate::config::Config;
use crate::error::PipelineError;
use crate::llm::{GeminiClient, GeminiClientConfig, LanguageModel};
use crate::metrics;
use crate::models::RunState;
use crate::tools::{self, ActionSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Planning,
    Executing,
    Verifying,
}

impl Stage {
    pub const ORDER: [Stage; 3] = [Stage::Planning, Stage::Executing, Stage::Verifying];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Planning => "planning",
            Stage::Executing => "executing",
            Stage::Verifying => "verifying",
        }
    }

    fn banner(&self) -> &'static str {
        match self {
            Stage::Planning => "PLANNER AGENT",
            Stage::Executing => "EXECUTOR AGENT",
            Stage::Verifying => "VERIFIER AGENT",
        }
    }
}

pub struct Pipeline {
    planner: PlannerAgent,
    executor: ExecutorAgent,
    verifier: VerifierAgent,
    actions: Arc<ActionSet>,
    strict_validation: bool,
}

impl Pipeline {
    pub fn new(model: Arc<dyn LanguageModel>, actions: Arc<ActionSet>) -> Self {
        Self {
            planner: PlannerAgent::new(model.clone(), &actions),
            executor: ExecutorAgent::new(model.clone(), actions.clone()),
            verifier: VerifierAgent::new(model),
            actions,
            strict_validation: false,
        }
    }

    /// Gemini-backed pipeline with the standard action set.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let model = GeminiClient::new(GeminiClientConfig::from(config))?;
        let actions = ActionSet::standard(config, tools::http_client(config)?);
        Ok(Self::new(Arc::new(model), Arc::new(actions))
            .with_max_steps(config.agent_max_steps)
            .with_strict_validation(config.strict_plan_validation))
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.executor = self.executor.with_max_steps(max_steps);
        self
    }

    /// Rejects plans naming unknown actions or missing required arguments
    /// before anything executes. Off by default.
    pub fn with_strict_validation(mut self, enabled: bool) -> Self {
        self.strict_validation = enabled;
        self
    }

    pub fn actions(&self) -> &ActionSet {
        &self.actions
    }

    pub async fn run(&self, task: &str) -> Result<RunState, PipelineError> {
        let mut state = RunState::new(task);
        let span = info_span!("pipeline_run", run_id = %state.run_id);

        let result = self.drive(&mut state).instrument(span).await;
        let outcome = if result.is_ok() { "completed" } else { "aborted" };
        metrics::PIPELINE_RUNS.with_label_values(&[outcome]).inc();

        result.map(|()| state)
    }

    async fn drive(&self, state: &mut RunState) -> Result<(), PipelineError> {
        let plan = timed(Stage::Planning, self.planner.plan(&state.task)).await?;
        info!(plan = %plan.to_pretty_json(), "GENERATED PLAN");
        if self.strict_validation {
            planner::validate_plan(&plan, &self.actions)?;
        }
        let plan = state.plan.insert(plan);

        let summary = timed(Stage::Executing, self.executor.execute(plan)).await?;
        info!(execution_result = %summary, "EXECUTION RESULT");
        let summary = state.execution_result.insert(summary);

        let answer = timed(Stage::Verifying, self.verifier.verify(summary)).await?;
        info!(final_output = %answer, "FINAL VERIFIED ANSWER");
        state.final_output = Some(answer);

        Ok(())
    }
}

async fn timed<T, F>(stage: Stage, fut: F) -> Result<T, PipelineError>
where
    F: Future<Output = Result<T, PipelineError>>,
{
    info!(stage = stage.as_str(), "==================== {} ====================", stage.banner());
    let timer = metrics::STAGE_SECONDS
        .with_label_values(&[stage.as_str()])
        .start_timer();
    let result = fut.await;
    timer.observe_duration();
    result
}
