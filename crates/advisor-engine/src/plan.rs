//! Execution planning
//!
//! Maps a routing decision onto an ordered list of stages. Stage members run
//! concurrently; stages run strictly in order. Plans are immutable once
//! built and validated before anything runs.

use std::collections::BTreeSet;

use advisor_core::{AdvisorError, AgentRegistry, AgentRole, Classification, Path, Result};

/// One pipeline stage. All members share a single deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub roles: Vec<AgentRole>,
}

impl Stage {
    pub fn new(roles: impl IntoIterator<Item = AgentRole>) -> Self {
        Self {
            roles: roles.into_iter().collect(),
        }
    }
}

/// An immutable per-ticker execution plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub ticker: String,
    pub path: Path,
    pub stages: Vec<Stage>,
    /// Whether a synthesis step consumes the results afterwards.
    pub synthesize: bool,
}

impl ExecutionPlan {
    /// Structural checks: no empty stages, and no role scheduled twice.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for (index, stage) in self.stages.iter().enumerate() {
            if stage.roles.is_empty() {
                return Err(AdvisorError::Config(format!(
                    "plan for {} has an empty stage {index}",
                    self.ticker
                )));
            }
            for role in &stage.roles {
                if !seen.insert(*role) {
                    return Err(AdvisorError::Config(format!(
                        "plan for {} schedules {role} twice",
                        self.ticker
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn roles(&self) -> impl Iterator<Item = AgentRole> + '_ {
        self.stages.iter().flat_map(|stage| stage.roles.iter().copied())
    }
}

/// Builds per-ticker plans from a classification. Stateless.
pub struct Planner;

impl Planner {
    /// Plans for every ticker in the classification, in query order. A
    /// comparison yields one full plan per ticker.
    pub fn plan(
        classification: &Classification,
        registry: &AgentRegistry,
    ) -> Result<Vec<ExecutionPlan>> {
        classification
            .tickers
            .iter()
            .map(|ticker| Self::plan_for_ticker(classification, ticker, registry))
            .collect()
    }

    fn plan_for_ticker(
        classification: &Classification,
        ticker: &str,
        registry: &AgentRegistry,
    ) -> Result<ExecutionPlan> {
        for role in &classification.requested_agents {
            if !registry.contains(*role) {
                return Err(AdvisorError::Config(format!(
                    "no agent registered for role {role}"
                )));
            }
        }

        // The analyst trio shares a stage; risk runs after it so it can read
        // their findings. Single-aspect plans collapse to one stage.
        let analysts: Vec<AgentRole> = [
            AgentRole::Fundamental,
            AgentRole::Technical,
            AgentRole::MarketIntel,
        ]
        .into_iter()
        .filter(|role| classification.requested_agents.contains(role))
        .collect();
        let risk = classification.requested_agents.contains(&AgentRole::Risk);

        let mut stages = Vec::new();
        if !analysts.is_empty() {
            stages.push(Stage::new(analysts));
        }
        if risk {
            stages.push(Stage::new([AgentRole::Risk]));
        }

        let synthesize = matches!(
            classification.path,
            Path::Standard | Path::Comparison | Path::DeepDive | Path::Portfolio
        );

        let plan = ExecutionPlan {
            ticker: ticker.to_string(),
            path: classification.path,
            stages,
            synthesize,
        };
        plan.validate()?;
        Ok(plan)
    }
}
