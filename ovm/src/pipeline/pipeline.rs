//! Generic pipeline execution framework.
//!
//! Provides a table-driven pipeline executor that runs stages in order and
//! the tasks of each stage concurrently.

use super::metrics::{PipelineMetrics, StageMetrics, TaskMetrics};
use super::stage::Stage;
use super::task::BoxedTask;
use futures::stream::{FuturesUnordered, StreamExt};
use ovm_shared::errors::{OvmError, OvmResult};
use std::time::Instant;

/// Ordered stages to run; each stage's tasks run concurrently.
pub struct ExecutionPlan<Ctx> {
    stages: Vec<Stage<BoxedTask<Ctx>>>,
}

impl<Ctx> ExecutionPlan<Ctx> {
    pub fn new(stages: Vec<Stage<BoxedTask<Ctx>>>) -> Self {
        Self { stages }
    }
}

/// Runs an [`ExecutionPlan`] against a shared context.
pub struct PipelineExecutor;

impl PipelineExecutor {
    /// Execute a plan, stage by stage.
    ///
    /// Every task of a stage is spawned as its own tokio task, then the stage
    /// waits for all of them. The first error observed is returned; the join
    /// handles of unfinished siblings are dropped, which detaches them rather
    /// than aborting them.
    ///
    /// Generic over:
    /// - `Ctx`: Shared pipeline context (use interior mutability for writes)
    pub async fn execute<Ctx>(plan: ExecutionPlan<Ctx>, ctx: Ctx) -> OvmResult<PipelineMetrics>
    where
        Ctx: Clone + Send + 'static,
    {
        let total_start = Instant::now();
        let mut stage_metrics = Vec::new();

        for (index, stage) in plan.stages.into_iter().enumerate() {
            let stage_start = Instant::now();
            tracing::trace!(stage = index, tasks = stage.tasks.len(), "Starting stage");

            let mut running: FuturesUnordered<_> = stage
                .tasks
                .into_iter()
                .map(|task| {
                    let name = task.name().to_string();
                    let ctx = ctx.clone();
                    let handle = tokio::spawn(async move {
                        let task_start = Instant::now();
                        task.run(ctx).await?;
                        Ok::<u128, OvmError>(task_start.elapsed().as_millis())
                    });
                    async move { (name, handle.await) }
                })
                .collect();

            let mut task_metrics = Vec::with_capacity(running.len());
            while let Some((name, joined)) = running.next().await {
                let duration_ms = joined.map_err(|e| {
                    OvmError::Internal(format!("task {} did not complete: {}", name, e))
                })??;
                task_metrics.push(TaskMetrics { name, duration_ms });
            }

            stage_metrics.push(StageMetrics {
                index,
                duration_ms: stage_start.elapsed().as_millis(),
                tasks: task_metrics,
            });
        }

        Ok(PipelineMetrics {
            total_duration_ms: total_start.elapsed().as_millis(),
            stages: stage_metrics,
        })
    }
}
