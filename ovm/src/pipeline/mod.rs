//! Staged task runner used by the bootstrap phases.
//!
//! An [`ExecutionPlan`] is an ordered list of [`Stage`]s; each stage holds
//! independent [`PipelineTask`]s that share one context (usually
//! `Arc<tokio::sync::Mutex<T>>`) and run concurrently.
//!
//! Stages run one after another. A stage succeeds when every task in it
//! succeeds and fails with the first task error observed; later stages are
//! then skipped. Tasks still running in the failed stage are detached, not
//! aborted, so a task must never leave half-written state that a rerun
//! cannot repair.
//!
//! ```ignore
//! let plan = ExecutionPlan::new(vec![
//!     Stage::parallel(vec![Box::new(MakeDirs), Box::new(ProbePort)]),
//!     Stage::parallel(vec![Box::new(WriteManifest)]),
//! ]);
//! let metrics = PipelineExecutor::execute(plan, ctx).await?;
//! tracing::debug!(total_ms = metrics.total_duration_ms, "plan finished");
//! ```

mod metrics;
#[allow(clippy::module_inception)]
mod pipeline;
mod stage;
mod task;

pub use metrics::{PipelineMetrics, StageMetrics, TaskMetrics};
pub use pipeline::{ExecutionPlan, PipelineExecutor};
pub use stage::Stage;
pub use task::{BoxedTask, PipelineTask};
