//! Stage definition for table-driven pipeline execution.

/// A stage groups tasks that run concurrently.
///
/// Stages are executed in order. Tasks inside one stage must not depend on
/// each other's outputs; they may rely on everything produced by earlier
/// stages.
#[derive(Debug, Clone)]
pub struct Stage<T> {
    pub tasks: Vec<T>,
}

impl<T> Stage<T> {
    /// Create a stage whose tasks run in parallel.
    pub fn parallel(tasks: Vec<T>) -> Self {
        Self { tasks }
    }
}
