//! Operator interaction

use async_trait::async_trait;

/// One row of the swap plan shown before confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub label: String,
    pub value: String,
}

impl PlanEntry {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Operator's answer at the confirmation gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Proceed,
    Cancel,
}

/// Where the swap engine reports its plan and asks for confirmation
#[async_trait]
pub trait OperatorSink: Send + Sync {
    /// Show the plan about to be executed
    fn plan(&self, entries: &[PlanEntry]);

    /// Detail line, shown only in verbose mode
    fn verbose(&self, line: &str);

    /// Ask whether to proceed
    async fn confirm(&self) -> Confirmation;
}

/// Sink that prints nothing and always proceeds
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl OperatorSink for NoopSink {
    fn plan(&self, _entries: &[PlanEntry]) {}

    fn verbose(&self, _line: &str) {}

    async fn confirm(&self) -> Confirmation {
        Confirmation::Proceed
    }
}
