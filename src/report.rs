//! Typed per-item outcomes for the batch stages. Failures never abort a
//! stage; they are collected here so partial results are explicit instead
//! of buried in log lines.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ItemError {
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("asset missing: {0}")]
    MissingAsset(String),
}

#[derive(Debug, Clone)]
pub enum ItemOutcome {
    /// Freshly produced this run.
    Done,
    /// Output already existed and was reused.
    Skipped,
    Failed(ItemError),
}

#[derive(Debug, Default)]
pub struct BatchReport {
    items: Vec<(usize, ItemOutcome)>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, index: usize, outcome: ItemOutcome) {
        self.items.push((index, outcome));
    }

    pub fn done_count(&self) -> usize {
        self.items
            .iter()
            .filter(|(_, o)| matches!(o, ItemOutcome::Done))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.items
            .iter()
            .filter(|(_, o)| matches!(o, ItemOutcome::Skipped))
            .count()
    }

    pub fn failures(&self) -> Vec<(usize, &ItemError)> {
        self.items
            .iter()
            .filter_map(|(i, o)| match o {
                ItemOutcome::Failed(err) => Some((*i, err)),
                _ => None,
            })
            .collect()
    }

    pub fn log_summary(&self, stage: &str) {
        let failures = self.failures();
        tracing::info!(
            "{}: {} generated, {} reused, {} failed",
            stage,
            self.done_count(),
            self.skipped_count(),
            failures.len()
        );
        for (index, err) in failures {
            tracing::warn!("{}: item {:03} failed: {}", stage, index, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_partition_by_outcome() {
        let mut report = BatchReport::new();
        report.record(0, ItemOutcome::Done);
        report.record(1, ItemOutcome::Skipped);
        report.record(2, ItemOutcome::Failed(ItemError::Generation("boom".into())));
        report.record(3, ItemOutcome::Done);

        assert_eq!(report.done_count(), 2);
        assert_eq!(report.skipped_count(), 1);
        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, 2);
        assert!(failures[0].1.to_string().contains("boom"));
    }
}
