//! Strategy table - failure kind → strategy, with a keyword fallback

use std::collections::HashMap;
use std::sync::Arc;

use super::{ColumnNameFix, FixStrategy, LoopIncrementFix, NullGuardFix};
use crate::domain::FailureKind;

/// Pick a kind from raw error lines when classification was inconclusive
///
/// Checked in order: null dereference, schema error, runaway loop.
pub fn heuristic_kind(recent_errors: &[String]) -> Option<FailureKind> {
    let errors = recent_errors.join(" ");
    if errors.contains("NoneType") || errors.contains("AttributeError") {
        Some(FailureKind::NullPointer)
    } else if errors.contains("OperationalError") || errors.contains("column") {
        Some(FailureKind::SqlError)
    } else if errors.contains("MemoryError") || errors.contains("loop") {
        Some(FailureKind::InfiniteLoop)
    } else {
        None
    }
}

/// Registered strategies by failure kind
#[derive(Clone, Default)]
pub struct StrategyTable {
    strategies: HashMap<FailureKind, Arc<dyn FixStrategy>>,
}

impl StrategyTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with a built-in strategy for every injectable kind
    pub fn standard() -> Self {
        let mut table = Self::new();
        for kind in FailureKind::INJECTABLE {
            if let Some(strategy) = Self::builtin(kind) {
                table.register(strategy);
            }
        }
        table
    }

    fn builtin(kind: FailureKind) -> Option<Arc<dyn FixStrategy>> {
        match kind {
            FailureKind::NullPointer => Some(Arc::new(NullGuardFix)),
            FailureKind::SqlError => Some(Arc::new(ColumnNameFix)),
            FailureKind::InfiniteLoop => Some(Arc::new(LoopIncrementFix)),
            FailureKind::Unknown => None,
        }
    }

    pub fn register(&mut self, strategy: Arc<dyn FixStrategy>) {
        self.strategies.insert(strategy.kind(), strategy);
    }

    /// Remove a kind's strategy (used to exercise the no-strategy path)
    pub fn unregister(&mut self, kind: FailureKind) -> Option<Arc<dyn FixStrategy>> {
        self.strategies.remove(&kind)
    }

    pub fn get(&self, kind: FailureKind) -> Option<Arc<dyn FixStrategy>> {
        self.strategies.get(&kind).cloned()
    }

    /// Resolve a strategy: direct lookup first, then the keyword heuristic
    pub fn lookup(&self, kind: FailureKind, recent_errors: &[String]) -> Option<Arc<dyn FixStrategy>> {
        if let Some(strategy) = self.get(kind) {
            return Some(strategy);
        }
        let guessed = heuristic_kind(recent_errors)?;
        log::debug!("No strategy for {}, heuristic picked {}", kind, guessed);
        self.get(guessed)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_standard_covers_injectable_kinds() {
        let table = StrategyTable::standard();
        assert_eq!(table.len(), 3);
        for kind in FailureKind::INJECTABLE {
            assert_eq!(table.get(kind).unwrap().kind(), kind);
        }
        assert!(table.get(FailureKind::Unknown).is_none());
    }

    #[test]
    fn test_heuristic_order() {
        assert_eq!(
            heuristic_kind(&lines(&["AttributeError in loop"])),
            Some(FailureKind::NullPointer)
        );
        assert_eq!(
            heuristic_kind(&lines(&["bad column name", "MemoryError"])),
            Some(FailureKind::SqlError)
        );
        assert_eq!(heuristic_kind(&lines(&["stuck in a loop"])), Some(FailureKind::InfiniteLoop));
        assert_eq!(heuristic_kind(&lines(&["disk full"])), None);
        assert_eq!(heuristic_kind(&[]), None);
    }

    #[test]
    fn test_lookup_falls_back_to_heuristic() {
        let table = StrategyTable::standard();
        let strategy = table
            .lookup(FailureKind::Unknown, &lines(&["sqlite3.OperationalError: no such column"]))
            .unwrap();
        assert_eq!(strategy.kind(), FailureKind::SqlError);
        assert!(table.lookup(FailureKind::Unknown, &lines(&["segfault"])).is_none());
    }

    #[test]
    fn test_lookup_without_registered_strategy() {
        let mut table = StrategyTable::standard();
        table.unregister(FailureKind::InfiniteLoop);
        assert!(
            table
                .lookup(FailureKind::InfiniteLoop, &lines(&["MemoryError: infinite loop"]))
                .is_none()
        );
    }
}
