use crate::loader::EntryPoint;
use crate::matrix::Roll;
use crate::validate::{CellStats, CellValidator};

/// Fully populated grid plus the tally of cells that fell back to the default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridOutcome {
    pub cells: Vec<Roll>,
    pub stats: CellStats,
}

/// Call `entry` for every (own, opponent) pair in `0..goal`, row-major.
///
/// Raised errors and invalid values both count as cell errors and get the default roll,
/// so the returned grid always has `goal²` cells. The entry point is closed afterwards.
pub async fn evaluate_grid(
    entry: &mut dyn EntryPoint,
    goal: u32,
    validator: &CellValidator,
) -> GridOutcome {
    let mut cells = Vec::with_capacity((goal as usize) * (goal as usize));
    let mut stats = CellStats::default();

    for own in 0..goal {
        for opponent in 0..goal {
            let roll = match entry.call(own, opponent).await {
                Ok(raw) => validator.check(&raw, &mut stats),
                Err(e) => {
                    stats.record(e.to_string());
                    validator.default_roll()
                }
            };
            cells.push(roll);
        }
    }

    entry.close().await;
    GridOutcome { cells, stats }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CallError;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct FnEntry<F> {
        f: F,
        closed: bool,
    }

    fn fn_entry<F>(f: F) -> FnEntry<F>
    where
        F: FnMut(u32, u32) -> Result<Value, CallError> + Send,
    {
        FnEntry { f, closed: false }
    }

    #[async_trait]
    impl<F> EntryPoint for FnEntry<F>
    where
        F: FnMut(u32, u32) -> Result<Value, CallError> + Send,
    {
        async fn call(&mut self, own: u32, opponent: u32) -> Result<Value, CallError> {
            (self.f)(own, opponent)
        }

        async fn close(&mut self) {
            self.closed = true;
        }
    }

    fn validator() -> CellValidator {
        CellValidator::new(0, 10, 5)
    }

    #[tokio::test]
    async fn valid_entry_point_fills_every_cell() {
        let mut entry = fn_entry(|own, opp| Ok(json!((own + opp) % 11)));
        let out = evaluate_grid(&mut entry, 7, &validator()).await;
        assert_eq!(out.cells.len(), 49);
        assert_eq!(out.stats.errors, 0);
        assert_eq!(out.cells[7 + 3], 4);
        assert!(entry.closed, "entry point not closed");
    }

    #[tokio::test]
    async fn raising_entry_point_yields_all_defaults() {
        let mut entry =
            fn_entry(|_, _| Err(CallError::Raised("ZeroDivisionError: division by zero".into())));
        let out = evaluate_grid(&mut entry, 4, &validator()).await;
        assert!(out.cells.iter().all(|&c| c == 5));
        assert_eq!(out.stats.errors, 16);
        assert_eq!(
            out.stats.last_error.as_deref(),
            Some("ZeroDivisionError: division by zero")
        );
    }

    #[tokio::test]
    async fn single_bad_cell_is_replaced() {
        let mut entry = fn_entry(|own, opp| {
            if (own, opp) == (2, 1) {
                Ok(json!(99))
            } else {
                Ok(json!(3))
            }
        });
        let out = evaluate_grid(&mut entry, 3, &validator()).await;
        assert_eq!(out.stats.errors, 1);
        for (i, &c) in out.cells.iter().enumerate() {
            let expected = if i == 2 * 3 + 1 { 5 } else { 3 };
            assert_eq!(c, expected, "cell {i}");
        }
    }

    #[tokio::test]
    async fn calls_are_row_major() {
        let mut seen = Vec::new();
        let mut entry = fn_entry(|own, opp| {
            seen.push((own, opp));
            Ok(json!(0))
        });
        evaluate_grid(&mut entry, 2, &validator()).await;
        drop(entry);
        assert_eq!(seen, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
    }
}
