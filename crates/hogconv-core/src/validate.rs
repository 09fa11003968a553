use crate::config::ConvertConfig;
use crate::matrix::Roll;
use serde_json::Value;

/// Why a cell value was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellViolation {
    WrongType(&'static str),
    OutOfRange(i64),
}

/// Per-submission error tally shared by the validator and the evaluator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellStats {
    pub errors: usize,
    /// Most recent error description.
    pub last_error: Option<String>,
}

impl CellStats {
    pub fn record(&mut self, description: impl Into<String>) {
        self.errors += 1;
        self.last_error = Some(description.into());
    }
}

/// Checks raw cell values against the configured roll range.
#[derive(Debug, Clone, Copy)]
pub struct CellValidator {
    min: i64,
    max: i64,
    default: Roll,
}

impl CellValidator {
    pub fn new(min: i64, max: i64, default: Roll) -> Self {
        Self { min, max, default }
    }

    pub fn from_config(cfg: &ConvertConfig) -> Self {
        // validate() keeps all three inside i8.
        Self::new(cfg.min_rolls, cfg.max_rolls, cfg.default_roll as Roll)
    }

    pub fn default_roll(&self) -> Roll {
        self.default
    }

    pub fn classify(&self, raw: &Value) -> Result<Roll, CellViolation> {
        let n = match raw {
            Value::Number(n) => match n.as_i64() {
                Some(n) => n,
                None if n.is_u64() => return Err(CellViolation::OutOfRange(i64::MAX)),
                None => return Err(CellViolation::WrongType("float")),
            },
            Value::Bool(_) => return Err(CellViolation::WrongType("bool")),
            Value::String(_) => return Err(CellViolation::WrongType("string")),
            Value::Null => return Err(CellViolation::WrongType("null")),
            Value::Array(_) => return Err(CellViolation::WrongType("list")),
            Value::Object(_) => return Err(CellViolation::WrongType("object")),
        };
        if n < self.min || n > self.max {
            return Err(CellViolation::OutOfRange(n));
        }
        // Range is inside i8 (see ConvertConfig::validate).
        Ok(n as Roll)
    }

    /// Accept `raw` or fall back to the default roll, tallying the violation. Never fails.
    pub fn check(&self, raw: &Value, stats: &mut CellStats) -> Roll {
        match self.classify(raw) {
            Ok(roll) => roll,
            Err(violation) => {
                let description = match violation {
                    CellViolation::WrongType(kind) => {
                        format!("strategy function returned a {kind}, not a number of rolls")
                    }
                    CellViolation::OutOfRange(n) => {
                        format!("strategy function returned an invalid number of rolls: {n}")
                    }
                };
                stats.record(description);
                self.default
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator() -> CellValidator {
        CellValidator::new(0, 10, 5)
    }

    #[test]
    fn in_range_passes_through() {
        let mut stats = CellStats::default();
        for n in 0..=10 {
            assert_eq!(validator().check(&json!(n), &mut stats), n as Roll);
        }
        assert_eq!(stats, CellStats::default());
    }

    #[test]
    fn out_of_range_falls_back() {
        let mut stats = CellStats::default();
        assert_eq!(validator().check(&json!(11), &mut stats), 5);
        assert_eq!(validator().check(&json!(-1), &mut stats), 5);
        assert_eq!(stats.errors, 2);
        assert!(stats.last_error.unwrap().ends_with("-1"));
    }

    #[test]
    fn wrong_types_fall_back() {
        let v = validator();
        assert_eq!(v.classify(&json!(3.0)), Err(CellViolation::WrongType("float")));
        assert_eq!(v.classify(&json!(true)), Err(CellViolation::WrongType("bool")));
        assert_eq!(v.classify(&json!("4")), Err(CellViolation::WrongType("string")));
        assert_eq!(v.classify(&Value::Null), Err(CellViolation::WrongType("null")));

        let mut stats = CellStats::default();
        assert_eq!(v.check(&json!([1]), &mut stats), 5);
        assert_eq!(stats.errors, 1);
    }

    #[test]
    fn huge_integers_are_out_of_range() {
        assert_eq!(
            validator().classify(&json!(u64::MAX)),
            Err(CellViolation::OutOfRange(i64::MAX))
        );
        // The harness clamps Python ints to these bounds.
        assert_eq!(
            validator().classify(&json!(i64::MAX)),
            Err(CellViolation::OutOfRange(i64::MAX))
        );
        assert_eq!(
            validator().classify(&json!(i64::MIN)),
            Err(CellViolation::OutOfRange(i64::MIN))
        );
    }
}
