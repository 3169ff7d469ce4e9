//! Record-count and wall-clock limits for a query.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::GwasError;

/// Limits applied to one query; `None` means unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryBudget {
    /// Maximum records in any intermediate or final result
    pub max_records: Option<usize>,
    /// Maximum wall-clock time
    #[serde(with = "seconds", default)]
    pub timeout: Option<Duration>,
}

impl QueryBudget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = Some(max_records);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Start the clock
    pub fn start(&self) -> BudgetClock {
        BudgetClock {
            budget: *self,
            started: Instant::now(),
        }
    }
}

/// A running budget
#[derive(Debug, Clone, Copy)]
pub struct BudgetClock {
    budget: QueryBudget,
    started: Instant,
}

impl BudgetClock {
    /// Fail once the deadline has passed
    pub fn check_time(&self) -> Result<(), GwasError> {
        if let Some(timeout) = self.budget.timeout {
            let elapsed = self.started.elapsed();
            if elapsed > timeout {
                return Err(GwasError::BudgetExceeded {
                    msg: format!(
                        "query ran {:.3}s, limit is {:.3}s",
                        elapsed.as_secs_f64(),
                        timeout.as_secs_f64()
                    ),
                });
            }
        }
        Ok(())
    }

    /// Fail when `records` is over the record limit or time is up
    pub fn check(&self, records: usize) -> Result<(), GwasError> {
        if let Some(max) = self.budget.max_records {
            if records > max {
                return Err(GwasError::BudgetExceeded {
                    msg: format!("{} records exceed the limit of {}", records, max),
                });
            }
        }
        self.check_time()
    }
}

mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs: Option<f64> = Option::deserialize(d)?;
        Ok(secs.filter(|s| *s > 0.0).map(Duration::from_secs_f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_never_fails() {
        let clock = QueryBudget::unlimited().start();
        assert!(clock.check(usize::MAX).is_ok());
    }

    #[test]
    fn test_record_limit() {
        let clock = QueryBudget::unlimited().with_max_records(10).start();
        assert!(clock.check(10).is_ok());
        let err = clock.check(11).unwrap_err();
        assert!(matches!(err, GwasError::BudgetExceeded { .. }));
    }

    #[test]
    fn test_timeout() {
        let clock = QueryBudget::unlimited()
            .with_timeout(Duration::from_nanos(1))
            .start();
        std::thread::sleep(Duration::from_millis(2));
        assert!(clock.check_time().is_err());
    }

    #[test]
    fn test_serde_seconds() {
        let budget = QueryBudget::unlimited().with_timeout(Duration::from_secs(2));
        let json = serde_json::to_string(&budget).unwrap();
        let back: QueryBudget = serde_json::from_str(&json).unwrap();
        assert_eq!(back, budget);
    }
}
