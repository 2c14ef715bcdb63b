use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::{Receiver, MIN_RECEIVERS};
use crate::validation::error::{LocatorError, LocatorResult, SolveWarning};

/// Configuration for receiver record validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Minimum number of receivers in a record
    pub min_receivers: usize,
    /// Receivers closer than this (range units) count as coincident
    pub min_separation: f64,
    /// Reject coincident receivers instead of warning about them
    pub reject_coincident: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_receivers: MIN_RECEIVERS,
            min_separation: 1e-6,
            reject_coincident: false,
        }
    }
}

/// Outcome of validating one record; the warnings travel with the solve result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub warnings: Vec<SolveWarning>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Boundary checks applied to receiver records before they reach a solver
#[derive(Debug, Clone, Default)]
pub struct DataValidator {
    config: ValidationConfig,
}

impl DataValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Check a single numeric field of a station
    pub fn validate_value(station: &str, field: &str, value: f64) -> LocatorResult<f64> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(LocatorError::malformed(
                station,
                format!("{} is not a finite number ({})", field, value),
            ))
        }
    }

    /// Validate a complete record.
    ///
    /// Count and finiteness problems are errors; geometry oddities are
    /// reported as warnings unless `reject_coincident` is set.
    pub fn validate_record(&self, receivers: &[Receiver]) -> LocatorResult<ValidationReport> {
        if receivers.len() < self.config.min_receivers {
            return Err(LocatorError::InsufficientReceivers {
                available: receivers.len(),
                required: self.config.min_receivers,
            });
        }

        for (i, r) in receivers.iter().enumerate() {
            let station = format!("receiver {}", i);
            Self::validate_value(&station, "x", r.x)?;
            Self::validate_value(&station, "y", r.y)?;
            Self::validate_value(&station, "timestamp", r.timestamp)?;
        }

        let mut report = ValidationReport::default();
        for i in 0..receivers.len() {
            for j in (i + 1)..receivers.len() {
                let baseline = receivers[i].distance_to(&receivers[j].position());
                if baseline < self.config.min_separation {
                    if self.config.reject_coincident {
                        return Err(LocatorError::malformed(
                            format!("receiver {}", j),
                            format!("coincides with receiver {}", i),
                        ));
                    }
                    report.warnings.push(SolveWarning::CoincidentReceivers {
                        first: i,
                        second: j,
                        distance: baseline,
                    });
                    continue;
                }

                let tau = receivers[i].timestamp - receivers[j].timestamp;
                if tau.abs() > baseline {
                    report.warnings.push(SolveWarning::ImpossibleTimeDifference {
                        first: i,
                        second: j,
                        tau,
                        baseline,
                    });
                }
            }
        }

        for warning in &report.warnings {
            warn!("{}", warning);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_receivers() -> Vec<Receiver> {
        vec![
            Receiver::new(0.0, 0.0, 5.0),
            Receiver::new(3.0, 1.0, 3.0),
            Receiver::new(0.0, 3.0, 10.0_f64.sqrt()),
            Receiver::new(6.0, 4.0, 3.0),
        ]
    }

    #[test]
    fn test_valid_record() {
        let report = DataValidator::new().validate_record(&reference_receivers()).unwrap();
        assert!(report.is_clean());
    }

    #[test]
    fn test_insufficient_receivers() {
        let receivers = reference_receivers();
        assert_eq!(
            DataValidator::new().validate_record(&receivers[..2]),
            Err(LocatorError::InsufficientReceivers { available: 2, required: 3 })
        );
    }

    #[test]
    fn test_non_finite_value_rejected() {
        let mut receivers = reference_receivers();
        receivers[2].timestamp = f64::NAN;

        match DataValidator::new().validate_record(&receivers) {
            Err(LocatorError::MalformedMeasurement { field, reason }) => {
                assert_eq!(field, "receiver 2");
                assert!(reason.starts_with("timestamp"));
            }
            other => panic!("expected MalformedMeasurement, got {:?}", other),
        }
    }

    #[test]
    fn test_coincident_receivers() {
        let mut receivers = reference_receivers();
        receivers[3] = Receiver::new(0.0, 0.0, 4.0);

        let report = DataValidator::new().validate_record(&receivers).unwrap();
        assert!(matches!(
            &report.warnings[..],
            [SolveWarning::CoincidentReceivers { first: 0, second: 3, .. }]
        ));

        let strict = DataValidator::with_config(ValidationConfig {
            reject_coincident: true,
            ..Default::default()
        });
        assert!(matches!(
            strict.validate_record(&receivers),
            Err(LocatorError::MalformedMeasurement { .. })
        ));
    }

    #[test]
    fn test_impossible_time_difference() {
        let receivers = vec![
            Receiver::new(0.0, 0.0, 0.0),
            Receiver::new(1.0, 0.0, 5.0),
            Receiver::new(0.0, 10.0, 0.0),
        ];
        let report = DataValidator::new().validate_record(&receivers).unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert!(matches!(
            report.warnings[0],
            SolveWarning::ImpossibleTimeDifference { first: 0, second: 1, .. }
        ));
    }
}
