//! Batch solving of many records or timestamp rounds

use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::algorithms::locator::{Method, Solution, TdoaLocator};
use crate::core::Receiver;
use crate::processing::parser::{GeometryDocument, InputError, ParsedRecord};
use crate::utils::config::LocatorConfig;
use crate::validation::data::DataValidator;
use crate::validation::error::LocatorResult;

/// Result for one record or window
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub index: usize,
    pub result: LocatorResult<Solution>,
    /// Wall time spent validating and solving
    pub elapsed_us: u128,
}

impl BatchItem {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Aggregate over a finished batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub mean_elapsed_us: f64,
}

impl BatchSummary {
    pub fn from_items(items: &[BatchItem]) -> Self {
        let succeeded = items.iter().filter(|i| i.is_ok()).count();
        let mean_elapsed_us = if items.is_empty() {
            0.0
        } else {
            items.iter().map(|i| i.elapsed_us as f64).sum::<f64>() / items.len() as f64
        };
        Self {
            total: items.len(),
            succeeded,
            failed: items.len() - succeeded,
            mean_elapsed_us,
        }
    }
}

/// Runs the locator over independent inputs
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    locator: TdoaLocator,
    validator: DataValidator,
    method: Method,
    parallel: bool,
}

impl BatchProcessor {
    pub fn new(locator: TdoaLocator, method: Method) -> Self {
        Self {
            locator,
            validator: DataValidator::new(),
            method,
            parallel: false,
        }
    }

    pub fn from_config(config: &LocatorConfig, method: Method) -> Self {
        Self::new(config.solver.clone(), method).with_parallel(config.batch.parallel)
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_validator(mut self, validator: DataValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Validate and solve one receiver record.
    ///
    /// Validator warnings lead the solution's own warnings.
    pub fn solve(&self, receivers: &[Receiver]) -> LocatorResult<Solution> {
        let report = self.validator.validate_record(receivers)?;
        let mut solution = self.locator.locate(receivers, self.method)?;
        if !report.is_clean() {
            let mut warnings = report.warnings;
            warnings.append(&mut solution.estimate.warnings);
            solution.estimate.warnings = warnings;
        }
        Ok(solution)
    }

    fn run(&self, index: usize, record: &ParsedRecord) -> BatchItem {
        let start = Instant::now();
        let result = match record {
            Ok(receivers) => self.solve(receivers),
            Err(e) => Err(e.clone()),
        };
        let elapsed_us = start.elapsed().as_micros();

        if let Err(e) = &result {
            debug!(index, error = %e, "record failed");
        }
        BatchItem {
            index,
            result,
            elapsed_us,
        }
    }

    /// One item per record, in input order
    pub fn process_records(&self, records: &[ParsedRecord]) -> Vec<BatchItem> {
        let items: Vec<BatchItem> = if self.parallel {
            records.par_iter().enumerate().map(|(i, r)| self.run(i, r)).collect()
        } else {
            records.iter().enumerate().map(|(i, r)| self.run(i, r)).collect()
        };

        let summary = BatchSummary::from_items(&items);
        info!(
            total = summary.total,
            failed = summary.failed,
            mean_elapsed_us = summary.mean_elapsed_us,
            method = %self.method,
            "batch complete"
        );
        items
    }

    /// Static geometry with windowed timestamp averaging.
    ///
    /// Each window of `window_size` consecutive rounds yields one item, solved
    /// on its own copy of the station array.
    pub fn process_rounds(&self, document: &GeometryDocument, window_size: usize) -> Result<Vec<BatchItem>, InputError> {
        let geometry = document.receivers();
        let windows = average_windows(&document.rounds, window_size)?;

        let records: Vec<ParsedRecord> = windows
            .into_iter()
            .map(|window| {
                window.map(|timestamps| {
                    geometry
                        .iter()
                        .zip(timestamps)
                        .map(|(station, t)| station.with_timestamp(t))
                        .collect()
                })
            })
            .collect();

        Ok(self.process_records(&records))
    }
}

/// Mean timestamps over every window of `window_size` consecutive rounds.
///
/// Yields `rounds - window_size + 1` entries; a window containing a malformed
/// round carries that round's error.
pub fn average_windows(
    rounds: &[LocatorResult<Vec<f64>>],
    window_size: usize,
) -> Result<Vec<LocatorResult<Vec<f64>>>, InputError> {
    if window_size == 0 || window_size > rounds.len() {
        return Err(InputError::InvalidWindow {
            window: window_size,
            rounds: rounds.len(),
        });
    }

    Ok(rounds
        .windows(window_size)
        .map(|window| -> LocatorResult<Vec<f64>> {
            let mut sums: Vec<f64> = Vec::new();
            for round in window {
                let timestamps = round.as_ref().map_err(Clone::clone)?;
                if sums.is_empty() {
                    sums = vec![0.0; timestamps.len()];
                }
                for (sum, t) in sums.iter_mut().zip(timestamps) {
                    *sum += t;
                }
            }
            Ok(sums.into_iter().map(|s| s / window_size as f64).collect())
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::estimate::SolverKind;
    use crate::core::Position;
    use crate::processing::parser::Station;
    use crate::validation::data::ValidationConfig;
    use crate::validation::error::{LocatorError, SolveWarning};

    fn reference_receivers() -> Vec<Receiver> {
        vec![
            Receiver::new(0.0, 0.0, 5.0),
            Receiver::new(3.0, 1.0, 3.0),
            Receiver::new(0.0, 3.0, 10.0_f64.sqrt()),
            Receiver::new(6.0, 4.0, 3.0),
        ]
    }

    fn geometry(rounds: Vec<LocatorResult<Vec<f64>>>) -> GeometryDocument {
        let stations = reference_receivers()
            .into_iter()
            .enumerate()
            .map(|(i, r)| Station {
                name: format!("r{}", i),
                receiver: Receiver::at(r.x, r.y),
            })
            .collect();
        GeometryDocument { stations, rounds }
    }

    fn true_round(offset: f64) -> Vec<f64> {
        reference_receivers().iter().map(|r| r.timestamp + offset).collect()
    }

    #[test]
    fn test_failed_record_keeps_others() {
        let records: Vec<ParsedRecord> = vec![
            Ok(reference_receivers()),
            Err(LocatorError::malformed("gnb1", "expected 3 values, got 2")),
            Ok(reference_receivers()[..2].to_vec()),
            Ok(reference_receivers()[..3].to_vec()),
        ];
        let items = BatchProcessor::new(TdoaLocator::new(), Method::Linear).process_records(&records);

        assert_eq!(items.len(), 4);
        assert_eq!(items.iter().map(|i| i.index).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert!(items[0].is_ok());
        assert!(matches!(items[1].result, Err(LocatorError::MalformedMeasurement { .. })));
        assert!(matches!(items[2].result, Err(LocatorError::InsufficientReceivers { .. })));

        let exact = items[3].result.as_ref().unwrap();
        assert_eq!(exact.estimate.solver, SolverKind::Exact);
        assert!(exact.position().distance_to(&Position::new(3.0, 4.0)) < 1e-5);
    }

    #[test]
    fn test_validation_warnings_reach_the_item() {
        let mut receivers = reference_receivers();
        receivers.push(Receiver::new(0.0, 0.0, 5.0));
        let records: Vec<ParsedRecord> = vec![Ok(receivers)];

        let items = BatchProcessor::new(TdoaLocator::new(), Method::Linear).process_records(&records);
        let solution = items[0].result.as_ref().unwrap();
        assert!(solution.position().distance_to(&Position::new(3.0, 4.0)) < 1e-5);
        assert!(matches!(
            &solution.estimate.warnings[..],
            [SolveWarning::CoincidentReceivers { first: 0, second: 4, .. }]
        ));

        let strict = DataValidator::with_config(ValidationConfig {
            reject_coincident: true,
            ..Default::default()
        });
        let items = BatchProcessor::new(TdoaLocator::new(), Method::Linear)
            .with_validator(strict)
            .process_records(&records);
        assert!(matches!(items[0].result, Err(LocatorError::MalformedMeasurement { .. })));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let records: Vec<ParsedRecord> = (0..16)
            .map(|i| {
                if i % 5 == 0 {
                    Err(LocatorError::malformed("r0", "missing timestamp"))
                } else {
                    Ok(reference_receivers())
                }
            })
            .collect();

        let sequential = BatchProcessor::new(TdoaLocator::new(), Method::Nonlinear).process_records(&records);
        let parallel = BatchProcessor::new(TdoaLocator::new(), Method::Nonlinear)
            .with_parallel(true)
            .process_records(&records);

        assert_eq!(sequential.len(), parallel.len());
        for (s, p) in sequential.iter().zip(&parallel) {
            assert_eq!(s.index, p.index);
            assert_eq!(s.result, p.result);
        }
    }

    #[test]
    fn test_window_averaging() {
        let rounds = vec![Ok(vec![1.0, 2.0]), Ok(vec![3.0, 4.0]), Ok(vec![5.0, 9.0])];
        let windows = average_windows(&rounds, 2).unwrap();

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0], Ok(vec![2.0, 3.0]));
        assert_eq!(windows[1], Ok(vec![4.0, 6.5]));

        assert_eq!(average_windows(&rounds, 1).unwrap().len(), 3);
        assert_eq!(average_windows(&rounds, 3).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_window_size() {
        let rounds = vec![Ok(vec![1.0]), Ok(vec![2.0])];
        assert!(matches!(
            average_windows(&rounds, 0),
            Err(InputError::InvalidWindow { window: 0, rounds: 2 })
        ));
        assert!(matches!(
            average_windows(&rounds, 3),
            Err(InputError::InvalidWindow { window: 3, rounds: 2 })
        ));
    }

    #[test]
    fn test_malformed_round_poisons_its_windows() {
        let bad = LocatorError::malformed("r1", "missing timestamp");
        let rounds = vec![Ok(vec![1.0]), Err(bad.clone()), Ok(vec![2.0]), Ok(vec![4.0])];
        let windows = average_windows(&rounds, 2).unwrap();

        assert_eq!(windows[0], Err(bad.clone()));
        assert_eq!(windows[1], Err(bad));
        assert_eq!(windows[2], Ok(vec![3.0]));
    }

    #[test]
    fn test_process_rounds() {
        // A common offset on every station cancels in the time differences
        let document = geometry(vec![Ok(true_round(0.0)), Ok(true_round(2.0)), Ok(true_round(4.0))]);
        let items = BatchProcessor::new(TdoaLocator::new(), Method::Linear)
            .process_rounds(&document, 2)
            .unwrap();

        assert_eq!(items.len(), 2);
        for item in &items {
            let solution = item.result.as_ref().unwrap();
            assert!(solution.position().distance_to(&Position::new(3.0, 4.0)) < 1e-5);
        }
        // geometry is untouched
        assert!(document.stations.iter().all(|s| s.receiver.timestamp == 0.0));
    }

    #[test]
    fn test_summary() {
        let records: Vec<ParsedRecord> = vec![
            Ok(reference_receivers()),
            Err(LocatorError::malformed("r0", "missing timestamp")),
        ];
        let items = BatchProcessor::new(TdoaLocator::new(), Method::Linear).process_records(&records);
        let summary = BatchSummary::from_items(&items);

        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
    }
}
