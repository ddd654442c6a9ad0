//! Cut manager.
//!
//! Runs the configured generators in priority order for one round, passes
//! every candidate through the strengthener, and returns the deduplicated,
//! ranked and truncated cut list.

pub mod pool;

pub use pool::{CutPool, CutPoolStats, PooledCut};

use rustc_hash::FxHashSet;

use crate::cuts::{create_generator, CutGenerator};
use crate::error::{CutError, CutResult};
use crate::model::{Constraint, Cut};
use crate::numeric::{NumericGuard, NumericLimits};
use crate::relaxation::{RelaxationSnapshot, TimeLimit};
use crate::settings::CutSettings;
use crate::strengthen::{StrengthenStats, Strengthener};

/// Statistics accumulated over all rounds.
#[derive(Debug, Default, Clone)]
pub struct CutManagerStats {
    /// Completed rounds.
    pub rounds: u64,

    /// Rounds cut short by the time limit.
    pub interrupted_rounds: u64,

    /// Raw candidates produced by the generators.
    pub candidates: usize,

    /// Candidates dropped by the strengthener.
    pub dropped: usize,

    /// Strengthened cuts no longer violated.
    pub not_violated: usize,

    /// Duplicate cuts merged in the pool.
    pub duplicates: usize,

    /// Cuts dropped by the per-round limit.
    pub truncated: usize,

    /// Cuts returned to the driver.
    pub cuts_returned: usize,

    /// Operations that left the safe numeric range.
    pub overflow_events: u64,

    /// Generator invocations aborted by a malformed constraint.
    pub malformed_constraints: usize,
}

/// Runs cut rounds over a fixed set of generators.
pub struct CutManager {
    /// Settings.
    settings: CutSettings,

    /// Limits resolved from the settings.
    limits: NumericLimits,

    /// Generators in priority order.
    generators: Vec<Box<dyn CutGenerator>>,

    /// Candidate strengthening.
    strengthener: Strengthener,

    /// Round of the last snapshot processed.
    completed_round: Option<u64>,

    /// Statistics.
    stats: CutManagerStats,
}

impl CutManager {
    /// Create a manager running the generators named in
    /// `settings.generator_order`.
    ///
    /// # Errors
    ///
    /// `InvalidSettings` if the settings fail validation.
    pub fn new(settings: CutSettings) -> CutResult<Self> {
        let mut seen = FxHashSet::default();
        let generators = settings
            .generator_order
            .iter()
            .filter(|kind| seen.insert(**kind))
            .map(|&kind| create_generator(kind, &settings))
            .collect();
        Self::with_generators(settings, generators)
    }

    /// Create a manager running `generators` in the given order.
    ///
    /// # Errors
    ///
    /// `InvalidSettings` if the settings fail validation.
    pub fn with_generators(
        settings: CutSettings,
        generators: Vec<Box<dyn CutGenerator>>,
    ) -> CutResult<Self> {
        settings.validate()?;
        Ok(Self {
            limits: settings.numeric_limits(),
            strengthener: Strengthener::new(&settings),
            settings,
            generators,
            completed_round: None,
            stats: CutManagerStats::default(),
        })
    }

    /// Append a generator after the configured ones.
    pub fn add_generator(&mut self, generator: Box<dyn CutGenerator>) {
        self.generators.push(generator);
    }

    /// Run one cut round at `snapshot`.
    ///
    /// Returns at most `pool.max_cuts` distinct cuts, each valid and violated
    /// by more than the tolerance, best first. When `time_limit` expires the
    /// cuts found so far are returned.
    ///
    /// # Errors
    ///
    /// `StaleSnapshot` if the snapshot's round is not newer than the last
    /// round this manager completed.
    pub fn run_round(
        &mut self,
        snapshot: &RelaxationSnapshot,
        constraints: &[Constraint],
        time_limit: &dyn TimeLimit,
    ) -> CutResult<Vec<Cut>> {
        if let Some(completed) = self.completed_round {
            if snapshot.round() <= completed {
                return Err(CutError::StaleSnapshot {
                    snapshot_round: snapshot.round(),
                    completed_round: completed,
                });
            }
        }

        let guard = NumericGuard::new(self.limits);
        let mut pool = CutPool::new(self.settings.pool.clone());
        let mut interrupted = false;

        for generator in self.generators.iter_mut() {
            if time_limit.limit_reached() {
                log::info!(
                    "Round {}: time limit reached before {}",
                    snapshot.round(),
                    generator.name()
                );
                interrupted = true;
                break;
            }

            let candidates = match generator.generate(snapshot, constraints, &guard) {
                Ok(candidates) => candidates,
                Err(CutError::MalformedConstraint(reason)) => {
                    log::warn!("{} skipped: {}", generator.name(), reason);
                    self.stats.malformed_constraints += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            log::trace!("{} produced {} candidates", generator.name(), candidates.len());
            self.stats.candidates += candidates.len();

            for raw in candidates {
                let Some(cut) = self.strengthener.strengthen(raw, snapshot, &guard) else {
                    self.stats.dropped += 1;
                    continue;
                };
                if !guard.is_violated(cut.violation) {
                    self.stats.not_violated += 1;
                    continue;
                }
                pool.add(cut);
            }
        }

        let (cuts, pool_stats) = pool.into_ranked();
        let overflow_events = guard.take_overflow_events();

        self.completed_round = Some(snapshot.round());
        self.stats.rounds += 1;
        self.stats.interrupted_rounds += u64::from(interrupted);
        self.stats.duplicates += pool_stats.duplicates;
        self.stats.truncated += pool_stats.truncated;
        self.stats.cuts_returned += cuts.len();
        self.stats.overflow_events += overflow_events;

        log::debug!(
            "Round {}: {} cuts ({} duplicates, {} truncated, {} overflow events)",
            snapshot.round(),
            cuts.len(),
            pool_stats.duplicates,
            pool_stats.truncated,
            overflow_events
        );

        Ok(cuts)
    }

    /// Round of the last snapshot processed.
    pub fn completed_round(&self) -> Option<u64> {
        self.completed_round
    }

    /// Names of the generators in run order.
    pub fn generator_names(&self) -> Vec<&str> {
        self.generators.iter().map(|g| g.name()).collect()
    }

    /// Settings.
    pub fn settings(&self) -> &CutSettings {
        &self.settings
    }

    /// Round statistics.
    pub fn stats(&self) -> &CutManagerStats {
        &self.stats
    }

    /// Strengthener statistics.
    pub fn strengthen_stats(&self) -> &StrengthenStats {
        self.strengthener.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cuts::GeneratorStats;
    use crate::model::{LinearConstraint, RawCut};
    use crate::relaxation::{NoTimeLimit, SnapshotBuilder, WallClockLimit};
    use crate::settings::GeneratorKind;

    /// Fails on every call.
    struct Failing(GeneratorStats);

    impl CutGenerator for Failing {
        fn kind(&self) -> GeneratorKind {
            GeneratorKind::Structural
        }

        fn name(&self) -> &str {
            "failing"
        }

        fn generate(
            &mut self,
            _snapshot: &RelaxationSnapshot,
            _constraints: &[Constraint],
            _guard: &NumericGuard,
        ) -> CutResult<Vec<RawCut>> {
            Err(CutError::MalformedConstraint("always".to_string()))
        }

        fn stats(&self) -> &GeneratorStats {
            &self.0
        }
    }

    fn knapsack_instance(round: u64) -> (RelaxationSnapshot, Vec<Constraint>) {
        let mut builder = SnapshotBuilder::new(round);
        let x1 = builder.add_binary(1.0);
        let x2 = builder.add_binary(0.8);
        let x3 = builder.add_binary(1.0);
        let x4 = builder.add_binary(0.5);
        let snapshot = builder.build();
        let row = LinearConstraint::less_or_equal([(3, x1), (5, x2), (4, x3), (6, x4)], 10).unwrap();
        (snapshot, vec![row.into()])
    }

    #[test]
    fn test_default_generator_order() {
        let manager = CutManager::new(CutSettings::default()).unwrap();
        assert_eq!(
            manager.generator_names(),
            vec!["knapsack_cover", "mir", "flow_cover", "structural", "nonlinear"]
        );
    }

    #[test]
    fn test_duplicate_kinds_are_ignored() {
        let settings = CutSettings::default().with_generator_order([
            GeneratorKind::Mir,
            GeneratorKind::Mir,
            GeneratorKind::KnapsackCover,
        ]);
        let manager = CutManager::new(settings).unwrap();
        assert_eq!(manager.generator_names(), vec!["mir", "knapsack_cover"]);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let settings = CutSettings::default().with_violation_tolerance(-1.0);
        assert!(matches!(
            CutManager::new(settings),
            Err(CutError::InvalidSettings(_))
        ));
    }

    #[test]
    fn test_stale_snapshot() {
        let mut manager = CutManager::new(CutSettings::default()).unwrap();
        let (snapshot, constraints) = knapsack_instance(3);
        manager.run_round(&snapshot, &constraints, &NoTimeLimit).unwrap();
        assert_eq!(manager.completed_round(), Some(3));

        let err = manager
            .run_round(&snapshot, &constraints, &NoTimeLimit)
            .unwrap_err();
        assert_eq!(
            err,
            CutError::StaleSnapshot {
                snapshot_round: 3,
                completed_round: 3
            }
        );

        let (next, constraints) = knapsack_instance(4);
        assert!(manager.run_round(&next, &constraints, &NoTimeLimit).is_ok());
    }

    #[test]
    fn test_malformed_generator_does_not_abort_round() {
        let settings = CutSettings::default().with_generator_order([GeneratorKind::KnapsackCover]);
        let mut manager = CutManager::new(settings).unwrap();
        manager.add_generator(Box::new(Failing(GeneratorStats::default())));

        let (snapshot, constraints) = knapsack_instance(0);
        let cuts = manager.run_round(&snapshot, &constraints, &NoTimeLimit).unwrap();
        assert!(!cuts.is_empty());
        assert_eq!(manager.stats().malformed_constraints, 1);
    }

    #[test]
    fn test_zero_time_limit_returns_nothing() {
        let mut manager = CutManager::new(CutSettings::default()).unwrap();
        let (snapshot, constraints) = knapsack_instance(0);
        let cuts = manager
            .run_round(&snapshot, &constraints, &WallClockLimit::from_millis(0))
            .unwrap();
        assert!(cuts.is_empty());
        assert_eq!(manager.stats().interrupted_rounds, 1);
    }
}
