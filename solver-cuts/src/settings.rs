//! Configuration settings for cut generation.

use crate::error::{CutError, CutResult};
use crate::numeric::NumericLimits;

/// Cut generator families, in the order they can be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratorKind {
    /// Lifted knapsack cover cuts.
    KnapsackCover,

    /// Mixed-integer rounding cuts.
    Mir,

    /// Flow cover cuts on implied variable upper bounds.
    FlowCover,

    /// All-different and circuit cuts.
    Structural,

    /// Square and product relaxation cuts.
    Nonlinear,
}

impl GeneratorKind {
    /// Every family in default priority order.
    pub const ALL: [GeneratorKind; 5] = [
        GeneratorKind::KnapsackCover,
        GeneratorKind::Mir,
        GeneratorKind::FlowCover,
        GeneratorKind::Structural,
        GeneratorKind::Nonlinear,
    ];

    /// Short human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            GeneratorKind::KnapsackCover => "knapsack_cover",
            GeneratorKind::Mir => "mir",
            GeneratorKind::FlowCover => "flow_cover",
            GeneratorKind::Structural => "structural",
            GeneratorKind::Nonlinear => "nonlinear",
        }
    }
}

/// Knapsack cover settings.
#[derive(Debug, Clone)]
pub struct KnapsackSettings {
    /// Skip rows whose cover would exceed this many items.
    pub max_cover_size: usize,

    /// Lift the cover inequality onto non-cover items.
    pub lift: bool,
}

impl Default for KnapsackSettings {
    fn default() -> Self {
        Self {
            max_cover_size: 256,
            lift: true,
        }
    }
}

/// MIR settings.
#[derive(Debug, Clone)]
pub struct MirSettings {
    /// Maximum number of base divisors tried per row.
    pub max_divisors: usize,

    /// Number of halvings tried on the best base divisor.
    pub halvings: u32,

    /// Largest denominator used when turning a divisor into a fraction.
    pub max_denominator: i64,

    /// Minimum fractional part of the scaled right-hand side. Rows closer to
    /// integrality than this give numerically poor cuts.
    pub min_fractionality: f64,
}

impl Default for MirSettings {
    fn default() -> Self {
        Self {
            max_divisors: 8,
            halvings: 3,
            max_denominator: 1 << 10,
            min_fractionality: 0.01,
        }
    }
}

/// Cut pool settings for one round.
#[derive(Debug, Clone)]
pub struct CutPoolSettings {
    /// Maximum cuts returned per round.
    pub max_cuts: usize,

    /// Weight of the efficacy (violation over norm) in the score.
    pub violation_weight: f64,

    /// Weight of the inverse support size in the score.
    pub sparsity_weight: f64,
}

impl Default for CutPoolSettings {
    fn default() -> Self {
        Self {
            max_cuts: 100,
            violation_weight: 1.0,
            sparsity_weight: 0.1,
        }
    }
}

/// Cut generation settings.
#[derive(Debug, Clone)]
pub struct CutSettings {
    // === Numerics ===
    /// Width in bits of the integer type cuts are handed over in.
    pub integer_width: u32,

    /// Headroom bits between the safe range and the type maximum.
    pub headroom_bits: u32,

    /// Absolute tolerance a cut's violation must exceed.
    pub violation_tolerance: f64,

    /// Tolerance for deciding that a relaxation value is integral.
    pub integrality_tolerance: f64,

    // === Scheduling ===
    /// Generators in the order they run. Duplicates are ignored.
    pub generator_order: Vec<GeneratorKind>,

    // === Generators ===
    /// Knapsack cover settings.
    pub knapsack: KnapsackSettings,

    /// MIR settings.
    pub mir: MirSettings,

    // === Pool ===
    /// Deduplication and ranking settings.
    pub pool: CutPoolSettings,
}

impl Default for CutSettings {
    fn default() -> Self {
        Self {
            // Numerics
            integer_width: 64,
            headroom_bits: NumericLimits::DEFAULT_HEADROOM_BITS,
            violation_tolerance: NumericLimits::DEFAULT_VIOLATION_TOLERANCE,
            integrality_tolerance: 1e-6,

            // Scheduling
            generator_order: GeneratorKind::ALL.to_vec(),

            // Generators
            knapsack: KnapsackSettings::default(),
            mir: MirSettings::default(),

            // Pool
            pool: CutPoolSettings::default(),
        }
    }
}

impl CutSettings {
    /// Set the maximum number of cuts per round.
    pub fn with_max_cuts(mut self, max_cuts: usize) -> Self {
        self.pool.max_cuts = max_cuts;
        self
    }

    /// Set the violation tolerance.
    pub fn with_violation_tolerance(mut self, tol: f64) -> Self {
        self.violation_tolerance = tol;
        self
    }

    /// Set the target integer width.
    pub fn with_integer_width(mut self, bits: u32) -> Self {
        self.integer_width = bits;
        self
    }

    /// Set the generator priority order.
    pub fn with_generator_order(mut self, order: impl Into<Vec<GeneratorKind>>) -> Self {
        self.generator_order = order.into();
        self
    }

    /// Numeric limits resolved from these settings.
    pub fn numeric_limits(&self) -> NumericLimits {
        NumericLimits::new(
            self.integer_width,
            self.headroom_bits,
            self.violation_tolerance,
        )
    }

    /// Check the settings for consistency.
    pub fn validate(&self) -> CutResult<()> {
        if !(8..=64).contains(&self.integer_width) {
            return Err(CutError::InvalidSettings(format!(
                "integer_width must be in 8..=64, got {}",
                self.integer_width
            )));
        }
        if !(self.violation_tolerance.is_finite() && self.violation_tolerance > 0.0) {
            return Err(CutError::InvalidSettings(
                "violation_tolerance must be positive and finite".to_string(),
            ));
        }
        if !(0.0..0.5).contains(&self.integrality_tolerance) {
            return Err(CutError::InvalidSettings(
                "integrality_tolerance must be in [0, 0.5)".to_string(),
            ));
        }
        if !(0.0..0.5).contains(&self.mir.min_fractionality) {
            return Err(CutError::InvalidSettings(
                "mir.min_fractionality must be in [0, 0.5)".to_string(),
            ));
        }
        if self.mir.max_denominator < 1 {
            return Err(CutError::InvalidSettings(
                "mir.max_denominator must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_validate() {
        let settings = CutSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.generator_order.len(), 5);
        assert_eq!(settings.generator_order[0], GeneratorKind::KnapsackCover);
    }

    #[test]
    fn test_invalid_settings() {
        let settings = CutSettings::default().with_integer_width(128);
        assert!(matches!(settings.validate(), Err(CutError::InvalidSettings(_))));

        let settings = CutSettings::default().with_violation_tolerance(0.0);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_numeric_limits_follow_settings() {
        let limits = CutSettings::default().with_integer_width(32).numeric_limits();
        assert_eq!(limits.integer_width, 32);
        assert_eq!(limits.max_magnitude, (1 << 30) - 1);
    }
}
