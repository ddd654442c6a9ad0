//! Per-round cut pool.
//!
//! Collects strengthened cuts for one round, including:
//! - Deduplication by canonical signature, keeping the more violated copy
//! - Scoring by efficacy and sparsity
//! - Stable ranking and truncation

use rustc_hash::FxHashMap;

use crate::model::{Cut, CutSignature};
use crate::settings::CutPoolSettings;

/// A cut with pool metadata.
#[derive(Debug, Clone)]
pub struct PooledCut {
    /// The cut.
    pub cut: Cut,

    /// Insertion order, used to break score ties.
    pub id: usize,

    /// Ranking score.
    pub score: f64,
}

/// Statistics for the round pool.
#[derive(Debug, Default, Clone)]
pub struct CutPoolStats {
    /// Distinct cuts added.
    pub total_added: usize,

    /// Duplicates seen (including replacements).
    pub duplicates: usize,

    /// Duplicates that replaced a less violated copy.
    pub replaced: usize,

    /// Cuts cut off by the per-round limit.
    pub truncated: usize,
}

/// Cut pool for a single round.
pub struct CutPool {
    /// Distinct cuts in insertion order.
    cuts: Vec<PooledCut>,

    /// Signature to position in `cuts`.
    index: FxHashMap<CutSignature, usize>,

    /// Settings.
    settings: CutPoolSettings,

    /// Statistics.
    stats: CutPoolStats,
}

impl CutPool {
    /// Create an empty pool.
    pub fn new(settings: CutPoolSettings) -> Self {
        Self {
            cuts: Vec::new(),
            index: FxHashMap::default(),
            settings,
            stats: CutPoolStats::default(),
        }
    }

    /// Add a cut.
    ///
    /// Returns the cut ID and whether it duplicates a cut already pooled.
    /// A more violated duplicate takes over the slot of the earlier copy.
    pub fn add(&mut self, cut: Cut) -> (usize, bool) {
        let signature = cut.constraint.signature();
        let score = self.score(&cut);

        if let Some(&slot) = self.index.get(&signature) {
            self.stats.duplicates += 1;
            let pooled = &mut self.cuts[slot];
            if cut.violation > pooled.cut.violation {
                pooled.cut = cut;
                pooled.score = score;
                self.stats.replaced += 1;
            }
            return (pooled.id, true);
        }

        let id = self.cuts.len();
        self.index.insert(signature, id);
        self.cuts.push(PooledCut { cut, id, score });
        self.stats.total_added += 1;
        (id, false)
    }

    /// Score of a cut: weighted efficacy plus weighted inverse support size.
    pub fn score(&self, cut: &Cut) -> f64 {
        let sparsity = match cut.support_size() {
            0 => 1.0,
            n => 1.0 / n as f64,
        };
        self.settings.violation_weight * cut.efficacy() + self.settings.sparsity_weight * sparsity
    }

    /// Number of distinct cuts.
    pub fn len(&self) -> usize {
        self.cuts.len()
    }

    /// Returns true if the pool holds no cuts.
    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }

    /// Pool statistics.
    pub fn stats(&self) -> &CutPoolStats {
        &self.stats
    }

    /// The best cuts by descending score, ties in insertion order, at most
    /// `max_cuts` of them.
    pub fn into_ranked(mut self) -> (Vec<Cut>, CutPoolStats) {
        self.cuts
            .sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
        let limit = self.settings.max_cuts;
        if self.cuts.len() > limit {
            self.stats.truncated = self.cuts.len() - limit;
            self.cuts.truncate(limit);
        }
        let ranked = self.cuts.into_iter().map(|p| p.cut).collect();
        (ranked, self.stats)
    }
}
