//! Pairwise preference ranking: collect human A/B judgments over items and
//! turn them into a global strength ranking via the Bradley-Terry model
//! (iterative MM fixed point), with a plain win-rate ranking as baseline.

use nalgebra::DVector;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::{self, Debug, Display};
use std::hash::Hash;
use thiserror::Error;

/// Default item identifier type.
pub type ItemId = String;

#[derive(Error, Debug)]
pub enum RankError {
    #[error("Invalid comparison: both items are the same")]
    InvalidComparison,
    #[error("No comparison records to rank")]
    EmptyInput,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Outcome of one human judgment over an (A, B) pair.
///
/// `None` means the judge saw the pair but preferred neither side; it still
/// counts as a comparison of the pair but awards no win credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Outcome {
    #[cfg_attr(feature = "serde", serde(rename = "A"))]
    AWins,
    #[cfg_attr(feature = "serde", serde(rename = "B"))]
    BWins,
    #[cfg_attr(feature = "serde", serde(rename = "draw"))]
    Draw,
    #[cfg_attr(feature = "serde", serde(rename = "none"))]
    None,
}

impl Outcome {
    /// Win credit awarded to (item_a, item_b) by a record with this outcome.
    pub fn credit(self) -> (f64, f64) {
        match self {
            Outcome::AWins => (1.0, 0.0),
            Outcome::BWins => (0.0, 1.0),
            Outcome::Draw => (0.5, 0.5),
            Outcome::None => (0.0, 0.0),
        }
    }
}

/// One recorded judgment: an unordered item pair and its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComparisonRecord<T> {
    /// Display-only context shown to the judge; ignored by the engine.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub prompt: Option<String>,
    pub item_a: T,
    pub item_b: T,
    pub outcome: Outcome,
}

impl<T> ComparisonRecord<T> {
    pub fn new(item_a: T, item_b: T, outcome: Outcome) -> Self {
        ComparisonRecord {
            prompt: None,
            item_a,
            item_b,
            outcome,
        }
    }
}

impl<T: Display> fmt::Display for ComparisonRecord<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            Outcome::AWins => write!(f, "{} > {}", self.item_a, self.item_b),
            Outcome::BWins => write!(f, "{} < {}", self.item_a, self.item_b),
            Outcome::Draw => write!(f, "{} = {}", self.item_a, self.item_b),
            Outcome::None => write!(f, "{} ? {}", self.item_a, self.item_b),
        }
    }
}

/// Append-only store of validated comparison records for one session.
///
/// Records accumulate as judgments are made and are discarded wholesale via
/// `clear()` when a new comparison set is loaded. No deletion or mutation of
/// individual records is supported.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComparisonStore<T> {
    records: Vec<ComparisonRecord<T>>,
}

impl<T> Default for ComparisonStore<T> {
    fn default() -> Self {
        ComparisonStore {
            records: Vec::new(),
        }
    }
}

impl<T: Clone + Debug + Eq + Ord + Hash + Display> ComparisonStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a judgment. Rejects records comparing an item against itself.
    pub fn add(&mut self, record: ComparisonRecord<T>) -> Result<(), RankError> {
        if record.item_a == record.item_b {
            return Err(RankError::InvalidComparison);
        }
        self.records.push(record);
        Ok(())
    }

    /// Snapshot of all records as of the call, in insertion order.
    ///
    /// An owned copy, not a live view: the caller cannot observe later
    /// appends through it.
    pub fn records(&self) -> Vec<ComparisonRecord<T>> {
        self.records.clone()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Discard the session's records; used when a new set is loaded.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Rank the current record set. Shorthand for `rank(&store.records(), config)`.
    pub fn rank(&self, config: &RankConfig) -> Result<RankingReport<T>, RankError> {
        rank(&self.records, config)
    }
}

/// A not-yet-judged pairing from the upstream prompt file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PendingComparison {
    pub prompt: String,
    #[cfg_attr(feature = "serde", serde(rename = "responseA"))]
    pub response_a: String,
    #[cfg_attr(feature = "serde", serde(rename = "responseB"))]
    pub response_b: String,
    #[cfg_attr(feature = "serde", serde(rename = "idA"))]
    pub id_a: ItemId,
    #[cfg_attr(feature = "serde", serde(rename = "idB"))]
    pub id_b: ItemId,
}

impl PendingComparison {
    /// Resolve this pending pairing into a record carrying its prompt.
    pub fn judged(&self, outcome: Outcome) -> ComparisonRecord<ItemId> {
        ComparisonRecord {
            prompt: Some(self.prompt.clone()),
            item_a: self.id_a.clone(),
            item_b: self.id_b.clone(),
            outcome,
        }
    }
}

/// Cursor over a finite, restartable sequence of pending judgments.
///
/// Exhaustion is a terminal state reported by `advance()` returning `None`,
/// not an error. `rewind()` restarts the sequence from the beginning.
#[derive(Debug, Clone, Default)]
pub struct PromptQueue {
    pending: Vec<PendingComparison>,
    position: usize,
}

impl PromptQueue {
    pub fn new(pending: Vec<PendingComparison>) -> Self {
        PromptQueue {
            pending,
            position: 0,
        }
    }

    /// Return the next pending judgment and move the cursor past it.
    pub fn advance(&mut self) -> Option<&PendingComparison> {
        let item = self.pending.get(self.position)?;
        self.position += 1;
        Some(item)
    }

    pub fn rewind(&mut self) {
        self.position = 0;
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.pending.len() - self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.pending.len()
    }
}

#[cfg(feature = "serde")]
impl PromptQueue {
    /// Parse a newline-delimited JSON prompt file.
    ///
    /// Each line must carry `prompt`, `responseA`, `responseB`, `idA`, `idB`,
    /// and the two IDs must differ. A blank line terminates the stream.
    pub fn from_jsonl(input: &str) -> Result<Self, RankError> {
        let mut pending = Vec::new();
        for (line_no, line) in input.lines().enumerate() {
            if line.is_empty() {
                break;
            }
            let item: PendingComparison = serde_json::from_str(line)
                .map_err(|e| RankError::Parse(format!("line {}: {}", line_no + 1, e)))?;
            if item.id_a == item.id_b {
                return Err(RankError::Parse(format!(
                    "line {}: idA and idB are both {:?}",
                    line_no + 1,
                    item.id_a
                )));
            }
            pending.push(item);
        }
        Ok(PromptQueue::new(pending))
    }
}

/// How a compared pair weighs into the MM denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PairWeighting {
    /// A compared pair contributes weight 1 no matter how often it repeats,
    /// so repeat judgments of the same pair add no denominator weight.
    #[default]
    Existence,
    /// Standard Bradley-Terry MM: weight by the number of comparisons of
    /// the pair.
    Count,
}

/// Solver configuration, supplied by the caller.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankConfig {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub weighting: PairWeighting,
}

impl Default for RankConfig {
    fn default() -> Self {
        RankConfig {
            max_iterations: 1000,
            tolerance: 1e-6,
            weighting: PairWeighting::Existence,
        }
    }
}

impl RankConfig {
    fn validate(&self) -> Result<(), RankError> {
        if self.max_iterations == 0 {
            return Err(RankError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(RankError::InvalidConfig(
                "tolerance must be a positive finite number".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of one ranking request.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankingReport<T: Eq + Hash> {
    /// Win-rate baseline: `(item, wins / total_records)`, descending, ties
    /// kept in first-seen order. A diagnostic, not a strength estimate.
    pub baseline: Vec<(T, f64)>,
    /// Bradley-Terry strengths scaled so they sum to 100.
    pub strengths: HashMap<T, f64>,
    /// Sweeps the solver actually ran.
    pub iterations_used: usize,
    /// False when the iteration cap was hit before the tolerance was met.
    /// A quality signal, not a failure.
    pub converged: bool,
}

#[cfg(feature = "serde")]
impl<T: Eq + Hash + serde::Serialize> RankingReport<T> {
    pub fn to_json(&self) -> Result<String, RankError> {
        serde_json::to_string_pretty(self).map_err(|e| RankError::Serialization(e.to_string()))
    }
}

/// Aggregated statistics over one record set. Rebuilt from scratch on every
/// ranking request, never incrementally updated.
struct Aggregates<T> {
    /// All item identifiers, lexicographically sorted. Fixes the solver's
    /// iteration and summation order so results are reproducible.
    items: Vec<T>,
    index_of: HashMap<T, usize>,
    /// Win credit per item, indexed as `items`.
    wins: Vec<f64>,
    /// Unordered pair (lo, hi) -> MM weight.
    pair_weights: HashMap<(usize, usize), f64>,
    /// Items in first-seen record order, for baseline tie-breaking.
    first_seen: Vec<T>,
    total_records: usize,
}

fn aggregate<T: Clone + Eq + Ord + Hash>(
    records: &[ComparisonRecord<T>],
    weighting: PairWeighting,
) -> Aggregates<T> {
    let mut sorted = BTreeSet::new();
    let mut seen = HashSet::new();
    let mut first_seen = Vec::new();
    for record in records {
        for item in [&record.item_a, &record.item_b] {
            sorted.insert(item.clone());
            if seen.insert(item.clone()) {
                first_seen.push(item.clone());
            }
        }
    }

    let items: Vec<T> = sorted.into_iter().collect();
    let index_of: HashMap<T, usize> = items
        .iter()
        .cloned()
        .enumerate()
        .map(|(idx, item)| (item, idx))
        .collect();

    let mut wins = vec![0.0; items.len()];
    let mut pair_weights: HashMap<(usize, usize), f64> = HashMap::new();
    for record in records {
        let a = index_of[&record.item_a];
        let b = index_of[&record.item_b];
        let (credit_a, credit_b) = record.outcome.credit();
        wins[a] += credit_a;
        wins[b] += credit_b;

        let key = (a.min(b), a.max(b));
        match weighting {
            PairWeighting::Existence => {
                pair_weights.insert(key, 1.0);
            }
            PairWeighting::Count => {
                *pair_weights.entry(key).or_insert(0.0) += 1.0;
            }
        }
    }

    Aggregates {
        items,
        index_of,
        wins,
        pair_weights,
        first_seen,
        total_records: records.len(),
    }
}

fn baseline_ranking<T: Clone + Eq + Hash>(agg: &Aggregates<T>) -> Vec<(T, f64)> {
    let total = agg.total_records as f64;
    let mut ranking: Vec<(T, f64)> = agg
        .first_seen
        .iter()
        .map(|item| (item.clone(), agg.wins[agg.index_of[item]] / total))
        .collect();

    // Stable sort: equal frequencies keep first-seen order.
    ranking.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranking
}

/// MM fixed-point iteration for Bradley-Terry strengths.
///
/// Sweeps items in sorted order, updating in place (already-updated entries
/// feed later ones within a sweep), renormalizing to the simplex after every
/// sweep. An item whose denominator vanishes is assigned strength 0 and drops
/// out of later denominator terms, so disconnected comparison graphs never
/// divide by zero. When no record awards any credit the vector collapses to
/// all zeros and stays there.
fn estimate_strengths<T>(agg: &Aggregates<T>, config: &RankConfig) -> (DVector<f64>, usize, bool) {
    let n = agg.items.len();
    let mut s = DVector::from_element(n, 1.0 / n as f64);

    let mut neighbors: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    for (&(a, b), &weight) in &agg.pair_weights {
        neighbors[a].push((b, weight));
        neighbors[b].push((a, weight));
    }
    // Deterministic summation order regardless of map iteration order.
    for list in &mut neighbors {
        list.sort_unstable_by_key(|&(j, _)| j);
    }

    let mut iterations_used = config.max_iterations;
    let mut converged = false;

    for iteration in 0..config.max_iterations {
        let s_prev = s.clone();

        for i in 0..n {
            let mut denom = 0.0;
            for &(j, weight) in &neighbors[i] {
                let pair_mass = s[i] + s[j];
                if pair_mass > 0.0 {
                    denom += weight / pair_mass;
                }
            }
            s[i] = if denom > 0.0 { agg.wins[i] / denom } else { 0.0 };
        }

        let total = s.sum();
        if total > 0.0 {
            s /= total;
        }

        let delta: f64 = s
            .iter()
            .zip(s_prev.iter())
            .map(|(new, old)| (new - old).abs())
            .sum();
        if delta < config.tolerance {
            iterations_used = iteration + 1;
            converged = true;
            break;
        }
    }

    (s, iterations_used, converged)
}

/// Rank a record set: win-rate baseline plus Bradley-Terry strengths.
///
/// Pure function of its inputs; identical records and config yield
/// bit-for-bit identical output.
pub fn rank<T>(
    records: &[ComparisonRecord<T>],
    config: &RankConfig,
) -> Result<RankingReport<T>, RankError>
where
    T: Clone + Debug + Eq + Ord + Hash + Display,
{
    config.validate()?;
    if records.is_empty() {
        return Err(RankError::EmptyInput);
    }

    let agg = aggregate(records, config.weighting);
    let baseline = baseline_ranking(&agg);
    let (s, iterations_used, converged) = estimate_strengths(&agg, config);

    let strengths: HashMap<T, f64> = agg
        .items
        .iter()
        .cloned()
        .zip(s.iter().map(|v| v * 100.0))
        .collect();

    Ok(RankingReport {
        baseline,
        strengths,
        iterations_used,
        converged,
    })
}
