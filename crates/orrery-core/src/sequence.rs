//! Sequence interpretation: order modes and picking patterns to step lists

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::OrreryError;

/// One scheduled unit of the sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Single(usize),
    Cluster(Vec<usize>),
    Rest,
}

impl Step {
    /// Note indices sounded by this step (empty for a rest)
    pub fn indices(&self) -> &[usize] {
        match self {
            Self::Single(i) => std::slice::from_ref(i),
            Self::Cluster(ix) => ix,
            Self::Rest => &[],
        }
    }

    /// Wrap indices into `0..note_count`, collapsing degenerate clusters
    fn wrapped(&self, note_count: usize) -> Step {
        match self {
            Self::Single(i) => Self::Single(i % note_count),
            Self::Rest => Self::Rest,
            Self::Cluster(ix) => {
                let mut members: Vec<usize> = Vec::with_capacity(ix.len());
                for i in ix.iter().map(|i| i % note_count) {
                    if !members.contains(&i) {
                        members.push(i);
                    }
                }
                match members.len() {
                    0 => Self::Rest,
                    1 => Self::Single(members[0]),
                    _ => Self::Cluster(members),
                }
            }
        }
    }
}

/// Literal chord-builder picking presets, written against chord tones 0..=3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickingPattern {
    Alberti,
    Travis,
    Pinch,
    Strum,
    Waltz,
    Cascade,
    BassChord,
}

impl PickingPattern {
    pub const ALL: [PickingPattern; 7] = [
        Self::Alberti,
        Self::Travis,
        Self::Pinch,
        Self::Strum,
        Self::Waltz,
        Self::Cascade,
        Self::BassChord,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Alberti => "alberti",
            Self::Travis => "travis",
            Self::Pinch => "pinch",
            Self::Strum => "strum",
            Self::Waltz => "waltz",
            Self::Cascade => "cascade",
            Self::BassChord => "bass_chord",
        }
    }

    /// The preset's literal steps before wrapping to the note count
    pub fn steps(&self) -> Vec<Step> {
        use Step::{Cluster, Rest, Single};
        match self {
            Self::Alberti => vec![Single(0), Single(2), Single(1), Single(2)],
            Self::Travis => vec![Cluster(vec![0, 3]), Single(2), Single(1), Single(2)],
            Self::Pinch => vec![Cluster(vec![0, 3]), Rest, Cluster(vec![1, 2]), Rest],
            Self::Strum => vec![Cluster(vec![0, 1, 2, 3]), Rest, Rest, Cluster(vec![0, 1, 2, 3])],
            Self::Waltz => vec![Single(0), Cluster(vec![1, 2, 3]), Cluster(vec![1, 2, 3])],
            Self::Cascade => vec![Single(3), Single(2), Single(1), Single(0), Single(1), Single(2)],
            Self::BassChord => vec![Single(0), Cluster(vec![1, 2, 3]), Single(0), Cluster(vec![1, 2, 3])],
        }
    }
}

impl fmt::Display for PickingPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PickingPattern {
    type Err = OrreryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| OrreryError::UnknownPattern(s.to_string()))
    }
}

/// Order in which notes are walked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderMode {
    #[default]
    Forward,
    Reverse,
    /// Forward then back without repeating the endpoints
    Boomerang,
    /// Root interleaved with every other note, ending on the root
    Sequential,
    /// Shuffled once per regeneration
    Random,
    Picking(PickingPattern),
}

fn base_order(order: OrderMode, note_count: usize, rng: &mut fastrand::Rng) -> Vec<Step> {
    let n = note_count;
    match order {
        OrderMode::Forward => (0..n).map(Step::Single).collect(),
        OrderMode::Reverse => (0..n).rev().map(Step::Single).collect(),
        OrderMode::Boomerang => {
            let mut steps: Vec<Step> = (0..n).map(Step::Single).collect();
            if n > 2 {
                steps.extend((1..n - 1).rev().map(Step::Single));
            }
            steps
        }
        OrderMode::Sequential => {
            if n < 2 {
                return (0..n).map(Step::Single).collect();
            }
            let mut steps = Vec::with_capacity(2 * n - 1);
            for i in 1..n {
                steps.push(Step::Single(0));
                steps.push(Step::Single(i));
            }
            steps.push(Step::Single(0));
            steps
        }
        OrderMode::Random => {
            let mut indices: Vec<usize> = (0..n).collect();
            for i in (1..indices.len()).rev() {
                let j = rng.usize(0..=i);
                indices.swap(i, j);
            }
            indices.into_iter().map(Step::Single).collect()
        }
        OrderMode::Picking(pattern) => pattern.steps(),
    }
}

/// Build the step list for one cycle.
///
/// `cycle_length == 0` yields the order's natural length. Every index in the
/// result is below `note_count`; an empty note set yields an empty list.
pub fn generate(
    order: OrderMode,
    note_count: usize,
    cycle_length: usize,
    rng: &mut fastrand::Rng,
) -> Vec<Step> {
    if note_count == 0 {
        return Vec::new();
    }

    let base: Vec<Step> = base_order(order, note_count, rng)
        .iter()
        .map(|s| s.wrapped(note_count))
        .collect();
    if base.is_empty() {
        return Vec::new();
    }

    let len = if cycle_length == 0 { base.len() } else { cycle_length };
    (0..len).map(|k| base[k % base.len()].clone()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SequenceKey {
    order: OrderMode,
    note_count: usize,
    cycle_length: usize,
}

/// Caches the step list and regenerates only when its inputs change
#[derive(Debug)]
pub struct SequenceInterpreter {
    key: Option<SequenceKey>,
    steps: Vec<Step>,
    rng: fastrand::Rng,
    generation: u64,
}

impl Default for SequenceInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceInterpreter {
    pub fn new() -> Self {
        Self::with_rng(fastrand::Rng::new())
    }

    /// Deterministic shuffles, for tests and reproducible sessions
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(fastrand::Rng::with_seed(seed))
    }

    fn with_rng(rng: fastrand::Rng) -> Self {
        Self {
            key: None,
            steps: Vec::new(),
            rng,
            generation: 0,
        }
    }

    /// Current steps for these inputs, regenerating if any input changed
    pub fn steps(&mut self, order: OrderMode, note_count: usize, cycle_length: usize) -> &[Step] {
        let key = SequenceKey { order, note_count, cycle_length };
        if self.key != Some(key) {
            self.rebuild(key);
        }
        &self.steps
    }

    /// Force a new step list on the next call (re-shuffles random order)
    pub fn regenerate(&mut self) {
        self.key = None;
    }

    /// Number of times the list has been rebuilt
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn rebuild(&mut self, key: SequenceKey) {
        self.steps = generate(key.order, key.note_count, key.cycle_length, &mut self.rng);
        self.key = Some(key);
        self.generation += 1;
        debug!(
            order = ?key.order,
            notes = key.note_count,
            steps = self.steps.len(),
            "Regenerated step list"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn singles(steps: &[Step]) -> Vec<usize> {
        steps
            .iter()
            .map(|s| match s {
                Step::Single(i) => *i,
                other => panic!("expected single, got {other:?}"),
            })
            .collect()
    }

    fn rng() -> fastrand::Rng {
        fastrand::Rng::with_seed(7)
    }

    #[test]
    fn test_reverse_cycle() {
        let steps = generate(OrderMode::Reverse, 4, 4, &mut rng());
        assert_eq!(singles(&steps), vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_forward_wraps_to_cycle_length() {
        let steps = generate(OrderMode::Forward, 3, 7, &mut rng());
        assert_eq!(singles(&steps), vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_boomerang_skips_endpoints_on_return() {
        let steps = generate(OrderMode::Boomerang, 4, 0, &mut rng());
        assert_eq!(singles(&steps), vec![0, 1, 2, 3, 2, 1]);
        let steps = generate(OrderMode::Boomerang, 2, 0, &mut rng());
        assert_eq!(singles(&steps), vec![0, 1]);
    }

    #[test]
    fn test_sequential_interleaves_root() {
        let steps = generate(OrderMode::Sequential, 4, 0, &mut rng());
        assert_eq!(singles(&steps), vec![0, 1, 0, 2, 0, 3, 0]);
    }

    #[test]
    fn test_random_is_permutation() {
        let steps = generate(OrderMode::Random, 8, 0, &mut rng());
        let mut indices = singles(&steps);
        indices.sort();
        assert_eq!(indices, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_notes_yield_no_steps() {
        assert!(generate(OrderMode::Forward, 0, 8, &mut rng()).is_empty());
    }

    #[test]
    fn test_picking_clusters_wrap_and_dedupe() {
        let steps = generate(OrderMode::Picking(PickingPattern::Travis), 3, 0, &mut rng());
        assert_eq!(steps[0], Step::Cluster(vec![0]).wrapped(3));
        assert_eq!(steps[0], Step::Single(0));

        let steps = generate(OrderMode::Picking(PickingPattern::Strum), 2, 0, &mut rng());
        assert_eq!(steps[0], Step::Cluster(vec![0, 1]));
        assert_eq!(steps[1], Step::Rest);
    }

    #[test]
    fn test_all_indices_in_range() {
        for pattern in PickingPattern::ALL {
            for n in 1..6 {
                for step in generate(OrderMode::Picking(pattern), n, 16, &mut rng()) {
                    assert!(step.indices().iter().all(|&i| i < n));
                }
            }
        }
    }

    #[test]
    fn test_interpreter_regenerates_only_on_key_change() {
        let mut interp = SequenceInterpreter::with_seed(3);
        let first = interp.steps(OrderMode::Random, 6, 0).to_vec();
        let again = interp.steps(OrderMode::Random, 6, 0).to_vec();
        assert_eq!(first, again);
        assert_eq!(interp.generation(), 1);

        interp.steps(OrderMode::Random, 7, 0);
        assert_eq!(interp.generation(), 2);

        interp.regenerate();
        interp.steps(OrderMode::Random, 7, 0);
        assert_eq!(interp.generation(), 3);
    }

    #[test]
    fn test_pattern_names_round_trip() {
        for pattern in PickingPattern::ALL {
            assert_eq!(pattern.name().parse::<PickingPattern>().unwrap(), pattern);
        }
        assert!("flamenco".parse::<PickingPattern>().is_err());
    }
}
