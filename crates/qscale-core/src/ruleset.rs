//! Scaling rulesets — pure formulas turning a queue depth into a replica count.
//!
//! Every variant implements the same contract:
//!
//! ```text
//! compute_candidate(depth, current) -> candidate
//! ```
//!
//! Rounding is half-away-from-zero (`f64::round`) for every variant that
//! works in floating point. Linear and logarithmic rulesets clamp the rounded
//! value to `[min_count, max_count]` and then apply hysteresis: a candidate
//! closer than `step_threshold` to the current count is replaced by the
//! current count.

use std::fmt;

use crate::error::RulesetError;

/// One threshold of a step-limit ruleset: from `min_depth` messages on,
/// `count` replicas are wanted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepRule {
    pub min_depth: u64,
    pub count: u32,
}

impl StepRule {
    pub fn new(min_depth: u64, count: u32) -> Self {
        Self { min_depth, count }
    }
}

/// Step function over queue depth.
///
/// Rules are sorted by threshold and always start at `min_depth == 0`, so
/// every depth has exactly one applicable rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepLimit {
    rules: Vec<StepRule>,
}

impl StepLimit {
    /// Build a step-limit ruleset.
    ///
    /// Rules are sorted by threshold. When no rule starts at zero, one is
    /// synthesized with the count of the smallest threshold. Duplicate
    /// thresholds and counts that decrease with a growing threshold are
    /// rejected.
    pub fn new(mut rules: Vec<StepRule>) -> Result<Self, RulesetError> {
        if rules.is_empty() {
            return Err(RulesetError::NoRules);
        }

        rules.sort_by_key(|r| r.min_depth);

        for pair in rules.windows(2) {
            let (lower, upper) = (pair[0], pair[1]);
            if lower.min_depth == upper.min_depth {
                return Err(RulesetError::DuplicateThreshold(upper.min_depth));
            }
            if upper.count < lower.count {
                return Err(RulesetError::DecreasingCount {
                    threshold: upper.min_depth,
                    from: lower.count,
                    to: upper.count,
                });
            }
        }

        if rules[0].min_depth != 0 {
            let smallest = rules[0].count;
            rules.insert(0, StepRule::new(0, smallest));
        }

        Ok(Self { rules })
    }

    /// The normalized rules, sorted ascending by threshold.
    pub fn rules(&self) -> &[StepRule] {
        &self.rules
    }

    /// Count of the rule with the largest threshold `<= depth`.
    pub fn compute(&self, depth: u64) -> u32 {
        let idx = self.rules.partition_point(|r| r.min_depth <= depth);
        // rules[0].min_depth == 0 is established in `new`, so idx >= 1.
        assert!(idx > 0, "step-limit ruleset has no rule for depth {depth}");
        self.rules[idx - 1].count
    }
}

/// `round(depth * factor)`, clamped, with hysteresis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    factor: f64,
    step_threshold: u32,
    min_count: u32,
    max_count: u32,
}

impl LinearScale {
    pub fn new(
        factor: f64,
        step_threshold: u32,
        min_count: u32,
        max_count: u32,
    ) -> Result<Self, RulesetError> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(RulesetError::InvalidParameter {
                field: "factor",
                requirement: "a finite number greater than 0",
                value: factor.to_string(),
            });
        }
        check_bounds(step_threshold, min_count, max_count)?;
        Ok(Self {
            factor,
            step_threshold,
            min_count,
            max_count,
        })
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn step_threshold(&self) -> u32 {
        self.step_threshold
    }

    pub fn min_count(&self) -> u32 {
        self.min_count
    }

    pub fn max_count(&self) -> u32 {
        self.max_count
    }

    /// The clamped candidate before hysteresis is applied.
    pub fn raw(&self, depth: u64) -> u32 {
        round_clamp(depth as f64 * self.factor, self.min_count, self.max_count)
    }

    pub fn compute(&self, depth: u64, current: u32) -> u32 {
        hysteresis(current, self.raw(depth), self.step_threshold)
    }
}

/// `round(log_base(max(depth, 1)) + offset)`, clamped, with hysteresis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogScale {
    base: f64,
    step_threshold: u32,
    min_count: u32,
    max_count: u32,
    offset: i32,
}

impl LogScale {
    pub fn new(
        base: f64,
        step_threshold: u32,
        min_count: u32,
        max_count: u32,
        offset: i32,
    ) -> Result<Self, RulesetError> {
        if !base.is_finite() || base <= 1.0 {
            return Err(RulesetError::InvalidParameter {
                field: "base",
                requirement: "a finite number greater than 1",
                value: base.to_string(),
            });
        }
        check_bounds(step_threshold, min_count, max_count)?;
        Ok(Self {
            base,
            step_threshold,
            min_count,
            max_count,
            offset,
        })
    }

    pub fn base(&self) -> f64 {
        self.base
    }

    pub fn step_threshold(&self) -> u32 {
        self.step_threshold
    }

    pub fn min_count(&self) -> u32 {
        self.min_count
    }

    pub fn max_count(&self) -> u32 {
        self.max_count
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }

    /// The clamped candidate before hysteresis is applied.
    pub fn raw(&self, depth: u64) -> u32 {
        // log(0) is undefined; an empty queue counts as one message.
        let depth = depth.max(1) as f64;
        let value = depth.log(self.base) + f64::from(self.offset);
        round_clamp(value, self.min_count, self.max_count)
    }

    pub fn compute(&self, depth: u64, current: u32) -> u32 {
        hysteresis(current, self.raw(depth), self.step_threshold)
    }
}

/// A scaling formula bound to one queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Ruleset {
    StepLimit(StepLimit),
    Linear(LinearScale),
    Logarithmic(LogScale),
}

impl Ruleset {
    /// Compute this ruleset's replica count for the observed `depth`.
    ///
    /// Step-limit rulesets ignore `current`; linear and logarithmic ones
    /// return `current` when the change would be smaller than their step
    /// threshold.
    pub fn compute_candidate(&self, depth: u64, current: u32) -> u32 {
        match self {
            Ruleset::StepLimit(r) => r.compute(depth),
            Ruleset::Linear(r) => r.compute(depth, current),
            Ruleset::Logarithmic(r) => r.compute(depth, current),
        }
    }

    /// Config name of this ruleset's type.
    pub fn kind(&self) -> &'static str {
        match self {
            Ruleset::StepLimit(_) => "limit",
            Ruleset::Linear(_) => "linearScale",
            Ruleset::Logarithmic(_) => "logScale",
        }
    }
}

impl From<StepLimit> for Ruleset {
    fn from(r: StepLimit) -> Self {
        Ruleset::StepLimit(r)
    }
}

impl From<LinearScale> for Ruleset {
    fn from(r: LinearScale) -> Self {
        Ruleset::Linear(r)
    }
}

impl From<LogScale> for Ruleset {
    fn from(r: LogScale) -> Self {
        Ruleset::Logarithmic(r)
    }
}

impl fmt::Display for Ruleset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ruleset::StepLimit(r) => {
                write!(f, "limit [")?;
                for (i, rule) in r.rules.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}:{}", rule.min_depth, rule.count)?;
                }
                write!(f, "]")
            }
            Ruleset::Linear(r) => write!(
                f,
                "linearScale (factor {}, step {}, {}..={})",
                r.factor, r.step_threshold, r.min_count, r.max_count
            ),
            Ruleset::Logarithmic(r) => write!(
                f,
                "logScale (base {}, offset {}, step {}, {}..={})",
                r.base, r.offset, r.step_threshold, r.min_count, r.max_count
            ),
        }
    }
}

fn check_bounds(step_threshold: u32, min_count: u32, max_count: u32) -> Result<(), RulesetError> {
    if step_threshold < 1 {
        return Err(RulesetError::InvalidParameter {
            field: "step_threshold",
            requirement: "at least 1",
            value: step_threshold.to_string(),
        });
    }
    if min_count > max_count {
        return Err(RulesetError::InvertedBounds {
            min: min_count,
            max: max_count,
        });
    }
    Ok(())
}

/// Round half away from zero, then clamp into `[min, max]`.
///
/// Clamping happens before the integer conversion so huge or negative values
/// saturate at the bounds.
fn round_clamp(value: f64, min: u32, max: u32) -> u32 {
    value.round().clamp(f64::from(min), f64::from(max)) as u32
}

fn hysteresis(current: u32, candidate: u32, step_threshold: u32) -> u32 {
    if current.abs_diff(candidate) >= step_threshold {
        candidate
    } else {
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reference_limit() -> StepLimit {
        StepLimit::new(vec![
            StepRule::new(0, 1),
            StepRule::new(50, 2),
            StepRule::new(200, 3),
            StepRule::new(400, 4),
            StepRule::new(800, 6),
        ])
        .unwrap()
    }

    /// Linear scan over the sorted rules; the semantics `compute` must match.
    fn linear_scan(limit: &StepLimit, depth: u64) -> u32 {
        let mut count = None;
        for rule in limit.rules() {
            if rule.min_depth <= depth {
                count = Some(rule.count);
            }
        }
        count.unwrap()
    }

    #[test]
    fn step_limit_reference_scenarios() {
        let limit = Ruleset::from(reference_limit());
        assert_eq!(limit.compute_candidate(105, 1), 2);
        assert_eq!(limit.compute_candidate(105, 2), 2);
    }

    #[test]
    fn step_limit_threshold_is_inclusive() {
        let limit = reference_limit();
        assert_eq!(limit.compute(0), 1);
        assert_eq!(limit.compute(49), 1);
        assert_eq!(limit.compute(50), 2);
        assert_eq!(limit.compute(199), 2);
        assert_eq!(limit.compute(200), 3);
        assert_eq!(limit.compute(800), 6);
        assert_eq!(limit.compute(u64::MAX), 6);
    }

    #[test]
    fn step_limit_sorts_rules() {
        let limit = StepLimit::new(vec![
            StepRule::new(200, 3),
            StepRule::new(0, 1),
            StepRule::new(100, 2),
        ])
        .unwrap();
        let thresholds: Vec<u64> = limit.rules().iter().map(|r| r.min_depth).collect();
        assert_eq!(thresholds, vec![0, 100, 200]);
    }

    #[test]
    fn step_limit_synthesizes_zero_threshold() {
        let limit = StepLimit::new(vec![StepRule::new(1000, 3), StepRule::new(500, 2)]).unwrap();
        assert_eq!(limit.rules()[0], StepRule::new(0, 2));
        assert_eq!(limit.rules().len(), 3);
        assert_eq!(limit.compute(0), 2);
        assert_eq!(limit.compute(999), 2);
        assert_eq!(limit.compute(1000), 3);
    }

    #[test]
    fn step_limit_rejects_empty_rules() {
        assert_eq!(StepLimit::new(vec![]), Err(RulesetError::NoRules));
    }

    #[test]
    fn step_limit_rejects_duplicate_thresholds() {
        let err = StepLimit::new(vec![StepRule::new(100, 2), StepRule::new(100, 3)]).unwrap_err();
        assert_eq!(err, RulesetError::DuplicateThreshold(100));
    }

    #[test]
    fn step_limit_rejects_decreasing_counts() {
        let err = StepLimit::new(vec![StepRule::new(0, 5), StepRule::new(100, 2)]).unwrap_err();
        assert_eq!(
            err,
            RulesetError::DecreasingCount {
                threshold: 100,
                from: 5,
                to: 2
            }
        );
    }

    #[test]
    fn step_limit_ignores_current_count() {
        let limit = Ruleset::from(reference_limit());
        assert_eq!(limit.compute_candidate(450, 0), 4);
        assert_eq!(limit.compute_candidate(450, 100), 4);
    }

    #[test]
    fn linear_reference_scenario() {
        let linear = Ruleset::from(LinearScale::new(0.1, 2, 2, 20).unwrap());
        // round(10.5) = 11, |2 - 11| >= 2.
        assert_eq!(linear.compute_candidate(105, 2), 11);
    }

    #[test]
    fn linear_small_change_is_suppressed() {
        let linear = LinearScale::new(0.1, 2, 2, 20).unwrap();
        // round(3.2) = 3, |2 - 3| < 2.
        assert_eq!(linear.compute(32, 2), 2);
        // round(4.0) = 4, |2 - 4| >= 2.
        assert_eq!(linear.compute(40, 2), 4);
    }

    #[test]
    fn linear_clamps_to_bounds() {
        let linear = LinearScale::new(0.1, 1, 2, 20).unwrap();
        assert_eq!(linear.compute(0, 10), 2);
        assert_eq!(linear.compute(u64::MAX, 10), 20);
    }

    #[test]
    fn linear_rounds_half_away_from_zero() {
        let linear = LinearScale::new(0.5, 1, 0, 100).unwrap();
        assert_eq!(linear.raw(5), 3); // 2.5
        assert_eq!(linear.raw(21), 11); // 10.5
        assert_eq!(linear.raw(3), 2); // 1.5
    }

    #[test]
    fn linear_rejects_invalid_parameters() {
        assert!(matches!(
            LinearScale::new(0.0, 1, 1, 10),
            Err(RulesetError::InvalidParameter { field: "factor", .. })
        ));
        assert!(matches!(
            LinearScale::new(f64::NAN, 1, 1, 10),
            Err(RulesetError::InvalidParameter { field: "factor", .. })
        ));
        assert!(matches!(
            LinearScale::new(1.0, 0, 1, 10),
            Err(RulesetError::InvalidParameter { field: "step_threshold", .. })
        ));
        assert_eq!(
            LinearScale::new(1.0, 1, 10, 1),
            Err(RulesetError::InvertedBounds { min: 10, max: 1 })
        );
    }

    #[test]
    fn log_reference_scenario() {
        let log = Ruleset::from(LogScale::new(10.0, 2, 2, 20, 0).unwrap());
        // round(log10(105)) = 2, |5 - 2| >= 2.
        assert_eq!(log.compute_candidate(105, 5), 2);
    }

    #[test]
    fn log_treats_empty_queue_as_one_message() {
        let log = LogScale::new(10.0, 1, 0, 20, 3).unwrap();
        assert_eq!(log.raw(0), 3);
        assert_eq!(log.raw(1), 3);
        assert_eq!(log.raw(1000), 6);
    }

    #[test]
    fn log_rounds_half_away_from_zero() {
        // log4(2) and log16(4) are exactly 0.5.
        assert_eq!(LogScale::new(4.0, 1, 0, 20, 0).unwrap().raw(2), 1);
        assert_eq!(LogScale::new(16.0, 1, 0, 20, 0).unwrap().raw(4), 1);
        // 0.5 + 2 = 2.5
        assert_eq!(LogScale::new(4.0, 1, 0, 20, 2).unwrap().raw(2), 3);
        // log4(1) = 0, well below the half.
        assert_eq!(LogScale::new(4.0, 1, 0, 20, 0).unwrap().raw(1), 0);
    }

    #[test]
    fn log_negative_offset_clamps_to_min() {
        let log = LogScale::new(10.0, 1, 1, 20, -5).unwrap();
        assert_eq!(log.raw(0), 1);
        assert_eq!(log.raw(100_000), 1);
        assert_eq!(log.raw(10_000_000), 2);
    }

    #[test]
    fn log_hysteresis() {
        let log = LogScale::new(10.0, 2, 1, 20, 0).unwrap();
        // round(log10(1000)) = 3, |2 - 3| < 2.
        assert_eq!(log.compute(1000, 2), 2);
        assert_eq!(log.compute(1000, 5), 3);
    }

    #[test]
    fn log_rejects_invalid_base() {
        assert!(matches!(
            LogScale::new(1.0, 1, 1, 10, 0),
            Err(RulesetError::InvalidParameter { field: "base", .. })
        ));
        assert!(matches!(
            LogScale::new(f64::INFINITY, 1, 1, 10, 0),
            Err(RulesetError::InvalidParameter { field: "base", .. })
        ));
    }

    #[test]
    fn round_clamp_rounds_half_away_from_zero() {
        assert_eq!(round_clamp(2.5, 0, 10), 3);
        assert_eq!(round_clamp(10.5, 0, 20), 11);
        assert_eq!(round_clamp(2.4999, 0, 10), 2);
        // -0.5 rounds to -1 and clamps to the lower bound.
        assert_eq!(round_clamp(-0.5, 0, 10), 0);
        // The bound decides at an exact half: 4.5 -> 5 is capped at 4.
        assert_eq!(round_clamp(4.5, 0, 4), 4);
        assert_eq!(round_clamp(1.5, 2, 10), 2);
    }

    #[test]
    fn display_formats() {
        assert_eq!(
            Ruleset::from(reference_limit()).to_string(),
            "limit [0:1, 50:2, 200:3, 400:4, 800:6]"
        );
        assert_eq!(
            Ruleset::from(LinearScale::new(0.1, 2, 2, 20).unwrap()).to_string(),
            "linearScale (factor 0.1, step 2, 2..=20)"
        );
        assert_eq!(Ruleset::from(LogScale::new(10.0, 1, 1, 10, 0).unwrap()).kind(), "logScale");
    }

    fn arb_step_limit() -> impl Strategy<Value = StepLimit> {
        proptest::collection::btree_map(0u64..10_000, 0u32..50, 1..12).prop_map(|thresholds| {
            let mut count = 0;
            let rules = thresholds
                .into_iter()
                .map(|(min_depth, step)| {
                    count += step;
                    StepRule::new(min_depth, count)
                })
                .collect();
            StepLimit::new(rules).unwrap()
        })
    }

    proptest! {
        #[test]
        fn step_limit_binary_search_matches_linear_scan(
            limit in arb_step_limit(),
            depth in 0u64..12_000,
        ) {
            prop_assert_eq!(limit.compute(depth), linear_scan(&limit, depth));
        }

        #[test]
        fn step_limit_is_monotonic(
            limit in arb_step_limit(),
            a in 0u64..12_000,
            b in 0u64..12_000,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(limit.compute(lo) <= limit.compute(hi));
        }

        #[test]
        fn linear_stays_within_bounds(
            factor in 0.0001f64..1000.0,
            step in 1u32..5,
            min in 0u32..20,
            span in 0u32..50,
            depth in any::<u64>(),
            current_offset in 0u32..70,
        ) {
            let max = min + span;
            let current = min + current_offset % (span + 1);
            let linear = LinearScale::new(factor, step, min, max).unwrap();
            let candidate = linear.compute(depth, current);
            prop_assert!(candidate >= min && candidate <= max);
        }

        #[test]
        fn log_stays_within_bounds(
            base in 1.01f64..100.0,
            step in 1u32..5,
            min in 0u32..20,
            span in 0u32..50,
            offset in -20i32..20,
            depth in any::<u64>(),
            current_offset in 0u32..70,
        ) {
            let max = min + span;
            let current = min + current_offset % (span + 1);
            let log = LogScale::new(base, step, min, max, offset).unwrap();
            let candidate = log.compute(depth, current);
            prop_assert!(candidate >= min && candidate <= max);
        }

        #[test]
        fn hysteresis_keeps_current_for_small_changes(
            factor in 0.001f64..10.0,
            step in 1u32..10,
            depth in 0u64..100_000,
            current in 0u32..200,
        ) {
            let linear = LinearScale::new(factor, step, 0, 200).unwrap();
            let raw = linear.raw(depth);
            let candidate = linear.compute(depth, current);
            if current.abs_diff(raw) < step {
                prop_assert_eq!(candidate, current);
            } else {
                prop_assert_eq!(candidate, raw);
            }
        }
    }
}
