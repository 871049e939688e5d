//! Numeric reconciliation between vote counts, percentages and scores.
//!
//! Everything in this module is total: malformed inputs produce a fallback
//! value (`0.0`, `None` or the unchanged text), never an error.

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value as JSValue;
use std::str::FromStr;

use crate::schema::{DistributionItem, ObjectiveEntry, LIKERT_LEVELS};

/// A value that may be read as a float with some tolerance: comma decimals
/// and a trailing `%` are accepted in text.
pub trait LooseNumber {
    fn loose_f64(&self) -> Option<f64>;
}

impl LooseNumber for str {
    fn loose_f64(&self) -> Option<f64> {
        let s = self.replace(',', ".").replace('%', "");
        s.trim().parse::<f64>().ok().filter(|x| x.is_finite())
    }
}

impl LooseNumber for String {
    fn loose_f64(&self) -> Option<f64> {
        self.as_str().loose_f64()
    }
}

impl LooseNumber for f64 {
    fn loose_f64(&self) -> Option<f64> {
        Some(*self).filter(|x| x.is_finite())
    }
}

impl LooseNumber for u64 {
    fn loose_f64(&self) -> Option<f64> {
        Some(*self as f64)
    }
}

impl LooseNumber for JSValue {
    fn loose_f64(&self) -> Option<f64> {
        match self {
            JSValue::Number(n) => n.as_f64().filter(|x| x.is_finite()),
            JSValue::String(s) => s.loose_f64(),
            // Booleans, containers and null are not numbers here.
            _ => None,
        }
    }
}

impl<T: LooseNumber> LooseNumber for Option<T> {
    fn loose_f64(&self) -> Option<f64> {
        self.as_ref().and_then(|x| x.loose_f64())
    }
}

impl<T: LooseNumber + ?Sized> LooseNumber for &T {
    fn loose_f64(&self) -> Option<f64> {
        (**self).loose_f64()
    }
}

/// Reads a float, or `None` when the value cannot be understood.
pub fn safe_float<T: LooseNumber + ?Sized>(x: &T) -> Option<f64> {
    x.loose_f64()
}

/// Reads a float, or `0.0` when the value cannot be understood.
pub fn safe_number<T: LooseNumber + ?Sized>(x: &T) -> f64 {
    safe_float(x).unwrap_or(0.0)
}

/// Rounds to `dp` decimal places, ties to even on the exact binary value.
pub fn round_to(x: f64, dp: u32) -> f64 {
    Decimal::from_f64_retain(x)
        .map(|d| d.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven))
        .and_then(|d| d.to_f64())
        .unwrap_or(x)
}

pub(crate) fn round_int(x: f64) -> i64 {
    x.round_ties_even() as i64
}

static VOTERS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s+vot(?:ant|er)").unwrap());

/// The label of a distribution level built from a vote count: `"12 votants"`.
pub fn format_voters<T: LooseNumber + ?Sized>(count: &T) -> Option<String> {
    safe_float(count).map(|c| format!("{} votants", round_int(c)))
}

/// Reads the vote count back from a distribution label.
pub fn parse_voters(label: &str) -> Option<u64> {
    VOTERS_RE
        .captures(label)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
}

/// Rounds three shares to integers that add up to exactly 100.
///
/// Each share is rounded on its own, then the whole rounding error goes to the
/// largest bucket (the first one on ties). Returns `None` when the shares are
/// too large to be added up.
pub fn rebalance_to_100(a: f64, b: f64, c: f64) -> Option<(i64, i64, i64)> {
    let mut triple = [round_int(a), round_int(b), round_int(c)];
    let total = triple.iter().try_fold(0_i64, |acc, x| acc.checked_add(*x))?;
    let delta = 100_i64.checked_sub(total)?;
    if delta == 0 {
        return Some((triple[0], triple[1], triple[2]));
    }
    let mut idx = 0;
    for i in 1..3 {
        if triple[i] > triple[idx] {
            idx = i;
        }
    }
    triple[idx] = triple[idx].checked_add(delta)?;
    Some((triple[0], triple[1], triple[2]))
}

/// Favorable (5 + 4), neutral (3) and unfavorable (2 + 1) shares of the
/// intent-to-follow question.
///
/// Percentages are read from the items. When none is set, they are recomputed
/// from the vote counts and the total number of voters. Returns `None` if there
/// is nothing to aggregate.
pub fn intent_shares(
    distribution: &[DistributionItem],
    total_voters: Option<u64>,
) -> Option<(i64, i64, i64)> {
    let mut pct = [0.0_f64; 5];
    let mut counts = [0.0_f64; 5];
    for item in distribution.iter() {
        if let Some(pos) = LIKERT_LEVELS.iter().position(|l| *l == item.level) {
            pct[pos] = safe_number(&item.percentage);
            if let Some(c) = item.count() {
                counts[pos] = c as f64;
            }
        }
    }

    let total = safe_number(&total_voters);
    if pct.iter().sum::<f64>() == 0.0 && total > 0.0 && counts.iter().sum::<f64>() > 0.0 {
        debug!(
            "intent_shares: no percentages, computing from counts {:?} / {}",
            counts, total
        );
        for pos in 0..5 {
            pct[pos] = 100.0 * counts[pos] / total;
        }
    }

    if pct.iter().sum::<f64>() == 0.0 {
        return None;
    }
    // LIKERT_LEVELS is ordered 5..1.
    let favorable = pct[0] + pct[1];
    let neutral = pct[2];
    let unfavorable = pct[3] + pct[4];
    let shares = rebalance_to_100(favorable, neutral, unfavorable);
    if shares.is_none() {
        warn!(
            "intent_shares: shares out of range: {} {} {}",
            favorable, neutral, unfavorable
        );
    }
    shares
}

/// `"<A> % favorables, <B> % neutre, <C> % non favorables"`
pub fn intent_summary(
    distribution: &[DistributionItem],
    total_voters: Option<u64>,
) -> Option<String> {
    intent_shares(distribution, total_voters).map(|(a, b, c)| {
        format!(
            "{} % favorables, {} % neutre, {} % non favorables",
            a, b, c
        )
    })
}

/// Mean of the per-objective scores that are present, as `"7.0/10"`.
pub fn mean_score_over_10(entries: &[ObjectiveEntry]) -> Option<String> {
    let vals: Vec<f64> = entries.iter().filter_map(|e| e.score).collect();
    if vals.is_empty() {
        return None;
    }
    let m = vals.iter().sum::<f64>() / (vals.len() as f64);
    Some(format!("{:.1}/10", m))
}

pub fn format_score(score: Option<f64>) -> Option<String> {
    score.map(|s| format!("{:.1}/10", s))
}

/// Keeps up to two decimals (ties to even) and drops trailing zeros:
/// `1.25` stays `"1.25"`, `1.20` gives `"1.2"`, `1.00` gives `"1"`.
pub fn format_decimal_preserve_precision(x: f64) -> String {
    let raw = x.to_string();
    match Decimal::from_str(&raw).ok().or_else(|| Decimal::from_f64(x)) {
        Some(dec) => {
            let mut q = dec
                .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
                .normalize();
            if q.is_zero() {
                q.set_sign_positive(true);
            }
            q.to_string()
        }
        None => raw,
    }
}

/// The competency progression, as `"+1.25/10"`.
pub fn format_progression(delta: Option<f64>) -> Option<String> {
    delta.map(|d| {
        let s = format_decimal_preserve_precision(d);
        if s.starts_with('-') {
            format!("{}/10", s)
        } else {
            format!("+{}/10", s)
        }
    })
}
