//! Cross-timeframe confluence grouping.
//!
//! Points from one cycle are sorted deterministically, then greedily
//! grouped: each ungrouped point anchors a group and absorbs every later
//! ungrouped point of the same type within the time and price tolerances
//! of the *anchor* (single-pass greedy, not transitive closure). Groups
//! of two or more members synthesize one higher-confidence point.

use itertools::Itertools;

use crate::config::ConfluenceSettings;
use crate::models::{ConfluencePoint, HighLowPoint};
use crate::utils::maths_utils::mean;

/// Pure, total function over one cycle's point set: never fails, and the
/// output is independent of the input ordering.
pub fn aggregate_confluence(
    points: &[HighLowPoint],
    settings: &ConfluenceSettings,
) -> Vec<ConfluencePoint> {
    let mut sorted: Vec<&HighLowPoint> = points.iter().collect();
    // Deterministic order: timestamp, then price, then timeframe
    sorted.sort_by(|a, b| {
        a.timestamp_ms
            .cmp(&b.timestamp_ms)
            .then_with(|| a.price.total_cmp(&b.price))
            .then_with(|| a.timeframe.cmp(&b.timeframe))
    });

    let mut grouped = vec![false; sorted.len()];
    let mut confluences = Vec::new();

    for anchor_idx in 0..sorted.len() {
        if grouped[anchor_idx] {
            continue;
        }
        grouped[anchor_idx] = true;
        let anchor = sorted[anchor_idx];

        let mut members: Vec<&HighLowPoint> = vec![anchor];
        for q_idx in (anchor_idx + 1)..sorted.len() {
            if grouped[q_idx] {
                continue;
            }
            let q = sorted[q_idx];
            if q.point_type == anchor.point_type
                && (q.timestamp_ms - anchor.timestamp_ms).abs() <= settings.max_time_gap_ms
                && anchor.price > 0.0
                && ((q.price - anchor.price) / anchor.price).abs() <= settings.max_price_drift_pct
            {
                members.push(q);
                grouped[q_idx] = true;
            }
        }

        if members.len() < 2 {
            continue;
        }
        if settings.require_distinct_timeframes
            && members.iter().map(|m| m.timeframe).unique().count() < 2
        {
            continue;
        }
        confluences.push(synthesize(&members, settings));
    }

    confluences
}

/// Collapse a group into one ConfluencePoint per the synthesis rules.
fn synthesize(members: &[&HighLowPoint], settings: &ConfluenceSettings) -> ConfluencePoint {
    let strengths: Vec<f64> = members.iter().map(|m| m.strength).collect();
    let total_strength: f64 = strengths.iter().sum();

    // Strength-weighted mean price; plain mean if all weights are zero
    let price = if total_strength > 0.0 {
        members
            .iter()
            .map(|m| m.strength * m.price)
            .sum::<f64>()
            / total_strength
    } else {
        mean(&members.iter().map(|m| m.price).collect::<Vec<f64>>())
    };

    // Strongest member wins ties by insertion order (strictly-greater fold)
    let strongest = members
        .iter()
        .fold(members[0], |best, m| {
            if m.strength > best.strength { m } else { best }
        });

    let timestamp_ms = members
        .iter()
        .map(|m| m.timestamp_ms)
        .min()
        .expect("group is non-empty");
    let volume = members
        .iter()
        .map(|m| m.volume)
        .fold(f64::NEG_INFINITY, f64::max);

    let strength = (settings.strength_boost * mean(&strengths)).min(100.0);

    ConfluencePoint {
        timestamp_ms,
        price,
        volume,
        timeframe: strongest.timeframe,
        point_type: strongest.point_type,
        strength,
        confirmation: true,
        support_resistance_level: mean(
            &members
                .iter()
                .map(|m| m.support_resistance_level)
                .collect::<Vec<f64>>(),
        ),
        fibonacci_level: members.iter().find_map(|m| m.fibonacci_level),
        elliott_wave_position: members.iter().find_map(|m| m.elliott_wave_position),
        market_structure: strongest.market_structure,
        member_count: members.len(),
        contributing_timeframes: members.iter().map(|m| m.timeframe).unique().collect(),
    }
}
