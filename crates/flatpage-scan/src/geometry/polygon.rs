// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Polygon helpers for the classical locator: convex hull and closed-curve
// Douglas-Peucker simplification.

use flatpage_core::types::cross;
use flatpage_core::Point;

/// Convex hull by Andrew's monotone chain.
///
/// Points are sorted by `x` then `y`; a vertex is kept only on a strict left
/// turn, so collinear points are dropped. The hull comes back
/// counter-clockwise (in a y-up frame) without repeating the first vertex.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    sorted.dedup();
    if sorted.len() < 3 {
        return sorted;
    }

    let mut lower: Vec<Point> = Vec::with_capacity(sorted.len());
    for p in &sorted {
        while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(*p);
    }

    let mut upper: Vec<Point> = Vec::with_capacity(sorted.len());
    for p in sorted.iter().rev() {
        while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(*p);
    }

    // Each chain ends where the other starts.
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Length of the closed polygon through `points`.
pub fn closed_perimeter(points: &[Point]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.distance(b))
        .sum()
}

/// Simplify a closed curve with Douglas-Peucker.
///
/// The curve is cut at the vertex farthest from `points[0]`; both halves are
/// simplified as open polylines and joined again without their shared
/// endpoints.
pub fn simplify_closed(points: &[Point], epsilon: f64) -> Vec<Point> {
    if points.len() <= 3 {
        return points.to_vec();
    }

    let first = points[0];
    let split = points
        .iter()
        .enumerate()
        .skip(1)
        .max_by(|(_, a), (_, b)| first.distance(a).total_cmp(&first.distance(b)))
        .map(|(i, _)| i)
        .unwrap_or(points.len() / 2);

    let head = &points[..=split];
    let mut tail: Vec<Point> = points[split..].to_vec();
    tail.push(first);

    let mut out = simplify_open(head, epsilon);
    let rest = simplify_open(&tail, epsilon);
    // `rest` starts at points[split] (already in `out`) and ends at points[0].
    out.extend_from_slice(&rest[1..rest.len() - 1]);
    out
}

/// Douglas-Peucker on an open polyline. Both endpoints are always kept.
///
/// Uses an explicit worklist so long runs of near-collinear points cannot
/// exhaust the stack.
pub fn simplify_open(points: &[Point], epsilon: f64) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let last = points.len() - 1;
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[last] = true;

    let mut worklist = vec![(0usize, last)];
    while let Some((start, end)) = worklist.pop() {
        if end <= start + 1 {
            continue;
        }
        let mut max_dist = 0.0;
        let mut max_index = start;
        for i in start + 1..end {
            let dist = perpendicular_distance(&points[i], &points[start], &points[end]);
            if dist > max_dist {
                max_dist = dist;
                max_index = i;
            }
        }
        if max_dist > epsilon {
            keep[max_index] = true;
            worklist.push((start, max_index));
            worklist.push((max_index, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

/// Distance from `p` to the line through `a` and `b` (or to `a` when the two
/// coincide).
fn perpendicular_distance(p: &Point, a: &Point, b: &Point) -> f64 {
    let len = a.distance(b);
    if len == 0.0 {
        return p.distance(a);
    }
    cross(a, b, p).abs() / len
}
