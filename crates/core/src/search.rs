//! Nearest-neighbor search between shapes in slide space.

use crate::rules::Direction;
use crate::shape::Shape;

/// Find the region-like shape closest to `reference` on the `direction` side.
///
/// Only images, auto-shapes and groups are candidates, and `reference` itself
/// is skipped. Distance is measured between box centers; on equal distance
/// the earlier candidate wins.
pub fn find_nearest<'a>(
    reference: &Shape,
    candidates: &'a [Shape],
    direction: Direction,
) -> Option<&'a Shape> {
    let origin = reference.bbox()?;
    let origin_center = origin.center();

    let mut nearest: Option<(&Shape, f64)> = None;
    for candidate in candidates {
        if std::ptr::eq(candidate, reference) || !candidate.is_region_target() {
            continue;
        }
        let Some(bbox) = candidate.bbox() else {
            continue;
        };
        if !direction.accepts(origin_center, bbox.center()) {
            continue;
        }
        let distance = origin.center_distance(bbox);
        if nearest.map_or(true, |(_, best)| distance < best) {
            nearest = Some((candidate, distance));
        }
    }

    nearest.map(|(shape, _)| shape)
}
