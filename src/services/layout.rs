use super::features::Centroid;
use crate::models::{Configuration, GridSize};

/// An icon position on the background, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Round to the nearest grid intersection. An empty grid leaves the point alone.
pub fn snap_to_grid(point: Point, grid: GridSize) -> Point {
    if grid.is_empty() {
        return point;
    }

    let snap = |value: i32, step: u32| {
        let step = f64::from(step);
        ((f64::from(value) / step).round() * step) as i32
    };

    Point {
        x: snap(point.x, grid.width),
        y: snap(point.y, grid.height),
    }
}

/// Move to the nearest centroid within `radius`, if there is one.
pub fn snap_to_features(point: Point, centroids: &[Centroid], radius: f64) -> Option<Point> {
    let (x, y) = (f64::from(point.x), f64::from(point.y));

    centroids
        .iter()
        .map(|centroid| (centroid, centroid.distance_to(x, y)))
        .filter(|(_, distance)| *distance <= radius)
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(centroid, _)| Point {
            x: centroid.x.round() as i32,
            y: centroid.y.round() as i32,
        })
}

/// Place an icon the way the configuration asks.
///
/// A detected feature within half an icon of the point wins. Otherwise the
/// point snaps to the grid when grid snapping is on.
pub fn snap(point: Point, config: &Configuration, centroids: &[Centroid]) -> Point {
    if config.snaptofeatures {
        let radius = f64::from(config.iconsize) / 2.0;
        if let Some(snapped) = snap_to_features(point, centroids, radius) {
            return snapped;
        }
    }

    if config.snaptogrid {
        return snap_to_grid(point, config.gridsize);
    }

    point
}
