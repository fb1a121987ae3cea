//! Integration tests for feature detection and icon snapping
//!
//! These tests verify:
//! - Region filtering keeps exactly the regions above the threshold
//! - Icons dropped near a detected feature land on its centroid
//! - Grid snapping applies when no feature is close enough

use camino::Utf8PathBuf;
use dmgee::Project;
use dmgee::models::GridSize;
use dmgee::services::{Centroid, FeatureDetector, Point, Region, filter_regions, snap};
use image::{DynamicImage, Rgb, RgbImage};
use proptest::prelude::*;
use tempfile::TempDir;

fn region(area: u64) -> Region {
    Region {
        area,
        centroid: Centroid { x: 1.0, y: 1.0 },
    }
}

proptest! {
    #[test]
    fn test_filter_keeps_strictly_larger(
        areas in prop::collection::vec(0u64..50_000, 0..40),
        threshold in 0u64..50_000,
    ) {
        let regions: Vec<Region> = areas.iter().copied().map(region).collect();
        let kept = filter_regions(&regions, threshold);

        prop_assert!(kept.iter().all(|region| region.area > threshold));
        prop_assert_eq!(
            kept.len(),
            areas.iter().filter(|area| **area > threshold).count()
        );
    }
}

/// A 400x200 black background with a grey 40x40 well centred at (100, 100).
fn background_with_well() -> DynamicImage {
    let mut image = RgbImage::new(400, 200);
    for y in 80..120 {
        for x in 80..120 {
            image.put_pixel(x, y, Rgb([90, 90, 90]));
        }
    }
    DynamicImage::ImageRgb8(image)
}

#[test]
fn test_icon_snaps_to_detected_well() {
    let temp_dir = TempDir::new().unwrap();
    let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    background_with_well().save(dir.join("background.png")).unwrap();

    let mut project = Project::new();
    project.set_background("background.png").unwrap();
    project.set_feature_size(1000).unwrap();
    project.set_grid_size(GridSize::new(50, 50)).unwrap();
    project.set_snap_to_grid(true).unwrap();
    project.save_as(dir.join("layout.toml")).unwrap();

    let regions = FeatureDetector::new()
        .detect_for_configuration(project.configuration(), project.base_dir())
        .unwrap();
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].area, 1600);

    let centroids: Vec<Centroid> = regions.iter().map(|region| region.centroid).collect();
    let config = project.configuration();

    // Within half an icon (64px) of the well's centre
    assert_eq!(
        snap(Point::new(130, 120), config, &centroids),
        Point::new(100, 100)
    );

    // Far away, so the grid takes over
    assert_eq!(
        snap(Point::new(310, 40), config, &centroids),
        Point::new(300, 50)
    );
}

#[test]
fn test_small_wells_are_filtered() {
    let detector = FeatureDetector::new();
    let image = background_with_well();

    assert_eq!(detector.detect(&image, 1599).len(), 1);
    assert!(detector.detect(&image, 1600).is_empty());
}
