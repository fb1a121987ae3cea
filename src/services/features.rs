use camino::Utf8Path;
use image::{DynamicImage, GrayImage, Luma};
use thiserror::Error;

use crate::models::Configuration;
use crate::project::normalize_path;

/// Errors from background feature detection
#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Failed to load background image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Project has no background image")]
    NoBackground,
}

/// Centre point of a region, in image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Centroid {
    pub x: f64,
    pub y: f64,
}

impl Centroid {
    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        ((self.x - x).powi(2) + (self.y - y).powi(2)).sqrt()
    }
}

/// A connected region of foreground pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Pixel count.
    pub area: u64,
    pub centroid: Centroid,
}

/// Keep the regions whose area is strictly greater than `threshold`.
pub fn filter_regions(regions: &[Region], threshold: u64) -> Vec<Region> {
    regions
        .iter()
        .filter(|region| region.area > threshold)
        .cloned()
        .collect()
}

/// Otsu's threshold for a grayscale image.
///
/// Pixels at or below the returned value form the background class. Ties go
/// to the lowest threshold.
pub fn otsu_threshold(image: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for Luma([value]) in image.pixels() {
        histogram[*value as usize] += 1;
    }

    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 0;
    }

    let weighted_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(value, count)| value as f64 * *count as f64)
        .sum();

    let mut best_threshold = 0u8;
    let mut best_variance = -1.0f64;
    let mut background_weight = 0u64;
    let mut background_sum = 0.0f64;

    for (value, count) in histogram.iter().enumerate() {
        background_weight += count;
        background_sum += value as f64 * *count as f64;

        let foreground_weight = total - background_weight;
        let variance = if background_weight == 0 || foreground_weight == 0 {
            0.0
        } else {
            let background_mean = background_sum / background_weight as f64;
            let foreground_mean = (weighted_total - background_sum) / foreground_weight as f64;
            background_weight as f64
                * foreground_weight as f64
                * (background_mean - foreground_mean).powi(2)
        };

        if variance > best_variance {
            best_variance = variance;
            best_threshold = value as u8;
        }
    }

    best_threshold
}

/// Finds icon-sized features in background images.
///
/// The image is converted to grayscale, truncated at 1 so that anything that
/// isn't pure black counts, then binarized with Otsu's method. Each 8-connected
/// group of foreground pixels is a region.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureDetector;

impl FeatureDetector {
    pub fn new() -> Self {
        Self
    }

    /// Load `path` and return the regions larger than `min_area`.
    pub fn detect_file(&self, path: &Utf8Path, min_area: u64) -> Result<Vec<Region>, FeatureError> {
        let image = image::open(path)?;
        let regions = self.detect(&image, min_area);

        tracing::info!(
            "Detected {} features in {} (minimum area {})",
            regions.len(),
            path,
            min_area
        );
        Ok(regions)
    }

    pub fn detect(&self, image: &DynamicImage, min_area: u64) -> Vec<Region> {
        let binary = binarize(image);
        filter_regions(&connected_regions(&binary), min_area)
    }

    /// Detect features in the background of `config`.
    ///
    /// Uses the configured feature size as the minimum area. Relative
    /// background paths resolve against `base_dir`.
    pub fn detect_for_configuration(
        &self,
        config: &Configuration,
        base_dir: Option<&Utf8Path>,
    ) -> Result<Vec<Region>, FeatureError> {
        let background = config.background.trim();
        if background.is_empty() {
            return Err(FeatureError::NoBackground);
        }

        let path = normalize_path(background, base_dir);
        self.detect_file(&path, u64::from(config.featuresize))
    }
}

/// Grayscale, truncate at 1, then Otsu. Foreground pixels are 255.
pub fn binarize(image: &DynamicImage) -> GrayImage {
    let mut gray = image.to_luma8();

    for Luma([value]) in gray.pixels_mut() {
        *value = (*value).min(1);
    }

    let threshold = otsu_threshold(&gray);
    for Luma([value]) in gray.pixels_mut() {
        *value = if *value > threshold { 255 } else { 0 };
    }

    gray
}

/// 8-connected regions of non-zero pixels, in row-major order of their first pixel.
pub fn connected_regions(binary: &GrayImage) -> Vec<Region> {
    let (width, height) = binary.dimensions();
    let mut visited = vec![false; width as usize * height as usize];
    let mut regions = Vec::new();
    let mut stack = Vec::new();

    let index = |x: u32, y: u32| y as usize * width as usize + x as usize;

    for start_y in 0..height {
        for start_x in 0..width {
            if visited[index(start_x, start_y)] || binary.get_pixel(start_x, start_y)[0] == 0 {
                continue;
            }

            let mut area = 0u64;
            let mut sum_x = 0u64;
            let mut sum_y = 0u64;

            visited[index(start_x, start_y)] = true;
            stack.push((start_x, start_y));

            while let Some((x, y)) = stack.pop() {
                area += 1;
                sum_x += u64::from(x);
                sum_y += u64::from(y);

                for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let nx = i64::from(x) + dx;
                        let ny = i64::from(y) + dy;
                        if nx < 0 || ny < 0 || nx >= i64::from(width) || ny >= i64::from(height) {
                            continue;
                        }

                        let (nx, ny) = (nx as u32, ny as u32);
                        let neighbour = index(nx, ny);
                        if !visited[neighbour] && binary.get_pixel(nx, ny)[0] != 0 {
                            visited[neighbour] = true;
                            stack.push((nx, ny));
                        }
                    }
                }
            }

            regions.push(Region {
                area,
                centroid: Centroid {
                    x: sum_x as f64 / area as f64,
                    y: sum_y as f64 / area as f64,
                },
            });
        }
    }

    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn region(area: u64) -> Region {
        Region {
            area,
            centroid: Centroid { x: 0.0, y: 0.0 },
        }
    }

    /// Black canvas with two filled rectangles.
    fn two_squares() -> DynamicImage {
        let mut image = RgbImage::new(40, 20);
        for y in 2..8 {
            for x in 2..8 {
                image.put_pixel(x, y, Rgb([200, 40, 40]));
            }
        }
        for y in 10..20 {
            for x in 20..30 {
                image.put_pixel(x, y, Rgb([10, 10, 10]));
            }
        }
        DynamicImage::ImageRgb8(image)
    }

    #[test]
    fn test_filter_regions_strictly_greater() {
        let regions: Vec<Region> = [50, 15000, 9999, 20000].into_iter().map(region).collect();

        let accepted = filter_regions(&regions, 10000);

        let areas: Vec<u64> = accepted.iter().map(|region| region.area).collect();
        assert_eq!(areas, vec![15000, 20000]);
        assert!(filter_regions(&[region(10000)], 10000).is_empty());
    }

    #[test]
    fn test_otsu_two_levels() {
        let image = GrayImage::from_fn(4, 4, |x, _| if x < 2 { Luma([0]) } else { Luma([1]) });
        assert_eq!(otsu_threshold(&image), 0);
    }

    #[test]
    fn test_otsu_bimodal() {
        let image = GrayImage::from_fn(10, 1, |x, _| if x < 5 { Luma([20]) } else { Luma([220]) });
        let threshold = otsu_threshold(&image);
        assert!((20..220).contains(&threshold));
    }

    #[test]
    fn test_connected_regions_area_and_centroid() {
        let binary = binarize(&two_squares());
        let regions = connected_regions(&binary);

        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].area, 36);
        assert_eq!(regions[0].centroid, Centroid { x: 4.5, y: 4.5 });
        assert_eq!(regions[1].area, 100);
        assert_eq!(regions[1].centroid, Centroid { x: 24.5, y: 14.5 });
    }

    #[test]
    fn test_diagonal_pixels_are_connected() {
        let binary = GrayImage::from_fn(3, 3, |x, y| if x == y { Luma([255]) } else { Luma([0]) });
        let regions = connected_regions(&binary);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area, 3);
    }

    #[test]
    fn test_all_black_has_no_regions() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(16, 16));
        assert!(FeatureDetector::new().detect(&image, 0).is_empty());
    }

    #[test]
    fn test_detect_is_deterministic() {
        let detector = FeatureDetector::new();
        let image = two_squares();
        assert_eq!(detector.detect(&image, 50), detector.detect(&image, 50));
        assert_eq!(detector.detect(&image, 50).len(), 1);
    }

    #[test]
    fn test_detect_for_configuration() {
        let temp_dir = TempDir::new().unwrap();
        let base = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        two_squares().save(base.join("background.png")).unwrap();

        let config = Configuration {
            background: "background.png".to_string(),
            featuresize: 40,
            ..Configuration::default()
        };

        let regions = FeatureDetector::new()
            .detect_for_configuration(&config, Some(&base))
            .unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area, 100);
    }

    #[test]
    fn test_detect_without_background() {
        let result = FeatureDetector::new().detect_for_configuration(&Configuration::default(), None);
        assert!(matches!(result, Err(FeatureError::NoBackground)));
    }

    #[test]
    fn test_detect_missing_file() {
        let config = Configuration {
            background: "/nonexistent/background.png".to_string(),
            ..Configuration::default()
        };
        let result = FeatureDetector::new().detect_for_configuration(&config, None);
        assert!(matches!(result, Err(FeatureError::Image(_))));
    }
}
