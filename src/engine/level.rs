//! Level band classification.

use crate::config::LevelBand;
use crate::host::ModelHost;
use crate::model::{BoundingBox, ElementId};
use serde::Serialize;

/// Vertical position of an element relative to the level band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BandClassification {
    BelowBand,
    AboveBand,
    InBand,
    NoBoundingBox,
}

/// Classifies elements against the open band between two level elevations.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelBandClassifier {
    band: LevelBand,
}

impl LevelBandClassifier {
    /// `band` comes from a validated configuration, so base is below top.
    #[must_use]
    pub fn new(band: LevelBand) -> Self {
        Self { band }
    }

    #[must_use]
    pub fn band(&self) -> &LevelBand {
        &self.band
    }

    #[must_use]
    pub fn classify<H: ModelHost + ?Sized>(&self, host: &H, element: ElementId) -> BandClassification {
        self.classify_box(super::geometry::bounding_box(host, element).as_ref())
    }

    #[must_use]
    pub fn classify_box(&self, bbox: Option<&BoundingBox>) -> BandClassification {
        match bbox {
            Some(bbox) => classify_extent(
                bbox.min.z,
                bbox.max.z,
                self.band.base.elevation,
                self.band.top.elevation,
            ),
            None => BandClassification::NoBoundingBox,
        }
    }
}

/// Open-interval overlap of `[min_z, max_z]` with `(base, top)`. Touching a
/// boundary plane does not count as overlap.
#[must_use]
pub fn classify_extent(min_z: f64, max_z: f64, base: f64, top: f64) -> BandClassification {
    if min_z < top && max_z > base {
        BandClassification::InBand
    } else if max_z <= base {
        BandClassification::BelowBand
    } else {
        BandClassification::AboveBand
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Level, Point3};

    fn classifier() -> LevelBandClassifier {
        LevelBandClassifier::new(LevelBand {
            base: Level::new(1, "Base", 0.0),
            top: Level::new(2, "Top", 10.0),
        })
    }

    fn vertical(min_z: f64, max_z: f64) -> BoundingBox {
        BoundingBox::new(Point3::new(0.0, 0.0, min_z), Point3::new(1.0, 1.0, max_z))
    }

    #[test]
    fn overlapping_top_is_in_band() {
        assert_eq!(
            classifier().classify_box(Some(&vertical(5.0, 12.0))),
            BandClassification::InBand
        );
    }

    #[test]
    fn starting_at_top_is_above() {
        assert_eq!(
            classifier().classify_box(Some(&vertical(10.0, 15.0))),
            BandClassification::AboveBand
        );
    }

    #[test]
    fn ending_at_base_is_below() {
        assert_eq!(
            classifier().classify_box(Some(&vertical(-3.0, 0.0))),
            BandClassification::BelowBand
        );
    }

    #[test]
    fn spanning_whole_band_is_in_band() {
        assert_eq!(
            classifier().classify_box(Some(&vertical(-5.0, 25.0))),
            BandClassification::InBand
        );
    }

    #[test]
    fn missing_box_is_reported() {
        assert_eq!(classifier().classify_box(None), BandClassification::NoBoundingBox);
    }

    #[test]
    fn classification_is_stable() {
        let classifier = classifier();
        let bbox = vertical(9.999, 10.0);
        let first = classifier.classify_box(Some(&bbox));
        for _ in 0..5 {
            assert_eq!(classifier.classify_box(Some(&bbox)), first);
        }
        assert_eq!(first, BandClassification::InBand);
    }
}
