//! Element geometry access: bounding boxes and representative points.

use crate::host::ModelHost;
use crate::model::{BoundingBox, ElementId, Location, Point3};
use serde::Serialize;

/// Where a representative point came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PointSource {
    LocationPoint,
    /// Location curve evaluated at parameter 0.5.
    CurveMidpoint,
    BoundingBoxCenter,
}

#[must_use]
pub fn bounding_box<H: ModelHost + ?Sized>(host: &H, element: ElementId) -> Option<BoundingBox> {
    host.bounding_box(element)
}

/// Location point, else location curve midpoint, else bounding box center.
#[must_use]
pub fn representative_point<H: ModelHost + ?Sized>(
    host: &H,
    element: ElementId,
) -> Option<(Point3, PointSource)> {
    match host.location(element) {
        Some(Location::Point { point }) => Some((point, PointSource::LocationPoint)),
        Some(Location::Curve { curve }) => Some((curve.midpoint(), PointSource::CurveMidpoint)),
        None => host
            .bounding_box(element)
            .map(|bbox| (bbox.center(), PointSource::BoundingBoxCenter)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ElementRecord, MemoryModel};
    use crate::model::Curve;

    fn bbox() -> BoundingBox {
        BoundingBox::new(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 2.0, 2.0))
    }

    #[test]
    fn location_point_wins_over_bounding_box() {
        let mut model = MemoryModel::new("geometry");
        model.insert_element(
            ElementRecord::new(1, "Furniture")
                .with_bounding_box(bbox())
                .with_location(Location::Point {
                    point: Point3::new(5.0, 5.0, 0.0),
                }),
        );

        assert_eq!(
            representative_point(&model, ElementId(1)),
            Some((Point3::new(5.0, 5.0, 0.0), PointSource::LocationPoint))
        );
    }

    #[test]
    fn curve_midpoint_used_for_line_based_elements() {
        let mut model = MemoryModel::new("geometry");
        model.insert_element(ElementRecord::new(1, "Walls").with_location(Location::Curve {
            curve: Curve::Line {
                start: Point3::new(0.0, 0.0, 0.0),
                end: Point3::new(8.0, 0.0, 0.0),
            },
        }));

        assert_eq!(
            representative_point(&model, ElementId(1)),
            Some((Point3::new(4.0, 0.0, 0.0), PointSource::CurveMidpoint))
        );
    }

    #[test]
    fn bounding_box_center_is_last_resort() {
        let mut model = MemoryModel::new("geometry");
        model
            .insert_element(ElementRecord::new(1, "Generic Models").with_bounding_box(bbox()))
            .insert_element(ElementRecord::new(2, "Generic Models"));

        assert_eq!(
            representative_point(&model, ElementId(1)),
            Some((Point3::new(1.0, 1.0, 1.0), PointSource::BoundingBoxCenter))
        );
        assert_eq!(representative_point(&model, ElementId(2)), None);
    }
}
