//! 多边形与兴趣点

use super::link::lane_id;
use crate::attribute::{format_position, format_position_list, Attr, AttributeError};
use crate::carrier::{AttributeCarrier, CarrierCore};
use crate::catalog::TypeCatalog;
use crate::entity::EntityKey;
use crate::hierarchy::{HierarchicalElement, Hierarchy};
use crate::math::{BoundingBox2, Point2};
use crate::tag::Tag;

const POI_RADIUS: f64 = 1.0;

/// 形状
///
/// 车道兴趣点与普通兴趣点共用一个唯一性分区。
#[derive(Debug, Clone)]
pub struct Shape {
    core: CarrierCore,
    hierarchy: Hierarchy,
}

impl Shape {
    pub fn polygon(
        catalog: &TypeCatalog,
        id: impl Into<String>,
        points: &[Point2],
    ) -> Result<Self, AttributeError> {
        let mut core = CarrierCore::new(catalog, Tag::Poly, id)?;
        core.set_raw(Attr::Shape, format_position_list(points));
        Ok(Self {
            core,
            hierarchy: Hierarchy::new(),
        })
    }

    pub fn poi(
        catalog: &TypeCatalog,
        id: impl Into<String>,
        position: Point2,
    ) -> Result<Self, AttributeError> {
        let mut core = CarrierCore::new(catalog, Tag::Poi, id)?;
        core.set_raw(Attr::Position, format_position(&position));
        Ok(Self {
            core,
            hierarchy: Hierarchy::new(),
        })
    }

    /// 车道上的兴趣点，所在路段成为父实体
    pub fn poi_lane(
        catalog: &TypeCatalog,
        id: impl Into<String>,
        link: &str,
        lane_index: usize,
        offset: f64,
    ) -> Result<Self, AttributeError> {
        let mut core = CarrierCore::new(catalog, Tag::PoiLane, id)?;
        core.set_raw(Attr::Lane, lane_id(link, lane_index));
        core.set(Attr::Position, &offset.to_string())?;
        Ok(Self {
            core,
            hierarchy: Hierarchy::with_parents([EntityKey::new(Tag::Edge, link)]),
        })
    }

    pub fn points(&self) -> Vec<Point2> {
        match self.tag() {
            Tag::Poly => self.core.positions(Attr::Shape).unwrap_or_default(),
            Tag::Poi => self.core.position(Attr::Position).into_iter().collect(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn reset_wiring(&mut self) {
        self.hierarchy.clear_children();
    }
}

impl AttributeCarrier for Shape {
    fn core(&self) -> &CarrierCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CarrierCore {
        &mut self.core
    }

    fn boundary(&self) -> Option<BoundingBox2> {
        let points = self.points();
        match (self.tag(), points.as_slice()) {
            (_, []) => None,
            (Tag::Poi, [p]) => Some(BoundingBox2::around(*p, POI_RADIUS)),
            _ => Some(BoundingBox2::from_points(&points)),
        }
    }
}

impl HierarchicalElement for Shape {
    fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    fn hierarchy_mut(&mut self) -> &mut Hierarchy {
        &mut self.hierarchy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_boundaries() {
        let catalog = TypeCatalog::standard();
        let poly = Shape::polygon(
            &catalog,
            "park",
            &[Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), Point2::new(10.0, 10.0)],
        )
        .unwrap();
        assert!(poly.boundary().unwrap().contains(&Point2::new(5.0, 5.0)));

        let poi = Shape::poi(&catalog, "tower", Point2::new(3.0, 3.0)).unwrap();
        assert!(poi.boundary().unwrap().contains(&Point2::new(3.5, 3.5)));

        let lane_poi = Shape::poi_lane(&catalog, "sign", "AB", 0, 12.5).unwrap();
        assert!(lane_poi.boundary().is_none());
        assert_eq!(lane_poi.get_attribute(Attr::Lane).unwrap(), "AB_0");
        assert_eq!(lane_poi.tag_properties().partition_tag(), Tag::Poi);
    }
}
