//! 交通小区及其源/汇

use crate::attribute::{format_position_list, Attr, AttributeError};
use crate::carrier::{AttributeCarrier, CarrierCore};
use crate::catalog::TypeCatalog;
use crate::entity::EntityKey;
use crate::hierarchy::{HierarchicalElement, Hierarchy};
use crate::math::{BoundingBox2, Point2};
use crate::tag::Tag;

/// 交通小区元素
#[derive(Debug, Clone)]
pub struct TazElement {
    core: CarrierCore,
    hierarchy: Hierarchy,
}

impl TazElement {
    pub fn taz(
        catalog: &TypeCatalog,
        id: impl Into<String>,
        shape: &[Point2],
    ) -> Result<Self, AttributeError> {
        let mut core = CarrierCore::new(catalog, Tag::Taz, id)?;
        core.set_raw(Attr::Shape, format_position_list(shape));
        Ok(Self {
            core,
            hierarchy: Hierarchy::new(),
        })
    }

    /// 小区的源，父实体为小区与路段
    pub fn source(
        catalog: &TypeCatalog,
        id: impl Into<String>,
        taz: &str,
        link: &str,
        weight: f64,
    ) -> Result<Self, AttributeError> {
        Self::endpoint(catalog, Tag::TazSource, id, taz, link, weight)
    }

    pub fn sink(
        catalog: &TypeCatalog,
        id: impl Into<String>,
        taz: &str,
        link: &str,
        weight: f64,
    ) -> Result<Self, AttributeError> {
        Self::endpoint(catalog, Tag::TazSink, id, taz, link, weight)
    }

    fn endpoint(
        catalog: &TypeCatalog,
        tag: Tag,
        id: impl Into<String>,
        taz: &str,
        link: &str,
        weight: f64,
    ) -> Result<Self, AttributeError> {
        let mut core = CarrierCore::new(catalog, tag, id)?;
        core.set_raw(Attr::Edge, link);
        core.set(Attr::Weight, &weight.to_string())?;
        Ok(Self {
            core,
            hierarchy: Hierarchy::with_parents([
                EntityKey::new(Tag::Taz, taz),
                EntityKey::new(Tag::Edge, link),
            ]),
        })
    }

    pub fn weight(&self) -> f64 {
        self.core.float(Attr::Weight).unwrap_or_default()
    }

    pub fn shape(&self) -> Vec<Point2> {
        self.core.positions(Attr::Shape).unwrap_or_default()
    }

    pub(crate) fn reset_wiring(&mut self) {
        self.hierarchy.clear_children();
    }
}

impl AttributeCarrier for TazElement {
    fn core(&self) -> &CarrierCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CarrierCore {
        &mut self.core
    }

    fn boundary(&self) -> Option<BoundingBox2> {
        let shape = self.shape();
        (!shape.is_empty()).then(|| BoundingBox2::from_points(&shape))
    }
}

impl HierarchicalElement for TazElement {
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
    fn test_source_parents() {
        let catalog = TypeCatalog::standard();
        let source = TazElement::source(&catalog, "src", "z1", "AB", 0.5).unwrap();
        assert_eq!(source.parents().len(), 2);
        assert_eq!(source.weight(), 0.5);
        assert!(source.boundary().is_none());
        assert!(TazElement::source(&catalog, "bad", "z1", "AB", -1.0).is_err());
    }
}
