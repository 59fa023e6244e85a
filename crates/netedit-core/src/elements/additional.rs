//! 附属设施
//!
//! 设施可以放置在车道、路段或自由位置上，也可以挂在另一个设施下面
//! （例如公交站的出入口、停车场的车位）。标定器流量、限速标志的时间段
//! 以及改道器的时间区间是从属实体，只能通过所属设施访问。

use super::link::lane_id;
use crate::attribute::{format_position, Attr, AttributeError, ValueKind};
use crate::carrier::{AttributeCarrier, CarrierCore};
use crate::catalog::TypeCatalog;
use crate::entity::EntityKey;
use crate::hierarchy::{HierarchicalElement, Hierarchy};
use crate::math::{BoundingBox2, Point2};
use crate::tag::{Category, Tag};

/// 点状设施的包围盒半径
const MARKER_RADIUS: f64 = 0.5;

/// 从属实体允许的所属设施类型
fn slave_owner(tag: Tag) -> Option<Tag> {
    match tag {
        Tag::CalibratorFlow => Some(Tag::Calibrator),
        Tag::VariableSpeedSignStep => Some(Tag::VariableSpeedSign),
        Tag::RerouterInterval | Tag::ClosingReroute => Some(Tag::Rerouter),
        _ => None,
    }
}

/// 从属实体标识符 `<所属>_<标签><序号>`
pub(crate) fn slave_id(owner: &str, tag: Tag, index: usize) -> String {
    format!("{}_{}{}", owner, tag, index)
}

/// 设施的从属子实体
#[derive(Debug, Clone)]
pub struct AdditionalSlave {
    core: CarrierCore,
}

impl AttributeCarrier for AdditionalSlave {
    fn core(&self) -> &CarrierCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CarrierCore {
        &mut self.core
    }
}

/// 附属设施
#[derive(Debug, Clone)]
pub struct Additional {
    core: CarrierCore,
    hierarchy: Hierarchy,
    slaves: Vec<AdditionalSlave>,
}

impl Additional {
    pub fn new(
        catalog: &TypeCatalog,
        tag: Tag,
        id: impl Into<String>,
    ) -> Result<Self, AttributeError> {
        let props = catalog.lookup(tag)?;
        if props.category() != Category::Additional || props.is_slave() {
            return Err(AttributeError::UnsupportedOperation {
                tag,
                reason: "not a top-level additional".to_string(),
            });
        }
        Ok(Self {
            core: CarrierCore::new(catalog, tag, id)?,
            hierarchy: Hierarchy::new(),
            slaves: Vec::new(),
        })
    }

    /// 放置在车道上，路段成为父实体
    pub fn on_lane(mut self, link: &str, lane_index: usize) -> Result<Self, AttributeError> {
        self.require(Attr::Lane)?;
        self.core.set_raw(Attr::Lane, lane_id(link, lane_index));
        self.hierarchy.add_parent(EntityKey::new(Tag::Edge, link));
        Ok(self)
    }

    /// 关联到路段
    pub fn on_edge(mut self, link: &str) -> Result<Self, AttributeError> {
        self.require(Attr::Edge)?;
        self.core.set_raw(Attr::Edge, link);
        self.hierarchy.add_parent(EntityKey::new(Tag::Edge, link));
        Ok(self)
    }

    /// 关联到多条路段
    pub fn on_edges(mut self, links: &[&str]) -> Result<Self, AttributeError> {
        self.require(Attr::Edges)?;
        self.core.set_raw(Attr::Edges, links.join(" "));
        for link in links {
            self.hierarchy.add_parent(EntityKey::new(Tag::Edge, *link));
        }
        Ok(self)
    }

    /// 自由位置
    pub fn at(mut self, position: Point2) -> Result<Self, AttributeError> {
        let props = self.require(Attr::Position)?;
        if props.kind != ValueKind::Position {
            return Err(AttributeError::UnsupportedOperation {
                tag: self.tag(),
                reason: "placed by lane offset, not by free position".to_string(),
            });
        }
        self.core.set_raw(Attr::Position, format_position(&position));
        Ok(self)
    }

    /// 挂在另一个设施下
    pub fn with_parent(mut self, parent: EntityKey) -> Self {
        self.hierarchy.add_parent(parent);
        self
    }

    pub fn with_attribute(mut self, attr: Attr, value: &str) -> Result<Self, AttributeError> {
        self.core.set(attr, value)?;
        Ok(self)
    }

    fn require(&self, attr: Attr) -> Result<crate::attribute::AttrProperties, AttributeError> {
        self.tag_properties()
            .attribute(attr)
            .cloned()
            .ok_or(AttributeError::UnsupportedAttribute {
                tag: self.tag(),
                attr,
            })
    }

    /// 添加从属子实体
    pub fn add_slave(
        &mut self,
        catalog: &TypeCatalog,
        tag: Tag,
    ) -> Result<&mut AdditionalSlave, AttributeError> {
        if slave_owner(tag) != Some(self.tag()) {
            return Err(AttributeError::UnsupportedOperation {
                tag: self.tag(),
                reason: format!("cannot own {} children", tag),
            });
        }
        let id = slave_id(self.core.id(), tag, self.slaves.len());
        self.slaves.push(AdditionalSlave {
            core: CarrierCore::new(catalog, tag, id)?,
        });
        let last = self.slaves.len() - 1;
        Ok(&mut self.slaves[last])
    }

    /// 改道器关闭某条路段
    pub fn add_closing_reroute(
        &mut self,
        catalog: &TypeCatalog,
        link: &str,
    ) -> Result<&mut AdditionalSlave, AttributeError> {
        self.add_slave(catalog, Tag::ClosingReroute)?;
        self.hierarchy.add_parent(EntityKey::new(Tag::Edge, link));
        let last = self.slaves.len() - 1;
        let slave = &mut self.slaves[last];
        slave.core.set_raw(Attr::Edge, link);
        Ok(slave)
    }

    pub fn slaves(&self) -> &[AdditionalSlave] {
        &self.slaves
    }

    pub fn slaves_mut(&mut self) -> &mut [AdditionalSlave] {
        &mut self.slaves
    }

    /// 所在车道
    pub fn lane(&self) -> Option<&str> {
        self.core.value(Attr::Lane)
    }

    /// 设施覆盖的路段序列
    pub fn path_links(&self) -> Vec<String> {
        let edges = self.core.ids(Attr::Edges);
        if !edges.is_empty() {
            return edges;
        }
        self.core.ids(Attr::Edge)
    }

    pub(crate) fn rename(&mut self, new_id: &str) {
        self.core.set_id(new_id);
        for (i, slave) in self.slaves.iter_mut().enumerate() {
            let tag = slave.tag();
            slave.core.set_id(slave_id(new_id, tag, i));
        }
    }

    pub(crate) fn reset_wiring(&mut self) {
        self.hierarchy.clear_children();
    }
}

impl AttributeCarrier for Additional {
    fn core(&self) -> &CarrierCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CarrierCore {
        &mut self.core
    }

    fn boundary(&self) -> Option<BoundingBox2> {
        let free = self
            .tag_properties()
            .attribute(Attr::Position)
            .is_some_and(|a| a.kind == ValueKind::Position);
        if !free {
            return None;
        }
        self.core
            .position(Attr::Position)
            .map(|p| BoundingBox2::around(p, MARKER_RADIUS))
    }
}

impl HierarchicalElement for Additional {
    fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    fn hierarchy_mut(&mut self) -> &mut Hierarchy {
        &mut self.hierarchy
    }

    fn replace_parent(&mut self, old: &EntityKey, new: &EntityKey) {
        if self.hierarchy.replace_parent(old, new) {
            self.core.rewrite_references(old, new);
            for slave in &mut self.slaves {
                slave.core.rewrite_references(old, new);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_placement() {
        let catalog = TypeCatalog::standard();
        let stop = Additional::new(&catalog, Tag::BusStop, "stop1")
            .unwrap()
            .on_lane("AB", 0)
            .unwrap();
        assert_eq!(stop.lane(), Some("AB_0"));
        assert_eq!(stop.parents(), &[EntityKey::new(Tag::Edge, "AB")]);
        assert!(stop.boundary().is_none());
        assert!(Additional::new(&catalog, Tag::BusStop, "s")
            .unwrap()
            .at(Point2::origin())
            .is_err());
    }

    #[test]
    fn test_parent_rename_rewrites_lane_reference() {
        let catalog = TypeCatalog::standard();
        let mut e1 = Additional::new(&catalog, Tag::E1Detector, "det")
            .unwrap()
            .on_lane("AB", 1)
            .unwrap();
        let old = EntityKey::new(Tag::Edge, "AB");
        e1.replace_parent(&old, &old.with_id("L1"));
        assert_eq!(e1.lane(), Some("L1_1"));
    }

    #[test]
    fn test_slaves() {
        let catalog = TypeCatalog::standard();
        let mut rerouter = Additional::new(&catalog, Tag::Rerouter, "rr")
            .unwrap()
            .at(Point2::new(5.0, 5.0))
            .unwrap();
        rerouter.add_slave(&catalog, Tag::RerouterInterval).unwrap();
        rerouter.add_closing_reroute(&catalog, "AB").unwrap();
        assert!(rerouter.add_slave(&catalog, Tag::CalibratorFlow).is_err());
        assert_eq!(rerouter.slaves()[1].id(), "rr_closingReroute1");
        assert!(rerouter.boundary().unwrap().contains(&Point2::new(5.0, 5.0)));

        rerouter.rename("rr2");
        assert_eq!(rerouter.slaves()[0].id(), "rr2_interval0");
    }

    #[test]
    fn test_slave_tag_is_not_top_level() {
        let catalog = TypeCatalog::standard();
        assert!(Additional::new(&catalog, Tag::CalibratorFlow, "f").is_err());
        assert!(Additional::new(&catalog, Tag::Poi, "p").is_err());
    }
}
