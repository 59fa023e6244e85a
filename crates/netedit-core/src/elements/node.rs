//! 路口

use crate::attribute::{format_position, format_position_list, Attr, AttributeError};
use crate::carrier::{AttributeCarrier, CarrierCore};
use crate::catalog::TypeCatalog;
use crate::entity::Handle;
use crate::math::{BoundingBox2, Point2};
use crate::tag::Tag;

/// 路口包围盒半径
const NODE_RADIUS: f64 = 1.5;

/// 路口（节点）
///
/// 进出路段列表由注册表在插入/删除路段时维护。
#[derive(Debug, Clone)]
pub struct Node {
    core: CarrierCore,
    incoming: Vec<String>,
    outgoing: Vec<String>,
    pub(crate) builder: Option<Handle>,
}

impl Node {
    pub fn new(
        catalog: &TypeCatalog,
        id: impl Into<String>,
        position: Point2,
    ) -> Result<Self, AttributeError> {
        let mut core = CarrierCore::new(catalog, Tag::Junction, id)?;
        core.set_raw(Attr::Position, format_position(&position));
        Ok(Self {
            core,
            incoming: Vec::new(),
            outgoing: Vec::new(),
            builder: None,
        })
    }

    /// 设置路口轮廓
    pub fn with_shape(mut self, shape: &[Point2]) -> Self {
        self.core.set_raw(Attr::Shape, format_position_list(shape));
        self
    }

    pub fn position(&self) -> Point2 {
        self.core.position(Attr::Position).unwrap_or_else(Point2::origin)
    }

    pub fn incoming(&self) -> &[String] {
        &self.incoming
    }

    pub fn outgoing(&self) -> &[String] {
        &self.outgoing
    }

    /// 所有关联路段（进入在前）
    pub fn incident_links(&self) -> impl Iterator<Item = &String> {
        self.incoming.iter().chain(self.outgoing.iter())
    }

    pub fn has_incident_links(&self) -> bool {
        !self.incoming.is_empty() || !self.outgoing.is_empty()
    }

    /// 构网子系统中的句柄（仅注册后有效）
    pub fn builder_handle(&self) -> Option<Handle> {
        self.builder
    }

    pub(crate) fn add_incoming(&mut self, link: &str) {
        self.incoming.push(link.to_string());
    }

    pub(crate) fn add_outgoing(&mut self, link: &str) {
        self.outgoing.push(link.to_string());
    }

    pub(crate) fn remove_link(&mut self, link: &str) {
        self.incoming.retain(|l| l != link);
        self.outgoing.retain(|l| l != link);
    }

    pub(crate) fn rename_link(&mut self, old: &str, new: &str) {
        for l in self.incoming.iter_mut().chain(self.outgoing.iter_mut()) {
            if l == old {
                *l = new.to_string();
            }
        }
    }

    /// 注册前清空由注册表维护的状态
    pub(crate) fn reset_wiring(&mut self) {
        self.incoming.clear();
        self.outgoing.clear();
        self.builder = None;
    }
}

impl AttributeCarrier for Node {
    fn core(&self) -> &CarrierCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CarrierCore {
        &mut self.core
    }

    fn boundary(&self) -> Option<BoundingBox2> {
        match self.core.positions(Attr::Shape) {
            Some(shape) if !shape.is_empty() => Some(BoundingBox2::from_points(&shape)),
            _ => Some(BoundingBox2::around(self.position(), NODE_RADIUS)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_boundary() {
        let catalog = TypeCatalog::standard();
        let node = Node::new(&catalog, "A", Point2::new(10.0, 20.0)).unwrap();
        assert_eq!(node.get_attribute(Attr::Position).unwrap(), "10,20");
        let bbox = node.boundary().unwrap();
        assert!(bbox.contains(&Point2::new(11.0, 21.0)));

        let shaped = node.with_shape(&[Point2::new(0.0, 0.0), Point2::new(4.0, 4.0)]);
        assert!(!shaped.boundary().unwrap().contains(&Point2::new(10.0, 20.0)));
    }

    #[test]
    fn test_incident_links() {
        let catalog = TypeCatalog::standard();
        let mut node = Node::new(&catalog, "A", Point2::origin()).unwrap();
        node.add_outgoing("AB");
        node.add_incoming("BA");
        node.rename_link("AB", "L1");
        assert_eq!(node.incident_links().collect::<Vec<_>>(), ["BA", "L1"]);
        node.remove_link("BA");
        assert!(node.has_incident_links());
    }
}
