//! 路段、车道与车道连接
//!
//! 车道和连接是路段的从属实体：没有独立身份，标识符由所属路段推导，
//! 路段重命名后随之重新计算。

use super::link_type::LinkType;
use crate::attribute::{format_position_list, Attr, AttributeError};
use crate::carrier::{AttributeCarrier, CarrierCore};
use crate::catalog::TypeCatalog;
use crate::entity::Handle;
use crate::hierarchy::{HierarchicalElement, Hierarchy};
use crate::math::{BoundingBox2, Point2};
use crate::tag::Tag;

/// 车道标识符 `<路段>_<序号>`
pub fn lane_id(link: &str, index: usize) -> String {
    format!("{}_{}", link, index)
}

/// 连接标识符 `<起始路段>_<车道>-><目标路段>_<车道>`
pub fn connection_id(from: &str, from_lane: usize, to: &str, to_lane: usize) -> String {
    format!("{}->{}", lane_id(from, from_lane), lane_id(to, to_lane))
}

/// 车道
#[derive(Debug, Clone)]
pub struct Lane {
    core: CarrierCore,
    index: usize,
}

impl Lane {
    fn new(catalog: &TypeCatalog, link: &str, index: usize) -> Result<Self, AttributeError> {
        let mut core = CarrierCore::new(catalog, Tag::Lane, lane_id(link, index))?;
        core.set_raw(Attr::Index, index.to_string());
        Ok(Self { core, index })
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl AttributeCarrier for Lane {
    fn core(&self) -> &CarrierCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CarrierCore {
        &mut self.core
    }
}

/// 车道连接（从属于起始路段）
#[derive(Debug, Clone)]
pub struct Connection {
    core: CarrierCore,
}

impl Connection {
    pub fn new(
        catalog: &TypeCatalog,
        from: &str,
        from_lane: usize,
        to: &str,
        to_lane: usize,
    ) -> Result<Self, AttributeError> {
        let mut core = CarrierCore::new(
            catalog,
            Tag::Connection,
            connection_id(from, from_lane, to, to_lane),
        )?;
        core.set_raw(Attr::From, from);
        core.set_raw(Attr::To, to);
        core.set_raw(Attr::FromLane, from_lane.to_string());
        core.set_raw(Attr::ToLane, to_lane.to_string());
        Ok(Self { core })
    }

    pub fn from_link(&self) -> &str {
        self.core.value(Attr::From).unwrap_or_default()
    }

    pub fn to_link(&self) -> &str {
        self.core.value(Attr::To).unwrap_or_default()
    }

    pub fn from_lane(&self) -> usize {
        self.core.uint(Attr::FromLane).unwrap_or(0)
    }

    pub fn to_lane(&self) -> usize {
        self.core.uint(Attr::ToLane).unwrap_or(0)
    }

    /// 用新的路段名重新计算标识符
    pub(crate) fn relink(&mut self, from: &str, to: &str) {
        let id = connection_id(from, self.from_lane(), to, self.to_lane());
        self.core.set_raw(Attr::From, from);
        self.core.set_raw(Attr::To, to);
        self.core.set_id(id);
    }
}

impl AttributeCarrier for Connection {
    fn core(&self) -> &CarrierCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CarrierCore {
        &mut self.core
    }
}

/// 路段
#[derive(Debug, Clone)]
pub struct Link {
    core: CarrierCore,
    hierarchy: Hierarchy,
    lanes: Vec<Lane>,
    connections: Vec<Connection>,
    pub(crate) builder: Option<Handle>,
}

impl Link {
    pub fn new(
        catalog: &TypeCatalog,
        id: impl Into<String>,
        from: &str,
        to: &str,
        num_lanes: usize,
    ) -> Result<Self, AttributeError> {
        let mut core = CarrierCore::new(catalog, Tag::Edge, id)?;
        core.set_raw(Attr::From, from);
        core.set_raw(Attr::To, to);
        core.set_raw(Attr::NumLanes, num_lanes.to_string());
        let lanes = (0..num_lanes)
            .map(|i| Lane::new(catalog, core.id(), i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            core,
            hierarchy: Hierarchy::new(),
            lanes,
            connections: Vec::new(),
            builder: None,
        })
    }

    /// 按路段类型模板创建；模板属性只在创建时复制
    pub fn from_type(
        catalog: &TypeCatalog,
        id: impl Into<String>,
        from: &str,
        to: &str,
        link_type: &LinkType,
    ) -> Result<Self, AttributeError> {
        let mut link = Self::new(catalog, id, from, to, link_type.num_lanes())?;
        link.core.set_raw(Attr::Type, link_type.id());
        for attr in [Attr::Speed, Attr::Priority, Attr::Width] {
            let value = link_type.get_attribute(attr)?;
            link.core.set(attr, &value)?;
        }
        for lane in &mut link.lanes {
            for attr in [Attr::Speed, Attr::Width] {
                let value = link_type.get_attribute(attr)?;
                lane.core.set(attr, &value)?;
            }
        }
        Ok(link)
    }

    pub fn with_geometry(mut self, points: &[Point2]) -> Self {
        self.core.set_raw(Attr::Shape, format_position_list(points));
        self
    }

    /// 添加到目标路段的车道连接
    pub fn add_connection(
        &mut self,
        catalog: &TypeCatalog,
        from_lane: usize,
        to: &str,
        to_lane: usize,
    ) -> Result<&mut Connection, AttributeError> {
        if from_lane >= self.lanes.len() {
            return Err(AttributeError::InvalidValue {
                tag: Tag::Connection,
                attr: Attr::FromLane,
                value: from_lane.to_string(),
            });
        }
        let connection = Connection::new(catalog, self.core.id(), from_lane, to, to_lane)?;
        self.connections.push(connection);
        let last = self.connections.len() - 1;
        Ok(&mut self.connections[last])
    }

    pub fn from_node(&self) -> &str {
        self.core.value(Attr::From).unwrap_or_default()
    }

    pub fn to_node(&self) -> &str {
        self.core.value(Attr::To).unwrap_or_default()
    }

    pub fn link_type(&self) -> Option<&str> {
        self.core.value(Attr::Type)
    }

    pub fn geometry(&self) -> Vec<Point2> {
        self.core.positions(Attr::Shape).unwrap_or_default()
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    pub fn lanes_mut(&mut self) -> &mut [Lane] {
        &mut self.lanes
    }

    pub fn lane(&self, index: usize) -> Option<&Lane> {
        self.lanes.get(index)
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn connections_mut(&mut self) -> &mut [Connection] {
        &mut self.connections
    }

    /// 是否有连接指向 `target`
    pub fn connects_to(&self, target: &str) -> bool {
        self.connections.iter().any(|c| c.to_link() == target)
    }

    pub fn builder_handle(&self) -> Option<Handle> {
        self.builder
    }

    pub(crate) fn replace_connections(&mut self, connections: Vec<Connection>) -> Vec<Connection> {
        std::mem::replace(&mut self.connections, connections)
    }

    /// 重命名：车道标识符随之重算，连接标识符由注册表按构网子系统同步
    pub(crate) fn rename(&mut self, new_id: &str) {
        self.core.set_id(new_id);
        for lane in &mut self.lanes {
            lane.core.set_id(lane_id(new_id, lane.index));
        }
    }

    pub(crate) fn rename_endpoint(&mut self, old: &str, new: &str) {
        if self.from_node() == old {
            self.core.set_raw(Attr::From, new);
        }
        if self.to_node() == old {
            self.core.set_raw(Attr::To, new);
        }
    }

    pub(crate) fn reset_wiring(&mut self) {
        self.builder = None;
        self.hierarchy.clear_children();
    }
}

impl AttributeCarrier for Link {
    fn core(&self) -> &CarrierCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CarrierCore {
        &mut self.core
    }

    fn boundary(&self) -> Option<BoundingBox2> {
        let geometry = self.geometry();
        (!geometry.is_empty()).then(|| BoundingBox2::from_points(&geometry))
    }
}

impl HierarchicalElement for Link {
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
    fn test_lane_ids_follow_rename() {
        let catalog = TypeCatalog::standard();
        let mut link = Link::new(&catalog, "AB", "A", "B", 2).unwrap();
        assert_eq!(link.lanes()[1].id(), "AB_1");
        assert_eq!(link.lanes()[1].get_attribute(Attr::Index).unwrap(), "1");

        link.rename("L1");
        assert_eq!(link.id(), "L1");
        assert_eq!(link.lanes()[0].id(), "L1_0");
    }

    #[test]
    fn test_from_type_copies_template() {
        let catalog = TypeCatalog::standard();
        let mut highway = LinkType::new(&catalog, "highway").unwrap();
        highway.set_attribute(Attr::NumLanes, "3").unwrap();
        highway.set_attribute(Attr::Speed, "33.3").unwrap();

        let link = Link::from_type(&catalog, "AB", "A", "B", &highway).unwrap();
        assert_eq!(link.lanes().len(), 3);
        assert_eq!(link.link_type(), Some("highway"));
        assert_eq!(link.get_attribute(Attr::Speed).unwrap(), "33.3");
        assert_eq!(link.lanes()[2].get_attribute(Attr::Speed).unwrap(), "33.3");
    }

    #[test]
    fn test_connection_ids() {
        let catalog = TypeCatalog::standard();
        let mut link = Link::new(&catalog, "AB", "A", "B", 1).unwrap();
        let c = link.add_connection(&catalog, 0, "BC", 0).unwrap();
        assert_eq!(c.id(), "AB_0->BC_0");
        c.relink("L1", "BC");
        assert_eq!(c.id(), "L1_0->BC_0");
        assert!(link.add_connection(&catalog, 1, "BC", 0).is_err());
        assert!(link.connects_to("BC"));
    }

    #[test]
    fn test_structural_attributes_are_read_only() {
        let catalog = TypeCatalog::standard();
        let mut link = Link::new(&catalog, "AB", "A", "B", 1).unwrap();
        assert!(matches!(
            link.set_attribute(Attr::From, "C"),
            Err(AttributeError::UnsupportedOperation { .. })
        ));
        assert_eq!(link.from_node(), "A");
    }
}
