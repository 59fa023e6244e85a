//! 具体实体类型
//!
//! 每种实体只实现自己需要的能力：全部实现 `AttributeCarrier`，
//! 参与父子层级的实体另外实现 `HierarchicalElement`。

mod additional;
mod data;
mod demand;
mod link;
mod link_type;
mod node;
mod shape;
mod taz;

pub use additional::{Additional, AdditionalSlave};
pub use data::{DataInterval, DataSet, GenericData};
pub use demand::{embedded_route_id, DemandElement, EmbeddedRoute, PlanStep};
pub use link::{connection_id, lane_id, Connection, Lane, Link};
pub use link_type::LinkType;
pub use node::Node;
pub use shape::Shape;
pub use taz::TazElement;

use crate::carrier::AttributeCarrier;
use crate::entity::EntityKey;
use crate::hierarchy::HierarchicalElement;
use crate::math::BoundingBox2;
use crate::tag::{Category, Tag};

/// 可注册的实体
#[derive(Debug, Clone)]
pub enum Element {
    Node(Node),
    Link(Link),
    LinkType(LinkType),
    Additional(Additional),
    Shape(Shape),
    Taz(TazElement),
    Demand(DemandElement),
    DataSet(DataSet),
}

macro_rules! dispatch {
    ($self:expr, $e:ident => $body:expr) => {
        match $self {
            Element::Node($e) => $body,
            Element::Link($e) => $body,
            Element::LinkType($e) => $body,
            Element::Additional($e) => $body,
            Element::Shape($e) => $body,
            Element::Taz($e) => $body,
            Element::Demand($e) => $body,
            Element::DataSet($e) => $body,
        }
    };
}

impl Element {
    pub fn carrier(&self) -> &dyn AttributeCarrier {
        dispatch!(self, e => e)
    }

    pub fn carrier_mut(&mut self) -> &mut dyn AttributeCarrier {
        dispatch!(self, e => e)
    }

    pub fn tag(&self) -> Tag {
        self.carrier().tag()
    }

    pub fn id(&self) -> &str {
        self.carrier().id()
    }

    pub fn key(&self) -> EntityKey {
        self.carrier().key()
    }

    pub fn category(&self) -> Category {
        self.carrier().tag_properties().category()
    }

    pub fn boundary(&self) -> Option<BoundingBox2> {
        self.carrier().boundary()
    }

    /// 参与父子层级的实体
    pub fn hierarchical(&self) -> Option<&dyn HierarchicalElement> {
        match self {
            Element::Link(e) => Some(e),
            Element::Additional(e) => Some(e),
            Element::Shape(e) => Some(e),
            Element::Taz(e) => Some(e),
            Element::Demand(e) => Some(e),
            Element::DataSet(e) => Some(e),
            Element::Node(_) | Element::LinkType(_) => None,
        }
    }

    pub fn hierarchical_mut(&mut self) -> Option<&mut dyn HierarchicalElement> {
        match self {
            Element::Link(e) => Some(e),
            Element::Additional(e) => Some(e),
            Element::Shape(e) => Some(e),
            Element::Taz(e) => Some(e),
            Element::Demand(e) => Some(e),
            Element::DataSet(e) => Some(e),
            Element::Node(_) | Element::LinkType(_) => None,
        }
    }

    pub fn parents(&self) -> &[EntityKey] {
        self.hierarchical().map(|h| h.parents()).unwrap_or(&[])
    }

    pub fn children(&self) -> &[EntityKey] {
        self.hierarchical().map(|h| h.children()).unwrap_or(&[])
    }

    /// 从属子实体
    pub fn slaves(&self) -> Vec<&dyn AttributeCarrier> {
        let mut slaves: Vec<&dyn AttributeCarrier> = Vec::new();
        match self {
            Element::Link(link) => {
                slaves.extend(link.lanes().iter().map(|l| l as &dyn AttributeCarrier));
                slaves.extend(link.connections().iter().map(|c| c as &dyn AttributeCarrier));
            }
            Element::Additional(additional) => {
                slaves.extend(additional.slaves().iter().map(|s| s as &dyn AttributeCarrier));
            }
            Element::Demand(demand) => {
                if let Some(route) = demand.embedded_route() {
                    slaves.push(route);
                }
                slaves.extend(demand.plan().iter().map(|s| s as &dyn AttributeCarrier));
            }
            Element::DataSet(set) => {
                for interval in set.intervals() {
                    slaves.push(interval);
                    slaves.extend(interval.records().iter().map(|r| r as &dyn AttributeCarrier));
                }
            }
            Element::Node(_) | Element::LinkType(_) | Element::Shape(_) | Element::Taz(_) => {}
        }
        slaves
    }

    /// 按标签和推导标识符查找从属子实体
    pub fn slave_mut(&mut self, tag: Tag, id: &str) -> Option<&mut dyn AttributeCarrier> {
        match self {
            Element::Link(link) => match tag {
                Tag::Lane => link
                    .lanes_mut()
                    .iter_mut()
                    .find(|l| l.id() == id)
                    .map(|l| l as &mut dyn AttributeCarrier),
                Tag::Connection => link
                    .connections_mut()
                    .iter_mut()
                    .find(|c| c.id() == id)
                    .map(|c| c as &mut dyn AttributeCarrier),
                _ => None,
            },
            Element::Additional(additional) => additional
                .slaves_mut()
                .iter_mut()
                .find(|s| s.tag() == tag && s.id() == id)
                .map(|s| s as &mut dyn AttributeCarrier),
            Element::Demand(demand) => {
                if tag == Tag::RouteEmbedded {
                    return demand
                        .embedded_route_mut()
                        .filter(|r| r.id() == id)
                        .map(|r| r as &mut dyn AttributeCarrier);
                }
                demand
                    .plan_mut()
                    .iter_mut()
                    .find(|s| s.tag() == tag && s.id() == id)
                    .map(|s| s as &mut dyn AttributeCarrier)
            }
            Element::DataSet(set) => set.intervals_mut().iter_mut().find_map(|interval| {
                if tag == Tag::DataInterval {
                    return (interval.id() == id).then_some(interval as &mut dyn AttributeCarrier);
                }
                interval
                    .records_mut()
                    .iter_mut()
                    .find(|r| r.tag() == tag && r.id() == id)
                    .map(|r| r as &mut dyn AttributeCarrier)
            }),
            Element::Node(_) | Element::LinkType(_) | Element::Shape(_) | Element::Taz(_) => None,
        }
    }

    /// 用于路径缓存的路段序列
    pub fn path_links(&self) -> Vec<String> {
        match self {
            Element::Additional(a) => a.path_links(),
            Element::Demand(d) => d.path_links(),
            _ => Vec::new(),
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Element::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_link(&self) -> Option<&Link> {
        match self {
            Element::Link(l) => Some(l),
            _ => None,
        }
    }

    pub(crate) fn as_node_mut(&mut self) -> Option<&mut Node> {
        match self {
            Element::Node(n) => Some(n),
            _ => None,
        }
    }

    pub(crate) fn as_link_mut(&mut self) -> Option<&mut Link> {
        match self {
            Element::Link(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_additional(&self) -> Option<&Additional> {
        match self {
            Element::Additional(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_demand(&self) -> Option<&DemandElement> {
        match self {
            Element::Demand(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_data_set(&self) -> Option<&DataSet> {
        match self {
            Element::DataSet(d) => Some(d),
            _ => None,
        }
    }

    /// 更新自身标识以及推导出的从属标识
    pub(crate) fn rename(&mut self, new_id: &str) {
        match self {
            Element::Link(l) => l.rename(new_id),
            Element::Additional(a) => a.rename(new_id),
            Element::Demand(d) => d.rename(new_id),
            Element::DataSet(d) => d.rename(new_id),
            Element::Node(n) => n.core_mut().set_id(new_id),
            Element::LinkType(t) => t.core_mut().set_id(new_id),
            Element::Shape(s) => s.core_mut().set_id(new_id),
            Element::Taz(t) => t.core_mut().set_id(new_id),
        }
    }

    /// 清空由注册表维护的状态（子引用、构网句柄、路口连线）
    pub(crate) fn reset_wiring(&mut self) {
        match self {
            Element::Node(n) => n.reset_wiring(),
            Element::Link(l) => l.reset_wiring(),
            Element::Additional(a) => a.reset_wiring(),
            Element::Shape(s) => s.reset_wiring(),
            Element::Taz(t) => t.reset_wiring(),
            Element::Demand(d) => d.reset_wiring(),
            Element::DataSet(d) => d.collect_parents(),
            Element::LinkType(_) => {}
        }
    }
}

macro_rules! impl_from {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Element {
                fn from(value: $ty) -> Self {
                    Element::$variant(value)
                }
            }
        )*
    };
}

impl_from!(
    Node(Node),
    Link(Link),
    LinkType(LinkType),
    Additional(Additional),
    Shape(Shape),
    Taz(TazElement),
    Demand(DemandElement),
    DataSet(DataSet),
);
