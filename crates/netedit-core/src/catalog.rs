//! 实体类型目录
//!
//! 类型目录是一张只读表：每个标签对应其类别、允许的属性集合以及若干标志位。
//! 目录在启动时构造一次，以 `Arc<TypeCatalog>` 的形式传给注册表和实体构造函数，
//! 之后不再修改。

use crate::attribute::{Attr, AttrProperties, ValueKind};
use crate::tag::{Category, Tag};
use std::collections::BTreeMap;
use std::sync::Arc;

/// 类型目录错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("unknown type tag '{0}'")]
    UnknownType(Tag),
}

/// 单个类型标签的元数据
#[derive(Debug, Clone, PartialEq)]
pub struct TagProperties {
    tag: Tag,
    category: Category,
    /// 唯一性分区：同一分区内的标识符不能重复
    partition: Tag,
    selectable: bool,
    spatial: bool,
    slave: bool,
    embedded_route: bool,
    attrs: Vec<AttrProperties>,
}

impl TagProperties {
    pub fn new(tag: Tag, category: Category) -> Self {
        Self {
            tag,
            category,
            partition: tag,
            selectable: false,
            spatial: false,
            slave: false,
            embedded_route: false,
            attrs: vec![AttrProperties::new(Attr::Id, ValueKind::Id)],
        }
    }

    pub fn selectable(mut self) -> Self {
        self.selectable = true;
        self
    }

    /// 放入空间索引
    pub fn spatial(mut self) -> Self {
        self.spatial = true;
        self
    }

    /// 从属实体：没有独立身份，只能通过父实体访问
    pub fn slave(mut self) -> Self {
        self.slave = true;
        self
    }

    /// 拥有一条内嵌路线
    pub fn embedded_route(mut self) -> Self {
        self.embedded_route = true;
        self
    }

    pub fn partition(mut self, partition: Tag) -> Self {
        self.partition = partition;
        self
    }

    pub fn attrs(mut self, attrs: impl IntoIterator<Item = AttrProperties>) -> Self {
        self.attrs.extend(attrs);
        self
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn partition_tag(&self) -> Tag {
        self.partition
    }

    pub fn is_selectable(&self) -> bool {
        self.selectable
    }

    pub fn is_spatially_indexed(&self) -> bool {
        self.spatial
    }

    pub fn is_slave(&self) -> bool {
        self.slave
    }

    pub fn has_embedded_route(&self) -> bool {
        self.embedded_route
    }

    /// 获取属性元数据，不支持的属性返回 None
    pub fn attribute(&self, attr: Attr) -> Option<&AttrProperties> {
        self.attrs.iter().find(|a| a.attr == attr)
    }

    pub fn has_attribute(&self, attr: Attr) -> bool {
        self.attribute(attr).is_some()
    }

    pub fn attributes(&self) -> &[AttrProperties] {
        &self.attrs
    }
}

/// 类型目录
#[derive(Debug, Clone)]
pub struct TypeCatalog {
    tags: BTreeMap<Tag, Arc<TagProperties>>,
}

impl TypeCatalog {
    /// 从声明表构造目录
    pub fn from_properties(properties: impl IntoIterator<Item = TagProperties>) -> Self {
        Self {
            tags: properties
                .into_iter()
                .map(|p| (p.tag, Arc::new(p)))
                .collect(),
        }
    }

    /// 标准目录，覆盖全部内置标签
    pub fn standard() -> Self {
        Self::from_properties(standard_table())
    }

    pub fn lookup(&self, tag: Tag) -> Result<&Arc<TagProperties>, CatalogError> {
        self.tags.get(&tag).ok_or(CatalogError::UnknownType(tag))
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.tags.contains_key(&tag)
    }

    pub fn category(&self, tag: Tag) -> Result<Category, CatalogError> {
        self.lookup(tag).map(|p| p.category)
    }

    pub fn is_selectable(&self, tag: Tag) -> Result<bool, CatalogError> {
        self.lookup(tag).map(|p| p.selectable)
    }

    pub fn is_spatially_indexed(&self, tag: Tag) -> Result<bool, CatalogError> {
        self.lookup(tag).map(|p| p.spatial)
    }

    pub fn is_slave(&self, tag: Tag) -> Result<bool, CatalogError> {
        self.lookup(tag).map(|p| p.slave)
    }

    /// 某类别下的全部标签
    pub fn tags_in(&self, category: Category) -> Vec<Tag> {
        self.tags
            .values()
            .filter(|p| p.category == category)
            .map(|p| p.tag)
            .collect()
    }

    /// 某类别下可注册（非从属）标签的唯一性分区
    pub fn partitions_in(&self, category: Category) -> Vec<Tag> {
        let mut partitions: Vec<Tag> = self
            .tags
            .values()
            .filter(|p| p.category == category && !p.slave)
            .map(|p| p.partition)
            .collect();
        partitions.sort();
        partitions.dedup();
        partitions
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl Default for TypeCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

const JUNCTION_TYPES: &[&str] = &[
    "priority",
    "traffic_light",
    "right_before_left",
    "unregulated",
    "allway_stop",
    "dead_end",
];

const VEHICLE_CLASSES: &[&str] = &[
    "passenger",
    "bus",
    "truck",
    "bicycle",
    "pedestrian",
    "tram",
    "rail",
    "ship",
];

type A = AttrProperties;
type K = ValueKind;

fn on_lane(length_default: &'static str) -> [AttrProperties; 5] {
    [
        A::new(Attr::Lane, K::Text).structural(),
        A::new(Attr::StartPos, K::Float).with_default("0"),
        A::new(Attr::EndPos, K::Float).with_default(length_default),
        A::new(Attr::Name, K::Text).optional(),
        A::new(Attr::FriendlyPos, K::Bool).with_default("false"),
    ]
}

fn lane_position() -> [AttrProperties; 3] {
    [
        A::new(Attr::Lane, K::Text).structural(),
        A::new(Attr::Position, K::Float).with_default("0"),
        A::new(Attr::FriendlyPos, K::Bool).with_default("false"),
    ]
}

fn detector_output() -> [AttrProperties; 3] {
    [
        A::new(Attr::Period, K::Time).with_default("300"),
        A::new(Attr::File, K::Text).optional(),
        A::new(Attr::Name, K::Text).optional(),
    ]
}

fn shape_style() -> [AttrProperties; 5] {
    [
        A::new(Attr::Color, K::Color).with_default("255,0,0"),
        A::new(Attr::Layer, K::Float).with_default("0"),
        A::new(Attr::Type, K::Text).optional(),
        A::new(Attr::Angle, K::Float).with_default("0"),
        A::new(Attr::Name, K::Text).optional(),
    ]
}

fn vehicle_common() -> [AttrProperties; 3] {
    [
        A::new(Attr::Type, K::Id).structural(),
        A::new(Attr::DepartLane, K::Text).with_default("first"),
        A::new(Attr::Color, K::Color).optional(),
    ]
}

/// 流的终止条件（组1）与发车间隔（组2）互斥
fn flow_common() -> [AttrProperties; 6] {
    [
        A::new(Attr::Begin, K::Time).with_default("0"),
        A::new(Attr::End, K::Time).with_default("3600").exclusive(1),
        A::new(Attr::Number, K::NonNegativeInt).exclusive(1),
        A::new(Attr::VehsPerHour, K::NonNegativeFloat)
            .with_default("1800")
            .exclusive(2),
        A::new(Attr::Period, K::Time).exclusive(2),
        A::new(Attr::Probability, K::Probability).exclusive(2),
    ]
}

fn from_to() -> [AttrProperties; 2] {
    [
        A::new(Attr::From, K::Id).structural(),
        A::new(Attr::To, K::Id).structural(),
    ]
}

fn plan_stop() -> [AttrProperties; 2] {
    [
        A::new(Attr::StoppingPlace, K::Id).structural(),
        A::new(Attr::Duration, K::Time).with_default("20"),
    ]
}

fn standard_table() -> Vec<TagProperties> {
    use Category as C;
    use TagProperties as T;

    let mut table = vec![
        // 网络元素
        T::new(Tag::Junction, C::Node).selectable().spatial().attrs([
            A::new(Attr::Position, K::Position).with_default("0,0"),
            A::new(Attr::Shape, K::PositionList).optional(),
            A::new(Attr::Type, K::Choice(JUNCTION_TYPES)).with_default("priority"),
            A::new(Attr::Name, K::Text).optional(),
        ]),
        T::new(Tag::Edge, C::Link).selectable().spatial().attrs([
            A::new(Attr::From, K::Id).structural(),
            A::new(Attr::To, K::Id).structural(),
            A::new(Attr::Shape, K::PositionList).optional(),
            A::new(Attr::NumLanes, K::NonNegativeInt)
                .with_default("1")
                .structural(),
            A::new(Attr::Speed, K::NonNegativeFloat).with_default("13.89"),
            A::new(Attr::Priority, K::Int).with_default("-1"),
            A::new(Attr::Type, K::Id).structural().optional(),
            A::new(Attr::Width, K::NonNegativeFloat).with_default("3.2"),
            A::new(Attr::Name, K::Text).optional(),
        ]),
        T::new(Tag::Type, C::LinkType).attrs([
            A::new(Attr::NumLanes, K::NonNegativeInt).with_default("1"),
            A::new(Attr::Speed, K::NonNegativeFloat).with_default("13.89"),
            A::new(Attr::Priority, K::Int).with_default("-1"),
            A::new(Attr::Width, K::NonNegativeFloat).with_default("3.2"),
        ]),
        T::new(Tag::Lane, C::Lane).selectable().slave().attrs([
            A::new(Attr::Index, K::NonNegativeInt).structural(),
            A::new(Attr::Speed, K::NonNegativeFloat).with_default("13.89"),
            A::new(Attr::Width, K::NonNegativeFloat).with_default("3.2"),
            A::new(Attr::Allow, K::Text).with_default("all"),
        ]),
        T::new(Tag::Connection, C::Connection).selectable().slave().attrs([
            A::new(Attr::From, K::Id).structural(),
            A::new(Attr::To, K::Id).structural(),
            A::new(Attr::FromLane, K::NonNegativeInt).structural(),
            A::new(Attr::ToLane, K::NonNegativeInt).structural(),
            A::new(Attr::Pass, K::Bool).with_default("false"),
        ]),
        // 附属设施
        T::new(Tag::BusStop, C::Additional)
            .selectable()
            .spatial()
            .attrs(on_lane("10"))
            .attrs([
                A::new(Attr::Lines, K::Text).optional(),
                A::new(Attr::PersonCapacity, K::NonNegativeInt).with_default("6"),
            ]),
        T::new(Tag::TrainStop, C::Additional)
            .selectable()
            .spatial()
            .attrs(on_lane("100"))
            .attrs([
                A::new(Attr::Lines, K::Text).optional(),
                A::new(Attr::PersonCapacity, K::NonNegativeInt).with_default("100"),
            ]),
        T::new(Tag::ContainerStop, C::Additional)
            .selectable()
            .spatial()
            .attrs(on_lane("10"))
            .attrs([A::new(Attr::Lines, K::Text).optional()]),
        T::new(Tag::Access, C::Additional)
            .selectable()
            .spatial()
            .attrs(lane_position())
            .attrs([A::new(Attr::Length, K::NonNegativeFloat).optional()]),
        T::new(Tag::ChargingStation, C::Additional)
            .selectable()
            .spatial()
            .attrs(on_lane("10"))
            .attrs([
                A::new(Attr::ChargingPower, K::NonNegativeFloat).with_default("22000"),
                A::new(Attr::Efficiency, K::Probability).with_default("0.95"),
            ]),
        T::new(Tag::ParkingArea, C::Additional)
            .selectable()
            .spatial()
            .attrs(on_lane("10"))
            .attrs([
                A::new(Attr::RoadsideCapacity, K::NonNegativeInt).with_default("0"),
                A::new(Attr::Width, K::NonNegativeFloat).with_default("3.2"),
                A::new(Attr::Length, K::NonNegativeFloat).optional(),
                A::new(Attr::Angle, K::Float).with_default("0"),
            ]),
        T::new(Tag::ParkingSpace, C::Additional)
            .selectable()
            .spatial()
            .attrs([
                A::new(Attr::Position, K::Position).with_default("0,0"),
                A::new(Attr::Width, K::NonNegativeFloat).with_default("3.2"),
                A::new(Attr::Length, K::NonNegativeFloat).with_default("5"),
                A::new(Attr::Angle, K::Float).with_default("0"),
            ]),
        T::new(Tag::E1Detector, C::Additional)
            .selectable()
            .spatial()
            .attrs(lane_position())
            .attrs(detector_output()),
        T::new(Tag::E2Detector, C::Additional)
            .selectable()
            .spatial()
            .attrs(lane_position())
            .attrs(detector_output())
            .attrs([A::new(Attr::Length, K::NonNegativeFloat).with_default("10")]),
        T::new(Tag::E3Detector, C::Additional)
            .selectable()
            .spatial()
            .attrs([A::new(Attr::Position, K::Position).with_default("0,0")])
            .attrs(detector_output()),
        T::new(Tag::DetEntry, C::Additional)
            .selectable()
            .spatial()
            .attrs(lane_position()),
        T::new(Tag::DetExit, C::Additional)
            .selectable()
            .spatial()
            .attrs(lane_position()),
        T::new(Tag::RouteProbe, C::Additional)
            .selectable()
            .spatial()
            .attrs([
                A::new(Attr::Edge, K::Id).structural(),
                A::new(Attr::Begin, K::Time).with_default("0"),
            ])
            .attrs(detector_output()),
        T::new(Tag::Vaporizer, C::Additional)
            .selectable()
            .spatial()
            .attrs([
                A::new(Attr::Edge, K::Id).structural(),
                A::new(Attr::Begin, K::Time).with_default("0"),
                A::new(Attr::End, K::Time).with_default("3600"),
                A::new(Attr::Name, K::Text).optional(),
            ]),
        T::new(Tag::Calibrator, C::Additional)
            .selectable()
            .spatial()
            .attrs([
                A::new(Attr::Edge, K::Id).structural(),
                A::new(Attr::Position, K::Float).with_default("0"),
            ])
            .attrs(detector_output()),
        T::new(Tag::CalibratorFlow, C::Additional).slave().attrs([
            A::new(Attr::Type, K::Id).optional(),
            A::new(Attr::Route, K::Id).optional(),
            A::new(Attr::Begin, K::Time).with_default("0"),
            A::new(Attr::End, K::Time).with_default("3600"),
            A::new(Attr::VehsPerHour, K::NonNegativeFloat)
                .with_default("1800")
                .exclusive(1),
            A::new(Attr::Speed, K::NonNegativeFloat).exclusive(1),
        ]),
        T::new(Tag::VariableSpeedSign, C::Additional)
            .selectable()
            .spatial()
            .attrs([
                A::new(Attr::Position, K::Position).with_default("0,0"),
                A::new(Attr::Lane, K::Text).structural(),
                A::new(Attr::Name, K::Text).optional(),
            ]),
        T::new(Tag::VariableSpeedSignStep, C::Additional)
            .slave()
            .attrs([
                A::new(Attr::Begin, K::Time).with_default("0"),
                A::new(Attr::Speed, K::NonNegativeFloat).with_default("13.89"),
            ]),
        T::new(Tag::Rerouter, C::Additional)
            .selectable()
            .spatial()
            .attrs([
                A::new(Attr::Position, K::Position).with_default("0,0"),
                A::new(Attr::Edges, K::IdList).structural(),
                A::new(Attr::Probability, K::Probability).with_default("1"),
                A::new(Attr::Name, K::Text).optional(),
            ]),
        T::new(Tag::RerouterInterval, C::Additional).slave().attrs([
            A::new(Attr::Begin, K::Time).with_default("0"),
            A::new(Attr::End, K::Time).with_default("3600"),
        ]),
        T::new(Tag::ClosingReroute, C::Additional).slave().attrs([
            A::new(Attr::Edge, K::Id).structural(),
            A::new(Attr::Allow, K::Text).with_default("authority"),
        ]),
        // 形状
        T::new(Tag::Poly, C::Shape)
            .selectable()
            .spatial()
            .attrs([
                A::new(Attr::Shape, K::PositionList),
                A::new(Attr::Fill, K::Bool).with_default("false"),
            ])
            .attrs(shape_style()),
        T::new(Tag::Poi, C::Shape)
            .selectable()
            .spatial()
            .attrs([A::new(Attr::Position, K::Position).with_default("0,0")])
            .attrs(shape_style()),
        T::new(Tag::PoiLane, C::Shape)
            .selectable()
            .spatial()
            .partition(Tag::Poi)
            .attrs(lane_position())
            .attrs(shape_style()),
        // 交通小区
        T::new(Tag::Taz, C::Taz).selectable().spatial().attrs([
            A::new(Attr::Shape, K::PositionList),
            A::new(Attr::Position, K::Position).optional(),
            A::new(Attr::Color, K::Color).with_default("255,0,0"),
            A::new(Attr::Fill, K::Bool).with_default("false"),
            A::new(Attr::Name, K::Text).optional(),
        ]),
        T::new(Tag::TazSource, C::Taz).selectable().attrs([
            A::new(Attr::Edge, K::Id).structural(),
            A::new(Attr::Weight, K::NonNegativeFloat).with_default("1"),
        ]),
        T::new(Tag::TazSink, C::Taz).selectable().attrs([
            A::new(Attr::Edge, K::Id).structural(),
            A::new(Attr::Weight, K::NonNegativeFloat).with_default("1"),
        ]),
        // 需求元素
        T::new(Tag::VType, C::Demand).attrs([
            A::new(Attr::VClass, K::Choice(VEHICLE_CLASSES)).with_default("passenger"),
            A::new(Attr::Accel, K::NonNegativeFloat).with_default("2.6"),
            A::new(Attr::Decel, K::NonNegativeFloat).with_default("4.5"),
            A::new(Attr::MaxSpeed, K::NonNegativeFloat).with_default("55.55"),
            A::new(Attr::Length, K::NonNegativeFloat).with_default("5"),
            A::new(Attr::Color, K::Color).optional(),
        ]),
        T::new(Tag::PType, C::Demand).attrs([
            A::new(Attr::VClass, K::Choice(VEHICLE_CLASSES)).with_default("pedestrian"),
            A::new(Attr::MaxSpeed, K::NonNegativeFloat).with_default("1.39"),
            A::new(Attr::Length, K::NonNegativeFloat).with_default("0.21"),
            A::new(Attr::Color, K::Color).optional(),
        ]),
        T::new(Tag::Route, C::Demand).selectable().attrs([
            A::new(Attr::Edges, K::IdList).structural(),
            A::new(Attr::Color, K::Color).optional(),
        ]),
        T::new(Tag::RouteEmbedded, C::Demand)
            .selectable()
            .slave()
            .attrs([
                A::new(Attr::Edges, K::IdList).structural(),
                A::new(Attr::Color, K::Color).optional(),
            ]),
        T::new(Tag::Vehicle, C::Demand)
            .selectable()
            .attrs(vehicle_common())
            .attrs([
                A::new(Attr::Route, K::Id).structural(),
                A::new(Attr::Depart, K::Time).with_default("0"),
            ]),
        T::new(Tag::Trip, C::Demand)
            .selectable()
            .attrs(vehicle_common())
            .attrs(from_to())
            .attrs([A::new(Attr::Depart, K::Time).with_default("0")]),
        T::new(Tag::VehicleWithRoute, C::Demand)
            .selectable()
            .embedded_route()
            .attrs(vehicle_common())
            .attrs([A::new(Attr::Depart, K::Time).with_default("0")]),
        T::new(Tag::Flow, C::Demand)
            .selectable()
            .attrs(vehicle_common())
            .attrs(from_to())
            .attrs(flow_common()),
        T::new(Tag::FlowRoute, C::Demand)
            .selectable()
            .attrs(vehicle_common())
            .attrs([A::new(Attr::Route, K::Id).structural()])
            .attrs(flow_common()),
        T::new(Tag::FlowWithRoute, C::Demand)
            .selectable()
            .embedded_route()
            .attrs(vehicle_common())
            .attrs(flow_common()),
        T::new(Tag::Person, C::Demand).selectable().attrs([
            A::new(Attr::Type, K::Id).structural(),
            A::new(Attr::Depart, K::Time).with_default("0"),
            A::new(Attr::Color, K::Color).optional(),
        ]),
        T::new(Tag::PersonFlow, C::Demand)
            .selectable()
            .attrs([A::new(Attr::Type, K::Id).structural()])
            .attrs(flow_common()),
        T::new(Tag::Container, C::Demand).selectable().attrs([
            A::new(Attr::Type, K::Id).structural(),
            A::new(Attr::Depart, K::Time).with_default("0"),
            A::new(Attr::Color, K::Color).optional(),
        ]),
        T::new(Tag::ContainerFlow, C::Demand)
            .selectable()
            .attrs([A::new(Attr::Type, K::Id).structural()])
            .attrs(flow_common()),
        T::new(Tag::Stop, C::Demand).selectable().slave().attrs([
            A::new(Attr::StoppingPlace, K::Id).structural().optional(),
            A::new(Attr::Lane, K::Text).structural().optional(),
            A::new(Attr::Duration, K::Time).with_default("20"),
            A::new(Attr::Until, K::Time).optional(),
            A::new(Attr::Parking, K::Bool).with_default("false"),
        ]),
        T::new(Tag::PersonTrip, C::Demand)
            .selectable()
            .slave()
            .attrs(from_to())
            .attrs([A::new(Attr::Lines, K::Text).optional()]),
        T::new(Tag::Walk, C::Demand)
            .selectable()
            .slave()
            .attrs([A::new(Attr::Edges, K::IdList).structural()]),
        T::new(Tag::Ride, C::Demand)
            .selectable()
            .slave()
            .attrs(from_to())
            .attrs([A::new(Attr::Lines, K::Text).with_default("ANY")]),
        T::new(Tag::StopPerson, C::Demand)
            .selectable()
            .slave()
            .attrs(plan_stop()),
        T::new(Tag::Transport, C::Demand)
            .selectable()
            .slave()
            .attrs(from_to())
            .attrs([A::new(Attr::Lines, K::Text).with_default("ANY")]),
        T::new(Tag::Tranship, C::Demand)
            .selectable()
            .slave()
            .attrs([
                A::new(Attr::Edges, K::IdList).structural(),
                A::new(Attr::Speed, K::NonNegativeFloat).with_default("5"),
            ]),
        T::new(Tag::StopContainer, C::Demand)
            .selectable()
            .slave()
            .attrs(plan_stop()),
        // 统计数据
        T::new(Tag::DataSet, C::DataSet),
        T::new(Tag::DataInterval, C::DataInterval).slave().attrs([
            A::new(Attr::Begin, K::Time).with_default("0"),
            A::new(Attr::End, K::Time).with_default("3600"),
        ]),
        T::new(Tag::EdgeData, C::DataRecord).selectable().slave().attrs([
            A::new(Attr::Edge, K::Id).structural(),
            A::new(Attr::Value, K::Float).optional(),
        ]),
        T::new(Tag::EdgeRelData, C::DataRecord)
            .selectable()
            .slave()
            .attrs(from_to())
            .attrs([A::new(Attr::Value, K::Float).optional()]),
        T::new(Tag::TazRelData, C::DataRecord)
            .selectable()
            .slave()
            .attrs(from_to())
            .attrs([A::new(Attr::Value, K::Float).optional()]),
    ];

    // 标签顺序与 Tag::ALL 一致，便于遍历时输出稳定
    table.sort_by_key(|p| p.tag);
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_covers_all_tags() {
        let catalog = TypeCatalog::standard();
        assert_eq!(catalog.len(), Tag::ALL.len());
        for tag in Tag::ALL {
            let props = catalog.lookup(*tag).unwrap();
            assert!(props.has_attribute(Attr::Id), "{} lacks id", tag);
        }
    }

    #[test]
    fn test_flags() {
        let catalog = TypeCatalog::standard();
        assert!(catalog.is_spatially_indexed(Tag::Junction).unwrap());
        assert!(!catalog.is_spatially_indexed(Tag::VType).unwrap());
        assert!(catalog.is_slave(Tag::RouteEmbedded).unwrap());
        assert!(!catalog.is_selectable(Tag::DataSet).unwrap());
        assert_eq!(catalog.category(Tag::BusStop).unwrap(), Category::Additional);
        assert!(catalog.lookup(Tag::VehicleWithRoute).unwrap().has_embedded_route());
    }

    #[test]
    fn test_unknown_type() {
        let catalog = TypeCatalog::from_properties([TagProperties::new(
            Tag::Junction,
            Category::Node,
        )]);
        assert_eq!(
            catalog.lookup(Tag::Edge).unwrap_err(),
            CatalogError::UnknownType(Tag::Edge)
        );
    }

    #[test]
    fn test_poi_partitions_share_bucket() {
        let catalog = TypeCatalog::standard();
        assert_eq!(catalog.partitions_in(Category::Shape), vec![Tag::Poly, Tag::Poi]);
        assert_eq!(
            catalog.lookup(Tag::PoiLane).unwrap().partition_tag(),
            Tag::Poi
        );
    }
}
