//! 类型标签与类别
//!
//! 每个实体都带有一个类型标签，标签决定实体所属的类别、允许的属性集合
//! 以及在注册表中的分区。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 实体类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tag {
    // 网络元素
    Junction,
    Edge,
    Type,
    Lane,
    Connection,

    // 附属设施
    BusStop,
    TrainStop,
    ContainerStop,
    Access,
    ChargingStation,
    ParkingArea,
    ParkingSpace,
    E1Detector,
    E2Detector,
    E3Detector,
    DetEntry,
    DetExit,
    RouteProbe,
    Vaporizer,
    Calibrator,
    CalibratorFlow,
    VariableSpeedSign,
    VariableSpeedSignStep,
    Rerouter,
    RerouterInterval,
    ClosingReroute,

    // 形状
    Poly,
    Poi,
    PoiLane,

    // 交通小区
    Taz,
    TazSource,
    TazSink,

    // 需求元素
    VType,
    PType,
    Route,
    RouteEmbedded,
    Vehicle,
    Trip,
    VehicleWithRoute,
    Flow,
    FlowRoute,
    FlowWithRoute,
    Person,
    PersonFlow,
    Container,
    ContainerFlow,
    Stop,
    PersonTrip,
    Walk,
    Ride,
    StopPerson,
    Transport,
    Tranship,
    StopContainer,

    // 统计数据
    DataSet,
    DataInterval,
    EdgeData,
    EdgeRelData,
    TazRelData,
}

impl Tag {
    /// 所有标签
    pub const ALL: &'static [Tag] = &[
        Tag::Junction,
        Tag::Edge,
        Tag::Type,
        Tag::Lane,
        Tag::Connection,
        Tag::BusStop,
        Tag::TrainStop,
        Tag::ContainerStop,
        Tag::Access,
        Tag::ChargingStation,
        Tag::ParkingArea,
        Tag::ParkingSpace,
        Tag::E1Detector,
        Tag::E2Detector,
        Tag::E3Detector,
        Tag::DetEntry,
        Tag::DetExit,
        Tag::RouteProbe,
        Tag::Vaporizer,
        Tag::Calibrator,
        Tag::CalibratorFlow,
        Tag::VariableSpeedSign,
        Tag::VariableSpeedSignStep,
        Tag::Rerouter,
        Tag::RerouterInterval,
        Tag::ClosingReroute,
        Tag::Poly,
        Tag::Poi,
        Tag::PoiLane,
        Tag::Taz,
        Tag::TazSource,
        Tag::TazSink,
        Tag::VType,
        Tag::PType,
        Tag::Route,
        Tag::RouteEmbedded,
        Tag::Vehicle,
        Tag::Trip,
        Tag::VehicleWithRoute,
        Tag::Flow,
        Tag::FlowRoute,
        Tag::FlowWithRoute,
        Tag::Person,
        Tag::PersonFlow,
        Tag::Container,
        Tag::ContainerFlow,
        Tag::Stop,
        Tag::PersonTrip,
        Tag::Walk,
        Tag::Ride,
        Tag::StopPerson,
        Tag::Transport,
        Tag::Tranship,
        Tag::StopContainer,
        Tag::DataSet,
        Tag::DataInterval,
        Tag::EdgeData,
        Tag::EdgeRelData,
        Tag::TazRelData,
    ];

    /// 标签名称（与交换格式中的元素名一致）
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Junction => "junction",
            Tag::Edge => "edge",
            Tag::Type => "type",
            Tag::Lane => "lane",
            Tag::Connection => "connection",
            Tag::BusStop => "busStop",
            Tag::TrainStop => "trainStop",
            Tag::ContainerStop => "containerStop",
            Tag::Access => "access",
            Tag::ChargingStation => "chargingStation",
            Tag::ParkingArea => "parkingArea",
            Tag::ParkingSpace => "parkingSpace",
            Tag::E1Detector => "e1Detector",
            Tag::E2Detector => "e2Detector",
            Tag::E3Detector => "e3Detector",
            Tag::DetEntry => "detEntry",
            Tag::DetExit => "detExit",
            Tag::RouteProbe => "routeProbe",
            Tag::Vaporizer => "vaporizer",
            Tag::Calibrator => "calibrator",
            Tag::CalibratorFlow => "calibratorFlow",
            Tag::VariableSpeedSign => "variableSpeedSign",
            Tag::VariableSpeedSignStep => "step",
            Tag::Rerouter => "rerouter",
            Tag::RerouterInterval => "interval",
            Tag::ClosingReroute => "closingReroute",
            Tag::Poly => "poly",
            Tag::Poi => "poi",
            Tag::PoiLane => "poiLane",
            Tag::Taz => "taz",
            Tag::TazSource => "tazSource",
            Tag::TazSink => "tazSink",
            Tag::VType => "vType",
            Tag::PType => "pType",
            Tag::Route => "route",
            Tag::RouteEmbedded => "embeddedRoute",
            Tag::Vehicle => "vehicle",
            Tag::Trip => "trip",
            Tag::VehicleWithRoute => "vehicleWithRoute",
            Tag::Flow => "flow",
            Tag::FlowRoute => "flowRoute",
            Tag::FlowWithRoute => "flowWithRoute",
            Tag::Person => "person",
            Tag::PersonFlow => "personFlow",
            Tag::Container => "container",
            Tag::ContainerFlow => "containerFlow",
            Tag::Stop => "stop",
            Tag::PersonTrip => "personTrip",
            Tag::Walk => "walk",
            Tag::Ride => "ride",
            Tag::StopPerson => "personStop",
            Tag::Transport => "transport",
            Tag::Tranship => "tranship",
            Tag::StopContainer => "containerStopPlan",
            Tag::DataSet => "dataSet",
            Tag::DataInterval => "dataInterval",
            Tag::EdgeData => "edgeData",
            Tag::EdgeRelData => "edgeRelation",
            Tag::TazRelData => "tazRelation",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 实体类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// 节点（路口）
    Node,
    /// 路段
    Link,
    /// 路段类型模板
    LinkType,
    /// 车道（路段的子实体）
    Lane,
    /// 车道连接（路段的子实体）
    Connection,
    /// 附属设施
    Additional,
    /// 多边形与兴趣点
    Shape,
    /// 交通小区及其源/汇
    Taz,
    /// 需求元素
    Demand,
    /// 统计数据集
    DataSet,
    /// 统计时间区间
    DataInterval,
    /// 统计记录
    DataRecord,
}

impl Category {
    pub const ALL: &'static [Category] = &[
        Category::Node,
        Category::Link,
        Category::LinkType,
        Category::Lane,
        Category::Connection,
        Category::Additional,
        Category::Shape,
        Category::Taz,
        Category::Demand,
        Category::DataSet,
        Category::DataInterval,
        Category::DataRecord,
    ];

    /// 该类别修改后需要保存的文件组
    pub fn save_group(&self) -> SaveGroup {
        match self {
            Category::Node
            | Category::Link
            | Category::LinkType
            | Category::Lane
            | Category::Connection => SaveGroup::Network,
            Category::Additional | Category::Shape | Category::Taz => SaveGroup::Additionals,
            Category::Demand => SaveGroup::Demand,
            Category::DataSet | Category::DataInterval | Category::DataRecord => SaveGroup::Data,
        }
    }
}

/// 保存分组，每组对应一个"需要保存"标志
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SaveGroup {
    Network,
    Additionals,
    Demand,
    Data,
}

impl SaveGroup {
    pub const ALL: [SaveGroup; 4] = [
        SaveGroup::Network,
        SaveGroup::Additionals,
        SaveGroup::Demand,
        SaveGroup::Data,
    ];

    pub(crate) fn index(&self) -> usize {
        match self {
            SaveGroup::Network => 0,
            SaveGroup::Additionals => 1,
            SaveGroup::Demand => 2,
            SaveGroup::Data => 3,
        }
    }
}
