//! 属性键、取值类型与校验
//!
//! 属性值在实体外部一律以字符串表示，取值类型决定字符串能否被接受。

use crate::catalog::CatalogError;
use crate::math::Point2;
use crate::tag::Tag;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 属性键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Attr {
    Id,
    Name,
    Position,
    Shape,
    Type,
    Color,
    Fill,
    Layer,
    Angle,
    Width,
    Length,
    Speed,
    Priority,
    NumLanes,
    From,
    To,
    Lane,
    Edge,
    Edges,
    Index,
    Allow,
    FromLane,
    ToLane,
    Pass,
    StartPos,
    EndPos,
    FriendlyPos,
    Lines,
    PersonCapacity,
    ChargingPower,
    Efficiency,
    RoadsideCapacity,
    Period,
    File,
    Route,
    StoppingPlace,
    Depart,
    DepartLane,
    Begin,
    End,
    Number,
    VehsPerHour,
    Probability,
    Duration,
    Until,
    Parking,
    Accel,
    Decel,
    MaxSpeed,
    VClass,
    Weight,
    Value,
}

impl Attr {
    pub fn as_str(&self) -> &'static str {
        match self {
            Attr::Id => "id",
            Attr::Name => "name",
            Attr::Position => "position",
            Attr::Shape => "shape",
            Attr::Type => "type",
            Attr::Color => "color",
            Attr::Fill => "fill",
            Attr::Layer => "layer",
            Attr::Angle => "angle",
            Attr::Width => "width",
            Attr::Length => "length",
            Attr::Speed => "speed",
            Attr::Priority => "priority",
            Attr::NumLanes => "numLanes",
            Attr::From => "from",
            Attr::To => "to",
            Attr::Lane => "lane",
            Attr::Edge => "edge",
            Attr::Edges => "edges",
            Attr::Index => "index",
            Attr::Allow => "allow",
            Attr::FromLane => "fromLane",
            Attr::ToLane => "toLane",
            Attr::Pass => "pass",
            Attr::StartPos => "startPos",
            Attr::EndPos => "endPos",
            Attr::FriendlyPos => "friendlyPos",
            Attr::Lines => "lines",
            Attr::PersonCapacity => "personCapacity",
            Attr::ChargingPower => "power",
            Attr::Efficiency => "efficiency",
            Attr::RoadsideCapacity => "roadsideCapacity",
            Attr::Period => "period",
            Attr::File => "file",
            Attr::Route => "route",
            Attr::StoppingPlace => "stoppingPlace",
            Attr::Depart => "depart",
            Attr::DepartLane => "departLane",
            Attr::Begin => "begin",
            Attr::End => "end",
            Attr::Number => "number",
            Attr::VehsPerHour => "vehsPerHour",
            Attr::Probability => "probability",
            Attr::Duration => "duration",
            Attr::Until => "until",
            Attr::Parking => "parking",
            Attr::Accel => "accel",
            Attr::Decel => "decel",
            Attr::MaxSpeed => "maxSpeed",
            Attr::VClass => "vClass",
            Attr::Weight => "weight",
            Attr::Value => "value",
        }
    }
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 属性取值类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// 任意字符串
    Text,
    /// 合法的实体标识符
    Id,
    /// 以空格分隔的标识符列表
    IdList,
    Int,
    NonNegativeInt,
    Float,
    NonNegativeFloat,
    /// 概率 [0, 1]
    Probability,
    Bool,
    /// 时间（秒，非负）
    Time,
    /// "x,y"
    Position,
    /// 以空格分隔的 "x,y" 列表
    PositionList,
    /// "r,g,b" 或 "r,g,b,a"
    Color,
    /// 枚举值之一
    Choice(&'static [&'static str]),
}

/// 标识符中不允许出现的字符
const INVALID_ID_CHARS: &[char] = &[
    '\t', '\n', '\r', ' ', '@', '$', '%', '^', '&', '/', '|', '\\', '{', '}', '*', '\'', '"', ';',
    ':', '<', '>',
];

/// 检查标识符是否合法
pub fn is_valid_id(value: &str) -> bool {
    !value.is_empty() && !value.contains(INVALID_ID_CHARS)
}

/// 解析 "x,y" 格式的位置
pub fn parse_position(value: &str) -> Option<Point2> {
    let (x, y) = value.trim().split_once(',')?;
    let x: f64 = x.trim().parse().ok()?;
    let y: f64 = y.trim().parse().ok()?;
    (x.is_finite() && y.is_finite()).then(|| Point2::new(x, y))
}

/// 解析以空格分隔的位置列表
pub fn parse_position_list(value: &str) -> Option<Vec<Point2>> {
    value.split_whitespace().map(parse_position).collect()
}

pub fn format_position(point: &Point2) -> String {
    format!("{},{}", point.x, point.y)
}

pub fn format_position_list(points: &[Point2]) -> String {
    points
        .iter()
        .map(format_position)
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_float(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl ValueKind {
    /// 检查字符串是否可以解析为该类型
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            ValueKind::Text => true,
            ValueKind::Id => is_valid_id(value),
            ValueKind::IdList => value.split_whitespace().all(is_valid_id),
            ValueKind::Int => value.trim().parse::<i64>().is_ok(),
            ValueKind::NonNegativeInt => value.trim().parse::<u64>().is_ok(),
            ValueKind::Float => parse_float(value).is_some(),
            ValueKind::NonNegativeFloat | ValueKind::Time => {
                parse_float(value).is_some_and(|v| v >= 0.0)
            }
            ValueKind::Probability => parse_float(value).is_some_and(|v| (0.0..=1.0).contains(&v)),
            ValueKind::Bool => matches!(value, "true" | "false" | "1" | "0"),
            ValueKind::Position => parse_position(value).is_some(),
            ValueKind::PositionList => {
                !value.trim().is_empty() && parse_position_list(value).is_some()
            }
            ValueKind::Color => {
                let parts: Vec<_> = value.split(',').collect();
                (parts.len() == 3 || parts.len() == 4)
                    && parts.iter().all(|p| p.trim().parse::<u8>().is_ok())
            }
            ValueKind::Choice(options) => options.contains(&value),
        }
    }
}

/// 单个属性的元数据
#[derive(Debug, Clone, PartialEq)]
pub struct AttrProperties {
    pub attr: Attr,
    pub kind: ValueKind,
    /// 默认值，构造实体时写入
    pub default: Option<&'static str>,
    /// 结构性属性：表达引用或拓扑关系，不能通过本地 set 修改
    pub structural: bool,
    /// 可选属性：可以启用/禁用
    pub optional: bool,
    /// 互斥组：同组的可选属性同一时刻只能启用一个
    pub exclusive_group: Option<u8>,
}

impl AttrProperties {
    pub const fn new(attr: Attr, kind: ValueKind) -> Self {
        Self {
            attr,
            kind,
            default: None,
            structural: false,
            optional: false,
            exclusive_group: None,
        }
    }

    pub const fn with_default(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self
    }

    pub const fn structural(mut self) -> Self {
        self.structural = true;
        self
    }

    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// 加入互斥组（隐含可选）
    pub const fn exclusive(mut self, group: u8) -> Self {
        self.optional = true;
        self.exclusive_group = Some(group);
        self
    }
}

/// 属性操作错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AttributeError {
    #[error("attribute '{attr}' is not supported by {tag}")]
    UnsupportedAttribute { tag: Tag, attr: Attr },

    #[error("operation not supported by {tag}: {reason}")]
    UnsupportedOperation { tag: Tag, reason: String },

    #[error("invalid value '{value}' for attribute '{attr}' of {tag}")]
    InvalidValue { tag: Tag, attr: Attr, value: String },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_kinds() {
        assert!(ValueKind::Id.accepts("stop_1"));
        assert!(!ValueKind::Id.accepts(""));
        assert!(!ValueKind::Id.accepts("a b"));
        assert!(ValueKind::NonNegativeFloat.accepts("13.89"));
        assert!(!ValueKind::NonNegativeFloat.accepts("-1"));
        assert!(!ValueKind::Float.accepts("NaN"));
        assert!(ValueKind::Probability.accepts("0.25"));
        assert!(!ValueKind::Probability.accepts("1.5"));
        assert!(ValueKind::Color.accepts("255,0,0"));
        assert!(!ValueKind::Color.accepts("300,0,0"));
        assert!(ValueKind::Choice(&["a", "b"]).accepts("b"));
    }

    #[test]
    fn test_position_roundtrip_format() {
        let pts = parse_position_list("0,0 10.5,-3").unwrap();
        assert_eq!(pts.len(), 2);
        assert_eq!(format_position_list(&pts), "0,0 10.5,-3");
        assert!(parse_position("1;2").is_none());
    }
}
