//! 属性载体
//!
//! 所有实体共享的能力集合：身份、字符串化的属性读写、可选属性的启用/禁用、
//! 选择标志以及包围盒。属性的本地修改不会触发任何注册表副作用。

use crate::attribute::{
    is_valid_id, parse_position, parse_position_list, Attr, AttrProperties, AttributeError,
};
use crate::catalog::{TagProperties, TypeCatalog};
use crate::entity::EntityKey;
use crate::math::{BoundingBox2, Point2};
use crate::tag::Tag;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// 属性存储
///
/// 每个实体内嵌一个 `CarrierCore`，具体实体类型只负责子实体和层级关系。
#[derive(Clone)]
pub struct CarrierCore {
    id: String,
    props: Arc<TagProperties>,
    values: BTreeMap<Attr, String>,
    disabled: BTreeSet<Attr>,
    selected: bool,
}

impl fmt::Debug for CarrierCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CarrierCore")
            .field("tag", &self.props.tag())
            .field("id", &self.id)
            .field("values", &self.values)
            .field("selected", &self.selected)
            .finish()
    }
}

impl CarrierCore {
    /// 创建载体并写入默认值
    ///
    /// 非从属实体的标识符必须合法；从属实体的标识符由父实体推导。
    pub fn new(
        catalog: &TypeCatalog,
        tag: Tag,
        id: impl Into<String>,
    ) -> Result<Self, AttributeError> {
        let props = Arc::clone(catalog.lookup(tag)?);
        let id = id.into();
        if !props.is_slave() && !is_valid_id(&id) {
            return Err(AttributeError::InvalidValue {
                tag,
                attr: Attr::Id,
                value: id,
            });
        }

        let mut values = BTreeMap::new();
        let mut disabled = BTreeSet::new();
        let mut seen_groups = BTreeSet::new();
        for a in props.attributes().iter().filter(|a| a.attr != Attr::Id) {
            if let Some(default) = a.default {
                values.insert(a.attr, default.to_string());
            }
            let enabled = match a.exclusive_group {
                // 互斥组中第一个属性默认启用
                Some(group) => seen_groups.insert(group),
                None => !a.optional || a.default.is_some(),
            };
            if !enabled {
                disabled.insert(a.attr);
            }
        }

        Ok(Self {
            id,
            props,
            values,
            disabled,
            selected: false,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tag(&self) -> Tag {
        self.props.tag()
    }

    pub fn properties(&self) -> &Arc<TagProperties> {
        &self.props
    }

    fn check_supported(&self, attr: Attr) -> Result<&AttrProperties, AttributeError> {
        self.props
            .attribute(attr)
            .ok_or(AttributeError::UnsupportedAttribute {
                tag: self.tag(),
                attr,
            })
    }

    /// 读取属性；未设置的属性返回空字符串
    pub fn get(&self, attr: Attr) -> Result<String, AttributeError> {
        self.check_supported(attr)?;
        if attr == Attr::Id {
            return Ok(self.id.clone());
        }
        Ok(self.values.get(&attr).cloned().unwrap_or_default())
    }

    /// 已启用且已设置的属性值
    pub fn value(&self, attr: Attr) -> Option<&str> {
        if self.disabled.contains(&attr) {
            return None;
        }
        self.values.get(&attr).map(String::as_str)
    }

    pub fn float(&self, attr: Attr) -> Option<f64> {
        self.value(attr)?.trim().parse().ok()
    }

    pub fn uint(&self, attr: Attr) -> Option<usize> {
        self.value(attr)?.trim().parse().ok()
    }

    pub fn position(&self, attr: Attr) -> Option<Point2> {
        parse_position(self.value(attr)?)
    }

    pub fn positions(&self, attr: Attr) -> Option<Vec<Point2>> {
        parse_position_list(self.value(attr)?)
    }

    /// 以空格分隔的标识符列表
    pub fn ids(&self, attr: Attr) -> Vec<String> {
        self.value(attr)
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// 修改属性
    ///
    /// 标识符和结构性属性不能在本地修改，前者只能通过注册表重命名。
    pub fn set(&mut self, attr: Attr, value: &str) -> Result<(), AttributeError> {
        let props = self.check_supported(attr)?;
        if attr == Attr::Id {
            return Err(AttributeError::UnsupportedOperation {
                tag: self.tag(),
                reason: "the identifier can only be changed by renaming through the registry"
                    .to_string(),
            });
        }
        if props.structural {
            return Err(AttributeError::UnsupportedOperation {
                tag: self.tag(),
                reason: format!("'{}' is a structural attribute", attr),
            });
        }
        if !props.kind.accepts(value) {
            return Err(AttributeError::InvalidValue {
                tag: self.tag(),
                attr,
                value: value.to_string(),
            });
        }
        let optional = props.optional;
        self.values.insert(attr, value.to_string());
        if optional {
            self.enable(attr)?;
        }
        Ok(())
    }

    /// 构造或重命名时写入属性，跳过结构性检查
    pub(crate) fn set_raw(&mut self, attr: Attr, value: impl Into<String>) {
        self.values.insert(attr, value.into());
        if self.disabled.remove(&attr) {
            self.disable_group_peers(attr);
        }
    }

    pub(crate) fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn is_valid(&self, attr: Attr, value: &str) -> Result<bool, AttributeError> {
        let props = self.check_supported(attr)?;
        Ok(match attr {
            Attr::Id => is_valid_id(value),
            _ => props.kind.accepts(value),
        })
    }

    /// 启用可选属性；同一互斥组内的其他属性随之禁用
    pub fn enable(&mut self, attr: Attr) -> Result<(), AttributeError> {
        let props = self.check_supported(attr)?;
        if !props.optional {
            return Err(AttributeError::UnsupportedOperation {
                tag: self.tag(),
                reason: format!("'{}' is not an optional attribute", attr),
            });
        }
        self.disabled.remove(&attr);
        self.disable_group_peers(attr);
        Ok(())
    }

    pub fn disable(&mut self, attr: Attr) -> Result<(), AttributeError> {
        let props = self.check_supported(attr)?;
        if !props.optional {
            return Err(AttributeError::UnsupportedOperation {
                tag: self.tag(),
                reason: format!("'{}' is not an optional attribute", attr),
            });
        }
        self.disabled.insert(attr);
        Ok(())
    }

    pub fn is_enabled(&self, attr: Attr) -> bool {
        self.props.has_attribute(attr) && !self.disabled.contains(&attr)
    }

    fn disable_group_peers(&mut self, attr: Attr) {
        let Some(group) = self.props.attribute(attr).and_then(|a| a.exclusive_group) else {
            return;
        };
        let peers: Vec<Attr> = self
            .props
            .attributes()
            .iter()
            .filter(|a| a.attr != attr && a.exclusive_group == Some(group))
            .map(|a| a.attr)
            .collect();
        self.disabled.extend(peers);
    }

    /// 把结构性属性中对 `old` 的引用改写为 `new`，返回是否有改动
    ///
    /// 只有路段改名时，`lane` 属性里的车道引用才跟着改写。
    pub(crate) fn rewrite_references(&mut self, old: &EntityKey, new: &EntityKey) -> bool {
        let structural: Vec<Attr> = self
            .props
            .attributes()
            .iter()
            .filter(|a| a.structural)
            .map(|a| a.attr)
            .collect();
        let mut changed = false;
        for attr in structural {
            if let Some(value) = self.values.get_mut(&attr) {
                let lanes = attr == Attr::Lane && old.tag == Tag::Edge;
                if let Some(rewritten) = rewrite_reference(value, &old.id, &new.id, lanes) {
                    *value = rewritten;
                    changed = true;
                }
            }
        }
        changed
    }
}

/// 改写以空格分隔的引用列表
///
/// 只匹配完整的标识符；`lanes` 为真时还匹配 `<id>_<车道序号>` 形式的车道引用。
pub fn rewrite_reference(value: &str, old: &str, new: &str, lanes: bool) -> Option<String> {
    let mut changed = false;
    let tokens: Vec<String> = value
        .split_whitespace()
        .map(|token| {
            if token == old {
                changed = true;
                return new.to_string();
            }
            if !lanes {
                return token.to_string();
            }
            if let Some(index) = token
                .strip_prefix(old)
                .and_then(|rest| rest.strip_prefix('_'))
                .filter(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
            {
                changed = true;
                return format!("{}_{}", new, index);
            }
            token.to_string()
        })
        .collect();
    changed.then(|| tokens.join(" "))
}

/// 单个属性修改前的状态，用于撤销
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSnapshot {
    attr: Attr,
    value: Option<String>,
    disabled: BTreeSet<Attr>,
}

impl AttributeSnapshot {
    pub fn attr(&self) -> Attr {
        self.attr
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

impl CarrierCore {
    pub(crate) fn snapshot(&self, attr: Attr) -> AttributeSnapshot {
        AttributeSnapshot {
            attr,
            value: self.values.get(&attr).cloned(),
            disabled: self.disabled.clone(),
        }
    }

    /// 恢复快照，返回恢复前的状态
    pub(crate) fn restore(&mut self, snapshot: &AttributeSnapshot) -> AttributeSnapshot {
        let current = self.snapshot(snapshot.attr);
        match &snapshot.value {
            Some(value) => {
                self.values.insert(snapshot.attr, value.clone());
            }
            None => {
                self.values.remove(&snapshot.attr);
            }
        }
        self.disabled = snapshot.disabled.clone();
        current
    }
}

/// 属性载体能力集
pub trait AttributeCarrier: fmt::Debug + Send + Sync {
    fn core(&self) -> &CarrierCore;

    fn core_mut(&mut self) -> &mut CarrierCore;

    fn tag(&self) -> Tag {
        self.core().tag()
    }

    fn id(&self) -> &str {
        self.core().id()
    }

    fn key(&self) -> EntityKey {
        EntityKey::new(self.tag(), self.id())
    }

    fn tag_properties(&self) -> &TagProperties {
        self.core().properties()
    }

    fn get_attribute(&self, attr: Attr) -> Result<String, AttributeError> {
        self.core().get(attr)
    }

    fn set_attribute(&mut self, attr: Attr, value: &str) -> Result<(), AttributeError> {
        self.core_mut().set(attr, value)
    }

    fn is_valid(&self, attr: Attr, value: &str) -> Result<bool, AttributeError> {
        self.core().is_valid(attr, value)
    }

    fn enable_attribute(&mut self, attr: Attr) -> Result<(), AttributeError> {
        self.core_mut().enable(attr)
    }

    fn disable_attribute(&mut self, attr: Attr) -> Result<(), AttributeError> {
        self.core_mut().disable(attr)
    }

    fn is_attribute_enabled(&self, attr: Attr) -> bool {
        self.core().is_enabled(attr)
    }

    fn is_selected(&self) -> bool {
        self.core().selected
    }

    fn select(&mut self) {
        self.core_mut().selected = true;
    }

    fn unselect(&mut self) {
        self.core_mut().selected = false;
    }

    /// 空间索引使用的包围盒，没有几何的实体返回 None
    fn boundary(&self) -> Option<BoundingBox2> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Plain(CarrierCore);

    impl AttributeCarrier for Plain {
        fn core(&self) -> &CarrierCore {
            &self.0
        }

        fn core_mut(&mut self) -> &mut CarrierCore {
            &mut self.0
        }
    }

    fn plain(tag: Tag, id: &str) -> Plain {
        Plain(CarrierCore::new(&TypeCatalog::standard(), tag, id).unwrap())
    }

    #[test]
    fn test_defaults_and_set() {
        let mut poi = plain(Tag::Poi, "p1");
        assert_eq!(poi.get_attribute(Attr::Layer).unwrap(), "0");
        poi.set_attribute(Attr::Layer, "2.5").unwrap();
        assert_eq!(poi.get_attribute(Attr::Layer).unwrap(), "2.5");

        assert!(matches!(
            poi.set_attribute(Attr::Layer, "high"),
            Err(AttributeError::InvalidValue { .. })
        ));
        assert!(matches!(
            poi.get_attribute(Attr::NumLanes),
            Err(AttributeError::UnsupportedAttribute { tag: Tag::Poi, attr: Attr::NumLanes })
        ));
    }

    #[test]
    fn test_identifier_is_not_settable() {
        let mut poi = plain(Tag::Poi, "p1");
        assert!(matches!(
            poi.set_attribute(Attr::Id, "p2"),
            Err(AttributeError::UnsupportedOperation { .. })
        ));
        assert_eq!(poi.id(), "p1");
        assert!(poi.is_valid(Attr::Id, "p2").unwrap());
        assert!(!poi.is_valid(Attr::Id, "p 2").unwrap());
    }

    #[test]
    fn test_invalid_identifier_rejected() {
        let err = CarrierCore::new(&TypeCatalog::standard(), Tag::Poi, "bad id").unwrap_err();
        assert!(matches!(err, AttributeError::InvalidValue { attr: Attr::Id, .. }));
    }

    #[test]
    fn test_exclusive_attributes() {
        let mut flow = plain(Tag::Flow, "f1");
        assert!(flow.is_attribute_enabled(Attr::End));
        assert!(!flow.is_attribute_enabled(Attr::Number));
        assert!(flow.is_attribute_enabled(Attr::VehsPerHour));
        assert!(!flow.is_attribute_enabled(Attr::Period));

        flow.set_attribute(Attr::Number, "100").unwrap();
        assert!(flow.is_attribute_enabled(Attr::Number));
        assert!(!flow.is_attribute_enabled(Attr::End));

        flow.enable_attribute(Attr::Probability).unwrap();
        assert!(!flow.is_attribute_enabled(Attr::VehsPerHour));
        assert!(flow.disable_attribute(Attr::Begin).is_err());
    }

    #[test]
    fn test_selection_flag() {
        let mut poi = plain(Tag::Poi, "p1");
        assert!(!poi.is_selected());
        poi.select();
        assert!(poi.is_selected());
        poi.unselect();
        assert!(!poi.is_selected());
    }

    #[test]
    fn test_rewrite_reference() {
        assert_eq!(
            rewrite_reference("AB_1", "AB", "L1", true).as_deref(),
            Some("L1_1")
        );
        assert_eq!(rewrite_reference("ABC AB_x", "AB", "L1", true), None);

        // 路段列表只按完整标识符匹配
        assert_eq!(
            rewrite_reference("AB BC AB_1", "AB", "L1", false).as_deref(),
            Some("L1 BC AB_1")
        );
        assert_eq!(rewrite_reference("AB_1", "AB", "L1", false), None);
    }
}
