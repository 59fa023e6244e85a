//! 实体注册表
//!
//! 编辑器中所有实体的唯一拥有者。注册表负责：
//!
//! - 按类别/分区标签保存实体，保证同一分区内标识符唯一
//! - 与构网子系统（[`NetBuilder`]）保持节点/路段镜像一致
//! - 维护空间索引成员、父子反向引用、路径缓存和内嵌路线登记
//! - 标识符重命名的原子级联
//! - 按保存分组记录"需要保存"标志
//!
//! 所有检查都在修改之前完成，失败的操作不会留下部分状态。
//! 镜像或索引失去一致性属于程序错误，直接 panic。

use crate::attribute::{is_valid_id, Attr, AttributeError};
use crate::carrier::{AttributeCarrier, AttributeSnapshot};
use crate::catalog::{CatalogError, TypeCatalog};
use crate::config::EditorOptions;
use crate::elements::{
    embedded_route_id, Connection, DemandElement, Element, GenericData, Link, Node,
};
use crate::entity::{EntityKey, Handle};
use crate::hierarchy::HierarchicalElement;
use crate::netbuild::{BuildError, NbConnection, NetBuilder};
use crate::path::PathManager;
use crate::spatial::{GridIndex, SpatialIndex};
use crate::tag::{Category, SaveGroup, Tag};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// 默认车辆类型
pub const DEFAULT_VEHTYPE: &str = "DEFAULT_VEHTYPE";
/// 默认自行车类型
pub const DEFAULT_BIKETYPE: &str = "DEFAULT_BIKETYPE";
/// 默认行人类型
pub const DEFAULT_PEDTYPE: &str = "DEFAULT_PEDTYPE";

const DEFAULT_TYPES: [(Tag, &str, &str); 3] = [
    (Tag::VType, DEFAULT_VEHTYPE, "passenger"),
    (Tag::VType, DEFAULT_BIKETYPE, "bicycle"),
    (Tag::PType, DEFAULT_PEDTYPE, "pedestrian"),
];

/// 注册表错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("{tag} '{id}' already exists")]
    DuplicateId { tag: Tag, id: String },

    #[error("{tag} '{id}' is not registered")]
    NotRegistered { tag: Tag, id: String },

    #[error("cannot modify {tag} '{id}': {reason}")]
    InvalidOperation { tag: Tag, id: String, reason: String },

    #[error(transparent)]
    Attribute(#[from] AttributeError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

fn not_registered(key: &EntityKey) -> RegistryError {
    RegistryError::NotRegistered {
        tag: key.tag,
        id: key.id.clone(),
    }
}

fn invalid(key: &EntityKey, reason: impl Into<String>) -> RegistryError {
    let reason = reason.into();
    warn!("rejected operation on {}: {}", key, reason);
    RegistryError::InvalidOperation {
        tag: key.tag,
        id: key.id.clone(),
        reason,
    }
}

fn mirror_violation(key: &EntityKey, error: BuildError) -> ! {
    panic!("network builder out of sync for {}: {}", key, error)
}

type Collection = BTreeMap<String, Element>;

/// 实体注册表
#[derive(Debug)]
pub struct EntityRegistry {
    catalog: Arc<TypeCatalog>,
    /// 分区标签 -> 标识符 -> 实体
    collections: BTreeMap<Tag, Collection>,
    /// 内嵌路线标识符 -> 所属元素
    embedded_routes: BTreeMap<String, EntityKey>,
    ref_counts: BTreeMap<EntityKey, usize>,
    dirty: [bool; 4],
    spatial: Box<dyn SpatialIndex>,
    net: NetBuilder,
    paths: PathManager,
}

impl EntityRegistry {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self::with_spatial_index(catalog, Box::new(GridIndex::default()))
    }

    /// 使用自定义空间索引
    pub fn with_spatial_index(catalog: Arc<TypeCatalog>, spatial: Box<dyn SpatialIndex>) -> Self {
        Self {
            catalog,
            collections: BTreeMap::new(),
            embedded_routes: BTreeMap::new(),
            ref_counts: BTreeMap::new(),
            dirty: [false; 4],
            spatial,
            net: NetBuilder::new(),
            paths: PathManager::new(),
        }
    }

    /// 按编辑器选项创建，需要时加入默认车辆类型
    pub fn with_options(
        catalog: Arc<TypeCatalog>,
        options: &EditorOptions,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::with_spatial_index(
            catalog,
            Box::new(GridIndex::new(options.grid_cell_size)),
        );
        if options.default_vehicle_types {
            registry.add_default_vehicle_types()?;
        }
        Ok(registry)
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    pub fn spatial(&self) -> &dyn SpatialIndex {
        self.spatial.as_ref()
    }

    pub fn net(&self) -> &NetBuilder {
        &self.net
    }

    pub fn paths(&self) -> &PathManager {
        &self.paths
    }

    // ========== 查找 ==========

    fn partition_of(&self, tag: Tag) -> Result<Tag, CatalogError> {
        Ok(self.catalog.lookup(tag)?.partition_tag())
    }

    fn entry(&self, key: &EntityKey) -> Option<&Element> {
        let partition = self.partition_of(key.tag).ok()?;
        self.collections
            .get(&partition)?
            .get(&key.id)
            .filter(|e| e.tag() == key.tag)
    }

    fn entry_mut(&mut self, key: &EntityKey) -> Option<&mut Element> {
        let partition = self.partition_of(key.tag).ok()?;
        self.collections
            .get_mut(&partition)?
            .get_mut(&key.id)
            .filter(|e| e.tag() == key.tag)
    }

    fn hierarchical_mut(&mut self, key: &EntityKey) -> Option<&mut dyn HierarchicalElement> {
        self.entry_mut(key)?.hierarchical_mut()
    }

    /// 查找顶层实体
    pub fn lookup(&self, tag: Tag, id: &str) -> Option<&Element> {
        self.entry(&EntityKey::new(tag, id))
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.entry(key).is_some()
    }

    /// 查找属性载体，包括从属子实体
    pub fn lookup_carrier(&self, tag: Tag, id: &str) -> Option<&dyn AttributeCarrier> {
        if !self.catalog.is_slave(tag).ok()? {
            return self.lookup(tag, id).map(Element::carrier);
        }
        if tag == Tag::RouteEmbedded {
            let owner = self.embedded_routes.get(id)?;
            return self
                .entry(owner)?
                .as_demand()?
                .embedded_route()
                .map(|r| r as &dyn AttributeCarrier);
        }
        self.elements()
            .find_map(|e| e.slaves().into_iter().find(|s| s.tag() == tag && s.id() == id))
    }

    /// 可变查找属性载体，包括从属子实体
    ///
    /// 直接修改属性不会刷新空间索引，需要时调用 [`Self::set_attribute`]。
    pub fn lookup_mut(&mut self, tag: Tag, id: &str) -> Option<&mut dyn AttributeCarrier> {
        let key = EntityKey::new(tag, id);
        if !self.catalog.is_slave(tag).ok()? {
            return self.entry_mut(&key).map(Element::carrier_mut);
        }
        let owner = self.slave_owner(&key)?;
        self.entry_mut(&owner)?.slave_mut(tag, id)
    }

    fn slave_owner(&self, key: &EntityKey) -> Option<EntityKey> {
        if key.tag == Tag::RouteEmbedded {
            return self.embedded_routes.get(&key.id).cloned();
        }
        self.elements()
            .find(|e| {
                e.slaves()
                    .iter()
                    .any(|s| s.tag() == key.tag && s.id() == key.id)
            })
            .map(Element::key)
    }

    fn elements(&self) -> impl Iterator<Item = &Element> {
        self.collections.values().flat_map(|c| c.values())
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.lookup(Tag::Junction, id)?.as_node()
    }

    pub fn link(&self, id: &str) -> Option<&Link> {
        self.lookup(Tag::Edge, id)?.as_link()
    }

    fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.entry_mut(&EntityKey::new(Tag::Junction, id))?
            .as_node_mut()
    }

    fn link_mut(&mut self, id: &str) -> Option<&mut Link> {
        self.entry_mut(&EntityKey::new(Tag::Edge, id))?
            .as_link_mut()
    }

    /// 某标签的全部载体（从属标签会遍历其所有者）
    pub fn all_of(&self, tag: Tag) -> std::vec::IntoIter<&dyn AttributeCarrier> {
        let mut found: Vec<&dyn AttributeCarrier> = Vec::new();
        match self.catalog.lookup(tag) {
            Ok(props) if props.is_slave() => {
                for element in self.elements() {
                    found.extend(element.slaves().into_iter().filter(|s| s.tag() == tag));
                }
            }
            Ok(props) => {
                if let Some(collection) = self.collections.get(&props.partition_tag()) {
                    found.extend(
                        collection
                            .values()
                            .filter(|e| e.tag() == tag)
                            .map(Element::carrier),
                    );
                }
            }
            Err(_) => {}
        }
        found.into_iter()
    }

    /// 某标签已注册实体的标识符（有序）
    pub fn ids_of(&self, tag: Tag) -> Vec<String> {
        self.all_of(tag).map(|c| c.id().to_string()).collect()
    }

    pub fn count(&self, tag: Tag) -> usize {
        self.all_of(tag).len()
    }

    /// 已注册的顶层实体总数
    pub fn len(&self) -> usize {
        self.collections.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count_selected(&self, tag: Tag) -> usize {
        self.all_of(tag).filter(|c| c.is_selected()).count()
    }

    pub fn count_selected_in(&self, category: Category) -> usize {
        self.catalog
            .tags_in(category)
            .into_iter()
            .map(|tag| self.count_selected(tag))
            .sum()
    }

    /// 与矩形相交的空间索引成员
    pub fn query_rect(&self, rect: &crate::math::BoundingBox2) -> Vec<EntityKey> {
        self.spatial.query_rect(rect)
    }

    // ========== 插入与删除 ==========

    /// 注册实体
    ///
    /// 引用的父实体、端点路口和连接目标路段都必须已经注册。
    pub fn register(&mut self, element: impl Into<Element>) -> Result<EntityKey, RegistryError> {
        let mut element = element.into();
        let key = element.key();
        let props = Arc::clone(self.catalog.lookup(key.tag)?);
        if props.is_slave() {
            return Err(invalid(&key, "slave entities are owned by their parent"));
        }
        let partition = props.partition_tag();
        if self
            .collections
            .get(&partition)
            .is_some_and(|c| c.contains_key(&key.id))
        {
            warn!("duplicate identifier for {}", key);
            return Err(RegistryError::DuplicateId {
                tag: key.tag,
                id: key.id,
            });
        }
        if let Some(route) = element.as_demand().and_then(DemandElement::embedded_route) {
            self.check_embedded_route(&key, route.id())?;
        }
        element.reset_wiring();
        self.check_references(&element)?;

        match &mut element {
            Element::Node(node) => {
                let handle = self
                    .net
                    .insert_node(node.id(), node.position())
                    .unwrap_or_else(|e| mirror_violation(&key, e));
                node.builder = Some(handle);
            }
            Element::Link(link) => {
                let handle = self.insert_link_counterpart(&key, link);
                link.builder = Some(handle);
            }
            _ => {}
        }

        if props.is_spatially_indexed() {
            self.spatial
                .add(key.clone(), element.boundary().unwrap_or_default());
        }
        for parent in element.parents() {
            if let Some(p) = self.hierarchical_mut(parent) {
                p.hierarchy_mut().add_child(key.clone());
            }
        }
        let links = element.path_links();
        if !links.is_empty() {
            let edges = self.collections.get(&Tag::Edge);
            self.paths.calculate(key.clone(), links, |l| {
                edges.is_some_and(|c| c.contains_key(l))
            });
        }
        if let Some(route) = element.as_demand().and_then(DemandElement::embedded_route) {
            self.embedded_routes
                .insert(route.id().to_string(), key.clone());
        }

        self.collections
            .entry(partition)
            .or_default()
            .insert(key.id.clone(), element);
        self.mark_modified(props.category());
        debug!("registered {}", key);
        Ok(key)
    }

    /// 内嵌路线的推导标识符在所有需求分区之间共享，不能被其他实体占用
    fn check_embedded_route(&self, owner: &EntityKey, route_id: &str) -> Result<(), RegistryError> {
        match self.embedded_routes.get(route_id) {
            Some(existing) if existing != owner => {
                warn!("embedded route '{}' already belongs to {}", route_id, existing);
                Err(RegistryError::DuplicateId {
                    tag: Tag::RouteEmbedded,
                    id: route_id.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// 注册前检查所有引用
    fn check_references(&self, element: &Element) -> Result<(), RegistryError> {
        let key = element.key();
        if let Element::Link(link) = element {
            for node in [link.from_node(), link.to_node()] {
                if self.node(node).is_none() {
                    return Err(invalid(
                        &key,
                        format!("endpoint junction '{}' is not registered", node),
                    ));
                }
            }
            for connection in link.connections() {
                let target_lanes = if connection.to_link() == link.id() {
                    link.lanes().len()
                } else {
                    match self.link(connection.to_link()) {
                        Some(target) => target.lanes().len(),
                        None => {
                            return Err(invalid(
                                &key,
                                format!(
                                    "connection target edge '{}' is not registered",
                                    connection.to_link()
                                ),
                            ))
                        }
                    }
                };
                if connection.from_link() != link.id() || connection.to_lane() >= target_lanes {
                    return Err(invalid(
                        &key,
                        format!("invalid connection '{}'", connection.id()),
                    ));
                }
            }
        }
        for parent in element.parents() {
            if !self.contains(parent) {
                return Err(invalid(&key, format!("parent {} is not registered", parent)));
            }
        }
        Ok(())
    }

    /// 在构网子系统中插入路段及其连接，并接到注册表中的路口
    fn insert_link_counterpart(&mut self, key: &EntityKey, link: &Link) -> Handle {
        let endpoint = |id: &str| {
            self.node(id)
                .and_then(Node::builder_handle)
                .unwrap_or_else(|| panic!("junction '{}' has no network builder record", id))
        };
        let (from, to) = (endpoint(link.from_node()), endpoint(link.to_node()));
        let handle = self
            .net
            .insert_edge(link.id(), from, to, link.lanes().len())
            .unwrap_or_else(|e| mirror_violation(key, e));

        let connections = link
            .connections()
            .iter()
            .map(|c| NbConnection {
                from_lane: c.from_lane(),
                to: if c.to_link() == link.id() {
                    handle
                } else {
                    self.link_handle(c.to_link())
                },
                to_lane: c.to_lane(),
            })
            .collect();
        self.net
            .set_connections(handle, connections)
            .unwrap_or_else(|e| mirror_violation(key, e));

        if let Some(node) = self.node_mut(link.from_node()) {
            node.add_outgoing(link.id());
        }
        if let Some(node) = self.node_mut(link.to_node()) {
            node.add_incoming(link.id());
        }
        handle
    }

    fn link_handle(&self, id: &str) -> Handle {
        self.link(id)
            .and_then(Link::builder_handle)
            .unwrap_or_else(|| panic!("edge '{}' has no network builder record", id))
    }

    /// 删除实体并交还所有权
    ///
    /// 仍被引用（有子实体、关联路段、入向连接或持有计数）的实体不能删除。
    pub fn unregister(&mut self, key: &EntityKey) -> Result<Element, RegistryError> {
        self.check_removable(key)?;
        let category = self.catalog.category(key.tag)?;
        let indexed = self.catalog.is_spatially_indexed(key.tag)?;
        let partition = self.partition_of(key.tag)?;
        let Some(mut element) = self
            .collections
            .get_mut(&partition)
            .and_then(|c| c.remove(&key.id))
        else {
            return Err(not_registered(key));
        };

        if indexed && self.spatial.remove(key).is_none() {
            panic!("spatial index out of sync: {} was not indexed", key);
        }
        match &mut element {
            Element::Node(node) => {
                if let Some(handle) = node.builder.take() {
                    self.net
                        .extract_node(handle)
                        .unwrap_or_else(|e| mirror_violation(key, e));
                }
            }
            Element::Link(link) => {
                if let Some(handle) = link.builder.take() {
                    self.net
                        .extract_edge(handle)
                        .unwrap_or_else(|e| mirror_violation(key, e));
                }
                for node in [link.from_node(), link.to_node()] {
                    if let Some(n) = self.node_mut(node) {
                        n.remove_link(link.id());
                    }
                }
                self.paths.invalidate_link(link.id());
            }
            _ => {}
        }
        for parent in element.parents() {
            if let Some(p) = self.hierarchical_mut(parent) {
                p.hierarchy_mut().remove_child(key);
            }
        }
        self.paths.remove_path(key);
        if let Some(route) = element.as_demand().and_then(DemandElement::embedded_route) {
            self.embedded_routes.remove(route.id());
        }
        self.ref_counts.remove(key);
        self.mark_modified(category);
        debug!("unregistered {}", key);
        Ok(element)
    }

    fn check_removable(&self, key: &EntityKey) -> Result<(), RegistryError> {
        let element = self.entry(key).ok_or_else(|| not_registered(key))?;
        let retained = self.ref_count(key);
        if retained > 0 {
            return Err(invalid(key, format!("still retained by {} owner(s)", retained)));
        }
        if !element.children().is_empty() {
            return Err(invalid(
                key,
                format!("{} dependent element(s) must be removed first", element.children().len()),
            ));
        }
        match element {
            Element::Node(node) if node.has_incident_links() => {
                Err(invalid(key, "junction still has incident edges"))
            }
            Element::Link(link) => {
                let incoming = link
                    .builder_handle()
                    .map(|h| self.net.predecessors(h))
                    .unwrap_or_default();
                if incoming.is_empty() {
                    Ok(())
                } else {
                    Err(invalid(key, "other edges still connect to this edge"))
                }
            }
            _ => Ok(()),
        }
    }

    // ========== 重命名 ==========

    /// 修改标识符，级联更新所有引用
    ///
    /// 失败时不做任何修改。
    pub fn rename(&mut self, key: &EntityKey, new_id: &str) -> Result<EntityKey, RegistryError> {
        if !self.contains(key) {
            return Err(not_registered(key));
        }
        if key.id == new_id {
            return Err(invalid(key, "new identifier equals the current one"));
        }
        if !is_valid_id(new_id) {
            return Err(AttributeError::InvalidValue {
                tag: key.tag,
                attr: Attr::Id,
                value: new_id.to_string(),
            }
            .into());
        }
        let partition = self.partition_of(key.tag)?;
        if self
            .collections
            .get(&partition)
            .is_some_and(|c| c.contains_key(new_id))
        {
            warn!("cannot rename {}: '{}' is taken", key, new_id);
            return Err(RegistryError::DuplicateId {
                tag: key.tag,
                id: new_id.to_string(),
            });
        }
        let embeds_route = self
            .entry(key)
            .and_then(Element::as_demand)
            .is_some_and(|d| d.embedded_route().is_some());
        if embeds_route {
            self.check_embedded_route(key, &embedded_route_id(new_id))?;
        }
        let new_key = self.rename_unchecked(key, new_id);
        debug!("renamed {} to '{}'", key, new_id);
        Ok(new_key)
    }

    /// 重命名级联；调用方保证 `key` 已注册且 `new_id` 在分区内可用
    fn rename_unchecked(&mut self, key: &EntityKey, new_id: &str) -> EntityKey {
        let props = match self.catalog.lookup(key.tag) {
            Ok(props) => Arc::clone(props),
            Err(e) => panic!("registered entity {} has no type: {}", key, e),
        };
        let partition = props.partition_tag();
        let Some(mut element) = self
            .collections
            .get_mut(&partition)
            .and_then(|c| c.remove(&key.id))
        else {
            panic!("rename of unregistered {}", key);
        };
        let new_key = key.with_id(new_id);

        // 构网子系统先改名
        match &element {
            Element::Node(node) => {
                if let Some(handle) = node.builder_handle() {
                    self.net
                        .rename_node(handle, new_id)
                        .unwrap_or_else(|e| mirror_violation(key, e));
                }
            }
            Element::Link(link) => {
                if let Some(handle) = link.builder_handle() {
                    self.net
                        .rename_edge(handle, new_id)
                        .unwrap_or_else(|e| mirror_violation(key, e));
                }
            }
            _ => {}
        }

        let old_route = element
            .as_demand()
            .and_then(DemandElement::embedded_route)
            .map(|r| r.id().to_string());
        element.rename(new_id);
        if let Some(old_route) = old_route {
            self.embedded_routes.remove(&old_route);
        }
        if let Some(route) = element.as_demand().and_then(DemandElement::embedded_route) {
            self.embedded_routes
                .insert(route.id().to_string(), new_key.clone());
        }

        if props.is_spatially_indexed() && !self.spatial.rename(key, new_key.clone()) {
            panic!("spatial index out of sync: cannot rekey {}", key);
        }
        self.paths.rename_key(key, new_key.clone());
        if let Some(count) = self.ref_counts.remove(key) {
            self.ref_counts.insert(new_key.clone(), count);
        }
        for parent in element.parents() {
            if let Some(p) = self.hierarchical_mut(parent) {
                p.hierarchy_mut().replace_child(key, &new_key);
            }
        }

        let children = element.children().to_vec();
        let incident: Vec<String> = element
            .as_node()
            .map(|n| n.incident_links().cloned().collect())
            .unwrap_or_default();
        let link_wiring = element.as_link().map(|l| {
            (
                l.builder_handle(),
                l.from_node().to_string(),
                l.to_node().to_string(),
            )
        });
        self.collections
            .entry(partition)
            .or_default()
            .insert(new_id.to_string(), element);

        for link_id in &incident {
            if let Some(link) = self.link_mut(link_id) {
                link.rename_endpoint(&key.id, new_id);
            }
        }
        if let Some((handle, from, to)) = link_wiring {
            for node in [from, to] {
                if let Some(n) = self.node_mut(&node) {
                    n.rename_link(&key.id, new_id);
                }
            }
            self.paths.rename_link(&key.id, new_id);
            if let Some(handle) = handle {
                let mut affected = self.net.predecessors(handle);
                affected.push(handle);
                for h in affected {
                    self.sync_connections(h);
                }
            }
        }
        for child in &children {
            if let Some(c) = self.hierarchical_mut(child) {
                c.replace_parent(key, &new_key);
            }
        }
        self.mark_modified(props.category());
        new_key
    }

    /// 按构网子系统的当前名称刷新路段的连接标识符
    fn sync_connections(&mut self, handle: Handle) {
        let Some(link_id) = self.net.edges().get(handle).map(|e| e.id.clone()) else {
            panic!("stale network builder handle {}", handle);
        };
        let key = EntityKey::new(Tag::Edge, link_id.as_str());
        let resolved = self
            .net
            .resolved_connections(handle)
            .unwrap_or_else(|e| mirror_violation(&key, e));
        let Some(link) = self.link_mut(&link_id) else {
            panic!("network builder edge '{}' is not registered", link_id);
        };
        assert_eq!(
            link.connections().len(),
            resolved.len(),
            "connections of edge '{}' diverged from the network builder",
            link_id
        );
        for (connection, r) in link.connections_mut().iter_mut().zip(&resolved) {
            connection.relink(&r.from, &r.to);
        }
    }

    /// 将路口与路段重新编号为连续的数字标识符
    ///
    /// 每个实体都经过完整的重命名级联；返回改名的实体数。
    pub fn remap_node_and_link_ids(&mut self) -> usize {
        let mut renamed = 0;
        for partition in [Tag::Junction, Tag::Edge] {
            let ids: Vec<String> = self
                .collections
                .get(&partition)
                .map(|c| c.keys().cloned().collect())
                .unwrap_or_default();
            let mapping: Vec<(String, String)> = ids
                .into_iter()
                .enumerate()
                .map(|(i, id)| (id, i.to_string()))
                .filter(|(old, new)| old != new)
                .collect();
            if mapping.is_empty() {
                continue;
            }
            // 先改为临时名称，避免新旧名称互相冲突
            let prefix = self.temporary_prefix(partition);
            for (i, (old, _)) in mapping.iter().enumerate() {
                let key = EntityKey::new(partition, old.as_str());
                self.rename_unchecked(&key, &format!("{}{}", prefix, i));
            }
            for (i, (_, new)) in mapping.iter().enumerate() {
                let key = EntityKey::new(partition, format!("{}{}", prefix, i));
                self.rename_unchecked(&key, new);
            }
            renamed += mapping.len();
        }
        debug!("remapped {} junction/edge identifiers", renamed);
        renamed
    }

    fn temporary_prefix(&self, partition: Tag) -> String {
        let mut prefix = String::from("remap#");
        while self
            .collections
            .get(&partition)
            .is_some_and(|c| c.keys().any(|id| id.starts_with(&prefix)))
        {
            prefix.insert(0, '#');
        }
        prefix
    }

    // ========== 属性与选择 ==========

    /// 修改属性，刷新所有者的包围盒并标记需要保存；返回修改前的快照
    pub fn set_attribute(
        &mut self,
        key: &EntityKey,
        attr: Attr,
        value: &str,
    ) -> Result<AttributeSnapshot, RegistryError> {
        let owner = self.owner_of(key)?;
        let carrier = self
            .lookup_mut(key.tag, &key.id)
            .ok_or_else(|| not_registered(key))?;
        let before = carrier.core().snapshot(attr);
        carrier.set_attribute(attr, value)?;
        self.notify_changed(&owner)?;
        Ok(before)
    }

    /// 恢复属性快照；返回恢复前的快照
    pub fn restore_attribute(
        &mut self,
        key: &EntityKey,
        snapshot: &AttributeSnapshot,
    ) -> Result<AttributeSnapshot, RegistryError> {
        let owner = self.owner_of(key)?;
        let carrier = self
            .lookup_mut(key.tag, &key.id)
            .ok_or_else(|| not_registered(key))?;
        let current = carrier.core_mut().restore(snapshot);
        self.notify_changed(&owner)?;
        Ok(current)
    }

    /// 设置选中状态，返回原状态
    pub fn set_selected(&mut self, key: &EntityKey, selected: bool) -> Result<bool, RegistryError> {
        let carrier = self
            .lookup_mut(key.tag, &key.id)
            .ok_or_else(|| not_registered(key))?;
        let before = carrier.is_selected();
        if selected {
            carrier.select();
        } else {
            carrier.unselect();
        }
        Ok(before)
    }

    /// 顶层所有者：从属子实体返回其所有者，否则返回自身
    fn owner_of(&self, key: &EntityKey) -> Result<EntityKey, RegistryError> {
        let owner = if self.catalog.is_slave(key.tag)? {
            self.slave_owner(key)
        } else {
            self.contains(key).then(|| key.clone())
        };
        owner.ok_or_else(|| not_registered(key))
    }

    /// 实体几何或属性改变后刷新空间索引并标记需要保存
    pub fn notify_changed(&mut self, key: &EntityKey) -> Result<(), RegistryError> {
        let element = self.entry(key).ok_or_else(|| not_registered(key))?;
        let bounds = element.boundary().unwrap_or_default();
        let category = element.category();
        if self.catalog.is_spatially_indexed(key.tag)? && !self.spatial.update(key, bounds) {
            panic!("spatial index out of sync: {} was not indexed", key);
        }
        self.mark_modified(category);
        Ok(())
    }

    /// 替换路段的出向连接，返回原连接；同步构网子系统
    pub fn replace_connections(
        &mut self,
        link_id: &str,
        connections: Vec<Connection>,
    ) -> Result<Vec<Connection>, RegistryError> {
        let key = EntityKey::new(Tag::Edge, link_id);
        let link = self.link(link_id).ok_or_else(|| not_registered(&key))?;
        let handle = link.builder_handle().unwrap_or_else(|| {
            panic!("registered edge '{}' has no network builder record", link_id)
        });
        let mut records = Vec::with_capacity(connections.len());
        for c in &connections {
            let target = self.link(c.to_link());
            let valid = c.from_link() == link_id
                && c.from_lane() < link.lanes().len()
                && target.is_some_and(|t| c.to_lane() < t.lanes().len());
            if !valid {
                return Err(invalid(&key, format!("invalid connection '{}'", c.id())));
            }
            records.push(NbConnection {
                from_lane: c.from_lane(),
                to: self.link_handle(c.to_link()),
                to_lane: c.to_lane(),
            });
        }
        self.net
            .set_connections(handle, records)
            .unwrap_or_else(|e| mirror_violation(&key, e));
        let previous = match self.link_mut(link_id) {
            Some(link) => link.replace_connections(connections),
            None => Vec::new(),
        };
        self.mark_modified(Category::Connection);
        Ok(previous)
    }

    // ========== 引用计数 ==========

    /// 增加持有计数，返回新的计数
    pub fn retain(&mut self, key: &EntityKey) -> Result<usize, RegistryError> {
        if !self.contains(key) {
            return Err(not_registered(key));
        }
        let count = self.ref_counts.entry(key.clone()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    /// 减少持有计数，返回新的计数
    pub fn release(&mut self, key: &EntityKey) -> Result<usize, RegistryError> {
        let remaining = match self.ref_counts.get(key).copied() {
            Some(count) if count > 0 => count - 1,
            _ if self.contains(key) => return Err(invalid(key, "not retained")),
            _ => return Err(not_registered(key)),
        };
        if remaining == 0 {
            self.ref_counts.remove(key);
        } else {
            self.ref_counts.insert(key.clone(), remaining);
        }
        Ok(remaining)
    }

    pub fn ref_count(&self, key: &EntityKey) -> usize {
        self.ref_counts.get(key).copied().unwrap_or(0)
    }

    // ========== 批量操作 ==========

    /// 清空一个类别
    ///
    /// 不级联到其他类别：其他类别中仍有依赖实体时拒绝，调用方需先清空叶子类别。
    /// 返回删除的实体数。
    pub fn clear(&mut self, category: Category) -> Result<usize, RegistryError> {
        let partitions = self.catalog.partitions_in(category);
        for element in partitions
            .iter()
            .filter_map(|p| self.collections.get(p))
            .flat_map(|c| c.values())
        {
            let foreign = element
                .children()
                .iter()
                .find(|c| self.catalog.category(c.tag).map_or(true, |cat| cat != category));
            if let Some(child) = foreign {
                return Err(invalid(
                    &element.key(),
                    format!("dependent {} must be cleared first", child),
                ));
            }
            if element.as_node().is_some_and(Node::has_incident_links) {
                return Err(invalid(&element.key(), "edges must be cleared first"));
            }
        }

        let mut removed = 0;
        for partition in partitions {
            let Some(collection) = self.collections.remove(&partition) else {
                continue;
            };
            for element in collection.into_values() {
                let key = element.key();
                self.spatial.remove(&key);
                match &element {
                    Element::Node(node) => {
                        if let Some(handle) = node.builder_handle() {
                            self.net
                                .extract_node(handle)
                                .unwrap_or_else(|e| mirror_violation(&key, e));
                        }
                    }
                    Element::Link(link) => {
                        if let Some(handle) = link.builder_handle() {
                            self.net
                                .extract_edge(handle)
                                .unwrap_or_else(|e| mirror_violation(&key, e));
                        }
                        for node in [link.from_node(), link.to_node()] {
                            if let Some(n) = self.node_mut(node) {
                                n.remove_link(link.id());
                            }
                        }
                        self.paths.invalidate_link(link.id());
                    }
                    _ => {}
                }
                for parent in element.parents() {
                    if let Some(p) = self.hierarchical_mut(parent) {
                        p.hierarchy_mut().remove_child(&key);
                    }
                }
                self.paths.remove_path(&key);
                if let Some(route) = element.as_demand().and_then(DemandElement::embedded_route) {
                    self.embedded_routes.remove(route.id());
                }
                if let Some(count) = self.ref_counts.remove(&key) {
                    debug!("dropping {} with {} outstanding reference(s)", key, count);
                }
                removed += 1;
            }
        }
        if removed > 0 {
            self.mark_modified(category);
        }
        debug!("cleared {} {:?} entities", removed, category);
        Ok(removed)
    }

    /// 加入默认车辆/自行车/行人类型并持有它们
    ///
    /// 默认类型不会使需求分组变为需要保存。
    pub fn add_default_vehicle_types(&mut self) -> Result<(), RegistryError> {
        let was_dirty = self.requires_save(SaveGroup::Demand);
        for (tag, id, vclass) in DEFAULT_TYPES {
            let key = EntityKey::new(tag, id);
            if self.contains(&key) {
                continue;
            }
            let vtype = DemandElement::new(&self.catalog, tag, id)?
                .with_attribute(Attr::VClass, vclass)?;
            self.register(vtype)?;
            self.retain(&key)?;
        }
        if !was_dirty {
            self.mark_saved(SaveGroup::Demand);
        }
        Ok(())
    }

    /// 查询时间窗口内某种统计记录
    ///
    /// 只返回完全落在 `[begin, end]` 内的区间中的记录，按数据集标识符顺序排列。
    pub fn retrieve_generic_datas(&self, tag: Tag, begin: f64, end: f64) -> Vec<&GenericData> {
        let Some(sets) = self.collections.get(&Tag::DataSet) else {
            return Vec::new();
        };
        sets.par_iter()
            .flat_map_iter(|(_, element)| {
                element
                    .as_data_set()
                    .into_iter()
                    .flat_map(|set| set.intervals())
                    .filter(move |interval| interval.within(begin, end))
                    .flat_map(|interval| interval.records())
                    .filter(move |record| record.tag() == tag)
            })
            .collect()
    }

    // ========== 保存标志 ==========

    fn mark_modified(&mut self, category: Category) {
        self.dirty[category.save_group().index()] = true;
    }

    pub fn requires_save(&self, group: SaveGroup) -> bool {
        self.dirty[group.index()]
    }

    pub fn mark_saved(&mut self, group: SaveGroup) {
        self.dirty[group.index()] = false;
    }

    // ========== 一致性 ==========

    /// 检查全部内部一致性，不一致时 panic
    pub fn assert_coherent(&self) {
        assert_eq!(
            self.ids_of(Tag::Junction),
            self.net.node_ids(),
            "junction identifiers diverged from the network builder"
        );
        assert_eq!(
            self.ids_of(Tag::Edge),
            self.net.edge_ids(),
            "edge identifiers diverged from the network builder"
        );

        let mut indexed = 0;
        for element in self.elements() {
            let key = element.key();
            match element {
                Element::Node(node) => {
                    let record = node.builder_handle().and_then(|h| self.net.nodes().get(h));
                    assert!(
                        record.is_some_and(|r| r.id == key.id),
                        "{} has no matching builder record",
                        key
                    );
                }
                Element::Link(link) => {
                    let handle = link.builder_handle();
                    assert!(
                        handle
                            .and_then(|h| self.net.edges().get(h))
                            .is_some_and(|r| r.id == key.id),
                        "{} has no matching builder record",
                        key
                    );
                    let expected = handle
                        .map(|h| self.net.connection_ids(h))
                        .transpose()
                        .ok()
                        .flatten()
                        .unwrap_or_default();
                    let actual: Vec<String> =
                        link.connections().iter().map(|c| c.id().to_string()).collect();
                    assert_eq!(actual, expected, "connections of {} diverged", key);
                }
                _ => {}
            }

            if let Some(route) = element.as_demand().and_then(DemandElement::embedded_route) {
                assert_eq!(
                    self.embedded_routes.get(route.id()),
                    Some(&key),
                    "embedded route '{}' of {} is missing from the route bucket",
                    route.id(),
                    key
                );
            }

            let flagged = self.catalog.is_spatially_indexed(key.tag).unwrap_or(false);
            assert_eq!(
                self.spatial.contains(&key),
                flagged,
                "spatial index membership of {} is wrong",
                key
            );
            if flagged {
                indexed += 1;
            }

            for parent in element.parents() {
                let linked = self.entry(parent).is_some_and(|p| p.children().contains(&key));
                assert!(linked, "{} is missing from the children of {}", key, parent);
            }
            for child in element.children() {
                let linked = self.entry(child).is_some_and(|c| c.parents().contains(&key));
                assert!(linked, "child {} of {} does not reference it", child, key);
            }
        }
        assert_eq!(self.spatial.len(), indexed, "spatial index has stale entries");

        for (route, owner) in &self.embedded_routes {
            let found = self
                .entry(owner)
                .and_then(Element::as_demand)
                .and_then(DemandElement::embedded_route)
                .is_some_and(|r| r.id() == route);
            assert!(found, "embedded route '{}' is not owned by {}", route, owner);
        }
    }
}

impl Drop for EntityRegistry {
    fn drop(&mut self) {
        for (key, count) in &self.ref_counts {
            debug!("{} still referenced {} time(s) at teardown", key, count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Additional, DataSet, LinkType, Shape, TazElement};
    use crate::math::{BoundingBox2, Point2};

    fn registry() -> EntityRegistry {
        EntityRegistry::new(Arc::new(TypeCatalog::standard()))
    }

    /// A -> B 两个路口和一条双车道路段 AB
    fn two_nodes_one_link() -> EntityRegistry {
        let mut reg = registry();
        let catalog = Arc::clone(reg.catalog());
        reg.register(Node::new(&catalog, "A", Point2::new(0.0, 0.0)).unwrap())
            .unwrap();
        reg.register(Node::new(&catalog, "B", Point2::new(100.0, 0.0)).unwrap())
            .unwrap();
        reg.register(Link::new(&catalog, "AB", "A", "B", 2).unwrap())
            .unwrap();
        reg
    }

    fn key(tag: Tag, id: &str) -> EntityKey {
        EntityKey::new(tag, id)
    }

    #[test]
    fn test_register_and_lookup() {
        let reg = two_nodes_one_link();
        assert!(reg.lookup(Tag::Junction, "A").is_some());
        assert_eq!(reg.link("AB").unwrap().from_node(), "A");
        assert_eq!(reg.node("A").unwrap().outgoing(), ["AB"]);
        assert_eq!(reg.node("B").unwrap().incoming(), ["AB"]);
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.count(Tag::Lane), 2);
        assert!(reg.lookup_carrier(Tag::Lane, "AB_1").is_some());
        reg.assert_coherent();
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut reg = two_nodes_one_link();
        let catalog = Arc::clone(reg.catalog());
        let result = reg.register(Node::new(&catalog, "A", Point2::new(5.0, 5.0)).unwrap());
        assert_eq!(
            result,
            Err(RegistryError::DuplicateId {
                tag: Tag::Junction,
                id: "A".to_string()
            })
        );
        assert_eq!(reg.node("A").unwrap().position(), Point2::new(0.0, 0.0));
        reg.assert_coherent();
    }

    #[test]
    fn test_same_id_in_different_partitions() {
        let mut reg = two_nodes_one_link();
        let catalog = Arc::clone(reg.catalog());
        reg.register(
            Additional::new(&catalog, Tag::BusStop, "stop1")
                .unwrap()
                .on_lane("AB", 0)
                .unwrap(),
        )
        .unwrap();
        reg.register(
            Additional::new(&catalog, Tag::ContainerStop, "stop1")
                .unwrap()
                .on_lane("AB", 1)
                .unwrap(),
        )
        .unwrap();

        assert_eq!(reg.lookup(Tag::BusStop, "stop1").unwrap().tag(), Tag::BusStop);
        assert_eq!(
            reg.lookup(Tag::ContainerStop, "stop1").unwrap().tag(),
            Tag::ContainerStop
        );
        assert_eq!(reg.link("AB").unwrap().children().len(), 2);
        reg.assert_coherent();
    }

    #[test]
    fn test_poi_partition_shared() {
        let mut reg = two_nodes_one_link();
        let catalog = Arc::clone(reg.catalog());
        reg.register(Shape::poi(&catalog, "p", Point2::new(1.0, 1.0)).unwrap())
            .unwrap();
        let lane_poi = Shape::poi_lane(&catalog, "p", "AB", 0, 5.0).unwrap();
        assert!(matches!(
            reg.register(lane_poi),
            Err(RegistryError::DuplicateId { .. })
        ));
        assert!(reg.lookup(Tag::PoiLane, "p").is_none());
    }

    #[test]
    fn test_missing_references_rejected() {
        let mut reg = registry();
        let catalog = Arc::clone(reg.catalog());
        reg.register(Node::new(&catalog, "A", Point2::origin()).unwrap())
            .unwrap();
        let dangling = Link::new(&catalog, "AX", "A", "X", 1).unwrap();
        assert!(matches!(
            reg.register(dangling),
            Err(RegistryError::InvalidOperation { .. })
        ));
        let stop = Additional::new(&catalog, Tag::BusStop, "s")
            .unwrap()
            .on_lane("nowhere", 0)
            .unwrap();
        assert!(reg.register(stop).is_err());
        assert_eq!(reg.len(), 1);
        assert!(reg.node("A").unwrap().outgoing().is_empty());
        reg.assert_coherent();
    }

    #[test]
    fn test_insert_then_delete_leaves_no_trace() {
        let mut reg = two_nodes_one_link();
        let catalog = Arc::clone(reg.catalog());
        reg.mark_saved(SaveGroup::Network);
        let before_spatial = reg.spatial().keys();
        let before_nodes = reg.net().node_ids();

        let c = reg
            .register(Node::new(&catalog, "C", Point2::new(100.0, 100.0)).unwrap())
            .unwrap();
        let bc = reg
            .register(Link::new(&catalog, "BC", "B", "C", 1).unwrap())
            .unwrap();
        assert!(reg.requires_save(SaveGroup::Network));

        reg.unregister(&bc).unwrap();
        reg.unregister(&c).unwrap();
        assert_eq!(reg.spatial().keys(), before_spatial);
        assert_eq!(reg.net().node_ids(), before_nodes);
        assert!(reg.node("B").unwrap().outgoing().is_empty());
        reg.assert_coherent();
    }

    #[test]
    fn test_delete_with_dependents_rejected() {
        let mut reg = two_nodes_one_link();
        let catalog = Arc::clone(reg.catalog());
        let stop = reg
            .register(
                Additional::new(&catalog, Tag::BusStop, "s")
                    .unwrap()
                    .on_lane("AB", 0)
                    .unwrap(),
            )
            .unwrap();

        assert!(matches!(
            reg.unregister(&key(Tag::Junction, "A")),
            Err(RegistryError::InvalidOperation { .. })
        ));
        assert!(matches!(
            reg.unregister(&key(Tag::Edge, "AB")),
            Err(RegistryError::InvalidOperation { .. })
        ));
        reg.unregister(&stop).unwrap();
        reg.unregister(&key(Tag::Edge, "AB")).unwrap();
        reg.unregister(&key(Tag::Junction, "A")).unwrap();
        assert!(matches!(
            reg.unregister(&key(Tag::Junction, "A")),
            Err(RegistryError::NotRegistered { .. })
        ));
        reg.assert_coherent();
    }

    #[test]
    fn test_slaves_reached_through_owner() {
        let mut reg = two_nodes_one_link();
        assert!(reg.lookup(Tag::Lane, "AB_0").is_none());
        assert_eq!(reg.lookup_carrier(Tag::Lane, "AB_0").unwrap().id(), "AB_0");
        reg.set_attribute(&key(Tag::Lane, "AB_0"), Attr::Speed, "20")
            .unwrap();
        assert_eq!(
            reg.link("AB").unwrap().lanes()[0].get_attribute(Attr::Speed).unwrap(),
            "20"
        );
        assert!(reg.lookup_mut(Tag::Lane, "AB_7").is_none());
        assert!(matches!(
            reg.set_attribute(&key(Tag::Lane, "AB_7"), Attr::Speed, "20"),
            Err(RegistryError::NotRegistered { .. })
        ));
    }

    #[test]
    fn test_rename_link_cascades() {
        let mut reg = two_nodes_one_link();
        let catalog = Arc::clone(reg.catalog());
        reg.register(Node::new(&catalog, "C", Point2::new(100.0, 100.0)).unwrap())
            .unwrap();
        let mut bc = Link::new(&catalog, "BC", "B", "C", 1).unwrap();
        bc.add_connection(&catalog, 0, "BC", 0).unwrap();
        reg.register(bc).unwrap();
        let connection = Connection::new(&catalog, "AB", 1, "BC", 0).unwrap();
        reg.replace_connections("AB", vec![connection]).unwrap();
        assert_eq!(reg.link("AB").unwrap().connections()[0].id(), "AB_1->BC_0");

        reg.register(
            Additional::new(&catalog, Tag::BusStop, "s")
                .unwrap()
                .on_lane("AB", 0)
                .unwrap(),
        )
        .unwrap();
        reg.register(DemandElement::vehicle_type(&catalog, "car").unwrap())
            .unwrap();
        reg.register(DemandElement::route(&catalog, "r", &["AB", "BC"]).unwrap())
            .unwrap();

        let renamed = reg.rename(&key(Tag::Edge, "AB"), "L1").unwrap();
        assert_eq!(renamed, key(Tag::Edge, "L1"));
        assert!(reg.link("AB").is_none());

        let link = reg.link("L1").unwrap();
        assert_eq!(link.lanes()[1].id(), "L1_1");
        assert_eq!(link.connections()[0].id(), "L1_1->BC_0");
        assert_eq!(reg.node("A").unwrap().outgoing(), ["L1"]);

        let stop = reg.lookup(Tag::BusStop, "s").unwrap();
        assert_eq!(stop.carrier().get_attribute(Attr::Lane).unwrap(), "L1_0");
        assert_eq!(stop.parents(), [key(Tag::Edge, "L1")]);

        let route = reg.lookup(Tag::Route, "r").unwrap();
        assert_eq!(route.carrier().get_attribute(Attr::Edges).unwrap(), "L1 BC");
        assert_eq!(
            reg.paths().path(&key(Tag::Route, "r")).unwrap(),
            ["L1", "BC"]
        );
        assert!(reg.spatial().contains(&key(Tag::Edge, "L1")));
        reg.assert_coherent();
    }

    #[test]
    fn test_rename_predecessor_connections() {
        let mut reg = two_nodes_one_link();
        let catalog = Arc::clone(reg.catalog());
        reg.register(Node::new(&catalog, "C", Point2::new(100.0, 100.0)).unwrap())
            .unwrap();
        reg.register(Link::new(&catalog, "BC", "B", "C", 1).unwrap())
            .unwrap();
        let connection = Connection::new(&catalog, "AB", 0, "BC", 0).unwrap();
        reg.replace_connections("AB", vec![connection]).unwrap();

        reg.rename(&key(Tag::Edge, "BC"), "L2").unwrap();
        assert_eq!(reg.link("AB").unwrap().connections()[0].id(), "AB_0->L2_0");
        assert_eq!(reg.link("AB").unwrap().connections()[0].to_link(), "L2");
        assert!(matches!(
            reg.unregister(&key(Tag::Edge, "L2")),
            Err(RegistryError::InvalidOperation { .. })
        ));
        reg.assert_coherent();
    }

    #[test]
    fn test_rename_node_updates_links() {
        let mut reg = two_nodes_one_link();
        reg.rename(&key(Tag::Junction, "A"), "west").unwrap();
        assert_eq!(reg.link("AB").unwrap().from_node(), "west");
        assert_eq!(reg.net().node_ids(), vec!["B", "west"]);
        reg.assert_coherent();
    }

    #[test]
    fn test_rename_round_trip() {
        let mut reg = two_nodes_one_link();
        let before_spatial = reg.spatial().keys();
        let renamed = reg.rename(&key(Tag::Edge, "AB"), "X").unwrap();
        reg.rename(&renamed, "AB").unwrap();
        assert_eq!(reg.spatial().keys(), before_spatial);
        assert_eq!(reg.ids_of(Tag::Lane), vec!["AB_0", "AB_1"]);
        reg.assert_coherent();
    }

    #[test]
    fn test_rename_failures_change_nothing() {
        let mut reg = two_nodes_one_link();
        assert!(matches!(
            reg.rename(&key(Tag::Junction, "A"), "B"),
            Err(RegistryError::DuplicateId { .. })
        ));
        assert!(matches!(
            reg.rename(&key(Tag::Junction, "Z"), "Y"),
            Err(RegistryError::NotRegistered { .. })
        ));
        assert!(matches!(
            reg.rename(&key(Tag::Junction, "A"), "A"),
            Err(RegistryError::InvalidOperation { .. })
        ));
        assert!(matches!(
            reg.rename(&key(Tag::Junction, "A"), "bad id"),
            Err(RegistryError::Attribute(AttributeError::InvalidValue { .. }))
        ));
        assert_eq!(reg.ids_of(Tag::Junction), vec!["A", "B"]);
        reg.assert_coherent();
    }

    #[test]
    fn test_embedded_route_rekeyed() {
        let mut reg = two_nodes_one_link();
        let catalog = Arc::clone(reg.catalog());
        reg.register(DemandElement::vehicle_type(&catalog, "car").unwrap())
            .unwrap();
        let vehicle = DemandElement::vehicle_with_route(&catalog, "v0", "car", &["AB"]).unwrap();
        reg.register(vehicle).unwrap();
        assert!(reg.lookup_carrier(Tag::RouteEmbedded, "v0_route").is_some());

        reg.rename(&key(Tag::VehicleWithRoute, "v0"), "bus").unwrap();
        assert!(reg.lookup_carrier(Tag::RouteEmbedded, "v0_route").is_none());
        assert!(reg.lookup_carrier(Tag::RouteEmbedded, "bus_route").is_some());
        reg.set_attribute(&key(Tag::RouteEmbedded, "bus_route"), Attr::Color, "255,0,0")
            .unwrap();
        reg.assert_coherent();
    }

    #[test]
    fn test_plan_step_reached_through_owner() {
        let mut reg = two_nodes_one_link();
        let catalog = Arc::clone(reg.catalog());
        reg.register(
            Additional::new(&catalog, Tag::BusStop, "stop1")
                .unwrap()
                .on_lane("AB", 0)
                .unwrap(),
        )
        .unwrap();
        reg.register(DemandElement::vehicle_type(&catalog, "car").unwrap())
            .unwrap();
        let mut vehicle =
            DemandElement::vehicle_with_route(&catalog, "v0", "car", &["AB"]).unwrap();
        vehicle
            .add_stop(&catalog, key(Tag::BusStop, "stop1"))
            .unwrap();
        reg.register(vehicle).unwrap();

        reg.lookup_mut(Tag::Stop, "v0_stop0")
            .unwrap()
            .set_attribute(Attr::Duration, "45")
            .unwrap();
        let stop = reg.lookup_carrier(Tag::Stop, "v0_stop0").unwrap();
        assert_eq!(stop.get_attribute(Attr::Duration).unwrap(), "45");
        assert!(reg.lookup_mut(Tag::RouteEmbedded, "v0_route").is_some());
        assert!(reg.lookup_mut(Tag::Stop, "v0_stop1").is_none());
        reg.assert_coherent();
    }

    #[test]
    fn test_embedded_route_ids_unique_across_partitions() {
        let mut reg = two_nodes_one_link();
        let catalog = Arc::clone(reg.catalog());
        reg.register(DemandElement::vehicle_type(&catalog, "car").unwrap())
            .unwrap();
        let flow = |id: &str| {
            DemandElement::new(&catalog, Tag::FlowWithRoute, id)
                .unwrap()
                .with_type("car")
                .unwrap()
                .with_edges(&catalog, &["AB"])
                .unwrap()
        };
        reg.register(DemandElement::vehicle_with_route(&catalog, "v", "car", &["AB"]).unwrap())
            .unwrap();

        let taken = Err(RegistryError::DuplicateId {
            tag: Tag::RouteEmbedded,
            id: "v_route".to_string(),
        });
        assert_eq!(reg.register(flow("v")), taken);
        assert!(reg.lookup(Tag::FlowWithRoute, "v").is_none());

        reg.register(flow("f")).unwrap();
        assert_eq!(reg.rename(&key(Tag::FlowWithRoute, "f"), "v"), taken);
        assert!(reg.lookup_carrier(Tag::RouteEmbedded, "f_route").is_some());
        reg.assert_coherent();

        reg.unregister(&key(Tag::FlowWithRoute, "f")).unwrap();
        let route = reg.lookup_carrier(Tag::RouteEmbedded, "v_route").unwrap();
        assert_eq!(route.get_attribute(Attr::Edges).unwrap(), "AB");
        assert!(reg.lookup(Tag::VehicleWithRoute, "v").is_some());
        reg.assert_coherent();

        // 原车辆改名后，旧的推导标识符可以被其他分区使用
        reg.rename(&key(Tag::VehicleWithRoute, "v"), "w").unwrap();
        reg.register(flow("v")).unwrap();
        assert!(reg.lookup_carrier(Tag::RouteEmbedded, "v_route").is_some());
        assert!(reg.lookup_carrier(Tag::RouteEmbedded, "w_route").is_some());
        reg.assert_coherent();
    }

    #[test]
    fn test_rename_link_with_suffixed_sibling() {
        let mut reg = registry();
        let catalog = Arc::clone(reg.catalog());
        for (id, x) in [("N1", 0.0), ("N2", 100.0), ("N3", 200.0)] {
            reg.register(Node::new(&catalog, id, Point2::new(x, 0.0)).unwrap())
                .unwrap();
        }
        reg.register(Link::new(&catalog, "A", "N1", "N2", 2).unwrap())
            .unwrap();
        reg.register(Link::new(&catalog, "A_1", "N2", "N3", 1).unwrap())
            .unwrap();
        reg.register(DemandElement::route(&catalog, "r", &["A", "A_1"]).unwrap())
            .unwrap();
        reg.register(
            Additional::new(&catalog, Tag::BusStop, "s")
                .unwrap()
                .on_lane("A", 1)
                .unwrap(),
        )
        .unwrap();

        reg.rename(&key(Tag::Edge, "A"), "X").unwrap();
        let route = reg.lookup(Tag::Route, "r").unwrap();
        assert_eq!(route.carrier().get_attribute(Attr::Edges).unwrap(), "X A_1");
        assert_eq!(route.parents(), [key(Tag::Edge, "X"), key(Tag::Edge, "A_1")]);
        assert_eq!(reg.paths().path(&key(Tag::Route, "r")).unwrap(), ["X", "A_1"]);

        let stop = reg.lookup(Tag::BusStop, "s").unwrap();
        assert_eq!(stop.carrier().get_attribute(Attr::Lane).unwrap(), "X_1");
        assert!(reg.lookup_carrier(Tag::Lane, "X_1").is_some());
        assert!(reg.lookup_carrier(Tag::Lane, "A_1_0").is_some());
        assert_eq!(reg.ids_of(Tag::Edge), ["A_1", "X"]);
        reg.assert_coherent();

        reg.rename(&key(Tag::Edge, "X"), "A").unwrap();
        let route = reg.lookup(Tag::Route, "r").unwrap();
        assert_eq!(route.carrier().get_attribute(Attr::Edges).unwrap(), "A A_1");
        let stop = reg.lookup(Tag::BusStop, "s").unwrap();
        assert_eq!(stop.carrier().get_attribute(Attr::Lane).unwrap(), "A_1");
        reg.assert_coherent();
    }

    #[test]
    fn test_default_vehicle_types() {
        let mut reg = registry();
        reg.add_default_vehicle_types().unwrap();
        reg.add_default_vehicle_types().unwrap();
        assert_eq!(reg.count(Tag::VType), 2);
        assert_eq!(reg.count(Tag::PType), 1);
        assert!(!reg.requires_save(SaveGroup::Demand));

        let pedestrian = key(Tag::PType, DEFAULT_PEDTYPE);
        assert_eq!(reg.ref_count(&pedestrian), 1);
        assert!(reg.unregister(&pedestrian).is_err());
        assert_eq!(reg.release(&pedestrian), Ok(0));
        assert!(reg.unregister(&pedestrian).is_ok());
        assert!(matches!(
            reg.release(&key(Tag::VType, DEFAULT_VEHTYPE)),
            Ok(0)
        ));
        assert!(matches!(
            reg.release(&key(Tag::VType, DEFAULT_VEHTYPE)),
            Err(RegistryError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn test_with_options() {
        let options = EditorOptions::default().with_default_vehicle_types(false);
        let reg = EntityRegistry::with_options(Arc::new(TypeCatalog::standard()), &options).unwrap();
        assert!(reg.is_empty());
        let reg = EntityRegistry::with_options(
            Arc::new(TypeCatalog::standard()),
            &EditorOptions::default(),
        )
        .unwrap();
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_retrieve_generic_datas() {
        let mut reg = two_nodes_one_link();
        let catalog = Arc::clone(reg.catalog());
        let mut set = DataSet::new(&catalog, "counts").unwrap();
        set.add_interval(&catalog, 0.0, 100.0)
            .unwrap()
            .add_edge_data(&catalog, "AB")
            .unwrap()
            .set_param("entered", 12.0);
        set.add_interval(&catalog, 100.0, 500.0)
            .unwrap()
            .add_edge_data(&catalog, "AB")
            .unwrap();
        reg.register(set).unwrap();

        let within = reg.retrieve_generic_datas(Tag::EdgeData, 0.0, 200.0);
        assert_eq!(within.len(), 1);
        assert_eq!(within[0].param("entered"), Some(12.0));
        assert_eq!(reg.retrieve_generic_datas(Tag::EdgeData, 0.0, 1000.0).len(), 2);
        assert!(reg.retrieve_generic_datas(Tag::TazRelData, 0.0, 1000.0).is_empty());

        // 数据集引用的路段不能删除
        assert!(reg.link("AB").unwrap().children().contains(&key(Tag::DataSet, "counts")));
        assert!(reg.requires_save(SaveGroup::Data));
        reg.assert_coherent();
    }

    #[test]
    fn test_selection_counts() {
        let mut reg = two_nodes_one_link();
        reg.set_selected(&key(Tag::Junction, "A"), true).unwrap();
        reg.set_selected(&key(Tag::Lane, "AB_1"), true).unwrap();
        assert_eq!(reg.count_selected(Tag::Junction), 1);
        assert_eq!(reg.count_selected(Tag::Lane), 1);
        assert_eq!(reg.count_selected_in(Category::Node), 1);
        assert_eq!(reg.set_selected(&key(Tag::Junction, "A"), false), Ok(true));
        assert_eq!(reg.count_selected(Tag::Junction), 0);
    }

    #[test]
    fn test_set_attribute_refreshes_index() {
        let mut reg = registry();
        let catalog = Arc::clone(reg.catalog());
        let poly = Shape::polygon(
            &catalog,
            "park",
            &[Point2::new(0.0, 0.0), Point2::new(10.0, 10.0)],
        )
        .unwrap();
        let park = reg.register(poly).unwrap();
        let far = BoundingBox2::around(Point2::new(505.0, 505.0), 1.0);
        assert!(reg.query_rect(&far).is_empty());

        let before = reg
            .set_attribute(&park, Attr::Shape, "500,500 510,510")
            .unwrap();
        assert_eq!(reg.query_rect(&far), vec![park.clone()]);

        reg.restore_attribute(&park, &before).unwrap();
        assert!(reg.query_rect(&far).is_empty());
        assert!(reg.set_attribute(&park, Attr::Id, "x").is_err());
        reg.assert_coherent();
    }

    #[test]
    fn test_clear_in_dependency_order() {
        let mut reg = two_nodes_one_link();
        let catalog = Arc::clone(reg.catalog());
        reg.register(TazElement::taz(&catalog, "t", &[Point2::origin()]).unwrap())
            .unwrap();
        reg.register(TazElement::source(&catalog, "src", "t", "AB", 1.0).unwrap())
            .unwrap();
        reg.register(LinkType::new(&catalog, "highway").unwrap())
            .unwrap();

        assert!(reg.clear(Category::Node).is_err());
        assert!(reg.clear(Category::Link).is_err());
        assert_eq!(reg.clear(Category::Taz), Ok(2));
        assert_eq!(reg.clear(Category::Link), Ok(1));
        assert_eq!(reg.clear(Category::Node), Ok(2));
        assert_eq!(reg.clear(Category::LinkType), Ok(1));
        assert!(reg.is_empty());
        assert!(reg.spatial().is_empty());
        assert!(reg.net().nodes().is_empty());
        reg.assert_coherent();
    }

    #[test]
    fn test_remap_node_and_link_ids() {
        let mut reg = two_nodes_one_link();
        let catalog = Arc::clone(reg.catalog());
        reg.register(
            Additional::new(&catalog, Tag::BusStop, "s")
                .unwrap()
                .on_lane("AB", 0)
                .unwrap(),
        )
        .unwrap();
        assert_eq!(reg.remap_node_and_link_ids(), 3);
        assert_eq!(reg.ids_of(Tag::Junction), vec!["0", "1"]);
        assert_eq!(reg.link("0").unwrap().from_node(), "0");
        let stop = reg.lookup(Tag::BusStop, "s").unwrap();
        assert_eq!(stop.carrier().get_attribute(Attr::Lane).unwrap(), "0_0");
        assert_eq!(reg.remap_node_and_link_ids(), 0);
        reg.assert_coherent();
    }

    #[test]
    fn test_registry_error_messages() {
        let err = RegistryError::DuplicateId {
            tag: Tag::Junction,
            id: "A".to_string(),
        };
        assert_eq!(err.to_string(), "junction 'A' already exists");
    }
}
