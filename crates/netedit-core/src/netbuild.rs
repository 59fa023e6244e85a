//! 构网子系统
//!
//! 与注册表分开索引的节点/路段容器，供后续导出和构建底层网络使用。
//! 记录以生成式句柄寻址，另有标识符索引；连接按句柄存储，
//! 因此路段重命名后连接标识符可以直接从当前名称重新计算。

use crate::elements::connection_id;
use crate::entity::Handle;
use crate::math::Point2;
use generational_arena::Arena;
use std::collections::BTreeMap;

/// 构网子系统错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
    #[error("identifier already used: {0}")]
    DuplicateId(String),

    #[error("stale or unknown handle {0}")]
    StaleHandle(Handle),

    #[error("node '{0}' still has attached edges")]
    NodeInUse(String),

    #[error("lane {lane} does not exist on edge '{edge}'")]
    InvalidLane { edge: String, lane: usize },
}

/// 节点记录
#[derive(Debug, Clone, PartialEq)]
pub struct NbNode {
    pub id: String,
    pub position: Point2,
    pub incoming: Vec<Handle>,
    pub outgoing: Vec<Handle>,
}

/// 路段记录
#[derive(Debug, Clone, PartialEq)]
pub struct NbEdge {
    pub id: String,
    pub from: Handle,
    pub to: Handle,
    pub num_lanes: usize,
    pub connections: Vec<NbConnection>,
}

/// 以句柄表示的车道连接
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NbConnection {
    pub from_lane: usize,
    pub to: Handle,
    pub to_lane: usize,
}

/// 用当前名称解析后的连接
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConnection {
    pub from: String,
    pub from_lane: usize,
    pub to: String,
    pub to_lane: usize,
}

impl ResolvedConnection {
    pub fn id(&self) -> String {
        connection_id(&self.from, self.from_lane, &self.to, self.to_lane)
    }
}

/// 竞技场加标识符索引
#[derive(Debug, Clone)]
struct Slots<T> {
    arena: Arena<T>,
    ids: BTreeMap<String, Handle>,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self {
            arena: Arena::new(),
            ids: BTreeMap::new(),
        }
    }
}

impl<T> Slots<T> {
    fn insert(&mut self, id: &str, item: T) -> Result<Handle, BuildError> {
        if self.ids.contains_key(id) {
            return Err(BuildError::DuplicateId(id.to_string()));
        }
        let handle = Handle(self.arena.insert(item));
        self.ids.insert(id.to_string(), handle);
        Ok(handle)
    }

    fn get(&self, handle: Handle) -> Option<&T> {
        self.arena.get(handle.0)
    }

    fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.arena.get_mut(handle.0)
    }

    fn extract(&mut self, id: &str, handle: Handle) -> Option<T> {
        let item = self.arena.remove(handle.0)?;
        self.ids.remove(id);
        Some(item)
    }

    fn rekey(&mut self, old: &str, new: &str, handle: Handle) -> Result<(), BuildError> {
        if self.ids.contains_key(new) {
            return Err(BuildError::DuplicateId(new.to_string()));
        }
        self.ids.remove(old);
        self.ids.insert(new.to_string(), handle);
        Ok(())
    }

    fn ids(&self) -> Vec<String> {
        self.ids.keys().cloned().collect()
    }

    fn iter(&self) -> impl Iterator<Item = (Handle, &T)> + '_ {
        self.ids.values().filter_map(|h| self.get(*h).map(|item| (*h, item)))
    }

    fn clear(&mut self) {
        self.arena.clear();
        self.ids.clear();
    }
}

/// 节点容器
#[derive(Debug, Clone, Default)]
pub struct NodeCont {
    slots: Slots<NbNode>,
}

impl NodeCont {
    pub fn retrieve(&self, id: &str) -> Option<Handle> {
        self.slots.ids.get(id).copied()
    }

    pub fn get(&self, handle: Handle) -> Option<&NbNode> {
        self.slots.get(handle)
    }

    pub fn ids(&self) -> Vec<String> {
        self.slots.ids()
    }

    pub fn len(&self) -> usize {
        self.slots.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.ids.is_empty()
    }
}

/// 路段容器
#[derive(Debug, Clone, Default)]
pub struct EdgeCont {
    slots: Slots<NbEdge>,
}

impl EdgeCont {
    pub fn retrieve(&self, id: &str) -> Option<Handle> {
        self.slots.ids.get(id).copied()
    }

    pub fn get(&self, handle: Handle) -> Option<&NbEdge> {
        self.slots.get(handle)
    }

    pub fn ids(&self) -> Vec<String> {
        self.slots.ids()
    }

    pub fn len(&self) -> usize {
        self.slots.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.ids.is_empty()
    }
}

/// 构网子系统
#[derive(Debug, Clone, Default)]
pub struct NetBuilder {
    nodes: NodeCont,
    edges: EdgeCont,
}

impl NetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &NodeCont {
        &self.nodes
    }

    pub fn edges(&self) -> &EdgeCont {
        &self.edges
    }

    pub fn insert_node(&mut self, id: &str, position: Point2) -> Result<Handle, BuildError> {
        self.nodes.slots.insert(
            id,
            NbNode {
                id: id.to_string(),
                position,
                incoming: Vec::new(),
                outgoing: Vec::new(),
            },
        )
    }

    /// 取出节点；仍连着路段的节点不能取出
    pub fn extract_node(&mut self, handle: Handle) -> Result<NbNode, BuildError> {
        let node = self
            .nodes
            .get(handle)
            .ok_or(BuildError::StaleHandle(handle))?;
        if !node.incoming.is_empty() || !node.outgoing.is_empty() {
            return Err(BuildError::NodeInUse(node.id.clone()));
        }
        let id = node.id.clone();
        self.nodes
            .slots
            .extract(&id, handle)
            .ok_or(BuildError::StaleHandle(handle))
    }

    pub fn rename_node(&mut self, handle: Handle, new_id: &str) -> Result<(), BuildError> {
        let old = self
            .nodes
            .get(handle)
            .ok_or(BuildError::StaleHandle(handle))?
            .id
            .clone();
        self.nodes.slots.rekey(&old, new_id, handle)?;
        if let Some(node) = self.nodes.slots.get_mut(handle) {
            node.id = new_id.to_string();
        }
        Ok(())
    }

    /// 插入路段并连到两端节点
    pub fn insert_edge(
        &mut self,
        id: &str,
        from: Handle,
        to: Handle,
        num_lanes: usize,
    ) -> Result<Handle, BuildError> {
        for node in [from, to] {
            if self.nodes.get(node).is_none() {
                return Err(BuildError::StaleHandle(node));
            }
        }
        let handle = self.edges.slots.insert(
            id,
            NbEdge {
                id: id.to_string(),
                from,
                to,
                num_lanes,
                connections: Vec::new(),
            },
        )?;
        if let Some(node) = self.nodes.slots.get_mut(from) {
            node.outgoing.push(handle);
        }
        if let Some(node) = self.nodes.slots.get_mut(to) {
            node.incoming.push(handle);
        }
        Ok(handle)
    }

    /// 取出路段：从两端节点断开，并删除其他路段指向它的连接
    pub fn extract_edge(&mut self, handle: Handle) -> Result<NbEdge, BuildError> {
        let id = self
            .edges
            .get(handle)
            .ok_or(BuildError::StaleHandle(handle))?
            .id
            .clone();
        let edge = self
            .edges
            .slots
            .extract(&id, handle)
            .ok_or(BuildError::StaleHandle(handle))?;
        if let Some(node) = self.nodes.slots.get_mut(edge.from) {
            node.outgoing.retain(|h| *h != handle);
        }
        if let Some(node) = self.nodes.slots.get_mut(edge.to) {
            node.incoming.retain(|h| *h != handle);
        }
        for (_, other) in self.edges.slots.arena.iter_mut() {
            other.connections.retain(|c| c.to != handle);
        }
        Ok(edge)
    }

    pub fn rename_edge(&mut self, handle: Handle, new_id: &str) -> Result<(), BuildError> {
        let old = self
            .edges
            .get(handle)
            .ok_or(BuildError::StaleHandle(handle))?
            .id
            .clone();
        self.edges.slots.rekey(&old, new_id, handle)?;
        if let Some(edge) = self.edges.slots.get_mut(handle) {
            edge.id = new_id.to_string();
        }
        Ok(())
    }

    /// 替换路段的出向连接，返回原连接
    pub fn set_connections(
        &mut self,
        handle: Handle,
        connections: Vec<NbConnection>,
    ) -> Result<Vec<NbConnection>, BuildError> {
        let edge = self
            .edges
            .get(handle)
            .ok_or(BuildError::StaleHandle(handle))?;
        for c in &connections {
            if c.from_lane >= edge.num_lanes {
                return Err(BuildError::InvalidLane {
                    edge: edge.id.clone(),
                    lane: c.from_lane,
                });
            }
            let target = self.edges.get(c.to).ok_or(BuildError::StaleHandle(c.to))?;
            if c.to_lane >= target.num_lanes {
                return Err(BuildError::InvalidLane {
                    edge: target.id.clone(),
                    lane: c.to_lane,
                });
            }
        }
        let edge = self
            .edges
            .slots
            .get_mut(handle)
            .ok_or(BuildError::StaleHandle(handle))?;
        Ok(std::mem::replace(&mut edge.connections, connections))
    }

    /// 用当前名称解析路段的出向连接
    pub fn resolved_connections(&self, handle: Handle) -> Result<Vec<ResolvedConnection>, BuildError> {
        let edge = self
            .edges
            .get(handle)
            .ok_or(BuildError::StaleHandle(handle))?;
        edge.connections
            .iter()
            .map(|c| {
                let to = self.edges.get(c.to).ok_or(BuildError::StaleHandle(c.to))?;
                Ok(ResolvedConnection {
                    from: edge.id.clone(),
                    from_lane: c.from_lane,
                    to: to.id.clone(),
                    to_lane: c.to_lane,
                })
            })
            .collect()
    }

    pub fn connection_ids(&self, handle: Handle) -> Result<Vec<String>, BuildError> {
        Ok(self
            .resolved_connections(handle)?
            .iter()
            .map(ResolvedConnection::id)
            .collect())
    }

    /// 有连接指向 `handle` 的其他路段
    pub fn predecessors(&self, handle: Handle) -> Vec<Handle> {
        self.edges
            .slots
            .iter()
            .filter(|(h, e)| *h != handle && e.connections.iter().any(|c| c.to == handle))
            .map(|(h, _)| h)
            .collect()
    }

    pub fn node_ids(&self) -> Vec<String> {
        self.nodes.ids()
    }

    pub fn edge_ids(&self) -> Vec<String> {
        self.edges.ids()
    }

    /// 清空全部记录；已发出的句柄全部失效
    pub fn clear(&mut self) {
        self.nodes.slots.clear();
        self.edges.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> (NetBuilder, [Handle; 3]) {
        let mut nb = NetBuilder::new();
        let a = nb.insert_node("A", Point2::new(0.0, 0.0)).unwrap();
        let b = nb.insert_node("B", Point2::new(100.0, 0.0)).unwrap();
        let c = nb.insert_node("C", Point2::new(100.0, 100.0)).unwrap();
        (nb, [a, b, c])
    }

    #[test]
    fn test_edge_wiring() {
        let (mut nb, [a, b, _]) = triangle();
        let ab = nb.insert_edge("AB", a, b, 1).unwrap();
        assert_eq!(nb.nodes().get(a).unwrap().outgoing, vec![ab]);
        assert_eq!(nb.nodes().get(b).unwrap().incoming, vec![ab]);
        assert!(matches!(nb.extract_node(a), Err(BuildError::NodeInUse(_))));

        nb.extract_edge(ab).unwrap();
        assert!(nb.nodes().get(a).unwrap().outgoing.is_empty());
        assert!(nb.extract_node(a).is_ok());
        assert_eq!(nb.node_ids(), vec!["B", "C"]);
    }

    #[test]
    fn test_rename_recomputes_connection_ids() {
        let (mut nb, [a, b, c]) = triangle();
        let ab = nb.insert_edge("AB", a, b, 2).unwrap();
        let bc = nb.insert_edge("BC", b, c, 1).unwrap();
        nb.set_connections(
            ab,
            vec![NbConnection {
                from_lane: 1,
                to: bc,
                to_lane: 0,
            }],
        )
        .unwrap();

        nb.rename_edge(bc, "L2").unwrap();
        nb.rename_edge(ab, "L1").unwrap();
        assert_eq!(nb.connection_ids(ab).unwrap(), vec!["L1_1->L2_0"]);
        assert_eq!(nb.predecessors(bc), vec![ab]);
        assert_eq!(nb.edges().retrieve("L1"), Some(ab));
        assert!(nb.edges().retrieve("AB").is_none());
    }

    #[test]
    fn test_duplicate_and_stale() {
        let (mut nb, [a, b, _]) = triangle();
        assert_eq!(
            nb.insert_node("A", Point2::origin()),
            Err(BuildError::DuplicateId("A".to_string()))
        );
        assert!(nb.rename_node(a, "B").is_err());

        let ab = nb.insert_edge("AB", a, b, 1).unwrap();
        nb.extract_edge(ab).unwrap();
        assert_eq!(nb.extract_edge(ab), Err(BuildError::StaleHandle(ab)));

        let bad = NbConnection {
            from_lane: 3,
            to: ab,
            to_lane: 0,
        };
        let ba = nb.insert_edge("BA", b, a, 1).unwrap();
        assert!(nb.set_connections(ba, vec![bad]).is_err());

        // 槽位复用后旧句柄仍然失效
        assert_ne!(ab, ba);
        assert!(nb.edges().get(ab).is_none());

        nb.clear();
        assert!(nb.nodes().get(a).is_none());
        assert!(nb.edges().is_empty());
    }

    #[test]
    fn test_extract_edge_drops_incoming_connections() {
        let (mut nb, [a, b, c]) = triangle();
        let ab = nb.insert_edge("AB", a, b, 1).unwrap();
        let bc = nb.insert_edge("BC", b, c, 1).unwrap();
        nb.set_connections(
            ab,
            vec![NbConnection {
                from_lane: 0,
                to: bc,
                to_lane: 0,
            }],
        )
        .unwrap();
        nb.extract_edge(bc).unwrap();
        assert!(nb.edges().get(ab).unwrap().connections.is_empty());
    }
}
