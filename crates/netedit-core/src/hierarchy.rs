//! 父子层级
//!
//! 层级关系是非拥有的反向引用：实体只记录父/子实体的键，实体本身始终归注册表所有。

use crate::carrier::AttributeCarrier;
use crate::entity::EntityKey;

/// 父子引用列表
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hierarchy {
    parents: Vec<EntityKey>,
    children: Vec<EntityKey>,
}

impl Hierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parents(parents: impl IntoIterator<Item = EntityKey>) -> Self {
        let mut hierarchy = Self::new();
        for parent in parents {
            hierarchy.add_parent(parent);
        }
        hierarchy
    }

    pub fn parents(&self) -> &[EntityKey] {
        &self.parents
    }

    pub fn children(&self) -> &[EntityKey] {
        &self.children
    }

    pub fn add_parent(&mut self, key: EntityKey) {
        if !self.parents.contains(&key) {
            self.parents.push(key);
        }
    }

    pub fn add_child(&mut self, key: EntityKey) {
        if !self.children.contains(&key) {
            self.children.push(key);
        }
    }

    pub fn remove_child(&mut self, key: &EntityKey) -> bool {
        let len = self.children.len();
        self.children.retain(|c| c != key);
        self.children.len() != len
    }

    /// 替换父引用，返回是否找到
    pub fn replace_parent(&mut self, old: &EntityKey, new: &EntityKey) -> bool {
        replace_in(&mut self.parents, old, new)
    }

    pub fn replace_child(&mut self, old: &EntityKey, new: &EntityKey) -> bool {
        replace_in(&mut self.children, old, new)
    }

    /// 注册前清空子列表，子引用只由注册表维护
    pub(crate) fn clear_children(&mut self) {
        self.children.clear();
    }
}

fn replace_in(keys: &mut [EntityKey], old: &EntityKey, new: &EntityKey) -> bool {
    let mut found = false;
    for key in keys.iter_mut().filter(|k| *k == old) {
        *key = new.clone();
        found = true;
    }
    found
}

/// 层级元素能力集
pub trait HierarchicalElement: AttributeCarrier {
    fn hierarchy(&self) -> &Hierarchy;

    fn hierarchy_mut(&mut self) -> &mut Hierarchy;

    fn parents(&self) -> &[EntityKey] {
        self.hierarchy().parents()
    }

    fn children(&self) -> &[EntityKey] {
        self.hierarchy().children()
    }

    /// 父实体被重命名
    ///
    /// 默认实现同时改写结构性属性中的引用；持有额外类型化字段的实体需要覆盖。
    fn replace_parent(&mut self, old: &EntityKey, new: &EntityKey) {
        if self.hierarchy_mut().replace_parent(old, new) {
            self.core_mut().rewrite_references(old, new);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::Tag;

    #[test]
    fn test_hierarchy_lists() {
        let edge = EntityKey::new(Tag::Edge, "AB");
        let mut h = Hierarchy::with_parents([edge.clone(), edge.clone()]);
        assert_eq!(h.parents().len(), 1);

        let child = EntityKey::new(Tag::Vehicle, "v0");
        h.add_child(child.clone());
        h.add_child(child.clone());
        assert_eq!(h.children().len(), 1);

        let renamed = edge.with_id("L1");
        assert!(h.replace_parent(&edge, &renamed));
        assert_eq!(h.parents()[0].id, "L1");
        assert!(h.remove_child(&child));
        assert!(!h.remove_child(&child));
    }
}
