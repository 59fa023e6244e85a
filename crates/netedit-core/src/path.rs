//! 路径缓存
//!
//! 为需求元素和设施缓存其经过的路段序列。路段被删除时，经过它的路径失效；
//! 实体或路段重命名时，缓存随之改键。

use crate::entity::EntityKey;
use std::collections::BTreeMap;
use tracing::debug;

/// 路径管理器
#[derive(Debug, Clone, Default)]
pub struct PathManager {
    paths: BTreeMap<EntityKey, Vec<String>>,
}

impl PathManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 计算并缓存路径；空序列或含有未知路段时不缓存
    pub fn calculate(
        &mut self,
        key: EntityKey,
        links: Vec<String>,
        is_link: impl Fn(&str) -> bool,
    ) -> bool {
        if links.is_empty() || !links.iter().all(|l| is_link(l)) {
            self.paths.remove(&key);
            return false;
        }
        self.paths.insert(key, links);
        true
    }

    pub fn path(&self, key: &EntityKey) -> Option<&[String]> {
        self.paths.get(key).map(Vec::as_slice)
    }

    pub fn is_calculated(&self, key: &EntityKey) -> bool {
        self.paths.contains_key(key)
    }

    pub fn remove_path(&mut self, key: &EntityKey) -> Option<Vec<String>> {
        self.paths.remove(key)
    }

    /// 使经过某路段的路径失效，返回受影响的实体
    pub fn invalidate_link(&mut self, link: &str) -> Vec<EntityKey> {
        let affected: Vec<EntityKey> = self
            .paths
            .iter()
            .filter(|(_, path)| path.iter().any(|l| l == link))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &affected {
            debug!("path of {} invalidated by removal of edge '{}'", key, link);
            self.paths.remove(key);
        }
        affected
    }

    pub fn rename_key(&mut self, old: &EntityKey, new: EntityKey) {
        if let Some(path) = self.paths.remove(old) {
            self.paths.insert(new, path);
        }
    }

    pub fn rename_link(&mut self, old: &str, new: &str) {
        for path in self.paths.values_mut() {
            for link in path.iter_mut().filter(|l| *l == old) {
                *link = new.to_string();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::Tag;

    #[test]
    fn test_path_lifecycle() {
        let mut paths = PathManager::new();
        let known = |l: &str| l == "AB" || l == "BC";
        let route = EntityKey::new(Tag::Route, "r0");

        assert!(paths.calculate(route.clone(), vec!["AB".into(), "BC".into()], known));
        assert!(!paths.calculate(
            EntityKey::new(Tag::Route, "r1"),
            vec!["AB".into(), "XY".into()],
            known
        ));

        paths.rename_link("AB", "L1");
        assert_eq!(paths.path(&route).unwrap(), ["L1", "BC"]);

        let renamed = route.with_id("main");
        paths.rename_key(&route, renamed.clone());
        assert!(!paths.is_calculated(&route));

        assert_eq!(paths.invalidate_link("BC"), vec![renamed]);
        assert!(paths.is_empty());
    }
}
