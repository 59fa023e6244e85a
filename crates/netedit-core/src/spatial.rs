//! 空间索引
//!
//! 用于命中测试和可见性裁剪的包围盒索引。注册表是唯一的写入方：
//! 实体在插入时加入一次、删除时移除一次。

use crate::entity::EntityKey;
use crate::math::BoundingBox2;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// 空间索引接口
pub trait SpatialIndex: fmt::Debug + Send + Sync {
    /// 加入索引；已存在时返回 false
    fn add(&mut self, key: EntityKey, bounds: BoundingBox2) -> bool;

    /// 移出索引
    fn remove(&mut self, key: &EntityKey) -> Option<BoundingBox2>;

    /// 更新包围盒；不存在时返回 false
    fn update(&mut self, key: &EntityKey, bounds: BoundingBox2) -> bool;

    /// 重新设置键，包围盒不变
    fn rename(&mut self, old: &EntityKey, new: EntityKey) -> bool {
        match self.remove(old) {
            Some(bounds) => self.add(new, bounds),
            None => false,
        }
    }

    fn contains(&self, key: &EntityKey) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 全部成员（有序）
    fn keys(&self) -> Vec<EntityKey>;

    /// 与矩形相交的成员（有序）
    fn query_rect(&self, rect: &BoundingBox2) -> Vec<EntityKey>;
}

/// 单个包围盒最多占用的网格数，超过则放入溢出集合
const MAX_CELLS_PER_ENTRY: i64 = 4096;

type Cell = (i64, i64);

/// 均匀网格索引
#[derive(Debug, Clone)]
pub struct GridIndex {
    cell_size: f64,
    entries: HashMap<EntityKey, BoundingBox2>,
    cells: HashMap<Cell, BTreeSet<EntityKey>>,
    /// 跨越过多网格的大包围盒
    oversized: BTreeSet<EntityKey>,
}

impl GridIndex {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size: if cell_size > 0.0 { cell_size } else { 100.0 },
            entries: HashMap::new(),
            cells: HashMap::new(),
            oversized: BTreeSet::new(),
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// 包围盒所在的网格范围；空包围盒返回 None
    fn cell_range(&self, bounds: &BoundingBox2) -> Option<(Cell, Cell)> {
        if !bounds.is_valid() {
            return None;
        }
        let min = (
            (bounds.min.x / self.cell_size).floor() as i64,
            (bounds.min.y / self.cell_size).floor() as i64,
        );
        let max = (
            (bounds.max.x / self.cell_size).floor() as i64,
            (bounds.max.y / self.cell_size).floor() as i64,
        );
        Some((min, max))
    }

    fn is_oversized((min, max): (Cell, Cell)) -> bool {
        let cols = max.0.saturating_sub(min.0).saturating_add(1);
        let rows = max.1.saturating_sub(min.1).saturating_add(1);
        cols.saturating_mul(rows) > MAX_CELLS_PER_ENTRY
    }

    fn insert_cells(&mut self, key: &EntityKey, bounds: &BoundingBox2) {
        let Some(range) = self.cell_range(bounds) else {
            return;
        };
        if Self::is_oversized(range) {
            self.oversized.insert(key.clone());
            return;
        }
        let ((x0, y0), (x1, y1)) = range;
        for x in x0..=x1 {
            for y in y0..=y1 {
                self.cells.entry((x, y)).or_default().insert(key.clone());
            }
        }
    }

    fn remove_cells(&mut self, key: &EntityKey, bounds: &BoundingBox2) {
        let Some(range) = self.cell_range(bounds) else {
            return;
        };
        if Self::is_oversized(range) {
            self.oversized.remove(key);
            return;
        }
        let ((x0, y0), (x1, y1)) = range;
        for x in x0..=x1 {
            for y in y0..=y1 {
                if let Some(cell) = self.cells.get_mut(&(x, y)) {
                    cell.remove(key);
                    if cell.is_empty() {
                        self.cells.remove(&(x, y));
                    }
                }
            }
        }
    }
}

impl Default for GridIndex {
    fn default() -> Self {
        Self::new(100.0)
    }
}

impl SpatialIndex for GridIndex {
    fn add(&mut self, key: EntityKey, bounds: BoundingBox2) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.insert_cells(&key, &bounds);
        self.entries.insert(key, bounds);
        true
    }

    fn remove(&mut self, key: &EntityKey) -> Option<BoundingBox2> {
        let bounds = self.entries.remove(key)?;
        self.remove_cells(key, &bounds);
        Some(bounds)
    }

    fn update(&mut self, key: &EntityKey, bounds: BoundingBox2) -> bool {
        let Some(old) = self.entries.get(key).copied() else {
            return false;
        };
        self.remove_cells(key, &old);
        self.insert_cells(key, &bounds);
        self.entries.insert(key.clone(), bounds);
        true
    }

    fn contains(&self, key: &EntityKey) -> bool {
        self.entries.contains_key(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn keys(&self) -> Vec<EntityKey> {
        let mut keys: Vec<EntityKey> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn query_rect(&self, rect: &BoundingBox2) -> Vec<EntityKey> {
        let mut found: BTreeSet<&EntityKey> = self
            .oversized
            .iter()
            .filter(|k| self.entries.get(*k).is_some_and(|b| b.intersects(rect)))
            .collect();

        if let Some(range) = self.cell_range(rect) {
            if Self::is_oversized(range) {
                // 查询范围过大时直接扫描全部成员
                found.extend(
                    self.entries
                        .iter()
                        .filter(|(_, b)| b.intersects(rect))
                        .map(|(k, _)| k),
                );
            } else {
                let ((x0, y0), (x1, y1)) = range;
                for x in x0..=x1 {
                    for y in y0..=y1 {
                        let Some(cell) = self.cells.get(&(x, y)) else {
                            continue;
                        };
                        found.extend(cell.iter().filter(|k| {
                            self.entries.get(*k).is_some_and(|b| b.intersects(rect))
                        }));
                    }
                }
            }
        }

        found.into_iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Point2;
    use crate::tag::Tag;

    fn key(id: &str) -> EntityKey {
        EntityKey::new(Tag::Junction, id)
    }

    #[test]
    fn test_add_once() {
        let mut index = GridIndex::new(10.0);
        let bounds = BoundingBox2::around(Point2::new(5.0, 5.0), 1.0);
        assert!(index.add(key("A"), bounds));
        assert!(!index.add(key("A"), bounds));
        assert_eq!(index.len(), 1);
        assert_eq!(index.remove(&key("A")), Some(bounds));
        assert!(index.remove(&key("A")).is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn test_query_and_rename() {
        let mut index = GridIndex::new(10.0);
        index.add(key("A"), BoundingBox2::around(Point2::new(5.0, 5.0), 1.0));
        index.add(key("B"), BoundingBox2::around(Point2::new(95.0, 95.0), 1.0));
        index.add(key("C"), BoundingBox2::empty());

        let near_origin = BoundingBox2::new(Point2::new(0.0, 0.0), Point2::new(20.0, 20.0));
        assert_eq!(index.query_rect(&near_origin), vec![key("A")]);

        assert!(index.rename(&key("A"), key("A2")));
        assert_eq!(index.query_rect(&near_origin), vec![key("A2")]);
        assert!(index.contains(&key("C")));
        assert_eq!(index.keys(), vec![key("A2"), key("B"), key("C")]);
    }

    #[test]
    fn test_oversized_entries() {
        let mut index = GridIndex::new(1.0);
        let huge = BoundingBox2::new(Point2::new(-1000.0, -1000.0), Point2::new(1000.0, 1000.0));
        index.add(key("world"), huge);
        let probe = BoundingBox2::around(Point2::new(3.0, 3.0), 0.5);
        assert_eq!(index.query_rect(&probe), vec![key("world")]);

        index.update(&key("world"), BoundingBox2::around(Point2::new(500.0, 500.0), 0.5));
        assert!(index.query_rect(&probe).is_empty());
    }
}
