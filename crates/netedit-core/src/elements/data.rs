//! 统计数据：数据集 → 时间区间 → 记录
//!
//! 只有数据集在注册表中注册；区间和记录按结构嵌套，标识符由所属层级推导。

use super::additional::slave_id;
use crate::attribute::{Attr, AttributeError};
use crate::carrier::{AttributeCarrier, CarrierCore};
use crate::catalog::TypeCatalog;
use crate::entity::EntityKey;
use crate::hierarchy::{HierarchicalElement, Hierarchy};
use crate::tag::Tag;
use std::collections::BTreeMap;

/// 统计记录
#[derive(Debug, Clone)]
pub struct GenericData {
    core: CarrierCore,
    params: BTreeMap<String, f64>,
}

impl GenericData {
    /// 引用的路段或小区
    pub fn references(&self) -> Vec<EntityKey> {
        let target = match self.tag() {
            Tag::TazRelData => Tag::Taz,
            _ => Tag::Edge,
        };
        let mut ids = self.core.ids(Attr::Edge);
        ids.extend(self.core.ids(Attr::From));
        ids.extend(self.core.ids(Attr::To));
        ids.into_iter().map(|id| EntityKey::new(target, id)).collect()
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: f64) {
        self.params.insert(name.into(), value);
    }

    pub fn param(&self, name: &str) -> Option<f64> {
        self.params.get(name).copied()
    }

    pub fn params(&self) -> &BTreeMap<String, f64> {
        &self.params
    }
}

impl AttributeCarrier for GenericData {
    fn core(&self) -> &CarrierCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CarrierCore {
        &mut self.core
    }
}

/// 时间区间
#[derive(Debug, Clone)]
pub struct DataInterval {
    core: CarrierCore,
    records: Vec<GenericData>,
}

impl DataInterval {
    pub fn begin(&self) -> f64 {
        self.core.float(Attr::Begin).unwrap_or_default()
    }

    pub fn end(&self) -> f64 {
        self.core.float(Attr::End).unwrap_or_default()
    }

    /// 区间是否完全落在 [begin, end] 内
    pub fn within(&self, begin: f64, end: f64) -> bool {
        self.begin() >= begin && self.end() <= end
    }

    pub fn records(&self) -> &[GenericData] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [GenericData] {
        &mut self.records
    }

    fn push(
        &mut self,
        catalog: &TypeCatalog,
        tag: Tag,
        values: &[(Attr, &str)],
    ) -> Result<&mut GenericData, AttributeError> {
        let id = slave_id(self.core.id(), tag, self.records.len());
        let mut core = CarrierCore::new(catalog, tag, id)?;
        for (attr, value) in values {
            core.set_raw(*attr, *value);
        }
        self.records.push(GenericData {
            core,
            params: BTreeMap::new(),
        });
        let last = self.records.len() - 1;
        Ok(&mut self.records[last])
    }

    /// 路段数据
    pub fn add_edge_data(
        &mut self,
        catalog: &TypeCatalog,
        link: &str,
    ) -> Result<&mut GenericData, AttributeError> {
        self.push(catalog, Tag::EdgeData, &[(Attr::Edge, link)])
    }

    /// 路段间关系数据
    pub fn add_edge_rel_data(
        &mut self,
        catalog: &TypeCatalog,
        from: &str,
        to: &str,
    ) -> Result<&mut GenericData, AttributeError> {
        self.push(catalog, Tag::EdgeRelData, &[(Attr::From, from), (Attr::To, to)])
    }

    /// 小区间关系数据
    pub fn add_taz_rel_data(
        &mut self,
        catalog: &TypeCatalog,
        from: &str,
        to: &str,
    ) -> Result<&mut GenericData, AttributeError> {
        self.push(catalog, Tag::TazRelData, &[(Attr::From, from), (Attr::To, to)])
    }

    fn rename(&mut self, id: String) {
        for (i, record) in self.records.iter_mut().enumerate() {
            let tag = record.tag();
            record.core.set_id(slave_id(&id, tag, i));
        }
        self.core.set_id(id);
    }
}

impl AttributeCarrier for DataInterval {
    fn core(&self) -> &CarrierCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CarrierCore {
        &mut self.core
    }
}

/// 数据集
///
/// 父引用是所有记录所引用路段/小区的并集，由注册表在注册时收集。
#[derive(Debug, Clone)]
pub struct DataSet {
    core: CarrierCore,
    hierarchy: Hierarchy,
    intervals: Vec<DataInterval>,
}

impl DataSet {
    pub fn new(catalog: &TypeCatalog, id: impl Into<String>) -> Result<Self, AttributeError> {
        Ok(Self {
            core: CarrierCore::new(catalog, Tag::DataSet, id)?,
            hierarchy: Hierarchy::new(),
            intervals: Vec::new(),
        })
    }

    /// 添加时间区间，要求 begin <= end
    pub fn add_interval(
        &mut self,
        catalog: &TypeCatalog,
        begin: f64,
        end: f64,
    ) -> Result<&mut DataInterval, AttributeError> {
        if !(begin >= 0.0 && begin <= end) {
            return Err(AttributeError::InvalidValue {
                tag: Tag::DataInterval,
                attr: Attr::End,
                value: end.to_string(),
            });
        }
        let id = slave_id(self.core.id(), Tag::DataInterval, self.intervals.len());
        let mut core = CarrierCore::new(catalog, Tag::DataInterval, id)?;
        core.set_raw(Attr::Begin, begin.to_string());
        core.set_raw(Attr::End, end.to_string());
        self.intervals.push(DataInterval {
            core,
            records: Vec::new(),
        });
        let last = self.intervals.len() - 1;
        Ok(&mut self.intervals[last])
    }

    pub fn intervals(&self) -> &[DataInterval] {
        &self.intervals
    }

    pub fn intervals_mut(&mut self) -> &mut [DataInterval] {
        &mut self.intervals
    }

    /// 从记录重新收集父引用
    pub(crate) fn collect_parents(&mut self) {
        let refs: Vec<EntityKey> = self
            .intervals
            .iter()
            .flat_map(|i| i.records.iter())
            .flat_map(|r| r.references())
            .collect();
        self.hierarchy = Hierarchy::with_parents(refs);
    }

    pub(crate) fn rename(&mut self, new_id: &str) {
        self.core.set_id(new_id);
        for (i, interval) in self.intervals.iter_mut().enumerate() {
            interval.rename(slave_id(new_id, Tag::DataInterval, i));
        }
    }
}

impl AttributeCarrier for DataSet {
    fn core(&self) -> &CarrierCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CarrierCore {
        &mut self.core
    }
}

impl HierarchicalElement for DataSet {
    fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    fn hierarchy_mut(&mut self) -> &mut Hierarchy {
        &mut self.hierarchy
    }

    fn replace_parent(&mut self, old: &EntityKey, new: &EntityKey) {
        if !self.hierarchy.replace_parent(old, new) {
            return;
        }
        for record in self.intervals.iter_mut().flat_map(|i| i.records.iter_mut()) {
            let target = record.references().iter().any(|k| k.tag == old.tag);
            if target {
                record.core.rewrite_references(old, new);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_records() {
        let catalog = TypeCatalog::standard();
        let mut set = DataSet::new(&catalog, "counts").unwrap();
        let interval = set.add_interval(&catalog, 0.0, 3600.0).unwrap();
        interval
            .add_edge_data(&catalog, "AB")
            .unwrap()
            .set_param("entered", 42.0);
        interval.add_taz_rel_data(&catalog, "z1", "z2").unwrap();
        assert!(set.add_interval(&catalog, 10.0, 5.0).is_err());

        set.collect_parents();
        assert_eq!(set.parents().len(), 3);
        assert!(set.parents().contains(&EntityKey::new(Tag::Taz, "z2")));

        let record = &set.intervals()[0].records()[0];
        assert_eq!(record.id(), "counts_dataInterval0_edgeData0");
        assert_eq!(record.param("entered"), Some(42.0));

        set.rename("flows");
        assert_eq!(
            set.intervals()[0].records()[1].id(),
            "flows_dataInterval0_tazRelation1"
        );
    }

    #[test]
    fn test_interval_containment() {
        let catalog = TypeCatalog::standard();
        let mut set = DataSet::new(&catalog, "d").unwrap();
        let interval = set.add_interval(&catalog, 100.0, 200.0).unwrap();
        assert!(interval.within(0.0, 200.0));
        assert!(!interval.within(150.0, 300.0));
    }
}
