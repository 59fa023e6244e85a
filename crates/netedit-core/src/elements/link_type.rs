//! 路段类型模板

use crate::attribute::{Attr, AttributeError};
use crate::carrier::{AttributeCarrier, CarrierCore};
use crate::catalog::TypeCatalog;
use crate::tag::Tag;

/// 路段类型
///
/// 只在创建路段时提供默认车道属性，之后路段不再引用它。
#[derive(Debug, Clone)]
pub struct LinkType {
    core: CarrierCore,
}

impl LinkType {
    pub fn new(catalog: &TypeCatalog, id: impl Into<String>) -> Result<Self, AttributeError> {
        Ok(Self {
            core: CarrierCore::new(catalog, Tag::Type, id)?,
        })
    }

    pub fn num_lanes(&self) -> usize {
        self.core.uint(Attr::NumLanes).unwrap_or(1)
    }

    pub fn speed(&self) -> f64 {
        self.core.float(Attr::Speed).unwrap_or_default()
    }

    pub fn priority(&self) -> i64 {
        self.core
            .value(Attr::Priority)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(-1)
    }

    pub fn width(&self) -> f64 {
        self.core.float(Attr::Width).unwrap_or_default()
    }
}

impl AttributeCarrier for LinkType {
    fn core(&self) -> &CarrierCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CarrierCore {
        &mut self.core
    }
}
