//! NetEdit 核心实体注册表
//!
//! 交通网络编辑器的数据模型：路口、路段、附属设施、形状、交通小区、
//! 需求元素和统计数据，全部由一个注册表统一拥有。
//!
//! # 架构设计
//!
//! - `TypeCatalog`: 只读的类型目录，描述每个类型标签的类别、标志和属性
//! - `AttributeCarrier`: 实体的公共能力集（字符串属性、选择、标识符）
//! - `EntityRegistry`: 实体的唯一拥有者，维护唯一性、空间索引和构网镜像
//! - `UndoList`: 以可逆修改实现撤销/重做
//!
//! # 示例
//!
//! ```rust
//! use netedit_core::prelude::*;
//! use std::sync::Arc;
//!
//! let catalog = Arc::new(TypeCatalog::standard());
//! let mut registry = EntityRegistry::new(Arc::clone(&catalog));
//!
//! registry.register(Node::new(&catalog, "A", Point2::new(0.0, 0.0)).unwrap()).unwrap();
//! registry.register(Node::new(&catalog, "B", Point2::new(100.0, 0.0)).unwrap()).unwrap();
//! registry.register(Link::new(&catalog, "AB", "A", "B", 1).unwrap()).unwrap();
//!
//! registry.rename(&EntityKey::new(Tag::Edge, "AB"), "L1").unwrap();
//! assert!(registry.lookup_carrier(Tag::Lane, "L1_0").is_some());
//! registry.assert_coherent();
//! ```

pub mod attribute;
pub mod carrier;
pub mod catalog;
pub mod config;
pub mod elements;
pub mod entity;
pub mod hierarchy;
pub mod history;
pub mod math;
pub mod netbuild;
pub mod path;
pub mod registry;
pub mod spatial;
pub mod tag;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::attribute::{Attr, AttributeError};
    pub use crate::carrier::AttributeCarrier;
    pub use crate::catalog::{TagProperties, TypeCatalog};
    pub use crate::config::EditorOptions;
    pub use crate::elements::{
        Additional, Connection, DataSet, DemandElement, Element, Link, LinkType, Node, Shape,
        TazElement,
    };
    pub use crate::entity::EntityKey;
    pub use crate::hierarchy::HierarchicalElement;
    pub use crate::history::{Change, HistoryError, UndoList};
    pub use crate::math::{BoundingBox2, Point2};
    pub use crate::registry::{EntityRegistry, RegistryError};
    pub use crate::tag::{Category, SaveGroup, Tag};
}
