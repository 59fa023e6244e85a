//! 实体标识
//!
//! 注册表中的实体以 `(标签, 字符串ID)` 作为键；构网子系统内部的记录则使用
//! `generational_arena` 的索引寻址，槽位回收时代数递增，旧句柄随之失效。

use crate::tag::Tag;
use generational_arena::Index;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 实体键（类型标签 + 标识符）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub tag: Tag,
    pub id: String,
}

impl EntityKey {
    pub fn new(tag: Tag, id: impl Into<String>) -> Self {
        Self { tag, id: id.into() }
    }

    /// 替换标识符，标签不变
    pub fn with_id(&self, id: impl Into<String>) -> Self {
        Self {
            tag: self.tag,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.tag, self.id)
    }
}

/// 构网子系统中的记录句柄
///
/// 包装竞技场索引；记录被移除后旧句柄失效，即使槽位已被复用。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub(crate) Index);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (index, generation) = self.0.into_raw_parts();
        write!(f, "#{}v{}", index, generation)
    }
}
