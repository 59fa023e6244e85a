//! 撤销/重做
//!
//! 所有对注册表的修改都以 [`Change`] 表示。执行修改时记录其逆操作，
//! 撤销时按相反顺序执行逆操作，同时记录重做所需的正向操作。
//! 多个修改可以用 `begin`/`end` 组合成一个撤销步骤。

use crate::attribute::Attr;
use crate::carrier::AttributeSnapshot;
use crate::config::EditorOptions;
use crate::elements::{Connection, Element};
use crate::entity::EntityKey;
use crate::registry::{EntityRegistry, RegistryError};
use std::collections::VecDeque;
use std::time::SystemTime;
use tracing::{debug, warn};

/// 历史错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HistoryError {
    #[error("change rejected: {0}")]
    Rejected(#[from] RegistryError),

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,

    #[error("undo group '{0}' is still open")]
    GroupOpen(String),

    #[error("no undo group is open")]
    NoOpenGroup,
}

/// 对注册表的一次修改
#[derive(Debug, Clone)]
pub enum Change {
    /// 注册实体
    Register(Element),

    /// 删除实体
    Unregister(EntityKey),

    /// 修改标识符
    Rename { key: EntityKey, new_id: String },

    /// 修改属性
    SetAttribute {
        key: EntityKey,
        attr: Attr,
        value: String,
    },

    /// 恢复属性快照（属性修改的逆操作）
    RestoreAttribute {
        key: EntityKey,
        snapshot: AttributeSnapshot,
    },

    Select(EntityKey),

    Unselect(EntityKey),

    /// 替换路段的出向连接
    ReplaceConnections {
        link: String,
        connections: Vec<Connection>,
    },
}

impl Change {
    pub fn description(&self) -> String {
        match self {
            Change::Register(element) => format!("create {}", element.key()),
            Change::Unregister(key) => format!("delete {}", key),
            Change::Rename { key, new_id } => format!("rename {} to '{}'", key, new_id),
            Change::SetAttribute { key, attr, value } => {
                format!("set {} of {} to '{}'", attr, key, value)
            }
            Change::RestoreAttribute { key, snapshot } => {
                format!("restore {} of {}", snapshot.attr(), key)
            }
            Change::Select(key) => format!("select {}", key),
            Change::Unselect(key) => format!("unselect {}", key),
            Change::ReplaceConnections { link, .. } => {
                format!("replace connections of edge '{}'", link)
            }
        }
    }

    /// 执行修改，返回逆操作
    fn apply(self, registry: &mut EntityRegistry) -> Result<Change, RegistryError> {
        match self {
            Change::Register(element) => registry.register(element).map(Change::Unregister),
            Change::Unregister(key) => registry.unregister(&key).map(Change::Register),
            Change::Rename { key, new_id } => {
                let new_key = registry.rename(&key, &new_id)?;
                Ok(Change::Rename {
                    key: new_key,
                    new_id: key.id,
                })
            }
            Change::SetAttribute { key, attr, value } => {
                let snapshot = registry.set_attribute(&key, attr, &value)?;
                Ok(Change::RestoreAttribute { key, snapshot })
            }
            Change::RestoreAttribute { key, snapshot } => {
                let current = registry.restore_attribute(&key, &snapshot)?;
                Ok(Change::RestoreAttribute {
                    key,
                    snapshot: current,
                })
            }
            Change::Select(key) => {
                let was = registry.set_selected(&key, true)?;
                Ok(if was {
                    Change::Select(key)
                } else {
                    Change::Unselect(key)
                })
            }
            Change::Unselect(key) => {
                let was = registry.set_selected(&key, false)?;
                Ok(if was {
                    Change::Select(key)
                } else {
                    Change::Unselect(key)
                })
            }
            Change::ReplaceConnections { link, connections } => {
                let previous = registry.replace_connections(&link, connections)?;
                Ok(Change::ReplaceConnections {
                    link,
                    connections: previous,
                })
            }
        }
    }
}

/// 一个撤销步骤
#[derive(Debug, Clone)]
struct UndoGroup {
    description: String,
    /// 按执行顺序排列；撤销栈中存放逆操作，重做栈中存放正向操作
    changes: Vec<Change>,
    timestamp: SystemTime,
}

impl UndoGroup {
    fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            changes: Vec::new(),
            timestamp: SystemTime::now(),
        }
    }
}

/// 历史统计
#[derive(Debug, Clone, Default)]
pub struct HistoryStats {
    /// 已执行的修改总数
    pub total_operations: usize,

    /// 可撤销步骤数
    pub undo_depth: usize,

    /// 可重做步骤数
    pub redo_depth: usize,

    /// 最后一次执行、撤销或重做的时间
    pub last_operation_time: Option<SystemTime>,
}

/// 撤销列表
#[derive(Debug)]
pub struct UndoList {
    undo_stack: VecDeque<UndoGroup>,
    redo_stack: Vec<UndoGroup>,
    open: Option<UndoGroup>,
    stats: HistoryStats,
    max_depth: usize,
}

impl Default for UndoList {
    fn default() -> Self {
        Self::new(EditorOptions::default().undo_limit)
    }
}

impl UndoList {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            open: None,
            stats: HistoryStats::default(),
            max_depth: max_depth.max(1),
        }
    }

    pub fn from_options(options: &EditorOptions) -> Self {
        Self::new(options.undo_limit)
    }

    /// 开始一个组合步骤
    pub fn begin(&mut self, description: impl Into<String>) -> Result<(), HistoryError> {
        if let Some(open) = &self.open {
            return Err(HistoryError::GroupOpen(open.description.clone()));
        }
        self.open = Some(UndoGroup::new(description));
        Ok(())
    }

    /// 结束组合步骤；空步骤直接丢弃
    pub fn end(&mut self) -> Result<(), HistoryError> {
        let group = self.open.take().ok_or(HistoryError::NoOpenGroup)?;
        if !group.changes.is_empty() {
            self.push_undo(group);
        }
        Ok(())
    }

    /// 执行修改并记录其逆操作
    ///
    /// 被拒绝的修改不进入历史。
    pub fn add(&mut self, change: Change, registry: &mut EntityRegistry) -> Result<(), HistoryError> {
        let description = change.description();
        let inverse = change.apply(registry)?;
        debug!("applied: {}", description);
        self.stats.total_operations += 1;
        self.stats.last_operation_time = Some(SystemTime::now());
        self.redo_stack.clear();
        match &mut self.open {
            Some(group) => group.changes.push(inverse),
            None => {
                let mut group = UndoGroup::new(description);
                group.changes.push(inverse);
                self.push_undo(group);
            }
        }
        self.refresh_depths();
        Ok(())
    }

    fn push_undo(&mut self, group: UndoGroup) {
        self.undo_stack.push_back(group);
        while self.undo_stack.len() > self.max_depth {
            if let Some(dropped) = self.undo_stack.pop_front() {
                debug!("undo history full, dropping '{}'", dropped.description);
            }
        }
        self.refresh_depths();
    }

    /// 撤销最近的步骤，返回其描述
    pub fn undo(&mut self, registry: &mut EntityRegistry) -> Result<String, HistoryError> {
        self.ensure_closed()?;
        let mut group = self.undo_stack.pop_back().ok_or(HistoryError::NothingToUndo)?;
        let inverses: Vec<Change> = group.changes.iter().rev().cloned().collect();
        match replay(inverses, registry) {
            Ok(mut forward) => {
                forward.reverse();
                let description = group.description.clone();
                group.changes = forward;
                group.timestamp = SystemTime::now();
                self.redo_stack.push(group);
                self.touch();
                debug!("undone: {}", description);
                Ok(description)
            }
            Err(e) => {
                self.undo_stack.push_back(group);
                Err(e)
            }
        }
    }

    /// 重做最近撤销的步骤，返回其描述
    pub fn redo(&mut self, registry: &mut EntityRegistry) -> Result<String, HistoryError> {
        self.ensure_closed()?;
        let mut group = self.redo_stack.pop().ok_or(HistoryError::NothingToRedo)?;
        match replay(group.changes.clone(), registry) {
            Ok(inverses) => {
                let description = group.description.clone();
                group.changes = inverses;
                group.timestamp = SystemTime::now();
                self.undo_stack.push_back(group);
                self.touch();
                debug!("redone: {}", description);
                Ok(description)
            }
            Err(e) => {
                self.redo_stack.push(group);
                Err(e)
            }
        }
    }

    fn ensure_closed(&self) -> Result<(), HistoryError> {
        match &self.open {
            Some(open) => Err(HistoryError::GroupOpen(open.description.clone())),
            None => Ok(()),
        }
    }

    fn touch(&mut self) {
        self.stats.last_operation_time = Some(SystemTime::now());
        self.refresh_depths();
    }

    fn refresh_depths(&mut self) {
        self.stats.undo_depth = self.undo_stack.len();
        self.stats.redo_depth = self.redo_stack.len();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|g| g.description.as_str())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|g| g.description.as_str())
    }

    /// 最近一个可撤销步骤的时间
    pub fn last_change_time(&self) -> Option<SystemTime> {
        self.undo_stack.back().map(|g| g.timestamp)
    }

    pub fn stats(&self) -> &HistoryStats {
        &self.stats
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// 清空历史；未结束的组合步骤也被丢弃
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.open = None;
        self.refresh_depths();
    }
}

/// 依次执行修改，返回各自的逆操作；中途失败时回滚已执行的部分
fn replay(changes: Vec<Change>, registry: &mut EntityRegistry) -> Result<Vec<Change>, HistoryError> {
    let mut inverses = Vec::with_capacity(changes.len());
    for change in changes {
        match change.apply(registry) {
            Ok(inverse) => inverses.push(inverse),
            Err(e) => {
                for inverse in inverses.into_iter().rev() {
                    if let Err(rollback) = inverse.apply(registry) {
                        warn!("rollback failed: {}", rollback);
                    }
                }
                return Err(e.into());
            }
        }
    }
    Ok(inverses)
}
