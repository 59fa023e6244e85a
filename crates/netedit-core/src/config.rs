//! 编辑器选项

use serde::{Deserialize, Serialize};

/// 编辑器选项
///
/// 可以从 JSON 加载，缺省字段使用默认值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorOptions {
    /// 空间索引网格边长
    pub grid_cell_size: f64,
    /// 撤销栈最大深度
    pub undo_limit: usize,
    /// 是否创建默认车辆类型
    pub default_vehicle_types: bool,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            grid_cell_size: 100.0,
            undo_limit: 1000,
            default_vehicle_types: true,
        }
    }
}

impl EditorOptions {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn with_grid_cell_size(mut self, size: f64) -> Self {
        self.grid_cell_size = size;
        self
    }

    pub fn with_undo_limit(mut self, limit: usize) -> Self {
        self.undo_limit = limit;
        self
    }

    pub fn with_default_vehicle_types(mut self, enabled: bool) -> Self {
        self.default_vehicle_types = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json() {
        let options = EditorOptions::from_json_str(r#"{ "undo_limit": 5 }"#).unwrap();
        assert_eq!(options.undo_limit, 5);
        assert_eq!(options.grid_cell_size, 100.0);
        assert!(options.default_vehicle_types);
        assert!(EditorOptions::from_json_str("{ not json").is_err());

        let json = options.to_json_string().unwrap();
        assert_eq!(EditorOptions::from_json_str(&json).unwrap(), options);
    }
}
