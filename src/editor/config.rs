use serde::{Deserialize, Serialize};

/// 覆盖层配置
///
/// 覆盖层本身只需要知道少数几个特殊变量名，构造时显式传入，
/// 不依赖任何进程级全局状态。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// 角色显示名变量，移动版存档 ID 插入在它前面
    pub display_name_variable: String,
    /// 移动版存档 ID 变量
    pub save_id_variable: String,
    /// 标记临时属性块的变量
    pub temp_block_variable: String,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            display_name_variable: "myPlayerName".to_string(),
            save_id_variable: "mySaveId".to_string(),
            temp_block_variable: "temp".to_string(),
        }
    }
}
