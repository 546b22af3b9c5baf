use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// 工作流中的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    /// 数据提取角色，决定调用哪些数据集函数
    Extraction,
    /// 评估角色，判断数据是否充分并撰写分析
    Evaluation,
    /// 建议角色，输出业务建议与图表配置
    Recommendation,
}

impl RoleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKind::Extraction => "extraction",
            RoleKind::Evaluation => "evaluation",
            RoleKind::Recommendation => "recommendation",
        }
    }
}

impl Display for RoleKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 交给推理后端的角色指令
#[derive(Debug, Clone, PartialEq)]
pub struct RoleInstructions {
    pub role: RoleKind,
    /// 系统提示词，已包含输出格式约束与语言指令
    pub system_prompt: String,
}
