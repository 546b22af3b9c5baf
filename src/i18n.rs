use serde::{Deserialize, Serialize};

/// 目标语言类型
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum TargetLanguage {
    #[serde(rename = "en")]
    #[default]
    English,
    #[serde(rename = "zh")]
    Chinese,
    #[serde(rename = "ja")]
    Japanese,
    #[serde(rename = "de")]
    German,
    #[serde(rename = "fr")]
    French,
}

impl std::fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetLanguage::English => write!(f, "en"),
            TargetLanguage::Chinese => write!(f, "zh"),
            TargetLanguage::Japanese => write!(f, "ja"),
            TargetLanguage::German => write!(f, "de"),
            TargetLanguage::French => write!(f, "fr"),
        }
    }
}

impl std::str::FromStr for TargetLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "en" | "english" | "英文" => Ok(TargetLanguage::English),
            "zh" | "chinese" | "中文" => Ok(TargetLanguage::Chinese),
            "ja" | "japanese" | "日本語" | "日文" => Ok(TargetLanguage::Japanese),
            "de" | "german" | "deutsch" | "德文" => Ok(TargetLanguage::German),
            "fr" | "french" | "français" | "法文" => Ok(TargetLanguage::French),
            _ => Err(format!("Unknown target language: {}", s)),
        }
    }
}

impl TargetLanguage {
    /// 获取语言的描述性名称
    pub fn display_name(&self) -> &'static str {
        match self {
            TargetLanguage::English => "English",
            TargetLanguage::Chinese => "中文",
            TargetLanguage::Japanese => "日本語",
            TargetLanguage::German => "Deutsch",
            TargetLanguage::French => "Français",
        }
    }

    /// 获取语言的提示词指令，只约束自由文本，JSON 字段名保持英文
    pub fn prompt_instruction(&self) -> &'static str {
        match self {
            TargetLanguage::English => {
                "Write all free-text values (analysis, recommendations, chart titles and descriptions) in clear, professional English."
            }
            TargetLanguage::Chinese => {
                "请使用中文撰写所有自由文本内容（分析、建议、图表标题与说明），JSON 字段名保持英文不变。"
            }
            TargetLanguage::Japanese => {
                "分析・提案・グラフのタイトルと説明などの自由記述はすべて日本語で記述してください。JSON のフィールド名は英語のままにしてください。"
            }
            TargetLanguage::German => {
                "Bitte verfassen Sie alle Freitexte (Analyse, Empfehlungen, Diagrammtitel und -beschreibungen) auf Deutsch. JSON-Feldnamen bleiben auf Englisch."
            }
            TargetLanguage::French => {
                "Veuillez rédiger tous les textes libres (analyse, recommandations, titres et descriptions des graphiques) en français. Les noms de champs JSON restent en anglais."
            }
        }
    }
}
