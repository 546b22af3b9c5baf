use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::i18n::TargetLanguage;

/// 工作流允许的最大提取/评估轮次
pub const MAX_ITERATIONS: usize = 3;

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "insight-agents.toml";

/// LLM Provider类型
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum LLMProvider {
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "anthropic")]
    #[default]
    Anthropic,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "ollama")]
    Ollama,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::DeepSeek => write!(f, "deepseek"),
            LLMProvider::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LLMProvider::OpenAI),
            "anthropic" | "claude" => Ok(LLMProvider::Anthropic),
            "deepseek" => Ok(LLMProvider::DeepSeek),
            "ollama" => Ok(LLMProvider::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// 应用程序配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    /// 分析与建议的输出语言
    pub target_language: TargetLanguage,

    /// 是否启用详细日志
    pub verbose: bool,

    /// LLM模型配置
    pub llm: LLMConfig,

    /// 工作流配置
    pub workflow: WorkflowConfig,

    /// 数据仓库配置
    pub warehouse: WarehouseConfig,
}

/// LLM模型配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LLMConfig {
    /// LLM Provider类型
    pub provider: LLMProvider,

    /// LLM API KEY
    pub api_key: String,

    /// LLM API基地址
    pub api_base_url: String,

    /// 高能效模型，用于常规的角色决策
    pub model_efficient: String,

    /// 高质量模型，用于上下文较大的角色决策，以及作为efficient失效情况下的兜底
    pub model_powerful: String,

    /// 最大tokens
    pub max_tokens: u32,

    /// 温度
    pub temperature: f64,

    /// 重试次数
    pub retry_attempts: u32,

    /// 重试间隔（毫秒）
    pub retry_delay_ms: u64,

    /// 单次调用超时时间（秒）
    pub timeout_seconds: u64,
}

/// 工作流配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct WorkflowConfig {
    /// 提取/评估最大轮次，不会超过 MAX_ITERATIONS
    pub max_iterations: usize,

    /// 整个运行的超时时间（秒）
    pub run_timeout_seconds: u64,

    /// 提示词中每个数据集展示的最大行数
    pub data_preview_rows: usize,
}

/// 数据仓库类型
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WarehouseKind {
    /// 内置的示例数据
    #[default]
    Sample,
    /// 通过HTTP网关访问的数据仓库
    Http,
}

/// 数据仓库配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct WarehouseConfig {
    pub kind: WarehouseKind,

    /// HTTP网关基地址，仅 http 类型使用
    pub base_url: String,

    /// 示例数据的随机种子
    pub seed: u64,

    /// 单次数据集请求超时时间（秒）
    pub timeout_seconds: u64,
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file: {:?}", path))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// 按显式路径或默认位置加载配置，都不存在时使用默认值
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let default_path = std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            Self::from_file(&default_path)
        } else {
            Ok(Config::default())
        }
    }
}

impl WorkflowConfig {
    /// 实际生效的轮次上限，落在 1..=MAX_ITERATIONS
    pub fn effective_max_iterations(&self) -> usize {
        self.max_iterations.clamp(1, MAX_ITERATIONS)
    }

    /// 实际生效的运行超时，至少 1 秒
    pub fn effective_run_timeout_seconds(&self) -> u64 {
        self.run_timeout_seconds.max(1)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_language: TargetLanguage::default(),
            verbose: false,
            llm: LLMConfig::default(),
            workflow: WorkflowConfig::default(),
            warehouse: WarehouseConfig::default(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::default(),
            api_key: std::env::var("INSIGHT_LLM_API_KEY").unwrap_or_default(),
            api_base_url: String::from("https://api.anthropic.com"),
            model_efficient: String::from("claude-sonnet-4-20250514"),
            model_powerful: String::from("claude-sonnet-4-20250514"),
            max_tokens: 8192,
            temperature: 0.1,
            retry_attempts: 3,
            retry_delay_ms: 2000,
            timeout_seconds: 120,
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            run_timeout_seconds: 300,
            data_preview_rows: 20,
        }
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            kind: WarehouseKind::default(),
            base_url: String::new(),
            seed: 42,
            timeout_seconds: 30,
        }
    }
}
