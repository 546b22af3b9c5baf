use crate::config::{Config, LLMProvider, WarehouseKind};
use crate::i18n::TargetLanguage;
use crate::workflow::LaunchMode;
use anyhow::{Result, anyhow};
use clap::Parser;
use std::path::PathBuf;

/// Insight Agents - 由Rust与LLM驱动的多角色电商数据分析引擎
#[derive(Parser, Debug)]
#[command(name = "insight-agents")]
#[command(
    about = "Multi-role LLM analysis engine: turns a business question into datasets, an analysis, recommendations and chart specifications."
)]
#[command(version)]
pub struct Args {
    /// 要分析的问题
    #[arg(short, long)]
    pub query: Option<String>,

    /// 只输出快速洞察（近30天营收、最畅销商品、活跃客户），不调用LLM
    #[arg(long)]
    pub quick_insights: bool,

    /// 以JSON格式输出结果
    #[arg(long)]
    pub json: bool,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 是否启用详细日志
    #[arg(short, long)]
    pub verbose: bool,

    /// 高能效模型，优先用于常规角色推理
    #[arg(long)]
    pub model_efficient: Option<String>,

    /// 高质量模型，作为efficient失效情况下的兜底
    #[arg(long)]
    pub model_powerful: Option<String>,

    /// LLM API基地址
    #[arg(long)]
    pub llm_api_base_url: Option<String>,

    /// LLM API KEY
    #[arg(long)]
    pub llm_api_key: Option<String>,

    /// 最大tokens数
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// 温度参数
    #[arg(long)]
    pub temperature: Option<f64>,

    /// LLM Provider (openai, anthropic, deepseek, ollama)
    #[arg(long)]
    pub llm_provider: Option<String>,

    /// 提取/评估的最大轮次（1-3）
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// 单次运行的超时时间（秒）
    #[arg(long)]
    pub timeout: Option<u64>,

    /// 数据仓库HTTP网关地址，指定后使用http数据源
    #[arg(long)]
    pub warehouse_url: Option<String>,

    /// 示例数据的随机种子
    #[arg(long)]
    pub seed: Option<u64>,

    /// 目标语言 (en, zh, ja, de, fr)
    #[arg(long)]
    pub target_language: Option<String>,
}

impl Args {
    /// 将CLI参数转换为配置
    pub fn into_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;

        // 覆盖LLM配置
        if let Some(provider_str) = &self.llm_provider {
            if let Ok(provider) = provider_str.parse::<LLMProvider>() {
                config.llm.provider = provider;
            } else {
                eprintln!(
                    "⚠️ 警告: 未知的provider: {}，使用默认provider",
                    provider_str
                );
            }
        }
        if let Some(llm_api_base_url) = &self.llm_api_base_url {
            config.llm.api_base_url = llm_api_base_url.clone();
        }
        if let Some(llm_api_key) = &self.llm_api_key {
            config.llm.api_key = llm_api_key.clone();
        }
        if let Some(model_efficient) = &self.model_efficient {
            config.llm.model_efficient = model_efficient.clone();
        }
        if let Some(model_powerful) = &self.model_powerful {
            config.llm.model_powerful = model_powerful.clone();
        }
        if let Some(max_tokens) = self.max_tokens {
            config.llm.max_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            config.llm.temperature = temperature;
        }

        // 工作流配置
        if let Some(max_iterations) = self.max_iterations {
            config.workflow.max_iterations = max_iterations;
        }
        if let Some(timeout) = self.timeout {
            config.workflow.run_timeout_seconds = timeout;
        }

        // 数据仓库配置
        if let Some(url) = &self.warehouse_url {
            config.warehouse.kind = WarehouseKind::Http;
            config.warehouse.base_url = url.clone();
        }
        if let Some(seed) = self.seed {
            config.warehouse.seed = seed;
        }

        // 目标语言配置
        if let Some(target_language_str) = &self.target_language {
            if let Ok(target_language) = target_language_str.parse::<TargetLanguage>() {
                config.target_language = target_language;
            } else {
                eprintln!(
                    "⚠️ 警告: 未知的目标语言: {}，使用默认语言 (English)",
                    target_language_str
                );
            }
        }

        config.verbose = config.verbose || self.verbose;

        Ok(config)
    }

    /// 根据参数确定运行方式
    pub fn launch_mode(&self) -> Result<LaunchMode> {
        if self.quick_insights {
            return Ok(LaunchMode::QuickInsights { json: self.json });
        }

        match &self.query {
            Some(query) if !query.trim().is_empty() => Ok(LaunchMode::Analyze {
                query: query.clone(),
                json: self.json,
            }),
            _ => Err(anyhow!(
                "请通过 --query 提供要分析的问题，或使用 --quick-insights"
            )),
        }
    }
}
