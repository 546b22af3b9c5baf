//! 数据集提供方：固定函数目录及其实现

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::config::{WarehouseConfig, WarehouseKind};
use crate::error::WorkflowError;

pub mod catalog;
pub mod http;
pub mod sample;

pub use catalog::{DatasetCall, DatasetFunction, ParamKind};
pub use http::HttpWarehouse;
pub use sample::SampleWarehouse;

/// 数据集提供方接口，需支持多个运行并发调用
#[async_trait]
pub trait DatasetProvider: Send + Sync {
    /// 执行一次数据集调用，失败时返回 `WorkflowError::DataUnavailable`
    async fn call(&self, call: &DatasetCall) -> Result<Value, WorkflowError>;
}

/// 根据配置创建数据集提供方
pub fn build_provider(config: &WarehouseConfig) -> Result<Arc<dyn DatasetProvider>> {
    match config.kind {
        WarehouseKind::Sample => Ok(Arc::new(SampleWarehouse::new(config.seed))),
        WarehouseKind::Http => Ok(Arc::new(HttpWarehouse::new(config)?)),
    }
}
