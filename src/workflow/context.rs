use std::sync::Arc;

use crate::{config::Config, llm::RoleInvoker, warehouse::DatasetProvider};

/// 一次或多次运行共享的协作方，运行间不共享任何状态
#[derive(Clone)]
pub struct WorkflowContext {
    /// 角色调用器，用于与推理后端通信
    pub invoker: Arc<dyn RoleInvoker>,
    /// 数据集提供方
    pub provider: Arc<dyn DatasetProvider>,
    /// 配置
    pub config: Config,
}

impl WorkflowContext {
    /// 使用给定的调用器与数据集提供方组装上下文
    pub fn with_collaborators(
        config: Config,
        invoker: Arc<dyn RoleInvoker>,
        provider: Arc<dyn DatasetProvider>,
    ) -> Self {
        Self {
            invoker,
            provider,
            config,
        }
    }
}
