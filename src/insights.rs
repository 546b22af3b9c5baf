//! 快速洞察：直接调用数据集提供方，不经过角色工作流

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WorkflowError;
use crate::warehouse::{DatasetCall, DatasetFunction, DatasetProvider};

/// 单条快速洞察
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickInsight {
    pub metric: String,
    pub value: String,
    pub trend: String,
}

/// 近 30 天营收、最畅销商品、活跃客户数
pub async fn quick_insights(
    provider: &dyn DatasetProvider,
) -> Result<Vec<QuickInsight>, WorkflowError> {
    let sales = fetch(provider, DatasetCall::new(DatasetFunction::SalesMetrics).with_argument(30))
        .await?;
    let products =
        fetch(provider, DatasetCall::new(DatasetFunction::TopProducts).with_argument(3)).await?;
    let segments = fetch(provider, DatasetCall::new(DatasetFunction::CustomerSegments)).await?;

    let top_product = products["top_products"]
        .as_array()
        .and_then(|rows| rows.first());
    let (top_name, top_revenue) = match top_product {
        Some(row) => (
            row["product_name"].as_str().unwrap_or("N/A").to_string(),
            format_currency(row["total_revenue"].as_f64().unwrap_or_default()),
        ),
        None => ("N/A".to_string(), "N/A".to_string()),
    };

    let active_customers: u64 = segments["customer_segments"]
        .as_array()
        .map(|rows| rows.iter().filter_map(|r| r["customer_count"].as_u64()).sum())
        .unwrap_or_default();

    Ok(vec![
        QuickInsight {
            metric: "Total Revenue (30 days)".to_string(),
            value: format_currency(sales["total_revenue"].as_f64().unwrap_or_default()),
            trend: format!("{} orders", sales["total_orders"].as_u64().unwrap_or_default()),
        },
        QuickInsight {
            metric: "Top Product".to_string(),
            value: top_name,
            trend: top_revenue,
        },
        QuickInsight {
            metric: "Active Customers".to_string(),
            value: active_customers.to_string(),
            trend: "Across all segments".to_string(),
        },
    ])
}

async fn fetch(provider: &dyn DatasetProvider, call: DatasetCall) -> Result<Value, WorkflowError> {
    let value = provider.call(&call).await?;
    call.function
        .validate_result(&value)
        .map_err(|reason| WorkflowError::data_unavailable(call.key(), reason))?;
    Ok(value)
}

/// 12345.678 -> $12,345.68
pub fn format_currency(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();

    let mut grouped = String::new();
    for (idx, digit) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}
