use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Value, json};

use insight_agents::config::Config;
use insight_agents::types::{ChartKind, RoleKind, RunStatus};
use insight_agents::warehouse::{DatasetCall, DatasetFunction};
use insight_agents::{
    DatasetProvider, SampleWarehouse, ScriptedInvoker, Workflow, WorkflowContext, WorkflowError,
};

/// 固定种子与基准日期的示例仓库
fn sample_warehouse() -> SampleWarehouse {
    SampleWarehouse::new(7).with_reference_date(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap())
}

fn build_workflow(invoker: ScriptedInvoker, provider: Arc<dyn DatasetProvider>) -> Workflow {
    let context = WorkflowContext::with_collaborators(Config::default(), Arc::new(invoker), provider);
    Workflow::new(context)
}

/// 对指定数据集返回错误的仓库
struct FlakyWarehouse {
    inner: SampleWarehouse,
    failing: DatasetFunction,
}

#[async_trait]
impl DatasetProvider for FlakyWarehouse {
    async fn call(&self, call: &DatasetCall) -> Result<Value, WorkflowError> {
        if call.function == self.failing {
            Err(WorkflowError::data_unavailable(call.key(), "503 from warehouse"))
        } else {
            self.inner.call(call).await
        }
    }
}

#[tokio::test]
async fn test_sales_trend_scenario() {
    let invoker = ScriptedInvoker::new()
        .reply_json(
            RoleKind::Extraction,
            json!({"calls": [{"function": "get_sales_trend", "params": {"days": 30}}]}),
        )
        .reply_json(
            RoleKind::Evaluation,
            json!({"analysis": "Daily revenue is stable with weekend peaks.", "needs_more_data": false}),
        )
        .reply_json(
            RoleKind::Recommendation,
            json!({
                "recommendations": [
                    "Schedule promotions on Fridays",
                    "Add weekend fulfilment capacity",
                    "Track weekday conversion"
                ],
                "charts": [{
                    "type": "line",
                    "title": "Daily Revenue",
                    "data_key": "sales_trend",
                    "x_field": "date",
                    "y_fields": ["revenue"]
                }]
            }),
        );

    let envelope = build_workflow(invoker, Arc::new(sample_warehouse()))
        .run("Show me sales trends with visualizations")
        .await;

    assert_eq!(envelope.status, RunStatus::Completed);
    assert_eq!(envelope.iteration_count, 1);
    assert!(envelope.data.contains_key("sales_trend"));
    assert_eq!(envelope.charts.len(), 1);
    assert_eq!(envelope.charts[0].kind(), ChartKind::Line);
    assert_eq!(envelope.charts[0].data_key(), "sales_trend");
    assert!(envelope.recommendations.contains("3. Track weekday conversion"));

    let serialized = serde_json::to_value(&envelope).unwrap();
    assert_eq!(serialized["status"], "completed");
    assert_eq!(serialized["charts"][0]["type"], "line");
    assert!(serialized.get("reason").is_none());
}

#[tokio::test]
async fn test_sales_trend_without_chart_proposals_uses_policy() {
    let invoker = ScriptedInvoker::new()
        .reply_json(
            RoleKind::Extraction,
            json!({"calls": [{"function": "get_sales_trend"}]}),
        )
        .reply_json(RoleKind::Evaluation, json!({"analysis": "ok", "needs_more_data": false}))
        .reply(RoleKind::Recommendation, "1. Keep weekend stock levels high.");

    let envelope = build_workflow(invoker, Arc::new(sample_warehouse()))
        .run("Show me sales trends with visualizations")
        .await;

    assert_eq!(envelope.charts.len(), 1);
    assert_eq!(envelope.charts[0].kind(), ChartKind::Line);
    assert_eq!(envelope.charts[0].referenced_fields(), vec!["date", "revenue"]);
}

#[tokio::test]
async fn test_follow_up_request_is_merged_alongside_existing_data() {
    let invoker = ScriptedInvoker::new()
        .reply_json(
            RoleKind::Extraction,
            json!({"calls": [{"function": "get_sales_trend"}]}),
        )
        .reply_json(
            RoleKind::Evaluation,
            json!({
                "analysis": "Trend known, products unknown.",
                "needs_more_data": true,
                "data_requests": ["top products by revenue"]
            }),
        )
        .reply_json(
            RoleKind::Evaluation,
            json!({"analysis": "Two products drive most revenue.", "needs_more_data": false}),
        )
        .reply_json(RoleKind::Recommendation, json!({"recommendations": "Bundle the leaders."}));

    let envelope = build_workflow(invoker, Arc::new(sample_warehouse()))
        .run("Which products should we push?")
        .await;

    assert_eq!(envelope.status, RunStatus::Completed);
    assert_eq!(envelope.iteration_count, 2);
    assert!(envelope.data.contains_key("sales_trend"));
    assert!(envelope.data.contains_key("top_products"));
    assert!(envelope.trace[1].fetched_keys.contains(&"top_products".to_string()));
    assert_eq!(envelope.analysis, "Two products drive most revenue.");
}

#[tokio::test]
async fn test_always_insufficient_terminates_at_cap_with_monotonic_data() {
    let invoker = ScriptedInvoker::new()
        .reply_json(
            RoleKind::Extraction,
            json!({"calls": [{"function": "get_customer_segments"}]}),
        )
        .reply_json(
            RoleKind::Evaluation,
            json!({
                "analysis": "Still unsure.",
                "needs_more_data": true,
                "data_requests": ["revenue by category", "customer lifetime value for top 5"]
            }),
        )
        .reply_json(RoleKind::Recommendation, json!({"recommendations": ["Gather feedback"]}));

    let envelope = build_workflow(invoker, Arc::new(sample_warehouse()))
        .run("What is going on with our customers?")
        .await;

    assert_eq!(envelope.status, RunStatus::Completed);
    assert_eq!(envelope.iteration_count, 3);
    assert_eq!(envelope.trace.len(), 3);
    assert!(!envelope.recommendations.is_empty());

    let totals: Vec<usize> = envelope.trace.iter().map(|t| t.total_keys).collect();
    assert!(totals.windows(2).all(|w| w[0] <= w[1]), "{:?}", totals);
    assert_eq!(*totals.last().unwrap(), envelope.data.len());

    for chart in &envelope.charts {
        assert!(envelope.data.contains_key(chart.data_key()));
    }
}

#[tokio::test]
async fn test_empty_extraction_still_completes() {
    let invoker = ScriptedInvoker::new()
        .reply_json(RoleKind::Extraction, json!({"calls": []}))
        .reply_json(RoleKind::Evaluation, json!({"analysis": "", "needs_more_data": false}))
        .reply(RoleKind::Recommendation, "Collect order data before deciding.");

    let envelope = build_workflow(invoker, Arc::new(sample_warehouse()))
        .run("Tell me something")
        .await;

    assert_eq!(envelope.status, RunStatus::Completed);
    assert!(envelope.data.is_empty());
    assert!(envelope.charts.is_empty());
    assert!(!envelope.recommendations.is_empty());
    assert!(envelope.iteration_count <= 3);
}

#[tokio::test]
async fn test_provider_failure_leaves_key_absent() {
    let invoker = ScriptedInvoker::new()
        .reply_json(
            RoleKind::Extraction,
            json!({"calls": [
                {"function": "get_sales_trend"},
                {"function": "get_revenue_by_category"}
            ]}),
        )
        .reply_json(RoleKind::Evaluation, json!({"analysis": "ok", "needs_more_data": false}))
        .reply_json(
            RoleKind::Recommendation,
            json!({
                "recommendations": ["Diversify categories"],
                "charts": [
                    {"type": "pie", "title": "Category Share", "data_key": "revenue_by_category"},
                    {"type": "line", "title": "Trend", "data_key": "sales_trend"}
                ]
            }),
        );
    let provider = FlakyWarehouse {
        inner: sample_warehouse(),
        failing: DatasetFunction::RevenueByCategory,
    };

    let envelope = build_workflow(invoker, Arc::new(provider))
        .run("Where does revenue come from?")
        .await;

    assert_eq!(envelope.status, RunStatus::Completed);
    assert!(!envelope.data.contains_key("revenue_by_category"));
    assert!(envelope.data.contains_key("sales_trend"));
    assert!(
        envelope
            .charts
            .iter()
            .all(|c| envelope.data.contains_key(c.data_key()))
    );
    assert!(
        envelope
            .issues
            .iter()
            .any(|i| i.key.as_deref() == Some("revenue_by_category"))
    );
}

#[tokio::test]
async fn test_backend_outage_fails_run() {
    let invoker = ScriptedInvoker::new().fail(RoleKind::Extraction, "connection refused");

    let envelope = build_workflow(invoker, Arc::new(sample_warehouse()))
        .run("Anything")
        .await;

    assert_eq!(envelope.status, RunStatus::Failed);
    assert!(envelope.reason.as_deref().unwrap().contains("connection refused"));
    assert!(envelope.data.is_empty());
    assert_eq!(envelope.iteration_count, 0);
}

#[tokio::test]
async fn test_recommendation_outage_fails_run_after_evaluation() {
    let invoker = ScriptedInvoker::new()
        .reply_json(
            RoleKind::Extraction,
            json!({"calls": [{"function": "get_sales_trend", "params": {"days": 14}}]}),
        )
        .reply_json(
            RoleKind::Evaluation,
            json!({"analysis": "Revenue is flat.", "needs_more_data": false}),
        )
        .fail(RoleKind::Recommendation, "read timed out");

    let envelope = build_workflow(invoker, Arc::new(sample_warehouse()))
        .run("Is revenue flat?")
        .await;

    assert_eq!(envelope.status, RunStatus::Failed);
    assert!(envelope.reason.as_deref().unwrap().contains("read timed out"));
    assert!(envelope.data.is_empty());
    assert!(envelope.analysis.is_empty());
    assert!(envelope.charts.is_empty());
    assert_eq!(envelope.iteration_count, 0);
}

#[tokio::test]
async fn test_concurrent_runs_do_not_share_state() {
    let invoker = Arc::new(
        ScriptedInvoker::new()
            .reply_json(
                RoleKind::Extraction,
                json!({"calls": [{"function": "get_top_products", "params": {"limit": 3}}]}),
            )
            .reply_json(RoleKind::Evaluation, json!({"analysis": "ok", "needs_more_data": false}))
            .reply_json(RoleKind::Recommendation, json!({"recommendations": ["x"], "charts": []})),
    );
    let context = WorkflowContext::with_collaborators(
        Config::default(),
        invoker.clone(),
        Arc::new(sample_warehouse()),
    );
    let workflow = Arc::new(Workflow::new(context));

    let handles: Vec<_> = (0..4)
        .map(|idx| {
            let workflow = workflow.clone();
            tokio::spawn(async move { workflow.run(&format!("query {}", idx)).await })
        })
        .collect();

    let mut run_ids = Vec::new();
    for handle in handles {
        let envelope = handle.await.unwrap();
        assert_eq!(envelope.status, RunStatus::Completed);
        assert_eq!(envelope.data.len(), 1);
        assert_eq!(envelope.data["top_products"]["top_products"].as_array().unwrap().len(), 3);
        run_ids.push(envelope.run_id);
    }
    run_ids.sort();
    run_ids.dedup();
    assert_eq!(run_ids.len(), 4);
    assert_eq!(invoker.call_count(RoleKind::Recommendation), 4);
}
