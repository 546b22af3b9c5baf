#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::{Value, json};

    use crate::config::Config;
    use crate::error::WorkflowError;
    use crate::i18n::TargetLanguage;
    use crate::llm::ScriptedInvoker;
    use crate::types::{IssueKind, RoleKind, RunStatus};
    use crate::warehouse::{DatasetCall, DatasetFunction, DatasetProvider, SampleWarehouse};
    use crate::workflow::{Phase, Workflow, WorkflowContext, transition};

    struct PartialOutage {
        inner: SampleWarehouse,
        down: DatasetFunction,
    }

    #[async_trait]
    impl DatasetProvider for PartialOutage {
        async fn call(&self, call: &DatasetCall) -> Result<Value, WorkflowError> {
            if call.function == self.down {
                return Err(WorkflowError::data_unavailable(call.key(), "connection reset"));
            }
            self.inner.call(call).await
        }
    }

    fn warehouse() -> SampleWarehouse {
        SampleWarehouse::new(42).with_reference_date(NaiveDate::from_ymd_opt(2025, 3, 15).unwrap())
    }

    fn create_test_workflow(
        invoker: ScriptedInvoker,
        provider: Arc<dyn DatasetProvider>,
        config: Config,
    ) -> (Workflow, Arc<ScriptedInvoker>) {
        let invoker = Arc::new(invoker);
        let context = WorkflowContext::with_collaborators(config, invoker.clone(), provider);
        (Workflow::new(context), invoker)
    }

    fn trend_extraction() -> Value {
        json!({"calls": [{"function": "get_sales_trend", "params": {"days": 7}}]})
    }

    fn sufficient() -> Value {
        json!({"analysis": "Revenue peaks on weekends.", "needs_more_data": false})
    }

    fn insufficient() -> Value {
        json!({
            "analysis": "Only the trend is known.",
            "needs_more_data": true,
            "data_requests": ["monthly comparison for 3 months"]
        })
    }

    fn recommendation() -> Value {
        json!({"recommendations": ["Staff up for weekends"], "charts": []})
    }

    #[test]
    fn test_transition_table() {
        assert_eq!(transition(Phase::Extract, true, 0, 3), Phase::Evaluate);
        assert_eq!(transition(Phase::Evaluate, true, 1, 3), Phase::Extract);
        assert_eq!(transition(Phase::Evaluate, true, 3, 3), Phase::Recommend);
        assert_eq!(transition(Phase::Evaluate, false, 1, 3), Phase::Recommend);
        assert_eq!(transition(Phase::Recommend, true, 1, 3), Phase::Done);
        assert_eq!(transition(Phase::Done, false, 1, 3), Phase::Done);
    }

    #[tokio::test]
    async fn test_sufficient_after_first_iteration() {
        let invoker = ScriptedInvoker::new()
            .reply_json(RoleKind::Extraction, trend_extraction())
            .reply_json(RoleKind::Evaluation, sufficient())
            .reply_json(RoleKind::Recommendation, recommendation());
        let (workflow, invoker) =
            create_test_workflow(invoker, Arc::new(warehouse()), Config::default());

        let state = workflow.execute("How did sales do this week?").await.unwrap();

        assert_eq!(state.iteration_count(), 1);
        assert_eq!(state.data().keys().collect::<Vec<_>>(), vec!["sales_trend"]);
        assert_eq!(state.data()["sales_trend"]["sales_trend"].as_array().unwrap().len(), 7);
        assert_eq!(state.analysis(), "Revenue peaks on weekends.");
        assert_eq!(state.recommendations(), "1. Staff up for weekends");
        assert!(state.issues().is_empty());
        assert_eq!(invoker.call_count(RoleKind::Extraction), 1);
        assert_eq!(invoker.call_count(RoleKind::Evaluation), 1);
        assert_eq!(invoker.call_count(RoleKind::Recommendation), 1);
    }

    #[tokio::test]
    async fn test_always_insufficient_stops_at_cap() {
        let invoker = ScriptedInvoker::new()
            .reply_json(RoleKind::Extraction, trend_extraction())
            .reply_json(RoleKind::Evaluation, insufficient())
            .reply_json(RoleKind::Recommendation, recommendation());
        let (workflow, invoker) =
            create_test_workflow(invoker, Arc::new(warehouse()), Config::default());

        let state = workflow.execute("Explain everything").await.unwrap();

        assert_eq!(state.iteration_count(), 3);
        assert_eq!(state.trace().len(), 3);
        assert_eq!(invoker.call_count(RoleKind::Extraction), 3);
        assert_eq!(invoker.call_count(RoleKind::Recommendation), 1);
        assert!(state.data().contains_key("monthly_comparison"));

        let cap_issues: Vec<_> = state
            .issues()
            .iter()
            .filter(|i| i.kind == IssueKind::IterationCapReached)
            .collect();
        assert_eq!(cap_issues.len(), 1);
        assert_eq!(cap_issues[0].iteration, 3);
    }

    #[tokio::test]
    async fn test_configured_cap_is_clamped() {
        let scripted = || {
            ScriptedInvoker::new()
                .reply_json(RoleKind::Extraction, trend_extraction())
                .reply_json(RoleKind::Evaluation, insufficient())
                .reply_json(RoleKind::Recommendation, recommendation())
        };

        let mut config = Config::default();
        config.workflow.max_iterations = 1;
        let (workflow, _) = create_test_workflow(scripted(), Arc::new(warehouse()), config);
        assert_eq!(workflow.execute("q").await.unwrap().iteration_count(), 1);

        let mut config = Config::default();
        config.workflow.max_iterations = 10;
        let (workflow, _) = create_test_workflow(scripted(), Arc::new(warehouse()), config);
        assert_eq!(workflow.execute("q").await.unwrap().iteration_count(), 3);
    }

    #[tokio::test]
    async fn test_second_iteration_sees_data_requests() {
        let invoker = ScriptedInvoker::new()
            .reply_json(RoleKind::Extraction, trend_extraction())
            .reply_json(RoleKind::Evaluation, insufficient())
            .reply_json(RoleKind::Evaluation, sufficient())
            .reply_json(RoleKind::Recommendation, recommendation());
        let (workflow, invoker) =
            create_test_workflow(invoker, Arc::new(warehouse()), Config::default());

        let state = workflow.execute("Compare months").await.unwrap();
        assert_eq!(state.iteration_count(), 2);
        assert!(state.data_requests().is_empty());

        let extraction_contexts: Vec<String> = invoker
            .calls()
            .into_iter()
            .filter(|c| c.role == RoleKind::Extraction)
            .map(|c| c.context)
            .collect();
        assert!(!extraction_contexts[0].contains("Additional data requested"));
        assert!(extraction_contexts[1].contains("- monthly comparison for 3 months"));

        assert_eq!(state.trace()[1].fetched_keys.len(), 2);
        assert_eq!(state.trace()[1].total_keys, 2);
    }

    #[tokio::test]
    async fn test_provider_outage_is_absorbed() {
        let invoker = ScriptedInvoker::new()
            .reply_json(
                RoleKind::Extraction,
                json!({"calls": [
                    {"function": "get_sales_trend"},
                    {"function": "get_top_products", "params": {"limit": 5}}
                ]}),
            )
            .reply_json(RoleKind::Evaluation, sufficient())
            .reply_json(
                RoleKind::Recommendation,
                json!({
                    "recommendations": "Promote the weekend.",
                    "charts": [
                        {"type": "line", "title": "Trend", "data_key": "sales_trend"},
                        {"type": "horizontal_bar", "title": "Top", "data_key": "top_products"}
                    ]
                }),
            );
        let provider = PartialOutage {
            inner: warehouse(),
            down: DatasetFunction::TopProducts,
        };
        let (workflow, _) = create_test_workflow(invoker, Arc::new(provider), Config::default());

        let envelope = workflow.run("Trend and best sellers").await;

        assert_eq!(envelope.status, RunStatus::Completed);
        assert!(!envelope.data.contains_key("top_products"));
        assert!(envelope.charts.iter().all(|c| c.data_key() != "top_products"));
        assert_eq!(envelope.charts.len(), 1);
        assert!(envelope.issues.iter().any(|i| {
            i.kind == IssueKind::DataUnavailable && i.key.as_deref() == Some("top_products")
        }));
    }

    #[tokio::test]
    async fn test_backend_failure_fails_the_run_without_partial_data() {
        let invoker = ScriptedInvoker::new()
            .reply_json(RoleKind::Extraction, trend_extraction())
            .fail(RoleKind::Evaluation, "upstream 529");
        let (workflow, _) = create_test_workflow(invoker, Arc::new(warehouse()), Config::default());

        let err = workflow.execute("q").await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::ReasoningBackend { role: RoleKind::Evaluation, .. }
        ));

        let envelope = workflow.run("q").await;
        assert_eq!(envelope.status, RunStatus::Failed);
        assert!(envelope.reason.unwrap().contains("upstream 529"));
        assert!(envelope.data.is_empty());
        assert!(envelope.analysis.is_empty());
        assert!(envelope.charts.is_empty());
    }

    struct Stalled;

    #[async_trait]
    impl DatasetProvider for Stalled {
        async fn call(&self, _call: &DatasetCall) -> Result<Value, WorkflowError> {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            Ok(json!({}))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_timeout_yields_failed_envelope() {
        let invoker = ScriptedInvoker::new()
            .reply_json(RoleKind::Extraction, trend_extraction())
            .reply_json(RoleKind::Evaluation, sufficient())
            .reply_json(RoleKind::Recommendation, recommendation());
        let mut config = Config::default();
        config.workflow.run_timeout_seconds = 5;
        let (workflow, invoker) = create_test_workflow(invoker, Arc::new(Stalled), config);

        let envelope = workflow.run("Slow warehouse").await;

        assert_eq!(envelope.status, RunStatus::Failed);
        assert_eq!(envelope.reason.as_deref(), Some("workflow run timed out after 5s"));
        assert!(envelope.data.is_empty());
        assert_eq!(invoker.call_count(RoleKind::Evaluation), 0);
    }

    #[tokio::test]
    async fn test_recommendation_backend_failure_discards_earlier_work() {
        let invoker = ScriptedInvoker::new()
            .reply_json(RoleKind::Extraction, trend_extraction())
            .reply_json(RoleKind::Evaluation, sufficient())
            .fail(RoleKind::Recommendation, "model overloaded");
        let (workflow, invoker) =
            create_test_workflow(invoker, Arc::new(warehouse()), Config::default());

        let envelope = workflow.run("How did sales do this week?").await;

        assert_eq!(invoker.call_count(RoleKind::Evaluation), 1);
        assert_eq!(invoker.call_count(RoleKind::Recommendation), 1);
        assert_eq!(envelope.status, RunStatus::Failed);
        assert!(envelope.reason.as_deref().unwrap().contains("recommendation"));
        assert!(envelope.reason.as_deref().unwrap().contains("model overloaded"));
        assert!(envelope.data.is_empty());
        assert!(envelope.analysis.is_empty());
        assert!(envelope.recommendations.is_empty());
        assert!(envelope.trace.is_empty());
        assert_eq!(envelope.iteration_count, 0);
    }

    #[tokio::test]
    async fn test_zero_run_timeout_still_allows_the_run() {
        let invoker = ScriptedInvoker::new()
            .reply_json(RoleKind::Extraction, trend_extraction())
            .reply_json(RoleKind::Evaluation, sufficient())
            .reply_json(RoleKind::Recommendation, recommendation());
        let mut config = Config::default();
        config.workflow.run_timeout_seconds = 0;
        let (workflow, _) = create_test_workflow(invoker, Arc::new(warehouse()), config);

        let envelope = workflow.run("How did sales do this week?").await;

        assert_eq!(envelope.status, RunStatus::Completed);
        assert_eq!(envelope.iteration_count, 1);
    }

    #[tokio::test]
    async fn test_blank_query_is_rejected() {
        let (workflow, invoker) =
            create_test_workflow(ScriptedInvoker::new(), Arc::new(warehouse()), Config::default());

        let envelope = workflow.run("   ").await;
        assert_eq!(envelope.status, RunStatus::Failed);
        assert!(invoker.calls().is_empty());
    }

    #[tokio::test]
    async fn test_language_instruction_only_for_writing_roles() {
        let invoker = ScriptedInvoker::new()
            .reply_json(RoleKind::Extraction, trend_extraction())
            .reply_json(RoleKind::Evaluation, sufficient())
            .reply_json(RoleKind::Recommendation, recommendation());
        let config = Config {
            target_language: TargetLanguage::German,
            ..Default::default()
        };
        let (workflow, invoker) = create_test_workflow(invoker, Arc::new(warehouse()), config);
        workflow.execute("Wie laufen die Verkäufe?").await.unwrap();

        let german = TargetLanguage::German.prompt_instruction();
        for call in invoker.calls() {
            let localized = call.system_prompt.contains(german);
            assert_eq!(localized, call.role != RoleKind::Extraction, "{}", call.role);
            assert!(call.system_prompt.contains("JSON schema"));
        }
    }
}
