// SPDX-License-Identifier: MIT

//! Step functions
//!
//! A step reads the state and returns only the fields it changed. Steps never
//! fail: gateway faults and missing files are written into the update as
//! markers so the run keeps going.

use crate::adk::gateway::ToolGateway;
use crate::redraft::error::EngineError;
use crate::redraft::workflow::graph::StepId;
use crate::redraft::workflow::parser;
use crate::redraft::workflow::prompts;
use crate::redraft::workflow::state::{CorpusStats, StateUpdate, WorkflowState};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

/// One node of the workflow
#[async_trait]
pub trait Step: Send + Sync {
    fn id(&self) -> StepId;

    async fn run(&self, state: &WorkflowState) -> StateUpdate;
}

/// Knobs shared by the standard steps
#[derive(Debug, Clone, PartialEq)]
pub struct StepSettings {
    pub auxiliary_path: PathBuf,
    /// Upper bound on queries searched per research step
    pub max_queries: usize,
    pub results_per_query: u32,
    pub max_output_tokens: Option<u32>,
}

impl Default for StepSettings {
    fn default() -> Self {
        Self {
            auxiliary_path: PathBuf::from("data/auxiliary.txt"),
            max_queries: 3,
            results_per_query: 2,
            max_output_tokens: None,
        }
    }
}

/// Writes an outline for the task
pub struct PlanStep {
    gateway: Arc<ToolGateway>,
    max_output_tokens: Option<u32>,
}

impl PlanStep {
    pub fn new(gateway: Arc<ToolGateway>, max_output_tokens: Option<u32>) -> Self {
        Self {
            gateway,
            max_output_tokens,
        }
    }
}

#[async_trait]
impl Step for PlanStep {
    fn id(&self) -> StepId {
        StepId::Plan
    }

    async fn run(&self, state: &WorkflowState) -> StateUpdate {
        match self
            .gateway
            .complete(prompts::PLAN, &state.task, self.max_output_tokens)
            .await
        {
            Ok(plan) => StateUpdate::plan(plan),
            Err(fault) => StateUpdate::plan(fault.error_marker(self.id().as_str())),
        }
    }
}

/// What a research step asks queries about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResearchSeed {
    Task,
    Critique,
}

/// Asks the model for search queries, then searches each one
pub struct ResearchStep {
    seed: ResearchSeed,
    gateway: Arc<ToolGateway>,
    max_queries: usize,
    results_per_query: u32,
    max_output_tokens: Option<u32>,
}

impl ResearchStep {
    pub fn new(seed: ResearchSeed, gateway: Arc<ToolGateway>, settings: &StepSettings) -> Self {
        Self {
            seed,
            gateway,
            max_queries: settings.max_queries,
            results_per_query: settings.results_per_query,
            max_output_tokens: settings.max_output_tokens,
        }
    }

    fn prompt_and_seed<'a>(&self, state: &'a WorkflowState) -> (&'static str, &'a str) {
        match self.seed {
            ResearchSeed::Task => (prompts::RESEARCH_PLAN, &state.task),
            ResearchSeed::Critique => (prompts::RESEARCH_CRITIQUE, &state.critique),
        }
    }
}

#[async_trait]
impl Step for ResearchStep {
    fn id(&self) -> StepId {
        match self.seed {
            ResearchSeed::Task => StepId::ResearchPlan,
            ResearchSeed::Critique => StepId::ResearchCritique,
        }
    }

    async fn run(&self, state: &WorkflowState) -> StateUpdate {
        let (system, seed) = self.prompt_and_seed(state);

        let raw = match self
            .gateway
            .complete(system, seed, self.max_output_tokens)
            .await
        {
            Ok(raw) => raw,
            Err(fault) => {
                return StateUpdate::evidence(vec![fault.error_marker(self.id().as_str())]);
            }
        };

        let batch = parser::parse(&raw);
        let mut queries = batch.candidates();
        if queries.len() > self.max_queries {
            log::warn!(
                "{}: model proposed {} queries, keeping the first {}",
                self.id(),
                queries.len(),
                self.max_queries
            );
            queries.truncate(self.max_queries);
        }

        let mut evidence = Vec::new();
        for query in &queries {
            match self.gateway.search(query, self.results_per_query).await {
                Ok(hits) => evidence.extend(hits.into_iter().map(|hit| hit.content)),
                Err(fault) => evidence.push(fault.search_marker(query)),
            }
        }

        log::info!(
            "{}: {} queries ({:?}) produced {} evidence entries",
            self.id(),
            queries.len(),
            batch.strategy,
            evidence.len()
        );
        StateUpdate::evidence(evidence)
    }
}

/// Adds an optional local text file to the evidence
pub struct FetchAuxiliaryStep {
    path: PathBuf,
}

impl FetchAuxiliaryStep {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[async_trait]
impl Step for FetchAuxiliaryStep {
    fn id(&self) -> StepId {
        StepId::FetchAuxiliary
    }

    async fn run(&self, _state: &WorkflowState) -> StateUpdate {
        let name = self.display_name();
        let entry = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => format!("[auxiliary: {}]\n{}", name, content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("Auxiliary file {} not found, continuing", self.path.display());
                format!("[auxiliary_missing: {}]", name)
            }
            Err(e) => {
                log::warn!("Failed to read {}: {}", self.path.display(), e);
                format!("[error: {}] {}", self.id(), e)
            }
        };
        StateUpdate::evidence(vec![entry])
    }
}

/// Word and sentence counts over the evidence so far
pub struct ComputeStatisticsStep;

#[async_trait]
impl Step for ComputeStatisticsStep {
    fn id(&self) -> StepId {
        StepId::ComputeStatistics
    }

    async fn run(&self, state: &WorkflowState) -> StateUpdate {
        let stats = CorpusStats::compute(&state.evidence);
        StateUpdate {
            evidence: vec![stats.summary_line()],
            stats: Some(stats),
            ..StateUpdate::default()
        }
    }
}

/// Writes (or rewrites) the draft from plan and evidence
pub struct GenerateStep {
    gateway: Arc<ToolGateway>,
    max_output_tokens: Option<u32>,
}

impl GenerateStep {
    pub fn new(gateway: Arc<ToolGateway>, max_output_tokens: Option<u32>) -> Self {
        Self {
            gateway,
            max_output_tokens,
        }
    }
}

#[async_trait]
impl Step for GenerateStep {
    fn id(&self) -> StepId {
        StepId::Generate
    }

    async fn run(&self, state: &WorkflowState) -> StateUpdate {
        let system = prompts::writer(&state.joined_evidence());
        let user = prompts::writer_request(&state.task, &state.plan);

        let draft = match self
            .gateway
            .complete(&system, &user, self.max_output_tokens)
            .await
        {
            Ok(draft) => draft,
            Err(fault) => fault.error_marker(self.id().as_str()),
        };

        // A failed attempt still spends a revision
        StateUpdate {
            draft: Some(draft),
            revision_count: Some(state.revision_count.saturating_add(1)),
            ..StateUpdate::default()
        }
    }
}

/// Critiques the current draft
pub struct ReflectStep {
    gateway: Arc<ToolGateway>,
    max_output_tokens: Option<u32>,
}

impl ReflectStep {
    pub fn new(gateway: Arc<ToolGateway>, max_output_tokens: Option<u32>) -> Self {
        Self {
            gateway,
            max_output_tokens,
        }
    }
}

#[async_trait]
impl Step for ReflectStep {
    fn id(&self) -> StepId {
        StepId::Reflect
    }

    async fn run(&self, state: &WorkflowState) -> StateUpdate {
        match self
            .gateway
            .complete(prompts::REFLECTION, &state.draft, self.max_output_tokens)
            .await
        {
            Ok(critique) => StateUpdate::critique(critique),
            Err(fault) => StateUpdate::critique(fault.error_marker(self.id().as_str())),
        }
    }
}

/// Step implementations keyed by id
#[derive(Clone, Default)]
pub struct StepSet {
    steps: HashMap<StepId, Arc<dyn Step>>,
}

impl StepSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// All seven steps backed by one gateway
    pub fn standard(gateway: Arc<ToolGateway>, settings: &StepSettings) -> Self {
        let tokens = settings.max_output_tokens;
        Self::new()
            .with(Arc::new(PlanStep::new(gateway.clone(), tokens)))
            .with(Arc::new(ResearchStep::new(
                ResearchSeed::Task,
                gateway.clone(),
                settings,
            )))
            .with(Arc::new(FetchAuxiliaryStep::new(
                settings.auxiliary_path.clone(),
            )))
            .with(Arc::new(ComputeStatisticsStep))
            .with(Arc::new(GenerateStep::new(gateway.clone(), tokens)))
            .with(Arc::new(ReflectStep::new(gateway.clone(), tokens)))
            .with(Arc::new(ResearchStep::new(
                ResearchSeed::Critique,
                gateway,
                settings,
            )))
    }

    /// Register `step`, replacing any step with the same id
    pub fn with(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.insert(step.id(), step);
        self
    }

    pub fn get(&self, id: StepId) -> Result<Arc<dyn Step>, EngineError> {
        self.steps
            .get(&id)
            .cloned()
            .ok_or(EngineError::MissingStep(id))
    }

    /// Every step of the topology has an implementation
    pub fn validate(&self) -> Result<(), EngineError> {
        for id in StepId::ALL {
            if !self.steps.contains_key(&id) {
                return Err(EngineError::MissingStep(id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::ProviderError;
    use crate::adk::gateway::GatewayConfig;
    use crate::adk::model::{CompletionModel, CompletionRequest};
    use crate::adk::search::{SearchHit, SearchProvider};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Answers every request with `reply`, or fails when it is `None`
    struct ScriptedModel {
        reply: Option<String>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedModel {
        fn new(reply: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionModel for ScriptedModel {
        fn provider(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<Value, ProviderError> {
            self.requests.lock().unwrap().push(request.clone());
            match &self.reply {
                Some(text) => Ok(json!({"choices": [{"message": {"content": text}}]})),
                None => Err(ProviderError::api("scripted", "model unavailable")),
            }
        }
    }

    struct EchoSearch {
        fail: bool,
        calls: AtomicUsize,
    }

    impl EchoSearch {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SearchProvider for EchoSearch {
        fn name(&self) -> &str {
            "echo"
        }

        async fn search(&self, query: &str, max: u32) -> Result<Vec<SearchHit>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProviderError::api("echo", "quota exceeded"));
            }
            Ok((0..max)
                .map(|i| SearchHit::new(format!("{} result {}", query, i)))
                .collect())
        }
    }

    fn gateway(model: Arc<ScriptedModel>, search: Arc<EchoSearch>) -> Arc<ToolGateway> {
        Arc::new(ToolGateway::new(
            model,
            search,
            GatewayConfig {
                timeout: Duration::from_secs(5),
                retries: 0,
                temperature: None,
            },
        ))
    }

    #[tokio::test]
    async fn test_plan_fault_becomes_marker() {
        let gw = gateway(ScriptedModel::new(None), EchoSearch::new(false));
        let update = PlanStep::new(gw, None)
            .run(&WorkflowState::new("EU inflation", 1))
            .await;
        assert_eq!(
            update.plan.as_deref(),
            Some("[error: plan] API error from scripted: model unavailable")
        );
    }

    #[tokio::test]
    async fn test_research_caps_queries() {
        let model = ScriptedModel::new(Some(r#"{"queries": ["a", "b", "c", "d", "e"]}"#));
        let search = EchoSearch::new(false);
        let step = ResearchStep::new(
            ResearchSeed::Task,
            gateway(model, search.clone()),
            &StepSettings::default(),
        );

        let update = step.run(&WorkflowState::new("t", 1)).await;
        assert_eq!(search.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            update.evidence,
            vec![
                "a result 0",
                "a result 1",
                "b result 0",
                "b result 1",
                "c result 0",
                "c result 1"
            ]
        );
    }

    #[tokio::test]
    async fn test_research_search_faults_become_markers() {
        let model = ScriptedModel::new(Some("```json\n{\"queries\": [\"ecb rates\"]}\n```"));
        let step = ResearchStep::new(
            ResearchSeed::Task,
            gateway(model, EchoSearch::new(true)),
            &StepSettings::default(),
        );

        let update = step.run(&WorkflowState::new("t", 1)).await;
        assert_eq!(update.evidence.len(), 1);
        assert!(update.evidence[0].starts_with("[search_error: ecb rates]"));
        assert!(update.evidence[0].contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_research_critique_is_seeded_from_critique() {
        let model = ScriptedModel::new(Some(r#"["more data on wages"]"#));
        let step = ResearchStep::new(
            ResearchSeed::Critique,
            gateway(model.clone(), EchoSearch::new(false)),
            &StepSettings::default(),
        );
        assert_eq!(step.id(), StepId::ResearchCritique);

        let mut state = WorkflowState::new("t", 2);
        state.critique = "needs wage figures".to_string();
        step.run(&state).await;

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[0].system, prompts::RESEARCH_CRITIQUE);
        assert_eq!(requests[0].messages[0].content, "needs wage figures");
    }

    #[tokio::test]
    async fn test_research_completion_fault() {
        let step = ResearchStep::new(
            ResearchSeed::Task,
            gateway(ScriptedModel::new(None), EchoSearch::new(false)),
            &StepSettings::default(),
        );
        let update = step.run(&WorkflowState::new("t", 1)).await;
        assert_eq!(update.evidence.len(), 1);
        assert!(update.evidence[0].starts_with("[error: research_plan]"));
    }

    #[tokio::test]
    async fn test_fetch_auxiliary_present_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "Local figures.").unwrap();

        let update = FetchAuxiliaryStep::new(&path)
            .run(&WorkflowState::default())
            .await;
        assert_eq!(update.evidence, vec!["[auxiliary: notes.txt]\nLocal figures."]);

        let missing = FetchAuxiliaryStep::new(dir.path().join("absent.txt"))
            .run(&WorkflowState::default())
            .await;
        assert_eq!(missing.evidence, vec!["[auxiliary_missing: absent.txt]"]);
    }

    #[tokio::test]
    async fn test_fetch_auxiliary_read_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be read as a text file
        let update = FetchAuxiliaryStep::new(dir.path())
            .run(&WorkflowState::default())
            .await;
        assert!(update.evidence[0].starts_with("[error: fetch_auxiliary]"));
    }

    #[tokio::test]
    async fn test_compute_statistics_appends_summary() {
        let mut state = WorkflowState::new("t", 1);
        state.evidence = vec!["One two. Three".to_string()];

        let update = ComputeStatisticsStep.run(&state).await;
        let stats = update.stats.unwrap();
        assert_eq!(stats.word_count, 3);
        assert_eq!(stats.sentence_count, 2);
        assert_eq!(
            update.evidence,
            vec!["[stats] words=3 sentences=2 avg_words_per_sentence=1.50"]
        );

        // Same evidence, same figures
        let again = ComputeStatisticsStep.run(&state).await;
        assert_eq!(again.stats, Some(stats));
    }

    #[tokio::test]
    async fn test_generate_always_increments_revision() {
        let mut state = WorkflowState::new("EU inflation", 3);
        state.revision_count = 1;

        let failing = GenerateStep::new(
            gateway(ScriptedModel::new(None), EchoSearch::new(false)),
            None,
        );
        let update = failing.run(&state).await;
        assert_eq!(update.revision_count, Some(2));
        assert!(update.draft.unwrap().starts_with("[error: generate]"));

        let working = GenerateStep::new(
            gateway(ScriptedModel::new(Some("Report")), EchoSearch::new(false)),
            None,
        );
        let update = working.run(&state).await;
        assert_eq!(update.revision_count, Some(2));
        assert_eq!(update.draft.as_deref(), Some("Report"));
    }

    #[tokio::test]
    async fn test_generate_prompt_layout() {
        let model = ScriptedModel::new(Some("Report"));
        let step = GenerateStep::new(gateway(model.clone(), EchoSearch::new(false)), Some(512));

        let mut state = WorkflowState::new("EU inflation", 1);
        state.plan = "1. Intro".to_string();
        state.evidence = vec!["first".to_string(), "second".to_string()];
        step.run(&state).await;

        let requests = model.requests.lock().unwrap();
        assert!(requests[0].system.ends_with("first\n\nsecond"));
        assert_eq!(
            requests[0].messages[0].content,
            "EU inflation\n\nHere is my plan:\n\n1. Intro"
        );
        assert_eq!(requests[0].max_tokens, Some(512));
    }

    #[tokio::test]
    async fn test_reflect_writes_critique() {
        let step = ReflectStep::new(
            gateway(ScriptedModel::new(Some("Cite sources")), EchoSearch::new(false)),
            None,
        );
        let update = step.run(&WorkflowState::default()).await;
        assert_eq!(update.critique.as_deref(), Some("Cite sources"));
        assert!(update.evidence.is_empty());
    }

    #[test]
    fn test_step_set_validation() {
        let gw = gateway(ScriptedModel::new(Some("x")), EchoSearch::new(false));
        let full = StepSet::standard(gw.clone(), &StepSettings::default());
        assert!(full.validate().is_ok());

        let partial = StepSet::new().with(Arc::new(PlanStep::new(gw, None)));
        assert!(matches!(
            partial.validate(),
            Err(EngineError::MissingStep(StepId::ResearchPlan))
        ));
        assert!(matches!(
            partial.get(StepId::Reflect),
            Err(EngineError::MissingStep(StepId::Reflect))
        ));
    }
}
