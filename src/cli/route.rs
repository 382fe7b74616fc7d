//! CLI route: single route table and run context. Builds engine services and dispatches to
//! presentation.

use crate::attachments::{AttachmentBuilder, AttachmentRenderers, DocumentChainRegistry};
use crate::config::{ConfigLoader, GenerationSettings, MailweaveConfig};
use crate::error::EngineError;
use crate::generation::ThreadGenerator;
use crate::input::GenerationInput;
use crate::model::Storyline;
use crate::orchestrator::{plan_storylines, GenerationOrchestrator, Persistence};
use crate::progress::TracingProgressSink;
use crate::provider::ChatCompletionsClient;
use crate::sink::JsonFileSink;
use crate::topics::{TopicCatalog, TopicSelector};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::parse::Commands;
use crate::cli::presentation::{
    format_plans_json, format_plans_text, format_run_report_json, format_run_report_text,
    format_topics_text,
};

/// Runtime context for CLI execution: workspace root and loaded configuration.
pub struct RunContext {
    config: MailweaveConfig,
    workspace_root: PathBuf,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, EngineError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Ok(Self::with_config(config, workspace_root))
    }

    pub fn with_config(config: MailweaveConfig, workspace_root: PathBuf) -> Self {
        Self {
            config,
            workspace_root,
        }
    }

    pub fn config(&self) -> &MailweaveConfig {
        &self.config
    }

    /// Execute a CLI command via the single route table.
    pub async fn execute(
        &self,
        command: &Commands,
        cancel: &CancellationToken,
    ) -> Result<String, EngineError> {
        match command {
            Commands::Plan {
                input,
                seed,
                format,
            } => {
                let settings = self.settings(*seed, None)?;
                let storylines = load_storylines(input)?;
                let plans = plan_storylines(&settings, &storylines)?;
                if format == "json" {
                    format_plans_json(&plans)
                } else {
                    Ok(format_plans_text(&plans))
                }
            }
            Commands::Generate {
                input,
                output,
                seed,
                parallel,
                format,
            } => {
                let settings = self.settings(*seed, *parallel)?;
                let mut storylines = load_storylines(input)?;
                let orchestrator = self.build_orchestrator(settings, output)?;
                let report = orchestrator.run(&mut storylines, cancel).await?;
                if format == "json" {
                    format_run_report_json(&report)
                } else {
                    Ok(format_run_report_text(&report))
                }
            }
            Commands::Topics { catalog } => {
                let catalog = match catalog {
                    Some(path) => TopicCatalog::load(path)?,
                    None => self.load_catalog(&self.config.generation)?,
                };
                Ok(format_topics_text(&catalog))
            }
        }
    }

    /// Generation settings with command-line overrides, validated.
    fn settings(
        &self,
        seed: Option<u64>,
        parallel: Option<usize>,
    ) -> Result<GenerationSettings, EngineError> {
        let mut settings = self.config.generation.clone();
        if let Some(seed) = seed {
            settings.seed = seed;
        }
        if let Some(parallel) = parallel {
            settings.max_parallel_threads = parallel;
        }
        let errors = settings.validate();
        if !errors.is_empty() {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            return Err(EngineError::ConfigError(messages.join("; ")));
        }
        Ok(settings)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }

    fn load_catalog(&self, settings: &GenerationSettings) -> Result<TopicCatalog, EngineError> {
        let path = settings.topics.catalog_path.as_deref().map(|p| self.resolve(p));
        TopicCatalog::load_or_builtin(path.as_deref())
    }

    fn build_orchestrator(
        &self,
        settings: GenerationSettings,
        output: &Path,
    ) -> Result<GenerationOrchestrator, EngineError> {
        let client = Arc::new(ChatCompletionsClient::from_config(&self.config.provider)?);
        info!(model = %self.config.provider.model, seed = settings.seed, "Completion client ready");

        let catalog = Arc::new(self.load_catalog(&settings)?);
        let topics = Arc::new(TopicSelector::new(catalog, settings.topics.clone()));
        let attachments = AttachmentBuilder::new(
            AttachmentRenderers::default(),
            Arc::new(DocumentChainRegistry::new()),
        );
        let generator = Arc::new(ThreadGenerator::new(client, settings, topics, attachments));

        Ok(GenerationOrchestrator::new(generator)
            .with_persistence(Persistence {
                sink: Arc::new(JsonFileSink::new()),
                output: output.to_path_buf(),
            })
            .with_progress(Arc::new(TracingProgressSink)))
    }
}

fn load_storylines(path: &Path) -> Result<Vec<Storyline>, EngineError> {
    GenerationInput::load(path)?.into_storylines()
}
