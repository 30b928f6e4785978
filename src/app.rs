//! Application wiring.
//!
//! [`AppContext`] assembles the store, ingestor, synthesizer, tool router,
//! workflow, and session registry from a [`Config`]. The CLI and the HTTP
//! server both start from it. Tests use [`AppContext::build`] with
//! in-process [`Components`] instead of SQLite and network providers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use docqa_core::conversation::Conversation;
use docqa_core::embedding::Embedder;
use docqa_core::generate::Generator;
use docqa_core::retriever::Retriever;
use docqa_core::router::{RagSearchTool, SearchTool, ToolRouter};
use docqa_core::store::{EmbeddingStore, VectorStore};
use docqa_core::synth::Synthesizer;
use docqa_core::workflow::Workflow;

use crate::config::Config;
use crate::embedding::create_provider;
use crate::ingest::Ingestor;
use crate::llm::create_generator;
use crate::session::SessionRegistry;
use crate::sqlite_store::SqliteStore;
use crate::tools::{DuckDuckGoTool, WikipediaTool};
use crate::{db, migrate};

/// Swappable backends behind an [`AppContext`].
pub struct Components {
    pub backend: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
    /// Tools registered next to the built-in `rag` tool.
    pub tools: Vec<Arc<dyn SearchTool>>,
}

pub struct AppContext {
    pub config: Config,
    pub store: Arc<EmbeddingStore>,
    pub ingestor: Ingestor,
    pub synthesizer: Arc<Synthesizer>,
    pub router: Arc<ToolRouter>,
    pub workflow: Workflow,
    pub sessions: SessionRegistry,
}

impl AppContext {
    /// Open the SQLite collection and create the configured providers.
    ///
    /// With `offline`, no web tools are registered and connected requests
    /// route to the document search tool.
    pub async fn from_config(config: Config, offline: bool) -> Result<Self> {
        let pool = db::connect(&config.db.path).await?;
        migrate::run_migrations(&pool).await?;
        let backend = SqliteStore::open(pool, &config.collection.name).await?;

        let embedder = create_provider(&config.embedding)?;
        let generator = create_generator(&config.llm)?;

        let tools: Vec<Arc<dyn SearchTool>> = if offline {
            Vec::new()
        } else {
            let timeout = Duration::from_secs(config.tools.timeout_secs);
            let ddg: Arc<dyn SearchTool> =
                Arc::new(DuckDuckGoTool::new(timeout, config.tools.max_results)?);
            let wiki: Arc<dyn SearchTool> =
                Arc::new(WikipediaTool::new(timeout, config.tools.max_results)?);
            vec![ddg, wiki]
        };

        info!(
            collection = %config.collection.name,
            embedder = embedder.model_name(),
            llm = generator.model_name(),
            offline,
            "application ready"
        );

        Ok(Self::build(
            config,
            Components {
                backend: Arc::new(backend),
                embedder,
                generator,
                tools,
            },
        ))
    }

    pub fn build(config: Config, components: Components) -> Self {
        let store = Arc::new(
            EmbeddingStore::new(components.backend, components.embedder)
                .with_batch_size(config.embedding.batch_size),
        );

        let synthesizer = Arc::new(
            Synthesizer::new(components.generator)
                .with_timeout(Duration::from_secs(config.llm.timeout_secs))
                .with_temperature(Some(config.llm.temperature)),
        );

        let rag: Arc<dyn SearchTool> = Arc::new(RagSearchTool::new(Retriever::new(
            store.clone(),
            config.retrieval.tool_k,
        )));
        let default_tool = if components
            .tools
            .iter()
            .any(|t| t.name() == config.tools.default)
        {
            config.tools.default.clone()
        } else {
            rag.name().to_string()
        };
        let mut router = ToolRouter::new(default_tool)
            .with_timeout(Duration::from_secs(config.tools.timeout_secs))
            .with_tool(rag);
        for tool in components.tools {
            router = router.with_tool(tool);
        }
        let router = Arc::new(router);

        let workflow = Workflow::new(router.clone(), synthesizer.clone());
        let ingestor = Ingestor::new(store.clone(), config.chunking);

        let sessions = {
            let store = store.clone();
            let synthesizer = synthesizer.clone();
            let config = config.clone();
            SessionRegistry::new(config.server.max_sessions, move || {
                new_conversation(&config, &store, &synthesizer)
            })
        };

        Self {
            config,
            store,
            ingestor,
            synthesizer,
            router,
            workflow,
            sessions,
        }
    }

    /// A fresh conversation configured from `[retrieval]` and `[conversation]`.
    pub fn conversation(&self) -> Conversation {
        new_conversation(&self.config, &self.store, &self.synthesizer)
    }
}

fn new_conversation(
    config: &Config,
    store: &Arc<EmbeddingStore>,
    synthesizer: &Arc<Synthesizer>,
) -> Conversation {
    let mut conv = Conversation::new(
        Retriever::new(store.clone(), config.retrieval.conversation_k),
        synthesizer.clone(),
    )
    .with_max_turns(config.conversation.max_turns);
    if let Some(prompt) = &config.conversation.system_prompt {
        conv = conv.with_system_prompt(prompt.clone());
    }
    if let Some(answer) = &config.conversation.no_results_answer {
        conv = conv.with_no_results_answer(answer.clone());
    }
    conv
}
