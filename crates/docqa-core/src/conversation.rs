//! Multi-turn, document-grounded conversation.
//!
//! A [`Conversation`] owns a bounded FIFO of [`Turn`]s. Each
//! [`ask`](Conversation::ask) retrieves context for the question, asks the
//! [`Synthesizer`] for an answer with the prior history attached, then
//! records the exchange and evicts the oldest turns beyond `max_turns`.
//!
//! ```text
//!  Empty ──ask──▶ Active ──ask──▶ Active
//!    ▲                              │
//!    └────────────clear─────────────┘
//! ```
//!
//! `ask` takes `&mut self`; callers sharing a conversation across tasks
//! serialize access (the app wraps each one in a `tokio::sync::Mutex`).

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::models::{Answer, SourceRef, Turn};
use crate::retriever::Retriever;
use crate::synth::{SynthesisRequest, Synthesizer, QA_SYSTEM_PROMPT};

/// Answer given when retrieval finds nothing. No generation call is made.
pub const NO_RESULTS_ANSWER: &str = "I couldn't find relevant information in the documents to answer your question. Please try rephrasing or ask about a different topic covered in the documents.";

/// History bound: 10 exchanges.
pub const MAX_TURNS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Empty,
    Active,
}

pub struct Conversation {
    retriever: Retriever,
    synthesizer: Arc<Synthesizer>,
    history: Vec<Turn>,
    max_turns: usize,
    system_prompt: String,
    no_results_answer: String,
}

impl Conversation {
    pub fn new(retriever: Retriever, synthesizer: Arc<Synthesizer>) -> Self {
        Self {
            retriever,
            synthesizer,
            history: Vec::new(),
            max_turns: MAX_TURNS,
            system_prompt: QA_SYSTEM_PROMPT.to_string(),
            no_results_answer: NO_RESULTS_ANSWER.to_string(),
        }
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_no_results_answer(mut self, answer: impl Into<String>) -> Self {
        self.no_results_answer = answer.into();
        self
    }

    pub fn state(&self) -> ConversationState {
        if self.history.is_empty() {
            ConversationState::Empty
        } else {
            ConversationState::Active
        }
    }

    /// Turns currently kept, oldest first.
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Answer `question` from the indexed documents.
    ///
    /// Fails only when retrieval fails; history is left untouched then.
    /// Generation failures come back as a fallback [`Answer`].
    pub async fn ask(&mut self, question: &str) -> Result<Answer> {
        let chunks = self.retriever.retrieve(question).await?;

        let answer = if chunks.is_empty() {
            debug!("no chunks retrieved, skipping generation");
            Answer {
                answer: self.no_results_answer.clone(),
                sources: Vec::new(),
                fallback: false,
            }
        } else {
            let context = chunks
                .iter()
                .map(|c| c.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            let request = SynthesisRequest {
                context: Some(&context),
                history: &self.history,
                ..SynthesisRequest::new(&self.system_prompt, question)
            };
            let synthesis = self.synthesizer.synthesize(request).await;

            Answer {
                answer: synthesis.text,
                sources: chunks.iter().map(SourceRef::from_chunk).collect(),
                fallback: synthesis.fallback,
            }
        };

        self.history.push(Turn::user(question));
        self.history.push(Turn::assistant(answer.answer.clone()));
        if self.history.len() > self.max_turns {
            let excess = self.history.len() - self.max_turns;
            self.history.drain(..excess);
        }

        Ok(answer)
    }

    /// Drop all history. The document store is not touched.
    pub fn clear(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;
    use crate::models::Role;
    use crate::store::memory::InMemoryStore;
    use crate::store::EmbeddingStore;
    use crate::testing::{seeded_store, FailingEmbedder, KeywordEmbedder, RecordingGenerator};

    async fn conversation(gen: Arc<RecordingGenerator>) -> Conversation {
        let store = seeded_store(&[
            ("policy.txt", "The refund window is 30 days from the date of purchase."),
            ("shipping.txt", "Orders ship within five business days."),
        ])
        .await;
        Conversation::new(
            Retriever::new(store, 3),
            Arc::new(Synthesizer::new(gen)),
        )
    }

    #[tokio::test]
    async fn test_ask_returns_answer_with_sources() {
        let gen = Arc::new(RecordingGenerator::new("30 days (policy.txt)."));
        let mut conv = conversation(gen.clone()).await;
        assert_eq!(conv.state(), ConversationState::Empty);

        let answer = conv.ask("How long is the refund window?").await.unwrap();
        assert_eq!(answer.answer, "30 days (policy.txt).");
        assert!(!answer.fallback);
        assert_eq!(answer.sources.len(), 2);
        assert!(answer.sources.iter().any(|s| s.file == "policy.txt"));
        assert_eq!(conv.state(), ConversationState::Active);

        let calls = gen.calls();
        let messages = &calls[0];
        assert!(messages[0].content.contains("refund window is 30 days"));
        assert_eq!(messages.last().unwrap().content, "How long is the refund window?");
    }

    #[tokio::test]
    async fn test_history_is_passed_to_follow_up() {
        let gen = Arc::new(RecordingGenerator::new("ok"));
        let mut conv = conversation(gen.clone()).await;
        conv.ask("What is the refund window?").await.unwrap();
        conv.ask("And for sale items?").await.unwrap();

        let calls = gen.calls();
        let second = &calls[1];
        assert_eq!(second.len(), 4);
        assert_eq!(second[1].role, Role::User);
        assert_eq!(second[1].content, "What is the refund window?");
        assert_eq!(second[2].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_history_bounded_to_max_turns() {
        let gen = Arc::new(RecordingGenerator::new("ok"));
        let mut conv = conversation(gen).await;
        for n in 1..=12 {
            conv.ask(&format!("refund question {}", n)).await.unwrap();
            assert_eq!(conv.history().len(), (2 * n).min(20));
        }
        assert_eq!(conv.history()[0].content, "refund question 3");
    }

    #[tokio::test]
    async fn test_no_results_skips_generation() {
        let gen = Arc::new(RecordingGenerator::new("unused"));
        let store = Arc::new(EmbeddingStore::new(
            Arc::new(InMemoryStore::default()),
            Arc::new(KeywordEmbedder::default()),
        ));
        let mut conv = Conversation::new(
            Retriever::new(store, 3),
            Arc::new(Synthesizer::new(gen.clone())),
        );

        let answer = conv.ask("anything").await.unwrap();
        assert_eq!(answer.answer, NO_RESULTS_ANSWER);
        assert!(answer.sources.is_empty());
        assert!(gen.calls().is_empty());
        assert_eq!(conv.history().len(), 2);
    }

    #[tokio::test]
    async fn test_storage_failure_leaves_history_unchanged() {
        let backend = Arc::new(InMemoryStore::default());
        EmbeddingStore::new(backend.clone(), Arc::new(KeywordEmbedder::default()))
            .add(
                &["a_chunk_0".to_string()],
                &["some text".to_string()],
                &[crate::models::ChunkMetadata {
                    source: "a.txt".to_string(),
                    page: 0,
                    chunk_index: 0,
                }],
            )
            .await
            .unwrap();
        let broken = Arc::new(EmbeddingStore::new(backend, Arc::new(FailingEmbedder)));
        let gen = Arc::new(RecordingGenerator::new("unused"));
        let mut conv = Conversation::new(
            Retriever::new(broken, 3),
            Arc::new(Synthesizer::new(gen)),
        );

        let err = conv.ask("question").await.unwrap_err();
        assert!(matches!(err, RagError::Storage(_)));
        assert_eq!(conv.state(), ConversationState::Empty);
    }

    #[tokio::test]
    async fn test_clear_resets_history() {
        let gen = Arc::new(RecordingGenerator::new("ok"));
        let mut conv = conversation(gen.clone()).await;
        conv.ask("refund?").await.unwrap();
        conv.clear();
        assert_eq!(conv.state(), ConversationState::Empty);

        conv.ask("refund again?").await.unwrap();
        assert_eq!(gen.calls()[1].len(), 2);
    }

    #[tokio::test]
    async fn test_source_preview_is_truncated() {
        let long = format!("refund {}", "details ".repeat(60));
        let store = seeded_store(&[("long.txt", long.as_str())]).await;
        let gen = Arc::new(RecordingGenerator::new("ok"));
        let mut conv = Conversation::new(
            Retriever::new(store, 3),
            Arc::new(Synthesizer::new(gen)),
        );
        let answer = conv.ask("refund").await.unwrap();
        let preview = &answer.sources[0].content;
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 203);
    }
}
