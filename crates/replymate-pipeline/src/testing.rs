//! Recorded-fixture collaborators for exercising the pipeline offline.

use std::collections::HashMap;

use async_trait::async_trait;
use ndarray::Array1;
use parking_lot::Mutex;

use replymate_core::{Error, Result, Sentiment};
use replymate_infer::{Embedder, EmbeddingResult, SentimentClassifier, SentimentScore};
use replymate_llm::LanguageModel;

type Script = Box<dyn Fn(&str, &str) -> Result<String> + Send + Sync>;

/// Language model answering from a script and recording every call as
/// `(system_prompt, user_prompt)`.
pub struct ScriptedModel {
    script: Script,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedModel {
    pub fn new(script: impl Fn(&str, &str) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_, _| Ok(text.clone()))
    }

    pub fn failing() -> Self {
        Self::new(|_, _| Err(Error::Llm("scripted failure".into())))
    }

    /// Extraction calls carry no system prompt; generation calls do.
    pub fn pipeline(analysis_json: &str, reply: &str) -> Self {
        let analysis_json = analysis_json.to_string();
        let reply = reply.to_string();
        Self::new(move |system, _| {
            if system.is_empty() {
                Ok(analysis_json.clone())
            } else {
                Ok(reply.clone())
            }
        })
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }

    /// System prompts of generation calls, in order.
    pub fn system_prompts(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|(system, _)| !system.is_empty())
            .map(|(system, _)| system.clone())
            .collect()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.calls
            .lock()
            .push((system_prompt.to_string(), user_prompt.to_string()));
        (self.script)(system_prompt, user_prompt)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Classifier returning one fixed verdict, or always failing.
pub struct FixedClassifier {
    verdict: Option<Sentiment>,
}

impl FixedClassifier {
    pub fn new(label: Sentiment) -> Self {
        Self {
            verdict: Some(label),
        }
    }

    pub fn failing() -> Self {
        Self { verdict: None }
    }
}

#[async_trait]
impl SentimentClassifier for FixedClassifier {
    async fn classify(&self, _text: &str) -> Result<SentimentScore> {
        match self.verdict {
            Some(label) => Ok(SentimentScore { label, score: 0.9 }),
            None => Err(Error::Classification("classifier offline".into())),
        }
    }
}

/// Bag-of-words embedder. Each new token gets the next free axis, so texts
/// sharing words land close together and unrelated texts are orthogonal
/// until more than `dim` distinct tokens have been seen.
pub struct VocabEmbedder {
    dim: usize,
    vocab: Mutex<HashMap<String, usize>>,
}

impl VocabEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            vocab: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Embedder for VocabEmbedder {
    async fn embed(&self, text: &str) -> Result<Option<EmbeddingResult>> {
        let mut v = Array1::<f32>::zeros(self.dim);
        let mut vocab = self.vocab.lock();
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let next = vocab.len();
            let axis = *vocab.entry(token.to_string()).or_insert(next);
            v[axis % self.dim] += 1.0;
        }
        if v.iter().all(|x| *x == 0.0) {
            v[0] = 1.0;
        }
        Ok(Some(EmbeddingResult {
            embedding: v,
            cached: false,
        }))
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn is_available(&self) -> bool {
        true
    }
}
