use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::types::AnalyzerConfig;
use crate::domain::transaction::Transaction;
use crate::error::{LedgerError, Result};
use crate::ports::analyzer::{Narrative, NarrativeAnalyzer};

/// Financial commentary through Gemini's `generateContent` endpoint, pinned
/// to a JSON response schema so the model answers in the narrative shape.
///
/// Degrades instead of failing: a missing key, an empty ledger, or any
/// request problem all come back as a placeholder narrative in French, the
/// same wording for every caller.
#[derive(Debug)]
pub struct GeminiAnalyzer {
    http: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiAnalyzer {
    pub fn new(config: &AnalyzerConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.is_empty());
        if api_key.is_none() {
            warn!(
                env = %config.api_key_env,
                "Gemini API key not set, analysis will return a placeholder"
            );
        }
        Self::with_key(config, api_key)
    }

    pub fn with_key(config: &AnalyzerConfig, api_key: Option<String>) -> Result<Self> {
        Url::parse(&config.base_url)?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key,
        })
    }

    async fn request_analysis(
        &self,
        api_key: &str,
        transactions: &[Transaction],
    ) -> Result<Narrative> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": build_prompt(transactions) }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "content": { "type": "STRING" },
                    },
                    "required": ["title", "content"],
                },
            },
        });

        debug!(model = %self.model, rows = transactions.len(), "Requesting ledger analysis");
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::Analyzer {
                reason: format!("generateContent returned HTTP {status}"),
            });
        }

        let payload: GenerateContentResponse = response.json().await?;
        let text = payload
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or_else(|| LedgerError::Analyzer {
                reason: "generateContent returned no candidates".into(),
            })?;

        serde_json::from_str(&text).map_err(|e| LedgerError::Analyzer {
            reason: format!("narrative JSON parse error: {e}"),
        })
    }
}

#[async_trait]
impl NarrativeAnalyzer for GeminiAnalyzer {
    async fn analyze(&self, transactions: &[Transaction]) -> Result<Narrative> {
        let Some(api_key) = self.api_key.clone() else {
            return Ok(missing_key_narrative());
        };
        if transactions.is_empty() {
            return Ok(no_data_narrative());
        }

        match self.request_analysis(&api_key, transactions).await {
            Ok(narrative) => Ok(narrative),
            Err(err) => {
                warn!(error = %err, "Gemini analysis failed, returning placeholder");
                Ok(failure_narrative())
            }
        }
    }
}

/// Compact rows keep the prompt small: one-letter keys, label strings.
fn compact_rows(transactions: &[Transaction]) -> serde_json::Value {
    serde_json::Value::Array(
        transactions
            .iter()
            .map(|t| {
                serde_json::json!({
                    "d": t.date.format("%Y-%m-%d").to_string(),
                    "a": t.amount,
                    "c": t.category.label(),
                    "t": t.kind,
                    "desc": t.description,
                })
            })
            .collect(),
    )
}

fn build_prompt(transactions: &[Transaction]) -> String {
    format!(
        "Tu es un expert en gestion financière pour locations saisonnières (Airbnb, gîtes).\n\
         Voici les transactions récentes (format JSON simplifié):\n\
         {rows}\n\n\
         Analyse ces données et fournis une réponse structurée en français.\n\
         Concentre-toi sur :\n\
         1. La santé financière actuelle (Cash flow).\n\
         2. Les postes de dépenses les plus lourds.\n\
         3. Des conseils concrets pour optimiser la rentabilité.\n\n\
         Reste concis, professionnel et encourageant.",
        rows = compact_rows(transactions)
    )
}

fn missing_key_narrative() -> Narrative {
    Narrative {
        title: "Clé API manquante".into(),
        content: "Veuillez configurer votre clé API pour obtenir des analyses intelligentes."
            .into(),
    }
}

fn no_data_narrative() -> Narrative {
    Narrative {
        title: "Pas assez de données".into(),
        content: "Ajoutez des transactions pour que je puisse analyser vos performances financières."
            .into(),
    }
}

fn failure_narrative() -> Narrative {
    Narrative {
        title: "Erreur d'analyse".into(),
        content: "Je n'ai pas pu analyser vos données pour le moment. Veuillez réessayer plus tard."
            .into(),
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
