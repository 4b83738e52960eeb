//! User-tunable search and model settings.
//!
//! The core never interprets these beyond forwarding them to the backend
//! calls. `SearchSettings::validate` exists for the outer surface (the CLI)
//! to reject values the backend would not accept.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::{DomainError, Result};

/// Accepted result-count limits
pub const LIMIT_RANGE: RangeInclusive<u32> = 5..=10;

/// Accepted vector-search batch sizes
pub const BATCH_SIZE_RANGE: RangeInclusive<u32> = 100..=200;

/// Accepted positive/negative weighting factors
pub const WEIGHT_RANGE: RangeInclusive<f64> = 0.0..=1.0;

/// Default model name for the local provider
pub const DEFAULT_LOCAL_MODEL: &str = "gemma2:2b";

/// Embedding model used by the search backend.
///
/// Wire codes `"1"`..`"6"` are what the backend's `model_choice` expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EmbeddingModel {
    #[default]
    MultiQaMiniLmL6CosV1,
    AllMiniLmL6V2,
    AllDistilrobertaV1,
    DistilbertBaseNliStsbMeanTokens,
    AllMiniLmL12V2,
    ChromaDb,
}

impl EmbeddingModel {
    pub const ALL: [EmbeddingModel; 6] = [
        EmbeddingModel::MultiQaMiniLmL6CosV1,
        EmbeddingModel::AllMiniLmL6V2,
        EmbeddingModel::AllDistilrobertaV1,
        EmbeddingModel::DistilbertBaseNliStsbMeanTokens,
        EmbeddingModel::AllMiniLmL12V2,
        EmbeddingModel::ChromaDb,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            EmbeddingModel::MultiQaMiniLmL6CosV1 => "1",
            EmbeddingModel::AllMiniLmL6V2 => "2",
            EmbeddingModel::AllDistilrobertaV1 => "3",
            EmbeddingModel::DistilbertBaseNliStsbMeanTokens => "4",
            EmbeddingModel::AllMiniLmL12V2 => "5",
            EmbeddingModel::ChromaDb => "6",
        }
    }

    pub fn model_name(&self) -> &'static str {
        match self {
            EmbeddingModel::MultiQaMiniLmL6CosV1 => "sentence-transformers/multi-qa-MiniLM-L6-cos-v1",
            EmbeddingModel::AllMiniLmL6V2 => "sentence-transformers/all-MiniLM-L6-v2",
            EmbeddingModel::AllDistilrobertaV1 => "sentence-transformers/all-distilroberta-v1",
            EmbeddingModel::DistilbertBaseNliStsbMeanTokens => {
                "sentence-transformers/distilbert-base-nli-stsb-mean-tokens"
            }
            EmbeddingModel::AllMiniLmL12V2 => "sentence-transformers/all-MiniLM-L12-v2",
            EmbeddingModel::ChromaDb => "chromadb",
        }
    }
}

impl fmt::Display for EmbeddingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.model_name())
    }
}

/// Parses a wire code (`"3"`), a full model name or the name without the
/// `sentence-transformers/` prefix. Matching is case-insensitive.
impl FromStr for EmbeddingModel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        EmbeddingModel::ALL
            .into_iter()
            .find(|model| {
                let name = model.model_name().to_lowercase();
                let short = name.rsplit('/').next().unwrap_or(&name).to_string();
                wanted == model.code() || wanted == name || wanted == short
            })
            .ok_or_else(|| DomainError::UnknownEmbeddingModel(s.to_string()))
    }
}

/// Which language-model deployment to call
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModelProvider {
    /// Hosted inference behind the backend
    #[default]
    Hosted,
    /// A locally served model, addressed by name
    Local { model: String },
}

impl ModelProvider {
    pub fn local(model: impl Into<String>) -> Self {
        ModelProvider::Local {
            model: model.into(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            ModelProvider::Hosted => "hosted".to_string(),
            ModelProvider::Local { model } => format!("local:{}", model),
        }
    }
}

/// Search-tuning parameters passed through verbatim to the search backend
#[derive(Debug, Clone, PartialEq)]
pub struct SearchTuning {
    /// Raw vector-search candidates fetched before filtering
    pub search_batch_size: u32,
    /// Weight of the positive-query similarity
    pub alpha: f64,
    /// Weight of the negative-query similarity
    pub beta: f64,
    pub embedding_model: EmbeddingModel,
}

impl Default for SearchTuning {
    fn default() -> Self {
        Self {
            search_batch_size: 200,
            alpha: 1.0,
            beta: 1.0,
            embedding_model: EmbeddingModel::default(),
        }
    }
}

/// Everything the outer surface can tune about retrieval
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSettings {
    /// Number of results to request
    pub limit: u32,
    pub tuning: SearchTuning,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            limit: 10,
            tuning: SearchTuning::default(),
        }
    }
}

impl SearchSettings {
    /// Check every field against the ranges the backend accepts
    pub fn validate(&self) -> Result<()> {
        check_range("limit", self.limit, &LIMIT_RANGE)?;
        check_range("search_batch_size", self.tuning.search_batch_size, &BATCH_SIZE_RANGE)?;
        check_range("alpha", self.tuning.alpha, &WEIGHT_RANGE)?;
        check_range("beta", self.tuning.beta, &WEIGHT_RANGE)?;
        Ok(())
    }
}

fn check_range<T>(field: &str, value: T, range: &RangeInclusive<T>) -> Result<()>
where
    T: PartialOrd + fmt::Display,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(DomainError::InvalidSetting {
            field: field.to_string(),
            value: value.to_string(),
            expected: format!("{}..={}", range.start(), range.end()),
        })
    }
}
