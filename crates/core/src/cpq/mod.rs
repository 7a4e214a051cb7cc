pub mod assumptions;
pub mod bom;
pub mod catalog;
pub mod classifier;
pub mod parser;
pub mod pricing;
pub mod risk;
pub mod text;
pub mod validation;

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::domain::quotation::{OperatingMode, QuotationId, QuotationOutput, QuotationStatus};
use crate::errors::ApplicationError;

use self::{
    assumptions::{apply_assumptions, AssumptionDefaults},
    bom::{BomEngine, DeterministicBomEngine},
    catalog::CatalogHandle,
    classifier::{Classifier, DeterministicClassifier},
    parser::{DeterministicParser, RequestParser},
    pricing::{DeterministicPricingEngine, PricingEngine},
    risk::{DeterministicRiskEngine, RiskBands, RiskEngine, RiskLevel, SreResult},
    validation::{DeterministicValidationEngine, ValidationEngine, ValidationInput, ValidationResult},
};

/// Per-run caller context.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuoteContext {
    pub mode_override: Option<OperatingMode>,
    pub correlation_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub correlation_id: String,
    pub text: String,
    #[serde(default)]
    pub mode_override: Option<OperatingMode>,
}

impl BatchItem {
    fn context(&self) -> QuoteContext {
        QuoteContext {
            mode_override: self.mode_override,
            correlation_id: Some(self.correlation_id.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BatchResult {
    pub correlation_id: String,
    pub outcome: Result<QuotationOutput, ApplicationError>,
}

/// Tunables for the default engines, usually taken from `AppConfig`.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineSettings {
    pub classifier_tie_ratio: f64,
    pub risk_bands: RiskBands,
    pub assumptions: AssumptionDefaults,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            classifier_tie_ratio: 0.85,
            risk_bands: RiskBands::default(),
            assumptions: AssumptionDefaults::default(),
        }
    }
}

pub trait QuotationPipeline: Send + Sync {
    fn quote(&self, text: &str, context: &QuoteContext) -> QuotationOutput;
}

pub struct PipelineEngines<C, P, R, B, Q, V> {
    pub classifier: C,
    pub parser: P,
    pub risk: R,
    pub bom: B,
    pub pricing: Q,
    pub validation: V,
}

impl Default
    for PipelineEngines<
        DeterministicClassifier,
        DeterministicParser,
        DeterministicRiskEngine,
        DeterministicBomEngine,
        DeterministicPricingEngine,
        DeterministicValidationEngine,
    >
{
    fn default() -> Self {
        Self {
            classifier: DeterministicClassifier::default(),
            parser: DeterministicParser,
            risk: DeterministicRiskEngine::default(),
            bom: DeterministicBomEngine,
            pricing: DeterministicPricingEngine,
            validation: DeterministicValidationEngine,
        }
    }
}

pub struct DeterministicQuotationPipeline<C, P, R, B, Q, V> {
    engines: PipelineEngines<C, P, R, B, Q, V>,
    catalog: CatalogHandle,
    defaults: AssumptionDefaults,
}

pub type DefaultQuotationPipeline = DeterministicQuotationPipeline<
    DeterministicClassifier,
    DeterministicParser,
    DeterministicRiskEngine,
    DeterministicBomEngine,
    DeterministicPricingEngine,
    DeterministicValidationEngine,
>;

impl<C, P, R, B, Q, V> DeterministicQuotationPipeline<C, P, R, B, Q, V> {
    pub fn new(
        engines: PipelineEngines<C, P, R, B, Q, V>,
        catalog: CatalogHandle,
        defaults: AssumptionDefaults,
    ) -> Self {
        Self { engines, catalog, defaults }
    }

    /// Handle used to swap the catalog for subsequent runs.
    pub fn catalog(&self) -> &CatalogHandle {
        &self.catalog
    }
}

impl DefaultQuotationPipeline {
    pub fn with_settings(catalog: CatalogHandle, settings: PipelineSettings) -> Self {
        let engines = PipelineEngines {
            classifier: DeterministicClassifier::new(settings.classifier_tie_ratio),
            risk: DeterministicRiskEngine::new(settings.risk_bands),
            ..PipelineEngines::default()
        };
        Self::new(engines, catalog, settings.assumptions)
    }
}

impl<C, P, R, B, Q, V> QuotationPipeline for DeterministicQuotationPipeline<C, P, R, B, Q, V>
where
    C: Classifier,
    P: RequestParser,
    R: RiskEngine,
    B: BomEngine,
    Q: PricingEngine,
    V: ValidationEngine,
{
    fn quote(&self, text: &str, context: &QuoteContext) -> QuotationOutput {
        let correlation_id =
            context.correlation_id.clone().unwrap_or_else(|| format!("req-{}", Uuid::new_v4()));
        let snapshot = self.catalog.current();

        let classification = self.engines.classifier.classify(text, context.mode_override);
        let mode = classification.mode;
        let parsed = self.engines.parser.parse(text);
        let (request, assumptions_used) =
            apply_assumptions(&parsed, mode, &self.defaults, &snapshot.rules);
        let risk = self.engines.risk.assess(&request, &snapshot.rules);
        let bom = self.engines.bom.expand(&request, &snapshot.rules);
        let pricing = self.engines.pricing.price(&bom, &snapshot.prices);
        let validation = self.engines.validation.validate(&ValidationInput {
            request: &request,
            risk: &risk,
            bom: &bom,
            pricing: &pricing,
            mode,
        });

        let status = derive_status(mode, &risk, &validation);
        let confidence_score = confidence_score(classification.confidence, risk.total);

        tracing::info!(
            event_name = "quote.pipeline.completed",
            correlation_id = %correlation_id,
            mode = mode.as_str(),
            status = ?status,
            level = ?risk.level,
            sre = risk.total,
            "quotation pipeline completed"
        );

        QuotationOutput {
            id: QuotationId::generate(),
            correlation_id,
            created_at: Utc::now(),
            catalog_fingerprint: snapshot.fingerprint().to_string(),
            mode,
            level: risk.level,
            status,
            confidence_score,
            assumptions_used,
            classification,
            request,
            risk,
            bom,
            pricing,
            validation,
        }
    }
}

pub fn derive_status(
    mode: OperatingMode,
    risk: &SreResult,
    validation: &ValidationResult,
) -> QuotationStatus {
    if validation.has_mathematical_critical() {
        return QuotationStatus::Blocked;
    }

    match mode {
        OperatingMode::Formal => {
            if validation.critical_count > 0 || risk.level == RiskLevel::TechnicalBlock {
                QuotationStatus::Blocked
            } else if validation.warning_count > 0 || risk.level > RiskLevel::FormalCertified {
                QuotationStatus::RequiresReview
            } else {
                QuotationStatus::Validated
            }
        }
        OperatingMode::InternalEstimate => {
            if risk.span_exceeds_capacity() || risk.level == RiskLevel::TechnicalBlock {
                QuotationStatus::RequiresReview
            } else {
                QuotationStatus::Draft
            }
        }
        OperatingMode::Informational => QuotationStatus::Draft,
    }
}

/// Blend of classification confidence and inverse risk, in `[0, 1]`.
pub fn confidence_score(classification_confidence: f64, sre_total: u32) -> f64 {
    let risk_share = f64::from(sre_total.min(100)) / 100.0;
    let score = 0.3 * classification_confidence.clamp(0.0, 1.0) + 0.7 * (1.0 - risk_share);
    score.clamp(0.0, 1.0)
}

pub fn quote_batch<P>(pipeline: &P, items: &[BatchItem]) -> Vec<BatchResult>
where
    P: QuotationPipeline + ?Sized,
{
    items
        .iter()
        .map(|item| BatchResult {
            correlation_id: item.correlation_id.clone(),
            outcome: Ok(pipeline.quote(&item.text, &item.context())),
        })
        .collect()
}

/// Runs items on at most `max_workers` blocking tasks. Results are collected
/// in input order and each carries its item's correlation id.
pub async fn quote_batch_parallel<P>(
    pipeline: Arc<P>,
    items: Vec<BatchItem>,
    max_workers: usize,
) -> Vec<BatchResult>
where
    P: QuotationPipeline + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut handles = Vec::with_capacity(items.len());

    for item in items {
        let semaphore = semaphore.clone();
        let pipeline = pipeline.clone();
        let correlation_id = item.correlation_id.clone();
        let handle = tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.map_err(|error| {
                ApplicationError::BatchWorker {
                    correlation_id: item.correlation_id.clone(),
                    message: error.to_string(),
                }
            })?;
            let worker_id = item.correlation_id.clone();
            tokio::task::spawn_blocking(move || pipeline.quote(&item.text, &item.context()))
                .await
                .map_err(|error| ApplicationError::BatchWorker {
                    correlation_id: worker_id,
                    message: error.to_string(),
                })
        });
        handles.push((correlation_id, handle));
    }

    let mut results = Vec::with_capacity(handles.len());
    for (correlation_id, handle) in handles {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(error) => Err(ApplicationError::BatchWorker {
                correlation_id: correlation_id.clone(),
                message: error.to_string(),
            }),
        };
        if let Err(error) = &outcome {
            tracing::warn!(
                event_name = "quote.batch.item_failed",
                correlation_id = %correlation_id,
                error = %error,
                "batch item failed"
            );
        }
        results.push(BatchResult { correlation_id, outcome });
    }

    tracing::info!(
        event_name = "quote.batch.completed",
        items = results.len(),
        failed = results.iter().filter(|result| result.outcome.is_err()).count(),
        max_workers,
        "parallel batch completed"
    );

    results
}
