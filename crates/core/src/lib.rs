pub mod config;
pub mod cpq;
pub mod domain;
pub mod errors;
pub mod quality;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use cpq::assumptions::AssumptionDefaults;
pub use cpq::catalog::{CatalogError, CatalogHandle, CatalogSnapshot};
pub use cpq::classifier::{ClassificationResult, RequestType};
pub use cpq::risk::{RiskBands, RiskLevel, SreResult};
pub use cpq::{
    quote_batch, quote_batch_parallel, BatchItem, BatchResult, DefaultQuotationPipeline,
    PipelineSettings, QuotationPipeline, QuoteContext,
};
pub use domain::quotation::{OperatingMode, QuotationId, QuotationOutput, QuotationStatus};
pub use domain::request::QuoteRequest;
pub use errors::{ApplicationError, InterfaceError};
pub use quality::harness::{
    default_regression_cases, run_regression, run_stress, RegressionCase, RegressionSummary,
    StressConfig, StressReport,
};
pub use quality::{DeterministicQualityEvaluator, QualityEvaluator, QualityReport};
