pub mod analysis_service;
pub mod score;

pub use analysis_service::AnalysisService;
