pub mod orchestrator;
pub mod report;

pub use orchestrator::{BacktestOrchestrator, RunProgress};
pub use report::{render_report, BacktestReport, InvestmentResult, PerformanceStats};
