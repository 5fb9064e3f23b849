//! Chart payloads for dashboard widgets
//!
//! Three entry points, kept separate:
//! - [`ChartAdapter`] reshapes a transformed [`daltek_ir::Table`] for a widget mapping
//! - [`builder`] builds EChart options directly from raw series and categories
//! - [`EChartTransformer`] post-processes an EChart option for rendering or export

use daltek_ir::DaltekError;
use thiserror::Error;

mod adapter;
pub mod builder;
mod transformer;

pub use adapter::ChartAdapter;
pub use builder::{build_chart, builder_for, BuildOutcome, BuilderConfig, ChartBuilder, ChartKind};
pub use transformer::{export_data, EChartTransformer, RenderInfo, RenderedWidget};

/// Colours used when a chart config does not supply its own
pub const DEFAULT_PALETTE: [&str; 8] = [
    "#2196F3", "#4CAF50", "#FF9800", "#F44336", "#9C27B0", "#00BCD4", "#FFEB3B", "#795548",
];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChartError {
    #[error("Column '{0}' does not exist in the data")]
    MissingColumn(String),

    #[error("Invalid chart configuration: {0}")]
    InvalidConfig(String),

    #[error("Chart type '{requested}' is not supported. Available types: {}", .available.join(", "))]
    UnknownChartType {
        requested: String,
        available: Vec<&'static str>,
    },

    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

impl From<ChartError> for DaltekError {
    fn from(err: ChartError) -> Self {
        match err {
            ChartError::MissingColumn(_) | ChartError::Validation(_) => DaltekError::Validation(err.to_string()),
            _ => DaltekError::InvalidSpec(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChartError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ChartError::Validation(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Validation failed: a; b");
        assert_eq!(DaltekError::from(err).kind(), "ValidationError");

        let err = ChartError::UnknownChartType {
            requested: "radar".into(),
            available: vec!["bar", "line"],
        };
        assert_eq!(err.to_string(), "Chart type 'radar' is not supported. Available types: bar, line");
        assert_eq!(DaltekError::from(err).kind(), "InvalidSpec");
    }
}
