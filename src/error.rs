use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Dimension must be named")]
    UnnamedDimension,

    #[error("Dimension '{name}' appears more than once")]
    DuplicateDimension { name: String },

    #[error("Dimension '{name}' not found in table with dimensions {dims:?}")]
    MissingDimension { name: String, dims: Vec<String> },

    #[error("Categorical dimension '{name}' must have exactly two labels, got {count}")]
    NotBinary { name: String, count: usize },

    #[error("Column '{name}' not found")]
    MissingColumn { name: String },

    #[error("Column '{name}' has {actual} values, table has {expected} rows")]
    ColumnLength { name: String, expected: usize, actual: usize },

    #[error("Cannot join dimensions {left:?} with {right:?}")]
    DimensionMismatch { left: Vec<String>, right: Vec<String> },

    #[error("Key {key} not found in source table")]
    MissingKey { key: String },

    #[error("Key {key} appears more than once")]
    DuplicateKey { key: String },

    #[error("Unrecognized {axis} option '{value}'")]
    UnknownOption { axis: &'static str, value: String },

    #[error("Invalid return period {value}: must be finite and positive")]
    InvalidReturnPeriod { value: f64 },

    #[error("Return periods mix the default sentinel with numeric periods")]
    MixedReturnPeriods,

    #[error("Economy '{economy}' has negative protection {protection}")]
    NegativeProtection { economy: String, protection: f64 },

    #[error("Economy '{economy}' has zero protection but hazard data carries no return periods")]
    ZeroProtection { economy: String },

    #[error("Economy '{economy}' has welfare elasticity 1, which the isoelastic welfare function does not cover")]
    UnitElasticity { economy: String },

    #[error("Parameter '{name}' = {value} outside [0, 1]")]
    OutOfUnitRange { name: &'static str, value: f64 },

    #[error("Hazard records are inconsistent: {detail}")]
    InconsistentHazardRecords { detail: String },

    #[error("Invalid {distribution} parameters: {detail}")]
    InvalidDistribution { distribution: &'static str, detail: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ModelResult<T> = Result<T, ModelError>;
