use thiserror::Error;

/// Custom error type for Solrec
///
/// This error type is used to wrap all possible errors that can occur when building a model,
/// evaluating expressions, recording a solve or querying a solution.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolrecError {
    #[error("Model error: {0}")]
    ModelError(#[from] ModelError),
    #[error("Discretisation error: {0}")]
    DiscretisationError(#[from] DiscretisationError),
    #[error("Evaluation error: {0}")]
    EvaluationError(#[from] EvaluationError),
    #[error("Solution error: {0}")]
    SolutionError(#[from] SolutionError),
    #[error("ODE solver error: {0}")]
    OdeSolverError(#[from] OdeSolverError),
    #[error("Error: {0}")]
    Other(String),
}

/// Errors raised while building a model or resolving names against it
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Variable '{name}' is not defined by the model")]
    UnknownVariable { name: String },
    #[error("Variable '{name}' is defined more than once")]
    DuplicateVariable { name: String },
    #[error("Parameter '{name}' is not defined by the model")]
    UnknownParameter { name: String },
    #[error("Builder error: {0}")]
    BuilderError(String),
}

/// Errors raised while fixing parameter values into a model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiscretisationError {
    #[error("Parameter '{parameter}' determines the model structure and cannot be an input parameter")]
    StructuralInput { parameter: String },
    #[error("No value given for parameter '{parameter}'")]
    MissingParameterValue { parameter: String },
    #[error("Initial conditions have length {found}, expected {expected}")]
    InitialConditionsSize { expected: usize, found: usize },
    #[error("Right-hand side has length {found}, expected {expected}")]
    RhsSize { expected: usize, found: usize },
}

/// Errors raised while evaluating an expression
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Input parameter '{name}' was not supplied")]
    MissingInput { name: String },
    #[error("Parameter '{name}' has no value, the model must be discretised before evaluation")]
    UnboundParameter { name: String },
    #[error("Cannot apply {op} to operands of shape {left} and {right}")]
    ShapeMismatch {
        op: &'static str,
        left: String,
        right: String,
    },
    #[error("State slice {start}..{end} is out of bounds for a state of length {len}")]
    StateIndexOutOfBounds { start: usize, end: usize, len: usize },
    #[error("Index {index} is out of bounds for a value of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("Cannot reduce an empty vector with {op}")]
    EmptyReduction { op: &'static str },
}

/// Errors raised while recording into or querying a solution
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolutionError {
    #[error("Variable '{name}' was not recorded during the solve, re-solve with '{name}' included in the output variables")]
    UnrecordedVariable { name: String },
    #[error("Cannot {action} a solution in the {state} state")]
    InvalidState { action: &'static str, state: String },
    #[error("Step time = {time} is not after the last recorded time = {last}")]
    NonIncreasingTime { time: f64, last: f64 },
    #[error("State has wrong length: expected {expected}, got {found}")]
    StateLengthMismatch { expected: usize, found: usize },
    #[error("Interpolation time = {time} is outside the recorded range [{start}, {end}]")]
    InterpolationTimeOutOfRange { time: f64, start: f64, end: f64 },
    #[error("Nothing has been recorded")]
    NoRecordedSteps,
}

/// Possible errors that can occur when stepping an ODE
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OdeSolverError {
    #[error(
        "Stop time = {} is less than current state time = {}",
        stop_time,
        state_time
    )]
    StopTimeBeforeCurrentTime { stop_time: f64, state_time: f64 },
    #[error("Stop time is at the current state time")]
    StopTimeAtCurrentTime,
    #[error("Exceeded maximum number of error test failures at time = {time}")]
    TooManyErrorTestFailures { time: f64 },
    #[error("Step size is too small at time = {time}")]
    StepSizeTooSmall { time: f64 },
    #[error("Right-hand side produced a non-finite value at time = {time}")]
    NonFiniteRhs { time: f64 },
    #[error("Invalid Tableau: {0}")]
    InvalidTableau(String),
    #[error("Error: {0}")]
    Other(String),
}

#[macro_export]
macro_rules! model_error {
    ($variant:ident) => {
        SolrecError::from(ModelError::$variant)
    };
    ($variant:ident { $($field:ident : $value:expr),* $(,)? }) => {
        SolrecError::from(ModelError::$variant { $($field: $value),* })
    };
    ($variant:ident, $($arg:tt)*) => {
        SolrecError::from(ModelError::$variant($($arg)*.to_string()))
    };
}

#[macro_export]
macro_rules! discretisation_error {
    ($variant:ident) => {
        SolrecError::from(DiscretisationError::$variant)
    };
    ($variant:ident { $($field:ident : $value:expr),* $(,)? }) => {
        SolrecError::from(DiscretisationError::$variant { $($field: $value),* })
    };
}

#[macro_export]
macro_rules! evaluation_error {
    ($variant:ident) => {
        SolrecError::from(EvaluationError::$variant)
    };
    ($variant:ident { $($field:ident : $value:expr),* $(,)? }) => {
        SolrecError::from(EvaluationError::$variant { $($field: $value),* })
    };
}

#[macro_export]
macro_rules! solution_error {
    ($variant:ident) => {
        SolrecError::from(SolutionError::$variant)
    };
    ($variant:ident { $($field:ident : $value:expr),* $(,)? }) => {
        SolrecError::from(SolutionError::$variant { $($field: $value),* })
    };
}

#[macro_export]
macro_rules! ode_solver_error {
    ($variant:ident) => {
        SolrecError::from(OdeSolverError::$variant)
    };
    ($variant:ident { $($field:ident : $value:expr),* $(,)? }) => {
        SolrecError::from(OdeSolverError::$variant { $($field: $value),* })
    };
    ($variant:ident, $($arg:tt)*) => {
        SolrecError::from(OdeSolverError::$variant($($arg)*.to_string()))
    };
}

#[macro_export]
macro_rules! other_error {
    ($msg:expr) => {
        SolrecError::Other($msg.to_string())
    };
}
