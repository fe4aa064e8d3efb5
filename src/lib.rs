//! # Solrec
//!
//! Solrec solves ODE models and records only the output variables you ask for. A model defines far
//! more variables than any one caller needs, and evaluating and storing all of them at every accepted
//! step is where most of the time and memory of a long simulation goes. Solrec evaluates the selected
//! variables as each step is accepted and keeps nothing else but the last state.
//!
//! ## Models
//!
//! A [Model] is built with a [ModelBuilder] from [Expression]s over the state vector, the time and
//! named parameters: a right-hand side, initial conditions and any number of named variables. Give
//! the model [ParameterValues] and call [Model::discretise] to get a [DiscretisedModel]. A parameter
//! can be left as [ParameterValue::Input], in which case its value is supplied to each solve in an
//! [Inputs] map instead, so that one discretised model serves many solves. Parameters declared with
//! [ModelBuilder::structural_parameter] change the shape of the model and must have a value.
//!
//! ## Choosing the output variables
//!
//! [OutputVariables::resolve] turns a list of variable names into a registry. Each registered variable
//! gets a [VariableId] and a [StepRecorder] evaluates it at every recorded step. A variable defined as
//! a [Expression::time_integral] or [Expression::discrete_sum] is accumulated step by step, so its
//! value covers the whole solve even though the states are not kept.
//!
//! An empty list leaves the outputs unrestricted. The recorder then keeps the full trajectory and
//! every model variable can be computed after the solve.
//!
//! ## Solving
//!
//! [Simulation] puts this together: discretise once, resolve the output variables, then
//! [Simulation::solve] for any number of [Inputs]. Each accepted step of the [ExplicitRk] solver is
//! recorded into a [Solution]. [Solution::get] returns the [RecordedSeries] of a variable, and fails
//! with [SolutionError::UnrecordedVariable] if the outputs were restricted and the variable was not
//! among them. A solve that fails part way through still leaves its recorded steps readable.
//!
//! To drive a solver yourself, implement [OdeSolverMethod] (or use [ExplicitRk] with your own [Rhs])
//! and call [record_solve], or record each step with [Solution::record].

pub mod error;
pub mod expression;
pub mod model;
pub mod ode_solver;
pub mod output;
pub mod recorder;
pub mod scalar;
pub mod simulation;
pub mod solution;
pub mod test_models;

pub use error::{
    DiscretisationError, EvaluationError, ModelError, OdeSolverError, SolrecError, SolutionError,
};
pub use expression::{Accumulation, Expression, ExpressionId, Inputs, Value};
pub use model::{
    DiscretisedModel, Model, ModelBuilder, ModelVariable, ParameterKind, ParameterValue,
    ParameterValues,
};
pub use ode_solver::{
    config::ExplicitRkConfig,
    explicit_rk::ExplicitRk,
    method::{OdeSolverMethod, OdeSolverStopReason, SolverStatistics},
    rhs::{Closure, ModelRhs, Rhs},
    tableau::{Tableau, TableauKind},
};
pub use output::{OutputVariable, OutputVariables, VariableId};
pub use recorder::StepRecorder;
pub use scalar::Scalar;
pub use simulation::{record_solve, Simulation, SimulationConfig};
pub use solution::{RecordedSeries, Solution, SolutionStatus, Termination};
