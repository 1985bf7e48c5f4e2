pub mod compare;
pub mod context;
pub mod engine;
pub mod evaluator;
