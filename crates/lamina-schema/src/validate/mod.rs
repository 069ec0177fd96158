//! Schema evolution validation.

mod evolution;


pub use evolution::{EvolutionError, EvolutionOptions, ValidationResult, validate_evolution};
