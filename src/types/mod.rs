//! Public types for the Tessera API.

mod crisis;
mod feature;
mod generate;

pub use crisis::{ContactMethod, CrisisResource, CrisisResult};
pub use feature::{Feature, FeatureOutcome, FeatureResponse, ReflectionInput, ResponseSource};
pub use generate::{GenerateParams, InferenceOutcome, InferenceRequest};
