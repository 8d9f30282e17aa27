pub mod resource;

pub use resource::{NamedArgs, Param, Resource, Signature};
