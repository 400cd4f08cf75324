mod application;
mod deployment;
mod initializer;
mod model;
mod mongo;

pub use application::*;
pub use deployment::*;
pub use initializer::*;
pub use model::*;
pub use mongo::*;
