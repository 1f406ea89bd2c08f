pub mod controller;
pub mod resolver;

pub use controller::{AppController, AppPaths, EnvLookup};
pub use resolver::{classify, IdentificationResolver};
