pub mod regressor;
pub mod store;

pub use regressor::{Artifact, Regressor};
pub use store::{ModelStore, ModelStoreError};
