//! Remote service interfaces and the registration cache that decides, per run, whether each
//! artifact can be reused or must be registered again.

pub mod cache;
pub mod remote;

pub use cache::{ArtifactState, CacheError, RegistrationCache};
pub use remote::{Authorizations, CredentialProvider, FlowService, FunctionService};
