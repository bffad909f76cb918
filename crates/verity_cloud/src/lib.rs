//! # verity_cloud
//!
//! Control-plane access for verity: credential providers that turn ambient
//! environment configuration into an explicit [`Session`], and resource
//! inspectors that read the live state of a provisioned resource into a
//! typed [`ResourceSnapshot`].
//!
//! The Azure implementations talk to Azure AD (client credentials) and Azure
//! Resource Manager over HTTPS. Mocks are provided for tests.

pub mod credentials;
pub mod error;
pub mod inspector;
pub mod mock;
pub mod session;
pub mod snapshot;

pub use credentials::{AzureCredentialConfig, CredentialProvider, EnvironmentCredentials, StaticCredentials};
pub use error::{CloudError, CloudResult};
pub use inspector::{ArmInspector, ResourceInspector};
pub use mock::{MockCredentials, MockInspection, MockInspector};
pub use session::{AccessToken, Session};
pub use snapshot::{AttributeValue, ResourceSnapshot, ResourceTarget};
