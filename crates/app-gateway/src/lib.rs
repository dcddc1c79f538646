pub mod adapters;
pub mod admission;
pub mod artifact;
pub mod error;
pub mod guard;
pub mod orchestrator;
pub mod platform;
pub mod registry;
pub mod request;
pub mod settings;
pub mod temp_store;

pub use artifact::{MediaArtifact, MimeKind};
pub use error::{ErrorKind, GatewayError};
pub use orchestrator::{JobOutcome, RequestOrchestrator, SetupError, TerminalState};
pub use platform::{Platform, PlatformDetector, PlatformMatch};
pub use request::{Request, RequestKind};
pub use settings::GatewaySettings;

pub type GatewayResult = Result<MediaArtifact, GatewayError>;
