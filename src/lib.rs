pub mod chunkio;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod features;
pub mod pipeline;
pub mod reassembly;
pub mod scorer;
pub mod server;

pub use config::Config;
pub use dispatcher::{Alert, AlertDispatcher};
pub use domain::DomainExtractor;
pub use features::FeatureVector;
pub use pipeline::Pipeline;
pub use reassembly::{CompletedMessage, ReassemblyStore, ReceiveOutcome};
pub use scorer::Scorer;
