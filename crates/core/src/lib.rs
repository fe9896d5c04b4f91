pub mod config;
pub mod job;
pub mod lease;
pub mod metrics;
pub mod orchestrator;
pub mod shutdown;
pub mod store;
pub mod testing;
pub mod token;
pub mod transcoder;
pub mod worker;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError, LogFormat, SanitizedConfig,
};
pub use job::{EncodeRequest, HostIdentity, HostIdentityError, Lease, LeaseStatus, SourceJob};
pub use lease::{LeaseConfig, LeaseError, LeaseManager, ReleaseSummary};
pub use orchestrator::{
    EncodeOrchestrator, OrchestratorConfig, OrchestratorError, OrchestratorStatus, StatusHandle,
};
pub use shutdown::{install_shutdown_handler, ShutdownCoordinator, ShutdownError};
pub use store::{JobStore, OutputSink, S3Store, StorageConfig, StoreError};
pub use token::{TokenError, TokenIssuer};
pub use transcoder::{FfmpegTranscoder, Transcoder, TranscoderConfig, TranscoderError};
pub use worker::{CompletionPipeline, CompletionReport, EncodeWorker, WorkerStats};
