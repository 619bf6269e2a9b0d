//! Infrastructure configuration modules.

pub mod dispatcher;
pub mod logging;
pub mod reconciler;
pub mod retention;
pub mod settings;

pub use dispatcher::DispatcherConfig;
pub use logging::LoggingConfig;
pub use reconciler::ReconcilerConfig;
pub use retention::RetentionConfig;
pub use settings::Config;
