pub mod error;
pub mod coerce;
pub mod config;
pub mod observer;
pub mod table;
pub mod aggregate;
pub mod valve;
pub mod events;
pub mod master;
pub mod outputs;
pub mod summary;
pub mod pipeline;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use master::{MasterRecordBuilder, MasterRow, MasterTable};
pub use observer::{CollectingObserver, PipelineObserver, PipelineWarning, TracingObserver};
pub use pipeline::{run_pipeline, PipelineInputs, PipelineOutput, SourcePaths};
