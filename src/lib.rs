pub mod config;
pub mod credentials;
pub mod error;
pub mod fetch;
pub mod load;
pub mod pipeline;
pub mod table;
pub mod transform;

pub use config::Config;
pub use error::{FetchError, PipelineError, Result};
pub use pipeline::run;
