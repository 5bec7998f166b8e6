//! cappa-exec: Command execution abstraction
//!
//! Provides the command runner and executable resolver used by the installer,
//! plus local implementations of both

pub mod error;
pub mod local;
pub mod resolver;
pub mod result;
pub mod traits;

pub use error::ExecError;
pub use local::LocalRunner;
pub use resolver::CachingResolver;
pub use result::CommandResult;
pub use traits::{CommandRunner, ExecutableResolver};
