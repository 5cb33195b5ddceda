pub mod config;
pub mod link;
pub mod linker;
pub mod package;
pub mod resolver;
pub mod runtime;
pub mod sync;
pub mod watch;

pub use config::{Config, Options, build_entries};
pub use linker::{Linker, Summary, run};
