pub mod config;
pub mod error;
pub mod graph;
pub mod store;
pub mod processor;
pub mod facade;
pub mod http;

pub use config::Config;
pub use error::{ProcgraphError, Result};
pub use facade::ProcessFacade;
pub use processor::{NodeList, QueryProcessor, StuffList, Subgraph};
