pub mod node;
pub mod path;
pub mod shadow;
pub mod config;
pub mod workspace;

pub use node::*;
pub use path::*;
pub use shadow::*;
pub use config::*;
pub use workspace::*;
