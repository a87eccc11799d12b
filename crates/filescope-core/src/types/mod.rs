mod analyzer;
mod common;
mod record;
mod signal;
mod view;

pub use analyzer::*;
pub use common::*;
pub use record::*;
pub use signal::*;
pub use view::*;
