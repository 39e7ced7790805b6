pub mod enums;
pub mod document;
pub mod spec;
pub mod conflict;
pub mod money;
pub mod rfi;
pub mod finding;

pub use document::*;
pub use spec::*;
pub use conflict::*;
pub use money::*;
pub use rfi::*;
pub use finding::*;
