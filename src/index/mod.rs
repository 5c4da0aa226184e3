pub mod catalog;
pub mod deflector;
pub mod naming;

pub use catalog::{IndexCatalog, UNKNOWN_NODE};
pub use deflector::{Deflector, DeflectorTarget};
pub use naming::IndexNaming;
