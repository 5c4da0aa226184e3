pub mod purge;
pub mod record;
pub mod writer;

pub use purge::MessagePurger;
pub use record::Record;
pub use writer::MessageWriter;
