pub mod error;
pub mod protocol;

pub use error::FieldmarkError;
pub use protocol::{FieldDescriptor, Profile, TabId};
