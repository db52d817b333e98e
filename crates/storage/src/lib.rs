pub mod conformance;
#[cfg(feature = "dynamodb")]
pub mod dynamodb;
mod error;
mod memory;
mod record;
mod traits;
mod write;

pub use error::{CancellationReason, StorageError};
pub use memory::MemoryStore;
pub use record::{AttributeValue, Item, ItemKey};
pub use traits::RecordStore;
pub use write::{Condition, PutItem, RenderedExpression, TransactWriteItem, UpdateItem};
