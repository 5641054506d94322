//! Storage for the rollup node: the canonical message log, the extraction database and the
//! ancient block store.

mod ancients;
pub use ancients::{AncientBlock, AncientStore, AncientTable};

mod error;
pub use error::{AncientError, DatabaseError, MessageStoreError};

mod extraction;
pub use extraction::{InMemoryExtractionDb, MessageExtractionDb};

mod message_store;
pub use message_store::{MessageStore, MessageStoreGuard, StoredMessage};

mod metrics;
