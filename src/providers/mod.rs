pub mod backend;
pub mod external;
pub mod local;
pub mod util;

pub use backend::BackendRateSource;
pub use external::ExternalRateSource;
pub use local::{KvRateStore, LocalStoreSource, StoredRate};
