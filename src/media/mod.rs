pub mod acquire;
pub mod extract;
pub mod registry;
pub mod store;
pub mod traits;

pub use acquire::MediaAcquirer;
pub use extract::extract;
pub use registry::Category;
pub use store::LocalMediaStore;
pub use traits::{
    AcquiredMedia, FetchedBody, MediaDescriptor, MediaStore, MediaTransport, ResolvedDownload,
    StoredMediaRecord,
};
