//! Cookbook content: metadata, on-disk loading, and upload.

pub mod chefignore;
pub mod loader;
pub mod metadata;
pub mod uploader;
pub mod version;

pub use chefignore::Chefignore;
pub use loader::CookbookVersionLoader;
pub use metadata::CookbookMetadata;
pub use uploader::CookbookUploader;
pub use version::{CookbookFile, CookbookVersion};
