//! Nodes backed by the cookbook server.

mod cookbook_dir;
mod cookbooks_dir;
mod remote_cookbook;
mod root;

pub use cookbook_dir::CookbookDir;
pub use cookbooks_dir::{CookbooksDir, UploadOptions};
pub use remote_cookbook::RemoteCookbookSource;
pub use root::ServerRoot;
