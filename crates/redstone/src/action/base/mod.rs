pub mod create_directory;
pub mod create_file;
pub mod download_server_jar;
pub mod write_record;

pub use create_directory::CreateDirectory;
pub use create_file::CreateFile;
pub use download_server_jar::DownloadServerJar;
pub use write_record::{CreateLink, WriteServerRecord};
