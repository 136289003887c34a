/// バイトコード構造化ライブラリ
///
/// デコード済みの命令列から制御構造を復元し、読みやすいソースに変換する

pub mod config;
pub mod error;
pub mod structuring;

pub use config::DecompileOptions;
pub use error::StructureError;
pub use structuring::{BodyDecompiler, DecompiledBody, ListingEntry};
