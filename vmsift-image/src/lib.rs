//! vmsift ダンプイメージアクセス
//!
//! このクレートは、カーネルクラッシュダンプ（vmcore）ファイルへの読み取り専用アクセスを提供します。
//! ダンプヘッダの検証、埋め込みシンボルテーブルによる名前解決、
//! ページ変換マップを使った仮想アドレスからの境界チェック付き読み取りを行います。

pub mod error;
pub mod header;
pub mod image;
pub mod memory;
pub mod nlist;
pub mod vtop;
#[cfg(any(test, feature = "test-util"))]
pub mod synthetic;

pub use error::DumpError;
pub use header::{DumpHeader, Utsname};
pub use image::DumpImage;
pub use memory::MemoryReadable;
pub use nlist::{ResolvedSymbol, SymbolBatch};
pub use vtop::PageMap;

/// ダンプイメージ操作の結果型
pub type Result<T> = std::result::Result<T, DumpError>;
