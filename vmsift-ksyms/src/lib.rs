//! vmsift カーネルシンボルテーブル解析
//!
//! このクレートは、クラッシュダンプに埋め込まれた ksyms（ELF 形式のシンボルテーブル）を
//! 解析し、カーネル変数名から仮想アドレスへの解決を提供します。

pub mod loader;
pub mod symbols;
#[cfg(any(test, feature = "test-util"))]
pub mod writer;

pub use loader::KsymsLoader;
pub use symbols::{Symbol, SymbolResolver};

/// シンボルテーブル解析の結果型
pub type Result<T> = anyhow::Result<T>;
