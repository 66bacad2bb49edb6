//! ダンプイメージ操作のエラー型

use std::path::PathBuf;
use thiserror::Error;

/// ダンプイメージのオープン・シンボル解決・読み取りで発生するエラー
///
/// どのエラーもデコーダ側では回復せず、そのまま呼び出し元へ伝播します。
#[derive(Error, Debug)]
pub enum DumpError {
    /// ダンプファイルが存在しない
    #[error("cannot stat {}", .0.display())]
    NotFound(PathBuf),

    /// マジック番号がクラッシュダンプのものではない
    #[error("{} is not a kernel core file (bad magic number {magic:x})", .path.display())]
    NotACrashImage { path: PathBuf, magic: u32 },

    /// ヘッダが指す領域がファイルに収まっていない
    #[error("{region} out of bounds: {len} bytes at offset {offset} (file size {size})")]
    Truncated {
        region: &'static str,
        offset: u64,
        len: u64,
        size: u64,
    },

    /// ヘッダの値が矛盾している
    #[error("invalid dump header: {0}")]
    BadHeader(String),

    /// このツールが読めないワードサイズ
    #[error("unsupported dump word size {0} (expected 64)")]
    UnsupportedWordSize(u32),

    /// 埋め込みシンボルテーブルを解釈できない
    #[error("kernel symbol table error: {0}")]
    BadSymbolTable(String),

    /// シンボルがこのダンプのシンボルテーブルに存在しない
    #[error("symbol lookup error: {0}")]
    SymbolLookupFailed(String),

    /// 仮想アドレスの読み取りに失敗した
    #[error("read error: {len} bytes at {addr:#x}")]
    ReadFailed { addr: u64, len: usize },

    /// シンボルが指すアドレスの読み取りに失敗した
    #[error("read error: {symbol} ({addr:#x})")]
    SymbolReadFailed { symbol: String, addr: u64 },

    /// ログバッファのリンクリストが壊れている
    #[error("corrupt log chain at {addr:#x}: {reason}")]
    CorruptLogChain { addr: u64, reason: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
