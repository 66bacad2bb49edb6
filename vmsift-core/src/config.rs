//! デコード設定

use crate::msgbuf::LOG_LINE_MAX;

/// デコード設定
#[derive(Debug, Clone)]
pub struct DecodeConfig {
    /// ログエントリにタイムスタンプを付ける
    pub verbose: bool,
    /// ログ1行の最大バイト数
    pub max_line_bytes: usize,
    /// ログバッファをたどる最大ノード数（`None` ならイメージサイズから決める）
    pub max_log_entries: Option<usize>,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            max_line_bytes: LOG_LINE_MAX,
            max_log_entries: None,
        }
    }
}
