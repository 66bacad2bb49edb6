//! vmsift クラッシュダンプ解析のコア機能
//!
//! このクレートは、ダンプイメージ上の固定構造をデコードします。
//! ダンプヘッダ、パニック情報、カーネルメッセージのリングバッファ、
//! カーネルチューナブルのスナップショット、クラッシュの概要を扱います。

pub mod config;
pub mod dumphdr;
pub mod msgbuf;
pub mod panic;
pub mod session;
pub mod size;
pub mod summary;
pub mod timefmt;
pub mod tunables;

pub use config::DecodeConfig;
pub use dumphdr::DumpHeaderReport;
pub use msgbuf::{LogControl, LogEntry, LogReader};
pub use panic::{PanicPair, PanicRecord};
pub use session::Session;
pub use size::format_size;
pub use summary::CrashSummary;
pub use tunables::{Tunable, TunableSet};

// 他のクレートから使用するために再エクスポート
pub use vmsift_image::{DumpError, DumpHeader, DumpImage};

/// デコード処理の結果型
pub type Result<T> = vmsift_image::Result<T>;
