//! 解析セッション
//!
//! 開いたダンプイメージとデコード設定をまとめ、各デコーダを呼び出します。
//! イメージはセッションが所有し、セッションの破棄とともに閉じられます。

use crate::config::DecodeConfig;
use crate::dumphdr::DumpHeaderReport;
use crate::msgbuf::{self, LogReader};
use crate::panic::{self, PanicRecord};
use crate::summary::{self, CrashSummary};
use crate::tunables::{self, TunableSet};
use crate::Result;
use std::path::Path;
use tracing::debug;
use vmsift_image::DumpImage;

/// 解析セッション
pub struct Session {
    image: DumpImage,
    config: DecodeConfig,
}

impl Session {
    /// ダンプファイルを開いてセッションを作る
    pub fn open<P: AsRef<Path>>(path: P, config: DecodeConfig) -> Result<Self> {
        let image = DumpImage::open(path)?;
        debug!("decoding {} with {:?}", image.path().display(), config);
        Ok(Self::with_image(image, config))
    }

    /// 開いたイメージからセッションを作る
    pub fn with_image(image: DumpImage, config: DecodeConfig) -> Self {
        Self { image, config }
    }

    pub fn image(&self) -> &DumpImage {
        &self.image
    }

    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    /// クラッシュの概要
    pub fn summary(&self) -> Result<CrashSummary> {
        summary::summarize(&self.image)
    }

    /// ダンプヘッダの表示内容
    ///
    /// ヘッダはオープン時に読み込み済みなので追加の読み取りはありません。
    pub fn dump_header(&self) -> DumpHeaderReport<'_> {
        DumpHeaderReport::new(self.image.header())
    }

    /// パニック情報
    pub fn panic_record(&self) -> Result<PanicRecord> {
        panic::read_panic_record(&self.image)
    }

    /// カーネルメッセージ（1行ずつ読み取る）
    pub fn messages(&self) -> Result<LogReader<'_>> {
        msgbuf::read_messages(&self.image, &self.config)
    }

    /// チューナブルのスナップショット
    pub fn tunables(&self) -> Result<TunableSet> {
        tunables::read_tunables(&self.image)
    }
}
