//! パニック情報のデコード
//!
//! パニック時の CPU、スレッド、およびバージョン付きのパニックバッファを読み取ります。
//! パニックバッファは固定長で、先頭にバージョンとメッセージ位置を持つヘッダ、
//! 続いて (名前, 64ビット値) の組がメッセージ位置まで並びます。

use crate::Result;
use std::fmt;
use tracing::{debug, warn};
use vmsift_image::memory::{c_string, field};
use vmsift_image::DumpImage;

/// パニック情報節の見出し
pub const BANNER: &str = "=============== panic info ===============";

pub const PANIC_CPU: &str = "panic_cpu";
pub const PANIC_THREAD: &str = "panic_thread";
pub const PANICBUF: &str = "panicbuf";

/// パニックバッファのバイト数
pub const PANICBUFSIZE: usize = 8192;
/// 名前と値の組を解釈できるバッファ形式のバージョン
pub const PANICBUFVERS: i32 = 1;
/// 組の名前欄のバイト数
pub const PANICNVNAMELEN: usize = 16;

/// バッファ先頭の固定ヘッダ（version, msgoff）のバイト数
const PANIC_HEADER_SIZE: usize = 8;
/// 名前と値の組1個のバイト数
const PANIC_NV_SIZE: usize = PANICNVNAMELEN + 8;

/// パニックバッファ内の名前と値の組
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicPair {
    pub name: String,
    pub value: u64,
}

/// パニック情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicRecord {
    /// パニックした CPU の ID
    pub cpu_id: i32,
    /// パニックしたスレッドのアドレス
    pub thread: u64,
    /// バッファ形式のバージョン
    pub version: i32,
    /// パニックメッセージのバッファ内オフセット
    pub message_offset: i32,
    /// パニックメッセージ（バージョン不一致や不正なオフセットでは `None`）
    pub message: Option<String>,
    pub pairs: Vec<PanicPair>,
}

impl PanicRecord {
    /// パニックバッファを解釈する
    ///
    /// バージョンが [`PANICBUFVERS`] と一致しない場合はエラーにせず、
    /// 固定ヘッダの値だけを持つレコードを返します。
    /// メッセージ位置がバッファの範囲外の場合も同様です。
    pub fn parse(cpu_id: i32, thread: u64, buf: &[u8]) -> Self {
        let mut record = Self {
            cpu_id,
            thread,
            version: field(buf, 0).unwrap_or(0),
            message_offset: field(buf, 4).unwrap_or(0),
            message: None,
            pairs: Vec::new(),
        };

        if record.version != PANICBUFVERS {
            warn!(
                "panic buffer version {} (expected {}), skipping message and data",
                record.version, PANICBUFVERS
            );
            return record;
        }

        let msgoff = match usize::try_from(record.message_offset) {
            Ok(off) if (PANIC_HEADER_SIZE..=buf.len()).contains(&off) => off,
            _ => {
                warn!(
                    "panic message offset {} outside buffer of {} bytes",
                    record.message_offset,
                    buf.len()
                );
                return record;
            }
        };

        record.message = Some(c_string(&buf[msgoff..]));

        let count = (msgoff - PANIC_HEADER_SIZE) / PANIC_NV_SIZE;
        record.pairs = buf[PANIC_HEADER_SIZE..msgoff]
            .chunks_exact(PANIC_NV_SIZE)
            .take(count)
            .map(|nv| PanicPair {
                name: c_string(&nv[..PANICNVNAMELEN]),
                value: field(nv, PANICNVNAMELEN).unwrap_or(0),
            })
            .collect();

        debug!("decoded {} panic data pairs", record.pairs.len());
        record
    }
}

/// ダンプからパニック情報を読み取る
pub fn read_panic_record(image: &DumpImage) -> Result<PanicRecord> {
    let symbols = image.resolve(&[PANIC_CPU, PANIC_THREAD, PANICBUF])?;

    let cpu_id: i32 = image.read_symbol_typed(symbols.get(PANIC_CPU)?)?;
    let thread: u64 = image.read_symbol_typed(symbols.get(PANIC_THREAD)?)?;
    let buf = image.read_symbol(symbols.get(PANICBUF)?, PANICBUFSIZE)?;

    Ok(PanicRecord::parse(cpu_id, thread, &buf))
}

impl fmt::Display for PanicRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{:>16} {}", "cpu", self.cpu_id)?;
        writeln!(f, "{:>16} {:#x}", "thread", self.thread)?;

        if let Some(message) = &self.message {
            writeln!(f, "{:>16} {}", "message", message)?;
        }
        for pair in &self.pairs {
            writeln!(f, "{:>16} {:x}", pair.name, pair.value)?;
        }
        Ok(())
    }
}
