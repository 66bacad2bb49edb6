//! カーネルメッセージバッファのデコード
//!
//! `log_recentq` が指すキューから、メッセージブロック（`mblk_t`）の
//! リンクリストをたどって直近のログ行を取り出します。
//! 各ノードは制御ブロック（`log_ctl_t`）を `b_rptr` で、
//! 本文を持つ継続ブロックを `b_cont` で参照します。

use crate::config::DecodeConfig;
use crate::timefmt;
use crate::Result;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};
use vmsift_image::memory::{c_string, field};
use vmsift_image::{DumpError, DumpImage};

/// システムメッセージ節の見出し
pub const BANNER: &str = "============ system messages =============";

pub const LOG_RECENTQ: &str = "log_recentq";

/// ログ1行の最大バイト数
pub const LOG_LINE_MAX: usize = 1024;

/// `mblk_t` のバイト数
pub const MBLK_SIZE: usize = 64;
/// `log_ctl_t` のバイト数
pub const LOG_CTL_SIZE: usize = 32;
/// `queue_t` 内の `q_first` のオフセット
pub const QUEUE_FIRST_OFFSET: u64 = 8;

/// メッセージブロック（`mblk_t`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageBlock {
    pub next: u64,
    pub prev: u64,
    pub cont: u64,
    pub rptr: u64,
    pub wptr: u64,
    pub datap: u64,
}

impl MessageBlock {
    pub fn parse(buf: &[u8]) -> Option<Self> {
        Some(Self {
            next: field(buf, 0)?,
            prev: field(buf, 8)?,
            cont: field(buf, 16)?,
            rptr: field(buf, 24)?,
            wptr: field(buf, 32)?,
            datap: field(buf, 40)?,
        })
    }

    /// `b_rptr` から読み取る本文のバイト数
    ///
    /// 書き込み位置が読み取り位置より後ろにない場合は上限いっぱいを読みます。
    fn text_len(&self, max: usize) -> usize {
        match self.wptr.checked_sub(self.rptr) {
            Some(len) if len > 0 => usize::try_from(len).map_or(max, |len| len.min(max)),
            _ => max,
        }
    }
}

/// ログ制御ブロック（`log_ctl_t`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogControl {
    pub mid: i16,
    pub sid: i16,
    pub level: i8,
    pub flags: i16,
    /// ログ時刻（tick）
    pub ltime: i64,
    /// ログ時刻（UNIX 時刻）
    pub ttime: i64,
    pub seq_no: i32,
    pub pri: i32,
}

impl LogControl {
    pub fn parse(buf: &[u8]) -> Option<Self> {
        Some(Self {
            mid: field(buf, 0)?,
            sid: field(buf, 2)?,
            level: field(buf, 4)?,
            flags: field(buf, 6)?,
            ltime: field(buf, 8)?,
            ttime: field(buf, 16)?,
            seq_no: field(buf, 24)?,
            pri: field(buf, 28)?,
        })
    }
}

/// ログの1エントリ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// 制御ブロック（詳細表示を要求した場合のみ）
    pub control: Option<LogControl>,
    /// ログ行（末尾の改行を含む）
    pub text: String,
}

impl LogEntry {
    /// エントリの UNIX 時刻
    pub fn timestamp(&self) -> Option<i64> {
        self.control.map(|ctl| ctl.ttime)
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(ttime) = self.timestamp() {
            write!(f, "{} ", timefmt::log_time(ttime))?;
        }
        write!(f, "{}", self.text)
    }
}

/// ログバッファのリンクリストを順にたどるイテレータ
///
/// 最初のエラーを返した後は何も返しません。
/// 同じノードを2回訪れた場合や、ノード数が上限を超えた場合は
/// [`DumpError::CorruptLogChain`] で終了します。
pub struct LogReader<'a> {
    image: &'a DumpImage,
    verbose: bool,
    max_line_bytes: usize,
    next: u64,
    visited: HashSet<u64>,
    limit: usize,
    done: bool,
}

impl<'a> LogReader<'a> {
    /// キューから走査開始位置を求める
    pub fn new(image: &'a DumpImage, config: &DecodeConfig) -> Result<Self> {
        let symbols = image.resolve(&[LOG_RECENTQ])?;
        let queue: u64 = image.read_symbol_typed(symbols.get(LOG_RECENTQ)?)?;

        // q_first -> b_next -> b_next が最初のメッセージ
        let mut start = 0;
        if queue != 0 {
            let q_first = queue
                .checked_add(QUEUE_FIRST_OFFSET)
                .ok_or(DumpError::ReadFailed { addr: queue, len: 8 })?;
            let first = image.read_ptr(q_first)?;
            if first != 0 {
                let second = read_block(image, first)?.next;
                if second != 0 {
                    start = read_block(image, second)?.next;
                }
            }
        }
        debug!("log queue at {:#x}, first message at {:#x}", queue, start);

        let limit = config.max_log_entries.unwrap_or_else(|| {
            usize::try_from(image.size() / MBLK_SIZE as u64).unwrap_or(usize::MAX)
        });

        Ok(Self {
            image,
            verbose: config.verbose,
            max_line_bytes: config.max_line_bytes,
            next: start,
            visited: HashSet::new(),
            limit,
            done: false,
        })
    }

    fn read_entry(&mut self) -> Result<Option<LogEntry>> {
        let addr = self.next;
        if addr == 0 {
            return Ok(None);
        }

        if !self.visited.insert(addr) {
            warn!("log chain revisits {:#x}", addr);
            return Err(DumpError::CorruptLogChain {
                addr,
                reason: "node visited twice",
            });
        }
        if self.visited.len() > self.limit {
            warn!("log chain exceeds {} nodes", self.limit);
            return Err(DumpError::CorruptLogChain {
                addr,
                reason: "too many nodes",
            });
        }

        let node = read_block(self.image, addr)?;

        let control = if self.verbose {
            let buf = self.image.read(node.rptr, LOG_CTL_SIZE)?;
            LogControl::parse(&buf)
        } else {
            None
        };

        let cont = read_block(self.image, node.cont)?;
        let line = self.image.read(cont.rptr, cont.text_len(self.max_line_bytes))?;

        self.next = node.next;
        Ok(Some(LogEntry {
            control,
            text: c_string(&line),
        }))
    }
}

impl Iterator for LogReader<'_> {
    type Item = Result<LogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.read_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn read_block(image: &DumpImage, addr: u64) -> Result<MessageBlock> {
    let buf = image.read(addr, MBLK_SIZE)?;
    MessageBlock::parse(&buf).ok_or(DumpError::ReadFailed {
        addr,
        len: MBLK_SIZE,
    })
}

/// カーネルメッセージを読み取るイテレータを作る
pub fn read_messages<'a>(image: &'a DumpImage, config: &DecodeConfig) -> Result<LogReader<'a>> {
    LogReader::new(image, config)
}
