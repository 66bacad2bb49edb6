//! ダンプヘッダ
//!
//! vmcore の先頭に置かれる固定レイアウトのヘッダ（LP64、リトルエンディアン）を解釈します。

use crate::memory::{c_string, field, MemoryReadable};
use crate::{DumpError, Result};

/// ダンプヘッダのマジック番号
pub const DUMP_MAGIC: u32 = 0xdefe_c8ed;
/// このツールが想定するダンプ形式のバージョン
pub const DUMP_VERSION: u32 = 10;
/// このツールが読めるワードサイズ
pub const DUMP_WORDSIZE: u32 = 64;
/// ヘッダ全体のバイト数
pub const DUMPHDR_SIZE: usize = 1912;

pub const SYS_NMLN: usize = 257;
pub const DUMP_PANICSIZE: usize = 200;
pub const DUMP_UUIDSIZE: usize = 37;

/// ダンプが有効
pub const DF_VALID: u32 = 0x0000_0001;
/// ダンプが完全
pub const DF_COMPLETE: u32 = 0x0000_0002;
/// 稼働中のシステムから取得したダンプ
pub const DF_LIVE: u32 = 0x0000_0004;
/// ページが圧縮されている
pub const DF_COMPRESSED: u32 = 0x0000_0008;
/// カーネルページのみ
pub const DF_KERNEL: u32 = 0x0000_0010;
/// 全ページ
pub const DF_ALL: u32 = 0x0000_0020;
/// カーネル + カレントプロセスのページ
pub const DF_CURPROC: u32 = 0x0000_0040;

pub(crate) const OFF_MAGIC: usize = 0;
pub(crate) const OFF_VERSION: usize = 4;
pub(crate) const OFF_FLAGS: usize = 8;
pub(crate) const OFF_WORDSIZE: usize = 12;
pub(crate) const OFF_START: usize = 16;
pub(crate) const OFF_KSYMS: usize = 24;
pub(crate) const OFF_PFN: usize = 32;
pub(crate) const OFF_MAP: usize = 40;
pub(crate) const OFF_DATA: usize = 48;
pub(crate) const OFF_UTSNAME: usize = 56;
pub(crate) const OFF_PLATFORM: usize = OFF_UTSNAME + 5 * SYS_NMLN;
pub(crate) const OFF_PANICSTRING: usize = OFF_PLATFORM + SYS_NMLN;
pub(crate) const OFF_CRASHTIME: usize = 1800;
pub(crate) const OFF_PAGESHIFT: usize = 1808;
pub(crate) const OFF_PAGESIZE: usize = 1816;
pub(crate) const OFF_HASHMASK: usize = 1824;
pub(crate) const OFF_NVTOP: usize = 1832;
pub(crate) const OFF_NPAGES: usize = 1840;
pub(crate) const OFF_KSYMS_SIZE: usize = 1848;
pub(crate) const OFF_KSYMS_CSIZE: usize = 1856;
pub(crate) const OFF_FM_PANIC: usize = 1864;
pub(crate) const OFF_UUID: usize = 1868;

/// uname(2) 相当のシステム識別文字列
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Utsname {
    pub sysname: String,
    pub nodename: String,
    pub release: String,
    pub version: String,
    pub machine: String,
}

/// ダンプヘッダ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpHeader {
    pub magic: u32,
    pub version: u32,
    pub flags: u32,
    pub wordsize: u32,
    /// ダンプデバイス上の開始オフセット
    pub start: i64,
    /// シンボルテーブルのファイルオフセット
    pub ksyms: i64,
    /// PFN テーブルのファイルオフセット
    pub pfn: i64,
    /// ページ変換マップのファイルオフセット
    pub map: i64,
    /// ページデータのファイルオフセット
    pub data: i64,
    pub utsname: Utsname,
    pub platform: String,
    pub panic_string: String,
    /// クラッシュ時刻（UNIX 時刻）
    pub crashtime: i64,
    pub pageshift: i64,
    pub pagesize: i64,
    pub hashmask: i64,
    /// ページ変換マップのエントリ数
    pub nvtop: i64,
    pub npages: u64,
    pub ksyms_size: u64,
    pub ksyms_csize: u64,
    pub fm_panic: u32,
    pub uuid: String,
}

/// ヘッダのバイト列からマジック番号だけを取り出す
pub fn peek_magic(bytes: &[u8]) -> Option<u32> {
    field(bytes, OFF_MAGIC)
}

impl DumpHeader {
    /// ヘッダ領域のバイト列をパースする
    ///
    /// マジック番号やバージョンの検証は行いません（[`crate::DumpImage::open`] が行います）。
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < DUMPHDR_SIZE {
            return Err(DumpError::Truncated {
                region: "dump header",
                offset: 0,
                len: DUMPHDR_SIZE as u64,
                size: bytes.len() as u64,
            });
        }

        let text = |offset: usize, len: usize| c_string(&bytes[offset..offset + len]);

        Ok(Self {
            magic: get(bytes, OFF_MAGIC)?,
            version: get(bytes, OFF_VERSION)?,
            flags: get(bytes, OFF_FLAGS)?,
            wordsize: get(bytes, OFF_WORDSIZE)?,
            start: get(bytes, OFF_START)?,
            ksyms: get(bytes, OFF_KSYMS)?,
            pfn: get(bytes, OFF_PFN)?,
            map: get(bytes, OFF_MAP)?,
            data: get(bytes, OFF_DATA)?,
            utsname: Utsname {
                sysname: text(OFF_UTSNAME, SYS_NMLN),
                nodename: text(OFF_UTSNAME + SYS_NMLN, SYS_NMLN),
                release: text(OFF_UTSNAME + 2 * SYS_NMLN, SYS_NMLN),
                version: text(OFF_UTSNAME + 3 * SYS_NMLN, SYS_NMLN),
                machine: text(OFF_UTSNAME + 4 * SYS_NMLN, SYS_NMLN),
            },
            platform: text(OFF_PLATFORM, SYS_NMLN),
            panic_string: text(OFF_PANICSTRING, DUMP_PANICSIZE),
            crashtime: get(bytes, OFF_CRASHTIME)?,
            pageshift: get(bytes, OFF_PAGESHIFT)?,
            pagesize: get(bytes, OFF_PAGESIZE)?,
            hashmask: get(bytes, OFF_HASHMASK)?,
            nvtop: get(bytes, OFF_NVTOP)?,
            npages: get(bytes, OFF_NPAGES)?,
            ksyms_size: get(bytes, OFF_KSYMS_SIZE)?,
            ksyms_csize: get(bytes, OFF_KSYMS_CSIZE)?,
            fm_panic: get(bytes, OFF_FM_PANIC)?,
            uuid: text(OFF_UUID, DUMP_UUIDSIZE),
        })
    }

    /// フラグを `VALID|COMPLETE|CRASH|KERNEL` 形式で表す
    ///
    /// 内容種別は KERNEL、CURPROC、ALL の順に最初に立っているものを1つだけ選びます。
    /// どれも立っていない場合は内容種別を省略します。
    pub fn flags_description(&self) -> String {
        let flags = self.flags;
        let mut parts = vec![
            if flags & DF_VALID != 0 { "VALID" } else { "INVALID" },
            if flags & DF_COMPLETE != 0 { "COMPLETE" } else { "INCOMPLETE" },
            if flags & DF_LIVE != 0 { "LIVE" } else { "CRASH" },
        ];

        if flags & DF_KERNEL != 0 {
            parts.push("KERNEL");
        } else if flags & DF_CURPROC != 0 {
            parts.push("CURPROC");
        } else if flags & DF_ALL != 0 {
            parts.push("ALL");
        }

        parts.join("|")
    }

    /// ページサイズ（バイト）。[`crate::DumpImage::open`] で検証済みの値
    pub fn page_size(&self) -> u64 {
        u64::try_from(self.pagesize).unwrap_or(0)
    }

    /// OS イメージの UUID（未設定なら `None`）
    pub fn uuid(&self) -> Option<&str> {
        if self.uuid.is_empty() {
            None
        } else {
            Some(&self.uuid)
        }
    }

    /// ヘッダをバイト列に書き出す（合成ダンプ用）
    #[cfg(any(test, feature = "test-util"))]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; DUMPHDR_SIZE];

        let mut put = |offset: usize, bytes: &[u8]| {
            buf[offset..offset + bytes.len()].copy_from_slice(bytes);
        };
        let text = |s: &str, len: usize| -> Vec<u8> {
            let mut bytes = s.as_bytes().to_vec();
            bytes.truncate(len - 1);
            bytes
        };

        put(OFF_MAGIC, &self.magic.to_le_bytes());
        put(OFF_VERSION, &self.version.to_le_bytes());
        put(OFF_FLAGS, &self.flags.to_le_bytes());
        put(OFF_WORDSIZE, &self.wordsize.to_le_bytes());
        put(OFF_START, &self.start.to_le_bytes());
        put(OFF_KSYMS, &self.ksyms.to_le_bytes());
        put(OFF_PFN, &self.pfn.to_le_bytes());
        put(OFF_MAP, &self.map.to_le_bytes());
        put(OFF_DATA, &self.data.to_le_bytes());
        put(OFF_UTSNAME, &text(&self.utsname.sysname, SYS_NMLN));
        put(OFF_UTSNAME + SYS_NMLN, &text(&self.utsname.nodename, SYS_NMLN));
        put(OFF_UTSNAME + 2 * SYS_NMLN, &text(&self.utsname.release, SYS_NMLN));
        put(OFF_UTSNAME + 3 * SYS_NMLN, &text(&self.utsname.version, SYS_NMLN));
        put(OFF_UTSNAME + 4 * SYS_NMLN, &text(&self.utsname.machine, SYS_NMLN));
        put(OFF_PLATFORM, &text(&self.platform, SYS_NMLN));
        put(OFF_PANICSTRING, &text(&self.panic_string, DUMP_PANICSIZE));
        put(OFF_CRASHTIME, &self.crashtime.to_le_bytes());
        put(OFF_PAGESHIFT, &self.pageshift.to_le_bytes());
        put(OFF_PAGESIZE, &self.pagesize.to_le_bytes());
        put(OFF_HASHMASK, &self.hashmask.to_le_bytes());
        put(OFF_NVTOP, &self.nvtop.to_le_bytes());
        put(OFF_NPAGES, &self.npages.to_le_bytes());
        put(OFF_KSYMS_SIZE, &self.ksyms_size.to_le_bytes());
        put(OFF_KSYMS_CSIZE, &self.ksyms_csize.to_le_bytes());
        put(OFF_FM_PANIC, &self.fm_panic.to_le_bytes());
        put(OFF_UUID, &text(&self.uuid, DUMP_UUIDSIZE));

        buf
    }
}

fn get<T: MemoryReadable>(bytes: &[u8], offset: usize) -> Result<T> {
    field(bytes, offset)
        .ok_or_else(|| DumpError::BadHeader(format!("field at offset {} out of range", offset)))
}
