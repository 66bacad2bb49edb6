//! クラッシュの概要
//!
//! どの節を表示する場合でも最初に出力する、ダンプの出所とクラッシュの要約です。

use crate::size::format_size;
use crate::timefmt;
use crate::Result;
use std::fmt;
use std::path::PathBuf;
use vmsift_image::memory::c_string;
use vmsift_image::DumpImage;

pub const HW_SERIAL: &str = "hw_serial";
pub const PHYSMEM: &str = "physmem";

/// `hw_serial` のバイト数（10進数の文字列）
pub const HW_SERIAL_LEN: usize = 11;

/// クラッシュの概要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashSummary {
    pub path: PathBuf,
    pub wordsize: u32,
    pub nodename: String,
    pub release: String,
    pub version: String,
    pub machine: String,
    /// `hw_serial` から得たホスト ID
    pub hostid: u32,
    pub uuid: Option<String>,
    /// 物理メモリのページ数
    pub physmem: i32,
    /// 物理メモリのバイト数
    pub physmem_bytes: u64,
    pub panic_message: String,
    pub crashtime: i64,
    /// ダンプファイルのバイト数
    pub core_size: u64,
}

/// ダンプから概要を作る
pub fn summarize(image: &DumpImage) -> Result<CrashSummary> {
    let header = image.header();
    let symbols = image.resolve(&[HW_SERIAL, PHYSMEM])?;

    let serial = image.read_symbol(symbols.get(HW_SERIAL)?, HW_SERIAL_LEN)?;
    let physmem: i32 = image.read_symbol_typed(symbols.get(PHYSMEM)?)?;
    let pages = u64::try_from(physmem).unwrap_or(0);

    Ok(CrashSummary {
        path: image.path().to_path_buf(),
        wordsize: header.wordsize,
        nodename: header.utsname.nodename.clone(),
        release: header.utsname.release.clone(),
        version: header.utsname.version.clone(),
        machine: header.utsname.machine.clone(),
        hostid: atoi(&c_string(&serial)) as u32,
        uuid: header.uuid().map(str::to_string),
        physmem,
        physmem_bytes: pages.saturating_mul(header.page_size()),
        panic_message: header.panic_string.clone(),
        crashtime: header.crashtime,
        core_size: image.size(),
    })
}

/// 先頭の空白と符号に続く10進数を読む。数字以外で止まり、桁あふれは折り返す
fn atoi(text: &str) -> i32 {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i32, |acc, d| acc.wrapping_mul(10).wrapping_add(i32::from(d - b'0')));

    if negative {
        value.wrapping_neg()
    } else {
        value
    }
}

impl fmt::Display for CrashSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "core file {} ({}-bit) from {}",
            self.path.display(),
            self.wordsize,
            self.nodename
        )?;
        writeln!(
            f,
            "operation system: {} {} ({})",
            self.release, self.version, self.machine
        )?;
        writeln!(f, "hostid: {:x}", self.hostid)?;
        writeln!(f, "image uuid: {}", self.uuid.as_deref().unwrap_or("(not set)"))?;
        writeln!(
            f,
            "physmem: {} ({})",
            self.physmem,
            format_size(self.physmem_bytes)
        )?;
        writeln!(f, "panic message: {}", self.panic_message)?;
        writeln!(f, "crashtime: {}", timefmt::ctime(self.crashtime))?;
        writeln!(
            f,
            "core size: {} ({})",
            self.core_size,
            format_size(self.core_size)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmsift_image::synthetic::DumpBuilder;
    use vmsift_image::DumpError;

    const SERIAL_ADDR: u64 = 0xffff_ffff_fbc5_0000;
    const PHYSMEM_ADDR: u64 = 0xffff_ffff_fbc5_0010;

    #[test]
    fn test_atoi() {
        assert_eq!(atoi("847388231"), 847388231);
        assert_eq!(atoi("  12abc"), 12);
        assert_eq!(atoi("-5"), -5);
        assert_eq!(atoi(""), 0);
        assert_eq!(atoi("serial"), 0);
        assert_eq!(atoi("4294967295"), -1);
    }

    #[test]
    fn test_summarize() {
        let mut builder = DumpBuilder::new();
        builder
            .symbol(HW_SERIAL, SERIAL_ADDR)
            .symbol(PHYSMEM, PHYSMEM_ADDR)
            .write(SERIAL_ADDR, b"847388231\0")
            .write_i32(PHYSMEM_ADDR, 262144);
        let file = builder.write_temp().unwrap();
        let image = DumpImage::open(file.path()).unwrap();

        let summary = summarize(&image).unwrap();
        assert_eq!(summary.hostid, 0x3282_1e47);
        assert_eq!(summary.physmem, 262144);
        assert_eq!(summary.physmem_bytes, 1 << 30);
        assert_eq!(summary.core_size, image.size());

        let text = summary.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 8);
        assert_eq!(
            lines[0],
            format!("core file {} (64-bit) from testhost", file.path().display())
        );
        assert_eq!(lines[1], "operation system: 5.11 illumos-1d0e3e0b (i86pc)");
        assert_eq!(lines[2], "hostid: 32821e47");
        assert_eq!(lines[3], "image uuid: 6b1a0f3e-2c4d-4e5f-8a9b-0c1d2e3f4a5b");
        assert_eq!(lines[4], "physmem: 262144 (1G)");
        assert_eq!(lines[5], "panic message: forced crash dump initiated at user request");
        assert_eq!(lines[6], format!("crashtime: {}", timefmt::ctime(1_530_000_000)));
        assert_eq!(
            lines[7],
            format!("core size: {} ({})", image.size(), format_size(image.size()))
        );
    }

    #[test]
    fn test_uuid_not_set() {
        let mut builder = DumpBuilder::new();
        builder.header_mut().uuid.clear();
        builder
            .symbol(HW_SERIAL, SERIAL_ADDR)
            .symbol(PHYSMEM, PHYSMEM_ADDR)
            .write_i32(PHYSMEM_ADDR, 1);
        let file = builder.write_temp().unwrap();
        let image = DumpImage::open(file.path()).unwrap();

        let summary = summarize(&image).unwrap();
        assert_eq!(summary.uuid, None);
        assert_eq!(summary.hostid, 0);
        assert!(summary.to_string().contains("image uuid: (not set)\n"));
    }

    #[test]
    fn test_missing_physmem() {
        let mut builder = DumpBuilder::new();
        builder.symbol(HW_SERIAL, SERIAL_ADDR).write(SERIAL_ADDR, b"1\0");
        let file = builder.write_temp().unwrap();
        let image = DumpImage::open(file.path()).unwrap();

        match summarize(&image) {
            Err(DumpError::SymbolLookupFailed(name)) => assert_eq!(name, PHYSMEM),
            other => panic!("expected SymbolLookupFailed, got {:?}", other),
        }
    }
}
