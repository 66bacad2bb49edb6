//! 合成ダンプイメージの生成（テスト用）
//!
//! 実際の vmcore と同じ配置（ヘッダ、ksyms、ページ変換マップ、ページデータ）で
//! 小さなダンプファイルを組み立てます。

use crate::header::{
    DumpHeader, Utsname, DF_COMPLETE, DF_KERNEL, DF_VALID, DUMPHDR_SIZE, DUMP_MAGIC, DUMP_VERSION,
    DUMP_WORDSIZE,
};
use crate::image::KAS_SYMBOL;
use crate::vtop::{dump_hash, MapEntry, DUMP_MAP_ENTRY_SIZE};
use std::collections::BTreeMap;
use std::io::Write as _;
use vmsift_ksyms::writer::KsymsWriter;

/// 合成ダンプのページサイズ
pub const PAGE_SIZE: u64 = 4096;
const PAGE_SHIFT: u32 = 12;

/// 合成ダンプの `kas` のアドレス
pub const DEFAULT_KAS: u64 = 0xffff_ffff_fbc3_1000;

/// 合成ダンプ用のヘッダ雛形
pub fn template_header() -> DumpHeader {
    DumpHeader {
        magic: DUMP_MAGIC,
        version: DUMP_VERSION,
        flags: DF_VALID | DF_COMPLETE | DF_KERNEL,
        wordsize: DUMP_WORDSIZE,
        start: 0,
        ksyms: 0,
        pfn: 0,
        map: 0,
        data: 0,
        utsname: Utsname {
            sysname: "SunOS".to_string(),
            nodename: "testhost".to_string(),
            release: "5.11".to_string(),
            version: "illumos-1d0e3e0b".to_string(),
            machine: "i86pc".to_string(),
        },
        platform: "i86pc".to_string(),
        panic_string: "forced crash dump initiated at user request".to_string(),
        crashtime: 1_530_000_000,
        pageshift: PAGE_SHIFT as i64,
        pagesize: PAGE_SIZE as i64,
        hashmask: 0,
        nvtop: 0,
        npages: 0,
        ksyms_size: 0,
        ksyms_csize: 0,
        fm_panic: 0,
        uuid: "6b1a0f3e-2c4d-4e5f-8a9b-0c1d2e3f4a5b".to_string(),
    }
}

/// 合成ダンプビルダー
pub struct DumpBuilder {
    header: DumpHeader,
    kas: u64,
    symbols: Vec<(String, u64)>,
    /// ページ境界の仮想アドレス -> ページ内容
    pages: BTreeMap<u64, Vec<u8>>,
    raw_ksyms: Option<Vec<u8>>,
    omit_kas: bool,
}

impl DumpBuilder {
    pub fn new() -> Self {
        Self {
            header: template_header(),
            kas: DEFAULT_KAS,
            symbols: Vec::new(),
            pages: BTreeMap::new(),
            raw_ksyms: None,
            omit_kas: false,
        }
    }

    /// ヘッダの雛形を変更する（オフセットやサイズは build 時に上書きされる）
    pub fn header_mut(&mut self) -> &mut DumpHeader {
        &mut self.header
    }

    /// シンボルを追加する
    pub fn symbol(&mut self, name: &str, address: u64) -> &mut Self {
        self.symbols.push((name.to_string(), address));
        self
    }

    /// `kas` シンボルを ksyms に含めない
    pub fn without_kas(&mut self) -> &mut Self {
        self.omit_kas = true;
        self
    }

    /// ksyms を任意のバイト列に差し替える
    pub fn raw_ksyms(&mut self, bytes: Vec<u8>) -> &mut Self {
        self.raw_ksyms = Some(bytes);
        self
    }

    /// 仮想アドレスにデータを書き込む（ページは必要に応じて作られる）
    pub fn write(&mut self, va: u64, bytes: &[u8]) -> &mut Self {
        for (i, &b) in bytes.iter().enumerate() {
            let addr = va + i as u64;
            let page = addr & !(PAGE_SIZE - 1);
            let data = self
                .pages
                .entry(page)
                .or_insert_with(|| vec![0u8; PAGE_SIZE as usize]);
            data[(addr - page) as usize] = b;
        }
        self
    }

    pub fn write_u64(&mut self, va: u64, value: u64) -> &mut Self {
        self.write(va, &value.to_le_bytes())
    }

    pub fn write_i32(&mut self, va: u64, value: i32) -> &mut Self {
        self.write(va, &value.to_le_bytes())
    }

    /// ダンプファイルのバイト列を生成する
    pub fn build(&self) -> std::io::Result<Vec<u8>> {
        let ksyms = match &self.raw_ksyms {
            Some(bytes) => bytes.clone(),
            None => {
                let mut writer = KsymsWriter::new();
                if !self.omit_kas {
                    writer = writer.global(KAS_SYMBOL, self.kas);
                }
                for (name, address) in &self.symbols {
                    writer = writer.global(name, *address);
                }
                writer.write().map_err(|e| std::io::Error::other(e.to_string()))?
            }
        };

        let npages = self.pages.len();
        let nvtop = npages.max(1).next_power_of_two();
        let hashmask = nvtop as u64 - 1;

        let ksyms_off = align(DUMPHDR_SIZE as u64, PAGE_SIZE);
        let map_off = align(ksyms_off + ksyms.len() as u64, PAGE_SIZE);
        let data_off = align(map_off + (nvtop * DUMP_MAP_ENTRY_SIZE) as u64, PAGE_SIZE);

        let mut entries = vec![MapEntry::default(); nvtop];
        for (i, &va) in self.pages.keys().enumerate() {
            let bucket = dump_hash(self.kas, va, PAGE_SHIFT, hashmask) as usize;
            entries[i].as_addr = self.kas;
            entries[i].va = va;
            entries[i].data = (data_off + i as u64 * PAGE_SIZE) as i64;
            entries[i].next = entries[bucket].first;
            entries[bucket].first = (map_off + (i * DUMP_MAP_ENTRY_SIZE) as u64) as i64;
        }

        let mut header = self.header.clone();
        header.ksyms = ksyms_off as i64;
        header.ksyms_size = ksyms.len() as u64;
        header.ksyms_csize = ksyms.len() as u64;
        header.pfn = map_off as i64;
        header.map = map_off as i64;
        header.data = data_off as i64;
        header.hashmask = hashmask as i64;
        header.nvtop = nvtop as i64;
        header.npages = npages as u64;

        let mut out = header.encode();
        out.resize(ksyms_off as usize, 0);
        out.extend_from_slice(&ksyms);
        out.resize(map_off as usize, 0);
        for entry in &entries {
            out.extend_from_slice(&entry.encode());
        }
        out.resize(data_off as usize, 0);
        for data in self.pages.values() {
            out.extend_from_slice(data);
        }

        Ok(out)
    }

    /// 一時ファイルに書き出す
    pub fn write_temp(&self) -> std::io::Result<tempfile::NamedTempFile> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(&self.build()?)?;
        file.flush()?;
        Ok(file)
    }
}

impl Default for DumpBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn align(value: u64, to: u64) -> u64 {
    value.div_ceil(to) * to
}
