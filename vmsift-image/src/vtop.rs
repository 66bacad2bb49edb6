//! ページ変換マップ（仮想アドレス -> ファイルオフセット）
//!
//! マップはアドレス空間と仮想ページの組をキーとするハッシュ表です。
//! 各エントリの `first` がそのバケットのチェーン先頭（ファイルオフセット）を持ち、
//! チェーンは `next` でたどります。オフセット 0 がチェーンの終端です。

use crate::memory::field;
use tracing::warn;

/// マップエントリ1個のバイト数
pub const DUMP_MAP_ENTRY_SIZE: usize = 40;

/// マップエントリ
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapEntry {
    /// このバケットのチェーン先頭のファイルオフセット
    pub first: i64,
    /// チェーン上の次エントリのファイルオフセット
    pub next: i64,
    /// ページデータのファイルオフセット
    pub data: i64,
    /// アドレス空間（`struct as` のアドレス）
    pub as_addr: u64,
    /// ページ境界に揃えた仮想アドレス
    pub va: u64,
}

impl MapEntry {
    fn parse(bytes: &[u8]) -> Self {
        Self {
            first: field(bytes, 0).unwrap_or(0),
            next: field(bytes, 8).unwrap_or(0),
            data: field(bytes, 16).unwrap_or(0),
            as_addr: field(bytes, 24).unwrap_or(0),
            va: field(bytes, 32).unwrap_or(0),
        }
    }

    /// エントリをバイト列に書き出す（合成ダンプ用）
    #[cfg(any(test, feature = "test-util"))]
    pub fn encode(&self) -> [u8; DUMP_MAP_ENTRY_SIZE] {
        let mut buf = [0u8; DUMP_MAP_ENTRY_SIZE];
        buf[0..8].copy_from_slice(&self.first.to_le_bytes());
        buf[8..16].copy_from_slice(&self.next.to_le_bytes());
        buf[16..24].copy_from_slice(&self.data.to_le_bytes());
        buf[24..32].copy_from_slice(&self.as_addr.to_le_bytes());
        buf[32..40].copy_from_slice(&self.va.to_le_bytes());
        buf
    }
}

/// アドレス空間と仮想アドレスからバケット番号を求める
pub fn dump_hash(as_addr: u64, va: u64, pageshift: u32, hashmask: u64) -> u64 {
    ((as_addr >> 3).wrapping_add(va >> pageshift)) & hashmask
}

/// ページ変換マップ
pub struct PageMap {
    /// マップ領域のファイルオフセット
    base: u64,
    entries: Vec<MapEntry>,
    hashmask: u64,
    pageshift: u32,
}

impl PageMap {
    /// マップ領域のバイト列からページ変換マップを作成する
    pub fn new(base: u64, bytes: &[u8], hashmask: u64, pageshift: u32) -> Self {
        let entries = bytes
            .chunks_exact(DUMP_MAP_ENTRY_SIZE)
            .map(MapEntry::parse)
            .collect();

        Self {
            base,
            entries,
            hashmask,
            pageshift,
        }
    }

    /// エントリ数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// ファイルオフセットが指すエントリを取得する
    fn entry_at(&self, offset: i64) -> Option<&MapEntry> {
        let rel = u64::try_from(offset).ok()?.checked_sub(self.base)?;
        if rel % DUMP_MAP_ENTRY_SIZE as u64 != 0 {
            return None;
        }
        self.entries.get(usize::try_from(rel / DUMP_MAP_ENTRY_SIZE as u64).ok()?)
    }

    /// 仮想アドレスをファイルオフセットに変換する
    ///
    /// 該当ページがダンプに含まれていない場合は `None` を返します。
    /// チェーンはエントリ数を超えてたどりません。
    pub fn lookup(&self, as_addr: u64, va: u64) -> Option<u64> {
        let pagesize = 1u64.checked_shl(self.pageshift)?;
        let pageoff = va & (pagesize - 1);
        let page = va - pageoff;

        let bucket = dump_hash(as_addr, page, self.pageshift, self.hashmask);
        let mut offset = self.entries.get(usize::try_from(bucket).ok()?)?.first;
        let mut hops = 0usize;

        while offset != 0 {
            if hops >= self.entries.len() {
                warn!("page map chain for {:#x} does not terminate", page);
                return None;
            }

            let entry = self.entry_at(offset)?;
            if entry.as_addr == as_addr && entry.va == page {
                return u64::try_from(entry.data).ok()?.checked_add(pageoff);
            }

            offset = entry.next;
            hops += 1;
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KAS: u64 = 0xffff_ffff_fbc3_0000;
    const BASE: u64 = 0x2000;

    /// 指定したページ群からマップ領域を組み立てる（先頭エントリから順に使う）
    fn build(pages: &[(u64, i64)], nvtop: usize, hashmask: u64) -> Vec<u8> {
        let mut entries = vec![MapEntry::default(); nvtop];

        for (i, &(va, data)) in pages.iter().enumerate() {
            let bucket = dump_hash(KAS, va, 12, hashmask) as usize;
            entries[i].as_addr = KAS;
            entries[i].va = va;
            entries[i].data = data;
            entries[i].next = entries[bucket].first;
            entries[bucket].first = (BASE + (i * DUMP_MAP_ENTRY_SIZE) as u64) as i64;
        }

        entries.iter().flat_map(|e| e.encode()).collect()
    }

    #[test]
    fn test_lookup_with_page_offset() {
        let bytes = build(&[(0xffff_ffff_fb80_0000, 0x10000)], 1, 0);
        let map = PageMap::new(BASE, &bytes, 0, 12);

        assert_eq!(map.lookup(KAS, 0xffff_ffff_fb80_0000), Some(0x10000));
        assert_eq!(map.lookup(KAS, 0xffff_ffff_fb80_0123), Some(0x10123));
        assert_eq!(map.lookup(KAS, 0xffff_ffff_fb80_1000), None);
        // アドレス空間が違えば一致しない
        assert_eq!(map.lookup(KAS + 8, 0xffff_ffff_fb80_0000), None);
    }

    #[test]
    fn test_lookup_collision_chain() {
        // hashmask=0 なので全ページが同じバケットに連結される
        let pages = [
            (0xffff_ffff_fb80_0000, 0x10000),
            (0xffff_ffff_fb80_1000, 0x11000),
            (0xffff_ffff_fb80_2000, 0x12000),
        ];
        let bytes = build(&pages, 4, 0);
        let map = PageMap::new(BASE, &bytes, 0, 12);
        assert_eq!(map.len(), 4);

        for (va, data) in pages {
            assert_eq!(map.lookup(KAS, va + 8), Some(data as u64 + 8));
        }
    }

    #[test]
    fn test_lookup_cyclic_chain_terminates() {
        let mut entry = MapEntry {
            first: BASE as i64,
            next: BASE as i64,
            data: 0x10000,
            as_addr: KAS,
            va: 0x1000,
        };
        // 自分自身を next に持つエントリ
        let map = PageMap::new(BASE, &entry.encode(), 0, 12);
        assert_eq!(map.lookup(KAS, 0x5000), None);

        // 範囲外オフセットを指すチェーン
        entry.first = 0x9999;
        let map = PageMap::new(BASE, &entry.encode(), 0, 12);
        assert_eq!(map.lookup(KAS, 0x1000), None);
    }
}
