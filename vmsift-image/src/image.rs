//! ダンプイメージ
//!
//! クラッシュダンプファイルを開き、シンボル解決と仮想アドレスからの読み取りを提供します。

use crate::header::{peek_magic, DUMPHDR_SIZE, DUMP_MAGIC, DUMP_VERSION, DUMP_WORDSIZE};
use crate::vtop::DUMP_MAP_ENTRY_SIZE;
use crate::{DumpError, DumpHeader, PageMap, ResolvedSymbol, Result, SymbolBatch};
use std::cell::OnceCell;
use std::fs::File;
use std::io::{ErrorKind, Read as _, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use vmsift_ksyms::{KsymsLoader, SymbolResolver};

/// カーネルアドレス空間を表すシンボル
pub const KAS_SYMBOL: &str = "kas";

/// クラッシュダンプイメージ
///
/// ファイルハンドルは読み取り専用で保持し、値の破棄時にちょうど1回閉じられます。
pub struct DumpImage {
    path: PathBuf,
    file: File,
    /// ファイルサイズ（読み取り可能な範囲）
    size: u64,
    header: DumpHeader,
    page_map: PageMap,
    ksyms: KsymsLoader,
    /// 最初のシンボル解決時に構築する
    symbols: OnceCell<SymbolResolver>,
    /// カーネルアドレス空間（`kas`）のアドレス
    kas: u64,
}

impl DumpImage {
    /// ダンプファイルを開く
    ///
    /// ヘッダを読み込んでマジック番号を検証し、ページ変換マップとシンボルテーブルを準備します。
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(DumpError::NotFound(path)),
            Err(e) => return Err(e.into()),
        };
        let size = file.metadata()?.len();

        // マジック番号はヘッダ全体が揃っていなくても検証する
        let head_len = size.min(DUMPHDR_SIZE as u64);
        let head = read_file_region(&file, size, "dump header", 0, head_len)?;
        let magic = peek_magic(&head).ok_or(DumpError::Truncated {
            region: "dump header",
            offset: 0,
            len: DUMPHDR_SIZE as u64,
            size,
        })?;
        if magic != DUMP_MAGIC {
            return Err(DumpError::NotACrashImage { path, magic });
        }

        let header = DumpHeader::parse(&head)?;
        validate_header(&header)?;

        let page_map = load_page_map(&file, size, &header)?;

        let ksyms_offset = u64::try_from(header.ksyms)
            .map_err(|_| DumpError::BadHeader(format!("negative ksyms offset {}", header.ksyms)))?;
        let ksyms_bytes =
            read_file_region(&file, size, "symbol table", ksyms_offset, header.ksyms_size)?;
        let ksyms = KsymsLoader::load(ksyms_bytes)
            .map_err(|e| DumpError::BadSymbolTable(format!("{:#}", e)))?;

        debug!(
            "opened {} ({} bytes, {} map entries, {} bytes of ksyms)",
            path.display(),
            size,
            page_map.len(),
            ksyms.len()
        );

        let mut image = Self {
            path,
            file,
            size,
            header,
            page_map,
            ksyms,
            symbols: OnceCell::new(),
            kas: 0,
        };
        image.kas = image.resolve(&[KAS_SYMBOL])?.get(KAS_SYMBOL)?.address;

        Ok(image)
    }

    /// ダンプファイルのパス
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// ダンプファイルのサイズ（バイト）
    pub fn size(&self) -> u64 {
        self.size
    }

    /// ダンプヘッダ
    pub fn header(&self) -> &DumpHeader {
        &self.header
    }

    /// カーネルアドレス空間のアドレス
    pub fn kas(&self) -> u64 {
        self.kas
    }

    /// シンボル名をまとめて解決する
    ///
    /// 1つでも解決できない名前があればバッチ全体が失敗します。
    pub fn resolve(&self, names: &[&str]) -> Result<SymbolBatch> {
        let resolver = self.symbol_resolver()?;

        let symbols = names
            .iter()
            .map(|&name| {
                resolver
                    .resolve(name)
                    .map(|address| ResolvedSymbol {
                        name: name.to_string(),
                        address,
                    })
                    .ok_or_else(|| DumpError::SymbolLookupFailed(name.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("resolved {} symbols", symbols.len());
        Ok(SymbolBatch::new(symbols))
    }

    fn symbol_resolver(&self) -> Result<&SymbolResolver> {
        if let Some(resolver) = self.symbols.get() {
            return Ok(resolver);
        }

        let resolver = SymbolResolver::new(&self.ksyms)
            .map_err(|e| DumpError::BadSymbolTable(format!("{:#}", e)))?;
        Ok(self.symbols.get_or_init(|| resolver))
    }

    /// カーネル仮想アドレスからデータを読み取る
    ///
    /// ページ単位で変換し、どれか1ページでも変換できないかファイル範囲外であれば
    /// 読み取り全体が失敗します。
    pub fn read(&self, addr: u64, len: usize) -> Result<Vec<u8>> {
        let failed = || DumpError::ReadFailed { addr, len };

        let end = addr.checked_add(len as u64).ok_or_else(failed)?;
        if len as u64 > self.size {
            return Err(failed());
        }

        let pagesize = self.header.page_size();
        let mut buffer = vec![0u8; len];
        let mut done = 0usize;
        let mut cur = addr;

        while cur < end {
            let pageoff = cur & (pagesize - 1);
            let chunk = (pagesize - pageoff).min(end - cur) as usize;

            let offset = self.page_map.lookup(self.kas, cur).ok_or_else(|| {
                debug!("no page in dump for {:#x}", cur);
                failed()
            })?;
            if offset.checked_add(chunk as u64).map_or(true, |e| e > self.size) {
                debug!("page for {:#x} lies beyond end of file", cur);
                return Err(failed());
            }

            self.read_at(offset, &mut buffer[done..done + chunk])
                .map_err(|e| {
                    debug!("read of {} bytes at file offset {} failed: {}", chunk, offset, e);
                    failed()
                })?;

            done += chunk;
            cur += chunk as u64;
        }

        Ok(buffer)
    }

    /// シンボルが指すアドレスからデータを読み取る
    ///
    /// 失敗した場合はシンボル名を含むエラーを返します。
    pub fn read_symbol(&self, symbol: &ResolvedSymbol, len: usize) -> Result<Vec<u8>> {
        self.read(symbol.address, len).map_err(|e| match e {
            DumpError::ReadFailed { .. } => DumpError::SymbolReadFailed {
                symbol: symbol.name.clone(),
                addr: symbol.address,
            },
            other => other,
        })
    }

    /// 仮想アドレスがダンプに含まれているか確認する
    pub fn is_mapped(&self, addr: u64) -> bool {
        self.page_map.lookup(self.kas, addr).is_some()
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)
    }
}

impl Drop for DumpImage {
    fn drop(&mut self) {
        debug!("closing {}", self.path.display());
    }
}

/// ヘッダの値の整合性を確認する
fn validate_header(header: &DumpHeader) -> Result<()> {
    if header.wordsize != DUMP_WORDSIZE {
        return Err(DumpError::UnsupportedWordSize(header.wordsize));
    }

    if header.version != DUMP_VERSION {
        warn!(
            "dump version {} differs from expected version {}",
            header.version, DUMP_VERSION
        );
    }

    let pagesize = header.page_size();
    let shift_matches = u32::try_from(header.pageshift)
        .ok()
        .and_then(|shift| 1u64.checked_shl(shift))
        == Some(pagesize);
    if !pagesize.is_power_of_two() || !shift_matches {
        return Err(DumpError::BadHeader(format!(
            "page size {} does not match page shift {}",
            header.pagesize, header.pageshift
        )));
    }

    if header.nvtop < 0 || header.hashmask < 0 {
        return Err(DumpError::BadHeader(format!(
            "negative map geometry (nvtop {}, hashmask {:#x})",
            header.nvtop, header.hashmask
        )));
    }

    Ok(())
}

/// ページ変換マップを読み込む
fn load_page_map(file: &File, size: u64, header: &DumpHeader) -> Result<PageMap> {
    let base = u64::try_from(header.map)
        .map_err(|_| DumpError::BadHeader(format!("negative map offset {}", header.map)))?;
    let len = (header.nvtop as u64)
        .checked_mul(DUMP_MAP_ENTRY_SIZE as u64)
        .ok_or_else(|| DumpError::BadHeader(format!("map size overflow (nvtop {})", header.nvtop)))?;

    let bytes = read_file_region(file, size, "page map", base, len)?;
    Ok(PageMap::new(
        base,
        &bytes,
        header.hashmask as u64,
        header.pageshift as u32,
    ))
}

/// ファイルの指定範囲を読み取る（範囲外なら Truncated）
fn read_file_region(
    file: &File,
    size: u64,
    region: &'static str,
    offset: u64,
    len: u64,
) -> Result<Vec<u8>> {
    let truncated = || DumpError::Truncated {
        region,
        offset,
        len,
        size,
    };

    if offset.checked_add(len).map_or(true, |end| end > size) {
        return Err(truncated());
    }
    let len = usize::try_from(len).map_err(|_| truncated())?;

    let mut buffer = vec![0u8; len];
    let mut file = file;
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(&mut buffer)?;
    Ok(buffer)
}
