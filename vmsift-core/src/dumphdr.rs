//! ダンプヘッダの表示

use crate::size::format_size;
use crate::timefmt;
use std::fmt;
use vmsift_image::DumpHeader;

/// ダンプヘッダ節の見出し
pub const BANNER: &str = "============== dump headers ==============";

/// ラベル欄の幅
const LABEL_WIDTH: usize = 19;

/// ダンプヘッダの表示用ビュー
///
/// 追加の読み取りは行わず、オープン時に読み込んだヘッダをそのまま投影します。
pub struct DumpHeaderReport<'a> {
    header: &'a DumpHeader,
}

impl<'a> DumpHeaderReport<'a> {
    pub fn new(header: &'a DumpHeader) -> Self {
        Self { header }
    }

    /// 表示する (ラベル, 値) の一覧を固定の順序で返す
    pub fn lines(&self) -> Vec<(&'static str, String)> {
        let h = self.header;
        let pagesize = h.page_size();

        vec![
            ("magic:", format!("{:x}", h.magic)),
            ("flags:", format!("{:#x} ({})", h.flags, h.flags_description())),
            ("version:", h.version.to_string()),
            ("wordsize:", h.wordsize.to_string()),
            ("start:", h.start.to_string()),
            ("ksyms:", h.ksyms.to_string()),
            ("pfn:", h.pfn.to_string()),
            ("map:", h.map.to_string()),
            ("data:", h.data.to_string()),
            ("utsname.sysname:", h.utsname.sysname.clone()),
            ("utsname.nodename:", h.utsname.nodename.clone()),
            ("utsname.release:", h.utsname.release.clone()),
            ("utsname.version:", h.utsname.version.clone()),
            ("utsname.machine:", h.utsname.machine.clone()),
            ("platform:", h.platform.clone()),
            ("panicstr:", h.panic_string.clone()),
            ("crashtime:", timefmt::ctime(h.crashtime)),
            ("pageshift:", h.pageshift.to_string()),
            ("pagesize:", format!("{} ({})", h.pagesize, format_size(pagesize))),
            ("hashmask:", format!("{:#x}", h.hashmask)),
            ("nvtop:", h.nvtop.to_string()),
            (
                "npages:",
                format!(
                    "{} ({})",
                    h.npages,
                    format_size(h.npages.saturating_mul(pagesize))
                ),
            ),
            (
                "ksyms_size:",
                format!("{} ({})", h.ksyms_size, format_size(h.ksyms_size)),
            ),
            (
                "ksyms_csize:",
                format!("{} ({})", h.ksyms_csize, format_size(h.ksyms_csize)),
            ),
        ]
    }
}

impl fmt::Display for DumpHeaderReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (label, value) in self.lines() {
            writeln!(f, "{:<width$} {}", label, value, width = LABEL_WIDTH)?;
        }
        Ok(())
    }
}
