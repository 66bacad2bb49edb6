//! カーネルチューナブルのスナップショット

use crate::Result;
use std::fmt;
use tracing::debug;
use vmsift_image::DumpImage;

/// システムチューナブル節の見出し
pub const BANNER: &str = "=============== system tunables ==========";

/// 表示するチューナブル（表示順）
pub const TUNABLES: [&str; 40] = [
    "avefree",
    "ddi_msix_alloc_limit",
    "default_stksize",
    "desfree",
    "fastscan",
    "freemem",
    "handspreadpages",
    "idle_cpu_no_deep_c",
    "idle_cpu_prefer_mwait",
    "kmem_flags",
    "kmem_stackinfo",
    "logevent_max_q_sz",
    "looppages",
    "lotsfree",
    "lwp_default_stksize",
    "max_nprocs",
    "max_page_get",
    "maxpgio",
    "maxuprc",
    "maxusers",
    "minfree",
    "ncsize",
    "ngroups_max",
    "noexec_user_stack",
    "nproc",
    "npty",
    "pageout_reserve",
    "physmem",
    "rstchown",
    "scsi_options",
    "sd_io_time",
    "sd_max_throttle",
    "segkpsize",
    "slowscan",
    "swapfs_minfree",
    "swapfs_reserve",
    "throttlefree",
    "tune_t_fsflushr",
    "vhci_io_time",
    "zfs_arc_max",
];

/// チューナブルの名前と値
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tunable {
    pub name: String,
    pub value: i32,
}

impl fmt::Display for Tunable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:>21} {}", self.name, self.value)
    }
}

/// チューナブルのスナップショット
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TunableSet {
    pub entries: Vec<Tunable>,
}

impl TunableSet {
    pub fn get(&self, name: &str) -> Option<i32> {
        self.entries.iter().find(|t| t.name == name).map(|t| t.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tunable> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for TunableSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for tunable in &self.entries {
            writeln!(f, "{}", tunable)?;
        }
        Ok(())
    }
}

/// 既定のチューナブルをすべて読み取る
pub fn read_tunables(image: &DumpImage) -> Result<TunableSet> {
    read_named_tunables(image, &TUNABLES)
}

/// 指定した名前のチューナブルを読み取る
///
/// 名前の解決か読み取りが1つでも失敗すれば、値を1つも返しません。
pub fn read_named_tunables(image: &DumpImage, names: &[&str]) -> Result<TunableSet> {
    let symbols = image.resolve(names)?;

    let entries = symbols
        .iter()
        .map(|sym| {
            Ok(Tunable {
                name: sym.name.clone(),
                value: image.read_symbol_typed(sym)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!("read {} tunables", entries.len());
    Ok(TunableSet { entries })
}
