//! テスト用 ksyms イメージの生成

use crate::Result;
use object::write::{Object, Symbol, SymbolSection};
use object::{Architecture, BinaryFormat, Endianness, SymbolFlags, SymbolKind, SymbolScope};

/// シンボルテーブルだけを持つ ELF を組み立てる
pub struct KsymsWriter {
    architecture: Architecture,
    symbols: Vec<(String, u64, SymbolScope)>,
}

impl KsymsWriter {
    pub fn new() -> Self {
        Self {
            architecture: Architecture::X86_64,
            symbols: Vec::new(),
        }
    }

    /// 出力する ELF のアーキテクチャを指定する
    pub fn architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = architecture;
        self
    }

    /// グローバルなデータシンボルを追加する
    pub fn global(mut self, name: &str, address: u64) -> Self {
        self.symbols.push((name.to_string(), address, SymbolScope::Linkage));
        self
    }

    /// ローカルなデータシンボルを追加する
    pub fn local(mut self, name: &str, address: u64) -> Self {
        self.symbols.push((name.to_string(), address, SymbolScope::Compilation));
        self
    }

    /// ELF バイト列を生成する
    pub fn write(&self) -> Result<Vec<u8>> {
        let mut obj = Object::new(BinaryFormat::Elf, self.architecture, Endianness::Little);

        for (name, address, scope) in &self.symbols {
            obj.add_symbol(Symbol {
                name: name.as_bytes().to_vec(),
                value: *address,
                size: 8,
                kind: SymbolKind::Data,
                scope: *scope,
                weak: false,
                section: SymbolSection::Absolute,
                flags: SymbolFlags::None,
            });
        }

        obj.write()
            .map_err(|e| anyhow::anyhow!("Failed to write ksyms image: {}", e))
    }
}

impl Default for KsymsWriter {
    fn default() -> Self {
        Self::new()
    }
}
