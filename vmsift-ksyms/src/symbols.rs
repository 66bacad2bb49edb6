//! シンボル解決機能

use crate::{KsymsLoader, Result};
use object::{Object, ObjectSymbol, SymbolKind};
use std::collections::HashMap;
use tracing::debug;

/// シンボル情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    /// カーネル仮想アドレス
    pub address: u64,
    pub size: u64,
    /// グローバル（ローカルでない）定義かどうか
    pub is_global: bool,
}

/// シンボル解決
pub struct SymbolResolver {
    /// シンボル名 -> シンボル情報のマップ
    symbols_by_name: HashMap<String, Symbol>,
}

impl SymbolResolver {
    /// ksyms からシンボル解決を作成する
    ///
    /// 定義済みのシンボルだけを登録します。同名のシンボルが複数ある場合は
    /// グローバル定義を優先し、それ以外は最初に現れた定義を採用します。
    pub fn new(loader: &KsymsLoader) -> Result<Self> {
        let file = loader.object_file()?;
        let mut symbols_by_name: HashMap<String, Symbol> = HashMap::new();

        for symbol in file.symbols() {
            if symbol.is_undefined() {
                continue;
            }
            if matches!(symbol.kind(), SymbolKind::File | SymbolKind::Section) {
                continue;
            }

            let name = match symbol.name() {
                Ok(name) if !name.is_empty() => name,
                _ => continue,
            };

            let sym = Symbol {
                name: name.to_string(),
                address: symbol.address(),
                size: symbol.size(),
                is_global: symbol.is_global(),
            };

            match symbols_by_name.get(name) {
                Some(existing) if existing.is_global || !sym.is_global => {}
                _ => {
                    symbols_by_name.insert(name.to_string(), sym);
                }
            }
        }

        debug!("loaded {} kernel symbols", symbols_by_name.len());

        Ok(Self { symbols_by_name })
    }

    /// シンボル名からアドレスを解決する
    pub fn resolve(&self, name: &str) -> Option<u64> {
        self.symbols_by_name.get(name).map(|s| s.address)
    }

    /// シンボル情報を取得する
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols_by_name.get(name)
    }

    /// 登録済みシンボル数
    pub fn len(&self) -> usize {
        self.symbols_by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols_by_name.is_empty()
    }
}
