//! シンボル解決バッチ

use crate::{DumpError, Result};

/// 解決済みシンボル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSymbol {
    pub name: String,
    pub address: u64,
}

/// 1回のシンボル解決で得られた結果（要求順）
#[derive(Debug, Clone, Default)]
pub struct SymbolBatch {
    symbols: Vec<ResolvedSymbol>,
}

impl SymbolBatch {
    pub(crate) fn new(symbols: Vec<ResolvedSymbol>) -> Self {
        Self { symbols }
    }

    /// 名前で解決済みシンボルを取得する
    pub fn get(&self, name: &str) -> Result<&ResolvedSymbol> {
        self.symbols
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| DumpError::SymbolLookupFailed(name.to_string()))
    }

    /// 要求順にシンボルを列挙する
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedSymbol> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
