//! 型付きメモリ読み取り機能

use crate::{DumpError, DumpImage, ResolvedSymbol, Result};

/// メモリから読み取り可能な型
pub trait MemoryReadable: Sized {
    /// リトルエンディアンのバイト列から値を構築する
    ///
    /// バイト数が型のサイズと一致しない場合は `None` を返します。
    fn from_le_bytes(bytes: &[u8]) -> Option<Self>;

    /// 型のサイズ（バイト数）
    fn size() -> usize;
}

macro_rules! impl_memory_readable {
    ($($ty:ty),*) => {
        $(
            impl MemoryReadable for $ty {
                fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
                    let array = bytes.try_into().ok()?;
                    Some(<$ty>::from_le_bytes(array))
                }

                fn size() -> usize {
                    std::mem::size_of::<$ty>()
                }
            }
        )*
    };
}

impl_memory_readable!(u8, i8, u16, i16, u32, i32, u64, i64);

/// バイト列の指定オフセットから値を取り出す
///
/// 範囲外の場合は `None` を返します。
pub fn field<T: MemoryReadable>(buf: &[u8], offset: usize) -> Option<T> {
    let end = offset.checked_add(T::size())?;
    T::from_le_bytes(buf.get(offset..end)?)
}

/// NUL 終端の文字列を取り出す
///
/// NUL が見つからない場合はスライス全体を使います。UTF-8 でないバイトは置換文字になります。
pub fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

impl DumpImage {
    /// 型付き値を読み取る（ジェネリック版）
    ///
    /// # Examples
    /// ```ignore
    /// let ptr: u64 = image.read_typed(addr)?;
    /// let value: i32 = image.read_typed(addr)?;
    /// ```
    pub fn read_typed<T: MemoryReadable>(&self, addr: u64) -> Result<T> {
        let len = T::size();
        let bytes = self.read(addr, len)?;
        T::from_le_bytes(&bytes).ok_or(DumpError::ReadFailed { addr, len })
    }

    /// シンボルが指す位置から型付き値を読み取る
    pub fn read_symbol_typed<T: MemoryReadable>(&self, symbol: &ResolvedSymbol) -> Result<T> {
        let bytes = self.read_symbol(symbol, T::size())?;
        T::from_le_bytes(&bytes).ok_or_else(|| DumpError::SymbolReadFailed {
            symbol: symbol.name.clone(),
            addr: symbol.address,
        })
    }

    /// ポインタ値（64ビット）を読み取る
    pub fn read_ptr(&self, addr: u64) -> Result<u64> {
        self.read_typed(addr)
    }

    /// u32値を読み取る（リトルエンディアン）
    pub fn read_u32(&self, addr: u64) -> Result<u32> {
        self.read_typed(addr)
    }

    /// i32値を読み取る（リトルエンディアン）
    pub fn read_i32(&self, addr: u64) -> Result<i32> {
        self.read_typed(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_bounds() {
        let buf = [0x78, 0x56, 0x34, 0x12, 0xff];
        assert_eq!(field::<u32>(&buf, 0), Some(0x1234_5678));
        assert_eq!(field::<u8>(&buf, 4), Some(0xff));
        assert_eq!(field::<i8>(&buf, 4), Some(-1));
        assert_eq!(field::<u32>(&buf, 2), None);
        assert_eq!(field::<u64>(&buf, usize::MAX), None);
    }

    #[test]
    fn test_c_string() {
        assert_eq!(c_string(b"SunOS\0garbage"), "SunOS");
        assert_eq!(c_string(b"no terminator"), "no terminator");
        assert_eq!(c_string(b"\0"), "");
        assert_eq!(c_string(&[]), "");
    }
}
