//! ksyms イメージの読み込み機能

use crate::Result;
use object::{BinaryFormat, Object};

/// ksyms ローダー
///
/// ダンプから切り出した ELF のバイト列を所有し、必要になった時点でパースします。
pub struct KsymsLoader {
    data: Vec<u8>,
}

impl KsymsLoader {
    /// バイト列から ksyms を読み込む
    ///
    /// ELF として解釈できること、64ビットかつリトルエンディアンであることを確認します。
    pub fn load(data: Vec<u8>) -> Result<Self> {
        {
            let file = parse(&data)?;

            if file.format() != BinaryFormat::Elf {
                return Err(anyhow::anyhow!(
                    "ksyms image is not an ELF file ({:?})",
                    file.format()
                ));
            }

            // ダンプのワードサイズ（64ビット）と一致しない symtab は扱わない
            if !file.is_64() || !file.is_little_endian() {
                return Err(anyhow::anyhow!(
                    "ksyms image is not a 64-bit little-endian ELF file"
                ));
            }
        }

        Ok(Self { data })
    }

    /// オブジェクトファイルとしてパースする
    pub fn object_file(&self) -> Result<object::File<'_>> {
        parse(&self.data)
    }

    /// ksyms のバイト数
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn parse(data: &[u8]) -> Result<object::File<'_>> {
    object::File::parse(data).map_err(|e| anyhow::anyhow!("Failed to parse ksyms image: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::KsymsWriter;

    #[test]
    fn test_load_elf64() {
        let data = KsymsWriter::new().global("kas", 0x1000).write().unwrap();
        let loader = KsymsLoader::load(data).unwrap();
        assert!(!loader.is_empty());
        assert!(loader.object_file().is_ok());
    }

    #[test]
    fn test_reject_garbage() {
        assert!(KsymsLoader::load(b"not an elf file".to_vec()).is_err());
        assert!(KsymsLoader::load(Vec::new()).is_err());
    }

    #[test]
    fn test_reject_elf32() {
        let data = KsymsWriter::new()
            .architecture(object::Architecture::I386)
            .global("kas", 0x1000)
            .write()
            .unwrap();
        let err = KsymsLoader::load(data).err().unwrap();
        assert!(err.to_string().contains("64-bit"));
    }
}
