//! Text encodings of files we rewrite.

/// Encoding detected from a byte-order mark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    /// UTF-8 without BOM (default for new files)
    #[default]
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
}

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16_BE_BOM: &[u8] = &[0xFE, 0xFF];

impl TextEncoding {
    /// Detect the encoding of existing file content
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(UTF8_BOM) {
            Self::Utf8Bom
        } else if bytes.starts_with(UTF16_LE_BOM) {
            Self::Utf16Le
        } else if bytes.starts_with(UTF16_BE_BOM) {
            Self::Utf16Be
        } else {
            Self::Utf8
        }
    }

    /// Detect and decode, replacing invalid sequences
    pub fn decode(bytes: &[u8]) -> (Self, String) {
        let encoding = Self::detect(bytes);
        let text = match encoding {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Utf8Bom => String::from_utf8_lossy(&bytes[UTF8_BOM.len()..]).into_owned(),
            Self::Utf16Le | Self::Utf16Be => {
                let units: Vec<u16> = bytes[2..]
                    .chunks_exact(2)
                    .map(|pair| {
                        let pair = [pair[0], pair[1]];
                        if encoding == Self::Utf16Le {
                            u16::from_le_bytes(pair)
                        } else {
                            u16::from_be_bytes(pair)
                        }
                    })
                    .collect();
                String::from_utf16_lossy(&units)
            }
        };
        (encoding, text)
    }

    /// Encode text, writing the BOM for encodings that carry one
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::Utf8Bom => [UTF8_BOM, text.as_bytes()].concat(),
            Self::Utf16Le => UTF16_LE_BOM
                .iter()
                .copied()
                .chain(text.encode_utf16().flat_map(u16::to_le_bytes))
                .collect(),
            Self::Utf16Be => UTF16_BE_BOM
                .iter()
                .copied()
                .chain(text.encode_utf16().flat_map(u16::to_be_bytes))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_and_preserve() {
        for encoding in [
            TextEncoding::Utf8,
            TextEncoding::Utf8Bom,
            TextEncoding::Utf16Le,
            TextEncoding::Utf16Be,
        ] {
            let bytes = encoding.encode("partial class Café {}\n");
            let (detected, text) = TextEncoding::decode(&bytes);
            assert_eq!(detected, encoding);
            assert_eq!(text, "partial class Café {}\n");
        }
    }

    #[test]
    fn test_utf16_layout() {
        assert_eq!(TextEncoding::Utf16Le.encode("A"), vec![0xFF, 0xFE, 0x41, 0x00]);
        assert_eq!(TextEncoding::Utf16Be.encode("A"), vec![0xFE, 0xFF, 0x00, 0x41]);
        assert_eq!(TextEncoding::Utf8Bom.encode("A"), vec![0xEF, 0xBB, 0xBF, 0x41]);
    }
}
