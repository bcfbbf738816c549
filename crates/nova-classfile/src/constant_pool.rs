use crate::error::{Error, Result};
use crate::reader::Reader;

/// A resolved constant pool entry.
///
/// Reference entries keep their raw pool indices; callers resolve them through
/// [`ConstantPool`] so that every lookup is bounds- and type-checked.
#[derive(Debug, Clone, PartialEq)]
pub enum CpInfo {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class {
        name_index: u16,
    },
    String {
        string_index: u16,
    },
    Fieldref {
        class_index: u16,
        name_and_type_index: u16,
    },
    Methodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    InterfaceMethodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    MethodHandle {
        reference_kind: u8,
        reference_index: u16,
    },
    MethodType {
        descriptor_index: u16,
    },
    Dynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    InvokeDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    Module {
        name_index: u16,
    },
    Package {
        name_index: u16,
    },
}

impl CpInfo {
    pub fn kind(&self) -> &'static str {
        match self {
            CpInfo::Utf8(_) => "Utf8",
            CpInfo::Integer(_) => "Integer",
            CpInfo::Float(_) => "Float",
            CpInfo::Long(_) => "Long",
            CpInfo::Double(_) => "Double",
            CpInfo::Class { .. } => "Class",
            CpInfo::String { .. } => "String",
            CpInfo::Fieldref { .. } => "Fieldref",
            CpInfo::Methodref { .. } => "Methodref",
            CpInfo::InterfaceMethodref { .. } => "InterfaceMethodref",
            CpInfo::NameAndType { .. } => "NameAndType",
            CpInfo::MethodHandle { .. } => "MethodHandle",
            CpInfo::MethodType { .. } => "MethodType",
            CpInfo::Dynamic { .. } => "Dynamic",
            CpInfo::InvokeDynamic { .. } => "InvokeDynamic",
            CpInfo::Module { .. } => "Module",
            CpInfo::Package { .. } => "Package",
        }
    }

    /// `Long` and `Double` entries take up two pool slots.
    fn is_wide(&self) -> bool {
        matches!(self, CpInfo::Long(_) | CpInfo::Double(_))
    }
}

/// Random-access constant pool table.
///
/// Slot 0 and the slot following every `Long`/`Double` entry are absent, so
/// `entries[i]` lines up with pool index `i`.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<Option<CpInfo>>,
}

impl ConstantPool {
    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count.max(1));
        entries.push(None);

        while entries.len() < count {
            let info = parse_entry(reader)?;
            let wide = info.is_wide();
            entries.push(Some(info));
            if wide {
                // The slot after an 8-byte constant is unusable. A wide
                // constant in the very last slot leaves no room for it.
                if entries.len() >= count {
                    return Err(Error::MalformedAttribute("constant pool"));
                }
                entries.push(None);
            }
        }

        Ok(Self { entries })
    }

    /// Number of pool slots, including the unused slot 0.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    pub fn get(&self, index: u16) -> Result<&CpInfo> {
        self.entries
            .get(index as usize)
            .and_then(Option::as_ref)
            .ok_or(Error::InvalidConstantPoolIndex(index))
    }

    pub fn get_utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            CpInfo::Utf8(value) => Ok(value),
            other => Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: "Utf8",
                found: other.kind(),
            }),
        }
    }

    pub fn get_class_name(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            CpInfo::Class { name_index } => Ok(self.get_utf8(*name_index)?.to_string()),
            other => Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: "Class",
                found: other.kind(),
            }),
        }
    }

    /// Resolves a string constant. Annotation element values point straight at
    /// a `Utf8` entry while `ConstantValue` attributes go through `String`;
    /// both forms are accepted.
    pub fn get_string_constant(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            CpInfo::Utf8(value) => Ok(value.clone()),
            CpInfo::String { string_index } => Ok(self.get_utf8(*string_index)?.to_string()),
            other => Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: "String",
                found: other.kind(),
            }),
        }
    }

    pub fn get_name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        match self.get(index)? {
            CpInfo::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.get_utf8(*name_index)?, self.get_utf8(*descriptor_index)?)),
            other => Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: "NameAndType",
                found: other.kind(),
            }),
        }
    }

    /// Internal names of every `Class` entry in pool order.
    pub fn class_names(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for entry in self.entries.iter().flatten() {
            if let CpInfo::Class { name_index } = entry {
                out.push(self.get_utf8(*name_index)?.to_string());
            }
        }
        Ok(out)
    }
}

fn parse_entry(reader: &mut Reader<'_>) -> Result<CpInfo> {
    let tag = reader.read_u1()?;
    let info = match tag {
        1 => {
            let len = reader.read_u2()? as usize;
            CpInfo::Utf8(decode_modified_utf8(reader.read_bytes(len)?)?)
        }
        3 => CpInfo::Integer(reader.read_u4()? as i32),
        4 => CpInfo::Float(f32::from_bits(reader.read_u4()?)),
        5 => CpInfo::Long(reader.read_u8()? as i64),
        6 => CpInfo::Double(f64::from_bits(reader.read_u8()?)),
        7 => CpInfo::Class {
            name_index: reader.read_u2()?,
        },
        8 => CpInfo::String {
            string_index: reader.read_u2()?,
        },
        9 => CpInfo::Fieldref {
            class_index: reader.read_u2()?,
            name_and_type_index: reader.read_u2()?,
        },
        10 => CpInfo::Methodref {
            class_index: reader.read_u2()?,
            name_and_type_index: reader.read_u2()?,
        },
        11 => CpInfo::InterfaceMethodref {
            class_index: reader.read_u2()?,
            name_and_type_index: reader.read_u2()?,
        },
        12 => CpInfo::NameAndType {
            name_index: reader.read_u2()?,
            descriptor_index: reader.read_u2()?,
        },
        15 => CpInfo::MethodHandle {
            reference_kind: reader.read_u1()?,
            reference_index: reader.read_u2()?,
        },
        16 => CpInfo::MethodType {
            descriptor_index: reader.read_u2()?,
        },
        17 => CpInfo::Dynamic {
            bootstrap_method_attr_index: reader.read_u2()?,
            name_and_type_index: reader.read_u2()?,
        },
        18 => CpInfo::InvokeDynamic {
            bootstrap_method_attr_index: reader.read_u2()?,
            name_and_type_index: reader.read_u2()?,
        },
        19 => CpInfo::Module {
            name_index: reader.read_u2()?,
        },
        20 => CpInfo::Package {
            name_index: reader.read_u2()?,
        },
        other => return Err(Error::InvalidConstantPoolTag(other)),
    };
    Ok(info)
}

/// Decodes the classfile flavour of UTF-8.
///
/// U+0000 is stored as the overlong pair `C0 80` and supplementary characters
/// as two 3-byte surrogate halves, so a standard UTF-8 decoder rejects or
/// mangles both. Decoding goes through UTF-16 code units; an unpaired
/// surrogate becomes U+FFFD.
pub fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    if bytes.iter().all(|&b| b != 0 && b < 0x80) {
        return String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidModifiedUtf8);
    }

    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            0 => return Err(Error::InvalidModifiedUtf8),
            0x01..=0x7F => {
                units.push(b as u16);
                i += 1;
            }
            _ if b & 0xE0 == 0xC0 => {
                let b2 = continuation(bytes, i + 1)?;
                units.push((((b & 0x1F) as u16) << 6) | b2);
                i += 2;
            }
            _ if b & 0xF0 == 0xE0 => {
                let b2 = continuation(bytes, i + 1)?;
                let b3 = continuation(bytes, i + 2)?;
                units.push((((b & 0x0F) as u16) << 12) | (b2 << 6) | b3);
                i += 3;
            }
            _ => return Err(Error::InvalidModifiedUtf8),
        }
    }

    Ok(char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect())
}

fn continuation(bytes: &[u8], at: usize) -> Result<u16> {
    match bytes.get(at) {
        Some(&b) if b & 0xC0 == 0x80 => Ok((b & 0x3F) as u16),
        _ => Err(Error::InvalidModifiedUtf8),
    }
}
