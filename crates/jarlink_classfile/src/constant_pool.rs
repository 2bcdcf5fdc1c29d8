use crate::reader::{decode_modified_utf8, ClassFileError, ClassReader};

/// A single constant-pool entry. Numeric payloads are retained so the pool
/// can be round-tripped; the linkage layers only consume the name-bearing
/// variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
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
    FieldRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    MethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    InterfaceMethodRef {
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
        bootstrap_method_index: u16,
        name_and_type_index: u16,
    },
    InvokeDynamic {
        bootstrap_method_index: u16,
        name_and_type_index: u16,
    },
    Module {
        name_index: u16,
    },
    Package {
        name_index: u16,
    },
    /// Index 0 and the second slot of `Long`/`Double` entries.
    Unusable,
}

/// The parsed constant pool of one class file.
#[derive(Debug, Clone)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    pub(crate) fn parse(reader: &mut ClassReader<'_>) -> Result<Self, ClassFileError> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(Constant::Unusable); // index 0 unused

        let mut index = 1;
        while index < count {
            let tag = reader.read_u1()?;
            let entry = match tag {
                1 => {
                    let length = reader.read_u2()? as usize;
                    let bytes = reader.read_slice(length)?;
                    Constant::Utf8(decode_modified_utf8(bytes)?)
                }
                3 => Constant::Integer(reader.read_u4()? as i32),
                4 => Constant::Float(f32::from_bits(reader.read_u4()?)),
                5 => {
                    let high = reader.read_u4()? as u64;
                    let low = reader.read_u4()? as u64;
                    entries.push(Constant::Long(((high << 32) | low) as i64));
                    entries.push(Constant::Unusable);
                    index += 2;
                    continue;
                }
                6 => {
                    let high = reader.read_u4()? as u64;
                    let low = reader.read_u4()? as u64;
                    entries.push(Constant::Double(f64::from_bits((high << 32) | low)));
                    entries.push(Constant::Unusable);
                    index += 2;
                    continue;
                }
                7 => Constant::Class {
                    name_index: reader.read_u2()?,
                },
                8 => Constant::String {
                    string_index: reader.read_u2()?,
                },
                9 => Constant::FieldRef {
                    class_index: reader.read_u2()?,
                    name_and_type_index: reader.read_u2()?,
                },
                10 => Constant::MethodRef {
                    class_index: reader.read_u2()?,
                    name_and_type_index: reader.read_u2()?,
                },
                11 => Constant::InterfaceMethodRef {
                    class_index: reader.read_u2()?,
                    name_and_type_index: reader.read_u2()?,
                },
                12 => Constant::NameAndType {
                    name_index: reader.read_u2()?,
                    descriptor_index: reader.read_u2()?,
                },
                15 => Constant::MethodHandle {
                    reference_kind: reader.read_u1()?,
                    reference_index: reader.read_u2()?,
                },
                16 => Constant::MethodType {
                    descriptor_index: reader.read_u2()?,
                },
                17 => Constant::Dynamic {
                    bootstrap_method_index: reader.read_u2()?,
                    name_and_type_index: reader.read_u2()?,
                },
                18 => Constant::InvokeDynamic {
                    bootstrap_method_index: reader.read_u2()?,
                    name_and_type_index: reader.read_u2()?,
                },
                19 => Constant::Module {
                    name_index: reader.read_u2()?,
                },
                20 => Constant::Package {
                    name_index: reader.read_u2()?,
                },
                other => return Err(ClassFileError::UnknownConstantTag { tag: other }),
            };

            entries.push(entry);
            index += 1;
        }

        Ok(Self { entries })
    }

    pub fn get(&self, index: u16) -> Result<&Constant, ClassFileError> {
        self.entries
            .get(index as usize)
            .ok_or(ClassFileError::InvalidConstantIndex { index })
    }

    pub fn utf8(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            Constant::Utf8(value) => Ok(value.as_str()),
            _ => Err(ClassFileError::InvalidConstantIndex { index }),
        }
    }

    /// The internal name behind a `Class` entry.
    pub fn class_name(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            Constant::Class { name_index } => self.utf8(*name_index),
            _ => Err(ClassFileError::InvalidConstantIndex { index }),
        }
    }

    /// `(name, descriptor)` behind a `NameAndType` entry.
    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str), ClassFileError> {
        match self.get(index)? {
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            _ => Err(ClassFileError::InvalidConstantIndex { index }),
        }
    }

    /// All entries in pool order, including unusable slots.
    pub fn entries(&self) -> impl Iterator<Item = &Constant> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }
}
