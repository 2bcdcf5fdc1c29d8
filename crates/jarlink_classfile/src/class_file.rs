use crate::constant_pool::ConstantPool;
use crate::reader::{ClassFileError, ClassReader, SUPPORTED_MAJOR_VERSION};

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_BRIDGE: u16 = 0x0040;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_SYNTHETIC: u16 = 0x1000;
pub const ACC_ENUM: u16 = 0x4000;
pub const ACC_MODULE: u16 = 0x8000;

/// A declared method or field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub name: String,
    pub descriptor: String,
    pub access_flags: u16,
}

impl MemberInfo {
    pub fn is_public(&self) -> bool {
        self.access_flags & ACC_PUBLIC != 0
    }

    pub fn is_private(&self) -> bool {
        self.access_flags & ACC_PRIVATE != 0
    }

    pub fn is_protected(&self) -> bool {
        self.access_flags & ACC_PROTECTED != 0
    }

    pub fn is_package_private(&self) -> bool {
        self.access_flags & (ACC_PUBLIC | ACC_PRIVATE | ACC_PROTECTED) == 0
    }

    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags & ACC_ABSTRACT != 0
    }
}

/// One row of the `InnerClasses` attribute. Either side may be absent for
/// anonymous and local classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerClassEntry {
    pub inner: Option<String>,
    pub outer: Option<String>,
}

/// Parsed form of one class file.
///
/// Only linkage-relevant structure is decoded; attribute payloads other
/// than `InnerClasses` are skipped, and the constant pool is retained
/// verbatim for symbol extraction.
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub binary_name: String,
    pub major_version: u16,
    pub access_flags: u16,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<MemberInfo>,
    pub methods: Vec<MemberInfo>,
    pub inner_classes: Vec<InnerClassEntry>,
    constant_pool: ConstantPool,
}

impl ClassFile {
    pub fn constant_pool(&self) -> &ConstantPool {
        &self.constant_pool
    }

    /// The internal package prefix, empty for the default package.
    pub fn package(&self) -> &str {
        self.binary_name
            .rsplit_once('/')
            .map(|(package, _)| package)
            .unwrap_or("")
    }

    pub fn is_public(&self) -> bool {
        self.access_flags & ACC_PUBLIC != 0
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags & ACC_INTERFACE != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags & ACC_ABSTRACT != 0
    }

    pub fn is_module_info(&self) -> bool {
        self.access_flags & ACC_MODULE != 0
    }

    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<&MemberInfo> {
        self.methods
            .iter()
            .find(|method| method.name == name && method.descriptor == descriptor)
    }

    pub fn find_field(&self, name: &str, descriptor: &str) -> Option<&MemberInfo> {
        self.fields
            .iter()
            .find(|field| field.name == name && field.descriptor == descriptor)
    }
}

/// Parses one class file.
///
/// The version gate runs before the constant pool so a class compiled for a
/// newer release is reported as unsupported rather than malformed.
pub fn parse_class(bytes: &[u8]) -> Result<ClassFile, ClassFileError> {
    let mut reader = ClassReader::new(bytes);
    reader.expect_magic()?;
    let _minor_version = reader.read_u2()?;
    let major_version = reader.read_u2()?;
    if major_version > SUPPORTED_MAJOR_VERSION {
        return Err(ClassFileError::UnsupportedVersion {
            major: major_version,
            supported: SUPPORTED_MAJOR_VERSION,
        });
    }

    let constant_pool = ConstantPool::parse(&mut reader)?;

    let access_flags = reader.read_u2()?;
    let this_class = reader.read_u2()?;
    let super_class = reader.read_u2()?;

    let binary_name = constant_pool.class_name(this_class)?.to_string();
    let super_name = if super_class == 0 {
        None
    } else {
        Some(constant_pool.class_name(super_class)?.to_string())
    };

    let interfaces_count = reader.read_u2()?;
    let mut interfaces = Vec::with_capacity(interfaces_count as usize);
    for _ in 0..interfaces_count {
        let index = reader.read_u2()?;
        interfaces.push(constant_pool.class_name(index)?.to_string());
    }

    let fields = parse_members(&mut reader, &constant_pool)?;
    let methods = parse_members(&mut reader, &constant_pool)?;

    let mut inner_classes = Vec::new();
    let attributes_count = reader.read_u2()?;
    for _ in 0..attributes_count {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        if constant_pool.utf8(name_index)? == "InnerClasses" {
            let slice = reader.read_slice(length)?;
            inner_classes = parse_inner_classes(slice, &constant_pool)?;
        } else {
            reader.skip(length)?;
        }
    }

    Ok(ClassFile {
        binary_name,
        major_version,
        access_flags,
        super_name,
        interfaces,
        fields,
        methods,
        inner_classes,
        constant_pool,
    })
}

fn parse_members(
    reader: &mut ClassReader<'_>,
    pool: &ConstantPool,
) -> Result<Vec<MemberInfo>, ClassFileError> {
    let count = reader.read_u2()?;
    let mut members = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let access_flags = reader.read_u2()?;
        let name_index = reader.read_u2()?;
        let descriptor_index = reader.read_u2()?;
        let name = pool.utf8(name_index)?.to_string();
        let descriptor = pool.utf8(descriptor_index)?.to_string();

        let attributes_count = reader.read_u2()?;
        skip_attributes(reader, attributes_count)?;

        members.push(MemberInfo {
            name,
            descriptor,
            access_flags,
        });
    }
    Ok(members)
}

fn parse_inner_classes(
    bytes: &[u8],
    pool: &ConstantPool,
) -> Result<Vec<InnerClassEntry>, ClassFileError> {
    let mut reader = ClassReader::new(bytes);
    let count = reader.read_u2()?;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let inner_index = reader.read_u2()?;
        let outer_index = reader.read_u2()?;
        let _inner_name_index = reader.read_u2()?;
        let _inner_access_flags = reader.read_u2()?;

        let inner = if inner_index == 0 {
            None
        } else {
            Some(pool.class_name(inner_index)?.to_string())
        };
        let outer = if outer_index == 0 {
            None
        } else {
            Some(pool.class_name(outer_index)?.to_string())
        };
        entries.push(InnerClassEntry { inner, outer });
    }
    Ok(entries)
}

fn skip_attributes(reader: &mut ClassReader<'_>, count: u16) -> Result<(), ClassFileError> {
    for _ in 0..count {
        reader.read_u2()?; // attribute_name_index
        let length = reader.read_u4()? as usize;
        reader.skip(length)?;
    }
    Ok(())
}
