use crate::class_file::ACC_PUBLIC;
use std::collections::HashMap;

const ACC_SUPER: u16 = 0x0020;

/// Builds synthetic class files for the test suites.
///
/// The assembler emits just enough of the format for [`crate::parse_class`]
/// and the linkage layers: constant pool, access flags, supertypes, member
/// tables without bodies, and an optional `InnerClasses` attribute. Method
/// and field references land in the pool exactly as a compiler would emit
/// them for a call site.
#[derive(Debug, Clone)]
pub struct ClassFileAssembler {
    binary_name: String,
    super_name: Option<String>,
    access_flags: u16,
    major_version: u16,
    interfaces: Vec<String>,
    fields: Vec<(String, String, u16)>,
    methods: Vec<(String, String, u16)>,
    class_refs: Vec<String>,
    method_refs: Vec<(String, String, String, bool)>,
    field_refs: Vec<(String, String, String)>,
    inner_classes: Vec<(String, Option<String>)>,
}

impl ClassFileAssembler {
    pub fn new(binary_name: impl Into<String>) -> Self {
        Self {
            binary_name: binary_name.into(),
            super_name: Some("java/lang/Object".to_string()),
            access_flags: ACC_PUBLIC | ACC_SUPER,
            major_version: 61,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            class_refs: Vec::new(),
            method_refs: Vec::new(),
            field_refs: Vec::new(),
            inner_classes: Vec::new(),
        }
    }

    pub fn access_flags(mut self, flags: u16) -> Self {
        self.access_flags = flags;
        self
    }

    pub fn major_version(mut self, major: u16) -> Self {
        self.major_version = major;
        self
    }

    pub fn super_class(mut self, name: impl Into<String>) -> Self {
        self.super_name = Some(name.into());
        self
    }

    /// Only `java/lang/Object` itself has no super class.
    pub fn no_super_class(mut self) -> Self {
        self.super_name = None;
        self
    }

    pub fn implements(mut self, name: impl Into<String>) -> Self {
        self.interfaces.push(name.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, descriptor: impl Into<String>, flags: u16) -> Self {
        self.fields.push((name.into(), descriptor.into(), flags));
        self
    }

    pub fn method(
        mut self,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        flags: u16,
    ) -> Self {
        self.methods.push((name.into(), descriptor.into(), flags));
        self
    }

    /// Adds a bare `Class` constant, as a type use site would.
    pub fn reference_class(mut self, name: impl Into<String>) -> Self {
        self.class_refs.push(name.into());
        self
    }

    pub fn reference_method(
        mut self,
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        self.method_refs
            .push((owner.into(), name.into(), descriptor.into(), false));
        self
    }

    pub fn reference_interface_method(
        mut self,
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        self.method_refs
            .push((owner.into(), name.into(), descriptor.into(), true));
        self
    }

    pub fn reference_field(
        mut self,
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        self.field_refs
            .push((owner.into(), name.into(), descriptor.into()));
        self
    }

    /// Records `self` as an inner class of `outer` in the
    /// `InnerClasses` attribute.
    pub fn inner_class_of(mut self, outer: impl Into<String>) -> Self {
        self.inner_classes
            .push((self.binary_name.clone(), Some(outer.into())));
        self
    }

    pub fn assemble(&self) -> Vec<u8> {
        let mut pool = PoolBuilder::default();

        let this_index = pool.class(&self.binary_name);
        let super_index = self.super_name.as_deref().map(|name| pool.class(name));
        let interface_indices: Vec<u16> = self
            .interfaces
            .iter()
            .map(|name| pool.class(name))
            .collect();

        let field_indices = intern_members(&mut pool, &self.fields);
        let method_indices = intern_members(&mut pool, &self.methods);

        for name in &self.class_refs {
            pool.class(name);
        }
        for (owner, name, descriptor, interface) in &self.method_refs {
            pool.method_ref(owner, name, descriptor, *interface);
        }
        for (owner, name, descriptor) in &self.field_refs {
            pool.field_ref(owner, name, descriptor);
        }

        let inner_entries: Vec<(u16, u16)> = self
            .inner_classes
            .iter()
            .map(|(inner, outer)| {
                (
                    pool.class(inner),
                    outer.as_deref().map(|name| pool.class(name)).unwrap_or(0),
                )
            })
            .collect();
        let inner_attr_name = if inner_entries.is_empty() {
            None
        } else {
            Some(pool.utf8("InnerClasses"))
        };

        let mut out = Vec::new();
        put_u4(&mut out, 0xCAFEBABE);
        put_u2(&mut out, 0); // minor
        put_u2(&mut out, self.major_version);
        pool.write(&mut out);
        put_u2(&mut out, self.access_flags);
        put_u2(&mut out, this_index);
        put_u2(&mut out, super_index.unwrap_or(0));

        put_u2(&mut out, interface_indices.len() as u16);
        for index in interface_indices {
            put_u2(&mut out, index);
        }

        for members in [&field_indices, &method_indices] {
            put_u2(&mut out, members.len() as u16);
            for (name_index, descriptor_index, flags) in members {
                put_u2(&mut out, *flags);
                put_u2(&mut out, *name_index);
                put_u2(&mut out, *descriptor_index);
                put_u2(&mut out, 0); // attributes_count
            }
        }

        match inner_attr_name {
            Some(attr_name_index) => {
                put_u2(&mut out, 1);
                put_u2(&mut out, attr_name_index);
                put_u4(&mut out, 2 + 8 * inner_entries.len() as u32);
                put_u2(&mut out, inner_entries.len() as u16);
                for (inner_index, outer_index) in inner_entries {
                    put_u2(&mut out, inner_index);
                    put_u2(&mut out, outer_index);
                    put_u2(&mut out, 0); // inner_name_index
                    put_u2(&mut out, 0); // inner_class_access_flags
                }
            }
            None => put_u2(&mut out, 0),
        }

        out
    }
}

#[derive(Debug, Clone)]
enum RawConstant {
    Utf8(String),
    Class(u16),
    NameAndType(u16, u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
}

#[derive(Debug, Default)]
struct PoolBuilder {
    entries: Vec<RawConstant>,
    utf8_cache: HashMap<String, u16>,
    class_cache: HashMap<String, u16>,
    nat_cache: HashMap<(String, String), u16>,
}

impl PoolBuilder {
    fn push(&mut self, entry: RawConstant) -> u16 {
        self.entries.push(entry);
        self.entries.len() as u16
    }

    fn utf8(&mut self, value: &str) -> u16 {
        if let Some(index) = self.utf8_cache.get(value) {
            return *index;
        }
        let index = self.push(RawConstant::Utf8(value.to_string()));
        self.utf8_cache.insert(value.to_string(), index);
        index
    }

    fn class(&mut self, name: &str) -> u16 {
        if let Some(index) = self.class_cache.get(name) {
            return *index;
        }
        let name_index = self.utf8(name);
        let index = self.push(RawConstant::Class(name_index));
        self.class_cache.insert(name.to_string(), index);
        index
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let key = (name.to_string(), descriptor.to_string());
        if let Some(index) = self.nat_cache.get(&key) {
            return *index;
        }
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let index = self.push(RawConstant::NameAndType(name_index, descriptor_index));
        self.nat_cache.insert(key, index);
        index
    }

    fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str, interface: bool) -> u16 {
        let class_index = self.class(owner);
        let nat_index = self.name_and_type(name, descriptor);
        if interface {
            self.push(RawConstant::InterfaceMethodRef(class_index, nat_index))
        } else {
            self.push(RawConstant::MethodRef(class_index, nat_index))
        }
    }

    fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(owner);
        let nat_index = self.name_and_type(name, descriptor);
        self.push(RawConstant::FieldRef(class_index, nat_index))
    }

    fn write(&self, out: &mut Vec<u8>) {
        put_u2(out, self.entries.len() as u16 + 1);
        for entry in &self.entries {
            match entry {
                RawConstant::Utf8(value) => {
                    out.push(1);
                    put_u2(out, value.len() as u16);
                    out.extend_from_slice(value.as_bytes());
                }
                RawConstant::Class(name_index) => {
                    out.push(7);
                    put_u2(out, *name_index);
                }
                RawConstant::NameAndType(name_index, descriptor_index) => {
                    out.push(12);
                    put_u2(out, *name_index);
                    put_u2(out, *descriptor_index);
                }
                RawConstant::FieldRef(class_index, nat_index) => {
                    out.push(9);
                    put_u2(out, *class_index);
                    put_u2(out, *nat_index);
                }
                RawConstant::MethodRef(class_index, nat_index) => {
                    out.push(10);
                    put_u2(out, *class_index);
                    put_u2(out, *nat_index);
                }
                RawConstant::InterfaceMethodRef(class_index, nat_index) => {
                    out.push(11);
                    put_u2(out, *class_index);
                    put_u2(out, *nat_index);
                }
            }
        }
    }
}

fn intern_members(
    pool: &mut PoolBuilder,
    members: &[(String, String, u16)],
) -> Vec<(u16, u16, u16)> {
    members
        .iter()
        .map(|(name, descriptor, flags)| (pool.utf8(name), pool.utf8(descriptor), *flags))
        .collect()
}

fn put_u2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_u4(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}
