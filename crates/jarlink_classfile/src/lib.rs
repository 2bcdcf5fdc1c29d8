// jarlink_classfile - class-file parsing and symbol extraction
mod assembler;
mod class_file;
mod constant_pool;
mod descriptor;
mod reader;
mod symbols;

pub use assembler::ClassFileAssembler;
pub use class_file::{
    parse_class, ClassFile, InnerClassEntry, MemberInfo, ACC_ABSTRACT, ACC_BRIDGE, ACC_ENUM,
    ACC_FINAL, ACC_INTERFACE, ACC_MODULE, ACC_PRIVATE, ACC_PROTECTED, ACC_PUBLIC, ACC_STATIC,
    ACC_SYNTHETIC,
};
pub use constant_pool::{Constant, ConstantPool};
pub use descriptor::{
    element_class_name, validate_field_descriptor, validate_method_descriptor, FieldType,
};
pub use reader::{ClassFileError, SUPPORTED_MAJOR_VERSION};
pub use symbols::{
    extract_references, ClassSymbol, FieldSymbol, MethodSymbol, Symbol, SymbolReferences,
};

#[cfg(test)]
mod tests;
