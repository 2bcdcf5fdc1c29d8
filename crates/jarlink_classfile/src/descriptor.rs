use crate::reader::ClassFileError;

/// A decoded field type from the JVM descriptor grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// One of `B C D F I J S Z`.
    Primitive(char),
    /// Internal (slash-separated) class name.
    Object(String),
    Array {
        dimensions: usize,
        element: Box<FieldType>,
    },
}

impl FieldType {
    /// The internal class name of the innermost element, if any.
    pub fn element_class(&self) -> Option<&str> {
        match self {
            FieldType::Primitive(_) => None,
            FieldType::Object(name) => Some(name),
            FieldType::Array { element, .. } => element.element_class(),
        }
    }
}

/// Validates a field descriptor such as `[Ljava/util/List;`.
pub fn validate_field_descriptor(descriptor: &str) -> Result<FieldType, ClassFileError> {
    let mut parser = DescriptorParser::new(descriptor);
    let ty = parser.parse_type()?;
    if parser.remaining() != 0 {
        return Err(ClassFileError::InvalidDescriptor(descriptor.to_string()));
    }
    Ok(ty)
}

/// Validates a method descriptor such as `(I[Ljava/lang/String;)V` and
/// returns its parameter types and return type (`None` for `void`).
pub fn validate_method_descriptor(
    descriptor: &str,
) -> Result<(Vec<FieldType>, Option<FieldType>), ClassFileError> {
    let mut parser = DescriptorParser::new(descriptor);
    parser.expect(b'(')?;
    let mut parameters = Vec::new();
    while !parser.peek(b')')? {
        parameters.push(parser.parse_type()?);
    }
    parser.expect(b')')?;

    let return_type = if parser.peek(b'V')? {
        parser.advance();
        None
    } else {
        Some(parser.parse_type()?)
    };

    if parser.remaining() != 0 {
        return Err(ClassFileError::InvalidDescriptor(descriptor.to_string()));
    }

    Ok((parameters, return_type))
}

/// Unwraps a `Class` constant's name to the class it ultimately refers to.
///
/// Pool entries may hold a plain internal name (`java/util/List`) or an
/// array descriptor (`[[Ljava/util/List;`). Primitive arrays have no class
/// to report.
pub fn element_class_name(pool_name: &str) -> Option<String> {
    if !pool_name.starts_with('[') {
        return Some(pool_name.to_string());
    }
    let ty = validate_field_descriptor(pool_name).ok()?;
    ty.element_class().map(str::to_string)
}

struct DescriptorParser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> DescriptorParser<'a> {
    fn new(descriptor: &'a str) -> Self {
        Self {
            bytes: descriptor.as_bytes(),
            pos: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn expect(&mut self, byte: u8) -> Result<(), ClassFileError> {
        if self.remaining() == 0 || self.bytes[self.pos] != byte {
            return Err(ClassFileError::InvalidDescriptor(format!(
                "expected '{}' in descriptor",
                byte as char
            )));
        }
        self.pos += 1;
        Ok(())
    }

    fn peek(&self, byte: u8) -> Result<bool, ClassFileError> {
        if self.remaining() == 0 {
            return Err(ClassFileError::InvalidDescriptor(
                "truncated descriptor".into(),
            ));
        }
        Ok(self.bytes[self.pos] == byte)
    }

    fn parse_type(&mut self) -> Result<FieldType, ClassFileError> {
        if self.remaining() == 0 {
            return Err(ClassFileError::InvalidDescriptor(
                "truncated descriptor".into(),
            ));
        }

        match self.bytes[self.pos] {
            tag @ (b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z') => {
                self.pos += 1;
                Ok(FieldType::Primitive(tag as char))
            }
            b'L' => self.parse_reference_type(),
            b'[' => self.parse_array_type(),
            other => Err(ClassFileError::InvalidDescriptor(format!(
                "unexpected descriptor tag '{}'",
                other as char
            ))),
        }
    }

    fn parse_reference_type(&mut self) -> Result<FieldType, ClassFileError> {
        self.expect(b'L')?;
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b';' {
            self.pos += 1;
        }
        if self.pos >= self.bytes.len() || self.pos == start {
            return Err(ClassFileError::InvalidDescriptor(
                "unterminated reference descriptor".into(),
            ));
        }
        let name = std::str::from_utf8(&self.bytes[start..self.pos])
            .map_err(|_| ClassFileError::InvalidUtf8)?
            .to_string();
        self.pos += 1; // consume ';'
        Ok(FieldType::Object(name))
    }

    fn parse_array_type(&mut self) -> Result<FieldType, ClassFileError> {
        let mut dimensions = 0;
        while self.remaining() > 0 && self.bytes[self.pos] == b'[' {
            dimensions += 1;
            self.pos += 1;
        }
        // 255 dimensions is the format ceiling.
        if dimensions > 255 {
            return Err(ClassFileError::InvalidDescriptor(
                "array descriptor exceeds 255 dimensions".into(),
            ));
        }
        let element = self.parse_type()?;
        Ok(FieldType::Array {
            dimensions,
            element: Box::new(element),
        })
    }
}
