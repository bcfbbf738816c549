use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl BaseType {
    pub fn from_descriptor_char(c: u8) -> Option<Self> {
        Some(match c {
            b'B' => BaseType::Byte,
            b'C' => BaseType::Char,
            b'D' => BaseType::Double,
            b'F' => BaseType::Float,
            b'I' => BaseType::Int,
            b'J' => BaseType::Long,
            b'S' => BaseType::Short,
            b'Z' => BaseType::Boolean,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Base(BaseType),
    Object(String),
    Array(Box<FieldType>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnType {
    Void,
    Type(FieldType),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// No upper bound is enforced: some non-javac producers exceed the
    /// 255-slot limit and such methods are still indexed.
    pub params: Vec<FieldType>,
    pub return_type: ReturnType,
}

pub fn parse_field_descriptor(desc: &str) -> Result<FieldType> {
    let (ty, rest) = parse_field_type(desc)?;
    if !rest.is_empty() {
        return Err(Error::InvalidDescriptor(desc.to_string()));
    }
    Ok(ty)
}

/// Parses a field descriptor or `V`, as found in class literal annotation values.
pub fn parse_return_descriptor(desc: &str) -> Result<ReturnType> {
    if desc == "V" {
        return Ok(ReturnType::Void);
    }
    parse_field_descriptor(desc).map(ReturnType::Type)
}

pub fn parse_method_descriptor(desc: &str) -> Result<MethodDescriptor> {
    let invalid = || Error::InvalidDescriptor(desc.to_string());

    let mut rest = desc.strip_prefix('(').ok_or_else(invalid)?;
    let mut params = Vec::new();
    loop {
        if let Some(after) = rest.strip_prefix(')') {
            rest = after;
            break;
        }
        if rest.is_empty() {
            return Err(invalid());
        }
        let (param, after) = parse_field_type(rest).map_err(|_| invalid())?;
        params.push(param);
        rest = after;
    }

    let (return_type, rest) = if let Some(rest) = rest.strip_prefix('V') {
        (ReturnType::Void, rest)
    } else {
        let (ty, rest) = parse_field_type(rest).map_err(|_| invalid())?;
        (ReturnType::Type(ty), rest)
    };

    if !rest.is_empty() {
        return Err(invalid());
    }

    Ok(MethodDescriptor { params, return_type })
}

fn parse_field_type(input: &str) -> Result<(FieldType, &str)> {
    let Some(&first) = input.as_bytes().first() else {
        return Err(Error::InvalidDescriptor(input.to_string()));
    };
    if let Some(base) = BaseType::from_descriptor_char(first) {
        return Ok((FieldType::Base(base), &input[1..]));
    }
    match first {
        b'L' => match input.find(';') {
            Some(end) if end > 1 => {
                let name = &input[1..end];
                Ok((FieldType::Object(name.to_string()), &input[end + 1..]))
            }
            _ => Err(Error::InvalidDescriptor(input.to_string())),
        },
        b'[' => {
            let dimensions = input.bytes().take_while(|&b| b == b'[').count();
            if dimensions > 255 {
                return Err(Error::InvalidDescriptor(input.to_string()));
            }
            let (mut ty, rest) = parse_field_type(&input[dimensions..])?;
            for _ in 0..dimensions {
                ty = FieldType::Array(Box::new(ty));
            }
            Ok((ty, rest))
        }
        _ => Err(Error::InvalidDescriptor(input.to_string())),
    }
}
