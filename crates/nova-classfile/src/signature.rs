//! Recursive-descent parser for the `Signature` attribute grammar (JVMS §4.7.9.1).
//!
//! The result is a pure syntax tree: type variables are kept as identifiers
//! and class names as internal names. Binding identifiers to declarations is
//! left to consumers, which know the enclosing scopes.

use crate::descriptor::BaseType;
use crate::error::{Error, Result};

/// Deepest accepted nesting of type argument lists and inner class segments.
/// Deeper signatures are rejected instead of exhausting the stack.
pub const MAX_SIGNATURE_NESTING: usize = 64;

/// The class-file format's limit on array dimensions.
const MAX_ARRAY_DIMENSIONS: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSignature {
    Base(BaseType),
    Class(ClassTypeSignature),
    TypeVariable(String),
    Array(Box<TypeSignature>),
}

/// `Lpkg/Outer<..>.Inner<..>;`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassTypeSignature {
    /// Internal package name (`java/util`), `None` for the unnamed package.
    pub package: Option<String>,
    /// Outermost first. Never empty.
    pub segments: Vec<SimpleClassTypeSignature>,
}

impl ClassTypeSignature {
    /// Binary internal name, joining nested segments with `$`.
    pub fn internal_name(&self) -> String {
        let mut out = String::new();
        if let Some(package) = &self.package {
            out.push_str(package);
            out.push('/');
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                out.push('$');
            }
            out.push_str(&segment.name);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleClassTypeSignature {
    pub name: String,
    pub type_arguments: Vec<TypeArgument>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeArgument {
    /// `*`
    Any,
    Exact(TypeSignature),
    /// `+`
    Extends(TypeSignature),
    /// `-`
    Super(TypeSignature),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParameter {
    pub name: String,
    /// `None` when the first bound is an interface (`T::Ljava/lang/Runnable;`).
    pub class_bound: Option<TypeSignature>,
    pub interface_bounds: Vec<TypeSignature>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSignature {
    pub type_parameters: Vec<TypeParameter>,
    pub super_class: ClassTypeSignature,
    pub interfaces: Vec<ClassTypeSignature>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub type_parameters: Vec<TypeParameter>,
    pub parameters: Vec<TypeSignature>,
    /// `None` for `V`.
    pub return_type: Option<TypeSignature>,
    pub throws: Vec<TypeSignature>,
}

pub fn parse_class_signature(sig: &str) -> Result<ClassSignature> {
    let mut p = Parser::new(sig);
    let type_parameters = p.type_parameters()?;
    let super_class = p.class_type()?;
    let mut interfaces = Vec::new();
    while !p.at_end() {
        interfaces.push(p.class_type()?);
    }
    Ok(ClassSignature {
        type_parameters,
        super_class,
        interfaces,
    })
}

pub fn parse_method_signature(sig: &str) -> Result<MethodSignature> {
    let mut p = Parser::new(sig);
    let type_parameters = p.type_parameters()?;
    p.expect(b'(', "expected `(`")?;
    let mut parameters = Vec::new();
    while p.peek() != Some(b')') {
        parameters.push(p.java_type()?);
    }
    p.bump();

    let return_type = if p.peek() == Some(b'V') {
        p.bump();
        None
    } else {
        Some(p.java_type()?)
    };

    let mut throws = Vec::new();
    while p.peek() == Some(b'^') {
        p.bump();
        throws.push(match p.peek() {
            Some(b'L') => TypeSignature::Class(p.class_type()?),
            Some(b'T') => p.type_variable()?,
            _ => return Err(p.error("expected class or type variable after `^`")),
        });
    }
    p.finish()?;

    Ok(MethodSignature {
        type_parameters,
        parameters,
        return_type,
        throws,
    })
}

/// Parses a field (or record component) signature.
///
/// The grammar only admits reference types here, but some non-javac
/// compilers emit a primitive; it is accepted as-is.
pub fn parse_field_signature(sig: &str) -> Result<TypeSignature> {
    let mut p = Parser::new(sig);
    let ty = p.reference_type()?;
    p.finish()?;
    Ok(ty)
}

struct Parser<'a> {
    sig: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(sig: &'a str) -> Self {
        Self {
            sig,
            bytes: sig.as_bytes(),
            pos: 0,
            depth: 0,
        }
    }

    fn descend(&mut self) -> Result<()> {
        if self.depth >= MAX_SIGNATURE_NESTING {
            return Err(self.error("type nesting too deep"));
        }
        self.depth += 1;
        Ok(())
    }

    fn error(&self, reason: &'static str) -> Error {
        Error::InvalidSignature {
            signature: self.sig.to_string(),
            offset: self.pos,
            reason,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn finish(&self) -> Result<()> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.error("trailing characters"))
        }
    }

    fn expect(&mut self, b: u8, reason: &'static str) -> Result<()> {
        if self.peek() == Some(b) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(reason))
        }
    }

    /// Consumes bytes up to (not including) the first byte in `stops`.
    fn take_until(&mut self, stops: &[u8]) -> &'a str {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if stops.contains(&b) {
                break;
            }
            self.bump();
        }
        // Stops are ASCII, so this never splits a UTF-8 sequence.
        &self.sig[start..self.pos]
    }

    fn identifier(&mut self, stops: &[u8]) -> Result<&'a str> {
        let ident = self.take_until(stops);
        if ident.is_empty() {
            return Err(self.error("expected identifier"));
        }
        Ok(ident)
    }

    fn type_parameters(&mut self) -> Result<Vec<TypeParameter>> {
        if self.peek() != Some(b'<') {
            return Ok(Vec::new());
        }
        self.bump();
        let mut params = Vec::new();
        while self.peek() != Some(b'>') {
            if self.at_end() {
                return Err(self.error("unterminated type parameter list"));
            }
            params.push(self.type_parameter()?);
        }
        self.bump();
        if params.is_empty() {
            return Err(self.error("empty type parameter list"));
        }
        Ok(params)
    }

    fn type_parameter(&mut self) -> Result<TypeParameter> {
        let name = self.identifier(b":;<>.[/")?.to_string();
        self.expect(b':', "expected `:` after type parameter name")?;
        let class_bound = match self.peek() {
            Some(b':') | Some(b'>') => None,
            _ => Some(self.reference_type()?),
        };
        let mut interface_bounds = Vec::new();
        while self.peek() == Some(b':') {
            self.bump();
            interface_bounds.push(self.reference_type()?);
        }
        Ok(TypeParameter {
            name,
            class_bound,
            interface_bounds,
        })
    }

    fn java_type(&mut self) -> Result<TypeSignature> {
        let Some(b) = self.peek() else {
            return Err(self.error("expected type"));
        };
        if let Some(base) = BaseType::from_descriptor_char(b) {
            self.bump();
            return Ok(TypeSignature::Base(base));
        }
        match b {
            b'L' => Ok(TypeSignature::Class(self.class_type()?)),
            b'T' => self.type_variable(),
            b'[' => {
                let mut dimensions = 0;
                while self.peek() == Some(b'[') {
                    self.bump();
                    dimensions += 1;
                }
                if dimensions > MAX_ARRAY_DIMENSIONS {
                    return Err(self.error("too many array dimensions"));
                }
                let mut ty = self.java_type()?;
                for _ in 0..dimensions {
                    ty = TypeSignature::Array(Box::new(ty));
                }
                Ok(ty)
            }
            _ => Err(self.error("expected type")),
        }
    }

    /// A reference type, tolerating a primitive in its place.
    fn reference_type(&mut self) -> Result<TypeSignature> {
        let ty = self.java_type()?;
        if let TypeSignature::Base(base) = ty {
            tracing::debug!(
                target: "nova.classfile",
                signature = self.sig,
                primitive = ?base,
                "accepting primitive type in a reference-only signature position"
            );
        }
        Ok(ty)
    }

    fn type_variable(&mut self) -> Result<TypeSignature> {
        self.expect(b'T', "expected type variable")?;
        let name = self.identifier(b";<>.[/:")?.to_string();
        self.expect(b';', "expected `;` after type variable")?;
        Ok(TypeSignature::TypeVariable(name))
    }

    fn class_type(&mut self) -> Result<ClassTypeSignature> {
        self.expect(b'L', "expected class type")?;
        let qualified = self.identifier(b"<.;:>[")?;
        let (package, first) = match qualified.rsplit_once('/') {
            Some((package, name)) if !package.is_empty() && !name.is_empty() => {
                (Some(package.to_string()), name)
            }
            Some(_) => return Err(self.error("malformed class name")),
            None => (None, qualified),
        };

        let mut segments = vec![SimpleClassTypeSignature {
            name: first.to_string(),
            type_arguments: self.type_arguments()?,
        }];
        // Each inner segment wraps the ones before it as its owner.
        let entered = self.depth;
        while self.peek() == Some(b'.') {
            self.bump();
            self.descend()?;
            let name = self.identifier(b"<.;:>[/")?.to_string();
            segments.push(SimpleClassTypeSignature {
                name,
                type_arguments: self.type_arguments()?,
            });
        }
        self.depth = entered;
        self.expect(b';', "expected `;` after class type")?;

        Ok(ClassTypeSignature { package, segments })
    }

    fn type_arguments(&mut self) -> Result<Vec<TypeArgument>> {
        if self.peek() != Some(b'<') {
            return Ok(Vec::new());
        }
        self.bump();
        self.descend()?;
        let mut args = Vec::new();
        loop {
            let arg = match self.peek() {
                Some(b'>') => break,
                Some(b'*') => {
                    self.bump();
                    TypeArgument::Any
                }
                Some(b'+') => {
                    self.bump();
                    TypeArgument::Extends(self.reference_type()?)
                }
                Some(b'-') => {
                    self.bump();
                    TypeArgument::Super(self.reference_type()?)
                }
                Some(_) => TypeArgument::Exact(self.reference_type()?),
                None => return Err(self.error("unterminated type argument list")),
            };
            args.push(arg);
        }
        self.bump();
        self.depth -= 1;
        if args.is_empty() {
            return Err(self.error("empty type argument list"));
        }
        Ok(args)
    }
}
