//! Dotted names with structural equality.
//!
//! A [`DotName`] is either *simple* (one flat string such as
//! `java.util.Map$Entry`) or *componentized* (a parent name plus one local
//! segment). Both forms of the same name are equal and hash identically, so
//! callers never need to care which one they hold.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use smol_str::SmolStr;

#[derive(Clone)]
pub struct DotName(Arc<Node>);

struct Node {
    prefix: Option<DotName>,
    local: SmolStr,
    /// Joined to `prefix` with `$` instead of `.`.
    inner_class: bool,
    /// Java `String.hashCode` of the rendered name, computed incrementally.
    hash: u32,
}

fn fold_hash(mut h: u32, s: &str) -> u32 {
    for unit in s.encode_utf16() {
        h = h.wrapping_mul(31).wrapping_add(unit as u32);
    }
    h
}

impl DotName {
    /// A flat name, e.g. `java.lang.String`.
    pub fn simple(name: &str) -> Self {
        DotName(Arc::new(Node {
            prefix: None,
            local: SmolStr::new(name),
            inner_class: false,
            hash: fold_hash(0, name),
        }))
    }

    /// `prefix` joined with `local` by `.` (or `$` when `inner_class`).
    pub fn componentized(prefix: Option<DotName>, local: &str, inner_class: bool) -> Self {
        let inner_class = inner_class && prefix.is_some();
        let hash = match &prefix {
            Some(p) => {
                let sep = if inner_class { "$" } else { "." };
                fold_hash(fold_hash(p.0.hash, sep), local)
            }
            None => fold_hash(0, local),
        };
        DotName(Arc::new(Node {
            prefix,
            local: SmolStr::new(local),
            inner_class,
            hash,
        }))
    }

    /// Converts a JVM internal name (`java/util/Map$Entry`).
    pub fn from_internal(internal: &str) -> Self {
        DotName::simple(&internal.replace('/', "."))
    }

    pub fn prefix(&self) -> Option<&DotName> {
        self.0.prefix.as_ref()
    }

    pub fn local(&self) -> &str {
        &self.0.local
    }

    pub fn is_componentized(&self) -> bool {
        self.0.prefix.is_some()
    }

    pub fn is_inner_class(&self) -> bool {
        self.0.inner_class
    }

    /// The last `.`-separated segment, `$` nesting included (`Map$Entry`).
    pub fn simple_class_name(&self) -> String {
        let rendered = self.to_string();
        match rendered.rsplit_once('.') {
            Some((_, last)) => last.to_string(),
            None => rendered,
        }
    }

    /// Everything before the last `.`, or `None` for the unnamed package.
    pub fn package_prefix(&self) -> Option<DotName> {
        let rendered = self.to_string();
        rendered
            .rsplit_once('.')
            .map(|(package, _)| DotName::simple(package))
    }

    pub fn to_internal(&self) -> String {
        self.to_string().replace('.', "/")
    }

    fn rev_chars(&self) -> RevChars<'_> {
        RevChars {
            node: Some(&self.0),
            chars: self.0.local.chars().rev(),
        }
    }

    fn chars(&self) -> Chars<'_> {
        let mut segments = 1;
        let mut node = &self.0;
        while let Some(prefix) = &node.prefix {
            segments += 1;
            node = &prefix.0;
        }
        Chars {
            leaf: &self.0,
            segments,
            next_segment: 0,
            chars: "".chars(),
        }
    }

    fn write_into(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.0.prefix {
            prefix.write_into(f)?;
            f.write_str(if self.0.inner_class { "$" } else { "." })?;
        }
        f.write_str(&self.0.local)
    }
}

/// The rendered name, front to back, without building it. Names are a few
/// segments deep, so each segment is found by walking up from the leaf.
struct Chars<'a> {
    leaf: &'a Node,
    segments: usize,
    next_segment: usize,
    chars: std::str::Chars<'a>,
}

impl<'a> Chars<'a> {
    fn segment(&self, index: usize) -> &'a Node {
        let mut node = self.leaf;
        for _ in index + 1..self.segments {
            match &node.prefix {
                Some(prefix) => node = &prefix.0,
                None => break,
            }
        }
        node
    }
}

impl Iterator for Chars<'_> {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        if let Some(c) = self.chars.next() {
            return Some(c);
        }
        if self.next_segment >= self.segments {
            return None;
        }
        let node = self.segment(self.next_segment);
        self.next_segment += 1;
        self.chars = node.local.chars();
        if self.next_segment == 1 {
            return self.next();
        }
        Some(if node.inner_class { '$' } else { '.' })
    }
}

struct RevChars<'a> {
    node: Option<&'a Node>,
    chars: std::iter::Rev<std::str::Chars<'a>>,
}

impl Iterator for RevChars<'_> {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        if let Some(c) = self.chars.next() {
            return Some(c);
        }
        let node = self.node.take()?;
        let prefix = node.prefix.as_ref()?;
        self.node = Some(&prefix.0);
        self.chars = prefix.0.local.chars().rev();
        Some(if node.inner_class { '$' } else { '.' })
    }
}

impl PartialEq for DotName {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        self.0.hash == other.0.hash && self.rev_chars().eq(other.rev_chars())
    }
}

impl Eq for DotName {}

impl Hash for DotName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.0.hash);
    }
}

impl PartialOrd for DotName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DotName {
    fn cmp(&self, other: &Self) -> Ordering {
        if self == other {
            return Ordering::Equal;
        }
        self.chars().cmp(other.chars())
    }
}

impl fmt::Display for DotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_into(f)
    }
}

impl fmt::Debug for DotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DotName({self})")
    }
}

/// Per-session interner for class and package names.
///
/// Names produced by one table share their package prefixes. Nothing is
/// process-global: drop the table and its names are reclaimed once no
/// index refers to them.
#[derive(Debug, Default)]
pub struct NameTable {
    packages: HashMap<SmolStr, DotName>,
    classes: HashMap<SmolStr, DotName>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns an internal class name (`p/q/A$B`) as `p.q` + `A$B`.
    pub fn class_name(&mut self, internal: &str) -> DotName {
        if let Some(name) = self.classes.get(internal) {
            return name.clone();
        }
        let name = match internal.rsplit_once('/') {
            Some((package, local)) => {
                let package = self.package_name(package);
                DotName::componentized(Some(package), local, false)
            }
            None => DotName::componentized(None, internal, false),
        };
        self.classes.insert(SmolStr::new(internal), name.clone());
        name
    }

    /// A nested class name componentized as `outer` + `$simple`. Falls back to
    /// [`NameTable::class_name`] when `internal` is not spelled that way,
    /// which obfuscators and some non-javac compilers produce.
    pub fn nested_class_name(&mut self, outer: &DotName, simple: &str, internal: &str) -> DotName {
        if let Some(name) = self.classes.get(internal) {
            if name.prefix() == Some(outer) {
                return name.clone();
            }
        }
        if format!("{outer}${simple}") != internal.replace('/', ".") {
            return self.class_name(internal);
        }
        let name = DotName::componentized(Some(outer.clone()), simple, true);
        self.classes.insert(SmolStr::new(internal), name.clone());
        name
    }

    /// Interns an internal package name (`java/util`).
    pub fn package_name(&mut self, internal: &str) -> DotName {
        if let Some(name) = self.packages.get(internal) {
            return name.clone();
        }
        let name = match internal.rsplit_once('/') {
            Some((parent, local)) => {
                let parent = self.package_name(parent);
                DotName::componentized(Some(parent), local, false)
            }
            None => DotName::componentized(None, internal, false),
        };
        self.packages.insert(SmolStr::new(internal), name.clone());
        name
    }

    pub fn len(&self) -> usize {
        self.packages.len() + self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
