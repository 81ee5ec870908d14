// Bytecode analysis - structural questions about class members answered
// statically from the instruction stream
#![allow(dead_code)]

mod analyzer;
mod callgraph;
mod exposure;
mod sim;

pub use analyzer::{ClassAnalyzer, FieldCall, PossibleValue, PossibleValueTable};
pub use callgraph::ClassCallGraph;
pub use exposure::{ExposureIndex, ProcessCaches};
pub use sim::{simulate, StackSimulation};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bytecode analysis errors. All of them degrade to empty results at the
/// analyzer boundary; nothing here ever aborts a scan.
#[derive(Error, Debug)]
pub enum BytecodeError {
    #[error("malformed descriptor: {0}")]
    BadDescriptor(String),
    #[error("stack simulation diverged in {0}")]
    SimulationFailed(String),
}

/// Parsed instruction stream for one class.
///
/// Decoding raw classfile bytes is host-platform work, like reflection; the
/// [`BytecodeSupplier`](crate::heap::BytecodeSupplier) hands the core this
/// model directly.
#[derive(Debug, Clone)]
pub struct ClassCode {
    pub name: String,
    pub super_name: Option<String>,
    pub methods: Vec<MethodCode>,
}

impl ClassCode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            super_name: None,
            methods: Vec::new(),
        }
    }

    pub fn with_super(mut self, super_name: impl Into<String>) -> Self {
        self.super_name = Some(super_name.into());
        self
    }

    pub fn with_method(mut self, method: MethodCode) -> Self {
        self.methods.push(method);
        self
    }

    pub fn method(&self, signature: &str) -> Option<&MethodCode> {
        self.methods.iter().find(|m| m.signature() == signature)
    }
}

/// One method and its instructions.
#[derive(Debug, Clone)]
pub struct MethodCode {
    pub name: String,
    pub descriptor: String,
    pub access: MethodAccess,
    pub instructions: Vec<Insn>,
}

impl MethodCode {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
            access: MethodAccess::default(),
            instructions: Vec::new(),
        }
    }

    pub fn with_access(mut self, access: MethodAccess) -> Self {
        self.access = access;
        self
    }

    pub fn private(mut self) -> Self {
        self.access.is_private = true;
        self.access.is_public = false;
        self
    }

    pub fn synthetic(mut self) -> Self {
        self.access.is_synthetic = true;
        self
    }

    pub fn static_method(mut self) -> Self {
        self.access.is_static = true;
        self
    }

    pub fn with_instructions(mut self, instructions: Vec<Insn>) -> Self {
        self.instructions = instructions;
        self
    }

    /// `name + descriptor`, the within-class identity used by the call graph.
    pub fn signature(&self) -> String {
        format!("{}{}", self.name, self.descriptor)
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    pub fn is_class_initializer(&self) -> bool {
        self.name == "<clinit>"
    }
}

/// Method access flags used for external-visibility filtering.
#[derive(Debug, Clone, Copy, Default)]
pub struct MethodAccess {
    pub is_public: bool,
    pub is_private: bool,
    pub is_static: bool,
    pub is_synthetic: bool,
}

impl MethodAccess {
    pub fn public() -> Self {
        Self {
            is_public: true,
            ..Default::default()
        }
    }

    pub fn private() -> Self {
        Self {
            is_private: true,
            ..Default::default()
        }
    }
}

/// Symbolic reference to a field or method of some class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberRef {
    /// Owning class, dotted name.
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl MemberRef {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

impl std::fmt::Display for MemberRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.descriptor)
    }
}

/// Invocation opcode classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,
    /// invokedynamic lambda site; the target is the synthetic implementation
    /// method the call site bootstraps to.
    Dynamic,
}

/// Instruction kinds the dataflow machine distinguishes. Jump targets are
/// instruction indices, not byte offsets.
#[derive(Debug, Clone)]
pub enum Insn {
    /// Pushes a constant (ldc, iconst_*, aconst_null, ...).
    Const,
    /// Local variable load.
    Load(u16),
    /// Local variable store; pops one.
    Store(u16),
    GetField(MemberRef),
    PutField(MemberRef),
    GetStatic(MemberRef),
    PutStatic(MemberRef),
    Invoke { kind: InvokeKind, target: MemberRef },
    /// Pushes a fresh instance of the named class.
    New(String),
    Dup,
    Pop,
    /// Unconditional jump.
    Goto(usize),
    /// Conditional jump; pops one.
    If(usize),
    /// Return, with or without value; ends the flow.
    Return,
    /// Pops one; ends the flow.
    Throw,
    /// Anything else, reduced to its net stack effect.
    Other { pops: u8, pushes: u8 },
}

/// Number of argument slots in a method descriptor, receiver excluded.
pub fn descriptor_arg_count(descriptor: &str) -> Result<usize, BytecodeError> {
    let inner = descriptor
        .strip_prefix('(')
        .and_then(|d| d.split_once(')'))
        .ok_or_else(|| BytecodeError::BadDescriptor(descriptor.to_string()))?
        .0;

    let mut count = 0;
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            'B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z' => count += 1,
            '[' => {
                // Array prefix: consume dimensions, then one element type
                let mut next = chars.next();
                while next == Some('[') {
                    next = chars.next();
                }
                if next == Some('L') {
                    for c in chars.by_ref() {
                        if c == ';' {
                            break;
                        }
                    }
                }
                count += 1;
            }
            'L' => {
                for c in chars.by_ref() {
                    if c == ';' {
                        break;
                    }
                }
                count += 1;
            }
            _ => return Err(BytecodeError::BadDescriptor(descriptor.to_string())),
        }
    }
    Ok(count)
}

/// Whether a method descriptor produces a value.
pub fn descriptor_returns_value(descriptor: &str) -> bool {
    !descriptor.ends_with(")V")
}

/// Dotted class name of the descriptor's return type, when it is a
/// reference type.
pub fn descriptor_return_class(descriptor: &str) -> Option<String> {
    let ret = descriptor.split_once(')')?.1;
    let ret = ret.strip_prefix('L')?;
    let ret = ret.strip_suffix(';')?;
    Some(ret.replace('/', "."))
}

/// Dotted class name of a field descriptor's type, when it is a reference
/// type.
pub fn field_descriptor_class(descriptor: &str) -> Option<String> {
    let inner = descriptor.strip_prefix('L')?;
    let inner = inner.strip_suffix(';')?;
    Some(inner.replace('/', "."))
}
