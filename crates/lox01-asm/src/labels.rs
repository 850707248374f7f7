//! Label bindings and deferred branch-displacement patches.

use std::collections::BTreeMap;

use lox01::codec::{patch_i16, patch_i32, OperandShape};
use num_traits::ToPrimitive;
use tracing::{debug, trace};

use crate::error::{AsmError, AsmErrorKind, AsmResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldWidth {
    W16,
    W32,
}

impl FieldWidth {
    pub fn for_shape(shape: OperandShape) -> Option<Self> {
        match shape {
            OperandShape::JmpDest16 => Some(FieldWidth::W16),
            OperandShape::JmpDest32 => Some(FieldWidth::W32),
            _ => None,
        }
    }

    pub fn bytes(self) -> u32 {
        match self {
            FieldWidth::W16 => 2,
            FieldWidth::W32 => 4,
        }
    }

    pub fn bits(self) -> u32 {
        self.bytes() * 8
    }
}

/// Displacement from the end of a branch field to `target`, range-checked for
/// the field width.
pub fn displacement(target: u32, field_address: u32, width: FieldWidth) -> Result<i32, AsmErrorKind> {
    let disp = target as i64 - (field_address as i64 + width.bytes() as i64);
    let fits = match width {
        FieldWidth::W16 => disp.to_i16().map(i32::from),
        FieldWidth::W32 => disp.to_i32(),
    };
    fits.ok_or(AsmErrorKind::DisplacementOutOfRange {
        disp,
        bits: width.bits(),
    })
}

/// A branch field waiting for its label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    pub label: String,
    /// Virtual address of the displacement field.
    pub field_address: u32,
    /// Offset of the field in the output buffer.
    pub offset: usize,
    pub width: FieldWidth,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    labels: BTreeMap<String, u32>,
    pending: Vec<Relocation>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: &str, address: u32, line: usize, column: usize) -> AsmResult<()> {
        if self.labels.contains_key(name) {
            return Err(AsmError::new(
                line,
                column,
                AsmErrorKind::DuplicateLabel(name.to_string()),
            ));
        }
        debug!(label = name, address, "define label");
        self.labels.insert(name.to_string(), address);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.labels.get(name).copied()
    }

    pub fn pending(&self) -> &[Relocation] {
        &self.pending
    }

    /// Displacement for a reference to `reloc.label`. Labels already bound
    /// resolve now; anything else is queued and encodes as 0 until `resolve`.
    pub fn reference(&mut self, reloc: Relocation) -> AsmResult<i32> {
        match self.lookup(&reloc.label) {
            Some(target) => displacement(target, reloc.field_address, reloc.width)
                .map_err(|kind| AsmError::new(reloc.line, reloc.column, kind)),
            None => {
                trace!(label = %reloc.label, field = reloc.field_address, "defer relocation");
                self.pending.push(reloc);
                Ok(0)
            }
        }
    }

    /// Patch every queued reference into `code`.
    pub fn resolve(&mut self, code: &mut [u8]) -> AsmResult<()> {
        debug!(count = self.pending.len(), "patching relocations");
        for reloc in self.pending.drain(..) {
            let err = |kind| AsmError::new(reloc.line, reloc.column, kind);
            let target = self
                .labels
                .get(&reloc.label)
                .copied()
                .ok_or_else(|| err(AsmErrorKind::UndefinedLabel(reloc.label.clone())))?;
            let disp = displacement(target, reloc.field_address, reloc.width).map_err(err)?;
            let patched = match reloc.width {
                FieldWidth::W16 => patch_i16(code, reloc.offset, disp as i16),
                FieldWidth::W32 => patch_i32(code, reloc.offset, disp),
            };
            debug_assert!(patched, "relocation outside emitted code");
        }
        Ok(())
    }

    pub fn into_labels(self) -> BTreeMap<String, u32> {
        self.labels
    }
}
