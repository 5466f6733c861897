//! Flow filter engine.
//!
//! A filter file declares *primitives* (typed permit/deny tables) and
//! *definitions* (OR of AND groups over primitives):
//!
//! ```text
//! definition ── group ──┬── item (match field, primitive)
//!               (OR)    └── item                (AND)
//!            └─ group ──── item
//! ```
//!
//! A record is permitted by the first group whose items all permit it;
//! `invert` flips the outcome.

pub mod parser;
pub mod primitive;
pub mod resolve;
pub mod symbols;
pub mod trie;
pub mod vars;

pub use primitive::{Primitive, PrimitiveKind, Verdict};
pub use resolve::MatchField;
pub use symbols::{DateParser, LocalDates, SymbolResolver, SymbolTable, Symbols};
pub use vars::{VarSubst, Variables};

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::error::{FlowError, Result};
use crate::record::FieldOffsets;

// ── Load context ───────────────────────────────────────────────────

/// Collaborators consulted while parsing a filter file.
pub struct LoadContext<'a> {
    pub symbols: Symbols,
    pub vars: Option<&'a dyn VarSubst>,
    pub dates: &'a dyn DateParser,
}

impl Default for LoadContext<'_> {
    fn default() -> Self {
        Self {
            symbols: Symbols::default(),
            vars: None,
            dates: &LocalDates,
        }
    }
}

// ── Definitions ────────────────────────────────────────────────────

/// Index into [`FilterSet::primitives`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrimitiveId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchItem {
    pub field: MatchField,
    pub primitive: PrimitiveId,
}

/// Identity of a loaded [`FilterSet`]; every [`Definition`] carries the
/// id of the set that resolved it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct SetId(u64);

impl SetId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        SetId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone)]
pub struct Definition {
    pub(crate) set: SetId,
    pub name: String,
    pub groups: Vec<Vec<MatchItem>>,
    pub invert: bool,
    /// Record fields needed by any item.
    pub xfields: u64,
}

impl Definition {
    /// Fails unless every needed field is available in `avail`.
    pub fn check_xfields(&self, avail: u64) -> Result<()> {
        if self.xfields & avail != self.xfields {
            return Err(FlowError::MissingFields {
                need: self.xfields,
                have: avail,
            });
        }
        Ok(())
    }
}

// ── Filter set ─────────────────────────────────────────────────────

/// A loaded filter file. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    pub(crate) id: SetId,
    pub(crate) primitives: Vec<Primitive>,
    pub(crate) definitions: Vec<Definition>,
}

impl FilterSet {
    pub fn load(path: &Path, ctx: &LoadContext<'_>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse_str(&path.display().to_string(), &text, ctx)
    }

    /// Parse filter text; `name` is used in error messages.
    pub fn parse_str(name: &str, text: &str, ctx: &LoadContext<'_>) -> Result<Self> {
        let set = parser::parse(name, text, ctx)?;
        tracing::debug!(
            file = name,
            primitives = set.primitives.len(),
            definitions = set.definitions.len(),
            "loaded filter"
        );
        Ok(set)
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    pub fn definitions(&self) -> &[Definition] {
        &self.definitions
    }

    pub fn primitive(&self, id: PrimitiveId) -> Option<&Primitive> {
        self.primitives.get(id.0)
    }

    /// True when `def` was resolved by this set (or a clone of it).
    pub fn owns(&self, def: &Definition) -> bool {
        def.set == self.id
    }

    /// Case-insensitive lookup.
    pub fn definition(&self, name: &str) -> Option<&Definition> {
        self.definitions
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }

    /// Evaluate `def` against one host-order record.
    ///
    /// A definition resolved by a different set is denied; use
    /// [`evaluate_checked`](Self::evaluate_checked) to get an error instead.
    pub fn evaluate<R: RngCore + ?Sized>(
        &self,
        def: &Definition,
        rec: &[u8],
        fo: &FieldOffsets,
        rng: &mut R,
    ) -> Verdict {
        if !self.owns(def) {
            tracing::warn!(definition = %def.name, "definition from another filter set");
            return Verdict::Deny;
        }
        let matched = def.groups.iter().any(|group| {
            group.iter().all(|item| {
                self.primitive(item.primitive)
                    .map_or(false, |p| p.evaluate(item.field, rec, fo, &mut *rng).is_permit())
            })
        });
        match (matched, def.invert) {
            (true, false) | (false, true) => Verdict::Permit,
            _ => Verdict::Deny,
        }
    }

    /// [`evaluate`](Self::evaluate) after checking `def` belongs to this set
    /// and can be answered from the fields in `avail`.
    pub fn evaluate_checked<R: RngCore + ?Sized>(
        &self,
        def: &Definition,
        rec: &[u8],
        fo: &FieldOffsets,
        avail: u64,
        rng: &mut R,
    ) -> Result<Verdict> {
        if !self.owns(def) {
            return Err(FlowError::ForeignDefinition(def.name.clone()));
        }
        def.check_xfields(avail)?;
        Ok(self.evaluate(def, rec, fo, rng))
    }
}

// ── Evaluator ──────────────────────────────────────────────────────

/// Owns the random source used by `random-sample` matches.
pub struct Evaluator<R = StdRng> {
    rng: R,
}

impl Evaluator<StdRng> {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for Evaluator<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RngCore> Evaluator<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    pub fn evaluate(
        &mut self,
        set: &FilterSet,
        def: &Definition,
        rec: &[u8],
        fo: &FieldOffsets,
    ) -> Verdict {
        set.evaluate(def, rec, fo, &mut self.rng)
    }

    pub fn evaluate_checked(
        &mut self,
        set: &FilterSet,
        def: &Definition,
        rec: &[u8],
        fo: &FieldOffsets,
        avail: u64,
    ) -> Result<Verdict> {
        set.evaluate_checked(def, rec, fo, avail, &mut self.rng)
    }
}
