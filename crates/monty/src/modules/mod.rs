//! The module registry.
//!
//! Imports resolve against a closed set of pre-registered modules — currently
//! just `datetime`. `import x` for anything else fails at compile time, so a
//! `ModuleId` reaching the evaluator is always valid.

pub(crate) mod datetime_mod;

/// Identifier of a registered module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub(crate) enum ModuleId {
    Datetime,
}

impl ModuleId {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Datetime => "datetime",
        }
    }

    /// Looks a module up by import name.
    pub(crate) fn by_name(name: &str) -> Option<Self> {
        match name {
            "datetime" => Some(Self::Datetime),
            _ => None,
        }
    }
}
