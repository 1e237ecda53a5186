//! Monty: an embedded, sandboxed interpreter for a deterministic Python
//! subset.
//!
//! A host process hands [`Monty`] a source string, named input values and
//! optional capabilities; Monty parses, resolves scopes, evaluates, and
//! returns the value of the final expression as an [`Object`]. There is no
//! ambient filesystem, clock, network or environment access — everything
//! outside pure computation goes through an explicit [`OsAccess`] callback,
//! and a fixed per-run hash seed makes evaluation fully deterministic.
//!
//! ```
//! use monty::{Monty, Object};
//!
//! let m = Monty::new("sum(x) + 1".to_owned(), "<monty>", vec!["x".to_owned()]).unwrap();
//! let result = m
//!     .run_no_limits(vec![Object::List(vec![Object::Int(1), Object::Int(2)])])
//!     .unwrap();
//! assert_eq!(result, Object::Int(4));
//! ```

mod args;
mod builtins;
pub mod capability;
mod exception;
mod exception_public;
mod expressions;
mod fstring;
mod function;
mod heap;
mod intern;
mod interp;
mod io;
mod methods;
mod modules;
mod object;
mod ops;
mod parse;
mod prepare;
mod py_hash;
mod repr;
mod resource;
mod run;
mod types;
mod value;

pub use crate::{
    capability::OsAccess,
    exception::ExcType,
    exception_public::{Exception, StackFrame},
    io::{CollectStringPrint, NoPrint, PrintWriter, StdPrint},
    object::Object,
    resource::{
        CancelToken, DEFAULT_MAX_RECURSION_DEPTH, LimitedTracker, NoLimitTracker, ResourceError, ResourceTracker,
    },
    run::{Monty, RunOptions},
    types::{Type, datetime::LocalClock},
};
