//! k6 script compilation for loadrig
//!
//! [`ScriptCompiler::compile`] turns a [`loadrig_core::TestProfile`] into a
//! [`CompiledScript`]. Compilation is pure: no I/O, no clock, no randomness.
//! Any dynamic tokens a profile references (timestamps, signatures) must be
//! computed by the caller and handed over in a [`CompileContext`].

pub mod compiler;
pub mod error;
pub mod template;

pub use compiler::{CompileContext, CompiledScript, ScriptCompiler};
pub use error::{CompileError, CompileResult};
pub use template::{MarkerTemplate, TemplateTarget};
