//! 编译模块：将规则表达式编译为可执行规则，并在规范化策略上求值
pub mod lexer;
pub mod parser;
pub mod types;
pub mod checker;
pub mod value;
mod interpreter;
pub mod program;
pub mod compiler;

pub use self::program::{compile, evaluate, Bindings, CompiledRule};
pub use self::compiler::RuleCompiler;
pub use self::types::Type;
