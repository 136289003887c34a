/// バイトコード制御構造の復元
///
/// オフセット付きの平坦な命令列から入れ子の if / else / while / foreach /
/// switch を再構成し、括弧付きのソースとして出力する。

pub mod body;
pub mod builder;
pub mod control_flow;
pub mod printer;
pub mod statement;
pub mod statement_list;
pub mod token;

pub use body::{BodyDecompiler, DecompiledBody, ListingEntry};
pub use builder::StatementListBuilder;
pub use printer::{print_statements, SourceSpan, StatementPrinter};
pub use statement::{
    CompositeKind, CompositeStatement, LoopControl, Scope, ScopeKind, Statement, StatementKind,
};
pub use statement_list::StatementList;
pub use token::{DecodeError, LabelTable, Offset, Token};
