//! Abstract syntax tree for the SAGE expression DSL.
//!
//! A typed AST with typed evaluators rather than an embedded scripting
//! runtime — new operators are additions to this enum, never a second
//! parser.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// `and` / `&&` — always logical conjunction.
    And,
    /// `or` / `||` — always logical disjunction.
    Or,
    /// Bare `&`. This engine only ever evaluates `&`/`|` over
    /// already-boolean operands (see `DESIGN.md`), so it is defined to
    /// coincide with `And` rather than inventing a separate
    /// bitwise-integer domain.
    BitAnd,
    /// Bare `|`, coincides with `Or` for the same reason as `BitAnd`.
    BitOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// A frame/column reduction function: `all()`, `any()`, `min()`, `max()`,
/// `sum()`, `mean()`, `nunique()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    All,
    Any,
    Min,
    Max,
    Sum,
    Mean,
    NUnique,
}

/// A column-level predicate method: `notnull()`, `notna()`, `isin(list)`,
/// `duplicated(keep=...)`, `str.contains(s)`, `str.match(regex)`.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnPredicate {
    NotNull,
    NotNa,
    /// The argument is itself an expression so that `isin` can take either
    /// a list literal (`isin(['A', 'B'])`) or another column
    /// (`isin(df['clientes']['customer_id'])`).
    IsIn(Box<Expr>),
    /// `keep_first == true` is pandas' default `duplicated()`/`keep='first'`
    /// (first occurrence not flagged); `keep_first == false` is
    /// `duplicated(keep=False)` (every occurrence, including the first,
    /// is flagged).
    Duplicated { keep_first: bool },
    StrContains(Box<Expr>),
    StrMatch(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    /// Bare identifier: a column reference in the current scope's table.
    Column(String),
    /// `df['logical_name']['column']` — package-scope multi-table access.
    TableColumn { table: String, column: String },
    /// `shape[0]` — row count of the current scope's table.
    ShapeRow,
    /// A list literal, used by `isin([...])`.
    List(Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// A column predicate applied to a column-valued receiver.
    Predicate { receiver: Box<Expr>, predicate: ColumnPredicate },
    /// A reduction applied to a column (`col.min()`) or to a boolean
    /// vector expression (`(expr).all()`).
    Reduce { receiver: Box<Expr>, reduction: Reduction },
}
