//! Abstract Syntax Tree definitions for the Go subset
//!
//! Every node that the checker records information about carries a
//! [`NodeId`]. Declaration specs are shared through `Rc` so the package
//! dependency records can keep them alive across submissions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::lexer::AssignOp;

/// Identifies one AST node for the lifetime of the process
pub type NodeId = u32;

static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(1);

/// Hands out a node id that no other parsed node shares
pub fn fresh_node_id() -> NodeId {
    NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)
}

/// A source position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl Pos {
    pub fn new(line: usize, column: usize) -> Self {
        Pos { line, column }
    }

    /// Whether the position refers to real source text
    pub fn is_valid(&self) -> bool {
        self.line > 0
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}:{}", self.line, self.column)
        } else {
            write!(f, "-")
        }
    }
}

/// A parsed source file or REPL submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    /// `package p` clause; REPL submissions usually omit it
    pub package: Option<Ident>,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
}

/// An identifier that names something (a definition site or a selector)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ident {
    pub id: NodeId,
    pub name: String,
    pub pos: Pos,
}

impl Ident {
    pub fn new(name: impl Into<String>, pos: Pos) -> Self {
        Ident {
            id: fresh_node_id(),
            name: name.into(),
            pos,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.name == "_"
    }
}

/// `import name "path"`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSpec {
    pub id: NodeId,
    pub pos: Pos,
    /// Alias, `.` or `_`
    pub name: Option<Ident>,
    pub path: String,
}

/// Top-level declarations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Decl {
    Var(Vec<Rc<ValueSpec>>),
    Const(Vec<Rc<ValueSpec>>),
    Type(Vec<Rc<TypeSpec>>),
    Func(Rc<FuncDecl>),
    /// A statement typed at the prompt outside any function
    Stmt(Rc<Stmt>),
}

/// One line of a `var` or `const` group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueSpec {
    pub id: NodeId,
    pub pos: Pos,
    pub names: Vec<Ident>,
    pub typ: Option<Expr>,
    pub values: Vec<Expr>,
}

/// `type Name T` or `type Name = T`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeSpec {
    pub id: NodeId,
    pub pos: Pos,
    pub name: Ident,
    pub alias: bool,
    pub typ: Expr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuncDecl {
    pub id: NodeId,
    pub pos: Pos,
    pub recv: Option<Field>,
    pub name: Ident,
    pub typ: FuncType,
    pub body: Option<Block>,
}

/// A parameter, result, struct field or interface method entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    /// Empty for anonymous parameters and embedded fields
    pub names: Vec<Ident>,
    pub typ: Expr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuncType {
    pub pos: Pos,
    pub params: Vec<Field>,
    pub results: Vec<Field>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Plus,
    Neg,
    Not,
    Xor,
    Addr,
    Recv,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnaryOp::Plus => "+",
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::Xor => "^",
            UnaryOp::Addr => "&",
            UnaryOp::Recv => "<-",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    AndNot,
    LogAnd,
    LogOr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::LogOr => 1,
            BinaryOp::LogAnd => 2,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 3,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Or | BinaryOp::Xor => 4,
            _ => 5,
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_shift(&self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr)
    }

    pub fn from_assign(op: AssignOp) -> BinaryOp {
        match op {
            AssignOp::Add => BinaryOp::Add,
            AssignOp::Sub => BinaryOp::Sub,
            AssignOp::Mul => BinaryOp::Mul,
            AssignOp::Div => BinaryOp::Div,
            AssignOp::Rem => BinaryOp::Rem,
            AssignOp::And => BinaryOp::And,
            AssignOp::Or => BinaryOp::Or,
            AssignOp::Xor => BinaryOp::Xor,
            AssignOp::Shl => BinaryOp::Shl,
            AssignOp::Shr => BinaryOp::Shr,
            AssignOp::AndNot => BinaryOp::AndNot,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::AndNot => "&^",
            BinaryOp::LogAnd => "&&",
            BinaryOp::LogOr => "||",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        };
        write!(f, "{}", s)
    }
}

/// Literal values as written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i128),
    Float(f64),
    Char(char),
    String(String),
}

/// An expression; type expressions share this representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expr {
    pub id: NodeId,
    pub pos: Pos,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprKind {
    Ident(String),
    BasicLit(Literal),
    CompositeLit {
        typ: Option<Box<Expr>>,
        elts: Vec<Expr>,
    },
    FuncLit {
        typ: FuncType,
        body: Rc<Block>,
    },
    Paren(Box<Expr>),
    Selector {
        x: Box<Expr>,
        sel: Ident,
    },
    Index {
        x: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        x: Box<Expr>,
        low: Option<Box<Expr>>,
        high: Option<Box<Expr>>,
        max: Option<Box<Expr>>,
    },
    /// `x.(T)`; `typ` is None for `x.(type)`
    TypeAssert {
        x: Box<Expr>,
        typ: Option<Box<Expr>>,
    },
    Call {
        fun: Box<Expr>,
        args: Vec<Expr>,
        ellipsis: bool,
    },
    /// `*x`: dereference or pointer type
    Star(Box<Expr>),
    Unary {
        op: UnaryOp,
        x: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        x: Box<Expr>,
        y: Box<Expr>,
    },
    KeyValue {
        key: Box<Expr>,
        value: Box<Expr>,
    },
    /// `...T` in a parameter list, or the `...` length of `[...]T`
    Ellipsis(Option<Box<Expr>>),

    // Type expressions
    /// `[N]T`, `[...]T` (len is Ellipsis) or `[]T` (len is None)
    ArrayType {
        len: Option<Box<Expr>>,
        elem: Box<Expr>,
    },
    StructType(Vec<Field>),
    FuncType(FuncType),
    InterfaceType(Vec<Field>),
    MapType {
        key: Box<Expr>,
        value: Box<Expr>,
    },
    ChanType {
        dir: ChanDir,
        value: Box<Expr>,
    },
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Pos) -> Self {
        Expr {
            id: fresh_node_id(),
            pos,
            kind,
        }
    }

    /// The expression with any enclosing parentheses removed
    pub fn unparen(&self) -> &Expr {
        match &self.kind {
            ExprKind::Paren(inner) => inner.unparen(),
            _ => self,
        }
    }

    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Ident(name) => write!(f, "{}", name),
            ExprKind::BasicLit(lit) => match lit {
                Literal::Int(i) => write!(f, "{}", i),
                Literal::Float(x) => write!(f, "{}", x),
                Literal::Char(c) => write!(f, "{:?}", c),
                Literal::String(s) => write!(f, "{:?}", s),
            },
            ExprKind::CompositeLit { typ, .. } => match typ {
                Some(t) => write!(f, "{}{{…}}", t),
                None => write!(f, "{{…}}"),
            },
            ExprKind::FuncLit { .. } => write!(f, "func literal"),
            ExprKind::Paren(x) => write!(f, "({})", x),
            ExprKind::Selector { x, sel } => write!(f, "{}.{}", x, sel.name),
            ExprKind::Index { x, index } => write!(f, "{}[{}]", x, index),
            ExprKind::Slice { x, low, high, max } => {
                write!(f, "{}[", x)?;
                if let Some(low) = low {
                    write!(f, "{}", low)?;
                }
                write!(f, ":")?;
                if let Some(high) = high {
                    write!(f, "{}", high)?;
                }
                if let Some(max) = max {
                    write!(f, ":{}", max)?;
                }
                write!(f, "]")
            }
            ExprKind::TypeAssert { x, typ } => match typ {
                Some(t) => write!(f, "{}.({})", x, t),
                None => write!(f, "{}.(type)", x),
            },
            ExprKind::Call { fun, args, ellipsis } => {
                write!(f, "{}(", fun)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                if *ellipsis {
                    write!(f, "...")?;
                }
                write!(f, ")")
            }
            ExprKind::Star(x) => write!(f, "*{}", x),
            ExprKind::Unary { op, x } => write!(f, "{}{}", op, x),
            ExprKind::Binary { op, x, y } => write!(f, "{} {} {}", x, op, y),
            ExprKind::KeyValue { key, value } => write!(f, "{}: {}", key, value),
            ExprKind::Ellipsis(elem) => match elem {
                Some(t) => write!(f, "...{}", t),
                None => write!(f, "..."),
            },
            ExprKind::ArrayType { len, elem } => match len {
                Some(len) => write!(f, "[{}]{}", len, elem),
                None => write!(f, "[]{}", elem),
            },
            ExprKind::StructType(fields) => {
                if fields.is_empty() {
                    write!(f, "struct{{}}")
                } else {
                    write!(f, "struct{{…}}")
                }
            }
            ExprKind::FuncType(_) => write!(f, "func(…)"),
            ExprKind::InterfaceType(methods) => {
                if methods.is_empty() {
                    write!(f, "interface{{}}")
                } else {
                    write!(f, "interface{{…}}")
                }
            }
            ExprKind::MapType { key, value } => write!(f, "map[{}]{}", key, value),
            ExprKind::ChanType { dir, value } => match dir {
                ChanDir::Both => write!(f, "chan {}", value),
                ChanDir::Send => write!(f, "chan<- {}", value),
                ChanDir::Recv => write!(f, "<-chan {}", value),
            },
        }
    }
}

/// A braced statement list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: NodeId,
    pub pos: Pos,
    pub stmts: Vec<Stmt>,
    pub end: Pos,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stmt {
    pub id: NodeId,
    pub pos: Pos,
    pub kind: StmtKind,
}

impl Stmt {
    pub fn new(kind: StmtKind, pos: Pos) -> Self {
        Stmt {
            id: fresh_node_id(),
            pos,
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignKind {
    Assign,
    Define,
    Op(BinaryOp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchKind {
    Break,
    Continue,
    Fallthrough,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StmtKind {
    /// Local `var`, `const` or `type` declaration
    Decl(Decl),
    Empty,
    Expr(Expr),
    Send {
        chan: Expr,
        value: Expr,
    },
    IncDec {
        x: Expr,
        inc: bool,
    },
    Assign {
        lhs: Vec<Expr>,
        kind: AssignKind,
        rhs: Vec<Expr>,
    },
    Go(Expr),
    Defer(Expr),
    Return(Vec<Expr>),
    Branch(BranchKind),
    Block(Block),
    If {
        init: Option<Box<Stmt>>,
        cond: Expr,
        then: Block,
        els: Option<Box<Stmt>>,
    },
    Switch {
        init: Option<Box<Stmt>>,
        tag: Option<Expr>,
        body: Vec<CaseClause>,
        end: Pos,
    },
    /// `switch v := x.(type)`; `x` is the operand of the assertion
    TypeSwitch {
        init: Option<Box<Stmt>>,
        bind: Option<Ident>,
        x: Expr,
        body: Vec<CaseClause>,
        end: Pos,
    },
    Select {
        body: Vec<CommClause>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Block,
    },
    Range {
        key: Option<Expr>,
        value: Option<Expr>,
        define: bool,
        x: Expr,
        body: Block,
    },
}

/// `case a, b:` or `default:` in a switch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseClause {
    pub id: NodeId,
    pub pos: Pos,
    /// None for `default`
    pub list: Option<Vec<Expr>>,
    pub body: Vec<Stmt>,
}

/// `case <-ch:` or `default:` in a select
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommClause {
    pub id: NodeId,
    pub pos: Pos,
    /// None for `default`
    pub comm: Option<Box<Stmt>>,
    pub body: Vec<Stmt>,
}
