//! Owned surface syntax and its lowering to a [`SyntaxTree`].
//!
//! This is the construction API used by parsers and tests: build nested
//! [`Syn`] values with the helper functions, then call
//! [`ModuleSyn::lower`] to get the flat postorder tree.
//!
//! ```text
//! let tree = module("M", stmts![
//!     record("R", stmts![]),
//!     proc("test").body(stmts![var("x").ty(ident("R"))]),
//! ])
//! .lower(&interner)?;
//! ```

use crate::{
    Actual, FnFlags, FormalDecl, FunctionDecl, Intent, Literal, Name, NodeId, NodeKind, Op,
    RecordDecl, RecordKind, ReturnIntent, Span, StringInterner, SyntaxTree, TreeError,
    VarKind, VariableDecl,
};
use smallvec::SmallVec;

/// Collect heterogeneous builder values into a `Vec<Syn>`.
#[macro_export]
macro_rules! stmts {
    ($($item:expr),* $(,)?) => {
        ::std::vec![$($crate::build::Syn::from($item)),*]
    };
}

/// Owned syntax node prior to lowering.
#[derive(Clone, Debug)]
pub enum Syn {
    Use(String),
    Record(RecordSyn),
    Function(Box<FnSyn>),
    Formal(FormalSyn),
    Var(VarSyn),
    Block(Vec<Syn>),
    Return(Option<Box<Syn>>),
    If {
        cond: Box<Syn>,
        then_stmts: Vec<Syn>,
        else_stmts: Option<Vec<Syn>>,
    },
    Ident(String),
    Dot(Box<Syn>, String),
    Call(Box<Syn>, Vec<Syn>),
    /// Named actual; only meaningful inside an argument list.
    Named(String, Box<Syn>),
    Op(Op, Vec<Syn>),
    New(Box<Syn>, Vec<Syn>),
    Int(i64),
    Uint(u64),
    Real(f64),
    Bool(bool),
    Str(String),
    CStr(String),
}

#[derive(Clone, Debug)]
pub struct RecordSyn {
    name: String,
    kind: RecordKind,
    parent: Option<Box<Syn>>,
    members: Vec<Syn>,
}

impl RecordSyn {
    /// Parent class.
    #[must_use]
    pub fn parent(mut self, parent: impl Into<Syn>) -> Self {
        self.parent = Some(Box::new(parent.into()));
        self
    }
}

#[derive(Clone, Debug)]
pub struct FnSyn {
    name: String,
    flags: FnFlags,
    receiver: Option<Box<Syn>>,
    formals: Vec<FormalSyn>,
    return_intent: ReturnIntent,
    return_type: Option<Box<Syn>>,
    where_clause: Option<Box<Syn>>,
    body: Option<Vec<Syn>>,
}

impl FnSyn {
    /// Receiver type of a secondary or tertiary method (`proc R.name()`).
    #[must_use]
    pub fn receiver(mut self, ty: impl Into<Syn>) -> Self {
        self.receiver = Some(Box::new(ty.into()));
        self
    }

    #[must_use]
    pub fn formal(mut self, formal: FormalSyn) -> Self {
        self.formals.push(formal);
        self
    }

    /// Shorthand for a default-intent formal with a declared type.
    #[must_use]
    pub fn arg(self, name: &str, ty: impl Into<Syn>) -> Self {
        self.formal(formal(name).ty(ty))
    }

    #[must_use]
    pub fn returns(mut self, ty: impl Into<Syn>) -> Self {
        self.return_type = Some(Box::new(ty.into()));
        self
    }

    #[must_use]
    pub fn ret_intent(mut self, intent: ReturnIntent) -> Self {
        self.return_intent = intent;
        self
    }

    #[must_use]
    pub fn where_(mut self, clause: impl Into<Syn>) -> Self {
        self.where_clause = Some(Box::new(clause.into()));
        self
    }

    #[must_use]
    pub fn body(mut self, stmts: Vec<Syn>) -> Self {
        self.body = Some(stmts);
        self.flags.remove(FnFlags::EXTERN);
        self
    }

    #[must_use]
    pub fn parenless(mut self) -> Self {
        self.flags |= FnFlags::PARENLESS;
        self
    }

    #[must_use]
    pub fn type_method(mut self) -> Self {
        self.flags |= FnFlags::TYPE_METHOD;
        self
    }
}

#[derive(Clone, Debug)]
pub struct FormalSyn {
    name: String,
    intent: Intent,
    ty: Option<Box<Syn>>,
    default: Option<Box<Syn>>,
}

impl FormalSyn {
    #[must_use]
    pub fn ty(mut self, ty: impl Into<Syn>) -> Self {
        self.ty = Some(Box::new(ty.into()));
        self
    }

    #[must_use]
    pub fn intent(mut self, intent: Intent) -> Self {
        self.intent = intent;
        self
    }

    #[must_use]
    pub fn default(mut self, value: impl Into<Syn>) -> Self {
        self.default = Some(Box::new(value.into()));
        self
    }
}

#[derive(Clone, Debug)]
pub struct VarSyn {
    name: String,
    kind: VarKind,
    ty: Option<Box<Syn>>,
    init: Option<Box<Syn>>,
}

impl VarSyn {
    #[must_use]
    pub fn ty(mut self, ty: impl Into<Syn>) -> Self {
        self.ty = Some(Box::new(ty.into()));
        self
    }

    #[must_use]
    pub fn init(mut self, value: impl Into<Syn>) -> Self {
        self.init = Some(Box::new(value.into()));
        self
    }
}

impl From<RecordSyn> for Syn {
    fn from(value: RecordSyn) -> Self {
        Syn::Record(value)
    }
}

impl From<FnSyn> for Syn {
    fn from(value: FnSyn) -> Self {
        Syn::Function(Box::new(value))
    }
}

impl From<FormalSyn> for Syn {
    fn from(value: FormalSyn) -> Self {
        Syn::Formal(value)
    }
}

impl From<VarSyn> for Syn {
    fn from(value: VarSyn) -> Self {
        Syn::Var(value)
    }
}

/// A whole module, ready to lower.
#[derive(Clone, Debug)]
pub struct ModuleSyn {
    name: String,
    stmts: Vec<Syn>,
}

impl ModuleSyn {
    /// Lower to a postorder tree, interning all names in `interner`.
    pub fn lower(&self, interner: &StringInterner) -> Result<SyntaxTree, TreeError> {
        let module = interner.intern(&self.name);
        let mut lowerer = Lowerer {
            interner,
            module,
            out: Vec::new(),
        };
        let stmts = self.stmts.iter().map(|s| lowerer.lower(s)).collect();
        lowerer.push(NodeKind::Module {
            name: module,
            stmts,
        });
        SyntaxTree::from_postorder(module, lowerer.out)
    }
}

struct Lowerer<'a> {
    interner: &'a StringInterner,
    module: Name,
    out: Vec<(NodeKind, Span)>,
}

impl Lowerer<'_> {
    fn push(&mut self, kind: NodeKind) -> NodeId {
        let index = u32::try_from(self.out.len()).unwrap_or(u32::MAX);
        self.out.push((kind, Span::new(index, index.saturating_add(1))));
        NodeId::new(self.module, index)
    }

    fn name(&self, text: &str) -> Name {
        self.interner.intern(text)
    }

    fn opt(&mut self, syn: Option<&Syn>) -> Option<NodeId> {
        syn.map(|s| self.lower(s))
    }

    fn actuals(&mut self, args: &[Syn]) -> Vec<Actual> {
        args.iter()
            .map(|arg| match arg {
                Syn::Named(name, value) => {
                    let name = self.name(name);
                    Actual {
                        name: Some(name),
                        value: self.lower(value),
                    }
                }
                other => Actual {
                    name: None,
                    value: self.lower(other),
                },
            })
            .collect()
    }

    fn lower_stmts(&mut self, stmts: &[Syn]) -> NodeId {
        let stmts = stmts.iter().map(|s| self.lower(s)).collect();
        self.push(NodeKind::Block { stmts })
    }

    fn lower_formal(&mut self, formal: &FormalSyn) -> NodeId {
        let type_expr = self.opt(formal.ty.as_deref());
        let default = self.opt(formal.default.as_deref());
        let name = self.name(&formal.name);
        self.push(NodeKind::Formal(FormalDecl {
            name,
            intent: formal.intent,
            type_expr,
            default,
        }))
    }

    fn lower(&mut self, syn: &Syn) -> NodeId {
        match syn {
            Syn::Use(module) => {
                let module = self.name(module);
                self.push(NodeKind::Use { module })
            }
            Syn::Record(rec) => {
                let parent = self.opt(rec.parent.as_deref());
                let members = rec.members.iter().map(|m| self.lower(m)).collect();
                let name = self.name(&rec.name);
                self.push(NodeKind::Record(Box::new(RecordDecl {
                    name,
                    kind: rec.kind,
                    parent,
                    members,
                })))
            }
            Syn::Function(func) => {
                let receiver = self.opt(func.receiver.as_deref());
                let formals = func.formals.iter().map(|f| self.lower_formal(f)).collect();
                let return_type = self.opt(func.return_type.as_deref());
                let where_clause = self.opt(func.where_clause.as_deref());
                let body = func.body.as_deref().map(|b| self.lower_stmts(b));
                let name = self.name(&func.name);
                self.push(NodeKind::Function(Box::new(FunctionDecl {
                    name,
                    flags: func.flags,
                    receiver,
                    formals,
                    return_intent: func.return_intent,
                    return_type,
                    where_clause,
                    body,
                })))
            }
            Syn::Formal(formal) => self.lower_formal(formal),
            Syn::Var(var) => {
                let type_expr = self.opt(var.ty.as_deref());
                let init = self.opt(var.init.as_deref());
                let name = self.name(&var.name);
                self.push(NodeKind::Variable(VariableDecl {
                    name,
                    kind: var.kind,
                    type_expr,
                    init,
                }))
            }
            Syn::Block(stmts) => self.lower_stmts(stmts),
            Syn::Return(value) => {
                let value = self.opt(value.as_deref());
                self.push(NodeKind::Return { value })
            }
            Syn::If {
                cond,
                then_stmts,
                else_stmts,
            } => {
                let cond = self.lower(cond);
                let then_block = self.lower_stmts(then_stmts);
                let else_block = else_stmts.as_deref().map(|s| self.lower_stmts(s));
                self.push(NodeKind::Conditional {
                    cond,
                    then_block,
                    else_block,
                })
            }
            Syn::Ident(name) => {
                let name = self.name(name);
                self.push(NodeKind::Identifier { name })
            }
            Syn::Dot(receiver, field) => {
                let receiver = self.lower(receiver);
                let field = self.name(field);
                self.push(NodeKind::Dot { receiver, field })
            }
            Syn::Call(callee, args) => {
                let callee = self.lower(callee);
                let actuals = self.actuals(args);
                self.push(NodeKind::Call { callee, actuals })
            }
            Syn::Named(_, value) => self.lower(value),
            Syn::Op(op, operands) => {
                let operands: SmallVec<[NodeId; 2]> =
                    operands.iter().map(|o| self.lower(o)).collect();
                self.push(NodeKind::OpCall { op: *op, operands })
            }
            Syn::New(ty, args) => {
                let type_expr = self.lower(ty);
                let actuals = self.actuals(args);
                self.push(NodeKind::New { type_expr, actuals })
            }
            Syn::Int(v) => self.push(NodeKind::Literal(Literal::Int(*v))),
            Syn::Uint(v) => self.push(NodeKind::Literal(Literal::Uint(*v))),
            Syn::Real(v) => self.push(NodeKind::Literal(Literal::Real(v.to_bits()))),
            Syn::Bool(v) => self.push(NodeKind::Literal(Literal::Bool(*v))),
            Syn::Str(s) => {
                let s = self.name(s);
                self.push(NodeKind::Literal(Literal::Str(s)))
            }
            Syn::CStr(s) => {
                let s = self.name(s);
                self.push(NodeKind::Literal(Literal::CStr(s)))
            }
        }
    }
}

pub fn module(name: &str, stmts: Vec<Syn>) -> ModuleSyn {
    ModuleSyn {
        name: name.to_owned(),
        stmts,
    }
}

pub fn use_(module: &str) -> Syn {
    Syn::Use(module.to_owned())
}

pub fn record(name: &str, members: Vec<Syn>) -> RecordSyn {
    RecordSyn {
        name: name.to_owned(),
        kind: RecordKind::Record,
        parent: None,
        members,
    }
}

pub fn class(name: &str, members: Vec<Syn>) -> RecordSyn {
    RecordSyn {
        kind: RecordKind::Class,
        ..record(name, members)
    }
}

/// Function declaration; without [`FnSyn::body`] it is extern.
pub fn proc(name: &str) -> FnSyn {
    FnSyn {
        name: name.to_owned(),
        flags: FnFlags::EXTERN,
        receiver: None,
        formals: Vec::new(),
        return_intent: ReturnIntent::Value,
        return_type: None,
        where_clause: None,
        body: None,
    }
}

/// `operator <symbol>(...)`.
pub fn operator(op: Op) -> FnSyn {
    let mut func = proc(op.symbol());
    func.flags |= FnFlags::OPERATOR;
    func
}

pub fn formal(name: &str) -> FormalSyn {
    FormalSyn {
        name: name.to_owned(),
        intent: Intent::Default,
        ty: None,
        default: None,
    }
}

fn decl(name: &str, kind: VarKind) -> VarSyn {
    VarSyn {
        name: name.to_owned(),
        kind,
        ty: None,
        init: None,
    }
}

pub fn var(name: &str) -> VarSyn {
    decl(name, VarKind::Var)
}

pub fn const_(name: &str) -> VarSyn {
    decl(name, VarKind::Const)
}

pub fn ref_(name: &str) -> VarSyn {
    decl(name, VarKind::Ref)
}

/// `param` variable or `param` field.
pub fn param(name: &str) -> VarSyn {
    decl(name, VarKind::Param)
}

/// `type` alias or `type` field.
pub fn type_(name: &str) -> VarSyn {
    decl(name, VarKind::Type)
}

pub fn ident(name: &str) -> Syn {
    Syn::Ident(name.to_owned())
}

pub fn dot(receiver: impl Into<Syn>, field: &str) -> Syn {
    Syn::Dot(Box::new(receiver.into()), field.to_owned())
}

pub fn call(callee: impl Into<Syn>, args: Vec<Syn>) -> Syn {
    Syn::Call(Box::new(callee.into()), args)
}

/// `receiver.name(args)`.
pub fn method(receiver: impl Into<Syn>, name: &str, args: Vec<Syn>) -> Syn {
    call(dot(receiver, name), args)
}

pub fn named(name: &str, value: impl Into<Syn>) -> Syn {
    Syn::Named(name.to_owned(), Box::new(value.into()))
}

pub fn new_(ty: impl Into<Syn>, args: Vec<Syn>) -> Syn {
    Syn::New(Box::new(ty.into()), args)
}

pub fn op(op: Op, operands: Vec<Syn>) -> Syn {
    Syn::Op(op, operands)
}

pub fn assign(lhs: impl Into<Syn>, rhs: impl Into<Syn>) -> Syn {
    op(Op::Assign, vec![lhs.into(), rhs.into()])
}

pub fn eq(lhs: impl Into<Syn>, rhs: impl Into<Syn>) -> Syn {
    op(Op::Eq, vec![lhs.into(), rhs.into()])
}

pub fn not(operand: impl Into<Syn>) -> Syn {
    op(Op::Not, vec![operand.into()])
}

pub fn ret(value: impl Into<Syn>) -> Syn {
    Syn::Return(Some(Box::new(value.into())))
}

pub fn ret_void() -> Syn {
    Syn::Return(None)
}

pub fn block(stmts: Vec<Syn>) -> Syn {
    Syn::Block(stmts)
}

pub fn if_(cond: impl Into<Syn>, then_stmts: Vec<Syn>) -> Syn {
    Syn::If {
        cond: Box::new(cond.into()),
        then_stmts,
        else_stmts: None,
    }
}

pub fn if_else(cond: impl Into<Syn>, then_stmts: Vec<Syn>, else_stmts: Vec<Syn>) -> Syn {
    Syn::If {
        cond: Box::new(cond.into()),
        then_stmts,
        else_stmts: Some(else_stmts),
    }
}

pub fn int(value: i64) -> Syn {
    Syn::Int(value)
}

pub fn uint(value: u64) -> Syn {
    Syn::Uint(value)
}

pub fn real(value: f64) -> Syn {
    Syn::Real(value)
}

pub fn boolean(value: bool) -> Syn {
    Syn::Bool(value)
}

pub fn string(value: &str) -> Syn {
    Syn::Str(value.to_owned())
}

pub fn cstring(value: &str) -> Syn {
    Syn::CStr(value.to_owned())
}

#[cfg(test)]
mod tests;
