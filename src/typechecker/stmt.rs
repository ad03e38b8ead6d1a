//! Function bodies and statements

use std::rc::Rc;

use crate::ast::{
    AssignKind, BinaryOp, Block, BranchKind, CaseClause, CommClause, Expr, ExprKind, Ident, Stmt, StmtKind, UnaryOp,
};
use crate::constant::ConstValue;
use crate::env::{ObjId, ObjKind, Object, ScopeId};
use crate::types::{BasicKind, Signature, Type};

use super::call::builtin_is_statement;
use super::operand::{Mode, Operand};
use super::{Checker, Context};

/// What the enclosing statements allow at this point
#[derive(Debug, Clone, Copy, Default)]
struct StmtFlags {
    break_ok: bool,
    continue_ok: bool,
    fallthrough_ok: bool,
    /// Inside the last clause of an expression switch
    final_case: bool,
}

impl StmtFlags {
    fn inner(self) -> Self {
        StmtFlags {
            fallthrough_ok: false,
            final_case: false,
            ..self
        }
    }
}

impl<'a> Checker<'a> {
    /// Checks a function body against its signature. `decl` is the
    /// package-level object that dependencies found in the body attach to.
    pub(crate) fn func_body(&mut self, decl: Option<ObjId>, sig: Rc<Signature>, scope: ScopeId, body: &Block) {
        let saved = std::mem::replace(
            &mut self.ctx,
            Context {
                scope,
                decl,
                iota: None,
                sig: Some(sig.clone()),
            },
        );
        let start = self.locals.len();
        self.record_scope(body.id, scope);

        self.stmt_list(StmtFlags::default(), &body.stmts);
        if !sig.results.is_empty() && !self.is_terminating_list(&body.stmts) {
            self.error(body.end, "missing return");
        }

        self.usage(start);
        self.ctx = saved;
    }

    /// Checks the statements typed at the prompt in their own function-like
    /// scope. A bare expression is allowed and takes its default type.
    pub(crate) fn repl_body(&mut self, scope: ScopeId, stmts: &[Rc<Stmt>]) {
        let saved = std::mem::replace(
            &mut self.ctx,
            Context {
                scope,
                decl: None,
                iota: None,
                sig: None,
            },
        );
        let start = self.locals.len();

        for s in stmts {
            match &s.kind {
                StmtKind::Expr(e) => {
                    let mut x = self.raw_expr(e, None);
                    match x.mode {
                        Mode::Builtin(_) | Mode::TypeExpr => {
                            let desc = self.describe(&x);
                            self.error(x.pos, format!("{} is not an expression", desc));
                        }
                        Mode::Invalid | Mode::NoValue => {}
                        _ => {
                            if x.typ.tuple_len().is_none() {
                                self.assignment(&mut x, None, "expression at the prompt");
                            }
                        }
                    }
                }
                _ => self.stmt(StmtFlags::default(), s),
            }
        }

        self.usage(start);
        self.ctx = saved;
    }

    /// Reports locals declared since `start` that were never used
    fn usage(&mut self, start: usize) {
        let mut unused: Vec<ObjId> = self.locals[start..]
            .iter()
            .copied()
            .filter(|obj| !self.env.obj(*obj).used)
            .collect();
        unused.sort_by_key(|obj| self.env.obj(*obj).pos);
        for obj in unused {
            let (pos, name) = {
                let o = self.env.obj(obj);
                (o.pos, o.name.clone())
            };
            self.error(pos, format!("{} declared and not used", name));
        }
        self.locals.truncate(start);
    }

    fn stmt_list(&mut self, flags: StmtFlags, list: &[Stmt]) {
        let inner = flags.inner();
        // trailing empty statements do not count as the last statement
        let last = list.iter().rposition(|s| !matches!(s.kind, StmtKind::Empty));
        for (i, s) in list.iter().enumerate() {
            let f = if Some(i) == last { flags } else { inner };
            self.stmt(f, s);
        }
    }

    fn block(&mut self, flags: StmtFlags, block: &Block) {
        self.open_scope(block.id, false);
        self.stmt_list(flags, &block.stmts);
        self.close_scope();
    }

    fn stmt(&mut self, flags: StmtFlags, s: &Stmt) {
        let inner = flags.inner();
        match &s.kind {
            StmtKind::Empty => {}
            StmtKind::Decl(decl) => self.decl_stmt(decl),
            StmtKind::Expr(e) => self.expr_stmt(e),
            StmtKind::Send { chan, value } => {
                let ch = self.expr(chan);
                let mut val = self.expr(value);
                if ch.is_invalid() || val.is_invalid() {
                    return;
                }
                match self.env.underlying(&ch.typ) {
                    Type::Chan(crate::ast::ChanDir::Recv, _) => {
                        let desc = self.describe(&ch);
                        self.error(s.pos, format!("invalid operation: cannot send to receive-only channel {}", desc));
                    }
                    Type::Chan(_, elem) => self.assignment(&mut val, Some(&*elem), "send"),
                    _ => {
                        let desc = self.describe(&ch);
                        self.error(s.pos, format!("invalid operation: cannot send to non-channel {}", desc));
                    }
                }
            }
            StmtKind::IncDec { x, inc } => {
                let mut operand = self.expr(x);
                if operand.is_invalid() {
                    return;
                }
                if !self.env.basic_kind(&operand.typ).map_or(false, |k| k.is_numeric()) {
                    let op = if *inc { "++" } else { "--" };
                    let ts = self.type_str(&operand.typ);
                    self.error(s.pos, format!("invalid operation: {}{} (non-numeric type {})", x, op, ts));
                    return;
                }
                operand.mode = Mode::Value;
                self.assign_var(x, &mut operand);
            }
            StmtKind::Assign { lhs, kind, rhs } => match kind {
                AssignKind::Assign => self.assign_vars(lhs, rhs),
                AssignKind::Define => self.short_var_decl(s.pos, lhs, rhs),
                AssignKind::Op(op) => {
                    if lhs.len() != 1 || rhs.len() != 1 {
                        self.error(s.pos, format!("assignment operation {}= requires single-valued expressions", op));
                        return;
                    }
                    let mut x = self.binary(&lhs[0], *op, &lhs[0], &rhs[0]);
                    self.assign_var(&lhs[0], &mut x);
                }
            },
            StmtKind::Go(call) => self.suspended_call("go", call),
            StmtKind::Defer(call) => self.suspended_call("defer", call),
            StmtKind::Return(results) => self.return_stmt(s, results),
            StmtKind::Branch(kind) => match kind {
                BranchKind::Break if !flags.break_ok => {
                    self.error(s.pos, "break is not in a loop, switch, or select");
                }
                BranchKind::Continue if !flags.continue_ok => {
                    self.error(s.pos, "continue is not in a loop");
                }
                BranchKind::Fallthrough if !flags.fallthrough_ok => {
                    let message = if flags.final_case {
                        "cannot fallthrough final case in switch"
                    } else {
                        "fallthrough statement out of place"
                    };
                    self.error(s.pos, message);
                }
                _ => {}
            },
            StmtKind::Block(block) => self.block(inner, block),
            StmtKind::If { init, cond, then, els } => {
                self.open_scope(s.id, false);
                if let Some(init) = init {
                    self.stmt(inner, init);
                }
                let x = self.expr(cond);
                if !x.is_invalid() && !self.env.basic_kind(&x.typ).map_or(false, |k| k.is_boolean()) {
                    let desc = self.describe(&x);
                    self.error(cond.pos, format!("non-boolean condition in if statement: {}", desc));
                }
                self.block(inner, then);
                if let Some(els) = els {
                    self.stmt(inner, els);
                }
                self.close_scope();
            }
            StmtKind::Switch { init, tag, body, .. } => self.switch_stmt(inner, s, init.as_deref(), tag.as_ref(), body),
            StmtKind::TypeSwitch { init, bind, x, body, .. } => {
                self.type_switch_stmt(inner, s, init.as_deref(), bind.as_ref(), x, body)
            }
            StmtKind::Select { body } => self.select_stmt(inner, body),
            StmtKind::For { init, cond, post, body } => {
                self.open_scope(s.id, false);
                if let Some(init) = init {
                    self.stmt(inner, init);
                }
                if let Some(cond) = cond {
                    let x = self.expr(cond);
                    if !x.is_invalid() && !self.env.basic_kind(&x.typ).map_or(false, |k| k.is_boolean()) {
                        let desc = self.describe(&x);
                        self.error(cond.pos, format!("non-boolean condition in for statement: {}", desc));
                    }
                }
                if let Some(post) = post {
                    if matches!(post.kind, StmtKind::Assign { kind: AssignKind::Define, .. }) {
                        self.error(post.pos, "cannot declare in post statement of for loop");
                    } else {
                        self.stmt(inner, post);
                    }
                }
                let loop_flags = StmtFlags {
                    break_ok: true,
                    continue_ok: true,
                    ..inner
                };
                self.block(loop_flags, body);
                self.close_scope();
            }
            StmtKind::Range { key, value, define, x, body } => {
                self.range_stmt(inner, s, key.as_ref(), value.as_ref(), *define, x, body)
            }
        }
    }

    fn expr_stmt(&mut self, e: &Expr) {
        let x = self.raw_expr(e, None);
        let suffix = match x.mode {
            Mode::Invalid | Mode::NoValue => return,
            Mode::Builtin(_) => "must be called",
            Mode::TypeExpr => "is not an expression",
            _ => {
                if self.is_statement_expr(e) {
                    return;
                }
                "is not used"
            }
        };
        let desc = self.describe(&x);
        self.error(x.pos, format!("{} {}", desc, suffix));
    }

    /// Calls of functions and receives may stand alone; conversions and
    /// value-producing built-ins may not
    fn is_statement_expr(&self, e: &Expr) -> bool {
        match &e.unparen().kind {
            ExprKind::Call { fun, .. } => match self.info.types.get(&fun.id).map(|tv| &tv.mode) {
                Some(Mode::TypeExpr) => false,
                Some(Mode::Builtin(b)) => builtin_is_statement(*b),
                _ => true,
            },
            ExprKind::Unary { op: UnaryOp::Recv, .. } => true,
            _ => false,
        }
    }

    fn suspended_call(&mut self, keyword: &str, call: &Expr) {
        let ExprKind::Call { fun, .. } = &call.unparen().kind else {
            self.raw_expr(call, None);
            self.error(call.pos, format!("expression in {} must be function call", keyword));
            return;
        };
        let x = self.raw_expr(call, None);
        if x.is_invalid() {
            return;
        }
        match self.info.types.get(&fun.id).map(|tv| tv.mode.clone()) {
            Some(Mode::TypeExpr) => {
                self.error(call.pos, format!("{} requires function call, not conversion", keyword));
            }
            Some(Mode::Builtin(b)) if !builtin_is_statement(b) => {
                self.error(call.pos, format!("{} discards result of {}", keyword, call));
            }
            _ => {}
        }
    }

    fn return_stmt(&mut self, s: &Stmt, results: &[Expr]) {
        let Some(sig) = self.ctx.sig.clone() else {
            self.use_exprs(results);
            self.error(s.pos, "return statement outside function body");
            return;
        };
        if results.is_empty() {
            if !sig.results.is_empty() && sig.results[0].name.is_empty() {
                self.error(s.pos, "not enough return values");
            }
            return;
        }
        if sig.results.is_empty() {
            self.use_exprs(results);
            self.error(results[0].pos, "too many return values");
            return;
        }

        let mut operands = if results.len() == 1 && sig.results.len() > 1 {
            self.multi_expr(&results[0])
        } else {
            results.iter().map(|e| self.expr(e)).collect::<Vec<_>>()
        };
        if operands.iter().any(|x| x.is_invalid()) {
            return;
        }
        if operands.len() != sig.results.len() {
            let message = if operands.len() < sig.results.len() {
                "not enough return values"
            } else {
                "too many return values"
            };
            self.error(results[0].pos, message);
            return;
        }
        for (x, result) in operands.iter_mut().zip(&sig.results) {
            self.assignment(x, Some(&result.typ), "return statement");
        }
    }

    fn switch_stmt(
        &mut self,
        flags: StmtFlags,
        s: &Stmt,
        init: Option<&Stmt>,
        tag: Option<&Expr>,
        body: &[CaseClause],
    ) {
        let inner = StmtFlags {
            break_ok: true,
            ..flags
        };
        self.open_scope(s.id, false);
        if let Some(init) = init {
            self.stmt(flags, init);
        }

        let x = match tag {
            Some(tag) => {
                let mut x = self.expr(tag);
                self.assignment(&mut x, None, "switch expression");
                if !x.is_invalid() && !self.comparable(&x.typ) && !self.has_nil(&x.typ) {
                    let desc = self.describe(&x);
                    self.error(x.pos, format!("cannot switch on {}", desc));
                    x.invalidate();
                }
                x
            }
            None => Operand {
                mode: Mode::Constant(ConstValue::Bool(true)),
                typ: Type::bool(),
                id: s.id,
                pos: s.pos,
                text: "true".to_string(),
            },
        };

        let mut seen: Vec<(ConstValue, Type)> = Vec::new();
        let mut has_default = false;
        for (i, clause) in body.iter().enumerate() {
            match &clause.list {
                None => {
                    if has_default {
                        self.error(clause.pos, "multiple defaults in switch");
                    }
                    has_default = true;
                }
                Some(list) => self.case_values(&x, list, &mut seen),
            }
            self.open_scope(clause.id, false);
            let clause_flags = if i + 1 < body.len() {
                StmtFlags {
                    fallthrough_ok: true,
                    ..inner
                }
            } else {
                StmtFlags {
                    final_case: true,
                    ..inner
                }
            };
            self.stmt_list(clause_flags, &clause.body);
            self.close_scope();
        }
        self.close_scope();
    }

    fn case_values(&mut self, tag: &Operand, list: &[Expr], seen: &mut Vec<(ConstValue, Type)>) {
        for e in list {
            let mut v = self.expr(e);
            if tag.is_invalid() || v.is_invalid() {
                continue;
            }
            let target = tag.typ.clone();
            self.convert_untyped(&mut v, &target);
            if v.is_invalid() {
                continue;
            }
            let mut result = v.clone();
            let mut other = tag.clone();
            self.comparison(&mut result, &mut other, BinaryOp::Eq);
            if result.is_invalid() {
                continue;
            }
            if let Some(value) = v.value() {
                if seen.iter().any(|(seen_value, seen_typ)| seen_value == value && *seen_typ == v.typ) {
                    self.error(v.pos, format!("duplicate case {} in expression switch", v.text));
                } else {
                    seen.push((value.clone(), v.typ.clone()));
                }
            }
        }
    }

    fn type_switch_stmt(
        &mut self,
        flags: StmtFlags,
        s: &Stmt,
        init: Option<&Stmt>,
        bind: Option<&Ident>,
        operand: &Expr,
        body: &[CaseClause],
    ) {
        let inner = StmtFlags {
            break_ok: true,
            ..flags
        };
        self.open_scope(s.id, false);
        if let Some(init) = init {
            self.stmt(flags, init);
        }

        let x = self.expr(operand);
        if x.is_invalid() {
            self.close_scope();
            return;
        }
        if !self.env.is_interface(&x.typ) {
            let desc = self.describe(&x);
            self.error(x.pos, format!("{} is not an interface", desc));
            self.close_scope();
            return;
        }

        let bind = match bind {
            Some(ident) if ident.is_blank() => {
                self.error(ident.pos, "no new variable on left side of :=");
                None
            }
            other => other,
        };

        let mut seen: Vec<Option<Type>> = Vec::new();
        let mut has_default = false;
        let mut bound: Vec<ObjId> = Vec::new();
        for clause in body {
            let single = match &clause.list {
                None => {
                    if has_default {
                        self.error(clause.pos, "multiple defaults in switch");
                    }
                    has_default = true;
                    None
                }
                Some(list) => self.case_types(&x, list, &mut seen),
            };

            let scope = self.open_scope(clause.id, false);
            if let Some(ident) = bind {
                let typ = single.unwrap_or_else(|| x.typ.clone());
                let obj = self
                    .env
                    .new_object(Object::new(ident.name.clone(), ObjKind::Var, typ, Some(self.pkg), ident.pos));
                self.env.bind(scope, &ident.name, obj);
                self.record_implicit(clause.id, obj);
                bound.push(obj);
            }
            self.stmt_list(inner, &clause.body);
            self.close_scope();
        }

        if let Some(ident) = bind {
            if !bound.iter().any(|obj| self.env.obj(*obj).used) {
                self.error(ident.pos, format!("{} declared and not used", ident.name));
            }
        }
        self.close_scope();
    }

    /// Checks the types of one type switch case; returns the case type when
    /// the clause lists exactly one non-nil type
    fn case_types(&mut self, x: &Operand, list: &[Expr], seen: &mut Vec<Option<Type>>) -> Option<Type> {
        let mut last: Option<Type> = None;
        for e in list {
            let is_nil = e.unparen().as_ident() == Some("nil")
                && self
                    .env
                    .lookup(self.ctx.scope, "nil")
                    .map_or(false, |(_, obj)| matches!(self.env.obj(obj).kind, ObjKind::Nil));
            let t = if is_nil {
                self.expr(e);
                None
            } else {
                let t = self.typ_expr(e);
                if t.is_invalid() {
                    last = None;
                    continue;
                }
                Some(t)
            };

            if seen.contains(&t) {
                let message = match &t {
                    None => "multiple nil cases in type switch".to_string(),
                    Some(t) => format!("duplicate case {} in type switch", self.type_str(t)),
                };
                self.error(e.pos, message);
            } else {
                seen.push(t.clone());
            }

            if let Some(t) = &t {
                if !self.env.is_interface(t) && self.missing_method(t, &x.typ).is_some() {
                    let reason = self.missing_method_reason(t, &x.typ);
                    let desc = self.describe(x);
                    let ts = self.type_str(t);
                    self.error(
                        e.pos,
                        format!(
                            "impossible type switch case: {} ({}) cannot have dynamic type {} {}",
                            e, desc, ts, reason
                        ),
                    );
                }
            }
            last = t;
        }
        if list.len() == 1 {
            last
        } else {
            None
        }
    }

    fn select_stmt(&mut self, flags: StmtFlags, body: &[CommClause]) {
        let inner = StmtFlags {
            break_ok: true,
            ..flags
        };
        for clause in body {
            if let Some(comm) = &clause.comm {
                let valid = match &comm.kind {
                    StmtKind::Send { .. } => true,
                    StmtKind::Expr(e) => is_recv(e),
                    StmtKind::Assign { lhs, kind, rhs } => {
                        rhs.len() == 1 && is_recv(&rhs[0]) && lhs.len() <= 2 && !matches!(kind, AssignKind::Op(_))
                    }
                    _ => false,
                };
                if !valid {
                    self.error(comm.pos, "select case must be receive, send or assign recv");
                    continue;
                }
            }
            self.open_scope(clause.id, false);
            if let Some(comm) = &clause.comm {
                self.stmt(flags, comm);
            }
            self.stmt_list(inner, &clause.body);
            self.close_scope();
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn range_stmt(
        &mut self,
        flags: StmtFlags,
        s: &Stmt,
        key: Option<&Expr>,
        value: Option<&Expr>,
        define: bool,
        range_x: &Expr,
        body: &Block,
    ) {
        self.open_scope(s.id, false);

        let mut x = self.expr(range_x);
        if x.typ.is_untyped() {
            let target = x.typ.default_type();
            self.convert_untyped(&mut x, &target);
        }
        let (key_typ, value_typ) = if x.is_invalid() {
            (Type::Invalid, Some(Type::Invalid))
        } else {
            match self.env.underlying(&x.typ) {
                Type::Basic(kind) if kind.is_string() => (Type::int(), Some(Type::Basic(BasicKind::Int32))),
                Type::Array(_, elem) | Type::Slice(elem) => (Type::int(), Some((*elem).clone())),
                Type::Pointer(p) => match self.env.underlying(&p) {
                    Type::Array(_, elem) => (Type::int(), Some((*elem).clone())),
                    _ => self.cannot_range(&x),
                },
                Type::Map(k, v) => ((*k).clone(), Some((*v).clone())),
                Type::Chan(dir, elem) => {
                    if dir == crate::ast::ChanDir::Send {
                        let desc = self.describe(&x);
                        self.error(x.pos, format!("invalid operation: range {} receive from send-only channel", desc));
                    }
                    if let Some(value) = value {
                        let desc = self.describe(&x);
                        self.error(value.pos, format!("range over {} permits only one iteration variable", desc));
                    }
                    ((*elem).clone(), None)
                }
                _ => self.cannot_range(&x),
            }
        };

        let targets = [(key, Some(key_typ)), (value, value_typ)];
        if define {
            let mut new_vars: Vec<(String, ObjId)> = Vec::new();
            for (lhs, typ) in targets {
                let Some(lhs) = lhs else {
                    continue;
                };
                let Some(name) = lhs.as_ident() else {
                    self.error(lhs.pos, format!("non-name {} on left side of :=", lhs));
                    continue;
                };
                let typ = typ.unwrap_or(Type::Invalid);
                let obj = self
                    .env
                    .new_object(Object::new(name, ObjKind::Var, typ, Some(self.pkg), lhs.pos));
                self.record_def(lhs.id, obj);
                if name != "_" {
                    new_vars.push((name.to_string(), obj));
                }
            }
            let scope = self.ctx.scope;
            for (name, obj) in new_vars {
                if self.env.lookup_local(scope, &name).is_some() {
                    let pos = self.env.obj(obj).pos;
                    self.error(pos, format!("{} repeated on left side of :=", name));
                    continue;
                }
                self.env.bind(scope, &name, obj);
                self.locals.push(obj);
            }
        } else {
            for (lhs, typ) in targets {
                if let (Some(lhs), Some(typ)) = (lhs, typ) {
                    let mut operand = Operand {
                        mode: Mode::Value,
                        typ,
                        id: range_x.id,
                        pos: lhs.pos,
                        text: range_x.to_string(),
                    };
                    self.assign_var(lhs, &mut operand);
                }
            }
        }

        let loop_flags = StmtFlags {
            break_ok: true,
            continue_ok: true,
            ..flags
        };
        self.block(loop_flags, body);
        self.close_scope();
    }

    fn cannot_range(&mut self, x: &Operand) -> (Type, Option<Type>) {
        let desc = self.describe(x);
        self.error(x.pos, format!("cannot range over {}", desc));
        (Type::Invalid, Some(Type::Invalid))
    }

    // Terminating statements

    fn is_terminating_list(&self, list: &[Stmt]) -> bool {
        list.iter()
            .rev()
            .find(|s| !matches!(s.kind, StmtKind::Empty))
            .map_or(false, |s| self.is_terminating(s))
    }

    fn is_terminating(&self, s: &Stmt) -> bool {
        match &s.kind {
            StmtKind::Return(_) => true,
            StmtKind::Expr(e) => match &e.unparen().kind {
                ExprKind::Call { fun, .. } => matches!(
                    self.info.types.get(&fun.id).map(|tv| &tv.mode),
                    Some(Mode::Builtin(crate::env::Builtin::Panic))
                ),
                _ => false,
            },
            StmtKind::Block(block) => self.is_terminating_list(&block.stmts),
            StmtKind::If { then, els, .. } => match els {
                Some(els) => self.is_terminating_list(&then.stmts) && self.is_terminating(els),
                None => false,
            },
            StmtKind::Switch { body, .. } | StmtKind::TypeSwitch { body, .. } => {
                body.iter().any(|c| c.list.is_none())
                    && body.iter().all(|c| {
                        !has_break_list(&c.body)
                            && (self.is_terminating_list(&c.body) || ends_in_fallthrough(&c.body))
                    })
            }
            StmtKind::Select { body } => body
                .iter()
                .all(|c| !has_break_list(&c.body) && self.is_terminating_list(&c.body)),
            StmtKind::For { cond: None, body, .. } => !has_break_list(&body.stmts),
            _ => false,
        }
    }
}

fn is_recv(e: &Expr) -> bool {
    matches!(e.unparen().kind, ExprKind::Unary { op: UnaryOp::Recv, .. })
}

fn ends_in_fallthrough(list: &[Stmt]) -> bool {
    matches!(
        list.iter().rev().find(|s| !matches!(s.kind, StmtKind::Empty)).map(|s| &s.kind),
        Some(StmtKind::Branch(BranchKind::Fallthrough))
    )
}

/// Whether an unlabeled break in `list` targets the enclosing statement
fn has_break_list(list: &[Stmt]) -> bool {
    list.iter().any(has_break)
}

fn has_break(s: &Stmt) -> bool {
    match &s.kind {
        StmtKind::Branch(BranchKind::Break) => true,
        StmtKind::Block(block) => has_break_list(&block.stmts),
        StmtKind::If { then, els, .. } => {
            has_break_list(&then.stmts) || els.as_deref().map_or(false, has_break)
        }
        _ => false,
    }
}
