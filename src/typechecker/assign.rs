//! Assignments, variable initialization and `:=`

use std::collections::HashSet;

use crate::ast::{Expr, ExprKind, Pos};
use crate::env::{ObjId, ObjKind, Object};
use crate::types::Type;

use super::operand::{Mode, Operand};
use super::Checker;

impl<'a> Checker<'a> {
    /// Initializes `lhs` with `x`; a variable without a declared type takes
    /// the (default) type of `x`
    pub(crate) fn init_var(&mut self, lhs: ObjId, x: &mut Operand, context: &str) {
        if x.is_invalid() {
            return;
        }
        if self.env.obj(lhs).typ.is_invalid() {
            let mut typ = x.typ.clone();
            if typ.is_untyped() {
                if typ.is_untyped_nil() {
                    self.error(x.pos, format!("use of untyped nil in {}", context));
                    x.invalidate();
                    return;
                }
                typ = typ.default_type();
            }
            self.env.obj_mut(lhs).typ = typ;
        }
        let typ = self.env.obj(lhs).typ.clone();
        self.assignment(x, Some(&typ), context);
    }

    /// Initializes several variables from as many expressions, or from one
    /// multi-valued expression
    pub(crate) fn init_vars(&mut self, lhs: &[ObjId], rhs: &[Expr], context: &str) {
        if lhs.len() == rhs.len() && !single_call(rhs) {
            for (obj, e) in lhs.iter().zip(rhs) {
                let mut x = self.expr(e);
                self.init_var(*obj, &mut x, context);
            }
            return;
        }
        if rhs.len() == 1 {
            let mut operands = self.multi_expr_comma_ok(&rhs[0], lhs.len() == 2);
            if operands.iter().any(|x| x.is_invalid()) {
                return;
            }
            if operands.len() == lhs.len() {
                for (obj, x) in lhs.iter().zip(operands.iter_mut()) {
                    self.init_var(*obj, x, context);
                }
                return;
            }
            self.assign_mismatch(rhs[0].pos, lhs.len(), &rhs[0], operands.len());
            return;
        }
        self.use_exprs(rhs);
        let pos = rhs.first().map_or(Pos::default(), |e| e.pos);
        self.error(
            pos,
            format!("assignment mismatch: {} variables but {} values", lhs.len(), rhs.len()),
        );
    }

    fn assign_mismatch(&mut self, pos: Pos, vars: usize, rhs: &Expr, values: usize) {
        let vars = measure(vars, "variable");
        let message = match &rhs.unparen().kind {
            ExprKind::Call { fun, .. } => {
                format!("assignment mismatch: {} but {} returns {}", vars, fun, measure(values, "value"))
            }
            _ => format!("assignment mismatch: {} but {}", vars, measure(values, "value")),
        };
        self.error(pos, message);
    }

    /// Checks `lhs = x`; returns the type of the assigned location
    pub(crate) fn assign_var(&mut self, lhs: &Expr, x: &mut Operand) -> Type {
        if x.is_invalid() {
            self.raw_expr(lhs, None);
            return Type::Invalid;
        }

        if lhs.unparen().as_ident() == Some("_") {
            self.assignment(x, None, "assignment to _ identifier");
            return x.typ.clone();
        }

        // assigning to a variable does not count as a use of it
        let target = lhs
            .unparen()
            .as_ident()
            .and_then(|name| self.env.lookup(self.ctx.scope, name))
            .map(|(_, obj)| obj)
            .filter(|obj| matches!(self.env.obj(*obj).kind, ObjKind::Var));
        let was_used = target.map(|obj| self.env.obj(obj).used);

        let z = self.expr(lhs);

        if let (Some(obj), Some(used)) = (target, was_used) {
            self.env.obj_mut(obj).used = used;
        }

        match z.mode {
            Mode::Invalid => return Type::Invalid,
            Mode::Variable | Mode::MapIndex => {}
            _ => {
                let desc = self.describe(&z);
                let in_map = matches!(
                    &lhs.unparen().kind,
                    ExprKind::Selector { x: base, .. }
                        if matches!(base.unparen().kind, ExprKind::Index { .. })
                            && self.info.types.get(&base.id).map_or(false, |tv| tv.mode == Mode::MapIndex)
                );
                if in_map {
                    self.error(z.pos, format!("cannot assign to struct field {} in map", z.text));
                } else {
                    self.error(z.pos, format!("cannot assign to {}", desc));
                }
                return Type::Invalid;
            }
        }
        self.assignment(x, Some(&z.typ), "assignment");
        z.typ
    }

    /// `a, b = x, y` or `a, b = f()`
    pub(crate) fn assign_vars(&mut self, lhs: &[Expr], rhs: &[Expr]) {
        if lhs.len() == rhs.len() && !single_call(rhs) {
            for (l, r) in lhs.iter().zip(rhs) {
                let mut x = self.expr(r);
                self.assign_var(l, &mut x);
            }
            return;
        }
        if rhs.len() == 1 {
            let mut operands = self.multi_expr_comma_ok(&rhs[0], lhs.len() == 2);
            if operands.iter().any(|x| x.is_invalid()) {
                self.use_lhs(lhs);
                return;
            }
            if operands.len() == lhs.len() {
                for (l, x) in lhs.iter().zip(operands.iter_mut()) {
                    self.assign_var(l, x);
                }
                return;
            }
            self.use_lhs(lhs);
            self.assign_mismatch(rhs[0].pos, lhs.len(), &rhs[0], operands.len());
            return;
        }
        self.use_lhs(lhs);
        self.use_exprs(rhs);
        self.error(
            rhs[0].pos,
            format!("assignment mismatch: {} variables but {} values", lhs.len(), rhs.len()),
        );
    }

    /// Evaluates assignment targets for their recorded types only
    fn use_lhs(&mut self, lhs: &[Expr]) {
        for e in lhs {
            if e.unparen().as_ident() == Some("_") {
                continue;
            }
            let target = e
                .unparen()
                .as_ident()
                .and_then(|name| self.env.lookup(self.ctx.scope, name))
                .map(|(_, obj)| (obj, self.env.obj(obj).used));
            self.raw_expr(e, None);
            if let Some((obj, used)) = target {
                self.env.obj_mut(obj).used = used;
            }
        }
    }

    /// `a, b := x, y` inside a function body
    pub(crate) fn short_var_decl(&mut self, pos: Pos, lhs: &[Expr], rhs: &[Expr]) {
        let scope = self.ctx.scope;
        let mut lhs_vars: Vec<ObjId> = Vec::with_capacity(lhs.len());
        let mut new_vars: Vec<(String, ObjId)> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for e in lhs {
            let Some(name) = e.as_ident() else {
                self.raw_expr(e, None);
                self.error(e.pos, format!("non-name {} on left side of :=", e));
                lhs_vars.push(self.placeholder_var(e.pos));
                continue;
            };
            if !seen.insert(name.to_string()) {
                self.error(e.pos, format!("{} repeated on left side of :=", name));
                lhs_vars.push(self.placeholder_var(e.pos));
                continue;
            }
            if name != "_" {
                if let Some(existing) = self.env.lookup_local(scope, name) {
                    self.record_use(e.id, existing);
                    if matches!(self.env.obj(existing).kind, ObjKind::Var) {
                        lhs_vars.push(existing);
                    } else {
                        self.error(e.pos, format!("cannot assign to {}", name));
                        lhs_vars.push(self.placeholder_var(e.pos));
                    }
                    continue;
                }
            }
            let obj = self.env.new_object(Object::new(name, ObjKind::Var, Type::Invalid, Some(self.pkg), e.pos));
            self.record_def(e.id, obj);
            lhs_vars.push(obj);
            if name != "_" {
                new_vars.push((name.to_string(), obj));
            }
        }

        self.init_vars(&lhs_vars, rhs, "assignment");

        if new_vars.is_empty() {
            self.error(pos, "no new variables on left side of :=");
            return;
        }
        for (name, obj) in new_vars {
            self.env.bind(scope, &name, obj);
            self.locals.push(obj);
        }
    }

    fn placeholder_var(&mut self, pos: Pos) -> ObjId {
        self.env
            .new_object(Object::new("_", ObjKind::Var, Type::Invalid, Some(self.pkg), pos))
    }
}

/// `x := f()` goes through the multi-value path so that a call with the
/// wrong number of results reports an assignment mismatch
pub(super) fn single_call(rhs: &[Expr]) -> bool {
    rhs.len() == 1 && matches!(rhs[0].unparen().kind, ExprKind::Call { .. })
}

fn measure(n: usize, unit: &str) -> String {
    if n == 1 {
        format!("{} {}", n, unit)
    } else {
        format!("{} {}s", n, unit)
    }
}
