//! Calls, conversions and built-in functions

use std::rc::Rc;

use crate::ast::{ChanDir, Expr, ExprKind};
use crate::constant::ConstValue;
use crate::env::Builtin;
use crate::types::{BasicKind, Signature, Type};

use super::operand::{Mode, Operand};
use super::Checker;

/// Whether a built-in call may stand alone as a statement
pub(crate) fn builtin_is_statement(b: Builtin) -> bool {
    matches!(
        b,
        Builtin::Close
            | Builtin::Copy
            | Builtin::Delete
            | Builtin::Panic
            | Builtin::Print
            | Builtin::Println
            | Builtin::Recover
    )
}

impl<'a> Checker<'a> {
    pub(crate) fn call(&mut self, e: &Expr, fun: &Expr, args: &[Expr], ellipsis: bool) -> Operand {
        let x = self.expr_or_type(fun);
        match x.mode {
            Mode::Invalid => {
                self.use_exprs(args);
                Operand::invalid(e)
            }
            Mode::TypeExpr => {
                let target = x.typ;
                if ellipsis {
                    self.error(e.pos, format!("invalid use of ... in conversion to {}", self.type_str(&target)));
                }
                match args {
                    [arg] => {
                        let mut y = self.expr(arg);
                        if y.is_invalid() {
                            return Operand::invalid(e);
                        }
                        self.conversion(&mut y, &target);
                        if y.is_invalid() {
                            return Operand::invalid(e);
                        }
                        Operand::new(y.mode, y.typ, e)
                    }
                    [] => {
                        self.error(e.pos, format!("missing argument in conversion to {}", self.type_str(&target)));
                        Operand::invalid(e)
                    }
                    _ => {
                        self.error(
                            args[1].pos,
                            format!("too many arguments in conversion to {}", self.type_str(&target)),
                        );
                        self.use_exprs(args);
                        Operand::invalid(e)
                    }
                }
            }
            Mode::Builtin(b) => self.builtin(e, b, args, ellipsis),
            _ => {
                let Type::Signature(sig) = self.env.underlying(&x.typ) else {
                    let desc = self.describe(&x);
                    self.error(x.pos, format!("invalid operation: cannot call non-function {}", desc));
                    self.use_exprs(args);
                    return Operand::invalid(e);
                };
                self.arguments(e, fun, &sig, args, ellipsis);
                match sig.results.len() {
                    0 => Operand::new(Mode::NoValue, Type::no_value(), e),
                    _ => Operand::new(Mode::Value, sig.result_type(), e),
                }
            }
        }
    }

    fn arguments(&mut self, call: &Expr, fun: &Expr, sig: &Rc<Signature>, args: &[Expr], ellipsis: bool) {
        let mut operands = if args.len() == 1 && !ellipsis {
            self.multi_expr(&args[0])
        } else {
            args.iter().map(|a| self.expr(a)).collect()
        };
        if operands.iter().any(|x| x.is_invalid()) {
            return;
        }

        if ellipsis {
            if !sig.variadic {
                self.error(call.pos, format!("cannot use ... in call to non-variadic {}", fun));
                return;
            }
            if args.len() == 1 && operands.len() > 1 {
                self.error(call.pos, format!("cannot use ... with multi-valued expression {}", args[0]));
                return;
            }
        }

        let nargs = operands.len();
        let npars = sig.params.len();
        let mut expected: Vec<Type> = sig.params.iter().map(|p| p.typ.clone()).collect();
        if sig.variadic && !ellipsis {
            if nargs + 1 >= npars {
                let last = expected.pop().unwrap_or(Type::Invalid);
                let elem = match last {
                    Type::Slice(elem) => (*elem).clone(),
                    other => other,
                };
                expected.resize(nargs, elem);
            }
        }

        if nargs != expected.len() {
            let message = if nargs < expected.len() {
                format!("not enough arguments in call to {}", fun)
            } else {
                format!("too many arguments in call to {}", fun)
            };
            let pos = operands.get(expected.len()).map_or(call.pos, |x| x.pos);
            self.error(pos, message);
            return;
        }

        for (x, t) in operands.iter_mut().zip(&expected) {
            self.assignment(x, Some(t), "argument");
        }
    }

    /// Checks `T(x)`; on success `x` has type `T`
    pub(crate) fn conversion(&mut self, x: &mut Operand, target: &Type) {
        let const_arg = x.is_constant();
        let target_kind = self.env.basic_kind(target);

        let ok = match (x.value().cloned(), target_kind) {
            (Some(value), Some(kind)) if kind != BasicKind::UntypedNil => {
                match (&value, kind.is_string()) {
                    // string(rune)
                    (ConstValue::Int(code), true) if x.typ.basic().map_or(true, |k| !k.is_string()) => {
                        let s = u32::try_from(*code)
                            .ok()
                            .and_then(char::from_u32)
                            .unwrap_or('\u{FFFD}')
                            .to_string();
                        x.mode = Mode::Constant(ConstValue::String(s));
                        true
                    }
                    _ => match value.representable(kind) {
                        Some(v) => {
                            x.mode = Mode::Constant(v);
                            true
                        }
                        None => false,
                    },
                }
            }
            _ => {
                let ok = self.convertible_to(x, target);
                if ok && !(const_arg && target_kind.is_some()) {
                    x.mode = Mode::Value;
                }
                ok
            }
        };

        if !ok {
            let desc = self.describe(x);
            let ts = self.type_str(target);
            self.error(x.pos, format!("cannot convert {} to type {}", desc, ts));
            x.invalidate();
            return;
        }

        if x.typ.is_untyped() {
            let is_const_type = target_kind.map_or(false, |k| k != BasicKind::UntypedNil);
            let final_typ = if self.env.is_interface(target) || (const_arg && !is_const_type) || x.is_nil() {
                x.typ.default_type()
            } else {
                target.clone()
            };
            self.update_expr_type(x.id, &final_typ, true);
        }
        x.typ = target.clone();
    }

    fn builtin(&mut self, e: &Expr, b: Builtin, args: &[Expr], ellipsis: bool) -> Operand {
        let name = b.name();
        if ellipsis && b != Builtin::Append {
            self.error(e.pos, format!("invalid use of ... with built-in {}", name));
            self.use_exprs(args);
            return Operand::invalid(e);
        }

        let (min, max) = match b {
            Builtin::Append => (1, usize::MAX),
            Builtin::Cap | Builtin::Len | Builtin::Close | Builtin::New | Builtin::Panic => (1, 1),
            Builtin::Copy | Builtin::Delete => (2, 2),
            Builtin::Make => (1, 3),
            Builtin::Print | Builtin::Println => (0, usize::MAX),
            Builtin::Recover => (0, 0),
        };
        if args.len() < min {
            self.error(
                e.pos,
                format!("not enough arguments for {} (expected {}, found {})", e, min, args.len()),
            );
            self.use_exprs(args);
            return Operand::invalid(e);
        }
        if args.len() > max {
            self.error(
                args[max].pos,
                format!("too many arguments for {} (expected {}, found {})", e, max, args.len()),
            );
            self.use_exprs(args);
            return Operand::invalid(e);
        }

        match b {
            Builtin::Append => {
                let s = self.expr(&args[0]);
                if s.is_invalid() {
                    self.use_exprs(&args[1..]);
                    return Operand::invalid(e);
                }
                let Type::Slice(elem) = self.env.underlying(&s.typ) else {
                    let desc = self.describe(&s);
                    self.error(s.pos, format!("invalid argument: {} is not a slice", desc));
                    self.use_exprs(&args[1..]);
                    return Operand::invalid(e);
                };
                if ellipsis {
                    if args.len() != 2 {
                        self.error(e.pos, "can only use ... with final argument in list");
                        self.use_exprs(&args[1..]);
                        return Operand::invalid(e);
                    }
                    let mut y = self.expr(&args[1]);
                    // append([]byte, string...)
                    let bytes_from_string = *elem == Type::Basic(BasicKind::Uint8)
                        && self.env.basic_kind(&y.typ).map_or(false, |k| k.is_string());
                    if !bytes_from_string {
                        self.assignment(&mut y, Some(&s.typ), "argument to append");
                    } else if y.typ.is_untyped() {
                        self.assignment(&mut y, None, "argument to append");
                    }
                } else {
                    for arg in &args[1..] {
                        let mut y = self.expr_with_hint(arg, &elem);
                        self.assignment(&mut y, Some(&*elem), "argument to append");
                    }
                }
                Operand::new(Mode::Value, s.typ, e)
            }
            Builtin::Cap | Builtin::Len => {
                let mut x = self.expr(&args[0]);
                if x.is_invalid() {
                    return Operand::invalid(e);
                }
                let mut constant: Option<i128> = None;
                let ok = match self.env.underlying(&x.typ) {
                    Type::Basic(kind) if kind.is_string() && b == Builtin::Len => {
                        if let Some(ConstValue::String(s)) = x.value() {
                            constant = Some(s.len() as i128);
                        }
                        true
                    }
                    Type::Array(n, _) => {
                        if !contains_call_or_recv(&args[0]) {
                            constant = Some(n as i128);
                        }
                        true
                    }
                    Type::Pointer(p) => match self.env.underlying(&p) {
                        Type::Array(n, _) => {
                            if !contains_call_or_recv(&args[0]) {
                                constant = Some(n as i128);
                            }
                            true
                        }
                        _ => false,
                    },
                    Type::Slice(_) | Type::Chan(..) => true,
                    Type::Map(..) => b == Builtin::Len,
                    _ => false,
                };
                if !ok {
                    let desc = self.describe(&x);
                    self.error(x.pos, format!("invalid argument: {} for {}", desc, name));
                    return Operand::invalid(e);
                }
                if x.typ.is_untyped() {
                    self.assignment(&mut x, None, name);
                }
                match constant {
                    Some(n) => Operand::new(Mode::Constant(ConstValue::Int(n)), Type::int(), e),
                    None => Operand::new(Mode::Value, Type::int(), e),
                }
            }
            Builtin::Close => {
                let x = self.expr(&args[0]);
                if x.is_invalid() {
                    return Operand::invalid(e);
                }
                match self.env.underlying(&x.typ) {
                    Type::Chan(ChanDir::Recv, _) => {
                        let desc = self.describe(&x);
                        self.error(x.pos, format!("invalid operation: cannot close receive-only channel {}", desc));
                        Operand::invalid(e)
                    }
                    Type::Chan(..) => Operand::new(Mode::NoValue, Type::no_value(), e),
                    _ => {
                        let desc = self.describe(&x);
                        self.error(x.pos, format!("invalid operation: cannot close non-channel {}", desc));
                        Operand::invalid(e)
                    }
                }
            }
            Builtin::Copy => {
                let dst = self.expr(&args[0]);
                let mut src = self.expr(&args[1]);
                if dst.is_invalid() || src.is_invalid() {
                    return Operand::invalid(e);
                }
                let Type::Slice(dst_elem) = self.env.underlying(&dst.typ) else {
                    let desc = self.describe(&dst);
                    self.error(dst.pos, format!("invalid argument: copy expects slice arguments; found {}", desc));
                    return Operand::invalid(e);
                };
                let src_elem = match self.env.underlying(&src.typ) {
                    Type::Slice(elem) => Some((*elem).clone()),
                    Type::Basic(kind) if kind.is_string() => Some(Type::Basic(BasicKind::Uint8)),
                    _ => None,
                };
                match src_elem {
                    Some(src_elem) if src_elem == *dst_elem => {
                        if src.typ.is_untyped() {
                            self.assignment(&mut src, None, "argument to copy");
                        }
                        Operand::new(Mode::Value, Type::int(), e)
                    }
                    Some(_) => {
                        let ds = self.type_str(&dst.typ);
                        let ss = self.type_str(&src.typ);
                        self.error(
                            e.pos,
                            format!("invalid argument: arguments to copy {} and {} have different element types", ds, ss),
                        );
                        Operand::invalid(e)
                    }
                    None => {
                        let desc = self.describe(&src);
                        self.error(src.pos, format!("invalid argument: copy expects slice arguments; found {}", desc));
                        Operand::invalid(e)
                    }
                }
            }
            Builtin::Delete => {
                let m = self.expr(&args[0]);
                if m.is_invalid() {
                    self.use_exprs(&args[1..]);
                    return Operand::invalid(e);
                }
                let Type::Map(key, _) = self.env.underlying(&m.typ) else {
                    let desc = self.describe(&m);
                    self.error(m.pos, format!("invalid argument: {} is not a map", desc));
                    self.use_exprs(&args[1..]);
                    return Operand::invalid(e);
                };
                let mut k = self.expr(&args[1]);
                self.assignment(&mut k, Some(&*key), "argument to delete");
                if k.is_invalid() {
                    return Operand::invalid(e);
                }
                Operand::new(Mode::NoValue, Type::no_value(), e)
            }
            Builtin::Make => {
                let t = self.typ_expr(&args[0]);
                if t.is_invalid() {
                    self.use_exprs(&args[1..]);
                    return Operand::invalid(e);
                }
                let min = match self.env.underlying(&t) {
                    Type::Slice(_) => 2,
                    Type::Map(..) | Type::Chan(..) => 1,
                    _ => {
                        let ts = self.type_str(&t);
                        self.error(
                            args[0].pos,
                            format!("invalid argument: cannot make {}; type must be slice, map, or channel", ts),
                        );
                        self.use_exprs(&args[1..]);
                        return Operand::invalid(e);
                    }
                };
                if args.len() < min || args.len() > min + 1 {
                    self.error(
                        e.pos,
                        format!(
                            "invalid operation: {} expects {} or {} arguments; found {}",
                            e,
                            min,
                            min + 1,
                            args.len()
                        ),
                    );
                    self.use_exprs(&args[1..]);
                    return Operand::invalid(e);
                }
                let sizes: Vec<Option<i64>> = args[1..].iter().map(|a| self.index(a, -1)).collect();
                if let [Some(len), Some(cap)] = sizes.as_slice() {
                    if len > cap {
                        self.error(args[1].pos, "invalid argument: length and capacity swapped");
                    }
                }
                Operand::new(Mode::Value, t, e)
            }
            Builtin::New => {
                let t = self.typ_expr(&args[0]);
                if t.is_invalid() {
                    return Operand::invalid(e);
                }
                Operand::new(Mode::Value, Type::pointer(t), e)
            }
            Builtin::Panic => {
                let mut x = self.expr(&args[0]);
                self.assignment(&mut x, Some(&Type::empty_interface()), "argument to panic");
                Operand::new(Mode::NoValue, Type::no_value(), e)
            }
            Builtin::Print | Builtin::Println => {
                for arg in args {
                    let mut x = self.expr(arg);
                    self.assignment(&mut x, None, &format!("argument to built-in {}", name));
                }
                Operand::new(Mode::NoValue, Type::no_value(), e)
            }
            Builtin::Recover => Operand::new(Mode::Value, Type::empty_interface(), e),
        }
    }
}

/// Whether evaluating `e` involves a function call or a channel receive
fn contains_call_or_recv(e: &Expr) -> bool {
    match &e.kind {
        ExprKind::Call { .. } => true,
        ExprKind::Unary { op, x } => *op == crate::ast::UnaryOp::Recv || contains_call_or_recv(x),
        ExprKind::Paren(x) | ExprKind::Star(x) => contains_call_or_recv(x),
        ExprKind::Selector { x, .. } => contains_call_or_recv(x),
        ExprKind::Index { x, index } => contains_call_or_recv(x) || contains_call_or_recv(index),
        ExprKind::Binary { x, y, .. } => contains_call_or_recv(x) || contains_call_or_recv(y),
        ExprKind::CompositeLit { elts, .. } => elts.iter().any(contains_call_or_recv),
        ExprKind::KeyValue { key, value } => contains_call_or_recv(key) || contains_call_or_recv(value),
        _ => false,
    }
}
