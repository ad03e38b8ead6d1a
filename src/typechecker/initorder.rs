//! Step 5: the order in which package-level variables are initialized

use std::collections::{HashMap, HashSet};

use crate::env::{DeclKind, ObjId, ObjKind};

use super::{Checker, Initializer};

impl<'a> Checker<'a> {
    /// Orders the initializers of the package-level variables declared by
    /// these files: dependencies first, source order otherwise. Functions
    /// are transparent, so a variable that reaches itself through calls is
    /// an initialization cycle.
    pub(crate) fn init_order(&mut self) {
        let _span = tracing::trace_span!("init_order").entered();

        let mut nodes: Vec<ObjId> = self.objs.clone();
        let mut methods: Vec<ObjId> = self
            .declared_here
            .iter()
            .copied()
            .filter(|obj| !self.objs.contains(obj))
            .collect();
        methods.sort_by_key(|obj| self.env.obj(*obj).pos);
        nodes.extend(methods);

        let index: HashMap<ObjId, usize> = nodes.iter().enumerate().map(|(i, obj)| (*obj, i)).collect();
        let mut succ: HashMap<ObjId, HashSet<ObjId>> = HashMap::new();
        let mut pred: HashMap<ObjId, HashSet<ObjId>> = HashMap::new();
        for n in &nodes {
            let deps: HashSet<ObjId> = self
                .deps
                .get(n)
                .map(|deps| deps.iter().copied().filter(|d| index.contains_key(d)).collect())
                .unwrap_or_default();
            for d in &deps {
                pred.entry(*d).or_default().insert(*n);
            }
            succ.insert(*n, deps);
        }

        // splice function nodes out, connecting their callers to their callees
        let is_func = |env: &crate::env::Env, obj: ObjId| matches!(env.obj(obj).kind, ObjKind::Func);
        for n in nodes.iter().copied().filter(|n| is_func(&*self.env, *n)) {
            let preds = pred.get(&n).cloned().unwrap_or_default();
            let succs = succ.get(&n).cloned().unwrap_or_default();
            for p in preds {
                if p == n {
                    continue;
                }
                for s in &succs {
                    if *s != n {
                        succ.entry(p).or_default().insert(*s);
                        let s_pred = pred.entry(*s).or_default();
                        s_pred.insert(p);
                        s_pred.remove(&n);
                    }
                }
                succ.entry(p).or_default().remove(&n);
            }
        }

        let mut remaining: Vec<ObjId> = nodes.iter().copied().filter(|n| !is_func(&*self.env, *n)).collect();
        let mut ndeps: HashMap<ObjId, usize> = remaining
            .iter()
            .map(|n| (*n, succ.get(n).map_or(0, |s| s.len())))
            .collect();
        let mut emitted: HashSet<ObjId> = HashSet::new();

        while !remaining.is_empty() {
            let Some(next) = remaining
                .iter()
                .enumerate()
                .min_by_key(|(_, n)| (ndeps.get(*n).copied().unwrap_or(0), index[*n]))
                .map(|(i, _)| i)
            else {
                break;
            };
            let n = remaining.remove(next);

            if ndeps.get(&n).copied().unwrap_or(0) > 0 {
                let mut seen = HashSet::new();
                if let Some(cycle) = self.find_path(n, n, &mut seen) {
                    self.report_init_cycle(n, &cycle);
                }
            }

            if let Some(preds) = pred.get(&n) {
                for p in preds {
                    if let Some(count) = ndeps.get_mut(p) {
                        *count = count.saturating_sub(1);
                    }
                }
            }

            if !matches!(self.env.obj(n).kind, ObjKind::Var) || emitted.contains(&n) {
                continue;
            }
            let Some(info) = self.env.decl(self.pkg, n) else {
                continue;
            };
            let Some(rhs) = info.init_expr().cloned() else {
                continue;
            };
            let lhs = match &info.kind {
                DeclKind::Var { lhs: Some(group), .. } => group.clone(),
                _ => vec![n],
            };
            emitted.extend(lhs.iter().copied());
            self.info.init_order.push(Initializer { lhs, rhs });
        }
        tracing::trace!(initializers = self.info.init_order.len(), "initialization order");
    }

    /// A dependency path from `from` to `to`, through functions too
    fn find_path(&self, from: ObjId, to: ObjId, seen: &mut HashSet<ObjId>) -> Option<Vec<ObjId>> {
        if !seen.insert(from) {
            return None;
        }
        for d in self.deps.get(&from).into_iter().flatten() {
            if *d == to {
                return Some(vec![*d]);
            }
            if let Some(mut path) = self.find_path(*d, to, seen) {
                path.insert(0, *d);
                return Some(path);
            }
        }
        None
    }

    fn report_init_cycle(&mut self, start: ObjId, cycle: &[ObjId]) {
        if cycle.iter().any(|obj| self.cycle_reported.contains(obj)) {
            return;
        }
        self.cycle_reported.extend(cycle.iter().copied());
        self.cycle_reported.insert(start);

        let first = self.env.obj(start);
        let pos = first.pos;
        let message = if cycle.len() == 1 && cycle[0] == start {
            format!("initialization cycle: {} refers to itself", first.name)
        } else {
            let mut names = vec![first.name.clone()];
            names.extend(cycle.iter().map(|obj| self.env.obj(*obj).name.clone()));
            format!("initialization cycle: {}", names.join(" refers to "))
        };
        self.error(pos, message);
    }
}
