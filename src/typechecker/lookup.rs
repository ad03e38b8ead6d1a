//! Field and method lookup, including promotion through embedded fields

use std::collections::HashSet;
use std::rc::Rc;

use crate::env::{NamedId, ObjId};
use crate::types::{Signature, Type};

use super::Checker;

/// Outcome of looking up `x.name`
#[derive(Debug, Clone, PartialEq)]
pub enum LookupResult {
    Field {
        typ: Type,
        index: Vec<usize>,
        indirect: bool,
    },
    Method {
        obj: ObjId,
        index: Vec<usize>,
        indirect: bool,
    },
    InterfaceMethod {
        sig: Rc<Signature>,
        index: Vec<usize>,
        indirect: bool,
    },
    /// The method has a pointer receiver but the operand is not addressable
    NotAddressable(ObjId),
    Ambiguous,
    NotFound,
}

#[derive(Debug, Clone)]
struct Embedded {
    typ: Type,
    index: Vec<usize>,
    indirect: bool,
    multiples: bool,
}

fn concat(index: &[usize], i: usize) -> Vec<usize> {
    let mut out = index.to_vec();
    out.push(i);
    out
}

impl<'a> Checker<'a> {
    /// Searches `t` breadth-first through embedded fields. The shallowest
    /// match wins; two matches at the same depth are ambiguous.
    pub(crate) fn lookup_field_or_method(&self, t: &Type, addressable: bool, name: &str) -> LookupResult {
        if name == "_" {
            return LookupResult::NotFound;
        }
        let (typ, is_ptr) = match t {
            Type::Pointer(elem) => ((**elem).clone(), true),
            other => (other.clone(), false),
        };
        if is_ptr && self.env.is_interface(&typ) {
            return LookupResult::NotFound;
        }

        let mut current = vec![Embedded {
            typ,
            index: Vec::new(),
            indirect: is_ptr,
            multiples: false,
        }];
        let mut seen: HashSet<NamedId> = HashSet::new();

        while !current.is_empty() {
            let mut next = Vec::new();
            let mut found: Option<LookupResult> = None;
            let mut count = 0;

            for e in &current {
                if let Type::Named(id) = &e.typ {
                    if !seen.insert(*id) {
                        continue;
                    }
                    let named = self.env.named(*id);
                    if let Some((i, obj)) = named
                        .methods
                        .iter()
                        .enumerate()
                        .find(|(_, m)| self.env.obj(**m).name == name)
                    {
                        count += if e.multiples { 2 } else { 1 };
                        found = Some(LookupResult::Method {
                            obj: *obj,
                            index: concat(&e.index, i),
                            indirect: e.indirect,
                        });
                        continue;
                    }
                }

                match self.env.underlying(&e.typ) {
                    Type::Struct(st) => {
                        for (i, field) in st.fields.iter().enumerate() {
                            if field.name == name {
                                count += if e.multiples { 2 } else { 1 };
                                found = Some(LookupResult::Field {
                                    typ: field.typ.clone(),
                                    index: concat(&e.index, i),
                                    indirect: e.indirect,
                                });
                                continue;
                            }
                            if found.is_none() && field.embedded {
                                let (typ, is_ptr) = match &field.typ {
                                    Type::Pointer(elem) => ((**elem).clone(), true),
                                    other => (other.clone(), false),
                                };
                                next.push(Embedded {
                                    typ,
                                    index: concat(&e.index, i),
                                    indirect: e.indirect || is_ptr,
                                    multiples: e.multiples,
                                });
                            }
                        }
                    }
                    Type::Interface(iface) => {
                        if let Some((i, m)) = iface.all_methods.iter().enumerate().find(|(_, m)| m.name == name) {
                            count += if e.multiples { 2 } else { 1 };
                            found = Some(LookupResult::InterfaceMethod {
                                sig: m.sig.clone(),
                                index: concat(&e.index, i),
                                indirect: e.indirect,
                            });
                        }
                    }
                    _ => {}
                }
            }

            if let Some(result) = found {
                if count > 1 {
                    return LookupResult::Ambiguous;
                }
                if let LookupResult::Method { obj, indirect, .. } = &result {
                    if self.has_ptr_recv(*obj) && !indirect && !addressable {
                        return LookupResult::NotAddressable(*obj);
                    }
                }
                return result;
            }

            current = consolidate_multiples(next);
        }
        LookupResult::NotFound
    }

    pub(crate) fn has_ptr_recv(&self, method: ObjId) -> bool {
        match &self.env.obj(method).typ {
            Type::Signature(sig) => sig
                .recv
                .as_ref()
                .map_or(false, |r| matches!(r.typ, Type::Pointer(_))),
            _ => false,
        }
    }
}

/// Merges entries for the same type; a type reachable twice at one depth
/// makes its members ambiguous
fn consolidate_multiples(list: Vec<Embedded>) -> Vec<Embedded> {
    let mut out: Vec<Embedded> = Vec::with_capacity(list.len());
    for e in list {
        match out.iter_mut().find(|o| o.typ == e.typ) {
            Some(existing) => existing.multiples = true,
            None => out.push(e),
        }
    }
    out
}
