//! Bridge packages
//!
//! A bridge shadows a Go package that is never read from source: its
//! exported API is declared with a [`SigBuilder`] and its behaviour comes
//! from a table of native functions registered with the runtime:
//! ```go
//! import "strings"
//! n := strings.Count("cheese", "e")
//! ```
//! Methods of bridged types are table entries named `Type.Method`.

pub mod errors;
pub mod fmt;
pub mod gitesting;
pub mod math;
pub mod os;
pub mod rand;
pub mod strconv;
pub mod strings;
pub mod sync;
pub mod time;

use crate::error::{GiltError, Result};
use crate::intrinsics::SigBuilder;
use crate::runtime::{NameTable, Value};

/// One bridged import path
pub struct Bridge {
    pub path: &'static str,
    /// Only importable when the session runs in test mode
    pub test_only: bool,
    /// Declares the package's exported objects
    pub declare: fn(&mut SigBuilder<'_>),
    /// The package's natives
    pub natives: fn() -> NameTable,
}

impl Bridge {
    /// The package name: the last element of the path
    pub fn name(&self) -> &'static str {
        self.path.rsplit('/').next().unwrap_or(self.path)
    }

    /// Program text binding the registered table to the package name
    pub fn init_text(&self) -> String {
        format!("{name} = __bridge[\"{path}\"]\n", name = self.name(), path = self.path)
    }
}

static BRIDGES: &[Bridge] = &[
    Bridge {
        path: "errors",
        test_only: false,
        declare: errors::declare,
        natives: errors::init,
    },
    Bridge {
        path: "fmt",
        test_only: false,
        declare: fmt::declare,
        natives: fmt::init,
    },
    Bridge {
        path: "math",
        test_only: false,
        declare: math::declare,
        natives: math::init,
    },
    Bridge {
        path: "math/rand",
        test_only: false,
        declare: rand::declare,
        natives: rand::init,
    },
    Bridge {
        path: "os",
        test_only: false,
        declare: os::declare,
        natives: os::init,
    },
    Bridge {
        path: "strconv",
        test_only: false,
        declare: strconv::declare,
        natives: strconv::init,
    },
    Bridge {
        path: "strings",
        test_only: false,
        declare: strings::declare,
        natives: strings::init,
    },
    Bridge {
        path: "sync",
        test_only: false,
        declare: sync::declare,
        natives: sync::init,
    },
    Bridge {
        path: "time",
        test_only: false,
        declare: time::declare,
        natives: time::init,
    },
    Bridge {
        path: "gitesting",
        test_only: true,
        declare: gitesting::declare,
        natives: gitesting::init,
    },
];

/// Every bridge, test-only ones included
pub fn all() -> &'static [Bridge] {
    BRIDGES
}

/// The bridge shadowing `path`, if any
pub fn lookup(path: &str, test_mode: bool) -> Option<&'static Bridge> {
    BRIDGES
        .iter()
        .find(|b| b.path == path && (test_mode || !b.test_only))
}

// Argument helpers shared by the natives

pub(crate) fn arg_str<'v>(args: &'v [Value], i: usize, func: &str) -> Result<&'v str> {
    args.get(i)
        .and_then(Value::as_str)
        .ok_or_else(|| GiltError::RuntimeError(format!("{}() argument {} must be a string", func, i + 1)))
}

pub(crate) fn arg_int(args: &[Value], i: usize, func: &str) -> Result<i64> {
    args.get(i)
        .and_then(Value::as_i64)
        .ok_or_else(|| GiltError::RuntimeError(format!("{}() argument {} must be an integer", func, i + 1)))
}

pub(crate) fn arg_f64(args: &[Value], i: usize, func: &str) -> Result<f64> {
    args.get(i)
        .and_then(Value::as_f64)
        .ok_or_else(|| GiltError::RuntimeError(format!("{}() argument {} must be a number", func, i + 1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Env;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lookup_respects_test_mode() {
        assert!(lookup("fmt", false).is_some());
        assert!(lookup("gitesting", false).is_none());
        assert!(lookup("gitesting", true).is_some());
        assert!(lookup("net/http", true).is_none());
    }

    #[test]
    fn test_base_name() {
        assert_eq!(lookup("math/rand", false).unwrap().name(), "rand");
        assert_eq!(lookup("strings", false).unwrap().name(), "strings");
    }

    /// Every exported declaration has a native behind it
    #[test]
    fn test_declarations_have_natives() {
        for bridge in all() {
            let mut env = Env::new();
            let pkg = env.new_package(bridge.path, bridge.name());
            let mut b = SigBuilder::new(&mut env, pkg);
            (bridge.declare)(&mut b);
            b.finish();
            let natives = (bridge.natives)();

            let scope = env.package(pkg).scope;
            for (name, obj) in &env.scope(scope).names {
                let obj = env.obj(*obj);
                if matches!(obj.kind, crate::env::ObjKind::Func) {
                    assert!(natives.contains_key(name), "{}.{} has no native", bridge.path, name);
                }
                if obj.is_type_name() {
                    if let crate::types::Type::Named(id) = obj.typ {
                        for method in &env.named(id).methods {
                            let key = format!("{}.{}", name, env.obj(*method).name);
                            assert!(natives.contains_key(&key), "{}.{} has no native", bridge.path, key);
                        }
                    }
                }
            }
        }
    }
}
