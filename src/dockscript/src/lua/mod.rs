//! Lua runtime for project scripts
//!
//! Each [`Sandbox`] owns one interpreter. The interpreter's own globals are
//! emptied after start-up; scripts instead run against a curated environment
//! table built from an allow-list, so a chunk (and every module it
//! `require`s) only ever sees the safe surface plus the engine API.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use mlua::{Error as LuaError, FromLuaMulti, Function, Lua, MultiValue, Table, Value};
use thiserror::Error;
use tracing::warn;

use crate::engine::Engine;
use crate::scoping::ProjectIdentity;

pub mod api;
pub mod args;
pub mod marshal;
mod stdlib;

/// Registry slot holding the curated library snapshot
const STOCK_KEY: &str = "dockscript.stock";

/// Base functions carried over from the stock interpreter
const BASE_GLOBALS: &[&str] = &[
    "assert", "error", "ipairs", "next", "pairs", "pcall", "select",
    "tonumber", "tostring", "type", "xpcall", "_VERSION",
];

const TABLE_FUNCS: &[&str] = &["concat", "insert", "remove", "sort", "unpack"];

const MATH_FIELDS: &[&str] = &[
    "abs", "acos", "asin", "atan", "ceil", "cos", "deg", "exp", "floor", "fmod",
    "huge", "log", "max", "maxinteger", "min", "mininteger", "modf", "pi", "rad",
    "random", "sin", "sqrt", "tan", "tointeger", "type", "ult",
];

const STRING_FUNCS: &[&str] = &[
    "byte", "char", "find", "format", "len",
    "lower", "upper", "rep", "reverse", "sub",
];

// guards for the pattern-matching functions
const MAX_STRING_LEN: usize = 1_000_000;
const MAX_PATTERN_LEN: usize = 1_000;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to read script {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error in {}", .path.display())]
    Script {
        path: PathBuf,
        #[source]
        source: LuaError,
    },

    #[error(transparent)]
    Lua(#[from] LuaError),
}

/// Host side of the sandbox: the engine handle and the project the
/// sandbox belongs to, once known.
pub struct Host {
    engine: Arc<dyn Engine>,
    scoped: bool,
    project: OnceLock<ProjectIdentity>,
    // set while a project marker runs; its identity is not known yet
    loading: AtomicBool,
}

impl Host {
    /// `scoped` controls whether engine calls are labelled/filtered by the
    /// bound project. Use one host per project.
    pub fn new(engine: Arc<dyn Engine>, scoped: bool) -> Arc<Self> {
        Arc::new(Self {
            engine,
            scoped,
            project: OnceLock::new(),
            loading: AtomicBool::new(false),
        })
    }

    /// The engine, unless a project marker is still loading. Calls made
    /// then could not be scoped to the project.
    pub fn engine(&self) -> Result<&dyn Engine, LuaError> {
        if self.loading.load(Ordering::SeqCst) {
            return Err(LuaError::runtime(
                "the docker API is not available while the project is loading; call it from a task",
            ));
        }
        Ok(self.engine.as_ref())
    }

    /// Project to scope engine calls to
    pub fn project(&self) -> Option<&ProjectIdentity> {
        if self.scoped {
            self.project.get()
        } else {
            None
        }
    }

    /// Mark a project marker as running. Engine calls fail until
    /// [`Host::bind`] or [`Host::abort_load`].
    pub fn begin_load(&self) {
        self.loading.store(true, Ordering::SeqCst);
    }

    pub fn abort_load(&self) {
        self.loading.store(false, Ordering::SeqCst);
    }

    pub fn bind(&self, project: ProjectIdentity) {
        if let Err(project) = self.project.set(project) {
            warn!("host already bound, ignoring project {}", project.id);
        }
        self.loading.store(false, Ordering::SeqCst);
    }
}

/// Sandboxed lua runtime
pub struct Sandbox {
    lua: Lua,
    env: Table,
}

#[allow(dead_code)]
impl Sandbox {
    /// create a sandbox whose `require` resolves relative to `base_dir`
    pub fn new(host: Arc<Host>, base_dir: &Path) -> Result<Self, SandboxError> {
        let lua = Lua::new();

        Self::seal(&lua)?;
        let env = environment(&lua, &host, base_dir)?;

        Ok(Self { lua, env })
    }

    /// snapshot the allow-listed libraries, then empty the real globals
    fn seal(lua: &Lua) -> mlua::Result<()> {
        let globals = lua.globals();
        let stock = lua.create_table()?;

        for name in BASE_GLOBALS {
            stock.raw_set(*name, globals.raw_get::<Value>(*name)?)?;
        }

        stock.raw_set("table", subset(lua, &globals.raw_get::<Table>("table")?, TABLE_FUNCS)?)?;
        stock.raw_set("math", subset(lua, &globals.raw_get::<Table>("math")?, MATH_FIELDS)?)?;

        let string = Self::restrict_strlib(lua, &globals.raw_get::<Table>("string")?)?;
        // `("x"):upper()` goes through the string metatable, not the env
        let string_meta: Table = lua.load("return getmetatable('')").eval()?;
        string_meta.raw_set("__index", string.clone())?;
        stock.raw_set("string", string)?;

        lua.set_named_registry_value(STOCK_KEY, stock)?;

        let mut names = Vec::new();
        globals.for_each(|name: Value, _: Value| {
            names.push(name);
            Ok(())
        })?;
        for name in names {
            globals.raw_set(name, Value::Nil)?;
        }

        Ok(())
    }

    /// restrict str library to safe subset with guarded pattern functions
    fn restrict_strlib(lua: &Lua, string: &Table) -> mlua::Result<Table> {
        let new_str = subset(lua, string, STRING_FUNCS)?;

        let orig: Function = string.raw_get("gsub")?;
        let safe_gsub = lua.create_function(
            move |_, (s, pat, repl, n): (String, String, Value, Option<i64>)| {
                check_pattern_input(&s, &pat)?;
                orig.call::<MultiValue>((s, pat, repl, n))
            },
        )?;
        new_str.raw_set("gsub", safe_gsub)?;

        let orig: Function = string.raw_get("match")?;
        let safe_match = lua.create_function(
            move |_, (s, pat, init): (String, String, Option<i64>)| {
                check_pattern_input(&s, &pat)?;
                orig.call::<MultiValue>((s, pat, init))
            },
        )?;
        new_str.raw_set("match", safe_match)?;

        let orig: Function = string.raw_get("gmatch")?;
        let safe_gmatch = lua.create_function(move |_, (s, pat): (String, String)| {
            check_pattern_input(&s, &pat)?;
            orig.call::<Function>((s, pat))
        })?;
        new_str.raw_set("gmatch", safe_gmatch)?;

        Ok(new_str)
    }

    /// load and exec a script file in this sandbox's environment
    pub fn exec_file(&self, path: &Path) -> Result<(), SandboxError> {
        let source = std::fs::read_to_string(path).map_err(|source| SandboxError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        self.lua
            .load(source)
            .set_name(chunk_name(path))
            .set_environment(self.env.clone())
            .exec()
            .map_err(|source| SandboxError::Script {
                path: path.to_path_buf(),
                source,
            })
    }

    /// execute a lua string for testing
    pub fn exec(&self, code: &str) -> mlua::Result<()> {
        self.lua.load(code).set_environment(self.env.clone()).exec()
    }

    /// evaluate a lua expression chunk for testing
    pub fn eval<T: FromLuaMulti>(&self, code: &str) -> mlua::Result<T> {
        self.lua.load(code).set_environment(self.env.clone()).eval()
    }

    /// the global environment scripts see
    pub fn env(&self) -> &Table {
        &self.env
    }

    /// get a reference to lua state
    pub fn lua(&self) -> &Lua {
        &self.lua
    }
}

fn check_pattern_input(s: &str, pat: &str) -> mlua::Result<()> {
    if s.len() > MAX_STRING_LEN {
        return Err(LuaError::RuntimeError("input string too large".into()));
    }
    if pat.len() > MAX_PATTERN_LEN {
        return Err(LuaError::RuntimeError("pattern too large".into()));
    }
    Ok(())
}

fn chunk_name(path: &Path) -> String {
    format!("@{}", path.display())
}

/// copy the named fields of `src` into a new table, skipping absent ones
fn subset(lua: &Lua, src: &Table, names: &[&str]) -> mlua::Result<Table> {
    let table = lua.create_table()?;
    for name in names {
        let value: Value = src.raw_get(*name)?;
        if !value.is_nil() {
            table.raw_set(*name, value)?;
        }
    }
    Ok(table)
}

fn shallow_copy(lua: &Lua, src: &Table) -> mlua::Result<Table> {
    let table = lua.create_table()?;
    src.for_each(|k: Value, v: Value| table.raw_set(k, v))?;
    Ok(table)
}

/// Build a fresh global environment. Library tables are copied so that one
/// environment cannot tamper with another's.
pub(crate) fn environment(lua: &Lua, host: &Arc<Host>, base_dir: &Path) -> mlua::Result<Table> {
    let stock: Table = lua.named_registry_value(STOCK_KEY)?;
    let env = lua.create_table()?;

    stock.for_each(|name: Value, value: Value| {
        let value = match value {
            Value::Table(lib) => Value::Table(shallow_copy(lua, &lib)?),
            other => other,
        };
        env.raw_set(name, value)
    })?;
    env.raw_set("_G", env.clone())?;

    stdlib::install(lua, &env, host, base_dir)?;
    api::install(lua, &env, host)?;

    Ok(env)
}
