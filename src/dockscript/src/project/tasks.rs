//! Task declarations from `project.tasks`
//!
//! ```lua
//! project.tasks = {
//!     up     = up,                                        -- bare function
//!     build  = {build},                                   -- one-element list
//!     deploy = {deploy, "ships it"},                      -- function + description
//!     logs   = {logs, "tails logs", "Tails every ..."},   -- + short and long
//!     clean  = {func = clean, short = "...", desc = "..."},
//! }
//! ```

use std::collections::BTreeMap;

use mlua::{Function, Table, Value};

use super::ProjectError;
use crate::lua::args::ValueKind;

/// A runnable project task
#[derive(Debug, Clone)]
pub struct Task {
    pub name: String,
    pub short_description: String,
    pub description: String,
    function: Function,
}

impl Task {
    pub fn call(&self, args: Table) -> mlua::Result<()> {
        self.function.call::<()>(args)
    }
}

/// The accepted declaration shapes
#[derive(Debug)]
enum TaskDecl {
    Bare(Function),
    Listed(Function),
    Described(Function, String),
    ShortAndLong(Function, String, String),
    Keyed {
        func: Function,
        short: Option<String>,
        desc: Option<String>,
    },
}

impl TaskDecl {
    fn parse(name: &str, value: Value) -> Result<Self, ProjectError> {
        let invalid = |reason: String| ProjectError::InvalidTask {
            name: name.to_string(),
            reason,
        };

        let table = match value {
            Value::Function(f) => return Ok(Self::Bare(f)),
            Value::Table(t) => t,
            other => return Err(invalid(format!("got a {}", ValueKind::of(&other)))),
        };

        let entries = entries(&table)?;
        if entries.is_empty() {
            return Err(invalid("got an empty table".to_string()));
        }

        let positional = entries.iter().filter(|(k, _)| matches!(k, Value::Integer(_))).count();
        let named = entries.iter().filter(|(k, _)| matches!(k, Value::String(_))).count();

        if positional == entries.len() {
            Self::parse_list(&table, entries.len()).map_err(invalid)
        } else if named == entries.len() {
            Self::parse_keyed(entries).map_err(invalid)
        } else {
            Err(invalid("mixes list and named fields".to_string()))
        }
    }

    fn parse_list(table: &Table, len: usize) -> Result<Self, String> {
        if table.raw_len() != len {
            return Err("list has holes".to_string());
        }
        if len > 3 {
            return Err(format!("list has {} elements, at most 3 allowed", len));
        }

        let func = match table.raw_get::<Value>(1) {
            Ok(Value::Function(f)) => f,
            Ok(other) => return Err(format!("element 1 must be a function, got a {}", ValueKind::of(&other))),
            Err(e) => return Err(e.to_string()),
        };

        let text = |index: usize| match table.raw_get::<Value>(index) {
            Ok(Value::String(s)) => Ok(String::from(s.to_string_lossy())),
            Ok(other) => Err(format!("element {} must be a string, got a {}", index, ValueKind::of(&other))),
            Err(e) => Err(e.to_string()),
        };

        Ok(match len {
            1 => Self::Listed(func),
            2 => Self::Described(func, text(2)?),
            _ => Self::ShortAndLong(func, text(2)?, text(3)?),
        })
    }

    fn parse_keyed(entries: Vec<(Value, Value)>) -> Result<Self, String> {
        let mut func = None;
        let mut short = None;
        let mut desc = None;

        for (key, value) in entries {
            let Value::String(key) = key else {
                continue;
            };
            let key = String::from(key.to_string_lossy());

            match (key.as_str(), value) {
                ("func", Value::Function(f)) => func = Some(f),
                ("short", Value::String(s)) => short = Some(String::from(s.to_string_lossy())),
                ("desc", Value::String(s)) => desc = Some(String::from(s.to_string_lossy())),
                ("func", other) => {
                    return Err(format!("func must be a function, got a {}", ValueKind::of(&other)))
                }
                ("short" | "desc", other) => {
                    return Err(format!("{} must be a string, got a {}", key, ValueKind::of(&other)))
                }
                (unknown, _) => return Err(format!("unknown field {:?}", unknown)),
            }
        }

        let func = func.ok_or_else(|| "missing func".to_string())?;
        Ok(Self::Keyed { func, short, desc })
    }

    /// A missing short description falls back to the long one and vice versa
    fn into_task(self, name: String) -> Task {
        let (function, short, desc) = match self {
            Self::Bare(f) | Self::Listed(f) => (f, None, None),
            Self::Described(f, d) => (f, None, Some(d)),
            Self::ShortAndLong(f, s, d) => (f, Some(s), Some(d)),
            Self::Keyed { func, short, desc } => (func, short, desc),
        };

        let (short_description, description) = match (short, desc) {
            (Some(s), Some(d)) => (s, d),
            (Some(s), None) => (s.clone(), s),
            (None, Some(d)) => (d.clone(), d),
            (None, None) => (String::new(), String::new()),
        };

        Task {
            name,
            short_description,
            description,
            function,
        }
    }
}

fn entries(table: &Table) -> mlua::Result<Vec<(Value, Value)>> {
    let mut entries = Vec::new();
    table.for_each(|k: Value, v: Value| {
        entries.push((k, v));
        Ok(())
    })?;
    Ok(entries)
}

/// Tasks by name, iterated in name order
#[derive(Debug, Default)]
pub struct TaskCatalog {
    tasks: BTreeMap<String, Task>,
}

impl TaskCatalog {
    /// Parse the value of `project.tasks`; `nil` means no tasks
    pub fn parse(value: Value) -> Result<Self, ProjectError> {
        let table = match value {
            Value::Nil => return Ok(Self::default()),
            Value::Table(t) => t,
            other => {
                return Err(ProjectError::InvalidTasks(format!(
                    "must be a table of named tasks, got a {}",
                    ValueKind::of(&other)
                )))
            }
        };

        let mut tasks = BTreeMap::new();
        for (key, value) in entries(&table)? {
            let name = match key {
                Value::String(s) => String::from(s.to_string_lossy()),
                Value::Integer(_) => {
                    return Err(ProjectError::InvalidTasks(
                        "must map task names to tasks, not be a list".to_string(),
                    ))
                }
                other => {
                    return Err(ProjectError::InvalidTasks(format!(
                        "task names must be strings, got a {}",
                        ValueKind::of(&other)
                    )))
                }
            };

            let task = TaskDecl::parse(&name, value)?.into_task(name.clone());
            tasks.insert(name, task);
        }

        Ok(Self { tasks })
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlua::Lua;

    fn parse(source: &str) -> Result<TaskCatalog, ProjectError> {
        let lua = Lua::new();
        let value: Value = lua.load(source).eval().unwrap();
        TaskCatalog::parse(value)
    }

    fn reason(err: ProjectError) -> String {
        err.to_string()
    }

    #[test]
    fn test_all_declaration_shapes() {
        let catalog = parse(
            r#"
            local f = function() end
            return {
                a = f,
                b = {f},
                c = {f, "build it"},
                d = {f, "short", "long"},
                e = {func = f, short = "s"},
                g = {func = f, desc = "d"},
                h = {func = f, short = "s", desc = "d"},
            }
            "#,
        )
        .unwrap();

        let described = |name: &str| {
            let task = catalog.get(name).unwrap();
            (task.short_description.as_str(), task.description.as_str())
        };

        assert_eq!(catalog.len(), 7);
        assert_eq!(described("a"), ("", ""));
        assert_eq!(described("b"), ("", ""));
        assert_eq!(described("c"), ("build it", "build it"));
        assert_eq!(described("d"), ("short", "long"));
        assert_eq!(described("e"), ("s", "s"));
        assert_eq!(described("g"), ("d", "d"));
        assert_eq!(described("h"), ("s", "d"));
    }

    #[test]
    fn test_catalog_sorted_by_name() {
        let catalog = parse("local f = function() end return {zeta = f, alpha = f, mid = f}").unwrap();
        let names: Vec<&str> = catalog.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_missing_tasks_is_empty() {
        let catalog = TaskCatalog::parse(Value::Nil).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_tasks_as_list_rejected() {
        let err = parse("local f = function() end return {f, f}").unwrap_err();
        assert!(matches!(err, ProjectError::InvalidTasks(_)), "got: {}", err);
    }

    #[test]
    fn test_tasks_not_a_table_rejected() {
        let err = parse("return 'build'").unwrap_err();
        assert!(reason(err).contains("got a string"));
    }

    #[test]
    fn test_four_element_list_rejected() {
        let err = parse("local f = function() end return {up = {f, 'a', 'b', 'c'}}").unwrap_err();
        let msg = reason(err);
        assert!(msg.contains("\"up\""), "got: {}", msg);
        assert!(msg.contains("at most 3"), "got: {}", msg);
    }

    #[test]
    fn test_non_function_first_element_rejected() {
        let err = parse("return {up = {'not a function', 'desc'}}").unwrap_err();
        assert!(reason(err).contains("element 1 must be a function"));
    }

    #[test]
    fn test_non_string_description_rejected() {
        let err = parse("local f = function() end return {up = {f, 42}}").unwrap_err();
        assert!(reason(err).contains("element 2 must be a string, got a number"));
    }

    #[test]
    fn test_mixed_list_and_fields_rejected() {
        let err = parse("local f = function() end return {up = {f, short = 's'}}").unwrap_err();
        assert!(reason(err).contains("mixes list and named fields"));
    }

    #[test]
    fn test_keyed_without_func_rejected() {
        let err = parse("return {up = {short = 's'}}").unwrap_err();
        assert!(reason(err).contains("missing func"));
    }

    #[test]
    fn test_keyed_unknown_field_rejected() {
        let err = parse("local f = function() end return {up = {func = f, help = 'x'}}").unwrap_err();
        assert!(reason(err).contains("unknown field \"help\""));
    }

    #[test]
    fn test_scalar_task_rejected_with_expected_shapes() {
        let err = parse("return {up = 42}").unwrap_err();
        let msg = reason(err);
        assert!(msg.contains("task \"up\""), "got: {}", msg);
        assert!(msg.contains("{func = function"), "got: {}", msg);
    }

    #[test]
    fn test_empty_declaration_rejected() {
        let err = parse("return {up = {}}").unwrap_err();
        assert!(reason(err).contains("empty table"));
    }

    #[test]
    fn test_non_string_task_name_rejected() {
        let err = parse("local f = function() end return {[true] = f}").unwrap_err();
        assert!(reason(err).contains("task names must be strings, got a boolean"));
    }

    #[test]
    fn test_task_call_receives_args() {
        let lua = Lua::new();
        let value: Value = lua
            .load("return {echo = function(args) last = table.concat(args, ',') end}")
            .eval()
            .unwrap();
        let catalog = TaskCatalog::parse(value).unwrap();

        let args = lua.create_sequence_from(["a", "b"]).unwrap();
        catalog.get("echo").unwrap().call(args).unwrap();
        assert_eq!(lua.globals().get::<String>("last").unwrap(), "a,b");
    }
}
