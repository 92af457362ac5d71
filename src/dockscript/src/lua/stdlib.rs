//! Host-provided globals for project scripts
//!
//! `print`, the reduced `os` table, `json`, `unpack` and `require`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mlua::{Error as LuaError, Function, Lua, LuaSerdeExt, MultiValue, Table, Value};
use nix::unistd::{Uid, User};

use super::args::Args;
use super::{chunk_name, environment, marshal, Host};

/// Extension appended to `require` names that lack it
pub const SCRIPT_EXTENSION: &str = ".lua";

/// Install host globals into `env`
pub fn install(lua: &Lua, env: &Table, host: &Arc<Host>, base_dir: &Path) -> mlua::Result<()> {
    let table_lib: Table = env.raw_get("table")?;
    env.raw_set("unpack", table_lib.raw_get::<Value>("unpack")?)?;

    // print writes to stdout: space separated, newline terminated
    let tostring: Function = env.raw_get("tostring")?;
    env.raw_set("print", lua.create_function(move |_, args: MultiValue| {
        let mut parts = Vec::with_capacity(args.len());
        for value in args {
            parts.push(tostring.call::<String>(value)?);
        }
        let mut out = std::io::stdout().lock();
        writeln!(out, "{}", parts.join(" ")).map_err(LuaError::external)
    })?)?;

    env.raw_set("os", os_table(lua)?)?;
    env.raw_set("json", json_table(lua)?)?;

    let host = Arc::clone(host);
    let base_dir = base_dir.to_path_buf();
    env.raw_set("require", lua.create_function(move |lua, args: MultiValue| {
        let name = Args::new(args).require_string()?;
        require(lua, &host, &base_dir, &name)
    })?)?;

    Ok(())
}

fn os_table(lua: &Lua) -> mlua::Result<Table> {
    let os = lua.create_table()?;

    os.raw_set("username", lua.create_function(|_, ()| {
        match User::from_uid(Uid::current()) {
            Ok(Some(user)) => Ok(user.name),
            Ok(None) => std::env::var("USER")
                .map_err(|_| LuaError::runtime("current user has no account entry")),
            Err(e) => Err(LuaError::external(e)),
        }
    })?)?;

    os.raw_set("home", lua.create_function(|_, ()| {
        dirs::home_dir()
            .map(|h| h.display().to_string())
            .ok_or_else(|| LuaError::runtime("home directory is unknown"))
    })?)?;

    os.raw_set("getEnv", lua.create_function(|_, args: MultiValue| {
        let name = Args::new(args).require_string()?;
        Ok(std::env::var(name).unwrap_or_default())
    })?)?;

    os.raw_set("setEnv", lua.create_function(|_, args: MultiValue| {
        let mut args = Args::new(args);
        let name = args.require_string()?;
        let value = args.require_string()?;
        if name.is_empty() || name.contains(['=', '\0']) || value.contains('\0') {
            return Err(LuaError::runtime(format!("invalid environment variable {name:?}")));
        }
        std::env::set_var(name, value);
        Ok(())
    })?)?;

    Ok(os)
}

fn json_table(lua: &Lua) -> mlua::Result<Table> {
    let json = lua.create_table()?;

    json.raw_set("encode", lua.create_function(|lua, value: Value| {
        let value: serde_json::Value = lua.from_value(value)?;
        serde_json::to_string(&value).map_err(LuaError::external)
    })?)?;

    json.raw_set("decode", lua.create_function(|lua, args: MultiValue| {
        let text = Args::new(args).require_string()?;
        let value: serde_json::Value = serde_json::from_str(&text).map_err(LuaError::external)?;
        marshal::to_lua(lua, &value)
    })?)?;

    Ok(json)
}

fn module_path(base_dir: &Path, name: &str) -> PathBuf {
    if name.ends_with(SCRIPT_EXTENSION) {
        base_dir.join(name)
    } else {
        base_dir.join(format!("{name}{SCRIPT_EXTENSION}"))
    }
}

/// Run a module in a fresh environment and hand that environment back.
/// The module's own `require` resolves relative to the module's directory.
fn require(lua: &Lua, host: &Arc<Host>, base_dir: &Path, name: &str) -> mlua::Result<Table> {
    let path = module_path(base_dir, name);
    let source = std::fs::read_to_string(&path).map_err(|e| {
        LuaError::runtime(format!("cannot require '{}': {}", path.display(), e))
    })?;

    let module_dir = path.parent().unwrap_or(base_dir);
    let module_env = environment(lua, host, module_dir)?;

    lua.load(source)
        .set_name(chunk_name(&path))
        .set_environment(module_env.clone())
        .exec()?;

    Ok(module_env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::FakeEngine;
    use crate::lua::Sandbox;
    use serial_test::serial;

    fn sandbox_in(dir: &Path) -> Sandbox {
        let host = Host::new(Arc::new(FakeEngine::default()), true);
        Sandbox::new(host, dir).expect("Failed to create sandbox")
    }

    #[test]
    fn test_module_path_appends_extension() {
        let base = Path::new("/p");
        assert_eq!(module_path(base, "lib"), PathBuf::from("/p/lib.lua"));
        assert_eq!(module_path(base, "lib.lua"), PathBuf::from("/p/lib.lua"));
        assert_eq!(module_path(base, "sub/lib"), PathBuf::from("/p/sub/lib.lua"));
    }

    #[test]
    fn test_require_returns_module_environment() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("helpers.lua"),
            "greeting = 'hi'\nfunction greet(who) return greeting .. ' ' .. who end\n",
        )
        .unwrap();

        let sb = sandbox_in(dir.path());
        let out: String = sb
            .eval("local h = require('helpers') return h.greet('there')")
            .unwrap();
        assert_eq!(out, "hi there");

        // module globals stay in the module
        let leaked: Value = sb.eval("return greeting").unwrap();
        assert!(matches!(leaked, Value::Nil));
    }

    #[test]
    fn test_require_does_not_see_importer_globals() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("probe.lua"), "seen = secret ~= nil\n").unwrap();

        let sb = sandbox_in(dir.path());
        let seen: bool = sb.eval("secret = 1 return require('probe.lua').seen").unwrap();
        assert!(!seen);
    }

    #[test]
    fn test_require_nested_resolves_from_module_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("lib")).unwrap();
        std::fs::write(dir.path().join("lib/outer.lua"), "inner = require('inner')\n").unwrap();
        std::fs::write(dir.path().join("lib/inner.lua"), "value = 7\n").unwrap();

        let sb = sandbox_in(dir.path());
        let value: i64 = sb.eval("return require('lib/outer').inner.value").unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_require_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let sb = sandbox_in(dir.path());
        let err = sb.exec("require('nope')").unwrap_err().to_string();
        assert!(err.contains("cannot require"), "got: {}", err);
        assert!(err.contains("nope.lua"), "got: {}", err);
    }

    #[test]
    fn test_require_rejects_non_string() {
        let sb = sandbox_in(Path::new("."));
        let err = sb.exec("require(42)").unwrap_err().to_string();
        assert!(err.contains("string expected, got number"), "got: {}", err);
    }

    #[test]
    #[serial]
    fn test_env_round_trip() {
        let sb = sandbox_in(Path::new("."));
        sb.exec("os.setEnv('DOCKSCRIPT_TEST_VAR', 'on')").unwrap();
        assert_eq!(std::env::var("DOCKSCRIPT_TEST_VAR").unwrap(), "on");

        let value: String = sb.eval("return os.getEnv('DOCKSCRIPT_TEST_VAR')").unwrap();
        assert_eq!(value, "on");
        std::env::remove_var("DOCKSCRIPT_TEST_VAR");

        let unset: String = sb.eval("return os.getEnv('DOCKSCRIPT_TEST_VAR')").unwrap();
        assert_eq!(unset, "");
    }

    #[test]
    fn test_set_env_rejects_bad_arguments() {
        let sb = sandbox_in(Path::new("."));
        assert!(sb.exec("os.setEnv('A=B', 'x')").is_err());
        assert!(sb.exec("os.setEnv('ONLY_NAME')").is_err());
        assert!(sb.exec("os.setEnv('NAME', 1)").is_err());
    }

    #[test]
    fn test_username_and_home() {
        let sb = sandbox_in(Path::new("."));
        let name: String = sb.eval("return os.username()").unwrap();
        assert!(!name.is_empty());

        if let Some(home) = dirs::home_dir() {
            let lua_home: String = sb.eval("return os.home()").unwrap();
            assert_eq!(lua_home, home.display().to_string());
        }
    }

    #[test]
    fn test_json_round_trip() {
        let sb = sandbox_in(Path::new("."));
        let encoded: String = sb.eval(r#"return json.encode({name = "web", ports = {80, 443}})"#).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(parsed["name"], "web");
        assert_eq!(parsed["ports"][1], 443);

        let port: i64 = sb.eval(r#"return json.decode('{"ports": [80, 443]}').ports[2]"#).unwrap();
        assert_eq!(port, 443);
    }

    #[test]
    fn test_json_rejects_functions() {
        let sb = sandbox_in(Path::new("."));
        assert!(sb.exec("json.encode({f = print})").is_err());
    }
}
