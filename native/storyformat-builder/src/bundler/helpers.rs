//! Built-in modules that never exist on disk.
//!
//! Lowered classes, object spread and async functions import their helpers
//! from `@oxc-project/runtime/helpers/<name>`. Those imports are served from
//! the table below so a bundle never depends on the runtime package being
//! installed. A `browser` field that maps a module to `false` is served as an
//! empty module.

use std::path::{Path, PathBuf};

const RUNTIME_PREFIX: &str = "@oxc-project/runtime/helpers/";
const VIRTUAL_ROOT: &str = "<virtual>";
const HELPER_DIR: &str = "oxc-runtime";
const IGNORED: &str = "ignored.js";

/// Virtual path standing in for a `browser: false` module.
pub(crate) fn ignored_path() -> PathBuf {
    Path::new(VIRTUAL_ROOT).join(IGNORED)
}

/// True for any path produced by this module.
pub(crate) fn is_virtual(path: &Path) -> bool {
    path.starts_with(VIRTUAL_ROOT)
}

/// Virtual path for a runtime helper specifier, if this build can serve it.
pub(crate) fn helper_path(specifier: &str) -> Option<PathBuf> {
    let name = specifier.strip_prefix(RUNTIME_PREFIX)?;
    let name = name.strip_suffix(".js").unwrap_or(name);
    helper_source(name)?;
    Some(
        Path::new(VIRTUAL_ROOT)
            .join(HELPER_DIR)
            .join(format!("{name}.js")),
    )
}

/// Contents of a virtual module, or `None` for a real file.
pub(crate) fn virtual_source(path: &Path) -> Option<&'static str> {
    let rest = path.strip_prefix(VIRTUAL_ROOT).ok()?;
    if rest == Path::new(IGNORED) {
        return Some("");
    }
    let name = rest.strip_prefix(HELPER_DIR).ok()?.file_stem()?.to_str()?;
    helper_source(name)
}

fn helper_source(name: &str) -> Option<&'static str> {
    HELPERS
        .iter()
        .find(|(helper, _)| *helper == name)
        .map(|(_, source)| *source)
}

/// `(name, source)`: the body must declare `$func`, which becomes the export.
macro_rules! helper {
    ($name:literal, $func:literal, $body:literal) => {
        (
            $name,
            concat!(
                $body,
                "\nmodule.exports = ",
                $func,
                ";\nmodule.exports.default = module.exports;\n"
            ),
        )
    };
}

const HELPERS: &[(&str, &str)] = &[
    helper!(
        "typeof",
        "_typeof",
        r#"function _typeof(o) {
  return o !== null && typeof Symbol === "function" && o.constructor === Symbol && o !== Symbol.prototype ? "symbol" : typeof o;
}"#
    ),
    helper!(
        "toPrimitive",
        "toPrimitive",
        r#"function toPrimitive(t, r) {
  if (typeof t !== "object" || t === null) return t;
  var e = t[Symbol.toPrimitive];
  if (e !== undefined) {
    var i = e.call(t, r || "default");
    if (typeof i !== "object") return i;
    throw new TypeError("@@toPrimitive must return a primitive value.");
  }
  return (r === "string" ? String : Number)(t);
}"#
    ),
    helper!(
        "toPropertyKey",
        "toPropertyKey",
        r#"var toPrimitive = require("@oxc-project/runtime/helpers/toPrimitive");
function toPropertyKey(t) {
  var i = toPrimitive(t, "string");
  return typeof i === "symbol" ? i : i + "";
}"#
    ),
    helper!(
        "defineProperty",
        "defineProperty",
        r#"var toPropertyKey = require("@oxc-project/runtime/helpers/toPropertyKey");
function defineProperty(e, r, t) {
  r = toPropertyKey(r);
  if (r in e) {
    Object.defineProperty(e, r, { value: t, enumerable: true, configurable: true, writable: true });
  } else {
    e[r] = t;
  }
  return e;
}"#
    ),
    helper!(
        "checkPrivateRedeclaration",
        "checkPrivateRedeclaration",
        r#"function checkPrivateRedeclaration(e, t) {
  if (t.has(e)) throw new TypeError("Cannot initialize the same private elements twice on an object");
}"#
    ),
    helper!(
        "classPrivateFieldInitSpec",
        "classPrivateFieldInitSpec",
        r#"var checkPrivateRedeclaration = require("@oxc-project/runtime/helpers/checkPrivateRedeclaration");
function classPrivateFieldInitSpec(e, t, a) {
  checkPrivateRedeclaration(e, t);
  t.set(e, a);
}"#
    ),
    helper!(
        "classPrivateMethodInitSpec",
        "classPrivateMethodInitSpec",
        r#"var checkPrivateRedeclaration = require("@oxc-project/runtime/helpers/checkPrivateRedeclaration");
function classPrivateMethodInitSpec(e, a) {
  checkPrivateRedeclaration(e, a);
  a.add(e);
}"#
    ),
    helper!(
        "assertClassBrand",
        "assertClassBrand",
        r#"function assertClassBrand(e, t, n) {
  if (typeof e === "function" ? e === t : e.has(t)) return arguments.length < 3 ? t : n;
  throw new TypeError("Private element is not present on this object");
}"#
    ),
    helper!(
        "classPrivateFieldGet2",
        "classPrivateFieldGet2",
        r#"var assertClassBrand = require("@oxc-project/runtime/helpers/assertClassBrand");
function classPrivateFieldGet2(s, a) {
  return s.get(assertClassBrand(s, a));
}"#
    ),
    helper!(
        "classPrivateFieldSet2",
        "classPrivateFieldSet2",
        r#"var assertClassBrand = require("@oxc-project/runtime/helpers/assertClassBrand");
function classPrivateFieldSet2(s, a, r) {
  s.set(assertClassBrand(s, a), r);
  return r;
}"#
    ),
    helper!(
        "classPrivateFieldLooseKey",
        "classPrivateFieldLooseKey",
        r#"var id = 0;
function classPrivateFieldLooseKey(e) {
  return "__private_" + id++ + "_" + e;
}"#
    ),
    helper!(
        "classPrivateFieldLooseBase",
        "classPrivateFieldLooseBase",
        r#"function classPrivateFieldLooseBase(e, t) {
  if (!Object.prototype.hasOwnProperty.call(e, t)) throw new TypeError("attempted to use private field on non-instance");
  return e;
}"#
    ),
    helper!(
        "checkInRHS",
        "checkInRHS",
        r#"function checkInRHS(e) {
  if (Object(e) !== e) throw new TypeError("right-hand side of 'in' should be an object, got " + (e !== null ? typeof e : "null"));
  return e;
}"#
    ),
    helper!(
        "toSetter",
        "toSetter",
        r#"function toSetter(t, e, n) {
  e || (e = []);
  var r = e.length++;
  return Object.defineProperty({}, "_", { set: function (o) { e[r] = o; t.apply(n, e); } });
}"#
    ),
    helper!(
        "readOnlyError",
        "readOnlyError",
        r#"function readOnlyError(r) {
  throw new TypeError('"' + r + '" is read-only');
}"#
    ),
    helper!(
        "writeOnlyError",
        "writeOnlyError",
        r#"function writeOnlyError(r) {
  throw new TypeError('"' + r + '" is write-only');
}"#
    ),
    helper!(
        "getPrototypeOf",
        "getPrototypeOf",
        r#"function getPrototypeOf(t) {
  return Object.getPrototypeOf(t);
}"#
    ),
    helper!(
        "superPropBase",
        "superPropBase",
        r#"var getPrototypeOf = require("@oxc-project/runtime/helpers/getPrototypeOf");
function superPropBase(t, o) {
  while (!Object.prototype.hasOwnProperty.call(t, o) && (t = getPrototypeOf(t)) !== null);
  return t;
}"#
    ),
    helper!(
        "get",
        "get",
        r#"function get(e, t, r) {
  return arguments.length < 3 ? Reflect.get(e, t) : Reflect.get(e, t, r);
}"#
    ),
    helper!(
        "set",
        "set",
        r#"function set(e, t, r, o, f) {
  if (!Reflect.set(e, t, r, o) && f) throw new TypeError("failed to set property");
  return r;
}"#
    ),
    helper!(
        "superPropGet",
        "superPropGet",
        r#"var get = require("@oxc-project/runtime/helpers/get");
var getPrototypeOf = require("@oxc-project/runtime/helpers/getPrototypeOf");
function superPropGet(t, o, e, r) {
  var p = get(getPrototypeOf(1 & r ? t.prototype : t), o, e);
  return 2 & r && typeof p === "function" ? function (a) { return p.apply(e, a); } : p;
}"#
    ),
    helper!(
        "superPropSet",
        "superPropSet",
        r#"var set = require("@oxc-project/runtime/helpers/set");
var getPrototypeOf = require("@oxc-project/runtime/helpers/getPrototypeOf");
function superPropSet(t, e, o, r, p, f) {
  return set(getPrototypeOf(f ? t.prototype : t), e, o, r, p);
}"#
    ),
    helper!(
        "extends",
        "_extends",
        r#"function _extends() {
  return Object.assign.apply(Object, arguments);
}"#
    ),
    helper!(
        "objectSpread2",
        "objectSpread2",
        r#"var defineProperty = require("@oxc-project/runtime/helpers/defineProperty");
function ownKeys(e, r) {
  var t = Object.keys(e);
  if (Object.getOwnPropertySymbols) {
    var o = Object.getOwnPropertySymbols(e);
    if (r) o = o.filter(function (k) { return Object.getOwnPropertyDescriptor(e, k).enumerable; });
    t.push.apply(t, o);
  }
  return t;
}
function objectSpread2(e) {
  for (var r = 1; r < arguments.length; r++) {
    var t = arguments[r] != null ? arguments[r] : {};
    if (r % 2) {
      ownKeys(Object(t), true).forEach(function (k) { defineProperty(e, k, t[k]); });
    } else {
      Object.defineProperties(e, Object.getOwnPropertyDescriptors(t));
    }
  }
  return e;
}"#
    ),
    helper!(
        "objectWithoutPropertiesLoose",
        "objectWithoutPropertiesLoose",
        r#"function objectWithoutPropertiesLoose(r, e) {
  if (r == null) return {};
  var t = {};
  for (var n in r) {
    if (Object.prototype.hasOwnProperty.call(r, n)) {
      if (e.indexOf(n) !== -1) continue;
      t[n] = r[n];
    }
  }
  return t;
}"#
    ),
    helper!(
        "objectWithoutProperties",
        "objectWithoutProperties",
        r#"var objectWithoutPropertiesLoose = require("@oxc-project/runtime/helpers/objectWithoutPropertiesLoose");
function objectWithoutProperties(e, t) {
  if (e == null) return {};
  var i = objectWithoutPropertiesLoose(e, t);
  if (Object.getOwnPropertySymbols) {
    var n = Object.getOwnPropertySymbols(e);
    for (var r = 0; r < n.length; r++) {
      var o = n[r];
      if (t.indexOf(o) === -1 && Object.prototype.propertyIsEnumerable.call(e, o)) i[o] = e[o];
    }
  }
  return i;
}"#
    ),
    helper!(
        "objectDestructuringEmpty",
        "objectDestructuringEmpty",
        r#"function objectDestructuringEmpty(t) {
  if (t == null) throw new TypeError("Cannot destructure " + t);
}"#
    ),
    helper!(
        "asyncToGenerator",
        "asyncToGenerator",
        r#"function asyncGeneratorStep(n, t, e, r, o, a, c) {
  try {
    var i = n[a](c), u = i.value;
  } catch (err) {
    e(err);
    return;
  }
  if (i.done) t(u);
  else Promise.resolve(u).then(r, o);
}
function asyncToGenerator(n) {
  return function () {
    var t = this, e = arguments;
    return new Promise(function (r, o) {
      var a = n.apply(t, e);
      function next(v) { asyncGeneratorStep(a, r, o, next, thrown, "next", v); }
      function thrown(v) { asyncGeneratorStep(a, r, o, next, thrown, "throw", v); }
      next(undefined);
    });
  };
}"#
    ),
    helper!(
        "taggedTemplateLiteral",
        "taggedTemplateLiteral",
        r#"function taggedTemplateLiteral(e, t) {
  if (!t) t = e.slice(0);
  return Object.freeze(Object.defineProperties(e, { raw: { value: Object.freeze(t) } }));
}"#
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_specifiers_map_to_virtual_paths() {
        let path = helper_path("@oxc-project/runtime/helpers/defineProperty").unwrap();
        assert!(is_virtual(&path));
        let source = virtual_source(&path).unwrap();
        assert!(source.contains("function defineProperty(e, r, t)"));
        assert!(source.ends_with("module.exports.default = module.exports;\n"));
        assert_eq!(
            helper_path("@oxc-project/runtime/helpers/defineProperty.js"),
            Some(path)
        );
    }

    #[test]
    fn test_unknown_helpers_and_real_files() {
        assert_eq!(helper_path("@oxc-project/runtime/helpers/decorate"), None);
        assert_eq!(helper_path("./defineProperty"), None);
        assert_eq!(virtual_source(Path::new("/src/index.ts")), None);
        assert!(!is_virtual(Path::new("/src/index.ts")));
        assert_eq!(virtual_source(&ignored_path()), Some(""));
    }

    #[test]
    fn test_every_helper_exports_a_declared_function() {
        for (name, source) in HELPERS {
            let (_, tail) = source.rsplit_once("\nmodule.exports = ").unwrap();
            let func = tail.split(';').next().unwrap();
            assert!(source.contains(&format!("function {func}(")), "{name}");
        }
    }
}
