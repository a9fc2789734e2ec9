//! The function library available to `eval`/`calculate`/`compute` and to
//! operand positions inside `filter`/`where`.
//!
//! `filter`/`where` only documents a small subset (`abs, len, lower, upper,
//! round, floor, ceil, sqrt`) but there's no reason the richer `eval` library
//! shouldn't also be reachable from a filter predicate — both go through the
//! same [`super::eval_expr`], so this module is the single source of truth.

use chrono::NaiveDateTime;
use regex::Regex;

use crate::error::Error;
use crate::eval::time;
use crate::table::Value;

pub fn call(name: &str, args: &[Value]) -> Result<Value, Error> {
    match name {
        // math
        "abs" => unary_num(name, args, f64::abs),
        "ceil" => unary_num(name, args, f64::ceil),
        "floor" => unary_num(name, args, f64::floor),
        "round" => unary_num(name, args, |n| n.round()),
        "sqrt" => unary_num(name, args, f64::sqrt),
        "log" => unary_num(name, args, f64::ln),
        "log10" => unary_num(name, args, f64::log10),
        "exp" => unary_num(name, args, f64::exp),
        "pow" => binary_num(name, args, f64::powf),

        // string
        "lower" => unary_str(name, args, |s| s.to_lowercase()),
        "upper" => unary_str(name, args, |s| s.to_uppercase()),
        "trim" => unary_str(name, args, |s| s.trim().to_string()),
        "ltrim" => unary_str(name, args, |s| s.trim_start().to_string()),
        "rtrim" => unary_str(name, args, |s| s.trim_end().to_string()),
        "len" => {
            let s = arg_str(name, args, 0)?;
            Ok(Value::Number(s.chars().count() as f64))
        }
        "substr" => substr(name, args),
        "replace" => {
            let s = arg_str(name, args, 0)?;
            let old = arg_str(name, args, 1)?;
            let new = arg_str(name, args, 2)?;
            Ok(Value::String(s.replace(&old, &new)))
        }
        "split" => split(name, args),

        // date
        "year" | "month" | "day" | "hour" | "minute" | "second" | "dayofweek" => date_part(name, args),
        "now" => Ok(Value::DateTime(time::now())),
        "strftime" => strftime(name, args),
        "strptime" => strptime(name, args),

        // conversion
        "tonumber" => {
            let v = arg(name, args, 0)?;
            Ok(v.as_number().map(Value::Number).unwrap_or(Value::Null))
        }
        "tostring" => {
            let v = arg(name, args, 0)?;
            Ok(Value::String(v.as_str_repr()))
        }
        "todate" => {
            let v = arg(name, args, 0)?;
            match v.as_datetime() {
                Some(dt) => Ok(Value::DateTime(dt)),
                None => Ok(Value::Null),
            }
        }

        // null handling
        "isnull" => Ok(Value::Bool(arg(name, args, 0)?.is_null())),
        "isnotnull" => Ok(Value::Bool(!arg(name, args, 0)?.is_null())),
        "coalesce" => Ok(args.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null)),
        "nullif" => {
            let v = arg(name, args, 0)?;
            let other = arg(name, args, 1)?;
            if v == other {
                Ok(Value::Null)
            } else {
                Ok(v.clone())
            }
        }

        // conditionals
        "if" => {
            let cond = arg(name, args, 0)?;
            if cond.as_bool() {
                Ok(arg(name, args, 1)?.clone())
            } else {
                Ok(arg(name, args, 2)?.clone())
            }
        }
        "case" => case(args),

        // row-position predicate used by `in(field, a, b, ...)` emitted by
        // the parser for `field IN (a, b, ...)`.
        "in" => {
            let needle = arg(name, args, 0)?;
            Ok(Value::Bool(args[1..].iter().any(|v| v == needle)))
        }
        "like" => like(name, args),

        other => Err(Error::semantic(format!("unknown function `{other}`"))),
    }
}

fn arg<'a>(name: &str, args: &'a [Value], idx: usize) -> Result<&'a Value, Error> {
    args.get(idx)
        .ok_or_else(|| Error::semantic(format!("`{name}` expects at least {} argument(s)", idx + 1)))
}

fn arg_str(name: &str, args: &[Value], idx: usize) -> Result<String, Error> {
    Ok(arg(name, args, idx)?.as_str_repr())
}

fn unary_num(name: &str, args: &[Value], f: impl Fn(f64) -> f64) -> Result<Value, Error> {
    let v = arg(name, args, 0)?;
    match v.as_number() {
        Some(n) => Ok(Value::Number(f(n))),
        None => Ok(Value::Null),
    }
}

fn binary_num(name: &str, args: &[Value], f: impl Fn(f64, f64) -> f64) -> Result<Value, Error> {
    let a = arg(name, args, 0)?.as_number();
    let b = arg(name, args, 1)?.as_number();
    match (a, b) {
        (Some(a), Some(b)) => Ok(Value::Number(f(a, b))),
        _ => Ok(Value::Null),
    }
}

fn unary_str(name: &str, args: &[Value], f: impl Fn(&str) -> String) -> Result<Value, Error> {
    let s = arg_str(name, args, 0)?;
    Ok(Value::String(f(&s)))
}

fn substr(name: &str, args: &[Value]) -> Result<Value, Error> {
    let s = arg_str(name, args, 0)?;
    let chars: Vec<char> = s.chars().collect();
    let start = arg(name, args, 1)?.as_number().unwrap_or(1.0) as i64;
    let start_idx = (start.max(1) - 1) as usize;
    if start_idx >= chars.len() {
        return Ok(Value::String(String::new()));
    }
    let end_idx = match args.get(2).and_then(Value::as_number) {
        Some(len) => (start_idx + len.max(0.0) as usize).min(chars.len()),
        None => chars.len(),
    };
    Ok(Value::String(chars[start_idx..end_idx].iter().collect()))
}

fn split(name: &str, args: &[Value]) -> Result<Value, Error> {
    let s = arg_str(name, args, 0)?;
    let sep = arg_str(name, args, 1)?;
    let idx = arg(name, args, 2)?.as_number().unwrap_or(0.0) as i64;
    let parts: Vec<&str> = if sep.is_empty() { s.split_whitespace().collect() } else { s.split(sep.as_str()).collect() };
    let resolved = if idx < 0 { parts.len() as i64 + idx } else { idx };
    match usize::try_from(resolved).ok().and_then(|i| parts.get(i)) {
        Some(part) => Ok(Value::String(part.to_string())),
        None => Ok(Value::Null),
    }
}

fn require_datetime(name: &str, args: &[Value], idx: usize) -> Result<NaiveDateTime, Error> {
    arg(name, args, idx)?
        .as_datetime()
        .ok_or_else(|| Error::semantic(format!("`{name}` expects a datetime-coercible argument")))
}

fn date_part(name: &str, args: &[Value]) -> Result<Value, Error> {
    let dt = require_datetime(name, args, 0)?;
    let n = match name {
        "year" => time::year(dt),
        "month" => time::month(dt),
        "day" => time::day(dt),
        "hour" => time::hour(dt),
        "minute" => time::minute(dt),
        "second" => time::second(dt),
        "dayofweek" => time::dayofweek(dt),
        _ => unreachable!(),
    };
    Ok(Value::Number(n as f64))
}

fn strftime(name: &str, args: &[Value]) -> Result<Value, Error> {
    let dt = require_datetime(name, args, 0)?;
    let fmt = arg_str(name, args, 1)?;
    Ok(Value::String(dt.format(&fmt).to_string()))
}

fn strptime(name: &str, args: &[Value]) -> Result<Value, Error> {
    let s = arg_str(name, args, 0)?;
    let fmt = arg_str(name, args, 1)?;
    match NaiveDateTime::parse_from_str(&s, &fmt) {
        Ok(dt) => Ok(Value::DateTime(dt)),
        Err(_) => Ok(Value::Null),
    }
}

/// `%` matches any run of characters, `_` matches exactly one, anchored at
/// both ends. Case-sensitive, matching the source implementation's behavior
/// — this is the open question's resolution (see DESIGN.md).
fn like_to_regex(pattern: &str) -> String {
    const REGEX_META: &str = r".+*?()|[]{}^$\";
    let mut out = String::from("^");
    for c in pattern.chars() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            c if REGEX_META.contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');
    out
}

fn like(name: &str, args: &[Value]) -> Result<Value, Error> {
    let s = arg_str(name, args, 0)?;
    let pattern = arg_str(name, args, 1)?;
    let re = Regex::new(&like_to_regex(&pattern))
        .map_err(|e| Error::semantic(format!("invalid LIKE pattern `{pattern}`: {e}")))?;
    Ok(Value::Bool(re.is_match(&s)))
}

/// `case(c1, v1, c2, v2, ..., default)`: the first matching condition wins;
/// an odd-length tail is the default, used when no condition matches; with
/// no default, the result is `Null`. This is the contract picked for the
/// open question around `case`'s `1=1`-as-otherwise idiom (see DESIGN.md).
fn case(args: &[Value]) -> Result<Value, Error> {
    let has_default = args.len() % 2 == 1;
    let pairs_len = if has_default { args.len() - 1 } else { args.len() };
    let mut i = 0;
    while i + 1 < pairs_len {
        if args[i].as_bool() {
            return Ok(args[i + 1].clone());
        }
        i += 2;
    }
    if has_default {
        Ok(args[args.len() - 1].clone())
    } else {
        Ok(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_translates_percent_and_underscore_wildcards() {
        assert_eq!(
            call("like", &[Value::String("hello world".into()), Value::String("hello%".into())]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            call("like", &[Value::String("hello world".into()), Value::String("h_llo%".into())]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            call("like", &[Value::String("goodbye".into()), Value::String("hello%".into())]).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn case_picks_the_first_matching_condition() {
        let args =
            vec![Value::Bool(false), Value::String("a".into()), Value::Bool(true), Value::String("b".into()), Value::String("default".into())];
        assert_eq!(case(&args).unwrap(), Value::String("b".into()));
    }

    #[test]
    fn case_falls_back_to_the_trailing_default_when_nothing_matches() {
        let args = vec![Value::Bool(false), Value::String("a".into()), Value::String("default".into())];
        assert_eq!(case(&args).unwrap(), Value::String("default".into()));
    }

    #[test]
    fn case_with_no_default_and_no_match_is_null() {
        let args = vec![Value::Bool(false), Value::String("a".into())];
        assert_eq!(case(&args).unwrap(), Value::Null);
    }

    #[test]
    fn substr_is_one_indexed_and_clamps_length() {
        assert_eq!(substr("substr", &[Value::String("hello".into()), Value::Number(2.0), Value::Number(100.0)]).unwrap(), Value::String("ello".into()));
    }

    #[test]
    fn split_supports_negative_indices_from_the_end() {
        assert_eq!(
            split("split", &[Value::String("a,b,c".into()), Value::String(",".into()), Value::Number(-1.0)]).unwrap(),
            Value::String("c".into())
        );
    }

    #[test]
    fn coalesce_returns_the_first_non_null_argument() {
        assert_eq!(call("coalesce", &[Value::Null, Value::Null, Value::Number(7.0)]).unwrap(), Value::Number(7.0));
    }

    #[test]
    fn unknown_function_name_is_a_semantic_error() {
        assert!(call("not_a_function", &[]).is_err());
    }
}
