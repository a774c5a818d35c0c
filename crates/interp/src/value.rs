use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::ast::FunctionDef;
use crate::error::{ErrorKind, RuntimeError};

/// Nesting depth past which list comparison raises `RecursionError` and `repr`
/// abbreviates to `[...]`.
pub const MAX_NESTING: usize = 200;

/// Storage of a list value.
#[derive(Debug)]
pub struct ListCell(Mutex<Vec<Value>>);

/// Dropping a deeply nested list tears it down with a work list instead of recursing.
impl Drop for ListCell {
    fn drop(&mut self) {
        let mut pending = std::mem::take(self.0.get_mut().unwrap_or_else(PoisonError::into_inner));
        while let Some(value) = pending.pop() {
            if let Value::List(list) = value {
                if let Ok(mut cell) = Arc::try_unwrap(list) {
                    pending.append(cell.0.get_mut().unwrap_or_else(PoisonError::into_inner));
                }
            }
        }
    }
}

pub type ListRef = Arc<ListCell>;

pub(crate) fn lock_list(list: &ListRef) -> MutexGuard<'_, Vec<Value>> {
    list.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Snapshot of a list's items; the lock is released before returning.
pub(crate) fn list_items(list: &ListRef) -> Vec<Value> {
    lock_list(list).clone()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    Print,
    Input,
    Len,
    Str,
    Int,
    Float,
    Repr,
    Abs,
    Range,
    Type,
    Restart,
}

impl Builtin {
    pub const ALL: [Builtin; 11] = [
        Builtin::Print,
        Builtin::Input,
        Builtin::Len,
        Builtin::Str,
        Builtin::Int,
        Builtin::Float,
        Builtin::Repr,
        Builtin::Abs,
        Builtin::Range,
        Builtin::Type,
        Builtin::Restart,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Input => "input",
            Builtin::Len => "len",
            Builtin::Str => "str",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Repr => "repr",
            Builtin::Abs => "abs",
            Builtin::Range => "range",
            Builtin::Type => "type",
            Builtin::Restart => "restart",
        }
    }

    /// Builtins available in every namespace. `restart` is seeded per namespace instead.
    pub fn lookup(name: &str) -> Option<Builtin> {
        Builtin::ALL
            .into_iter()
            .find(|b| *b != Builtin::Restart && b.name() == name)
    }
}

#[derive(Clone, Debug)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(ListRef),
    Range { start: i64, stop: i64, step: i64 },
    Function(Arc<FunctionDef>),
    Builtin(Builtin),
    /// Method looked up on a value, waiting to be called.
    Method(Box<Value>, Arc<str>),
    Type(&'static str),
    /// Framework handle seeded into isolated namespaces.
    Handle { session: Arc<str> },
}

impl Value {
    pub fn str(s: impl Into<Arc<str>>) -> Value {
        Value::Str(s.into())
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Arc::new(ListCell(Mutex::new(items))))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Range { .. } => "range",
            Value::Function(_) => "function",
            Value::Builtin(Builtin::Int | Builtin::Str | Builtin::Float) | Value::Type(_) => "type",
            Value::Builtin(_) | Value::Method(..) => "builtin_function_or_method",
            Value::Handle { .. } => "tutor",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !lock_list(l).is_empty(),
            Value::Range { start, stop, step } => range_len(*start, *stop, *step) > 0,
            _ => true,
        }
    }

    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out, &mut Vec::new());
        out
    }

    /// `str()` form: strings unquoted, everything else as `repr`.
    pub fn display(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            other => other.repr(),
        }
    }

    fn write_repr(&self, out: &mut String, seen: &mut Vec<*const ListCell>) {
        match self {
            Value::None => out.push_str("None"),
            Value::Bool(true) => out.push_str("True"),
            Value::Bool(false) => out.push_str("False"),
            Value::Int(i) => out.push_str(&i.to_string()),
            Value::Float(f) => out.push_str(&format_float(*f)),
            Value::Str(s) => out.push_str(&quote_str(s)),
            Value::List(list) => {
                let ptr = Arc::as_ptr(list);
                if seen.len() >= MAX_NESTING || seen.contains(&ptr) {
                    out.push_str("[...]");
                    return;
                }
                seen.push(ptr);
                out.push('[');
                for (i, item) in list_items(list).iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_repr(out, seen);
                }
                out.push(']');
                seen.pop();
            }
            Value::Range { start, stop, step } => {
                if *step == 1 {
                    out.push_str(&format!("range({start}, {stop})"));
                } else {
                    out.push_str(&format!("range({start}, {stop}, {step})"));
                }
            }
            Value::Function(def) => out.push_str(&format!("<function {}>", def.name)),
            Value::Builtin(b @ (Builtin::Int | Builtin::Str | Builtin::Float)) => {
                out.push_str(&format!("<class '{}'>", b.name()))
            }
            Value::Builtin(b) => out.push_str(&format!("<built-in function {}>", b.name())),
            Value::Method(recv, name) => out.push_str(&format!(
                "<built-in method {name} of {} object>",
                recv.type_name()
            )),
            Value::Type(name) => out.push_str(&format!("<class '{name}'>")),
            Value::Handle { session } => out.push_str(&format!("<tutor session {session}>")),
        }
    }

    /// Iteration snapshot for `for`, `in` and list conversion.
    pub fn iter_items(&self) -> Result<Vec<Value>, RuntimeError> {
        match self {
            Value::List(l) => Ok(list_items(l)),
            Value::Str(s) => Ok(s.chars().map(|c| Value::str(c.to_string())).collect()),
            Value::Range { start, stop, step } => {
                let len = range_len(*start, *stop, *step);
                if len > MAX_MATERIALIZED {
                    return Err(RuntimeError::new(ErrorKind::OverflowError, "range too large"));
                }
                Ok((0..len).map(|i| Value::Int(start + i * step)).collect())
            }
            other => Err(RuntimeError::new(
                ErrorKind::TypeError,
                format!("'{}' object is not iterable", other.type_name()),
            )),
        }
    }
}

/// Upper bound on items produced by a single range or repetition.
pub const MAX_MATERIALIZED: i64 = 10_000_000;

pub fn range_len(start: i64, stop: i64, step: i64) -> i64 {
    let (lo, hi, step) = if step > 0 {
        (start as i128, stop as i128, step as i128)
    } else {
        (stop as i128, start as i128, -(step as i128))
    };
    if hi <= lo {
        0
    } else {
        (((hi - lo) + step - 1) / step).min(i64::MAX as i128) as i64
    }
}

impl Value {
    /// `==` for the language. Lists compare item by item; nesting deeper than
    /// [`MAX_NESTING`] raises `RecursionError`.
    pub fn equals(&self, other: &Value) -> Result<bool, RuntimeError> {
        self.equals_at(other, 0)
    }

    fn equals_at(&self, other: &Value, depth: usize) -> Result<bool, RuntimeError> {
        let (Value::List(a), Value::List(b)) = (self, other) else {
            return Ok(self.scalar_eq(other));
        };
        if Arc::ptr_eq(a, b) {
            return Ok(true);
        }
        if depth >= MAX_NESTING {
            return Err(RuntimeError::new(
                ErrorKind::RecursionError,
                "maximum recursion depth exceeded in comparison",
            ));
        }
        let (a, b) = (list_items(a), list_items(b));
        if a.len() != b.len() {
            return Ok(false);
        }
        for (x, y) in a.iter().zip(&b) {
            if !x.equals_at(y, depth + 1)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn scalar_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(_), _) | (_, Value::List(_)) => false,
            (
                Value::Range { start, stop, step },
                Value::Range { start: s2, stop: e2, step: st2 },
            ) => {
                let (la, lb) = (range_len(*start, *stop, *step), range_len(*s2, *e2, *st2));
                la == lb && (la == 0 || (start == s2 && (la == 1 || step == st2)))
            }
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Builtin(b), Value::Type(t)) | (Value::Type(t), Value::Builtin(b)) => {
                b.name() == *t
            }
            (Value::Handle { session: a }, Value::Handle { session: b }) => a == b,
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a.eq_num(b),
                _ => false,
            },
        }
    }
}

/// Structural equality for host code and tests; too deeply nested lists compare unequal.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.equals(other).unwrap_or(false)
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn eq_num(self, other: Number) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            (a, b) => a.as_f64() == b.as_f64(),
        }
    }

    fn cmp_num(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

impl Value {
    /// Numeric view; bools count as integers.
    pub(crate) fn as_number(&self) -> Option<Number> {
        match self {
            Value::Bool(b) => Some(Number::Int(i64::from(*b))),
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    /// Ordering for `<`, `<=`, `>`, `>=`. `None` when the operands are unordered (NaN).
    pub fn compare(&self, other: &Value, op: &str) -> Result<Option<Ordering>, RuntimeError> {
        self.compare_at(other, op, 0)
    }

    fn compare_at(
        &self,
        other: &Value,
        op: &str,
        depth: usize,
    ) -> Result<Option<Ordering>, RuntimeError> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return Ok(a.cmp_num(b));
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
            (Value::List(a), Value::List(b)) => {
                if depth >= MAX_NESTING {
                    return Err(RuntimeError::new(
                        ErrorKind::RecursionError,
                        "maximum recursion depth exceeded in comparison",
                    ));
                }
                let (a, b) = (list_items(a), list_items(b));
                for (x, y) in a.iter().zip(&b) {
                    if !x.equals_at(y, depth + 1)? {
                        return x.compare_at(y, op, depth + 1);
                    }
                }
                Ok(Some(a.len().cmp(&b.len())))
            }
            _ => Err(RuntimeError::new(
                ErrorKind::TypeError,
                format!(
                    "'{op}' not supported between instances of '{}' and '{}'",
                    self.type_name(),
                    other.type_name()
                ),
            )),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Float text the way tutorial readers expect: `2.0`, `0.1`, `1e+16`, `inf`.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".into();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf".into() } else { "-inf".into() };
    }
    let abs = f.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        let s = format!("{f:e}");
        let (mantissa, exp) = s.split_once('e').unwrap_or((&s, "0"));
        let exp: i32 = exp.parse().unwrap_or(0);
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exp.abs());
    }
    if f.fract() == 0.0 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

fn quote_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32))
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}
