//! Tree-walking evaluator.
use std::collections::HashMap;
use std::sync::Arc;

use bus::Stream;

use crate::ast::{BinOp, CmpOp, Expr, FunctionDef, Program, Stmt, StmtKind, Target, UnaryOp};
use crate::error::{ErrorKind, Frame, RuntimeError};
use crate::namespace::Namespace;
use crate::value::{Builtin, MAX_MATERIALIZED, Value, list_items, lock_list, range_len};
use bus::Stdio;

/// Deepest user-function call stack.
pub const MAX_CALL_DEPTH: usize = 100;

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

struct Scope {
    function: String,
    locals: HashMap<String, Value>,
}

pub struct Interpreter<'a> {
    globals: &'a Namespace,
    io: &'a mut dyn Stdio,
    /// Console mode: module-level expression values are written back.
    echo: bool,
    scopes: Vec<Scope>,
}

type Eval<T> = Result<T, RuntimeError>;

fn type_error(message: impl Into<String>) -> RuntimeError {
    RuntimeError::new(ErrorKind::TypeError, message)
}

fn overflow() -> RuntimeError {
    RuntimeError::new(ErrorKind::OverflowError, "integer result too large")
}

impl<'a> Interpreter<'a> {
    pub fn new(globals: &'a Namespace, io: &'a mut dyn Stdio) -> Self {
        Interpreter {
            globals,
            io,
            echo: false,
            scopes: Vec::new(),
        }
    }

    pub fn echo_expressions(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn run(&mut self, program: &Program) -> Eval<()> {
        self.exec_block(&program.body).map(|_| ())
    }

    fn framed<T>(&self, line: usize, result: Eval<T>) -> Eval<T> {
        result.map_err(|mut err| {
            let function = self
                .scopes
                .last()
                .map_or_else(|| "<module>".to_string(), |s| s.function.clone());
            err.frames.insert(0, Frame { function, line });
            err
        })
    }

    fn eval_at(&mut self, expr: &Expr, line: usize) -> Eval<Value> {
        let result = self.eval(expr);
        self.framed(line, result)
    }

    fn exec_block(&mut self, body: &[Stmt]) -> Eval<Flow> {
        for stmt in body {
            match self.exec(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt) -> Eval<Flow> {
        let line = stmt.line;
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                let value = self.eval_at(expr, line)?;
                if self.echo && self.scopes.is_empty() && !matches!(value, Value::None) {
                    let text = format!("{}\n", value.repr());
                    self.io.write(Stream::Stdout, &text);
                }
            }
            StmtKind::Assign(target, expr) => {
                let value = self.eval_at(expr, line)?;
                let result = self.assign(target, value);
                self.framed(line, result)?;
            }
            StmtKind::AugAssign(target, op, expr) => {
                let result = self.aug_assign(target, *op, expr);
                self.framed(line, result)?;
            }
            StmtKind::If { branches, orelse } => {
                for (cond, body) in branches {
                    if self.eval_at(cond, line)?.truthy() {
                        return self.exec_block(body);
                    }
                }
                if let Some(body) = orelse {
                    return self.exec_block(body);
                }
            }
            StmtKind::While(cond, body) => {
                while self.eval_at(cond, line)?.truthy() {
                    match self.exec_block(body)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            StmtKind::For(name, iter, body) => {
                let items = self.eval_at(iter, line)?;
                let items = self.framed(line, items.iter_items())?;
                for item in items {
                    self.store(name, item);
                    match self.exec_block(body)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            StmtKind::Def(def) => self.store(&def.name, Value::Function(Arc::clone(def))),
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(e) => self.eval_at(e, line)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Pass => {}
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
        }
        Ok(Flow::Normal)
    }

    fn store(&mut self, name: &str, value: Value) {
        match self.scopes.last_mut() {
            Some(scope) => {
                scope.locals.insert(name.to_string(), value);
            }
            None => self.globals.set(name, value),
        }
    }

    fn load(&self, name: &str) -> Eval<Value> {
        if let Some(v) = self.scopes.last().and_then(|s| s.locals.get(name)) {
            return Ok(v.clone());
        }
        if let Some(v) = self.globals.get(name) {
            return Ok(v);
        }
        Builtin::lookup(name).map(Value::Builtin).ok_or_else(|| {
            RuntimeError::new(ErrorKind::NameError, format!("name '{name}' is not defined"))
        })
    }

    fn assign(&mut self, target: &Target, value: Value) -> Eval<()> {
        match target {
            Target::Name(name) => {
                self.store(name, value);
                Ok(())
            }
            Target::Index(obj, idx) => {
                let obj = self.eval(obj)?;
                let idx = self.eval(idx)?;
                match &obj {
                    Value::List(list) => {
                        let mut items = lock_list(list);
                        let i = normalize_index(&idx, items.len(), "list assignment")?;
                        items[i] = value;
                        Ok(())
                    }
                    other => Err(type_error(format!(
                        "'{}' object does not support item assignment",
                        other.type_name()
                    ))),
                }
            }
        }
    }

    fn aug_assign(&mut self, target: &Target, op: BinOp, expr: &Expr) -> Eval<()> {
        let current = match target {
            Target::Name(name) => self.load(name)?,
            Target::Index(obj, idx) => {
                let obj = self.eval(obj)?;
                let idx = self.eval(idx)?;
                index(&obj, &idx)?
            }
        };
        let rhs = self.eval(expr)?;
        if let (BinOp::Add, Value::List(list)) = (op, &current) {
            let extra = rhs.iter_items()?;
            lock_list(list).extend(extra);
            return Ok(());
        }
        let value = binary(op, &current, &rhs)?;
        self.assign(target, value)
    }

    fn eval(&mut self, expr: &Expr) -> Eval<Value> {
        match expr {
            Expr::None => Ok(Value::None),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::str(s.as_str())),
            Expr::List(items) => {
                let values = items
                    .iter()
                    .map(|e| self.eval(e))
                    .collect::<Eval<Vec<_>>>()?;
                Ok(Value::list(values))
            }
            Expr::Name(name) => self.load(name),
            Expr::Unary(op, operand) => {
                let v = self.eval(operand)?;
                unary(*op, &v)
            }
            Expr::Binary(op, lhs, rhs) => {
                let l = self.eval(lhs)?;
                let r = self.eval(rhs)?;
                binary(*op, &l, &r)
            }
            Expr::Compare(first, rest) => {
                let mut left = self.eval(first)?;
                for (op, rhs) in rest {
                    let right = self.eval(rhs)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::And(lhs, rhs) => {
                let l = self.eval(lhs)?;
                if l.truthy() { self.eval(rhs) } else { Ok(l) }
            }
            Expr::Or(lhs, rhs) => {
                let l = self.eval(lhs)?;
                if l.truthy() { Ok(l) } else { self.eval(rhs) }
            }
            Expr::Index(obj, idx) => {
                let obj = self.eval(obj)?;
                let idx = self.eval(idx)?;
                index(&obj, &idx)
            }
            Expr::Attr(obj, name) => {
                let obj = self.eval(obj)?;
                attribute(obj, name)
            }
            Expr::Call { func, args, kwargs } => {
                let callee = self.eval(func)?;
                let args = args
                    .iter()
                    .map(|e| self.eval(e))
                    .collect::<Eval<Vec<_>>>()?;
                let mut named = Vec::with_capacity(kwargs.len());
                for (name, e) in kwargs {
                    named.push((name.as_str(), self.eval(e)?));
                }
                self.call(callee, args, named)
            }
        }
    }

    fn call(&mut self, callee: Value, args: Vec<Value>, kwargs: Vec<(&str, Value)>) -> Eval<Value> {
        match callee {
            Value::Function(def) => self.call_function(&def, args, kwargs),
            Value::Builtin(b) => {
                if b != Builtin::Print
                    && let Some((name, _)) = kwargs.first()
                {
                    return Err(type_error(format!(
                        "{}() got an unexpected keyword argument '{name}'",
                        b.name()
                    )));
                }
                self.call_builtin(b, args, kwargs)
            }
            Value::Type(name) => Err(type_error(format!("cannot create '{name}' instances"))),
            Value::Method(receiver, name) => {
                if !kwargs.is_empty() {
                    return Err(type_error(format!("{name}() takes no keyword arguments")));
                }
                call_method(&receiver, &name, args)
            }
            other => Err(type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_function(
        &mut self,
        def: &FunctionDef,
        args: Vec<Value>,
        kwargs: Vec<(&str, Value)>,
    ) -> Eval<Value> {
        if self.scopes.len() >= MAX_CALL_DEPTH {
            return Err(RuntimeError::new(
                ErrorKind::RecursionError,
                "maximum recursion depth exceeded",
            ));
        }
        let name = &def.name;
        if args.len() > def.params.len() {
            return Err(type_error(format!(
                "{name}() takes {} positional argument{} but {} were given",
                def.params.len(),
                if def.params.len() == 1 { "" } else { "s" },
                args.len()
            )));
        }
        let mut locals: HashMap<String, Value> =
            def.params.iter().cloned().zip(args).collect();
        for (key, value) in kwargs {
            if !def.params.iter().any(|p| p == key) {
                return Err(type_error(format!(
                    "{name}() got an unexpected keyword argument '{key}'"
                )));
            }
            if locals.insert(key.to_string(), value).is_some() {
                return Err(type_error(format!(
                    "{name}() got multiple values for argument '{key}'"
                )));
            }
        }
        let missing: Vec<&String> = def.params.iter().filter(|p| !locals.contains_key(*p)).collect();
        if let Some(first) = missing.first() {
            return Err(type_error(format!(
                "{name}() missing {} required positional argument{}: '{first}'",
                missing.len(),
                if missing.len() == 1 { "" } else { "s" },
            )));
        }
        self.scopes.push(Scope {
            function: name.clone(),
            locals,
        });
        let flow = self.exec_block(&def.body);
        self.scopes.pop();
        match flow? {
            Flow::Return(v) => Ok(v),
            _ => Ok(Value::None),
        }
    }

    fn call_builtin(
        &mut self,
        builtin: Builtin,
        args: Vec<Value>,
        kwargs: Vec<(&str, Value)>,
    ) -> Eval<Value> {
        let name = builtin.name();
        let arity = |min: usize, max: usize| -> Eval<()> {
            if args.len() < min || args.len() > max {
                let expected = if min == max {
                    format!("exactly {min}")
                } else if args.len() < min {
                    format!("at least {min}")
                } else {
                    format!("at most {max}")
                };
                return Err(type_error(format!(
                    "{name}() takes {expected} argument{} ({} given)",
                    if min.max(max) == 1 { "" } else { "s" },
                    args.len()
                )));
            }
            Ok(())
        };
        match builtin {
            Builtin::Print => {
                let mut sep = " ".to_string();
                let mut end = "\n".to_string();
                for (key, value) in kwargs {
                    let slot = match key {
                        "sep" => &mut sep,
                        "end" => &mut end,
                        other => {
                            return Err(type_error(format!(
                                "'{other}' is an invalid keyword argument for print()"
                            )));
                        }
                    };
                    match value {
                        Value::None => {}
                        Value::Str(s) => *slot = s.to_string(),
                        v => {
                            return Err(type_error(format!(
                                "{key} must be None or a string, not {}",
                                v.type_name()
                            )));
                        }
                    }
                }
                let mut text = args
                    .iter()
                    .map(Value::display)
                    .collect::<Vec<_>>()
                    .join(&sep);
                text.push_str(&end);
                self.io.write(Stream::Stdout, &text);
                Ok(Value::None)
            }
            Builtin::Input => {
                arity(0, 1)?;
                if let Some(prompt) = args.first() {
                    self.io.write(Stream::Stdout, &prompt.display());
                }
                match self.io.read_line() {
                    Some(line) => Ok(Value::str(line)),
                    None => Err(RuntimeError::new(ErrorKind::EOFError, "EOF when reading a line")),
                }
            }
            Builtin::Len => {
                arity(1, 1)?;
                let n = match &args[0] {
                    Value::Str(s) => s.chars().count() as i64,
                    Value::List(l) => lock_list(l).len() as i64,
                    Value::Range { start, stop, step } => range_len(*start, *stop, *step),
                    other => {
                        return Err(type_error(format!(
                            "object of type '{}' has no len()",
                            other.type_name()
                        )));
                    }
                };
                Ok(Value::Int(n))
            }
            Builtin::Str => {
                arity(0, 1)?;
                Ok(Value::str(args.first().map(Value::display).unwrap_or_default()))
            }
            Builtin::Repr => {
                arity(1, 1)?;
                Ok(Value::str(args[0].repr()))
            }
            Builtin::Int => {
                arity(0, 1)?;
                args.first().map_or(Ok(Value::Int(0)), to_int)
            }
            Builtin::Float => {
                arity(0, 1)?;
                args.first().map_or(Ok(Value::Float(0.0)), to_float)
            }
            Builtin::Abs => {
                arity(1, 1)?;
                match &args[0] {
                    Value::Int(i) => i.checked_abs().map(Value::Int).ok_or_else(overflow),
                    Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
                    Value::Float(f) => Ok(Value::Float(f.abs())),
                    other => Err(type_error(format!(
                        "bad operand type for abs(): '{}'",
                        other.type_name()
                    ))),
                }
            }
            Builtin::Range => {
                arity(1, 3)?;
                let ints = args
                    .iter()
                    .map(|a| match a.as_number() {
                        Some(crate::value::Number::Int(i)) => Ok(i),
                        _ => Err(type_error(format!(
                            "'{}' object cannot be interpreted as an integer",
                            a.type_name()
                        ))),
                    })
                    .collect::<Eval<Vec<i64>>>()?;
                let (start, stop, step) = match ints.as_slice() {
                    [stop] => (0, *stop, 1),
                    [start, stop] => (*start, *stop, 1),
                    [start, stop, step] => (*start, *stop, *step),
                    _ => unreachable!("arity checked"),
                };
                if step == 0 {
                    return Err(RuntimeError::new(
                        ErrorKind::ValueError,
                        "range() arg 3 must not be zero",
                    ));
                }
                Ok(Value::Range { start, stop, step })
            }
            Builtin::Type => {
                arity(1, 1)?;
                Ok(Value::Type(args[0].type_name()))
            }
            Builtin::Restart => {
                arity(0, 0)?;
                self.globals.restart();
                log::debug!(target: "interp.session", "namespace restarted");
                Ok(Value::None)
            }
        }
    }
}

fn to_int(value: &Value) -> Eval<Value> {
    match value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) => {
            if f.is_nan() {
                Err(RuntimeError::new(
                    ErrorKind::ValueError,
                    "cannot convert float NaN to integer",
                ))
            } else if f.is_infinite() || f.abs() >= 9.223_372_036_854_776e18 {
                Err(RuntimeError::new(
                    ErrorKind::OverflowError,
                    "cannot convert float infinity to integer",
                ))
            } else {
                Ok(Value::Int(f.trunc() as i64))
            }
        }
        Value::Str(s) => s
            .trim()
            .replace('_', "")
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| {
                RuntimeError::new(
                    ErrorKind::ValueError,
                    format!("invalid literal for int() with base 10: {}", value.repr()),
                )
            }),
        other => Err(type_error(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn to_float(value: &Value) -> Eval<Value> {
    match value {
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            RuntimeError::new(
                ErrorKind::ValueError,
                format!("could not convert string to float: {}", value.repr()),
            )
        }),
        other => match other.as_number() {
            Some(crate::value::Number::Int(i)) => Ok(Value::Float(i as f64)),
            Some(crate::value::Number::Float(f)) => Ok(Value::Float(f)),
            None => Err(type_error(format!(
                "float() argument must be a string or a number, not '{}'",
                other.type_name()
            ))),
        },
    }
}

fn unary(op: UnaryOp, value: &Value) -> Eval<Value> {
    use crate::value::Number;
    match (op, value.as_number()) {
        (UnaryOp::Not, _) => Ok(Value::Bool(!value.truthy())),
        (UnaryOp::Neg, Some(Number::Int(i))) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
        (UnaryOp::Neg, Some(Number::Float(f))) => Ok(Value::Float(-f)),
        (UnaryOp::Pos, Some(Number::Int(i))) => Ok(Value::Int(i)),
        (UnaryOp::Pos, Some(Number::Float(f))) => Ok(Value::Float(f)),
        (op, None) => Err(type_error(format!(
            "bad operand type for unary {}: '{}'",
            if op == UnaryOp::Neg { "-" } else { "+" },
            value.type_name()
        ))),
    }
}

fn unsupported(op: BinOp, l: &Value, r: &Value) -> RuntimeError {
    type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        l.type_name(),
        r.type_name()
    ))
}

fn repeat_count(count: i64, unit: usize) -> Eval<usize> {
    let count = count.max(0);
    if unit > 0 && count.saturating_mul(unit as i64) > MAX_MATERIALIZED {
        return Err(RuntimeError::new(ErrorKind::OverflowError, "repeated sequence is too long"));
    }
    Ok(count as usize)
}

pub(crate) fn binary(op: BinOp, l: &Value, r: &Value) -> Eval<Value> {
    use crate::value::Number;
    match (l.as_number(), r.as_number()) {
        (Some(Number::Int(a)), Some(Number::Int(b))) => int_binary(op, a, b),
        (Some(a), Some(b)) => {
            let a = match a {
                Number::Int(i) => i as f64,
                Number::Float(f) => f,
            };
            let b = match b {
                Number::Int(i) => i as f64,
                Number::Float(f) => f,
            };
            float_binary(op, a, b)
        }
        _ => match (op, l, r) {
            (BinOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::str(format!("{a}{b}"))),
            (BinOp::Add, Value::Str(_), other) => Err(type_error(format!(
                "can only concatenate str (not \"{}\") to str",
                other.type_name()
            ))),
            (BinOp::Add, Value::List(a), Value::List(b)) => {
                let mut items = list_items(a);
                items.extend(list_items(b));
                Ok(Value::list(items))
            }
            (BinOp::Add, Value::List(_), other) => Err(type_error(format!(
                "can only concatenate list (not \"{}\") to list",
                other.type_name()
            ))),
            (BinOp::Mul, Value::Str(s), n) | (BinOp::Mul, n, Value::Str(s)) => match n.as_number() {
                Some(Number::Int(count)) => {
                    Ok(Value::str(s.repeat(repeat_count(count, s.len())?)))
                }
                _ => Err(type_error(format!(
                    "can't multiply sequence by non-int of type '{}'",
                    n.type_name()
                ))),
            },
            (BinOp::Mul, Value::List(list), n) | (BinOp::Mul, n, Value::List(list)) => {
                match n.as_number() {
                    Some(Number::Int(count)) => {
                        let items = list_items(list);
                        let count = repeat_count(count, items.len())?;
                        Ok(Value::list(std::iter::repeat_n(items, count).flatten().collect()))
                    }
                    _ => Err(type_error(format!(
                        "can't multiply sequence by non-int of type '{}'",
                        n.type_name()
                    ))),
                }
            }
            _ => Err(unsupported(op, l, r)),
        },
    }
}

fn int_binary(op: BinOp, a: i64, b: i64) -> Eval<Value> {
    let zero = |msg: &str| RuntimeError::new(ErrorKind::ZeroDivisionError, msg);
    let result = match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Sub => a.checked_sub(b),
        BinOp::Mul => a.checked_mul(b),
        BinOp::Div => {
            if b == 0 {
                return Err(zero("division by zero"));
            }
            return Ok(Value::Float(a as f64 / b as f64));
        }
        BinOp::FloorDiv => {
            if b == 0 {
                return Err(zero("integer division or modulo by zero"));
            }
            a.checked_div(b).map(|q| {
                if a % b != 0 && ((a < 0) != (b < 0)) { q - 1 } else { q }
            })
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(zero("integer division or modulo by zero"));
            }
            a.checked_rem(b).map(|r| if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r })
        }
        BinOp::Pow => {
            if b < 0 {
                if a == 0 {
                    return Err(zero("0.0 cannot be raised to a negative power"));
                }
                return Ok(Value::Float((a as f64).powf(b as f64)));
            }
            u32::try_from(b).ok().and_then(|e| a.checked_pow(e))
        }
    };
    result.map(Value::Int).ok_or_else(overflow)
}

fn float_binary(op: BinOp, a: f64, b: f64) -> Eval<Value> {
    let zero = |msg: &str| Err(RuntimeError::new(ErrorKind::ZeroDivisionError, msg));
    let v = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return zero("float division by zero");
            }
            a / b
        }
        BinOp::FloorDiv => {
            if b == 0.0 {
                return zero("float floor division by zero");
            }
            (a / b).floor()
        }
        BinOp::Mod => {
            if b == 0.0 {
                return zero("float modulo");
            }
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) { r + b } else { r }
        }
        BinOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return zero("0.0 cannot be raised to a negative power");
            }
            a.powf(b)
        }
    };
    Ok(Value::Float(v))
}

fn compare(op: CmpOp, l: &Value, r: &Value) -> Eval<bool> {
    use std::cmp::Ordering::*;
    let symbol = match op {
        CmpOp::Eq => return l.equals(r),
        CmpOp::Ne => return l.equals(r).map(|eq| !eq),
        CmpOp::In => return contains(r, l),
        CmpOp::NotIn => return contains(r, l).map(|b| !b),
        CmpOp::Lt => "<",
        CmpOp::Le => "<=",
        CmpOp::Gt => ">",
        CmpOp::Ge => ">=",
    };
    let ord = l.compare(r, symbol)?;
    Ok(match (op, ord) {
        (_, None) => false,
        (CmpOp::Lt, Some(o)) => o == Less,
        (CmpOp::Le, Some(o)) => o != Greater,
        (CmpOp::Gt, Some(o)) => o == Greater,
        (_, Some(o)) => o != Less,
    })
}

fn contains(container: &Value, item: &Value) -> Eval<bool> {
    match container {
        Value::Str(hay) => match item {
            Value::Str(needle) => Ok(hay.contains(&**needle)),
            other => Err(type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::List(list) => {
            for v in list_items(list) {
                if v.equals(item)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::Range { start, stop, step } => Ok(match item {
            Value::Int(i) => {
                let in_bounds = if *step > 0 {
                    i >= start && i < stop
                } else {
                    i <= start && i > stop
                };
                in_bounds && (i128::from(*i) - i128::from(*start)) % i128::from(*step) == 0
            }
            _ => false,
        }),
        other => Err(type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn normalize_index(idx: &Value, len: usize, what: &str) -> Eval<usize> {
    let i = match idx.as_number() {
        Some(crate::value::Number::Int(i)) => i,
        _ => {
            return Err(type_error(format!(
                "{} indices must be integers, not {}",
                what.split(' ').next().unwrap_or(what),
                idx.type_name()
            )));
        }
    };
    let len = len as i64;
    let resolved = if i < 0 { i + len } else { i };
    if resolved < 0 || resolved >= len {
        return Err(RuntimeError::new(
            ErrorKind::IndexError,
            format!("{what} index out of range"),
        ));
    }
    Ok(resolved as usize)
}

pub(crate) fn index(obj: &Value, idx: &Value) -> Eval<Value> {
    match obj {
        Value::List(list) => {
            let items = lock_list(list);
            let i = normalize_index(idx, items.len(), "list")?;
            Ok(items[i].clone())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = normalize_index(idx, chars.len(), "string")?;
            Ok(Value::str(chars[i].to_string()))
        }
        Value::Range { start, stop, step } => {
            let len = range_len(*start, *stop, *step);
            let i = normalize_index(idx, len as usize, "range object")?;
            Ok(Value::Int(start + i as i64 * step))
        }
        other => Err(type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

const LIST_METHODS: &[&str] = &["append", "extend", "pop", "insert", "index", "count", "reverse"];
const STR_METHODS: &[&str] = &[
    "upper", "lower", "strip", "split", "join", "replace", "startswith", "endswith", "find",
    "count",
];

fn attribute(obj: Value, name: &str) -> Eval<Value> {
    let known = match &obj {
        Value::List(_) => LIST_METHODS.contains(&name),
        Value::Str(_) => STR_METHODS.contains(&name),
        Value::Handle { session } if name == "session" => {
            return Ok(Value::Str(Arc::clone(session)));
        }
        _ => false,
    };
    if !known {
        return Err(RuntimeError::new(
            ErrorKind::AttributeError,
            format!("'{}' object has no attribute '{name}'", obj.type_name()),
        ));
    }
    Ok(Value::Method(Box::new(obj), Arc::from(name)))
}

fn expect_args(name: &str, args: &[Value], min: usize, max: usize) -> Eval<()> {
    if args.len() < min || args.len() > max {
        return Err(type_error(format!(
            "{name}() takes {} argument{} ({} given)",
            if min == max { format!("exactly {min}") } else { format!("{min} to {max}") },
            if max == 1 { "" } else { "s" },
            args.len()
        )));
    }
    Ok(())
}

fn expect_str<'v>(name: &str, value: &'v Value) -> Eval<&'v str> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(type_error(format!(
            "{name}() argument must be str, not {}",
            other.type_name()
        ))),
    }
}

fn call_method(receiver: &Value, name: &str, args: Vec<Value>) -> Eval<Value> {
    match receiver {
        Value::List(list) => list_method(list, name, args),
        Value::Str(s) => str_method(s, name, args),
        other => Err(RuntimeError::new(
            ErrorKind::AttributeError,
            format!("'{}' object has no attribute '{name}'", other.type_name()),
        )),
    }
}

fn list_method(list: &crate::value::ListRef, name: &str, mut args: Vec<Value>) -> Eval<Value> {
    match name {
        "append" => {
            expect_args(name, &args, 1, 1)?;
            lock_list(list).extend(args.pop());
            Ok(Value::None)
        }
        "extend" => {
            expect_args(name, &args, 1, 1)?;
            let extra = args[0].iter_items()?;
            lock_list(list).extend(extra);
            Ok(Value::None)
        }
        "pop" => {
            expect_args(name, &args, 0, 1)?;
            let mut items = lock_list(list);
            if items.is_empty() {
                return Err(RuntimeError::new(ErrorKind::IndexError, "pop from empty list"));
            }
            let idx = args.first().cloned().unwrap_or(Value::Int(-1));
            let i = normalize_index(&idx, items.len(), "pop")?;
            Ok(items.remove(i))
        }
        "insert" => {
            expect_args(name, &args, 2, 2)?;
            let value = args.pop().unwrap_or(Value::None);
            let mut items = lock_list(list);
            let len = items.len() as i64;
            let i = match args[0].as_number() {
                Some(crate::value::Number::Int(i)) => {
                    if i < 0 { (i + len).max(0) } else { i.min(len) }
                }
                _ => return Err(type_error("insert() index must be an integer")),
            };
            items.insert(i as usize, value);
            Ok(Value::None)
        }
        "index" => {
            expect_args(name, &args, 1, 1)?;
            for (i, v) in list_items(list).iter().enumerate() {
                if v.equals(&args[0])? {
                    return Ok(Value::Int(i as i64));
                }
            }
            Err(RuntimeError::new(
                ErrorKind::ValueError,
                format!("{} is not in list", args[0].repr()),
            ))
        }
        "count" => {
            expect_args(name, &args, 1, 1)?;
            let mut count = 0;
            for v in list_items(list) {
                if v.equals(&args[0])? {
                    count += 1;
                }
            }
            Ok(Value::Int(count))
        }
        _ => {
            expect_args(name, &args, 0, 0)?;
            lock_list(list).reverse();
            Ok(Value::None)
        }
    }
}

fn str_method(s: &str, name: &str, args: Vec<Value>) -> Eval<Value> {
    match name {
        "upper" => {
            expect_args(name, &args, 0, 0)?;
            Ok(Value::str(s.to_uppercase()))
        }
        "lower" => {
            expect_args(name, &args, 0, 0)?;
            Ok(Value::str(s.to_lowercase()))
        }
        "strip" => {
            expect_args(name, &args, 0, 0)?;
            Ok(Value::str(s.trim()))
        }
        "split" => {
            expect_args(name, &args, 0, 1)?;
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::None) => s.split_whitespace().map(Value::str).collect(),
                Some(sep) => {
                    let sep = expect_str(name, sep)?;
                    if sep.is_empty() {
                        return Err(RuntimeError::new(ErrorKind::ValueError, "empty separator"));
                    }
                    s.split(sep).map(Value::str).collect()
                }
            };
            Ok(Value::list(parts))
        }
        "join" => {
            expect_args(name, &args, 1, 1)?;
            let mut parts = Vec::new();
            for (i, item) in args[0].iter_items()?.iter().enumerate() {
                match item {
                    Value::Str(p) => parts.push(p.to_string()),
                    other => {
                        return Err(type_error(format!(
                            "sequence item {i}: expected str instance, {} found",
                            other.type_name()
                        )));
                    }
                }
            }
            Ok(Value::str(parts.join(s)))
        }
        "replace" => {
            expect_args(name, &args, 2, 2)?;
            let from = expect_str(name, &args[0])?;
            let to = expect_str(name, &args[1])?;
            Ok(Value::str(s.replace(from, to)))
        }
        "startswith" | "endswith" => {
            expect_args(name, &args, 1, 1)?;
            let affix = expect_str(name, &args[0])?;
            Ok(Value::Bool(if name == "startswith" {
                s.starts_with(affix)
            } else {
                s.ends_with(affix)
            }))
        }
        "find" => {
            expect_args(name, &args, 1, 1)?;
            let needle = expect_str(name, &args[0])?;
            Ok(Value::Int(
                s.find(needle).map_or(-1, |b| s[..b].chars().count() as i64),
            ))
        }
        _ => {
            expect_args(name, &args, 1, 1)?;
            let needle = expect_str(name, &args[0])?;
            let count = if needle.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(needle).count()
            };
            Ok(Value::Int(count as i64))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use bus::CaptureIo;

    fn run(source: &str) -> (Result<(), RuntimeError>, String) {
        let ns = Namespace::new();
        let mut io = CaptureIo::new();
        let program = parse(source).expect("parse");
        let result = Interpreter::new(&ns, &mut io).run(&program);
        (result, io.text())
    }

    fn output(source: &str) -> String {
        let (result, out) = run(source);
        result.expect("run");
        out
    }

    #[test]
    fn list_repetition_and_nested_comparison() {
        assert_eq!(
            output("print([1, 2] * 2, 2 * ['a'], [[1]] * 0)"),
            "[1, 2, 1, 2] ['a', 'a'] []\n"
        );
        assert_eq!(
            output("a = [[1], 2]\nprint(a == [[1], 2], [1] in a, a.count(2), a.index([1]))"),
            "True True 1 0\n"
        );
    }

    #[test]
    fn self_containing_lists_raise_instead_of_overflowing() {
        let (result, _) = run("a = [1]\na.append(a)\nb = [1]\nb.append(b)\nprint(a == b)");
        assert_eq!(result.expect_err("comparison").kind, ErrorKind::RecursionError);
        let (result, _) = run("a = [1]\na.append(a)\nb = [1]\nb.append(b)\nprint(a in [b])");
        assert_eq!(result.expect_err("membership").kind, ErrorKind::RecursionError);
        assert_eq!(output("a = [1]\na.append(a)\nprint(a == a, a)"), "True [1, [...]]\n");
    }

    #[test]
    fn arithmetic_follows_floor_semantics() {
        assert_eq!(output("print(7 // -2, -7 % 3, 7 / 2, 2 ** 10, 2 ** -1)"), "-4 2 3.5 1024 0.5\n");
        assert_eq!(output("print(1 + 2.0, 10 % 2.5, -2 ** 2)"), "3.0 0.0 -4\n");
    }

    #[test]
    fn division_by_zero_reports_line() {
        let (result, _) = run("x = 1\ny = x / 0\n");
        let err = result.err().expect("error");
        assert_eq!(err.kind, ErrorKind::ZeroDivisionError);
        assert_eq!(err.message, "division by zero");
        assert_eq!(err.line(), 2);
    }

    #[test]
    fn control_flow_and_functions() {
        let source = "\
def fact(n):
    if n <= 1:
        return 1
    return n * fact(n - 1)

total = 0
for i in range(10):
    if i % 2 == 0:
        continue
    if i > 7:
        break
    total += i
print(fact(5), total)
n = 3
while n:
    n -= 1
print(n)
";
        assert_eq!(output(source), "120 16\n0\n");
    }

    #[test]
    fn traceback_frames_run_outer_to_inner() {
        let (result, _) = run("def f(x):\n    return x[3]\n\nf([1])\n");
        let err = result.err().expect("error");
        assert_eq!(err.kind, ErrorKind::IndexError);
        let lines: Vec<usize> = err.frames.iter().map(|f| f.line).collect();
        assert_eq!(lines, vec![4, 2]);
        assert_eq!(err.frames[1].function, "f");
    }

    #[test]
    fn runaway_recursion_is_bounded() {
        let (result, _) = run("def f():\n    return f()\nf()\n");
        assert_eq!(result.err().expect("error").kind, ErrorKind::RecursionError);
    }

    #[test]
    fn lists_and_strings() {
        let source = "\
a = [3, 1]
a.append(2)
a[0] = 'x'
a += [None]
print(a, len(a), 2 in a, a.pop())
s = 'a,b,c'
print(s.split(','), '-'.join(['x', 'y']), s.upper(), s[-1], 'ab' * 2)
";
        assert_eq!(
            output(source),
            "['x', 1, 2] 4 True None\n['a', 'b', 'c'] x-y A,B,C c abab\n"
        );
    }

    #[test]
    fn print_keywords_and_input() {
        let ns = Namespace::new();
        let mut io = CaptureIo::with_input(["Ada"]);
        let program = parse("name = input('Name? ')\nprint('hi', name, sep='-', end='!')").expect("parse");
        Interpreter::new(&ns, &mut io).run(&program).expect("run");
        assert_eq!(io.stream_text(Stream::Stdout), "Name? hi-Ada!");
        assert_eq!(io.stream_text(Stream::Stdin), "Ada\n");

        let (result, _) = run("input()");
        assert_eq!(result.err().expect("error").kind, ErrorKind::EOFError);
    }

    #[test]
    fn type_errors_and_name_errors() {
        let (result, _) = run("'a' + 1");
        let err = result.err().expect("error");
        assert_eq!(err.kind, ErrorKind::TypeError);
        assert_eq!(err.message, "can only concatenate str (not \"int\") to str");
        let (result, _) = run("print(missing)");
        assert_eq!(result.err().expect("error").message, "name 'missing' is not defined");
        let (result, _) = run("int('x1')");
        assert_eq!(
            result.err().expect("error").message,
            "invalid literal for int() with base 10: 'x1'"
        );
    }

    #[test]
    fn integer_overflow_is_reported() {
        let (result, _) = run("x = 2 ** 70");
        assert_eq!(result.err().expect("error").kind, ErrorKind::OverflowError);
    }

    #[test]
    fn console_echo_skips_none() {
        let ns = Namespace::new();
        let mut io = CaptureIo::new();
        let program = parse("1 + 1\nNone\n'x'\nprint(3)").expect("parse");
        Interpreter::new(&ns, &mut io)
            .echo_expressions(true)
            .run(&program)
            .expect("run");
        assert_eq!(io.text(), "2\n'x'\n3\n");
    }

    #[test]
    fn type_and_conversions() {
        assert_eq!(
            output("print(type(1) == int, type('a'), str(2.5), float('1e3'), int(-2.7), abs(-3))"),
            "True <class 'str'> 2.5 1000.0 -2 3\n"
        );
    }
}
