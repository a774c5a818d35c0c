//! Recursive-descent parser over the token stream from [`crate::lexer`].
use std::sync::Arc;

use crate::ast::{BinOp, CmpOp, Expr, FunctionDef, Program, Stmt, StmtKind, Target, UnaryOp};
use crate::error::{CompileError, ErrorKind};
use crate::lexer::{Tok, Token, lex};

/// Deepest expression nesting accepted before giving up.
const MAX_NESTING: usize = 100;

const KEYWORDS: &[&str] = &[
    "if", "elif", "else", "while", "for", "in", "def", "return", "pass", "break", "continue",
    "and", "or", "not", "True", "False", "None",
];

pub fn parse(source: &str) -> Result<Program, CompileError> {
    let lexed = lex(source)?;
    Parser::new(lexed.tokens).program()
}

/// Console compilation: a block must be closed by a blank line before it runs.
pub fn parse_console(source: &str) -> Result<Program, CompileError> {
    let lexed = lex(source)?;
    let program = Parser::new(lexed.tokens).program()?;
    let ends_blank = source.ends_with("\n\n") || source.lines().last().is_some_and(|l| l.trim().is_empty());
    if lexed.has_blocks && !ends_blank {
        let line = source.lines().count();
        return Err(CompileError::incomplete(line, "block not terminated"));
    }
    Ok(program)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    nesting: usize,
    loops: usize,
    functions: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            nesting: 0,
            loops: 0,
            functions: 0,
        }
    }

    fn peek(&self) -> &Tok {
        self.tokens.get(self.pos).map_or(&Tok::Eof, |t| &t.tok)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn advance(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn at_op(&self, op: &str) -> bool {
        matches!(self.peek(), Tok::Op(o) if *o == op)
    }

    fn at_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Tok::Name(n) if n == kw)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.at_op(op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.at_keyword(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self) -> CompileError {
        match self.peek() {
            Tok::Eof => CompileError::incomplete(self.line(), "unexpected EOF while parsing"),
            _ => CompileError::syntax(self.line(), "invalid syntax"),
        }
    }

    fn expect_op(&mut self, op: &str) -> Result<(), CompileError> {
        if self.eat_op(op) { Ok(()) } else { Err(self.unexpected()) }
    }

    fn expect_name(&mut self) -> Result<String, CompileError> {
        match self.peek() {
            Tok::Name(n) if !KEYWORDS.contains(&n.as_str()) => {
                let n = n.clone();
                self.pos += 1;
                Ok(n)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn program(mut self) -> Result<Program, CompileError> {
        let mut body = Vec::new();
        loop {
            match self.peek() {
                Tok::Eof => break,
                Tok::Newline => {
                    self.pos += 1;
                }
                Tok::Indent => {
                    return Err(CompileError::syntax(self.line(), "unexpected indent")
                        .with_kind(ErrorKind::IndentationError));
                }
                _ => body.extend(self.statement()?),
            }
        }
        Ok(Program { body })
    }

    fn statement(&mut self) -> Result<Vec<Stmt>, CompileError> {
        let line = self.line();
        let kind = match self.peek() {
            Tok::Name(n) if n == "if" => {
                self.pos += 1;
                self.if_statement()?
            }
            Tok::Name(n) if n == "while" => {
                self.pos += 1;
                let cond = self.expr()?;
                self.loops += 1;
                let body = self.block();
                self.loops -= 1;
                StmtKind::While(cond, body?)
            }
            Tok::Name(n) if n == "for" => {
                self.pos += 1;
                let name = self.expect_name()?;
                if !self.eat_keyword("in") {
                    return Err(self.unexpected());
                }
                let iter = self.expr()?;
                self.loops += 1;
                let body = self.block();
                self.loops -= 1;
                StmtKind::For(name, iter, body?)
            }
            Tok::Name(n) if n == "def" => {
                self.pos += 1;
                self.def_statement()?
            }
            _ => return self.simple_line(),
        };
        Ok(vec![Stmt { kind, line }])
    }

    /// One or more `;`-less simple statements ending the line.
    fn simple_line(&mut self) -> Result<Vec<Stmt>, CompileError> {
        let stmt = self.simple_statement()?;
        match self.peek() {
            Tok::Newline => {
                self.pos += 1;
            }
            Tok::Eof | Tok::Dedent => {}
            _ => return Err(CompileError::syntax(self.line(), "invalid syntax")),
        }
        Ok(vec![stmt])
    }

    fn simple_statement(&mut self) -> Result<Stmt, CompileError> {
        let line = self.line();
        let kind = if self.eat_keyword("pass") {
            StmtKind::Pass
        } else if self.at_keyword("break") {
            if self.loops == 0 {
                return Err(CompileError::syntax(line, "'break' outside loop"));
            }
            self.pos += 1;
            StmtKind::Break
        } else if self.at_keyword("continue") {
            if self.loops == 0 {
                return Err(CompileError::syntax(line, "'continue' not properly in loop"));
            }
            self.pos += 1;
            StmtKind::Continue
        } else if self.at_keyword("return") {
            if self.functions == 0 {
                return Err(CompileError::syntax(line, "'return' outside function"));
            }
            self.pos += 1;
            if matches!(self.peek(), Tok::Newline | Tok::Eof | Tok::Dedent) {
                StmtKind::Return(None)
            } else {
                StmtKind::Return(Some(self.expr()?))
            }
        } else {
            let expr = self.expr()?;
            if self.eat_op("=") {
                let target = to_target(expr, line)?;
                StmtKind::Assign(target, self.expr()?)
            } else if let Some(op) = self.aug_op() {
                let target = to_target(expr, line)?;
                StmtKind::AugAssign(target, op, self.expr()?)
            } else {
                StmtKind::Expr(expr)
            }
        };
        Ok(Stmt { kind, line })
    }

    fn aug_op(&mut self) -> Option<BinOp> {
        let op = match self.peek() {
            Tok::Op("+=") => BinOp::Add,
            Tok::Op("-=") => BinOp::Sub,
            Tok::Op("*=") => BinOp::Mul,
            Tok::Op("/=") => BinOp::Div,
            Tok::Op("//=") => BinOp::FloorDiv,
            Tok::Op("%=") => BinOp::Mod,
            Tok::Op("**=") => BinOp::Pow,
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    fn if_statement(&mut self) -> Result<StmtKind, CompileError> {
        let mut branches = vec![(self.expr()?, self.block()?)];
        let mut orelse = None;
        loop {
            if self.eat_keyword("elif") {
                branches.push((self.expr()?, self.block()?));
            } else if self.eat_keyword("else") {
                orelse = Some(self.block()?);
                break;
            } else {
                break;
            }
        }
        Ok(StmtKind::If { branches, orelse })
    }

    fn def_statement(&mut self) -> Result<StmtKind, CompileError> {
        let name = self.expect_name()?;
        self.expect_op("(")?;
        let mut params = Vec::new();
        while !self.at_op(")") {
            let param = self.expect_name()?;
            if params.contains(&param) {
                return Err(CompileError::syntax(
                    self.line(),
                    format!("duplicate argument '{param}' in function definition"),
                ));
            }
            params.push(param);
            if !self.eat_op(",") {
                break;
            }
        }
        self.expect_op(")")?;
        let outer_loops = std::mem::take(&mut self.loops);
        self.functions += 1;
        let body = self.block();
        self.functions -= 1;
        self.loops = outer_loops;
        Ok(StmtKind::Def(Arc::new(FunctionDef { name, params, body: body? })))
    }

    /// `: simple` on the same line, or an indented suite.
    fn block(&mut self) -> Result<Vec<Stmt>, CompileError> {
        self.expect_op(":")?;
        if !matches!(self.peek(), Tok::Newline) {
            return self.simple_line();
        }
        self.pos += 1;
        match self.peek() {
            Tok::Indent => {
                self.pos += 1;
            }
            Tok::Eof => {
                return Err(CompileError::incomplete(self.line(), "unexpected EOF while parsing"));
            }
            _ => {
                return Err(CompileError::syntax(self.line(), "expected an indented block")
                    .with_kind(ErrorKind::IndentationError));
            }
        }
        let mut body = Vec::new();
        loop {
            match self.peek() {
                Tok::Dedent => {
                    self.pos += 1;
                    break;
                }
                Tok::Eof => break,
                Tok::Newline => {
                    self.pos += 1;
                }
                _ => body.extend(self.statement()?),
            }
        }
        Ok(body)
    }

    fn expr(&mut self) -> Result<Expr, CompileError> {
        self.nesting += 1;
        if self.nesting > MAX_NESTING {
            return Err(CompileError::syntax(self.line(), "expression too deeply nested"));
        }
        let result = self.or_expr();
        self.nesting -= 1;
        result
    }

    fn or_expr(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("or") {
            left = Expr::Or(Box::new(left), Box::new(self.and_expr()?));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.not_expr()?;
        while self.eat_keyword("and") {
            left = Expr::And(Box::new(left), Box::new(self.not_expr()?));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, CompileError> {
        if self.eat_keyword("not") {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.not_expr()?)));
        }
        self.comparison()
    }

    fn cmp_op(&mut self) -> Option<CmpOp> {
        let op = match self.peek() {
            Tok::Op("==") => CmpOp::Eq,
            Tok::Op("!=") => CmpOp::Ne,
            Tok::Op("<") => CmpOp::Lt,
            Tok::Op("<=") => CmpOp::Le,
            Tok::Op(">") => CmpOp::Gt,
            Tok::Op(">=") => CmpOp::Ge,
            Tok::Name(n) if n == "in" => CmpOp::In,
            Tok::Name(n) if n == "not" => {
                let next_is_in = matches!(
                    self.tokens.get(self.pos + 1).map(|t| &t.tok),
                    Some(Tok::Name(n)) if n == "in"
                );
                if !next_is_in {
                    return None;
                }
                self.pos += 1;
                CmpOp::NotIn
            }
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    fn comparison(&mut self) -> Result<Expr, CompileError> {
        let first = self.arith()?;
        let mut rest = Vec::new();
        while let Some(op) = self.cmp_op() {
            rest.push((op, self.arith()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), rest))
        }
    }

    fn arith(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Tok::Op("+") => BinOp::Add,
                Tok::Op("-") => BinOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            left = Expr::Binary(op, Box::new(left), Box::new(self.term()?));
        }
    }

    fn term(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Tok::Op("*") => BinOp::Mul,
                Tok::Op("/") => BinOp::Div,
                Tok::Op("//") => BinOp::FloorDiv,
                Tok::Op("%") => BinOp::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            left = Expr::Binary(op, Box::new(left), Box::new(self.unary()?));
        }
    }

    fn unary(&mut self) -> Result<Expr, CompileError> {
        let op = match self.peek() {
            Tok::Op("-") => UnaryOp::Neg,
            Tok::Op("+") => UnaryOp::Pos,
            _ => return self.power(),
        };
        self.pos += 1;
        self.nesting += 1;
        if self.nesting > MAX_NESTING {
            return Err(CompileError::syntax(self.line(), "expression too deeply nested"));
        }
        let operand = self.unary();
        self.nesting -= 1;
        Ok(Expr::Unary(op, Box::new(operand?)))
    }

    fn power(&mut self) -> Result<Expr, CompileError> {
        let base = self.postfix()?;
        if self.eat_op("**") {
            let exponent = self.unary()?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.atom()?;
        loop {
            if self.eat_op("(") {
                let (args, kwargs) = self.call_args()?;
                expr = Expr::Call {
                    func: Box::new(expr),
                    args,
                    kwargs,
                };
            } else if self.eat_op("[") {
                let index = self.expr()?;
                self.expect_op("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.eat_op(".") {
                let name = self.expect_name()?;
                expr = Expr::Attr(Box::new(expr), name);
            } else {
                return Ok(expr);
            }
        }
    }

    fn call_args(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>), CompileError> {
        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Expr)> = Vec::new();
        while !self.at_op(")") {
            let is_keyword = matches!(self.peek(), Tok::Name(_))
                && matches!(self.tokens.get(self.pos + 1).map(|t| &t.tok), Some(Tok::Op("=")));
            if is_keyword {
                let name = self.expect_name()?;
                self.pos += 1;
                if kwargs.iter().any(|(k, _)| *k == name) {
                    return Err(CompileError::syntax(
                        self.line(),
                        format!("keyword argument repeated: {name}"),
                    ));
                }
                kwargs.push((name, self.expr()?));
            } else {
                if !kwargs.is_empty() {
                    return Err(CompileError::syntax(
                        self.line(),
                        "positional argument follows keyword argument",
                    ));
                }
                args.push(self.expr()?);
            }
            if !self.eat_op(",") {
                break;
            }
        }
        self.expect_op(")")?;
        Ok((args, kwargs))
    }

    fn atom(&mut self) -> Result<Expr, CompileError> {
        let line = self.line();
        match self.advance() {
            Tok::Int(i) => Ok(Expr::Int(i)),
            Tok::Float(f) => Ok(Expr::Float(f)),
            Tok::Str(mut s) => {
                while let Tok::Str(next) = self.peek() {
                    s.push_str(next);
                    self.pos += 1;
                }
                Ok(Expr::Str(s))
            }
            Tok::Name(n) => match n.as_str() {
                "True" => Ok(Expr::Bool(true)),
                "False" => Ok(Expr::Bool(false)),
                "None" => Ok(Expr::None),
                kw if KEYWORDS.contains(&kw) => Err(CompileError::syntax(line, "invalid syntax")),
                _ => Ok(Expr::Name(n)),
            },
            Tok::Op("(") => {
                let inner = self.expr()?;
                self.expect_op(")")?;
                Ok(inner)
            }
            Tok::Op("[") => {
                let mut items = Vec::new();
                while !self.at_op("]") {
                    items.push(self.expr()?);
                    if !self.eat_op(",") {
                        break;
                    }
                }
                self.expect_op("]")?;
                Ok(Expr::List(items))
            }
            Tok::Eof => Err(CompileError::incomplete(line, "unexpected EOF while parsing")),
            _ => Err(CompileError::syntax(line, "invalid syntax")),
        }
    }
}

fn to_target(expr: Expr, line: usize) -> Result<Target, CompileError> {
    match expr {
        Expr::Name(n) => Ok(Target::Name(n)),
        Expr::Index(obj, idx) => Ok(Target::Index(*obj, *idx)),
        Expr::Call { .. } => Err(CompileError::syntax(line, "can't assign to function call")),
        _ => Err(CompileError::syntax(line, "can't assign to literal")),
    }
}
