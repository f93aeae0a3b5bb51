//! Recursive-descent parser with precedence climbing for binary
//! operators, producing the `ast` module's node types. Operator
//! precedence is grounded on the teacher's
//! `compiler/parser/lua_operator_kind.rs` binding-power table, now
//! carried by `ast::BinaryOperator::binding_power`.

use super::ast::*;
use super::lexer::{Lexer, Token};
use std::rc::Rc;

pub fn parse(src: &[u8], source_name: &str) -> Result<Chunk, String> {
    let tokens = Lexer::new(src).tokenize()?;
    let source: Rc<str> = Rc::from(source_name);
    let mut p = Parser { tokens, pos: 0, source: source.clone() };
    let body = p.parse_block()?;
    p.expect(&Token::Eof)?;
    Ok(Chunk { body, source_name: source })
}

struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    source: Rc<str>,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].0
    }
    fn span(&self) -> Span {
        self.tokens[self.pos].1
    }
    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].0.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }
    fn check(&self, t: &Token) -> bool {
        self.peek() == t
    }
    fn accept(&mut self, t: &Token) -> bool {
        if self.check(t) {
            self.advance();
            true
        } else {
            false
        }
    }
    fn expect(&mut self, t: &Token) -> Result<(), String> {
        if self.accept(t) {
            Ok(())
        } else {
            Err(format!("{}:{}: expected {:?}, found {:?}", self.source, self.span().line, t, self.peek()))
        }
    }
    fn expect_name(&mut self) -> Result<Rc<str>, String> {
        match self.advance() {
            Token::Name(n) => Ok(n),
            other => Err(format!("{}:{}: expected name, found {:?}", self.source, self.span().line, other)),
        }
    }

    fn block_ends(&self) -> bool {
        matches!(self.peek(), Token::End | Token::Else | Token::Elseif | Token::Until | Token::Eof)
    }

    fn parse_block(&mut self) -> Result<Block, String> {
        let mut stats = Vec::new();
        while !self.block_ends() {
            if self.check(&Token::Return) {
                stats.push(self.parse_return()?);
                break;
            }
            if let Some(stat) = self.parse_stat()? {
                stats.push(stat);
            }
        }
        Ok(Block { stats })
    }

    fn parse_return(&mut self) -> Result<Stat, String> {
        let span = self.span();
        self.advance();
        let exprs = if self.block_ends() || self.check(&Token::Semi) {
            Vec::new()
        } else {
            self.parse_exprlist()?
        };
        self.accept(&Token::Semi);
        Ok(Stat::Return(exprs, span))
    }

    fn parse_stat(&mut self) -> Result<Option<Stat>, String> {
        let span = self.span();
        match self.peek().clone() {
            Token::Semi => {
                self.advance();
                Ok(None)
            }
            Token::DColon => {
                self.advance();
                let name = self.expect_name()?;
                self.expect(&Token::DColon)?;
                Ok(Some(Stat::Label(name)))
            }
            Token::Break => {
                self.advance();
                Ok(Some(Stat::Break(span)))
            }
            Token::Goto => {
                self.advance();
                let name = self.expect_name()?;
                Ok(Some(Stat::Goto(name, span)))
            }
            Token::Do => {
                self.advance();
                let block = self.parse_block()?;
                self.expect(&Token::End)?;
                Ok(Some(Stat::Do(block)))
            }
            Token::While => {
                self.advance();
                let cond = self.parse_expr(0)?;
                self.expect(&Token::Do)?;
                let body = self.parse_block()?;
                self.expect(&Token::End)?;
                Ok(Some(Stat::While { cond, body, span }))
            }
            Token::Repeat => {
                self.advance();
                let body = self.parse_block()?;
                self.expect(&Token::Until)?;
                let cond = self.parse_expr(0)?;
                Ok(Some(Stat::Repeat { body, cond, span }))
            }
            Token::If => Ok(Some(self.parse_if(span)?)),
            Token::For => Ok(Some(self.parse_for(span)?)),
            Token::Function => Ok(Some(self.parse_function_stat(span)?)),
            Token::Local => Ok(Some(self.parse_local(span)?)),
            _ => Ok(Some(self.parse_expr_stat(span)?)),
        }
    }

    fn parse_if(&mut self, span: Span) -> Result<Stat, String> {
        self.advance();
        let mut arms = Vec::new();
        let cond = self.parse_expr(0)?;
        self.expect(&Token::Then)?;
        arms.push((cond, self.parse_block()?));
        while self.accept(&Token::Elseif) {
            let cond = self.parse_expr(0)?;
            self.expect(&Token::Then)?;
            arms.push((cond, self.parse_block()?));
        }
        let else_block = if self.accept(&Token::Else) { Some(self.parse_block()?) } else { None };
        self.expect(&Token::End)?;
        Ok(Stat::If { arms, else_block, span })
    }

    fn parse_for(&mut self, span: Span) -> Result<Stat, String> {
        self.advance();
        let first = self.expect_name()?;
        if self.accept(&Token::Assign) {
            let start = self.parse_expr(0)?;
            self.expect(&Token::Comma)?;
            let stop = self.parse_expr(0)?;
            let step = if self.accept(&Token::Comma) { Some(self.parse_expr(0)?) } else { None };
            self.expect(&Token::Do)?;
            let body = self.parse_block()?;
            self.expect(&Token::End)?;
            return Ok(Stat::NumericFor { var: first, start, stop, step, body, span });
        }
        let mut names = vec![first];
        while self.accept(&Token::Comma) {
            names.push(self.expect_name()?);
        }
        self.expect(&Token::In)?;
        let exprs = self.parse_exprlist()?;
        self.expect(&Token::Do)?;
        let body = self.parse_block()?;
        self.expect(&Token::End)?;
        Ok(Stat::GenericFor { names, exprs, body, span })
    }

    fn parse_function_stat(&mut self, span: Span) -> Result<Stat, String> {
        self.advance();
        let first = self.expect_name()?;
        let mut target = Expr::Name(first);
        let mut is_method = false;
        loop {
            if self.accept(&Token::Dot) {
                let field = self.expect_name()?;
                target = Expr::Index(Box::new(target), Box::new(Expr::Str(Rc::from(field.as_bytes()))), span);
            } else if self.accept(&Token::Colon) {
                let field = self.expect_name()?;
                target = Expr::Index(Box::new(target), Box::new(Expr::Str(Rc::from(field.as_bytes()))), span);
                is_method = true;
                break;
            } else {
                break;
            }
        }
        let body = self.parse_function_body(span, Some(name_of(&target)))?;
        Ok(Stat::FunctionDecl { target, is_method, body: Rc::new(body), span })
    }

    fn parse_local(&mut self, span: Span) -> Result<Stat, String> {
        self.advance();
        if self.accept(&Token::Function) {
            let name = self.expect_name()?;
            let body = self.parse_function_body(span, Some(name.to_string()))?;
            return Ok(Stat::LocalFunction { name, body: Rc::new(body), span });
        }
        let mut names = Vec::new();
        loop {
            let name = self.expect_name()?;
            let attrib = if self.accept(&Token::Lt) {
                let attr_name = self.expect_name()?;
                self.expect(&Token::Gt)?;
                match attr_name.as_ref() {
                    "const" => Some(Attrib::Const),
                    "close" => Some(Attrib::Close),
                    other => return Err(format!("unknown attribute '{other}'")),
                }
            } else {
                None
            };
            names.push((name, attrib));
            if !self.accept(&Token::Comma) {
                break;
            }
        }
        let exprs = if self.accept(&Token::Assign) { self.parse_exprlist()? } else { Vec::new() };
        Ok(Stat::Local { names, exprs, span })
    }

    fn parse_expr_stat(&mut self, span: Span) -> Result<Stat, String> {
        let first = self.parse_suffixed_expr()?;
        if self.check(&Token::Assign) || self.check(&Token::Comma) {
            let mut targets = vec![first];
            while self.accept(&Token::Comma) {
                targets.push(self.parse_suffixed_expr()?);
            }
            self.expect(&Token::Assign)?;
            let exprs = self.parse_exprlist()?;
            return Ok(Stat::Assign { targets, exprs, span });
        }
        Ok(Stat::Expr(first, span))
    }

    fn parse_exprlist(&mut self) -> Result<Vec<Expr>, String> {
        let mut out = vec![self.parse_expr(0)?];
        while self.accept(&Token::Comma) {
            out.push(self.parse_expr(0)?);
        }
        Ok(out)
    }

    fn parse_expr(&mut self, min_bp: u8) -> Result<Expr, String> {
        let span = self.span();
        let mut lhs = if let Some(op) = unary_op(self.peek()) {
            self.advance();
            let operand = self.parse_expr(UNARY_BINDING_POWER)?;
            Expr::Unary(op, Box::new(operand), span)
        } else {
            self.parse_simple_expr()?
        };
        loop {
            let Some(op) = binary_op(self.peek()) else { break };
            let (lbp, rbp) = op.binding_power();
            if lbp < min_bp {
                break;
            }
            let span = self.span();
            self.advance();
            let rhs = self.parse_expr(rbp)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs), span);
        }
        Ok(lhs)
    }

    fn parse_simple_expr(&mut self) -> Result<Expr, String> {
        let span = self.span();
        match self.peek().clone() {
            Token::Nil => {
                self.advance();
                Ok(Expr::Nil)
            }
            Token::True => {
                self.advance();
                Ok(Expr::True)
            }
            Token::False => {
                self.advance();
                Ok(Expr::False)
            }
            Token::Ellipsis => {
                self.advance();
                Ok(Expr::Vararg)
            }
            Token::Int(i) => {
                self.advance();
                Ok(Expr::Int(i))
            }
            Token::Float(f) => {
                self.advance();
                Ok(Expr::Float(f))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Str(Rc::from(s.as_slice())))
            }
            Token::Function => {
                self.advance();
                let body = self.parse_function_body(span, None)?;
                Ok(Expr::Function(Rc::new(body)))
            }
            Token::LBrace => self.parse_table(span),
            _ => self.parse_suffixed_expr(),
        }
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, String> {
        match self.peek().clone() {
            Token::Name(n) => {
                self.advance();
                Ok(Expr::Name(n))
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_expr(0)?;
                self.expect(&Token::RParen)?;
                Ok(Expr::Paren(Box::new(inner)))
            }
            other => Err(format!("{}:{}: unexpected token {:?}", self.source, self.span().line, other)),
        }
    }

    fn parse_suffixed_expr(&mut self) -> Result<Expr, String> {
        let mut expr = self.parse_primary_expr()?;
        loop {
            let span = self.span();
            match self.peek().clone() {
                Token::Dot => {
                    self.advance();
                    let field = self.expect_name()?;
                    expr = Expr::Index(Box::new(expr), Box::new(Expr::Str(Rc::from(field.as_bytes()))), span);
                }
                Token::LBracket => {
                    self.advance();
                    let key = self.parse_expr(0)?;
                    self.expect(&Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(key), span);
                }
                Token::Colon => {
                    self.advance();
                    let method = self.expect_name()?;
                    let args = self.parse_call_args()?;
                    expr = Expr::MethodCall { object: Box::new(expr), method, args, span };
                }
                Token::LParen | Token::Str(_) | Token::LBrace => {
                    let args = self.parse_call_args()?;
                    expr = Expr::Call { func: Box::new(expr), args, span };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, String> {
        match self.peek().clone() {
            Token::LParen => {
                self.advance();
                let args = if self.check(&Token::RParen) { Vec::new() } else { self.parse_exprlist()? };
                self.expect(&Token::RParen)?;
                Ok(args)
            }
            Token::Str(s) => {
                self.advance();
                Ok(vec![Expr::Str(Rc::from(s.as_slice()))])
            }
            Token::LBrace => {
                let span = self.span();
                Ok(vec![self.parse_table(span)?])
            }
            other => Err(format!("unexpected token {other:?} in call arguments")),
        }
    }

    fn parse_table(&mut self, span: Span) -> Result<Expr, String> {
        self.expect(&Token::LBrace)?;
        let mut array_items = Vec::new();
        let mut keyed_items = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.check(&Token::LBracket) {
                self.advance();
                let key = self.parse_expr(0)?;
                self.expect(&Token::RBracket)?;
                self.expect(&Token::Assign)?;
                let value = self.parse_expr(0)?;
                keyed_items.push((key, value));
            } else if matches!(self.peek(), Token::Name(_)) && self.tokens.get(self.pos + 1).map(|(t, _)| t) == Some(&Token::Assign) {
                let name = self.expect_name()?;
                self.expect(&Token::Assign)?;
                let value = self.parse_expr(0)?;
                keyed_items.push((Expr::Str(Rc::from(name.as_bytes())), value));
            } else {
                array_items.push(self.parse_expr(0)?);
            }
            if !self.accept(&Token::Comma) && !self.accept(&Token::Semi) {
                break;
            }
        }
        self.expect(&Token::RBrace)?;
        Ok(Expr::Table { array_items, keyed_items, span })
    }

    fn parse_function_body(&mut self, span: Span, name: Option<String>) -> Result<FunctionBody, String> {
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        let mut is_vararg = false;
        if !self.check(&Token::RParen) {
            loop {
                if self.accept(&Token::Ellipsis) {
                    is_vararg = true;
                    break;
                }
                params.push(self.expect_name()?);
                if !self.accept(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        let block = self.parse_block()?;
        self.expect(&Token::End)?;
        Ok(FunctionBody { params, is_vararg, block, span, name: name.map(Rc::from) })
    }
}

fn name_of(e: &Expr) -> String {
    match e {
        Expr::Name(n) => n.to_string(),
        Expr::Index(_, key, _) => match key.as_ref() {
            Expr::Str(s) => String::from_utf8_lossy(s).into_owned(),
            _ => "?".to_string(),
        },
        _ => "?".to_string(),
    }
}

fn unary_op(t: &Token) -> Option<UnaryOperator> {
    Some(match t {
        Token::Not => UnaryOperator::Not,
        Token::Minus => UnaryOperator::Neg,
        Token::Hash => UnaryOperator::Len,
        Token::Tilde => UnaryOperator::BNot,
        _ => return None,
    })
}

fn binary_op(t: &Token) -> Option<BinaryOperator> {
    use BinaryOperator::*;
    Some(match t {
        Token::Plus => Add,
        Token::Minus => Sub,
        Token::Star => Mul,
        Token::Slash => Div,
        Token::DSlash => IDiv,
        Token::Percent => Mod,
        Token::Caret => Pow,
        Token::Concat => Concat,
        Token::Eq => Eq,
        Token::Ne => Ne,
        Token::Lt => Lt,
        Token::Le => Le,
        Token::Gt => Gt,
        Token::Ge => Ge,
        Token::And => And,
        Token::Or => Or,
        Token::Amp => BAnd,
        Token::Pipe => BOr,
        Token::Tilde => BXor,
        Token::Shl => Shl,
        Token::Shr => Shr,
        _ => return None,
    })
}
