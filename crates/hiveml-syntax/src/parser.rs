//! Recursive-descent parser. Produces the AST in `crate::ast`; reports
//! only the first error it hits, matching the core's error-recovery
//! Non-goal.

use hiveml_common::Span;

use crate::ast::*;
use crate::lexer::{lex, LexError, Tok, Token};

#[derive(Clone, Debug, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError { message: e.message, span: e.span }
    }
}

pub fn parse(src: &str) -> Result<Program, ParseError> {
    let tokens = lex(src)?;
    let mut p = Parser { tokens, pos: 0 };
    let bindings = p.bindings_until_eof()?;
    Ok(Program { bindings })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

type PResult<T> = Result<T, ParseError>;

impl Parser {
    fn peek(&self) -> &Tok {
        &self.tokens[self.pos].tok
    }

    fn span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        ParseError { message: message.into(), span: self.span() }
    }

    fn expect(&mut self, tok: Tok) -> PResult<Span> {
        if *self.peek() == tok {
            Ok(self.advance().span)
        } else {
            Err(self.err(format!("expected {tok:?}, found {:?}", self.peek())))
        }
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == tok {
            self.advance();
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> PResult<(String, Span)> {
        match self.peek().clone() {
            Tok::Ident(name) => {
                let span = self.advance().span;
                Ok((name, span))
            }
            other => Err(self.err(format!("expected identifier, found {other:?}"))),
        }
    }

    fn module_ident(&mut self) -> PResult<(String, Span)> {
        match self.peek().clone() {
            Tok::ModuleIdent(name) => {
                let span = self.advance().span;
                Ok((name, span))
            }
            other => Err(self.err(format!("expected capitalized identifier, found {other:?}"))),
        }
    }

    // ---- top level ---------------------------------------------------

    fn bindings_until_eof(&mut self) -> PResult<Vec<Spanned<Binding>>> {
        let mut out = Vec::new();
        while *self.peek() != Tok::Eof {
            out.push(self.binding()?);
        }
        Ok(out)
    }

    fn binding(&mut self) -> PResult<Spanned<Binding>> {
        let start = self.span();
        match self.peek().clone() {
            Tok::KwVal => {
                self.advance();
                let recursive = self.eat(&Tok::KwRec);
                let mut bindings = vec![self.one_val_binding()?];
                while self.eat(&Tok::KwAnd) {
                    bindings.push(self.one_val_binding()?);
                }
                let end = self.tokens[self.pos.saturating_sub(1)].span;
                Ok(Spanned::new(Binding::Val { recursive, bindings }, start.merge(end)))
            }
            Tok::KwExternal => {
                self.advance();
                let (name, _) = self.ident()?;
                self.expect(Tok::Colon)?;
                let ty = self.type_expr()?;
                let arity = match self.peek().clone() {
                    Tok::Int(n) => {
                        self.advance();
                        n as usize
                    }
                    _ => 0,
                };
                Ok(Spanned::new(Binding::External { name, ty, arity }, start))
            }
            Tok::KwType => {
                self.advance();
                let mut decls = vec![self.type_decl()?];
                while self.eat(&Tok::KwAnd) {
                    decls.push(self.type_decl()?);
                }
                Ok(Spanned::new(Binding::Type(decls), start))
            }
            Tok::KwModule => {
                self.advance();
                let (name, _) = self.module_ident()?;
                let sig = if self.eat(&Tok::Colon) { Some(self.sig_expr()?) } else { None };
                self.expect(Tok::Equal)?;
                let expr = self.module_expr()?;
                Ok(Spanned::new(Binding::Module { name, sig, expr }, start))
            }
            Tok::KwInclude => {
                self.advance();
                let m = self.module_expr()?;
                Ok(Spanned::new(Binding::Include(m), start))
            }
            Tok::KwSignature => {
                self.advance();
                let (name, _) = self.module_ident()?;
                self.expect(Tok::Equal)?;
                let sig = self.sig_expr()?;
                Ok(Spanned::new(Binding::Sig { name, sig }, start))
            }
            other => Err(self.err(format!("expected a top-level binding, found {other:?}"))),
        }
    }

    fn one_val_binding(&mut self) -> PResult<(String, Spanned<Expr>)> {
        let (name, name_span) = self.ident()?;
        if *self.peek() == Tok::LParen {
            let params = self.params()?;
            self.expect(Tok::Equal)?;
            let body = self.expr()?;
            let span = name_span.merge(body.span);
            let lambda = Expr::Lambda { self_name: None, params, body: Box::new(body) };
            Ok((name, Spanned::new(lambda, span)))
        } else {
            self.expect(Tok::Equal)?;
            let body = self.expr()?;
            Ok((name, body))
        }
    }

    fn params(&mut self) -> PResult<Params> {
        self.expect(Tok::LParen)?;
        let mut params = Params::default();
        while *self.peek() != Tok::RParen {
            match self.peek().clone() {
                Tok::Label(label) => {
                    self.advance();
                    let pattern = self.pattern()?;
                    if self.eat(&Tok::Question) {
                        let default = if self.eat(&Tok::Equal) { Some(self.expr()?) } else { None };
                        params.optional.push(OptionalParam { label, pattern, default });
                    } else {
                        params.mandatory.push(Labeled { label, value: pattern });
                    }
                }
                _ => params.ordered.push(self.pattern()?),
            }
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        self.expect(Tok::RParen)?;
        Ok(params)
    }

    // ---- types ---------------------------------------------------------

    fn type_decl(&mut self) -> PResult<TypeDecl> {
        let (name, _) = self.ident()?;
        let params = self.type_param_list()?;
        self.expect(Tok::Equal)?;
        if *self.peek() == Tok::Pipe || matches!(self.peek(), Tok::ModuleIdent(_)) {
            let mut ctors = Vec::new();
            self.eat(&Tok::Pipe);
            loop {
                let (cname, _) = self.module_ident()?;
                let mut cparams = Vec::new();
                if self.eat(&Tok::LParen) {
                    while *self.peek() != Tok::RParen {
                        cparams.push(self.type_expr()?);
                        if !self.eat(&Tok::Comma) {
                            break;
                        }
                    }
                    self.expect(Tok::RParen)?;
                }
                ctors.push(CtorDecl { name: cname, params: cparams });
                if !self.eat(&Tok::Pipe) {
                    break;
                }
            }
            Ok(TypeDecl::Variant { name, params, ctors })
        } else {
            let body = self.type_expr()?;
            Ok(TypeDecl::Synonym { name, params, body })
        }
    }

    fn type_param_list(&mut self) -> PResult<Vec<String>> {
        let mut params = Vec::new();
        if self.eat(&Tok::LParen) {
            while *self.peek() != Tok::RParen {
                let (name, _) = self.ident()?;
                params.push(name);
                if !self.eat(&Tok::Comma) {
                    break;
                }
            }
            self.expect(Tok::RParen)?;
        }
        Ok(params)
    }

    fn type_expr(&mut self) -> PResult<Spanned<TypeExpr>> {
        let dom_or_atom = self.type_atom()?;
        if self.eat(&Tok::Arrow) {
            let ret = self.type_expr()?;
            let domain = atom_to_domain(dom_or_atom.clone());
            let span = dom_or_atom.span.merge(ret.span);
            return Ok(Spanned::new(TypeExpr::Function(domain, Box::new(ret)), span));
        }
        if self.eat(&Tok::EffArrowOpen) {
            let eff = self.type_expr()?;
            self.expect(Tok::RBracket)?;
            self.expect(Tok::Arrow)?;
            let ret = self.type_expr()?;
            let domain = atom_to_domain(dom_or_atom.clone());
            let span = dom_or_atom.span.merge(ret.span);
            return Ok(Spanned::new(TypeExpr::Effectful(domain, Box::new(eff), Box::new(ret)), span));
        }
        Ok(dom_or_atom)
    }

    fn type_atom(&mut self) -> PResult<Spanned<TypeExpr>> {
        let start = self.span();
        match self.peek().clone() {
            Tok::Ident(name) => {
                self.advance();
                let args = self.maybe_type_args()?;
                let end = self.tokens[self.pos.saturating_sub(1)].span;
                if args.is_empty() {
                    Ok(Spanned::new(TypeExpr::Var(name), start))
                } else {
                    Ok(Spanned::new(TypeExpr::Con(name, args), start.merge(end)))
                }
            }
            Tok::ModuleIdent(_) => {
                let mut path = vec![self.module_ident()?.0];
                while self.eat(&Tok::Dot) {
                    match self.peek().clone() {
                        Tok::ModuleIdent(_) => path.push(self.module_ident()?.0),
                        Tok::Ident(name) => {
                            self.advance();
                            let args = self.maybe_type_args()?;
                            let base = path.pop().expect("at least one path segment");
                            path.insert(0, base);
                            return Ok(Spanned::new(TypeExpr::ModuleProjected(path, name, args), start));
                        }
                        _ => return Err(self.err("expected type name after module projection")),
                    }
                }
                let last = path.pop().expect("at least one path segment");
                Ok(Spanned::new(TypeExpr::Con(last, vec![]), start))
            }
            Tok::LParen => {
                self.advance();
                let inner = self.type_expr()?;
                self.expect(Tok::RParen)?;
                Ok(inner)
            }
            Tok::LBrace => {
                self.advance();
                let mut fields = Vec::new();
                let mut extensible = false;
                while *self.peek() != Tok::RBrace {
                    if self.eat(&Tok::Pipe) {
                        // `{ ... | base }` style extension marker, consumed but unused here
                        extensible = true;
                        self.ident()?;
                        break;
                    }
                    let (name, _) = self.ident()?;
                    self.expect(Tok::Colon)?;
                    let ty = self.type_expr()?;
                    fields.push((name, ty));
                    if !self.eat(&Tok::Comma) {
                        break;
                    }
                }
                let end = self.expect(Tok::RBrace)?;
                Ok(Spanned::new(TypeExpr::Record(fields, extensible), start.merge(end)))
            }
            other => Err(self.err(format!("expected a type, found {other:?}"))),
        }
    }

    fn maybe_type_args(&mut self) -> PResult<Vec<Spanned<TypeExpr>>> {
        let mut args = Vec::new();
        if self.eat(&Tok::LParen) {
            while *self.peek() != Tok::RParen {
                args.push(self.type_expr()?);
                if !self.eat(&Tok::Comma) {
                    break;
                }
            }
            self.expect(Tok::RParen)?;
        }
        Ok(args)
    }

    // ---- signatures ------------------------------------------------------

    fn sig_expr(&mut self) -> PResult<Spanned<SigExpr>> {
        let start = self.span();
        let mut base = match self.peek().clone() {
            Tok::ModuleIdent(name) => {
                self.advance();
                Spanned::new(SigExpr::Name(name), start)
            }
            Tok::KwSig => {
                self.advance();
                let mut items = Vec::new();
                while *self.peek() != Tok::KwEnd {
                    items.push(self.sig_item()?);
                }
                let end = self.expect(Tok::KwEnd)?;
                Spanned::new(SigExpr::Sig(items), start.merge(end))
            }
            other => return Err(self.err(format!("expected a signature, found {other:?}"))),
        };
        while self.eat(&Tok::KwWith) {
            self.expect(Tok::KwType)?;
            let (name, _) = self.ident()?;
            self.expect(Tok::Equal)?;
            let ty = self.type_expr()?;
            let span = base.span.merge(ty.span);
            base = Spanned::new(SigExpr::WithType { base: Box::new(base), name, ty }, span);
        }
        Ok(base)
    }

    fn sig_item(&mut self) -> PResult<SigItem> {
        match self.peek().clone() {
            Tok::KwVal => {
                self.advance();
                let (name, _) = self.ident()?;
                self.expect(Tok::Colon)?;
                let ty = self.type_expr()?;
                Ok(SigItem::Val { name, ty })
            }
            Tok::KwType => {
                self.advance();
                let (name, _) = self.ident()?;
                let params = self.type_param_list()?;
                let manifest = if self.eat(&Tok::Equal) { Some(self.type_expr()?) } else { None };
                Ok(SigItem::Type { name, arity: params.len(), manifest })
            }
            Tok::KwModule => {
                self.advance();
                let (name, _) = self.module_ident()?;
                self.expect(Tok::Colon)?;
                let sig = self.sig_expr()?;
                Ok(SigItem::Module { name, sig })
            }
            Tok::KwSignature => {
                self.advance();
                let (name, _) = self.module_ident()?;
                self.expect(Tok::Equal)?;
                let sig = self.sig_expr()?;
                Ok(SigItem::Signature { name, sig })
            }
            other => Err(self.err(format!("expected a signature item, found {other:?}"))),
        }
    }

    // ---- modules --------------------------------------------------------

    fn module_expr(&mut self) -> PResult<Spanned<ModuleExpr>> {
        let start = self.span();
        let mut base = match self.peek().clone() {
            Tok::KwStruct => {
                self.advance();
                let mut bindings = Vec::new();
                while *self.peek() != Tok::KwEnd {
                    bindings.push(self.binding()?);
                }
                let end = self.expect(Tok::KwEnd)?;
                Spanned::new(ModuleExpr::Struct(bindings), start.merge(end))
            }
            Tok::KwFun => {
                self.advance();
                self.expect(Tok::LParen)?;
                let (param, _) = self.module_ident()?;
                self.expect(Tok::Colon)?;
                let param_sig = self.sig_expr()?;
                self.expect(Tok::RParen)?;
                self.expect(Tok::Arrow)?;
                let body = self.module_expr()?;
                let span = start.merge(body.span);
                Spanned::new(ModuleExpr::Functor { param, param_sig, body: Box::new(body) }, span)
            }
            Tok::ModuleIdent(name) => {
                self.advance();
                Spanned::new(ModuleExpr::Var(name), start)
            }
            other => return Err(self.err(format!("expected a module expression, found {other:?}"))),
        };
        loop {
            if *self.peek() == Tok::LParen {
                self.advance();
                let arg = self.module_expr()?;
                let end = self.expect(Tok::RParen)?;
                let span = base.span.merge(end);
                base = Spanned::new(ModuleExpr::Apply(Box::new(base), Box::new(arg)), span);
            } else if self.eat(&Tok::Dot) {
                let (name, end) = self.module_ident()?;
                let span = base.span.merge(end);
                base = Spanned::new(ModuleExpr::Proj(Box::new(base), name), span);
            } else if self.eat(&Tok::Colon) {
                let sig = self.sig_expr()?;
                let span = base.span.merge(sig.span);
                base = Spanned::new(ModuleExpr::Coerce(Box::new(base), sig), span);
            } else {
                break;
            }
        }
        Ok(base)
    }

    // ---- patterns --------------------------------------------------------

    fn pattern(&mut self) -> PResult<Spanned<Pattern>> {
        let lhs = self.pattern_atom()?;
        if self.eat(&Tok::ColonColon) {
            let rhs = self.pattern()?;
            let span = lhs.span.merge(rhs.span);
            return Ok(Spanned::new(Pattern::ListCons(Box::new(lhs), Box::new(rhs)), span));
        }
        Ok(lhs)
    }

    fn pattern_atom(&mut self) -> PResult<Spanned<Pattern>> {
        let start = self.span();
        match self.peek().clone() {
            Tok::Ident(name) => {
                self.advance();
                if name == "_" {
                    Ok(Spanned::new(Pattern::Wildcard, start))
                } else {
                    Ok(Spanned::new(Pattern::Var(name), start))
                }
            }
            Tok::Int(n) => {
                self.advance();
                Ok(Spanned::new(Pattern::Lit(Literal::Int(n)), start))
            }
            Tok::Float(f) => {
                self.advance();
                Ok(Spanned::new(Pattern::Lit(Literal::Float(f)), start))
            }
            Tok::Char(c) => {
                self.advance();
                Ok(Spanned::new(Pattern::Lit(Literal::Char(c)), start))
            }
            Tok::KwTrue => {
                self.advance();
                Ok(Spanned::new(Pattern::Lit(Literal::Bool(true)), start))
            }
            Tok::KwFalse => {
                self.advance();
                Ok(Spanned::new(Pattern::Lit(Literal::Bool(false)), start))
            }
            Tok::ModuleIdent(name) => {
                self.advance();
                let mut args = Vec::new();
                if self.eat(&Tok::LParen) {
                    while *self.peek() != Tok::RParen {
                        args.push(self.pattern()?);
                        if !self.eat(&Tok::Comma) {
                            break;
                        }
                    }
                    self.expect(Tok::RParen)?;
                }
                Ok(Spanned::new(Pattern::Constructor(name, args), start))
            }
            Tok::LBracket => {
                self.advance();
                if self.eat(&Tok::RBracket) {
                    return Ok(Spanned::new(Pattern::ListNil, start));
                }
                let mut items = Vec::new();
                while *self.peek() != Tok::RBracket {
                    items.push(self.pattern()?);
                    if !self.eat(&Tok::Comma) {
                        break;
                    }
                }
                let end = self.expect(Tok::RBracket)?;
                let mut list = Spanned::new(Pattern::ListNil, end);
                for item in items.into_iter().rev() {
                    let span = item.span.merge(list.span);
                    list = Spanned::new(Pattern::ListCons(Box::new(item), Box::new(list)), span);
                }
                Ok(list)
            }
            Tok::LBrace => {
                self.advance();
                let mut fields = Vec::new();
                while *self.peek() != Tok::RBrace {
                    let (label, _) = self.ident()?;
                    self.expect(Tok::Equal)?;
                    let pattern = self.pattern()?;
                    fields.push(Labeled { label, value: pattern });
                    if !self.eat(&Tok::Comma) {
                        break;
                    }
                }
                let end = self.expect(Tok::RBrace)?;
                Ok(Spanned::new(Pattern::Record(fields), start.merge(end)))
            }
            Tok::LParen => {
                self.advance();
                let mut items = vec![self.pattern()?];
                while self.eat(&Tok::Comma) {
                    items.push(self.pattern()?);
                }
                let end = self.expect(Tok::RParen)?;
                if items.len() == 1 {
                    Ok(items.pop().unwrap())
                } else {
                    Ok(Spanned::new(Pattern::Tuple(items), start.merge(end)))
                }
            }
            other => Err(self.err(format!("expected a pattern, found {other:?}"))),
        }
    }

    // ---- expressions ------------------------------------------------------

    fn expr(&mut self) -> PResult<Spanned<Expr>> {
        let start = self.span();
        match self.peek().clone() {
            Tok::KwLet => {
                self.advance();
                if self.eat(&Tok::KwRec) {
                    let mut bindings = vec![self.one_val_binding()?];
                    while self.eat(&Tok::KwAnd) {
                        bindings.push(self.one_val_binding()?);
                    }
                    self.expect(Tok::KwIn)?;
                    let body = self.expr()?;
                    let span = start.merge(body.span);
                    Ok(Spanned::new(Expr::LetRec { bindings, body: Box::new(body) }, span))
                } else {
                    let (name, value) = self.one_val_binding()?;
                    self.expect(Tok::KwIn)?;
                    let body = self.expr()?;
                    let span = start.merge(body.span);
                    Ok(Spanned::new(Expr::Let { name, value: Box::new(value), body: Box::new(body) }, span))
                }
            }
            Tok::KwFun => {
                self.advance();
                let params = self.params()?;
                self.expect(Tok::Arrow)?;
                let body = self.expr()?;
                let span = start.merge(body.span);
                Ok(Spanned::new(Expr::Lambda { self_name: None, params, body: Box::new(body) }, span))
            }
            Tok::KwIf => {
                self.advance();
                let cond = self.expr()?;
                self.expect(Tok::KwThen)?;
                let then_branch = self.expr()?;
                self.expect(Tok::KwElse)?;
                let else_branch = self.expr()?;
                let span = start.merge(else_branch.span);
                Ok(Spanned::new(Expr::If(Box::new(cond), Box::new(then_branch), Box::new(else_branch)), span))
            }
            Tok::KwCase => {
                self.advance();
                let scrutinee = self.expr()?;
                self.expect(Tok::KwOf)?;
                let branches = self.branches()?;
                let end = self.expect(Tok::KwEnd)?;
                Ok(Spanned::new(Expr::Case(Box::new(scrutinee), branches), start.merge(end)))
            }
            Tok::KwReceive => {
                self.advance();
                let branches = self.branches()?;
                let end = self.expect(Tok::KwEnd)?;
                Ok(Spanned::new(Expr::Receive(branches), start.merge(end)))
            }
            Tok::KwDo => {
                self.advance();
                let (name, _) = self.ident()?;
                self.expect(Tok::LeftArrow)?;
                let value = self.expr()?;
                self.expect(Tok::KwIn)?;
                let body = self.expr()?;
                let span = start.merge(body.span);
                Ok(Spanned::new(Expr::Do { name, value: Box::new(value), body: Box::new(body) }, span))
            }
            Tok::KwSpawn => {
                self.advance();
                self.expect(Tok::LParen)?;
                let inner = self.expr()?;
                let end = self.expect(Tok::RParen)?;
                Ok(Spanned::new(Expr::Spawn(Box::new(inner)), start.merge(end)))
            }
            Tok::KwSelf => {
                self.advance();
                self.expect(Tok::LParen)?;
                let end = self.expect(Tok::RParen)?;
                Ok(Spanned::new(Expr::SelfPid, start.merge(end)))
            }
            Tok::KwSend => {
                self.advance();
                self.expect(Tok::LParen)?;
                let target = self.expr()?;
                self.expect(Tok::Comma)?;
                let msg = self.expr()?;
                let end = self.expect(Tok::RParen)?;
                Ok(Spanned::new(Expr::Send(Box::new(target), Box::new(msg)), start.merge(end)))
            }
            Tok::KwFreeze => {
                self.advance();
                let (name, _) = self.ident()?;
                self.expect(Tok::LParen)?;
                let mut args = Vec::new();
                while *self.peek() != Tok::RParen {
                    args.push(self.expr()?);
                    if !self.eat(&Tok::Comma) {
                        break;
                    }
                }
                let end = self.expect(Tok::RParen)?;
                Ok(Spanned::new(Expr::Freeze(name, args), start.merge(end)))
            }
            _ => self.apply_expr(),
        }
    }

    fn branches(&mut self) -> PResult<Vec<Branch>> {
        let mut branches = Vec::new();
        self.eat(&Tok::Pipe);
        loop {
            let pattern = self.pattern()?;
            self.expect(Tok::Arrow)?;
            let body = self.expr()?;
            branches.push(Branch { pattern, body });
            if !self.eat(&Tok::Pipe) {
                break;
            }
        }
        Ok(branches)
    }

    fn apply_expr(&mut self) -> PResult<Spanned<Expr>> {
        let mut e = self.cons_expr()?;
        loop {
            if *self.peek() == Tok::LParen {
                self.advance();
                let args = self.call_args()?;
                let end = self.expect(Tok::RParen)?;
                let span = e.span.merge(end);
                e = Spanned::new(Expr::Apply(Box::new(e), args), span);
            } else if self.eat(&Tok::Dot) {
                let (name, end) = self.ident()?;
                let span = e.span.merge(end);
                e = Spanned::new(Expr::RecordAccess(Box::new(e), name), span);
            } else if matches!(self.peek(), Tok::LBrace)
                && matches!(e.node, Expr::Var(_) | Expr::RecordAccess(..) | Expr::ModuleVar(..))
            {
                // record-update sugar: `e{ field = v, ... }`
                self.advance();
                let mut fields = Vec::new();
                while *self.peek() != Tok::RBrace {
                    let (label, _) = self.ident()?;
                    self.expect(Tok::Equal)?;
                    let value = self.expr()?;
                    fields.push(Labeled { label, value });
                    if !self.eat(&Tok::Comma) {
                        break;
                    }
                }
                let end = self.expect(Tok::RBrace)?;
                let span = e.span.merge(end);
                e = Spanned::new(Expr::RecordUpdate(Box::new(e), fields), span);
            } else {
                break;
            }
        }
        Ok(e)
    }

    fn call_args(&mut self) -> PResult<CallArgs> {
        let mut args = CallArgs::default();
        while *self.peek() != Tok::RParen {
            match self.peek().clone() {
                Tok::Label(label) => {
                    self.advance();
                    if self.eat(&Tok::Question) {
                        let value = self.expr()?;
                        args.optional.push(Labeled { label, value });
                    } else {
                        let value = self.expr()?;
                        args.mandatory.push(Labeled { label, value });
                    }
                }
                _ => args.ordered.push(self.expr()?),
            }
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        Ok(args)
    }

    fn cons_expr(&mut self) -> PResult<Spanned<Expr>> {
        let lhs = self.atom_expr()?;
        if self.eat(&Tok::ColonColon) {
            let rhs = self.cons_expr()?;
            let span = lhs.span.merge(rhs.span);
            return Ok(Spanned::new(Expr::ListCons(Box::new(lhs), Box::new(rhs)), span));
        }
        Ok(lhs)
    }

    fn atom_expr(&mut self) -> PResult<Spanned<Expr>> {
        let start = self.span();
        let base = match self.peek().clone() {
            Tok::Int(n) => {
                self.advance();
                Spanned::new(Expr::Lit(Literal::Int(n)), start)
            }
            Tok::Float(f) => {
                self.advance();
                Spanned::new(Expr::Lit(Literal::Float(f)), start)
            }
            Tok::Char(c) => {
                self.advance();
                Spanned::new(Expr::Lit(Literal::Char(c)), start)
            }
            Tok::StringLit(s) => {
                self.advance();
                Spanned::new(Expr::Lit(Literal::Binary(s.into_bytes())), start)
            }
            Tok::FormatLit(s) => {
                self.advance();
                Spanned::new(Expr::Lit(Literal::Format(s)), start)
            }
            Tok::KwTrue => {
                self.advance();
                Spanned::new(Expr::Lit(Literal::Bool(true)), start)
            }
            Tok::KwFalse => {
                self.advance();
                Spanned::new(Expr::Lit(Literal::Bool(false)), start)
            }
            Tok::Ident(name) => {
                self.advance();
                Spanned::new(Expr::Var(name), start)
            }
            Tok::ModuleIdent(_) => {
                let mut path = vec![self.module_ident()?.0];
                if *self.peek() == Tok::LParen {
                    // constructor application
                    let name = path.pop().unwrap();
                    self.advance();
                    let mut args = Vec::new();
                    while *self.peek() != Tok::RParen {
                        args.push(self.expr()?);
                        if !self.eat(&Tok::Comma) {
                            break;
                        }
                    }
                    let end = self.expect(Tok::RParen)?;
                    return Ok(Spanned::new(Expr::Constructor(name, args), start.merge(end)));
                }
                while self.eat(&Tok::Dot) {
                    match self.peek().clone() {
                        Tok::ModuleIdent(_) => path.push(self.module_ident()?.0),
                        Tok::Ident(name) => {
                            self.advance();
                            let end = self.tokens[self.pos.saturating_sub(1)].span;
                            return Ok(Spanned::new(Expr::ModuleVar(path, name), start.merge(end)));
                        }
                        _ => return Err(self.err("expected a value name after module projection")),
                    }
                }
                let name = path.pop().unwrap();
                Spanned::new(Expr::Constructor(name, vec![]), start)
            }
            Tok::LParen => {
                self.advance();
                if self.eat(&Tok::RParen) {
                    return Ok(Spanned::new(Expr::Lit(Literal::Unit), start));
                }
                let mut items = vec![self.expr()?];
                while self.eat(&Tok::Comma) {
                    items.push(self.expr()?);
                }
                let end = self.expect(Tok::RParen)?;
                if items.len() == 1 {
                    items.pop().unwrap()
                } else {
                    Spanned::new(Expr::Tuple(items), start.merge(end))
                }
            }
            Tok::LBracket => {
                self.advance();
                if self.eat(&Tok::RBracket) {
                    return Ok(Spanned::new(Expr::ListNil, start));
                }
                let mut items = Vec::new();
                while *self.peek() != Tok::RBracket {
                    items.push(self.expr()?);
                    if !self.eat(&Tok::Comma) {
                        break;
                    }
                }
                let end = self.expect(Tok::RBracket)?;
                let mut list = Spanned::new(Expr::ListNil, end);
                for item in items.into_iter().rev() {
                    let span = item.span.merge(list.span);
                    list = Spanned::new(Expr::ListCons(Box::new(item), Box::new(list)), span);
                }
                list
            }
            Tok::LBrace => {
                self.advance();
                let mut fields = Vec::new();
                while *self.peek() != Tok::RBrace {
                    let (label, _) = self.ident()?;
                    self.expect(Tok::Equal)?;
                    let value = self.expr()?;
                    fields.push(Labeled { label, value });
                    if !self.eat(&Tok::Comma) {
                        break;
                    }
                }
                let end = self.expect(Tok::RBrace)?;
                Spanned::new(Expr::RecordLit(fields), start.merge(end))
            }
            other => return Err(self.err(format!("expected an expression, found {other:?}"))),
        };
        if self.eat(&Tok::Colon) {
            let ty = self.type_expr()?;
            let span = base.span.merge(ty.span);
            return Ok(Spanned::new(Expr::Annot(Box::new(base), Box::new(ty)), span));
        }
        Ok(base)
    }
}

fn atom_to_domain(atom: Spanned<TypeExpr>) -> DomainExpr {
    // `(t1, t2) -> t3` parses its left side as a tuple-shaped atom only
    // when written with parens and commas; our grammar treats the single
    // left-hand type as the one positional argument of the domain, which
    // matches how single-argument functions dominate the example corpus.
    DomainExpr { ordered: vec![atom], mandatory: Vec::new(), optional: Vec::new() }
}
