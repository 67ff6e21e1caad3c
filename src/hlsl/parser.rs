use super::ast::*;
use super::token::{Token, TokenKind, data_type_from_str};
use crate::option::InputDialect;
use crate::scx_syntax_error;
use crate::utils::err::*;
use crate::utils::info::{Info, InfoNode};
use crate::utils::name::Name;

// Recursive descent over the token vector. A syntax error aborts the declaration being parsed and
// resynchronizes at the next ';' or '}' on the top level; all recorded errors are kept, and the
// first one is reported when parsing finishes.
pub fn parse(tokens: Vec<Token>) -> CompileResult<Ast> {
    parse_dialect(tokens, InputDialect::Strict)
}

pub fn parse_dialect(tokens: Vec<Token>, dialect: InputDialect) -> CompileResult<Ast> {
    let mut p = Parser {tokens, pos: 0, errors: vec![], dialect};
    let ast = p.parse_unit();
    match p.errors.into_iter().next() {
        Some(e) => Err(e),
        None => Ok(ast),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<CompileError>,
    dialect: InputDialect,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_at(&self, n: usize) -> &TokenKind {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)].kind
    }

    fn info(&self) -> Info {
        self.tokens[self.pos.min(self.tokens.len() - 1)].get_info()
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn accept(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> CompileResult<Token> {
        if self.peek() == kind {
            Ok(self.advance())
        } else {
            let i = self.info();
            let found = self.peek().clone();
            scx_syntax_error!(i, "Expected {kind}, found {found}")
        }
    }

    fn expect_ident(&mut self) -> CompileResult<(String, Info)> {
        let i = self.info();
        match self.peek().clone() {
            TokenKind::Ident(s) => {
                self.advance();
                Ok((s, i))
            },
            found => scx_syntax_error!(i, "Expected identifier, found {found}"),
        }
    }

    // Skips ahead to the end of the broken declaration so that the following declarations can
    // still be checked.
    fn synchronize(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek() {
                TokenKind::Eof => return,
                TokenKind::LBrace => {
                    depth += 1;
                    self.advance();
                },
                TokenKind::RBrace => {
                    self.advance();
                    if depth <= 1 {
                        self.accept(&TokenKind::Semicolon);
                        return;
                    }
                    depth -= 1;
                },
                TokenKind::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                },
                _ => {
                    self.advance();
                },
            }
        }
    }

    fn parse_unit(&mut self) -> Ast {
        let mut tops = vec![];
        while self.peek() != &TokenKind::Eof {
            match self.parse_top() {
                Ok(top) => tops.push(top),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                },
            }
        }
        tops
    }

    fn parse_top(&mut self) -> CompileResult<Top> {
        let attrs = self.parse_attributes()?;
        let i = self.info();
        match self.peek().clone() {
            TokenKind::Struct => self.parse_struct_def(i),
            TokenKind::CBuffer => self.parse_constant_buffer(UniformBufferType::CBuffer, i),
            TokenKind::TBuffer => self.parse_constant_buffer(UniformBufferType::TBuffer, i),
            TokenKind::Typedef => self.parse_alias_def(i),
            TokenKind::Ident(id) if BUFFER_TYPES.contains_key(id.as_str()) => {
                self.parse_buffer_decl(i)
            },
            TokenKind::Ident(id)
                if id == "SamplerState" || id == "SamplerComparisonState" =>
            {
                self.parse_sampler_decl(i)
            },
            _ => self.parse_function_or_global(attrs, i),
        }
    }

    fn parse_attributes(&mut self) -> CompileResult<Vec<Attribute>> {
        let mut attrs = vec![];
        while self.peek() == &TokenKind::LBracket {
            let i = self.info();
            self.advance();
            let (id, _) = self.expect_ident()?;
            let mut args = vec![];
            if self.accept(&TokenKind::LParen) {
                if self.peek() != &TokenKind::RParen {
                    loop {
                        args.push(self.parse_expr()?);
                        if !self.accept(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RParen)?;
            }
            self.expect(&TokenKind::RBracket)?;
            attrs.push(Attribute {id, args, i});
        }
        Ok(attrs)
    }

    fn is_type_modifier(&self) -> bool {
        match self.peek() {
            TokenKind::Extern | TokenKind::Precise | TokenKind::Shared |
            TokenKind::Static | TokenKind::Uniform | TokenKind::Volatile |
            TokenKind::Linear | TokenKind::Centroid | TokenKind::NoInterpolation |
            TokenKind::NoPerspective | TokenKind::Sample | TokenKind::Const |
            TokenKind::RowMajor | TokenKind::ColumnMajor | TokenKind::SNorm |
            TokenKind::UNorm => true,
            _ => false,
        }
    }

    fn starts_type(&self) -> bool {
        match self.peek() {
            TokenKind::Void => true,
            _ if self.is_type_modifier() => true,
            TokenKind::Ident(id) => {
                data_type_from_str(id).is_some()
                    || BUFFER_TYPES.contains_key(id.as_str())
                    || id == "SamplerState"
                    || id == "SamplerComparisonState"
                    || id == "vector"
                    || id == "matrix"
                    // A user-defined type followed by a declarator name.
                    || matches!(self.peek_at(1), TokenKind::Ident(_))
            },
            _ => false,
        }
    }

    fn parse_type_spec(&mut self) -> CompileResult<TypeSpec> {
        let i = self.info();
        let mut storage = vec![];
        let mut interp = vec![];
        let mut modifiers = vec![];
        loop {
            match self.peek() {
                TokenKind::Extern => storage.push(StorageClass::Extern),
                TokenKind::Precise => storage.push(StorageClass::Precise),
                TokenKind::Shared => storage.push(StorageClass::Shared),
                TokenKind::Static => storage.push(StorageClass::Static),
                TokenKind::Uniform => storage.push(StorageClass::Uniform),
                TokenKind::Volatile => storage.push(StorageClass::Volatile),
                TokenKind::Linear => interp.push(InterpModifier::Linear),
                TokenKind::Centroid => interp.push(InterpModifier::Centroid),
                TokenKind::NoInterpolation => interp.push(InterpModifier::NoInterpolation),
                TokenKind::NoPerspective => interp.push(InterpModifier::NoPerspective),
                TokenKind::Sample => interp.push(InterpModifier::Sample),
                TokenKind::Const => modifiers.push(TypeModifier::Const),
                TokenKind::RowMajor => modifiers.push(TypeModifier::RowMajor),
                TokenKind::ColumnMajor => modifiers.push(TypeModifier::ColumnMajor),
                TokenKind::SNorm => modifiers.push(TypeModifier::SNorm),
                TokenKind::UNorm => modifiers.push(TypeModifier::UNorm),
                _ => break,
            }
            self.advance();
        }
        let ty = self.parse_type()?;
        Ok(TypeSpec {ty, storage, interp, modifiers, i})
    }

    fn parse_type(&mut self) -> CompileResult<Type> {
        let i = self.info();
        if self.accept(&TokenKind::Void) {
            return Ok(Type::Void);
        }
        let (id, _) = self.expect_ident()?;
        if let Some(dt) = data_type_from_str(&id) {
            return Ok(Type::Data(dt));
        }
        if let Some(kind) = BUFFER_TYPES.get(id.as_str()) {
            let elem = self.parse_template_elem()?;
            return Ok(Type::Buffer {kind: *kind, elem: Box::new(elem)});
        }
        match id.as_str() {
            "SamplerState" => Ok(Type::Sampler {kind: SamplerType::SamplerState}),
            "SamplerComparisonState" => {
                Ok(Type::Sampler {kind: SamplerType::SamplerComparisonState})
            },
            "vector" => {
                self.expect(&TokenKind::Lt)?;
                let base = self.parse_scalar_base()?;
                self.expect(&TokenKind::Comma)?;
                let n = self.parse_small_int()?;
                self.expect(&TokenKind::Gt)?;
                match crate::utils::data_type::vector_data_type(base, n) {
                    Some(dt) => Ok(Type::Data(dt)),
                    None => scx_syntax_error!(i, "Invalid vector dimension {n}"),
                }
            },
            "matrix" => {
                self.expect(&TokenKind::Lt)?;
                let base = self.parse_scalar_base()?;
                self.expect(&TokenKind::Comma)?;
                let r = self.parse_small_int()?;
                self.expect(&TokenKind::Comma)?;
                let c = self.parse_small_int()?;
                self.expect(&TokenKind::Gt)?;
                match crate::utils::data_type::matrix_data_type(base, r, c) {
                    Some(dt) => Ok(Type::Data(dt)),
                    None => scx_syntax_error!(i, "Invalid matrix dimension {r}x{c}"),
                }
            },
            _ => Ok(Type::Struct {id: Name::new(id)}),
        }
    }

    fn parse_scalar_base(&mut self) -> CompileResult<DataType> {
        let (id, i) = self.expect_ident()?;
        match data_type_from_str(&id) {
            Some(dt) if dt.is_scalar() => Ok(dt),
            _ => scx_syntax_error!(i, "Expected scalar type name, found '{id}'"),
        }
    }

    fn parse_small_int(&mut self) -> CompileResult<usize> {
        let i = self.info();
        match self.peek().clone() {
            TokenKind::IntLit(text) => {
                self.advance();
                match text.parse::<usize>() {
                    Ok(v) => Ok(v),
                    Err(_) => scx_syntax_error!(i, "Invalid integer '{text}'"),
                }
            },
            found => scx_syntax_error!(i, "Expected integer literal, found {found}"),
        }
    }

    // Optional "<T>" element type of a buffer object; unannotated buffers hold float4.
    fn parse_template_elem(&mut self) -> CompileResult<Type> {
        if self.accept(&TokenKind::Lt) {
            let elem = self.parse_type()?;
            self.expect(&TokenKind::Gt)?;
            Ok(elem)
        } else {
            Ok(Type::Data(DataType::Float4))
        }
    }

    fn parse_struct_def(&mut self, i: Info) -> CompileResult<Top> {
        self.expect(&TokenKind::Struct)?;
        let (id, _) = self.expect_ident()?;
        let base = if self.accept(&TokenKind::Colon) {
            let (b, _) = self.expect_ident()?;
            Some(Name::new(b))
        } else {
            None
        };
        self.expect(&TokenKind::LBrace)?;
        let mut fields = vec![];
        while !self.accept(&TokenKind::RBrace) {
            fields.append(&mut self.parse_struct_fields()?);
        }
        self.expect(&TokenKind::Semicolon)?;
        Ok(Top::StructDef {id: Name::new(id), base, fields, i})
    }

    fn parse_struct_fields(&mut self) -> CompileResult<Vec<StructField>> {
        let spec = self.parse_type_spec()?;
        let mut fields = vec![];
        loop {
            let (id, fi) = self.expect_ident()?;
            let dims = self.parse_array_dims()?;
            let semantic = self.parse_opt_semantic()?;
            fields.push(StructField {
                interp: spec.interp.clone(),
                ty: spec.ty.clone(),
                id,
                dims,
                semantic,
                i: fi,
            });
            if !self.accept(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::Semicolon)?;
        Ok(fields)
    }

    fn parse_opt_semantic(&mut self) -> CompileResult<Option<IndexedSemantic>> {
        if self.accept(&TokenKind::Colon) {
            let (s, _) = self.expect_ident()?;
            Ok(Some(IndexedSemantic::parse(&s)))
        } else {
            Ok(None)
        }
    }

    fn parse_register(&mut self) -> CompileResult<Option<Register>> {
        if self.peek() != &TokenKind::Colon
            || self.peek_at(1) != &TokenKind::Register
        {
            return Ok(None);
        }
        self.advance();
        let i = self.info();
        self.advance();
        self.expect(&TokenKind::LParen)?;
        let (slot_text, slot_info) = self.expect_ident()?;
        self.expect(&TokenKind::RParen)?;
        let mut chars = slot_text.chars();
        let prefix = chars.next().unwrap_or(' ');
        let ty = match RegisterType::from_char(prefix) {
            Some(ty) => ty,
            None => {
                return scx_syntax_error!(
                    slot_info, "Invalid register prefix '{prefix}' in '{slot_text}'"
                );
            },
        };
        let digits: String = chars.collect();
        let slot = match digits.parse::<usize>() {
            Ok(v) => v,
            Err(_) => {
                return scx_syntax_error!(
                    slot_info, "Invalid register slot in '{slot_text}'"
                );
            },
        };
        Ok(Some(Register {ty, slot, i}))
    }

    fn parse_pack_offset(&mut self) -> CompileResult<Option<PackOffset>> {
        if self.peek() != &TokenKind::Colon
            || self.peek_at(1) != &TokenKind::PackOffset
        {
            return Ok(None);
        }
        self.advance();
        let i = self.info();
        self.advance();
        self.expect(&TokenKind::LParen)?;
        let (reg, reg_info) = self.expect_ident()?;
        let row = match reg.strip_prefix('c').map(|d| d.parse::<usize>()) {
            Some(Ok(v)) => v,
            _ => {
                return scx_syntax_error!(reg_info, "Invalid pack offset '{reg}'");
            },
        };
        let component = if self.accept(&TokenKind::Dot) {
            let (c, ci) = self.expect_ident()?;
            match c.as_str() {
                "x" | "y" | "z" | "w" => c.chars().next(),
                _ => {
                    return scx_syntax_error!(ci, "Invalid pack offset component '{c}'");
                },
            }
        } else {
            None
        };
        self.expect(&TokenKind::RParen)?;
        Ok(Some(PackOffset {row, component, i}))
    }

    fn parse_constant_buffer(
        &mut self,
        kind: UniformBufferType,
        i: Info
    ) -> CompileResult<Top> {
        self.advance();
        let (id, _) = self.expect_ident()?;
        let register = self.parse_register()?;
        self.expect(&TokenKind::LBrace)?;
        let mut fields = vec![];
        while !self.accept(&TokenKind::RBrace) {
            let spec = self.parse_type_spec()?;
            loop {
                let (fid, fi) = self.expect_ident()?;
                let dims = self.parse_array_dims()?;
                let pack_offset = self.parse_pack_offset()?;
                fields.push(CBufferField {
                    ty: spec.ty.clone(),
                    id: Name::new(fid),
                    dims,
                    pack_offset,
                    i: fi,
                });
                if !self.accept(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::Semicolon)?;
        }
        self.accept(&TokenKind::Semicolon);
        Ok(Top::ConstantBuffer {kind, id: Name::new(id), register, fields, i})
    }

    fn parse_alias_def(&mut self, i: Info) -> CompileResult<Top> {
        self.expect(&TokenKind::Typedef)?;
        let spec = self.parse_type_spec()?;
        let (id, _) = self.expect_ident()?;
        self.expect(&TokenKind::Semicolon)?;
        Ok(Top::AliasDef {id: Name::new(id), ty: spec.ty, i})
    }

    fn parse_buffer_decl(&mut self, i: Info) -> CompileResult<Top> {
        let ty = self.parse_type()?;
        let (kind, elem) = match ty {
            Type::Buffer {kind, elem} => (kind, *elem),
            _ => {
                return scx_syntax_error!(i, "Expected buffer object type");
            },
        };
        let (id, _) = self.expect_ident()?;
        let dims = self.parse_array_dims()?;
        let register = self.parse_register()?;
        self.expect(&TokenKind::Semicolon)?;
        Ok(Top::BufferDecl {kind, elem, id: Name::new(id), dims, register, i})
    }

    fn parse_sampler_decl(&mut self, i: Info) -> CompileResult<Top> {
        let ty = self.parse_type()?;
        let kind = match ty {
            Type::Sampler {kind} => kind,
            _ => {
                return scx_syntax_error!(i, "Expected sampler type");
            },
        };
        let (id, _) = self.expect_ident()?;
        let register = self.parse_register()?;
        let mut state = vec![];
        if self.accept(&TokenKind::LBrace) {
            while !self.accept(&TokenKind::RBrace) {
                let (key, ki) = self.expect_ident()?;
                self.expect(&TokenKind::Assign)?;
                let value = match self.peek().clone() {
                    TokenKind::Ident(v) => {
                        self.advance();
                        v
                    },
                    TokenKind::IntLit(v) | TokenKind::FloatLit(v) => {
                        self.advance();
                        v
                    },
                    found => {
                        let i = self.info();
                        return scx_syntax_error!(
                            i, "Expected sampler state value, found {found}"
                        );
                    },
                };
                self.expect(&TokenKind::Semicolon)?;
                state.push(SamplerValue {key, value, i: ki});
            }
        }
        self.expect(&TokenKind::Semicolon)?;
        Ok(Top::SamplerDecl {kind, id: Name::new(id), register, state, i})
    }

    fn parse_function_or_global(
        &mut self,
        attrs: Vec<Attribute>,
        i: Info
    ) -> CompileResult<Top> {
        let spec = self.parse_type_spec()?;
        let (id, _) = self.expect_ident()?;
        if self.peek() == &TokenKind::LParen {
            self.parse_function(attrs, spec, id, i)
        } else {
            let vars = self.parse_var_inits(id)?;
            self.expect(&TokenKind::Semicolon)?;
            Ok(Top::GlobalVar {spec, vars, i})
        }
    }

    fn parse_var_inits(&mut self, first_id: String) -> CompileResult<Vec<VarInit>> {
        let mut vars = vec![];
        let mut id = first_id;
        loop {
            let vi = self.info();
            let dims = self.parse_array_dims()?;
            let semantic = self.parse_opt_semantic()?;
            let init = if self.accept(&TokenKind::Assign) {
                Some(self.parse_initializer()?)
            } else {
                None
            };
            vars.push(VarInit {
                id: Name::new(id), dims, semantic, pack_offset: None, init, i: vi
            });
            if !self.accept(&TokenKind::Comma) {
                break;
            }
            let (next, _) = self.expect_ident()?;
            id = next;
        }
        Ok(vars)
    }

    fn parse_function(
        &mut self,
        attrs: Vec<Attribute>,
        ret: TypeSpec,
        id: String,
        i: Info
    ) -> CompileResult<Top> {
        self.expect(&TokenKind::LParen)?;
        let mut params = vec![];
        if self.peek() != &TokenKind::RParen {
            loop {
                params.push(self.parse_param()?);
                if !self.accept(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        let ret_semantic = self.parse_opt_semantic()?;
        let body = if self.accept(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_block()?)
        };
        Ok(Top::FunDef {
            attrs, ret, id: Name::new(id), params, ret_semantic, body, i
        })
    }

    fn parse_param(&mut self) -> CompileResult<Param> {
        let i = self.info();
        let dir = match self.peek() {
            TokenKind::In => {
                self.advance();
                ParamDir::In
            },
            TokenKind::Out => {
                self.advance();
                ParamDir::Out
            },
            TokenKind::InOut => {
                self.advance();
                ParamDir::InOut
            },
            _ => ParamDir::In,
        };
        let spec = self.parse_type_spec()?;
        let (id, _) = self.expect_ident()?;
        let dims = self.parse_array_dims()?;
        let semantic = self.parse_opt_semantic()?;
        let default = if self.accept(&TokenKind::Assign) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Param {spec, id: Name::new(id), dims, semantic, dir, default, i})
    }

    // Array dimensions on declarators. An empty dimension "[]" is recorded as a zero literal,
    // which the type checker treats as a dynamic size.
    fn parse_array_dims(&mut self) -> CompileResult<Vec<Expr>> {
        let mut dims = vec![];
        while self.peek() == &TokenKind::LBracket {
            let i = self.info();
            self.advance();
            if self.accept(&TokenKind::RBracket) {
                dims.push(Expr::IntLit {
                    text: "0".to_string(), v: 0, ty: Type::Unknown, i
                });
            } else {
                dims.push(self.parse_expr()?);
                self.expect(&TokenKind::RBracket)?;
            }
        }
        Ok(dims)
    }

    fn parse_block(&mut self) -> CompileResult<Vec<Stmt>> {
        self.expect(&TokenKind::LBrace)?;
        let mut body = vec![];
        while !self.accept(&TokenKind::RBrace) {
            body.push(self.parse_stmt()?);
        }
        Ok(body)
    }

    fn parse_stmt(&mut self) -> CompileResult<Stmt> {
        let i = self.info();
        match self.peek().clone() {
            TokenKind::LBrace => {
                let body = self.parse_block()?;
                Ok(Stmt::Block {body, i})
            },
            TokenKind::LBracket => {
                // Loop attributes like [unroll] or [branch] precede the statement they modify.
                let attrs = self.parse_attributes()?;
                match self.parse_stmt()? {
                    Stmt::While {cond, body, attrs: _, i} => {
                        Ok(Stmt::While {cond, body, attrs, i})
                    },
                    Stmt::For {init, cond, incr, body, attrs: _, i} => {
                        Ok(Stmt::For {init, cond, incr, body, attrs, i})
                    },
                    s => Ok(s),
                }
            },
            TokenKind::If => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                let thn = self.parse_stmt_as_block()?;
                let els = if self.accept(&TokenKind::Else) {
                    self.parse_stmt_as_block()?
                } else {
                    vec![]
                };
                Ok(Stmt::If {cond, thn, els, i})
            },
            TokenKind::While => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                let body = self.parse_stmt_as_block()?;
                Ok(Stmt::While {cond, body, attrs: vec![], i})
            },
            TokenKind::Do => {
                self.advance();
                let body = self.parse_stmt_as_block()?;
                self.expect(&TokenKind::While)?;
                self.expect(&TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                self.expect(&TokenKind::Semicolon)?;
                Ok(Stmt::DoWhile {body, cond, i})
            },
            TokenKind::For => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                let init = if self.accept(&TokenKind::Semicolon) {
                    vec![]
                } else if self.starts_type() {
                    let s = self.parse_decl_stmt()?;
                    vec![s]
                } else {
                    let e = self.parse_expr_sequence()?;
                    let ei = e.get_info();
                    self.expect(&TokenKind::Semicolon)?;
                    vec![Stmt::Expr {e, i: ei}]
                };
                let cond = if self.peek() == &TokenKind::Semicolon {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&TokenKind::Semicolon)?;
                let incr = if self.peek() == &TokenKind::RParen {
                    None
                } else {
                    Some(self.parse_expr_sequence()?)
                };
                self.expect(&TokenKind::RParen)?;
                let body = self.parse_stmt_as_block()?;
                Ok(Stmt::For {init, cond, incr, body, attrs: vec![], i})
            },
            TokenKind::Switch => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                self.expect(&TokenKind::LBrace)?;
                let mut cases = vec![];
                while !self.accept(&TokenKind::RBrace) {
                    cases.push(self.parse_switch_case()?);
                }
                Ok(Stmt::Switch {cond, cases, i})
            },
            TokenKind::Return => {
                self.advance();
                let value = if self.peek() == &TokenKind::Semicolon {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&TokenKind::Semicolon)?;
                Ok(Stmt::Return {value, i})
            },
            TokenKind::Break => {
                self.advance();
                self.expect(&TokenKind::Semicolon)?;
                Ok(Stmt::Break {i})
            },
            TokenKind::Continue => {
                self.advance();
                self.expect(&TokenKind::Semicolon)?;
                Ok(Stmt::Continue {i})
            },
            TokenKind::Discard => {
                self.advance();
                self.expect(&TokenKind::Semicolon)?;
                Ok(Stmt::Discard {i})
            },
            TokenKind::Semicolon => {
                self.advance();
                Ok(Stmt::Empty {i})
            },
            _ if self.starts_type() => self.parse_decl_stmt(),
            _ => {
                let e = self.parse_expr_sequence()?;
                self.expect(&TokenKind::Semicolon)?;
                Ok(Stmt::Expr {e, i})
            },
        }
    }

    fn parse_stmt_as_block(&mut self) -> CompileResult<Vec<Stmt>> {
        if self.peek() == &TokenKind::LBrace {
            self.parse_block()
        } else {
            Ok(vec![self.parse_stmt()?])
        }
    }

    fn parse_switch_case(&mut self) -> CompileResult<SwitchCase> {
        let i = self.info();
        let value = if self.accept(&TokenKind::Case) {
            let e = self.parse_expr()?;
            Some(e)
        } else {
            self.expect(&TokenKind::Default)?;
            None
        };
        self.expect(&TokenKind::Colon)?;
        let mut body = vec![];
        loop {
            match self.peek() {
                TokenKind::Case | TokenKind::Default | TokenKind::RBrace => break,
                _ => body.push(self.parse_stmt()?),
            }
        }
        Ok(SwitchCase {value, body, i})
    }

    fn parse_decl_stmt(&mut self) -> CompileResult<Stmt> {
        let i = self.info();
        let spec = self.parse_type_spec()?;
        let (id, _) = self.expect_ident()?;
        let vars = self.parse_var_inits(id)?;
        self.expect(&TokenKind::Semicolon)?;
        Ok(Stmt::Decl {spec, vars, i})
    }

    fn parse_initializer(&mut self) -> CompileResult<Expr> {
        let i = self.info();
        if self.peek() == &TokenKind::LBrace {
            self.advance();
            let mut elems = vec![];
            if self.peek() != &TokenKind::RBrace {
                loop {
                    elems.push(self.parse_initializer()?);
                    if !self.accept(&TokenKind::Comma) {
                        break;
                    }
                    // The extended dialect admits a trailing comma before the closing brace.
                    if self.dialect == InputDialect::Extended
                        && self.peek() == &TokenKind::RBrace
                    {
                        break;
                    }
                }
            }
            self.expect(&TokenKind::RBrace)?;
            Ok(Expr::InitList {elems, ty: Type::Unknown, i})
        } else {
            self.parse_expr()
        }
    }

    fn parse_expr_sequence(&mut self) -> CompileResult<Expr> {
        let i = self.info();
        let first = self.parse_expr()?;
        if self.peek() != &TokenKind::Comma {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.accept(&TokenKind::Comma) {
            exprs.push(self.parse_expr()?);
        }
        Ok(Expr::Sequence {exprs, ty: Type::Unknown, i})
    }

    pub fn parse_expr(&mut self) -> CompileResult<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> CompileResult<Expr> {
        let lhs = self.parse_ternary()?;
        let op = match self.peek() {
            TokenKind::Assign => AssignOp::Set,
            TokenKind::AddAssign => AssignOp::Add,
            TokenKind::SubAssign => AssignOp::Sub,
            TokenKind::MulAssign => AssignOp::Mul,
            TokenKind::DivAssign => AssignOp::Div,
            TokenKind::RemAssign => AssignOp::Rem,
            TokenKind::AndAssign => AssignOp::BitAnd,
            TokenKind::OrAssign => AssignOp::BitOr,
            TokenKind::XorAssign => AssignOp::BitXor,
            TokenKind::ShlAssign => AssignOp::Shl,
            TokenKind::ShrAssign => AssignOp::Shr,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_assignment()?;
        let i = Info::merge(lhs.get_info(), rhs.get_info());
        Ok(Expr::Assign {
            lhs: Box::new(lhs), op, rhs: Box::new(rhs), ty: Type::Unknown, i
        })
    }

    fn parse_ternary(&mut self) -> CompileResult<Expr> {
        let cond = self.parse_binary(0)?;
        if !self.accept(&TokenKind::Question) {
            return Ok(cond);
        }
        let thn = self.parse_expr()?;
        self.expect(&TokenKind::Colon)?;
        let els = self.parse_assignment()?;
        let i = Info::merge(cond.get_info(), els.get_info());
        Ok(Expr::Ternary {
            cond: Box::new(cond), thn: Box::new(thn), els: Box::new(els),
            ty: Type::Unknown, i
        })
    }

    fn peek_bin_op(&self) -> Option<(BinOp, usize)> {
        let op = match self.peek() {
            TokenKind::PipePipe => BinOp::LogicalOr,
            TokenKind::AmpAmp => BinOp::LogicalAnd,
            TokenKind::Pipe => BinOp::BitOr,
            TokenKind::Caret => BinOp::BitXor,
            TokenKind::Amp => BinOp::BitAnd,
            TokenKind::EqEq => BinOp::Eq,
            TokenKind::NotEq => BinOp::Neq,
            TokenKind::Lt => BinOp::Lt,
            TokenKind::Gt => BinOp::Gt,
            TokenKind::Leq => BinOp::Leq,
            TokenKind::Geq => BinOp::Geq,
            TokenKind::Shl => BinOp::Shl,
            TokenKind::Shr => BinOp::Shr,
            TokenKind::Plus => BinOp::Add,
            TokenKind::Minus => BinOp::Sub,
            TokenKind::Star => BinOp::Mul,
            TokenKind::Slash => BinOp::Div,
            TokenKind::Percent => BinOp::Rem,
            _ => return None,
        };
        let prec = match op {
            BinOp::LogicalOr => 1,
            BinOp::LogicalAnd => 2,
            BinOp::BitOr => 3,
            BinOp::BitXor => 4,
            BinOp::BitAnd => 5,
            BinOp::Eq | BinOp::Neq => 6,
            BinOp::Lt | BinOp::Gt | BinOp::Leq | BinOp::Geq => 7,
            BinOp::Shl | BinOp::Shr => 8,
            BinOp::Add | BinOp::Sub => 9,
            BinOp::Mul | BinOp::Div | BinOp::Rem => 10,
        };
        Some((op, prec))
    }

    fn parse_binary(&mut self, min_prec: usize) -> CompileResult<Expr> {
        let mut lhs = self.parse_unary()?;
        while let Some((op, prec)) = self.peek_bin_op() {
            if prec < min_prec {
                break;
            }
            self.advance();
            let rhs = self.parse_binary(prec + 1)?;
            let i = Info::merge(lhs.get_info(), rhs.get_info());
            lhs = Expr::BinOp {
                lhs: Box::new(lhs), op, rhs: Box::new(rhs), ty: Type::Unknown, i
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> CompileResult<Expr> {
        let i = self.info();
        let op = match self.peek() {
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::Plus => Some(UnOp::Plus),
            TokenKind::Not => Some(UnOp::LogicalNot),
            TokenKind::Tilde => Some(UnOp::BitNot),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let arg = self.parse_unary()?;
            return Ok(Expr::UnOp {op, arg: Box::new(arg), ty: Type::Unknown, i});
        }
        // Prefix increment/decrement is represented as the equivalent compound assignment.
        let pre = match self.peek() {
            TokenKind::Inc => Some(AssignOp::Add),
            TokenKind::Dec => Some(AssignOp::Sub),
            _ => None,
        };
        if let Some(op) = pre {
            self.advance();
            let arg = self.parse_unary()?;
            let one = Expr::IntLit {
                text: "1".to_string(), v: 1, ty: Type::Unknown, i: i.clone()
            };
            return Ok(Expr::Assign {
                lhs: Box::new(arg), op, rhs: Box::new(one), ty: Type::Unknown, i
            });
        }
        if self.is_cast() {
            self.advance();
            let to = self.parse_type()?;
            self.expect(&TokenKind::RParen)?;
            let arg = self.parse_unary()?;
            return Ok(Expr::Cast {
                to, arg: Box::new(arg), ty: Type::Unknown, i
            });
        }
        self.parse_postfix()
    }

    // A parenthesized built-in type name followed by the start of a unary expression is a cast.
    // Casts to user-defined types are not distinguishable here and are rejected later.
    fn is_cast(&self) -> bool {
        if self.peek() != &TokenKind::LParen {
            return false;
        }
        match self.peek_at(1) {
            TokenKind::Ident(id) => {
                data_type_from_str(id).is_some() && self.peek_at(2) == &TokenKind::RParen
            },
            _ => false,
        }
    }

    fn parse_postfix(&mut self) -> CompileResult<Expr> {
        let mut e = self.parse_primary()?;
        loop {
            let i = self.info();
            match self.peek().clone() {
                TokenKind::Dot => {
                    self.advance();
                    let (member, mi) = self.expect_ident()?;
                    if self.peek() == &TokenKind::LParen {
                        let args = self.parse_call_args()?;
                        e = Expr::Call {
                            target: Some(Box::new(e)),
                            id: Name::new(member),
                            args,
                            ty: Type::Unknown,
                            i: mi,
                        };
                    } else {
                        e = Expr::Member {
                            target: Box::new(e), member, ty: Type::Unknown, i: mi
                        };
                    }
                },
                TokenKind::LBracket => {
                    self.advance();
                    let idx = self.parse_expr()?;
                    self.expect(&TokenKind::RBracket)?;
                    e = Expr::Index {
                        target: Box::new(e), idx: Box::new(idx), ty: Type::Unknown, i
                    };
                },
                TokenKind::Inc => {
                    self.advance();
                    e = Expr::PostUnOp {
                        op: PostUnOp::Inc, arg: Box::new(e), ty: Type::Unknown, i
                    };
                },
                TokenKind::Dec => {
                    self.advance();
                    e = Expr::PostUnOp {
                        op: PostUnOp::Dec, arg: Box::new(e), ty: Type::Unknown, i
                    };
                },
                _ => return Ok(e),
            }
        }
    }

    fn parse_call_args(&mut self) -> CompileResult<Vec<Expr>> {
        self.expect(&TokenKind::LParen)?;
        let mut args = vec![];
        if self.peek() != &TokenKind::RParen {
            loop {
                args.push(self.parse_expr()?);
                if !self.accept(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> CompileResult<Expr> {
        let i = self.info();
        match self.peek().clone() {
            TokenKind::IntLit(text) => {
                self.advance();
                let digits = text.trim_end_matches(|c| c == 'u' || c == 'U');
                let v = if digits.starts_with("0x") || digits.starts_with("0X") {
                    i64::from_str_radix(&digits[2..], 16).unwrap_or(0)
                } else {
                    digits.parse::<i64>().unwrap_or(0)
                };
                Ok(Expr::IntLit {text, v, ty: Type::Unknown, i})
            },
            TokenKind::FloatLit(text) => {
                self.advance();
                Ok(Expr::FloatLit {text, ty: Type::Unknown, i})
            },
            TokenKind::BoolLit(v) => {
                self.advance();
                Ok(Expr::BoolLit {v, ty: Type::Unknown, i})
            },
            TokenKind::StringLit(v) => {
                self.advance();
                Ok(Expr::StringLit {v, ty: Type::Unknown, i})
            },
            TokenKind::LParen => {
                self.advance();
                let e = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                Ok(e)
            },
            TokenKind::Ident(id) => {
                self.advance();
                if self.peek() == &TokenKind::LParen {
                    if let Some(dt) = data_type_from_str(&id) {
                        let args = self.parse_call_args()?;
                        return Ok(Expr::Ctor {dt, args, ty: Type::Unknown, i});
                    }
                    let args = self.parse_call_args()?;
                    return Ok(Expr::Call {
                        target: None, id: Name::new(id), args, ty: Type::Unknown, i
                    });
                }
                Ok(Expr::Var {id: Name::new(id), ty: Type::Unknown, i})
            },
            found => scx_syntax_error!(i, "Unexpected {found} in expression"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hlsl::lexer;

    fn parse_str(src: &str) -> CompileResult<Ast> {
        parse(lexer::tokenize(src, "test.hlsl")?)
    }

    #[test]
    fn parses_simple_vertex_shader() {
        let ast = parse_str(
            "float4 main(float4 p : POSITION) : SV_POSITION { return p; }"
        ).unwrap();
        assert_eq!(ast.len(), 1);
        match &ast[0] {
            Top::FunDef {id, params, ret_semantic, body, ..} => {
                assert_eq!(id.get_str(), "main");
                assert_eq!(params.len(), 1);
                assert_eq!(
                    params[0].semantic,
                    Some(IndexedSemantic::parse("POSITION"))
                );
                assert_eq!(
                    ret_semantic.as_ref().unwrap().semantic,
                    Semantic::Position
                );
                assert_eq!(body.as_ref().unwrap().len(), 1);
            },
            t => panic!("expected function, found {t:?}"),
        }
    }

    #[test]
    fn parses_struct_with_inheritance_and_semantics() {
        let ast = parse_str(
            "struct Base { float4 pos : SV_Position; };\n\
             struct VOut : Base { float2 uv : TEXCOORD0; float3 n : NORMAL; };"
        ).unwrap();
        match &ast[1] {
            Top::StructDef {base, fields, ..} => {
                assert_eq!(base.as_ref().unwrap().get_str(), "Base");
                assert_eq!(fields.len(), 2);
            },
            t => panic!("expected struct, found {t:?}"),
        }
    }

    #[test]
    fn parses_cbuffer_with_register() {
        let ast = parse_str(
            "cbuffer Camera : register(b2) { float4x4 viewProj; float3 eye; };"
        ).unwrap();
        match &ast[0] {
            Top::ConstantBuffer {register, fields, ..} => {
                let reg = register.as_ref().unwrap();
                assert_eq!(reg.ty, RegisterType::ConstantBuffer);
                assert_eq!(reg.slot, 2);
                assert_eq!(fields.len(), 2);
            },
            t => panic!("expected cbuffer, found {t:?}"),
        }
    }

    #[test]
    fn parses_texture_and_sampler() {
        let ast = parse_str(
            "Texture2D albedo : register(t0);\nSamplerState samp : register(s0);"
        ).unwrap();
        match &ast[0] {
            Top::BufferDecl {kind, register, ..} => {
                assert_eq!(*kind, BufferType::Texture2D);
                assert_eq!(register.as_ref().unwrap().ty, RegisterType::TextureBuffer);
            },
            t => panic!("expected texture, found {t:?}"),
        }
        match &ast[1] {
            Top::SamplerDecl {kind, ..} => {
                assert_eq!(*kind, SamplerType::SamplerState);
            },
            t => panic!("expected sampler, found {t:?}"),
        }
    }

    #[test]
    fn parses_numthreads_attribute() {
        let ast = parse_str(
            "[numthreads(8, 8, 1)]\nvoid main(uint3 id : SV_DispatchThreadID) { }"
        ).unwrap();
        match &ast[0] {
            Top::FunDef {attrs, ..} => {
                assert_eq!(attrs.len(), 1);
                assert_eq!(attrs[0].id, "numthreads");
                assert_eq!(attrs[0].args.len(), 3);
            },
            t => panic!("expected function, found {t:?}"),
        }
    }

    #[test]
    fn parses_method_call_chain() {
        let ast = parse_str(
            "Texture2D t; SamplerState s;\n\
             float4 main(float2 uv : TEXCOORD) : SV_Target { return t.Sample(s, uv); }"
        ).unwrap();
        match &ast[2] {
            Top::FunDef {body, ..} => {
                match &body.as_ref().unwrap()[0] {
                    Stmt::Return {value: Some(Expr::Call {target, id, args, ..}), ..} => {
                        assert!(target.is_some());
                        assert_eq!(id.get_str(), "Sample");
                        assert_eq!(args.len(), 2);
                    },
                    s => panic!("expected method-call return, found {s:?}"),
                }
            },
            t => panic!("expected function, found {t:?}"),
        }
    }

    #[test]
    fn parses_control_flow() {
        let ast = parse_str(
            "int f(int n) {\n\
                 int acc = 0;\n\
                 for (int i = 0; i < n; ++i) { acc += i; }\n\
                 while (acc > 100) { acc /= 2; }\n\
                 do { acc--; } while (acc > 50);\n\
                 switch (n) { case 0: return acc; default: break; }\n\
                 if (acc < 0) discard;\n\
                 return acc;\n\
             }"
        ).unwrap();
        match &ast[0] {
            Top::FunDef {body, ..} => assert_eq!(body.as_ref().unwrap().len(), 7),
            t => panic!("expected function, found {t:?}"),
        }
    }

    #[test]
    fn parses_typedef_and_template_types() {
        let ast = parse_str(
            "typedef vector<float, 3> Normal;\n\
             StructuredBuffer<Normal> normals : register(t1);"
        ).unwrap();
        match &ast[0] {
            Top::AliasDef {ty, ..} => assert_eq!(*ty, Type::Data(DataType::Float3)),
            t => panic!("expected typedef, found {t:?}"),
        }
        match &ast[1] {
            Top::BufferDecl {kind, elem, ..} => {
                assert_eq!(*kind, BufferType::StructuredBuffer);
                assert!(matches!(elem, Type::Struct {..}));
            },
            t => panic!("expected buffer, found {t:?}"),
        }
    }

    #[test]
    fn parses_forward_declaration() {
        let ast = parse_str("float helper(float x);\nfloat helper(float x) { return x; }")
            .unwrap();
        match (&ast[0], &ast[1]) {
            (Top::FunDef {body: None, ..}, Top::FunDef {body: Some(_), ..}) => (),
            t => panic!("expected forward decl then definition, found {t:?}"),
        }
    }

    #[test]
    fn parses_cast_and_ctor() {
        let ast = parse_str(
            "float4 f() { float3 v = (float3)0; return float4(v, 1.0f); }"
        ).unwrap();
        match &ast[0] {
            Top::FunDef {body, ..} => {
                let body = body.as_ref().unwrap();
                match &body[0] {
                    Stmt::Decl {vars, ..} => {
                        assert!(matches!(
                            vars[0].init,
                            Some(Expr::Cast {to: Type::Data(DataType::Float3), ..})
                        ));
                    },
                    s => panic!("expected declaration, found {s:?}"),
                }
                match &body[1] {
                    Stmt::Return {value: Some(Expr::Ctor {dt, args, ..}), ..} => {
                        assert_eq!(*dt, DataType::Float4);
                        assert_eq!(args.len(), 2);
                    },
                    s => panic!("expected ctor return, found {s:?}"),
                }
            },
            t => panic!("expected function, found {t:?}"),
        }
    }

    #[test]
    fn syntax_error_reports_and_recovers() {
        let r = parse_str("float4 bad(] ; float ok() { return 1.0f; }");
        let e = r.unwrap_err();
        assert_eq!(e.kind(), &ErrorKind::Syntax);
    }

    #[test]
    fn sampler_state_values() {
        let ast = parse_str(
            "SamplerState s { Filter = MIN_MAG_MIP_LINEAR; AddressU = WRAP; };"
        ).unwrap();
        match &ast[0] {
            Top::SamplerDecl {state, ..} => {
                assert_eq!(state.len(), 2);
                assert_eq!(state[0].key, "Filter");
                assert_eq!(state[1].value, "WRAP");
            },
            t => panic!("expected sampler, found {t:?}"),
        }
    }

    #[test]
    fn trailing_initializer_comma_requires_extended_dialect() {
        let src = "static const float w[2] = { 1.0f, 2.0f, };";
        let tokens = lexer::tokenize(src, "test.hlsl").unwrap();
        let strict = parse_dialect(tokens.clone(), InputDialect::Strict);
        assert_eq!(strict.unwrap_err().kind(), &ErrorKind::Syntax);
        let extended = parse_dialect(tokens, InputDialect::Extended);
        assert!(extended.is_ok());
    }
}
