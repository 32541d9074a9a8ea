//! Lexer for the WebAssembly text format.
//!
//! The [`Lexer`] walks the source once, producing classified tokens.
//! Instruction keywords are resolved against the opcode table here, so the
//! grammar reader can dispatch purely on token kind.
//!
//! The [`Tokenizer`] wraps the lexer with the two-token lookahead the grammar
//! needs. It never fails: lexical faults are recorded as errors and the
//! stream ends with an `Eof` token (or, for locally-recoverable faults such
//! as a bad escape, continues with a `Reserved` token).

use super::cursor::{Cursor, Position};
use super::literals::text_to_bytes;
use super::token::{
    Base, InstrClass, Keyword, LaneShape, LiteralInfo, LiteralKind, Sign, Token, TokenKind,
};
use crate::error::Error;
use crate::instruction::{ImmediateKind, Opcode};
use crate::location::Span;
use crate::types::ValueType;
use std::collections::VecDeque;

/// Check if a character is valid in a WAT identifier or keyword.
///
/// See: <https://webassembly.github.io/spec/core/text/values.html#text-id>
pub fn is_idchar(c: char) -> bool {
    matches!(
        c,
        '0'..='9'
            | 'a'..='z'
            | 'A'..='Z'
            | '!'
            | '#'
            | '$'
            | '%'
            | '&'
            | '\''
            | '*'
            | '+'
            | '-'
            | '.'
            | '/'
            | ':'
            | '<'
            | '='
            | '>'
            | '?'
            | '@'
            | '\\'
            | '^'
            | '_'
            | '`'
            | '|'
            | '~'
    )
}

/// Outcome of lexing one token.
enum Lexed {
    Token(TokenKind),
    /// A recoverable fault: the error is recorded and the consumed text is
    /// surfaced as `Reserved` so the grammar can keep going.
    Recovered(Error, TokenKind),
    /// A fatal fault: the error is recorded and the stream ends.
    Fatal(Error),
    Eof,
}

pub struct Lexer<'a> {
    cursor: Cursor<'a>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            cursor: Cursor::new(source),
        }
    }

    fn error(&self, message: impl Into<String>, start: Position) -> Error {
        Error {
            span: start.span_to(&self.cursor.position()),
            message: message.into(),
            context: Vec::new(),
        }
    }

    /// Lex the next token, skipping whitespace and comments first.
    fn next_token(&mut self) -> (Option<Span>, Lexed) {
        if let Err(e) = self.skip_whitespace_and_comments() {
            return (None, Lexed::Fatal(e));
        }
        if self.cursor.is_eof() {
            return (None, Lexed::Eof);
        }

        let start = self.cursor.position();
        let lexed = self.lex_token(start);
        let span = start.span_to(&self.cursor.position());
        (Some(span), lexed)
    }

    fn lex_token(&mut self, start: Position) -> Lexed {
        match self.cursor.peek().unwrap() {
            '(' => {
                self.cursor.advance();
                Lexed::Token(TokenKind::Lpar)
            }
            ')' => {
                self.cursor.advance();
                Lexed::Token(TokenKind::Rpar)
            }
            '"' => self.lex_string(start),
            '$' => self.lex_id(start),
            c if c.is_ascii_digit() || c == '+' || c == '-' || is_idchar(c) => {
                self.lex_symbol(start)
            }
            c => {
                self.cursor.advance();
                Lexed::Fatal(self.error(format!("unexpected character: {:?}", c), start))
            }
        }
    }

    // ------------------------------------------------------------------
    // Whitespace and comments
    // ------------------------------------------------------------------

    fn skip_whitespace_and_comments(&mut self) -> Result<(), Error> {
        loop {
            self.cursor.skip_while(|c| c.is_ascii_whitespace());

            if self.cursor.is_eof() {
                return Ok(());
            }

            match (self.cursor.peek(), self.cursor.peek_second()) {
                // Line comment: ;; to end of line.
                (Some(';'), Some(';')) => {
                    self.cursor.skip_while(|c| c != '\n');
                }
                (Some(';'), _) => {
                    let start = self.cursor.position();
                    self.cursor.advance();
                    return Err(self.error("unexpected character: ';'", start));
                }
                // Block comment: (; ... ;) with nesting.
                (Some('('), Some(';')) => {
                    self.skip_block_comment()?;
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), Error> {
        let start = self.cursor.position();
        self.cursor.advance();
        self.cursor.advance();

        let mut depth = 1;
        while depth > 0 {
            match (self.cursor.peek(), self.cursor.peek_second()) {
                (None, _) => {
                    return Err(self.error("unterminated block comment", start));
                }
                (Some('('), Some(';')) => {
                    self.cursor.advance();
                    self.cursor.advance();
                    depth += 1;
                }
                (Some(';'), Some(')')) => {
                    self.cursor.advance();
                    self.cursor.advance();
                    depth -= 1;
                }
                _ => {
                    self.cursor.advance();
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Strings and identifiers
    // ------------------------------------------------------------------

    fn lex_string(&mut self, start: Position) -> Lexed {
        self.cursor.advance(); // opening quote
        let body_start = self.cursor.position();

        loop {
            match self.cursor.peek() {
                None => {
                    return Lexed::Fatal(self.error("unterminated string literal", start));
                }
                Some('"') => break,
                Some('\\') => {
                    self.cursor.advance();
                    // Consume whatever follows; escape validity is checked
                    // during decoding.
                    self.cursor.advance();
                }
                Some(_) => {
                    self.cursor.advance();
                }
            }
        }
        let raw = self.cursor.slice_from(&body_start);
        let body_offset = body_start.offset;
        self.cursor.advance(); // closing quote

        if let Err(boundary) = self.check_token_boundary(start) {
            return boundary;
        }

        match text_to_bytes(raw) {
            Ok(bytes) => Lexed::Token(TokenKind::Text(bytes)),
            Err((offset, message)) => {
                let at = body_offset + offset;
                let error = Error {
                    span: Span::new(at, at + 1, start.line, start.column),
                    message,
                    context: Vec::new(),
                };
                Lexed::Recovered(error, TokenKind::Reserved)
            }
        }
    }

    fn lex_id(&mut self, start: Position) -> Lexed {
        self.cursor.advance(); // '$'
        let name = self.cursor.take_while(is_idchar);
        if name.is_empty() {
            return Lexed::Fatal(self.error("expected identifier after '$'", start));
        }
        let kind = TokenKind::Id(name.to_string());
        match self.check_token_boundary(start) {
            Ok(()) => Lexed::Token(kind),
            Err(boundary) => boundary,
        }
    }

    // ------------------------------------------------------------------
    // Symbols: keywords, instructions, and numbers
    // ------------------------------------------------------------------

    /// Everything made of idchars: numbers, keywords, instruction mnemonics,
    /// `align=`/`offset=` immediates.
    fn lex_symbol(&mut self, start: Position) -> Lexed {
        let text = self.cursor.take_while(is_idchar);

        if let Err(boundary) = self.check_token_boundary(start) {
            return boundary;
        }

        if let Some(kind) = classify_symbol(text) {
            Lexed::Token(kind)
        } else if text.starts_with(|c: char| c.is_ascii_digit() || c == '+' || c == '-') {
            // Looked numeric but malformed, e.g. `1x` or `0x1__f`.
            Lexed::Recovered(
                self.error("unknown operator", start),
                TokenKind::Reserved,
            )
        } else {
            // An unknown keyword; let the grammar report it in context.
            Lexed::Token(TokenKind::Reserved)
        }
    }

    /// The next character after a token must be whitespace, a parenthesis, a
    /// comment, or the end of input. e.g. `1x` and `"a""b"` are invalid.
    fn check_token_boundary(&mut self, start: Position) -> Result<(), Lexed> {
        match self.cursor.peek() {
            None => Ok(()),
            Some(c) if c.is_ascii_whitespace() => Ok(()),
            Some('(' | ')' | ';') => Ok(()),
            Some(_) => {
                // Consume the run so the stream can continue afterwards.
                self.cursor.skip_while(|c| is_idchar(c) || c == '"');
                Err(Lexed::Recovered(
                    self.error("unknown operator", start),
                    TokenKind::Reserved,
                ))
            }
        }
    }
}

/// Classify a symbol. Returns `None` for malformed numeric spellings.
fn classify_symbol(text: &str) -> Option<TokenKind> {
    // Structural keywords first: they shadow instruction mnemonics (`else`,
    // `end`, `catch`) and plain words.
    if let Some(kw) = keyword(text) {
        return Some(TokenKind::Keyword(kw));
    }

    if let Some(vt) = value_type(text) {
        return Some(TokenKind::ValueType(vt));
    }

    if let Some(shape) = lane_shape(text) {
        return Some(TokenKind::LaneShape(shape));
    }

    if let Some(rest) = text.strip_prefix("align=") {
        return numeric_info(rest, Sign::None).map(TokenKind::AlignEqNat);
    }
    if let Some(rest) = text.strip_prefix("offset=") {
        return numeric_info(rest, Sign::None).map(TokenKind::OffsetEqNat);
    }

    if let Some(op) = Opcode::from_mnemonic(text) {
        return Some(TokenKind::Instr(classify_instr(op), op));
    }

    // Numbers, including the special float spellings.
    let (sign, body) = match text.as_bytes().first().copied() {
        Some(b'+') => (Sign::Plus, &text[1..]),
        Some(b'-') => (Sign::Minus, &text[1..]),
        _ => (Sign::None, text),
    };

    if body.starts_with(|c: char| c.is_ascii_digit()) || special_float_kind(body).is_some() {
        return classify_number(sign, body, text);
    }

    None
}

fn keyword(text: &str) -> Option<Keyword> {
    Some(match text {
        "module" => Keyword::Module,
        "func" => Keyword::Func,
        "type" => Keyword::Type,
        "param" => Keyword::Param,
        "result" => Keyword::Result,
        "local" => Keyword::Local,
        "import" => Keyword::Import,
        "export" => Keyword::Export,
        "table" => Keyword::Table,
        "memory" => Keyword::Memory,
        "global" => Keyword::Global,
        "elem" => Keyword::Elem,
        "data" => Keyword::Data,
        "start" => Keyword::Start,
        "event" => Keyword::Event,
        "mut" => Keyword::Mut,
        "offset" => Keyword::Offset,
        "item" => Keyword::Item,
        "declare" => Keyword::Declare,
        "then" => Keyword::Then,
        "else" => Keyword::Else,
        "end" => Keyword::End,
        "catch" => Keyword::Catch,
        "shared" => Keyword::Shared,
        "ref" => Keyword::Ref,
        "null" => Keyword::Null,
        "extern" => Keyword::Extern,
        "exn" => Keyword::Exn,
        _ => return None,
    })
}

fn value_type(text: &str) -> Option<ValueType> {
    Some(match text {
        "i32" => ValueType::I32,
        "i64" => ValueType::I64,
        "f32" => ValueType::F32,
        "f64" => ValueType::F64,
        "v128" => ValueType::V128,
        "funcref" => ValueType::FUNCREF,
        "externref" => ValueType::EXTERNREF,
        "exnref" => ValueType::EXNREF,
        _ => return None,
    })
}

fn lane_shape(text: &str) -> Option<LaneShape> {
    Some(match text {
        "i8x16" => LaneShape::I8X16,
        "i16x8" => LaneShape::I16X8,
        "i32x4" => LaneShape::I32X4,
        "i64x2" => LaneShape::I64X2,
        "f32x4" => LaneShape::F32X4,
        "f64x2" => LaneShape::F64X2,
        _ => return None,
    })
}

/// The token class of an instruction keyword, derived from its immediate
/// shape (and, for copy/init, which index space it touches).
fn classify_instr(op: Opcode) -> InstrClass {
    match op.immediate_kind() {
        ImmediateKind::None => {
            if op == Opcode::Select {
                InstrClass::Select
            } else {
                InstrClass::Bare
            }
        }
        ImmediateKind::S32 => InstrClass::I32Const,
        ImmediateKind::S64 => InstrClass::I64Const,
        ImmediateKind::F32 => InstrClass::F32Const,
        ImmediateKind::F64 => InstrClass::F64Const,
        ImmediateKind::V128 => InstrClass::SimdConst,
        ImmediateKind::Index => {
            if op == Opcode::RefFunc {
                InstrClass::RefFunc
            } else {
                InstrClass::Var
            }
        }
        ImmediateKind::Block => InstrClass::Block,
        ImmediateKind::BrOnExn => InstrClass::BrOnExn,
        ImmediateKind::BrTable => InstrClass::BrTable,
        ImmediateKind::CallIndirect => InstrClass::CallIndirect,
        ImmediateKind::Copy => {
            if op.mnemonic().starts_with("table") {
                InstrClass::TableCopy
            } else {
                InstrClass::MemoryCopy
            }
        }
        ImmediateKind::Init => {
            if op.mnemonic().starts_with("table") {
                InstrClass::TableInit
            } else {
                InstrClass::MemoryInit
            }
        }
        ImmediateKind::MemArg => InstrClass::Memory,
        ImmediateKind::HeapType => InstrClass::RefNull,
        ImmediateKind::SelectTypes => InstrClass::Select,
        ImmediateKind::Shuffle => InstrClass::SimdShuffle,
        ImmediateKind::SimdLane => InstrClass::SimdLane,
    }
}

fn special_float_kind(body: &str) -> Option<LiteralKind> {
    if body == "inf" {
        Some(LiteralKind::Infinity)
    } else if body == "nan" {
        Some(LiteralKind::Nan)
    } else if body.starts_with("nan:0x") {
        Some(LiteralKind::NanPayload)
    } else {
        None
    }
}

/// Classify a numeric spelling. `body` is `text` without its sign.
fn classify_number(sign: Sign, body: &str, text: &str) -> Option<TokenKind> {
    if let Some(kind) = special_float_kind(body) {
        let info = LiteralInfo {
            sign,
            kind,
            base: if kind == LiteralKind::NanPayload {
                Base::Hex
            } else {
                Base::Decimal
            },
            has_underscores: text.contains('_'),
        };
        return Some(TokenKind::Float(info));
    }

    let info = numeric_info(body, sign)?;
    match (info.kind, sign) {
        (LiteralKind::Normal, Sign::None) if !is_float_spelling(body, info.base) => {
            Some(TokenKind::Nat(info))
        }
        (LiteralKind::Normal, _) if !is_float_spelling(body, info.base) => {
            Some(TokenKind::Int(info))
        }
        _ => Some(TokenKind::Float(info)),
    }
}

fn is_float_spelling(body: &str, base: Base) -> bool {
    match base {
        Base::Hex => body.contains('.') || body.contains(['p', 'P']),
        Base::Decimal => body.contains('.') || body.contains(['e', 'E']),
    }
}

/// Validate a numeric spelling's overall shape and build its [`LiteralInfo`].
/// Underscore *placement* is validated by the literal decoders.
fn numeric_info(body: &str, sign: Sign) -> Option<LiteralInfo> {
    if body.is_empty() {
        return None;
    }
    let (base, digits) = if let Some(rest) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        (Base::Hex, rest)
    } else {
        (Base::Decimal, body)
    };

    let digit = |c: char| match base {
        Base::Hex => c.is_ascii_hexdigit(),
        Base::Decimal => c.is_ascii_digit(),
    };
    let exponent = |c: char| match base {
        Base::Hex => c == 'p' || c == 'P',
        Base::Decimal => c == 'e' || c == 'E',
    };

    // mantissa-digits [ '.' frac-digits? ] [ exp [sign] digits ]
    let mut chars = digits.chars().peekable();
    let mut seen_digit = false;
    while let Some(&c) = chars.peek() {
        if digit(c) || c == '_' {
            seen_digit |= digit(c);
            chars.next();
        } else {
            break;
        }
    }
    if let Some(&'.') = chars.peek() {
        chars.next();
        while let Some(&c) = chars.peek() {
            if digit(c) || c == '_' {
                seen_digit |= digit(c);
                chars.next();
            } else {
                break;
            }
        }
    }
    if !seen_digit {
        return None;
    }
    if let Some(&c) = chars.peek() {
        if !exponent(c) {
            return None;
        }
        chars.next();
        if matches!(chars.peek(), Some(&'+') | Some(&'-')) {
            chars.next();
        }
        let mut exp_digit = false;
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() || c == '_' {
                exp_digit |= c.is_ascii_digit();
                chars.next();
            } else {
                return None;
            }
        }
        if !exp_digit {
            return None;
        }
    }
    if chars.next().is_some() {
        return None;
    }

    Some(LiteralInfo {
        sign,
        kind: LiteralKind::Normal,
        base,
        has_underscores: body.contains('_'),
    })
}

// ----------------------------------------------------------------------
// Tokenizer: lookahead-2 stream over the lexer
// ----------------------------------------------------------------------

/// A two-token lookahead stream.
///
/// `peek(k)` is supported for k in {0, 1}. Lexical faults flow into an
/// internal error list drained by the grammar reader; the stream itself
/// never fails.
pub struct Tokenizer<'a> {
    source: &'a str,
    lexer: Lexer<'a>,
    lookahead: VecDeque<Token>,
    errors: Vec<Error>,
    ended: bool,
    depth: i64,
    last_end: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            lexer: Lexer::new(source),
            lookahead: VecDeque::with_capacity(2),
            errors: Vec::new(),
            ended: false,
            depth: 0,
            last_end: 0,
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    fn eof_token(&self) -> Token {
        let end = self.source.len();
        Token::new(TokenKind::Eof, Span::new(end, end, 0, 0))
    }

    fn fill(&mut self, n: usize) {
        while self.lookahead.len() <= n {
            if self.ended {
                let token = self.eof_token();
                self.lookahead.push_back(token);
                continue;
            }
            let (span, lexed) = self.lexer.next_token();
            match lexed {
                Lexed::Token(kind) => {
                    self.lookahead.push_back(Token::new(kind, span.unwrap()));
                }
                Lexed::Recovered(error, kind) => {
                    self.errors.push(error);
                    self.lookahead.push_back(Token::new(kind, span.unwrap()));
                }
                Lexed::Fatal(error) => {
                    self.errors.push(error);
                    self.ended = true;
                }
                Lexed::Eof => {
                    self.ended = true;
                }
            }
        }
    }

    /// Peek `k` tokens ahead (k in {0, 1}).
    pub fn peek(&mut self, k: usize) -> &Token {
        debug_assert!(k < 2);
        self.fill(k);
        &self.lookahead[k]
    }

    /// Consume and return the next token.
    pub fn read(&mut self) -> Token {
        self.fill(0);
        let token = self.lookahead.pop_front().unwrap();
        match token.kind {
            TokenKind::Lpar => self.depth += 1,
            TokenKind::Rpar => self.depth -= 1,
            TokenKind::Eof => return token,
            _ => {}
        }
        self.last_end = token.span.end;
        token
    }

    /// End offset of the last consumed token; used to close node spans.
    pub fn last_end(&self) -> usize {
        self.last_end
    }

    /// Parenthesis depth of everything consumed so far.
    pub fn paren_depth(&self) -> i64 {
        self.depth
    }

    /// Consume the next token if `pred` accepts it.
    pub fn match_if(&mut self, pred: impl FnOnce(&TokenKind) -> bool) -> Option<Token> {
        if pred(&self.peek(0).kind) {
            Some(self.read())
        } else {
            None
        }
    }

    /// Consume `(` followed by the given keyword, atomically.
    pub fn match_lpar_keyword(&mut self, kw: Keyword) -> Option<Token> {
        if self.peek(0).kind == TokenKind::Lpar && self.peek(1).kind == TokenKind::Keyword(kw) {
            let lpar = self.read();
            self.read();
            Some(lpar)
        } else {
            None
        }
    }

    /// Where the next token starts; used by location guards.
    pub fn here(&mut self) -> Span {
        self.peek(0).span
    }

    /// Drain the lexical errors recorded so far.
    pub fn take_errors(&mut self) -> Vec<Error> {
        std::mem::take(&mut self.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tokenize fully, asserting no lexical errors.
    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut tokenizer = Tokenizer::new(source);
        let mut out = Vec::new();
        loop {
            let token = tokenizer.read();
            if token.kind == TokenKind::Eof {
                break;
            }
            out.push(token.kind);
        }
        assert!(
            tokenizer.take_errors().is_empty(),
            "unexpected lex errors for {:?}",
            source
        );
        out
    }

    fn lex_errors(source: &str) -> Vec<Error> {
        let mut tokenizer = Tokenizer::new(source);
        while tokenizer.read().kind != TokenKind::Eof {}
        tokenizer.take_errors()
    }

    #[test]
    fn empty_input() {
        assert_eq!(kinds(""), vec![]);
    }

    #[test]
    fn parens() {
        assert_eq!(kinds("()"), vec![TokenKind::Lpar, TokenKind::Rpar]);
    }

    #[test]
    fn keywords_and_ids() {
        assert_eq!(
            kinds("(module $m)"),
            vec![
                TokenKind::Lpar,
                TokenKind::Keyword(Keyword::Module),
                TokenKind::Id("m".into()),
                TokenKind::Rpar,
            ]
        );
    }

    #[test]
    fn instruction_classes() {
        assert_eq!(
            kinds("nop block local.get i32.const f32.load call_indirect"),
            vec![
                TokenKind::Instr(InstrClass::Bare, Opcode::Nop),
                TokenKind::Instr(InstrClass::Block, Opcode::Block),
                TokenKind::Instr(InstrClass::Var, Opcode::LocalGet),
                TokenKind::Instr(InstrClass::I32Const, Opcode::I32Const),
                TokenKind::Instr(InstrClass::Memory, Opcode::F32Load),
                TokenKind::Instr(InstrClass::CallIndirect, Opcode::CallIndirect),
            ]
        );
    }

    #[test]
    fn copy_and_init_classes() {
        assert_eq!(
            kinds("memory.copy table.copy memory.init table.init"),
            vec![
                TokenKind::Instr(InstrClass::MemoryCopy, Opcode::MemoryCopy),
                TokenKind::Instr(InstrClass::TableCopy, Opcode::TableCopy),
                TokenKind::Instr(InstrClass::MemoryInit, Opcode::MemoryInit),
                TokenKind::Instr(InstrClass::TableInit, Opcode::TableInit),
            ]
        );
    }

    #[test]
    fn structural_keywords_shadow_opcodes() {
        // `else`, `end`, `catch` are keywords, not bare instructions.
        assert_eq!(
            kinds("else end catch"),
            vec![
                TokenKind::Keyword(Keyword::Else),
                TokenKind::Keyword(Keyword::End),
                TokenKind::Keyword(Keyword::Catch),
            ]
        );
    }

    #[test]
    fn value_types_and_lane_shapes() {
        assert_eq!(
            kinds("i32 funcref i8x16 f64x2"),
            vec![
                TokenKind::ValueType(ValueType::I32),
                TokenKind::ValueType(ValueType::FUNCREF),
                TokenKind::LaneShape(LaneShape::I8X16),
                TokenKind::LaneShape(LaneShape::F64X2),
            ]
        );
    }

    #[test]
    fn numbers() {
        let kinds = kinds("0 42 -1 +7 0xff 3.5 1e3 -0x1.8p2 inf -nan nan:0x42");
        assert!(matches!(kinds[0], TokenKind::Nat(_)));
        assert!(matches!(kinds[1], TokenKind::Nat(_)));
        assert!(matches!(
            kinds[2],
            TokenKind::Int(LiteralInfo {
                sign: Sign::Minus,
                ..
            })
        ));
        assert!(matches!(
            kinds[3],
            TokenKind::Int(LiteralInfo { sign: Sign::Plus, .. })
        ));
        assert!(matches!(
            kinds[4],
            TokenKind::Nat(LiteralInfo { base: Base::Hex, .. })
        ));
        assert!(matches!(kinds[5], TokenKind::Float(_)));
        assert!(matches!(kinds[6], TokenKind::Float(_)));
        assert!(matches!(
            kinds[7],
            TokenKind::Float(LiteralInfo {
                sign: Sign::Minus,
                base: Base::Hex,
                ..
            })
        ));
        assert!(matches!(
            kinds[8],
            TokenKind::Float(LiteralInfo {
                kind: LiteralKind::Infinity,
                ..
            })
        ));
        assert!(matches!(
            kinds[9],
            TokenKind::Float(LiteralInfo {
                kind: LiteralKind::Nan,
                sign: Sign::Minus,
                ..
            })
        ));
        assert!(matches!(
            kinds[10],
            TokenKind::Float(LiteralInfo {
                kind: LiteralKind::NanPayload,
                ..
            })
        ));
    }

    #[test]
    fn align_and_offset() {
        let kinds = kinds("align=4 offset=0x10 offset");
        assert!(matches!(kinds[0], TokenKind::AlignEqNat(_)));
        assert!(matches!(
            kinds[1],
            TokenKind::OffsetEqNat(LiteralInfo { base: Base::Hex, .. })
        ));
        assert_eq!(kinds[2], TokenKind::Keyword(Keyword::Offset));
    }

    #[test]
    fn strings() {
        assert_eq!(
            kinds(r#""hello" "\00\ff""#),
            vec![
                TokenKind::Text(b"hello".to_vec()),
                TokenKind::Text(vec![0x00, 0xff]),
            ]
        );
    }

    #[test]
    fn comments_skipped() {
        assert_eq!(
            kinds("nop ;; comment\n(; block (; nested ;) ;) drop"),
            vec![
                TokenKind::Instr(InstrClass::Bare, Opcode::Nop),
                TokenKind::Instr(InstrClass::Bare, Opcode::Drop),
            ]
        );
    }

    #[test]
    fn unknown_keyword_is_reserved() {
        assert_eq!(kinds("frobnicate"), vec![TokenKind::Reserved]);
    }

    #[test]
    fn unterminated_string_records_error_and_ends() {
        let errors = lex_errors("\"abc");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("unterminated"));
    }

    #[test]
    fn unknown_character_records_error_and_ends() {
        let errors = lex_errors("(nop) \u{7f}");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("unexpected character"));
    }

    #[test]
    fn bad_number_recovers() {
        let mut tokenizer = Tokenizer::new("1x nop");
        assert_eq!(tokenizer.read().kind, TokenKind::Reserved);
        assert_eq!(
            tokenizer.read().kind,
            TokenKind::Instr(InstrClass::Bare, Opcode::Nop)
        );
        assert_eq!(tokenizer.take_errors().len(), 1);
    }

    #[test]
    fn bad_escape_recovers() {
        let mut tokenizer = Tokenizer::new(r#""\z" nop"#);
        assert_eq!(tokenizer.read().kind, TokenKind::Reserved);
        assert_eq!(
            tokenizer.read().kind,
            TokenKind::Instr(InstrClass::Bare, Opcode::Nop)
        );
        let errors = tokenizer.take_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("invalid escape"));
    }

    #[test]
    fn lookahead() {
        let mut tokenizer = Tokenizer::new("(func)");
        assert_eq!(tokenizer.peek(0).kind, TokenKind::Lpar);
        assert_eq!(tokenizer.peek(1).kind, TokenKind::Keyword(Keyword::Func));
        assert!(tokenizer.match_lpar_keyword(Keyword::Func).is_some());
        assert_eq!(tokenizer.peek(0).kind, TokenKind::Rpar);
    }

    #[test]
    fn match_lpar_keyword_no_partial_consume() {
        let mut tokenizer = Tokenizer::new("(table 1 funcref)");
        assert!(tokenizer.match_lpar_keyword(Keyword::Memory).is_none());
        assert_eq!(tokenizer.peek(0).kind, TokenKind::Lpar);
    }

    #[test]
    fn paren_depth_tracking() {
        let mut tokenizer = Tokenizer::new("((nop))");
        assert_eq!(tokenizer.paren_depth(), 0);
        tokenizer.read();
        tokenizer.read();
        assert_eq!(tokenizer.paren_depth(), 2);
        tokenizer.read(); // nop
        tokenizer.read(); // )
        assert_eq!(tokenizer.paren_depth(), 1);
        tokenizer.read(); // )
        assert_eq!(tokenizer.paren_depth(), 0);
    }

    #[test]
    fn eof_is_sticky() {
        let mut tokenizer = Tokenizer::new("nop");
        tokenizer.read();
        assert_eq!(tokenizer.read().kind, TokenKind::Eof);
        assert_eq!(tokenizer.read().kind, TokenKind::Eof);
    }

    #[test]
    fn span_concatenation_covers_input() {
        // Lexing a well-formed input yields spans that tile it, modulo
        // whitespace and comments.
        let source = "(module (func $f (param i32) nop))";
        let mut tokenizer = Tokenizer::new(source);
        let mut covered = String::new();
        loop {
            let token = tokenizer.read();
            if token.kind == TokenKind::Eof {
                break;
            }
            covered.push_str(token.text(source));
        }
        let expected: String = source.chars().filter(|c| !c.is_whitespace()).collect();
        assert_eq!(covered, expected);
    }
}
