//! Token definitions for the Heron surface syntax.

use std::fmt;

use logos::Logos;

/// One lexical token.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*[^*]*\*+(?:[^/*][^*]*\*+)*/")]
pub enum Token {
    // Keywords.
    #[token("module")]
    Module,
    #[token("import")]
    Import,
    #[token("class")]
    Class,
    #[token("interface")]
    Interface,
    #[token("enum")]
    Enum,
    #[token("implements")]
    Implements,
    #[token("function")]
    Function,
    #[token("var")]
    Var,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("foreach")]
    Foreach,
    #[token("in")]
    In,
    #[token("new")]
    New,
    #[token("null")]
    Null,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("select")]
    Select,
    #[token("from")]
    From,
    #[token("where")]
    Where,
    #[token("mapeach")]
    MapEach,
    #[token("accumulate")]
    Accumulate,
    #[token("forall")]
    Forall,
    #[token("reduce")]
    Reduce,
    #[token("is")]
    Is,
    #[token("as")]
    As,

    // Punctuation and operators.
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("++")]
    PlusPlus,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("^^")]
    CaretCaret,
    #[token("=")]
    Assign,
    #[token("!")]
    Bang,
    #[token("~")]
    Tilde,

    // Literals. Floats must come with a fractional part so `1.x` stays a
    // field access on an integer literal... which Heron does not have, but
    // the lexer should not be the one to decide that.
    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),
    #[regex(r#""(?:[^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    Str(String),
    #[regex(r"'(?:[^'\\]|\\.)'", |lex| unescape_char(lex.slice()))]
    Char(char),
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_owned())]
    Ident(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(name) => write!(f, "identifier '{name}'"),
            Token::Int(v) => write!(f, "integer {v}"),
            Token::Float(v) => write!(f, "float {v}"),
            Token::Str(s) => write!(f, "string \"{s}\""),
            Token::Char(c) => write!(f, "char '{c}'"),
            other => {
                let text = match other {
                    Token::Module => "module",
                    Token::Import => "import",
                    Token::Class => "class",
                    Token::Interface => "interface",
                    Token::Enum => "enum",
                    Token::Implements => "implements",
                    Token::Function => "function",
                    Token::Var => "var",
                    Token::Return => "return",
                    Token::If => "if",
                    Token::Else => "else",
                    Token::While => "while",
                    Token::Foreach => "foreach",
                    Token::In => "in",
                    Token::New => "new",
                    Token::Null => "null",
                    Token::True => "true",
                    Token::False => "false",
                    Token::Select => "select",
                    Token::From => "from",
                    Token::Where => "where",
                    Token::MapEach => "mapeach",
                    Token::Accumulate => "accumulate",
                    Token::Forall => "forall",
                    Token::Reduce => "reduce",
                    Token::Is => "is",
                    Token::As => "as",
                    Token::LBrace => "{",
                    Token::RBrace => "}",
                    Token::LParen => "(",
                    Token::RParen => ")",
                    Token::LBracket => "[",
                    Token::RBracket => "]",
                    Token::Comma => ",",
                    Token::Semi => ";",
                    Token::Colon => ":",
                    Token::Dot => ".",
                    Token::PlusPlus => "++",
                    Token::Plus => "+",
                    Token::Minus => "-",
                    Token::Star => "*",
                    Token::Slash => "/",
                    Token::Percent => "%",
                    Token::EqEq => "==",
                    Token::BangEq => "!=",
                    Token::LtEq => "<=",
                    Token::GtEq => ">=",
                    Token::Lt => "<",
                    Token::Gt => ">",
                    Token::AndAnd => "&&",
                    Token::OrOr => "||",
                    Token::CaretCaret => "^^",
                    Token::Assign => "=",
                    Token::Bang => "!",
                    Token::Tilde => "~",
                    _ => unreachable!("literal tokens handled above"),
                };
                write!(f, "'{text}'")
            }
        }
    }
}

fn unescape(quoted: &str) -> Option<String> {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        out.push(unescape_code(chars.next()?)?);
    }
    Some(out)
}

fn unescape_char(quoted: &str) -> Option<char> {
    let inner = &quoted[1..quoted.len() - 1];
    let mut chars = inner.chars();
    let first = chars.next()?;
    let value = if first == '\\' {
        unescape_code(chars.next()?)?
    } else {
        first
    };
    match chars.next() {
        None => Some(value),
        Some(_) => None,
    }
}

fn unescape_code(code: char) -> Option<char> {
    Some(match code {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        '\\' => '\\',
        '"' => '"',
        '\'' => '\'',
        _ => return None,
    })
}
