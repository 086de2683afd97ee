//! Token kinds for the admin console's statement grammar. Real SQL
//! text parsing is out of scope for the core; this is the minimal
//! lexer the bundled console front-end uses to turn its own command
//! language into the planner-neutral [`crate::command::Statement`]
//! tree the dispatcher actually runs. Built with `logos`, trimmed
//! down to the keywords this grammar recognises.

use logos::Logos;
use strum_macros::EnumIter;
pub use self::TokenKind::*;

#[allow(non_camel_case_types)]
#[derive(Logos, EnumIter, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Error,

    EOI,

    #[regex(r"[ \t\r\n\f]+", logos::skip)]
    Whitespace,

    #[regex(r"--[^\n]*", logos::skip)]
    Comment,

    #[regex(r#"[_a-zA-Z][_a-zA-Z0-9]*"#)]
    Ident,

    #[regex(r#"`[^`]*`"#)]
    #[regex(r#"'([^'\\]|\\.|'')*'"#)]
    #[regex(r#""([^"\\]|\\.|"")*""#)]
    QuotedString,

    #[regex(r"[0-9]+")]
    LiteralInteger,

    #[regex(r"[0-9]+[eE][+-]?[0-9]+")]
    #[regex(r"([0-9]*\.[0-9]+([eE][+-]?[0-9]+)?)|([0-9]+\.[0-9]*([eE][+-]?[0-9]+)?)")]
    LiteralFloat,

    // Symbols
    #[token("=")]
    Eq,
    #[token("<>")]
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    Lte,
    #[token(">=")]
    Gte,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(".")]
    Period,
    #[token(";")]
    SemiColon,
    /// Placeholder used in a prepared statement.
    #[token("?")]
    Placeholder,

    // Keywords, alphabetical.
    #[token("ASC", ignore(ascii_case))]
    ASC,
    #[token("AUTOCOMMIT", ignore(ascii_case))]
    AUTOCOMMIT,
    #[token("AUTO_INCREMENT", ignore(ascii_case))]
    AUTO_INCREMENT,
    #[token("AVG", ignore(ascii_case))]
    AVG,
    #[token("BEGIN", ignore(ascii_case))]
    BEGIN,
    #[token("BIGINT", ignore(ascii_case))]
    BIGINT,
    #[token("BOOL", ignore(ascii_case))]
    #[token("BOOLEAN", ignore(ascii_case))]
    BOOLEAN,
    #[token("BY", ignore(ascii_case))]
    BY,
    #[token("COMMIT", ignore(ascii_case))]
    COMMIT,
    #[token("COMMITTED", ignore(ascii_case))]
    COMMITTED,
    #[token("COUNT", ignore(ascii_case))]
    COUNT,
    #[token("CREATE", ignore(ascii_case))]
    CREATE,
    #[token("DATABASE", ignore(ascii_case))]
    DATABASE,
    #[token("DATABASES", ignore(ascii_case))]
    DATABASES,
    #[token("DECIMAL", ignore(ascii_case))]
    DECIMAL,
    #[token("DEFAULT", ignore(ascii_case))]
    DEFAULT,
    #[token("DELETE", ignore(ascii_case))]
    DELETE,
    #[token("DESC", ignore(ascii_case))]
    DESC,
    #[token("DOUBLE", ignore(ascii_case))]
    DOUBLE,
    #[token("DROP", ignore(ascii_case))]
    DROP,
    #[token("EXISTS", ignore(ascii_case))]
    EXISTS,
    #[token("FLOAT", ignore(ascii_case))]
    FLOAT,
    #[token("FROM", ignore(ascii_case))]
    FROM,
    #[token("IF", ignore(ascii_case))]
    IF,
    #[token("INDEX", ignore(ascii_case))]
    INDEX,
    #[token("INSERT", ignore(ascii_case))]
    INSERT,
    #[token("INT", ignore(ascii_case))]
    #[token("INTEGER", ignore(ascii_case))]
    INT,
    #[token("INTO", ignore(ascii_case))]
    INTO,
    #[token("ISOLATION", ignore(ascii_case))]
    ISOLATION,
    #[token("KEY", ignore(ascii_case))]
    KEY,
    #[token("LEVEL", ignore(ascii_case))]
    LEVEL,
    #[token("LIMIT", ignore(ascii_case))]
    LIMIT,
    #[token("MAX", ignore(ascii_case))]
    MAX,
    #[token("MIN", ignore(ascii_case))]
    MIN,
    #[token("NOT", ignore(ascii_case))]
    NOT,
    #[token("NULL", ignore(ascii_case))]
    NULL,
    #[token("OFFSET", ignore(ascii_case))]
    OFFSET,
    #[token("ON", ignore(ascii_case))]
    ON,
    #[token("ORDER", ignore(ascii_case))]
    ORDER,
    #[token("PRIMARY", ignore(ascii_case))]
    PRIMARY,
    #[token("READ", ignore(ascii_case))]
    READ,
    #[token("RENAME", ignore(ascii_case))]
    RENAME,
    #[token("REPEATABLE", ignore(ascii_case))]
    REPEATABLE,
    #[token("ROLLBACK", ignore(ascii_case))]
    ROLLBACK,
    #[token("SERIALIZABLE", ignore(ascii_case))]
    SERIALIZABLE,
    #[token("SELECT", ignore(ascii_case))]
    SELECT,
    #[token("SET", ignore(ascii_case))]
    SET,
    #[token("SHOW", ignore(ascii_case))]
    SHOW,
    #[token("SMALLINT", ignore(ascii_case))]
    SMALLINT,
    #[token("START", ignore(ascii_case))]
    START,
    #[token("SUM", ignore(ascii_case))]
    SUM,
    #[token("TABLE", ignore(ascii_case))]
    TABLE,
    #[token("TABLES", ignore(ascii_case))]
    TABLES,
    #[token("TEXT", ignore(ascii_case))]
    TEXT,
    #[token("TINYINT", ignore(ascii_case))]
    TINYINT,
    #[token("TO", ignore(ascii_case))]
    TO,
    #[token("TRANSACTION", ignore(ascii_case))]
    TRANSACTION,
    #[token("UNCOMMITTED", ignore(ascii_case))]
    UNCOMMITTED,
    #[token("UNIQUE", ignore(ascii_case))]
    UNIQUE,
    #[token("UPDATE", ignore(ascii_case))]
    UPDATE,
    #[token("USE", ignore(ascii_case))]
    USE,
    #[token("VALUES", ignore(ascii_case))]
    VALUES,
    #[token("VARBINARY", ignore(ascii_case))]
    VARBINARY,
    #[token("VARCHAR", ignore(ascii_case))]
    VARCHAR,
    #[token("WHERE", ignore(ascii_case))]
    WHERE,
}

impl TokenKind {
    pub fn is_literal(&self) -> bool {
        matches!(self, LiteralInteger | LiteralFloat | QuotedString | NULL)
    }

    /// Words that name a statement/clause keyword rather than an
    /// identifier, literal, punctuation symbol, or lexer meta token.
    pub fn is_keyword(&self) -> bool {
        !matches!(
            self,
            Error
                | EOI
                | Whitespace
                | Comment
                | Ident
                | QuotedString
                | LiteralInteger
                | LiteralFloat
                | Eq
                | NotEq
                | Lt
                | Gt
                | Lte
                | Gte
                | Plus
                | Minus
                | Star
                | LParen
                | RParen
                | Comma
                | Period
                | SemiColon
                | Placeholder
        )
    }
}
