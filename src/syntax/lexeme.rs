/// All lexemes of the textual offload IR (`.oir`).
#[derive(Clone, Debug, PartialEq)]
pub enum Lexeme {
    // Keywords
    Module,
    Class,
    Fn,
    Var,
    Const,
    Param,
    Type,
    If,
    Else,
    For,
    Local,
    Kernel,
    Return,
    True,
    False,
    Ref,
    Wide,

    // Type keywords
    IntTy,
    UIntTy,
    RealTy,
    BoolTy,
    VoidTy,
    StringTy,
    CPtrTy,

    // Symbols
    LParen,    // (
    RParen,    // )
    LBrace,    // {
    RBrace,    // }
    LBracket,  // [
    RBracket,  // ]
    Comma,     // ,
    Colon,     // :
    Semicolon, // ;
    At,        // @
    Eq,        // =
    ColonEq,   // :=
    EqEq,      // ==
    NotEq,     // !=
    Lt,        // <
    Le,        // <=
    Gt,        // >
    Ge,        // >=
    Plus,      // +
    Minus,     // -
    Star,      // *
    Slash,     // /
    Percent,   // %
    Shl,       // <<
    Shr,       // >>
    Amp,       // &
    Pipe,      // |
    Caret,     // ^
    Bang,      // !
    Tilde,     // ~

    // Compound assignment
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    ShlEq,
    ShrEq,
    AmpEq,
    PipeEq,
    CaretEq,

    // Literals
    Integer(u64),
    Real(f64),
    Str(String),
    Ident(String),

    // End of file
    Eof,
}

impl Lexeme {
    /// Try to match an identifier string to a keyword or type lexeme.
    pub fn from_keyword(s: &str) -> Option<Lexeme> {
        match s {
            "module" => Some(Lexeme::Module),
            "class" => Some(Lexeme::Class),
            "fn" => Some(Lexeme::Fn),
            "var" => Some(Lexeme::Var),
            "const" => Some(Lexeme::Const),
            "param" => Some(Lexeme::Param),
            "type" => Some(Lexeme::Type),
            "if" => Some(Lexeme::If),
            "else" => Some(Lexeme::Else),
            "for" => Some(Lexeme::For),
            "local" => Some(Lexeme::Local),
            "kernel" => Some(Lexeme::Kernel),
            "return" => Some(Lexeme::Return),
            "true" => Some(Lexeme::True),
            "false" => Some(Lexeme::False),
            "ref" => Some(Lexeme::Ref),
            "wide" => Some(Lexeme::Wide),
            "int" => Some(Lexeme::IntTy),
            "uint" => Some(Lexeme::UIntTy),
            "real" => Some(Lexeme::RealTy),
            "bool" => Some(Lexeme::BoolTy),
            "void" => Some(Lexeme::VoidTy),
            "string" => Some(Lexeme::StringTy),
            "c_ptr" => Some(Lexeme::CPtrTy),
            _ => None,
        }
    }

    /// Keywords that may also appear as an attribute name after `@`.
    pub fn as_attr_name(&self) -> Option<&str> {
        match self {
            Lexeme::Ident(s) => Some(s),
            Lexeme::Local => Some("local"),
            Lexeme::Kernel => Some("kernel"),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Lexeme::Module => "'module'",
            Lexeme::Class => "'class'",
            Lexeme::Fn => "'fn'",
            Lexeme::Var => "'var'",
            Lexeme::Const => "'const'",
            Lexeme::Param => "'param'",
            Lexeme::Type => "'type'",
            Lexeme::If => "'if'",
            Lexeme::Else => "'else'",
            Lexeme::For => "'for'",
            Lexeme::Local => "'local'",
            Lexeme::Kernel => "'kernel'",
            Lexeme::Return => "'return'",
            Lexeme::True => "'true'",
            Lexeme::False => "'false'",
            Lexeme::Ref => "'ref'",
            Lexeme::Wide => "'wide'",
            Lexeme::IntTy => "'int'",
            Lexeme::UIntTy => "'uint'",
            Lexeme::RealTy => "'real'",
            Lexeme::BoolTy => "'bool'",
            Lexeme::VoidTy => "'void'",
            Lexeme::StringTy => "'string'",
            Lexeme::CPtrTy => "'c_ptr'",
            Lexeme::LParen => "'('",
            Lexeme::RParen => "')'",
            Lexeme::LBrace => "'{'",
            Lexeme::RBrace => "'}'",
            Lexeme::LBracket => "'['",
            Lexeme::RBracket => "']'",
            Lexeme::Comma => "','",
            Lexeme::Colon => "':'",
            Lexeme::Semicolon => "';'",
            Lexeme::At => "'@'",
            Lexeme::Eq => "'='",
            Lexeme::ColonEq => "':='",
            Lexeme::EqEq => "'=='",
            Lexeme::NotEq => "'!='",
            Lexeme::Lt => "'<'",
            Lexeme::Le => "'<='",
            Lexeme::Gt => "'>'",
            Lexeme::Ge => "'>='",
            Lexeme::Plus => "'+'",
            Lexeme::Minus => "'-'",
            Lexeme::Star => "'*'",
            Lexeme::Slash => "'/'",
            Lexeme::Percent => "'%'",
            Lexeme::Shl => "'<<'",
            Lexeme::Shr => "'>>'",
            Lexeme::Amp => "'&'",
            Lexeme::Pipe => "'|'",
            Lexeme::Caret => "'^'",
            Lexeme::Bang => "'!'",
            Lexeme::Tilde => "'~'",
            Lexeme::PlusEq => "'+='",
            Lexeme::MinusEq => "'-='",
            Lexeme::StarEq => "'*='",
            Lexeme::SlashEq => "'/='",
            Lexeme::PercentEq => "'%='",
            Lexeme::ShlEq => "'<<='",
            Lexeme::ShrEq => "'>>='",
            Lexeme::AmpEq => "'&='",
            Lexeme::PipeEq => "'|='",
            Lexeme::CaretEq => "'^='",
            Lexeme::Integer(_) => "integer literal",
            Lexeme::Real(_) => "real literal",
            Lexeme::Str(_) => "string literal",
            Lexeme::Ident(_) => "identifier",
            Lexeme::Eof => "end of file",
        }
    }
}
