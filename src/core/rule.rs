/// Rule expressions: tokenizing, parsing, and evaluation against answers.
///
/// Grammar (lowest precedence first):
///
/// ```text
/// expr    := and ("||" and)*
/// and     := unary ("&&" unary)*
/// unary   := "!" unary | primary
/// primary := "(" expr ")" | "true" | "false" | call
/// call    := ident "(" arg "," arg ")"
/// arg     := string | ident
/// ```
///
/// The only function is `isSelected(questionId, optionId)`. Nesting depth
/// and token count are bounded.
use rustc_hash::FxHashMap;
use std::fmt;
use thiserror::Error;

use crate::schema::answer::{answer_for, Answer};
use crate::schema::question::Question;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    #[error("unexpected character '{0}' at offset {1}")]
    UnexpectedChar(char, usize),
    #[error("unterminated string literal starting at offset {0}")]
    UnterminatedString(usize),
    #[error("expected {expected}, found {found}")]
    Unexpected { expected: String, found: String },
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("{function} expects {expected} arguments, got {got}")]
    Arity {
        function: String,
        expected: usize,
        got: usize,
    },
    #[error("rule nests deeper than {0} levels")]
    TooDeep(usize),
    #[error("rule has {0} tokens, more than the {1} allowed")]
    TooLong(usize, usize),
    #[error("{0} called with a blank argument")]
    BlankArgument(String),
}

const IS_SELECTED: &str = "isSelected";

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    LParen,
    RParen,
    Comma,
    And,
    Or,
    Not,
    End,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "identifier '{}'", s),
            Token::Str(s) => write!(f, "string \"{}\"", s),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::Comma => write!(f, "','"),
            Token::And => write!(f, "'&&'"),
            Token::Or => write!(f, "'||'"),
            Token::Not => write!(f, "'!'"),
            Token::End => write!(f, "end of rule"),
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '~')
}

fn tokenize(input: &str) -> Result<Vec<Token>, RuleError> {
    let chars: Vec<char> = input.chars().collect();
    let len = chars.len();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < len {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '&' | '|' => {
                if i + 1 < len && chars[i + 1] == c {
                    tokens.push(if c == '&' { Token::And } else { Token::Or });
                    i += 2;
                } else {
                    return Err(RuleError::UnexpectedChar(c, i));
                }
            }
            '"' | '\'' => {
                let start = i;
                i += 1;
                let mut literal = String::new();
                while i < len && chars[i] != c {
                    literal.push(chars[i]);
                    i += 1;
                }
                if i == len {
                    return Err(RuleError::UnterminatedString(start));
                }
                i += 1;
                tokens.push(Token::Str(literal));
            }
            c if is_ident_char(c) => {
                let mut ident = String::new();
                while i < len && is_ident_char(chars[i]) {
                    ident.push(chars[i]);
                    i += 1;
                }
                tokens.push(Token::Ident(ident));
            }
            other => return Err(RuleError::UnexpectedChar(other, i)),
        }
    }

    tokens.push(Token::End);
    Ok(tokens)
}

/// Parsed rule expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Bool(bool),
    IsSelected { question: String, option: String },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn evaluate(&self, answers: &[Answer]) -> bool {
        match self {
            Expr::Bool(b) => *b,
            Expr::IsSelected { question, option } => {
                answer_for(answers, question).is_some_and(|a| a.is_selected(option))
            }
            Expr::Not(inner) => !inner.evaluate(answers),
            Expr::And(l, r) => l.evaluate(answers) && r.evaluate(answers),
            Expr::Or(l, r) => l.evaluate(answers) || r.evaluate(answers),
        }
    }

    fn collect_refs<'a>(&'a self, out: &mut Vec<(&'a str, &'a str)>) {
        match self {
            Expr::Bool(_) => {}
            Expr::IsSelected { question, option } => {
                out.push((question.as_str(), option.as_str()))
            }
            Expr::Not(inner) => inner.collect_refs(out),
            Expr::And(l, r) | Expr::Or(l, r) => {
                l.collect_refs(out);
                r.collect_refs(out);
            }
        }
    }

    fn rename(&mut self, ids: &FxHashMap<String, String>) {
        match self {
            Expr::Bool(_) => {}
            Expr::IsSelected { question, .. } => {
                if let Some(fresh) = ids.get(question.as_str()) {
                    *question = fresh.clone();
                }
            }
            Expr::Not(inner) => inner.rename(ids),
            Expr::And(l, r) | Expr::Or(l, r) => {
                l.rename(ids);
                r.rename(ids);
            }
        }
    }
}

/// Prints a canonical, fully parenthesized rule that parses back to the
/// same expression.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Bool(b) => write!(f, "{}", b),
            Expr::IsSelected { question, option } => {
                write!(f, "{}({}, {})", IS_SELECTED, Quoted(question), Quoted(option))
            }
            Expr::Not(inner) => write!(f, "!{}", inner),
            Expr::And(l, r) => write!(f, "({} && {})", l, r),
            Expr::Or(l, r) => write!(f, "({} || {})", l, r),
        }
    }
}

/// Nesting allowed for `!` and parentheses.
const MAX_DEPTH: usize = 64;
/// Caps the length of `&&`/`||` chains, which build left-nested trees.
const MAX_TOKENS: usize = 4096;

/// String argument in whichever quote style it does not contain.
struct Quoted<'a>(&'a str);

impl fmt::Display for Quoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.contains('"') {
            write!(f, "'{}'", self.0)
        } else {
            write!(f, "\"{}\"", self.0)
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let t = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, expected: Token) -> Result<(), RuleError> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&expected.to_string()))
        }
    }

    fn unexpected(&self, expected: &str) -> RuleError {
        RuleError::Unexpected {
            expected: expected.to_string(),
            found: self.peek().to_string(),
        }
    }

    fn descend(&mut self) -> Result<(), RuleError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(RuleError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn parse_or(&mut self) -> Result<Expr, RuleError> {
        let mut lhs = self.parse_and()?;
        while *self.peek() == Token::Or {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, RuleError> {
        let mut lhs = self.parse_unary()?;
        while *self.peek() == Token::And {
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, RuleError> {
        if *self.peek() == Token::Not {
            self.advance();
            self.descend()?;
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, RuleError> {
        match self.advance() {
            Token::LParen => {
                self.descend()?;
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                self.depth -= 1;
                Ok(inner)
            }
            Token::Ident(name) if name == "true" => Ok(Expr::Bool(true)),
            Token::Ident(name) if name == "false" => Ok(Expr::Bool(false)),
            Token::Ident(name) => self.parse_call(name),
            other => Err(RuleError::Unexpected {
                expected: "expression".to_string(),
                found: other.to_string(),
            }),
        }
    }

    fn parse_call(&mut self, name: String) -> Result<Expr, RuleError> {
        if name != IS_SELECTED {
            return Err(RuleError::UnknownFunction(name));
        }
        self.expect(Token::LParen)?;

        let mut args = Vec::new();
        if *self.peek() != Token::RParen {
            loop {
                match self.advance() {
                    Token::Str(s) | Token::Ident(s) => args.push(s),
                    other => {
                        return Err(RuleError::Unexpected {
                            expected: "argument".to_string(),
                            found: other.to_string(),
                        })
                    }
                }
                if *self.peek() == Token::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(Token::RParen)?;

        if args.len() != 2 {
            return Err(RuleError::Arity {
                function: name,
                expected: 2,
                got: args.len(),
            });
        }
        if args.iter().any(|a| a.trim().is_empty()) {
            return Err(RuleError::BlankArgument(name));
        }

        let option = args.pop().unwrap_or_default();
        let question = args.pop().unwrap_or_default();
        Ok(Expr::IsSelected { question, option })
    }
}

/// A parsed visibility rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    expr: Expr,
}

impl Rule {
    /// Parse rule text. Empty text is the always-true rule.
    pub fn parse(input: &str) -> Result<Rule, RuleError> {
        if input.trim().is_empty() {
            return Ok(Rule {
                expr: Expr::Bool(true),
            });
        }
        let tokens = tokenize(input)?;
        if tokens.len() > MAX_TOKENS {
            return Err(RuleError::TooLong(tokens.len(), MAX_TOKENS));
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.parse_or()?;
        if *parser.peek() != Token::End {
            return Err(parser.unexpected("end of rule"));
        }
        Ok(Rule { expr })
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn evaluate(&self, answers: &[Answer]) -> bool {
        self.expr.evaluate(answers)
    }

    /// Every `(questionId, optionId)` pair the rule tests.
    pub fn references(&self) -> Vec<(&str, &str)> {
        let mut refs = Vec::new();
        self.expr.collect_refs(&mut refs);
        refs
    }

    /// Rewrite question ids found in `ids` and print the rule back out.
    pub fn renamed(&self, ids: &FxHashMap<String, String>) -> String {
        let mut expr = self.expr.clone();
        expr.rename(ids);
        expr.to_string()
    }
}

/// Whether `question` is visible given `answers`. Rules that fail to
/// parse hide the question and are logged for content authors.
pub fn can_show(question: &Question, answers: &[Answer]) -> bool {
    match Rule::parse(&question.rule) {
        Ok(rule) => rule.evaluate(answers),
        Err(e) => {
            tracing::warn!(
                question = %question.id,
                rule = %question.rule,
                error = %e,
                "invalid rule; hiding question"
            );
            false
        }
    }
}
