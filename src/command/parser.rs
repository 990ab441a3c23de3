//! Parser for the line-oriented command language.
//!
//! One command per line, `name(arg, arg, ...)`. Blank lines and `//`
//! comments are skipped. Unknown command names are an error; `dump` may be
//! written with or without its empty parentheses.

use crate::command::ast::Command;
use crate::command::error::{ParseError, ParseResult};
use crate::storage::{SiteId, TransactionId, Value, VariableId};

/// Command parser for the driver language.
pub struct Parser;

impl Parser {
    /// Parse one script line. `Ok(None)` for blank lines and comments.
    pub fn parse_line(line: &str) -> ParseResult<Option<Command>> {
        let line = match line.find("//") {
            Some(pos) => &line[..pos],
            None => line,
        };
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        Self::parse(line).map(Some)
    }

    /// Parse a single non-empty command.
    pub fn parse(input: &str) -> ParseResult<Command> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseError::Empty);
        }

        let (name, args) = Self::split(input)?;
        match name {
            "begin" => {
                Self::expect_args(name, &args, 1)?;
                Ok(Command::Begin { tid: Self::parse_tid(args[0])? })
            }
            "beginRO" => {
                Self::expect_args(name, &args, 1)?;
                Ok(Command::BeginReadOnly { tid: Self::parse_tid(args[0])? })
            }
            "R" => {
                Self::expect_args(name, &args, 2)?;
                Ok(Command::Read {
                    tid: Self::parse_tid(args[0])?,
                    vid: Self::parse_vid(args[1])?,
                })
            }
            "W" => {
                Self::expect_args(name, &args, 3)?;
                Ok(Command::Write {
                    tid: Self::parse_tid(args[0])?,
                    vid: Self::parse_vid(args[1])?,
                    value: Self::parse_value(args[2])?,
                })
            }
            "end" => {
                Self::expect_args(name, &args, 1)?;
                Ok(Command::End { tid: Self::parse_tid(args[0])? })
            }
            "fail" => {
                Self::expect_args(name, &args, 1)?;
                Ok(Command::Fail { sid: Self::parse_sid(args[0])? })
            }
            "recover" => {
                Self::expect_args(name, &args, 1)?;
                Ok(Command::Recover { sid: Self::parse_sid(args[0])? })
            }
            "dump" => {
                Self::expect_args(name, &args, 0)?;
                Ok(Command::Dump)
            }
            other => Err(ParseError::UnknownCommand(other.to_string())),
        }
    }

    /// Split `name(a, b)` into the name and trimmed argument tokens.
    /// A bare name with no parentheses gets an empty argument list.
    fn split(input: &str) -> ParseResult<(&str, Vec<&str>)> {
        match input.find('(') {
            None => Ok((input, Vec::new())),
            Some(open) => {
                let name = input[..open].trim();
                let rest = input[open + 1..].trim();
                let Some(inner) = rest.strip_suffix(')') else {
                    return Err(ParseError::Malformed(input.to_string()));
                };
                if name.is_empty() {
                    return Err(ParseError::Empty);
                }
                let args: Vec<&str> = inner
                    .split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .collect();
                Ok((name, args))
            }
        }
    }

    fn expect_args(command: &str, args: &[&str], expected: usize) -> ParseResult<()> {
        if args.len() == expected {
            Ok(())
        } else {
            Err(ParseError::WrongArity {
                command: command.to_string(),
                expected,
                got: args.len(),
            })
        }
    }

    fn parse_tid(token: &str) -> ParseResult<TransactionId> {
        let digits = token
            .strip_prefix('T')
            .or_else(|| token.strip_prefix('t'))
            .ok_or_else(|| ParseError::InvalidTransaction(token.to_string()))?;
        digits
            .parse::<u32>()
            .map(TransactionId::new)
            .map_err(|_| ParseError::InvalidTransaction(token.to_string()))
    }

    fn parse_vid(token: &str) -> ParseResult<VariableId> {
        let digits = token
            .strip_prefix('x')
            .or_else(|| token.strip_prefix('X'))
            .ok_or_else(|| ParseError::InvalidVariable(token.to_string()))?;
        digits
            .parse::<u32>()
            .ok()
            .and_then(|k| VariableId::new(k).ok())
            .ok_or_else(|| ParseError::InvalidVariable(token.to_string()))
    }

    fn parse_sid(token: &str) -> ParseResult<SiteId> {
        token
            .parse::<u32>()
            .ok()
            .and_then(|id| SiteId::new(id).ok())
            .ok_or_else(|| ParseError::InvalidSite(token.to_string()))
    }

    fn parse_value(token: &str) -> ParseResult<Value> {
        token
            .parse::<Value>()
            .map_err(|_| ParseError::InvalidValue(token.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(n: u32) -> TransactionId {
        TransactionId::new(n)
    }

    fn x(k: u32) -> VariableId {
        VariableId::new(k).unwrap()
    }

    #[test]
    fn test_parse_all_commands() {
        assert_eq!(Parser::parse("begin(T1)").unwrap(), Command::Begin { tid: t(1) });
        assert_eq!(
            Parser::parse("beginRO(T2)").unwrap(),
            Command::BeginReadOnly { tid: t(2) }
        );
        assert_eq!(
            Parser::parse("R(T1,x4)").unwrap(),
            Command::Read { tid: t(1), vid: x(4) }
        );
        assert_eq!(
            Parser::parse("W(T1,x4,101)").unwrap(),
            Command::Write { tid: t(1), vid: x(4), value: 101 }
        );
        assert_eq!(Parser::parse("end(T1)").unwrap(), Command::End { tid: t(1) });
        assert_eq!(
            Parser::parse("fail(2)").unwrap(),
            Command::Fail { sid: SiteId::new(2).unwrap() }
        );
        assert_eq!(
            Parser::parse("recover(2)").unwrap(),
            Command::Recover { sid: SiteId::new(2).unwrap() }
        );
        assert_eq!(Parser::parse("dump()").unwrap(), Command::Dump);
        assert_eq!(Parser::parse("dump").unwrap(), Command::Dump);
    }

    #[test]
    fn test_whitespace_tolerated() {
        assert_eq!(
            Parser::parse("  W( T3 , x18 , -7 )  ").unwrap(),
            Command::Write { tid: t(3), vid: x(18), value: -7 }
        );
    }

    #[test]
    fn test_blank_and_comment_lines_skip() {
        assert_eq!(Parser::parse_line("").unwrap(), None);
        assert_eq!(Parser::parse_line("   ").unwrap(), None);
        assert_eq!(Parser::parse_line("// a comment").unwrap(), None);
        assert_eq!(
            Parser::parse_line("begin(T1) // trailing").unwrap(),
            Some(Command::Begin { tid: t(1) })
        );
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            Parser::parse("frobnicate(T1)"),
            Err(ParseError::UnknownCommand("frobnicate".to_string()))
        );
    }

    #[test]
    fn test_wrong_arity() {
        assert_eq!(
            Parser::parse("W(T1,x2)"),
            Err(ParseError::WrongArity {
                command: "W".to_string(),
                expected: 3,
                got: 2
            })
        );
    }

    #[test]
    fn test_bad_tokens() {
        assert!(matches!(
            Parser::parse("begin(1)"),
            Err(ParseError::InvalidTransaction(_))
        ));
        assert!(matches!(
            Parser::parse("R(T1,y4)"),
            Err(ParseError::InvalidVariable(_))
        ));
        assert!(matches!(
            Parser::parse("R(T1,x21)"),
            Err(ParseError::InvalidVariable(_))
        ));
        assert!(matches!(
            Parser::parse("fail(11)"),
            Err(ParseError::InvalidSite(_))
        ));
        assert!(matches!(
            Parser::parse("W(T1,x2,abc)"),
            Err(ParseError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_missing_close_paren() {
        assert!(matches!(
            Parser::parse("begin(T1"),
            Err(ParseError::Malformed(_))
        ));
    }
}
