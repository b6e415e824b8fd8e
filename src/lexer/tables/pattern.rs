// src/lexer/tables/pattern.rs
// Regex-like token patterns -> rule trees. Only regular constructs are accepted.

use crate::grammar::Rule;

use super::chars::CharacterSet;

const MAX_REPETITION: u32 = 1000;

pub fn parse_pattern(pattern: &str) -> Result<Rule, String> {
    let mut parser = PatternParser {
        chars: pattern.chars().collect(),
        pos: 0,
    };
    let rule = parser.parse_alternation()?;
    match parser.peek() {
        None => Ok(rule),
        Some(')') => Err(format!("unmatched `)` at offset {}", parser.pos)),
        Some(c) => Err(format!("unexpected `{c}` at offset {}", parser.pos)),
    }
}

pub(crate) fn word_chars() -> CharacterSet {
    CharacterSet::from_range('a', 'z')
        .add_range('A', 'Z')
        .add_range('0', '9')
        .add_char('_')
}

fn space_chars() -> CharacterSet {
    CharacterSet::empty()
        .add_char(' ')
        .add_range('\t', '\r')
}

struct PatternParser {
    chars: Vec<char>,
    pos: usize,
}

impl PatternParser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_alternation(&mut self) -> Result<Rule, String> {
        let mut alternatives = vec![self.parse_sequence()?];
        while self.eat('|') {
            alternatives.push(self.parse_sequence()?);
        }
        Ok(if alternatives.len() == 1 {
            alternatives.remove(0)
        } else {
            Rule::Choice(alternatives)
        })
    }

    fn parse_sequence(&mut self) -> Result<Rule, String> {
        let mut elements = Vec::new();
        while let Some(c) = self.peek() {
            if c == '|' || c == ')' {
                break;
            }
            elements.push(self.parse_repetition()?);
        }
        Ok(match elements.len() {
            0 => Rule::Blank,
            1 => elements.remove(0),
            _ => Rule::Seq(elements),
        })
    }

    fn parse_repetition(&mut self) -> Result<Rule, String> {
        let mut rule = self.parse_atom()?;
        loop {
            match self.peek() {
                Some('*') => {
                    self.pos += 1;
                    rule = Rule::optional(Rule::repeat(rule));
                }
                Some('+') => {
                    self.pos += 1;
                    rule = Rule::repeat(rule);
                }
                Some('?') => {
                    self.pos += 1;
                    rule = Rule::optional(rule);
                }
                Some('{') => match self.parse_count()? {
                    Some((min, max)) => rule = expand_count(rule, min, max),
                    None => break,
                },
                _ => break,
            }
            if self.peek() == Some('?') {
                return Err(format!("lazy quantifier at offset {}", self.pos));
            }
        }
        Ok(rule)
    }

    /// `{n}`, `{n,}` or `{n,m}`. A `{` that does not start a count is left for the atom parser.
    fn parse_count(&mut self) -> Result<Option<(u32, Option<u32>)>, String> {
        let start = self.pos;
        self.pos += 1;
        let Some(min) = self.parse_number() else {
            self.pos = start;
            return Ok(None);
        };
        let max = if self.eat(',') {
            self.parse_number()
        } else {
            Some(min)
        };
        if !self.eat('}') {
            self.pos = start;
            return Ok(None);
        }
        if let Some(max) = max {
            if max < min {
                return Err(format!("invalid repetition count {{{min},{max}}}"));
            }
        }
        if min > MAX_REPETITION || max.is_some_and(|m| m > MAX_REPETITION) {
            return Err(format!("repetition count above {MAX_REPETITION}"));
        }
        Ok(Some((min, max)))
    }

    fn parse_number(&mut self) -> Option<u32> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return None;
        }
        self.chars[start..self.pos]
            .iter()
            .collect::<String>()
            .parse()
            .ok()
    }

    fn parse_atom(&mut self) -> Result<Rule, String> {
        let offset = self.pos;
        let Some(c) = self.next() else {
            return Err("unexpected end of pattern".into());
        };
        match c {
            '(' => {
                if self.eat('?') && !self.eat(':') {
                    return Err(format!("lookaround or inline flags at offset {offset}"));
                }
                let inner = self.parse_alternation()?;
                if !self.eat(')') {
                    return Err(format!("unclosed group opened at offset {offset}"));
                }
                Ok(inner)
            }
            '[' => self.parse_class().map(Rule::CharacterSet),
            '.' => Ok(Rule::CharacterSet(CharacterSet::from_char('\n').negate())),
            '\\' => self.parse_escape().map(Rule::CharacterSet),
            '^' | '$' => Err(format!("anchor `{c}` at offset {offset}")),
            '*' | '+' | '?' => Err(format!("nothing to repeat before `{c}` at offset {offset}")),
            _ => Ok(Rule::CharacterSet(CharacterSet::from_char(c))),
        }
    }

    fn parse_escape(&mut self) -> Result<CharacterSet, String> {
        let Some(c) = self.next() else {
            return Err("trailing backslash".into());
        };
        let set = match c {
            'd' => CharacterSet::from_range('0', '9'),
            'D' => CharacterSet::from_range('0', '9').negate(),
            'w' => word_chars(),
            'W' => word_chars().negate(),
            's' => space_chars(),
            'S' => space_chars().negate(),
            'n' => CharacterSet::from_char('\n'),
            'r' => CharacterSet::from_char('\r'),
            't' => CharacterSet::from_char('\t'),
            'f' => CharacterSet::from_char('\x0C'),
            'v' => CharacterSet::from_char('\x0B'),
            '0' => CharacterSet::from_char('\0'),
            'x' => CharacterSet::from_char(self.parse_hex(2)?),
            'u' => {
                if self.eat('{') {
                    let start = self.pos;
                    while self.peek().is_some_and(|c| c != '}') {
                        self.pos += 1;
                    }
                    let digits: String = self.chars[start..self.pos].iter().collect();
                    if !self.eat('}') {
                        return Err("unterminated `\\u{` escape".into());
                    }
                    CharacterSet::from_char(hex_to_char(&digits)?)
                } else {
                    CharacterSet::from_char(self.parse_hex(4)?)
                }
            }
            '1'..='9' => return Err(format!("backreference `\\{c}`")),
            'b' | 'B' => return Err(format!("word boundary `\\{c}`")),
            'p' | 'P' => return Err(format!("unicode property class `\\{c}`")),
            _ => CharacterSet::from_char(c),
        };
        Ok(set)
    }

    fn parse_hex(&mut self, len: usize) -> Result<char, String> {
        if self.pos + len > self.chars.len() {
            return Err("truncated hex escape".into());
        }
        let digits: String = self.chars[self.pos..self.pos + len].iter().collect();
        self.pos += len;
        hex_to_char(&digits)
    }

    fn parse_class(&mut self) -> Result<CharacterSet, String> {
        let offset = self.pos - 1;
        let negated = self.eat('^');
        let mut set = CharacterSet::empty();
        let mut first = true;
        loop {
            let Some(c) = self.next() else {
                return Err(format!("unclosed character class opened at offset {offset}"));
            };
            if c == ']' && !first {
                break;
            }
            first = false;

            let lo = if c == '\\' {
                let escaped = self.parse_escape()?;
                match escaped.single_char() {
                    Some(ch) => ch,
                    None => {
                        set = set.union(&escaped);
                        continue;
                    }
                }
            } else {
                c
            };

            if self.peek() == Some('-') && self.peek_at(1).is_some_and(|n| n != ']') {
                self.pos += 1;
                let hi = match self.next() {
                    Some('\\') => self
                        .parse_escape()?
                        .single_char()
                        .ok_or_else(|| format!("class escape used as range bound at offset {}", self.pos))?,
                    Some(h) => h,
                    None => return Err(format!("unclosed character class opened at offset {offset}")),
                };
                if hi < lo {
                    return Err(format!("invalid range `{lo}-{hi}`"));
                }
                set = set.add_range(lo, hi);
            } else {
                set = set.add_char(lo);
            }
        }
        Ok(if negated { set.negate() } else { set })
    }
}

fn hex_to_char(digits: &str) -> Result<char, String> {
    u32::from_str_radix(digits, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| format!("invalid code point `{digits}`"))
}

fn expand_count(rule: Rule, min: u32, max: Option<u32>) -> Rule {
    let mut elements: Vec<Rule> = (0..min).map(|_| rule.clone()).collect();
    match max {
        None => elements.push(Rule::optional(Rule::repeat(rule))),
        Some(max) => {
            for _ in min..max {
                elements.push(Rule::optional(rule.clone()));
            }
        }
    }
    match elements.len() {
        0 => Rule::Blank,
        1 => elements.remove(0),
        _ => Rule::Seq(elements),
    }
}
