//! GDB/MI output records
//!
//! One line of debugger stdout is either an MI record, the `(gdb)` prompt, or
//! something the debuggee printed on the shared terminal. [`parse_line`] tells
//! these apart and decodes MI records into [`MiRecord`].

/// Errors produced while decoding a line that looked like an MI record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MiParseError {
    #[error("unexpected end of input at column {0}")]
    UnexpectedEnd(usize),

    #[error("expected {expected} at column {col}, found {found:?}")]
    Expected {
        expected: &'static str,
        col: usize,
        found: char,
    },

    #[error("unknown result class: {0}")]
    UnknownResultClass(String),

    #[error("invalid escape sequence at column {0}")]
    InvalidEscape(usize),
}

/// An MI value: a C-string constant, a tuple, or a list.
///
/// Lists of results (`[frame={..},frame={..}]`) keep only the values; MI uses
/// the keys there as repeated type names, not as lookup keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiValue {
    Const(String),
    Tuple(MiTuple),
    List(Vec<MiValue>),
}

impl MiValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MiValue::Const(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&MiTuple> {
        match self {
            MiValue::Tuple(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[MiValue]> {
        match self {
            MiValue::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Ordered `key=value` pairs, as found in tuples and after a record class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MiTuple(Vec<(String, MiValue)>);

impl MiTuple {
    pub fn new(entries: Vec<(String, MiValue)>) -> Self {
        Self(entries)
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&MiValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MiValue::as_str)
    }

    pub fn get_tuple(&self, key: &str) -> Option<&MiTuple> {
        self.get(key).and_then(MiValue::as_tuple)
    }

    pub fn get_list(&self, key: &str) -> Option<&[MiValue]> {
        self.get(key).and_then(MiValue::as_list)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MiValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultClass {
    Done,
    Running,
    Connected,
    Error,
    Exit,
}

impl ResultClass {
    fn parse(word: &str) -> Result<Self, MiParseError> {
        match word {
            "done" => Ok(ResultClass::Done),
            "running" => Ok(ResultClass::Running),
            "connected" => Ok(ResultClass::Connected),
            "error" => Ok(ResultClass::Error),
            "exit" => Ok(ResultClass::Exit),
            other => Err(MiParseError::UnknownResultClass(other.to_string())),
        }
    }
}

/// `*` exec, `+` status and `=` notify records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncKind {
    Exec,
    Status,
    Notify,
}

/// `~` console, `@` target and `&` log stream records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Console,
    Target,
    Log,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiRecord {
    Result {
        token: Option<u64>,
        class: ResultClass,
        results: MiTuple,
    },
    Async {
        token: Option<u64>,
        kind: AsyncKind,
        class: String,
        results: MiTuple,
    },
    Stream {
        kind: StreamKind,
        text: String,
    },
    Prompt,
}

/// Parse one line of debugger output.
///
/// Returns `Ok(None)` for lines that do not start like an MI record; those are
/// output of the debuggee sharing the debugger's stdout.
pub fn parse_line(line: &str) -> Result<Option<MiRecord>, MiParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim_end() == "(gdb)" {
        return Ok(Some(MiRecord::Prompt));
    }

    let mut cur = Cursor::new(line);
    let digits = cur.take_while(|b| b.is_ascii_digit());
    let token = if digits.is_empty() {
        None
    } else {
        match digits.parse::<u64>() {
            Ok(token) => Some(token),
            Err(_) => return Ok(None),
        }
    };

    let Some(lead) = cur.peek() else {
        return Ok(None);
    };

    let record = match lead {
        b'^' => {
            cur.bump();
            let class = ResultClass::parse(cur.take_while(is_class_byte))?;
            let results = cur.parse_trailing_results()?;
            MiRecord::Result {
                token,
                class,
                results,
            }
        }
        b'*' | b'+' | b'=' => {
            cur.bump();
            let kind = match lead {
                b'*' => AsyncKind::Exec,
                b'+' => AsyncKind::Status,
                _ => AsyncKind::Notify,
            };
            let class = cur.take_while(is_class_byte);
            if class.is_empty() {
                return Ok(None);
            }
            let class = class.to_string();
            let results = cur.parse_trailing_results()?;
            MiRecord::Async {
                token,
                kind,
                class,
                results,
            }
        }
        b'~' | b'@' | b'&' if token.is_none() => {
            cur.bump();
            if cur.peek() != Some(b'"') {
                return Ok(None);
            }
            let kind = match lead {
                b'~' => StreamKind::Console,
                b'@' => StreamKind::Target,
                _ => StreamKind::Log,
            };
            let text = cur.parse_c_string()?;
            cur.expect_end()?;
            MiRecord::Stream { kind, text }
        }
        _ => return Ok(None),
    };

    Ok(Some(record))
}

/// Find an MI record that starts partway through a line.
///
/// The debuggee shares the debugger's stdout, so text it flushed without a
/// trailing newline gets the next record appended to it. Only records that
/// move the session forward are looked for: tokenized results, `*stopped` and
/// `*running`, and hyphenated `=` notifications. Returns the leading text and
/// the record.
pub fn split_embedded_record(line: &str) -> Option<(&str, MiRecord)> {
    let bytes = line.as_bytes();
    for (idx, &b) in bytes.iter().enumerate().skip(1) {
        let start = match b {
            b'*' | b'=' => idx,
            b'^' => {
                let digits = bytes[..idx]
                    .iter()
                    .rev()
                    .take_while(|b| b.is_ascii_digit())
                    .count();
                if digits == 0 || digits == idx {
                    continue;
                }
                idx - digits
            }
            _ => continue,
        };

        let Ok(Some(record)) = parse_line(&line[start..]) else {
            continue;
        };
        let drives_session = match &record {
            MiRecord::Result { token, .. } => token.is_some(),
            MiRecord::Async {
                kind: AsyncKind::Exec,
                class,
                ..
            } => class == "stopped" || class == "running",
            MiRecord::Async {
                kind: AsyncKind::Notify,
                class,
                results,
                ..
            } => class.contains('-') && !results.is_empty(),
            _ => false,
        };
        if drives_session {
            return Some((&line[..start], record));
        }
    }
    None
}

/// Find the first C-string literal inside a rendered value and decode it.
///
/// GDB renders a `const char *` as `0x4006f4 "empty"` and a Rust `&str` as
/// `"empty"`; both yield `empty`.
pub fn extract_c_string(text: &str) -> Option<String> {
    let start = text.find('"')?;
    let mut cur = Cursor::new(&text[start..]);
    cur.parse_c_string().ok()
}

/// GDB reports `exit-code` in octal (`"01"`, `"0377"`).
pub fn parse_octal_exit_code(text: &str) -> Option<i32> {
    i32::from_str_radix(text, 8).ok()
}

/// Quote a command argument if MI would otherwise split or misread it.
pub fn quote_arg(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"_-.:/+*&<>[]$@".contains(&b));
    if plain {
        return arg.to_string();
    }
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    for ch in arg.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn is_class_byte(b: u8) -> bool {
    b.is_ascii_lowercase() || b == b'-'
}

fn is_variable_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if !pred(b) {
                break;
            }
            self.pos += 1;
        }
        // Predicates only accept ASCII, so the slice stays on char boundaries.
        &self.src[start..self.pos]
    }

    fn expect(&mut self, byte: u8, expected: &'static str) -> Result<(), MiParseError> {
        match self.bump() {
            Some(b) if b == byte => Ok(()),
            Some(b) => Err(MiParseError::Expected {
                expected,
                col: self.pos,
                found: b as char,
            }),
            None => Err(MiParseError::UnexpectedEnd(self.pos)),
        }
    }

    fn expect_end(&self) -> Result<(), MiParseError> {
        match self.peek() {
            None => Ok(()),
            Some(b) => Err(MiParseError::Expected {
                expected: "end of record",
                col: self.pos + 1,
                found: b as char,
            }),
        }
    }

    fn parse_trailing_results(&mut self) -> Result<MiTuple, MiParseError> {
        let mut entries = Vec::new();
        while self.peek() == Some(b',') {
            self.bump();
            entries.push(self.parse_result()?);
        }
        self.expect_end()?;
        Ok(MiTuple(entries))
    }

    fn parse_result(&mut self) -> Result<(String, MiValue), MiParseError> {
        let key = self.take_while(is_variable_byte);
        if key.is_empty() {
            return match self.peek() {
                Some(b) => Err(MiParseError::Expected {
                    expected: "variable name",
                    col: self.pos + 1,
                    found: b as char,
                }),
                None => Err(MiParseError::UnexpectedEnd(self.pos)),
            };
        }
        let key = key.to_string();
        self.expect(b'=', "'='")?;
        let value = self.parse_value()?;
        Ok((key, value))
    }

    fn parse_value(&mut self) -> Result<MiValue, MiParseError> {
        match self.peek() {
            Some(b'"') => Ok(MiValue::Const(self.parse_c_string()?)),
            Some(b'{') => {
                self.bump();
                let mut entries = Vec::new();
                if self.peek() == Some(b'}') {
                    self.bump();
                    return Ok(MiValue::Tuple(MiTuple(entries)));
                }
                loop {
                    entries.push(self.parse_result()?);
                    match self.bump() {
                        Some(b',') => continue,
                        Some(b'}') => break,
                        Some(b) => {
                            return Err(MiParseError::Expected {
                                expected: "',' or '}'",
                                col: self.pos,
                                found: b as char,
                            })
                        }
                        None => return Err(MiParseError::UnexpectedEnd(self.pos)),
                    }
                }
                Ok(MiValue::Tuple(MiTuple(entries)))
            }
            Some(b'[') => {
                self.bump();
                let mut items = Vec::new();
                if self.peek() == Some(b']') {
                    self.bump();
                    return Ok(MiValue::List(items));
                }
                loop {
                    let item = match self.peek() {
                        Some(b'"') | Some(b'{') | Some(b'[') => self.parse_value()?,
                        _ => self.parse_result()?.1,
                    };
                    items.push(item);
                    match self.bump() {
                        Some(b',') => continue,
                        Some(b']') => break,
                        Some(b) => {
                            return Err(MiParseError::Expected {
                                expected: "',' or ']'",
                                col: self.pos,
                                found: b as char,
                            })
                        }
                        None => return Err(MiParseError::UnexpectedEnd(self.pos)),
                    }
                }
                Ok(MiValue::List(items))
            }
            Some(b) => Err(MiParseError::Expected {
                expected: "value",
                col: self.pos + 1,
                found: b as char,
            }),
            None => Err(MiParseError::UnexpectedEnd(self.pos)),
        }
    }

    /// Decode a C-string. Escapes are decoded to bytes first so that octal
    /// sequences spelling out UTF-8 come back as the original characters.
    fn parse_c_string(&mut self) -> Result<String, MiParseError> {
        self.expect(b'"', "'\"'")?;
        let mut bytes = Vec::new();
        loop {
            let Some(b) = self.bump() else {
                return Err(MiParseError::UnexpectedEnd(self.pos));
            };
            match b {
                b'"' => break,
                b'\\' => {
                    let col = self.pos;
                    let Some(esc) = self.bump() else {
                        return Err(MiParseError::UnexpectedEnd(self.pos));
                    };
                    match esc {
                        b'n' => bytes.push(b'\n'),
                        b't' => bytes.push(b'\t'),
                        b'r' => bytes.push(b'\r'),
                        b'a' => bytes.push(0x07),
                        b'b' => bytes.push(0x08),
                        b'f' => bytes.push(0x0c),
                        b'v' => bytes.push(0x0b),
                        b'e' => bytes.push(0x1b),
                        b'"' | b'\\' | b'\'' | b'?' => bytes.push(esc),
                        b'0'..=b'7' => {
                            let mut value = u32::from(esc - b'0');
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        self.bump();
                                        value = value * 8 + u32::from(d - b'0');
                                    }
                                    _ => break,
                                }
                            }
                            let byte = u8::try_from(value)
                                .map_err(|_| MiParseError::InvalidEscape(col))?;
                            bytes.push(byte);
                        }
                        _ => return Err(MiParseError::InvalidEscape(col)),
                    }
                }
                other => bytes.push(other),
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
