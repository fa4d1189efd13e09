//! Reply scanning primitives
//!
//! Record parsers are straight-line chains of matcher calls over an
//! immutable input slice. A [`Cursor`] carries the current position and a
//! failed flag; every matcher checks the flag first, so a chain
//! short-circuits at the first mismatch without unwinding, and the final
//! cursor state is the parse result. A partial match is a failed match.

/// Scanning position over one reply payload.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> Cursor<'a> {
    /// Start scanning at the beginning of `input`.
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            failed: false,
        }
    }

    /// True once any matcher in the chain has failed.
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// True if the whole chain matched.
    pub fn matched(&self) -> bool {
        !self.failed
    }

    fn fail(mut self) -> Self {
        self.failed = true;
        self
    }

    fn rest(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    /// Match an exact byte sequence.
    pub fn literal(mut self, text: &str) -> Self {
        if self.failed {
            return self;
        }
        if self.rest().starts_with(text.as_bytes()) {
            self.pos += text.len();
            self
        } else {
            self.fail()
        }
    }

    /// Match exactly `count` ASCII digits into an unsigned value.
    pub fn digits(mut self, count: usize, out: &mut u32) -> Self {
        if self.failed {
            return self;
        }
        let rest = self.rest();
        if rest.len() < count || !rest[..count].iter().all(u8::is_ascii_digit) {
            return self.fail();
        }
        let mut value: u32 = 0;
        for digit in &rest[..count] {
            value = value * 10 + u32::from(digit - b'0');
        }
        *out = value;
        self.pos += count;
        self
    }

    /// Match a variable-length unsigned integer (at least one digit).
    pub fn uint(mut self, out: &mut u32) -> Self {
        if self.failed {
            return self;
        }
        let digits = self.rest().iter().take_while(|b| b.is_ascii_digit()).count();
        if digits == 0 {
            return self.fail();
        }
        let mut value: u32 = 0;
        for digit in &self.rest()[..digits] {
            value = match value
                .checked_mul(10)
                .and_then(|v| v.checked_add(u32::from(digit - b'0')))
            {
                Some(v) => v,
                None => return self.fail(),
            };
        }
        *out = value;
        self.pos += digits;
        self
    }

    /// Match a variable-length integer with an optional leading minus sign.
    pub fn int(mut self, out: &mut i32) -> Self {
        if self.failed {
            return self;
        }
        let negative = self.rest().first() == Some(&b'-');
        if negative {
            self.pos += 1;
        }
        let mut magnitude: u32 = 0;
        self = self.uint(&mut magnitude);
        if self.failed || magnitude > i32::MAX as u32 {
            return self.fail();
        }
        *out = if negative {
            -(magnitude as i32)
        } else {
            magnitude as i32
        };
        self
    }

    /// Match one byte drawn from `set`, storing the byte that matched.
    pub fn one_of(mut self, set: &str, out: &mut u8) -> Self {
        if self.failed {
            return self;
        }
        match self.rest().first() {
            Some(&byte) if set.as_bytes().contains(&byte) => {
                *out = byte;
                self.pos += 1;
                self
            }
            _ => self.fail(),
        }
    }

    /// Match a single delimiter byte.
    pub fn delimiter(mut self, delim: u8) -> Self {
        if self.failed {
            return self;
        }
        if self.rest().first() == Some(&delim) {
            self.pos += 1;
            self
        } else {
            self.fail()
        }
    }

    /// Match free text up to (and consuming) the delimiter.
    pub fn text_until(mut self, delim: u8, out: &mut String) -> Self {
        if self.failed {
            return self;
        }
        match self.rest().iter().position(|&b| b == delim) {
            Some(end) => {
                *out = String::from_utf8_lossy(&self.rest()[..end]).into_owned();
                self.pos += end + 1;
                self
            }
            None => self.fail(),
        }
    }

    /// Match all remaining input as free text.
    pub fn text_to_end(mut self, out: &mut String) -> Self {
        if self.failed {
            return self;
        }
        *out = String::from_utf8_lossy(self.rest()).into_owned();
        self.pos = self.input.len();
        self
    }

    /// Match the CR LF line terminator.
    pub fn crlf(self) -> Self {
        self.literal("\r\n")
    }

    /// Succeed only at end of input.
    pub fn end(self) -> Self {
        if self.failed {
            return self;
        }
        if self.pos == self.input.len() {
            self
        } else {
            self.fail()
        }
    }
}
