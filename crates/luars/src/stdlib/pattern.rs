//! Lua pattern matching (spec.md §4.3.1) — not a regex engine. Byte-
//! oriented throughout (unlike the teacher's `lua_pattern/matcher.rs`,
//! which works over `Vec<char>` and therefore cannot express `%b()`/
//! frontier patterns against non-UTF8 byte strings correctly — see
//! DESIGN.md). This is a direct, recursive-backtracking port of the
//! algorithm Lua's own `lstrlib.c` uses: classes, anchors, the four
//! quantifiers, captures (including position captures), `%bxy`, `%f[set]`,
//! bounded to `MAX_CAPTURES` open captures.

pub const MAX_CAPTURES: usize = 32;
const CAP_POSITION: isize = -2;
const CAP_UNFINISHED: isize = -1;

#[derive(Clone, Copy)]
struct CaptureSlot {
    start: usize,
    len: isize,
}

pub struct MatchState<'a> {
    src: &'a [u8],
    pat: &'a [u8],
    captures: Vec<CaptureSlot>,
    depth: u32,
}

#[derive(Debug)]
pub struct PatternError(pub String);

impl From<PatternError> for String {
    fn from(e: PatternError) -> Self {
        e.0
    }
}

const MAX_DEPTH: u32 = 200;

impl<'a> MatchState<'a> {
    fn new(src: &'a [u8], pat: &'a [u8]) -> Self {
        MatchState { src, pat, captures: Vec::new(), depth: 0 }
    }

    fn err<T>(&self, msg: &str) -> Result<T, PatternError> {
        Err(PatternError(msg.to_string()))
    }

    /// Attempts a match of `pat[pp..]` against `src[sp..]`, returning the
    /// end position in `src` on success. Mirrors `lstrlib.c`'s `match`.
    fn do_match(&mut self, sp: usize, pp: usize) -> Result<Option<usize>, PatternError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            self.depth -= 1;
            return self.err("pattern too complex");
        }
        let r = self.do_match_inner(sp, pp);
        self.depth -= 1;
        r
    }

    fn do_match_inner(&mut self, sp: usize, pp: usize) -> Result<Option<usize>, PatternError> {
        if pp >= self.pat.len() {
            return Ok(Some(sp));
        }
        match self.pat[pp] {
            b'(' => {
                if self.pat.get(pp + 1) == Some(&b')') {
                    self.start_capture(sp, pp + 2, CAP_POSITION)
                } else {
                    self.start_capture(sp, pp + 1, CAP_UNFINISHED)
                }
            }
            b')' => self.end_capture(sp, pp + 1),
            b'$' if pp + 1 == self.pat.len() => Ok(if sp == self.src.len() { Some(sp) } else { None }),
            b'%' if matches!(self.pat.get(pp + 1), Some(b'b')) => self.match_balance(sp, pp + 2),
            b'%' if matches!(self.pat.get(pp + 1), Some(b'f')) => self.match_frontier(sp, pp + 2),
            b'%' if self.pat.get(pp + 1).is_some_and(|c| c.is_ascii_digit()) => self.match_capture_backref(sp, pp),
            _ => self.match_default(sp, pp),
        }
    }

    fn match_default(&mut self, sp: usize, pp: usize) -> Result<Option<usize>, PatternError> {
        let ep = self.class_end(pp)?;
        let matches_here = sp < self.src.len() && single_match(self.src[sp], self.pat, pp, ep);
        match self.pat.get(ep) {
            Some(b'?') => {
                if matches_here {
                    if let Some(r) = self.do_match(sp + 1, ep + 1)? {
                        return Ok(Some(r));
                    }
                }
                self.do_match(sp, ep + 1)
            }
            Some(b'*') => self.max_expand(sp, pp, ep),
            Some(b'+') => {
                if matches_here {
                    self.max_expand(sp + 1, pp, ep)
                } else {
                    Ok(None)
                }
            }
            Some(b'-') => self.min_expand(sp, pp, ep),
            _ => {
                if matches_here {
                    self.do_match(sp + 1, ep)
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// `*`/`+`: greedy — consume as many as possible, then backtrack.
    fn max_expand(&mut self, sp: usize, pp: usize, ep: usize) -> Result<Option<usize>, PatternError> {
        let mut count = 0usize;
        while sp + count < self.src.len() && single_match(self.src[sp + count], self.pat, pp, ep) {
            count += 1;
        }
        loop {
            if let Some(r) = self.do_match(sp + count, ep + 1)? {
                return Ok(Some(r));
            }
            if count == 0 {
                return Ok(None);
            }
            count -= 1;
        }
    }

    /// `-`: lazy — try zero first, expand on failure.
    fn min_expand(&mut self, mut sp: usize, pp: usize, ep: usize) -> Result<Option<usize>, PatternError> {
        loop {
            if let Some(r) = self.do_match(sp, ep + 1)? {
                return Ok(Some(r));
            }
            if sp < self.src.len() && single_match(self.src[sp], self.pat, pp, ep) {
                sp += 1;
            } else {
                return Ok(None);
            }
        }
    }

    fn start_capture(&mut self, sp: usize, pp: usize, what: isize) -> Result<Option<usize>, PatternError> {
        if self.captures.len() >= MAX_CAPTURES {
            return self.err("too many captures");
        }
        self.captures.push(CaptureSlot { start: sp, len: what });
        let r = self.do_match(sp, pp)?;
        if r.is_none() {
            self.captures.pop();
        }
        Ok(r)
    }

    fn end_capture(&mut self, sp: usize, pp: usize) -> Result<Option<usize>, PatternError> {
        let idx = self
            .captures
            .iter()
            .rposition(|c| c.len == CAP_UNFINISHED)
            .ok_or_else(|| PatternError("invalid pattern capture".to_string()))?;
        self.captures[idx].len = (sp - self.captures[idx].start) as isize;
        let r = self.do_match(sp, pp)?;
        if r.is_none() {
            self.captures[idx].len = CAP_UNFINISHED;
        }
        Ok(r)
    }

    fn match_capture_backref(&mut self, sp: usize, pp: usize) -> Result<Option<usize>, PatternError> {
        let digit = self.pat[pp + 1];
        if digit == b'0' {
            return self.err("invalid capture index");
        }
        let n = (digit - b'1') as usize;
        let cap = self.captures.get(n).ok_or_else(|| PatternError("invalid capture index".to_string()))?;
        if cap.len < 0 {
            return self.err("invalid capture index");
        }
        let clen = cap.len as usize;
        let cstart = cap.start;
        if self.src.len() - sp >= clen && self.src[cstart..cstart + clen] == self.src[sp..sp + clen] {
            self.do_match(sp + clen, pp + 2)
        } else {
            Ok(None)
        }
    }

    fn match_balance(&mut self, sp: usize, pp: usize) -> Result<Option<usize>, PatternError> {
        if pp + 1 >= self.pat.len() {
            return self.err("missing arguments to '%b'");
        }
        let (b, e) = (self.pat[pp], self.pat[pp + 1]);
        if sp >= self.src.len() || self.src[sp] != b {
            return Ok(None);
        }
        let mut cont = 1i32;
        let mut i = sp + 1;
        while i < self.src.len() {
            if self.src[i] == e {
                cont -= 1;
                if cont == 0 {
                    return self.do_match(i + 1, pp + 2);
                }
            } else if self.src[i] == b {
                cont += 1;
            }
            i += 1;
        }
        Ok(None)
    }

    fn match_frontier(&mut self, sp: usize, pp: usize) -> Result<Option<usize>, PatternError> {
        if self.pat.get(pp) != Some(&b'[') {
            return self.err("missing '[' after '%f' in pattern");
        }
        let ep = self.class_end(pp)?;
        let prev = if sp == 0 { 0u8 } else { self.src[sp - 1] };
        let cur = if sp < self.src.len() { self.src[sp] } else { 0u8 };
        if !match_class_set(prev, self.pat, pp, ep) && match_class_set(cur, self.pat, pp, ep) {
            self.do_match(sp, ep)
        } else {
            Ok(None)
        }
    }

    /// Returns the index just past the single pattern item (class,
    /// escape, or `[...]` set) starting at `pp`.
    fn class_end(&self, pp: usize) -> Result<usize, PatternError> {
        let mut pp = pp;
        let Some(&c) = self.pat.get(pp) else {
            return self.err("malformed pattern (ends with '%')");
        };
        pp += 1;
        if c == b'%' {
            if pp >= self.pat.len() {
                return self.err("malformed pattern (ends with '%')");
            }
            return Ok(pp + 1);
        }
        if c == b'[' {
            if self.pat.get(pp) == Some(&b'^') {
                pp += 1;
            }
            // Mirrors lstrlib.c's do-while: the first body character is
            // always consumed before the ']'-terminator check runs, so a
            // ']' as the very first set member (`[]abc]`, `[^]abc]`) is a
            // literal rather than the closing bracket.
            loop {
                if pp >= self.pat.len() {
                    return self.err("malformed pattern (missing ']')");
                }
                let cc = self.pat[pp];
                pp += 1;
                if cc == b'%' {
                    if pp >= self.pat.len() {
                        return self.err("malformed pattern (ends with '%')");
                    }
                    pp += 1;
                }
                if pp >= self.pat.len() {
                    return self.err("malformed pattern (missing ']')");
                }
                if self.pat[pp] == b']' {
                    return Ok(pp + 1);
                }
            }
        }
        Ok(pp)
    }
}

fn single_match(c: u8, pat: &[u8], pp: usize, ep: usize) -> bool {
    match pat[pp] {
        b'.' => true,
        b'%' => match_class(c, pat[pp + 1]),
        b'[' => match_class_set(c, pat, pp, ep),
        pc => pc == c,
    }
}

fn match_class(c: u8, class: u8) -> bool {
    let res = match class.to_ascii_lowercase() {
        b'a' => c.is_ascii_alphabetic(),
        b'd' => c.is_ascii_digit(),
        b'l' => c.is_ascii_lowercase(),
        b'u' => c.is_ascii_uppercase(),
        b's' => c.is_ascii_whitespace(),
        b'w' => c.is_ascii_alphanumeric(),
        b'c' => c.is_ascii_control(),
        b'p' => c.is_ascii_punctuation(),
        b'x' => c.is_ascii_hexdigit(),
        b'g' => c.is_ascii_graphic(),
        _ => return c == class,
    };
    if class.is_ascii_uppercase() { !res } else { res }
}

/// Matches `c` against the bracketed set `pat[pp..ep)` (`pp` points at
/// `[`, `ep` just past the closing `]`).
fn match_class_set(c: u8, pat: &[u8], pp: usize, ep: usize) -> bool {
    let mut i = pp + 1;
    let negate = pat.get(i) == Some(&b'^');
    if negate {
        i += 1;
    }
    let mut found = false;
    let end = ep - 1; // exclude closing ']'
    while i < end {
        if pat[i] == b'%' && i + 1 < end {
            if match_class(c, pat[i + 1]) {
                found = true;
            }
            i += 2;
        } else if i + 2 < end && pat[i + 1] == b'-' {
            if pat[i] <= c && c <= pat[i + 2] {
                found = true;
            }
            i += 3;
        } else {
            if pat[i] == c {
                found = true;
            }
            i += 1;
        }
    }
    found != negate
}

/// A completed match: overall span plus each capture's span (or, for a
/// position capture, `None` and a 1-based position stashed in `start`).
pub struct Captures {
    pub whole: (usize, usize),
    pub groups: Vec<CaptureValue>,
}

pub enum CaptureValue {
    Span(usize, usize),
    Position(usize),
}

/// Finds the first match of `pat` in `src` at or after byte offset
/// `init`, honoring a leading `^` anchor. Returns `None` on no match.
pub fn find(src: &[u8], pat: &[u8], init: usize) -> Result<Option<Captures>, PatternError> {
    let (anchored, pat) = if pat.first() == Some(&b'^') { (true, &pat[1..]) } else { (false, pat) };
    let mut sp = init.min(src.len());
    loop {
        let mut ms = MatchState::new(src, pat);
        if let Some(end) = ms.do_match(sp, 0)? {
            let groups = ms
                .captures
                .iter()
                .map(|c| if c.len == CAP_POSITION { CaptureValue::Position(c.start + 1) } else { CaptureValue::Span(c.start, c.start + c.len.max(0) as usize) })
                .collect();
            return Ok(Some(Captures { whole: (sp, end), groups }));
        }
        if anchored || sp >= src.len() {
            return Ok(None);
        }
        sp += 1;
    }
}
