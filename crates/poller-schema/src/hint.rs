//! RFC 2579 DISPLAY-HINT rendering for octet strings.

/// One octet-format part of a hint.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Part {
    repeat: bool,
    len: usize,
    format: char,
    separator: Option<char>,
    terminator: Option<char>,
}

fn parse(hint: &str) -> Option<Vec<Part>> {
    let mut parts = Vec::new();
    let mut chars = hint.chars().peekable();

    while chars.peek().is_some() {
        let repeat = chars.next_if_eq(&'*').is_some();

        let mut len = 0usize;
        let mut digits = 0;
        while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
            len = len.checked_mul(10)?.checked_add(d as usize)?;
            digits += 1;
            chars.next();
        }
        if digits == 0 || len == 0 {
            return None;
        }

        let format = chars.next().filter(|c| matches!(c, 'd' | 'x' | 'o' | 'a' | 't'))?;
        let separator = chars.next_if(|c| !c.is_ascii_digit() && *c != '*');
        let terminator = if repeat {
            chars.next_if(|c| !c.is_ascii_digit() && *c != '*')
        } else {
            None
        };

        parts.push(Part {
            repeat,
            len,
            format,
            separator,
            terminator,
        });
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts)
    }
}

fn render_chunk(out: &mut String, format: char, chunk: &[u8]) {
    match format {
        'd' => {
            let value = chunk
                .iter()
                .fold(0u128, |acc, b| acc.wrapping_mul(256) | u128::from(*b));
            out.push_str(&value.to_string());
        }
        'o' => {
            let value = chunk
                .iter()
                .fold(0u128, |acc, b| acc.wrapping_mul(256) | u128::from(*b));
            out.push_str(&format!("{:o}", value));
        }
        'x' => {
            for b in chunk {
                out.push_str(&format!("{:02x}", b));
            }
        }
        _ => out.push_str(&String::from_utf8_lossy(chunk)),
    }
}

/// Renders `data` according to an octet-format display hint.
///
/// Returns `None` when the hint is not a valid octet format (for example an
/// integer hint such as `d-2`), leaving the caller to fall back to plain
/// text. The last part is reused until the data is exhausted.
///
/// ```
/// use poller_schema::render_octets;
///
/// let mac = [0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e];
/// assert_eq!(render_octets("1x:", &mac).as_deref(), Some("00:1a:2b:3c:4d:5e"));
/// ```
pub fn render_octets(hint: &str, data: &[u8]) -> Option<String> {
    let parts = parse(hint)?;
    let mut out = String::with_capacity(data.len() * 2);
    let mut pos = 0;
    let mut part_idx = 0;

    while pos < data.len() {
        let part = &parts[part_idx.min(parts.len() - 1)];
        part_idx += 1;

        let count = if part.repeat {
            let count = usize::from(data[pos]);
            pos += 1;
            count
        } else {
            1
        };

        for i in 0..count {
            if pos >= data.len() {
                break;
            }
            let end = pos.saturating_add(part.len).min(data.len());
            render_chunk(&mut out, part.format, &data[pos..end]);
            pos = end;

            if pos >= data.len() {
                break;
            }
            let last_in_group = i + 1 == count;
            let delimiter = if last_in_group {
                part.terminator.or(part.separator)
            } else {
                part.separator
            };
            if let Some(c) = delimiter {
                out.push(c);
            }
        }
    }

    Some(out)
}
