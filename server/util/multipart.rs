/// One uploaded file from a multipart/form-data body.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub field: Option<String>,
    pub filename: String,
    /// `Content-Type` of the part itself; empty when the client sent none.
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Returns the index of the first occurrence of `needle` in `haystack`.
pub fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Splits `haystack` on every occurrence of `needle`, returning the pieces
/// between occurrences (excluding the needle itself).
pub fn split_on<'a>(haystack: &'a [u8], needle: &[u8]) -> Vec<&'a [u8]> {
    let mut result = Vec::new();
    let mut start = 0;
    while start <= haystack.len() {
        if let Some(pos) = find_subsequence(&haystack[start..], needle) {
            result.push(&haystack[start..start + pos]);
            start += pos + needle.len();
        } else {
            result.push(&haystack[start..]);
            break;
        }
    }
    result
}

/// Extracts the boundary token from a Content-Type header value like
/// `multipart/form-data; boundary=----WebKitFormBoundaryXXX`.
pub fn extract_boundary(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .map(|s| s.trim())
        .find(|s| s.starts_with("boundary="))
        .map(|s| s["boundary=".len()..].trim_matches('"').to_owned())
        .filter(|b| !b.is_empty())
}

/// The first part that carries a `filename`, with its name, filename and
/// content type.
pub fn first_file(body: &[u8], boundary: &str) -> Option<FilePart> {
    let delimiter = format!("--{}", boundary);
    let sep = b"\r\n\r\n";

    for part in split_on(body, delimiter.as_bytes()) {
        let sep_pos = match find_subsequence(part, sep) {
            Some(pos) => pos,
            None => continue,
        };
        let headers = String::from_utf8_lossy(&part[..sep_pos]);
        let filename = match quoted_param(&headers, "filename") {
            Some(name) => name,
            None => continue,
        };
        let raw = &part[sep_pos + sep.len()..];
        let data = raw.strip_suffix(b"\r\n").unwrap_or(raw).to_vec();
        return Some(FilePart {
            field: quoted_param(&headers, "name"),
            filename,
            content_type: part_content_type(&headers),
            data,
        });
    }
    None
}

/// Value of `key="..."` in a Content-Disposition line. `name` does not match
/// inside `filename`.
fn quoted_param(headers: &str, key: &str) -> Option<String> {
    let pattern = format!("{}=\"", key);
    let mut search = 0;
    while let Some(found) = headers[search..].find(&pattern) {
        let pos = search + found;
        let preceded_ok = pos == 0
            || matches!(headers.as_bytes()[pos - 1], b' ' | b';' | b'\t');
        let rest = &headers[pos + pattern.len()..];
        if preceded_ok {
            let end = rest.find('"')?;
            return Some(rest[..end].to_owned());
        }
        search = pos + pattern.len();
    }
    None
}

fn part_content_type(headers: &str) -> String {
    headers
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.trim()
                .eq_ignore_ascii_case("content-type")
                .then(|| value.trim().to_owned())
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(boundary: &str) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        b.extend_from_slice(b"Content-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n");
        b.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        b.extend_from_slice(b"Content-Disposition: form-data; name=\"file\"; filename=\"scan.png\"\r\n");
        b.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
        b.extend_from_slice(&[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x00]);
        b.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        b
    }

    #[test]
    fn finds_the_file_part_and_its_metadata() {
        let part = first_file(&body("XyZ"), "XyZ").unwrap();
        assert_eq!(part.field.as_deref(), Some("file"));
        assert_eq!(part.filename, "scan.png");
        assert_eq!(part.content_type, "image/png");
        assert_eq!(part.data, vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x00]);
    }

    #[test]
    fn boundary_is_read_from_the_header() {
        assert_eq!(
            extract_boundary("multipart/form-data; boundary=\"abc123\"").as_deref(),
            Some("abc123")
        );
        assert_eq!(extract_boundary("multipart/form-data"), None);
    }

    #[test]
    fn bodies_without_files_yield_nothing() {
        let b = b"--B\r\nContent-Disposition: form-data; name=\"x\"\r\n\r\n1\r\n--B--\r\n";
        assert_eq!(first_file(b, "B"), None);
    }
}
