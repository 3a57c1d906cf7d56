//! Turning a terminal "drop" into file paths.
//!
//! Dragging files onto a terminal window pastes their paths as one line,
//! separated by spaces. Terminals protect spaces and other special
//! characters either with quotes or with backslashes, depending on the
//! emulator, so both are understood here.
use std::path::PathBuf;

pub fn parse_drop(line: &str) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = line.trim_end_matches(['\r', '\n']).chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                in_token = true;
            }
            (None, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_token = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_token {
                    paths.push(PathBuf::from(std::mem::take(&mut current)));
                    in_token = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        paths.push(PathBuf::from(current));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", &[])]
    #[case("   \n", &[])]
    #[case("/books/Dune.epub\n", &["/books/Dune.epub"])]
    #[case("/a.epub /b.epub", &["/a.epub", "/b.epub"])]
    #[case("'/my books/War and Peace.epub' /b.epub", &["/my books/War and Peace.epub", "/b.epub"])]
    #[case(r#""/my books/Emma.epub""#, &["/my books/Emma.epub"])]
    #[case(r"/my\ books/It\'s\ Here.epub", &["/my books/It's Here.epub"])]
    fn splits_terminal_drops(#[case] line: &str, #[case] expected: &[&str]) {
        let expected: Vec<PathBuf> = expected.iter().map(PathBuf::from).collect();
        assert_eq!(parse_drop(line), expected);
    }
}
