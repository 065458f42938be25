use std::collections::HashMap;
use std::fmt::{Display, Formatter};

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MappingError(String);

impl Display for MappingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::error::Error for MappingError {}

/// The header row of a row-oriented sheet, with a case-insensitive lookup from header text to
/// column index. Blank header cells (unnamed columns) are kept in `headers` so that the original
/// row can be written back, but they cannot be looked up.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct Mapping {
    headers: Vec<Header>,
    index: HashMap<String, usize>,
}

impl Mapping {
    pub fn new<S, I>(headers: I) -> Result<Self, MappingError>
    where
        S: Into<String>,
        I: IntoIterator<Item = S>,
    {
        let headers: Vec<Header> = headers.into_iter().map(|s| Header(s.into())).collect();
        let mut index = HashMap::new();
        for (ix, header) in headers.iter().enumerate() {
            let key = header.key();
            if key.is_empty() {
                continue;
            }
            if index.insert(key, ix).is_some() {
                return Err(MappingError(format!(
                    "Encountered a duplicate header '{}'",
                    header.as_ref().trim()
                )));
            }
        }
        Ok(Self { headers, index })
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn index_of(&self, header: &str) -> Option<usize> {
        self.index.get(&Header::normalize(header)).copied()
    }
}

/// A header cell of the sheet, for example `Importo`.
#[derive(Default, Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Header(String);

impl Header {
    fn normalize(s: &str) -> String {
        s.trim().to_lowercase()
    }

    fn key(&self) -> String {
        Self::normalize(&self.0)
    }
}

impl AsRef<str> for Header {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for Header {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.trim())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lookup_ignores_case_and_whitespace() {
        let mapping = Mapping::new(["Data", " Importo ", "Tag"]).unwrap();
        assert_eq!(mapping.index_of("importo"), Some(1));
        assert_eq!(mapping.index_of("TAG"), Some(2));
        assert_eq!(mapping.index_of("Description"), None);
        assert_eq!(mapping.headers().len(), 3);
    }

    #[test]
    fn test_blank_headers_are_kept_but_not_indexed() {
        let mapping = Mapping::new(["", "Amount", "  "]).unwrap();
        assert_eq!(mapping.headers().len(), 3);
        assert_eq!(mapping.index_of(""), None);
    }

    #[test]
    fn test_duplicate_header() {
        let err = Mapping::new(["Tag", "Amount", "tag"]).unwrap_err();
        assert!(err.to_string().contains("duplicate header 'tag'"));
    }
}
