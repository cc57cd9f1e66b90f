//! Parser for pacman `desc` records.
//!
//! A record is a sequence of blocks, each a `%KEY%` line followed by value
//! lines and closed by a blank line:
//!
//! ```text
//! %FILENAME%
//! vim-9.0-1-x86_64.pkg.tar.zst
//!
//! %DEPENDS%
//! ncurses
//! libiconv
//! ```

use std::collections::BTreeMap;

use crate::error::{RegistryError, Result};

/// Fields holding an ordered list of values.
pub const LIST_FIELDS: &[&str] = &[
    "ARCH",
    "CHECKDEPENDS",
    "CONFLICTS",
    "DEPENDS",
    "GROUPS",
    "LICENSE",
    "MAKEDEPENDS",
    "OPTDEPENDS",
    "PROVIDES",
    "REPLACES",
];

/// Fields holding a single integer.
pub const INTEGER_FIELDS: &[&str] = &["CSIZE", "ISIZE", "BUILDDATE"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DescValue {
    Scalar(String),
    Integer(i64),
    List(Vec<String>),
}

impl DescValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

/// One parsed package record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackageDescriptor {
    fields: BTreeMap<String, DescValue>,
}

impl PackageDescriptor {
    pub fn get(&self, key: &str) -> Option<&DescValue> {
        self.fields.get(key)
    }

    pub fn scalar(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(DescValue::as_scalar)
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(DescValue::as_integer)
    }

    pub fn list(&self, key: &str) -> Option<&[String]> {
        self.get(key).and_then(DescValue::as_list)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &DescValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// File name of the package archive (`%FILENAME%`).
    pub fn filename(&self) -> Result<&str> {
        self.scalar("FILENAME")
            .ok_or_else(|| RegistryError::MissingField("FILENAME".into()))
    }

    /// Expected SHA-256 of the package archive, lowercase hex (`%SHA256SUM%`).
    pub fn sha256sum(&self) -> Result<&str> {
        self.scalar("SHA256SUM")
            .ok_or_else(|| RegistryError::MissingField("SHA256SUM".into()))
    }

    /// Build time in seconds since the epoch (`%BUILDDATE%`).
    pub fn build_date(&self) -> Result<i64> {
        self.integer("BUILDDATE")
            .ok_or_else(|| RegistryError::MissingField("BUILDDATE".into()))
    }
}

/// Parses the text of a `desc` file.
///
/// List fields ([`LIST_FIELDS`]) keep every value line in order. Integer
/// fields ([`INTEGER_FIELDS`]) are parsed as `i64`. Any other field joins its
/// value lines with `\n`. Trailing whitespace is stripped from every line, and
/// a blank line where a key is expected ends the record.
///
/// # Errors
///
/// * [`RegistryError::MalformedKey`] if a key line is not wrapped in `%`.
/// * [`RegistryError::InvalidInteger`] if an integer field is not a number.
///
/// # Examples
///
/// ```
/// use pacmirror_registry::desc::parse_desc;
///
/// let desc = parse_desc("%OPTDEPENDS%\nfoo: bar\nbaz: qux\n\n%BUILDDATE%\n1234567\n\n").unwrap();
/// assert_eq!(desc.list("OPTDEPENDS").unwrap(), ["foo: bar", "baz: qux"]);
/// assert_eq!(desc.build_date().unwrap(), 1234567);
/// ```
pub fn parse_desc(text: &str) -> Result<PackageDescriptor> {
    let mut fields = BTreeMap::new();
    let mut lines = text.lines().map(str::trim_end).enumerate();

    while let Some((index, key_line)) = lines.next() {
        if key_line.is_empty() {
            break;
        }
        let key = parse_key(index + 1, key_line)?;

        let values: Vec<String> = lines
            .by_ref()
            .map(|(_, line)| line)
            .take_while(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        let value = if LIST_FIELDS.contains(&key) {
            DescValue::List(values)
        } else if INTEGER_FIELDS.contains(&key) {
            let joined = values.join("\n");
            let n = joined.parse::<i64>().map_err(|source| {
                RegistryError::InvalidInteger {
                    key: key.to_string(),
                    value: joined.clone(),
                    source,
                }
            })?;
            DescValue::Integer(n)
        } else {
            DescValue::Scalar(values.join("\n"))
        };

        fields.insert(key.to_string(), value);
    }

    Ok(PackageDescriptor {
        fields,
    })
}

fn parse_key(line: usize, text: &str) -> Result<&str> {
    text.strip_prefix('%')
        .and_then(|rest| rest.strip_suffix('%'))
        .ok_or_else(|| {
            RegistryError::MalformedKey {
                line,
                text: text.to_string(),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIM_DESC: &str = "%FILENAME%
vim-9.0.1-1-x86_64.pkg.tar.zst

%NAME%
vim

%DESC%
Vi Improved, a highly configurable,
improved version of the vi text editor

%CSIZE%
1834567

%SHA256SUM%
0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef

%LICENSE%
custom:vim

%ARCH%
x86_64

%BUILDDATE%
1690000000

%DEPENDS%
ncurses
libiconv
libiconv

";

    #[test]
    fn test_optdepends_list() {
        let desc = parse_desc("%OPTDEPENDS%\nfoo: bar\nbaz: qux\n\n").unwrap();
        assert_eq!(
            desc.get("OPTDEPENDS"),
            Some(&DescValue::List(vec!["foo: bar".into(), "baz: qux".into()]))
        );
    }

    #[test]
    fn test_builddate_integer() {
        let desc = parse_desc("%BUILDDATE%\n1234567\n\n").unwrap();
        assert_eq!(desc.get("BUILDDATE"), Some(&DescValue::Integer(1234567)));
        assert_eq!(desc.build_date().unwrap(), 1234567);
    }

    #[test]
    fn test_full_record() {
        let desc = parse_desc(VIM_DESC).unwrap();
        assert_eq!(desc.filename().unwrap(), "vim-9.0.1-1-x86_64.pkg.tar.zst");
        assert_eq!(desc.sha256sum().unwrap().len(), 64);
        assert_eq!(desc.integer("CSIZE"), Some(1834567));
        assert_eq!(
            desc.scalar("DESC"),
            Some("Vi Improved, a highly configurable,\nimproved version of the vi text editor")
        );
        assert_eq!(
            desc.list("DEPENDS").unwrap(),
            ["ncurses", "libiconv", "libiconv"]
        );
        assert_eq!(desc.list("LICENSE").unwrap(), ["custom:vim"]);
        assert_eq!(desc.list("ARCH").unwrap(), ["x86_64"]);
    }

    #[test]
    fn test_end_of_input_without_blank_line() {
        let desc = parse_desc("%NAME%\nvim").unwrap();
        assert_eq!(desc.scalar("NAME"), Some("vim"));

        let desc = parse_desc("%NAME%").unwrap();
        assert_eq!(desc.scalar("NAME"), Some(""));
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_desc("").unwrap().is_empty());
    }

    #[test]
    fn test_blank_line_ends_record() {
        let desc = parse_desc("%NAME%\nvim\n\n\n%VERSION%\n9.0\n\n").unwrap();
        assert_eq!(desc.scalar("NAME"), Some("vim"));
        assert!(desc.get("VERSION").is_none());

        assert!(parse_desc("\n%NAME%\nvim\n").unwrap().is_empty());
    }

    #[test]
    fn test_trailing_whitespace_stripped() {
        let desc = parse_desc("%NAME%  \r\nvim \t\r\n   \r\n%VERSION%\n1\n").unwrap();
        assert_eq!(desc.scalar("NAME"), Some("vim"));
        assert_eq!(desc.scalar("VERSION"), Some("1"));
    }

    #[test]
    fn test_empty_list_block() {
        let desc = parse_desc("%DEPENDS%\n\n%NAME%\nvim\n").unwrap();
        assert_eq!(desc.list("DEPENDS"), Some(&[][..]));
        assert_eq!(desc.scalar("NAME"), Some("vim"));
    }

    #[test]
    fn test_malformed_key() {
        let err = parse_desc("%NAME%\nvim\n\nVERSION\n1.0\n").unwrap_err();
        assert!(matches!(
            err,
            RegistryError::MalformedKey { line: 4, ref text } if text == "VERSION"
        ));

        assert!(matches!(
            parse_desc("%NAME\nvim\n"),
            Err(RegistryError::MalformedKey { line: 1, .. })
        ));
    }

    #[test]
    fn test_invalid_integer() {
        let err = parse_desc("%CSIZE%\nlots\n\n").unwrap_err();
        assert!(matches!(
            err,
            RegistryError::InvalidInteger { ref key, ref value, .. }
                if key == "CSIZE" && value == "lots"
        ));

        assert!(matches!(
            parse_desc("%ISIZE%\n\n"),
            Err(RegistryError::InvalidInteger { .. })
        ));
    }

    #[test]
    fn test_missing_required_fields() {
        let desc = parse_desc("%NAME%\nvim\n").unwrap();
        assert!(matches!(
            desc.filename(),
            Err(RegistryError::MissingField(ref f)) if f == "FILENAME"
        ));
        assert!(desc.sha256sum().is_err());
        assert!(desc.build_date().is_err());
    }

    #[test]
    fn test_later_duplicate_key_wins() {
        let desc = parse_desc("%NAME%\nold\n\n%NAME%\nnew\n").unwrap();
        assert_eq!(desc.scalar("NAME"), Some("new"));
        assert_eq!(desc.len(), 1);
    }
}
