use std::fmt::Display;

use metrics::counter;

use crate::error::Error;

/// True iff every character is an ASCII letter or an underscore.
pub fn is_safe_identifier(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_alphabetic() || c == '_')
}

/// A column name that passed the field guard.
///
/// This is the only type the SQL renderer accepts in identifier position, so
/// nothing derived from caller input reaches SQL text without going through
/// [`Ident::new`] first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident(String);

impl Ident {
    pub fn new(name: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidArgument("empty identifier".to_string()));
        }
        if !is_safe_identifier(&name) {
            counter!("krino.guard.rejected").increment(1);
            tracing::warn!(identifier = %name, "identifier rejected by field guard");
            return Err(Error::InjectionRejected(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Ident {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_safe_identifier() {
        assert!(is_safe_identifier("age"));
        assert!(is_safe_identifier("created_at"));
        assert!(is_safe_identifier("_Mixed_Case_"));

        assert!(!is_safe_identifier("age1"));
        assert!(!is_safe_identifier("first name"));
        assert!(!is_safe_identifier("name'"));
        assert!(!is_safe_identifier("name\""));
        assert!(!is_safe_identifier("a;b"));
        assert!(!is_safe_identifier("age; DROP TABLE x"));
        assert!(!is_safe_identifier("`age`"));
    }

    #[test]
    fn test_ident_new() {
        assert_eq!(Ident::new("created_at").unwrap().as_str(), "created_at");
        assert!(matches!(
            Ident::new("age; DROP TABLE x"),
            Err(Error::InjectionRejected(name)) if name == "age; DROP TABLE x"
        ));
        assert!(matches!(Ident::new(""), Err(Error::InvalidArgument(_))));
    }
}
