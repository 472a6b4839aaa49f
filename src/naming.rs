//! Case conversion between lower camel case field names and snake_case columns.

/// `userName` -> `user_name`, `UserID` -> `user_i_d`.
///
/// Every uppercase character after the first one starts a new segment, so
/// acronyms are split letter by letter. The empty string converts to itself.
pub fn to_snake(s: &str) -> String {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    let mut out = String::with_capacity(s.len() + 4);
    out.extend(first.to_lowercase());
    for c in chars {
        if c.is_uppercase() {
            out.push('_');
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// `user_name` -> `userName`, `_x` -> `X`.
///
/// Only a character that follows an underscore is upper-cased; everything else
/// passes through untouched. Underscores themselves never survive, and one with
/// nothing after it contributes nothing.
pub fn to_upper_camel(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper_next = false;
    for c in s.chars() {
        if c == '_' {
            upper_next = true;
            continue;
        }
        if upper_next {
            upper_next = false;
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}
