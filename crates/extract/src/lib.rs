//! Marker-anchored field extraction from assistant text.
//!
//! When a sub-dialogue finishes, the model's final reply carries a
//! bracketed span introduced by a marker literal fixed by the prompt
//! contract (`用户信息：[...]`, `查询条件：[...]`, `删除条件：[...]`). This
//! module locates the span and pulls every schema field out of it with
//! labeled patterns.
//!
//! Extraction is all-or-nothing: a record is returned only when every
//! field matches. Any miss fails the whole extraction with a typed error
//! naming the first offending field.

use frontdesk_core::error::ExtractError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::LazyLock;

/// Fields confirmed by a finished registration sub-dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationFields {
    pub name: String,
    pub gender: String,
    pub age: u32,
    pub password: String,
    pub email: String,
}

/// Fields confirmed by a finished lookup sub-dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupFields {
    pub user_id: u64,
    pub password: String,
}

/// Fields confirmed by a finished deletion sub-dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionFields {
    pub user_id: u64,
    pub password: String,
    pub email: String,
}

// Marker literals delimiting the structured span. Non-greedy, so only the
// first bracketed group after the marker is considered; `.` does not cross
// newlines.
static REGISTRATION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"用户信息：\[(.*?)\]").expect("static regex"));
static LOOKUP_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"查询条件：\[(.*?)\]").expect("static regex"));
static DELETION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"删除条件：\[(.*?)\]").expect("static regex"));

// Labeled field patterns, matched inside the span. Values are single
// comma-free tokens per the documented example format
// (`姓名: 张三, 性别: 男, ...`); no normalization beyond the whitespace
// the patterns themselves skip.
static NAME: LazyLock<Regex> = LazyLock::new(|| field_pattern("姓名"));
static GENDER: LazyLock<Regex> = LazyLock::new(|| field_pattern("性别"));
static AGE: LazyLock<Regex> = LazyLock::new(|| field_pattern("年龄"));
static PASSWORD: LazyLock<Regex> = LazyLock::new(|| field_pattern("密码"));
static USER_ID: LazyLock<Regex> = LazyLock::new(|| field_pattern("用户ID"));
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"邮箱:\s*([^\s,]+@[^\s,]+\.[^\s,]+)").expect("static regex"));

fn field_pattern(label: &str) -> Regex {
    Regex::new(&format!(r"{label}:\s*([^,\s]+)")).expect("static regex")
}

/// Extract registration fields from assistant text.
pub fn registration(text: &str) -> Result<RegistrationFields, ExtractError> {
    let span = marker_span(&REGISTRATION_MARKER, text)?;
    Ok(RegistrationFields {
        name: field(&NAME, span, "name")?.to_string(),
        gender: field(&GENDER, span, "gender")?.to_string(),
        age: numeric(&AGE, span, "age")?,
        password: field(&PASSWORD, span, "password")?.to_string(),
        email: field(&EMAIL, span, "email")?.to_string(),
    })
}

/// Extract lookup fields from assistant text.
pub fn lookup(text: &str) -> Result<LookupFields, ExtractError> {
    let span = marker_span(&LOOKUP_MARKER, text)?;
    Ok(LookupFields {
        user_id: numeric(&USER_ID, span, "user_id")?,
        password: field(&PASSWORD, span, "password")?.to_string(),
    })
}

/// Extract deletion fields from assistant text.
pub fn deletion(text: &str) -> Result<DeletionFields, ExtractError> {
    let span = marker_span(&DELETION_MARKER, text)?;
    Ok(DeletionFields {
        user_id: numeric(&USER_ID, span, "user_id")?,
        password: field(&PASSWORD, span, "password")?.to_string(),
        email: field(&EMAIL, span, "email")?.to_string(),
    })
}

/// Locate the bracketed span introduced by the schema's marker.
fn marker_span<'t>(marker: &Regex, text: &'t str) -> Result<&'t str, ExtractError> {
    marker
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or(ExtractError::MarkerNotFound)
}

/// Match one labeled field inside the span.
fn field<'t>(pattern: &Regex, span: &'t str, name: &str) -> Result<&'t str, ExtractError> {
    pattern
        .captures(span)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| ExtractError::MissingField(name.into()))
}

/// Match a labeled field and parse it as an integer.
fn numeric<T: FromStr>(pattern: &Regex, span: &str, name: &str) -> Result<T, ExtractError> {
    let raw = field(pattern, span, name)?;
    raw.parse::<T>()
        .map_err(|_| ExtractError::InvalidFormat(name.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRATION_OK: &str =
        "注册成功！用户信息：[姓名: 张三, 性别: 男, 年龄: 25, 密码: pass1, 邮箱: a@b.com]";

    #[test]
    fn registration_full_record() {
        let fields = registration(REGISTRATION_OK).unwrap();
        assert_eq!(
            fields,
            RegistrationFields {
                name: "张三".into(),
                gender: "男".into(),
                age: 25,
                password: "pass1".into(),
                email: "a@b.com".into(),
            }
        );
    }

    #[test]
    fn registration_marker_missing() {
        let err = registration("注册成功！但是没有携带任何信息。").unwrap_err();
        assert_eq!(err, ExtractError::MarkerNotFound);
    }

    #[test]
    fn registration_unclosed_bracket_is_marker_not_found() {
        let err = registration("用户信息：[姓名: 张三, 性别: 男").unwrap_err();
        assert_eq!(err, ExtractError::MarkerNotFound);
    }

    #[test]
    fn registration_missing_one_field_is_total_failure() {
        // Each case drops exactly one required field; the error must name
        // that field and no partial record may leak out.
        let cases = [
            ("用户信息：[性别: 男, 年龄: 25, 密码: p, 邮箱: a@b.com]", "name"),
            ("用户信息：[姓名: 张三, 年龄: 25, 密码: p, 邮箱: a@b.com]", "gender"),
            ("用户信息：[姓名: 张三, 性别: 男, 密码: p, 邮箱: a@b.com]", "age"),
            ("用户信息：[姓名: 张三, 性别: 男, 年龄: 25, 邮箱: a@b.com]", "password"),
            ("用户信息：[姓名: 张三, 性别: 男, 年龄: 25, 密码: p]", "email"),
        ];
        for (text, field_name) in cases {
            let err = registration(text).unwrap_err();
            assert_eq!(err, ExtractError::MissingField(field_name.into()), "{text}");
        }
    }

    #[test]
    fn registration_non_numeric_age() {
        let err = registration(
            "用户信息：[姓名: 张三, 性别: 男, 年龄: 二十五, 密码: p, 邮箱: a@b.com]",
        )
        .unwrap_err();
        assert_eq!(err, ExtractError::InvalidFormat("age".into()));
    }

    #[test]
    fn registration_malformed_email_is_missing() {
        // An email without a domain dot never matches the labeled pattern.
        let err = registration(
            "用户信息：[姓名: 张三, 性别: 男, 年龄: 25, 密码: p, 邮箱: not-an-email]",
        )
        .unwrap_err();
        assert_eq!(err, ExtractError::MissingField("email".into()));
    }

    #[test]
    fn lookup_fields() {
        let fields =
            lookup("正在查询... 查询条件：[用户ID: 10001, 密码: pass1]").unwrap();
        assert_eq!(fields.user_id, 10001);
        assert_eq!(fields.password, "pass1");
    }

    #[test]
    fn lookup_non_numeric_id() {
        let err = lookup("查询条件：[用户ID: abc, 密码: pass1]").unwrap_err();
        assert_eq!(err, ExtractError::InvalidFormat("user_id".into()));
    }

    #[test]
    fn lookup_wrong_marker() {
        let err = lookup(REGISTRATION_OK).unwrap_err();
        assert_eq!(err, ExtractError::MarkerNotFound);
    }

    #[test]
    fn deletion_fields() {
        let fields = deletion(
            "将删除用户... 删除条件：[用户ID: 10001, 密码: pass1, 邮箱: a@b.com]",
        )
        .unwrap();
        assert_eq!(fields.user_id, 10001);
        assert_eq!(fields.password, "pass1");
        assert_eq!(fields.email, "a@b.com");
    }

    #[test]
    fn deletion_missing_email() {
        let err = deletion("删除条件：[用户ID: 10001, 密码: pass1]").unwrap_err();
        assert_eq!(err, ExtractError::MissingField("email".into()));
    }

    #[test]
    fn extra_whitespace_after_labels_is_tolerated() {
        let fields = registration(
            "用户信息：[姓名:  张三, 性别:男, 年龄:   25, 密码: p1, 邮箱: a@b.com]",
        )
        .unwrap();
        assert_eq!(fields.name, "张三");
        assert_eq!(fields.gender, "男");
        assert_eq!(fields.age, 25);
    }

    #[test]
    fn only_first_bracketed_span_is_used() {
        let fields = lookup(
            "查询条件：[用户ID: 42, 密码: first] 查询条件：[用户ID: 99, 密码: second]",
        )
        .unwrap();
        assert_eq!(fields.user_id, 42);
        assert_eq!(fields.password, "first");
    }
}
