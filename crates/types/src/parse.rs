//! Textual SQL type descriptors to [`TypeDescriptor`] trees.
//!
//! Grammar: case-insensitive primitive keywords, `DECIMAL(p, s)`,
//! `ARRAY(T)`, `MAP(K, V)`, `TUPLE(T1, ..., Tn)` compound forms, and
//! nullability via trailing `NOT NULL` / `NULL` or a `NULLABLE(...)`
//! wrapper. Top-level types default to nullable, nested element types
//! default to non-nullable.

use udflare_common::{Result, UdflareError};

use crate::descriptor::{TypeDescriptor, TypeKind, MAX_DECIMAL256_PRECISION};

/// Parse a type descriptor string as received from the catalog.
pub fn parse(input: &str) -> Result<TypeDescriptor> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UdflareError::InvalidTypeSyntax(
            "empty type string".to_string(),
        ));
    }
    let upper = trimmed.to_ascii_uppercase();
    let (body, marker) = split_null_suffix(&upper);
    let body = body.trim();
    if body.is_empty() {
        return Err(UdflareError::InvalidTypeSyntax(format!(
            "missing type before nullability modifier: `{trimmed}`"
        )));
    }
    // The top-level modifier (or the nullable default) wins over any
    // nullability the body itself carries.
    Ok(parse_body(body)?.with_nullable(marker.unwrap_or(true)))
}

/// Nested-position entry point: no modifier means non-nullable.
fn parse_nested(input: &str) -> Result<TypeDescriptor> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UdflareError::InvalidTypeSyntax(
            "empty type argument".to_string(),
        ));
    }
    let (body, marker) = split_null_suffix(trimmed);
    let body = body.trim();
    if body.is_empty() {
        return Err(UdflareError::InvalidTypeSyntax(format!(
            "missing type before nullability modifier: `{trimmed}`"
        )));
    }
    let descriptor = parse_body(body)?;
    Ok(match marker {
        Some(nullable) => descriptor.with_nullable(nullable),
        None => descriptor,
    })
}

fn parse_body(body: &str) -> Result<TypeDescriptor> {
    if let Some((head, args)) = split_compound(body)? {
        return match head {
            "NULLABLE" => {
                let inner = single_arg("NULLABLE", &args)?;
                Ok(parse_nested(inner)?.with_nullable(true))
            }
            "DECIMAL" => parse_decimal(&args),
            "ARRAY" => {
                let elem = single_arg("ARRAY", &args)?;
                Ok(TypeDescriptor::required(TypeKind::List(Box::new(
                    parse_nested(elem)?,
                ))))
            }
            "MAP" => {
                if args.len() != 2 {
                    return Err(UdflareError::InvalidTypeSyntax(format!(
                        "MAP takes exactly two type arguments, got {}",
                        args.len()
                    )));
                }
                Ok(TypeDescriptor::required(TypeKind::Map(
                    Box::new(parse_nested(args[0])?),
                    Box::new(parse_nested(args[1])?),
                )))
            }
            "TUPLE" => {
                let fields = args
                    .iter()
                    .map(|arg| parse_nested(arg))
                    .collect::<Result<Vec<_>>>()?;
                Ok(TypeDescriptor::required(TypeKind::Tuple(fields)))
            }
            other => Err(UdflareError::UnsupportedType(other.to_string())),
        };
    }

    let normalized = body.split_whitespace().collect::<Vec<_>>().join(" ");
    let kind = match normalized.as_str() {
        "BOOLEAN" | "BOOL" => TypeKind::Boolean,
        "TINYINT" | "INT8" => TypeKind::Int8,
        "SMALLINT" | "INT16" => TypeKind::Int16,
        "INT" | "INTEGER" | "INT32" => TypeKind::Int32,
        "BIGINT" | "INT64" => TypeKind::Int64,
        "TINYINT UNSIGNED" | "UINT8" => TypeKind::UInt8,
        "SMALLINT UNSIGNED" | "UINT16" => TypeKind::UInt16,
        "INT UNSIGNED" | "INTEGER UNSIGNED" | "UINT32" => TypeKind::UInt32,
        "BIGINT UNSIGNED" | "UINT64" => TypeKind::UInt64,
        "FLOAT" | "FLOAT32" => TypeKind::Float32,
        "DOUBLE" | "FLOAT64" => TypeKind::Float64,
        "DATE" => TypeKind::Date,
        "DATETIME" | "TIMESTAMP" => TypeKind::Timestamp,
        "STRING" | "VARCHAR" | "CHAR" | "CHARACTER" | "TEXT" => TypeKind::Text,
        "BINARY" => TypeKind::Binary,
        "VARIANT" | "JSON" => TypeKind::Variant,
        _ => return Err(UdflareError::UnsupportedType(normalized)),
    };
    Ok(TypeDescriptor::required(kind))
}

fn parse_decimal(args: &[&str]) -> Result<TypeDescriptor> {
    if args.len() != 2 {
        return Err(UdflareError::InvalidTypeSyntax(format!(
            "DECIMAL takes exactly (precision, scale), got {} arguments",
            args.len()
        )));
    }
    let precision = parse_decimal_bound(args[0], "precision")?;
    let scale = parse_decimal_bound(args[1], "scale")?;
    if precision < 1 || precision > MAX_DECIMAL256_PRECISION {
        return Err(UdflareError::InvalidDecimalSpec(format!(
            "precision must be between 1 and {MAX_DECIMAL256_PRECISION}, got {precision}"
        )));
    }
    if scale > precision {
        return Err(UdflareError::InvalidDecimalSpec(format!(
            "scale must be between 0 and precision {precision}, got {scale}"
        )));
    }
    Ok(TypeDescriptor::required(TypeKind::Decimal {
        precision,
        scale,
    }))
}

fn single_arg<'a>(head: &str, args: &[&'a str]) -> Result<&'a str> {
    if args.len() != 1 {
        return Err(UdflareError::InvalidTypeSyntax(format!(
            "{head} takes exactly one type argument, got {}",
            args.len()
        )));
    }
    Ok(args[0])
}

fn parse_decimal_bound(arg: &str, what: &str) -> Result<u8> {
    arg.trim().parse::<u8>().map_err(|_| {
        UdflareError::InvalidDecimalSpec(format!(
            "{what} must be a non-negative integer no larger than {MAX_DECIMAL256_PRECISION}, got `{}`",
            arg.trim()
        ))
    })
}

/// Split `HEAD(args...)` into the head keyword and its top-level comma
/// separated arguments, respecting nested parentheses. Returns `None`
/// when `body` carries no parentheses at all.
fn split_compound(body: &str) -> Result<Option<(&str, Vec<&str>)>> {
    let Some(open) = body.find('(') else {
        if body.contains(')') {
            return Err(UdflareError::InvalidTypeSyntax(format!(
                "unbalanced parentheses: `{body}`"
            )));
        }
        return Ok(None);
    };
    if !body.ends_with(')') {
        return Err(UdflareError::InvalidTypeSyntax(format!(
            "expected closing parenthesis: `{body}`"
        )));
    }
    let head = body[..open].trim();
    if head.is_empty() {
        return Err(UdflareError::InvalidTypeSyntax(format!(
            "missing type keyword before `(`: `{body}`"
        )));
    }

    let inner = &body[open + 1..body.len() - 1];
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in inner.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    UdflareError::InvalidTypeSyntax(format!("unbalanced parentheses: `{body}`"))
                })?;
            }
            ',' if depth == 0 => {
                args.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(UdflareError::InvalidTypeSyntax(format!(
            "unbalanced parentheses: `{body}`"
        )));
    }
    args.push(&inner[start..]);
    Ok(Some((head, args)))
}

/// Strip one trailing `NOT NULL` / `NULL` modifier, word-boundary aware.
fn split_null_suffix(s: &str) -> (&str, Option<bool>) {
    let t = s.trim_end();
    if ends_with_word(t, "NULL") {
        let head = t[..t.len() - 4].trim_end();
        if ends_with_word(head, "NOT") {
            return (head[..head.len() - 3].trim_end(), Some(false));
        }
        return (head, Some(true));
    }
    (t, None)
}

fn ends_with_word(s: &str, word: &str) -> bool {
    if !s.ends_with(word) {
        return false;
    }
    match s.len().checked_sub(word.len() + 1) {
        // a bare modifier is not a type
        None => false,
        Some(i) => {
            let b = s.as_bytes()[i];
            b.is_ascii_whitespace() || b == b')'
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(input: &str) -> TypeKind {
        parse(input).expect(input).kind
    }

    #[test]
    fn parses_primitive_keywords_case_insensitively() {
        assert_eq!(kind("boolean"), TypeKind::Boolean);
        assert_eq!(kind("Bool"), TypeKind::Boolean);
        assert_eq!(kind("TINYINT"), TypeKind::Int8);
        assert_eq!(kind("int8"), TypeKind::Int8);
        assert_eq!(kind("SMALLINT"), TypeKind::Int16);
        assert_eq!(kind("integer"), TypeKind::Int32);
        assert_eq!(kind("BIGINT"), TypeKind::Int64);
        assert_eq!(kind("tinyint unsigned"), TypeKind::UInt8);
        assert_eq!(kind("SMALLINT UNSIGNED"), TypeKind::UInt16);
        assert_eq!(kind("INTEGER UNSIGNED"), TypeKind::UInt32);
        assert_eq!(kind("uint64"), TypeKind::UInt64);
        assert_eq!(kind("float"), TypeKind::Float32);
        assert_eq!(kind("DOUBLE"), TypeKind::Float64);
        assert_eq!(kind("date"), TypeKind::Date);
        assert_eq!(kind("DateTime"), TypeKind::Timestamp);
        assert_eq!(kind("timestamp"), TypeKind::Timestamp);
        assert_eq!(kind("varchar"), TypeKind::Text);
        assert_eq!(kind("CHARACTER"), TypeKind::Text);
        assert_eq!(kind("binary"), TypeKind::Binary);
        assert_eq!(kind("JSON"), TypeKind::Variant);
        assert_eq!(kind("Variant"), TypeKind::Variant);
    }

    #[test]
    fn top_level_defaults_to_nullable() {
        assert!(parse("INT").expect("int").nullable);
        assert!(!parse("INT NOT NULL").expect("not null").nullable);
        assert!(parse("INT NULL").expect("null").nullable);
        assert!(parse("NULLABLE(INT)").expect("wrapper").nullable);
    }

    #[test]
    fn nested_defaults_to_non_nullable() {
        let TypeKind::List(elem) = kind("ARRAY(INT)") else {
            panic!("expected list");
        };
        assert!(!elem.nullable);

        let TypeKind::List(elem) = kind("ARRAY(INT NULL)") else {
            panic!("expected list");
        };
        assert!(elem.nullable);

        let TypeKind::List(elem) = kind("ARRAY(NULLABLE(INT))") else {
            panic!("expected list");
        };
        assert!(elem.nullable);
    }

    #[test]
    fn parses_nested_compounds_with_inner_commas() {
        let TypeKind::Map(key, value) = kind("MAP(STRING, ARRAY(INT))") else {
            panic!("expected map");
        };
        assert_eq!(key.kind, TypeKind::Text);
        assert_eq!(value.kind, TypeKind::List(Box::new(TypeDescriptor::required(TypeKind::Int32))));

        let TypeKind::Tuple(fields) =
            kind("TUPLE(INT, MAP(STRING, INT NULL), ARRAY(TUPLE(INT, INT)))")
        else {
            panic!("expected tuple");
        };
        assert_eq!(fields.len(), 3);
        let TypeKind::Map(_, map_value) = &fields[1].kind else {
            panic!("expected map field");
        };
        assert!(map_value.nullable);
    }

    #[test]
    fn decimal_bounds_are_enforced() {
        assert!(matches!(
            parse("DECIMAL(0, 0)"),
            Err(UdflareError::InvalidDecimalSpec(_))
        ));
        assert!(matches!(
            parse("DECIMAL(77, 0)"),
            Err(UdflareError::InvalidDecimalSpec(_))
        ));
        assert!(matches!(
            parse("DECIMAL(10, 11)"),
            Err(UdflareError::InvalidDecimalSpec(_))
        ));
        assert!(matches!(
            parse("DECIMAL(10, -1)"),
            Err(UdflareError::InvalidDecimalSpec(_))
        ));
        assert_eq!(
            kind("DECIMAL(10, 5)"),
            TypeKind::Decimal {
                precision: 10,
                scale: 5
            }
        );
        assert_eq!(
            kind("DECIMAL( 76 , 76 )"),
            TypeKind::Decimal {
                precision: 76,
                scale: 76
            }
        );
    }

    #[test]
    fn rejects_malformed_compound_syntax() {
        assert!(matches!(
            parse("ARRAY(INT"),
            Err(UdflareError::InvalidTypeSyntax(_))
        ));
        assert!(matches!(
            parse("ARRAY INT)"),
            Err(UdflareError::InvalidTypeSyntax(_))
        ));
        assert!(matches!(
            parse("MAP(STRING)"),
            Err(UdflareError::InvalidTypeSyntax(_))
        ));
        assert!(matches!(
            parse("TUPLE(INT,)"),
            Err(UdflareError::InvalidTypeSyntax(_))
        ));
        assert!(matches!(
            parse("ARRAY()"),
            Err(UdflareError::InvalidTypeSyntax(_))
        ));
        assert!(matches!(parse(""), Err(UdflareError::InvalidTypeSyntax(_))));
        assert!(matches!(
            parse("NOT NULL"),
            Err(UdflareError::InvalidTypeSyntax(_)) | Err(UdflareError::UnsupportedType(_))
        ));
    }

    #[test]
    fn rejects_unknown_keywords() {
        assert!(matches!(
            parse("GEOMETRY"),
            Err(UdflareError::UnsupportedType(_))
        ));
        assert!(matches!(
            parse("FROB(INT)"),
            Err(UdflareError::UnsupportedType(_))
        ));
    }
}
