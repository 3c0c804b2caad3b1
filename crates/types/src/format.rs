//! [`TypeDescriptor`] trees back to canonical SQL type text.
//!
//! Used to advertise registered signatures. Top-level non-nullable types
//! render a trailing `NOT NULL`; nested nullable types render a trailing
//! `NULL` (nested positions are non-nullable by default).

use crate::descriptor::{TypeDescriptor, TypeKind};

/// Render a top-level type descriptor.
pub fn format(descriptor: &TypeDescriptor) -> String {
    let body = format_kind(&descriptor.kind);
    if descriptor.nullable {
        body
    } else {
        format!("{body} NOT NULL")
    }
}

fn format_nested(descriptor: &TypeDescriptor) -> String {
    let body = format_kind(&descriptor.kind);
    if descriptor.nullable {
        format!("{body} NULL")
    } else {
        body
    }
}

fn format_kind(kind: &TypeKind) -> String {
    match kind {
        TypeKind::Boolean => "BOOLEAN".to_string(),
        TypeKind::Int8 => "TINYINT".to_string(),
        TypeKind::Int16 => "SMALLINT".to_string(),
        TypeKind::Int32 => "INT".to_string(),
        TypeKind::Int64 => "BIGINT".to_string(),
        TypeKind::UInt8 => "TINYINT UNSIGNED".to_string(),
        TypeKind::UInt16 => "SMALLINT UNSIGNED".to_string(),
        TypeKind::UInt32 => "INT UNSIGNED".to_string(),
        TypeKind::UInt64 => "BIGINT UNSIGNED".to_string(),
        TypeKind::Float32 => "FLOAT".to_string(),
        TypeKind::Float64 => "DOUBLE".to_string(),
        TypeKind::Date => "DATE".to_string(),
        TypeKind::Timestamp => "TIMESTAMP".to_string(),
        TypeKind::Text => "VARCHAR".to_string(),
        TypeKind::Binary => "BINARY".to_string(),
        TypeKind::Variant => "VARIANT".to_string(),
        TypeKind::Decimal { precision, scale } => format!("DECIMAL({precision}, {scale})"),
        TypeKind::List(elem) => format!("ARRAY({})", format_nested(elem)),
        TypeKind::Map(key, value) => {
            format!("MAP({}, {})", format_nested(key), format_nested(value))
        }
        TypeKind::Tuple(fields) => {
            let rendered = fields.iter().map(format_nested).collect::<Vec<_>>();
            format!("TUPLE({})", rendered.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    #[track_caller]
    fn roundtrip(input: &str) -> String {
        format(&parse(input).expect(input))
    }

    #[test]
    fn formats_top_level_nullability() {
        assert_eq!(roundtrip("INT"), "INT");
        assert_eq!(roundtrip("int not null"), "INT NOT NULL");
        assert_eq!(roundtrip("NULLABLE(BIGINT UNSIGNED)"), "BIGINT UNSIGNED");
    }

    #[test]
    fn formats_nested_nullability() {
        assert_eq!(roundtrip("ARRAY(INT)"), "ARRAY(INT)");
        assert_eq!(roundtrip("ARRAY(INT NULL)"), "ARRAY(INT NULL)");
        assert_eq!(
            roundtrip("map(string, array(int null)) not null"),
            "MAP(VARCHAR, ARRAY(INT NULL)) NOT NULL"
        );
        assert_eq!(
            roundtrip("TUPLE(INT, VARIANT, DECIMAL(10,5))"),
            "TUPLE(INT, VARIANT, DECIMAL(10, 5))"
        );
    }

    #[test]
    fn canonical_text_reparses_to_the_same_descriptor() {
        for input in [
            "BOOLEAN",
            "TINYINT NOT NULL",
            "SMALLINT UNSIGNED",
            "DOUBLE",
            "DATE NOT NULL",
            "TIMESTAMP",
            "VARCHAR",
            "BINARY NOT NULL",
            "VARIANT",
            "DECIMAL(38, 10)",
            "ARRAY(MAP(VARCHAR, BIGINT NULL))",
            "TUPLE(INT NULL, ARRAY(INT), MAP(VARCHAR, VARIANT NULL)) NOT NULL",
        ] {
            let parsed = parse(input).expect(input);
            let rendered = format(&parsed);
            let reparsed = parse(&rendered).expect(&rendered);
            assert_eq!(parsed, reparsed, "{input} -> {rendered}");
        }
    }
}
