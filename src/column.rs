//! Column descriptors and declared value types

use std::fmt;
use std::str::FromStr;

use crate::error::CsvError;

/// Declared value type of a column.
///
/// Every column starts as [`ColumnType::Text`]; callers switch it after the
/// headers are known to get coerced values from the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColumnType {
    #[default]
    Text,
    Int16,
    Int32,
    Int64,
    Double,
    Single,
    Decimal,
    Boolean,
    Byte,
    Char,
    Guid,
    Binary,
    DateTime,
    DateTimeOffset,
    TimeSpan,
}

impl ColumnType {
    /// All declared types, in declaration order
    pub const ALL: [ColumnType; 15] = [
        ColumnType::Text,
        ColumnType::Int16,
        ColumnType::Int32,
        ColumnType::Int64,
        ColumnType::Double,
        ColumnType::Single,
        ColumnType::Decimal,
        ColumnType::Boolean,
        ColumnType::Byte,
        ColumnType::Char,
        ColumnType::Guid,
        ColumnType::Binary,
        ColumnType::DateTime,
        ColumnType::DateTimeOffset,
        ColumnType::TimeSpan,
    ];

    /// Lowercase name used by `Display` and `FromStr`
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Int16 => "int16",
            ColumnType::Int32 => "int32",
            ColumnType::Int64 => "int64",
            ColumnType::Double => "double",
            ColumnType::Single => "single",
            ColumnType::Decimal => "decimal",
            ColumnType::Boolean => "boolean",
            ColumnType::Byte => "byte",
            ColumnType::Char => "char",
            ColumnType::Guid => "guid",
            ColumnType::Binary => "binary",
            ColumnType::DateTime => "datetime",
            ColumnType::DateTimeOffset => "datetimeoffset",
            ColumnType::TimeSpan => "timespan",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColumnType {
    type Err = CsvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        // A few common aliases on top of the canonical names
        let wanted = match wanted.as_str() {
            "string" => "text",
            "int" | "integer" => "int32",
            "long" => "int64",
            "short" => "int16",
            "float" => "single",
            "bool" => "boolean",
            "uuid" => "guid",
            other => other,
        };
        ColumnType::ALL
            .iter()
            .copied()
            .find(|ty| ty.name() == wanted)
            .ok_or_else(|| CsvError::InvalidDialect(format!("Unknown column type '{}'", s)))
    }
}

/// Describes a single column of a reader or writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    ordinal: usize,
    /// Declared value type, the only attribute callers may change
    pub column_type: ColumnType,
    is_virtual: bool,
}

impl Column {
    pub(crate) fn new(name: String, ordinal: usize, is_virtual: bool) -> Self {
        Self {
            name,
            ordinal,
            column_type: ColumnType::Text,
            is_virtual,
        }
    }

    /// Unique (within its registry) column name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Zero-based position in registration order
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Whether the value comes from a resolver instead of the text
    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names_roundtrip() {
        for ty in ColumnType::ALL {
            assert_eq!(ty.name().parse::<ColumnType>().unwrap(), ty);
        }
    }

    #[test]
    fn test_type_aliases() {
        assert_eq!("Int".parse::<ColumnType>().unwrap(), ColumnType::Int32);
        assert_eq!(" bool ".parse::<ColumnType>().unwrap(), ColumnType::Boolean);
        assert_eq!("UUID".parse::<ColumnType>().unwrap(), ColumnType::Guid);
        assert!("money".parse::<ColumnType>().is_err());
    }

    #[test]
    fn test_new_column_is_text() {
        let column = Column::new("Name".to_string(), 3, true);
        assert_eq!(column.name(), "Name");
        assert_eq!(column.ordinal(), 3);
        assert!(column.is_virtual());
        assert_eq!(column.column_type, ColumnType::Text);
    }
}
