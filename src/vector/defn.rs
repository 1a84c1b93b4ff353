use crate::errors::{MitabError, Result};

/// Attribute types, with their wire codes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    Char = 1,
    Integer = 2,
    SmallInt = 3,
    Decimal = 4,
    Float = 5,
    Date = 6,
    Logical = 7,
}

impl FieldType {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Result<FieldType> {
        Ok(match code {
            1 => FieldType::Char,
            2 => FieldType::Integer,
            3 => FieldType::SmallInt,
            4 => FieldType::Decimal,
            5 => FieldType::Float,
            6 => FieldType::Date,
            7 => FieldType::Logical,
            _ => {
                return Err(MitabError::BadArgument(format!(
                    "field type code {code}"
                )))
            }
        })
    }

    /// Type keyword used by `.TAB` headers and MIF `Columns` clauses.
    pub fn keyword(self) -> &'static str {
        match self {
            FieldType::Char => "Char",
            FieldType::Integer => "Integer",
            FieldType::SmallInt => "SmallInt",
            FieldType::Decimal => "Decimal",
            FieldType::Float => "Float",
            FieldType::Date => "Date",
            FieldType::Logical => "Logical",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<FieldType> {
        [
            FieldType::Char,
            FieldType::Integer,
            FieldType::SmallInt,
            FieldType::Decimal,
            FieldType::Float,
            FieldType::Date,
            FieldType::Logical,
        ]
        .into_iter()
        .find(|t| t.keyword().eq_ignore_ascii_case(keyword))
    }

    /// Storage width of the types kept in binary form, `None` for the
    /// text types whose width is declared.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            FieldType::Integer => Some(4),
            FieldType::SmallInt => Some(2),
            FieldType::Float => Some(8),
            FieldType::Date => Some(4),
            FieldType::Logical => Some(1),
            FieldType::Char | FieldType::Decimal => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            FieldType::Integer | FieldType::SmallInt | FieldType::Decimal | FieldType::Float
        )
    }
}

pub const MAX_FIELD_NAME: usize = 31;
pub const MAX_CHAR_WIDTH: usize = 254;
pub const MAX_DECIMAL_WIDTH: usize = 20;
/// `.DAT` record and header lengths are stored as 16 bit integers.
pub const MAX_RECORD_LEN: usize = i16::MAX as usize;
/// Most fields whose 32 byte descriptors fit a `.DAT` header.
pub const MAX_FIELDS: usize = (MAX_RECORD_LEN - 1) / 32 - 1;

/// Definition of a new field, to be added with
/// [`Dataset::add_field`](crate::vector::Dataset::add_field).
///
/// ```
/// use mitab::vector::{FieldDefn, FieldType};
///
/// let mut price = FieldDefn::new("Price", FieldType::Decimal).unwrap();
/// price.set_width(10);
/// price.set_precision(2);
/// price.set_indexed(true);
/// assert_eq!(price.width(), 10);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDefn {
    name: String,
    field_type: FieldType,
    width: usize,
    precision: usize,
    indexed: bool,
    unique: bool,
}

impl FieldDefn {
    /// A field with the default width of its type: 254 for `Char`, 20 for
    /// `Decimal`, the storage size for the others.
    pub fn new(name: &str, field_type: FieldType) -> Result<FieldDefn> {
        validate_name(name)?;
        let width = match field_type {
            FieldType::Char => MAX_CHAR_WIDTH,
            FieldType::Decimal => MAX_DECIMAL_WIDTH,
            other => other.fixed_width().unwrap_or(0),
        };
        Ok(FieldDefn {
            name: name.to_string(),
            field_type,
            width,
            precision: 0,
            indexed: false,
            unique: false,
        })
    }

    /// Set the width of a `Char` or `Decimal` field. Binary types keep
    /// their storage size.
    pub fn set_width(&mut self, width: usize) {
        if self.field_type.fixed_width().is_none() {
            self.width = width;
        }
    }

    /// Set the number of decimals of a `Decimal` or `Float` field.
    pub fn set_precision(&mut self, precision: usize) {
        if matches!(self.field_type, FieldType::Decimal | FieldType::Float) {
            self.precision = precision;
        }
    }

    pub fn set_indexed(&mut self, indexed: bool) {
        self.indexed = indexed;
    }

    pub fn set_unique(&mut self, unique: bool) {
        self.unique = unique;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn precision(&self) -> usize {
        self.precision
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let bad = |why: String| {
            Err(MitabError::BadArgument(format!(
                "field '{}': {why}",
                self.name
            )))
        };
        match self.field_type {
            FieldType::Char if !(1..=MAX_CHAR_WIDTH).contains(&self.width) => {
                bad(format!("Char width {} is outside 1..={MAX_CHAR_WIDTH}", self.width))
            }
            FieldType::Decimal if !(1..=MAX_DECIMAL_WIDTH).contains(&self.width) => bad(format!(
                "Decimal width {} is outside 1..={MAX_DECIMAL_WIDTH}",
                self.width
            )),
            FieldType::Decimal if self.precision + 1 >= self.width && self.precision > 0 => {
                bad(format!(
                    "precision {} does not fit in width {}",
                    self.precision, self.width
                ))
            }
            _ => Ok(()),
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().count() > MAX_FIELD_NAME {
        return Err(MitabError::BadArgument(format!(
            "field name '{name}' must have 1 to {MAX_FIELD_NAME} characters"
        )));
    }
    if let Some(c) = name.chars().find(|c| !(c.is_alphanumeric() || *c == '_')) {
        return Err(MitabError::BadArgument(format!(
            "field name '{name}' contains '{c}'"
        )));
    }
    Ok(())
}

/// Table definition
///
/// The ordered fields every feature of a dataset carries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Defn {
    fields: Vec<FieldDefn>,
}

impl Defn {
    pub fn new() -> Defn {
        Defn::default()
    }

    /// Iterate over the field schema.
    pub fn fields(&self) -> FieldIterator<'_> {
        FieldIterator {
            defn: self,
            next_id: 0,
        }
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, index: usize) -> Option<Field<'_>> {
        self.fields.get(index).map(|defn| Field { index, defn })
    }

    /// Index of the field called `name`, compared case-insensitively.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub(crate) fn field_defn(&self, index: usize) -> Option<&FieldDefn> {
        self.fields.get(index)
    }

    pub(crate) fn push(&mut self, field: FieldDefn) -> Result<()> {
        field.validate()?;
        if self.field_index(&field.name).is_some() {
            return Err(MitabError::BadArgument(format!(
                "duplicate field name '{}'",
                field.name
            )));
        }
        if self.fields.len() >= MAX_FIELDS {
            return Err(MitabError::BadArgument(format!(
                "field '{}' exceeds the {MAX_FIELDS} field limit",
                field.name
            )));
        }
        let record_len = self.record_len() + field.width;
        if record_len > MAX_RECORD_LEN {
            return Err(MitabError::BadArgument(format!(
                "field '{}' makes records {record_len} bytes long, over {MAX_RECORD_LEN}",
                field.name
            )));
        }
        self.fields.push(field);
        Ok(())
    }

    /// Bytes per `.DAT` record, including the deletion flag.
    pub fn record_len(&self) -> usize {
        1 + self.fields.iter().map(|f| f.width).sum::<usize>()
    }
}

pub struct FieldIterator<'a> {
    defn: &'a Defn,
    next_id: usize,
}

impl<'a> Iterator for FieldIterator<'a> {
    type Item = Field<'a>;

    #[inline]
    fn next(&mut self) -> Option<Field<'a>> {
        let field = self.defn.field(self.next_id)?;
        self.next_id += 1;
        Some(field)
    }
}

/// One field of a [`Defn`].
#[derive(Copy, Clone, Debug)]
pub struct Field<'a> {
    index: usize,
    defn: &'a FieldDefn,
}

impl<'a> Field<'a> {
    /// Position of this field in the record.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Get the name of this field.
    pub fn name(&self) -> &'a str {
        &self.defn.name
    }

    /// Get the data type of this field.
    pub fn field_type(&self) -> FieldType {
        self.defn.field_type
    }

    /// Get the storage width of this field.
    ///
    /// Binary types report their fixed size.
    pub fn width(&self) -> usize {
        self.defn.width
    }

    /// Get the number of decimals of this field.
    ///
    /// This is zero for fields of types other than Decimal and Float.
    pub fn precision(&self) -> usize {
        self.defn.precision
    }

    pub fn is_indexed(&self) -> bool {
        self.defn.indexed
    }

    /// Return whether this field has a unique constraint.
    pub fn is_unique(&self) -> bool {
        self.defn.unique
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes() {
        for code in 1..=7 {
            assert_eq!(FieldType::from_code(code).unwrap().code(), code);
        }
        assert!(FieldType::from_code(0).is_err());
        assert_eq!(FieldType::from_keyword("smallint"), Some(FieldType::SmallInt));
    }

    #[test]
    fn test_binary_widths_are_fixed() {
        let mut f = FieldDefn::new("Pop", FieldType::Integer).unwrap();
        f.set_width(12);
        f.set_precision(3);
        assert_eq!(f.width(), 4);
        assert_eq!(f.precision(), 0);
    }

    #[test]
    fn test_invalid_definitions() {
        assert!(FieldDefn::new("", FieldType::Char).is_err());
        assert!(FieldDefn::new("has space", FieldType::Char).is_err());
        assert!(FieldDefn::new(&"n".repeat(32), FieldType::Char).is_err());

        let mut f = FieldDefn::new("Name", FieldType::Char).unwrap();
        f.set_width(255);
        assert!(f.validate().is_err());
        f.set_width(MAX_CHAR_WIDTH);
        f.validate().unwrap();

        let mut d = FieldDefn::new("Amount", FieldType::Decimal).unwrap();
        d.set_width(4);
        d.set_precision(4);
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_defn_iteration() {
        let mut defn = Defn::new();
        let mut name = FieldDefn::new("Name", FieldType::Char).unwrap();
        name.set_width(20);
        defn.push(name).unwrap();
        defn.push(FieldDefn::new("Pop", FieldType::Integer).unwrap())
            .unwrap();
        assert!(defn
            .push(FieldDefn::new("NAME", FieldType::Float).unwrap())
            .is_err());

        let names: Vec<_> = defn.fields().map(|f| f.name().to_string()).collect();
        assert_eq!(names, vec!["Name", "Pop"]);
        assert_eq!(defn.field_index("pop"), Some(1));
        assert_eq!(defn.record_len(), 1 + 20 + 4);
    }

    #[test]
    fn test_record_limits() {
        let mut defn = Defn::new();
        for i in 0..129 {
            defn.push(FieldDefn::new(&format!("C{i}"), FieldType::Char).unwrap())
                .unwrap();
        }
        assert_eq!(defn.record_len(), MAX_RECORD_LEN);
        let err = defn
            .push(FieldDefn::new("Flag", FieldType::Logical).unwrap())
            .unwrap_err();
        assert!(matches!(err, MitabError::BadArgument(_)));
        assert_eq!(defn.field_count(), 129);

        let mut defn = Defn::new();
        for i in 0..MAX_FIELDS {
            defn.push(FieldDefn::new(&format!("F{i}"), FieldType::Logical).unwrap())
                .unwrap();
        }
        assert!(32 * (defn.field_count() + 1) + 1 <= MAX_RECORD_LEN);
        assert!(32 * (defn.field_count() + 2) + 1 > MAX_RECORD_LEN);
        assert!(matches!(
            defn.push(FieldDefn::new("Extra", FieldType::Logical).unwrap()),
            Err(MitabError::BadArgument(_))
        ));
    }
}
