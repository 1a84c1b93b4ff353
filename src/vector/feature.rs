use std::sync::Arc;

use chrono::{Datelike, NaiveDate};

use crate::errors::{MitabError, Result};
use crate::vector::{Defn, FeatureType, FieldDefn, FieldType, Geometry, Style};

/// Owned snapshot of one feature: geometry, style and attribute values.
///
/// Snapshots returned by [`Dataset::read_feature`](crate::vector::Dataset::read_feature)
/// hold no reference to the dataset; dropping one has no effect on it.
#[derive(Clone, Debug)]
pub struct Feature {
    defn: Arc<Defn>,
    fid: Option<u64>,
    geometry: Option<Geometry>,
    style: Style,
    values: Vec<Option<FieldValue>>,
}

impl Feature {
    /// An empty `NoGeom` feature with all attributes null.
    pub fn new(defn: Arc<Defn>) -> Feature {
        let values = vec![None; defn.field_count()];
        Feature {
            defn,
            fid: None,
            geometry: None,
            style: Style::default(),
            values,
        }
    }

    pub fn defn(&self) -> &Defn {
        &self.defn
    }

    pub(crate) fn defn_arc(&self) -> &Arc<Defn> {
        &self.defn
    }

    /// Feature id, `None` until the feature has been written or when it
    /// was built by the caller.
    pub fn fid(&self) -> Option<u64> {
        self.fid
    }

    /// Request a specific id for the next write. Ids must be positive.
    pub fn set_fid(&mut self, fid: Option<u64>) {
        self.fid = fid;
    }

    pub fn feature_type(&self) -> FeatureType {
        self.geometry
            .as_ref()
            .map(Geometry::feature_type)
            .unwrap_or(FeatureType::NoGeom)
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    pub fn geometry_mut(&mut self) -> Option<&mut Geometry> {
        self.geometry.as_mut()
    }

    pub fn set_geometry(&mut self, geom: Geometry) {
        self.geometry = Some(geom);
    }

    /// Turn this into a `NoGeom` feature.
    pub fn clear_geometry(&mut self) {
        self.geometry = None;
    }

    pub fn style(&self) -> &Style {
        &self.style
    }

    pub fn style_mut(&mut self) -> &mut Style {
        &mut self.style
    }

    pub fn set_style(&mut self, style: Style) {
        self.style = style;
    }

    pub fn field_count(&self) -> usize {
        self.values.len()
    }

    /// Index of the field called `field_name`.
    pub fn field_index(&self, field_name: &str) -> Result<usize> {
        self.defn
            .field_index(field_name)
            .ok_or_else(|| MitabError::InvalidFieldName {
                field_name: field_name.to_string(),
                method_name: "field_index",
            })
    }

    fn field_defn(&self, index: usize, method_name: &'static str) -> Result<&FieldDefn> {
        self.defn
            .field_defn(index)
            .ok_or(MitabError::InvalidFieldIndex { index, method_name })
    }

    /// Get the value of a named field. `None` means the value is null.
    pub fn field(&self, name: &str) -> Result<Option<FieldValue>> {
        let index = self.field_index(name)?;
        self.field_at(index)
    }

    pub fn field_at(&self, index: usize) -> Result<Option<FieldValue>> {
        self.field_defn(index, "field_at")?;
        Ok(self.values[index].clone())
    }

    /// The value as text, formatted with the field's declared precision.
    ///
    /// Decimals print exactly `precision` decimals, floats too when a
    /// precision is declared and the shortest exact form otherwise. Dates
    /// print as `YYYYMMDD`, logicals as `T`/`F`.
    pub fn field_as_string(&self, index: usize) -> Result<Option<String>> {
        let defn = self.field_defn(index, "field_as_string")?;
        Ok(self.values[index]
            .as_ref()
            .map(|value| format_value(defn, value)))
    }

    /// The value of a numeric field as `f64`.
    pub fn field_as_double(&self, index: usize) -> Result<Option<f64>> {
        let defn = self.field_defn(index, "field_as_double")?;
        if !defn.field_type().is_numeric() {
            return Err(MitabError::TypeMismatch {
                field_name: defn.name().to_string(),
                field_type: defn.field_type(),
                method_name: "field_as_double",
            });
        }
        Ok(match &self.values[index] {
            Some(FieldValue::IntegerValue(v)) => Some(*v as f64),
            Some(FieldValue::RealValue(v)) => Some(*v),
            _ => None,
        })
    }

    /// The value of a numeric field as `i32`, truncating decimals.
    pub fn field_as_integer(&self, index: usize) -> Result<Option<i32>> {
        Ok(self.field_as_double(index)?.map(|v| v as i32))
    }

    pub fn field_as_date(&self, index: usize) -> Result<Option<NaiveDate>> {
        let defn = self.field_defn(index, "field_as_date")?;
        match &self.values[index] {
            Some(FieldValue::DateValue(d)) => Ok(Some(*d)),
            None if defn.field_type() == FieldType::Date => Ok(None),
            _ => Err(MitabError::TypeMismatch {
                field_name: defn.name().to_string(),
                field_type: defn.field_type(),
                method_name: "field_as_date",
            }),
        }
    }

    /// Set a field from text, parsed according to the field type.
    pub fn set_field_string(&mut self, field_name: &str, value: &str) -> Result<()> {
        let index = self.field_index(field_name)?;
        let defn = self.field_defn(index, "set_field_string")?;
        self.values[index] = parse_value(defn.field_type(), value)?;
        Ok(())
    }

    pub fn set_field_double(&mut self, field_name: &str, value: f64) -> Result<()> {
        self.set_field(field_name, &FieldValue::RealValue(value))
    }

    pub fn set_field_integer(&mut self, field_name: &str, value: i32) -> Result<()> {
        self.set_field(field_name, &FieldValue::IntegerValue(value))
    }

    pub fn set_field_date(&mut self, field_name: &str, value: NaiveDate) -> Result<()> {
        self.set_field(field_name, &FieldValue::DateValue(value))
    }

    pub fn set_field_logical(&mut self, field_name: &str, value: bool) -> Result<()> {
        self.set_field(field_name, &FieldValue::LogicalValue(value))
    }

    pub fn set_field(&mut self, field_name: &str, value: &FieldValue) -> Result<()> {
        let index = self.field_index(field_name)?;
        self.set_field_at(index, Some(value.clone()))
    }

    pub fn set_field_null(&mut self, field_name: &str) -> Result<()> {
        let index = self.field_index(field_name)?;
        self.set_field_at(index, None)
    }

    /// Set a field by position. Integers widen to real fields; any other
    /// combination of value and field type is a `TypeMismatch`.
    pub fn set_field_at(&mut self, index: usize, value: Option<FieldValue>) -> Result<()> {
        let defn = self.field_defn(index, "set_field_at")?;
        let value = match value {
            Some(v) => Some(coerce(defn, v)?),
            None => None,
        };
        self.values[index] = value;
        Ok(())
    }

    pub(crate) fn values(&self) -> &[Option<FieldValue>] {
        &self.values
    }

    /// Replace all values at once, as decoded from a record.
    pub(crate) fn set_values(&mut self, values: Vec<Option<FieldValue>>) {
        self.values = values;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    IntegerValue(i32),
    StringValue(String),
    RealValue(f64),
    DateValue(NaiveDate),
    LogicalValue(bool),
}

impl FieldValue {
    /// Interpret the value as `String`, `None` for other variants.
    pub fn into_string(self) -> Option<String> {
        match self {
            FieldValue::StringValue(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret the value as `f64`; integers are widened.
    pub fn into_real(self) -> Option<f64> {
        match self {
            FieldValue::RealValue(v) => Some(v),
            FieldValue::IntegerValue(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn into_int(self) -> Option<i32> {
        match self {
            FieldValue::IntegerValue(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_date(self) -> Option<NaiveDate> {
        match self {
            FieldValue::DateValue(d) => Some(d),
            _ => None,
        }
    }

    pub fn into_bool(self) -> Option<bool> {
        match self {
            FieldValue::LogicalValue(b) => Some(b),
            _ => None,
        }
    }
}

fn coerce(defn: &FieldDefn, value: FieldValue) -> Result<FieldValue> {
    let mismatch = || MitabError::TypeMismatch {
        field_name: defn.name().to_string(),
        field_type: defn.field_type(),
        method_name: "set_field",
    };
    match (defn.field_type(), value) {
        (FieldType::Char, v @ FieldValue::StringValue(_)) => Ok(v),
        (FieldType::Integer, v @ FieldValue::IntegerValue(_)) => Ok(v),
        (FieldType::SmallInt, FieldValue::IntegerValue(v)) => {
            if i16::try_from(v).is_err() {
                return Err(MitabError::BadArgument(format!(
                    "{v} does not fit SmallInt field '{}'",
                    defn.name()
                )));
            }
            Ok(FieldValue::IntegerValue(v))
        }
        (FieldType::Decimal | FieldType::Float, FieldValue::IntegerValue(v)) => {
            Ok(FieldValue::RealValue(v as f64))
        }
        (FieldType::Decimal | FieldType::Float, v @ FieldValue::RealValue(_)) => Ok(v),
        (FieldType::Date, v @ FieldValue::DateValue(_)) => Ok(v),
        (FieldType::Logical, v @ FieldValue::LogicalValue(_)) => Ok(v),
        _ => Err(mismatch()),
    }
}

/// Parse attribute text. Empty text is null for every type but `Char`.
pub(crate) fn parse_value(field_type: FieldType, text: &str) -> Result<Option<FieldValue>> {
    if field_type == FieldType::Char {
        return Ok(Some(FieldValue::StringValue(text.to_string())));
    }
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let bad = || MitabError::BadArgument(format!("'{text}' is not a valid {field_type:?} value"));
    Ok(Some(match field_type {
        FieldType::Integer => FieldValue::IntegerValue(text.parse().map_err(|_| bad())?),
        FieldType::SmallInt => {
            FieldValue::IntegerValue(text.parse::<i16>().map_err(|_| bad())? as i32)
        }
        FieldType::Decimal | FieldType::Float => {
            FieldValue::RealValue(text.parse().map_err(|_| bad())?)
        }
        FieldType::Date => FieldValue::DateValue(parse_date(text).ok_or_else(bad)?),
        FieldType::Logical => match text.to_ascii_uppercase().as_str() {
            "T" | "TRUE" | "Y" | "1" => FieldValue::LogicalValue(true),
            "F" | "FALSE" | "N" | "0" => FieldValue::LogicalValue(false),
            _ => return Err(bad()),
        },
        FieldType::Char => FieldValue::StringValue(text.to_string()),
    }))
}

/// `YYYYMMDD`, `YYYY/MM/DD` or `YYYY-MM-DD`.
fn parse_date(text: &str) -> Option<NaiveDate> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 8 {
        return None;
    }
    let year = digits[0..4].parse().ok()?;
    let month = digits[4..6].parse().ok()?;
    let day = digits[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

pub(crate) fn format_value(defn: &FieldDefn, value: &FieldValue) -> String {
    match value {
        FieldValue::StringValue(s) => s.clone(),
        FieldValue::IntegerValue(v) => v.to_string(),
        FieldValue::RealValue(v) => match defn.field_type() {
            FieldType::Decimal => format!("{:.*}", defn.precision(), v),
            _ if defn.precision() > 0 => format!("{:.*}", defn.precision(), v),
            _ => v.to_string(),
        },
        FieldValue::DateValue(d) => format!("{:04}{:02}{:02}", d.year(), d.month(), d.day()),
        FieldValue::LogicalValue(b) => if *b { "T" } else { "F" }.to_string(),
    }
}
