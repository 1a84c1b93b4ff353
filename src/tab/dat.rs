//! The `.DAT` attribute table: a dBASE style header followed by fixed
//! width records.
//!
//! ```text
//! 0      table type 0x03, last update YY MM DD
//! 4      record count (i32)
//! 8      offset of the first record (i16)
//! 10     record length (i16), deletion flag included
//! 32     one 32 byte descriptor per field, then 0x0d
//! ```
//!
//! Every record starts with `' '` (live) or `'*'` (deleted). Integer,
//! SmallInt, Float and Date values are stored in binary and declared as
//! `C` fields of their storage size; Char and Decimal values are text.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Datelike, NaiveDate};

use crate::errors::{MitabError, Result};
use crate::tab::map::raw_block::{BinReader, BinWriter};
use crate::utils::{latin1_to_string, string_to_latin1, trim_nul};
use crate::vector::{format_value, Defn, FieldDefn, FieldType, FieldValue};

const TABLE_TYPE: u8 = 0x03;
const DESCRIPTOR_SIZE: usize = 32;
const DESCRIPTOR_NAME_LEN: usize = 11;
const HEADER_END: u8 = 0x0d;

const RECORD_LIVE: u8 = b' ';
const RECORD_DELETED: u8 = b'*';

/// Days between 0001-01-01 and 1970-01-01.
const UNIX_EPOCH_CE_DAYS: i32 = 719_163;

/// Field layout as declared in the `.DAT` header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatField {
    pub name: String,
    pub type_char: u8,
    pub length: usize,
    pub decimals: usize,
}

impl DatField {
    fn of(field: &FieldDefn) -> DatField {
        let type_char = match field.field_type() {
            FieldType::Decimal => b'N',
            FieldType::Logical => b'L',
            _ => b'C',
        };
        DatField {
            name: field.name().to_string(),
            type_char,
            length: field.width(),
            decimals: field.precision(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DatHeader {
    pub last_update: Option<NaiveDate>,
    pub num_records: u32,
    pub header_len: usize,
    pub record_len: usize,
    pub fields: Vec<DatField>,
}

impl DatHeader {
    pub fn for_defn(defn: &Defn, num_records: u32) -> DatHeader {
        let fields: Vec<DatField> = defn
            .fields()
            .filter_map(|f| defn.field_defn(f.index()))
            .map(DatField::of)
            .collect();
        DatHeader {
            last_update: today(),
            num_records,
            header_len: (fields.len() + 1) * DESCRIPTOR_SIZE + 1,
            record_len: defn.record_len(),
            fields,
        }
    }

    pub fn read(data: &[u8]) -> Result<DatHeader> {
        let mut r = BinReader::new(data, 0, ".DAT header");
        r.read_u8()?;
        let (yy, mm, dd) = (r.read_u8()?, r.read_u8()?, r.read_u8()?);
        let last_update = NaiveDate::from_ymd_opt(1900 + yy as i32, mm as u32, dd as u32);
        let num_records = r.read_i32()?;
        let header_len = r.read_i16()?;
        let record_len = r.read_i16()?;
        if num_records < 0 || header_len < DESCRIPTOR_SIZE as i16 || record_len < 1 {
            return Err(MitabError::CorruptFormat(format!(
                ".DAT header declares {num_records} records of {record_len} bytes after {header_len} bytes"
            )));
        }
        let header_len = header_len as usize;
        let num_fields = header_len / DESCRIPTOR_SIZE - 1;
        let mut fields = Vec::with_capacity(num_fields);
        for i in 0..num_fields {
            r.goto((i + 1) * DESCRIPTOR_SIZE)?;
            let name = latin1_to_string(trim_nul(r.read_bytes(DESCRIPTOR_NAME_LEN)?));
            let type_char = r.read_u8()?;
            r.read_i32()?;
            let length = r.read_u8()? as usize;
            let decimals = r.read_u8()? as usize;
            fields.push(DatField {
                name,
                type_char,
                length,
                decimals,
            });
        }
        Ok(DatHeader {
            last_update,
            num_records: num_records as u32,
            header_len,
            record_len: record_len as usize,
            fields,
        })
    }

    pub fn write(&self) -> Result<Vec<u8>> {
        fn fits<T: TryFrom<usize>>(value: usize, what: &str) -> Result<T> {
            T::try_from(value).map_err(|_| {
                MitabError::BadArgument(format!("{what} {value} does not fit the .DAT header"))
            })
        }

        let mut w = BinWriter::growable();
        w.put_u8(TABLE_TYPE)?;
        match self.last_update {
            Some(d) => {
                w.put_u8((d.year() - 1900).clamp(0, 255) as u8)?;
                w.put_u8(d.month() as u8)?;
                w.put_u8(d.day() as u8)?;
            }
            None => w.put_bytes(&[0, 0, 0])?,
        }
        w.put_i32(self.num_records as i32)?;
        w.put_i16(fits(self.header_len, "header length")?)?;
        w.put_i16(fits(self.record_len, "record length")?)?;
        w.put_bytes(&[0; DESCRIPTOR_SIZE - 12])?;
        for field in &self.fields {
            w.put_fixed_str(&string_to_latin1(&field.name), DESCRIPTOR_NAME_LEN)?;
            w.put_u8(field.type_char)?;
            w.put_i32(0)?;
            w.put_u8(fits(field.length, "field width")?)?;
            w.put_u8(fits(field.decimals, "field decimals")?)?;
            w.put_bytes(&[0; DESCRIPTOR_SIZE - 18])?;
        }
        w.put_u8(HEADER_END)?;
        Ok(w.into_inner())
    }

    /// Check the declared layout matches the `.TAB` field definitions.
    pub fn check_defn(&self, defn: &Defn) -> Result<()> {
        if self.fields.len() != defn.field_count() {
            return Err(MitabError::CorruptFormat(format!(
                ".DAT declares {} fields, .TAB {}",
                self.fields.len(),
                defn.field_count()
            )));
        }
        for (dat, field) in self.fields.iter().zip(defn.fields()) {
            if dat.length != field.width() {
                return Err(MitabError::CorruptFormat(format!(
                    "field '{}' is {} bytes wide in .DAT but {} in .TAB",
                    field.name(),
                    dat.length,
                    field.width()
                )));
            }
        }
        if self.record_len != defn.record_len() {
            return Err(MitabError::CorruptFormat(format!(
                ".DAT records are {} bytes, fields need {}",
                self.record_len,
                defn.record_len()
            )));
        }
        Ok(())
    }
}

fn today() -> Option<NaiveDate> {
    let days = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs() / 86_400;
    NaiveDate::from_num_days_from_ce_opt(UNIX_EPOCH_CE_DAYS + i32::try_from(days).ok()?)
}

/// Encode one record, deletion flag first.
pub fn encode_record(defn: &Defn, values: &[Option<FieldValue>]) -> Result<Vec<u8>> {
    let mut w = BinWriter::growable();
    w.put_u8(RECORD_LIVE)?;
    for field in defn.fields() {
        let Some(def) = defn.field_defn(field.index()) else {
            continue;
        };
        let value = values.get(field.index()).and_then(Option::as_ref);
        encode_value(&mut w, def, value)?;
    }
    Ok(w.into_inner())
}

fn encode_value(w: &mut BinWriter, def: &FieldDefn, value: Option<&FieldValue>) -> Result<()> {
    match (def.field_type(), value) {
        (FieldType::Char, v) => {
            let text = v.map(|v| format_value(def, v)).unwrap_or_default();
            let mut bytes = string_to_latin1(&text);
            bytes.resize(def.width(), b' ');
            w.put_bytes(&bytes)
        }
        (FieldType::Decimal, v) => {
            let text = v.map(|v| format_value(def, v)).unwrap_or_default();
            if text.len() > def.width() {
                return Err(MitabError::BadArgument(format!(
                    "{text} does not fit in the {} characters of field '{}'",
                    def.width(),
                    def.name()
                )));
            }
            w.put_bytes(format!("{text:>width$}", width = def.width()).as_bytes())
        }
        (FieldType::Integer, v) => w.put_i32(v.and_then(|v| v.clone().into_int()).unwrap_or(0)),
        (FieldType::SmallInt, v) => {
            let v = v.and_then(|v| v.clone().into_int()).unwrap_or(0);
            w.put_i16(i16::try_from(v).map_err(|_| {
                MitabError::BadArgument(format!("{v} does not fit SmallInt field '{}'", def.name()))
            })?)
        }
        (FieldType::Float, v) => w.put_f64(v.and_then(|v| v.clone().into_real()).unwrap_or(0.0)),
        (FieldType::Date, Some(FieldValue::DateValue(d))) => {
            let year = i16::try_from(d.year()).map_err(|_| {
                MitabError::BadArgument(format!("{d} does not fit Date field '{}'", def.name()))
            })?;
            w.put_u8(d.day() as u8)?;
            w.put_u8(d.month() as u8)?;
            w.put_i16(year)
        }
        (FieldType::Date, _) => w.put_i32(0),
        (FieldType::Logical, v) => {
            let flag = matches!(v, Some(FieldValue::LogicalValue(true)));
            w.put_u8(flag as u8)
        }
    }
}

/// Decode the values of one record (flag excluded).
pub fn decode_record(defn: &Defn, record: &[u8], offset: u64) -> Result<Vec<Option<FieldValue>>> {
    let mut r = BinReader::new(record, offset, ".DAT record");
    let mut values = Vec::with_capacity(defn.field_count());
    for field in defn.fields() {
        let value = match field.field_type() {
            FieldType::Char => {
                let text = latin1_to_string(trim_nul(r.read_bytes(field.width())?));
                Some(FieldValue::StringValue(text.trim_end().to_string()))
            }
            FieldType::Decimal => {
                let text = latin1_to_string(trim_nul(r.read_bytes(field.width())?));
                let text = text.trim();
                if text.is_empty() {
                    None
                } else {
                    Some(FieldValue::RealValue(text.parse().map_err(|_| {
                        MitabError::CorruptFormat(format!(
                            "'{text}' in decimal field '{}' at offset {offset}",
                            field.name()
                        ))
                    })?))
                }
            }
            FieldType::Integer => Some(FieldValue::IntegerValue(r.read_i32()?)),
            FieldType::SmallInt => Some(FieldValue::IntegerValue(r.read_i16()? as i32)),
            FieldType::Float => Some(FieldValue::RealValue(r.read_f64()?)),
            FieldType::Date => {
                let day = r.read_u8()?;
                let month = r.read_u8()?;
                let year = r.read_i16()?;
                NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
                    .map(FieldValue::DateValue)
            }
            FieldType::Logical => match r.read_u8()? {
                0 | b'F' | b'f' | b'N' | b'n' => Some(FieldValue::LogicalValue(false)),
                b' ' => None,
                _ => Some(FieldValue::LogicalValue(true)),
            },
        };
        values.push(value);
    }
    Ok(values)
}

/// A `.DAT` file loaded for reading.
#[derive(Debug)]
pub struct DatReader {
    data: Vec<u8>,
    header: DatHeader,
}

impl DatReader {
    pub fn open(path: &Path, defn: &Defn) -> Result<DatReader> {
        let data = fs::read(path).map_err(|e| MitabError::FileNotFound {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let header = DatHeader::read(&data)?;
        header.check_defn(defn)?;
        log::debug!(
            "Loaded .DAT: {} records of {} bytes",
            header.num_records,
            header.record_len
        );
        Ok(DatReader { data, header })
    }

    pub fn header(&self) -> &DatHeader {
        &self.header
    }

    pub fn num_records(&self) -> u32 {
        self.header.num_records
    }

    fn record(&self, fid: u64) -> Result<Option<&[u8]>> {
        if fid == 0 || fid > self.header.num_records as u64 {
            return Ok(None);
        }
        let start = self.header.header_len + (fid as usize - 1) * self.header.record_len;
        let end = start + self.header.record_len;
        self.data
            .get(start..end)
            .map(Some)
            .ok_or(MitabError::TruncatedData {
                what: ".DAT record",
                offset: start as u64,
                needed: self.header.record_len,
                available: self.data.len().saturating_sub(start),
            })
    }

    /// False for deleted records and ids outside the table.
    pub fn is_live(&self, fid: u64) -> Result<bool> {
        Ok(matches!(self.record(fid)?, Some(rec) if rec[0] != RECORD_DELETED))
    }

    /// Values of a live record, `None` when deleted or absent.
    pub fn values(&self, defn: &Defn, fid: u64) -> Result<Option<Vec<Option<FieldValue>>>> {
        match self.record(fid)? {
            Some(rec) if rec[0] != RECORD_DELETED => {
                let offset = (self.header.header_len
                    + (fid as usize - 1) * self.header.record_len
                    + 1) as u64;
                decode_record(defn, &rec[1..], offset).map(Some)
            }
            _ => Ok(None),
        }
    }
}

/// Appends records to a new `.DAT` file.
///
/// The header is written with a zero record count up front and rewritten
/// by [`DatWriter::finish`].
#[derive(Debug)]
pub struct DatWriter {
    file: BufWriter<File>,
    header: DatHeader,
}

impl DatWriter {
    pub fn create(path: &Path, defn: &Defn) -> Result<DatWriter> {
        let header = DatHeader::for_defn(defn, 0);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let mut file = BufWriter::new(file);
        file.write_all(&header.write()?)?;
        Ok(DatWriter { file, header })
    }

    pub fn num_records(&self) -> u32 {
        self.header.num_records
    }

    /// Append an encoded record, returning its 1-based id.
    pub fn append(&mut self, record: &[u8]) -> Result<u64> {
        if record.len() != self.header.record_len {
            return Err(MitabError::SchemaMismatch(format!(
                "record of {} bytes for a table of {} byte records",
                record.len(),
                self.header.record_len
            )));
        }
        self.file.write_all(record)?;
        self.header.num_records += 1;
        Ok(self.header.num_records as u64)
    }

    /// Append a deleted placeholder record.
    pub fn append_deleted(&mut self) -> Result<u64> {
        let mut record = vec![b' '; self.header.record_len];
        record[0] = RECORD_DELETED;
        self.append(&record)
    }

    /// Flag an already written record as deleted.
    pub fn mark_deleted(&mut self, fid: u64) -> Result<()> {
        if fid == 0 || fid > self.header.num_records as u64 {
            return Err(MitabError::FeatureNotFound {
                fid,
                method_name: "mark_deleted",
            });
        }
        let pos = self.header.header_len as u64 + (fid - 1) * self.header.record_len as u64;
        self.file.seek(SeekFrom::Start(pos))?;
        self.file.write_all(&[RECORD_DELETED])?;
        self.file.seek(SeekFrom::End(0))?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.header.last_update = today();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&self.header.write()?)?;
        let file = self.file.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TempFixture;

    fn sample_defn() -> Defn {
        let mut defn = Defn::new();
        let mut name = FieldDefn::new("Name", FieldType::Char).unwrap();
        name.set_width(12);
        defn.push(name).unwrap();
        defn.push(FieldDefn::new("Pop", FieldType::Integer).unwrap())
            .unwrap();
        defn.push(FieldDefn::new("Code", FieldType::SmallInt).unwrap())
            .unwrap();
        let mut price = FieldDefn::new("Price", FieldType::Decimal).unwrap();
        price.set_width(8);
        price.set_precision(2);
        defn.push(price).unwrap();
        defn.push(FieldDefn::new("Area", FieldType::Float).unwrap())
            .unwrap();
        defn.push(FieldDefn::new("Founded", FieldType::Date).unwrap())
            .unwrap();
        defn.push(FieldDefn::new("Capital", FieldType::Logical).unwrap())
            .unwrap();
        defn
    }

    fn sample_values() -> Vec<Option<FieldValue>> {
        vec![
            Some(FieldValue::StringValue("Montréal".to_string())),
            Some(FieldValue::IntegerValue(1_762_949)),
            Some(FieldValue::IntegerValue(-3)),
            Some(FieldValue::RealValue(12.5)),
            Some(FieldValue::RealValue(431.5)),
            Some(FieldValue::DateValue(
                NaiveDate::from_ymd_opt(1642, 5, 17).unwrap(),
            )),
            Some(FieldValue::LogicalValue(false)),
        ]
    }

    #[test]
    fn test_record_layout() {
        let defn = sample_defn();
        let record = encode_record(&defn, &sample_values()).unwrap();
        assert_eq!(record.len(), defn.record_len());
        assert_eq!(record[0], b' ');
        assert_eq!(&record[1..10], b"Montr\xe9al ");
        // Decimal text is right aligned.
        assert_eq!(&record[19..27], b"   12.50");
        let back = decode_record(&defn, &record[1..], 0).unwrap();
        assert_eq!(back, sample_values());
    }

    #[test]
    fn test_null_values() {
        let defn = sample_defn();
        let record = encode_record(&defn, &vec![None; 7]).unwrap();
        let back = decode_record(&defn, &record[1..], 0).unwrap();
        assert_eq!(back[0], Some(FieldValue::StringValue(String::new())));
        assert_eq!(back[1], Some(FieldValue::IntegerValue(0)));
        assert_eq!(back[3], None);
        assert_eq!(back[5], None);
        assert_eq!(back[6], Some(FieldValue::LogicalValue(false)));
    }

    #[test]
    fn test_decimal_overflow() {
        let defn = sample_defn();
        let mut values = sample_values();
        values[3] = Some(FieldValue::RealValue(123_456_789.0));
        assert!(encode_record(&defn, &values).is_err());
    }

    #[test]
    fn test_header_descriptors() {
        let defn = sample_defn();
        let header = DatHeader::for_defn(&defn, 3);
        let bytes = header.write().unwrap();
        assert_eq!(bytes.len(), header.header_len);
        assert_eq!(bytes[0], 0x03);
        assert_eq!(bytes[32 + 11], b'C');
        assert_eq!(bytes[3 * 32 + 11], b'C');
        assert_eq!(bytes[4 * 32 + 11], b'N');
        assert_eq!(bytes[4 * 32 + 16], 8);
        assert_eq!(bytes[4 * 32 + 17], 2);
        assert_eq!(bytes[7 * 32 + 11], b'L');
        assert_eq!(*bytes.last().unwrap(), 0x0d);

        let back = DatHeader::read(&bytes).unwrap();
        assert_eq!(back.fields, header.fields);
        assert_eq!(back.num_records, 3);
        back.check_defn(&defn).unwrap();
        assert!(back.check_defn(&Defn::new()).is_err());
    }

    #[test]
    fn test_header_overflow() {
        let mut header = DatHeader::for_defn(&sample_defn(), 0);
        header.record_len = i16::MAX as usize;
        assert!(header.write().is_ok());
        header.record_len += 1;
        assert!(matches!(header.write(), Err(MitabError::BadArgument(_))));

        let mut header = DatHeader::for_defn(&sample_defn(), 0);
        header.fields[0].length = 256;
        assert!(matches!(header.write(), Err(MitabError::BadArgument(_))));
    }

    #[test]
    fn test_write_delete_read() {
        let fixture = TempFixture::empty("table.dat");
        let defn = sample_defn();
        let mut writer = DatWriter::create(fixture.path(), &defn).unwrap();
        let record = encode_record(&defn, &sample_values()).unwrap();
        assert_eq!(writer.append(&record).unwrap(), 1);
        assert_eq!(writer.append_deleted().unwrap(), 2);
        assert_eq!(writer.append(&record).unwrap(), 3);
        writer.mark_deleted(1).unwrap();
        assert!(writer.mark_deleted(9).is_err());
        assert!(writer.append(&record[1..]).is_err());
        writer.finish().unwrap();

        let reader = DatReader::open(fixture.path(), &defn).unwrap();
        assert_eq!(reader.num_records(), 3);
        assert!(reader.header().last_update.is_some());
        assert!(!reader.is_live(1).unwrap());
        assert!(!reader.is_live(2).unwrap());
        assert!(reader.is_live(3).unwrap());
        assert!(!reader.is_live(4).unwrap());
        assert_eq!(reader.values(&defn, 1).unwrap(), None);
        assert_eq!(reader.values(&defn, 3).unwrap(), Some(sample_values()));
    }
}
