//! # Record Output
//!
//! Serializes feature records as CSV, a JSON array or NDJSON. Records are
//! written as they are pulled, so a stream is never buffered whole.
//!
//! Every format carries the record id as an extra leading `id` field,
//! followed by the schema's columns in order. Null values become empty CSV
//! cells and JSON `null`.

use std::io::Write;

use serde_json::{Map, Number, Value};

use crate::{FeatureRecord, FeatureSchema, FeatureValue, Result, SdmxError};

/// Name of the record id field in every output format.
pub const ID_FIELD: &str = "id";

/// Supported output formats.
///
/// # Examples
///
/// ```rust
/// use atrius_sdmx::ContentType;
///
/// assert_eq!(ContentType::from_string("csv")?, ContentType::CsvWithHeader);
/// assert_eq!(ContentType::from_string("text/csv;header=false")?, ContentType::Csv);
/// assert_eq!(ContentType::from_string("application/x-ndjson")?, ContentType::NdJson);
/// assert!(ContentType::from_string("text/plain").is_err());
/// # Ok::<(), atrius_sdmx::SdmxError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// Comma-separated values without a header row
    Csv,
    /// Comma-separated values with a header row
    CsvWithHeader,
    /// Pretty-printed JSON array of objects
    Json,
    /// One JSON object per line
    NdJson,
}

impl ContentType {
    /// Parses a short format name or MIME type.
    pub fn from_string(s: &str) -> Result<Self> {
        match s.trim() {
            "csv" | "text/csv" | "text/csv;header=true" => Ok(ContentType::CsvWithHeader),
            "text/csv;header=false" => Ok(ContentType::Csv),
            "json" | "application/json" => Ok(ContentType::Json),
            "ndjson" | "application/ndjson" | "application/x-ndjson" => Ok(ContentType::NdJson),
            other => Err(SdmxError::UnsupportedContentType(other.to_string())),
        }
    }
}

/// Drains `records` into `writer`, returning the number of records written.
///
/// The first error pulled from `records` stops the output and is returned;
/// records written before it stay written.
pub fn write_records<I, W>(
    schema: &FeatureSchema,
    records: I,
    content_type: ContentType,
    writer: W,
) -> Result<usize>
where
    I: IntoIterator<Item = Result<FeatureRecord>>,
    W: Write,
{
    match content_type {
        ContentType::Csv => write_csv(schema, records, false, writer),
        ContentType::CsvWithHeader => write_csv(schema, records, true, writer),
        ContentType::Json => write_json(schema, records, writer),
        ContentType::NdJson => write_ndjson(schema, records, writer),
    }
}

fn write_csv<I, W>(schema: &FeatureSchema, records: I, include_header: bool, writer: W) -> Result<usize>
where
    I: IntoIterator<Item = Result<FeatureRecord>>,
    W: Write,
{
    let mut wtr = csv::Writer::from_writer(writer);

    if include_header {
        let mut header = vec![ID_FIELD];
        header.extend(schema.column_names());
        wtr.write_record(&header)?;
    }

    let mut written = 0;
    for record in records {
        let record = record?;
        let mut row = Vec::with_capacity(record.values().len() + 1);
        row.push(record.id().to_string());
        row.extend(record.values().iter().map(|value| match value {
            FeatureValue::Null => String::new(),
            FeatureValue::String(s) => s.clone(),
            FeatureValue::Double(v) => v.to_string(),
        }));
        wtr.write_record(&row)?;
        written += 1;
    }

    wtr.flush()?;
    Ok(written)
}

fn record_object(schema: &FeatureSchema, record: &FeatureRecord) -> Value {
    let mut object = Map::new();
    object.insert(ID_FIELD.to_string(), Value::String(record.id().to_string()));
    for (attribute, value) in schema.attributes().iter().zip(record.values()) {
        let value = match value {
            FeatureValue::Null => Value::Null,
            FeatureValue::String(s) => Value::String(s.clone()),
            FeatureValue::Double(v) => Number::from_f64(*v).map(Value::Number).unwrap_or(Value::Null),
        };
        object.insert(attribute.name.clone(), value);
    }
    Value::Object(object)
}

fn write_json<I, W>(schema: &FeatureSchema, records: I, mut writer: W) -> Result<usize>
where
    I: IntoIterator<Item = Result<FeatureRecord>>,
    W: Write,
{
    writer.write_all(b"[")?;
    let mut written = 0;
    for record in records {
        let record = record?;
        if written > 0 {
            writer.write_all(b",")?;
        }
        writer.write_all(b"\n")?;
        serde_json::to_writer_pretty(&mut writer, &record_object(schema, &record))?;
        written += 1;
    }
    if written > 0 {
        writer.write_all(b"\n")?;
    }
    writer.write_all(b"]\n")?;
    writer.flush()?;
    Ok(written)
}

fn write_ndjson<I, W>(schema: &FeatureSchema, records: I, mut writer: W) -> Result<usize>
where
    I: IntoIterator<Item = Result<FeatureRecord>>,
    W: Write,
{
    let mut written = 0;
    for record in records {
        let record = record?;
        serde_json::to_writer(&mut writer, &record_object(schema, &record))?;
        writer.write_all(b"\n")?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::code_list_schema;
    use crate::{CodeList, DataflowStructure, Dimension, FeatureStream, stream::CodeListStream};

    fn codes() -> (Arc<FeatureSchema>, FeatureStream) {
        let structure = DataflowStructure::new(
            "DSD",
            vec![Dimension::new(
                "STATE",
                CodeList::from_pairs("CL_STATE", [("1", "New South Wales"), ("2", "Victoria")]),
            )],
        );
        let schema = Arc::new(code_list_schema("DF__STATE"));
        let stream = CodeListStream::open(&structure, "STATE")
            .unwrap()
            .with_schema(Arc::clone(&schema));
        (schema, stream.into())
    }

    #[test]
    fn test_csv_with_header() {
        let (schema, stream) = codes();
        let mut out = Vec::new();
        let written = write_records(&schema, stream, ContentType::CsvWithHeader, &mut out).unwrap();
        assert_eq!(written, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "id,geometry,CODE,DESCRIPTION\n1,,1,New South Wales\n2,,2,Victoria\n"
        );
    }

    #[test]
    fn test_json_array() {
        let (schema, stream) = codes();
        let mut out = Vec::new();
        write_records(&schema, stream, ContentType::Json, &mut out).unwrap();
        let parsed: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert_eq!(parsed[1]["DESCRIPTION"], "Victoria");
        assert!(parsed[0]["geometry"].is_null());
        assert_eq!(parsed[0]["id"], "1");
    }

    #[test]
    fn test_empty_json_array_is_valid() {
        let schema = code_list_schema("DF__STATE");
        let mut out = Vec::new();
        let written = write_records(&schema, Vec::<Result<FeatureRecord>>::new(), ContentType::Json, &mut out).unwrap();
        assert_eq!(written, 0);
        let parsed: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed, Value::Array(Vec::new()));
    }

    #[test]
    fn test_ndjson_lines() {
        let (schema, stream) = codes();
        let mut out = Vec::new();
        write_records(&schema, stream, ContentType::NdJson, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["CODE"], "1");
    }

    #[test]
    fn test_errors_stop_output() {
        let schema = code_list_schema("DF__STATE");
        let records: Vec<Result<FeatureRecord>> =
            vec![Err(SdmxError::ExhaustedStream("gone".to_string()))];
        let mut out = Vec::new();
        assert!(matches!(
            write_records(&schema, records, ContentType::NdJson, &mut out),
            Err(SdmxError::ExhaustedStream(_))
        ));
        assert!(out.is_empty());
    }
}
