use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{ParserError, RowFailure};
use crate::model::{
    ColumnKind, ColumnSpec, MissingValues, NormalizedRow, ParseOptions, Provider, Table, Value,
};
use crate::registry::FormatParser;
use crate::time::{SourceZone, TimeEncoding};

use super::common::{float_cell, snake_case_name, RowCollector, TIME_COLUMN};

static KML_ROOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"<kml\b").expect("valid regex"));
static PLACEMARK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<Placemark\b[^>]*>(.*?)</Placemark>").expect("valid regex"));
static NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<name>\s*(.*?)\s*</name>").expect("valid regex"));
static WHEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<when>\s*(.*?)\s*</when>").expect("valid regex"));
static COORDINATES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<coordinates>\s*(.*?)\s*</coordinates>").expect("valid regex")
});
static DATA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<Data\s+name="([^"]*)"[^>]*?(?:/>|>(.*?)</Data>)"#).expect("valid regex")
});
static VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<value>\s*(.*?)\s*</value>").expect("valid regex"));
static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(?:#[xX]([0-9A-Fa-f]+)|#([0-9]+)|(lt|gt|quot|apos|amp));").expect("valid regex")
});
static SIMPLE_DATA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<SimpleData\s+name="([^"]*)"[^>]*>\s*(.*?)\s*</SimpleData>"#)
        .expect("valid regex")
});

/// KML placemark exports from the Elkhorn Slough GIS portal.
#[derive(Debug, Clone, PartialEq)]
pub struct ElkhornGisConfig {
    /// Applied only to `<when>` values without an explicit offset.
    pub zone: SourceZone,
    pub missing: MissingValues,
}

impl Default for ElkhornGisConfig {
    fn default() -> Self {
        Self {
            zone: SourceZone::Utc,
            missing: MissingValues::new(&["NaN", "NA", "null"], &[-9999.0]),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ElkhornGisParser {
    config: ElkhornGisConfig,
}

struct Placemark {
    line_index: usize,
    name: Option<String>,
    when: Option<String>,
    coordinates: Option<String>,
    fields: Vec<(String, String)>,
}

impl ElkhornGisParser {
    const PROVIDER: Provider = Provider::ElkhornGis;

    pub fn new(config: ElkhornGisConfig) -> Self {
        Self { config }
    }

    fn placemarks(content: &str) -> Vec<Placemark> {
        PLACEMARK
            .captures_iter(content)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let body = caps.get(1)?.as_str();
                let capture = |re: &Regex| {
                    re.captures(body)
                        .and_then(|c| c.get(1))
                        .map(|m| unescape(m.as_str()))
                };
                // A <Data> without <value> is an absent cell, never its neighbour's value.
                let data = DATA.captures_iter(body).map(|data| {
                    let value = data
                        .get(2)
                        .and_then(|inner| VALUE.captures(inner.as_str()))
                        .and_then(|v| v.get(1))
                        .map_or(String::new(), |v| unescape(v.as_str()));
                    (unescape(&data[1]), value)
                });
                let simple = SIMPLE_DATA
                    .captures_iter(body)
                    .map(|data| (unescape(&data[1]), unescape(&data[2])));

                let mut fields: Vec<(String, String)> = Vec::new();
                for (name, value) in data.chain(simple) {
                    let key = snake_case_name(&name);
                    if !key.is_empty() && !fields.iter().any(|(k, _)| *k == key) {
                        fields.push((key, value));
                    }
                }
                Some(Placemark {
                    line_index: content[..whole.start()].matches('\n').count() + 1,
                    name: capture(&NAME),
                    when: capture(&WHEN),
                    coordinates: capture(&COORDINATES),
                    fields,
                })
            })
            .collect()
    }

    /// Data fields in first-seen order; a field is numeric when every present value parses.
    fn field_schema(&self, placemarks: &[Placemark]) -> Vec<ColumnSpec> {
        let mut order: Vec<String> = Vec::new();
        for placemark in placemarks {
            for (key, _) in &placemark.fields {
                if !order.contains(key) && !Self::is_reserved(key) {
                    order.push(key.clone());
                }
            }
        }

        order
            .into_iter()
            .map(|key| {
                let numeric = placemarks
                    .iter()
                    .filter_map(|p| p.fields.iter().find(|(k, _)| *k == key))
                    .all(|(_, raw)| float_cell(raw, &key, &self.config.missing).is_ok());
                let kind = if numeric {
                    ColumnKind::Float
                } else {
                    ColumnKind::Text
                };
                ColumnSpec::new(key, kind)
            })
            .collect()
    }

    fn is_reserved(key: &str) -> bool {
        matches!(key, "time" | "name" | "latitude" | "longitude")
    }

    fn normalize(
        &self,
        placemark: &Placemark,
        fields: &[ColumnSpec],
        encoding: &TimeEncoding,
    ) -> Result<NormalizedRow, RowFailure> {
        let when = placemark
            .when
            .as_deref()
            .ok_or_else(|| RowFailure::Malformed("placemark has no <when> timestamp".to_string()))?;
        let time = encoding.normalize(&[when])?;

        let coordinates = placemark
            .coordinates
            .as_deref()
            .ok_or_else(|| RowFailure::Malformed("placemark has no <coordinates>".to_string()))?;
        let (longitude, latitude) = parse_point(coordinates)?;

        let mut row = NormalizedRow::with_capacity(fields.len() + 4);
        row.push(TIME_COLUMN, Value::Timestamp(time));
        row.push(
            "name",
            placemark
                .name
                .clone()
                .filter(|n| !n.is_empty())
                .map_or(Value::Absent, Value::Text),
        );
        row.push("latitude", Value::Float(latitude));
        row.push("longitude", Value::Float(longitude));

        for spec in fields {
            let raw = placemark
                .fields
                .iter()
                .find(|(k, _)| *k == spec.name)
                .map(|(_, v)| v.as_str())
                .unwrap_or_default();
            let value = match spec.kind {
                ColumnKind::Float => float_cell(raw, &spec.name, &self.config.missing)?,
                _ if self.config.missing.is_missing_token(raw.trim()) => Value::Absent,
                _ => Value::Text(raw.trim().to_string()),
            };
            row.push(spec.name.clone(), value);
        }
        Ok(row)
    }
}

impl FormatParser for ElkhornGisParser {
    fn provider(&self) -> Provider {
        Self::PROVIDER
    }

    fn parse(&self, content: &str, options: &ParseOptions) -> Result<Table, ParserError> {
        if !KML_ROOT.is_match(content) {
            return Err(ParserError::Schema {
                provider: Self::PROVIDER,
                reason: "payload has no <kml> root element".to_string(),
            });
        }

        let placemarks = Self::placemarks(content);
        let fields = self.field_schema(&placemarks);

        let mut schema = vec![
            ColumnSpec::new(TIME_COLUMN, ColumnKind::Timestamp),
            ColumnSpec::new("name", ColumnKind::Text),
            ColumnSpec::new("latitude", ColumnKind::Float),
            ColumnSpec::new("longitude", ColumnKind::Float),
        ];
        schema.extend(fields.iter().cloned());

        let encoding = TimeEncoding::Iso8601 {
            zone: self.config.zone,
        };
        let mut collector = RowCollector::new(Self::PROVIDER, schema, options);
        for placemark in &placemarks {
            collector.accept(
                placemark.line_index,
                self.normalize(placemark, &fields, &encoding),
            )?;
        }
        collector.finish()
    }
}

/// `lon,lat[,alt]`; KML lists longitude first.
fn parse_point(raw: &str) -> Result<(f64, f64), RowFailure> {
    let first = raw.split_whitespace().next().unwrap_or_default();
    let mut parts = first.split(',').map(str::trim);
    let mut coordinate = |what: &str| -> Result<f64, RowFailure> {
        let value = parts.next().unwrap_or_default();
        value.parse::<f64>().map_err(|_| RowFailure::NotNumeric {
            column: what.to_string(),
            value: value.to_string(),
        })
    };
    let longitude = coordinate("longitude")?;
    let latitude = coordinate("latitude")?;
    if !(-180.0..=180.0).contains(&longitude) || !(-90.0..=90.0).contains(&latitude) {
        return Err(RowFailure::Malformed(format!(
            "coordinates '{first}' are outside the valid range"
        )));
    }
    Ok((longitude, latitude))
}

fn unescape(raw: &str) -> String {
    let stripped = raw
        .strip_prefix("<![CDATA[")
        .and_then(|s| s.strip_suffix("]]>"))
        .unwrap_or(raw);
    ENTITY
        .replace_all(stripped, |caps: &regex::Captures<'_>| {
            let decoded = match (caps.get(1), caps.get(2), caps.get(3)) {
                (Some(hex), _, _) => u32::from_str_radix(hex.as_str(), 16)
                    .ok()
                    .and_then(char::from_u32),
                (_, Some(dec), _) => dec.as_str().parse().ok().and_then(char::from_u32),
                (_, _, Some(named)) => match named.as_str() {
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    _ => Some('&'),
                },
                _ => None,
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}
