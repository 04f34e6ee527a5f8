use serde::{Deserialize, Deserializer};
use std::io::Read;

#[derive(Debug)]
pub(crate) struct LabourRow {
    pub(crate) line: u64,
    pub(crate) name: String,
    pub(crate) nationality: Option<String>,
    pub(crate) passport_number: Option<String>,
    pub(crate) profession: Option<String>,
}

pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<Vec<LabourRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();

    for (index, record) in csv_reader.deserialize::<RawRow>().enumerate() {
        let raw = record?;
        rows.push(LabourRow {
            // header occupies line 1
            line: index as u64 + 2,
            name: collapse_whitespace(&raw.name),
            nationality: raw.nationality,
            passport_number: raw
                .passport_number
                .map(|value| value.replace(' ', "").to_ascii_uppercase()),
            profession: raw.profession,
        });
    }

    Ok(rows)
}

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "Name", alias = "name")]
    name: String,
    #[serde(
        rename = "Nationality",
        alias = "nationality",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    nationality: Option<String>,
    #[serde(
        rename = "Passport Number",
        alias = "passport_number",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    passport_number: Option<String>,
    #[serde(
        rename = "Profession",
        alias = "profession",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    profession: Option<String>,
}

fn collapse_whitespace(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }))
}
