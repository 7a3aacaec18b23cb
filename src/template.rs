//! CSV template generation for bulk property uploads.

use crate::schema::TransactionType;
use anyhow::{Context, Result};
use std::time::{SystemTime, UNIX_EPOCH};

/// A generated template ready to be served as a download.
#[derive(Debug, Clone)]
pub struct TemplateFile {
    pub filename: String,
    pub contents: String,
}

/// Illustrative value shown in the template's sample row.
pub(crate) fn sample_value(field: &str) -> String {
    if field.contains("Price") {
        return "1000".to_string();
    }
    match field {
        "Bedrooms" | "Bathrooms" => "2".to_string(),
        "Unit Size" => "1200".to_string(),
        "Currency" => "USD".to_string(),
        "Available From" => "2024-01-01".to_string(),
        _ => format!("Sample {}", field),
    }
}

/// Build the two-line CSV template for a transaction type: the schema's
/// header row plus one sample row. Sample values never contain commas, so
/// the output carries no quoting.
pub fn build_template(transaction_type: TransactionType) -> Result<TemplateFile> {
    let fields = transaction_type.fields();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(fields)
        .context("Failed to write template header row")?;
    let sample: Vec<String> = fields.iter().map(|f| sample_value(f)).collect();
    writer
        .write_record(&sample)
        .context("Failed to write template sample row")?;

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush template writer: {}", e.error()))?;
    let contents = String::from_utf8(bytes).context("Template output was not UTF-8")?;

    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let filename = format!(
        "{}_properties_template_{}.csv",
        transaction_type.slug(),
        millis
    );

    Ok(TemplateFile { filename, contents })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_csv;

    #[test]
    fn test_template_round_trips_through_parser() {
        for tt in TransactionType::ALL {
            let template = build_template(tt).unwrap();
            let parsed = parse_csv(&template.contents);
            assert_eq!(parsed.headers, tt.fields(), "{:?}", tt);
            assert_eq!(parsed.rows.len(), 1);
        }
    }

    #[test]
    fn test_sample_row_values() {
        let template = build_template(TransactionType::Lease).unwrap();
        let parsed = parse_csv(&template.contents);
        let row = &parsed.rows[0];

        assert_eq!(row.get("Lease Price"), Some("1000"));
        assert_eq!(row.get("Bedrooms"), Some("2"));
        assert_eq!(row.get("Bathrooms"), Some("2"));
        assert_eq!(row.get("Unit Size"), Some("1200"));
        assert_eq!(row.get("Currency"), Some("USD"));
        assert_eq!(row.get("Available From"), Some("2024-01-01"));
        assert_eq!(row.get("Project Name"), Some("Sample Project Name"));
    }

    #[test]
    fn test_sample_row_is_valid() {
        use crate::validator::validate_row;
        for tt in TransactionType::ALL {
            let template = build_template(tt).unwrap();
            let parsed = parse_csv(&template.contents);
            assert!(validate_row(&parsed.rows[0], tt.fields()).is_empty());
        }
    }

    #[test]
    fn test_filename_shape() {
        let template = build_template(TransactionType::HomeStay).unwrap();
        assert!(template.filename.starts_with("homestay_properties_template_"));
        assert!(template.filename.ends_with(".csv"));
    }
}
