//! Transaction types and the static field schemas behind their CSV templates.
//!
//! The three schemas share a common prefix and diverge only in the price
//! column name and in whether `Available From` is present.

/// Real-estate listing category selecting which field schema applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionType {
    Lease,
    Sale,
    HomeStay,
}

/// Columns required for lease listings.
const LEASE_FIELDS: &[&str] = &[
    "Project Name",
    "Zone Name",
    "Block Name",
    "Property Number",
    "Property Type",
    "Bedrooms",
    "Bathrooms",
    "Unit Size",
    "Furnishing",
    "View",
    "Title",
    "Description",
    "Currency",
    "Lease Price",
    "Available From",
];

/// Columns required for sale listings.
const SALE_FIELDS: &[&str] = &[
    "Project Name",
    "Zone Name",
    "Block Name",
    "Property Number",
    "Property Type",
    "Bedrooms",
    "Bathrooms",
    "Unit Size",
    "Furnishing",
    "View",
    "Title",
    "Description",
    "Currency",
    "Sale Price",
    "Available From",
];

/// Columns required for homestay listings. No `Available From`: homestay
/// availability is managed per booking, not per listing.
const HOMESTAY_FIELDS: &[&str] = &[
    "Project Name",
    "Zone Name",
    "Block Name",
    "Property Number",
    "Property Type",
    "Bedrooms",
    "Bathrooms",
    "Unit Size",
    "Furnishing",
    "View",
    "Title",
    "Description",
    "Currency",
    "Price Per Night",
];

impl TransactionType {
    pub const ALL: [TransactionType; 3] = [
        TransactionType::Lease,
        TransactionType::Sale,
        TransactionType::HomeStay,
    ];

    /// Parse a route slug. Unknown values fall back to `Lease`.
    pub fn from_slug(slug: &str) -> Self {
        match slug {
            "sale" => TransactionType::Sale,
            "homestay" => TransactionType::HomeStay,
            _ => TransactionType::Lease,
        }
    }

    /// Route slug used in URLs and template filenames.
    pub fn slug(&self) -> &'static str {
        match self {
            TransactionType::Lease => "lease",
            TransactionType::Sale => "sale",
            TransactionType::HomeStay => "homestay",
        }
    }

    /// Label the listings API expects in bulk-upload requests.
    pub fn api_label(&self) -> &'static str {
        match self {
            TransactionType::Lease => "Lease",
            TransactionType::Sale => "Sale",
            TransactionType::HomeStay => "Home Stay",
        }
    }

    /// The ordered column set required for this transaction type.
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            TransactionType::Lease => LEASE_FIELDS,
            TransactionType::Sale => SALE_FIELDS,
            TransactionType::HomeStay => HOMESTAY_FIELDS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_slug_falls_back_to_lease() {
        assert_eq!(TransactionType::from_slug("lease"), TransactionType::Lease);
        assert_eq!(TransactionType::from_slug("timeshare"), TransactionType::Lease);
        assert_eq!(TransactionType::from_slug(""), TransactionType::Lease);
    }

    #[test]
    fn test_api_labels() {
        assert_eq!(TransactionType::Lease.api_label(), "Lease");
        assert_eq!(TransactionType::Sale.api_label(), "Sale");
        assert_eq!(TransactionType::HomeStay.api_label(), "Home Stay");
    }

    #[test]
    fn test_schemas_share_prefix_and_diverge_in_price() {
        let lease = TransactionType::Lease.fields();
        let sale = TransactionType::Sale.fields();
        let homestay = TransactionType::HomeStay.fields();

        // Common prefix up to and including Currency
        assert_eq!(lease[..13], sale[..13]);
        assert_eq!(lease[..13], homestay[..13]);

        assert!(lease.contains(&"Lease Price"));
        assert!(sale.contains(&"Sale Price"));
        assert!(homestay.contains(&"Price Per Night"));

        assert!(lease.contains(&"Available From"));
        assert!(sale.contains(&"Available From"));
        assert!(!homestay.contains(&"Available From"));
    }

    #[test]
    fn test_each_schema_has_exactly_one_price_field() {
        for tt in TransactionType::ALL {
            let prices: Vec<_> = tt
                .fields()
                .iter()
                .filter(|f| f.contains("Price"))
                .collect();
            assert_eq!(prices.len(), 1, "{:?}", tt);
        }
    }
}
