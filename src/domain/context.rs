// src/domain/context.rs

use crate::config::OutputFormat;

/// Geographic scope that actually produced a set of comp rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompScope {
    Zip,
    County,
    Region,
}

impl CompScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompScope::Zip => "zip",
            CompScope::County => "county",
            CompScope::Region => "region",
        }
    }
}

/// One sold-property row from the sales/properties join.
/// Read-only projection; never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparableSale {
    pub sale_price: Option<f64>,
    pub sale_date: Option<String>,
    pub beds: Option<i64>,
    pub baths: Option<f64>,
    pub square_feet: Option<i64>,
    pub year_built: Option<i64>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

/// One row from the comparison table. The table layout is configured,
/// not known at compile time, so the full row travels as named columns
/// with the configured title/price columns surfaced.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparableListing {
    pub title: Option<String>,
    pub price: Option<f64>,
    /// Every column of the row, rendered to text, in select order.
    pub fields: Vec<(String, String)>,
}

/// The composed bundle handed to the downstream evaluator: sales comps
/// plus the scope that produced them, independent comparable listings,
/// and an optional informational note (lot rent). Immutable once built
/// and never cached across listings.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonContext {
    pub sales: Vec<ComparableSale>,
    /// None when the zip/county/region hierarchy was exhausted with zero
    /// rows at every level, or sales comps were not attempted.
    pub sales_scope: Option<CompScope>,
    pub listings: Vec<ComparableListing>,
    pub note: Option<String>,
}

impl ComparisonContext {
    pub fn empty() -> Self {
        Self {
            sales: Vec::new(),
            sales_scope: None,
            listings: Vec::new(),
            note: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sales.is_empty() && self.listings.is_empty() && self.note.is_none()
    }

    /// Text block for the evaluator prompt. `OutputFormat::None`
    /// suppresses it entirely; `Short` truncates to 120 characters.
    pub fn summary(&self, format: OutputFormat) -> Option<String> {
        if format == OutputFormat::None || self.is_empty() {
            return None;
        }

        let mut parts: Vec<String> = Vec::new();

        if let Some(scope) = self.sales_scope {
            let mut lines = vec![format!("Recent sold comps ({}):", scope.as_str())];
            for (i, sale) in self.sales.iter().enumerate() {
                lines.push(format!("  {}. {}", i + 1, render_sale(sale)));
            }
            parts.push(lines.join("\n"));
        }

        if !self.listings.is_empty() {
            let mut lines = vec!["Similar or related listings from your database:".to_string()];
            for (i, listing) in self.listings.iter().enumerate() {
                let fields: Vec<String> = listing
                    .fields
                    .iter()
                    .take(6)
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect();
                lines.push(format!("  {}. {}", i + 1, fields.join(" | ")));
            }
            parts.push(lines.join("\n"));
        }

        if let Some(note) = &self.note {
            parts.push(note.clone());
        }

        let text = parts.join("\n\n");
        match format {
            OutputFormat::Short => {
                let flat = text.replace('\n', " ");
                if flat.chars().count() > 120 {
                    let cut: String = flat.chars().take(120).collect();
                    Some(format!("{cut}..."))
                } else {
                    Some(flat)
                }
            }
            _ => Some(text),
        }
    }
}

fn render_sale(sale: &ComparableSale) -> String {
    let mut fields: Vec<String> = Vec::new();
    if let Some(price) = sale.sale_price {
        fields.push(format!("sold ${price:.0}"));
    }
    if let Some(date) = &sale.sale_date {
        fields.push(date.clone());
    }
    if let Some(beds) = sale.beds {
        fields.push(format!("{beds} bed"));
    }
    if let Some(baths) = sale.baths {
        fields.push(format!("{baths} bath"));
    }
    if let Some(sqft) = sale.square_feet {
        fields.push(format!("{sqft} sqft"));
    }
    if let Some(year) = sale.year_built {
        fields.push(format!("built {year}"));
    }
    let place: Vec<&str> = [sale.city.as_deref(), sale.state.as_deref(), sale.zip.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    if !place.is_empty() {
        fields.push(place.join(", "));
    }
    fields.join(" | ")
}
