mod invoice_tax_line;
mod raw_tax_line;

pub use invoice_tax_line::InvoiceTaxLine;
pub use raw_tax_line::{HydrationError, RawTaxLine};
