pub mod tender_parser;

pub use tender_parser::TenderExtractor;
