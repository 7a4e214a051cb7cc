pub mod product;
pub mod quotation;
pub mod request;
