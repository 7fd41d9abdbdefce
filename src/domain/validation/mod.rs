pub mod data_quality;

pub use data_quality::{MerchantDataValidator, coerce_number, non_negative_field};
