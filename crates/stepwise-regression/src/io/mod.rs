//! Readers that turn delimited text files into a [`Dataset`](crate::dataset::Dataset).
pub mod csv_dataset;

pub use csv_dataset::{read_dataset_csv, read_dataset_csv_with_config, CsvReaderConfig};
