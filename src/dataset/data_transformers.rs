pub mod dataset_yaml;
