pub mod splitting;
